pub mod memory;
pub mod service;
pub mod thumbnail;

pub use memory::*;
pub use service::*;
