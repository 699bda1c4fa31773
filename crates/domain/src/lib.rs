pub mod errors;
pub mod pagination;
pub mod repository;
pub mod todo;

pub use errors::*;
pub use pagination::*;
pub use repository::*;
pub use todo::*;
