pub mod auth;
pub mod config;
pub mod errors;
pub mod http;
pub mod telemetry;
pub mod tracing;

pub use auth::*;
pub use config::*;
pub use errors::*;
pub use http::*;
pub use self::tracing::*;
