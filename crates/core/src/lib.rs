// Enrollment Core - Domain Logic & Ports
// No infrastructure dependencies: adapters implement the traits in `port`

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod port;

pub use config::EngineConfig;
pub use error::{AppError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
