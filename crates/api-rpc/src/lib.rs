//! JSON-RPC API Layer
//!
//! Exposes enrollment submission, drop, status polling and queue
//! administration as JSON-RPC 2.0 methods over HTTP.

pub mod error;
pub mod handler;
pub mod server;
pub mod types;

pub use handler::RpcHandler;
pub use server::{RpcServer, RpcServerConfig};
