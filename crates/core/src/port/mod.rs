// Port Layer - Interfaces for external dependencies

pub mod id_provider; // For deterministic testing
pub mod job_queue;
pub mod time_provider;
pub mod transaction;

// Re-exports
pub use id_provider::IdProvider;
pub use job_queue::JobQueue;
pub use time_provider::TimeProvider;
pub use transaction::{EnrollmentStore, EnrollmentTransaction, Transaction};
