// Application Layer - Use Cases and Business Logic

pub mod capacity;
pub mod events;
pub mod maintenance;
pub mod processor;
pub mod recovery;
pub mod retry;
pub mod status;
pub mod submission;
pub mod validator;
pub mod waitlist;
pub mod worker;

#[cfg(test)]
pub(crate) mod test_support;

// Re-exports
pub use events::{JobEvent, JobEvents};
pub use maintenance::{MaintenanceScheduler, PurgeStats};
pub use processor::{DropOutcome, EnrollmentProcessor};
pub use recovery::RecoveryService;
pub use retry::{RetryDecision, RetryPolicy};
pub use status::{JobStatus, JobStatusTracker};
pub use submission::{EnqueueSettings, EnrollmentQueue, QueueStats, SubmitReceipt, SubmitRequest};
pub use validator::{Conflict, ConflictValidator};
pub use worker::{shutdown_channel, spawn_workers, ShutdownSender, ShutdownToken, Worker};
