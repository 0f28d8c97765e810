// Enrollment Infrastructure - SQLite Adapter
// Implements: JobQueue, EnrollmentStore (BEGIN IMMEDIATE transactions), catalog access

mod catalog;
mod connection;
mod error;
mod job_queue;
mod migration;
mod rows;
mod transaction;

pub use catalog::SqliteCatalog;
pub use connection::create_pool;
pub use job_queue::SqliteJobQueue;
pub use migration::run_migrations;
pub use transaction::{SqliteEnrollmentStore, SqliteEnrollmentTransaction};
