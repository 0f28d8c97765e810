//! Enrollment SDK - Rust Client Library
//!
//! Client for the Enrollment Engine daemon's JSON-RPC API.
//!
//! # Example
//!
//! ```no_run
//! use enrollment_sdk::{EnrollmentClient, SubmitRequest};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = EnrollmentClient::connect("http://127.0.0.1:9630").await?;
//!
//!     let receipt = client.submit(SubmitRequest {
//!         student_id: 1,
//!         course_id: 10,
//!         correlation_id: None,
//!     }).await?;
//!
//!     let status = client
//!         .wait_for_terminal(&receipt.job_id, Duration::from_secs(60))
//!         .await?;
//!     println!("Job {} is {:?}", status.job_id, status.state);
//!
//!     Ok(())
//! }
//! ```

mod client;
mod error;
mod types;

pub use client::EnrollmentClient;
pub use error::{code, Result, SdkError};
pub use types::{
    CancelResponse, CleanResponse, DropResponse, EnrollmentOutcome, EnrollmentStatus, JobFailure,
    JobState, JobStatus, PromotedEnrollment, RetryResponse, StatsResponse, SubmitRequest,
    SubmitResponse, WaitlistEntry, WaitlistResponse,
};
