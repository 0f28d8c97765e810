//! SDK Request/Response Types
//!
//! Mirrors the JSON-RPC types from the api-rpc crate.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Waiting,
    Active,
    Completed,
    Failed,
    Stalled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnrollmentStatus {
    Pending,
    Confirmed,
    Waitlisted,
    Rejected,
    Dropped,
}

/// Request to queue an enrollment
#[derive(Debug, Clone, Serialize)]
pub struct SubmitRequest {
    pub student_id: i64,
    pub course_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResponse {
    pub job_id: String,
    pub state: JobState,
    pub enqueued_at: i64,
    pub estimated_wait_secs: i64,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct DropRequest {
    pub enrollment_id: i64,
    pub student_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DropResponse {
    pub enrollment_id: i64,
    pub status: EnrollmentStatus,
    pub promoted: Option<PromotedEnrollment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PromotedEnrollment {
    pub enrollment_id: i64,
    pub student_id: i64,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct StatusRequest {
    pub job_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_ms: Option<u64>,
}

/// Final enrollment state of a completed job
#[derive(Debug, Clone, Deserialize)]
pub struct EnrollmentOutcome {
    pub enrollment_id: i64,
    pub status: EnrollmentStatus,
    pub waitlist_position: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobFailure {
    /// `rejected`, `not_found`, `retries_exhausted` or `internal`
    pub kind: String,
    pub reason: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobStatus {
    pub job_id: String,
    pub student_id: i64,
    pub course_id: i64,
    pub state: JobState,
    pub attempts: i32,
    pub max_attempts: i32,
    pub enqueued_at: i64,
    pub finished_at: Option<i64>,
    pub correlation_id: Option<String>,
    pub jobs_ahead: Option<i64>,
    pub outcome: Option<EnrollmentOutcome>,
    pub failure: Option<JobFailure>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct JobRequest {
    pub job_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CancelResponse {
    pub job_id: String,
    pub cancelled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct WaitlistRequest {
    pub course_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WaitlistResponse {
    pub course_id: i64,
    pub entries: Vec<WaitlistEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WaitlistEntry {
    pub enrollment_id: i64,
    pub student_id: i64,
    pub position: i32,
    pub since: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatsResponse {
    pub waiting: i64,
    /// Waiting jobs still serving a retry backoff
    #[serde(default)]
    pub delayed: i64,
    pub active: i64,
    pub completed: i64,
    pub failed: i64,
    pub stalled: i64,
    pub total: i64,
    pub uptime_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryResponse {
    pub job_id: String,
    pub state: JobState,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CleanResponse {
    pub completed: u64,
    pub failed: u64,
}
