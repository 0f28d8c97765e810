//! RPC Request/Response Types
//!
//! Method parameters and results. Job and enrollment payloads reuse the core
//! serde types so the wire format follows the domain.

use enrollment_core::application::{JobStatus, PurgeStats, QueueStats};
use enrollment_core::domain::{
    CourseId, Enrollment, EnrollmentId, EnrollmentStatus, JobId, JobState, StudentId,
};
use serde::{Deserialize, Serialize};

/// enrollment.submit.v1 - Queue an enrollment intent
#[derive(Debug, Deserialize)]
pub struct SubmitParams {
    pub student_id: StudentId,
    pub course_id: CourseId,
    #[serde(default)]
    pub correlation_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitResponse {
    pub job_id: JobId,
    pub state: JobState,
    pub enqueued_at: i64,
    pub estimated_wait_secs: i64,
}

/// enrollment.drop.v1 - Drop an enrollment (promotes the waitlist head)
#[derive(Debug, Deserialize)]
pub struct DropParams {
    pub enrollment_id: EnrollmentId,
    pub student_id: StudentId,
}

#[derive(Debug, Clone, Serialize)]
pub struct DropResponse {
    pub enrollment_id: EnrollmentId,
    pub status: EnrollmentStatus,
    pub promoted: Option<PromotedEnrollment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PromotedEnrollment {
    pub enrollment_id: EnrollmentId,
    pub student_id: StudentId,
}

/// enrollment.status.v1 - Poll a job; `wait_ms` blocks until terminal or timeout
#[derive(Debug, Deserialize)]
pub struct StatusParams {
    pub job_id: JobId,
    #[serde(default)]
    pub wait_ms: Option<u64>,
}

pub type StatusResponse = JobStatus;

/// enrollment.cancel.v1 - Remove a job that no worker has claimed yet
#[derive(Debug, Deserialize)]
pub struct CancelParams {
    pub job_id: JobId,
}

#[derive(Debug, Clone, Serialize)]
pub struct CancelResponse {
    pub job_id: JobId,
    pub cancelled: bool,
}

/// enrollment.waitlist.v1 - Ordered waitlist of a course
#[derive(Debug, Deserialize)]
pub struct WaitlistParams {
    pub course_id: CourseId,
}

#[derive(Debug, Clone, Serialize)]
pub struct WaitlistResponse {
    pub course_id: CourseId,
    pub entries: Vec<WaitlistEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WaitlistEntry {
    pub enrollment_id: EnrollmentId,
    pub student_id: StudentId,
    pub position: i32,
    pub since: i64,
}

impl WaitlistEntry {
    pub fn from_enrollment(e: &Enrollment) -> Option<Self> {
        Some(Self {
            enrollment_id: e.id,
            student_id: e.student_id,
            position: e.waitlist_position?,
            since: e.created_at,
        })
    }
}

/// admin.stats.v1 - Job counts per state (no parameters)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub queue: QueueStats,
    pub uptime_seconds: u64,
}

/// admin.retry.v1 - Move a failed job back to waiting
#[derive(Debug, Deserialize)]
pub struct RetryParams {
    pub job_id: JobId,
}

#[derive(Debug, Clone, Serialize)]
pub struct RetryResponse {
    pub job_id: JobId,
    pub state: JobState,
}

/// admin.clean.v1 - Purge old completed and failed jobs now (no parameters)
pub type CleanResponse = PurgeStats;
