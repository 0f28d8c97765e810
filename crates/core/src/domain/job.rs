// Enrollment Queue Job Domain Model

use super::course::{CourseId, StudentId};
use super::enrollment::{EnrollmentId, EnrollmentStatus};
use super::error::{DomainError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Job ID (UUID v4)
pub type JobId = String;

/// Job lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Waiting,
    Active,
    Completed,
    Failed,
    /// Claimed by a worker that stopped reporting; eligible for reclaim
    Stalled,
}

impl JobState {
    pub const ALL: [JobState; 5] = [
        JobState::Waiting,
        JobState::Active,
        JobState::Completed,
        JobState::Failed,
        JobState::Stalled,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }

    pub fn is_claimable(&self) -> bool {
        matches!(self, JobState::Waiting | JobState::Stalled)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Waiting => write!(f, "WAITING"),
            JobState::Active => write!(f, "ACTIVE"),
            JobState::Completed => write!(f, "COMPLETED"),
            JobState::Failed => write!(f, "FAILED"),
            JobState::Stalled => write!(f, "STALLED"),
        }
    }
}

impl FromStr for JobState {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "WAITING" => Ok(JobState::Waiting),
            "ACTIVE" => Ok(JobState::Active),
            "COMPLETED" => Ok(JobState::Completed),
            "FAILED" => Ok(JobState::Failed),
            "STALLED" => Ok(JobState::Stalled),
            other => Err(DomainError::UnknownVariant {
                kind: "job state",
                value: other.to_string(),
            }),
        }
    }
}

/// Final enrollment result carried by a completed job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentOutcome {
    pub enrollment_id: EnrollmentId,
    pub status: EnrollmentStatus,
    pub waitlist_position: Option<i32>,
}

/// Why a job ended in the failed state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Business rule violated; never retried
    Rejected,
    /// Course or student missing, or course inactive
    NotFound,
    /// Transient errors exhausted the attempt ceiling
    RetriesExhausted,
    /// Worker panic or other non-retryable fault
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    pub kind: FailureKind,
    pub reason: String,
}

impl JobFailure {
    pub fn new(kind: FailureKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }
}

/// Enrollment intent queued for one (student, course) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentJob {
    pub id: JobId,
    pub student_id: StudentId,
    pub course_id: CourseId,
    pub state: JobState,

    // Retry bookkeeping
    pub attempts: i32,
    pub max_attempts: i32,

    /// Original submission time, kept across retries (epoch ms)
    pub enqueued_at: i64,
    /// Earliest time the job may be claimed again (epoch ms)
    pub available_at: i64,
    pub claimed_at: Option<i64>,
    pub claimed_by: Option<String>,
    pub finished_at: Option<i64>,

    pub correlation_id: Option<String>,
    pub outcome: Option<EnrollmentOutcome>,
    pub failure: Option<JobFailure>,
    pub last_error: Option<String>,
}

impl EnrollmentJob {
    /// Create a new waiting job
    ///
    /// # Arguments
    ///
    /// * `id` - Unique job ID (injected, not generated)
    /// * `student_id` / `course_id` - The enrollment intent
    /// * `enqueued_at` - Submission timestamp in epoch ms (injected, not system time)
    /// * `max_attempts` - Attempt ceiling for transient failures
    pub fn new(
        id: impl Into<String>,
        student_id: StudentId,
        course_id: CourseId,
        enqueued_at: i64,
        max_attempts: i32,
    ) -> Self {
        Self {
            id: id.into(),
            student_id,
            course_id,
            state: JobState::Waiting,
            attempts: 0,
            max_attempts,
            enqueued_at,
            available_at: enqueued_at,
            claimed_at: None,
            claimed_by: None,
            finished_at: None,
            correlation_id: None,
            outcome: None,
            failure: None,
            last_error: None,
        }
    }

    /// Create a job with a deterministic ID and timestamp (tests only)
    ///
    /// IDs count up as `test-1`, `test-2`, ...; timestamps start at 1000 and
    /// step by 1000.
    pub fn new_test(student_id: StudentId, course_id: CourseId) -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static TEST_COUNTER: AtomicU64 = AtomicU64::new(1);

        let counter = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        Self::new(
            format!("test-{}", counter),
            student_id,
            course_id,
            (counter * 1000) as i64,
            3,
        )
    }

    fn invalid(&self, to: &str) -> DomainError {
        DomainError::InvalidStateTransition {
            entity: "job",
            from: self.state.to_string(),
            to: to.to_string(),
        }
    }

    pub fn has_attempts_left(&self) -> bool {
        self.attempts < self.max_attempts
    }

    /// WAITING | STALLED -> ACTIVE; every claim consumes one attempt
    pub fn claim(&mut self, worker_id: &str, now_millis: i64) -> Result<()> {
        if !self.state.is_claimable() {
            return Err(self.invalid("ACTIVE"));
        }
        self.state = JobState::Active;
        self.attempts += 1;
        self.claimed_at = Some(now_millis);
        self.claimed_by = Some(worker_id.to_string());
        Ok(())
    }

    /// ACTIVE -> COMPLETED
    pub fn complete(&mut self, outcome: EnrollmentOutcome, now_millis: i64) -> Result<()> {
        if self.state != JobState::Active {
            return Err(self.invalid("COMPLETED"));
        }
        self.state = JobState::Completed;
        self.outcome = Some(outcome);
        self.finished_at = Some(now_millis);
        Ok(())
    }

    /// ACTIVE -> FAILED
    pub fn fail(&mut self, failure: JobFailure, now_millis: i64) -> Result<()> {
        if self.state != JobState::Active {
            return Err(self.invalid("FAILED"));
        }
        self.last_error = Some(failure.reason.clone());
        self.state = JobState::Failed;
        self.failure = Some(failure);
        self.finished_at = Some(now_millis);
        Ok(())
    }

    /// ACTIVE -> WAITING, not claimable before `available_at`
    ///
    /// `enqueued_at` is retained so the job keeps its place in line.
    pub fn retry_later(&mut self, error: impl Into<String>, available_at: i64) -> Result<()> {
        if self.state != JobState::Active {
            return Err(self.invalid("WAITING"));
        }
        self.state = JobState::Waiting;
        self.available_at = available_at;
        self.claimed_at = None;
        self.claimed_by = None;
        self.last_error = Some(error.into());
        Ok(())
    }

    /// ACTIVE -> STALLED
    pub fn mark_stalled(&mut self) -> Result<()> {
        if self.state != JobState::Active {
            return Err(self.invalid("STALLED"));
        }
        self.state = JobState::Stalled;
        Ok(())
    }

    /// FAILED -> WAITING with a fresh attempt budget (operator retry)
    pub fn requeue_failed(&mut self, now_millis: i64) -> Result<()> {
        if self.state != JobState::Failed {
            return Err(self.invalid("WAITING"));
        }
        self.state = JobState::Waiting;
        self.attempts = 0;
        self.available_at = now_millis;
        self.claimed_at = None;
        self.claimed_by = None;
        self.finished_at = None;
        self.failure = None;
        Ok(())
    }
}
