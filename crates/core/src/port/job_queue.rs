// Job Queue Port (Interface)

use crate::domain::{CourseId, EnrollmentJob, JobId, JobState, StudentId};
use crate::error::Result;
use async_trait::async_trait;

/// Durable inbox of enrollment jobs
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Persist a new waiting job
    ///
    /// Fails with `AppError::AlreadyActive` when a WAITING / ACTIVE / STALLED
    /// job exists for the same (student, course) pair.
    async fn enqueue(&self, job: &EnrollmentJob) -> Result<()>;

    async fn find_by_id(&self, id: &str) -> Result<Option<EnrollmentJob>>;

    /// Non-terminal job for the pair, if any
    async fn find_active_for_pair(
        &self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> Result<Option<EnrollmentJob>>;

    /// Atomically claim the oldest claimable job available at `now`
    ///
    /// The returned job is already ACTIVE, owned by `worker_id`, with its
    /// attempt counter incremented.
    async fn claim_next(&self, worker_id: &str, now_millis: i64) -> Result<Option<EnrollmentJob>>;

    /// Persist the outcome of a claimed job
    ///
    /// Applies only while the stored row is still ACTIVE under `claimed_by`
    /// with the same attempt number; otherwise `AppError::InvalidState`.
    async fn release(&self, job: &EnrollmentJob, claimed_by: &str) -> Result<()>;

    /// Delete a job that no worker has claimed yet
    async fn remove_waiting(&self, id: &str) -> Result<bool>;

    /// Store a FAILED job that was reset to WAITING
    async fn requeue_failed(&self, job: &EnrollmentJob) -> Result<bool>;

    /// Mark ACTIVE jobs claimed before `cutoff` as STALLED
    async fn mark_stalled(&self, cutoff_millis: i64) -> Result<Vec<JobId>>;

    async fn count_by_state(&self, state: JobState) -> Result<i64>;

    /// WAITING jobs held back by a retry backoff (`available_at > now`)
    async fn count_delayed(&self, now_millis: i64) -> Result<i64>;

    /// Claimable jobs enqueued ahead of `job`
    async fn count_ahead(&self, job: &EnrollmentJob) -> Result<i64>;

    /// Delete jobs in a terminal `state` finished before `older_than`
    async fn purge_finished(&self, state: JobState, older_than_millis: i64) -> Result<u64>;

    async fn find_by_state(&self, state: JobState) -> Result<Vec<EnrollmentJob>>;
}
