// SQLite JobQueue Implementation

use crate::error::{from_json, is_unique_violation, map_sqlx_error};
use async_trait::async_trait;
use enrollment_core::domain::{CourseId, EnrollmentJob, JobId, JobState, StudentId};
use enrollment_core::error::{AppError, Result};
use enrollment_core::port::JobQueue;
use sqlx::SqlitePool;
use tracing::debug;

pub struct SqliteJobQueue {
    pool: SqlitePool,
}

impl SqliteJobQueue {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn duplicate(job: &EnrollmentJob) -> AppError {
    AppError::AlreadyActive(format!(
        "an enrollment job is already queued for student {} and course {}",
        job.student_id, job.course_id
    ))
}

#[async_trait]
impl JobQueue for SqliteJobQueue {
    async fn enqueue(&self, job: &EnrollmentJob) -> Result<()> {
        let outcome = job.outcome.as_ref().map(serde_json::to_string).transpose()?;
        let failure = job.failure.as_ref().map(serde_json::to_string).transpose()?;

        sqlx::query(
            r#"
            INSERT INTO enrollment_jobs (
                id, student_id, course_id, state,
                attempts, max_attempts,
                enqueued_at, available_at, claimed_at, claimed_by, finished_at,
                correlation_id, outcome, failure, last_error
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.id)
        .bind(job.student_id)
        .bind(job.course_id)
        .bind(job.state.to_string())
        .bind(job.attempts)
        .bind(job.max_attempts)
        .bind(job.enqueued_at)
        .bind(job.available_at)
        .bind(job.claimed_at)
        .bind(&job.claimed_by)
        .bind(job.finished_at)
        .bind(&job.correlation_id)
        .bind(outcome)
        .bind(failure)
        .bind(&job.last_error)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)
        .map_err(|e| if is_unique_violation(&e) { duplicate(job) } else { e })?;

        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<EnrollmentJob>> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM enrollment_jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(JobRow::into_job).transpose()
    }

    async fn find_active_for_pair(
        &self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> Result<Option<EnrollmentJob>> {
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT * FROM enrollment_jobs
            WHERE student_id = ? AND course_id = ?
              AND state IN ('WAITING', 'ACTIVE', 'STALLED')
            LIMIT 1
            "#,
        )
        .bind(student_id)
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(JobRow::into_job).transpose()
    }

    async fn claim_next(&self, worker_id: &str, now_millis: i64) -> Result<Option<EnrollmentJob>> {
        // Single statement: select and claim cannot interleave with another worker
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            UPDATE enrollment_jobs
            SET state = 'ACTIVE', claimed_at = ?, claimed_by = ?, attempts = attempts + 1
            WHERE id = (
                SELECT id FROM enrollment_jobs
                WHERE state IN ('WAITING', 'STALLED') AND available_at <= ?
                ORDER BY enqueued_at ASC, id ASC
                LIMIT 1
            )
            RETURNING *
            "#,
        )
        .bind(now_millis)
        .bind(worker_id)
        .bind(now_millis)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(JobRow::into_job).transpose()
    }

    async fn release(&self, job: &EnrollmentJob, claimed_by: &str) -> Result<()> {
        let outcome = job.outcome.as_ref().map(serde_json::to_string).transpose()?;
        let failure = job.failure.as_ref().map(serde_json::to_string).transpose()?;

        let result = sqlx::query(
            r#"
            UPDATE enrollment_jobs
            SET state = ?, available_at = ?, claimed_at = ?, claimed_by = ?,
                finished_at = ?, outcome = ?, failure = ?, last_error = ?
            WHERE id = ? AND state = 'ACTIVE' AND claimed_by = ? AND attempts = ?
            "#,
        )
        .bind(job.state.to_string())
        .bind(job.available_at)
        .bind(job.claimed_at)
        .bind(&job.claimed_by)
        .bind(job.finished_at)
        .bind(outcome)
        .bind(failure)
        .bind(&job.last_error)
        .bind(&job.id)
        .bind(claimed_by)
        .bind(job.attempts)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(AppError::InvalidState(format!(
                "job {} is no longer claimed by {} (attempt {})",
                job.id, claimed_by, job.attempts
            )));
        }
        Ok(())
    }

    async fn remove_waiting(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM enrollment_jobs WHERE id = ? AND state = 'WAITING'")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn requeue_failed(&self, job: &EnrollmentJob) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE enrollment_jobs
            SET state = ?, attempts = ?, available_at = ?, claimed_at = NULL, claimed_by = NULL,
                finished_at = NULL, outcome = NULL, failure = NULL, last_error = ?
            WHERE id = ? AND state = 'FAILED'
            "#,
        )
        .bind(job.state.to_string())
        .bind(job.attempts)
        .bind(job.available_at)
        .bind(&job.last_error)
        .bind(&job.id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)
        .map_err(|e| if is_unique_violation(&e) { duplicate(job) } else { e })?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_stalled(&self, cutoff_millis: i64) -> Result<Vec<JobId>> {
        let ids: Vec<String> = sqlx::query_scalar(
            r#"
            UPDATE enrollment_jobs
            SET state = 'STALLED'
            WHERE state = 'ACTIVE' AND claimed_at < ?
            RETURNING id
            "#,
        )
        .bind(cutoff_millis)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if !ids.is_empty() {
            debug!(count = ids.len(), cutoff_millis, "Marked stalled jobs");
        }
        Ok(ids)
    }

    async fn count_by_state(&self, state: JobState) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM enrollment_jobs WHERE state = ?")
            .bind(state.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }

    async fn count_delayed(&self, now_millis: i64) -> Result<i64> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM enrollment_jobs WHERE state = 'WAITING' AND available_at > ?",
        )
        .bind(now_millis)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)
    }

    async fn count_ahead(&self, job: &EnrollmentJob) -> Result<i64> {
        sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM enrollment_jobs
            WHERE state IN ('WAITING', 'STALLED')
              AND (enqueued_at < ?1 OR (enqueued_at = ?1 AND id < ?2))
            "#,
        )
        .bind(job.enqueued_at)
        .bind(&job.id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)
    }

    async fn purge_finished(&self, state: JobState, older_than_millis: i64) -> Result<u64> {
        if !state.is_terminal() {
            return Err(AppError::Validation(format!(
                "only terminal jobs can be purged, got {}",
                state
            )));
        }

        let result =
            sqlx::query("DELETE FROM enrollment_jobs WHERE state = ? AND finished_at < ?")
                .bind(state.to_string())
                .bind(older_than_millis)
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }

    async fn find_by_state(&self, state: JobState) -> Result<Vec<EnrollmentJob>> {
        let rows: Vec<JobRow> = sqlx::query_as(
            "SELECT * FROM enrollment_jobs WHERE state = ? ORDER BY enqueued_at ASC, id ASC",
        )
        .bind(state.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(JobRow::into_job).collect()
    }
}

#[derive(sqlx::FromRow)]
struct JobRow {
    id: String,
    student_id: i64,
    course_id: i64,
    state: String,
    attempts: i32,
    max_attempts: i32,
    enqueued_at: i64,
    available_at: i64,
    claimed_at: Option<i64>,
    claimed_by: Option<String>,
    finished_at: Option<i64>,
    correlation_id: Option<String>,
    outcome: Option<String>,
    failure: Option<String>,
    last_error: Option<String>,
}

impl JobRow {
    fn into_job(self) -> Result<EnrollmentJob> {
        Ok(EnrollmentJob {
            state: self.state.parse()?,
            outcome: from_json(self.outcome.as_deref())?,
            failure: from_json(self.failure.as_deref())?,
            id: self.id,
            student_id: self.student_id,
            course_id: self.course_id,
            attempts: self.attempts,
            max_attempts: self.max_attempts,
            enqueued_at: self.enqueued_at,
            available_at: self.available_at,
            claimed_at: self.claimed_at,
            claimed_by: self.claimed_by,
            finished_at: self.finished_at,
            correlation_id: self.correlation_id,
            last_error: self.last_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations};
    use enrollment_core::domain::{
        EnrollmentOutcome, EnrollmentStatus, FailureKind, JobFailure,
    };
    use tokio_test::{assert_err, assert_ok};

    async fn setup_queue() -> SqliteJobQueue {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        SqliteJobQueue::new(pool)
    }

    fn job(id: &str, student: i64, course: i64, enqueued_at: i64) -> EnrollmentJob {
        EnrollmentJob::new(id, student, course, enqueued_at, 3)
    }

    #[tokio::test]
    async fn test_enqueue_and_find() {
        let queue = setup_queue().await;
        let mut j = job("a", 1, 10, 1_000);
        j.correlation_id = Some("req-1".to_string());
        queue.enqueue(&j).await.unwrap();

        let found = queue.find_by_id("a").await.unwrap().unwrap();
        assert_eq!(found, j);
        assert!(queue.find_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_pair_is_already_active() {
        let queue = setup_queue().await;
        queue.enqueue(&job("a", 1, 10, 1_000)).await.unwrap();

        let err = queue.enqueue(&job("b", 1, 10, 2_000)).await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyActive(_)));

        // Another course for the same student is fine
        queue.enqueue(&job("c", 1, 11, 2_000)).await.unwrap();
    }

    #[tokio::test]
    async fn test_claim_is_fifo_and_respects_available_at() {
        let queue = setup_queue().await;
        let mut later = job("later", 2, 10, 500);
        later.available_at = 10_000;
        queue.enqueue(&later).await.unwrap();
        queue.enqueue(&job("first", 1, 10, 1_000)).await.unwrap();
        queue.enqueue(&job("second", 3, 10, 2_000)).await.unwrap();

        let claimed = queue.claim_next("w1", 5_000).await.unwrap().unwrap();
        assert_eq!(claimed.id, "first");
        assert_eq!(claimed.state, JobState::Active);
        assert_eq!(claimed.attempts, 1);
        assert_eq!(claimed.claimed_by.as_deref(), Some("w1"));

        let claimed = queue.claim_next("w2", 5_000).await.unwrap().unwrap();
        assert_eq!(claimed.id, "second");

        // Backoff not elapsed yet
        assert!(queue.claim_next("w3", 5_000).await.unwrap().is_none());
        let claimed = queue.claim_next("w3", 10_000).await.unwrap().unwrap();
        assert_eq!(claimed.id, "later");
    }

    #[tokio::test]
    async fn test_count_delayed_tracks_backoff() {
        let queue = setup_queue().await;
        let mut backing_off = job("retry", 1, 10, 500);
        backing_off.available_at = 10_000;
        assert_ok!(queue.enqueue(&backing_off).await);
        assert_ok!(queue.enqueue(&job("ready", 2, 10, 1_000)).await);

        assert_eq!(assert_ok!(queue.count_delayed(5_000).await), 1);
        assert_eq!(assert_ok!(queue.count_by_state(JobState::Waiting).await), 2);
        assert_eq!(assert_ok!(queue.count_delayed(10_000).await), 0);
    }

    #[tokio::test]
    async fn test_release_requires_current_claim() {
        let queue = setup_queue().await;
        queue.enqueue(&job("a", 1, 10, 1_000)).await.unwrap();
        let mut claimed = queue.claim_next("w1", 2_000).await.unwrap().unwrap();

        claimed
            .complete(
                EnrollmentOutcome {
                    enrollment_id: 7,
                    status: EnrollmentStatus::Confirmed,
                    waitlist_position: None,
                },
                3_000,
            )
            .unwrap();

        let err = queue.release(&claimed, "w2").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));

        queue.release(&claimed, "w1").await.unwrap();
        let stored = queue.find_by_id("a").await.unwrap().unwrap();
        assert_eq!(stored.state, JobState::Completed);
        assert_eq!(stored.outcome.unwrap().enrollment_id, 7);

        // Already released
        assert_err!(queue.release(&claimed, "w1").await);
    }

    #[tokio::test]
    async fn test_stalled_job_is_reclaimed_and_old_claim_is_fenced() {
        let queue = setup_queue().await;
        queue.enqueue(&job("a", 1, 10, 1_000)).await.unwrap();
        let mut first = queue.claim_next("w1", 2_000).await.unwrap().unwrap();

        let stalled = queue.mark_stalled(2_500).await.unwrap();
        assert_eq!(stalled, vec!["a".to_string()]);
        assert_eq!(queue.count_by_state(JobState::Stalled).await.unwrap(), 1);

        let second = queue.claim_next("w2", 3_000).await.unwrap().unwrap();
        assert_eq!(second.attempts, 2);

        first
            .fail(JobFailure::new(FailureKind::Internal, "late"), 4_000)
            .unwrap();
        assert!(matches!(
            queue.release(&first, "w1").await,
            Err(AppError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_remove_waiting_only() {
        let queue = setup_queue().await;
        queue.enqueue(&job("a", 1, 10, 1_000)).await.unwrap();
        queue.enqueue(&job("b", 2, 10, 2_000)).await.unwrap();
        queue.claim_next("w1", 3_000).await.unwrap();

        assert!(!queue.remove_waiting("a").await.unwrap());
        assert!(queue.remove_waiting("b").await.unwrap());
        assert!(queue.find_by_id("b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_requeue_failed_and_dedupe() {
        let queue = setup_queue().await;
        queue.enqueue(&job("a", 1, 10, 1_000)).await.unwrap();
        let mut claimed = queue.claim_next("w1", 2_000).await.unwrap().unwrap();
        claimed
            .fail(JobFailure::new(FailureKind::RetriesExhausted, "locked"), 3_000)
            .unwrap();
        queue.release(&claimed, "w1").await.unwrap();

        // A new submission for the same pair now blocks the requeue
        queue.enqueue(&job("b", 1, 10, 4_000)).await.unwrap();
        let mut retried = queue.find_by_id("a").await.unwrap().unwrap();
        retried.requeue_failed(5_000).unwrap();
        assert!(matches!(
            queue.requeue_failed(&retried).await,
            Err(AppError::AlreadyActive(_))
        ));

        queue.remove_waiting("b").await.unwrap();
        assert!(queue.requeue_failed(&retried).await.unwrap());
        let stored = queue.find_by_id("a").await.unwrap().unwrap();
        assert_eq!(stored.state, JobState::Waiting);
        assert_eq!(stored.attempts, 0);
        assert!(stored.failure.is_none());
    }

    #[tokio::test]
    async fn test_count_ahead() {
        let queue = setup_queue().await;
        for (i, id) in ["a", "b", "c"].iter().enumerate() {
            queue
                .enqueue(&job(id, i as i64 + 1, 10, 1_000 * (i as i64 + 1)))
                .await
                .unwrap();
        }
        let c = queue.find_by_id("c").await.unwrap().unwrap();
        assert_eq!(queue.count_ahead(&c).await.unwrap(), 2);

        queue.claim_next("w1", 5_000).await.unwrap();
        assert_eq!(queue.count_ahead(&c).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_purge_finished() {
        let queue = setup_queue().await;
        queue.enqueue(&job("a", 1, 10, 1_000)).await.unwrap();
        let mut claimed = queue.claim_next("w1", 2_000).await.unwrap().unwrap();
        claimed
            .fail(JobFailure::new(FailureKind::Rejected, "prereq"), 3_000)
            .unwrap();
        queue.release(&claimed, "w1").await.unwrap();

        assert_eq!(queue.purge_finished(JobState::Failed, 3_000).await.unwrap(), 0);
        assert_eq!(queue.purge_finished(JobState::Failed, 3_001).await.unwrap(), 1);
        assert!(queue.purge_finished(JobState::Waiting, 9_999).await.is_err());
    }
}
