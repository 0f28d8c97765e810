// Enqueue Use Case

use crate::application::worker::constants::MAX_CORRELATION_ID_LEN;
use crate::domain::{CourseId, EnrollmentJob, JobId, JobState, StudentId};
use crate::error::{AppError, Result};
use crate::port::{IdProvider, JobQueue, TimeProvider};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Enrollment submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub student_id: StudentId,
    pub course_id: CourseId,

    #[serde(default)]
    pub correlation_id: Option<String>,
}

/// Handle returned immediately on submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitReceipt {
    pub job_id: JobId,
    pub enqueued_at: i64,
    pub estimated_wait_secs: i64,
}

/// Queue parameters applied to every new job
#[derive(Debug, Clone, Copy)]
pub struct EnqueueSettings {
    pub max_attempts: i32,
    pub seconds_per_job: i64,
}

pub fn validate_request(req: &SubmitRequest) -> Result<()> {
    if req.student_id <= 0 {
        return Err(AppError::Validation(format!(
            "student_id must be positive, got {}",
            req.student_id
        )));
    }
    if req.course_id <= 0 {
        return Err(AppError::Validation(format!(
            "course_id must be positive, got {}",
            req.course_id
        )));
    }
    if let Some(correlation_id) = &req.correlation_id {
        if correlation_id.is_empty() {
            return Err(AppError::Validation(
                "correlation_id cannot be empty".to_string(),
            ));
        }
        if correlation_id.len() > MAX_CORRELATION_ID_LEN {
            return Err(AppError::Validation(format!(
                "correlation_id too long (max {} chars)",
                MAX_CORRELATION_ID_LEN
            )));
        }
        if correlation_id.chars().any(char::is_control) {
            return Err(AppError::Validation(
                "correlation_id contains control characters".to_string(),
            ));
        }
    }
    Ok(())
}

/// Execute enqueue use case
///
/// No capacity or rule checks happen here; the processor re-reads all state
/// when it claims the job.
///
/// # Arguments
///
/// * `queue` - Job queue
/// * `id_provider` - ID generator (injected for determinism)
/// * `time_provider` - Time provider (injected for determinism)
/// * `settings` - Attempt ceiling and wait estimate factor
/// * `req` - Submission
pub async fn execute(
    queue: &dyn JobQueue,
    id_provider: &dyn IdProvider,
    time_provider: &dyn TimeProvider,
    settings: EnqueueSettings,
    req: SubmitRequest,
) -> Result<SubmitReceipt> {
    validate_request(&req)?;

    if let Some(existing) = queue
        .find_active_for_pair(req.student_id, req.course_id)
        .await?
    {
        return Err(already_active(&existing));
    }

    // Jobs already in line determine the wait estimate
    let waiting = queue.count_by_state(JobState::Waiting).await?;
    let active = queue.count_by_state(JobState::Active).await?;

    let mut job = EnrollmentJob::new(
        id_provider.generate_id(),
        req.student_id,
        req.course_id,
        time_provider.now_millis(),
        settings.max_attempts,
    );
    job.correlation_id = req.correlation_id;

    // The store's unique index settles a race with a concurrent duplicate
    queue.enqueue(&job).await?;

    let estimated_wait_secs = (waiting + active) * settings.seconds_per_job;
    info!(
        job_id = %job.id,
        student_id = job.student_id,
        course_id = job.course_id,
        estimated_wait_secs,
        "Enrollment job enqueued"
    );

    Ok(SubmitReceipt {
        job_id: job.id,
        enqueued_at: job.enqueued_at,
        estimated_wait_secs,
    })
}

pub(crate) fn already_active(existing: &EnrollmentJob) -> AppError {
    AppError::AlreadyActive(format!(
        "job {} is already {} for student {} and course {}",
        existing.id,
        existing.state.to_string().to_lowercase(),
        existing.student_id,
        existing.course_id
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::id_provider::SequentialIdProvider;
    use crate::port::job_queue::MockJobQueue;
    use crate::port::time_provider::ManualTimeProvider;
    use mockall::predicate::eq;

    const SETTINGS: EnqueueSettings = EnqueueSettings {
        max_attempts: 3,
        seconds_per_job: 2,
    };

    fn request(correlation_id: Option<&str>) -> SubmitRequest {
        SubmitRequest {
            student_id: 1,
            course_id: 2,
            correlation_id: correlation_id.map(str::to_string),
        }
    }

    #[test]
    fn test_validate_ids_positive() {
        let mut req = request(None);
        req.student_id = 0;
        let err = validate_request(&req).unwrap_err();
        assert!(err.to_string().contains("student_id"));
    }

    #[test]
    fn test_validate_correlation_id() {
        assert!(validate_request(&request(Some("req-1"))).is_ok());
        assert!(validate_request(&request(Some(""))).is_err());
        let long = "a".repeat(MAX_CORRELATION_ID_LEN + 1);
        let err = validate_request(&request(Some(&long))).unwrap_err();
        assert!(err.to_string().contains("too long"));
        let err = validate_request(&request(Some("bad\nid"))).unwrap_err();
        assert!(err.to_string().contains("control"));
    }

    #[tokio::test]
    async fn test_enqueue_estimates_wait() {
        let mut queue = MockJobQueue::new();
        queue.expect_find_active_for_pair().returning(|_, _| Ok(None));
        queue
            .expect_count_by_state()
            .with(eq(JobState::Waiting))
            .returning(|_| Ok(4));
        queue
            .expect_count_by_state()
            .with(eq(JobState::Active))
            .returning(|_| Ok(1));
        queue
            .expect_enqueue()
            .withf(|job| {
                job.state == JobState::Waiting
                    && job.attempts == 0
                    && job.max_attempts == 3
                    && job.correlation_id.as_deref() == Some("req-9")
            })
            .times(1)
            .returning(|_| Ok(()));

        let receipt = execute(
            &queue,
            &SequentialIdProvider::new("job"),
            &ManualTimeProvider::new(5_000),
            SETTINGS,
            request(Some("req-9")),
        )
        .await
        .unwrap();

        assert_eq!(receipt.job_id, "job-1");
        assert_eq!(receipt.enqueued_at, 5_000);
        assert_eq!(receipt.estimated_wait_secs, 10);
    }

    #[tokio::test]
    async fn test_duplicate_submission_is_already_active() {
        let mut queue = MockJobQueue::new();
        queue
            .expect_find_active_for_pair()
            .returning(|s, c| Ok(Some(EnrollmentJob::new("existing", s, c, 1, 3))));
        queue.expect_enqueue().never();

        let err = execute(
            &queue,
            &SequentialIdProvider::new("job"),
            &ManualTimeProvider::new(5_000),
            SETTINGS,
            request(None),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::AlreadyActive(ref m) if m.contains("existing")));
    }
}
