// Job Status Tracker - read-only projection over queue state

use crate::application::events::JobEvents;
use crate::application::worker::constants::STATUS_POLL_INTERVAL;
use crate::domain::{
    CourseId, EnrollmentJob, EnrollmentOutcome, JobFailure, JobId, JobState, StudentId,
};
use crate::error::{AppError, Result};
use crate::port::JobQueue;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{sleep, Instant};

/// What a polling client sees for one job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub job_id: JobId,
    pub student_id: StudentId,
    pub course_id: CourseId,
    pub state: JobState,
    pub attempts: i32,
    pub max_attempts: i32,
    pub enqueued_at: i64,
    pub finished_at: Option<i64>,
    pub correlation_id: Option<String>,
    /// Claimable jobs ahead of this one (waiting jobs only)
    pub jobs_ahead: Option<i64>,
    /// Final enrollment status (completed jobs only)
    pub outcome: Option<EnrollmentOutcome>,
    /// Failure reason (failed jobs only)
    pub failure: Option<JobFailure>,
    pub last_error: Option<String>,
}

impl JobStatus {
    fn from_job(job: EnrollmentJob, jobs_ahead: Option<i64>) -> Self {
        Self {
            job_id: job.id,
            student_id: job.student_id,
            course_id: job.course_id,
            state: job.state,
            attempts: job.attempts,
            max_attempts: job.max_attempts,
            enqueued_at: job.enqueued_at,
            finished_at: job.finished_at,
            correlation_id: job.correlation_id,
            jobs_ahead,
            outcome: job.outcome,
            failure: job.failure,
            last_error: job.last_error,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

pub struct JobStatusTracker {
    queue: Arc<dyn JobQueue>,
    events: JobEvents,
}

impl JobStatusTracker {
    pub fn new(queue: Arc<dyn JobQueue>, events: JobEvents) -> Self {
        Self { queue, events }
    }

    pub async fn get_status(&self, job_id: &str) -> Result<JobStatus> {
        let job = self
            .queue
            .find_by_id(job_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Job {} not found", job_id)))?;

        let jobs_ahead = if job.state == JobState::Waiting {
            Some(self.queue.count_ahead(&job).await?)
        } else {
            None
        };
        Ok(JobStatus::from_job(job, jobs_ahead))
    }

    /// Wait until the job is completed or failed, or `timeout` elapses
    ///
    /// Returns the latest status either way; callers check `is_terminal`.
    /// Wakes on lifecycle events and also re-reads the queue periodically,
    /// so jobs finished by another process are noticed too.
    pub async fn wait_for_terminal(&self, job_id: &str, timeout: Duration) -> Result<JobStatus> {
        let mut rx = self.events.subscribe();
        let deadline = Instant::now() + timeout;

        loop {
            let status = self.get_status(job_id).await?;
            if status.is_terminal() || Instant::now() >= deadline {
                return Ok(status);
            }

            let wait = STATUS_POLL_INTERVAL.min(deadline.saturating_duration_since(Instant::now()));
            tokio::select! {
                event = rx.recv() => match event {
                    Ok(_) | Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => sleep(wait).await,
                },
                _ = sleep(wait) => {}
            }
        }
    }
}
