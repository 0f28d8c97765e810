// Enrollment Request Queue - intake and operator actions on queued jobs

pub mod enqueue;

pub use enqueue::{EnqueueSettings, SubmitReceipt, SubmitRequest};

use crate::domain::{EnrollmentJob, JobState};
use crate::error::{AppError, Result};
use crate::port::{IdProvider, JobQueue, TimeProvider};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Job counts per state
///
/// `waiting` counts claimable jobs only; WAITING jobs still serving a retry
/// backoff are reported as `delayed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub waiting: i64,
    pub delayed: i64,
    pub active: i64,
    pub completed: i64,
    pub failed: i64,
    pub stalled: i64,
    pub total: i64,
}

/// Injectable queue service shared by the API layer and tests
pub struct EnrollmentQueue {
    queue: Arc<dyn JobQueue>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
    settings: EnqueueSettings,
}

impl EnrollmentQueue {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
        settings: EnqueueSettings,
    ) -> Self {
        Self {
            queue,
            id_provider,
            time_provider,
            settings,
        }
    }

    /// Enqueue a new enrollment intent
    pub async fn submit(&self, req: SubmitRequest) -> Result<SubmitReceipt> {
        enqueue::execute(
            self.queue.as_ref(),
            self.id_provider.as_ref(),
            self.time_provider.as_ref(),
            self.settings,
            req,
        )
        .await
    }

    /// Remove a job before any worker claims it
    pub async fn cancel(&self, job_id: &str) -> Result<()> {
        if self.queue.remove_waiting(job_id).await? {
            info!(job_id = %job_id, "Waiting job cancelled");
            return Ok(());
        }

        match self.queue.find_by_id(job_id).await? {
            Some(job) => Err(AppError::InvalidState(format!(
                "job {} is {}; only waiting jobs can be cancelled",
                job.id,
                job.state.to_string().to_lowercase()
            ))),
            None => Err(AppError::NotFound(format!("Job {} not found", job_id))),
        }
    }

    /// Move a failed job back to waiting with a fresh attempt budget
    pub async fn retry_failed(&self, job_id: &str) -> Result<EnrollmentJob> {
        let mut job = self
            .queue
            .find_by_id(job_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Job {} not found", job_id)))?;

        if job.state != JobState::Failed {
            return Err(AppError::InvalidState(format!(
                "job {} is {}; only failed jobs can be retried",
                job.id,
                job.state.to_string().to_lowercase()
            )));
        }

        if let Some(existing) = self
            .queue
            .find_active_for_pair(job.student_id, job.course_id)
            .await?
        {
            return Err(enqueue::already_active(&existing));
        }

        job.requeue_failed(self.time_provider.now_millis())?;
        if !self.queue.requeue_failed(&job).await? {
            return Err(AppError::InvalidState(format!(
                "job {} changed state before it could be retried",
                job.id
            )));
        }

        info!(job_id = %job.id, "Failed job requeued");
        Ok(job)
    }

    pub async fn stats(&self) -> Result<QueueStats> {
        let mut stats = QueueStats {
            delayed: self
                .queue
                .count_delayed(self.time_provider.now_millis())
                .await?,
            ..Default::default()
        };
        for state in JobState::ALL {
            let count = self.queue.count_by_state(state).await?;
            match state {
                JobState::Waiting => stats.waiting = count - stats.delayed,
                JobState::Active => stats.active = count,
                JobState::Completed => stats.completed = count,
                JobState::Failed => stats.failed = count,
                JobState::Stalled => stats.stalled = count,
            }
            stats.total += count;
        }
        Ok(stats)
    }

    pub async fn find_job(&self, job_id: &str) -> Result<Option<EnrollmentJob>> {
        self.queue.find_by_id(job_id).await
    }
}
