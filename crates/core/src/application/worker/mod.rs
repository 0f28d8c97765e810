// Worker - claim, process, record

pub mod constants;
mod shutdown;

use constants::*;
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use crate::application::events::{JobEvent, JobEvents};
use crate::application::processor::EnrollmentProcessor;
use crate::application::retry::{RetryDecision, RetryPolicy};
use crate::domain::{EnrollmentJob, FailureKind, JobFailure};
use crate::error::{AppError, Result};
use crate::port::{JobQueue, TimeProvider};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// One worker slot: holds at most one claim at a time
pub struct Worker {
    id: String,
    queue: Arc<dyn JobQueue>,
    processor: Arc<EnrollmentProcessor>,
    retry_policy: Arc<RetryPolicy>,
    time_provider: Arc<dyn TimeProvider>,
    events: JobEvents,
}

impl Worker {
    pub fn new(
        id: impl Into<String>,
        queue: Arc<dyn JobQueue>,
        processor: Arc<EnrollmentProcessor>,
        retry_policy: Arc<RetryPolicy>,
        time_provider: Arc<dyn TimeProvider>,
        events: JobEvents,
    ) -> Self {
        Self {
            id: id.into(),
            queue,
            processor,
            retry_policy,
            time_provider,
            events,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Run worker loop with graceful shutdown support
    ///
    /// Shutdown is only observed between jobs; a job in flight finishes.
    pub async fn run(&self, mut shutdown: ShutdownToken) -> Result<()> {
        info!(worker_id = %self.id, "Worker started");
        loop {
            if shutdown.is_shutdown() {
                break;
            }
            match self.process_next_job().await {
                Ok(true) => {}
                Ok(false) => {
                    tokio::select! {
                        _ = sleep(IDLE_SLEEP_DURATION) => {},
                        _ = shutdown.wait() => break,
                    }
                }
                Err(e) => {
                    error!(worker_id = %self.id, error = %e, "Worker error");
                    tokio::select! {
                        _ = sleep(ERROR_RECOVERY_SLEEP_DURATION) => {},
                        _ = shutdown.wait() => break,
                    }
                }
            }
        }
        info!(worker_id = %self.id, "Worker stopped");
        Ok(())
    }

    /// Claim and process one job (returns true if a job was claimed)
    pub async fn process_next_job(&self) -> Result<bool> {
        let now = self.time_provider.now_millis();
        let Some(mut job) = self.queue.claim_next(&self.id, now).await? else {
            return Ok(false);
        };

        info!(
            worker_id = %self.id,
            job_id = %job.id,
            student_id = job.student_id,
            course_id = job.course_id,
            attempt = job.attempts,
            "Processing enrollment job"
        );
        self.events.publish(JobEvent::Claimed {
            job_id: job.id.clone(),
            worker_id: self.id.clone(),
            attempt: job.attempts,
        });

        // Panic isolation: a panicking attempt fails the job, not the worker
        let processor = Arc::clone(&self.processor);
        let job_for_exec = job.clone();
        let execution = tokio::spawn(async move { processor.process(&job_for_exec).await }).await;

        let now = self.time_provider.now_millis();
        let event = match execution {
            Ok(Ok(outcome)) => {
                job.complete(outcome.clone(), now)?;
                JobEvent::Completed {
                    job_id: job.id.clone(),
                    outcome,
                }
            }
            Ok(Err(e)) => match self.retry_policy.decide(&job, &e) {
                RetryDecision::Retry(delay_ms) => {
                    job.retry_later(e.to_string(), now + delay_ms)?;
                    JobEvent::Retrying {
                        job_id: job.id.clone(),
                        attempt: job.attempts,
                        delay_ms,
                        error: e.to_string(),
                    }
                }
                RetryDecision::Fail(failure) => {
                    info!(job_id = %job.id, kind = ?failure.kind, reason = %failure.reason, "Job failed");
                    job.fail(failure.clone(), now)?;
                    JobEvent::Failed {
                        job_id: job.id.clone(),
                        failure,
                    }
                }
            },
            Err(join_err) => {
                error!(job_id = %job.id, error = %join_err, "Job processing panicked");
                let failure = JobFailure::new(
                    FailureKind::Internal,
                    format!("processing aborted: {}", join_err),
                );
                job.fail(failure.clone(), now)?;
                JobEvent::Failed {
                    job_id: job.id.clone(),
                    failure,
                }
            }
        };

        match self.queue.release(&job, &self.id).await {
            Ok(()) => self.events.publish(event),
            Err(AppError::InvalidState(reason)) => {
                warn!(
                    worker_id = %self.id,
                    job_id = %job.id,
                    reason = %reason,
                    "Claim lost before result was recorded, discarding"
                );
            }
            Err(e) => return Err(e),
        }
        Ok(true)
    }
}

/// Start `workers` on their own tasks
pub fn spawn_workers(
    workers: Vec<Worker>,
    shutdown: &ShutdownToken,
) -> Vec<JoinHandle<Result<()>>> {
    workers
        .into_iter()
        .map(|worker| {
            let token = shutdown.clone();
            tokio::spawn(async move { worker.run(token).await })
        })
        .collect()
}
