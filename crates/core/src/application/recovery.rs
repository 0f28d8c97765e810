// Stall detection and crash recovery
use crate::application::events::{JobEvent, JobEvents};
use crate::application::worker::ShutdownToken;
use crate::domain::JobState;
use crate::error::Result;
use crate::port::{JobQueue, TimeProvider};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{error, info, warn};

/// Finds ACTIVE jobs whose worker stopped reporting and marks them STALLED
///
/// A stalled job is claimable again; reclaiming it consumes an attempt.
pub struct RecoveryService {
    queue: Arc<dyn JobQueue>,
    time_provider: Arc<dyn TimeProvider>,
    events: JobEvents,
    stall_timeout_ms: i64,
}

impl RecoveryService {
    /// Create a new recovery service
    ///
    /// # Arguments
    /// * `queue` - Job queue
    /// * `time_provider` - Time provider
    /// * `events` - Lifecycle event hub (publishes `Stalled`)
    /// * `stall_timeout_ms` - Claims older than this are considered stalled
    pub fn new(
        queue: Arc<dyn JobQueue>,
        time_provider: Arc<dyn TimeProvider>,
        events: JobEvents,
        stall_timeout_ms: i64,
    ) -> Self {
        Self {
            queue,
            time_provider,
            events,
            stall_timeout_ms,
        }
    }

    /// Mark every ACTIVE job as stalled
    ///
    /// Runs on start-up before workers exist, so any ACTIVE claim belongs to
    /// a process that is gone.
    pub async fn recover_on_startup(&self) -> Result<usize> {
        let active = self.queue.count_by_state(JobState::Active).await?;
        if active == 0 {
            return Ok(0);
        }
        let cutoff = self.time_provider.now_millis() + 1;
        let recovered = self.stall_claims_before(cutoff).await?;
        info!(recovered, "Start-up recovery complete");
        Ok(recovered)
    }

    /// Mark ACTIVE jobs claimed more than `stall_timeout_ms` ago as stalled
    pub async fn check_stalled(&self) -> Result<usize> {
        let cutoff = self.time_provider.now_millis() - self.stall_timeout_ms;
        self.stall_claims_before(cutoff).await
    }

    async fn stall_claims_before(&self, cutoff: i64) -> Result<usize> {
        let stalled = self.queue.mark_stalled(cutoff).await?;
        for job_id in &stalled {
            warn!(job_id = %job_id, cutoff, "Job stalled, eligible for reclaim");
            self.events.publish(JobEvent::Stalled {
                job_id: job_id.clone(),
            });
        }
        Ok(stalled.len())
    }

    /// Periodic stall monitor (spawn with `tokio::spawn`)
    pub async fn run(self: Arc<Self>, every: Duration, mut shutdown: ShutdownToken) {
        info!(
            interval_ms = every.as_millis() as u64,
            stall_timeout_ms = self.stall_timeout_ms,
            "Stall monitor started"
        );
        let mut tick = interval(every);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    if let Err(e) = self.check_stalled().await {
                        error!(error = %e, "Stall check failed");
                    }
                }
                _ = shutdown.wait() => {
                    info!("Stall monitor stopped");
                    break;
                }
            }
        }
    }
}
