// Queue Maintenance - purge finished jobs past their retention

use crate::application::worker::ShutdownToken;
use crate::domain::JobState;
use crate::error::Result;
use crate::port::{JobQueue, TimeProvider};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{error, info};

/// Rows removed by one maintenance run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeStats {
    pub completed: u64,
    pub failed: u64,
}

/// Maintenance scheduler
///
/// Completed jobs are kept for `completed_retention_ms`, failed jobs for
/// `failed_retention_ms`; older ones are deleted.
pub struct MaintenanceScheduler {
    queue: Arc<dyn JobQueue>,
    time_provider: Arc<dyn TimeProvider>,
    completed_retention_ms: i64,
    failed_retention_ms: i64,
    interval: Duration,
}

impl MaintenanceScheduler {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        time_provider: Arc<dyn TimeProvider>,
        completed_retention_ms: i64,
        failed_retention_ms: i64,
        interval: Duration,
    ) -> Self {
        Self {
            queue,
            time_provider,
            completed_retention_ms,
            failed_retention_ms,
            interval,
        }
    }

    /// Run maintenance loop (background task)
    pub async fn run(self: Arc<Self>, mut shutdown: ShutdownToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            completed_retention_ms = self.completed_retention_ms,
            failed_retention_ms = self.failed_retention_ms,
            "Maintenance scheduler started"
        );

        let mut tick = interval(self.interval);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    if let Err(e) = self.run_now().await {
                        error!(error = ?e, "Scheduled maintenance failed");
                    }
                }
                _ = shutdown.wait() => {
                    info!("Maintenance scheduler stopped");
                    break;
                }
            }
        }
    }

    /// Run maintenance immediately (for manual trigger)
    pub async fn run_now(&self) -> Result<PurgeStats> {
        let now = self.time_provider.now_millis();

        let completed = self
            .queue
            .purge_finished(JobState::Completed, now - self.completed_retention_ms)
            .await?;
        let failed = self
            .queue
            .purge_finished(JobState::Failed, now - self.failed_retention_ms)
            .await?;

        let stats = PurgeStats { completed, failed };
        info!(
            purged_completed = stats.completed,
            purged_failed = stats.failed,
            "Maintenance completed"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::job_queue::MockJobQueue;
    use crate::port::time_provider::ManualTimeProvider;
    use mockall::predicate::eq;

    #[tokio::test]
    async fn test_retention_windows() {
        let day = 24 * 60 * 60 * 1000;
        let now = 30 * day;

        let mut queue = MockJobQueue::new();
        queue
            .expect_purge_finished()
            .with(eq(JobState::Completed), eq(now - day))
            .times(1)
            .returning(|_, _| Ok(4));
        queue
            .expect_purge_finished()
            .with(eq(JobState::Failed), eq(now - 7 * day))
            .times(1)
            .returning(|_, _| Ok(1));

        let scheduler = MaintenanceScheduler::new(
            Arc::new(queue),
            Arc::new(ManualTimeProvider::new(now)),
            day,
            7 * day,
            Duration::from_secs(3600),
        );

        let stats = scheduler.run_now().await.unwrap();
        assert_eq!(stats, PurgeStats { completed: 4, failed: 1 });
    }
}
