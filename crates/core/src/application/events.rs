// Typed job lifecycle events

use crate::domain::{EnrollmentOutcome, JobFailure, JobId};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JobEvent {
    Claimed {
        job_id: JobId,
        worker_id: String,
        attempt: i32,
    },
    Completed {
        job_id: JobId,
        outcome: EnrollmentOutcome,
    },
    Retrying {
        job_id: JobId,
        attempt: i32,
        delay_ms: i64,
        error: String,
    },
    Failed {
        job_id: JobId,
        failure: JobFailure,
    },
    Stalled {
        job_id: JobId,
    },
}

impl JobEvent {
    pub fn job_id(&self) -> &str {
        match self {
            JobEvent::Claimed { job_id, .. }
            | JobEvent::Completed { job_id, .. }
            | JobEvent::Retrying { job_id, .. }
            | JobEvent::Failed { job_id, .. }
            | JobEvent::Stalled { job_id } => job_id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobEvent::Completed { .. } | JobEvent::Failed { .. })
    }
}

/// Broadcast hub shared by workers, the stall monitor and status waiters
#[derive(Clone)]
pub struct JobEvents {
    tx: broadcast::Sender<JobEvent>,
}

impl JobEvents {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish without waiting; events with no subscriber are dropped
    pub fn publish(&self, event: JobEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.tx.subscribe()
    }
}

impl Default for JobEvents {
    fn default() -> Self {
        Self::new(crate::application::worker::constants::EVENT_CHANNEL_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_see_published_events() {
        let events = JobEvents::new(8);
        let mut rx = events.subscribe();
        events.publish(JobEvent::Stalled {
            job_id: "j-1".to_string(),
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.job_id(), "j-1");
        assert!(!event.is_terminal());
    }

    #[test]
    fn test_publish_without_subscribers_is_harmless() {
        JobEvents::new(1).publish(JobEvent::Stalled {
            job_id: "nobody-listens".to_string(),
        });
    }
}
