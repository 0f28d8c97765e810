// Engine Configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for the enrollment engine
///
/// Deserializable so the daemon can layer it from file and environment;
/// every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Credit ceiling per student per term
    pub max_credits_per_term: i32,
    /// Attempt ceiling for transient failures
    pub max_attempts: i32,
    pub backoff_base_ms: i64,
    pub backoff_factor: f64,
    pub worker_count: usize,
    /// ACTIVE claims older than this are considered stalled
    pub stall_timeout_ms: i64,
    pub stall_check_interval_ms: u64,
    pub completed_retention_ms: i64,
    pub failed_retention_ms: i64,
    pub maintenance_interval_secs: u64,
    /// Average processing time used for wait estimates
    pub seconds_per_job: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_credits_per_term: 18,
            max_attempts: 3,
            backoff_base_ms: 2_000,
            backoff_factor: 2.0,
            worker_count: 4,
            stall_timeout_ms: 30_000,
            stall_check_interval_ms: 5_000,
            completed_retention_ms: 24 * 60 * 60 * 1000,
            failed_retention_ms: 7 * 24 * 60 * 60 * 1000,
            maintenance_interval_secs: 3_600,
            seconds_per_job: 2,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> crate::Result<()> {
        if self.max_credits_per_term <= 0 {
            return Err(crate::AppError::Config(
                "max_credits_per_term must be positive".to_string(),
            ));
        }
        if self.max_attempts < 1 {
            return Err(crate::AppError::Config(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if self.worker_count == 0 {
            return Err(crate::AppError::Config(
                "worker_count must be at least 1".to_string(),
            ));
        }
        if self.backoff_base_ms < 0 || self.stall_timeout_ms <= 0 {
            return Err(crate::AppError::Config(
                "backoff_base_ms must not be negative and stall_timeout_ms must be positive".to_string(),
            ));
        }
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(crate::AppError::Config(
                "backoff_factor must be a finite number >= 1.0".to_string(),
            ));
        }
        // Both feed tokio::time::interval, which panics on a zero period
        if self.stall_check_interval_ms == 0 {
            return Err(crate::AppError::Config(
                "stall_check_interval_ms must be positive".to_string(),
            ));
        }
        if self.maintenance_interval_secs == 0 {
            return Err(crate::AppError::Config(
                "maintenance_interval_secs must be positive".to_string(),
            ));
        }
        if self.completed_retention_ms < 0 || self.failed_retention_ms < 0 {
            return Err(crate::AppError::Config(
                "completed_retention_ms and failed_retention_ms must not be negative".to_string(),
            ));
        }
        if self.seconds_per_job < 0 {
            return Err(crate::AppError::Config(
                "seconds_per_job must not be negative".to_string(),
            ));
        }
        Ok(())
    }

    pub fn stall_check_interval(&self) -> Duration {
        Duration::from_millis(self.stall_check_interval_ms)
    }

    pub fn maintenance_interval(&self) -> Duration {
        Duration::from_secs(self.maintenance_interval_secs)
    }
}
