// Retry policy for failed processing attempts
use crate::domain::{EnrollmentJob, FailureKind, JobFailure};
use crate::error::AppError;
use tracing::{info, warn};

/// Retry decision result
#[derive(Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the job after the backoff delay (ms)
    Retry(i64),
    /// Do not retry; the job fails with this failure
    Fail(JobFailure),
}

/// Exponential backoff over a fixed attempt ceiling
///
/// Validation and not-found errors are terminal on the first attempt.
/// Transient errors (`ConcurrentModification`, database) are retried until
/// the job's `max_attempts` is used up.
pub struct RetryPolicy {
    base_delay_ms: i64,
    backoff_factor: f64,
}

impl RetryPolicy {
    /// Create a new retry policy
    ///
    /// # Arguments
    /// * `base_delay_ms` - Delay before the second attempt
    /// * `backoff_factor` - Multiplier applied per further attempt
    pub fn new(base_delay_ms: i64, backoff_factor: f64) -> Self {
        Self {
            base_delay_ms,
            backoff_factor,
        }
    }

    /// Delay before the attempt after `attempt` (1-based)
    ///
    /// `key` seeds a ±10% jitter so concurrent losers spread out.
    pub fn backoff_delay_ms(&self, key: &str, attempt: i32) -> i64 {
        let exponent = (attempt - 1).max(0);
        let base_delay_ms = self.base_delay_ms as f64 * self.backoff_factor.powi(exponent);

        let jitter_seed = key.chars().map(|c| c as u32).sum::<u32>();
        let jitter_factor = 0.9 + ((jitter_seed % 21) as f64 / 100.0);

        (base_delay_ms * jitter_factor) as i64
    }

    /// Decide what happens to a claimed job whose attempt failed with `err`
    ///
    /// `job.attempts` already counts the attempt that just failed.
    ///
    /// Backoff formula:
    /// delay = base_delay * (backoff_factor ^ (attempts - 1)) * (1.0 ± 0.1)
    pub fn decide(&self, job: &EnrollmentJob, err: &AppError) -> RetryDecision {
        if !err.is_retryable() {
            return RetryDecision::Fail(JobFailure::new(err.failure_kind(), err.reason()));
        }

        if !job.has_attempts_left() {
            warn!(
                job_id = %job.id,
                attempts = job.attempts,
                max_attempts = job.max_attempts,
                error = %err,
                "Max retry attempts reached"
            );
            return RetryDecision::Fail(JobFailure::new(
                FailureKind::RetriesExhausted,
                format!("Gave up after {} attempts: {}", job.attempts, err.reason()),
            ));
        }

        let delay_ms = self.backoff_delay_ms(&job.id, job.attempts);

        info!(
            job_id = %job.id,
            attempt = job.attempts,
            max_attempts = job.max_attempts,
            delay_ms,
            "Scheduling retry"
        );

        RetryDecision::Retry(delay_ms)
    }
}
