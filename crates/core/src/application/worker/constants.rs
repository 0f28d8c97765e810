// Engine constants (no magic values in the loops)
use std::time::Duration;

/// Sleep duration when no job is claimable (100ms)
pub const IDLE_SLEEP_DURATION: Duration = Duration::from_millis(100);

/// Sleep duration after a worker error before the next claim (1s)
pub const ERROR_RECOVERY_SLEEP_DURATION: Duration = Duration::from_secs(1);

/// Fallback re-read interval while waiting for a job to finish
pub const STATUS_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Buffered lifecycle events before slow subscribers start lagging
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Upper bound for caller-supplied correlation ids
pub const MAX_CORRELATION_ID_LEN: usize = 128;
