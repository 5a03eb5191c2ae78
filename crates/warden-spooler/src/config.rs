//! Spooler tuning knobs.

use std::time::Duration;

/// Default lease length.
pub const DEFAULT_LOCK_WAIT: Duration = Duration::from_secs(30);
/// Default number of events pulled per query.
pub const DEFAULT_BATCH_SIZE: usize = 100;
/// Default ceiling for transient-failure backoff.
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Settings shared by every view loop of one spooler instance.
#[derive(Debug, Clone)]
pub struct SpoolerConfig {
    /// Identity of this instance in the lease table.
    pub holder_id: String,
    /// How long a renewed lease stays live.
    pub lock_wait: Duration,
    /// Page size for event queries.
    pub batch_size: usize,
    /// Upper bound for the sleep after consecutive infrastructure failures.
    pub max_backoff: Duration,
}

impl SpoolerConfig {
    /// Creates a config for `holder_id` with default timings.
    #[must_use]
    pub fn new(holder_id: impl Into<String>) -> Self {
        Self {
            holder_id: holder_id.into(),
            lock_wait: DEFAULT_LOCK_WAIT,
            batch_size: DEFAULT_BATCH_SIZE,
            max_backoff: DEFAULT_MAX_BACKOFF,
        }
    }

    /// Overrides the lease length.
    #[must_use]
    pub fn with_lock_wait(mut self, lock_wait: Duration) -> Self {
        self.lock_wait = lock_wait;
        self
    }

    /// Overrides the page size. Zero is bumped to one.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Overrides the backoff ceiling.
    #[must_use]
    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    /// Interval after which an in-progress batch re-renews its lease.
    #[must_use]
    pub fn heartbeat_interval(&self) -> Duration {
        self.lock_wait / 3
    }
}
