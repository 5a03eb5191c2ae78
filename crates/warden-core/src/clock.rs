//! Wall-clock abstraction.
//!
//! Event timestamps and in-memory lease expiry read time through [`Clock`] so
//! tests can pin or advance it.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

/// Abstraction over system time for deterministic behavior.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;

    /// Returns the instant `wait` from now, saturating on overflow.
    fn deadline(&self, wait: Duration) -> DateTime<Utc> {
        let now = self.now();
        TimeDelta::from_std(wait)
            .ok()
            .and_then(|delta| now.checked_add_signed(delta))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// Production clock that delegates to the system clock.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
