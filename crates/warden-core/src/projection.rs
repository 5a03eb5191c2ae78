//! Projection handler contract.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::DomainError;
use crate::store::{EventFilter, StoredEvent};

/// A pluggable unit that folds a filtered subset of the log into one view.
///
/// Registering a handler with the spooler is the only way events reach a view.
/// `process` may be called again for an event it already folded (a crash
/// between fold and watermark write), so it must be idempotent.
#[async_trait]
pub trait ProjectionHandler: Send + Sync {
    /// The view this handler maintains. Also the lease key.
    fn view_model(&self) -> &str;

    /// Which events the handler needs. The spooler raises `after_position` to
    /// the view's watermark.
    fn event_query(&self) -> EventFilter;

    /// Folds one event into the view.
    ///
    /// # Errors
    ///
    /// Any error halts the current batch; the event is retried next cycle.
    async fn process(&self, event: &StoredEvent) -> Result<(), DomainError>;

    /// Floor on how often the handler is rescheduled.
    fn minimum_cycle_duration(&self) -> Duration;

    /// Clears every row of the view ahead of a full re-projection.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` on storage failure.
    async fn clear(&self) -> Result<(), DomainError> {
        Ok(())
    }
}
