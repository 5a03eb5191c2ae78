//! Lease-based lock abstraction.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::DomainError;

/// Mutual exclusion keyed by view id, shared by every spooler instance.
///
/// Implementations sit on storage capable of a conditional upsert with expiry
/// and must never substitute an in-process lock for it.
#[async_trait]
pub trait Locker: Send + Sync {
    /// Acquires or extends the lease on `view_id` for `holder_id`.
    ///
    /// Creates the lease if none is live, extends it if `holder_id` already
    /// holds it, and takes it over if it expired. The lease expires
    /// `wait_time` after a successful call.
    ///
    /// # Errors
    ///
    /// `LockHeld` if another holder has a live lease; `Infrastructure` on
    /// storage failure.
    async fn renew(
        &self,
        holder_id: &str,
        view_id: &str,
        wait_time: Duration,
    ) -> Result<(), DomainError>;
}
