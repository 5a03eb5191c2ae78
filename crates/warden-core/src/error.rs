//! Domain error types.

use thiserror::Error;

/// Top-level domain error type.
///
/// Every storage adapter maps its native errors into one of these kinds before
/// they leave the adapter, so callers only ever branch on stable variants.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A lookup found neither a scoped row nor a default row.
    #[error("not found: {0}")]
    NotFound(String),

    /// Optimistic concurrency conflict.
    #[error(
        "concurrency conflict on aggregate {aggregate_id}: expected sequence {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        /// The aggregate that had the conflict.
        aggregate_id: String,
        /// The sequence the caller expected.
        expected: i64,
        /// The sequence found in the store.
        actual: i64,
    },

    /// A malformed event or a command rejected by a business rule.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// Another holder owns a live lease on the view.
    #[error("lock on {view_id} held by another instance")]
    LockHeld {
        /// The view whose lease is held.
        view_id: String,
    },

    /// An infrastructure/persistence error. Treated as transient.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl DomainError {
    /// Returns `true` for [`DomainError::NotFound`].
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns `true` for [`DomainError::LockHeld`].
    #[must_use]
    pub fn is_lock_held(&self) -> bool {
        matches!(self, Self::LockHeld { .. })
    }

    /// Returns `true` for errors a caller may retry without changing its input.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Infrastructure(_))
    }
}
