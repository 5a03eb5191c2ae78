//! Persisted projection watermarks.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::DomainError;

/// Last global position folded into a view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Watermark {
    /// View name.
    pub view_name: String,
    /// Position of the last successfully folded event (0 if none).
    pub position: i64,
    /// When the watermark last moved.
    pub updated_at: DateTime<Utc>,
    /// A rebuild was requested and the lease holder has not run it yet.
    pub reset_requested: bool,
}

/// Storage for per-view watermarks.
#[async_trait]
pub trait WatermarkStore: Send + Sync {
    /// Returns the watermark position for `view_name`, 0 if never written.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` on storage failure.
    async fn current(&self, view_name: &str) -> Result<i64, DomainError>;

    /// Moves the watermark to `position`. A lower position is ignored so the
    /// watermark never regresses.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` on storage failure.
    async fn advance(&self, view_name: &str, position: i64) -> Result<(), DomainError>;

    /// Drops the watermark and any pending reset request, so the view is
    /// rebuilt from position 0.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` on storage failure.
    async fn reset(&self, view_name: &str) -> Result<(), DomainError>;

    /// Records that `view_name` must be rebuilt. The request is stored next to
    /// the watermark, so whichever instance holds the view's lease picks it up
    /// and it outlives the process that filed it.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` on storage failure.
    async fn request_reset(&self, view_name: &str) -> Result<(), DomainError>;

    /// Whether a rebuild of `view_name` is pending.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` on storage failure.
    async fn reset_requested(&self, view_name: &str) -> Result<bool, DomainError>;

    /// Returns every stored watermark, sorted by view name.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` on storage failure.
    async fn all(&self) -> Result<Vec<Watermark>, DomainError>;
}
