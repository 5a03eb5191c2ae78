//! `PostgreSQL` implementation of the `WatermarkStore` trait.
//!
//! Reset requests share the watermark row, so `reset` clears both at once.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;

use warden_core::error::DomainError;
use warden_core::watermark::{Watermark, WatermarkStore};

use crate::error::from_sqlx;

/// Watermarks on `projections.current_sequences`.
#[derive(Debug, Clone)]
pub struct PgWatermarkStore {
    pool: PgPool,
}

impl PgWatermarkStore {
    /// Creates a new `PgWatermarkStore`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WatermarkStore for PgWatermarkStore {
    async fn current(&self, view_name: &str) -> Result<i64, DomainError> {
        let position: Option<i64> = sqlx::query_scalar(
            "SELECT position FROM projections.current_sequences WHERE view_name = $1",
        )
        .bind(view_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(from_sqlx)?;
        Ok(position.unwrap_or(0))
    }

    #[instrument(skip(self), level = "trace")]
    async fn advance(&self, view_name: &str, position: i64) -> Result<(), DomainError> {
        sqlx::query(
            r"
            INSERT INTO projections.current_sequences (view_name, position, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (view_name) DO UPDATE
            SET position = EXCLUDED.position,
                updated_at = EXCLUDED.updated_at
            WHERE projections.current_sequences.position < EXCLUDED.position
            ",
        )
        .bind(view_name)
        .bind(position)
        .execute(&self.pool)
        .await
        .map_err(from_sqlx)?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn request_reset(&self, view_name: &str) -> Result<(), DomainError> {
        sqlx::query(
            r"
            INSERT INTO projections.current_sequences
                (view_name, position, updated_at, reset_requested)
            VALUES ($1, 0, NOW(), TRUE)
            ON CONFLICT (view_name) DO UPDATE
            SET reset_requested = TRUE
            ",
        )
        .bind(view_name)
        .execute(&self.pool)
        .await
        .map_err(from_sqlx)?;
        Ok(())
    }

    async fn reset_requested(&self, view_name: &str) -> Result<bool, DomainError> {
        let requested: Option<bool> = sqlx::query_scalar(
            "SELECT reset_requested FROM projections.current_sequences WHERE view_name = $1",
        )
        .bind(view_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(from_sqlx)?;
        Ok(requested.unwrap_or(false))
    }

    #[instrument(skip(self))]
    async fn reset(&self, view_name: &str) -> Result<(), DomainError> {
        sqlx::query("DELETE FROM projections.current_sequences WHERE view_name = $1")
            .bind(view_name)
            .execute(&self.pool)
            .await
            .map_err(from_sqlx)?;
        Ok(())
    }

    async fn all(&self) -> Result<Vec<Watermark>, DomainError> {
        let rows: Vec<(String, i64, DateTime<Utc>, bool)> = sqlx::query_as(
            r"
            SELECT view_name, position, updated_at, reset_requested
            FROM projections.current_sequences
            ORDER BY view_name
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(from_sqlx)?;

        Ok(rows
            .into_iter()
            .map(|(view_name, position, updated_at, reset_requested)| Watermark {
                view_name,
                position,
                updated_at,
                reset_requested,
            })
            .collect())
    }
}
