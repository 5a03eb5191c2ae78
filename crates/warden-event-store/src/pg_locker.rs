//! `PostgreSQL` implementation of the `Locker` trait.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, instrument};

use warden_core::error::DomainError;
use warden_core::lock::Locker;

use crate::error::from_sqlx;

/// Lease store on `projections.locks`.
///
/// A single conditional upsert both acquires and heartbeats: the update branch
/// only fires when the caller already holds the lease or the lease expired.
/// Expiry is judged by the database clock so instances with skewed clocks
/// agree.
#[derive(Debug, Clone)]
pub struct PgLocker {
    pool: PgPool,
}

impl PgLocker {
    /// Creates a new `PgLocker`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Locker for PgLocker {
    #[instrument(skip(self), level = "debug")]
    async fn renew(
        &self,
        holder_id: &str,
        view_id: &str,
        wait_time: Duration,
    ) -> Result<(), DomainError> {
        let result = sqlx::query(
            r"
            INSERT INTO projections.locks (view_id, holder_id, expires_at)
            VALUES ($1, $2, NOW() + make_interval(secs => $3))
            ON CONFLICT (view_id) DO UPDATE
            SET holder_id = EXCLUDED.holder_id,
                expires_at = EXCLUDED.expires_at
            WHERE projections.locks.holder_id = EXCLUDED.holder_id
               OR projections.locks.expires_at <= NOW()
            ",
        )
        .bind(view_id)
        .bind(holder_id)
        .bind(wait_time.as_secs_f64())
        .execute(&self.pool)
        .await
        .map_err(from_sqlx)?;

        if result.rows_affected() == 0 {
            debug!("lease held by another instance");
            return Err(DomainError::LockHeld {
                view_id: view_id.to_owned(),
            });
        }
        Ok(())
    }
}
