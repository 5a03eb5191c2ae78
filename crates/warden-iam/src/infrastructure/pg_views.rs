//! `PostgreSQL` implementation of `IamMemberViewStore`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;
use warden_core::error::DomainError;
use warden_event_store::error::from_sqlx;

use super::views::{IamMemberView, IamMemberViewStore};

#[derive(Debug, sqlx::FromRow)]
struct IamMemberRow {
    iam_id: String,
    user_id: String,
    roles: Vec<String>,
    sequence: i64,
    creation_date: DateTime<Utc>,
    change_date: DateTime<Utc>,
    resource_owner: String,
}

impl From<IamMemberRow> for IamMemberView {
    fn from(row: IamMemberRow) -> Self {
        Self {
            iam_id: row.iam_id,
            user_id: row.user_id,
            roles: row.roles,
            sequence: row.sequence,
            creation_date: row.creation_date,
            change_date: row.change_date,
            resource_owner: row.resource_owner,
        }
    }
}

const COLUMNS: &str =
    "iam_id, user_id, roles, sequence, creation_date, change_date, resource_owner";

/// Member rows on `projections.iam_members`.
#[derive(Debug, Clone)]
pub struct PgIamMemberViews {
    pool: PgPool,
}

impl PgIamMemberViews {
    /// Creates a new `PgIamMemberViews`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IamMemberViewStore for PgIamMemberViews {
    async fn get(&self, iam_id: &str, user_id: &str) -> Result<Option<IamMemberView>, DomainError> {
        let row: Option<IamMemberRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM projections.iam_members WHERE iam_id = $1 AND user_id = $2"
        ))
        .bind(iam_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(from_sqlx)?;
        Ok(row.map(Into::into))
    }

    async fn list(&self, iam_id: &str) -> Result<Vec<IamMemberView>, DomainError> {
        let rows: Vec<IamMemberRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM projections.iam_members WHERE iam_id = $1 ORDER BY user_id"
        ))
        .bind(iam_id)
        .fetch_all(&self.pool)
        .await
        .map_err(from_sqlx)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self, view), fields(iam_id = %view.iam_id, user_id = %view.user_id))]
    async fn upsert(&self, view: IamMemberView) -> Result<(), DomainError> {
        sqlx::query(
            r"
            INSERT INTO projections.iam_members
                (iam_id, user_id, roles, sequence, creation_date, change_date, resource_owner)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (iam_id, user_id) DO UPDATE
            SET roles = EXCLUDED.roles,
                sequence = EXCLUDED.sequence,
                creation_date = EXCLUDED.creation_date,
                change_date = EXCLUDED.change_date,
                resource_owner = EXCLUDED.resource_owner
            WHERE projections.iam_members.sequence < EXCLUDED.sequence
            ",
        )
        .bind(&view.iam_id)
        .bind(&view.user_id)
        .bind(&view.roles)
        .bind(view.sequence)
        .bind(view.creation_date)
        .bind(view.change_date)
        .bind(&view.resource_owner)
        .execute(&self.pool)
        .await
        .map_err(from_sqlx)?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, iam_id: &str, user_id: &str) -> Result<(), DomainError> {
        sqlx::query("DELETE FROM projections.iam_members WHERE iam_id = $1 AND user_id = $2")
            .bind(iam_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(from_sqlx)?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), DomainError> {
        sqlx::query("DELETE FROM projections.iam_members")
            .execute(&self.pool)
            .await
            .map_err(from_sqlx)?;
        Ok(())
    }
}
