//! Member rows and the storage contract behind them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use warden_core::error::DomainError;

/// One materialized membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IamMemberView {
    /// The instance.
    pub iam_id: String,
    /// The member.
    pub user_id: String,
    /// Granted roles, sorted.
    pub roles: Vec<String>,
    /// Sequence of the last `iam` stream event folded into the row.
    pub sequence: i64,
    /// When the user became a member.
    pub creation_date: DateTime<Utc>,
    /// When the row last changed.
    pub change_date: DateTime<Utc>,
    /// Tenant the membership belongs to.
    pub resource_owner: String,
}

/// Storage for `projections.iam_members`.
#[async_trait]
pub trait IamMemberViewStore: Send + Sync {
    /// Returns the row of `user_id` on `iam_id`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` on storage failure.
    async fn get(&self, iam_id: &str, user_id: &str) -> Result<Option<IamMemberView>, DomainError>;

    /// Returns every member of `iam_id`, ordered by user id.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` on storage failure.
    async fn list(&self, iam_id: &str) -> Result<Vec<IamMemberView>, DomainError>;

    /// Inserts or replaces a row. A row already at or past `view.sequence`
    /// is left alone.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` on storage failure.
    async fn upsert(&self, view: IamMemberView) -> Result<(), DomainError>;

    /// Deletes the row of `user_id` on `iam_id`, if any.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` on storage failure.
    async fn delete(&self, iam_id: &str, user_id: &str) -> Result<(), DomainError>;

    /// Deletes every row.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` on storage failure.
    async fn clear(&self) -> Result<(), DomainError>;
}
