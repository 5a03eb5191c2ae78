//! Read-model rows and the storage contract behind them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use warden_core::error::DomainError;

use crate::domain::aggregates::PolicyState;
use crate::domain::events::{MailTextContent, MailTextKey};

/// One materialized policy row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyView<S> {
    /// Owner aggregate id.
    pub id: String,
    /// Sequence of the last event folded into the row.
    pub sequence: i64,
    /// When the policy was added.
    pub creation_date: DateTime<Utc>,
    /// When the row last changed.
    pub change_date: DateTime<Utc>,
    /// Tenant the policy belongs to.
    pub resource_owner: String,
    /// Lifecycle state. Removed policies are deleted, so rows are active.
    pub state: PolicyState,
    /// Whether this is the instance default.
    pub is_default: bool,
    /// Policy-specific settings.
    #[serde(flatten)]
    pub settings: S,
}

/// Storage for one policy view. Writes come from the view's projection only.
#[async_trait]
pub trait PolicyViewStore<S: Send + Sync + 'static>: Send + Sync {
    /// Returns the row of owner `id`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` on storage failure.
    async fn get(&self, id: &str) -> Result<Option<PolicyView<S>>, DomainError>;

    /// Returns the default row of instance `iam_id`. A row of another id is
    /// never returned, even if it carries the default flag.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` on storage failure.
    async fn get_default(&self, iam_id: &str) -> Result<Option<PolicyView<S>>, DomainError>;

    /// Inserts or replaces a row. A row already at or past `view.sequence`
    /// is left alone.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` on storage failure.
    async fn upsert(&self, view: PolicyView<S>) -> Result<(), DomainError>;

    /// Deletes the row of owner `id`, if any.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` on storage failure.
    async fn delete(&self, id: &str) -> Result<(), DomainError>;

    /// Deletes every row.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` on storage failure.
    async fn clear(&self) -> Result<(), DomainError>;
}

/// One materialized mail text row, keyed by instance, template and language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MailTextView {
    /// Instance aggregate id.
    pub aggregate_id: String,
    /// Template and language.
    #[serde(flatten)]
    pub key: MailTextKey,
    /// Sequence of the last event folded into the row.
    pub sequence: i64,
    /// When the mail text was added.
    pub creation_date: DateTime<Utc>,
    /// When the row last changed.
    pub change_date: DateTime<Utc>,
    /// Tenant the mail text belongs to.
    pub resource_owner: String,
    /// Lifecycle state.
    pub state: PolicyState,
    /// Whether the row belongs to the instance.
    pub is_default: bool,
    /// Text blocks.
    #[serde(flatten)]
    pub content: MailTextContent,
}

/// Storage for the mail text view.
#[async_trait]
pub trait MailTextViewStore: Send + Sync {
    /// Returns mail text `key` of `aggregate_id`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` on storage failure.
    async fn get(
        &self,
        aggregate_id: &str,
        key: &MailTextKey,
    ) -> Result<Option<MailTextView>, DomainError>;

    /// Returns every mail text of `aggregate_id`, sorted by type then language.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` on storage failure.
    async fn list(&self, aggregate_id: &str) -> Result<Vec<MailTextView>, DomainError>;

    /// Inserts or replaces a row. A row already at or past `view.sequence`
    /// is left alone.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` on storage failure.
    async fn upsert(&self, view: MailTextView) -> Result<(), DomainError>;

    /// Deletes every row.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` on storage failure.
    async fn clear(&self) -> Result<(), DomainError>;
}
