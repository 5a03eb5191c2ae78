//! In-memory implementations of `PolicyViewStore` and `MailTextViewStore`.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;
use warden_core::error::DomainError;

use super::views::{MailTextView, MailTextViewStore, PolicyView, PolicyViewStore};
use crate::domain::events::MailTextKey;

/// Policy rows held in process memory.
#[derive(Debug)]
pub struct InMemoryPolicyViews<S> {
    rows: RwLock<HashMap<String, PolicyView<S>>>,
}

impl<S> Default for InMemoryPolicyViews<S> {
    fn default() -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
        }
    }
}

impl<S> InMemoryPolicyViews<S> {
    /// Creates an empty view.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl<S> PolicyViewStore<S> for InMemoryPolicyViews<S>
where
    S: Clone + Send + Sync + 'static,
{
    async fn get(&self, id: &str) -> Result<Option<PolicyView<S>>, DomainError> {
        Ok(self.rows.read().await.get(id).cloned())
    }

    async fn get_default(&self, iam_id: &str) -> Result<Option<PolicyView<S>>, DomainError> {
        Ok(self
            .rows
            .read()
            .await
            .get(iam_id)
            .filter(|row| row.is_default)
            .cloned())
    }

    async fn upsert(&self, view: PolicyView<S>) -> Result<(), DomainError> {
        let mut rows = self.rows.write().await;
        if rows
            .get(&view.id)
            .is_some_and(|existing| existing.sequence >= view.sequence)
        {
            return Ok(());
        }
        rows.insert(view.id.clone(), view);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), DomainError> {
        self.rows.write().await.remove(id);
        Ok(())
    }

    async fn clear(&self) -> Result<(), DomainError> {
        self.rows.write().await.clear();
        Ok(())
    }
}

/// Mail text rows held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryMailTextViews {
    rows: RwLock<BTreeMap<(String, MailTextKey), MailTextView>>,
}

impl InMemoryMailTextViews {
    /// Creates an empty view.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MailTextViewStore for InMemoryMailTextViews {
    async fn get(
        &self,
        aggregate_id: &str,
        key: &MailTextKey,
    ) -> Result<Option<MailTextView>, DomainError> {
        Ok(self
            .rows
            .read()
            .await
            .get(&(aggregate_id.to_owned(), key.clone()))
            .cloned())
    }

    async fn list(&self, aggregate_id: &str) -> Result<Vec<MailTextView>, DomainError> {
        Ok(self
            .rows
            .read()
            .await
            .values()
            .filter(|row| row.aggregate_id == aggregate_id)
            .cloned()
            .collect())
    }

    async fn upsert(&self, view: MailTextView) -> Result<(), DomainError> {
        let mut rows = self.rows.write().await;
        let id = (view.aggregate_id.clone(), view.key.clone());
        if rows
            .get(&id)
            .is_some_and(|existing| existing.sequence >= view.sequence)
        {
            return Ok(());
        }
        rows.insert(id, view);
        Ok(())
    }

    async fn clear(&self) -> Result<(), DomainError> {
        self.rows.write().await.clear();
        Ok(())
    }
}
