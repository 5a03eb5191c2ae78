//! In-memory implementation of `IamMemberViewStore`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use warden_core::error::DomainError;

use super::views::{IamMemberView, IamMemberViewStore};

type MemberKey = (String, String);

/// Member rows held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryIamMemberViews {
    rows: RwLock<BTreeMap<MemberKey, IamMemberView>>,
}

impl InMemoryIamMemberViews {
    /// Creates an empty view.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn key(iam_id: &str, user_id: &str) -> MemberKey {
    (iam_id.to_owned(), user_id.to_owned())
}

#[async_trait]
impl IamMemberViewStore for InMemoryIamMemberViews {
    async fn get(&self, iam_id: &str, user_id: &str) -> Result<Option<IamMemberView>, DomainError> {
        Ok(self.rows.read().await.get(&key(iam_id, user_id)).cloned())
    }

    async fn list(&self, iam_id: &str) -> Result<Vec<IamMemberView>, DomainError> {
        Ok(self
            .rows
            .read()
            .await
            .values()
            .filter(|row| row.iam_id == iam_id)
            .cloned()
            .collect())
    }

    async fn upsert(&self, view: IamMemberView) -> Result<(), DomainError> {
        let mut rows = self.rows.write().await;
        let key = key(&view.iam_id, &view.user_id);
        if rows
            .get(&key)
            .is_some_and(|existing| existing.sequence >= view.sequence)
        {
            return Ok(());
        }
        rows.insert(key, view);
        Ok(())
    }

    async fn delete(&self, iam_id: &str, user_id: &str) -> Result<(), DomainError> {
        self.rows.write().await.remove(&key(iam_id, user_id));
        Ok(())
    }

    async fn clear(&self) -> Result<(), DomainError> {
        self.rows.write().await.clear();
        Ok(())
    }
}
