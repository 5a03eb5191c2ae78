//! In-memory implementation of the `WatermarkStore` trait.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use warden_core::clock::Clock;
use warden_core::error::DomainError;
use warden_core::watermark::{Watermark, WatermarkStore};

/// Watermarks held in process memory.
pub struct InMemoryWatermarkStore {
    clock: Arc<dyn Clock>,
    marks: RwLock<BTreeMap<String, Watermark>>,
}

impl InMemoryWatermarkStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            marks: RwLock::new(BTreeMap::new()),
        }
    }
}

impl std::fmt::Debug for InMemoryWatermarkStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryWatermarkStore")
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl WatermarkStore for InMemoryWatermarkStore {
    async fn current(&self, view_name: &str) -> Result<i64, DomainError> {
        Ok(self
            .marks
            .read()
            .await
            .get(view_name)
            .map_or(0, |mark| mark.position))
    }

    async fn advance(&self, view_name: &str, position: i64) -> Result<(), DomainError> {
        let mut marks = self.marks.write().await;
        let now = self.clock.now();
        let mark = marks
            .entry(view_name.to_owned())
            .or_insert_with(|| Watermark {
                view_name: view_name.to_owned(),
                position: 0,
                updated_at: now,
                reset_requested: false,
            });
        if position > mark.position {
            mark.position = position;
            mark.updated_at = now;
        }
        Ok(())
    }

    async fn reset(&self, view_name: &str) -> Result<(), DomainError> {
        self.marks.write().await.remove(view_name);
        Ok(())
    }

    async fn request_reset(&self, view_name: &str) -> Result<(), DomainError> {
        let mut marks = self.marks.write().await;
        let now = self.clock.now();
        marks
            .entry(view_name.to_owned())
            .or_insert_with(|| Watermark {
                view_name: view_name.to_owned(),
                position: 0,
                updated_at: now,
                reset_requested: false,
            })
            .reset_requested = true;
        Ok(())
    }

    async fn reset_requested(&self, view_name: &str) -> Result<bool, DomainError> {
        Ok(self
            .marks
            .read()
            .await
            .get(view_name)
            .is_some_and(|mark| mark.reset_requested))
    }

    async fn all(&self) -> Result<Vec<Watermark>, DomainError> {
        Ok(self.marks.read().await.values().cloned().collect())
    }
}
