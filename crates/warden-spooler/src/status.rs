//! Per-view loop status, shared with observers such as the HTTP server.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

/// Where a view loop ended its last cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewState {
    /// Registered, no cycle finished yet.
    Starting,
    /// Another instance holds the lease.
    Standby,
    /// Folded everything available.
    CaughtUp,
    /// The last batch halted on an error.
    Stalled,
}

/// Last cycle outcome of one view loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewStatus {
    pub view_model: String,
    pub state: ViewState,
    pub watermark: i64,
    pub processed_last_cycle: usize,
    pub processed_total: u64,
    pub last_error: Option<String>,
    pub last_cycle_at: Option<DateTime<Utc>>,
}

impl ViewStatus {
    fn starting(view_model: &str) -> Self {
        Self {
            view_model: view_model.to_owned(),
            state: ViewState::Starting,
            watermark: 0,
            processed_last_cycle: 0,
            processed_total: 0,
            last_error: None,
            last_cycle_at: None,
        }
    }
}

/// Shared map of view name to status. Cloning shares the same map.
#[derive(Debug, Clone, Default)]
pub struct StatusBoard {
    inner: Arc<RwLock<BTreeMap<String, ViewStatus>>>,
}

impl StatusBoard {
    /// Creates an empty board.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn register(&self, view_model: &str) {
        self.inner
            .write()
            .await
            .entry(view_model.to_owned())
            .or_insert_with(|| ViewStatus::starting(view_model));
    }

    pub(crate) async fn update(&self, view_model: &str, f: impl FnOnce(&mut ViewStatus)) {
        let mut views = self.inner.write().await;
        let status = views
            .entry(view_model.to_owned())
            .or_insert_with(|| ViewStatus::starting(view_model));
        f(status);
    }

    /// Returns the status of one view.
    pub async fn get(&self, view_model: &str) -> Option<ViewStatus> {
        self.inner.read().await.get(view_model).cloned()
    }

    /// Returns every view's status, sorted by view name.
    pub async fn snapshot(&self) -> Vec<ViewStatus> {
        self.inner.read().await.values().cloned().collect()
    }
}
