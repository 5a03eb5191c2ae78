//! Test projection handlers.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use warden_core::error::DomainError;
use warden_core::projection::ProjectionHandler;
use warden_core::store::{EventFilter, StoredEvent};

/// A handler that records every event it is asked to fold.
///
/// Optionally fails once the first time it sees a given position, which lets
/// tests exercise batch halts and retries.
#[derive(Debug)]
pub struct RecordingHandler {
    view: String,
    filter: EventFilter,
    cycle: Duration,
    processed: Mutex<Vec<StoredEvent>>,
    fail_once_at: Mutex<Option<i64>>,
    clears: Mutex<usize>,
}

impl RecordingHandler {
    /// Creates a handler for `view` subscribed to `filter`.
    #[must_use]
    pub fn new(view: &str, filter: EventFilter) -> Self {
        Self {
            view: view.to_owned(),
            filter,
            cycle: Duration::from_secs(1),
            processed: Mutex::new(Vec::new()),
            fail_once_at: Mutex::new(None),
            clears: Mutex::new(0),
        }
    }

    /// Overrides the minimum cycle duration (1s by default).
    #[must_use]
    pub fn with_cycle(mut self, cycle: Duration) -> Self {
        self.cycle = cycle;
        self
    }

    /// Fails the first fold of the event at `position`.
    #[must_use]
    pub fn failing_once_at(self, position: i64) -> Self {
        *self.fail_once_at.lock().unwrap() = Some(position);
        self
    }

    /// Positions folded so far, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn positions(&self) -> Vec<i64> {
        self.processed
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.position)
            .collect()
    }

    /// Event types folded so far, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn event_types(&self) -> Vec<String> {
        self.processed
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.event_type.clone())
            .collect()
    }

    /// Number of times the view was cleared.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn clear_count(&self) -> usize {
        *self.clears.lock().unwrap()
    }
}

#[async_trait]
impl ProjectionHandler for RecordingHandler {
    fn view_model(&self) -> &str {
        &self.view
    }

    fn event_query(&self) -> EventFilter {
        self.filter.clone()
    }

    async fn process(&self, event: &StoredEvent) -> Result<(), DomainError> {
        let mut fail_at = self.fail_once_at.lock().unwrap();
        if *fail_at == Some(event.position) {
            *fail_at = None;
            return Err(DomainError::ConstraintViolation(format!(
                "refusing event at position {}",
                event.position
            )));
        }
        self.processed.lock().unwrap().push(event.clone());
        Ok(())
    }

    fn minimum_cycle_duration(&self) -> Duration {
        self.cycle
    }

    async fn clear(&self) -> Result<(), DomainError> {
        self.processed.lock().unwrap().clear();
        *self.clears.lock().unwrap() += 1;
        Ok(())
    }
}

/// A handler whose every fold fails with an infrastructure error.
#[derive(Debug)]
pub struct FailingHandler {
    view: String,
}

impl FailingHandler {
    /// Creates a handler for `view`.
    #[must_use]
    pub fn new(view: &str) -> Self {
        Self {
            view: view.to_owned(),
        }
    }
}

#[async_trait]
impl ProjectionHandler for FailingHandler {
    fn view_model(&self) -> &str {
        &self.view
    }

    fn event_query(&self) -> EventFilter {
        EventFilter::new()
    }

    async fn process(&self, _event: &StoredEvent) -> Result<(), DomainError> {
        Err(DomainError::Infrastructure("view storage unavailable".into()))
    }

    fn minimum_cycle_duration(&self) -> Duration {
        Duration::from_secs(1)
    }
}
