//! In-memory implementation of the `EventStore` trait.
//!
//! Used by unit tests and single-process development setups. Enforces the same
//! contract as the `PostgreSQL` store: optimistic concurrency per aggregate,
//! schema validation and a gapless global position.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use warden_core::error::DomainError;
use warden_core::event::AggregateRef;
use warden_core::registry::EventSchema;
use warden_core::store::{EventFilter, EventStore, PendingEvent, StoredEvent, validate_append};

/// Event log held in process memory.
#[derive(Default)]
pub struct InMemoryEventStore {
    log: RwLock<Vec<StoredEvent>>,
    schema: Option<Arc<dyn EventSchema>>,
}

impl InMemoryEventStore {
    /// Creates an empty store that accepts any well-formed event.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects appends whose events do not pass `schema`.
    #[must_use]
    pub fn with_schema(mut self, schema: Arc<dyn EventSchema>) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Returns the number of events in the log.
    pub async fn len(&self) -> usize {
        self.log.read().await.len()
    }

    /// Returns `true` if nothing was appended yet.
    pub async fn is_empty(&self) -> bool {
        self.log.read().await.is_empty()
    }
}

impl std::fmt::Debug for InMemoryEventStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryEventStore")
            .field("schema", &self.schema.is_some())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(
        &self,
        aggregate: &AggregateRef,
        expected_sequence: i64,
        events: &[PendingEvent],
    ) -> Result<Vec<StoredEvent>, DomainError> {
        validate_append(aggregate, events, self.schema.as_deref())?;
        if events.is_empty() {
            return Ok(Vec::new());
        }

        let mut log = self.log.write().await;
        let actual = log
            .iter()
            .filter(|e| {
                e.aggregate_type == aggregate.aggregate_type
                    && e.aggregate_id == aggregate.aggregate_id
            })
            .map(|e| e.sequence)
            .max()
            .unwrap_or(0);
        if actual != expected_sequence {
            return Err(DomainError::ConcurrencyConflict {
                aggregate_id: aggregate.aggregate_id.clone(),
                expected: expected_sequence,
                actual,
            });
        }

        #[allow(clippy::cast_possible_wrap)]
        let base_position = log.len() as i64;
        let stored: Vec<StoredEvent> = events
            .iter()
            .zip(1_i64..)
            .map(|(event, offset)| StoredEvent {
                position: base_position + offset,
                event_id: event.event_id,
                aggregate_type: aggregate.aggregate_type.clone(),
                aggregate_id: aggregate.aggregate_id.clone(),
                aggregate_version: aggregate.version.clone(),
                resource_owner: aggregate.resource_owner.clone(),
                sequence: expected_sequence + offset,
                event_type: event.event_type.clone(),
                payload: event.payload.clone(),
                editor: event.editor.clone(),
                created_at: event.created_at,
            })
            .collect();
        log.extend(stored.iter().cloned());
        Ok(stored)
    }

    async fn query(&self, filter: &EventFilter) -> Result<Vec<StoredEvent>, DomainError> {
        let log = self.log.read().await;
        let matching = log.iter().filter(|e| filter.matches(e)).cloned();
        Ok(match filter.limit {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        })
    }
}
