//! Test event stores — mock `EventStore` implementations for tests.

use async_trait::async_trait;
use warden_core::error::DomainError;
use warden_core::event::AggregateRef;
use warden_core::store::{EventFilter, EventStore, PendingEvent, StoredEvent};

/// An event store that always returns an infrastructure error. Useful for
/// testing error-handling paths.
#[derive(Debug)]
pub struct FailingEventStore;

#[async_trait]
impl EventStore for FailingEventStore {
    async fn append(
        &self,
        _aggregate: &AggregateRef,
        _expected_sequence: i64,
        _events: &[PendingEvent],
    ) -> Result<Vec<StoredEvent>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn query(&self, _filter: &EventFilter) -> Result<Vec<StoredEvent>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }
}
