//! Event store abstraction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;
use crate::event::AggregateRef;
use crate::registry::EventSchema;

/// An event handed to the store for appending. Sequence and global position
/// are assigned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEvent {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Event type name for payload routing.
    pub event_type: String,
    /// Serialized event payload.
    pub payload: serde_json::Value,
    /// Identity of the actor that caused the event.
    pub editor: String,
    /// Timestamp of event creation.
    pub created_at: DateTime<Utc>,
}

/// Stored representation of a domain event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEvent {
    /// Position in the global log. Strictly increasing in commit order.
    pub position: i64,
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Aggregate type this event belongs to.
    pub aggregate_type: String,
    /// Aggregate this event belongs to.
    pub aggregate_id: String,
    /// Schema version of the aggregate at append time.
    pub aggregate_version: String,
    /// Tenant boundary.
    pub resource_owner: String,
    /// Sequence number within the aggregate stream, starting at 1.
    pub sequence: i64,
    /// Event type name for payload routing.
    pub event_type: String,
    /// Serialized event payload.
    pub payload: serde_json::Value,
    /// Identity of the actor that caused the event.
    pub editor: String,
    /// Timestamp of event creation.
    pub created_at: DateTime<Utc>,
}

/// Selects a subset of the global log.
///
/// Empty type lists match everything. `after_position` is exclusive and doubles
/// as the continuation token when paging: re-issue the query with the position
/// of the last event returned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    /// Aggregate types to include.
    pub aggregate_types: Vec<String>,
    /// Event types to include.
    pub event_types: Vec<String>,
    /// Restrict to a single aggregate.
    pub aggregate_id: Option<String>,
    /// Restrict to a single tenant.
    pub resource_owner: Option<String>,
    /// Only events with a global position strictly greater than this.
    pub after_position: i64,
    /// Maximum number of events to return.
    pub limit: Option<usize>,
}

impl EventFilter {
    /// A filter matching the whole log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A filter matching one aggregate's stream.
    #[must_use]
    pub fn for_aggregate(aggregate_type: &str, aggregate_id: &str) -> Self {
        Self::new()
            .aggregate_types([aggregate_type])
            .aggregate_id(aggregate_id)
    }

    /// Restricts the filter to the given aggregate types.
    #[must_use]
    pub fn aggregate_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aggregate_types = types.into_iter().map(Into::into).collect();
        self
    }

    /// Restricts the filter to the given event types.
    #[must_use]
    pub fn event_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.event_types = types.into_iter().map(Into::into).collect();
        self
    }

    /// Restricts the filter to one aggregate id.
    #[must_use]
    pub fn aggregate_id(mut self, aggregate_id: impl Into<String>) -> Self {
        self.aggregate_id = Some(aggregate_id.into());
        self
    }

    /// Restricts the filter to one resource owner.
    #[must_use]
    pub fn resource_owner(mut self, resource_owner: impl Into<String>) -> Self {
        self.resource_owner = Some(resource_owner.into());
        self
    }

    /// Sets the exclusive lower bound. Never lowers an existing bound.
    #[must_use]
    pub fn after(mut self, position: i64) -> Self {
        self.after_position = self.after_position.max(position);
        self
    }

    /// Caps the number of returned events.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns `true` if `event` satisfies every criterion except `limit`.
    #[must_use]
    pub fn matches(&self, event: &StoredEvent) -> bool {
        event.position > self.after_position
            && (self.aggregate_types.is_empty()
                || self.aggregate_types.contains(&event.aggregate_type))
            && (self.event_types.is_empty() || self.event_types.contains(&event.event_type))
            && self
                .aggregate_id
                .as_ref()
                .is_none_or(|id| *id == event.aggregate_id)
            && self
                .resource_owner
                .as_ref()
                .is_none_or(|owner| *owner == event.resource_owner)
    }
}

/// Checks the parts of an append every store enforces identically: identity
/// fields are present and every event passes `schema`, when one is configured.
///
/// # Errors
///
/// Returns `DomainError::ConstraintViolation` describing the first offending
/// field or event.
pub fn validate_append(
    aggregate: &AggregateRef,
    events: &[PendingEvent],
    schema: Option<&dyn EventSchema>,
) -> Result<(), DomainError> {
    if aggregate.aggregate_type.trim().is_empty() {
        return Err(DomainError::ConstraintViolation(
            "aggregate type must not be empty".into(),
        ));
    }
    if aggregate.aggregate_id.trim().is_empty() {
        return Err(DomainError::ConstraintViolation(
            "aggregate id must not be empty".into(),
        ));
    }
    if aggregate.resource_owner.trim().is_empty() {
        return Err(DomainError::ConstraintViolation(
            "resource owner must not be empty".into(),
        ));
    }
    for event in events {
        if event.event_type.trim().is_empty() {
            return Err(DomainError::ConstraintViolation(
                "event type must not be empty".into(),
            ));
        }
        if let Some(schema) = schema {
            schema.check(&event.event_type, &event.payload)?;
        }
    }
    Ok(())
}

/// Append-only event log with optimistic concurrency.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends `events` to one aggregate's stream.
    ///
    /// `expected_sequence` is the current sequence the caller loaded (0 for a
    /// new aggregate). Returns the stored events with their assigned sequences
    /// and positions. Appending nothing is a no-op.
    ///
    /// # Errors
    ///
    /// `ConcurrencyConflict` if the stream moved on, `ConstraintViolation` if an
    /// event is malformed, `Infrastructure` on storage failure.
    async fn append(
        &self,
        aggregate: &AggregateRef,
        expected_sequence: i64,
        events: &[PendingEvent],
    ) -> Result<Vec<StoredEvent>, DomainError>;

    /// Returns the events matching `filter` in ascending global position.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` on storage failure.
    async fn query(&self, filter: &EventFilter) -> Result<Vec<StoredEvent>, DomainError>;

    /// Loads one aggregate's full stream, ordered by sequence.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` on storage failure.
    async fn load_events(
        &self,
        aggregate_type: &str,
        aggregate_id: &str,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        let mut events = self
            .query(&EventFilter::for_aggregate(aggregate_type, aggregate_id))
            .await?;
        events.sort_by_key(|e| e.sequence);
        Ok(events)
    }
}
