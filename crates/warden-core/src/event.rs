//! Domain event abstractions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::DomainError;
use crate::store::{PendingEvent, StoredEvent};

/// Schema version stamped on every event written by this code base.
pub const AGGREGATE_VERSION_V1: &str = "v1";

/// Identity of the aggregate an event belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AggregateRef {
    /// Aggregate type, e.g. `org` or `iam`.
    pub aggregate_type: String,
    /// Aggregate identifier, unique within its type.
    pub aggregate_id: String,
    /// Tenant boundary the aggregate belongs to.
    pub resource_owner: String,
    /// Schema version the aggregate's events are written against.
    pub version: String,
}

impl AggregateRef {
    /// Creates a reference stamped with [`AGGREGATE_VERSION_V1`].
    #[must_use]
    pub fn new(
        aggregate_type: impl Into<String>,
        aggregate_id: impl Into<String>,
        resource_owner: impl Into<String>,
    ) -> Self {
        Self {
            aggregate_type: aggregate_type.into(),
            aggregate_id: aggregate_id.into(),
            resource_owner: resource_owner.into(),
            version: AGGREGATE_VERSION_V1.to_owned(),
        }
    }
}

/// Metadata attached to every domain event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Type tag used to route payload decoding.
    pub event_type: String,
    /// Aggregate this event belongs to.
    pub aggregate: AggregateRef,
    /// Gapless, monotonically increasing position within the aggregate stream.
    pub sequence: i64,
    /// Identity of the actor that caused the event.
    pub editor: String,
    /// Timestamp of event creation.
    pub created_at: DateTime<Utc>,
}

impl EventMetadata {
    /// Builds metadata for an event that has not been appended yet.
    ///
    /// `sequence` is provisional; the store assigns the authoritative one.
    #[must_use]
    pub fn pending(
        aggregate: &AggregateRef,
        event_type: &str,
        sequence: i64,
        editor: &str,
        clock: &dyn Clock,
    ) -> Self {
        Self {
            // TODO: event_id uses Uuid::new_v4() which makes replays of command
            // handling non-deterministic; inject an id generator next to Clock.
            event_id: Uuid::new_v4(),
            event_type: event_type.to_owned(),
            aggregate: aggregate.clone(),
            sequence,
            editor: editor.to_owned(),
            created_at: clock.now(),
        }
    }

    /// Extracts the metadata half of a stored event.
    #[must_use]
    pub fn from_stored(stored: &StoredEvent) -> Self {
        Self {
            event_id: stored.event_id,
            event_type: stored.event_type.clone(),
            aggregate: AggregateRef {
                aggregate_type: stored.aggregate_type.clone(),
                aggregate_id: stored.aggregate_id.clone(),
                resource_owner: stored.resource_owner.clone(),
                version: stored.aggregate_version.clone(),
            },
            sequence: stored.sequence,
            editor: stored.editor.clone(),
            created_at: stored.created_at,
        }
    }
}

/// Trait that all domain events implement.
pub trait DomainEvent: Send + Sync + std::fmt::Debug {
    /// Returns the event type name (used for payload routing).
    fn event_type(&self) -> &'static str;

    /// Serializes the event payload to JSON.
    fn to_payload(&self) -> serde_json::Value;

    /// Returns the metadata for this event.
    fn metadata(&self) -> &EventMetadata;

    /// Decodes a stored event back into its typed form.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ConstraintViolation` if the event type is unknown
    /// or the payload does not match it.
    fn from_stored(stored: &StoredEvent) -> Result<Self, DomainError>
    where
        Self: Sized;

    /// Converts the event into the shape the store appends.
    fn to_pending(&self) -> PendingEvent {
        let meta = self.metadata();
        PendingEvent {
            event_id: meta.event_id,
            event_type: self.event_type().to_owned(),
            payload: self.to_payload(),
            editor: meta.editor.clone(),
            created_at: meta.created_at,
        }
    }
}
