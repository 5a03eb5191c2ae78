//! Domain events for the member context.

use std::sync::LazyLock;

use serde::{Deserialize, Serialize};
use warden_core::error::DomainError;
use warden_core::event::{DomainEvent, EventMetadata};
use warden_core::registry::EventRegistry;
use warden_core::store::StoredEvent;

/// Event type for [`MemberEventKind::Added`].
pub const MEMBER_ADDED_EVENT_TYPE: &str = "iam.member.added";
/// Event type for [`MemberEventKind::Changed`].
pub const MEMBER_CHANGED_EVENT_TYPE: &str = "iam.member.changed";
/// Event type for [`MemberEventKind::Removed`].
pub const MEMBER_REMOVED_EVENT_TYPE: &str = "iam.member.removed";

/// Every member event type.
pub const MEMBER_EVENT_TYPES: [&str; 3] = [
    MEMBER_ADDED_EVENT_TYPE,
    MEMBER_CHANGED_EVENT_TYPE,
    MEMBER_REMOVED_EVENT_TYPE,
];

/// A user's role grant on the instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRoles {
    /// The member.
    pub user_id: String,
    /// Granted roles, sorted and free of duplicates.
    pub roles: Vec<String>,
}

/// Payload of `iam.member.removed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRemoved {
    /// The former member.
    pub user_id: String,
}

/// Event payload variants for the member context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberEventKind {
    /// A user became a member.
    Added(MemberRoles),
    /// A member's roles were replaced.
    Changed(MemberRoles),
    /// A member was removed.
    Removed(MemberRemoved),
}

impl MemberEventKind {
    /// Event type tag of this variant.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Added(_) => MEMBER_ADDED_EVENT_TYPE,
            Self::Changed(_) => MEMBER_CHANGED_EVENT_TYPE,
            Self::Removed(_) => MEMBER_REMOVED_EVENT_TYPE,
        }
    }

    /// The user the event is about.
    #[must_use]
    pub fn user_id(&self) -> &str {
        match self {
            Self::Added(p) | Self::Changed(p) => &p.user_id,
            Self::Removed(p) => &p.user_id,
        }
    }
}

/// Builds the decode table for every member event type.
#[must_use]
pub fn registry() -> EventRegistry<MemberEventKind> {
    EventRegistry::new()
        .register(MEMBER_ADDED_EVENT_TYPE, |v| {
            serde_json::from_value(v).map(MemberEventKind::Added)
        })
        .register(MEMBER_CHANGED_EVENT_TYPE, |v| {
            serde_json::from_value(v).map(MemberEventKind::Changed)
        })
        .register(MEMBER_REMOVED_EVENT_TYPE, |v| {
            serde_json::from_value(v).map(MemberEventKind::Removed)
        })
}

static REGISTRY: LazyLock<EventRegistry<MemberEventKind>> = LazyLock::new(registry);

/// Decodes a stored member event's payload.
///
/// # Errors
///
/// Returns `DomainError::ConstraintViolation` for foreign event types or
/// payloads that do not decode.
pub fn decode(stored: &StoredEvent) -> Result<MemberEventKind, DomainError> {
    REGISTRY.decode(&stored.event_type, stored.payload.clone())
}

/// Domain event envelope for the member context.
#[derive(Debug, Clone)]
pub struct MemberEvent {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Event-specific payload.
    pub kind: MemberEventKind,
}

impl DomainEvent for MemberEvent {
    fn event_type(&self) -> &'static str {
        self.kind.event_type()
    }

    fn to_payload(&self) -> serde_json::Value {
        let payload = match &self.kind {
            MemberEventKind::Added(p) | MemberEventKind::Changed(p) => serde_json::to_value(p),
            MemberEventKind::Removed(p) => serde_json::to_value(p),
        };
        payload.expect("MemberEventKind serialization is infallible")
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }

    fn from_stored(stored: &StoredEvent) -> Result<Self, DomainError> {
        Ok(Self {
            metadata: EventMetadata::from_stored(stored),
            kind: decode(stored)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_registry_decodes_added_payload() {
        let decoded = registry()
            .decode(
                MEMBER_ADDED_EVENT_TYPE,
                json!({"user_id": "u-1", "roles": ["IAM_OWNER"]}),
            )
            .unwrap();

        assert_eq!(
            decoded,
            MemberEventKind::Added(MemberRoles {
                user_id: "u-1".into(),
                roles: vec!["IAM_OWNER".into()],
            })
        );
        assert_eq!(decoded.user_id(), "u-1");
    }

    #[test]
    fn test_registry_rejects_removed_without_user() {
        let result = registry().decode(MEMBER_REMOVED_EVENT_TYPE, json!({}));
        assert!(matches!(result, Err(DomainError::ConstraintViolation(_))));
    }

    #[test]
    fn test_registry_covers_every_member_event_type() {
        let mut expected = MEMBER_EVENT_TYPES.to_vec();
        expected.sort_unstable();
        assert_eq!(registry().event_types(), expected);
    }
}
