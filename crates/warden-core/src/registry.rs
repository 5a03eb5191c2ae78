//! Event type registry.
//!
//! Payloads are stored untagged; the event type string is the tag. A registry
//! maps each known tag to a decode function producing the context's event
//! enum, so an unknown tag is an explicit error rather than a silent skip.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::DomainError;

/// Decodes a raw payload into a context's event enum.
pub type DecodeFn<K> = fn(serde_json::Value) -> Result<K, serde_json::Error>;

/// Type-erased payload check the event store runs before appending.
pub trait EventSchema: Send + Sync {
    /// Returns `true` if `event_type` is registered.
    fn knows(&self, event_type: &str) -> bool;

    /// Verifies that `payload` decodes as `event_type`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ConstraintViolation` for unknown types or payloads
    /// that do not decode.
    fn check(&self, event_type: &str, payload: &serde_json::Value) -> Result<(), DomainError>;
}

/// Maps event type tags to decode functions.
#[derive(Debug)]
pub struct EventRegistry<K> {
    decoders: HashMap<&'static str, DecodeFn<K>>,
}

impl<K> Default for EventRegistry<K> {
    fn default() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }
}

impl<K> EventRegistry<K> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `decode` for `event_type`, replacing any earlier mapping.
    #[must_use]
    pub fn register(mut self, event_type: &'static str, decode: DecodeFn<K>) -> Self {
        self.decoders.insert(event_type, decode);
        self
    }

    /// Returns the registered event types, sorted.
    #[must_use]
    pub fn event_types(&self) -> Vec<&'static str> {
        let mut types: Vec<&'static str> = self.decoders.keys().copied().collect();
        types.sort_unstable();
        types
    }

    /// Decodes `payload` as `event_type`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ConstraintViolation` for unknown types or payloads
    /// that do not decode.
    pub fn decode(&self, event_type: &str, payload: serde_json::Value) -> Result<K, DomainError> {
        let decode = self.decoders.get(event_type).ok_or_else(|| {
            DomainError::ConstraintViolation(format!("unknown event type {event_type}"))
        })?;
        decode(payload).map_err(|e| {
            DomainError::ConstraintViolation(format!("invalid payload for {event_type}: {e}"))
        })
    }
}

impl<K: Send + Sync> EventSchema for EventRegistry<K> {
    fn knows(&self, event_type: &str) -> bool {
        self.decoders.contains_key(event_type)
    }

    fn check(&self, event_type: &str, payload: &serde_json::Value) -> Result<(), DomainError> {
        self.decode(event_type, payload.clone()).map(|_| ())
    }
}

/// Several registries checked as one. An event passes if the registry that
/// knows its type accepts the payload.
#[derive(Clone, Default)]
pub struct SchemaSet {
    schemas: Vec<Arc<dyn EventSchema>>,
}

impl SchemaSet {
    /// Creates an empty set, which rejects every event type.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a schema to the set.
    #[must_use]
    pub fn with(mut self, schema: Arc<dyn EventSchema>) -> Self {
        self.schemas.push(schema);
        self
    }
}

impl std::fmt::Debug for SchemaSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaSet")
            .field("schemas", &self.schemas.len())
            .finish()
    }
}

impl EventSchema for SchemaSet {
    fn knows(&self, event_type: &str) -> bool {
        self.schemas.iter().any(|s| s.knows(event_type))
    }

    fn check(&self, event_type: &str, payload: &serde_json::Value) -> Result<(), DomainError> {
        match self.schemas.iter().find(|s| s.knows(event_type)) {
            Some(schema) => schema.check(event_type, payload),
            None => Err(DomainError::ConstraintViolation(format!(
                "unknown event type {event_type}"
            ))),
        }
    }
}
