//! Builders for stored events used across context tests.

use chrono::{TimeZone, Utc};
use uuid::Uuid;
use warden_core::store::StoredEvent;

/// Builds a committed event on an `org` aggregate owned by itself.
///
/// The timestamp is derived from `position` so folds that record creation and
/// change dates produce predictable values.
///
/// # Panics
///
/// Panics if `position` is not a valid number of seconds.
#[must_use]
pub fn stored_event(
    position: i64,
    aggregate_id: &str,
    sequence: i64,
    event_type: &str,
    payload: serde_json::Value,
) -> StoredEvent {
    StoredEvent {
        position,
        event_id: Uuid::new_v4(),
        aggregate_type: "org".to_owned(),
        aggregate_id: aggregate_id.to_owned(),
        aggregate_version: "v1".to_owned(),
        resource_owner: aggregate_id.to_owned(),
        sequence,
        event_type: event_type.to_owned(),
        payload,
        editor: "tester".to_owned(),
        created_at: Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
            + chrono::TimeDelta::seconds(position),
    }
}
