//! Integration tests for `PgEventStore`.

use std::sync::Arc;

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;
use warden_core::error::DomainError;
use warden_core::event::AggregateRef;
use warden_core::registry::EventRegistry;
use warden_core::store::{EventFilter, EventStore, PendingEvent};
use warden_event_store::pg_event_store::PgEventStore;

/// Helper to build a `PendingEvent` with sensible defaults.
fn make_pending_event(event_type: &str) -> PendingEvent {
    PendingEvent {
        event_id: Uuid::new_v4(),
        event_type: event_type.to_string(),
        payload: serde_json::json!({"key": "value"}),
        editor: "tester".to_string(),
        created_at: Utc::now(),
    }
}

fn org(id: &str) -> AggregateRef {
    AggregateRef::new("org", id, id)
}

// --- load_events ---

#[sqlx::test(migrations = "../../migrations")]
async fn test_load_events_returns_empty_vec_for_nonexistent_aggregate(pool: PgPool) {
    let store = PgEventStore::new(pool);

    let events = store.load_events("org", "missing").await.unwrap();

    assert!(events.is_empty());
}

// --- append + load round-trip ---

#[sqlx::test(migrations = "../../migrations")]
async fn test_append_and_load_single_event(pool: PgPool) {
    let store = PgEventStore::new(pool);
    let event = make_pending_event("policy.lockout.added");
    let expected_event_id = event.event_id;

    let appended = store.append(&org("org-A"), 0, &[event]).await.unwrap();

    let loaded = store.load_events("org", "org-A").await.unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded, appended);

    let e = &loaded[0];
    assert_eq!(e.event_id, expected_event_id);
    assert_eq!(e.aggregate_id, "org-A");
    assert_eq!(e.resource_owner, "org-A");
    assert_eq!(e.aggregate_version, "v1");
    assert_eq!(e.event_type, "policy.lockout.added");
    assert_eq!(e.sequence, 1);
    assert_eq!(e.editor, "tester");
    assert!(e.position > 0);
}

// --- ordering ---

#[sqlx::test(migrations = "../../migrations")]
async fn test_sequential_appends_with_correct_expected_sequence(pool: PgPool) {
    let store = PgEventStore::new(pool);

    store
        .append(&org("org-A"), 0, &[make_pending_event("a"), make_pending_event("b")])
        .await
        .unwrap();
    store
        .append(&org("org-A"), 2, &[make_pending_event("c"), make_pending_event("d")])
        .await
        .unwrap();

    let loaded = store.load_events("org", "org-A").await.unwrap();
    assert_eq!(loaded.len(), 4);
    for (i, event) in loaded.iter().enumerate() {
        assert_eq!(event.sequence, i64::try_from(i + 1).unwrap());
    }
    assert!(loaded.windows(2).all(|w| w[0].position < w[1].position));
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_query_filters_and_pages_in_global_order(pool: PgPool) {
    let store = PgEventStore::new(pool);
    store.append(&org("org-A"), 0, &[make_pending_event("added")]).await.unwrap();
    store.append(&org("org-B"), 0, &[make_pending_event("added")]).await.unwrap();
    store.append(&org("org-A"), 1, &[make_pending_event("changed")]).await.unwrap();

    let changed = store
        .query(&EventFilter::new().event_types(["changed"]))
        .await
        .unwrap();
    assert_eq!(changed.len(), 1);
    assert_eq!(changed[0].sequence, 2);

    let first = store.query(&EventFilter::new().limit(2)).await.unwrap();
    assert_eq!(first.len(), 2);
    let rest = store
        .query(&EventFilter::new().after(first[1].position))
        .await
        .unwrap();
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].event_type, "changed");
}

// --- concurrency ---

#[sqlx::test(migrations = "../../migrations")]
async fn test_stale_expected_sequence_is_rejected(pool: PgPool) {
    let store = PgEventStore::new(pool);
    store
        .append(&org("org-A"), 0, &[make_pending_event("a"), make_pending_event("b")])
        .await
        .unwrap();

    let result = store.append(&org("org-A"), 0, &[make_pending_event("c")]).await;

    match result {
        Err(DomainError::ConcurrencyConflict {
            aggregate_id,
            expected,
            actual,
        }) => {
            assert_eq!(aggregate_id, "org-A");
            assert_eq!(expected, 0);
            assert_eq!(actual, 2);
        }
        other => panic!("expected ConcurrencyConflict, got {other:?}"),
    }
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_concurrent_appends_exactly_one_wins(pool: PgPool) {
    let store = Arc::new(PgEventStore::new(pool));
    let mut tasks = Vec::new();
    for _ in 0..8 {
        let store = Arc::clone(&store);
        tasks.push(tokio::spawn(async move {
            store
                .append(&org("org-A"), 0, &[make_pending_event("a")])
                .await
        }));
    }

    let mut successes = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => successes += 1,
            Err(DomainError::ConcurrencyConflict { .. }) => {}
            Err(other) => panic!("unexpected error {other:?}"),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(store.load_events("org", "org-A").await.unwrap().len(), 1);
}

// --- edge cases ---

#[sqlx::test(migrations = "../../migrations")]
async fn test_append_empty_events_is_noop(pool: PgPool) {
    let store = PgEventStore::new(pool);

    store.append(&org("org-A"), 0, &[]).await.unwrap();

    assert!(store.load_events("org", "org-A").await.unwrap().is_empty());
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_schema_rejects_unknown_event_type_before_writing(pool: PgPool) {
    let registry: EventRegistry<serde_json::Value> = EventRegistry::new().register("known", Ok);
    let store = PgEventStore::new(pool).with_schema(Arc::new(registry));

    let result = store
        .append(&org("org-A"), 0, &[make_pending_event("unknown")])
        .await;

    assert!(matches!(result, Err(DomainError::ConstraintViolation(_))));
    assert!(store.load_events("org", "org-A").await.unwrap().is_empty());
}

// --- payload serialization ---

#[sqlx::test(migrations = "../../migrations")]
async fn test_complex_json_payload_round_trip(pool: PgPool) {
    let store = PgEventStore::new(pool);
    let complex_payload = serde_json::json!({
        "nested": {"key": "value", "number": 42},
        "array": [1, "two", null, true, false],
        "empty_object": {}
    });
    let mut event = make_pending_event("a");
    event.payload = complex_payload.clone();

    store.append(&org("org-A"), 0, &[event]).await.unwrap();

    let loaded = store.load_events("org", "org-A").await.unwrap();
    assert_eq!(loaded[0].payload, complex_payload);
}
