//! `PostgreSQL` implementation of the `EventStore` trait.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{debug, instrument};
use uuid::Uuid;

use warden_core::error::DomainError;
use warden_core::event::AggregateRef;
use warden_core::registry::EventSchema;
use warden_core::store::{EventFilter, EventStore, PendingEvent, StoredEvent, validate_append};

use crate::error::{from_sqlx, is_unique_violation};
use crate::schema::APPEND_LOCK_KEY;

const EVENT_COLUMNS: &str = "position, event_id, aggregate_type, aggregate_id, aggregate_version, \
     resource_owner, sequence, event_type, payload, editor, created_at";

#[derive(Debug, sqlx::FromRow)]
struct EventRow {
    position: i64,
    event_id: Uuid,
    aggregate_type: String,
    aggregate_id: String,
    aggregate_version: String,
    resource_owner: String,
    sequence: i64,
    event_type: String,
    payload: sqlx::types::Json<serde_json::Value>,
    editor: String,
    created_at: DateTime<Utc>,
}

impl From<EventRow> for StoredEvent {
    fn from(row: EventRow) -> Self {
        Self {
            position: row.position,
            event_id: row.event_id,
            aggregate_type: row.aggregate_type,
            aggregate_id: row.aggregate_id,
            aggregate_version: row.aggregate_version,
            resource_owner: row.resource_owner,
            sequence: row.sequence,
            event_type: row.event_type,
            payload: row.payload.0,
            editor: row.editor,
            created_at: row.created_at,
        }
    }
}

/// PostgreSQL-backed event store.
#[derive(Clone)]
pub struct PgEventStore {
    pool: PgPool,
    schema: Option<Arc<dyn EventSchema>>,
}

impl std::fmt::Debug for PgEventStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgEventStore")
            .field("pool", &self.pool)
            .field("schema", &self.schema.is_some())
            .finish()
    }
}

impl PgEventStore {
    /// Creates a new `PgEventStore` that accepts any well-formed event.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool, schema: None }
    }

    /// Rejects appends whose events do not pass `schema`.
    #[must_use]
    pub fn with_schema(mut self, schema: Arc<dyn EventSchema>) -> Self {
        self.schema = Some(schema);
        self
    }

    async fn current_sequence(
        executor: impl sqlx::PgExecutor<'_>,
        aggregate: &AggregateRef,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            r"
            SELECT COALESCE(MAX(sequence), 0)
            FROM eventstore.events
            WHERE aggregate_type = $1 AND aggregate_id = $2
            ",
        )
        .bind(&aggregate.aggregate_type)
        .bind(&aggregate.aggregate_id)
        .fetch_one(executor)
        .await
    }

    async fn conflict(&self, aggregate: &AggregateRef, expected: i64) -> DomainError {
        match Self::current_sequence(&self.pool, aggregate).await {
            Ok(actual) => DomainError::ConcurrencyConflict {
                aggregate_id: aggregate.aggregate_id.clone(),
                expected,
                actual,
            },
            Err(e) => from_sqlx(e),
        }
    }
}

#[async_trait]
impl EventStore for PgEventStore {
    #[instrument(skip(self, events), fields(
        aggregate_type = %aggregate.aggregate_type,
        aggregate_id = %aggregate.aggregate_id,
        count = events.len(),
    ))]
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

        let mut tx = self.pool.begin().await.map_err(from_sqlx)?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(APPEND_LOCK_KEY)
            .execute(&mut *tx)
            .await
            .map_err(from_sqlx)?;

        let actual = Self::current_sequence(&mut *tx, aggregate)
            .await
            .map_err(from_sqlx)?;
        if actual != expected_sequence {
            return Err(DomainError::ConcurrencyConflict {
                aggregate_id: aggregate.aggregate_id.clone(),
                expected: expected_sequence,
                actual,
            });
        }

        let mut qb = QueryBuilder::<Postgres>::new(
            "INSERT INTO eventstore.events (event_id, aggregate_type, aggregate_id, \
             aggregate_version, resource_owner, sequence, event_type, payload, editor, created_at) ",
        );
        qb.push_values(events.iter().zip(1_i64..), |mut b, (event, offset)| {
            b.push_bind(event.event_id)
                .push_bind(&aggregate.aggregate_type)
                .push_bind(&aggregate.aggregate_id)
                .push_bind(&aggregate.version)
                .push_bind(&aggregate.resource_owner)
                .push_bind(expected_sequence + offset)
                .push_bind(&event.event_type)
                .push_bind(sqlx::types::Json(&event.payload))
                .push_bind(&event.editor)
                .push_bind(event.created_at);
        });
        qb.push(" RETURNING ").push(EVENT_COLUMNS);

        let rows: Vec<EventRow> = match qb.build_query_as().fetch_all(&mut *tx).await {
            Ok(rows) => rows,
            Err(e) if is_unique_violation(&e) => {
                drop(tx);
                return Err(self.conflict(aggregate, expected_sequence).await);
            }
            Err(e) => return Err(from_sqlx(e)),
        };

        tx.commit().await.map_err(from_sqlx)?;

        let mut stored: Vec<StoredEvent> = rows.into_iter().map(StoredEvent::from).collect();
        stored.sort_by_key(|e| e.sequence);
        debug!(
            first_position = stored.first().map(|e| e.position),
            "appended events"
        );
        Ok(stored)
    }

    #[instrument(skip(self), level = "debug")]
    async fn query(&self, filter: &EventFilter) -> Result<Vec<StoredEvent>, DomainError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(EVENT_COLUMNS)
            .push(" FROM eventstore.events WHERE position > ")
            .push_bind(filter.after_position);

        if !filter.aggregate_types.is_empty() {
            qb.push(" AND aggregate_type = ANY(")
                .push_bind(filter.aggregate_types.clone())
                .push(")");
        }
        if !filter.event_types.is_empty() {
            qb.push(" AND event_type = ANY(")
                .push_bind(filter.event_types.clone())
                .push(")");
        }
        if let Some(aggregate_id) = &filter.aggregate_id {
            qb.push(" AND aggregate_id = ").push_bind(aggregate_id.clone());
        }
        if let Some(resource_owner) = &filter.resource_owner {
            qb.push(" AND resource_owner = ")
                .push_bind(resource_owner.clone());
        }

        qb.push(" ORDER BY position ASC");
        if let Some(limit) = filter.limit {
            qb.push(" LIMIT ")
                .push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        let rows: Vec<EventRow> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(from_sqlx)?;

        Ok(rows.into_iter().map(StoredEvent::from).collect())
    }
}
