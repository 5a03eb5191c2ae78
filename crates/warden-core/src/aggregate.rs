//! Aggregate root abstraction and the load/commit cycle around it.

use tracing::instrument;

use crate::error::DomainError;
use crate::event::{AggregateRef, DomainEvent};
use crate::store::{EventStore, PendingEvent, StoredEvent};

/// Trait for aggregate roots that reconstitute from event history.
pub trait AggregateRoot: Send + Sync {
    /// The event type this aggregate produces and consumes.
    type Event: DomainEvent + Clone;

    /// Returns the aggregate identity.
    fn aggregate(&self) -> &AggregateRef;

    /// Returns the sequence of the last applied event (0 if none).
    fn sequence(&self) -> i64;

    /// Apply an event to mutate internal state. Must set the sequence to the
    /// event's sequence.
    fn apply(&mut self, event: &Self::Event);

    /// Returns `true` if the aggregate folds events of `event_type`.
    ///
    /// Several contexts write to one stream (an `iam` aggregate carries both
    /// policies and members). Events an aggregate does not fold still move its
    /// sequence, so its next append expects the real stream head.
    fn folds(&self, event_type: &str) -> bool {
        let _ = event_type;
        true
    }

    /// Moves the sequence past an event this aggregate does not fold.
    fn skip(&mut self, sequence: i64);

    /// Returns uncommitted events produced by command handling.
    fn uncommitted_events(&self) -> &[Self::Event];

    /// Clears uncommitted events after persistence.
    fn clear_uncommitted_events(&mut self);

    /// Returns the next sequence number for a new event.
    #[allow(clippy::cast_possible_wrap)]
    fn next_sequence(&self) -> i64 {
        self.sequence() + self.uncommitted_events().len() as i64 + 1
    }
}

/// Folds `stored` into `aggregate`, in order.
///
/// # Errors
///
/// Returns `DomainError::ConstraintViolation` if an event does not decode and
/// `DomainError::Infrastructure` if the stream has a gap or belongs to another
/// aggregate.
pub fn replay<A: AggregateRoot>(mut aggregate: A, stored: &[StoredEvent]) -> Result<A, DomainError> {
    for event in stored {
        if event.aggregate_id != aggregate.aggregate().aggregate_id {
            return Err(DomainError::Infrastructure(format!(
                "event {} belongs to aggregate {}, not {}",
                event.event_id,
                event.aggregate_id,
                aggregate.aggregate().aggregate_id
            )));
        }
        if event.sequence != aggregate.sequence() + 1 {
            return Err(DomainError::Infrastructure(format!(
                "sequence gap in aggregate {}: expected {}, found {}",
                event.aggregate_id,
                aggregate.sequence() + 1,
                event.sequence
            )));
        }
        if !aggregate.folds(&event.event_type) {
            aggregate.skip(event.sequence);
            continue;
        }
        let typed = A::Event::from_stored(event)?;
        aggregate.apply(&typed);
    }
    Ok(aggregate)
}

/// Loads `aggregate`'s stream from `store` and replays it.
///
/// `aggregate` must be zero-valued; its identity selects the stream.
///
/// # Errors
///
/// Propagates store and replay errors.
#[instrument(skip_all, fields(
    aggregate_type = %aggregate.aggregate().aggregate_type,
    aggregate_id = %aggregate.aggregate().aggregate_id,
))]
pub async fn load<A: AggregateRoot>(store: &dyn EventStore, aggregate: A) -> Result<A, DomainError> {
    let identity = aggregate.aggregate().clone();
    let stored = store
        .load_events(&identity.aggregate_type, &identity.aggregate_id)
        .await?;
    replay(aggregate, &stored)
}

/// Appends the aggregate's uncommitted events with its loaded sequence as the
/// expected sequence, then applies them so the aggregate reflects the new
/// stream head.
///
/// The core never retries: a `ConcurrencyConflict` leaves the aggregate
/// untouched and the caller reloads.
///
/// # Errors
///
/// Propagates store errors.
pub async fn commit<A: AggregateRoot>(
    store: &dyn EventStore,
    aggregate: &mut A,
) -> Result<Vec<StoredEvent>, DomainError> {
    let pending: Vec<PendingEvent> = aggregate
        .uncommitted_events()
        .iter()
        .map(DomainEvent::to_pending)
        .collect();
    if pending.is_empty() {
        return Ok(Vec::new());
    }

    let stored = store
        .append(aggregate.aggregate(), aggregate.sequence(), &pending)
        .await?;

    let committed: Vec<A::Event> = aggregate.uncommitted_events().to_vec();
    aggregate.clear_uncommitted_events();
    for event in &committed {
        aggregate.apply(event);
    }
    Ok(stored)
}
