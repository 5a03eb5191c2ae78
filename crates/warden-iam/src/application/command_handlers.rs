//! Command handlers for the member context.

use tracing::{info, instrument};
use warden_core::aggregate::{self, AggregateRoot};
use warden_core::clock::Clock;
use warden_core::command::Command;
use warden_core::error::DomainError;
use warden_core::store::{EventStore, StoredEvent};

use crate::domain::aggregates::IamMembers;
use crate::domain::commands::{AddIamMember, ChangeIamMember, RemoveIamMember};

/// Result of a successfully handled member command.
#[derive(Debug)]
pub struct MemberCommandResult {
    /// The instance.
    pub iam_id: String,
    /// Stream sequence after the append.
    pub sequence: i64,
    /// The stored events produced and persisted.
    pub stored_events: Vec<StoredEvent>,
}

async fn persist(
    command: &dyn Command,
    store: &dyn EventStore,
    members: &mut IamMembers,
) -> Result<MemberCommandResult, DomainError> {
    let stored_events = aggregate::commit(store, members).await?;
    info!(
        command = command.command_type(),
        iam_id = %members.aggregate().aggregate_id,
        sequence = members.sequence(),
        "member command applied"
    );
    Ok(MemberCommandResult {
        iam_id: members.aggregate().aggregate_id.clone(),
        sequence: members.sequence(),
        stored_events,
    })
}

/// Handles `AddIamMember`.
///
/// # Errors
///
/// Returns `DomainError::ConstraintViolation` if the user is already a member
/// or no role is given, and propagates store errors.
#[instrument(skip_all, fields(iam_id = %command.iam_id, user_id = %command.user_id))]
pub async fn handle_add_iam_member(
    command: &AddIamMember,
    clock: &dyn Clock,
    store: &dyn EventStore,
) -> Result<MemberCommandResult, DomainError> {
    let mut members = aggregate::load(store, IamMembers::new(&command.iam_id)).await?;
    members.add(&command.user_id, &command.roles, &command.editor, clock)?;
    persist(command, store, &mut members).await
}

/// Handles `ChangeIamMember`.
///
/// # Errors
///
/// Returns `DomainError::NotFound` for non-members,
/// `DomainError::ConstraintViolation` for empty or unchanged roles, and
/// propagates store errors.
#[instrument(skip_all, fields(iam_id = %command.iam_id, user_id = %command.user_id))]
pub async fn handle_change_iam_member(
    command: &ChangeIamMember,
    clock: &dyn Clock,
    store: &dyn EventStore,
) -> Result<MemberCommandResult, DomainError> {
    let mut members = aggregate::load(store, IamMembers::new(&command.iam_id)).await?;
    members.change(&command.user_id, &command.roles, &command.editor, clock)?;
    persist(command, store, &mut members).await
}

/// Handles `RemoveIamMember`.
///
/// # Errors
///
/// Returns `DomainError::NotFound` for non-members and propagates store
/// errors.
#[instrument(skip_all, fields(iam_id = %command.iam_id, user_id = %command.user_id))]
pub async fn handle_remove_iam_member(
    command: &RemoveIamMember,
    clock: &dyn Clock,
    store: &dyn EventStore,
) -> Result<MemberCommandResult, DomainError> {
    let mut members = aggregate::load(store, IamMembers::new(&command.iam_id)).await?;
    members.remove(&command.user_id, &command.editor, clock)?;
    persist(command, store, &mut members).await
}
