//! Command handlers for the policy context.
//!
//! Each handler loads the owner's policy, applies the command, and appends the
//! resulting events with the loaded sequence as the expected sequence.

use tracing::{info, instrument};
use warden_core::aggregate::{self, AggregateRoot};
use warden_core::clock::Clock;
use warden_core::command::Command;
use warden_core::error::DomainError;
use warden_core::store::{EventStore, StoredEvent};

use crate::domain::aggregates::{LockoutPolicy, MailTextPolicy, OrgIamPolicy};
use crate::domain::commands::{
    AddLockoutPolicy, AddMailText, AddOrgIamPolicy, ChangeLockoutPolicy, ChangeMailText,
    ChangeOrgIamPolicy, RemoveLockoutPolicy, RemoveOrgIamPolicy,
};

/// Result of a successfully handled command.
#[derive(Debug)]
pub struct PolicyCommandResult {
    /// The aggregate ID affected by the command.
    pub aggregate_id: String,
    /// Stream sequence after the append.
    pub sequence: i64,
    /// The stored events produced and persisted.
    pub stored_events: Vec<StoredEvent>,
}

async fn persist<A: AggregateRoot>(
    command: &dyn Command,
    store: &dyn EventStore,
    policy: &mut A,
) -> Result<PolicyCommandResult, DomainError> {
    let stored_events = aggregate::commit(store, policy).await?;
    info!(
        command = command.command_type(),
        aggregate_id = %policy.aggregate().aggregate_id,
        sequence = policy.sequence(),
        "policy command applied"
    );
    Ok(PolicyCommandResult {
        aggregate_id: policy.aggregate().aggregate_id.clone(),
        sequence: policy.sequence(),
        stored_events,
    })
}

/// Handles `AddLockoutPolicy`.
///
/// # Errors
///
/// Returns `DomainError::ConstraintViolation` if the owner already has an
/// active policy, and propagates store errors.
#[instrument(skip_all, fields(owner = %command.owner))]
pub async fn handle_add_lockout_policy(
    command: &AddLockoutPolicy,
    clock: &dyn Clock,
    store: &dyn EventStore,
) -> Result<PolicyCommandResult, DomainError> {
    let mut policy = aggregate::load(store, LockoutPolicy::new(&command.owner)).await?;
    policy.add(command.settings, &command.editor, clock)?;
    persist(command, store, &mut policy).await
}

/// Handles `ChangeLockoutPolicy`.
///
/// # Errors
///
/// Returns `DomainError::NotFound` without an active policy,
/// `DomainError::ConstraintViolation` if nothing changes, and propagates store
/// errors.
#[instrument(skip_all, fields(owner = %command.owner))]
pub async fn handle_change_lockout_policy(
    command: &ChangeLockoutPolicy,
    clock: &dyn Clock,
    store: &dyn EventStore,
) -> Result<PolicyCommandResult, DomainError> {
    let mut policy = aggregate::load(store, LockoutPolicy::new(&command.owner)).await?;
    policy.change(command.settings, &command.editor, clock)?;
    persist(command, store, &mut policy).await
}

/// Handles `RemoveLockoutPolicy`.
///
/// # Errors
///
/// Returns `DomainError::ConstraintViolation` for the instance default,
/// `DomainError::NotFound` without an active policy, and propagates store
/// errors.
#[instrument(skip_all, fields(owner = %command.owner))]
pub async fn handle_remove_lockout_policy(
    command: &RemoveLockoutPolicy,
    clock: &dyn Clock,
    store: &dyn EventStore,
) -> Result<PolicyCommandResult, DomainError> {
    let mut policy = aggregate::load(store, LockoutPolicy::new(&command.owner)).await?;
    policy.remove(&command.editor, clock)?;
    persist(command, store, &mut policy).await
}

/// Handles `AddOrgIamPolicy`.
///
/// # Errors
///
/// Returns `DomainError::ConstraintViolation` if the owner already has an
/// active policy, and propagates store errors.
#[instrument(skip_all, fields(owner = %command.owner))]
pub async fn handle_add_org_iam_policy(
    command: &AddOrgIamPolicy,
    clock: &dyn Clock,
    store: &dyn EventStore,
) -> Result<PolicyCommandResult, DomainError> {
    let mut policy = aggregate::load(store, OrgIamPolicy::new(&command.owner)).await?;
    policy.add(command.settings, &command.editor, clock)?;
    persist(command, store, &mut policy).await
}

/// Handles `ChangeOrgIamPolicy`.
///
/// # Errors
///
/// Returns `DomainError::NotFound` without an active policy,
/// `DomainError::ConstraintViolation` if nothing changes, and propagates store
/// errors.
#[instrument(skip_all, fields(owner = %command.owner))]
pub async fn handle_change_org_iam_policy(
    command: &ChangeOrgIamPolicy,
    clock: &dyn Clock,
    store: &dyn EventStore,
) -> Result<PolicyCommandResult, DomainError> {
    let mut policy = aggregate::load(store, OrgIamPolicy::new(&command.owner)).await?;
    policy.change(command.settings, &command.editor, clock)?;
    persist(command, store, &mut policy).await
}

/// Handles `RemoveOrgIamPolicy`.
///
/// # Errors
///
/// Returns `DomainError::ConstraintViolation` for the instance default,
/// `DomainError::NotFound` without an active policy, and propagates store
/// errors.
#[instrument(skip_all, fields(owner = %command.owner))]
pub async fn handle_remove_org_iam_policy(
    command: &RemoveOrgIamPolicy,
    clock: &dyn Clock,
    store: &dyn EventStore,
) -> Result<PolicyCommandResult, DomainError> {
    let mut policy = aggregate::load(store, OrgIamPolicy::new(&command.owner)).await?;
    policy.remove(&command.editor, clock)?;
    persist(command, store, &mut policy).await
}

/// Handles `AddMailText`.
///
/// # Errors
///
/// Returns `DomainError::ConstraintViolation` for a blank key or if the mail
/// text is already set, and propagates store errors.
#[instrument(skip_all, fields(iam_id = %command.iam_id, key = %command.key))]
pub async fn handle_add_mail_text(
    command: &AddMailText,
    clock: &dyn Clock,
    store: &dyn EventStore,
) -> Result<PolicyCommandResult, DomainError> {
    let zero = MailTextPolicy::new(&command.iam_id, command.key.clone());
    let mut policy = aggregate::load(store, zero).await?;
    policy.add(command.content.clone(), &command.editor, clock)?;
    persist(command, store, &mut policy).await
}

/// Handles `ChangeMailText`.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the mail text was never set,
/// `DomainError::ConstraintViolation` if nothing changes, and propagates store
/// errors.
#[instrument(skip_all, fields(iam_id = %command.iam_id, key = %command.key))]
pub async fn handle_change_mail_text(
    command: &ChangeMailText,
    clock: &dyn Clock,
    store: &dyn EventStore,
) -> Result<PolicyCommandResult, DomainError> {
    let zero = MailTextPolicy::new(&command.iam_id, command.key.clone());
    let mut policy = aggregate::load(store, zero).await?;
    policy.change(&command.content, &command.editor, clock)?;
    persist(command, store, &mut policy).await
}
