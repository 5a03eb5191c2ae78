//! The instance membership aggregate.
//!
//! Members live on the `iam` stream next to the instance default policies, so
//! the aggregate folds only `iam.member.*` events and skips the rest.

use std::collections::BTreeMap;

use warden_core::aggregate::AggregateRoot;
use warden_core::clock::Clock;
use warden_core::error::DomainError;
use warden_core::event::{AggregateRef, EventMetadata};

use super::events::{MEMBER_EVENT_TYPES, MemberEvent, MemberEventKind, MemberRemoved, MemberRoles};

/// Aggregate type of the instance.
pub const IAM_AGGREGATE_TYPE: &str = "iam";

/// Sorts `roles` and drops duplicates and blanks.
#[must_use]
pub fn normalize_roles(roles: &[String]) -> Vec<String> {
    let mut roles: Vec<String> = roles
        .iter()
        .map(|role| role.trim().to_owned())
        .filter(|role| !role.is_empty())
        .collect();
    roles.sort_unstable();
    roles.dedup();
    roles
}

/// Role grants of every member of one instance.
#[derive(Debug)]
pub struct IamMembers {
    aggregate: AggregateRef,
    sequence: i64,
    members: BTreeMap<String, Vec<String>>,
    uncommitted_events: Vec<MemberEvent>,
}

impl IamMembers {
    /// Creates the empty membership of instance `iam_id`.
    #[must_use]
    pub fn new(iam_id: &str) -> Self {
        Self {
            aggregate: AggregateRef::new(IAM_AGGREGATE_TYPE, iam_id, iam_id),
            sequence: 0,
            members: BTreeMap::new(),
            uncommitted_events: Vec::new(),
        }
    }

    /// Roles of `user_id`, if a member.
    #[must_use]
    pub fn roles(&self, user_id: &str) -> Option<&[String]> {
        self.members.get(user_id).map(Vec::as_slice)
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Returns `true` without members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Grants `roles` to a new member.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ConstraintViolation` if the user is already a
    /// member or no role is given.
    pub fn add(
        &mut self,
        user_id: &str,
        roles: &[String],
        editor: &str,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        let roles = self.require_roles(user_id, roles)?;
        if self.members.contains_key(user_id) {
            return Err(DomainError::ConstraintViolation(format!(
                "{user_id} is already a member of {}",
                self.aggregate.aggregate_id
            )));
        }
        self.record(
            MemberEventKind::Added(MemberRoles {
                user_id: user_id.to_owned(),
                roles,
            }),
            editor,
            clock,
        );
        Ok(())
    }

    /// Replaces a member's roles.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` for non-members and
    /// `DomainError::ConstraintViolation` if no role is given or the roles
    /// are unchanged.
    pub fn change(
        &mut self,
        user_id: &str,
        roles: &[String],
        editor: &str,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        let current = self.member(user_id)?;
        let roles = self.require_roles(user_id, roles)?;
        if *current == roles {
            return Err(DomainError::ConstraintViolation(format!(
                "roles of {user_id} are unchanged"
            )));
        }
        self.record(
            MemberEventKind::Changed(MemberRoles {
                user_id: user_id.to_owned(),
                roles,
            }),
            editor,
            clock,
        );
        Ok(())
    }

    /// Removes a member.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` for non-members.
    pub fn remove(&mut self, user_id: &str, editor: &str, clock: &dyn Clock) -> Result<(), DomainError> {
        self.member(user_id)?;
        self.record(
            MemberEventKind::Removed(MemberRemoved {
                user_id: user_id.to_owned(),
            }),
            editor,
            clock,
        );
        Ok(())
    }

    fn member(&self, user_id: &str) -> Result<&Vec<String>, DomainError> {
        self.members.get(user_id).ok_or_else(|| {
            DomainError::NotFound(format!(
                "member {user_id} of {}",
                self.aggregate.aggregate_id
            ))
        })
    }

    fn require_roles(&self, user_id: &str, roles: &[String]) -> Result<Vec<String>, DomainError> {
        let roles = normalize_roles(roles);
        if roles.is_empty() {
            return Err(DomainError::ConstraintViolation(format!(
                "member {user_id} of {} needs at least one role",
                self.aggregate.aggregate_id
            )));
        }
        Ok(roles)
    }

    fn record(&mut self, kind: MemberEventKind, editor: &str, clock: &dyn Clock) {
        let metadata = EventMetadata::pending(
            &self.aggregate,
            kind.event_type(),
            self.next_sequence(),
            editor,
            clock,
        );
        self.uncommitted_events.push(MemberEvent { metadata, kind });
    }
}

impl AggregateRoot for IamMembers {
    type Event = MemberEvent;

    fn aggregate(&self) -> &AggregateRef {
        &self.aggregate
    }

    fn sequence(&self) -> i64 {
        self.sequence
    }

    fn apply(&mut self, event: &Self::Event) {
        match &event.kind {
            MemberEventKind::Added(grant) | MemberEventKind::Changed(grant) => {
                self.members
                    .insert(grant.user_id.clone(), grant.roles.clone());
            }
            MemberEventKind::Removed(removed) => {
                self.members.remove(&removed.user_id);
            }
        }
        self.sequence = event.metadata.sequence;
    }

    fn folds(&self, event_type: &str) -> bool {
        MEMBER_EVENT_TYPES.contains(&event_type)
    }

    fn skip(&mut self, sequence: i64) {
        self.sequence = sequence;
    }

    fn uncommitted_events(&self) -> &[Self::Event] {
        &self.uncommitted_events
    }

    fn clear_uncommitted_events(&mut self) {
        self.uncommitted_events.clear();
    }
}
