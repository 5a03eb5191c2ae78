//! Aggregate roots for the policy context.
//!
//! Both policies live on their owner's stream. An `iam` owner carries the
//! instance default; an `org` owner carries an override. Each aggregate only
//! folds its own event types and skips the rest of the stream.

use std::fmt;

use serde::{Deserialize, Serialize};
use warden_core::aggregate::AggregateRoot;
use warden_core::clock::Clock;
use warden_core::error::DomainError;
use warden_core::event::{AggregateRef, EventMetadata};

use super::events::{
    LOCKOUT_POLICY_EVENT_TYPES, LockoutPolicyChanged, LockoutSettings, MAIL_TEXT_EVENT_TYPES,
    MailTextAdded, MailTextChanged, MailTextContent, MailTextKey, ORG_IAM_POLICY_EVENT_TYPES,
    OrgIamPolicyChanged, OrgIamSettings, PolicyEvent, PolicyEventKind, PolicyRemoved,
};

/// Aggregate type of the instance.
pub const IAM_AGGREGATE_TYPE: &str = "iam";
/// Aggregate type of an organization.
pub const ORG_AGGREGATE_TYPE: &str = "org";

/// Whose policy a command targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PolicyOwner {
    /// The instance. Its policy is the default for every org.
    Iam(String),
    /// An organization override.
    Org(String),
}

impl PolicyOwner {
    /// Stream the owner's policy events are appended to.
    #[must_use]
    pub fn aggregate(&self) -> AggregateRef {
        match self {
            Self::Iam(id) => AggregateRef::new(IAM_AGGREGATE_TYPE, id, id),
            Self::Org(id) => AggregateRef::new(ORG_AGGREGATE_TYPE, id, id),
        }
    }

    /// Returns `true` for the instance owner.
    #[must_use]
    pub fn is_default(&self) -> bool {
        matches!(self, Self::Iam(_))
    }
}

impl fmt::Display for PolicyOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Iam(id) => write!(f, "{IAM_AGGREGATE_TYPE}/{id}"),
            Self::Org(id) => write!(f, "{ORG_AGGREGATE_TYPE}/{id}"),
        }
    }
}

/// Lifecycle of a policy on one owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyState {
    /// Never added.
    #[default]
    Unspecified,
    /// In effect.
    Active,
    /// Removed from an org; the default applies again.
    Removed,
}

impl PolicyState {
    /// Column value for this state.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unspecified => "unspecified",
            Self::Active => "active",
            Self::Removed => "removed",
        }
    }

    /// Parses a column value.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "unspecified" => Some(Self::Unspecified),
            "active" => Some(Self::Active),
            "removed" => Some(Self::Removed),
            _ => None,
        }
    }
}

fn pending_event(
    aggregate: &AggregateRef,
    sequence: i64,
    kind: PolicyEventKind,
    editor: &str,
    clock: &dyn Clock,
) -> PolicyEvent {
    PolicyEvent {
        metadata: EventMetadata::pending(aggregate, kind.event_type(), sequence, editor, clock),
        kind,
    }
}

/// The lockout policy of one owner.
#[derive(Debug)]
pub struct LockoutPolicy {
    aggregate: AggregateRef,
    sequence: i64,
    state: PolicyState,
    settings: LockoutSettings,
    uncommitted_events: Vec<PolicyEvent>,
}

impl LockoutPolicy {
    /// Creates the zero-valued policy of `owner`.
    #[must_use]
    pub fn new(owner: &PolicyOwner) -> Self {
        Self {
            aggregate: owner.aggregate(),
            sequence: 0,
            state: PolicyState::Unspecified,
            settings: LockoutSettings::default(),
            uncommitted_events: Vec::new(),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> PolicyState {
        self.state
    }

    /// Current settings. Zero-valued unless active.
    #[must_use]
    pub fn settings(&self) -> LockoutSettings {
        self.settings
    }

    /// Returns `true` if this is the instance default.
    #[must_use]
    pub fn is_default(&self) -> bool {
        self.aggregate.aggregate_type == IAM_AGGREGATE_TYPE
    }

    /// Sets the policy, producing a `policy.lockout.added` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ConstraintViolation` if a policy is already active.
    pub fn add(
        &mut self,
        settings: LockoutSettings,
        editor: &str,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if self.state == PolicyState::Active {
            return Err(DomainError::ConstraintViolation(format!(
                "lockout policy already exists on {}",
                self.aggregate.aggregate_id
            )));
        }
        self.record(PolicyEventKind::LockoutPolicyAdded(settings), editor, clock);
        Ok(())
    }

    /// Moves the policy to `settings`, producing a `policy.lockout.changed`
    /// event carrying only the fields that differ.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if no policy is active and
    /// `DomainError::ConstraintViolation` if nothing would change.
    pub fn change(
        &mut self,
        settings: LockoutSettings,
        editor: &str,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        self.ensure_active()?;
        let change = LockoutPolicyChanged::between(&self.settings, &settings).ok_or_else(|| {
            DomainError::ConstraintViolation(format!(
                "lockout policy on {} is unchanged",
                self.aggregate.aggregate_id
            ))
        })?;
        self.record(PolicyEventKind::LockoutPolicyChanged(change), editor, clock);
        Ok(())
    }

    /// Removes an org override, producing a `policy.lockout.removed` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ConstraintViolation` for the instance default and
    /// `DomainError::NotFound` if no policy is active.
    pub fn remove(&mut self, editor: &str, clock: &dyn Clock) -> Result<(), DomainError> {
        if self.is_default() {
            return Err(DomainError::ConstraintViolation(
                "the default lockout policy cannot be removed".into(),
            ));
        }
        self.ensure_active()?;
        self.record(
            PolicyEventKind::LockoutPolicyRemoved(PolicyRemoved {}),
            editor,
            clock,
        );
        Ok(())
    }

    fn ensure_active(&self) -> Result<(), DomainError> {
        if self.state == PolicyState::Active {
            Ok(())
        } else {
            Err(DomainError::NotFound(format!(
                "lockout policy on {}",
                self.aggregate.aggregate_id
            )))
        }
    }

    fn record(&mut self, kind: PolicyEventKind, editor: &str, clock: &dyn Clock) {
        let event = pending_event(&self.aggregate, self.next_sequence(), kind, editor, clock);
        self.uncommitted_events.push(event);
    }
}

impl AggregateRoot for LockoutPolicy {
    type Event = PolicyEvent;

    fn aggregate(&self) -> &AggregateRef {
        &self.aggregate
    }

    fn sequence(&self) -> i64 {
        self.sequence
    }

    fn apply(&mut self, event: &Self::Event) {
        match &event.kind {
            PolicyEventKind::LockoutPolicyAdded(settings) => {
                self.settings = *settings;
                self.state = PolicyState::Active;
            }
            PolicyEventKind::LockoutPolicyChanged(change) => change.apply_to(&mut self.settings),
            PolicyEventKind::LockoutPolicyRemoved(_) => {
                self.settings = LockoutSettings::default();
                self.state = PolicyState::Removed;
            }
            _ => {}
        }
        self.sequence = event.metadata.sequence;
    }

    fn folds(&self, event_type: &str) -> bool {
        LOCKOUT_POLICY_EVENT_TYPES.contains(&event_type)
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

/// The org IAM policy of one owner.
#[derive(Debug)]
pub struct OrgIamPolicy {
    aggregate: AggregateRef,
    sequence: i64,
    state: PolicyState,
    settings: OrgIamSettings,
    uncommitted_events: Vec<PolicyEvent>,
}

impl OrgIamPolicy {
    /// Creates the zero-valued policy of `owner`.
    #[must_use]
    pub fn new(owner: &PolicyOwner) -> Self {
        Self {
            aggregate: owner.aggregate(),
            sequence: 0,
            state: PolicyState::Unspecified,
            settings: OrgIamSettings::default(),
            uncommitted_events: Vec::new(),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> PolicyState {
        self.state
    }

    /// Current settings.
    #[must_use]
    pub fn settings(&self) -> OrgIamSettings {
        self.settings
    }

    /// Returns `true` if this is the instance default.
    #[must_use]
    pub fn is_default(&self) -> bool {
        self.aggregate.aggregate_type == IAM_AGGREGATE_TYPE
    }

    /// Sets the policy.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ConstraintViolation` if a policy is already active.
    pub fn add(
        &mut self,
        settings: OrgIamSettings,
        editor: &str,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if self.state == PolicyState::Active {
            return Err(DomainError::ConstraintViolation(format!(
                "org iam policy already exists on {}",
                self.aggregate.aggregate_id
            )));
        }
        self.record(PolicyEventKind::OrgIamPolicyAdded(settings), editor, clock);
        Ok(())
    }

    /// Moves the policy to `settings`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if no policy is active and
    /// `DomainError::ConstraintViolation` if nothing would change.
    pub fn change(
        &mut self,
        settings: OrgIamSettings,
        editor: &str,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        self.ensure_active()?;
        let change = OrgIamPolicyChanged::between(&self.settings, &settings).ok_or_else(|| {
            DomainError::ConstraintViolation(format!(
                "org iam policy on {} is unchanged",
                self.aggregate.aggregate_id
            ))
        })?;
        self.record(PolicyEventKind::OrgIamPolicyChanged(change), editor, clock);
        Ok(())
    }

    /// Removes an org override.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ConstraintViolation` for the instance default and
    /// `DomainError::NotFound` if no policy is active.
    pub fn remove(&mut self, editor: &str, clock: &dyn Clock) -> Result<(), DomainError> {
        if self.is_default() {
            return Err(DomainError::ConstraintViolation(
                "the default org iam policy cannot be removed".into(),
            ));
        }
        self.ensure_active()?;
        self.record(
            PolicyEventKind::OrgIamPolicyRemoved(PolicyRemoved {}),
            editor,
            clock,
        );
        Ok(())
    }

    fn ensure_active(&self) -> Result<(), DomainError> {
        if self.state == PolicyState::Active {
            Ok(())
        } else {
            Err(DomainError::NotFound(format!(
                "org iam policy on {}",
                self.aggregate.aggregate_id
            )))
        }
    }

    fn record(&mut self, kind: PolicyEventKind, editor: &str, clock: &dyn Clock) {
        let event = pending_event(&self.aggregate, self.next_sequence(), kind, editor, clock);
        self.uncommitted_events.push(event);
    }
}

impl AggregateRoot for OrgIamPolicy {
    type Event = PolicyEvent;

    fn aggregate(&self) -> &AggregateRef {
        &self.aggregate
    }

    fn sequence(&self) -> i64 {
        self.sequence
    }

    fn apply(&mut self, event: &Self::Event) {
        match &event.kind {
            PolicyEventKind::OrgIamPolicyAdded(settings) => {
                self.settings = *settings;
                self.state = PolicyState::Active;
            }
            PolicyEventKind::OrgIamPolicyChanged(change) => change.apply_to(&mut self.settings),
            PolicyEventKind::OrgIamPolicyRemoved(_) => {
                self.settings = OrgIamSettings::default();
                self.state = PolicyState::Removed;
            }
            _ => {}
        }
        self.sequence = event.metadata.sequence;
    }

    fn folds(&self, event_type: &str) -> bool {
        ORG_IAM_POLICY_EVENT_TYPES.contains(&event_type)
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

/// One mail text of the instance, identified by template and language.
///
/// All mail texts share the instance stream. Replay folds every mail text
/// event and keeps only those carrying this key.
#[derive(Debug)]
pub struct MailTextPolicy {
    aggregate: AggregateRef,
    key: MailTextKey,
    sequence: i64,
    state: PolicyState,
    content: MailTextContent,
    uncommitted_events: Vec<PolicyEvent>,
}

impl MailTextPolicy {
    /// Creates the zero-valued mail text `key` of instance `iam_id`.
    #[must_use]
    pub fn new(iam_id: &str, key: MailTextKey) -> Self {
        Self {
            aggregate: PolicyOwner::Iam(iam_id.to_owned()).aggregate(),
            key,
            sequence: 0,
            state: PolicyState::Unspecified,
            content: MailTextContent::default(),
            uncommitted_events: Vec::new(),
        }
    }

    /// Template and language of this mail text.
    #[must_use]
    pub fn key(&self) -> &MailTextKey {
        &self.key
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> PolicyState {
        self.state
    }

    /// Current text blocks.
    #[must_use]
    pub fn content(&self) -> &MailTextContent {
        &self.content
    }

    /// Sets the mail text, producing an `iam.policy.mail.text.added` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ConstraintViolation` for a blank key or if the
    /// mail text is already set.
    pub fn add(
        &mut self,
        content: MailTextContent,
        editor: &str,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        self.key.validate()?;
        if self.state == PolicyState::Active {
            return Err(DomainError::ConstraintViolation(format!(
                "mail text {} already exists on {}",
                self.key, self.aggregate.aggregate_id
            )));
        }
        let added = MailTextAdded {
            key: self.key.clone(),
            content,
        };
        self.record(PolicyEventKind::MailTextAdded(added), editor, clock);
        Ok(())
    }

    /// Moves the mail text to `content`, producing an
    /// `iam.policy.mail.text.changed` event with the differing blocks.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if the mail text was never set and
    /// `DomainError::ConstraintViolation` if nothing would change.
    pub fn change(
        &mut self,
        content: &MailTextContent,
        editor: &str,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if self.state != PolicyState::Active {
            return Err(DomainError::NotFound(format!(
                "mail text {} on {}",
                self.key, self.aggregate.aggregate_id
            )));
        }
        let change = MailTextChanged::between(&self.key, &self.content, content).ok_or_else(|| {
            DomainError::ConstraintViolation(format!(
                "mail text {} on {} is unchanged",
                self.key, self.aggregate.aggregate_id
            ))
        })?;
        self.record(PolicyEventKind::MailTextChanged(change), editor, clock);
        Ok(())
    }

    fn record(&mut self, kind: PolicyEventKind, editor: &str, clock: &dyn Clock) {
        let event = pending_event(&self.aggregate, self.next_sequence(), kind, editor, clock);
        self.uncommitted_events.push(event);
    }
}

impl AggregateRoot for MailTextPolicy {
    type Event = PolicyEvent;

    fn aggregate(&self) -> &AggregateRef {
        &self.aggregate
    }

    fn sequence(&self) -> i64 {
        self.sequence
    }

    fn apply(&mut self, event: &Self::Event) {
        match &event.kind {
            PolicyEventKind::MailTextAdded(added) if added.key == self.key => {
                self.content = added.content.clone();
                self.state = PolicyState::Active;
            }
            PolicyEventKind::MailTextChanged(change) if change.key == self.key => {
                change.apply_to(&mut self.content);
            }
            _ => {}
        }
        self.sequence = event.metadata.sequence;
    }

    fn folds(&self, event_type: &str) -> bool {
        MAIL_TEXT_EVENT_TYPES.contains(&event_type)
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

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use warden_core::aggregate::replay;
    use warden_core::event::DomainEvent;
    use warden_core::store::StoredEvent;
    use warden_test_support::{FixedClock, stored_event};

    use crate::domain::events::{
        LOCKOUT_POLICY_ADDED_EVENT_TYPE, LOCKOUT_POLICY_CHANGED_EVENT_TYPE,
        MAIL_TEXT_ADDED_EVENT_TYPE, MAIL_TEXT_CHANGED_EVENT_TYPE,
        ORG_IAM_POLICY_ADDED_EVENT_TYPE,
    };

    fn clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap())
    }

    fn org_a() -> PolicyOwner {
        PolicyOwner::Org("org-A".into())
    }

    fn settings(max: u64, show: bool) -> LockoutSettings {
        LockoutSettings {
            max_password_attempts: max,
            show_failures: show,
        }
    }

    fn active_lockout() -> LockoutPolicy {
        let events = vec![stored_event(
            1,
            "org-A",
            1,
            LOCKOUT_POLICY_ADDED_EVENT_TYPE,
            json!({"max_password_attempts": 5, "show_failures": false}),
        )];
        replay(LockoutPolicy::new(&org_a()), &events).unwrap()
    }

    #[test]
    fn test_added_then_changed_replays_to_latest_settings() {
        // Arrange
        let events = vec![
            stored_event(
                1,
                "org-A",
                1,
                LOCKOUT_POLICY_ADDED_EVENT_TYPE,
                json!({"max_password_attempts": 5, "show_failures": false}),
            ),
            stored_event(
                2,
                "org-A",
                2,
                LOCKOUT_POLICY_CHANGED_EVENT_TYPE,
                json!({"show_failures": true}),
            ),
        ];

        // Act
        let policy = replay(LockoutPolicy::new(&org_a()), &events).unwrap();

        // Assert
        assert_eq!(policy.state(), PolicyState::Active);
        assert_eq!(policy.settings(), settings(5, true));
        assert_eq!(policy.sequence(), 2);
    }

    #[test]
    fn test_replay_skips_other_policy_events_on_the_same_stream() {
        let events = vec![
            stored_event(
                1,
                "org-A",
                1,
                ORG_IAM_POLICY_ADDED_EVENT_TYPE,
                json!({"user_login_must_be_domain": true}),
            ),
            stored_event(
                2,
                "org-A",
                2,
                LOCKOUT_POLICY_ADDED_EVENT_TYPE,
                json!({"max_password_attempts": 3, "show_failures": true}),
            ),
        ];

        let policy = replay(LockoutPolicy::new(&org_a()), &events).unwrap();

        assert_eq!(policy.settings(), settings(3, true));
        assert_eq!(policy.sequence(), 2);
        assert_eq!(policy.next_sequence(), 3);
    }

    #[test]
    fn test_add_produces_added_event() {
        // Arrange
        let mut policy = LockoutPolicy::new(&org_a());

        // Act
        policy.add(settings(5, false), "admin", &clock()).unwrap();

        // Assert
        let events = policy.uncommitted_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type(), LOCKOUT_POLICY_ADDED_EVENT_TYPE);
        assert_eq!(events[0].metadata.sequence, 1);
        assert_eq!(events[0].metadata.editor, "admin");
        assert_eq!(events[0].metadata.aggregate.aggregate_type, ORG_AGGREGATE_TYPE);
        assert_eq!(
            events[0].to_payload(),
            json!({"max_password_attempts": 5, "show_failures": false})
        );
    }

    #[test]
    fn test_add_twice_is_rejected() {
        let mut policy = active_lockout();

        let result = policy.add(settings(3, true), "admin", &clock());

        assert!(matches!(result, Err(DomainError::ConstraintViolation(_))));
        assert!(policy.uncommitted_events().is_empty());
    }

    #[test]
    fn test_change_without_policy_is_not_found() {
        let mut policy = LockoutPolicy::new(&org_a());

        let result = policy.change(settings(3, true), "admin", &clock());

        match result {
            Err(DomainError::NotFound(what)) => assert_eq!(what, "lockout policy on org-A"),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_change_with_identical_settings_is_rejected() {
        let mut policy = active_lockout();

        let result = policy.change(settings(5, false), "admin", &clock());

        assert!(matches!(result, Err(DomainError::ConstraintViolation(_))));
    }

    #[test]
    fn test_change_records_only_differing_fields() {
        let mut policy = active_lockout();

        policy.change(settings(5, true), "admin", &clock()).unwrap();

        let event = &policy.uncommitted_events()[0];
        assert_eq!(event.metadata.sequence, 2);
        assert_eq!(event.to_payload(), json!({"show_failures": true}));
    }

    #[test]
    fn test_default_policy_cannot_be_removed() {
        let mut policy = LockoutPolicy::new(&PolicyOwner::Iam("iam".into()));
        policy.add(settings(0, false), "system", &clock()).unwrap();

        let result = policy.remove("admin", &clock());

        assert!(policy.is_default());
        assert!(matches!(result, Err(DomainError::ConstraintViolation(_))));
    }

    #[test]
    fn test_removed_org_policy_can_be_added_again() {
        let mut policy = active_lockout();
        policy.remove("admin", &clock()).unwrap();
        let removed = policy.uncommitted_events()[0].clone();
        policy.clear_uncommitted_events();
        policy.apply(&removed);

        assert_eq!(policy.state(), PolicyState::Removed);
        policy.add(settings(7, true), "admin", &clock()).unwrap();
        assert_eq!(policy.uncommitted_events()[0].metadata.sequence, 3);
    }

    #[test]
    fn test_org_iam_policy_rules_mirror_lockout() {
        let mut policy = OrgIamPolicy::new(&org_a());
        let on = OrgIamSettings {
            user_login_must_be_domain: true,
        };

        assert!(policy.change(on, "admin", &clock()).unwrap_err().is_not_found());
        policy.add(on, "admin", &clock()).unwrap();
        let added = policy.uncommitted_events()[0].clone();
        policy.clear_uncommitted_events();
        policy.apply(&added);

        assert!(matches!(
            policy.change(on, "admin", &clock()),
            Err(DomainError::ConstraintViolation(_))
        ));
        assert_eq!(policy.settings(), on);
    }

    #[test]
    fn test_policy_state_column_round_trip() {
        for state in [PolicyState::Unspecified, PolicyState::Active, PolicyState::Removed] {
            assert_eq!(PolicyState::parse(state.as_str()), Some(state));
        }
        assert_eq!(PolicyState::parse("deleted"), None);
    }

    fn mail_text_added(sequence: i64, mail_text_type: &str, language: &str) -> StoredEvent {
        let mut event = stored_event(
            sequence,
            "iam",
            sequence,
            MAIL_TEXT_ADDED_EVENT_TYPE,
            json!({
                "mail_text_type": mail_text_type,
                "language": language,
                "title": "Welcome",
                "pre_header": "Your account",
                "subject": "Account created",
                "greeting": "Hello",
                "text": "Confirm your address",
                "button_text": "Confirm"
            }),
        );
        event.aggregate_type = IAM_AGGREGATE_TYPE.to_owned();
        event
    }

    #[test]
    fn test_mail_text_replay_keeps_only_its_own_key() {
        // Arrange
        let mut german_change = stored_event(
            3,
            "iam",
            3,
            MAIL_TEXT_CHANGED_EVENT_TYPE,
            json!({"mail_text_type": "InitCode", "language": "de", "subject": "Konto"}),
        );
        german_change.aggregate_type = IAM_AGGREGATE_TYPE.to_owned();
        let events = vec![
            mail_text_added(1, "InitCode", "en"),
            mail_text_added(2, "InitCode", "de"),
            german_change,
        ];

        // Act
        let english = replay(
            MailTextPolicy::new("iam", MailTextKey::new("InitCode", "en")),
            &events,
        )
        .unwrap();
        let german = replay(
            MailTextPolicy::new("iam", MailTextKey::new("InitCode", "de")),
            &events,
        )
        .unwrap();

        // Assert
        assert_eq!(english.state(), PolicyState::Active);
        assert_eq!(english.content().subject, "Account created");
        assert_eq!(english.sequence(), 3);
        assert_eq!(german.content().subject, "Konto");
        assert_eq!(german.content().button_text, "Confirm");
    }

    #[test]
    fn test_mail_text_add_twice_is_rejected_per_key() {
        let events = vec![mail_text_added(1, "InitCode", "en")];
        let mut english = replay(
            MailTextPolicy::new("iam", MailTextKey::new("InitCode", "en")),
            &events,
        )
        .unwrap();
        let mut french = replay(
            MailTextPolicy::new("iam", MailTextKey::new("InitCode", "fr")),
            &events,
        )
        .unwrap();

        let again = english.add(MailTextContent::default(), "admin", &clock());
        french.add(MailTextContent::default(), "admin", &clock()).unwrap();

        assert!(matches!(again, Err(DomainError::ConstraintViolation(_))));
        assert_eq!(french.uncommitted_events()[0].metadata.sequence, 2);
    }

    #[test]
    fn test_mail_text_change_rules() {
        let mut policy = MailTextPolicy::new("iam", MailTextKey::new("PasswordReset", "en"));
        let content = MailTextContent {
            subject: "Reset".into(),
            ..MailTextContent::default()
        };

        assert!(policy.change(&content, "admin", &clock()).unwrap_err().is_not_found());
        policy.add(content.clone(), "admin", &clock()).unwrap();
        let added = policy.uncommitted_events()[0].clone();
        policy.clear_uncommitted_events();
        policy.apply(&added);

        assert!(matches!(
            policy.change(&content, "admin", &clock()),
            Err(DomainError::ConstraintViolation(_))
        ));
        let renamed = MailTextContent {
            button_text: "Reset now".into(),
            ..content
        };
        policy.change(&renamed, "admin", &clock()).unwrap();
        assert_eq!(
            policy.uncommitted_events()[0].to_payload(),
            json!({"mail_text_type": "PasswordReset", "language": "en", "button_text": "Reset now"})
        );
    }

    #[test]
    fn test_mail_text_requires_type_and_language() {
        let mut policy = MailTextPolicy::new("iam", MailTextKey::new("InitCode", " "));

        let result = policy.add(MailTextContent::default(), "admin", &clock());

        match result {
            Err(DomainError::ConstraintViolation(msg)) => {
                assert_eq!(msg, "mail text language must not be empty");
            }
            other => panic!("expected ConstraintViolation, got {other:?}"),
        }
    }
}
