//! Domain events for the policy context.

use std::fmt;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};
use warden_core::error::DomainError;
use warden_core::event::{DomainEvent, EventMetadata};
use warden_core::registry::EventRegistry;
use warden_core::store::StoredEvent;

/// Event type for [`PolicyEventKind::LockoutPolicyAdded`].
pub const LOCKOUT_POLICY_ADDED_EVENT_TYPE: &str = "policy.lockout.added";
/// Event type for [`PolicyEventKind::LockoutPolicyChanged`].
pub const LOCKOUT_POLICY_CHANGED_EVENT_TYPE: &str = "policy.lockout.changed";
/// Event type for [`PolicyEventKind::LockoutPolicyRemoved`].
pub const LOCKOUT_POLICY_REMOVED_EVENT_TYPE: &str = "policy.lockout.removed";
/// Event type for [`PolicyEventKind::OrgIamPolicyAdded`].
pub const ORG_IAM_POLICY_ADDED_EVENT_TYPE: &str = "policy.org_iam.added";
/// Event type for [`PolicyEventKind::OrgIamPolicyChanged`].
pub const ORG_IAM_POLICY_CHANGED_EVENT_TYPE: &str = "policy.org_iam.changed";
/// Event type for [`PolicyEventKind::OrgIamPolicyRemoved`].
pub const ORG_IAM_POLICY_REMOVED_EVENT_TYPE: &str = "policy.org_iam.removed";

/// Event type for [`PolicyEventKind::MailTextAdded`].
pub const MAIL_TEXT_ADDED_EVENT_TYPE: &str = "iam.policy.mail.text.added";
/// Event type for [`PolicyEventKind::MailTextChanged`].
pub const MAIL_TEXT_CHANGED_EVENT_TYPE: &str = "iam.policy.mail.text.changed";

/// Every lockout policy event type.
pub const LOCKOUT_POLICY_EVENT_TYPES: [&str; 3] = [
    LOCKOUT_POLICY_ADDED_EVENT_TYPE,
    LOCKOUT_POLICY_CHANGED_EVENT_TYPE,
    LOCKOUT_POLICY_REMOVED_EVENT_TYPE,
];

/// Every org IAM policy event type.
pub const ORG_IAM_POLICY_EVENT_TYPES: [&str; 3] = [
    ORG_IAM_POLICY_ADDED_EVENT_TYPE,
    ORG_IAM_POLICY_CHANGED_EVENT_TYPE,
    ORG_IAM_POLICY_REMOVED_EVENT_TYPE,
];

/// Every mail text event type.
pub const MAIL_TEXT_EVENT_TYPES: [&str; 2] =
    [MAIL_TEXT_ADDED_EVENT_TYPE, MAIL_TEXT_CHANGED_EVENT_TYPE];

/// How password failures lock an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LockoutSettings {
    /// Failed attempts before the account locks. Zero disables lockout.
    pub max_password_attempts: u64,
    /// Whether the login UI reveals the failure count.
    pub show_failures: bool,
}

/// Changed fields of a lockout policy. Absent fields kept their value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LockoutPolicyChanged {
    /// New attempt limit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_password_attempts: Option<u64>,
    /// New failure display flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_failures: Option<bool>,
}

impl LockoutPolicyChanged {
    /// Fields of `next` that differ from `current`, or `None` if none do.
    #[must_use]
    pub fn between(current: &LockoutSettings, next: &LockoutSettings) -> Option<Self> {
        let change = Self {
            max_password_attempts: (current.max_password_attempts != next.max_password_attempts)
                .then_some(next.max_password_attempts),
            show_failures: (current.show_failures != next.show_failures)
                .then_some(next.show_failures),
        };
        (change != Self::default()).then_some(change)
    }

    /// Applies the changed fields to `settings`.
    pub fn apply_to(&self, settings: &mut LockoutSettings) {
        if let Some(max) = self.max_password_attempts {
            settings.max_password_attempts = max;
        }
        if let Some(show) = self.show_failures {
            settings.show_failures = show;
        }
    }
}

/// Login naming rules for an organization's users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrgIamSettings {
    /// Whether user logins must carry the organization's domain suffix.
    pub user_login_must_be_domain: bool,
}

/// Changed fields of an org IAM policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrgIamPolicyChanged {
    /// New domain suffix rule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_login_must_be_domain: Option<bool>,
}

impl OrgIamPolicyChanged {
    /// Fields of `next` that differ from `current`, or `None` if none do.
    #[must_use]
    pub fn between(current: &OrgIamSettings, next: &OrgIamSettings) -> Option<Self> {
        (current.user_login_must_be_domain != next.user_login_must_be_domain).then_some(Self {
            user_login_must_be_domain: Some(next.user_login_must_be_domain),
        })
    }

    /// Applies the changed fields to `settings`.
    pub fn apply_to(&self, settings: &mut OrgIamSettings) {
        if let Some(must_be_domain) = self.user_login_must_be_domain {
            settings.user_login_must_be_domain = must_be_domain;
        }
    }
}

/// Identifies one mail text: the template it fills and its language.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MailTextKey {
    /// Template name, e.g. `InitCode` or `PasswordReset`.
    pub mail_text_type: String,
    /// Language tag, e.g. `de`.
    pub language: String,
}

impl MailTextKey {
    /// Creates a key.
    #[must_use]
    pub fn new(mail_text_type: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            mail_text_type: mail_text_type.into(),
            language: language.into(),
        }
    }

    /// Checks that both parts are present.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ConstraintViolation` if either part is blank.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.mail_text_type.trim().is_empty() {
            return Err(DomainError::ConstraintViolation(
                "mail text type must not be empty".into(),
            ));
        }
        if self.language.trim().is_empty() {
            return Err(DomainError::ConstraintViolation(
                "mail text language must not be empty".into(),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for MailTextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.mail_text_type, self.language)
    }
}

/// Text blocks of one mail template.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MailTextContent {
    /// Title shown in the mail body.
    pub title: String,
    /// Preview line shown by mail clients.
    pub pre_header: String,
    /// Subject line.
    pub subject: String,
    /// Salutation.
    pub greeting: String,
    /// Main body text.
    pub text: String,
    /// Label of the call-to-action button.
    pub button_text: String,
}

/// Payload of a mail text being set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailTextAdded {
    /// Which mail text.
    #[serde(flatten)]
    pub key: MailTextKey,
    /// Its text blocks.
    #[serde(flatten)]
    pub content: MailTextContent,
}

/// Changed text blocks of one mail text. The key is always present; absent
/// blocks kept their value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailTextChanged {
    /// Which mail text.
    #[serde(flatten)]
    pub key: MailTextKey,
    /// New title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// New preview line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_header: Option<String>,
    /// New subject.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// New salutation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub greeting: Option<String>,
    /// New body text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// New button label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button_text: Option<String>,
}

fn differs(current: &str, next: &str) -> Option<String> {
    (current != next).then(|| next.to_owned())
}

impl MailTextChanged {
    /// Blocks of `next` that differ from `current`, or `None` if none do.
    #[must_use]
    pub fn between(
        key: &MailTextKey,
        current: &MailTextContent,
        next: &MailTextContent,
    ) -> Option<Self> {
        let change = Self {
            key: key.clone(),
            title: differs(&current.title, &next.title),
            pre_header: differs(&current.pre_header, &next.pre_header),
            subject: differs(&current.subject, &next.subject),
            greeting: differs(&current.greeting, &next.greeting),
            text: differs(&current.text, &next.text),
            button_text: differs(&current.button_text, &next.button_text),
        };
        let changed = [
            &change.title,
            &change.pre_header,
            &change.subject,
            &change.greeting,
            &change.text,
            &change.button_text,
        ]
        .iter()
        .any(|block| block.is_some());
        changed.then_some(change)
    }

    /// Applies the changed blocks to `content`.
    pub fn apply_to(&self, content: &mut MailTextContent) {
        let blocks = [
            (&self.title, &mut content.title),
            (&self.pre_header, &mut content.pre_header),
            (&self.subject, &mut content.subject),
            (&self.greeting, &mut content.greeting),
            (&self.text, &mut content.text),
            (&self.button_text, &mut content.button_text),
        ];
        for (change, block) in blocks {
            if let Some(value) = change {
                block.clone_from(value);
            }
        }
    }
}

/// Payload of a removal. Carries no fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PolicyRemoved {}

/// Event payload variants for the policy context.
///
/// Payloads are stored untagged; the event type selects the variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyEventKind {
    /// A lockout policy was set.
    LockoutPolicyAdded(LockoutSettings),
    /// Lockout policy fields changed.
    LockoutPolicyChanged(LockoutPolicyChanged),
    /// An org's lockout override was removed.
    LockoutPolicyRemoved(PolicyRemoved),
    /// An org IAM policy was set.
    OrgIamPolicyAdded(OrgIamSettings),
    /// Org IAM policy fields changed.
    OrgIamPolicyChanged(OrgIamPolicyChanged),
    /// An org's org IAM override was removed.
    OrgIamPolicyRemoved(PolicyRemoved),
    /// A mail text of the instance was set.
    MailTextAdded(MailTextAdded),
    /// Text blocks of an instance mail text changed.
    MailTextChanged(MailTextChanged),
}

impl PolicyEventKind {
    /// Event type tag of this variant.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::LockoutPolicyAdded(_) => LOCKOUT_POLICY_ADDED_EVENT_TYPE,
            Self::LockoutPolicyChanged(_) => LOCKOUT_POLICY_CHANGED_EVENT_TYPE,
            Self::LockoutPolicyRemoved(_) => LOCKOUT_POLICY_REMOVED_EVENT_TYPE,
            Self::OrgIamPolicyAdded(_) => ORG_IAM_POLICY_ADDED_EVENT_TYPE,
            Self::OrgIamPolicyChanged(_) => ORG_IAM_POLICY_CHANGED_EVENT_TYPE,
            Self::OrgIamPolicyRemoved(_) => ORG_IAM_POLICY_REMOVED_EVENT_TYPE,
            Self::MailTextAdded(_) => MAIL_TEXT_ADDED_EVENT_TYPE,
            Self::MailTextChanged(_) => MAIL_TEXT_CHANGED_EVENT_TYPE,
        }
    }
}

/// Builds the decode table for every policy event type.
#[must_use]
pub fn registry() -> EventRegistry<PolicyEventKind> {
    EventRegistry::new()
        .register(LOCKOUT_POLICY_ADDED_EVENT_TYPE, |v| {
            serde_json::from_value(v).map(PolicyEventKind::LockoutPolicyAdded)
        })
        .register(LOCKOUT_POLICY_CHANGED_EVENT_TYPE, |v| {
            serde_json::from_value(v).map(PolicyEventKind::LockoutPolicyChanged)
        })
        .register(LOCKOUT_POLICY_REMOVED_EVENT_TYPE, |v| {
            serde_json::from_value(v).map(PolicyEventKind::LockoutPolicyRemoved)
        })
        .register(ORG_IAM_POLICY_ADDED_EVENT_TYPE, |v| {
            serde_json::from_value(v).map(PolicyEventKind::OrgIamPolicyAdded)
        })
        .register(ORG_IAM_POLICY_CHANGED_EVENT_TYPE, |v| {
            serde_json::from_value(v).map(PolicyEventKind::OrgIamPolicyChanged)
        })
        .register(ORG_IAM_POLICY_REMOVED_EVENT_TYPE, |v| {
            serde_json::from_value(v).map(PolicyEventKind::OrgIamPolicyRemoved)
        })
        .register(MAIL_TEXT_ADDED_EVENT_TYPE, |v| {
            serde_json::from_value(v).map(PolicyEventKind::MailTextAdded)
        })
        .register(MAIL_TEXT_CHANGED_EVENT_TYPE, |v| {
            serde_json::from_value(v).map(PolicyEventKind::MailTextChanged)
        })
}

static REGISTRY: LazyLock<EventRegistry<PolicyEventKind>> = LazyLock::new(registry);

/// Decodes a stored policy event's payload.
///
/// # Errors
///
/// Returns `DomainError::ConstraintViolation` for event types outside this
/// context or payloads that do not decode.
pub fn decode(stored: &StoredEvent) -> Result<PolicyEventKind, DomainError> {
    REGISTRY.decode(&stored.event_type, stored.payload.clone())
}

/// Domain event envelope for the policy context.
#[derive(Debug, Clone)]
pub struct PolicyEvent {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Event-specific payload.
    pub kind: PolicyEventKind,
}

impl DomainEvent for PolicyEvent {
    fn event_type(&self) -> &'static str {
        self.kind.event_type()
    }

    fn to_payload(&self) -> serde_json::Value {
        // Serialization of derived Serialize types to Value is infallible.
        let payload = match &self.kind {
            PolicyEventKind::LockoutPolicyAdded(p) => serde_json::to_value(p),
            PolicyEventKind::LockoutPolicyChanged(p) => serde_json::to_value(p),
            PolicyEventKind::OrgIamPolicyAdded(p) => serde_json::to_value(p),
            PolicyEventKind::OrgIamPolicyChanged(p) => serde_json::to_value(p),
            PolicyEventKind::LockoutPolicyRemoved(p) | PolicyEventKind::OrgIamPolicyRemoved(p) => {
                serde_json::to_value(p)
            }
            PolicyEventKind::MailTextAdded(p) => serde_json::to_value(p),
            PolicyEventKind::MailTextChanged(p) => serde_json::to_value(p),
        };
        payload.expect("PolicyEventKind serialization is infallible")
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

/// Returns `true` for event types this context writes.
#[must_use]
pub fn is_policy_event(event_type: &str) -> bool {
    LOCKOUT_POLICY_EVENT_TYPES.contains(&event_type)
        || ORG_IAM_POLICY_EVENT_TYPES.contains(&event_type)
        || MAIL_TEXT_EVENT_TYPES.contains(&event_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_changed_carries_only_differing_fields() {
        let current = LockoutSettings {
            max_password_attempts: 5,
            show_failures: false,
        };
        let next = LockoutSettings {
            max_password_attempts: 5,
            show_failures: true,
        };

        let change = LockoutPolicyChanged::between(&current, &next).unwrap();

        assert_eq!(
            serde_json::to_value(change).unwrap(),
            json!({"show_failures": true})
        );
    }

    #[test]
    fn test_changed_is_none_when_nothing_differs() {
        let settings = OrgIamSettings {
            user_login_must_be_domain: true,
        };
        assert!(OrgIamPolicyChanged::between(&settings, &settings).is_none());
    }

    #[test]
    fn test_registry_rejects_unknown_event_type() {
        let result = registry().decode("policy.password_age.added", json!({}));

        match result {
            Err(DomainError::ConstraintViolation(msg)) => {
                assert_eq!(msg, "unknown event type policy.password_age.added");
            }
            other => panic!("expected ConstraintViolation, got {other:?}"),
        }
    }

    #[test]
    fn test_registry_rejects_malformed_payload() {
        let result = registry().decode(
            LOCKOUT_POLICY_ADDED_EVENT_TYPE,
            json!({"max_password_attempts": "five"}),
        );
        assert!(matches!(result, Err(DomainError::ConstraintViolation(_))));
    }

    #[test]
    fn test_registry_covers_every_policy_event_type() {
        let mut expected: Vec<&str> = LOCKOUT_POLICY_EVENT_TYPES
            .into_iter()
            .chain(ORG_IAM_POLICY_EVENT_TYPES)
            .chain(MAIL_TEXT_EVENT_TYPES)
            .collect();
        expected.sort_unstable();

        assert_eq!(registry().event_types(), expected);
    }

    #[test]
    fn test_removed_payload_is_empty_object() {
        let decoded = registry()
            .decode(LOCKOUT_POLICY_REMOVED_EVENT_TYPE, json!({}))
            .unwrap();
        assert_eq!(decoded, PolicyEventKind::LockoutPolicyRemoved(PolicyRemoved {}));
    }

    #[test]
    fn test_mail_text_change_keeps_key_and_differing_blocks() {
        let key = MailTextKey::new("InitCode", "de");
        let current = MailTextContent {
            subject: "Willkommen".into(),
            ..MailTextContent::default()
        };
        let next = MailTextContent {
            subject: "Hallo".into(),
            ..MailTextContent::default()
        };

        let change = MailTextChanged::between(&key, &current, &next).unwrap();

        assert_eq!(
            serde_json::to_value(&change).unwrap(),
            json!({"mail_text_type": "InitCode", "language": "de", "subject": "Hallo"})
        );
        assert!(MailTextChanged::between(&key, &next, &next).is_none());
    }

    #[test]
    fn test_mail_text_added_decodes_flat_payload() {
        let decoded = registry()
            .decode(
                MAIL_TEXT_ADDED_EVENT_TYPE,
                json!({
                    "mail_text_type": "PasswordReset",
                    "language": "en",
                    "title": "Reset",
                    "pre_header": "Reset your password",
                    "subject": "Password reset",
                    "greeting": "Hello",
                    "text": "Follow the link",
                    "button_text": "Reset"
                }),
            )
            .unwrap();

        match decoded {
            PolicyEventKind::MailTextAdded(added) => {
                assert_eq!(added.key, MailTextKey::new("PasswordReset", "en"));
                assert_eq!(added.content.button_text, "Reset");
            }
            other => panic!("expected MailTextAdded, got {other:?}"),
        }
    }

    #[test]
    fn test_mail_text_change_without_key_is_rejected() {
        let result = registry().decode(MAIL_TEXT_CHANGED_EVENT_TYPE, json!({"subject": "Hi"}));

        assert!(matches!(result, Err(DomainError::ConstraintViolation(_))));
    }
}
