//! Commands for the policy context.

use warden_core::command::Command;

use super::aggregates::PolicyOwner;
use super::events::{LockoutSettings, MailTextContent, MailTextKey, OrgIamSettings};

/// Command to set a lockout policy on an owner.
#[derive(Debug, Clone)]
pub struct AddLockoutPolicy {
    /// Who acts.
    pub editor: String,
    /// The instance or organization the policy applies to.
    pub owner: PolicyOwner,
    /// The policy.
    pub settings: LockoutSettings,
}

/// Command to change an owner's lockout policy to new settings.
#[derive(Debug, Clone)]
pub struct ChangeLockoutPolicy {
    /// Who acts.
    pub editor: String,
    /// The instance or organization whose policy changes.
    pub owner: PolicyOwner,
    /// The desired settings.
    pub settings: LockoutSettings,
}

/// Command to remove an organization's lockout override.
#[derive(Debug, Clone)]
pub struct RemoveLockoutPolicy {
    /// Who acts.
    pub editor: String,
    /// The organization.
    pub owner: PolicyOwner,
}

/// Command to set an org IAM policy on an owner.
#[derive(Debug, Clone)]
pub struct AddOrgIamPolicy {
    /// Who acts.
    pub editor: String,
    /// The instance or organization the policy applies to.
    pub owner: PolicyOwner,
    /// The policy.
    pub settings: OrgIamSettings,
}

/// Command to change an owner's org IAM policy.
#[derive(Debug, Clone)]
pub struct ChangeOrgIamPolicy {
    /// Who acts.
    pub editor: String,
    /// The instance or organization whose policy changes.
    pub owner: PolicyOwner,
    /// The desired settings.
    pub settings: OrgIamSettings,
}

/// Command to remove an organization's org IAM override.
#[derive(Debug, Clone)]
pub struct RemoveOrgIamPolicy {
    /// Who acts.
    pub editor: String,
    /// The organization.
    pub owner: PolicyOwner,
}

/// Command to set one of the instance's mail texts.
#[derive(Debug, Clone)]
pub struct AddMailText {
    /// Who acts.
    pub editor: String,
    /// The instance.
    pub iam_id: String,
    /// Template and language.
    pub key: MailTextKey,
    /// The text blocks.
    pub content: MailTextContent,
}

/// Command to change one of the instance's mail texts.
#[derive(Debug, Clone)]
pub struct ChangeMailText {
    /// Who acts.
    pub editor: String,
    /// The instance.
    pub iam_id: String,
    /// Template and language.
    pub key: MailTextKey,
    /// The desired text blocks.
    pub content: MailTextContent,
}

macro_rules! impl_command {
    ($($command:ident => $name:literal),* $(,)?) => {
        $(
            impl Command for $command {
                fn command_type(&self) -> &'static str {
                    $name
                }

                fn editor(&self) -> &str {
                    &self.editor
                }
            }
        )*
    };
}

impl_command! {
    AddLockoutPolicy => "policy.lockout.add",
    ChangeLockoutPolicy => "policy.lockout.change",
    RemoveLockoutPolicy => "policy.lockout.remove",
    AddOrgIamPolicy => "policy.org_iam.add",
    ChangeOrgIamPolicy => "policy.org_iam.change",
    RemoveOrgIamPolicy => "policy.org_iam.remove",
    AddMailText => "policy.mail_text.add",
    ChangeMailText => "policy.mail_text.change",
}
