//! Commands for the member context.

use warden_core::command::Command;

/// Command to make a user a member of the instance.
#[derive(Debug, Clone)]
pub struct AddIamMember {
    /// Who acts.
    pub editor: String,
    /// The instance.
    pub iam_id: String,
    /// The new member.
    pub user_id: String,
    /// Roles to grant. At least one is required.
    pub roles: Vec<String>,
}

/// Command to replace a member's roles.
#[derive(Debug, Clone)]
pub struct ChangeIamMember {
    /// Who acts.
    pub editor: String,
    /// The instance.
    pub iam_id: String,
    /// The member.
    pub user_id: String,
    /// The complete new role set.
    pub roles: Vec<String>,
}

/// Command to remove a member.
#[derive(Debug, Clone)]
pub struct RemoveIamMember {
    /// Who acts.
    pub editor: String,
    /// The instance.
    pub iam_id: String,
    /// The member.
    pub user_id: String,
}

impl Command for AddIamMember {
    fn command_type(&self) -> &'static str {
        "iam.member.add"
    }

    fn editor(&self) -> &str {
        &self.editor
    }
}

impl Command for ChangeIamMember {
    fn command_type(&self) -> &'static str {
        "iam.member.change"
    }

    fn editor(&self) -> &str {
        &self.editor
    }
}

impl Command for RemoveIamMember {
    fn command_type(&self) -> &'static str {
        "iam.member.remove"
    }

    fn editor(&self) -> &str {
        &self.editor
    }
}
