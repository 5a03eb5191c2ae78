//! Command abstractions.

/// Trait that all commands implement.
pub trait Command: Send + Sync + std::fmt::Debug {
    /// The type name for this command (for logging/routing).
    fn command_type(&self) -> &'static str;

    /// Identity of the actor issuing the command, recorded as the editor of
    /// every event it produces.
    fn editor(&self) -> &str;
}
