//! Mapping from `sqlx` errors to domain error kinds.

use warden_core::error::DomainError;

/// Maps a storage failure to [`DomainError::Infrastructure`].
///
/// Callers that can recognise a more specific kind (unique violations on
/// append) check for it before falling back to this.
#[must_use]
pub fn from_sqlx(err: sqlx::Error) -> DomainError {
    DomainError::Infrastructure(format!("database error: {err}"))
}

/// Returns `true` if `err` is a unique-constraint violation.
#[must_use]
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}
