//! `PostgreSQL` implementations of `PolicyViewStore` and `MailTextViewStore`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;
use warden_core::error::DomainError;
use warden_event_store::error::from_sqlx;

use super::views::{MailTextView, MailTextViewStore, PolicyView, PolicyViewStore};
use crate::domain::aggregates::PolicyState;
use crate::domain::events::{LockoutSettings, MailTextContent, MailTextKey, OrgIamSettings};

fn parse_state(value: &str) -> Result<PolicyState, DomainError> {
    PolicyState::parse(value)
        .ok_or_else(|| DomainError::Infrastructure(format!("unknown policy state {value}")))
}

#[derive(Debug, sqlx::FromRow)]
struct LockoutPolicyRow {
    id: String,
    sequence: i64,
    creation_date: DateTime<Utc>,
    change_date: DateTime<Utc>,
    resource_owner: String,
    state: String,
    is_default: bool,
    max_password_attempts: i64,
    show_failures: bool,
}

impl TryFrom<LockoutPolicyRow> for PolicyView<LockoutSettings> {
    type Error = DomainError;

    fn try_from(row: LockoutPolicyRow) -> Result<Self, Self::Error> {
        let max_password_attempts = u64::try_from(row.max_password_attempts).map_err(|_| {
            DomainError::Infrastructure(format!(
                "negative max_password_attempts on lockout policy {}",
                row.id
            ))
        })?;
        Ok(Self {
            state: parse_state(&row.state)?,
            id: row.id,
            sequence: row.sequence,
            creation_date: row.creation_date,
            change_date: row.change_date,
            resource_owner: row.resource_owner,
            is_default: row.is_default,
            settings: LockoutSettings {
                max_password_attempts,
                show_failures: row.show_failures,
            },
        })
    }
}

const LOCKOUT_COLUMNS: &str = "id, sequence, creation_date, change_date, resource_owner, state, \
                               is_default, max_password_attempts, show_failures";

/// Lockout policy rows on `projections.lockout_policies`.
#[derive(Debug, Clone)]
pub struct PgLockoutPolicyViews {
    pool: PgPool,
}

impl PgLockoutPolicyViews {
    /// Creates a new `PgLockoutPolicyViews`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PolicyViewStore<LockoutSettings> for PgLockoutPolicyViews {
    async fn get(&self, id: &str) -> Result<Option<PolicyView<LockoutSettings>>, DomainError> {
        let row: Option<LockoutPolicyRow> = sqlx::query_as(&format!(
            "SELECT {LOCKOUT_COLUMNS} FROM projections.lockout_policies WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(from_sqlx)?;
        row.map(TryInto::try_into).transpose()
    }

    async fn get_default(
        &self,
        iam_id: &str,
    ) -> Result<Option<PolicyView<LockoutSettings>>, DomainError> {
        let row: Option<LockoutPolicyRow> = sqlx::query_as(&format!(
            "SELECT {LOCKOUT_COLUMNS} FROM projections.lockout_policies \
             WHERE id = $1 AND is_default"
        ))
        .bind(iam_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(from_sqlx)?;
        row.map(TryInto::try_into).transpose()
    }

    #[instrument(skip(self, view), fields(id = %view.id, sequence = view.sequence))]
    async fn upsert(&self, view: PolicyView<LockoutSettings>) -> Result<(), DomainError> {
        let max_password_attempts =
            i64::try_from(view.settings.max_password_attempts).map_err(|_| {
                DomainError::ConstraintViolation(format!(
                    "max_password_attempts {} out of range",
                    view.settings.max_password_attempts
                ))
            })?;
        sqlx::query(
            r"
            INSERT INTO projections.lockout_policies
                (id, sequence, creation_date, change_date, resource_owner, state,
                 is_default, max_password_attempts, show_failures)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE
            SET sequence = EXCLUDED.sequence,
                creation_date = EXCLUDED.creation_date,
                change_date = EXCLUDED.change_date,
                resource_owner = EXCLUDED.resource_owner,
                state = EXCLUDED.state,
                is_default = EXCLUDED.is_default,
                max_password_attempts = EXCLUDED.max_password_attempts,
                show_failures = EXCLUDED.show_failures
            WHERE projections.lockout_policies.sequence < EXCLUDED.sequence
            ",
        )
        .bind(&view.id)
        .bind(view.sequence)
        .bind(view.creation_date)
        .bind(view.change_date)
        .bind(&view.resource_owner)
        .bind(view.state.as_str())
        .bind(view.is_default)
        .bind(max_password_attempts)
        .bind(view.settings.show_failures)
        .execute(&self.pool)
        .await
        .map_err(from_sqlx)?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: &str) -> Result<(), DomainError> {
        sqlx::query("DELETE FROM projections.lockout_policies WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(from_sqlx)?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), DomainError> {
        sqlx::query("DELETE FROM projections.lockout_policies")
            .execute(&self.pool)
            .await
            .map_err(from_sqlx)?;
        Ok(())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrgIamPolicyRow {
    id: String,
    sequence: i64,
    creation_date: DateTime<Utc>,
    change_date: DateTime<Utc>,
    resource_owner: String,
    state: String,
    is_default: bool,
    user_login_must_be_domain: bool,
}

impl TryFrom<OrgIamPolicyRow> for PolicyView<OrgIamSettings> {
    type Error = DomainError;

    fn try_from(row: OrgIamPolicyRow) -> Result<Self, Self::Error> {
        Ok(Self {
            state: parse_state(&row.state)?,
            id: row.id,
            sequence: row.sequence,
            creation_date: row.creation_date,
            change_date: row.change_date,
            resource_owner: row.resource_owner,
            is_default: row.is_default,
            settings: OrgIamSettings {
                user_login_must_be_domain: row.user_login_must_be_domain,
            },
        })
    }
}

const ORG_IAM_COLUMNS: &str = "id, sequence, creation_date, change_date, resource_owner, state, \
                               is_default, user_login_must_be_domain";

/// Org IAM policy rows on `projections.org_iam_policies`.
#[derive(Debug, Clone)]
pub struct PgOrgIamPolicyViews {
    pool: PgPool,
}

impl PgOrgIamPolicyViews {
    /// Creates a new `PgOrgIamPolicyViews`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PolicyViewStore<OrgIamSettings> for PgOrgIamPolicyViews {
    async fn get(&self, id: &str) -> Result<Option<PolicyView<OrgIamSettings>>, DomainError> {
        let row: Option<OrgIamPolicyRow> = sqlx::query_as(&format!(
            "SELECT {ORG_IAM_COLUMNS} FROM projections.org_iam_policies WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(from_sqlx)?;
        row.map(TryInto::try_into).transpose()
    }

    async fn get_default(
        &self,
        iam_id: &str,
    ) -> Result<Option<PolicyView<OrgIamSettings>>, DomainError> {
        let row: Option<OrgIamPolicyRow> = sqlx::query_as(&format!(
            "SELECT {ORG_IAM_COLUMNS} FROM projections.org_iam_policies \
             WHERE id = $1 AND is_default"
        ))
        .bind(iam_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(from_sqlx)?;
        row.map(TryInto::try_into).transpose()
    }

    #[instrument(skip(self, view), fields(id = %view.id, sequence = view.sequence))]
    async fn upsert(&self, view: PolicyView<OrgIamSettings>) -> Result<(), DomainError> {
        sqlx::query(
            r"
            INSERT INTO projections.org_iam_policies
                (id, sequence, creation_date, change_date, resource_owner, state,
                 is_default, user_login_must_be_domain)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE
            SET sequence = EXCLUDED.sequence,
                creation_date = EXCLUDED.creation_date,
                change_date = EXCLUDED.change_date,
                resource_owner = EXCLUDED.resource_owner,
                state = EXCLUDED.state,
                is_default = EXCLUDED.is_default,
                user_login_must_be_domain = EXCLUDED.user_login_must_be_domain
            WHERE projections.org_iam_policies.sequence < EXCLUDED.sequence
            ",
        )
        .bind(&view.id)
        .bind(view.sequence)
        .bind(view.creation_date)
        .bind(view.change_date)
        .bind(&view.resource_owner)
        .bind(view.state.as_str())
        .bind(view.is_default)
        .bind(view.settings.user_login_must_be_domain)
        .execute(&self.pool)
        .await
        .map_err(from_sqlx)?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: &str) -> Result<(), DomainError> {
        sqlx::query("DELETE FROM projections.org_iam_policies WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(from_sqlx)?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), DomainError> {
        sqlx::query("DELETE FROM projections.org_iam_policies")
            .execute(&self.pool)
            .await
            .map_err(from_sqlx)?;
        Ok(())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MailTextRow {
    aggregate_id: String,
    mail_text_type: String,
    language: String,
    sequence: i64,
    creation_date: DateTime<Utc>,
    change_date: DateTime<Utc>,
    resource_owner: String,
    state: String,
    is_default: bool,
    title: String,
    pre_header: String,
    subject: String,
    greeting: String,
    text: String,
    button_text: String,
}

impl TryFrom<MailTextRow> for MailTextView {
    type Error = DomainError;

    fn try_from(row: MailTextRow) -> Result<Self, Self::Error> {
        Ok(Self {
            state: parse_state(&row.state)?,
            aggregate_id: row.aggregate_id,
            key: MailTextKey::new(row.mail_text_type, row.language),
            sequence: row.sequence,
            creation_date: row.creation_date,
            change_date: row.change_date,
            resource_owner: row.resource_owner,
            is_default: row.is_default,
            content: MailTextContent {
                title: row.title,
                pre_header: row.pre_header,
                subject: row.subject,
                greeting: row.greeting,
                text: row.text,
                button_text: row.button_text,
            },
        })
    }
}

const MAIL_TEXT_COLUMNS: &str = "aggregate_id, mail_text_type, language, sequence, creation_date, \
                                 change_date, resource_owner, state, is_default, title, \
                                 pre_header, subject, greeting, text, button_text";

/// Mail text rows on `projections.mail_texts`.
#[derive(Debug, Clone)]
pub struct PgMailTextViews {
    pool: PgPool,
}

impl PgMailTextViews {
    /// Creates a new `PgMailTextViews`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MailTextViewStore for PgMailTextViews {
    async fn get(
        &self,
        aggregate_id: &str,
        key: &MailTextKey,
    ) -> Result<Option<MailTextView>, DomainError> {
        let row: Option<MailTextRow> = sqlx::query_as(&format!(
            "SELECT {MAIL_TEXT_COLUMNS} FROM projections.mail_texts \
             WHERE aggregate_id = $1 AND mail_text_type = $2 AND language = $3"
        ))
        .bind(aggregate_id)
        .bind(&key.mail_text_type)
        .bind(&key.language)
        .fetch_optional(&self.pool)
        .await
        .map_err(from_sqlx)?;
        row.map(TryInto::try_into).transpose()
    }

    async fn list(&self, aggregate_id: &str) -> Result<Vec<MailTextView>, DomainError> {
        let rows: Vec<MailTextRow> = sqlx::query_as(&format!(
            "SELECT {MAIL_TEXT_COLUMNS} FROM projections.mail_texts \
             WHERE aggregate_id = $1 ORDER BY mail_text_type, language"
        ))
        .bind(aggregate_id)
        .fetch_all(&self.pool)
        .await
        .map_err(from_sqlx)?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    #[instrument(skip(self, view), fields(key = %view.key, sequence = view.sequence))]
    async fn upsert(&self, view: MailTextView) -> Result<(), DomainError> {
        sqlx::query(
            r"
            INSERT INTO projections.mail_texts
                (aggregate_id, mail_text_type, language, sequence, creation_date, change_date,
                 resource_owner, state, is_default, title, pre_header, subject, greeting,
                 text, button_text)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (aggregate_id, mail_text_type, language) DO UPDATE
            SET sequence = EXCLUDED.sequence,
                creation_date = EXCLUDED.creation_date,
                change_date = EXCLUDED.change_date,
                resource_owner = EXCLUDED.resource_owner,
                state = EXCLUDED.state,
                is_default = EXCLUDED.is_default,
                title = EXCLUDED.title,
                pre_header = EXCLUDED.pre_header,
                subject = EXCLUDED.subject,
                greeting = EXCLUDED.greeting,
                text = EXCLUDED.text,
                button_text = EXCLUDED.button_text
            WHERE projections.mail_texts.sequence < EXCLUDED.sequence
            ",
        )
        .bind(&view.aggregate_id)
        .bind(&view.key.mail_text_type)
        .bind(&view.key.language)
        .bind(view.sequence)
        .bind(view.creation_date)
        .bind(view.change_date)
        .bind(&view.resource_owner)
        .bind(view.state.as_str())
        .bind(view.is_default)
        .bind(&view.content.title)
        .bind(&view.content.pre_header)
        .bind(&view.content.subject)
        .bind(&view.content.greeting)
        .bind(&view.content.text)
        .bind(&view.content.button_text)
        .execute(&self.pool)
        .await
        .map_err(from_sqlx)?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), DomainError> {
        sqlx::query("DELETE FROM projections.mail_texts")
            .execute(&self.pool)
            .await
            .map_err(from_sqlx)?;
        Ok(())
    }
}
