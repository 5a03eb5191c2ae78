//! First-start seeding of the instance default policies.
//!
//! Every instance seeds on startup, so two instances can race on the shared
//! `iam` stream. The loser of an append sees `ConcurrencyConflict`, reloads and
//! finds the policy already active.

use tracing::{debug, info, instrument};
use warden_core::aggregate::{self, AggregateRoot};
use warden_core::clock::Clock;
use warden_core::error::DomainError;
use warden_core::store::EventStore;
use warden_policy::domain::aggregates::{LockoutPolicy, OrgIamPolicy, PolicyOwner, PolicyState};
use warden_policy::domain::events::{LockoutSettings, OrgIamSettings};

/// Editor recorded on seeded events.
pub const SETUP_EDITOR: &str = "system";

/// Org IAM default of a fresh instance.
pub const DEFAULT_ORG_IAM_SETTINGS: OrgIamSettings = OrgIamSettings {
    user_login_must_be_domain: true,
};

/// Appends attempted per policy before a conflict is surfaced.
const SEED_ATTEMPTS: usize = 3;

/// Adds the instance default lockout and org IAM policies unless they
/// already exist. Returns how many were added.
///
/// # Errors
///
/// Propagates store and validation errors. An active default is not an error,
/// and a conflict with a concurrent seeder is retried after a reload.
#[instrument(skip(clock, store))]
pub async fn ensure_default_policies(
    iam_id: &str,
    clock: &dyn Clock,
    store: &dyn EventStore,
) -> Result<usize, DomainError> {
    let owner = PolicyOwner::Iam(iam_id.to_owned());

    let mut added = seed(
        "lockout",
        store,
        || LockoutPolicy::new(&owner),
        |policy: &LockoutPolicy| policy.state() == PolicyState::Active,
        |policy: &mut LockoutPolicy| policy.add(LockoutSettings::default(), SETUP_EDITOR, clock),
    )
    .await?;
    added += seed(
        "org iam",
        store,
        || OrgIamPolicy::new(&owner),
        |policy: &OrgIamPolicy| policy.state() == PolicyState::Active,
        |policy: &mut OrgIamPolicy| policy.add(DEFAULT_ORG_IAM_SETTINGS, SETUP_EDITOR, clock),
    )
    .await?;

    if added > 0 {
        info!(added, "default policies seeded");
    }
    Ok(added)
}

async fn seed<A: AggregateRoot>(
    policy: &str,
    store: &dyn EventStore,
    zero: impl Fn() -> A,
    is_active: impl Fn(&A) -> bool,
    add: impl Fn(&mut A) -> Result<(), DomainError>,
) -> Result<usize, DomainError> {
    let mut attempt = 1;
    loop {
        let mut aggregate = aggregate::load(store, zero()).await?;
        if is_active(&aggregate) {
            debug!(policy, "default already present");
            return Ok(0);
        }
        add(&mut aggregate)?;

        match aggregate::commit(store, &mut aggregate).await {
            Ok(_) => return Ok(1),
            Err(DomainError::ConcurrencyConflict { actual, .. }) if attempt < SEED_ATTEMPTS => {
                debug!(policy, attempt, actual, "stream moved during seeding, reloading");
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
