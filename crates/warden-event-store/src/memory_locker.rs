//! In-memory implementation of the `Locker` trait.
//!
//! Only coordinates spoolers sharing one process; multi-instance deployments
//! use `PgLocker`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use warden_core::clock::Clock;
use warden_core::error::DomainError;
use warden_core::lock::Locker;

#[derive(Debug, Clone)]
struct Lease {
    holder_id: String,
    expires_at: DateTime<Utc>,
}

/// Lease table held in process memory, expiring by the injected clock.
pub struct InMemoryLocker {
    clock: Arc<dyn Clock>,
    leases: Mutex<HashMap<String, Lease>>,
}

impl InMemoryLocker {
    /// Creates an empty lease table.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            leases: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the current holder of `view_id`, if the lease is live.
    #[must_use]
    pub fn holder(&self, view_id: &str) -> Option<String> {
        let now = self.clock.now();
        self.leases
            .lock()
            .ok()?
            .get(view_id)
            .filter(|lease| lease.expires_at > now)
            .map(|lease| lease.holder_id.clone())
    }
}

impl std::fmt::Debug for InMemoryLocker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryLocker").finish_non_exhaustive()
    }
}

#[async_trait]
impl Locker for InMemoryLocker {
    async fn renew(
        &self,
        holder_id: &str,
        view_id: &str,
        wait_time: Duration,
    ) -> Result<(), DomainError> {
        let now = self.clock.now();
        let mut leases = self
            .leases
            .lock()
            .map_err(|_| DomainError::Infrastructure("lease table poisoned".into()))?;

        if let Some(lease) = leases.get(view_id) {
            if lease.holder_id != holder_id && lease.expires_at > now {
                return Err(DomainError::LockHeld {
                    view_id: view_id.to_owned(),
                });
            }
        }

        leases.insert(
            view_id.to_owned(),
            Lease {
                holder_id: holder_id.to_owned(),
                expires_at: self.clock.deadline(wait_time),
            },
        );
        Ok(())
    }
}
