//! Test lockers — scripted `Locker` implementations for tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use warden_core::error::DomainError;
use warden_core::lock::Locker;

/// A locker that replays a queue of outcomes, then falls back to a default.
///
/// Records every `(holder_id, view_id)` pair it was asked to renew.
#[derive(Debug)]
pub struct ScriptedLocker {
    script: Mutex<VecDeque<Result<(), DomainError>>>,
    held_by_default: bool,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedLocker {
    /// A locker that grants every renewal.
    #[must_use]
    pub fn granting() -> Self {
        Self::with_default(false)
    }

    /// A locker that refuses every renewal with `LockHeld`.
    #[must_use]
    pub fn held() -> Self {
        Self::with_default(true)
    }

    fn with_default(held_by_default: bool) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            held_by_default,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Queues `outcome` ahead of the default.
    #[must_use]
    pub fn then(self, outcome: Result<(), DomainError>) -> Self {
        self.script.lock().unwrap().push_back(outcome);
        self
    }

    /// Every renewal request seen so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Locker for ScriptedLocker {
    async fn renew(
        &self,
        holder_id: &str,
        view_id: &str,
        _wait_time: Duration,
    ) -> Result<(), DomainError> {
        self.calls
            .lock()
            .unwrap()
            .push((holder_id.to_owned(), view_id.to_owned()));
        if let Some(outcome) = self.script.lock().unwrap().pop_front() {
            return outcome;
        }
        if self.held_by_default {
            Err(DomainError::LockHeld {
                view_id: view_id.to_owned(),
            })
        } else {
            Ok(())
        }
    }
}
