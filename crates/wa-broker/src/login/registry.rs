//! Pending-login registry.
//!
//! Maps a random id to the notifier of an in-flight QR login. Each entry
//! belongs to the session that started it, can be consumed at most once by
//! that session, and disappears at its deadline even if no callback ever
//! arrives. Both paths remove through the same atomic map
//! operation, so the first one wins and the other observes absence.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::time::{Instant, sleep_until, timeout_at};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::error::{LoginError, LoginResult};
use super::notifier::{LoginNotifier, LoginOutcome};

/// An in-flight QR login awaiting its callback.
#[derive(Debug)]
pub struct PendingLogin {
    id: Uuid,
    session_id: Uuid,
    notifier: LoginNotifier,
    created_at: Instant,
    deadline: Instant,
}

impl PendingLogin {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Session that initiated the login.
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Wait for the login's terminal event, bounded by the entry's deadline.
    pub async fn wait(self) -> LoginResult<()> {
        let id = self.id;
        match timeout_at(self.deadline, self.notifier.wait()).await {
            Ok(LoginOutcome::Paired) => {
                info!(login_id = %id, "QR login paired");
                Ok(())
            }
            Ok(LoginOutcome::Expired) | Err(_) => Err(LoginError::NotifierTimeout),
            Ok(LoginOutcome::Failed(reason)) => Err(LoginError::LoginRejected(reason)),
            Ok(LoginOutcome::Closed) => Err(LoginError::LoginRejected(
                "pairing stream closed".to_string(),
            )),
        }
    }
}

/// Concurrent registry of pending logins with per-entry expiry.
#[derive(Clone)]
pub struct PendingLoginRegistry {
    entries: Arc<DashMap<Uuid, PendingLogin>>,
    timeout: Duration,
    id_source: fn() -> Uuid,
}

impl PendingLoginRegistry {
    pub fn new(timeout: Duration) -> Self {
        Self::with_id_source(timeout, Uuid::new_v4)
    }

    /// Registry drawing ids from `id_source` instead of random v4 UUIDs.
    pub fn with_id_source(timeout: Duration, id_source: fn() -> Uuid) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            timeout,
            id_source,
        }
    }

    /// How long an entry stays claimable.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Store `notifier` for `session_id` under a fresh id and arm its expiry timer.
    pub fn register(&self, session_id: Uuid, notifier: LoginNotifier) -> LoginResult<Uuid> {
        let id = (self.id_source)();
        let created_at = Instant::now();
        let deadline = created_at + self.timeout;

        match self.entries.entry(id) {
            Entry::Occupied(_) => {
                error!(login_id = %id, "Generated login id already registered");
                return Err(LoginError::IdCollision(id));
            }
            Entry::Vacant(slot) => {
                slot.insert(PendingLogin {
                    id,
                    session_id,
                    notifier,
                    created_at,
                    deadline,
                });
            }
        }

        // Weak: a dropped registry must not be kept alive by its timers.
        let entries = Arc::downgrade(&self.entries);
        tokio::spawn(async move {
            sleep_until(deadline).await;
            let Some(entries) = entries.upgrade() else {
                return;
            };
            // Only evict the entry this timer was armed for.
            if entries
                .remove_if(&id, |_, pending| pending.deadline == deadline)
                .is_some()
            {
                debug!(login_id = %id, "Pending login expired");
            }
        });

        debug!(login_id = %id, timeout_secs = self.timeout.as_secs(), "Pending login registered");
        Ok(id)
    }

    /// Remove and return the entry for `id` if it belongs to `session_id`
    /// and has not expired.
    ///
    /// An entry owned by another session is left in place for its owner.
    pub fn consume(&self, id: &Uuid, session_id: &Uuid) -> Option<PendingLogin> {
        let now = Instant::now();
        let Some((_, pending)) = self
            .entries
            .remove_if(id, |_, pending| pending.session_id == *session_id)
        else {
            if self.entries.contains_key(id) {
                warn!(login_id = %id, session_id = %session_id, "Pending login claimed by another session");
            }
            return None;
        };
        if now >= pending.deadline {
            debug!(login_id = %id, "Pending login consumed after its deadline");
            return None;
        }
        Some(pending)
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for PendingLoginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingLoginRegistry")
            .field("pending", &self.entries.len())
            .field("timeout", &self.timeout)
            .finish()
    }
}
