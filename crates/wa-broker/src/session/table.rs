//! Concurrent session table.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use thiserror::Error;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::models::{OAuthTokens, Session};
use crate::messaging::{Conversation, MessagingClient};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("session not found: {0}")]
    NotFound(Uuid),

    #[error("generated session id {0} already exists")]
    IdCollision(Uuid),
}

/// Session id -> session, sharded so unrelated sessions never contend.
pub struct SessionTable {
    sessions: DashMap<Uuid, Arc<Session>>,
    id_source: fn() -> Uuid,
}

impl Default for SessionTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionTable {
    pub fn new() -> Self {
        Self::with_id_source(Uuid::new_v4)
    }

    /// Table drawing session ids from `id_source` instead of random v4 UUIDs.
    pub fn with_id_source(id_source: fn() -> Uuid) -> Self {
        Self {
            sessions: DashMap::new(),
            id_source,
        }
    }

    /// Create a session holding `tokens` and an empty history.
    pub fn create_session(&self, tokens: OAuthTokens) -> Result<Uuid, SessionError> {
        let id = (self.id_source)();
        match self.sessions.entry(id) {
            Entry::Occupied(_) => {
                error!(session_id = %id, "Generated session id already exists");
                Err(SessionError::IdCollision(id))
            }
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(Session::new(id, tokens)));
                info!(session_id = %id, "Session created");
                Ok(id)
            }
        }
    }

    /// Attach the messaging client of the login flow that owns the session.
    ///
    /// A later attach replaces an earlier one; the replaced client is
    /// returned so the caller can disconnect it.
    pub fn attach_client(
        &self,
        id: &Uuid,
        client: Arc<dyn MessagingClient>,
    ) -> Result<Option<Arc<dyn MessagingClient>>, SessionError> {
        let session = self.lookup(id).ok_or(SessionError::NotFound(*id))?;
        debug!(session_id = %id, device_id = client.device_id(), "Attaching messaging client");
        Ok(session.set_client(client))
    }

    /// Detach `client` from the session, unless another client replaced it.
    pub fn detach_client(&self, id: &Uuid, client: &Arc<dyn MessagingClient>) -> bool {
        let Some(session) = self.lookup(id) else {
            return false;
        };
        let detached = session.clear_client_if(client);
        if detached {
            debug!(session_id = %id, device_id = client.device_id(), "Detached messaging client");
        }
        detached
    }

    /// Append history snapshots under the session's own lock.
    ///
    /// Unknown sessions are ignored: deliveries may race with teardown.
    pub async fn append_history(&self, id: &Uuid, snapshots: Vec<Conversation>) {
        // Clone the Arc out so no shard guard is held across the await.
        let Some(session) = self.lookup(id) else {
            debug!(session_id = %id, "Dropping history for unknown session");
            return;
        };

        let mut history = session.history.lock().await;
        history.extend(snapshots);
        debug!(session_id = %id, conversations = history.len(), "History appended");
    }

    /// Mark the QR login of a session as completed.
    pub fn mark_ready(&self, id: &Uuid) -> Result<(), SessionError> {
        let session = self.lookup(id).ok_or(SessionError::NotFound(*id))?;
        session.mark_ready();
        Ok(())
    }

    pub fn lookup(&self, id: &Uuid) -> Option<Arc<Session>> {
        self.sessions.get(id).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, id: &Uuid) -> Option<Arc<Session>> {
        self.sessions.remove(id).map(|(_, session)| session)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
