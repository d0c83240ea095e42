//! Session data models.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::messaging::{Conversation, MediaAttachment, MessagingClient};

/// Tokens returned by the OAuth token endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthTokens {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl OAuthTokens {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            token_type: None,
            scope: None,
        }
    }
}

/// Per-user state behind one session cookie.
///
/// Fields are private: the token is fixed at creation and the client,
/// history and readiness only change through [`SessionTable`](super::SessionTable).
pub struct Session {
    id: Uuid,
    tokens: OAuthTokens,
    created_at: DateTime<Utc>,
    client: RwLock<Option<Arc<dyn MessagingClient>>>,
    pub(super) history: Mutex<Vec<Conversation>>,
    ready: AtomicBool,
}

impl Session {
    pub(super) fn new(id: Uuid, tokens: OAuthTokens) -> Self {
        Self {
            id,
            tokens,
            created_at: Utc::now(),
            client: RwLock::new(None),
            history: Mutex::new(Vec::new()),
            ready: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn access_token(&self) -> &str {
        &self.tokens.access_token
    }

    pub fn tokens(&self) -> &OAuthTokens {
        &self.tokens
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// The attached messaging client, if the QR login has started.
    pub fn client(&self) -> Option<Arc<dyn MessagingClient>> {
        self.client
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Install `client` and return the one it replaces.
    pub(super) fn set_client(
        &self,
        client: Arc<dyn MessagingClient>,
    ) -> Option<Arc<dyn MessagingClient>> {
        self.client
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(client)
    }

    /// Drop the attached client if it is `client`.
    pub(super) fn clear_client_if(&self, client: &Arc<dyn MessagingClient>) -> bool {
        let mut slot = self.client.write().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|current| Arc::ptr_eq(current, client)) {
            slot.take();
            true
        } else {
            false
        }
    }

    /// Whether the QR login completed for this session.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub(super) fn mark_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }

    /// Copy of the conversation history accumulated so far.
    pub async fn history(&self) -> Vec<Conversation> {
        self.history.lock().await.clone()
    }

    /// Media attachments of every conversation named `name`, in history order.
    pub async fn media_in(&self, name: &str) -> Vec<MediaAttachment> {
        let history = self.history.lock().await;
        history
            .iter()
            .filter(|c| c.name.as_deref() == Some(name))
            .flat_map(|c| c.messages.iter())
            .filter_map(|m| m.media.clone())
            .collect()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("created_at", &self.created_at)
            .field("has_client", &self.client().is_some())
            .field("ready", &self.is_ready())
            .finish_non_exhaustive()
    }
}
