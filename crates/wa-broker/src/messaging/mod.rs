//! Messaging collaborator.
//!
//! The broker never speaks the WhatsApp protocol itself. It drives a
//! multi-device bridge daemon through the [`MessagingConnector`] and
//! [`MessagingClient`] traits, so the login handshake and the HTTP layer
//! are written against the seam and tests substitute their own clients.
//!
//! ```text
//!  handshake ──new_client()──▶ MessagingConnector ──▶ bridge daemon
//!      │                              │
//!      │ qr_channel()/connect()       │ SSE /devices/{id}/events
//!      ▼                              ▼
//!  MessagingClient            ClientEvents (history sync, logout)
//! ```

mod bridge;
mod error;
mod types;

pub use bridge::{BridgeClient, BridgeConnector};
pub use error::{MessagingError, MessagingResult};
pub use types::*;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

/// Receiver for QR pairing events of one client.
pub type QrEvents = mpsc::Receiver<QrEvent>;

/// Receiver for the long-lived event stream of one client.
pub type ClientEvents = mpsc::Receiver<ClientEvent>;

/// Creates messaging clients, one per login attempt.
#[async_trait]
pub trait MessagingConnector: Send + Sync {
    /// Provision a new, not yet connected client together with its event stream.
    async fn new_client(&self) -> MessagingResult<(Arc<dyn MessagingClient>, ClientEvents)>;
}

/// A single messaging connection.
#[async_trait]
pub trait MessagingClient: Send + Sync {
    /// Identifier of the underlying device, for logging.
    fn device_id(&self) -> &str;

    /// Subscribe to QR pairing events. Must be called before [`connect`](Self::connect).
    ///
    /// The first event is normally a [`QrEvent::Code`]; further codes follow
    /// as the bridge rotates them, then exactly one terminal event.
    async fn qr_channel(&self) -> MessagingResult<QrEvents>;

    /// Open the connection to the messaging network.
    async fn connect(&self) -> MessagingResult<()>;

    /// Fetch one app-state patch after pairing.
    async fn fetch_app_state(&self, patch: AppStatePatch) -> MessagingResult<()>;

    /// Groups the account is a member of.
    async fn joined_groups(&self) -> MessagingResult<Vec<GroupInfo>>;

    /// Download and decrypt the media behind an attachment.
    async fn download_media(&self, media: &MediaAttachment) -> MessagingResult<Vec<u8>>;

    /// Tear down the device and stop its event streams.
    ///
    /// Both receivers handed out for this client close afterwards.
    async fn disconnect(&self) -> MessagingResult<()>;
}

#[cfg(test)]
pub(crate) mod testing;
