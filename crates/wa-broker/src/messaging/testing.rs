//! In-process messaging doubles for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::*;

/// Scriptable messaging client.
pub(crate) struct StubClient {
    id: String,
    qr_tx: mpsc::Sender<QrEvent>,
    qr_rx: Mutex<Option<QrEvents>>,
    events_tx: Mutex<Option<mpsc::Sender<ClientEvent>>>,
    fail_connect: bool,
    fetched: Mutex<Vec<AppStatePatch>>,
    disconnected: AtomicBool,
}

impl StubClient {
    pub(crate) fn new(id: &str) -> Self {
        let (qr_tx, qr_rx) = mpsc::channel(8);
        Self {
            id: id.to_string(),
            qr_tx,
            qr_rx: Mutex::new(Some(qr_rx)),
            events_tx: Mutex::new(None),
            fail_connect: false,
            fetched: Mutex::new(Vec::new()),
            disconnected: AtomicBool::new(false),
        }
    }

    pub(crate) fn failing_connect(id: &str) -> Self {
        Self {
            fail_connect: true,
            ..Self::new(id)
        }
    }

    /// Sender feeding this client's QR channel.
    pub(crate) fn qr_sender(&self) -> mpsc::Sender<QrEvent> {
        self.qr_tx.clone()
    }

    /// Sender feeding this client's event stream, once a connector handed it out.
    pub(crate) fn events_sender(&self) -> Option<mpsc::Sender<ClientEvent>> {
        self.events_tx.lock().unwrap().clone()
    }

    pub(crate) fn fetched_patches(&self) -> Vec<AppStatePatch> {
        self.fetched.lock().unwrap().clone()
    }

    pub(crate) fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessagingClient for StubClient {
    fn device_id(&self) -> &str {
        &self.id
    }

    async fn qr_channel(&self) -> MessagingResult<QrEvents> {
        self.qr_rx
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| MessagingError::EventStream("qr channel already taken".to_string()))
    }

    async fn connect(&self) -> MessagingResult<()> {
        if self.fail_connect {
            return Err(MessagingError::ConnectionFailed {
                url: "stub://bridge".to_string(),
                message: "refused".to_string(),
            });
        }
        Ok(())
    }

    async fn fetch_app_state(&self, patch: AppStatePatch) -> MessagingResult<()> {
        self.fetched.lock().unwrap().push(patch);
        if patch == AppStatePatch::CriticalBlock {
            return Err(MessagingError::Bridge {
                status: 500,
                message: "not synced yet".to_string(),
            });
        }
        Ok(())
    }

    async fn joined_groups(&self) -> MessagingResult<Vec<GroupInfo>> {
        Ok(vec![GroupInfo {
            jid: "1@g.us".to_string(),
            name: "Algebra".to_string(),
            topic: "Course 101".to_string(),
        }])
    }

    async fn download_media(&self, media: &MediaAttachment) -> MessagingResult<Vec<u8>> {
        Ok(media.file_name.as_bytes().to_vec())
    }

    async fn disconnect(&self) -> MessagingResult<()> {
        self.disconnected.store(true, Ordering::SeqCst);
        self.events_tx.lock().unwrap().take();
        Ok(())
    }
}

/// Connector handing out pre-built stub clients in order.
#[derive(Default)]
pub(crate) struct StubConnector {
    clients: Mutex<VecDeque<Arc<StubClient>>>,
}

impl StubConnector {
    pub(crate) fn push(&self, client: Arc<StubClient>) {
        self.clients.lock().unwrap().push_back(client);
    }
}

#[async_trait]
impl MessagingConnector for StubConnector {
    async fn new_client(&self) -> MessagingResult<(Arc<dyn MessagingClient>, ClientEvents)> {
        let client = self.clients.lock().unwrap().pop_front().ok_or_else(|| {
            MessagingError::ConnectionFailed {
                url: "stub://bridge".to_string(),
                message: "no client scripted".to_string(),
            }
        })?;
        let (tx, rx) = mpsc::channel(16);
        *client.events_tx.lock().unwrap() = Some(tx);
        let client: Arc<dyn MessagingClient> = client;
        Ok((client, rx))
    }
}
