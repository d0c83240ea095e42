//! HTTP/SSE client for the multi-device bridge daemon.
//!
//! Every login attempt provisions a fresh device on the bridge. Commands are
//! plain JSON requests; pairing and history-sync events arrive on one
//! server-sent event stream per device, pumped by a background task into the
//! client's QR channel and its [`ClientEvents`] receiver.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use log::{debug, info, warn};
use reqwest::header::ACCEPT;
use reqwest::{Client, Response};
use reqwest_eventsource::{Event as SseEvent, EventSource};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use super::error::{MessagingError, MessagingResult};
use super::types::*;
use super::{ClientEvents, MessagingClient, MessagingConnector, QrEvents};
use crate::settings::BridgeConfig;

/// Buffer for the per-device client event stream.
const EVENT_BUFFER_SIZE: usize = 64;

/// Buffer for the QR channel. Codes rotate every ~20s, so this never fills.
const QR_BUFFER_SIZE: usize = 8;

/// Connector provisioning one bridge device per client.
#[derive(Debug, Clone)]
pub struct BridgeConnector {
    http: Client,
    base_url: String,
    request_timeout: Duration,
}

impl BridgeConnector {
    /// Create a connector for the bridge described by `config`.
    pub fn new(config: &BridgeConfig) -> MessagingResult<Self> {
        // No client-wide timeout: it would also cut the long-lived event stream.
        let http = Client::builder().build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        })
    }
}

#[derive(Debug, Deserialize)]
struct CreatedDevice {
    device_id: String,
}

#[derive(Debug, Deserialize)]
struct BridgeErrorBody {
    error: String,
}

/// Events as they appear on the bridge's SSE stream.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BridgeEvent {
    Qr {
        event: String,
        #[serde(default)]
        code: Option<String>,
        #[serde(default)]
        error: Option<String>,
    },
    HistorySync {
        #[serde(default)]
        conversations: Vec<Conversation>,
    },
    Connected,
    LoggedOut,
    #[serde(other)]
    Unknown,
}

#[async_trait]
impl MessagingConnector for BridgeConnector {
    async fn new_client(&self) -> MessagingResult<(Arc<dyn MessagingClient>, ClientEvents)> {
        let url = format!("{}/devices", self.base_url);
        let response = self
            .http
            .post(&url)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| MessagingError::ConnectionFailed {
                url: url.clone(),
                message: e.to_string(),
            })?;
        let created: CreatedDevice = handle_response(response).await?;

        let shared = Arc::new(DeviceShared::default());
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER_SIZE);

        let events_url = format!("{}/devices/{}/events", self.base_url, created.device_id);
        let request = self
            .http
            .get(&events_url)
            .header(ACCEPT, "text/event-stream");
        let es = EventSource::new(request)
            .map_err(|e| MessagingError::EventStream(e.to_string()))?;

        let pump = tokio::spawn(pump_events(
            created.device_id.clone(),
            es,
            shared.clone(),
            events_tx,
        ));

        info!("Provisioned bridge device {}", created.device_id);

        let client = BridgeClient {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            device_id: created.device_id,
            request_timeout: self.request_timeout,
            shared,
            pump: pump.abort_handle(),
        };
        let client: Arc<dyn MessagingClient> = Arc::new(client);
        Ok((client, events_rx))
    }
}

/// State shared between a client and its event pump.
#[derive(Debug, Default)]
struct DeviceShared {
    qr_tx: Mutex<Option<mpsc::Sender<QrEvent>>>,
}

impl DeviceShared {
    fn set_qr_sender(&self, tx: mpsc::Sender<QrEvent>) {
        *self.qr_tx.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx);
    }

    fn close_qr(&self) {
        self.qr_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    async fn send_qr(&self, event: QrEvent) {
        let terminal = event.is_terminal();
        let tx = {
            let mut guard = self.qr_tx.lock().unwrap_or_else(PoisonError::into_inner);
            if terminal { guard.take() } else { guard.clone() }
        };
        match tx {
            Some(tx) => {
                if tx.send(event).await.is_err() {
                    debug!("QR receiver dropped");
                }
            }
            None => debug!("QR event {} without subscriber", event),
        }
    }
}

async fn pump_events(
    device_id: String,
    mut es: EventSource,
    shared: Arc<DeviceShared>,
    events_tx: mpsc::Sender<ClientEvent>,
) {
    while let Some(event) = es.next().await {
        match event {
            Ok(SseEvent::Open) => debug!("Event stream open for device {}", device_id),
            Ok(SseEvent::Message(msg)) => match serde_json::from_str::<BridgeEvent>(&msg.data) {
                Ok(event) => dispatch(&device_id, event, &shared, &events_tx).await,
                Err(e) => warn!("Unparseable bridge event for {}: {}", device_id, e),
            },
            Err(reqwest_eventsource::Error::StreamEnded) => {
                info!("Event stream ended for device {}", device_id);
                break;
            }
            Err(e) => {
                warn!("Event stream error for device {}: {}", device_id, e);
                break;
            }
        }
    }

    es.close();
    shared.close_qr();
}

async fn dispatch(
    device_id: &str,
    event: BridgeEvent,
    shared: &DeviceShared,
    events_tx: &mpsc::Sender<ClientEvent>,
) {
    let client_event = match event {
        BridgeEvent::Qr { event, code, error } => {
            let qr = match (event.as_str(), code) {
                ("code", Some(code)) => QrEvent::Code(code),
                ("code", None) => {
                    warn!("QR code event without code for device {}", device_id);
                    return;
                }
                ("success", _) => QrEvent::Success,
                ("timeout", _) => QrEvent::Timeout,
                (other, _) => QrEvent::Error(error.unwrap_or_else(|| other.to_string())),
            };
            shared.send_qr(qr).await;
            return;
        }
        BridgeEvent::HistorySync { conversations } => ClientEvent::HistorySync(conversations),
        BridgeEvent::Connected => ClientEvent::Connected,
        BridgeEvent::LoggedOut => ClientEvent::LoggedOut,
        BridgeEvent::Unknown => {
            debug!("Ignoring bridge event for device {}", device_id);
            return;
        }
    };

    if events_tx.send(client_event).await.is_err() {
        debug!("Client event receiver dropped for device {}", device_id);
    }
}

/// One device on the bridge.
#[derive(Debug)]
pub struct BridgeClient {
    http: Client,
    base_url: String,
    device_id: String,
    request_timeout: Duration,
    shared: Arc<DeviceShared>,
    pump: AbortHandle,
}

impl BridgeClient {
    fn device_url(&self, path: &str) -> String {
        format!("{}/devices/{}/{}", self.base_url, self.device_id, path)
    }

    /// Stop the event pump. Drops both event senders.
    fn stop_events(&self) {
        self.pump.abort();
        self.shared.close_qr();
    }
}

impl Drop for BridgeClient {
    fn drop(&mut self) {
        self.stop_events();
    }
}

#[async_trait]
impl MessagingClient for BridgeClient {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    async fn qr_channel(&self) -> MessagingResult<QrEvents> {
        let (tx, rx) = mpsc::channel(QR_BUFFER_SIZE);
        self.shared.set_qr_sender(tx);
        Ok(rx)
    }

    async fn connect(&self) -> MessagingResult<()> {
        let url = self.device_url("connect");
        let response = self
            .http
            .post(&url)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| MessagingError::ConnectionFailed {
                url: url.clone(),
                message: e.to_string(),
            })?;
        expect_success(response).await
    }

    async fn fetch_app_state(&self, patch: AppStatePatch) -> MessagingResult<()> {
        let response = self
            .http
            .post(self.device_url("app-state/fetch"))
            .timeout(self.request_timeout)
            .json(&json!({
                "name": patch,
                "full_sync": true,
                "only_if_not_synced": false,
            }))
            .send()
            .await?;
        expect_success(response).await
    }

    async fn joined_groups(&self) -> MessagingResult<Vec<GroupInfo>> {
        let response = self
            .http
            .get(self.device_url("groups"))
            .timeout(self.request_timeout)
            .send()
            .await?;
        handle_response(response).await
    }

    async fn download_media(&self, media: &MediaAttachment) -> MessagingResult<Vec<u8>> {
        let response = self
            .http
            .post(self.device_url("media"))
            .timeout(self.request_timeout)
            .json(media)
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn disconnect(&self) -> MessagingResult<()> {
        self.stop_events();

        let url = format!("{}/devices/{}", self.base_url, self.device_id);
        let response = self
            .http
            .delete(&url)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| MessagingError::ConnectionFailed {
                url: url.clone(),
                message: e.to_string(),
            })?;
        expect_success(response).await?;
        info!("Removed bridge device {}", self.device_id);
        Ok(())
    }
}

async fn check_status(response: Response) -> MessagingResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<BridgeErrorBody>(&text)
        .map(|body| body.error)
        .unwrap_or(text);
    Err(MessagingError::Bridge {
        status: status.as_u16(),
        message,
    })
}

async fn expect_success(response: Response) -> MessagingResult<()> {
    check_status(response).await.map(|_| ())
}

async fn handle_response<T: DeserializeOwned>(response: Response) -> MessagingResult<T> {
    check_status(response)
        .await?
        .json()
        .await
        .map_err(|e| MessagingError::ParseError(e.to_string()))
}
