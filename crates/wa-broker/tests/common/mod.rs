//! Test utilities and common setup.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::Response;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use wa_broker::api::{self, AppState};
use wa_broker::messaging::{
    AppStatePatch, ClientEvent, ClientEvents, GroupInfo, MediaAttachment, MessagingClient,
    MessagingConnector, MessagingError, MessagingResult, QrEvent, QrEvents,
};
use wa_broker::settings::AppConfig;

/// Messaging client whose QR channel is fed by the test.
pub struct ScriptedClient {
    id: String,
    qr_tx: mpsc::Sender<QrEvent>,
    qr_rx: Mutex<Option<QrEvents>>,
    fail_connect: bool,
    pub fetched: Mutex<Vec<AppStatePatch>>,
    disconnected: AtomicBool,
}

impl ScriptedClient {
    pub fn new(id: &str) -> Arc<Self> {
        Arc::new(Self::build(id, false))
    }

    pub fn refusing(id: &str) -> Arc<Self> {
        Arc::new(Self::build(id, true))
    }

    fn build(id: &str, fail_connect: bool) -> Self {
        let (qr_tx, qr_rx) = mpsc::channel(8);
        Self {
            id: id.to_string(),
            qr_tx,
            qr_rx: Mutex::new(Some(qr_rx)),
            fail_connect,
            fetched: Mutex::new(Vec::new()),
            disconnected: AtomicBool::new(false),
        }
    }

    pub async fn emit(&self, event: QrEvent) {
        self.qr_tx.send(event).await.unwrap();
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessagingClient for ScriptedClient {
    fn device_id(&self) -> &str {
        &self.id
    }

    async fn qr_channel(&self) -> MessagingResult<QrEvents> {
        self.qr_rx
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| MessagingError::EventStream("already subscribed".to_string()))
    }

    async fn connect(&self) -> MessagingResult<()> {
        if self.fail_connect {
            return Err(MessagingError::ConnectionFailed {
                url: "test://bridge".to_string(),
                message: "connection refused".to_string(),
            });
        }
        Ok(())
    }

    async fn fetch_app_state(&self, patch: AppStatePatch) -> MessagingResult<()> {
        self.fetched.lock().unwrap().push(patch);
        Ok(())
    }

    async fn joined_groups(&self) -> MessagingResult<Vec<GroupInfo>> {
        Ok(vec![
            GroupInfo {
                jid: "111@g.us".to_string(),
                name: "Algebra".to_string(),
                topic: "Course 101".to_string(),
            },
            GroupInfo {
                jid: "222@g.us".to_string(),
                name: "Calculus".to_string(),
                topic: String::new(),
            },
        ])
    }

    async fn download_media(&self, media: &MediaAttachment) -> MessagingResult<Vec<u8>> {
        Ok(format!("contents of {}", media.file_name).into_bytes())
    }

    async fn disconnect(&self) -> MessagingResult<()> {
        self.disconnected.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Connector handing out scripted clients in order.
#[derive(Default)]
pub struct ScriptedConnector {
    clients: Mutex<VecDeque<Arc<ScriptedClient>>>,
    event_senders: Mutex<Vec<mpsc::Sender<ClientEvent>>>,
}

impl ScriptedConnector {
    pub fn push(&self, client: Arc<ScriptedClient>) {
        self.clients.lock().unwrap().push_back(client);
    }

    /// Event sender of the n-th client handed out.
    pub fn events(&self, n: usize) -> mpsc::Sender<ClientEvent> {
        self.event_senders.lock().unwrap()[n].clone()
    }
}

#[async_trait]
impl MessagingConnector for ScriptedConnector {
    async fn new_client(&self) -> MessagingResult<(Arc<dyn MessagingClient>, ClientEvents)> {
        let client = self.clients.lock().unwrap().pop_front().ok_or_else(|| {
            MessagingError::ConnectionFailed {
                url: "test://bridge".to_string(),
                message: "no device available".to_string(),
            }
        })?;
        let (tx, rx) = mpsc::channel(16);
        self.event_senders.lock().unwrap().push(tx);
        let client: Arc<dyn MessagingClient> = client;
        Ok((client, rx))
    }
}

/// Configuration with a `cat` renderer and a configured OAuth application.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.render.program = "cat".to_string();
    config.render.args = Vec::new();
    config.login.qr_timeout_secs = 5;
    config.monday.client_id = Some("test-client".to_string());
    config.monday.client_secret = Some("test-secret".to_string());
    // Port 9 (discard) refuses connections: nothing leaves the machine.
    config.monday.auth_url = "http://127.0.0.1:9/oauth2".to_string();
    config.monday.api_url = "http://127.0.0.1:9/v2".to_string();
    config.monday.file_api_url = "http://127.0.0.1:9/v2/file".to_string();
    config
}

/// Router plus state for `config`, with messaging served by `connector`.
pub fn test_app_with(config: &AppConfig, connector: Arc<ScriptedConnector>) -> (Router, AppState) {
    let state = AppState::new(config, connector, reqwest::Client::new());
    (api::create_router(state.clone()), state)
}

pub fn test_app() -> (Router, AppState, Arc<ScriptedConnector>) {
    let connector = Arc::new(ScriptedConnector::default());
    let (app, state) = test_app_with(&test_config(), connector.clone());
    (app, state, connector)
}

pub fn session_cookie(id: impl std::fmt::Display) -> String {
    format!("{}={}", api::SESSION_COOKIE, id)
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

/// Serve `router` on an ephemeral local port.
pub async fn spawn_server(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}
