//! Application state.

use std::sync::Arc;

use reqwest::Client;
use tracing::warn;

use crate::login::{LoginHandshake, PendingLoginRegistry};
use crate::messaging::MessagingConnector;
use crate::monday::MondayOAuth;
use crate::render::QrRenderer;
use crate::session::SessionTable;
use crate::settings::{AppConfig, MondayConfig, ServerConfig};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// QR login orchestration (owns the pending-login registry).
    pub handshake: LoginHandshake,
    pub sessions: Arc<SessionTable>,
    /// `None` when no OAuth application is configured.
    pub oauth: Option<Arc<MondayOAuth>>,
    pub monday: Arc<MondayConfig>,
    /// Outbound HTTP client for monday.com.
    pub http: Client,
    pub server: Arc<ServerConfig>,
}

impl AppState {
    /// Build the state for `config`, driving logins through `connector`.
    pub fn new(config: &AppConfig, connector: Arc<dyn MessagingConnector>, http: Client) -> Self {
        let sessions = Arc::new(SessionTable::new());
        let handshake = LoginHandshake::new(
            PendingLoginRegistry::new(config.login.qr_timeout()),
            sessions.clone(),
            connector,
            QrRenderer::from_config(&config.render),
        );

        let redirect_uri = format!("{}/oauth/callback", config.server.service_url());
        let oauth = match MondayOAuth::new(http.clone(), &config.monday, redirect_uri) {
            Ok(oauth) => Some(Arc::new(oauth)),
            Err(e) => {
                warn!("monday.com OAuth disabled: {}", e);
                None
            }
        };

        Self {
            handshake,
            sessions,
            oauth,
            monday: Arc::new(config.monday.clone()),
            http,
            server: Arc::new(config.server.clone()),
        }
    }
}
