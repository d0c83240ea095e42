//! QR login handshake: initiate, then complete on callback.

use std::sync::Arc;

use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::error::{LoginError, LoginResult};
use super::notifier::LoginNotifier;
use super::registry::PendingLoginRegistry;
use crate::messaging::{
    AppStatePatch, ClientEvent, ClientEvents, MessagingClient, MessagingConnector, QrEvent,
};
use crate::render::QrRenderer;
use crate::session::SessionTable;

/// A login that is waiting for the user to scan its code.
#[derive(Debug, Clone)]
pub struct InitiatedLogin {
    pub login_id: Uuid,
    pub qr_png_base64: String,
}

/// Drives the two halves of a QR login over the registry and session table.
#[derive(Clone)]
pub struct LoginHandshake {
    registry: PendingLoginRegistry,
    sessions: Arc<SessionTable>,
    connector: Arc<dyn MessagingConnector>,
    renderer: QrRenderer,
}

impl LoginHandshake {
    pub fn new(
        registry: PendingLoginRegistry,
        sessions: Arc<SessionTable>,
        connector: Arc<dyn MessagingConnector>,
        renderer: QrRenderer,
    ) -> Self {
        Self {
            registry,
            sessions,
            connector,
            renderer,
        }
    }

    pub fn registry(&self) -> &PendingLoginRegistry {
        &self.registry
    }

    pub fn sessions(&self) -> &Arc<SessionTable> {
        &self.sessions
    }

    /// Start a QR login for `session_id` and return the code to display.
    ///
    /// On failure after the client was created, the client is detached from
    /// the session and disconnected.
    pub async fn initiate(&self, session_id: Uuid) -> LoginResult<InitiatedLogin> {
        if self.sessions.lookup(&session_id).is_none() {
            debug!(session_id = %session_id, "QR login requested for unknown session");
            return Err(LoginError::InvalidSession);
        }

        let (client, events) = self
            .connector
            .new_client()
            .await
            .map_err(LoginError::CollaboratorConnectFailure)?;
        spawn_event_delivery(
            self.sessions.clone(),
            session_id,
            client.device_id().to_string(),
            events,
        );

        match self.start_pairing(session_id, &client).await {
            Ok(login) => Ok(login),
            Err(e) => {
                self.sessions.detach_client(&session_id, &client);
                disconnect(client.as_ref()).await;
                Err(e)
            }
        }
    }

    async fn start_pairing(
        &self,
        session_id: Uuid,
        client: &Arc<dyn MessagingClient>,
    ) -> LoginResult<InitiatedLogin> {
        let mut qr_events = client
            .qr_channel()
            .await
            .map_err(LoginError::CollaboratorConnectFailure)?;
        client
            .connect()
            .await
            .map_err(LoginError::CollaboratorConnectFailure)?;

        let replaced = self
            .sessions
            .attach_client(&session_id, client.clone())
            .map_err(|_| LoginError::InvalidSession)?;
        if let Some(previous) = replaced {
            debug!(
                session_id = %session_id,
                device_id = previous.device_id(),
                "Replacing messaging client of an earlier login"
            );
            disconnect(previous.as_ref()).await;
        }

        let code = match timeout(self.registry.timeout(), qr_events.recv()).await {
            Ok(Some(QrEvent::Code(code))) => code,
            Ok(Some(other)) => return Err(LoginError::LoginRejected(other.to_string())),
            Ok(None) => {
                return Err(LoginError::LoginRejected(
                    "pairing stream closed before the first code".to_string(),
                ));
            }
            Err(_) => return Err(LoginError::NotifierTimeout),
        };

        let qr_png_base64 = self.renderer.render_base64(&code).await?;
        let login_id = self
            .registry
            .register(session_id, LoginNotifier::new(qr_events))?;

        info!(
            session_id = %session_id,
            login_id = %login_id,
            device_id = client.device_id(),
            "QR login initiated"
        );
        Ok(InitiatedLogin {
            login_id,
            qr_png_base64,
        })
    }

    /// Consume the pending login and wait for the pairing to finish.
    ///
    /// Only the session that initiated the login can complete it.
    pub async fn complete(&self, session_id: Uuid, login_id: Uuid) -> LoginResult<()> {
        let pending = self
            .registry
            .consume(&login_id, &session_id)
            .ok_or(LoginError::UnknownOrExpiredLogin)?;

        pending.wait().await?;

        let session = self
            .sessions
            .lookup(&session_id)
            .ok_or(LoginError::SessionInconsistency(session_id))?;
        let client = session
            .client()
            .ok_or(LoginError::SessionInconsistency(session_id))?;
        bootstrap(client.as_ref()).await;
        self.sessions
            .mark_ready(&session_id)
            .map_err(|_| LoginError::SessionInconsistency(session_id))?;

        info!(session_id = %session_id, login_id = %login_id, "QR login completed");
        Ok(())
    }
}

/// Disconnect a client that is no longer used. Failures are logged.
async fn disconnect(client: &dyn MessagingClient) {
    if let Err(e) = client.disconnect().await {
        warn!(device_id = client.device_id(), "Failed to disconnect messaging client: {}", e);
    }
}

/// Fetch every app-state patch once. Failures are logged, not fatal.
async fn bootstrap(client: &dyn MessagingClient) {
    for patch in AppStatePatch::ALL {
        if let Err(e) = client.fetch_app_state(patch).await {
            warn!(device_id = client.device_id(), patch = %patch, "App state fetch failed: {}", e);
        }
    }
}

/// Forward history snapshots from a client's event stream into its session.
fn spawn_event_delivery(
    sessions: Arc<SessionTable>,
    session_id: Uuid,
    device_id: String,
    mut events: ClientEvents,
) {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                ClientEvent::HistorySync(conversations) => {
                    debug!(
                        device_id = %device_id,
                        conversations = conversations.len(),
                        "History sync received"
                    );
                    sessions.append_history(&session_id, conversations).await;
                }
                ClientEvent::Connected => info!(device_id = %device_id, "Messaging client connected"),
                ClientEvent::LoggedOut => {
                    warn!(device_id = %device_id, "Messaging device logged out");
                }
            }
        }
        debug!(device_id = %device_id, "Client event stream closed");
    });
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;

    use super::*;
    use crate::messaging::Conversation;
    use crate::messaging::testing::{StubClient, StubConnector};
    use crate::session::OAuthTokens;

    struct Fixture {
        handshake: LoginHandshake,
        connector: Arc<StubConnector>,
        session_id: Uuid,
    }

    fn fixture_with_renderer(renderer: QrRenderer) -> Fixture {
        let sessions = Arc::new(SessionTable::new());
        let session_id = sessions.create_session(OAuthTokens::new("token")).unwrap();
        let connector = Arc::new(StubConnector::default());
        let handshake = LoginHandshake::new(
            PendingLoginRegistry::new(Duration::from_secs(60)),
            sessions,
            connector.clone(),
            renderer,
        );
        Fixture {
            handshake,
            connector,
            session_id,
        }
    }

    fn fixture() -> Fixture {
        fixture_with_renderer(QrRenderer::new("cat", Vec::new()))
    }

    async fn scripted_client(fx: &Fixture, id: &str) -> Arc<StubClient> {
        let client = Arc::new(StubClient::new(id));
        client
            .qr_sender()
            .send(QrEvent::Code("2@login".to_string()))
            .await
            .unwrap();
        fx.connector.push(client.clone());
        client
    }

    #[tokio::test]
    async fn test_initiate_renders_first_code() {
        let fx = fixture();
        scripted_client(&fx, "dev-1").await;

        let login = fx.handshake.initiate(fx.session_id).await.unwrap();

        assert_eq!(login.qr_png_base64, STANDARD.encode("2@login"));
        assert!(fx.handshake.registry().contains(&login.login_id));
        let session = fx.handshake.sessions().lookup(&fx.session_id).unwrap();
        assert_eq!(session.client().unwrap().device_id(), "dev-1");
        assert!(!session.is_ready());
    }

    #[tokio::test]
    async fn test_initiate_unknown_session() {
        let fx = fixture();
        let err = fx.handshake.initiate(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, LoginError::InvalidSession));
    }

    #[tokio::test]
    async fn test_initiate_connect_failure() {
        let fx = fixture();
        let client = Arc::new(StubClient::failing_connect("dev-1"));
        fx.connector.push(client.clone());

        let err = fx.handshake.initiate(fx.session_id).await.unwrap_err();
        assert!(matches!(err, LoginError::CollaboratorConnectFailure(_)));
        assert!(fx.handshake.registry().is_empty());
        assert!(client.is_disconnected());
    }

    #[tokio::test]
    async fn test_initiate_rendering_failure() {
        let fx = fixture_with_renderer(QrRenderer::new("false", Vec::new()));
        let client = scripted_client(&fx, "dev-1").await;

        let err = fx.handshake.initiate(fx.session_id).await.unwrap_err();
        assert!(matches!(err, LoginError::RenderingFailure(_)));
        assert!(fx.handshake.registry().is_empty());
        assert!(client.is_disconnected());
        let session = fx.handshake.sessions().lookup(&fx.session_id).unwrap();
        assert!(session.client().is_none());
    }

    #[tokio::test]
    async fn test_second_initiate_disconnects_previous_client() {
        let fx = fixture();
        let first = scripted_client(&fx, "dev-1").await;
        let second = scripted_client(&fx, "dev-2").await;

        fx.handshake.initiate(fx.session_id).await.unwrap();
        assert!(!first.is_disconnected());
        fx.handshake.initiate(fx.session_id).await.unwrap();

        assert!(first.is_disconnected());
        assert!(!second.is_disconnected());
        let session = fx.handshake.sessions().lookup(&fx.session_id).unwrap();
        assert_eq!(session.client().unwrap().device_id(), "dev-2");
    }

    #[tokio::test]
    async fn test_initiate_fails_without_code() {
        let fx = fixture();
        let client = Arc::new(StubClient::new("dev-1"));
        client
            .qr_sender()
            .send(QrEvent::Error("client outdated".to_string()))
            .await
            .unwrap();
        fx.connector.push(client.clone());

        let err = fx.handshake.initiate(fx.session_id).await.unwrap_err();
        assert!(matches!(err, LoginError::LoginRejected(_)));
        assert!(client.is_disconnected());
    }

    #[tokio::test]
    async fn test_complete_marks_session_ready() {
        let fx = fixture();
        let client = scripted_client(&fx, "dev-1").await;
        let login = fx.handshake.initiate(fx.session_id).await.unwrap();

        client.qr_sender().send(QrEvent::Success).await.unwrap();
        fx.handshake
            .complete(fx.session_id, login.login_id)
            .await
            .unwrap();

        let session = fx.handshake.sessions().lookup(&fx.session_id).unwrap();
        assert!(session.is_ready());
        // One failing patch does not stop the others.
        assert_eq!(client.fetched_patches(), AppStatePatch::ALL.to_vec());
    }

    #[tokio::test]
    async fn test_complete_replay_is_rejected() {
        let fx = fixture();
        let client = scripted_client(&fx, "dev-1").await;
        let login = fx.handshake.initiate(fx.session_id).await.unwrap();
        client.qr_sender().send(QrEvent::Success).await.unwrap();
        fx.handshake
            .complete(fx.session_id, login.login_id)
            .await
            .unwrap();

        let err = fx
            .handshake
            .complete(fx.session_id, login.login_id)
            .await
            .unwrap_err();
        assert!(matches!(err, LoginError::UnknownOrExpiredLogin));
    }

    #[tokio::test]
    async fn test_complete_from_other_session_is_rejected() {
        let fx = fixture();
        let client = scripted_client(&fx, "dev-1").await;
        let login = fx.handshake.initiate(fx.session_id).await.unwrap();
        client.qr_sender().send(QrEvent::Success).await.unwrap();
        let other = fx
            .handshake
            .sessions()
            .create_session(OAuthTokens::new("other"))
            .unwrap();

        let err = fx
            .handshake
            .complete(other, login.login_id)
            .await
            .unwrap_err();
        assert!(matches!(err, LoginError::UnknownOrExpiredLogin));
        let intruder = fx.handshake.sessions().lookup(&other).unwrap();
        assert!(!intruder.is_ready());
        assert!(intruder.client().is_none());

        // The owner can still finish its login.
        fx.handshake
            .complete(fx.session_id, login.login_id)
            .await
            .unwrap();
        let owner = fx.handshake.sessions().lookup(&fx.session_id).unwrap();
        assert!(owner.is_ready());
    }

    #[tokio::test]
    async fn test_complete_without_client_fails() {
        let fx = fixture();
        let client = scripted_client(&fx, "dev-1").await;
        let login = fx.handshake.initiate(fx.session_id).await.unwrap();
        client.qr_sender().send(QrEvent::Success).await.unwrap();

        let sessions = fx.handshake.sessions();
        let attached = sessions.lookup(&fx.session_id).unwrap().client().unwrap();
        assert!(sessions.detach_client(&fx.session_id, &attached));

        let err = fx
            .handshake
            .complete(fx.session_id, login.login_id)
            .await
            .unwrap_err();
        assert!(matches!(err, LoginError::SessionInconsistency(id) if id == fx.session_id));
        assert!(!sessions.lookup(&fx.session_id).unwrap().is_ready());
    }

    #[tokio::test]
    async fn test_complete_rejected_pairing() {
        let fx = fixture();
        let client = scripted_client(&fx, "dev-1").await;
        let login = fx.handshake.initiate(fx.session_id).await.unwrap();

        client
            .qr_sender()
            .send(QrEvent::Error("multidevice mismatch".to_string()))
            .await
            .unwrap();
        let err = fx
            .handshake
            .complete(fx.session_id, login.login_id)
            .await
            .unwrap_err();
        assert!(matches!(err, LoginError::LoginRejected(_)));
        assert!(
            !fx.handshake
                .sessions()
                .lookup(&fx.session_id)
                .unwrap()
                .is_ready()
        );
    }

    #[tokio::test]
    async fn test_complete_after_session_removed() {
        let fx = fixture();
        let client = scripted_client(&fx, "dev-1").await;
        let login = fx.handshake.initiate(fx.session_id).await.unwrap();
        client.qr_sender().send(QrEvent::Success).await.unwrap();

        fx.handshake.sessions().remove(&fx.session_id);

        let err = fx
            .handshake
            .complete(fx.session_id, login.login_id)
            .await
            .unwrap_err();
        assert!(matches!(err, LoginError::SessionInconsistency(id) if id == fx.session_id));
    }

    #[tokio::test]
    async fn test_history_sync_reaches_session() {
        let fx = fixture();
        let client = scripted_client(&fx, "dev-1").await;
        fx.handshake.initiate(fx.session_id).await.unwrap();

        client
            .events_sender()
            .unwrap()
            .send(ClientEvent::HistorySync(vec![Conversation {
                id: "1@g.us".to_string(),
                name: Some("Algebra".to_string()),
                messages: Vec::new(),
            }]))
            .await
            .unwrap();

        let session = fx.handshake.sessions().lookup(&fx.session_id).unwrap();
        tokio::time::timeout(Duration::from_secs(5), async {
            while session.history().await.is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(session.history().await[0].id, "1@g.us");
    }
}
