//! Login handshake errors.

use thiserror::Error;
use uuid::Uuid;

use crate::messaging::MessagingError;
use crate::render::RenderError;

/// Result type for login operations.
pub type LoginResult<T> = Result<T, LoginError>;

/// Ways a QR login can fail.
#[derive(Debug, Error)]
pub enum LoginError {
    /// Session cookie missing, unparseable or pointing nowhere.
    #[error("invalid session")]
    InvalidSession,

    /// Pending login unknown, expired or already consumed.
    #[error("login session invalid")]
    UnknownOrExpiredLogin,

    #[error("failed to render login code: {0}")]
    RenderingFailure(#[from] RenderError),

    #[error("failed to connect messaging client: {0}")]
    CollaboratorConnectFailure(#[source] MessagingError),

    /// No terminal event arrived before the pending login's deadline.
    #[error("timed out waiting for the login to complete")]
    NotifierTimeout,

    /// The messaging network reported a failed pairing.
    #[error("login rejected: {0}")]
    LoginRejected(String),

    /// A freshly generated pending-login id was already registered.
    #[error("generated login id {0} already exists")]
    IdCollision(Uuid),

    /// The pending login was consumed but its session is gone.
    #[error("session {0} disappeared during login")]
    SessionInconsistency(Uuid),
}
