//! Unified API error handling with structured responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::login::LoginError;
use crate::monday::MondayError;
use crate::session::SessionError;

/// API error type with structured responses.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    /// Internal failure of the QR login, reported with its own code.
    #[error("{message}")]
    Login {
        code: &'static str,
        message: String,
    },
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn service_unavailable(msg: impl Into<String>) -> Self {
        Self::ServiceUnavailable(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) | Self::Login { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Login { code, .. } => *code,
        }
    }
}

/// Structured error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();
        let message = self.to_string();

        match &self {
            ApiError::Internal(_) | ApiError::Login { .. } => {
                error!(error_code = code, message = %message, "API error");
            }
            ApiError::ServiceUnavailable(msg) => {
                warn!(error_code = code, message = %msg, "Service unavailable");
            }
            ApiError::BadRequest(_) => {
                debug!(error_code = code, message = %message, "Client error");
            }
        }

        let body = ErrorResponse {
            error: message,
            code,
        };

        (status, Json(body)).into_response()
    }
}

impl From<LoginError> for ApiError {
    fn from(err: LoginError) -> Self {
        let code = match &err {
            LoginError::InvalidSession => return ApiError::BadRequest(err.to_string()),
            LoginError::UnknownOrExpiredLogin => "LOGIN_INVALID",
            LoginError::RenderingFailure(_) => "RENDERING_FAILED",
            LoginError::CollaboratorConnectFailure(_) => "CONNECT_FAILED",
            LoginError::NotifierTimeout => "LOGIN_TIMEOUT",
            LoginError::LoginRejected(_) => "LOGIN_REJECTED",
            LoginError::IdCollision(_) => "ID_COLLISION",
            LoginError::SessionInconsistency(_) => "SESSION_INCONSISTENT",
        };
        ApiError::Login {
            code,
            message: err.to_string(),
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound(_) => ApiError::BadRequest("invalid session".to_string()),
            SessionError::IdCollision(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<MondayError> for ApiError {
    fn from(err: MondayError) -> Self {
        match err {
            MondayError::NotConfigured(_) => ApiError::ServiceUnavailable(err.to_string()),
            _ => ApiError::Internal(format!("monday.com: {}", err)),
        }
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
