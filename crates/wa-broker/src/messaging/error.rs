//! Messaging collaborator error types.

use thiserror::Error;

/// Result type for messaging operations.
pub type MessagingResult<T> = Result<T, MessagingError>;

/// Errors that can occur while talking to the messaging bridge.
#[derive(Debug, Error)]
pub enum MessagingError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Bridge answered with a non-success status.
    #[error("bridge error ({status}): {message}")]
    Bridge { status: u16, message: String },

    /// Could not reach the bridge.
    #[error("failed to connect to bridge at {url}: {message}")]
    ConnectionFailed { url: String, message: String },

    /// Event stream could not be opened.
    #[error("event stream error: {0}")]
    EventStream(String),

    /// Bridge payload did not match the expected shape.
    #[error("failed to parse bridge response: {0}")]
    ParseError(String),
}
