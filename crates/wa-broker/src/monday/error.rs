use thiserror::Error;

use crate::settings::ConfigValidationError;

pub type MondayResult<T> = Result<T, MondayError>;

#[derive(Debug, Error)]
pub enum MondayError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("failed to connect to {url}: {message}")]
    ConnectionFailed { url: String, message: String },

    /// Non-success HTTP status from monday.com.
    #[error("monday.com error ({status}): {message}")]
    Api { status: u16, message: String },

    /// GraphQL-level errors in an otherwise successful response.
    #[error("GraphQL error: {0}")]
    GraphQl(String),

    /// A board group the import relies on was never created.
    #[error("board group {0} is missing")]
    MissingGroup(&'static str),

    #[error("failed to parse monday.com response: {0}")]
    ParseError(String),

    #[error("invalid URL {url}: {message}")]
    InvalidUrl { url: String, message: String },

    #[error("OAuth is not configured: {0}")]
    NotConfigured(#[from] ConfigValidationError),

    #[error("media download failed: {0}")]
    Download(#[from] crate::messaging::MessagingError),
}
