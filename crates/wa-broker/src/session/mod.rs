//! Session table.
//!
//! Correlates the `sessionid` cookie with the OAuth tokens obtained from
//! monday.com, the messaging client attached by the QR login, and the
//! conversation history that client delivers in the background.

mod models;
mod table;

pub use models::{OAuthTokens, Session};
pub use table::{SessionError, SessionTable};
