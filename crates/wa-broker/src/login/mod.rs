//! QR login.
//!
//! ```text
//!  GET /whatsapp-qr ──▶ LoginHandshake::initiate ──▶ register(notifier) ──▶ id
//!                                                         │
//!                                   expiry timer ─────────┤ (first wins)
//!                                                         │
//!  GET /qr-callback?id ─▶ LoginHandshake::complete ─▶ consume(id) ─▶ wait ≤ deadline
//! ```

mod error;
mod handshake;
mod notifier;
mod registry;

pub use error::{LoginError, LoginResult};
pub use handshake::{InitiatedLogin, LoginHandshake};
pub use notifier::{LoginNotifier, LoginOutcome};
pub use registry::{PendingLogin, PendingLoginRegistry};
