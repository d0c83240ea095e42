//! WhatsApp/monday.com broker library.
//!
//! Provides the pending QR-login registry, the session table, the login
//! handshake that ties them to the messaging bridge, and the HTTP API that
//! exposes the whole flow.

pub mod api;
pub mod login;
pub mod messaging;
pub mod monday;
pub mod render;
pub mod session;
pub mod settings;
