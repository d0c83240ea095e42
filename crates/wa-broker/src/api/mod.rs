//! HTTP API module.
//!
//! Login, OAuth and group-import endpoints, all mounted under the
//! configured path prefix.

mod cookies;
mod error;
mod handlers;
mod page;
mod routes;
mod state;

pub use cookies::{SESSION_COOKIE, STATE_COOKIE, SessionCookie};
pub use error::{ApiError, ApiResult, ErrorResponse};
pub use routes::create_router;
pub use state::AppState;
