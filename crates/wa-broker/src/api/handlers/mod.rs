//! Request handlers.

mod groups;
mod login;
mod misc;
mod oauth;

pub use groups::{choose_groups, list_groups};
pub use login::{qr_callback, whatsapp_qr};
pub use misc::health;
pub use oauth::{oauth_callback, start_oauth};

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::CookieJar;

/// 302 to `location`, carrying cookie changes from `jar`.
fn found(jar: CookieJar, location: String) -> Response {
    (StatusCode::FOUND, jar, [(header::LOCATION, location)]).into_response()
}
