//! Cookie names, builders and the session cookie extractor.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::Duration;
use tracing::debug;
use uuid::Uuid;

use super::error::ApiError;
use crate::login::LoginError;

pub const SESSION_COOKIE: &str = "sessionid";
pub const STATE_COOKIE: &str = "monday_auth_state";

/// Session id taken from the `sessionid` cookie.
///
/// Rejects with 400 when the cookie is missing or not a UUID. Whether the
/// session exists is left to the handler.
#[derive(Debug, Clone, Copy)]
pub struct SessionCookie(pub Uuid);

impl<S> FromRequestParts<S> for SessionCookie
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let Some(cookie) = jar.get(SESSION_COOKIE) else {
            debug!("Request without session cookie");
            return Err(LoginError::InvalidSession.into());
        };
        let id = Uuid::parse_str(cookie.value()).map_err(|e| {
            debug!("Unparseable session cookie: {}", e);
            ApiError::from(LoginError::InvalidSession)
        })?;
        Ok(SessionCookie(id))
    }
}

/// Cookie carrying the session id, readable by every path.
pub(super) fn session_cookie(id: Uuid, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, id.to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .build()
}

/// Short-lived cookie holding the OAuth `state` until the callback.
pub(super) fn state_cookie(state: String, secure: bool) -> Cookie<'static> {
    Cookie::build((STATE_COOKIE, state))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(Duration::minutes(10))
        .build()
}

pub(super) fn clear_state_cookie() -> Cookie<'static> {
    Cookie::build((STATE_COOKIE, ""))
        .path("/")
        .max_age(Duration::ZERO)
        .build()
}
