//! monday.com OAuth handlers.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::Response;
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use tracing::info;

use super::found;
use crate::api::cookies::{self, STATE_COOKIE};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::monday::MondayOAuth;

const STATE_LENGTH: usize = 32;

fn configured_oauth(state: &AppState) -> ApiResult<&Arc<MondayOAuth>> {
    state
        .oauth
        .as_ref()
        .ok_or_else(|| ApiError::service_unavailable("monday.com OAuth is not configured"))
}

/// Redirect the browser to the provider's consent page.
pub async fn start_oauth(State(state): State<AppState>, jar: CookieJar) -> ApiResult<Response> {
    let oauth = configured_oauth(&state)?;
    let oauth_state = nanoid::nanoid!(STATE_LENGTH);
    let url = oauth.authorize_url(&oauth_state)?;

    info!("Starting monday.com OAuth flow");
    let jar = jar.add(cookies::state_cookie(oauth_state, state.server.secure_cookies));
    Ok(found(jar, url.to_string()))
}

#[derive(Debug, Deserialize)]
pub struct OAuthCallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// Exchange the code, open a session and continue to the QR login.
///
/// Every successful callback opens a new session; an earlier session of
/// the same browser is simply no longer referenced by its cookie.
pub async fn oauth_callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<OAuthCallbackQuery>,
) -> ApiResult<Response> {
    let oauth = configured_oauth(&state)?;

    if let Some(error) = query.error {
        return Err(ApiError::bad_request(format!(
            "authorization denied: {error}"
        )));
    }

    let expected = jar
        .get(STATE_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .ok_or_else(|| ApiError::bad_request("missing OAuth state cookie"))?;
    if query.state.as_deref() != Some(expected.as_str()) {
        return Err(ApiError::bad_request("OAuth state mismatch"));
    }

    let code = query
        .code
        .filter(|code| !code.is_empty())
        .ok_or_else(|| ApiError::bad_request("missing authorization code"))?;

    let tokens = oauth.exchange_code(&code).await?;
    let session_id = state.sessions.create_session(tokens)?;

    let jar = jar
        .remove(cookies::clear_state_cookie())
        .add(cookies::session_cookie(session_id, state.server.secure_cookies));
    Ok(found(
        jar,
        format!("{}/whatsapp-qr", state.server.service_url()),
    ))
}
