//! QR login handlers.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Html;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::cookies::SessionCookie;
use crate::api::error::ApiResult;
use crate::api::page;
use crate::api::state::AppState;
use crate::login::LoginError;

/// Start a QR login and serve the page showing its code.
pub async fn whatsapp_qr(
    State(state): State<AppState>,
    SessionCookie(session_id): SessionCookie,
) -> ApiResult<Html<String>> {
    let login = state.handshake.initiate(session_id).await?;
    Ok(Html(page::qr_page(&state.server.normalized_prefix(), &login)))
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    id: Option<String>,
}

/// Block until the pending login identified by `?id=` completes.
pub async fn qr_callback(
    State(state): State<AppState>,
    SessionCookie(session_id): SessionCookie,
    Query(query): Query<CallbackQuery>,
) -> ApiResult<StatusCode> {
    // Missing, malformed, unknown and replayed ids all look the same.
    let login_id = query
        .id
        .as_deref()
        .and_then(|id| Uuid::parse_str(id).ok())
        .ok_or(LoginError::UnknownOrExpiredLogin)?;

    state.handshake.complete(session_id, login_id).await?;
    Ok(StatusCode::OK)
}
