//! Group listing and board import handlers.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::api::cookies::SessionCookie;
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::login::LoginError;
use crate::messaging::MessagingClient;
use crate::monday::{BoardImporter, MondayClient};
use crate::session::Session;

/// A group as offered to and chosen by the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupOption {
    /// Group name.
    pub label: String,
    /// Group topic.
    pub value: String,
}

fn connected_session(
    state: &AppState,
    session_id: &uuid::Uuid,
) -> ApiResult<(Arc<Session>, Arc<dyn MessagingClient>)> {
    let session = state
        .sessions
        .lookup(session_id)
        .ok_or(LoginError::InvalidSession)?;
    let client = session
        .client()
        .ok_or_else(|| ApiError::bad_request("no messaging account connected"))?;
    Ok((session, client))
}

/// Groups the connected messaging account belongs to.
pub async fn list_groups(
    State(state): State<AppState>,
    SessionCookie(session_id): SessionCookie,
) -> ApiResult<Json<Vec<GroupOption>>> {
    let (_, client) = connected_session(&state, &session_id)?;

    let groups = client
        .joined_groups()
        .await
        .map_err(|e| ApiError::internal(format!("failed to list groups: {e}")))?;

    Ok(Json(
        groups
            .into_iter()
            .map(|group| GroupOption {
                label: group.name,
                value: group.topic,
            })
            .collect(),
    ))
}

/// Import the shared files of each chosen group into its own board.
///
/// Imports run in the background; the response only acknowledges them.
pub async fn choose_groups(
    State(state): State<AppState>,
    SessionCookie(session_id): SessionCookie,
    body: Result<Json<Vec<GroupOption>>, JsonRejection>,
) -> ApiResult<StatusCode> {
    let Json(groups) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let (session, client) = connected_session(&state, &session_id)?;

    let monday = MondayClient::new(state.http.clone(), &state.monday, session.access_token());
    let importer = BoardImporter::new(monday, client);

    for group in groups {
        let media = session.media_in(&group.label).await;
        info!(
            session_id = %session_id,
            group = %group.label,
            files = media.len(),
            "Scheduling group import"
        );

        let importer = importer.clone();
        tokio::spawn(async move {
            if let Err(e) = importer.import_group(&group.label, media).await {
                error!(group = %group.label, "Group import failed: {}", e);
            }
        });
    }

    Ok(StatusCode::ACCEPTED)
}
