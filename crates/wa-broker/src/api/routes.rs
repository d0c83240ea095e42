//! API route definitions.

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

use super::handlers;
use super::state::AppState;

/// Create the application router, mounted under the configured path prefix.
pub fn create_router(state: AppState) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let prefix = state.server.normalized_prefix();

    let routes = Router::new()
        // QR login
        .route("/whatsapp-qr", get(handlers::whatsapp_qr))
        .route("/qr-callback", get(handlers::qr_callback))
        // OAuth
        .route("/start", get(handlers::start_oauth))
        .route("/oauth/callback", get(handlers::oauth_callback))
        // Group import
        .route("/listgroups", get(handlers::list_groups))
        .route("/choosegroup", post(handlers::choose_groups))
        .route("/health", get(handlers::health))
        .with_state(state);

    let app = if prefix.is_empty() {
        routes
    } else {
        Router::new().nest(&prefix, routes)
    };

    app.layer(trace_layer)
}
