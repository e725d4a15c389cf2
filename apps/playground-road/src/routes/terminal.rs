use axum::extract::{Path, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tracing::debug;

use crate::state::AppState;
use crate::terminal::{resolve, TerminalTarget};

pub fn terminal_routes() -> Router<AppState> {
    Router::new()
        .route("/sessions/:session_id/terminal", get(terminal_instance))
        .route("/sessions/:session_id/terminal/ws", get(terminal_ws))
}

/// The instance a terminal for this session would attach to.
pub async fn terminal_instance(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    match resolve(state.platform(), &session_id).await {
        Ok(instance) => (StatusCode::OK, Json(instance)).into_response(),
        Err(err) => err.into_response(),
    }
}

/// Resolves the session before upgrading, so a bad session never opens a
/// socket.
pub async fn terminal_ws(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    ws: Option<WebSocketUpgrade>,
) -> Response {
    let instance = match resolve(state.platform(), &session_id).await {
        Ok(instance) => instance,
        Err(err) => return err.into_response(),
    };
    let Some(ws) = ws else {
        return (StatusCode::UPGRADE_REQUIRED, "websocket upgrade required").into_response();
    };

    let target = TerminalTarget::for_instance(&instance);
    let transport = state.transport();
    debug!(%session_id, instance = %target.instance_name, "upgrading terminal connection");
    ws.on_upgrade(move |socket| async move { transport.serve(socket, target).await })
}
