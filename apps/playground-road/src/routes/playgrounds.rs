use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use playground_store::{Playground, DEFAULT_SESSION_DURATION_SECS};
use serde::Deserialize;

use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreatePlaygroundRequest {
    pub domain: String,
    #[serde(default)]
    pub default_session_duration_secs: Option<u64>,
    #[serde(default)]
    pub default_image: Option<String>,
    #[serde(default)]
    pub allow_windows_instances: bool,
}

#[derive(Deserialize)]
pub struct LookupQuery {
    pub domain: String,
}

pub fn playground_routes() -> Router<AppState> {
    Router::new()
        .route("/playgrounds", get(list_playgrounds).post(create_playground))
        .route("/playgrounds/lookup", get(lookup_playground))
        .route("/playgrounds/:id", get(get_playground))
}

pub async fn create_playground(
    State(state): State<AppState>,
    Json(body): Json<CreatePlaygroundRequest>,
) -> Response {
    let domain = body.domain.trim();
    if domain.is_empty() {
        return (StatusCode::BAD_REQUEST, "domain must not be empty").into_response();
    }
    let playground = Playground {
        id: String::new(),
        domain: domain.to_string(),
        default_session_duration_secs: body
            .default_session_duration_secs
            .unwrap_or(DEFAULT_SESSION_DURATION_SECS),
        default_image: body.default_image,
        allow_windows_instances: body.allow_windows_instances,
    };
    match state.platform().playground_new(playground).await {
        Ok(created) => (StatusCode::CREATED, Json(created)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn list_playgrounds(State(state): State<AppState>) -> Response {
    match state.platform().playground_list().await {
        Ok(all) => Json(all).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn get_playground(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.platform().playground_get(&id).await {
        Ok(pg) => Json(pg).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn lookup_playground(
    State(state): State<AppState>,
    Query(query): Query<LookupQuery>,
) -> Response {
    match state.platform().playground_find_by_domain(&query.domain).await {
        Ok(pg) => Json(pg).into_response(),
        Err(err) => err.into_response(),
    }
}
