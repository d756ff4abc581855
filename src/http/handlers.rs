//! Axum HTTP handlers for the REST API
//!
//! Thin wrappers over [`crate::api`]; every payload decision lives there.

use axum::{
    body::Bytes,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;

use crate::api::{self, DefaultsResponse, HealthResponse};
use crate::browsers::{CoverageResult, QueryResult};
use crate::domain::resources::{QueryExample, DOCUMENTATION, EXAMPLES};
use crate::errors::AppError;
use crate::AppState;

pub async fn index() -> Json<Value> {
    Json(api::service_metadata(false))
}

pub async fn health() -> Json<HealthResponse> {
    Json(api::health())
}

pub async fn query(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<QueryResult>, AppError> {
    Ok(Json(api::run_query(state.server.facade(), &body).await?))
}

pub async fn defaults(State(state): State<AppState>) -> Json<DefaultsResponse> {
    Json(api::defaults(state.server.facade()))
}

pub async fn coverage(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<CoverageResult>, AppError> {
    Ok(Json(api::run_coverage(state.server.facade(), &body).await?))
}

pub async fn documentation() -> Response {
    (
        [(header::CONTENT_TYPE, "text/markdown; charset=utf-8")],
        DOCUMENTATION,
    )
        .into_response()
}

pub async fn examples() -> Json<&'static [QueryExample]> {
    Json(EXAMPLES)
}
