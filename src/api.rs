//! REST payloads shared by the axum router and the edge worker
//!
//! Body parsing and validation live here so both front ends answer the same
//! inputs with the same status codes and `{"error": ...}` messages.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{json, Value};

use crate::browsers::{CoverageResult, QueryFacade, QueryRequest, QueryResult};
use crate::errors::AppError;

pub const SERVICE_NAME: &str = "browserslist-mcp";
pub const DEFAULTS_DESCRIPTION: &str =
    "Default browserslist query used when no configuration is provided";

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct DefaultsResponse {
    pub defaults: String,
    pub description: &'static str,
}

pub fn health() -> HealthResponse {
    HealthResponse {
        status: "ok",
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }
}

/// Service description and endpoint map; the `/mcp` entry only exists on the edge worker.
pub fn service_metadata(with_mcp: bool) -> Value {
    let mut endpoints = json!({
        "GET /": "Service metadata",
        "GET /health": "Health check",
        "POST /api/query": "Resolve a browserslist query",
        "GET /api/defaults": "Default browserslist query",
        "POST /api/coverage": "Global usage coverage of a browser list",
        "GET /api/documentation": "Query syntax documentation (markdown)",
        "GET /api/examples": "Example queries",
    });
    if with_mcp {
        endpoints["POST /mcp"] = json!("Model Context Protocol (streamable HTTP, stateless)");
    }

    json!({
        "name": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Browserslist queries over REST and the Model Context Protocol",
        "endpoints": endpoints,
    })
}

pub fn defaults(facade: &QueryFacade) -> DefaultsResponse {
    DefaultsResponse {
        defaults: facade.get_defaults(),
        description: DEFAULTS_DESCRIPTION,
    }
}

pub async fn run_query(facade: &QueryFacade, body: &[u8]) -> Result<QueryResult, AppError> {
    let request = parse_query_request(body)?;
    Ok(facade.execute_query(&request).await?)
}

pub async fn run_coverage(facade: &QueryFacade, body: &[u8]) -> Result<CoverageResult, AppError> {
    let browsers = parse_coverage_request(body)?;
    Ok(facade.get_coverage(&browsers).await?)
}

pub fn parse_query_request(body: &[u8]) -> Result<QueryRequest, AppError> {
    let payload = parse_body(body)?;

    let has_query = payload
        .get("query")
        .and_then(Value::as_str)
        .is_some_and(|query| !query.trim().is_empty());
    if !has_query {
        return Err(AppError::bad_request(
            "missing_query",
            "query is required and must be a non-empty string",
        ));
    }

    serde_json::from_value(payload).map_err(|err| {
        AppError::bad_request(
            "invalid_options",
            format!("options must be an object with optional string env and path: {err}"),
        )
    })
}

pub fn parse_coverage_request(body: &[u8]) -> Result<Vec<String>, AppError> {
    let payload = parse_body(body)?;

    payload
        .get("browsers")
        .and_then(Value::as_array)
        .and_then(|entries| {
            entries
                .iter()
                .map(|entry| entry.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
        })
        .ok_or_else(|| {
            AppError::bad_request("invalid_browsers", "browsers must be an array of strings")
        })
}

/// An empty body reads as `{}`; anything else must be a JSON object.
fn parse_body(body: &[u8]) -> Result<Value, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(json!({}));
    }

    match serde_json::from_slice::<Value>(body) {
        Ok(payload) if payload.is_object() => Ok(payload),
        Ok(_) => Err(AppError::bad_request(
            "invalid_body",
            "request body must be a JSON object",
        )),
        Err(_) => Err(AppError::bad_request(
            "invalid_json",
            "request body must be valid JSON",
        )),
    }
}
