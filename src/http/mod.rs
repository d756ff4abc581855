//! HTTP front ends for the REST API
//!
//! Provides the axum handlers plus the cross-origin handling and the uniform
//! 404 shared with the edge worker.

pub mod handlers;

use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::errors::AppError;

pub const CORS_HEADERS: [(&str, &str); 5] = [
    ("access-control-allow-origin", "*"),
    ("access-control-allow-methods", "GET, POST, DELETE, OPTIONS"),
    (
        "access-control-allow-headers",
        "Content-Type, Accept, Authorization, Mcp-Session-Id, Mcp-Protocol-Version",
    ),
    ("access-control-expose-headers", "Mcp-Session-Id"),
    ("access-control-max-age", "86400"),
];

pub fn apply_cors_headers(headers: &mut HeaderMap) {
    for (name, value) in CORS_HEADERS {
        headers.insert(name, HeaderValue::from_static(value));
    }
}

/// Answers `OPTIONS` ahead of routing and adds CORS headers to every response.
pub async fn cors_middleware(request: Request, next: Next) -> Response {
    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(request).await
    };

    apply_cors_headers(response.headers_mut());
    response
}

pub async fn not_found(method: Method, request: Request) -> AppError {
    AppError::endpoint_not_found(method.as_str(), request.uri().path())
}
