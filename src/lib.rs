use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

pub mod api;
pub mod browsers;
pub mod browserslist_client;
pub mod config;
pub mod domain;
pub mod errors;
pub mod http;
pub mod logging;
pub mod mcp;
pub mod transport;
pub mod worker;

use browsers::{BrowserData, QueryFacade};
use mcp::server::ProtocolServer;

#[derive(Clone)]
pub struct AppState {
    pub server: Arc<ProtocolServer>,
}

impl AppState {
    pub fn new(engine: Arc<dyn BrowserData>) -> Self {
        Self::from_server(Arc::new(ProtocolServer::new(QueryFacade::new(engine))))
    }

    pub fn from_server(server: Arc<ProtocolServer>) -> Self {
        Self { server }
    }
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(http::handlers::index))
        .route("/health", get(http::handlers::health))
        .route("/api/query", post(http::handlers::query))
        .route("/api/defaults", get(http::handlers::defaults))
        .route("/api/coverage", post(http::handlers::coverage))
        .route("/api/documentation", get(http::handlers::documentation))
        .route("/api/examples", get(http::handlers::examples))
        .fallback(http::not_found)
        .method_not_allowed_fallback(http::not_found)
        .layer(middleware::from_fn(http::cors_middleware))
        .layer(middleware::from_fn(logging::request_logging_middleware))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::browsers::fake::FakeBrowserData;

    use super::*;

    fn app() -> Router {
        build_app(AppState::new(Arc::new(FakeBrowserData::default())))
    }

    async fn send(request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
        let response = app().oneshot(request).await.expect("request execution");
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("collect body")
            .to_bytes();
        (status, headers, body.to_vec())
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .method("GET")
            .body(Body::empty())
            .expect("request build")
    }

    fn post_json(uri: &str, body: &'static str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .method("POST")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .expect("request build")
    }

    fn json(body: &[u8]) -> serde_json::Value {
        serde_json::from_slice(body).expect("valid json response")
    }

    #[tokio::test]
    async fn health_reports_service_and_version() {
        let (status, headers, body) = send(get_request("/health")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers["access-control-allow-origin"], "*");
        let body = json(&body);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "browserslist-mcp");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
        assert!(body["timestamp"].as_str().is_some_and(|value| value.ends_with('Z')));
    }

    #[tokio::test]
    async fn root_lists_endpoints_without_mcp() {
        let (status, _, body) = send(get_request("/")).await;

        assert_eq!(status, StatusCode::OK);
        let body = json(&body);
        assert!(body["endpoints"]["POST /api/query"].is_string());
        assert!(body["endpoints"].get("POST /mcp").is_none());
    }

    #[tokio::test]
    async fn unknown_path_returns_not_found_with_path() {
        let (status, _, body) = send(get_request("/unknown-path")).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json(&body)["error"], "Endpoint not found: GET /unknown-path");
    }

    #[tokio::test]
    async fn wrong_method_returns_not_found() {
        let (status, _, body) = send(get_request("/api/query")).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json(&body)["error"], "Endpoint not found: GET /api/query");
    }

    #[tokio::test]
    async fn mcp_is_not_served_by_the_rest_app() {
        let (status, _, _) = send(post_json(
            "/mcp",
            r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#,
        ))
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn options_returns_no_content_with_cors() {
        let (status, headers, body) = send(
            Request::builder()
                .uri("/api/query")
                .method("OPTIONS")
                .body(Body::empty())
                .expect("request build"),
        )
        .await;

        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(headers["access-control-allow-origin"], "*");
        assert!(headers.contains_key("access-control-allow-methods"));
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn query_returns_browsers() {
        let (status, _, body) =
            send(post_json("/api/query", r#"{"query":"last 1 version"}"#)).await;

        assert_eq!(status, StatusCode::OK);
        let body = json(&body);
        assert_eq!(body["query"], "last 1 version");
        assert_eq!(
            body["count"].as_u64(),
            body["browsers"].as_array().map(|list| list.len() as u64)
        );
    }

    #[tokio::test]
    async fn invalid_query_returns_bad_request() {
        let (status, _, body) = send(post_json(
            "/api/query",
            r#"{"query":"invalid query syntax 123456"}"#,
        ))
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json(&body)["error"]
            .as_str()
            .is_some_and(|error| error.contains("invalid query syntax 123456")));
    }

    #[tokio::test]
    async fn missing_query_returns_bad_request() {
        let (status, _, body) = send(post_json("/api/query", r#"{"options":{}}"#)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            json(&body)["error"],
            "query is required and must be a non-empty string"
        );
    }

    #[tokio::test]
    async fn defaults_returns_query_and_description() {
        let (status, _, body) = send(get_request("/api/defaults")).await;

        assert_eq!(status, StatusCode::OK);
        let body = json(&body);
        assert_eq!(body["defaults"], "> 0.5%, last 2 versions, Firefox ESR, not dead");
        assert!(body["description"].is_string());
    }

    #[tokio::test]
    async fn coverage_returns_percentage() {
        let (status, _, body) = send(post_json(
            "/api/coverage",
            r#"{"browsers":["chrome 90","firefox 88"]}"#,
        ))
        .await;

        assert_eq!(status, StatusCode::OK);
        let coverage = json(&body)["coverage"].as_f64().expect("numeric coverage");
        assert!(coverage > 0.0 && coverage <= 100.0);
    }

    #[tokio::test]
    async fn coverage_with_unknown_browser_returns_bad_request() {
        let (status, _, body) =
            send(post_json("/api/coverage", r#"{"browsers":["netscape 4"]}"#)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json(&body)["error"].is_string());
    }

    #[tokio::test]
    async fn documentation_and_examples_are_served() {
        let (status, headers, body) = send(get_request("/api/documentation")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CONTENT_TYPE], "text/markdown; charset=utf-8");
        assert!(String::from_utf8(body).expect("utf-8").contains("last 2 versions"));

        let (status, _, body) = send(get_request("/api/examples")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(json(&body)
            .as_array()
            .is_some_and(|examples| !examples.is_empty()));
    }
}
