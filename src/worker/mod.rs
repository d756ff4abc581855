//! Edge worker front end
//!
//! A single-shot `Request -> Response` function with its own literal dispatch
//! table. It serves the REST surface plus a stateless MCP endpoint at `/mcp`,
//! which runs the streamable transport through the buffering adapter.

use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use axum::{
    body::{Body, Bytes},
    extract::{Request as AxumRequest, State},
    http::{header, HeaderValue, Method, Request, Response, StatusCode},
    middleware,
    response::{IntoResponse, Response as AxumResponse},
    Router,
};
use serde::Serialize;

use crate::api;
use crate::domain::resources::{DOCUMENTATION, EXAMPLES};
use crate::errors::AppError;
use crate::http::apply_cors_headers;
use crate::logging;
use crate::mcp::server::ProtocolServer;
use crate::transport::{self, ExchangeRequest, StreamableHttpTransport, TransportOptions};

/// Bodies above this size are rejected before dispatch.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

pub type EdgeResponse = Response<Bytes>;
type RouteFuture<'a> = Pin<Box<dyn Future<Output = Result<EdgeResponse, AppError>> + Send + 'a>>;
type RouteHandler = for<'a> fn(&'a EdgeWorker, &'a Request<Bytes>) -> RouteFuture<'a>;

struct Route {
    /// `None` matches any method.
    method: Option<Method>,
    path: &'static str,
    handler: RouteHandler,
}

pub struct EdgeWorker {
    server: Arc<ProtocolServer>,
    options: TransportOptions,
    handler_timeout: Option<Duration>,
    routes: Vec<Route>,
}

impl EdgeWorker {
    pub fn new(
        server: Arc<ProtocolServer>,
        options: TransportOptions,
        handler_timeout: Option<Duration>,
    ) -> Self {
        let routes = vec![
            route(Some(Method::GET), "/", index),
            route(Some(Method::GET), "/health", health),
            route(Some(Method::POST), "/api/query", query),
            route(Some(Method::GET), "/api/defaults", defaults),
            route(Some(Method::POST), "/api/coverage", coverage),
            route(Some(Method::GET), "/api/documentation", documentation),
            route(Some(Method::GET), "/api/examples", examples),
            route(None, "/mcp", mcp),
        ];

        Self {
            server,
            options,
            handler_timeout,
            routes,
        }
    }

    pub async fn fetch(&self, request: Request<Bytes>) -> EdgeResponse {
        let mut response = if request.method() == Method::OPTIONS {
            empty_response(StatusCode::NO_CONTENT)
        } else {
            match self.find_route(request.method(), request.uri().path()) {
                Some(route) => (route.handler)(self, &request)
                    .await
                    .unwrap_or_else(error_response),
                None => error_response(AppError::endpoint_not_found(
                    request.method().as_str(),
                    request.uri().path(),
                )),
            }
        };

        apply_cors_headers(response.headers_mut());
        response
    }

    fn find_route(&self, method: &Method, path: &str) -> Option<&Route> {
        self.routes.iter().find(|route| {
            route.path == path
                && route
                    .method
                    .as_ref()
                    .map_or(true, |expected| expected == method)
        })
    }
}

fn route(method: Option<Method>, path: &'static str, handler: RouteHandler) -> Route {
    Route {
        method,
        path,
        handler,
    }
}

/// Hosts the worker on a local listener: every request is collected and fed to `fetch`.
pub fn build_edge_app(worker: Arc<EdgeWorker>) -> Router {
    Router::new()
        .fallback(serve)
        .layer(middleware::from_fn(logging::request_logging_middleware))
        .with_state(worker)
}

async fn serve(State(worker): State<Arc<EdgeWorker>>, request: AxumRequest) -> AxumResponse {
    let (parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(body) => body,
        Err(_) => {
            let mut response = error_response(AppError::bad_request(
                "body_too_large",
                "request body is too large or could not be read",
            ));
            apply_cors_headers(response.headers_mut());
            return response.map(Body::from).into_response();
        }
    };

    worker
        .fetch(Request::from_parts(parts, body))
        .await
        .map(Body::from)
        .into_response()
}

fn index<'a>(_worker: &'a EdgeWorker, _request: &'a Request<Bytes>) -> RouteFuture<'a> {
    Box::pin(async move { json_response(StatusCode::OK, &api::service_metadata(true)) })
}

fn health<'a>(_worker: &'a EdgeWorker, _request: &'a Request<Bytes>) -> RouteFuture<'a> {
    Box::pin(async move { json_response(StatusCode::OK, &api::health()) })
}

fn query<'a>(worker: &'a EdgeWorker, request: &'a Request<Bytes>) -> RouteFuture<'a> {
    Box::pin(async move {
        let result = api::run_query(worker.server.facade(), request.body()).await?;
        json_response(StatusCode::OK, &result)
    })
}

fn defaults<'a>(worker: &'a EdgeWorker, _request: &'a Request<Bytes>) -> RouteFuture<'a> {
    Box::pin(async move { json_response(StatusCode::OK, &api::defaults(worker.server.facade())) })
}

fn coverage<'a>(worker: &'a EdgeWorker, request: &'a Request<Bytes>) -> RouteFuture<'a> {
    Box::pin(async move {
        let result = api::run_coverage(worker.server.facade(), request.body()).await?;
        json_response(StatusCode::OK, &result)
    })
}

fn documentation<'a>(_worker: &'a EdgeWorker, _request: &'a Request<Bytes>) -> RouteFuture<'a> {
    Box::pin(async move {
        let mut response = Response::new(Bytes::from_static(DOCUMENTATION.as_bytes()));
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/markdown; charset=utf-8"),
        );
        Ok(response)
    })
}

fn examples<'a>(_worker: &'a EdgeWorker, _request: &'a Request<Bytes>) -> RouteFuture<'a> {
    Box::pin(async move { json_response(StatusCode::OK, EXAMPLES) })
}

fn mcp<'a>(worker: &'a EdgeWorker, request: &'a Request<Bytes>) -> RouteFuture<'a> {
    Box::pin(async move {
        let transport = StreamableHttpTransport::stateless(worker.server.clone(), worker.options);
        let body = request.body().clone();
        let exchange = ExchangeRequest::new(
            request.method().clone(),
            request.uri().clone(),
            request.headers().clone(),
        );

        let snapshot = transport::drive(
            exchange,
            worker.handler_timeout,
            move |request, mut response| async move {
                transport.handle_request(&request, &mut response, &body).await;
            },
        )
        .await
        .map_err(|err| AppError::internal(format!("mcp exchange failed: {err}")))?;

        Ok(snapshot.into_http())
    })
}

fn json_response<T: Serialize + ?Sized>(
    status: StatusCode,
    value: &T,
) -> Result<EdgeResponse, AppError> {
    let body = serde_json::to_vec(value)
        .map_err(|err| AppError::internal(format!("response serialization failed: {err}")))?;

    let mut response = Response::new(Bytes::from(body));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    Ok(response)
}

fn error_response(error: AppError) -> EdgeResponse {
    let status = error.status();
    let body = error.error_body();
    json_response(status, &body).unwrap_or_else(|_| {
        let mut response = Response::new(Bytes::from_static(
            br#"{"error":"Internal server error"}"#,
        ));
        *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        response
    })
}

fn empty_response(status: StatusCode) -> EdgeResponse {
    let mut response = Response::new(Bytes::new());
    *response.status_mut() = status;
    response
}
