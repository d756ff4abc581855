//! Request/response proxies for one buffered exchange
//!
//! [`ExchangeRequest`] and [`ExchangeResponse`] give a handler written against
//! an incrementally writable response the surface it expects, while every
//! write lands in an in-memory buffer. The buffer is materialized once, on
//! [`ServerResponse::end`], and handed to the single [`Completion`] reader.

use std::collections::HashMap;

use axum::{
    body::{Body, Bytes},
    http::{
        header::{HeaderName, HeaderValue},
        HeaderMap, Method, Response, StatusCode, Uri,
    },
    response::IntoResponse,
};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::transport::TransportError;

pub type Listener = Box<dyn FnMut() + Send>;

/// Read side of an inbound request as seen by a streaming-style handler.
pub trait IncomingMessage {
    fn method(&self) -> &Method;

    /// Path and query of the request target.
    fn url(&self) -> &str;

    /// Case-insensitive header lookup. Non-UTF-8 values read as absent.
    fn header(&self, name: &str) -> Option<&str>;
}

/// Write side of a response that is produced incrementally.
pub trait ServerResponse {
    /// Sets one header, replacing any previous value.
    fn set_header(&mut self, name: &str, value: &str);

    /// Sets the status and merges a batch of headers.
    fn write_head(&mut self, status: StatusCode, headers: &[(&str, &str)]);

    fn flush_headers(&mut self);

    fn headers_sent(&self) -> bool;

    /// Appends a chunk. There is no backpressure, so this always reports `true`.
    fn write(&mut self, chunk: &[u8]) -> bool;

    /// Appends an optional last chunk and completes the response.
    fn end(&mut self, chunk: Option<&[u8]>);

    fn on(&mut self, event: &str, listener: Listener);

    /// Runs the listeners registered for `event`, returning whether there were any.
    fn emit(&mut self, event: &str) -> bool;
}

#[derive(Debug, Clone)]
pub struct ExchangeRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
}

impl ExchangeRequest {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap) -> Self {
        Self {
            method,
            uri,
            headers,
        }
    }
}

impl IncomingMessage for ExchangeRequest {
    fn method(&self) -> &Method {
        &self.method
    }

    fn url(&self) -> &str {
        self.uri
            .path_and_query()
            .map(|target| target.as_str())
            .unwrap_or("/")
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .and_then(|value| value.to_str().ok())
    }
}

/// The snapshot delivered to the reader once the handler has finished.
#[derive(Debug, Clone)]
pub struct MaterializedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl MaterializedResponse {
    pub fn into_http(self) -> Response<Bytes> {
        let mut response = Response::new(self.body);
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

impl IntoResponse for MaterializedResponse {
    fn into_response(self) -> axum::response::Response {
        self.into_http().map(Body::from)
    }
}

pub struct ExchangeResponse {
    status: StatusCode,
    headers: HeaderMap,
    chunks: Vec<Bytes>,
    headers_sent: bool,
    listeners: HashMap<String, Vec<Listener>>,
    completion: Option<oneshot::Sender<MaterializedResponse>>,
}

impl ExchangeResponse {
    /// Creates an empty `200` response and the handle that observes its completion.
    pub fn new() -> (Self, Completion) {
        let (sender, receiver) = oneshot::channel();
        let response = Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            chunks: Vec::new(),
            headers_sent: false,
            listeners: HashMap::new(),
            completion: Some(sender),
        };

        (response, Completion { receiver })
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn is_finished(&self) -> bool {
        self.completion.is_none()
    }

    fn materialize(&mut self) -> MaterializedResponse {
        let length = self.chunks.iter().map(Bytes::len).sum();
        let mut body = Vec::with_capacity(length);
        for chunk in self.chunks.drain(..) {
            body.extend_from_slice(&chunk);
        }

        MaterializedResponse {
            status: self.status,
            headers: self.headers.clone(),
            body: Bytes::from(body),
        }
    }
}

impl ServerResponse for ExchangeResponse {
    fn set_header(&mut self, name: &str, value: &str) {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => warn!(header = %name, "ignoring invalid response header"),
        }
    }

    fn write_head(&mut self, status: StatusCode, headers: &[(&str, &str)]) {
        self.status = status;
        for (name, value) in headers {
            self.set_header(name, value);
        }
    }

    fn flush_headers(&mut self) {
        self.headers_sent = true;
    }

    fn headers_sent(&self) -> bool {
        self.headers_sent
    }

    fn write(&mut self, chunk: &[u8]) -> bool {
        self.headers_sent = true;
        self.chunks.push(Bytes::copy_from_slice(chunk));
        true
    }

    fn end(&mut self, chunk: Option<&[u8]>) {
        if let Some(chunk) = chunk {
            self.chunks.push(Bytes::copy_from_slice(chunk));
        }
        self.headers_sent = true;

        let Some(sender) = self.completion.take() else {
            debug!("response already ended, ignoring repeated end");
            return;
        };

        let snapshot = self.materialize();
        debug!(
            status = snapshot.status.as_u16(),
            bytes = snapshot.body.len(),
            "exchange materialized"
        );
        if sender.send(snapshot).is_err() {
            debug!("exchange reader went away before completion");
        }
    }

    fn on(&mut self, event: &str, listener: Listener) {
        self.listeners
            .entry(event.to_string())
            .or_default()
            .push(listener);
    }

    fn emit(&mut self, event: &str) -> bool {
        let Some(listeners) = self.listeners.get_mut(event) else {
            return false;
        };

        for listener in listeners.iter_mut() {
            listener();
        }
        !listeners.is_empty()
    }
}

/// Resolves exactly once, with the snapshot taken by the first `end`.
pub struct Completion {
    receiver: oneshot::Receiver<MaterializedResponse>,
}

impl Completion {
    /// Fails with [`TransportError::Abandoned`] if the response was dropped unfinished.
    pub async fn wait(self) -> Result<MaterializedResponse, TransportError> {
        self.receiver.await.map_err(|_| TransportError::Abandoned)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use axum::http::header;

    use super::*;

    #[tokio::test]
    async fn chunks_are_concatenated_in_write_order() {
        let (mut response, completion) = ExchangeResponse::new();

        assert!(response.write(b"a"));
        assert!(response.write(b"b"));
        response.end(Some(b"c"));

        let snapshot = completion.wait().await.expect("completed exchange");
        assert_eq!(snapshot.status, StatusCode::OK);
        assert_eq!(snapshot.body, Bytes::from_static(b"abc"));
    }

    #[tokio::test]
    async fn headers_from_every_call_are_kept() {
        let (mut response, completion) = ExchangeResponse::new();

        response.set_header("X-First", "1");
        response.write_head(
            StatusCode::ACCEPTED,
            &[("content-type", "application/json"), ("x-second", "2")],
        );
        response.set_header("x-first", "overwritten");
        response.write_head(StatusCode::ACCEPTED, &[("x-third", "3")]);
        response.end(None);

        let snapshot = completion.wait().await.expect("completed exchange");
        assert_eq!(snapshot.status, StatusCode::ACCEPTED);
        assert_eq!(snapshot.headers["x-first"], "overwritten");
        assert_eq!(snapshot.headers["x-second"], "2");
        assert_eq!(snapshot.headers["x-third"], "3");
        assert_eq!(snapshot.headers[header::CONTENT_TYPE], "application/json");
        assert!(snapshot.body.is_empty());
    }

    #[tokio::test]
    async fn only_the_first_end_resolves_completion() {
        let (mut response, completion) = ExchangeResponse::new();

        response.end(Some(b"first"));
        response.end(Some(b"second"));

        assert!(response.is_finished());
        let snapshot = completion.wait().await.expect("completed exchange");
        assert_eq!(snapshot.body, Bytes::from_static(b"first"));
    }

    #[tokio::test]
    async fn dropping_unfinished_response_abandons_completion() {
        let (mut response, completion) = ExchangeResponse::new();
        response.write(b"partial");
        drop(response);

        let error = completion.wait().await.expect_err("never ended");
        assert!(matches!(error, TransportError::Abandoned));
    }

    #[test]
    fn emit_invokes_listeners_synchronously() {
        let (mut response, _completion) = ExchangeResponse::new();
        let calls = Arc::new(AtomicUsize::new(0));

        assert!(!response.emit("close"));

        let counter = calls.clone();
        response.on(
            "close",
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        assert!(response.emit("close"));
        assert!(response.emit("close"));
        assert!(!response.emit("finish"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn invalid_headers_are_ignored() {
        let (mut response, _completion) = ExchangeResponse::new();
        response.set_header("bad header", "value");
        response.set_header("x-ok", "line\nbreak");
        assert!(!response.headers_sent());
        response.flush_headers();
        assert!(response.headers_sent());
    }

    #[test]
    fn request_header_lookup_is_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        let request = ExchangeRequest::new(
            Method::POST,
            Uri::from_static("https://worker.example/mcp?debug=1"),
            headers,
        );

        assert_eq!(request.method(), Method::POST);
        assert_eq!(request.url(), "/mcp?debug=1");
        assert_eq!(request.header("Accept"), Some("application/json"));
        assert_eq!(request.header("ACCEPT"), Some("application/json"));
        assert_eq!(request.header("content-type"), None);
    }
}
