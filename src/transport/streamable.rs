//! Stateless MCP Streamable HTTP transport
//!
//! Written against the [`IncomingMessage`]/[`ServerResponse`] proxies: it
//! validates the MCP HTTP headers, feeds JSON-RPC into the [`ProtocolServer`]
//! and writes either one JSON body or a Server-Sent-Events stream. No session
//! ids are issued, so every request carries its full context.

use std::sync::Arc;

use axum::http::{header, Method, StatusCode};
use serde_json::Value;
use tracing::debug;

use crate::mcp::rpc::{json_rpc_error, PARSE_ERROR, TRANSPORT_ERROR};
use crate::mcp::server::ProtocolServer;
use crate::transport::exchange::{IncomingMessage, ServerResponse};

const JSON_CONTENT_TYPE: &str = "application/json";
const SSE_CONTENT_TYPE: &str = "text/event-stream";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportOptions {
    /// Answer POSTs with a single JSON body instead of an SSE stream.
    pub json_response: bool,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            json_response: true,
        }
    }
}

#[derive(Clone)]
pub struct StreamableHttpTransport {
    server: Arc<ProtocolServer>,
    options: TransportOptions,
}

impl StreamableHttpTransport {
    pub fn stateless(server: Arc<ProtocolServer>, options: TransportOptions) -> Self {
        Self { server, options }
    }

    /// Handles one request and always finishes with `end` on the response.
    pub async fn handle_request<Req, Res>(&self, request: &Req, response: &mut Res, body: &[u8])
    where
        Req: IncomingMessage + ?Sized,
        Res: ServerResponse + ?Sized,
    {
        let url = request.url().to_string();
        response.on(
            "close",
            Box::new(move || debug!(url = %url, "mcp exchange closed")),
        );

        if request.method() == Method::POST {
            self.handle_post(request, response, body).await;
        } else {
            reject_method(response);
        }
    }

    async fn handle_post<Req, Res>(&self, request: &Req, response: &mut Res, body: &[u8])
    where
        Req: IncomingMessage + ?Sized,
        Res: ServerResponse + ?Sized,
    {
        let accept = request.header(header::ACCEPT.as_str()).unwrap_or_default();
        let accepts_both = lists_media_type(accept, JSON_CONTENT_TYPE)
            && lists_media_type(accept, SSE_CONTENT_TYPE);
        if !accepts_both {
            return write_error(
                response,
                StatusCode::NOT_ACCEPTABLE,
                TRANSPORT_ERROR,
                "Not Acceptable: Client must accept both application/json and text/event-stream",
            );
        }

        let content_type = request
            .header(header::CONTENT_TYPE.as_str())
            .unwrap_or_default();
        if !lists_media_type(content_type, JSON_CONTENT_TYPE) {
            return write_error(
                response,
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                TRANSPORT_ERROR,
                "Unsupported Media Type: Content-Type must be application/json",
            );
        }

        let payload: Value = match serde_json::from_slice(body) {
            Ok(payload) => payload,
            Err(_) => {
                return write_error(
                    response,
                    StatusCode::BAD_REQUEST,
                    PARSE_ERROR,
                    "Parse error: Invalid JSON",
                )
            }
        };

        let Some(reply) = self.server.handle_payload(payload).await else {
            response.write_head(StatusCode::ACCEPTED, &[]);
            return response.end(None);
        };

        if self.options.json_response {
            response.write_head(
                StatusCode::OK,
                &[(header::CONTENT_TYPE.as_str(), JSON_CONTENT_TYPE)],
            );
            return response.end(Some(reply.to_string().as_bytes()));
        }

        response.write_head(
            StatusCode::OK,
            &[
                (header::CONTENT_TYPE.as_str(), SSE_CONTENT_TYPE),
                (header::CACHE_CONTROL.as_str(), "no-cache"),
                (header::CONNECTION.as_str(), "keep-alive"),
            ],
        );
        response.flush_headers();

        let messages = match reply {
            Value::Array(messages) => messages,
            message => vec![message],
        };
        for message in &messages {
            response.write(sse_frame(message).as_bytes());
        }
        response.end(None);
    }
}

fn reject_method<Res: ServerResponse + ?Sized>(response: &mut Res) {
    response.set_header(header::ALLOW.as_str(), "POST");
    write_error(
        response,
        StatusCode::METHOD_NOT_ALLOWED,
        TRANSPORT_ERROR,
        "Method not allowed.",
    );
}

fn write_error<Res: ServerResponse + ?Sized>(
    response: &mut Res,
    status: StatusCode,
    code: i32,
    message: &str,
) {
    let body = json_rpc_error(None, code, message).to_string();
    response.write_head(status, &[(header::CONTENT_TYPE.as_str(), JSON_CONTENT_TYPE)]);
    response.end(Some(body.as_bytes()));
}

fn sse_frame(message: &Value) -> String {
    format!("event: message\ndata: {message}\n\n")
}

/// Matches the media type of each comma-separated entry, ignoring parameters and case.
fn lists_media_type(header_value: &str, media_type: &str) -> bool {
    header_value.split(',').any(|entry| {
        entry
            .split(';')
            .next()
            .map(str::trim)
            .is_some_and(|candidate| candidate.eq_ignore_ascii_case(media_type))
    })
}
