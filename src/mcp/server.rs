//! The central Model Context Protocol engine
//!
//! Holds the operation and resource registry built once at startup and
//! provides the JSON-RPC decoding, method routing, and capabilities
//! negotiation (`initialize`) shared by every transport.

use std::{collections::HashMap, future::Future, pin::Pin};

use rust_mcp_sdk::schema::{
    CallToolRequest, CallToolRequestParams, CallToolResult, Implementation, InitializeRequest,
    InitializeResult, JsonrpcMessage, JsonrpcRequest, ListResourcesRequest, ListResourcesResult,
    ListToolsRequest, ListToolsResult, PingRequest, ReadResourceContent, ReadResourceRequest,
    ReadResourceRequestParams, ReadResourceResult, Resource, ServerCapabilities,
    ServerCapabilitiesResources, ServerCapabilitiesTools, TextResourceContents, Tool,
};
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::browsers::QueryFacade;
use crate::domain::{resources::build_resources, tools::build_operations};
use crate::errors::AppError;
use crate::mcp::rpc::{
    app_error_to_json_rpc, is_json_rpc_error, json_rpc_error, json_rpc_error_with_data,
    json_rpc_result, json_rpc_typed_result, request_id_to_value, INVALID_PARAMS,
    INVALID_REQUEST, METHOD_NOT_FOUND,
};

/// Newest first; an unsupported client version is answered with the first entry.
pub const SUPPORTED_PROTOCOL_VERSIONS: [&str; 3] = ["2025-06-18", "2025-03-26", "2024-11-05"];

const SERVER_INSTRUCTIONS: &str = "Resolve browserslist queries, read the default query, and \
compute usage coverage. Read the documentation resource for the query syntax.";

pub type OperationFuture<'a> = Pin<Box<dyn Future<Output = CallToolResult> + Send + 'a>>;
pub type OperationHandler =
    for<'a> fn(&'a QueryFacade, Map<String, Value>) -> OperationFuture<'a>;
pub type ResourceReader = fn() -> Result<String, AppError>;

pub struct RemoteOperation {
    tool: Tool,
    handler: OperationHandler,
}

impl RemoteOperation {
    pub fn new(tool: Tool, handler: OperationHandler) -> Self {
        Self { tool, handler }
    }

    pub fn name(&self) -> &str {
        &self.tool.name
    }

    pub fn tool(&self) -> &Tool {
        &self.tool
    }
}

pub struct RemoteResource {
    resource: Resource,
    reader: ResourceReader,
}

impl RemoteResource {
    pub fn new(resource: Resource, reader: ResourceReader) -> Self {
        Self { resource, reader }
    }

    pub fn uri(&self) -> &str {
        &self.resource.uri
    }

    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    pub fn read(&self) -> Result<String, AppError> {
        (self.reader)()
    }
}

/// Immutable registry of remote operations and resources.
///
/// Built once and shared behind an `Arc` by every front end.
pub struct ProtocolServer {
    facade: QueryFacade,
    operations: Vec<RemoteOperation>,
    operation_index: HashMap<String, usize>,
    resources: Vec<RemoteResource>,
    resource_index: HashMap<String, usize>,
}

impl ProtocolServer {
    pub fn new(facade: QueryFacade) -> Self {
        Self::with_registry(facade, build_operations(), build_resources())
    }

    pub fn with_registry(
        facade: QueryFacade,
        operations: Vec<RemoteOperation>,
        resources: Vec<RemoteResource>,
    ) -> Self {
        let mut server = Self {
            facade,
            operations: Vec::with_capacity(operations.len()),
            operation_index: HashMap::new(),
            resources: Vec::with_capacity(resources.len()),
            resource_index: HashMap::new(),
        };

        for operation in operations {
            if server.operation_index.contains_key(operation.name()) {
                warn!(name = %operation.name(), "duplicate operation ignored");
                continue;
            }
            server
                .operation_index
                .insert(operation.name().to_string(), server.operations.len());
            server.operations.push(operation);
        }

        for resource in resources {
            if server.resource_index.contains_key(resource.uri()) {
                warn!(uri = %resource.uri(), "duplicate resource ignored");
                continue;
            }
            server
                .resource_index
                .insert(resource.uri().to_string(), server.resources.len());
            server.resources.push(resource);
        }

        server
    }

    pub fn facade(&self) -> &QueryFacade {
        &self.facade
    }

    pub fn operation(&self, name: &str) -> Option<&RemoteOperation> {
        self.operation_index
            .get(name)
            .map(|&position| &self.operations[position])
    }

    pub fn resource(&self, uri: &str) -> Option<&RemoteResource> {
        self.resource_index
            .get(uri)
            .map(|&position| &self.resources[position])
    }

    pub fn tools(&self) -> Vec<Tool> {
        self.operations
            .iter()
            .map(|operation| operation.tool().clone())
            .collect()
    }

    pub fn resources(&self) -> Vec<Resource> {
        self.resources
            .iter()
            .map(|resource| resource.resource().clone())
            .collect()
    }

    /// Handles a decoded JSON-RPC payload, single message or batch.
    ///
    /// Returns `None` when nothing needs to be sent back (notifications only).
    pub async fn handle_payload(&self, payload: Value) -> Option<Value> {
        let Value::Array(batch) = payload else {
            return self.handle_json_rpc_value(payload).await;
        };

        if batch.is_empty() {
            return Some(json_rpc_error(None, INVALID_REQUEST, "Invalid Request"));
        }

        let mut responses = Vec::new();
        for item in batch {
            if let Some(response) = self.handle_json_rpc_value(item).await {
                responses.push(response);
            }
        }

        if responses.is_empty() {
            None
        } else {
            Some(Value::Array(responses))
        }
    }

    pub async fn handle_json_rpc_value(&self, payload: Value) -> Option<Value> {
        if !payload.is_object() {
            return Some(json_rpc_error(None, INVALID_REQUEST, "Invalid Request"));
        }

        let request_id = payload.get("id").cloned();
        let parsed: JsonrpcMessage = match serde_json::from_value(payload) {
            Ok(message) => message,
            Err(_) => return Some(json_rpc_error(request_id, INVALID_REQUEST, "Invalid Request")),
        };

        match parsed {
            JsonrpcMessage::Request(request) => {
                if let Err(error_response) = validate_request_shape(&request) {
                    return Some(error_response);
                }

                let request_id = request_id_to_value(request.id);
                if request.method.trim().is_empty() {
                    return Some(json_rpc_error(
                        Some(request_id),
                        INVALID_REQUEST,
                        "Invalid Request",
                    ));
                }

                Some(
                    self.handle_json_rpc_request(
                        Some(request_id),
                        request.method,
                        request.params.map(Value::Object),
                    )
                    .await,
                )
            }
            JsonrpcMessage::Notification(notification) => {
                if notification.method.trim().is_empty() {
                    return None;
                }

                let _ = self
                    .handle_json_rpc_request(
                        None,
                        notification.method,
                        notification.params.map(Value::Object),
                    )
                    .await;
                None
            }
            JsonrpcMessage::ResultResponse(_) | JsonrpcMessage::ErrorResponse(_) => {
                Some(json_rpc_error(request_id, INVALID_REQUEST, "Invalid Request"))
            }
        }
    }

    pub async fn handle_json_rpc_request(
        &self,
        id: Option<Value>,
        method: String,
        params: Option<Value>,
    ) -> Value {
        let target = audit_target(&method, params.as_ref());

        let response = match method.as_str() {
            "initialize" => match negotiate_protocol_version(params.as_ref()) {
                Ok(protocol_version) => {
                    json_rpc_typed_result(id, &initialize_result(protocol_version))
                }
                Err(err) => app_error_to_json_rpc(id, err),
            },
            "ping" => json_rpc_result(id, json!({})),
            "tools/list" => json_rpc_typed_result(
                id,
                &ListToolsResult {
                    meta: None,
                    next_cursor: None,
                    tools: self.tools(),
                },
            ),
            "tools/call" => self.handle_tools_call(id, params).await,
            "resources/list" => json_rpc_typed_result(
                id,
                &ListResourcesResult {
                    meta: None,
                    next_cursor: None,
                    resources: self.resources(),
                },
            ),
            "resources/read" => self.handle_resources_read(id, params),
            method if method.starts_with("notifications/") => json_rpc_result(id, json!({})),
            _ => json_rpc_error(id, METHOD_NOT_FOUND, "Method not found"),
        };

        info!(
            method = %method,
            target = %target,
            outcome = if is_json_rpc_error(&response) { "failure" } else { "success" },
            "mcp action audited"
        );

        response
    }

    async fn handle_tools_call(&self, id: Option<Value>, params: Option<Value>) -> Value {
        let Some(raw_params) = params else {
            return json_rpc_error(id, INVALID_PARAMS, "Invalid params");
        };

        let tool_call: CallToolRequestParams = match serde_json::from_value(raw_params) {
            Ok(value) => value,
            Err(_) => return json_rpc_error(id, INVALID_PARAMS, "Invalid params"),
        };

        let Some(operation) = self.operation(&tool_call.name) else {
            return json_rpc_error_with_data(
                id,
                METHOD_NOT_FOUND,
                "Method not found",
                Some(json!({
                    "code": "tool_not_found",
                    "message": "unknown tool name",
                    "details": {
                        "name": tool_call.name,
                    },
                })),
            );
        };

        let result =
            (operation.handler)(&self.facade, tool_call.arguments.unwrap_or_default()).await;
        json_rpc_typed_result(id, &result)
    }

    fn handle_resources_read(&self, id: Option<Value>, params: Option<Value>) -> Value {
        let Some(raw_params) = params else {
            return json_rpc_error(id, INVALID_PARAMS, "Invalid params");
        };

        let resource_read: ReadResourceRequestParams = match serde_json::from_value(raw_params) {
            Ok(value) => value,
            Err(_) => return json_rpc_error(id, INVALID_PARAMS, "Invalid params"),
        };

        let Some(resource) = self.resource(&resource_read.uri) else {
            return json_rpc_error_with_data(
                id,
                METHOD_NOT_FOUND,
                "Method not found",
                Some(json!({
                    "code": "resource_not_found",
                    "message": "unknown resource uri",
                    "details": {
                        "uri": resource_read.uri,
                    },
                })),
            );
        };

        match resource.read() {
            Ok(text) => json_rpc_typed_result(
                id,
                &ReadResourceResult {
                    contents: vec![ReadResourceContent::from(TextResourceContents {
                        meta: None,
                        mime_type: resource.resource().mime_type.clone(),
                        text,
                        uri: resource.uri().to_string(),
                    })],
                    meta: None,
                },
            ),
            Err(err) => app_error_to_json_rpc(id, err),
        }
    }
}

fn initialize_result(protocol_version: &str) -> InitializeResult {
    InitializeResult {
        server_info: Implementation {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            title: Some("Browserslist MCP Server".to_string()),
            description: None,
            icons: vec![],
            website_url: None,
        },
        capabilities: ServerCapabilities {
            tools: Some(ServerCapabilitiesTools {
                list_changed: Some(false),
            }),
            resources: Some(ServerCapabilitiesResources {
                subscribe: Some(false),
                list_changed: Some(false),
            }),
            prompts: None,
            ..Default::default()
        },
        protocol_version: protocol_version.to_string(),
        instructions: Some(SERVER_INSTRUCTIONS.to_string()),
        meta: None,
    }
}

pub fn validate_request_shape(request: &JsonrpcRequest) -> Result<(), Value> {
    let request_id = Some(request_id_to_value(request.id.clone()));
    let Ok(payload) = serde_json::to_value(request) else {
        return Err(json_rpc_error(request_id, INVALID_REQUEST, "Invalid Request"));
    };

    let valid = match request.method.as_str() {
        "tools/call" => serde_json::from_value::<CallToolRequest>(payload).is_ok(),
        "resources/read" => serde_json::from_value::<ReadResourceRequest>(payload).is_ok(),
        "tools/list" => serde_json::from_value::<ListToolsRequest>(payload).is_ok(),
        "resources/list" => serde_json::from_value::<ListResourcesRequest>(payload).is_ok(),
        "ping" => serde_json::from_value::<PingRequest>(payload).is_ok(),
        "initialize" => serde_json::from_value::<InitializeRequest>(payload).is_ok(),
        _ => true,
    };

    if valid {
        Ok(())
    } else {
        Err(json_rpc_error(request_id, INVALID_PARAMS, "Invalid params"))
    }
}

pub fn negotiate_protocol_version(params: Option<&Value>) -> Result<&'static str, AppError> {
    let offered_version = params
        .and_then(Value::as_object)
        .and_then(|object| object.get("protocolVersion"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|version| !version.is_empty())
        .ok_or_else(|| {
            AppError::bad_request(
                "invalid_protocol_version",
                "initialize params.protocolVersion is required",
            )
        })?;

    let negotiated = SUPPORTED_PROTOCOL_VERSIONS
        .iter()
        .find(|supported| **supported == offered_version)
        .copied()
        .unwrap_or(SUPPORTED_PROTOCOL_VERSIONS[0]);

    Ok(negotiated)
}

/// Tool name or resource uri named by the call, for the audit line.
fn audit_target(method: &str, params: Option<&Value>) -> String {
    let key = match method {
        "tools/call" => "name",
        "resources/read" => "uri",
        _ => return String::new(),
    };

    params
        .and_then(|params| params.get(key))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
