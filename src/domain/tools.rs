//! Interactive tools exposed via Model Context Protocol
//!
//! Provides `query_browsers`, `get_defaults` and `get_coverage` by delegating
//! to the [`QueryFacade`]. Argument and facade failures come back as tool
//! results flagged `isError`, never as JSON-RPC faults.

use rust_mcp_sdk::{
    macros,
    schema::{CallToolResult, ContentBlock, TextContent},
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::browsers::{QueryFacade, QueryOptions, QueryRequest};
use crate::mcp::server::{OperationFuture, RemoteOperation};

pub const QUERY_BROWSERS: &str = "query_browsers";
pub const GET_DEFAULTS: &str = "get_defaults";
pub const GET_COVERAGE: &str = "get_coverage";

#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct QueryOptionsArgs {
    /// Environment section of a browserslist config, e.g. "production"
    pub env: Option<String>,
    /// Path used to locate a browserslist config
    pub path: Option<String>,
}

#[macros::mcp_tool(
    name = "query_browsers",
    description = "Resolve a browserslist query (e.g. \"last 2 versions\", \"> 1%\") into the matching browsers"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct QueryBrowsersTool {
    /// Browserslist query string
    pub query: String,
    /// Optional config lookup settings
    pub options: Option<QueryOptionsArgs>,
}

#[macros::mcp_tool(
    name = "get_defaults",
    description = "Return the default browserslist query"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct GetDefaultsTool {}

#[macros::mcp_tool(
    name = "get_coverage",
    description = "Compute the global usage coverage of an explicit list of browsers"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct GetCoverageTool {
    /// Browsers as "<name> <version>", e.g. "chrome 90"
    pub browsers: Vec<String>,
}

pub fn build_operations() -> Vec<RemoteOperation> {
    vec![
        RemoteOperation::new(QueryBrowsersTool::tool(), query_browsers),
        RemoteOperation::new(GetDefaultsTool::tool(), get_defaults),
        RemoteOperation::new(GetCoverageTool::tool(), get_coverage),
    ]
}

fn query_browsers<'a>(
    facade: &'a QueryFacade,
    arguments: Map<String, Value>,
) -> OperationFuture<'a> {
    Box::pin(async move {
        let args: QueryBrowsersTool = match parse_arguments(QUERY_BROWSERS, arguments) {
            Ok(args) => args,
            Err(result) => return result,
        };

        let request = QueryRequest {
            query: args.query,
            options: args.options.map(|options| QueryOptions {
                env: options.env,
                path: options.path,
            }),
        };

        match facade.execute_query(&request).await {
            Ok(result) => success_result(&result),
            Err(err) => error_result(format!("Error executing query: {err}")),
        }
    })
}

fn get_defaults<'a>(
    facade: &'a QueryFacade,
    arguments: Map<String, Value>,
) -> OperationFuture<'a> {
    Box::pin(async move {
        if let Err(result) = parse_arguments::<GetDefaultsTool>(GET_DEFAULTS, arguments) {
            return result;
        }

        success_result(&json!({ "defaults": facade.get_defaults() }))
    })
}

fn get_coverage<'a>(
    facade: &'a QueryFacade,
    arguments: Map<String, Value>,
) -> OperationFuture<'a> {
    Box::pin(async move {
        let args: GetCoverageTool = match parse_arguments(GET_COVERAGE, arguments) {
            Ok(args) => args,
            Err(result) => return result,
        };

        match facade.get_coverage(&args.browsers).await {
            Ok(result) => success_result(&result),
            Err(err) => error_result(format!("Error calculating coverage: {err}")),
        }
    })
}

fn parse_arguments<T: for<'de> Deserialize<'de>>(
    tool: &str,
    arguments: Map<String, Value>,
) -> Result<T, CallToolResult> {
    serde_json::from_value(Value::Object(arguments))
        .map_err(|err| error_result(format!("Invalid arguments for {tool}: {err}")))
}

/// Pretty JSON text for humans plus the same data as `structuredContent`.
pub fn success_result<T: Serialize>(data: &T) -> CallToolResult {
    let (text, structured_content) = match serde_json::to_value(data) {
        Ok(value) => (
            serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string()),
            value.as_object().cloned(),
        ),
        Err(err) => return error_result(format!("Failed to encode result: {err}")),
    };

    CallToolResult {
        content: vec![ContentBlock::from(TextContent::new(text, None, None))],
        is_error: None,
        meta: None,
        structured_content,
    }
}

pub fn error_result(message: String) -> CallToolResult {
    CallToolResult {
        content: vec![ContentBlock::from(TextContent::new(message, None, None))],
        is_error: Some(true),
        meta: None,
        structured_content: None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::browsers::fake::facade;

    fn arguments(value: Value) -> Map<String, Value> {
        value.as_object().cloned().expect("arguments object")
    }

    fn text_of(result: &CallToolResult) -> String {
        let value = serde_json::to_value(result).expect("serializable result");
        value["content"][0]["text"]
            .as_str()
            .expect("text content")
            .to_string()
    }

    #[test]
    fn registers_three_operations_in_order() {
        let names: Vec<String> = build_operations()
            .iter()
            .map(|operation| operation.name().to_string())
            .collect();
        assert_eq!(names, vec![QUERY_BROWSERS, GET_DEFAULTS, GET_COVERAGE]);
    }

    #[tokio::test]
    async fn query_browsers_returns_text_and_structured_content() {
        let facade = facade();
        let result = query_browsers(&facade, arguments(json!({ "query": "last 1 version" }))).await;

        assert_eq!(result.is_error, None);
        let structured = result.structured_content.clone().expect("structured content");
        assert_eq!(structured["count"], 3);
        assert_eq!(structured["query"], "last 1 version");

        let text: Value = serde_json::from_str(&text_of(&result)).expect("json text");
        assert_eq!(text, Value::Object(structured));
    }

    #[tokio::test]
    async fn query_browsers_without_query_is_flagged_error() {
        let facade = facade();
        let result = query_browsers(&facade, arguments(json!({}))).await;

        assert_eq!(result.is_error, Some(true));
        assert!(text_of(&result).starts_with("Invalid arguments for query_browsers"));
    }

    #[tokio::test]
    async fn query_browsers_syntax_error_is_flagged_error() {
        let facade = facade();
        let result = query_browsers(
            &facade,
            arguments(json!({ "query": "invalid query syntax 123456" })),
        )
        .await;

        assert_eq!(result.is_error, Some(true));
        assert!(text_of(&result).contains("Unknown browser query"));
    }

    #[tokio::test]
    async fn get_defaults_returns_default_query() {
        let facade = facade();
        let result = get_defaults(&facade, Map::new()).await;

        let structured = result.structured_content.expect("structured content");
        assert_eq!(
            structured["defaults"],
            "> 0.5%, last 2 versions, Firefox ESR, not dead"
        );
    }

    #[tokio::test]
    async fn get_coverage_sums_known_browsers() {
        let facade = facade();
        let result = get_coverage(
            &facade,
            arguments(json!({ "browsers": ["chrome 90", "firefox 88"] })),
        )
        .await;

        let coverage = result.structured_content.expect("structured content")["coverage"]
            .as_f64()
            .expect("numeric coverage");
        assert!(coverage > 0.0 && coverage <= 100.0);
    }

    #[tokio::test]
    async fn get_coverage_rejects_non_string_entries() {
        let facade = facade();
        let result = get_coverage(&facade, arguments(json!({ "browsers": [90] }))).await;
        assert_eq!(result.is_error, Some(true));
    }
}
