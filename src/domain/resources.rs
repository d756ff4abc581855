//! Model Context Protocol static resource providers
//!
//! Exposes the query documentation and a list of example queries under
//! `browserslist://` URIs. The REST front ends serve the same content.

use rust_mcp_sdk::schema::Resource;
use serde::Serialize;

use crate::errors::AppError;
use crate::mcp::server::RemoteResource;

pub const DOCUMENTATION_RESOURCE_URI: &str = "browserslist://documentation";
pub const EXAMPLES_RESOURCE_URI: &str = "browserslist://examples";

pub const DOCUMENTATION: &str = include_str!("documentation.md");

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct QueryExample {
    pub query: &'static str,
    pub description: &'static str,
}

pub const EXAMPLES: &[QueryExample] = &[
    QueryExample {
        query: "defaults",
        description: "Browserslist's default browsers",
    },
    QueryExample {
        query: "> 1%",
        description: "Browsers with more than 1% global usage",
    },
    QueryExample {
        query: "last 2 versions",
        description: "The last two versions of each browser",
    },
    QueryExample {
        query: "last 1 version, not dead",
        description: "Latest version of every browser that is still maintained",
    },
    QueryExample {
        query: "> 0.5%, last 2 versions, Firefox ESR, not dead",
        description: "The expanded default query",
    },
    QueryExample {
        query: "cover 99.5%",
        description: "Most popular browsers covering 99.5% of global usage",
    },
    QueryExample {
        query: "> 5% in US",
        description: "Browsers with more than 5% usage in the United States",
    },
    QueryExample {
        query: "Chrome >= 100",
        description: "Chrome 100 and newer",
    },
    QueryExample {
        query: "since 2022",
        description: "Versions released since 2022",
    },
    QueryExample {
        query: "supports es6-module",
        description: "Browsers with native ES module support",
    },
    QueryExample {
        query: "maintained node versions",
        description: "Node.js versions still maintained by the Node.js Foundation",
    },
];

pub fn build_resources() -> Vec<RemoteResource> {
    vec![
        RemoteResource::new(
            Resource {
                annotations: None,
                description: Some("Browserslist query syntax and server usage".to_string()),
                icons: vec![],
                meta: None,
                mime_type: Some("text/markdown".to_string()),
                name: "documentation".to_string(),
                size: None,
                title: Some("Browserslist Documentation".to_string()),
                uri: DOCUMENTATION_RESOURCE_URI.to_string(),
            },
            read_documentation,
        ),
        RemoteResource::new(
            Resource {
                annotations: None,
                description: Some("Example browserslist queries with descriptions".to_string()),
                icons: vec![],
                meta: None,
                mime_type: Some("application/json".to_string()),
                name: "examples".to_string(),
                size: None,
                title: Some("Browserslist Examples".to_string()),
                uri: EXAMPLES_RESOURCE_URI.to_string(),
            },
            read_examples,
        ),
    ]
}

pub fn read_documentation() -> Result<String, AppError> {
    Ok(DOCUMENTATION.to_string())
}

pub fn read_examples() -> Result<String, AppError> {
    serde_json::to_string_pretty(EXAMPLES)
        .map_err(|err| AppError::internal(format!("examples serialization failed: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn examples_resource_is_a_json_array_of_queries() {
        let text = read_examples().expect("examples serialize");
        let parsed: serde_json::Value = serde_json::from_str(&text).expect("valid json");
        let items = parsed.as_array().expect("array");

        assert_eq!(items.len(), EXAMPLES.len());
        assert!(items
            .iter()
            .all(|item| item["query"].is_string() && item["description"].is_string()));
    }

    #[test]
    fn resources_have_unique_uris() {
        let resources = build_resources();
        assert_eq!(resources.len(), 2);
        assert_ne!(resources[0].uri(), resources[1].uri());
    }

    #[test]
    fn documentation_is_markdown() {
        assert!(read_documentation()
            .expect("documentation")
            .starts_with("# Browserslist"));
    }
}
