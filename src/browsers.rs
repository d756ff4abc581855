//! Browser compatibility query facade
//!
//! Wraps a [`BrowserData`] engine behind the three operations every front end
//! exposes: query execution, the default query, and usage coverage.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("{0}")]
    InvalidInput(String),
    /// The query grammar rejected the input. Carries the library message.
    #[error("{0}")]
    Syntax(String),
    /// One of the explicit browsers could not be resolved.
    #[error("{0}")]
    Coverage(String),
    #[error("query engine failure: {0}")]
    Engine(String),
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct QueryOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub options: Option<QueryOptions>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct QueryResult {
    pub browsers: Vec<String>,
    pub query: String,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct CoverageResult {
    pub coverage: f64,
}

#[async_trait]
pub trait BrowserData: Send + Sync {
    /// Evaluates a query and returns `"<name> <version>"` entries in library order.
    async fn resolve(&self, query: &str, options: &QueryOptions)
        -> Result<Vec<String>, QueryError>;

    fn default_query(&self) -> &'static str;

    /// Global usage share, in percent, of an explicit browser list.
    async fn coverage(&self, browsers: &[String]) -> Result<f64, QueryError>;
}

#[derive(Clone)]
pub struct QueryFacade {
    engine: Arc<dyn BrowserData>,
}

impl QueryFacade {
    pub fn new(engine: Arc<dyn BrowserData>) -> Self {
        Self { engine }
    }

    pub async fn execute_query(&self, request: &QueryRequest) -> Result<QueryResult, QueryError> {
        let query = request.query.trim();
        if query.is_empty() {
            return Err(QueryError::InvalidInput(
                "query is required and must be a non-empty string".to_string(),
            ));
        }

        let options = normalize_options(request.options.clone());
        let browsers = self.engine.resolve(query, &options).await?;
        let count = browsers.len();

        Ok(QueryResult {
            browsers,
            query: request.query.clone(),
            count,
        })
    }

    pub fn get_defaults(&self) -> String {
        self.engine.default_query().to_string()
    }

    pub async fn get_coverage(&self, browsers: &[String]) -> Result<CoverageResult, QueryError> {
        if browsers.is_empty() {
            return Ok(CoverageResult { coverage: 0.0 });
        }

        let coverage = self.engine.coverage(browsers).await?;
        Ok(CoverageResult {
            coverage: coverage.clamp(0.0, 100.0),
        })
    }
}

/// Blank option values are treated as absent.
fn normalize_options(options: Option<QueryOptions>) -> QueryOptions {
    let Some(options) = options else {
        return QueryOptions::default();
    };

    let non_blank = |value: Option<String>| {
        value
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    };

    QueryOptions {
        env: non_blank(options.env),
        path: non_blank(options.path),
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Deterministic engine: knows `last 1 version` and a few explicit browsers.
    /// The query `stall` never resolves.
    #[derive(Default)]
    pub struct FakeBrowserData {
        pub coverage_calls: AtomicUsize,
    }

    #[async_trait]
    impl BrowserData for FakeBrowserData {
        async fn resolve(
            &self,
            query: &str,
            options: &QueryOptions,
        ) -> Result<Vec<String>, QueryError> {
            match query {
                "last 1 version" => Ok(vec![
                    "firefox 120".to_string(),
                    "chrome 121".to_string(),
                    "safari 17.2".to_string(),
                ]),
                "defaults" if options.env.as_deref() == Some("production") => {
                    Ok(vec!["chrome 121".to_string()])
                }
                "stall" => std::future::pending().await,
                _ => Err(QueryError::Syntax(format!(
                    "Unknown browser query `{query}`."
                ))),
            }
        }

        fn default_query(&self) -> &'static str {
            "> 0.5%, last 2 versions, Firefox ESR, not dead"
        }

        async fn coverage(&self, browsers: &[String]) -> Result<f64, QueryError> {
            self.coverage_calls.fetch_add(1, Ordering::SeqCst);
            browsers.iter().try_fold(0.0, |total, browser| {
                match browser.as_str() {
                    "chrome 90" => Ok(total + 0.25),
                    "firefox 88" => Ok(total + 0.05),
                    "chrome 121" => Ok(total + 99.0),
                    "firefox 120" => Ok(total + 3.0),
                    _ => Err(QueryError::Coverage(format!(
                        "Unknown browser query `{browser}`."
                    ))),
                }
            })
        }
    }

    pub fn facade() -> QueryFacade {
        QueryFacade::new(Arc::new(FakeBrowserData::default()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::fake::{facade, FakeBrowserData};
    use super::*;

    fn request(query: &str) -> QueryRequest {
        QueryRequest {
            query: query.to_string(),
            options: None,
        }
    }

    #[tokio::test]
    async fn count_matches_browsers_and_query_is_echoed() {
        let result = facade()
            .execute_query(&request("last 1 version"))
            .await
            .expect("query should resolve");

        assert_eq!(result.count, result.browsers.len());
        assert_eq!(result.query, "last 1 version");
        assert_eq!(result.browsers[0], "firefox 120");
    }

    #[tokio::test]
    async fn blank_query_is_invalid_input() {
        let error = facade()
            .execute_query(&request("   "))
            .await
            .expect_err("blank query must fail");
        assert!(matches!(error, QueryError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn syntax_errors_pass_library_message_through() {
        let error = facade()
            .execute_query(&request("invalid query syntax 123456"))
            .await
            .expect_err("invalid query must fail");
        assert_eq!(
            error,
            QueryError::Syntax("Unknown browser query `invalid query syntax 123456`.".to_string())
        );
    }

    #[tokio::test]
    async fn options_are_forwarded_and_blank_values_dropped() {
        let result = facade()
            .execute_query(&QueryRequest {
                query: "defaults".to_string(),
                options: Some(QueryOptions {
                    env: Some(" production ".to_string()),
                    path: Some("  ".to_string()),
                }),
            })
            .await
            .expect("env should be forwarded");
        assert_eq!(result.browsers, vec!["chrome 121".to_string()]);
    }

    #[tokio::test]
    async fn empty_coverage_is_zero_without_touching_engine() {
        let engine = Arc::new(FakeBrowserData::default());
        let facade = QueryFacade::new(engine.clone());

        let result = facade.get_coverage(&[]).await.expect("empty list is valid");
        assert_eq!(result, CoverageResult { coverage: 0.0 });
        assert_eq!(engine.coverage_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn coverage_is_capped_at_one_hundred() {
        let result = facade()
            .get_coverage(&["chrome 121".to_string(), "firefox 120".to_string()])
            .await
            .expect("known browsers");
        assert_eq!(result.coverage, 100.0);
    }

    #[tokio::test]
    async fn unknown_browser_is_coverage_error() {
        let error = facade()
            .get_coverage(&["netscape 4".to_string()])
            .await
            .expect_err("unknown browser must fail");
        assert!(matches!(error, QueryError::Coverage(_)));
    }

    #[test]
    fn defaults_are_stable() {
        let facade = facade();
        assert_eq!(facade.get_defaults(), facade.get_defaults());
    }
}
