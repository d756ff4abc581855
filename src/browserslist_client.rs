use async_trait::async_trait;
use browserslist::Opts;
use tracing::debug;

use crate::browsers::{BrowserData, QueryError, QueryOptions};

/// browserslist's own `defaults` query.
pub const DEFAULT_QUERY: &str = "> 0.5%, last 2 versions, Firefox ESR, not dead";

/// Bisection steps when recovering a usage share; 100 / 2^32 is well below
/// the precision of the bundled usage data.
const USAGE_BISECTION_STEPS: u32 = 32;

#[derive(Debug, Default)]
pub struct BrowserslistClient;

impl BrowserslistClient {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BrowserData for BrowserslistClient {
    async fn resolve(
        &self,
        query: &str,
        options: &QueryOptions,
    ) -> Result<Vec<String>, QueryError> {
        let query = query.to_string();
        let opts = Opts {
            env: options.env.clone(),
            path: options.path.clone(),
            ..Opts::default()
        };

        tokio::task::spawn_blocking(move || {
            resolve_targets(&query, &opts).map_err(|err| QueryError::Syntax(err.to_string()))
        })
        .await
        .map_err(|err| QueryError::Engine(format!("query evaluation task failed: {err}")))?
    }

    fn default_query(&self) -> &'static str {
        DEFAULT_QUERY
    }

    async fn coverage(&self, browsers: &[String]) -> Result<f64, QueryError> {
        let browsers = browsers.to_vec();

        tokio::task::spawn_blocking(move || coverage_of(&browsers))
            .await
            .map_err(|err| QueryError::Engine(format!("coverage task failed: {err}")))?
    }
}

fn resolve_targets(query: &str, opts: &Opts) -> Result<Vec<String>, browserslist::Error> {
    let distribs = browserslist::resolve([query], opts)?;

    Ok(distribs
        .iter()
        .map(|distrib| format!("{} {}", distrib.name(), distrib.version()))
        .collect())
}

fn coverage_of(browsers: &[String]) -> Result<f64, QueryError> {
    let opts = Opts::default();

    // "ios 14" and "ios_saf 14.0-14.4" name the same target; count it once.
    let mut targets: Vec<String> = Vec::new();
    for browser in browsers {
        let target = single_target(browser, &opts)?;
        if !targets.contains(&target) {
            targets.push(target);
        }
    }

    let mut total = 0.0;
    for target in &targets {
        let usage = global_usage(target, &opts)?;
        debug!(target = %target, usage, "resolved global usage");
        total += usage;
    }

    Ok(total)
}

/// Resolves one `<name> <version>` entry to exactly one target.
fn single_target(browser: &str, opts: &Opts) -> Result<String, QueryError> {
    let not_a_browser =
        || QueryError::Coverage(format!("`{browser}` is not a single browser version."));

    if browser.split_whitespace().count() != 2 {
        return Err(not_a_browser());
    }

    let mut resolved =
        resolve_targets(browser, opts).map_err(|err| QueryError::Coverage(err.to_string()))?;
    match (resolved.pop(), resolved.is_empty()) {
        (Some(target), true) => Ok(target),
        _ => Err(not_a_browser()),
    }
}

/// Recovers the global usage of one resolved target from `> N%` queries.
///
/// The returned value is the upper end of the final bisection interval.
fn global_usage(target: &str, opts: &Opts) -> Result<f64, QueryError> {
    let used_above = |threshold: f64| -> Result<bool, QueryError> {
        resolve_targets(&format!("> {threshold:.10}%"), opts)
            .map(|selected| selected.iter().any(|entry| entry == target))
            .map_err(|err| QueryError::Engine(err.to_string()))
    };

    if !used_above(0.0)? {
        return Ok(0.0);
    }

    let (mut low, mut high) = (0.0_f64, 100.0_f64);
    for _ in 0..USAGE_BISECTION_STEPS {
        let middle = (low + high) / 2.0;
        if used_above(middle)? {
            low = middle;
        } else {
            high = middle;
        }
    }

    Ok(high)
}
