//! Stateless adapter between single-shot HTTP exchanges and streaming-style handlers
//!
//! A fresh [`ExchangeResponse`] is created per request, the handler runs on its
//! own task, and the router waits on the [`Completion`] inside [`drive`], which
//! is the failure boundary for handlers that never finish.

pub mod exchange;
pub mod streamable;

use std::{future::Future, time::Duration};

use thiserror::Error;
use tracing::warn;

pub use exchange::{
    Completion, ExchangeRequest, ExchangeResponse, IncomingMessage, MaterializedResponse,
    ServerResponse,
};
pub use streamable::{StreamableHttpTransport, TransportOptions};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("handler dropped the response without ending it")]
    Abandoned,
    #[error("handler did not end the response within {0:?}")]
    TimedOut(Duration),
}

/// Runs `handler` against a fresh exchange and waits for its materialized response.
///
/// `timeout` of `None` waits as long as the handler keeps the response alive.
pub async fn drive<F, Fut>(
    request: ExchangeRequest,
    timeout: Option<Duration>,
    handler: F,
) -> Result<MaterializedResponse, TransportError>
where
    F: FnOnce(ExchangeRequest, ExchangeResponse) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let (response, completion) = ExchangeResponse::new();
    let task = tokio::spawn(handler(request, response));

    let outcome = match timeout {
        Some(limit) => match tokio::time::timeout(limit, completion.wait()).await {
            Ok(outcome) => outcome,
            Err(_) => {
                task.abort();
                Err(TransportError::TimedOut(limit))
            }
        },
        None => completion.wait().await,
    };

    if let Err(err) = &outcome {
        warn!(error = %err, "exchange failed before completion");
    }

    outcome
}
