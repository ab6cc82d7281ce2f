//! HTTP surface: `POST /execute` action dispatch and `GET /health`.
//!
//! Every `/execute` outcome is a JSON envelope with HTTP 200; callers branch
//! on `ok`, not on the status code.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{info, instrument, warn};

use crate::aggregate::Aggregator;
use crate::fetch::{Fetch, HttpFetcher};
use crate::models::{AggregationReport, ChartRequest};

pub const BEATPORT_TOP: &str = "beatport_top";
const HEALTH_STATUS: &str = "ok";

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid listen address `{address}`: {source}")]
    InvalidListenAddr {
        address: String,
        #[source]
        source: std::net::AddrParseError,
    },
    #[error("failed to bind to {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("axum server error: {source}")]
    Serve {
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Deserialize)]
struct ExecuteRequest {
    action: String,
    #[serde(default)]
    params: Option<Value>,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(untagged)]
pub enum ExecuteResponse {
    Done {
        ok: bool,
        action: &'static str,
        result: AggregationReport,
    },
    Failed {
        ok: bool,
        error: String,
    },
}

impl ExecuteResponse {
    fn failed(error: impl ToString) -> Self {
        ExecuteResponse::Failed {
            ok: false,
            error: error.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// Decode an `/execute` body and run the named action.
#[instrument(level = "info", skip_all)]
pub async fn execute<F: Fetch>(aggregator: &Aggregator<F>, body: &[u8]) -> ExecuteResponse {
    let request: ExecuteRequest = match serde_json::from_slice(body) {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, "Malformed execute request");
            return ExecuteResponse::failed(format!("invalid request body: {e}"));
        }
    };

    match request.action.as_str() {
        BEATPORT_TOP => {
            let params = request
                .params
                .filter(|p| !p.is_null())
                .unwrap_or_else(|| Value::Object(Default::default()));
            let chart: ChartRequest = match serde_json::from_value(params) {
                Ok(c) => c,
                Err(e) => return ExecuteResponse::failed(format!("invalid params: {e}")),
            };
            let result = aggregator.aggregate(&chart.genre, chart.deep_limit).await;
            ExecuteResponse::Done {
                ok: result.ok,
                action: BEATPORT_TOP,
                result,
            }
        }
        other => {
            warn!(action = %other, "Unknown action");
            ExecuteResponse::failed(format!("unknown action: {other}"))
        }
    }
}

async fn execute_handler(
    State(aggregator): State<Arc<Aggregator<HttpFetcher>>>,
    body: Bytes,
) -> Json<ExecuteResponse> {
    Json(execute(&*aggregator, &body).await)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: HEALTH_STATUS,
    })
}

pub fn build_router(aggregator: Arc<Aggregator<HttpFetcher>>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/execute", post(execute_handler))
        .with_state(aggregator)
}

fn parse_listen_addr(addr: &str) -> Result<SocketAddr, ServerError> {
    let trimmed = addr.trim();
    trimmed
        .parse()
        .map_err(|source| ServerError::InvalidListenAddr {
            address: trimmed.to_string(),
            source,
        })
}

pub async fn serve(listen_addr: &str, aggregator: Aggregator<HttpFetcher>) -> Result<(), ServerError> {
    let addr = parse_listen_addr(listen_addr)?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind {
            address: addr.to_string(),
            source,
        })?;
    info!(%addr, "beatport_charts server listening");

    let app = build_router(Arc::new(aggregator));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|source| ServerError::Serve { source })?;

    info!("server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(%error, "failed to capture Ctrl+C signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received; draining connections");
}
