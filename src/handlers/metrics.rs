//! Metrics endpoint handler for Prometheus scraping.
//!
//! This module provides the `/metrics` endpoint handler. Every scrape runs the
//! system probe once before the registry is encoded, so host gauges are as
//! fresh as the request.

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use std::time::Instant;
use tracing::{debug, error, instrument};

use crate::error::HandlerError;
use crate::state::SharedState;

/// Handler for the /metrics endpoint.
#[instrument(skip(state))]
pub async fn metrics_handler(State(state): State<SharedState>) -> Result<Response, HandlerError> {
    let start = Instant::now();
    debug!("Processing /metrics request");

    // OS reads block, so the probe runs on the blocking pool. A panic inside
    // it is logged and the scrape still succeeds with the previous values.
    let probe_state = state.clone();
    if let Err(e) = tokio::task::spawn_blocking(move || probe_state.probe.collect()).await {
        error!("System probe aborted: {}", e);
    }
    let probe_ms = start.elapsed().as_secs_f64() * 1000.0;

    let body = state.registry.export()?;
    debug!(
        "Metrics exported: {} bytes (probe {:.2} ms, total {:.2} ms)",
        body.len(),
        probe_ms,
        start.elapsed().as_secs_f64() * 1000.0
    );

    Ok(([(header::CONTENT_TYPE, state.registry.content_type())], body).into_response())
}
