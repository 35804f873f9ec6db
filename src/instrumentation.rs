//! Request lifecycle instrumentation.
//!
//! [`RequestInstrumentation::on_entry`] opens a [`RequestContext`] and
//! [`RequestInstrumentation::on_exit`] closes it. The context records its
//! metrics when it is dropped, so every entry is paired with exactly one exit
//! even when a handler panics or the connection goes away mid-request.
//! [`track_requests`] adapts the pair to axum middleware.

use axum::{
    extract::{MatchedPath, Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use std::time::{Duration, Instant};
use tracing::info;

use crate::metrics::{HttpMetrics, NO_LABELS};
use crate::state::SharedState;

/// Endpoint label for requests that matched no route.
pub const UNMATCHED_ENDPOINT: &str = "not_found";

/// Entry/exit hooks around every request.
#[derive(Clone)]
pub struct RequestInstrumentation {
    metrics: HttpMetrics,
}

impl RequestInstrumentation {
    pub fn new(metrics: HttpMetrics) -> Self {
        Self { metrics }
    }

    /// Marks a request as in flight and starts its clock.
    pub fn on_entry(&self, endpoint: &str, method: &str) -> RequestContext {
        self.metrics
            .requests_in_progress
            .with_label_values(NO_LABELS)
            .inc();
        RequestContext {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
            metrics: self.metrics.clone(),
        }
    }

    /// Finishes a request. Returns the elapsed time that was recorded.
    pub fn on_exit(&self, ctx: RequestContext, status: StatusCode) -> Duration {
        let elapsed = ctx.start.elapsed();
        info!(
            "{} {} -> {} in {:.3} ms",
            ctx.method,
            ctx.endpoint,
            status.as_u16(),
            elapsed.as_secs_f64() * 1000.0
        );
        drop(ctx);
        elapsed
    }
}

/// Per-request state between entry and exit.
pub struct RequestContext {
    start: Instant,
    endpoint: String,
    method: String,
    metrics: HttpMetrics,
}

impl RequestContext {
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn method(&self) -> &str {
        &self.method
    }
}

impl Drop for RequestContext {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed().as_secs_f64();
        self.metrics
            .requests_in_progress
            .with_label_values(NO_LABELS)
            .dec();
        self.metrics
            .request_duration_seconds
            .with_label_values(&[self.endpoint.as_str()])
            .observe(elapsed);
        self.metrics
            .requests_total
            .with_label_values(&[self.method.as_str(), self.endpoint.as_str()])
            .inc();
    }
}

/// Endpoint identifier of a routed path: `home` for `/`, the path without
/// its leading slash otherwise.
pub fn endpoint_label(matched: Option<&MatchedPath>) -> String {
    match matched.map(MatchedPath::as_str) {
        None => UNMATCHED_ENDPOINT.to_string(),
        Some("/") => "home".to_string(),
        Some(path) => path.trim_start_matches('/').to_string(),
    }
}

/// axum middleware wrapping every request in entry/exit instrumentation.
pub async fn track_requests(
    State(state): State<SharedState>,
    request: Request,
    next: Next,
) -> Response {
    let endpoint = endpoint_label(request.extensions().get::<MatchedPath>());
    let ctx = state
        .instrumentation
        .on_entry(&endpoint, request.method().as_str());

    let response = next.run(request).await;

    state.instrumentation.on_exit(ctx, response.status());
    response
}
