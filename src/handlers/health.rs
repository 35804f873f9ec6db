//! Health check endpoint handler.
//!
//! This module provides the `/health` endpoint handler that returns a fixed
//! liveness payload.

use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::APP_VERSION;

/// Liveness payload returned by `/health`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    /// Always "healthy" while the process serves requests.
    pub status: String,
    /// RFC 3339 timestamp of the response.
    pub timestamp: String,
    pub version: String,
}

/// Handler for the /health endpoint.
#[instrument]
pub async fn health_handler() -> Json<HealthResponse> {
    debug!("Processing /health request");

    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now().to_rfc3339(),
        version: APP_VERSION.to_string(),
    })
}
