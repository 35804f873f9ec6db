//! Error types for the exporter.
//!
//! Registry misuse, probe read failures and per-request handler failures each
//! get their own enum so callers can decide what is recoverable.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use std::io;
use thiserror::Error;
use tracing::error;

use crate::registry::MetricKind;

/// Errors raised by the metric registry.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    #[error("metric '{name}' is already registered with a different kind or label set")]
    Conflict { name: String },

    #[error("metric '{0}' is not registered")]
    NotRegistered(String),

    #[error("metric '{name}' is a {actual}, not a {expected}")]
    WrongKind {
        name: String,
        expected: MetricKind,
        actual: MetricKind,
    },

    #[error("counter '{0}' can only be incremented by a non-negative number")]
    NegativeIncrement(String),

    #[error("exposition output is not valid UTF-8")]
    Encoding,
}

/// Errors raised while reading one resource category from the host.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {what}: {detail}")]
    Parse { what: &'static str, detail: String },

    #[error("{0} is unavailable")]
    Unavailable(&'static str),
}

impl ProbeError {
    pub(crate) fn io(path: impl Into<String>, source: io::Error) -> Self {
        ProbeError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn parse(what: &'static str, detail: impl Into<String>) -> Self {
        ProbeError::Parse {
            what,
            detail: detail.into(),
        }
    }
}

/// Errors surfaced to a single HTTP caller as a 500 response.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("{0}")]
    Hostname(#[from] io::Error),

    #[error("failed to encode metrics: {0}")]
    Encode(#[from] MetricsError),
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        error!("Request failed: {}", message);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            message,
        )
            .into_response()
    }
}
