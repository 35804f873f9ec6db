//! Status Page Exporter Library
//!
//! A minimal web server that renders a status page and exposes health and
//! Prometheus metrics endpoints. Every request is instrumented with an
//! in-flight gauge, a latency histogram and a completion counter, and every
//! scrape of `/metrics` probes the local host for CPU, memory, disk, network
//! and process statistics.
//!
//! # Usage
//!
//! ```rust,no_run
//! use status_page_exporter::{build_router, AppState, Config, HostSource};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let state = AppState::new(Config::default(), Box::new(HostSource::new()))?.into_shared();
//! let app = build_router(state);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:5000").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod collectors;
pub mod config;
pub mod error;
pub mod handlers;
pub mod instrumentation;
pub mod metrics;
pub mod probe;
pub mod registry;
pub mod server;
pub mod state;

/// Version reported by `/health`.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// Re-export main types for convenience
pub use config::Config;
pub use error::{HandlerError, MetricsError, ProbeError};
pub use instrumentation::{RequestContext, RequestInstrumentation};
pub use probe::{HostSource, ProbeSource, ProbeSteps, SystemProbe};
pub use registry::{Instrument, MetricKind, MetricRegistry};
pub use server::build_router;
pub use state::{AppState, SharedState};
