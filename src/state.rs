//! Application state management for the exporter.
//!
//! This module defines the shared application state that is passed
//! to HTTP handlers and the request instrumentation middleware.

use std::io;
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::error::MetricsError;
use crate::handlers::root::system_hostname;
use crate::instrumentation::RequestInstrumentation;
use crate::metrics::{HttpMetrics, SystemMetrics};
use crate::probe::{ProbeSource, ProbeSteps, SystemProbe};
use crate::registry::MetricRegistry;

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

/// Resolves the hostname shown on the status page.
pub type HostnameFn = fn() -> io::Result<String>;

/// Global application state shared across requests.
pub struct AppState {
    pub registry: MetricRegistry,
    pub probe: SystemProbe,
    pub instrumentation: RequestInstrumentation,
    pub hostname: HostnameFn,
    pub config: Arc<Config>,
    /// Server start time, reported at shutdown.
    pub start_time: Instant,
}

impl AppState {
    /// Registers every instrument in a fresh registry and wires the probe to
    /// `source`.
    pub fn new(config: Config, source: Box<dyn ProbeSource>) -> Result<Self, MetricsError> {
        let registry = MetricRegistry::new();
        let http_metrics = HttpMetrics::register(&registry, config.latency_buckets())?;
        let system_metrics = SystemMetrics::register(&registry)?;
        let probe = SystemProbe::new(source, system_metrics, ProbeSteps::from_config(&config));

        Ok(Self {
            registry,
            probe,
            instrumentation: RequestInstrumentation::new(http_metrics),
            hostname: system_hostname,
            config: Arc::new(config),
            start_time: Instant::now(),
        })
    }

    /// Replaces the hostname lookup.
    pub fn with_hostname(mut self, hostname: HostnameFn) -> Self {
        self.hostname = hostname;
        self
    }

    pub fn into_shared(self) -> SharedState {
        Arc::new(self)
    }
}
