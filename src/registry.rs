//! Process-wide metric registry.
//!
//! Wraps a [`prometheus::Registry`] with a name index so instruments can be
//! registered idempotently and mutated by name. Every instrument is a labeled
//! vec; an instrument without label dimensions simply has one series keyed by
//! the empty label tuple.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use prometheus::{
    CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::fmt;
use tracing::debug;

use crate::error::MetricsError;

/// Kind of a registered instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
        };
        f.write_str(name)
    }
}

/// A registered instrument handle. Cloning is cheap and shares the series.
#[derive(Clone)]
pub enum Instrument {
    Counter(CounterVec),
    Gauge(GaugeVec),
    Histogram(HistogramVec),
}

impl Instrument {
    pub fn kind(&self) -> MetricKind {
        match self {
            Instrument::Counter(_) => MetricKind::Counter,
            Instrument::Gauge(_) => MetricKind::Gauge,
            Instrument::Histogram(_) => MetricKind::Histogram,
        }
    }
}

struct Registered {
    instrument: Instrument,
    labels: Vec<String>,
}

/// Named, typed instruments backed by a prometheus registry.
pub struct MetricRegistry {
    registry: Registry,
    instruments: DashMap<String, Registered>,
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
            instruments: DashMap::new(),
        }
    }

    /// Registers an instrument, or returns the existing one with the same name.
    ///
    /// Histograms registered through this method use the default prometheus
    /// buckets; see [`MetricRegistry::histogram`] for custom buckets.
    pub fn register(
        &self,
        name: &str,
        help: &str,
        kind: MetricKind,
        labels: &[&str],
    ) -> Result<Instrument, MetricsError> {
        self.register_with(name, labels, kind, || match kind {
            MetricKind::Counter => Ok(Instrument::Counter(CounterVec::new(
                Opts::new(name, help),
                labels,
            )?)),
            MetricKind::Gauge => Ok(Instrument::Gauge(GaugeVec::new(
                Opts::new(name, help),
                labels,
            )?)),
            MetricKind::Histogram => Ok(Instrument::Histogram(HistogramVec::new(
                HistogramOpts::new(name, help),
                labels,
            )?)),
        })
    }

    pub fn counter(
        &self,
        name: &str,
        help: &str,
        labels: &[&str],
    ) -> Result<CounterVec, MetricsError> {
        match self.register(name, help, MetricKind::Counter, labels)? {
            Instrument::Counter(c) => Ok(c),
            other => Err(wrong_kind(name, MetricKind::Counter, other.kind())),
        }
    }

    pub fn gauge(&self, name: &str, help: &str, labels: &[&str]) -> Result<GaugeVec, MetricsError> {
        match self.register(name, help, MetricKind::Gauge, labels)? {
            Instrument::Gauge(g) => Ok(g),
            other => Err(wrong_kind(name, MetricKind::Gauge, other.kind())),
        }
    }

    /// Registers a histogram with explicit bucket upper bounds.
    pub fn histogram(
        &self,
        name: &str,
        help: &str,
        labels: &[&str],
        buckets: Vec<f64>,
    ) -> Result<HistogramVec, MetricsError> {
        let instrument = self.register_with(name, labels, MetricKind::Histogram, || {
            let opts = HistogramOpts::new(name, help).buckets(buckets);
            Ok(Instrument::Histogram(HistogramVec::new(opts, labels)?))
        })?;
        match instrument {
            Instrument::Histogram(h) => Ok(h),
            other => Err(wrong_kind(name, MetricKind::Histogram, other.kind())),
        }
    }

    fn register_with<F>(
        &self,
        name: &str,
        labels: &[&str],
        kind: MetricKind,
        build: F,
    ) -> Result<Instrument, MetricsError>
    where
        F: FnOnce() -> Result<Instrument, MetricsError>,
    {
        // The entry guard holds the shard lock, so concurrent registrations of
        // one name resolve to a single prometheus collector.
        match self.instruments.entry(name.to_string()) {
            Entry::Occupied(existing) => {
                let existing = existing.get();
                if existing.instrument.kind() != kind || existing.labels != labels {
                    return Err(MetricsError::Conflict {
                        name: name.to_string(),
                    });
                }
                Ok(existing.instrument.clone())
            }
            Entry::Vacant(slot) => {
                let instrument = build()?;
                match &instrument {
                    Instrument::Counter(c) => self.registry.register(Box::new(c.clone()))?,
                    Instrument::Gauge(g) => self.registry.register(Box::new(g.clone()))?,
                    Instrument::Histogram(h) => self.registry.register(Box::new(h.clone()))?,
                }
                debug!("Registered {} '{}' with labels {:?}", kind, name, labels);
                slot.insert(Registered {
                    instrument: instrument.clone(),
                    labels: labels.iter().map(|l| l.to_string()).collect(),
                });
                Ok(instrument)
            }
        }
    }

    /// Looks up a registered instrument by name.
    pub fn get(&self, name: &str) -> Result<Instrument, MetricsError> {
        self.instruments
            .get(name)
            .map(|r| r.instrument.clone())
            .ok_or_else(|| MetricsError::NotRegistered(name.to_string()))
    }

    /// Sets a gauge series to `value`.
    pub fn set(&self, name: &str, labels: &[&str], value: f64) -> Result<(), MetricsError> {
        match self.get(name)? {
            Instrument::Gauge(g) => {
                g.get_metric_with_label_values(labels)?.set(value);
                Ok(())
            }
            other => Err(wrong_kind(name, MetricKind::Gauge, other.kind())),
        }
    }

    /// Increments a counter series by `amount`, which must be a non-negative
    /// number.
    pub fn increment(&self, name: &str, labels: &[&str], amount: f64) -> Result<(), MetricsError> {
        match self.get(name)? {
            Instrument::Counter(c) => {
                if amount < 0.0 || amount.is_nan() {
                    return Err(MetricsError::NegativeIncrement(name.to_string()));
                }
                c.get_metric_with_label_values(labels)?.inc_by(amount);
                Ok(())
            }
            other => Err(wrong_kind(name, MetricKind::Counter, other.kind())),
        }
    }

    /// Records one observation into a histogram series.
    pub fn observe(&self, name: &str, labels: &[&str], value: f64) -> Result<(), MetricsError> {
        match self.get(name)? {
            Instrument::Histogram(h) => {
                h.get_metric_with_label_values(labels)?.observe(value);
                Ok(())
            }
            other => Err(wrong_kind(name, MetricKind::Histogram, other.kind())),
        }
    }

    /// Serializes every instrument and series in the Prometheus text format.
    pub fn export(&self) -> Result<Vec<u8>, MetricsError> {
        let encoder = TextEncoder::new();
        let families = self.registry.gather();
        let mut buffer = Vec::with_capacity(16 * 1024);
        encoder.encode(&families, &mut buffer)?;
        Ok(buffer)
    }

    /// Same as [`MetricRegistry::export`], as a string.
    pub fn export_text(&self) -> Result<String, MetricsError> {
        String::from_utf8(self.export()?).map_err(|_| MetricsError::Encoding)
    }

    /// Content type of the exposition output.
    pub fn content_type(&self) -> String {
        TextEncoder::new().format_type().to_string()
    }
}

fn wrong_kind(name: &str, expected: MetricKind, actual: MetricKind) -> MetricsError {
    MetricsError::WrongKind {
        name: name.to_string(),
        expected,
        actual,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series_lines(text: &str) -> Vec<&str> {
        text.lines().filter(|l| !l.starts_with('#')).collect()
    }

    #[test]
    fn test_register_is_idempotent() {
        let registry = MetricRegistry::new();
        let first = registry
            .counter("jobs_total", "Jobs", &["queue"])
            .unwrap();
        let second = registry
            .counter("jobs_total", "Jobs", &["queue"])
            .unwrap();

        first.with_label_values(&["a"]).inc();
        second.with_label_values(&["a"]).inc();

        assert_eq!(first.with_label_values(&["a"]).get(), 2.0);
    }

    #[test]
    fn test_register_conflicting_kind_fails() {
        let registry = MetricRegistry::new();
        registry.gauge("temperature", "Temp", &[]).unwrap();

        let result = registry.register("temperature", "Temp", MetricKind::Counter, &[]);
        assert!(matches!(result, Err(MetricsError::Conflict { .. })));

        let result = registry.gauge("temperature", "Temp", &["room"]);
        assert!(matches!(result, Err(MetricsError::Conflict { .. })));
    }

    #[test]
    fn test_unregistered_name_is_rejected() {
        let registry = MetricRegistry::new();
        assert!(matches!(
            registry.increment("missing_total", &[], 1.0),
            Err(MetricsError::NotRegistered(_))
        ));
        assert!(matches!(
            registry.set("missing", &[], 1.0),
            Err(MetricsError::NotRegistered(_))
        ));
        assert!(matches!(
            registry.observe("missing_seconds", &[], 1.0),
            Err(MetricsError::NotRegistered(_))
        ));
    }

    #[test]
    fn test_name_based_mutation_checks_kind_and_arity() {
        let registry = MetricRegistry::new();
        registry.gauge("queue_depth", "Depth", &["queue"]).unwrap();

        assert!(matches!(
            registry.increment("queue_depth", &["a"], 1.0),
            Err(MetricsError::WrongKind { .. })
        ));
        assert!(matches!(
            registry.set("queue_depth", &["a", "b"], 1.0),
            Err(MetricsError::Prometheus(_))
        ));
        registry.set("queue_depth", &["a"], 7.0).unwrap();
        assert!(registry
            .export_text()
            .unwrap()
            .contains("queue_depth{queue=\"a\"} 7"));
    }

    #[test]
    fn test_negative_increment_rejected() {
        let registry = MetricRegistry::new();
        registry.counter("bytes_total", "Bytes", &[]).unwrap();
        assert!(matches!(
            registry.increment("bytes_total", &[], -1.0),
            Err(MetricsError::NegativeIncrement(_))
        ));
        assert!(matches!(
            registry.increment("bytes_total", &[], f64::NAN),
            Err(MetricsError::NegativeIncrement(_))
        ));

        registry.increment("bytes_total", &[], 0.0).unwrap();
        assert!(registry
            .export_text()
            .unwrap()
            .lines()
            .any(|l| l == "bytes_total 0"));
    }

    #[test]
    fn test_export_one_line_per_series() {
        let registry = MetricRegistry::new();
        registry.counter("requests_total", "Requests", &["method"]).unwrap();
        registry.gauge("in_flight", "In flight", &[]).unwrap();

        registry.increment("requests_total", &["GET"], 1.0).unwrap();
        registry.increment("requests_total", &["GET"], 1.0).unwrap();
        registry.increment("requests_total", &["POST"], 1.0).unwrap();
        registry.set("in_flight", &[], 3.0).unwrap();

        let text = registry.export_text().unwrap();
        let lines = series_lines(&text);
        assert_eq!(lines.len(), 3, "unexpected exposition:\n{}", text);
        assert!(lines.contains(&"requests_total{method=\"GET\"} 2"));
        assert!(lines.contains(&"requests_total{method=\"POST\"} 1"));
        assert!(lines.contains(&"in_flight 3"));
    }

    #[test]
    fn test_export_is_stable_without_mutation() {
        let registry = MetricRegistry::new();
        registry.gauge("level", "Level", &["tank"]).unwrap();
        registry
            .histogram("wait_seconds", "Wait", &[], vec![0.1, 1.0])
            .unwrap();
        registry.set("level", &["north"], 0.5).unwrap();
        registry.observe("wait_seconds", &[], 0.3).unwrap();

        let first = registry.export_text().unwrap();
        let second = registry.export_text().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_histogram_exposition_shape() {
        let registry = MetricRegistry::new();
        registry
            .histogram("latency_seconds", "Latency", &["route"], vec![0.5, 1.0])
            .unwrap();
        registry.observe("latency_seconds", &["home"], 0.25).unwrap();
        registry.observe("latency_seconds", &["home"], 0.75).unwrap();

        let text = registry.export_text().unwrap();
        assert!(text.contains("latency_seconds_bucket{route=\"home\",le=\"0.5\"} 1"));
        assert!(text.contains("latency_seconds_bucket{route=\"home\",le=\"1\"} 2"));
        assert!(text.contains("latency_seconds_bucket{route=\"home\",le=\"+Inf\"} 2"));
        assert!(text.contains("latency_seconds_sum{route=\"home\"} 1"));
        assert!(text.contains("latency_seconds_count{route=\"home\"} 2"));
    }
}
