//! Instrument definitions for status-page-exporter.
//!
//! Every instrument is registered once at startup through [`MetricRegistry`]
//! and handed out as typed handles, so hot paths never look metrics up by
//! name.

use prometheus::{Counter, CounterVec, GaugeVec, HistogramVec};
use tracing::debug;

use crate::error::MetricsError;
use crate::registry::MetricRegistry;

/// Label tuple of instruments without label dimensions.
pub const NO_LABELS: &[&str] = &[];

/// Request lifecycle instruments.
#[derive(Clone)]
pub struct HttpMetrics {
    pub requests_total: CounterVec,           // labels: method, endpoint
    pub request_duration_seconds: HistogramVec, // labels: endpoint
    pub requests_in_progress: GaugeVec,
}

impl HttpMetrics {
    pub fn register(registry: &MetricRegistry, buckets: Vec<f64>) -> Result<Self, MetricsError> {
        Ok(Self {
            requests_total: registry.counter(
                "http_requests_total",
                "Total HTTP requests completed",
                &["method", "endpoint"],
            )?,
            request_duration_seconds: registry.histogram(
                "http_request_duration_seconds",
                "HTTP request latency in seconds",
                &["endpoint"],
                buckets,
            )?,
            requests_in_progress: registry.gauge(
                "http_requests_in_progress",
                "HTTP requests currently being handled",
                NO_LABELS,
            )?,
        })
    }
}

/// Host and process resource instruments written by the system probe.
#[derive(Clone)]
pub struct SystemMetrics {
    // ========== CPU ==========
    pub cpu_usage_percent: GaugeVec,
    pub cpu_user_percent: GaugeVec,
    pub cpu_system_percent: GaugeVec,
    pub cpu_count: GaugeVec,

    // ========== Memory ==========
    pub memory_used_bytes: GaugeVec,
    pub memory_total_bytes: GaugeVec,
    pub memory_available_bytes: GaugeVec,
    pub memory_cached_bytes: GaugeVec,
    pub swap_used_bytes: GaugeVec,
    pub swap_total_bytes: GaugeVec,

    // ========== Disk ==========
    pub disk_used_bytes: GaugeVec,  // labels: mountpoint
    pub disk_total_bytes: GaugeVec, // labels: mountpoint
    pub disk_read_bytes_total: CounterVec,
    pub disk_write_bytes_total: CounterVec,

    // ========== Network ==========
    pub network_bytes_sent_total: CounterVec,       // labels: interface
    pub network_bytes_received_total: CounterVec,   // labels: interface
    pub network_packets_sent_total: CounterVec,     // labels: interface
    pub network_packets_received_total: CounterVec, // labels: interface

    // ========== Process ==========
    pub process_threads: GaugeVec,
    pub process_open_fds: GaugeVec,
    pub process_connections: GaugeVec,
}

impl SystemMetrics {
    pub fn register(registry: &MetricRegistry) -> Result<Self, MetricsError> {
        let gauge = |name: &str, help: &str| registry.gauge(name, help, NO_LABELS);
        let counter = |name: &str, help: &str| registry.counter(name, help, NO_LABELS);

        Ok(Self {
            cpu_usage_percent: gauge(
                "system_cpu_usage_percent",
                "CPU busy percentage since the previous scrape",
            )?,
            cpu_user_percent: gauge(
                "system_cpu_user_percent",
                "CPU percentage spent in user mode since the previous scrape",
            )?,
            cpu_system_percent: gauge(
                "system_cpu_system_percent",
                "CPU percentage spent in kernel mode since the previous scrape",
            )?,
            cpu_count: gauge("system_cpu_count", "Number of logical CPU cores")?,

            memory_used_bytes: gauge("system_memory_used_bytes", "Used memory in bytes")?,
            memory_total_bytes: gauge("system_memory_total_bytes", "Total memory in bytes")?,
            memory_available_bytes: gauge(
                "system_memory_available_bytes",
                "Available memory in bytes",
            )?,
            memory_cached_bytes: gauge(
                "system_memory_cached_bytes",
                "Page cache and reclaimable slab in bytes",
            )?,
            swap_used_bytes: gauge("system_swap_used_bytes", "Used swap in bytes")?,
            swap_total_bytes: gauge("system_swap_total_bytes", "Total swap in bytes")?,

            disk_used_bytes: registry.gauge(
                "system_disk_used_bytes",
                "Used bytes per mounted partition",
                &["mountpoint"],
            )?,
            disk_total_bytes: registry.gauge(
                "system_disk_total_bytes",
                "Total bytes per mounted partition",
                &["mountpoint"],
            )?,
            disk_read_bytes_total: counter(
                "system_disk_read_bytes_total",
                "Bytes read from disks since boot",
            )?,
            disk_write_bytes_total: counter(
                "system_disk_write_bytes_total",
                "Bytes written to disks since boot",
            )?,

            network_bytes_sent_total: registry.counter(
                "system_network_bytes_sent_total",
                "Bytes sent per network interface",
                &["interface"],
            )?,
            network_bytes_received_total: registry.counter(
                "system_network_bytes_received_total",
                "Bytes received per network interface",
                &["interface"],
            )?,
            network_packets_sent_total: registry.counter(
                "system_network_packets_sent_total",
                "Packets sent per network interface",
                &["interface"],
            )?,
            network_packets_received_total: registry.counter(
                "system_network_packets_received_total",
                "Packets received per network interface",
                &["interface"],
            )?,

            process_threads: gauge("process_threads", "Threads of the exporter process")?,
            process_open_fds: gauge(
                "process_open_fds",
                "Open file descriptors of the exporter process",
            )?,
            process_connections: gauge(
                "process_connections",
                "Open inet connections of the exporter process",
            )?,
        })
    }
}

/// Moves a counter up to an absolute cumulative total read from the OS.
///
/// The counter is advanced by the difference to its current value. A total
/// below the current value (OS counter reset or wrap) leaves the counter
/// unchanged. Returns whether the counter moved.
pub fn advance_counter_to(counter: &Counter, total: f64) -> bool {
    let delta = total - counter.get();
    if delta > 0.0 {
        counter.inc_by(delta);
        true
    } else {
        if delta < 0.0 {
            debug!(
                "OS total {} is below exported counter {}, keeping counter",
                total,
                counter.get()
            );
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_all_instruments() {
        let registry = MetricRegistry::new();
        HttpMetrics::register(&registry, prometheus::DEFAULT_BUCKETS.to_vec()).unwrap();
        SystemMetrics::register(&registry).unwrap();

        // Registration is idempotent per name.
        assert!(SystemMetrics::register(&registry).is_ok());
    }

    #[test]
    fn test_advance_counter_to_absolute_total() {
        let registry = MetricRegistry::new();
        let counter = registry
            .counter("bytes_total", "Bytes", NO_LABELS)
            .unwrap()
            .with_label_values(NO_LABELS);

        assert!(advance_counter_to(&counter, 100.0));
        assert_eq!(counter.get(), 100.0);

        assert!(advance_counter_to(&counter, 250.0));
        assert_eq!(counter.get(), 250.0);

        // Same total again: no movement.
        assert!(!advance_counter_to(&counter, 250.0));

        // OS counter went backwards: counter stays monotonic.
        assert!(!advance_counter_to(&counter, 10.0));
        assert_eq!(counter.get(), 250.0);
    }
}
