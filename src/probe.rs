//! On-demand system probe.
//!
//! [`SystemProbe::collect`] reads every resource category from a
//! [`ProbeSource`] and writes the readings into [`SystemMetrics`]. Each
//! category is guarded on its own: a failed read is logged and the remaining
//! categories are still recorded. `collect` itself never fails.

use std::sync::Mutex;
use sysinfo::{Networks, System};
use tracing::{debug, error, warn};

use crate::collectors::cpu::{CpuPercentages, CpuTimesTracker};
use crate::collectors::diskstats::{self, DiskIoTotals};
use crate::collectors::filesystem::{self, Partition, PartitionUsage};
use crate::collectors::memory::{self, MemoryReading};
use crate::collectors::network::{self, InterfaceCounters};
use crate::collectors::process;
use crate::config::Config;
use crate::error::ProbeError;
use crate::metrics::{advance_counter_to, SystemMetrics, NO_LABELS};

/// Access to live OS and process state.
pub trait ProbeSource: Send + Sync {
    /// CPU utilization since the previous call.
    fn cpu_percentages(&self) -> Result<CpuPercentages, ProbeError>;
    fn logical_cores(&self) -> Result<u64, ProbeError>;
    fn memory(&self) -> Result<MemoryReading, ProbeError>;
    fn partitions(&self) -> Result<Vec<Partition>, ProbeError>;
    fn partition_usage(&self, partition: &Partition) -> Result<PartitionUsage, ProbeError>;
    fn disk_io(&self) -> Result<DiskIoTotals, ProbeError>;
    fn network_interfaces(&self) -> Result<Vec<InterfaceCounters>, ProbeError>;
    fn thread_count(&self) -> Result<u64, ProbeError>;
    fn open_fd_count(&self) -> Result<u64, ProbeError>;
    fn connection_count(&self) -> Result<u64, ProbeError>;
}

/// The local host, read through /proc, statvfs and sysinfo.
pub struct HostSource {
    system: Mutex<System>,
    networks: Mutex<Networks>,
    cpu_times: CpuTimesTracker,
}

impl Default for HostSource {
    fn default() -> Self {
        Self::new()
    }
}

impl HostSource {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu();
        Self {
            system: Mutex::new(system),
            networks: Mutex::new(Networks::new_with_refreshed_list()),
            cpu_times: CpuTimesTracker::new(),
        }
    }
}

impl ProbeSource for HostSource {
    fn cpu_percentages(&self) -> Result<CpuPercentages, ProbeError> {
        self.cpu_times.sample()
    }

    fn logical_cores(&self) -> Result<u64, ProbeError> {
        let system = self
            .system
            .lock()
            .map_err(|_| ProbeError::Unavailable("sysinfo handle"))?;
        match system.cpus().len() {
            0 => Err(ProbeError::Unavailable("cpu list")),
            n => Ok(n as u64),
        }
    }

    fn memory(&self) -> Result<MemoryReading, ProbeError> {
        memory::read_memory(&self.system)
    }

    fn partitions(&self) -> Result<Vec<Partition>, ProbeError> {
        filesystem::read_partitions()
    }

    fn partition_usage(&self, partition: &Partition) -> Result<PartitionUsage, ProbeError> {
        filesystem::read_partition_usage(&partition.mount_point)
    }

    fn disk_io(&self) -> Result<DiskIoTotals, ProbeError> {
        diskstats::read_disk_io_totals()
    }

    fn network_interfaces(&self) -> Result<Vec<InterfaceCounters>, ProbeError> {
        network::read_interface_counters(&self.networks)
    }

    fn thread_count(&self) -> Result<u64, ProbeError> {
        process::read_thread_count()
    }

    fn open_fd_count(&self) -> Result<u64, ProbeError> {
        process::read_open_fd_count()
    }

    fn connection_count(&self) -> Result<u64, ProbeError> {
        process::read_connection_count()
    }
}

/// Which probe steps run. Disabled steps leave their instruments untouched.
#[derive(Debug, Clone, Copy)]
pub struct ProbeSteps {
    pub filesystem: bool,
    pub diskstats: bool,
    pub network: bool,
    pub process: bool,
}

impl Default for ProbeSteps {
    fn default() -> Self {
        Self {
            filesystem: true,
            diskstats: true,
            network: true,
            process: true,
        }
    }
}

impl ProbeSteps {
    pub fn from_config(config: &Config) -> Self {
        Self {
            filesystem: config.enable_filesystem_collector.unwrap_or(true),
            diskstats: config.enable_diskstats_collector.unwrap_or(true),
            network: config.enable_network_collector.unwrap_or(true),
            process: config.enable_process_collector.unwrap_or(true),
        }
    }
}

/// Reads the host on demand and records the readings.
pub struct SystemProbe {
    source: Box<dyn ProbeSource>,
    metrics: SystemMetrics,
    steps: ProbeSteps,
    // Serializes invocations: counters are advanced from absolute OS totals,
    // which is only exact when one probe runs at a time.
    running: Mutex<()>,
}

impl SystemProbe {
    pub fn new(source: Box<dyn ProbeSource>, metrics: SystemMetrics, steps: ProbeSteps) -> Self {
        Self {
            source,
            metrics,
            steps,
            running: Mutex::new(()),
        }
    }

    /// Runs one probe. Failures are logged and never returned.
    pub fn collect(&self) {
        // A poisoned lock only means an earlier probe panicked; the guarded
        // data is `()`, so keep going.
        let _running = self.running.lock().unwrap_or_else(|e| e.into_inner());

        run_step("cpu", || self.collect_cpu());
        run_step("memory", || self.collect_memory());
        if self.steps.filesystem {
            run_step("disk usage", || self.collect_disk_usage());
        }
        if self.steps.diskstats {
            run_step("disk io", || self.collect_disk_io());
        }
        if self.steps.network {
            run_step("network io", || self.collect_network_io());
        }
        if self.steps.process {
            run_step("process", || self.collect_process());
        }
    }

    fn collect_cpu(&self) -> Result<(), ProbeError> {
        let m = &self.metrics;
        // Core count is independent of the utilization sample.
        match self.source.logical_cores() {
            Ok(cores) => m.cpu_count.with_label_values(NO_LABELS).set(cores as f64),
            Err(e) => warn!("Failed to read logical core count: {}", e),
        }

        let pct = self.source.cpu_percentages()?;
        m.cpu_usage_percent.with_label_values(NO_LABELS).set(pct.busy);
        m.cpu_user_percent.with_label_values(NO_LABELS).set(pct.user);
        m.cpu_system_percent.with_label_values(NO_LABELS).set(pct.system);
        Ok(())
    }

    fn collect_memory(&self) -> Result<(), ProbeError> {
        let m = &self.metrics;
        let mem = self.source.memory()?;
        m.memory_used_bytes.with_label_values(NO_LABELS).set(mem.used_bytes as f64);
        m.memory_total_bytes.with_label_values(NO_LABELS).set(mem.total_bytes as f64);
        m.memory_available_bytes
            .with_label_values(NO_LABELS)
            .set(mem.available_bytes as f64);
        if let Some(cached) = mem.cached_bytes {
            m.memory_cached_bytes
                .with_label_values(NO_LABELS)
                .set(cached as f64);
        }
        m.swap_used_bytes.with_label_values(NO_LABELS).set(mem.swap_used_bytes as f64);
        m.swap_total_bytes.with_label_values(NO_LABELS).set(mem.swap_total_bytes as f64);
        Ok(())
    }

    fn collect_disk_usage(&self) -> Result<(), ProbeError> {
        let partitions = self.source.partitions()?;
        let mut skipped = 0usize;

        for partition in &partitions {
            match self.source.partition_usage(partition) {
                Ok(usage) => {
                    let labels = [partition.mount_point.as_str()];
                    self.metrics
                        .disk_used_bytes
                        .with_label_values(&labels)
                        .set(usage.used_bytes as f64);
                    self.metrics
                        .disk_total_bytes
                        .with_label_values(&labels)
                        .set(usage.total_bytes as f64);
                }
                Err(e) => {
                    skipped += 1;
                    error!(
                        "Skipping partition {} ({}): {}",
                        partition.mount_point, partition.device, e
                    );
                }
            }
        }

        debug!(
            "Disk usage recorded for {} of {} partitions",
            partitions.len() - skipped,
            partitions.len()
        );
        Ok(())
    }

    fn collect_disk_io(&self) -> Result<(), ProbeError> {
        let io = self.source.disk_io()?;
        advance_counter_to(
            &self.metrics.disk_read_bytes_total.with_label_values(NO_LABELS),
            io.read_bytes as f64,
        );
        advance_counter_to(
            &self.metrics.disk_write_bytes_total.with_label_values(NO_LABELS),
            io.written_bytes as f64,
        );
        Ok(())
    }

    fn collect_network_io(&self) -> Result<(), ProbeError> {
        let m = &self.metrics;
        for iface in self.source.network_interfaces()? {
            let labels = [iface.interface.as_str()];
            advance_counter_to(
                &m.network_bytes_sent_total.with_label_values(&labels),
                iface.bytes_sent as f64,
            );
            advance_counter_to(
                &m.network_bytes_received_total.with_label_values(&labels),
                iface.bytes_received as f64,
            );
            advance_counter_to(
                &m.network_packets_sent_total.with_label_values(&labels),
                iface.packets_sent as f64,
            );
            advance_counter_to(
                &m.network_packets_received_total.with_label_values(&labels),
                iface.packets_received as f64,
            );
        }
        Ok(())
    }

    fn collect_process(&self) -> Result<(), ProbeError> {
        let m = &self.metrics;
        let mut failures = 0;

        match self.source.thread_count() {
            Ok(n) => m.process_threads.with_label_values(NO_LABELS).set(n as f64),
            Err(e) => {
                failures += 1;
                warn!("Failed to read thread count: {}", e);
            }
        }
        match self.source.open_fd_count() {
            Ok(n) => m.process_open_fds.with_label_values(NO_LABELS).set(n as f64),
            Err(e) => {
                failures += 1;
                warn!("Failed to read open file descriptors: {}", e);
            }
        }
        match self.source.connection_count() {
            Ok(n) => m.process_connections.with_label_values(NO_LABELS).set(n as f64),
            Err(e) => {
                failures += 1;
                warn!("Failed to read connection count: {}", e);
            }
        }

        if failures == 3 {
            return Err(ProbeError::Unavailable("process statistics"));
        }
        Ok(())
    }
}

fn run_step<F>(step: &str, f: F)
where
    F: FnOnce() -> Result<(), ProbeError>,
{
    if let Err(e) = f() {
        error!("System probe step '{}' failed: {}", step, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MetricRegistry;

    #[test]
    fn test_collect_from_host() {
        let registry = MetricRegistry::new();
        let metrics = SystemMetrics::register(&registry).unwrap();
        let probe = SystemProbe::new(
            Box::new(HostSource::new()),
            metrics.clone(),
            ProbeSteps::default(),
        );

        probe.collect();

        assert!(metrics.cpu_count.with_label_values(NO_LABELS).get() >= 1.0);
        assert!(metrics.memory_total_bytes.with_label_values(NO_LABELS).get() > 0.0);
        assert!(metrics.process_threads.with_label_values(NO_LABELS).get() >= 1.0);

        let text = registry.export_text().unwrap();
        assert!(text.contains("system_memory_total_bytes"));
    }

    #[test]
    fn test_disabled_steps_are_skipped() {
        let registry = MetricRegistry::new();
        let metrics = SystemMetrics::register(&registry).unwrap();
        let steps = ProbeSteps {
            filesystem: false,
            diskstats: false,
            network: false,
            process: false,
        };
        let probe = SystemProbe::new(Box::new(HostSource::new()), metrics, steps);

        probe.collect();

        let text = registry.export_text().unwrap();
        let series: Vec<&str> = text.lines().filter(|l| !l.starts_with('#')).collect();
        assert!(!series.iter().any(|l| l.starts_with("system_disk_used_bytes")));
        assert!(!series.iter().any(|l| l.starts_with("process_threads")));
        assert!(series.iter().any(|l| l.starts_with("system_memory_total_bytes ")));
    }
}
