//! CPU utilization collector.
//!
//! Reads the aggregate `cpu` line of /proc/stat and turns two consecutive
//! readings into busy/user/system percentages. Sampling never sleeps: each
//! call reports the utilization since the previous call.

use std::fs;
use std::sync::Mutex;

use crate::error::ProbeError;

const PROC_STAT: &str = "/proc/stat";

/// Cumulative CPU times in clock ticks for the aggregate `cpu` line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuTimes {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
}

impl CpuTimes {
    pub fn total(&self) -> u64 {
        self.user
            + self.nice
            + self.system
            + self.idle
            + self.iowait
            + self.irq
            + self.softirq
            + self.steal
    }

    /// Non-busy time (idle + iowait).
    pub fn idle_total(&self) -> u64 {
        self.idle + self.iowait
    }
}

/// CPU utilization percentages (0.0 to 100.0) over one sampling window.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CpuPercentages {
    pub busy: f64,
    pub user: f64,
    pub system: f64,
}

impl CpuPercentages {
    /// Percentages between two readings. A window without elapsed ticks
    /// reports zero utilization.
    pub fn between(previous: &CpuTimes, current: &CpuTimes) -> Self {
        let delta_total = current.total().saturating_sub(previous.total());
        if delta_total == 0 {
            return Self::default();
        }
        let delta_idle = current.idle_total().saturating_sub(previous.idle_total());
        let delta_user = current.user.saturating_sub(previous.user);
        let delta_system = current.system.saturating_sub(previous.system);

        let pct = |ticks: u64| ticks as f64 * 100.0 / delta_total as f64;
        Self {
            busy: pct(delta_total.saturating_sub(delta_idle)),
            user: pct(delta_user),
            system: pct(delta_system),
        }
    }
}

/// Parses the aggregate `cpu ` line out of /proc/stat content.
pub fn parse_cpu_times(content: &str) -> Result<CpuTimes, ProbeError> {
    let line = content
        .lines()
        .find(|l| l.starts_with("cpu "))
        .ok_or_else(|| ProbeError::parse("/proc/stat", "no aggregate cpu line"))?;

    let fields: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .map(|f| f.parse::<u64>())
        .collect::<Result<_, _>>()
        .map_err(|e| ProbeError::parse("/proc/stat", e.to_string()))?;

    if fields.len() < 7 {
        return Err(ProbeError::parse(
            "/proc/stat",
            format!("expected at least 7 cpu fields, got {}", fields.len()),
        ));
    }

    Ok(CpuTimes {
        user: fields[0],
        nice: fields[1],
        system: fields[2],
        idle: fields[3],
        iowait: fields[4],
        irq: fields[5],
        softirq: fields[6],
        steal: fields.get(7).copied().unwrap_or(0),
    })
}

pub fn read_cpu_times() -> Result<CpuTimes, ProbeError> {
    let content = fs::read_to_string(PROC_STAT).map_err(|e| ProbeError::io(PROC_STAT, e))?;
    parse_cpu_times(&content)
}

/// Remembers the previous /proc/stat reading between samples.
pub struct CpuTimesTracker {
    previous: Mutex<Option<CpuTimes>>,
}

impl Default for CpuTimesTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuTimesTracker {
    /// Creates a tracker primed with the current reading, so the first
    /// sample covers the time since construction instead of reporting zero.
    pub fn new() -> Self {
        Self {
            previous: Mutex::new(read_cpu_times().ok()),
        }
    }

    /// Feeds one reading and returns the utilization since the last one.
    pub fn record(&self, current: CpuTimes) -> Result<CpuPercentages, ProbeError> {
        let mut previous = self
            .previous
            .lock()
            .map_err(|_| ProbeError::Unavailable("cpu baseline"))?;

        let percentages = match previous.as_ref() {
            Some(prev) => CpuPercentages::between(prev, &current),
            None => CpuPercentages::default(),
        };
        *previous = Some(current);
        Ok(percentages)
    }

    pub fn sample(&self) -> Result<CpuPercentages, ProbeError> {
        self.record(read_cpu_times()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STAT: &str = "cpu  100 10 50 800 20 5 5 10 0 0\n\
                        cpu0 50 5 25 400 10 2 3 5 0 0\n\
                        intr 12345\n";

    #[test]
    fn test_parse_cpu_times() {
        let times = parse_cpu_times(STAT).unwrap();
        assert_eq!(times.user, 100);
        assert_eq!(times.system, 50);
        assert_eq!(times.idle, 800);
        assert_eq!(times.steal, 10);
        assert_eq!(times.total(), 1000);
    }

    #[test]
    fn test_parse_cpu_times_rejects_garbage() {
        assert!(parse_cpu_times("intr 1 2 3\n").is_err());
        assert!(parse_cpu_times("cpu  a b c d e f g\n").is_err());
        assert!(parse_cpu_times("cpu  1 2 3\n").is_err());
    }

    #[test]
    fn test_percentages_between_readings() {
        let previous = CpuTimes {
            user: 100,
            system: 50,
            idle: 800,
            ..Default::default()
        };
        let current = CpuTimes {
            user: 130,
            system: 60,
            idle: 860,
            ..Default::default()
        };

        let pct = CpuPercentages::between(&previous, &current);
        assert!((pct.busy - 40.0).abs() < 1e-9);
        assert!((pct.user - 30.0).abs() < 1e-9);
        assert!((pct.system - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_tracker_without_baseline_reports_zero() {
        let tracker = CpuTimesTracker {
            previous: Mutex::new(None),
        };
        let first = tracker
            .record(CpuTimes {
                user: 10,
                idle: 10,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(first, CpuPercentages::default());

        let second = tracker
            .record(CpuTimes {
                user: 20,
                idle: 20,
                ..Default::default()
            })
            .unwrap();
        assert!((second.busy - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_identical_readings_report_zero() {
        let times = parse_cpu_times(STAT).unwrap();
        assert_eq!(
            CpuPercentages::between(&times, &times),
            CpuPercentages::default()
        );
    }
}
