//! Memory and swap collector.
//!
//! Used/total/available memory and swap come from sysinfo; the page cache
//! size is read from /proc/meminfo because sysinfo does not report it.

use std::fs;
use std::sync::Mutex;
use sysinfo::System;
use tracing::warn;

use crate::error::ProbeError;

const PROC_MEMINFO: &str = "/proc/meminfo";

/// Memory and swap readings in bytes. `cached_bytes` is `None` when
/// /proc/meminfo could not be read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryReading {
    pub used_bytes: u64,
    pub total_bytes: u64,
    pub available_bytes: u64,
    pub cached_bytes: Option<u64>,
    pub swap_used_bytes: u64,
    pub swap_total_bytes: u64,
}

/// Page cache size from /proc/meminfo content: `Cached` plus the reclaimable
/// slab, reported in kB by the kernel.
pub fn parse_cached_bytes(content: &str) -> Result<u64, ProbeError> {
    let mut cached_kb: Option<u64> = None;
    let mut reclaimable_kb: u64 = 0;

    for line in content.lines() {
        let mut parts = line.split_whitespace();
        let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
            continue;
        };
        match key {
            "Cached:" => {
                cached_kb = Some(
                    value
                        .parse::<u64>()
                        .map_err(|e| ProbeError::parse("Cached", e.to_string()))?,
                );
            }
            "SReclaimable:" => {
                reclaimable_kb = value.parse::<u64>().unwrap_or(0);
            }
            _ => {}
        }
    }

    cached_kb
        .map(|kb| (kb + reclaimable_kb) * 1024)
        .ok_or_else(|| ProbeError::parse("/proc/meminfo", "missing Cached field"))
}

pub fn read_cached_bytes(meminfo_path: &str) -> Result<u64, ProbeError> {
    let content =
        fs::read_to_string(meminfo_path).map_err(|e| ProbeError::io(meminfo_path, e))?;
    parse_cached_bytes(&content)
}

/// Reads memory figures through a shared sysinfo handle.
pub fn read_memory(system: &Mutex<System>) -> Result<MemoryReading, ProbeError> {
    read_memory_with_meminfo(system, PROC_MEMINFO)
}

/// Like [`read_memory`], with the page cache read from `meminfo_path`. A
/// failed cache read is logged and does not discard the sysinfo figures.
pub fn read_memory_with_meminfo(
    system: &Mutex<System>,
    meminfo_path: &str,
) -> Result<MemoryReading, ProbeError> {
    let cached_bytes = match read_cached_bytes(meminfo_path) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            warn!("Failed to read page cache size: {}", e);
            None
        }
    };

    let mut sys = system
        .lock()
        .map_err(|_| ProbeError::Unavailable("sysinfo handle"))?;
    sys.refresh_memory();

    let total_bytes = sys.total_memory();
    if total_bytes == 0 {
        return Err(ProbeError::Unavailable("memory totals"));
    }

    Ok(MemoryReading {
        used_bytes: sys.used_memory(),
        total_bytes,
        available_bytes: sys.available_memory(),
        cached_bytes,
        swap_used_bytes: sys.used_swap(),
        swap_total_bytes: sys.total_swap(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cached_bytes() {
        let content = "MemTotal:       16000000 kB\n\
                       MemFree:         1000000 kB\n\
                       Cached:          2000000 kB\n\
                       SReclaimable:     100000 kB\n";
        assert_eq!(parse_cached_bytes(content).unwrap(), 2_100_000 * 1024);
    }

    #[test]
    fn test_parse_cached_bytes_without_slab() {
        let content = "Cached: 10 kB\n";
        assert_eq!(parse_cached_bytes(content).unwrap(), 10 * 1024);
    }

    #[test]
    fn test_parse_cached_bytes_missing_field() {
        assert!(parse_cached_bytes("MemTotal: 1 kB\n").is_err());
    }

    #[test]
    fn test_read_memory_from_host() {
        let system = Mutex::new(System::new());
        let reading = read_memory(&system).expect("memory should be readable on Linux");
        assert!(reading.total_bytes > 0);
        assert!(reading.used_bytes <= reading.total_bytes);
        assert!(reading.cached_bytes.is_some());
    }

    #[test]
    fn test_unreadable_meminfo_keeps_sysinfo_figures() {
        let system = Mutex::new(System::new());
        let reading = read_memory_with_meminfo(&system, "/nonexistent/meminfo").unwrap();
        assert!(reading.cached_bytes.is_none());
        assert!(reading.total_bytes > 0);
        assert!(reading.available_bytes <= reading.total_bytes);
    }
}
