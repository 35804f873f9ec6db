//! Disk I/O totals collector.
//!
//! Sums the sectors read and written by every whole disk in /proc/diskstats.
//! Partitions are left out so their traffic is not counted twice.

use std::fs;
use std::path::Path;

use crate::error::ProbeError;

const PROC_DISKSTATS: &str = "/proc/diskstats";
const SYS_BLOCK: &str = "/sys/block";

/// The kernel reports diskstats in 512-byte sectors regardless of the device.
const SECTOR_SIZE: u64 = 512;

/// Cumulative bytes moved since boot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiskIoTotals {
    pub read_bytes: u64,
    pub written_bytes: u64,
}

/// Sums diskstats content over the devices accepted by `is_whole_disk`.
///
/// Format: major minor name read_ios read_merges read_sectors read_ticks
/// write_ios write_merges write_sectors ...
pub fn parse_diskstats<F>(content: &str, is_whole_disk: F) -> DiskIoTotals
where
    F: Fn(&str) -> bool,
{
    let mut totals = DiskIoTotals::default();

    for line in content.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 14 {
            continue;
        }

        let device = parts[2];
        if device.starts_with("loop") || device.starts_with("ram") || !is_whole_disk(device) {
            continue;
        }

        let sectors_read: u64 = parts[5].parse().unwrap_or(0);
        let sectors_written: u64 = parts[9].parse().unwrap_or(0);
        totals.read_bytes = totals
            .read_bytes
            .saturating_add(sectors_read * SECTOR_SIZE);
        totals.written_bytes = totals
            .written_bytes
            .saturating_add(sectors_written * SECTOR_SIZE);
    }

    totals
}

pub fn read_disk_io_totals() -> Result<DiskIoTotals, ProbeError> {
    let content =
        fs::read_to_string(PROC_DISKSTATS).map_err(|e| ProbeError::io(PROC_DISKSTATS, e))?;
    Ok(parse_diskstats(&content, |device| {
        // Block device names may contain '/', which sysfs spells as '!'.
        Path::new(SYS_BLOCK)
            .join(device.replace('/', "!"))
            .exists()
    }))
}
