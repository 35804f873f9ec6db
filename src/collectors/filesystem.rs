//! Partition usage collector.
//!
//! Enumerates mounted filesystems from /proc/mounts and reads usage for each
//! mount point with statvfs. Enumeration and per-partition reads are separate
//! calls so one unreadable mount point can be skipped by the caller.

use std::fs;
use std::io;

use crate::error::ProbeError;

const PROC_MOUNTS: &str = "/proc/mounts";

/// A mounted partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub device: String,
    pub mount_point: String,
    pub fstype: String,
}

/// Usage of one partition in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PartitionUsage {
    pub used_bytes: u64,
    pub total_bytes: u64,
}

/// Parses /proc/mounts content, skipping pseudo filesystems.
pub fn parse_mounts(content: &str) -> Vec<Partition> {
    let mut partitions: Vec<Partition> = Vec::new();

    for line in content.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 3 {
            continue;
        }

        let mount_point = unescape_mount_field(parts[1]);
        let fstype = parts[2].to_string();

        if should_skip_filesystem(&fstype, &mount_point) {
            continue;
        }
        // Overmounts list the same mount point twice; keep the first.
        if partitions.iter().any(|p| p.mount_point == mount_point) {
            continue;
        }

        partitions.push(Partition {
            device: parts[0].to_string(),
            mount_point,
            fstype,
        });
    }

    partitions
}

pub fn read_partitions() -> Result<Vec<Partition>, ProbeError> {
    let content = fs::read_to_string(PROC_MOUNTS).map_err(|e| ProbeError::io(PROC_MOUNTS, e))?;
    Ok(parse_mounts(&content))
}

/// /proc/mounts escapes space, tab, newline and backslash as octal.
fn unescape_mount_field(field: &str) -> String {
    field
        .replace("\\040", " ")
        .replace("\\011", "\t")
        .replace("\\012", "\n")
        .replace("\\134", "\\")
}

/// Checks if a filesystem should be skipped based on type and mount point.
fn should_skip_filesystem(fstype: &str, mount_point: &str) -> bool {
    let skip_types = [
        "proc",
        "sysfs",
        "devpts",
        "devtmpfs",
        "tmpfs",
        "cgroup",
        "cgroup2",
        "pstore",
        "bpf",
        "debugfs",
        "tracefs",
        "fusectl",
        "configfs",
        "securityfs",
        "hugetlbfs",
        "mqueue",
        "autofs",
        "binfmt_misc",
        "nsfs",
        "overlay",
        "squashfs",
    ];

    if skip_types.contains(&fstype) {
        return true;
    }

    mount_point.starts_with("/proc")
        || mount_point.starts_with("/sys")
        || mount_point.starts_with("/dev")
        || mount_point.starts_with("/run")
}

/// Reads used/total bytes of a mount point using statvfs.
pub fn read_partition_usage(mount_point: &str) -> Result<PartitionUsage, ProbeError> {
    use std::ffi::CString;
    use std::mem;

    let c_path = CString::new(mount_point).map_err(|e| {
        ProbeError::io(
            mount_point,
            io::Error::new(io::ErrorKind::InvalidInput, e),
        )
    })?;

    // SAFETY: statvfs only writes into the zero-initialized struct we own and
    // reads the NUL-terminated path.
    let stat = unsafe {
        let mut stat: libc::statvfs = mem::zeroed();
        if libc::statvfs(c_path.as_ptr(), &mut stat) != 0 {
            return Err(ProbeError::io(mount_point, io::Error::last_os_error()));
        }
        stat
    };

    let block_size = stat.f_frsize as u64;
    let total_bytes = block_size * stat.f_blocks as u64;
    let free_bytes = block_size * stat.f_bfree as u64;

    Ok(PartitionUsage {
        used_bytes: total_bytes.saturating_sub(free_bytes),
        total_bytes,
    })
}
