//! Statistics about the exporter's own process.
//!
//! Thread count from /proc/self/status, open descriptors from /proc/self/fd,
//! and inet connections by matching the process's socket inodes against the
//! kernel socket tables.

use std::collections::HashSet;
use std::fs;

use crate::error::ProbeError;

const PROC_SELF_STATUS: &str = "/proc/self/status";
const PROC_SELF_FD: &str = "/proc/self/fd";
const SOCKET_TABLES: [&str; 4] = [
    "/proc/net/tcp",
    "/proc/net/tcp6",
    "/proc/net/udp",
    "/proc/net/udp6",
];

/// Parses the `Threads:` field of /proc/<pid>/status content.
pub fn parse_thread_count(status: &str) -> Result<u64, ProbeError> {
    status
        .lines()
        .find_map(|l| l.strip_prefix("Threads:"))
        .ok_or_else(|| ProbeError::parse("Threads", "field missing"))?
        .trim()
        .parse::<u64>()
        .map_err(|e| ProbeError::parse("Threads", e.to_string()))
}

pub fn read_thread_count() -> Result<u64, ProbeError> {
    let status =
        fs::read_to_string(PROC_SELF_STATUS).map_err(|e| ProbeError::io(PROC_SELF_STATUS, e))?;
    parse_thread_count(&status)
}

/// Counts the open file descriptors of the current process.
pub fn read_open_fd_count() -> Result<u64, ProbeError> {
    let entries = fs::read_dir(PROC_SELF_FD).map_err(|e| ProbeError::io(PROC_SELF_FD, e))?;
    Ok(entries.filter_map(Result::ok).count() as u64)
}

/// Socket inodes held by the current process (`socket:[12345]` fd links).
fn own_socket_inodes() -> Result<HashSet<u64>, ProbeError> {
    let entries = fs::read_dir(PROC_SELF_FD).map_err(|e| ProbeError::io(PROC_SELF_FD, e))?;

    let inodes = entries
        .filter_map(Result::ok)
        .filter_map(|entry| fs::read_link(entry.path()).ok())
        .filter_map(|target| {
            target
                .to_str()
                .and_then(|t| t.strip_prefix("socket:["))
                .and_then(|t| t.strip_suffix(']'))
                .and_then(|t| t.parse::<u64>().ok())
        })
        .collect();

    Ok(inodes)
}

/// Counts rows of a /proc/net/{tcp,udp}[6] table whose inode is in `inodes`.
pub fn count_matching_sockets(table: &str, inodes: &HashSet<u64>) -> u64 {
    table
        .lines()
        .skip(1)
        .filter_map(|line| line.split_whitespace().nth(9))
        .filter_map(|inode| inode.parse::<u64>().ok())
        .filter(|inode| inodes.contains(inode))
        .count() as u64
}

/// Counts the inet (tcp/udp, v4/v6) sockets owned by the current process.
pub fn read_connection_count() -> Result<u64, ProbeError> {
    let inodes = own_socket_inodes()?;
    if inodes.is_empty() {
        return Ok(0);
    }

    let mut total = 0;
    let mut readable_tables = 0;
    for path in SOCKET_TABLES {
        // tcp6/udp6 are absent when IPv6 is disabled.
        if let Ok(table) = fs::read_to_string(path) {
            readable_tables += 1;
            total += count_matching_sockets(&table, &inodes);
        }
    }

    if readable_tables == 0 {
        return Err(ProbeError::Unavailable("socket tables"));
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_thread_count() {
        let status = "Name:\texporter\nState:\tS (sleeping)\nThreads:\t7\nSigQ:\t0/1\n";
        assert_eq!(parse_thread_count(status).unwrap(), 7);
        assert!(parse_thread_count("Name:\tx\n").is_err());
    }

    #[test]
    fn test_count_matching_sockets() {
        let table = "\
  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode
   0: 00000000:1388 00000000:0000 0A 00000000:00000000 00:00000000 00000000  1000        0 4242 1 0000000000000000 100 0 0 10 0
   1: 0100007F:1388 0100007F:D431 01 00000000:00000000 00:00000000 00000000  1000        0 4343 1 0000000000000000 20 4 30 10 -1
   2: 0100007F:0277 00000000:0000 0A 00000000:00000000 00:00000000 00000000     0        0 9999 1 0000000000000000 100 0 0 10 0
";
        let inodes: HashSet<u64> = [4242, 4343].into_iter().collect();
        assert_eq!(count_matching_sockets(table, &inodes), 2);
    }

    #[test]
    fn test_own_process_readings() {
        assert!(read_thread_count().unwrap() >= 1);
        assert!(read_open_fd_count().unwrap() >= 1);
        assert!(read_connection_count().is_ok());
    }
}
