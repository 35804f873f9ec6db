//! Network interface counters collector, backed by sysinfo.

use std::sync::Mutex;
use sysinfo::Networks;

use crate::error::ProbeError;

/// Cumulative counters for one network interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceCounters {
    pub interface: String,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub packets_sent: u64,
    pub packets_received: u64,
}

/// Refreshes the interface list and returns the totals of every interface,
/// sorted by name.
pub fn read_interface_counters(
    networks: &Mutex<Networks>,
) -> Result<Vec<InterfaceCounters>, ProbeError> {
    let mut networks = networks
        .lock()
        .map_err(|_| ProbeError::Unavailable("network interface list"))?;
    networks.refresh_list();
    networks.refresh();

    let mut counters: Vec<InterfaceCounters> = (&*networks)
        .into_iter()
        .map(|(name, data)| InterfaceCounters {
            interface: name.clone(),
            bytes_sent: data.total_transmitted(),
            bytes_received: data.total_received(),
            packets_sent: data.total_packets_transmitted(),
            packets_received: data.total_packets_received(),
        })
        .collect();
    counters.sort_by(|a, b| a.interface.cmp(&b.interface));

    Ok(counters)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_interface_counters_includes_loopback() {
        let networks = Mutex::new(Networks::new_with_refreshed_list());
        let counters = read_interface_counters(&networks).unwrap();
        assert!(
            counters.iter().any(|c| c.interface == "lo"),
            "Loopback interface not found in {:?}",
            counters
        );
    }
}
