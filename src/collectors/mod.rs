//! Collectors module for host and process readings.
//!
//! Each collector reads one resource category from /proc, statvfs or sysinfo
//! and returns plain data; writing the readings into instruments is the
//! probe's job.

pub mod cpu;
pub mod diskstats;
pub mod filesystem;
pub mod memory;
pub mod network;
pub mod process;
