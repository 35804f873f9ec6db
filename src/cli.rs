//! CLI arguments for status-page-exporter.
//!
//! Every flag is optional; without flags the server binds the default
//! address and port and looks for a config file in the default locations.

use clap::{Parser, ValueEnum};
use std::net::IpAddr;
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Configuration format options for output
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum ConfigFormat {
    #[default]
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug, Default)]
#[command(
    name = "status-page-exporter",
    about = "Status page web server with health and Prometheus metrics endpoints",
    version,
    propagate_version = true
)]
pub struct Args {
    /// HTTP listen port
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Bind to specific interface/IP
    #[arg(long)]
    pub bind: Option<IpAddr>,

    /// Log level (overrides the config file)
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_without_flags() {
        let args = Args::try_parse_from(["status-page-exporter"]).unwrap();
        assert!(args.port.is_none());
        assert!(args.bind.is_none());
        assert!(args.log_level.is_none());
        assert!(!args.no_config);
    }

    #[test]
    fn test_parse_overrides() {
        let args = Args::try_parse_from([
            "status-page-exporter",
            "-p",
            "8080",
            "--bind",
            "127.0.0.1",
            "--log-level",
            "debug",
            "--no-config",
        ])
        .unwrap();
        assert_eq!(args.port, Some(8080));
        assert_eq!(args.bind.unwrap().to_string(), "127.0.0.1");
        assert_eq!(args.log_level, Some(LogLevel::Debug));
        assert!(args.no_config);
    }
}
