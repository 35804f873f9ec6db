//! Configuration management for status-page-exporter.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats.

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::cli::{Args, ConfigFormat};

// Default configuration constants
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5000;

/// Config file locations tried when no path is given.
const DEFAULT_CONFIG_PATHS: [&str; 6] = [
    "/etc/status-page-exporter/config.yaml",
    "/etc/status-page-exporter/config.yml",
    "/etc/status-page-exporter/config.json",
    "./status-page-exporter.yaml",
    "./status-page-exporter.yml",
    "./status-page-exporter.json",
];

/// Effective configuration. Unset fields fall back to their defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub port: Option<u16>,
    pub bind: Option<String>,

    // Logging
    #[serde(alias = "log-level")]
    pub log_level: Option<String>,

    // Feature flags
    #[serde(alias = "enable-health")]
    pub enable_health: Option<bool>,

    // Collector enable flags
    #[serde(alias = "enable-filesystem-collector")]
    pub enable_filesystem_collector: Option<bool>,
    #[serde(alias = "enable-diskstats-collector")]
    pub enable_diskstats_collector: Option<bool>,
    #[serde(alias = "enable-network-collector")]
    pub enable_network_collector: Option<bool>,
    #[serde(alias = "enable-process-collector")]
    pub enable_process_collector: Option<bool>,

    /// Upper bounds of the request latency histogram buckets, in seconds.
    #[serde(alias = "latency-buckets")]
    pub latency_buckets: Option<Vec<f64>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: Some(DEFAULT_PORT),
            bind: Some(DEFAULT_BIND_ADDR.to_string()),
            log_level: Some("info".into()),
            enable_health: Some(true),
            enable_filesystem_collector: Some(true),
            enable_diskstats_collector: Some(true),
            enable_network_collector: Some(true),
            enable_process_collector: Some(true),
            latency_buckets: None,
        }
    }
}

impl Config {
    /// Address the HTTP server listens on.
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        let bind = self.bind.as_deref().unwrap_or(DEFAULT_BIND_ADDR);
        let ip: IpAddr = bind
            .parse()
            .with_context(|| format!("Invalid bind address '{}'", bind))?;
        Ok(SocketAddr::new(ip, self.port.unwrap_or(DEFAULT_PORT)))
    }

    /// Latency histogram buckets, defaulting to the prometheus defaults.
    pub fn latency_buckets(&self) -> Vec<f64> {
        self.latency_buckets
            .clone()
            .unwrap_or_else(|| prometheus::DEFAULT_BUCKETS.to_vec())
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> anyhow::Result<()> {
    cfg.socket_addr()?;

    if let Some(buckets) = &cfg.latency_buckets {
        if buckets.is_empty() {
            bail!("latency_buckets must not be empty");
        }
        if buckets.iter().any(|b| !b.is_finite()) {
            bail!("latency_buckets must only contain finite values");
        }
        if buckets.windows(2).any(|w| w[0] >= w[1]) {
            bail!("latency_buckets must be strictly increasing");
        }
    }

    if let Some(level) = cfg.log_level.as_deref() {
        if parse_log_level(level).is_none() {
            bail!(
                "Invalid log_level '{}', expected off/error/warn/info/debug/trace",
                level
            );
        }
    }

    Ok(())
}

/// Parses a log level name case-insensitively.
pub fn parse_log_level(level: &str) -> Option<crate::cli::LogLevel> {
    use clap::ValueEnum;
    crate::cli::LogLevel::from_str(level, true).ok()
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    if let Some(bind_ip) = args.bind {
        config.bind = Some(bind_ip.to_string());
    }
    if let Some(cli_port) = args.port {
        config.port = Some(cli_port);
    }

    Ok(config)
}

/// Loads a config file, choosing the parser from the file extension.
///
/// An explicit path must exist. Without a path the default locations are
/// tried and the built-in defaults are used when none exists.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let path = match path {
        Some(p) => {
            if !p.exists() {
                bail!("Config file not found: {}", p.display());
            }
            p.to_path_buf()
        }
        None => match DEFAULT_CONFIG_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|p| p.exists())
        {
            Some(p) => p,
            None => return Ok(Config::default()),
        },
    };

    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;

    let config: Config = match path.extension().and_then(|s| s.to_str()) {
        Some("json") => serde_json::from_str(&content)
            .with_context(|| format!("Invalid JSON config {}", path.display()))?,
        Some("toml") => toml::from_str(&content)
            .with_context(|| format!("Invalid TOML config {}", path.display()))?,
        // Default to YAML
        _ => serde_yaml::from_str(&content)
            .with_context(|| format!("Invalid YAML config {}", path.display()))?,
    };

    info!("Loaded configuration from: {}", path.display());
    Ok(config)
}

/// Renders configuration in the requested format.
pub fn render_config(config: &Config, format: ConfigFormat) -> anyhow::Result<String> {
    let output = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    };
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_socket_addr() {
        let addr = Config::default().socket_addr().unwrap();
        assert_eq!(addr.to_string(), "0.0.0.0:5000");
    }

    #[test]
    fn test_load_yaml_config_with_aliases() {
        let file = write_config(
            ".yaml",
            "port: 8081\nenable-health: false\nlatency-buckets: [0.1, 0.5, 1.0]\n",
        );
        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.port, Some(8081));
        assert_eq!(config.enable_health, Some(false));
        assert_eq!(config.latency_buckets(), vec![0.1, 0.5, 1.0]);
        // Unset fields are None and fall back at the use site.
        assert!(config.bind.is_none());
        assert_eq!(config.socket_addr().unwrap().to_string(), "0.0.0.0:8081");
    }

    #[test]
    fn test_load_json_and_toml_config() {
        let json = write_config(".json", r#"{"bind": "127.0.0.1", "port": 9000}"#);
        let config = load_config(Some(json.path())).unwrap();
        assert_eq!(config.socket_addr().unwrap().to_string(), "127.0.0.1:9000");

        let toml = write_config(".toml", "enable_network_collector = false\n");
        let config = load_config(Some(toml.path())).unwrap();
        assert_eq!(config.enable_network_collector, Some(false));
    }

    #[test]
    fn test_missing_explicit_config_fails() {
        assert!(load_config(Some(Path::new("/nonexistent/config.yaml"))).is_err());
    }

    #[test]
    fn test_cli_overrides_file() {
        let file = write_config(".yaml", "port: 8081\nbind: 127.0.0.1\n");
        let args = Args {
            port: Some(9999),
            config: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        let config = resolve_config(&args).unwrap();
        assert_eq!(config.port, Some(9999));
        assert_eq!(config.bind.as_deref(), Some("127.0.0.1"));
    }

    #[test]
    fn test_validate_rejects_bad_buckets() {
        let mut config = Config::default();
        config.latency_buckets = Some(vec![]);
        assert!(validate_effective_config(&config).is_err());

        config.latency_buckets = Some(vec![1.0, 0.5]);
        assert!(validate_effective_config(&config).is_err());

        config.latency_buckets = Some(vec![0.1, f64::INFINITY]);
        assert!(validate_effective_config(&config).is_err());

        config.latency_buckets = Some(vec![0.1, 0.2]);
        assert!(validate_effective_config(&config).is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_bind_and_log_level() {
        let mut config = Config::default();
        config.bind = Some("not-an-ip".into());
        assert!(validate_effective_config(&config).is_err());

        let mut config = Config::default();
        config.log_level = Some("loud".into());
        assert!(validate_effective_config(&config).is_err());
    }

    #[test]
    fn test_render_config_formats() {
        let config = Config::default();
        assert!(render_config(&config, ConfigFormat::Yaml)
            .unwrap()
            .contains("port: 5000"));
        assert!(render_config(&config, ConfigFormat::Json)
            .unwrap()
            .contains("\"port\": 5000"));
        assert!(render_config(&config, ConfigFormat::Toml)
            .unwrap()
            .contains("port = 5000"));
    }
}
