//! Configuration management for herakles-windows-collector.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats.

use herakles_windows_collector::{Family, FamilyFilter, UnknownFamily};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::cli::{Args, ConfigFormat};

// Default configuration constants
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 9216;
pub const DEFAULT_URL: &str = "http://127.0.0.1:9182/metrics";
pub const DEFAULT_UPDATE_EVERY: u64 = 5;
pub const DEFAULT_TIMEOUT: u64 = 5;
pub const DEFAULT_SIGNAL_HISTORY: usize = 1000;

const LOG_LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];

/// Collector configuration. Every field is optional so that a config file
/// only needs to name what it changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub port: Option<u16>,
    pub bind: Option<String>,

    // Source
    pub url: Option<String>,
    #[serde(alias = "update-every")]
    pub update_every: Option<u64>,
    pub timeout: Option<u64>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Exporter collectors requested via `collect[]`
    pub collectors: Option<Vec<String>>,
    /// Offline mode: read the payload from a file on every poll
    #[serde(alias = "payload-file")]
    pub payload_file: Option<PathBuf>,

    // Entity tracking
    #[serde(alias = "include-families")]
    pub include_families: Option<Vec<String>>,
    #[serde(alias = "exclude-families")]
    pub exclude_families: Option<Vec<String>>,
    /// Number of lifecycle signals kept for /signals
    #[serde(alias = "signal-history")]
    pub signal_history: Option<usize>,

    // Feature flags
    pub enable_health: Option<bool>,

    // Logging
    pub log_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: Some(DEFAULT_BIND_ADDR.to_string()),
            port: Some(DEFAULT_PORT),
            url: Some(DEFAULT_URL.to_string()),
            update_every: Some(DEFAULT_UPDATE_EVERY),
            timeout: Some(DEFAULT_TIMEOUT),
            username: None,
            password: None,
            collectors: None,
            payload_file: None,
            include_families: None,
            exclude_families: None,
            signal_history: Some(DEFAULT_SIGNAL_HISTORY),
            enable_health: Some(true),
            log_level: Some("info".into()),
        }
    }
}

impl Config {
    pub fn update_every(&self) -> Duration {
        Duration::from_secs(self.update_every.unwrap_or(DEFAULT_UPDATE_EVERY))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout.unwrap_or(DEFAULT_TIMEOUT))
    }

    pub fn url(&self) -> &str {
        self.url.as_deref().unwrap_or(DEFAULT_URL)
    }

    pub fn signal_history(&self) -> usize {
        self.signal_history.unwrap_or(DEFAULT_SIGNAL_HISTORY)
    }

    pub fn family_filter(&self) -> Result<FamilyFilter, UnknownFamily> {
        FamilyFilter::from_lists(
            self.include_families.as_deref(),
            self.exclude_families.as_deref(),
        )
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    // The URL only matters when no payload file replaces it
    if cfg.payload_file.is_none() {
        let url = cfg.url.as_deref().unwrap_or("").trim();
        if url.is_empty() {
            return Err("url is not set".into());
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(format!("Invalid url '{}', expected http:// or https://", url).into());
        }
    }

    let update_every = cfg.update_every.unwrap_or(DEFAULT_UPDATE_EVERY);
    if update_every < 1 {
        return Err("update_every must be at least 1 second".into());
    }

    let timeout = cfg.timeout.unwrap_or(DEFAULT_TIMEOUT);
    if timeout < 1 {
        return Err("timeout must be at least 1 second".into());
    }
    if timeout > update_every {
        return Err(format!(
            "timeout ({}s) must not exceed update_every ({}s)",
            timeout, update_every
        )
        .into());
    }

    if cfg.signal_history == Some(0) {
        return Err("signal_history must be at least 1".into());
    }

    if cfg.password.is_some() && cfg.username.is_none() {
        return Err("password is set but username is not".into());
    }

    cfg.family_filter()
        .map_err(|e| format!("{} (known families: {})", e, known_families()))?;

    if let Some(level) = cfg.log_level.as_deref() {
        if !LOG_LEVELS.contains(&level) {
            return Err(format!(
                "Invalid log_level '{}', expected one of {}",
                level,
                LOG_LEVELS.join(", ")
            )
            .into());
        }
    }

    Ok(())
}

fn known_families() -> String {
    Family::ALL
        .iter()
        .map(|f| f.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    // Override with CLI args
    if let Some(bind_ip) = args.bind {
        config.bind = Some(bind_ip.to_string());
    }
    if let Some(cli_port) = args.port {
        config.port = Some(cli_port);
    }

    if let Some(url) = &args.url {
        config.url = Some(url.clone());
    }
    if let Some(update_every) = args.update_every {
        config.update_every = Some(update_every);
    }
    if let Some(timeout) = args.timeout {
        config.timeout = Some(timeout);
    }
    if let Some(collectors) = &args.collectors {
        config.collectors = Some(split_list(collectors));
    }
    if let Some(payload_file) = &args.payload_file {
        config.payload_file = Some(payload_file.clone());
    }

    if let Some(include) = &args.include_families {
        config.include_families = Some(split_list(include));
    }
    if let Some(exclude) = &args.exclude_families {
        config.exclude_families = Some(split_list(exclude));
    }

    if args.disable_health {
        config.enable_health = Some(false);
    }

    if let Some(level) = &args.log_level {
        config.log_level = Some(format!("{:?}", level).to_lowercase());
    }

    Ok(config)
}

/// Loads configuration from `path`, or from the first default location
/// that exists. Missing files yield the defaults.
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let defaults = [
                "/etc/herakles/windows-collector.yaml",
                "/etc/herakles/windows-collector.yml",
                "/etc/herakles/windows-collector.json",
                "/etc/herakles/windows-collector.toml",
                "./herakles-windows-collector.yaml",
                "./herakles-windows-collector.yml",
                "./herakles-windows-collector.json",
                "./herakles-windows-collector.toml",
            ];

            match defaults.iter().find(|p| Path::new(p).exists()) {
                Some(p) => PathBuf::from(p),
                None => return Ok(Config::default()),
            }
        }
    };

    if !path.exists() {
        return Ok(Config::default());
    }

    let content = fs::read_to_string(&path)?;

    match path.extension().and_then(|s| s.to_str()) {
        Some("json") => {
            let config: Config = serde_json::from_str(&content)?;
            info!("Loaded JSON configuration from: {}", path.display());
            Ok(config)
        }
        Some("toml") => {
            let config: Config = toml::from_str(&content)?;
            info!("Loaded TOML configuration from: {}", path.display());
            Ok(config)
        }
        _ => {
            // Default to YAML
            let config: Config = serde_yaml::from_str(&content)?;
            info!("Loaded YAML configuration from: {}", path.display());
            Ok(config)
        }
    }
}

/// Renders configuration in the requested format.
pub fn render_config(
    config: &Config,
    format: &ConfigFormat,
) -> Result<String, Box<dyn std::error::Error>> {
    Ok(match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    })
}

/// Shows configuration in requested format
pub fn show_config(config: &Config, format: ConfigFormat) -> Result<(), Box<dyn std::error::Error>> {
    let output = render_config(config, &format)?;
    println!("{output}");
    Ok(())
}
