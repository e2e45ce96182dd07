//! Config command implementation.
//!
//! Generates configuration files in various formats.

use std::fs;
use std::path::PathBuf;

use crate::cli::ConfigFormat;
use crate::config::{render_config, Config};

/// Generates configuration files.
pub fn command_config(
    output: Option<PathBuf>,
    format: ConfigFormat,
    commented: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    let output = match output {
        Some(path) => path,
        None => PathBuf::from(match format {
            ConfigFormat::Json => "herakles-windows-collector.json",
            ConfigFormat::Toml => "herakles-windows-collector.toml",
            ConfigFormat::Yaml => "herakles-windows-collector.yaml",
        }),
    };

    let mut content = render_config(&config, &format)?;
    if commented && matches!(format, ConfigFormat::Yaml) {
        content = add_config_comments(content);
    }

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

/// Adds comments to YAML configuration.
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# Herakles Windows Collector Configuration
# =========================================
#
# Server Configuration
# --------------------
# bind: "0.0.0.0"              # Bind IP (0.0.0.0 = all interfaces)
# port: 9216                   # HTTP port
#
# Source
# ------
# url: "http://127.0.0.1:9182/metrics"  # windows_exporter endpoint
# update_every: 5              # Poll interval in seconds
# timeout: 5                   # Request timeout, at most update_every
# username: null               # Basic auth user
# password: null               # Basic auth password
# collectors: null             # Exporter collectors to request (collect[])
# payload_file: null           # Read payloads from this file instead of url
#
# Entity Tracking
# ---------------
# include_families: null       # Track only these families (e.g. ["cores", "volumes"])
# exclude_families: null       # Never track these families (e.g. ["processes"])
# signal_history: 1000         # Lifecycle signals kept for /signals
#
# Feature Flags
# -------------
# enable_health: true          # Enable /health endpoint
#
# Logging
# -------
# log_level: "info"            # off, error, warn, info, debug, trace
"#;

    format!("{comments}\n{yaml}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_default_config_that_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("collector.yaml");

        command_config(Some(path.clone()), ConfigFormat::Yaml, true).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("# Herakles Windows Collector Configuration"));

        let loaded = crate::config::load_config(Some(&path)).unwrap();
        assert_eq!(loaded.url, Config::default().url);
        assert_eq!(loaded.update_every, Config::default().update_every);
    }

    #[test]
    fn test_writes_toml_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("collector.toml");

        command_config(Some(path.clone()), ConfigFormat::Toml, false).unwrap();

        let loaded = crate::config::load_config(Some(&path)).unwrap();
        assert_eq!(loaded.port, Config::default().port);
    }
}
