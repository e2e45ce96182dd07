//! CLI arguments and subcommands for herakles-windows-collector.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use std::net::IpAddr;
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Configuration format options for output
#[derive(Debug, Clone, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "herakles-windows-collector",
    about = "Entity-aware collector for windows_exporter metrics",
    long_about = "Entity-aware collector for windows_exporter metrics.\n\n\
                  Polls a windows_exporter endpoint, flattens every poll into a key/value \
                  snapshot and tracks which CPU cores, volumes, NICs, services, SQL Server \
                  databases, Hyper-V VMs and other entities appeared or disappeared.",
    author = "Michael Moll <exporter@herakles.now> - Herakles",
    version = "0.1.0",
    propagate_version = true,
    after_help = "Project: https://github.com/cansp-dev/herakles-windows-collector | More info: https://www.herakles.now | Support: exporter@herakles.now"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// windows_exporter metrics URL
    #[arg(short = 'u', long)]
    pub url: Option<String>,

    /// Poll interval in seconds
    #[arg(long)]
    pub update_every: Option<u64>,

    /// Request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Exporter collectors to request (comma-separated, sent as collect[])
    #[arg(long)]
    pub collectors: Option<String>,

    /// Track only these entity families (comma-separated)
    #[arg(long)]
    pub include_families: Option<String>,

    /// Do not track these entity families (comma-separated)
    #[arg(long)]
    pub exclude_families: Option<String>,

    /// Read the exposition payload from this file instead of the URL
    #[arg(short = 't', long)]
    pub payload_file: Option<PathBuf>,

    /// HTTP listen port
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Bind to specific interface/IP
    #[arg(long)]
    pub bind: Option<IpAddr>,

    /// Log level (overrides log_level from the config file)
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

    /// Disable /health endpoint
    #[arg(long)]
    pub disable_health: bool,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a single poll against the configured source and report the result
    Check,

    /// Generate configuration files
    Config {
        /// Output file path ("-" for stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },

    /// Run several polls and print metric counts and lifecycle signals
    Test {
        /// Number of polls
        #[arg(short = 'n', long, default_value_t = 1)]
        iterations: usize,

        /// Print every flattened metric
        #[arg(long)]
        verbose: bool,
    },

    /// List entity families and the metrics that feed them
    Families {
        /// Show key layout of every metric
        #[arg(long)]
        verbose: bool,

        /// Only show this family
        #[arg(short = 'f', long)]
        family: Option<String>,
    },
}
