//! CLI command implementations for herakles-windows-collector.
//!
//! This module provides implementations for all CLI subcommands:
//! - `check`: One poll against the configured source
//! - `config`: Configuration file generation
//! - `test`: Repeated polls with per-poll output
//! - `families`: Entity family and schema listing

pub mod check;
pub mod config;
pub mod families;
pub mod test;

// Re-export command functions
pub use check::command_check;
pub use config::command_config;
pub use families::command_families;
pub use test::command_test;
