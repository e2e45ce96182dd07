//! HTTP endpoint handlers for the collector.
//!
//! This module provides handlers for all HTTP endpoints:
//! - `/`: Landing page
//! - `/metrics`: Prometheus self-telemetry
//! - `/health`: Poll health statistics
//! - `/values`: Latest flattened metrics (JSON)
//! - `/entities`: Currently tracked entities per family (JSON)
//! - `/signals`: Recent lifecycle signals (JSON)
//! - `/config`: Configuration display endpoint

pub mod config;
pub mod entities;
pub mod health;
pub mod metrics;
pub mod root;
pub mod signals;
pub mod values;

// Re-export handlers
pub use config::config_handler;
pub use entities::entities_handler;
pub use health::health_handler;
pub use metrics::metrics_handler;
pub use root::root_handler;
pub use signals::signals_handler;
pub use values::values_handler;
