//! Herakles Windows Collector Library
//!
//! This library polls an endpoint serving Prometheus exposition text (a
//! `windows_exporter` instance), flattens every poll into a `key → i64`
//! snapshot and tracks which entities (CPU cores, volumes, NICs, services,
//! Hyper-V VMs, ...) appeared or disappeared since the previous poll.
//!
//! # Features
//!
//! - **Exposition Parsing**: strict parser for the Prometheus text format
//! - **Flattening**: per-metric key schemas keyed on entity and sub-dimension labels
//! - **Entity Tracking**: one membership set per entity family, diffed every poll
//! - **Failure Safety**: a failed poll never touches the entity cache
//!
//! # Usage
//!
//! ```rust,no_run
//! use herakles_windows_collector::{Collector, FamilyFilter, HttpFetcher, HttpOptions};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = HttpFetcher::new(HttpOptions::new("http://127.0.0.1:9182/metrics"))?;
//! let mut collector = Collector::new(Box::new(fetcher), FamilyFilter::all());
//!
//! let poll = collector.collect_once().await?;
//! println!("{} metrics", poll.metrics.len());
//! for signal in &poll.signals {
//!     println!("{} {} {}", signal.family, signal.entity_id, signal.kind);
//! }
//! # Ok(())
//! # }
//! ```

pub mod collector;
pub mod entity;
pub mod exposition;
pub mod fetch;
pub mod flatten;
pub mod health_stats;
pub mod lifecycle;
pub mod schema;

// Re-export main types for convenience
pub use collector::{CollectError, Collector, Poll, PollTimings};
pub use entity::{EntityCache, EntityFamily, Family, FamilyFilter, UnknownFamily};
pub use exposition::{parse, MetricFamily, MetricType, ParseError, ParseErrorKind, Sample};
pub use fetch::{Fetch, FetchError, FileFetcher, HttpFetcher, HttpOptions};
pub use flatten::{flatten, Flattened, SchemaMismatchError};
pub use health_stats::HealthStats;
pub use lifecycle::{LifecycleSignal, SeenSets, SignalKind};
