//! Application state management for the collector.
//!
//! This module defines the shared application state that is passed
//! to HTTP handlers and updated by the background poller task.

use ahash::AHashMap as HashMap;
use chrono::{DateTime, Utc};
use herakles_windows_collector::{Family, HealthStats, LifecycleSignal, SignalKind};
use prometheus::Registry;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

use crate::config::Config;
use crate::metrics::CollectorMetrics;

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

/// Outcome of the most recent poll as seen by the HTTP layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollStatus {
    /// No poll has finished yet.
    Pending,
    Ok,
    /// The endpoint answered but nothing usable was in the payload.
    NoMetrics,
    Failed,
}

/// A lifecycle signal stamped with the poll that produced it.
#[derive(Debug, Clone, Serialize)]
pub struct SignalRecord {
    pub poll: u64,
    pub timestamp: DateTime<Utc>,
    pub family: Family,
    pub entity_id: String,
    pub kind: SignalKind,
}

impl SignalRecord {
    pub fn new(poll: u64, timestamp: DateTime<Utc>, signal: LifecycleSignal) -> Self {
        Self {
            poll,
            timestamp,
            family: signal.family,
            entity_id: signal.entity_id,
            kind: signal.kind,
        }
    }
}

/// Latest published view of the collector.
///
/// `metrics` and `entities` always come from the last successful poll;
/// a failed poll only updates the status fields.
#[derive(Debug)]
pub struct Snapshot {
    pub metrics: HashMap<String, i64>,
    pub entities: BTreeMap<Family, Vec<String>>,
    pub signals: VecDeque<SignalRecord>,
    pub signal_capacity: usize,
    pub status: PollStatus,
    pub last_error: Option<String>,
    pub last_poll: Option<u64>,
    pub last_success: Option<DateTime<Utc>>,
}

impl Snapshot {
    pub fn new(signal_capacity: usize) -> Self {
        Self {
            metrics: HashMap::new(),
            entities: BTreeMap::new(),
            signals: VecDeque::with_capacity(signal_capacity.min(1024)),
            signal_capacity: signal_capacity.max(1),
            status: PollStatus::Pending,
            last_error: None,
            last_poll: None,
            last_success: None,
        }
    }

    /// Appends signals, evicting the oldest beyond capacity.
    pub fn push_signals(&mut self, records: impl IntoIterator<Item = SignalRecord>) {
        for record in records {
            if self.signals.len() == self.signal_capacity {
                self.signals.pop_front();
            }
            self.signals.push_back(record);
        }
    }
}

/// Global application state shared across requests and background tasks.
pub struct AppState {
    pub registry: Registry,
    pub metrics: CollectorMetrics,
    pub snapshot: RwLock<Snapshot>,
    pub config: Arc<Config>,
    pub health_stats: Arc<HealthStats>,
    /// Description of the payload source, for the landing page.
    pub source: String,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(poll: u64, id: &str) -> SignalRecord {
        SignalRecord::new(poll, Utc::now(), LifecycleSignal::appeared(Family::Cores, id))
    }

    #[test]
    fn test_signal_history_is_bounded() {
        let mut snapshot = Snapshot::new(3);
        snapshot.push_signals((0..5).map(|i| record(i, &i.to_string())));

        assert_eq!(snapshot.signals.len(), 3);
        let ids: Vec<_> = snapshot.signals.iter().map(|r| r.entity_id.as_str()).collect();
        assert_eq!(ids, vec!["2", "3", "4"]);
    }

    #[test]
    fn test_zero_capacity_keeps_latest_signal() {
        let mut snapshot = Snapshot::new(0);
        snapshot.push_signals(vec![record(1, "0"), record(1, "1")]);
        assert_eq!(snapshot.signals.len(), 1);
        assert_eq!(snapshot.signals[0].entity_id, "1");
    }
}
