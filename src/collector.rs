//! Poll orchestrator.
//!
//! [`Collector`] owns the entity cache and runs one poll at a time:
//! fetch → parse → flatten → diff. Anything that fails before the diff leaves
//! the cache exactly as it was.

use ahash::AHashMap as HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};

use crate::entity::{EntityCache, FamilyFilter};
use crate::exposition::{self, ParseError};
use crate::fetch::{Fetch, FetchError};
use crate::flatten::{flatten, SchemaMismatchError};
use crate::lifecycle::{self, LifecycleSignal};

#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("invalid exposition payload: {0}")]
    Parse(#[from] ParseError),

    /// The endpoint answered, but nothing usable was in the payload.
    #[error("no metrics collected")]
    EmptyResult,
}

impl CollectError {
    /// Short label for telemetry.
    pub fn kind(&self) -> &'static str {
        match self {
            CollectError::Fetch(_) => "fetch",
            CollectError::Parse(_) => "parse",
            CollectError::EmptyResult => "empty",
        }
    }
}

/// Time spent in each stage of a poll.
#[derive(Debug, Clone, Copy, Default)]
pub struct PollTimings {
    pub fetch: Duration,
    pub parse: Duration,
    pub flatten: Duration,
    pub total: Duration,
}

/// Outcome of a successful poll.
#[derive(Debug, Clone)]
pub struct Poll {
    /// 1-based sequence number of the poll, counting failed ones.
    pub number: u64,
    /// Complete flat snapshot; never empty.
    pub metrics: HashMap<String, i64>,
    pub signals: Vec<LifecycleSignal>,
    pub mismatches: Vec<SchemaMismatchError>,
    pub timings: PollTimings,
}

/// Stateful collector bound to one payload source.
///
/// All polling goes through `&mut self`; callers that share a collector
/// between tasks must serialize access themselves.
pub struct Collector {
    fetcher: Option<Box<dyn Fetch>>,
    cache: EntityCache,
    filter: FamilyFilter,
    polls: u64,
}

impl Collector {
    pub fn new(fetcher: Box<dyn Fetch>, filter: FamilyFilter) -> Self {
        Self {
            fetcher: Some(fetcher),
            cache: EntityCache::new(),
            filter,
            polls: 0,
        }
    }

    /// Runs one poll.
    #[instrument(skip(self))]
    pub async fn collect_once(&mut self) -> Result<Poll, CollectError> {
        self.polls += 1;
        let number = self.polls;
        let start = Instant::now();

        let fetcher = self.fetcher.as_ref().ok_or(FetchError::Closed)?;
        let payload = fetcher.fetch().await?;
        let fetch_elapsed = start.elapsed();

        let parse_start = Instant::now();
        let families = exposition::parse(&payload)?;
        let parse_elapsed = parse_start.elapsed();
        debug!("Parsed {} metric families", families.len());

        let flatten_start = Instant::now();
        let flat = flatten(&families, &self.filter);
        let flatten_elapsed = flatten_start.elapsed();

        if flat.metrics.is_empty() {
            return Err(CollectError::EmptyResult);
        }

        let signals = lifecycle::diff(&mut self.cache, &flat.seen, &self.filter);

        let timings = PollTimings {
            fetch: fetch_elapsed,
            parse: parse_elapsed,
            flatten: flatten_elapsed,
            total: start.elapsed(),
        };
        debug!(
            "Poll {} collected {} metrics, {} signals in {:.3}s",
            number,
            flat.metrics.len(),
            signals.len(),
            timings.total.as_secs_f64()
        );

        Ok(Poll {
            number,
            metrics: flat.metrics,
            signals,
            mismatches: flat.mismatches,
            timings,
        })
    }

    /// Verifies the source can be collected: one poll that must produce
    /// metrics. The poll is returned for reporting.
    pub async fn check(&mut self) -> Result<Poll, CollectError> {
        let poll = self.collect_once().await?;
        info!(
            "Check passed: {} metrics, {} entities tracked",
            poll.metrics.len(),
            self.cache.total_len()
        );
        Ok(poll)
    }

    /// Scheduler entry point: one poll, errors logged instead of returned.
    pub async fn collect(&mut self) -> Option<HashMap<String, i64>> {
        match self.collect_once().await {
            Ok(poll) => Some(poll.metrics),
            Err(e) => {
                error!("Collection failed: {}", e);
                None
            }
        }
    }

    pub fn entities(&self) -> &EntityCache {
        &self.cache
    }

    pub fn filter(&self) -> &FamilyFilter {
        &self.filter
    }

    pub fn polls(&self) -> u64 {
        self.polls
    }

    pub fn source(&self) -> Option<String> {
        self.fetcher.as_ref().map(|f| f.describe())
    }

    /// Releases the transport. Later polls fail with [`FetchError::Closed`].
    pub fn cleanup(&mut self) {
        if let Some(fetcher) = self.fetcher.take() {
            info!("Released payload source {}", fetcher.describe());
        } else {
            warn!("Cleanup called on an already released collector");
        }
    }
}
