//! Background polling for the collector.
//!
//! One task owns the [`Collector`] and polls it on a fixed interval. After
//! every poll the outcome is published to the shared snapshot, the
//! self-telemetry and the health statistics. HTTP handlers only ever read
//! what was published here.

use chrono::Utc;
use herakles_windows_collector::{
    CollectError, Collector, Fetch, FetchError, FileFetcher, HttpFetcher, HttpOptions, SignalKind,
};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

use crate::config::Config;
use crate::state::{PollStatus, SharedState, SignalRecord};

/// Builds the payload source described by the configuration.
pub fn build_fetcher(config: &Config) -> Result<Box<dyn Fetch>, FetchError> {
    if let Some(path) = &config.payload_file {
        info!("Reading payloads from file: {}", path.display());
        return Ok(Box::new(FileFetcher::new(path.clone())));
    }

    let options = HttpOptions {
        url: config.url().to_string(),
        timeout: config.timeout(),
        collectors: config.collectors.clone().unwrap_or_default(),
        username: config.username.clone(),
        password: config.password.clone(),
    };
    Ok(Box::new(HttpFetcher::new(options)?))
}

/// Builds a collector from a validated configuration.
pub fn build_collector(config: &Config) -> anyhow::Result<Collector> {
    let fetcher = build_fetcher(config)?;
    let filter = config.family_filter()?;
    Ok(Collector::new(fetcher, filter))
}

/// Runs one poll and publishes its outcome.
#[instrument(skip(state, collector))]
pub async fn poll_once(state: &SharedState, collector: &mut Collector) {
    let start = Instant::now();
    let result = collector.collect_once().await;
    let elapsed = start.elapsed().as_secs_f64();

    match result {
        Ok(poll) => {
            let appeared = poll
                .signals
                .iter()
                .filter(|s| s.kind == SignalKind::Appeared)
                .count() as u64;
            let disappeared = poll.signals.len() as u64 - appeared;
            let entities = collector.entities();

            // Telemetry
            state.metrics.poll_duration_seconds.set(elapsed);
            state.metrics.poll_success.set(1.0);
            state.metrics.polls_total.with_label_values(&["ok"]).inc();
            for (stage, duration) in [
                ("fetch", poll.timings.fetch),
                ("parse", poll.timings.parse),
                ("flatten", poll.timings.flatten),
            ] {
                state
                    .metrics
                    .stage_duration_seconds
                    .with_label_values(&[stage])
                    .set(duration.as_secs_f64());
            }
            state.metrics.flat_metrics.set(poll.metrics.len() as f64);
            for mismatch in &poll.mismatches {
                state
                    .metrics
                    .schema_mismatches_total
                    .with_label_values(&[mismatch.metric.as_str()])
                    .inc();
            }
            state.metrics.observe_entities(entities);
            state.metrics.observe_signals(&poll.signals);

            // Health stats
            state.health_stats.record_poll_success(
                elapsed,
                poll.metrics.len() as u64,
                entities.total_len() as u64,
            );
            state.health_stats.record_stage_timings(
                poll.timings.fetch.as_secs_f64() * 1000.0,
                poll.timings.parse.as_secs_f64() * 1000.0,
                poll.timings.flatten.as_secs_f64() * 1000.0,
            );
            state
                .health_stats
                .record_schema_mismatches(poll.mismatches.len() as u64);
            state.health_stats.record_signals(appeared, disappeared);

            if !poll.signals.is_empty() {
                info!(
                    "Poll {}: {} entities appeared, {} disappeared",
                    poll.number, appeared, disappeared
                );
            }
            debug!(
                "Poll {} published {} metrics in {:.3}s",
                poll.number,
                poll.metrics.len(),
                elapsed
            );

            let now = Utc::now();
            let number = poll.number;
            let entity_snapshot = entities.snapshot();

            let mut snapshot = state.snapshot.write().await;
            snapshot.metrics = poll.metrics;
            snapshot.entities = entity_snapshot;
            snapshot.push_signals(
                poll.signals
                    .into_iter()
                    .map(|signal| SignalRecord::new(number, now, signal)),
            );
            snapshot.status = PollStatus::Ok;
            snapshot.last_error = None;
            snapshot.last_poll = Some(number);
            snapshot.last_success = Some(now);
        }
        Err(e) => {
            let status = match e {
                CollectError::EmptyResult => {
                    warn!("Poll {} returned no metrics", collector.polls());
                    PollStatus::NoMetrics
                }
                _ => {
                    error!("Poll {} failed: {}", collector.polls(), e);
                    PollStatus::Failed
                }
            };

            state.metrics.poll_duration_seconds.set(elapsed);
            state.metrics.poll_success.set(0.0);
            state
                .metrics
                .polls_total
                .with_label_values(&[e.kind()])
                .inc();
            state.health_stats.record_poll_failure(e.kind(), elapsed);

            let mut snapshot = state.snapshot.write().await;
            snapshot.status = status;
            snapshot.last_error = Some(e.to_string());
            snapshot.last_poll = Some(collector.polls());
        }
    }
}

/// Polls forever on the configured interval.
///
/// Ticks that fall due while a poll is still running are skipped, so polls
/// never overlap.
pub async fn run(state: SharedState, collector: Arc<Mutex<Collector>>) {
    let period = state.config.update_every();
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!("Polling every {}s", period.as_secs());

    loop {
        ticker.tick().await;
        let mut collector = collector.lock().await;
        poll_once(&state, &mut collector).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::CollectorMetrics;
    use crate::state::{AppState, Snapshot};
    use herakles_windows_collector::{FamilyFilter, HealthStats};
    use prometheus::Registry;
    use std::io::Write;
    use std::sync::atomic::Ordering;
    use tokio::sync::RwLock;

    fn state(config: Config) -> SharedState {
        let registry = Registry::new();
        let metrics = CollectorMetrics::new(&registry).unwrap();
        Arc::new(AppState {
            registry,
            metrics,
            snapshot: RwLock::new(Snapshot::new(config.signal_history())),
            config: Arc::new(config),
            health_stats: Arc::new(HealthStats::new()),
            source: "test".into(),
            start_time: Instant::now(),
        })
    }

    #[tokio::test]
    async fn test_successful_poll_is_published() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# TYPE windows_cpu_time_total counter").unwrap();
        writeln!(file, "windows_cpu_time_total{{core=\"0,0\",mode=\"idle\"}} 1.5").unwrap();
        writeln!(file, "windows_cpu_time_total{{core=\"0,1\",mode=\"idle\"}} 2").unwrap();

        let config = Config {
            payload_file: Some(file.path().to_path_buf()),
            ..Config::default()
        };
        let state = state(config.clone());
        let mut collector = build_collector(&config).unwrap();

        poll_once(&state, &mut collector).await;

        let snapshot = state.snapshot.read().await;
        assert_eq!(snapshot.status, PollStatus::Ok);
        assert_eq!(snapshot.metrics.get("cpu_core_0,0_time_idle"), Some(&1500));
        assert_eq!(snapshot.metrics.get("cpu_core_0,1_time_idle"), Some(&2000));
        assert_eq!(snapshot.last_poll, Some(1));

        let appeared: Vec<_> = snapshot
            .signals
            .iter()
            .filter(|r| r.family == herakles_windows_collector::Family::Cores)
            .map(|r| r.entity_id.as_str())
            .collect();
        assert_eq!(appeared, vec!["0,0", "0,1"]);
        assert_eq!(
            state.health_stats.poll_success_count.load(Ordering::Relaxed),
            1
        );
    }

    #[tokio::test]
    async fn test_failed_poll_keeps_previous_metrics() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "windows_os_processes 42").unwrap();

        let config = Config {
            payload_file: Some(file.path().to_path_buf()),
            ..Config::default()
        };
        let state = state(config);
        let fetcher = FileFetcher::new(file.path().to_path_buf());
        let mut collector = Collector::new(Box::new(fetcher), FamilyFilter::all());

        poll_once(&state, &mut collector).await;
        std::fs::write(file.path(), "windows_os_processes{ 1\n").unwrap();
        poll_once(&state, &mut collector).await;

        let snapshot = state.snapshot.read().await;
        assert_eq!(snapshot.status, PollStatus::Failed);
        assert_eq!(snapshot.metrics.get("os_processes"), Some(&42));
        assert_eq!(snapshot.last_poll, Some(2));
        assert!(snapshot.last_error.is_some());
        assert_eq!(state.health_stats.parse_errors.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_empty_payload_reports_no_metrics() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let config = Config {
            payload_file: Some(file.path().to_path_buf()),
            ..Config::default()
        };
        let state = state(config.clone());
        let mut collector = build_collector(&config).unwrap();

        poll_once(&state, &mut collector).await;

        let snapshot = state.snapshot.read().await;
        assert_eq!(snapshot.status, PollStatus::NoMetrics);
        assert_eq!(state.health_stats.empty_results.load(Ordering::Relaxed), 1);
    }
}
