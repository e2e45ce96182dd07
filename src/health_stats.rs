//! Health statistics for the collector.
//!
//! This module tracks poll outcomes, stage timings, entity churn and HTTP
//! traffic, and renders them as the plain-text table served by `/health`.

use std::collections::VecDeque;
use std::fmt::Write as FmtWrite;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock as StdRwLock};
use std::time::{Instant, SystemTime};

const LEFT_COL: usize = 28;
const COL_W: usize = 12;

/// Running statistics for a single metric.
#[derive(Clone, Copy, Default)]
pub struct RunningStat {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
    last: f64,
}

impl RunningStat {
    pub fn add(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
            self.last = value;
            self.sum = value;
            self.count = 1;
            return;
        }
        self.count += 1;
        self.sum += value;
        self.last = value;
        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value;
        }
    }

    pub fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / (self.count as f64)
        }
    }
}

/// Thread-safe wrapper for running statistics.
#[derive(Default)]
pub struct Stat {
    inner: Mutex<RunningStat>,
}

impl Stat {
    pub fn add_sample(&self, value: f64) {
        if let Ok(mut s) = self.inner.lock() {
            s.add(value);
        }
    }

    /// (last, avg, max, min, count)
    pub fn snapshot(&self) -> (f64, f64, f64, f64, u64) {
        if let Ok(s) = self.inner.lock() {
            (s.last, s.avg(), s.max, s.min, s.count)
        } else {
            (0.0, 0.0, 0.0, 0.0, 0)
        }
    }
}

/// Thread-safe circular buffer for tracking HTTP request timestamps.
pub struct RequestTimestamps {
    inner: Mutex<VecDeque<Instant>>,
}

impl Default for RequestTimestamps {
    fn default() -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(1024)),
        }
    }
}

impl RequestTimestamps {
    pub fn record(&self) {
        if let Ok(mut guard) = self.inner.lock() {
            guard.push_back(Instant::now());
            // Keep only last 10 minutes of timestamps to avoid unbounded growth
            let cutoff = Instant::now() - std::time::Duration::from_secs(600);
            while guard.front().is_some_and(|&t| t < cutoff) {
                guard.pop_front();
            }
        }
    }

    pub fn count_last_minute(&self) -> u64 {
        if let Ok(guard) = self.inner.lock() {
            let cutoff = Instant::now() - std::time::Duration::from_secs(60);
            guard.iter().filter(|&&t| t >= cutoff).count() as u64
        } else {
            0
        }
    }
}

/// Poll and serving statistics of the collector.
pub struct HealthStats {
    // Poll outcomes
    pub total_polls: AtomicU64,
    pub poll_success_count: AtomicU64,
    pub fetch_errors: AtomicU64,
    pub parse_errors: AtomicU64,
    pub empty_results: AtomicU64,
    pub schema_mismatches: AtomicU64,

    // Poll timing breakdown
    pub poll_duration_seconds: Stat,
    pub fetch_duration_ms: Stat,
    pub parse_duration_ms: Stat,
    pub flatten_duration_ms: Stat,

    // Poll content
    pub flat_metrics: Stat,
    pub tracked_entities: Stat,
    pub appeared_total: AtomicU64,
    pub disappeared_total: AtomicU64,

    // HTTP server stats
    pub http_request_timestamps: RequestTimestamps,
    pub request_duration_ms: Stat,

    // Timing
    pub start_time: Instant,
    pub last_poll_time: StdRwLock<Option<Instant>>,
}

impl Default for HealthStats {
    fn default() -> Self {
        Self {
            total_polls: AtomicU64::new(0),
            poll_success_count: AtomicU64::new(0),
            fetch_errors: AtomicU64::new(0),
            parse_errors: AtomicU64::new(0),
            empty_results: AtomicU64::new(0),
            schema_mismatches: AtomicU64::new(0),
            poll_duration_seconds: Stat::default(),
            fetch_duration_ms: Stat::default(),
            parse_duration_ms: Stat::default(),
            flatten_duration_ms: Stat::default(),
            flat_metrics: Stat::default(),
            tracked_entities: Stat::default(),
            appeared_total: AtomicU64::new(0),
            disappeared_total: AtomicU64::new(0),
            http_request_timestamps: RequestTimestamps::default(),
            request_duration_ms: Stat::default(),
            start_time: Instant::now(),
            last_poll_time: StdRwLock::new(None),
        }
    }
}

impl HealthStats {
    pub fn new() -> Self {
        Default::default()
    }

    /// Records a successful poll.
    pub fn record_poll_success(
        &self,
        poll_duration_seconds: f64,
        flat_metrics: u64,
        tracked_entities: u64,
    ) {
        self.total_polls.fetch_add(1, Ordering::Relaxed);
        self.poll_success_count.fetch_add(1, Ordering::Relaxed);
        self.poll_duration_seconds.add_sample(poll_duration_seconds);
        self.flat_metrics.add_sample(flat_metrics as f64);
        self.tracked_entities.add_sample(tracked_entities as f64);
        self.update_last_poll_time();
    }

    /// Records a failed poll by error kind (`fetch`, `parse` or `empty`).
    pub fn record_poll_failure(&self, kind: &str, poll_duration_seconds: f64) {
        self.total_polls.fetch_add(1, Ordering::Relaxed);
        self.poll_duration_seconds.add_sample(poll_duration_seconds);
        let counter = match kind {
            "fetch" => &self.fetch_errors,
            "parse" => &self.parse_errors,
            _ => &self.empty_results,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.update_last_poll_time();
    }

    pub fn record_stage_timings(&self, fetch_ms: f64, parse_ms: f64, flatten_ms: f64) {
        self.fetch_duration_ms.add_sample(fetch_ms);
        self.parse_duration_ms.add_sample(parse_ms);
        self.flatten_duration_ms.add_sample(flatten_ms);
    }

    pub fn record_schema_mismatches(&self, count: u64) {
        self.schema_mismatches.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_signals(&self, appeared: u64, disappeared: u64) {
        self.appeared_total.fetch_add(appeared, Ordering::Relaxed);
        self.disappeared_total.fetch_add(disappeared, Ordering::Relaxed);
    }

    pub fn record_http_request(&self) {
        self.http_request_timestamps.record();
    }

    pub fn record_request_duration(&self, duration_ms: f64) {
        self.request_duration_ms.add_sample(duration_ms);
    }

    pub fn update_last_poll_time(&self) {
        if let Ok(mut guard) = self.last_poll_time.write() {
            *guard = Some(Instant::now());
        }
    }

    pub fn failed_polls(&self) -> u64 {
        self.fetch_errors.load(Ordering::Relaxed)
            + self.parse_errors.load(Ordering::Relaxed)
            + self.empty_results.load(Ordering::Relaxed)
    }

    pub fn get_poll_success_rate(&self) -> f64 {
        let success = self.poll_success_count.load(Ordering::Relaxed);
        let total = success + self.failed_polls();
        if total == 0 {
            100.0
        } else {
            (success as f64 / total as f64) * 100.0
        }
    }

    pub fn get_uptime_hours(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64() / 3600.0
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn get_last_poll_time_str(&self) -> String {
        const SECS_PER_DAY: u64 = 86400;
        const SECS_PER_HOUR: u64 = 3600;
        const SECS_PER_MINUTE: u64 = 60;

        if let Ok(guard) = self.last_poll_time.read() {
            if let Some(last_poll) = *guard {
                let elapsed_since_poll = last_poll.elapsed();
                let now = SystemTime::now();
                if let Ok(duration) = now.duration_since(SystemTime::UNIX_EPOCH) {
                    let poll_time_secs = duration
                        .as_secs()
                        .saturating_sub(elapsed_since_poll.as_secs());
                    let hours = (poll_time_secs % SECS_PER_DAY) / SECS_PER_HOUR;
                    let minutes = (poll_time_secs % SECS_PER_HOUR) / SECS_PER_MINUTE;
                    let seconds = poll_time_secs % SECS_PER_MINUTE;
                    return format!("{:02}:{:02}:{:02}", hours, minutes, seconds);
                }
            }
        }
        "N/A".to_string()
    }

    pub fn render_table(&self) -> String {
        let mut out = String::new();

        writeln!(out, "HEALTH ENDPOINT - COLLECTOR INTERNAL STATS").ok();
        writeln!(out, "===========================================").ok();
        writeln!(out).ok();
        writeln!(
            out,
            "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
            "",
            "current",
            "average",
            "max",
            "min",
            left = LEFT_COL,
            col = COL_W
        )
        .ok();

        section(&mut out, "POLLS");
        stat_row(&mut out, "poll_duration (s)", &self.poll_duration_seconds, 3);
        let rate = self.get_poll_success_rate();
        writeln!(
            out,
            "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
            "poll_success_rate (%)",
            format!("{:.1}", rate),
            format!("{:.1}", rate),
            format!("{:.1}", rate),
            format!("{:.1}", rate),
            left = LEFT_COL,
            col = COL_W
        )
        .ok();
        stat_row(&mut out, "flat_metrics", &self.flat_metrics, 0);
        stat_row(&mut out, "tracked_entities", &self.tracked_entities, 0);

        section(&mut out, "ENTITY LIFECYCLE");
        counter_row(&mut out, "appeared_total", &self.appeared_total);
        counter_row(&mut out, "disappeared_total", &self.disappeared_total);

        section(&mut out, "ERROR TRACKING");
        counter_row(&mut out, "fetch_errors", &self.fetch_errors);
        counter_row(&mut out, "parse_errors", &self.parse_errors);
        counter_row(&mut out, "empty_results", &self.empty_results);
        counter_row(&mut out, "schema_mismatches", &self.schema_mismatches);

        section(&mut out, "TIMING BREAKDOWN (ms)");
        stat_row(&mut out, "fetch_duration", &self.fetch_duration_ms, 1);
        stat_row(&mut out, "parse_duration", &self.parse_duration_ms, 1);
        stat_row(&mut out, "flatten_duration", &self.flatten_duration_ms, 1);

        section(&mut out, "HTTP SERVER");
        writeln!(
            out,
            "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
            "http_requests_last_minute",
            self.http_request_timestamps.count_last_minute(),
            "N/A",
            "N/A",
            "N/A",
            left = LEFT_COL,
            col = COL_W
        )
        .ok();
        stat_row(&mut out, "request_duration (ms)", &self.request_duration_ms, 1);

        writeln!(out).ok();
        writeln!(
            out,
            "number of polls: {} | last poll: {} | uptime: {:.1}h",
            self.total_polls.load(Ordering::Relaxed),
            self.get_last_poll_time_str(),
            self.get_uptime_hours()
        )
        .ok();

        out
    }
}

fn section(out: &mut String, title: &str) {
    writeln!(out).ok();
    writeln!(out, "{}", title).ok();
    writeln!(out, "{}", "-".repeat(title.len())).ok();
}

fn stat_row(out: &mut String, name: &str, stat: &Stat, precision: usize) {
    let (cur, avg, max, min, _) = stat.snapshot();
    writeln!(
        out,
        "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
        name,
        format!("{:.p$}", cur, p = precision),
        format!("{:.p$}", avg, p = precision.max(1)),
        format!("{:.p$}", max, p = precision),
        format!("{:.p$}", min, p = precision),
        left = LEFT_COL,
        col = COL_W
    )
    .ok();
}

fn counter_row(out: &mut String, name: &str, counter: &AtomicU64) {
    writeln!(
        out,
        "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
        name,
        counter.load(Ordering::Relaxed),
        "N/A",
        "N/A",
        "N/A",
        left = LEFT_COL,
        col = COL_W
    )
    .ok();
}
