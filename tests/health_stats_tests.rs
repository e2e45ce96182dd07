//! Integration tests for health stats module.
//!
//! These tests verify that HealthStats tracks poll outcomes, stage timings
//! and entity churn, and that the rendered table reports them.

use herakles_windows_collector::health_stats::HealthStats;
use std::sync::atomic::Ordering;
use std::sync::Arc;

#[test]
fn test_health_stats_initialize_empty() {
    let stats = HealthStats::new();

    assert_eq!(stats.total_polls.load(Ordering::Relaxed), 0);
    assert_eq!(stats.failed_polls(), 0);
    assert_eq!(stats.get_poll_success_rate(), 100.0);
    assert_eq!(stats.get_last_poll_time_str(), "N/A");

    let (cur, avg, _, _, count) = stats.poll_duration_seconds.snapshot();
    assert_eq!(count, 0);
    assert_eq!(cur, 0.0);
    assert_eq!(avg, 0.0);
}

#[test]
fn test_poll_outcomes_are_counted_by_kind() {
    let stats = HealthStats::new();

    stats.record_poll_success(0.12, 350, 40);
    stats.record_poll_success(0.08, 352, 41);
    stats.record_poll_failure("fetch", 5.0);
    stats.record_poll_failure("parse", 0.01);
    stats.record_poll_failure("empty", 0.02);

    assert_eq!(stats.total_polls.load(Ordering::Relaxed), 5);
    assert_eq!(stats.poll_success_count.load(Ordering::Relaxed), 2);
    assert_eq!(stats.fetch_errors.load(Ordering::Relaxed), 1);
    assert_eq!(stats.parse_errors.load(Ordering::Relaxed), 1);
    assert_eq!(stats.empty_results.load(Ordering::Relaxed), 1);
    assert_eq!(stats.failed_polls(), 3);
    assert!((stats.get_poll_success_rate() - 40.0).abs() < 1e-9);

    let (last, _, max, min, count) = stats.flat_metrics.snapshot();
    assert_eq!(count, 2);
    assert_eq!(last, 352.0);
    assert_eq!(max, 352.0);
    assert_eq!(min, 350.0);

    let (_, _, max, _, count) = stats.poll_duration_seconds.snapshot();
    assert_eq!(count, 5);
    assert_eq!(max, 5.0);
    assert_ne!(stats.get_last_poll_time_str(), "N/A");
}

#[test]
fn test_signals_and_mismatches_accumulate() {
    let stats = HealthStats::new();

    stats.record_signals(12, 0);
    stats.record_signals(1, 3);
    stats.record_schema_mismatches(2);

    assert_eq!(stats.appeared_total.load(Ordering::Relaxed), 13);
    assert_eq!(stats.disappeared_total.load(Ordering::Relaxed), 3);
    assert_eq!(stats.schema_mismatches.load(Ordering::Relaxed), 2);
}

#[test]
fn test_render_table_contains_sections() {
    let stats = HealthStats::new();
    stats.record_poll_success(0.1, 100, 10);
    stats.record_stage_timings(80.0, 15.0, 5.0);
    stats.record_http_request();
    stats.record_request_duration(1.5);

    let table = stats.render_table();

    assert!(table.contains("HEALTH ENDPOINT - COLLECTOR INTERNAL STATS"));
    assert!(table.contains("POLLS"));
    assert!(table.contains("ENTITY LIFECYCLE"));
    assert!(table.contains("ERROR TRACKING"));
    assert!(table.contains("TIMING BREAKDOWN (ms)"));
    assert!(table.contains("HTTP SERVER"));
    assert!(table.contains("fetch_duration"));
    assert!(table.contains("number of polls: 1"));
}

#[test]
fn test_health_stats_thread_safety() {
    let stats = Arc::new(HealthStats::new());
    let mut handles = vec![];

    for i in 0..10 {
        let stats_clone = Arc::clone(&stats);
        let handle = std::thread::spawn(move || {
            for j in 0..100 {
                if j % 4 == 0 {
                    stats_clone.record_poll_failure("fetch", 0.5);
                } else {
                    stats_clone.record_poll_success(0.1, (i * 100 + j) as u64, 10);
                }
                stats_clone.record_signals(1, 1);
                stats_clone.record_http_request();
            }
        });
        handles.push(handle);
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(stats.total_polls.load(Ordering::Relaxed), 1000);
    assert_eq!(stats.fetch_errors.load(Ordering::Relaxed), 250);
    assert_eq!(stats.poll_success_count.load(Ordering::Relaxed), 750);
    assert_eq!(stats.appeared_total.load(Ordering::Relaxed), 1000);
    assert_eq!(stats.http_request_timestamps.count_last_minute(), 1000);
}
