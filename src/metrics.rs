//! Prometheus self-telemetry for herakles-windows-collector.
//!
//! These metrics describe the collector itself (poll timing, outcomes,
//! tracked entities and lifecycle churn), not the Windows host.

use herakles_windows_collector::{EntityCache, Family, LifecycleSignal};
use prometheus::{CounterVec, Gauge, GaugeVec, Opts, Registry};

/// Collection of collector self-telemetry metrics.
#[derive(Clone)]
pub struct CollectorMetrics {
    // ========== Poll Metrics ==========
    pub poll_duration_seconds: Gauge,
    pub poll_success: Gauge,
    pub polls_total: CounterVec, // labels: outcome
    pub stage_duration_seconds: GaugeVec, // labels: stage

    // ========== Output Metrics ==========
    pub flat_metrics: Gauge,
    pub schema_mismatches_total: CounterVec, // labels: metric

    // ========== Entity Metrics ==========
    pub tracked_entities: GaugeVec, // labels: family
    pub lifecycle_signals_total: CounterVec, // labels: family, kind
}

impl CollectorMetrics {
    /// Creates and registers all telemetry metrics with the registry.
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let poll_duration_seconds = Gauge::new(
            "herakles_collector_poll_duration_seconds",
            "Duration of the last poll (fetch, parse, flatten and diff)",
        )?;
        let poll_success = Gauge::new(
            "herakles_collector_poll_success",
            "Whether the last poll was successful (1) or failed (0)",
        )?;
        let polls_total = CounterVec::new(
            Opts::new(
                "herakles_collector_polls_total",
                "Polls by outcome (ok, fetch, parse, empty)",
            ),
            &["outcome"],
        )?;
        let stage_duration_seconds = GaugeVec::new(
            Opts::new(
                "herakles_collector_stage_duration_seconds",
                "Duration of each stage of the last successful poll",
            ),
            &["stage"],
        )?;
        let flat_metrics = Gauge::new(
            "herakles_collector_flat_metrics",
            "Number of flattened metrics in the last successful poll",
        )?;
        let schema_mismatches_total = CounterVec::new(
            Opts::new(
                "herakles_collector_schema_mismatches_total",
                "Metric families skipped because a required label was missing",
            ),
            &["metric"],
        )?;
        let tracked_entities = GaugeVec::new(
            Opts::new(
                "herakles_collector_tracked_entities",
                "Entities currently known per family",
            ),
            &["family"],
        )?;
        let lifecycle_signals_total = CounterVec::new(
            Opts::new(
                "herakles_collector_lifecycle_signals_total",
                "Lifecycle signals emitted per family and kind",
            ),
            &["family", "kind"],
        )?;

        registry.register(Box::new(poll_duration_seconds.clone()))?;
        registry.register(Box::new(poll_success.clone()))?;
        registry.register(Box::new(polls_total.clone()))?;
        registry.register(Box::new(stage_duration_seconds.clone()))?;
        registry.register(Box::new(flat_metrics.clone()))?;
        registry.register(Box::new(schema_mismatches_total.clone()))?;
        registry.register(Box::new(tracked_entities.clone()))?;
        registry.register(Box::new(lifecycle_signals_total.clone()))?;

        Ok(Self {
            poll_duration_seconds,
            poll_success,
            polls_total,
            stage_duration_seconds,
            flat_metrics,
            schema_mismatches_total,
            tracked_entities,
            lifecycle_signals_total,
        })
    }

    /// Sets the per-family entity gauges from the cache.
    pub fn observe_entities(&self, cache: &EntityCache) {
        for family in Family::ALL {
            let len = cache.family(family).map_or(0, |f| f.len());
            self.tracked_entities
                .with_label_values(&[family.as_str()])
                .set(len as f64);
        }
    }

    pub fn observe_signals(&self, signals: &[LifecycleSignal]) {
        for signal in signals {
            let kind = signal.kind.to_string();
            self.lifecycle_signals_total
                .with_label_values(&[signal.family.as_str(), kind.as_str()])
                .inc();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::{Encoder, TextEncoder};

    fn render(registry: &Registry) -> String {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&registry.gather(), &mut buffer)
            .unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn test_signals_counted_by_family_and_kind() {
        let registry = Registry::new();
        let metrics = CollectorMetrics::new(&registry).unwrap();

        metrics.observe_signals(&[
            LifecycleSignal::appeared(Family::Cores, "0,0"),
            LifecycleSignal::appeared(Family::Cores, "0,1"),
            LifecycleSignal::disappeared(Family::Nics, "eth0"),
        ]);

        let text = render(&registry);
        assert!(text.contains(
            r#"herakles_collector_lifecycle_signals_total{family="cores",kind="appeared"} 2"#
        ));
        assert!(text.contains(
            r#"herakles_collector_lifecycle_signals_total{family="nics",kind="disappeared"} 1"#
        ));
    }

    #[test]
    fn test_entities_gauge_covers_every_family() {
        let registry = Registry::new();
        let metrics = CollectorMetrics::new(&registry).unwrap();

        let mut cache = EntityCache::new();
        cache.family_mut(Family::Volumes).mark_seen("C:");
        metrics.observe_entities(&cache);

        let text = render(&registry);
        assert!(text.contains(r#"herakles_collector_tracked_entities{family="volumes"} 1"#));
        assert!(text.contains(r#"herakles_collector_tracked_entities{family="cores"} 0"#));
        assert_eq!(
            text.matches("herakles_collector_tracked_entities{").count(),
            Family::ALL.len()
        );
    }
}
