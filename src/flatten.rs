//! Metric flattener: labeled samples → composite key / integer value.
//!
//! Alongside the flat mapping, the same pass records which entity ids were
//! observed for every family, which is what the lifecycle differ consumes.

use ahash::AHashMap as HashMap;
use tracing::{debug, warn};

use crate::entity::{Family, FamilyFilter};
use crate::exposition::{MetricFamily, Sample};
use crate::lifecycle::SeenSets;
use crate::schema::{metric_group, schema_for, Aggregation, MetricSchema, METRIC_PREFIX};

/// A metric family whose samples do not carry the labels its schema needs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("metric '{metric}' is missing required label '{label}'")]
pub struct SchemaMismatchError {
    pub metric: String,
    pub label: &'static str,
}

/// Result of flattening one poll.
#[derive(Debug, Default)]
pub struct Flattened {
    pub metrics: HashMap<String, i64>,
    pub seen: SeenSets,
    pub mismatches: Vec<SchemaMismatchError>,
}

/// Values and entity ids of one metric family, committed only if the whole
/// family flattened cleanly.
struct Staged<'a> {
    values: Vec<(String, i64)>,
    entities: Vec<String>,
    schema: Option<&'a MetricSchema>,
}

/// Flattens the parsed families of one poll.
///
/// Only `windows_*` metrics are considered. A metric family whose schema
/// labels are missing is skipped as a whole and reported in
/// [`Flattened::mismatches`]; the remaining families are unaffected.
pub fn flatten(families: &[MetricFamily], filter: &FamilyFilter) -> Flattened {
    let mut out = Flattened::default();

    for family in families {
        let Some(group) = metric_group(&family.name) else {
            debug!("Skipping non-exporter metric {}", family.name);
            continue;
        };

        let schema = schema_for(&family.name);
        if let Some(schema) = schema {
            if !filter.is_enabled(schema.family) {
                debug!(
                    "Skipping {}: family {} disabled",
                    family.name, schema.family
                );
                continue;
            }
        }

        let staged = match stage_family(family, schema) {
            Ok(staged) => staged,
            Err(mismatch) => {
                warn!("Skipping metric family: {}", mismatch);
                out.mismatches.push(mismatch);
                continue;
            }
        };

        if staged.values.is_empty() {
            continue;
        }

        commit(&mut out, staged);

        if filter.is_enabled(Family::Collection) {
            out.seen
                .entry(Family::Collection)
                .or_default()
                .insert(group.to_string());
        }
    }

    out
}

fn stage_family<'a>(
    family: &MetricFamily,
    schema: Option<&'a MetricSchema>,
) -> Result<Staged<'a>, SchemaMismatchError> {
    let mut staged = Staged {
        values: Vec::with_capacity(family.samples.len()),
        entities: Vec::new(),
        schema,
    };

    for sample in &family.samples {
        if !sample.value.is_finite() {
            debug!(
                "Skipping non-finite sample {}{:?}: {}",
                sample.name, sample.labels, sample.value
            );
            continue;
        }

        match schema {
            Some(schema) => {
                // _sum/_count/_bucket series have no schema of their own
                if sample.name != family.name {
                    continue;
                }
                let Some((key, entity_id)) = schema_key(schema, sample)? else {
                    debug!(
                        "Skipping {}{:?}: empty entity label",
                        sample.name, sample.labels
                    );
                    continue;
                };
                let value = (sample.value * schema.multiplier as f64) as i64;
                staged.values.push((key, value));
                staged.entities.push(entity_id);
            }
            None => {
                staged
                    .values
                    .push((generic_key(sample), sample.value as i64));
            }
        }
    }

    Ok(staged)
}

fn commit(out: &mut Flattened, staged: Staged<'_>) {
    let aggregation = staged
        .schema
        .map(|s| s.aggregation)
        .unwrap_or(Aggregation::Last);

    for (key, value) in staged.values {
        match aggregation {
            Aggregation::Sum => {
                let total = out.metrics.entry(key).or_insert(0);
                *total = total.saturating_add(value);
            }
            Aggregation::Last => {
                if let Some(previous) = out.metrics.insert(key, value) {
                    debug!("Duplicate flat metric key, replaced value {}", previous);
                }
            }
        }
    }

    if let Some(schema) = staged.schema {
        out.seen
            .entry(schema.family)
            .or_default()
            .extend(staged.entities);
    }
}

/// Composite key and entity id of a sample under `schema`.
///
/// A missing label is a mismatch for the whole metric family. A label that
/// is present but empty yields `None`: the sample has no usable identity
/// and is skipped on its own.
fn schema_key(
    schema: &MetricSchema,
    sample: &Sample,
) -> Result<Option<(String, String)>, SchemaMismatchError> {
    let mut ids = Vec::with_capacity(schema.entity_labels.len());
    for &label in schema.entity_labels {
        ids.push(require(schema, sample, label)?);
    }

    let dimension = match schema.dimension {
        Some(label) => require(schema, sample, label)?,
        None => "",
    };

    if ids.iter().any(|id| id.is_empty()) || (schema.dimension.is_some() && dimension.is_empty())
    {
        return Ok(None);
    }

    let entity_id = ids.join("_");
    let key = join_key(&[schema.prefix, entity_id.as_str(), schema.suffix, dimension]);
    Ok(Some((key, entity_id)))
}

fn require<'s>(
    schema: &MetricSchema,
    sample: &'s Sample,
    label: &'static str,
) -> Result<&'s str, SchemaMismatchError> {
    sample.label(label).ok_or_else(|| SchemaMismatchError {
        metric: schema.metric.to_string(),
        label,
    })
}

/// Key for metrics without a schema: the sample name minus `windows_`,
/// followed by the full label set in exposition notation ordered by label
/// name (`os_info{product="Windows Server",version="10.0"}`). Values are
/// escaped, so two distinct series never share a key.
fn generic_key(sample: &Sample) -> String {
    let base = sample
        .name
        .strip_prefix(METRIC_PREFIX)
        .unwrap_or(&sample.name);

    if sample.labels.is_empty() {
        return base.to_string();
    }

    let mut key = String::with_capacity(base.len() + 16 * sample.labels.len());
    key.push_str(base);
    key.push('{');
    for (i, (name, value)) in sample.labels.iter().enumerate() {
        if i > 0 {
            key.push(',');
        }
        key.push_str(name);
        key.push_str("=\"");
        for c in value.chars() {
            match c {
                '\\' => key.push_str("\\\\"),
                '"' => key.push_str("\\\""),
                '\n' => key.push_str("\\n"),
                c => key.push(c),
            }
        }
        key.push('"');
    }
    key.push('}');
    key
}

fn join_key(parts: &[&str]) -> String {
    let mut key = String::new();
    for part in parts.iter().filter(|p| !p.is_empty()) {
        if !key.is_empty() {
            key.push('_');
        }
        key.push_str(part);
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exposition::parse;

    fn flatten_text(text: &str) -> Flattened {
        flatten(&parse(text).unwrap(), &FamilyFilter::all())
    }

    fn seen_ids(flat: &Flattened, family: Family) -> Vec<String> {
        let mut ids: Vec<String> = flat
            .seen
            .get(&family)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    #[test]
    fn test_flatten_keys_on_entity_and_dimension() {
        let flat = flatten_text(
            "windows_cpu_time_total{core=\"0,0\",mode=\"idle\"} 12.5\n\
             windows_cpu_time_total{core=\"0,1\",mode=\"idle\"} 3\n",
        );

        assert_eq!(flat.metrics.get("cpu_core_0,0_time_idle"), Some(&12_500));
        assert_eq!(flat.metrics.get("cpu_core_0,1_time_idle"), Some(&3_000));
        assert_eq!(seen_ids(&flat, Family::Cores), vec!["0,0", "0,1"]);
        assert_eq!(seen_ids(&flat, Family::Collection), vec!["cpu"]);
    }

    #[test]
    fn test_flatten_multi_label_entity_id() {
        let flat = flatten_text(
            "windows_mssql_databases_active_transactions{mssql_instance=\"SQLEXPRESS\",database=\"master\"} 4\n",
        );
        assert_eq!(
            flat.metrics.get("mssql_db_SQLEXPRESS_master_active_transactions"),
            Some(&4)
        );
        assert_eq!(seen_ids(&flat, Family::MssqlDbs), vec!["SQLEXPRESS_master"]);
    }

    #[test]
    fn test_flatten_sums_processes_sharing_a_name() {
        let flat = flatten_text(
            "windows_process_handles{process=\"svchost\",process_id=\"100\"} 10\n\
             windows_process_handles{process=\"svchost\",process_id=\"200\"} 15\n",
        );
        assert_eq!(flat.metrics.get("process_svchost_handles"), Some(&25));
        assert_eq!(seen_ids(&flat, Family::Processes), vec!["svchost"]);
    }

    #[test]
    fn test_flatten_generic_metrics() {
        let flat = flatten_text(
            "windows_os_processes 143\n\
             windows_cs_logical_processors 8\n\
             windows_os_info{product=\"Windows Server\",version=\"10.0\"} 1\n\
             go_goroutines 12\n",
        );

        assert_eq!(flat.metrics.get("os_processes"), Some(&143));
        assert_eq!(flat.metrics.get("cs_logical_processors"), Some(&8));
        assert_eq!(
            flat.metrics
                .get("os_info{product=\"Windows Server\",version=\"10.0\"}"),
            Some(&1)
        );
        assert!(!flat.metrics.contains_key("go_goroutines"));
        assert_eq!(seen_ids(&flat, Family::Collection), vec!["cs", "os"]);
    }

    #[test]
    fn test_schema_mismatch_skips_only_that_family() {
        let flat = flatten_text(
            "windows_logical_disk_free_bytes{volume=\"C:\"} 100\n\
             windows_logical_disk_free_bytes{disk=\"D:\"} 200\n\
             windows_net_bytes_sent_total{nic=\"eth0\"} 7\n",
        );

        assert_eq!(
            flat.mismatches,
            vec![SchemaMismatchError {
                metric: "windows_logical_disk_free_bytes".into(),
                label: "volume",
            }]
        );
        assert!(!flat.metrics.contains_key("logical_disk_C:_free_space"));
        assert!(seen_ids(&flat, Family::Volumes).is_empty());
        assert_eq!(flat.metrics.get("net_nic_eth0_bytes_sent"), Some(&7));
    }

    #[test]
    fn test_flatten_skips_non_finite_values() {
        let flat = flatten_text(
            "windows_thermalzone_temperature_celsius{name=\"tz0\"} NaN\n\
             windows_thermalzone_temperature_celsius{name=\"tz1\"} 41\n",
        );
        assert_eq!(flat.metrics.len(), 1);
        assert_eq!(seen_ids(&flat, Family::ThermalZones), vec!["tz1"]);
    }

    #[test]
    fn test_flatten_respects_disabled_family() {
        let families =
            parse("windows_service_state{name=\"dhcp\",state=\"running\"} 1\n").unwrap();
        let filter = FamilyFilter::all().disable(Family::Services);

        let flat = flatten(&families, &filter);
        assert!(flat.metrics.is_empty());
        assert!(flat.seen.is_empty());
    }

    #[test]
    fn test_generic_keys_keep_distinct_series_apart() {
        let flat = flatten_text(
            "windows_foo{a=\"x\"} 1\n\
             windows_foo{b=\"x\"} 2\n\
             windows_bar{a=\"\"} 3\n\
             windows_bar 4\n\
             windows_baz{a=\"x,b=\\\"y\"} 5\n\
             windows_baz{a=\"x\",b=\"y\"} 6\n",
        );

        assert_eq!(flat.metrics.len(), 6);
        assert_eq!(flat.metrics.get("foo{a=\"x\"}"), Some(&1));
        assert_eq!(flat.metrics.get("foo{b=\"x\"}"), Some(&2));
        assert_eq!(flat.metrics.get("bar{a=\"\"}"), Some(&3));
        assert_eq!(flat.metrics.get("bar"), Some(&4));
        assert_eq!(flat.metrics.get("baz{a=\"x,b=\\\"y\"}"), Some(&5));
        assert_eq!(flat.metrics.get("baz{a=\"x\",b=\"y\"}"), Some(&6));
    }

    #[test]
    fn test_summed_values_saturate_at_i64_bounds() {
        let flat = flatten_text(
            "windows_process_handles{process=\"a\",process_id=\"1\"} 9e18\n\
             windows_process_handles{process=\"a\",process_id=\"2\"} 9e18\n\
             windows_process_handles{process=\"b\",process_id=\"3\"} -9e18\n\
             windows_process_handles{process=\"b\",process_id=\"4\"} -9e18\n",
        );

        assert_eq!(flat.metrics.get("process_a_handles"), Some(&i64::MAX));
        assert_eq!(flat.metrics.get("process_b_handles"), Some(&i64::MIN));
    }

    #[test]
    fn test_empty_entity_label_skips_only_that_sample() {
        let flat = flatten_text(
            "windows_logical_disk_free_bytes{volume=\"\"} 100\n\
             windows_logical_disk_free_bytes{volume=\"C:\"} 200\n\
             windows_cpu_time_total{core=\"0,0\",mode=\"\"} 1\n",
        );

        assert!(flat.mismatches.is_empty());
        assert_eq!(seen_ids(&flat, Family::Volumes), vec!["C:"]);
        assert_eq!(flat.metrics.get("logical_disk_C:_free_space"), Some(&200));
        assert!(!flat.metrics.contains_key("logical_disk_free_space"));
        assert!(seen_ids(&flat, Family::Cores).is_empty());
        assert_eq!(seen_ids(&flat, Family::Collection), vec!["logical_disk"]);
    }

    #[test]
    fn test_collection_uses_exporter_collector_names() {
        let flat = flatten_text(
            "windows_logical_disk_free_bytes{volume=\"C:\"} 1\n\
             windows_netframework_clrjit_jit_methods_total{process=\"w3wp\"} 2\n\
             windows_physical_disk_reads_total{disk=\"0\"} 3\n",
        );

        assert_eq!(
            seen_ids(&flat, Family::Collection),
            vec!["logical_disk", "netframework_clrjit", "physical_disk"]
        );
    }

    #[test]
    fn test_flatten_empty_family_records_nothing() {
        let flat = flatten_text("# TYPE windows_iis_current_connections gauge\n");
        assert!(flat.metrics.is_empty());
        assert!(flat.seen.is_empty());
    }
}
