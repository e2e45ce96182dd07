//! Lifecycle differ: turns per-poll entity observations into chart
//! create/retire signals.

use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use serde::Serialize;
use std::fmt;
use tracing::{debug, info};

use crate::entity::{EntityCache, Family, FamilyFilter};

/// Entity ids observed in one poll, per family.
pub type SeenSets = HashMap<Family, HashSet<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    Appeared,
    Disappeared,
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalKind::Appeared => f.write_str("appeared"),
            SignalKind::Disappeared => f.write_str("disappeared"),
        }
    }
}

/// An entity was seen for the first time, or is confirmed gone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct LifecycleSignal {
    pub family: Family,
    pub entity_id: String,
    pub kind: SignalKind,
}

impl LifecycleSignal {
    pub fn appeared(family: Family, entity_id: impl Into<String>) -> Self {
        Self {
            family,
            entity_id: entity_id.into(),
            kind: SignalKind::Appeared,
        }
    }

    pub fn disappeared(family: Family, entity_id: impl Into<String>) -> Self {
        Self {
            family,
            entity_id: entity_id.into(),
            kind: SignalKind::Disappeared,
        }
    }
}

/// Applies one successful poll's observations to the cache.
///
/// New ids of every enabled family are reported first, then every cached id
/// missing from the poll is pruned and reported. A family absent from `seen`
/// counts as observed empty, so all of its members disappear. Disabled
/// families are left alone. Ids are reported in sorted order within a family.
pub fn diff(
    cache: &mut EntityCache,
    seen: &SeenSets,
    filter: &FamilyFilter,
) -> Vec<LifecycleSignal> {
    let empty = HashSet::new();
    let mut signals = Vec::new();

    for family in filter.enabled() {
        let observed = seen.get(&family).unwrap_or(&empty);
        let members = cache.family_mut(family);

        let mut fresh: Vec<&String> = observed.iter().filter(|id| !members.contains(id)).collect();
        fresh.sort();
        for id in fresh {
            debug!(family = %family, entity = %id, "entity appeared");
            signals.push(LifecycleSignal::appeared(family, id.as_str()));
            members.mark_seen(id);
        }
    }

    for family in filter.enabled() {
        let observed = seen.get(&family).unwrap_or(&empty);
        let mut removed: Vec<String> = cache.family_mut(family).prune(observed).into_iter().collect();
        removed.sort();
        for id in removed {
            debug!(family = %family, entity = %id, "entity disappeared");
            signals.push(LifecycleSignal::disappeared(family, id));
        }
    }

    if !signals.is_empty() {
        let appeared = signals
            .iter()
            .filter(|s| s.kind == SignalKind::Appeared)
            .count();
        info!(
            "Entity lifecycle: {} appeared, {} disappeared",
            appeared,
            signals.len() - appeared
        );
    }

    signals
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seen(entries: &[(Family, &[&str])]) -> SeenSets {
        entries
            .iter()
            .map(|(family, ids)| (*family, ids.iter().map(|s| s.to_string()).collect()))
            .collect()
    }

    #[test]
    fn test_first_sight_emits_appeared_once() {
        let mut cache = EntityCache::new();
        let filter = FamilyFilter::all();
        let poll = seen(&[(Family::Cores, &["1", "0"])]);

        let signals = diff(&mut cache, &poll, &filter);
        assert_eq!(
            signals,
            vec![
                LifecycleSignal::appeared(Family::Cores, "0"),
                LifecycleSignal::appeared(Family::Cores, "1"),
            ]
        );

        assert!(diff(&mut cache, &poll, &filter).is_empty());
    }

    #[test]
    fn test_missing_entity_emits_disappeared_once() {
        let mut cache = EntityCache::new();
        let filter = FamilyFilter::all();

        diff(&mut cache, &seen(&[(Family::Nics, &["eth0", "eth1"])]), &filter);
        let signals = diff(&mut cache, &seen(&[(Family::Nics, &["eth0"])]), &filter);
        assert_eq!(signals, vec![LifecycleSignal::disappeared(Family::Nics, "eth1")]);

        let signals = diff(&mut cache, &seen(&[(Family::Nics, &["eth0"])]), &filter);
        assert!(signals.is_empty());
    }

    #[test]
    fn test_family_without_samples_empties_out() {
        let mut cache = EntityCache::new();
        let filter = FamilyFilter::all();

        diff(
            &mut cache,
            &seen(&[(Family::Volumes, &["C:", "D:", "E:"])]),
            &filter,
        );
        let signals = diff(&mut cache, &SeenSets::new(), &filter);

        assert_eq!(signals.len(), 3);
        assert!(signals.iter().all(|s| s.kind == SignalKind::Disappeared));
        assert!(cache.family(Family::Volumes).unwrap().is_empty());
    }

    #[test]
    fn test_appeared_signals_precede_disappeared() {
        let mut cache = EntityCache::new();
        let filter = FamilyFilter::all();

        diff(&mut cache, &seen(&[(Family::Services, &["dhcp"])]), &filter);
        let signals = diff(&mut cache, &seen(&[(Family::Cores, &["0"])]), &filter);

        assert_eq!(
            signals,
            vec![
                LifecycleSignal::appeared(Family::Cores, "0"),
                LifecycleSignal::disappeared(Family::Services, "dhcp"),
            ]
        );
    }

    #[test]
    fn test_disabled_family_is_never_diffed() {
        let mut cache = EntityCache::new();
        let filter = FamilyFilter::all().disable(Family::Processes);

        let signals = diff(&mut cache, &seen(&[(Family::Processes, &["svchost"])]), &filter);
        assert!(signals.is_empty());
        assert!(!cache.contains(Family::Processes, "svchost"));
    }
}
