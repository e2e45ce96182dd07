//! Entity families and the membership cache the lifecycle differ runs against.
//!
//! Every tracked category (CPU cores, volumes, Hyper-V switches, ...) is one
//! [`EntityFamily`]: a plain membership set of entity ids. The [`EntityCache`]
//! keeps one family per [`Family`] identifier. Families never share state.
//!
//! The cache is not synchronized. It is owned by a single `Collector` and only
//! mutated through `&mut` access, one poll at a time.

use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Identifier of an entity family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Family {
    Cores,
    Volumes,
    Nics,
    ThermalZones,
    Processes,
    Iis,
    Adcs,
    Services,
    NetFrameworkClrExceptions,
    NetFrameworkClrInterops,
    NetFrameworkClrJit,
    NetFrameworkClrLoading,
    NetFrameworkClrLocksThreads,
    NetFrameworkClrMemory,
    NetFrameworkClrRemoting,
    NetFrameworkClrSecurity,
    MssqlInstances,
    MssqlDbs,
    ExchangeWorkload,
    ExchangeLdap,
    ExchangeHttpProxy,
    HypervVmMemory,
    HypervVmDevices,
    HypervVmInterfaces,
    HypervVswitch,
    /// Exporter collectors that reported a status in the payload.
    Collectors,
    /// Metric groups that produced at least one value.
    Collection,
}

impl Family {
    /// All families, in the order signals are emitted.
    pub const ALL: [Family; 27] = [
        Family::Collection,
        Family::Collectors,
        Family::Cores,
        Family::Volumes,
        Family::Nics,
        Family::ThermalZones,
        Family::Processes,
        Family::Iis,
        Family::Adcs,
        Family::Services,
        Family::NetFrameworkClrExceptions,
        Family::NetFrameworkClrInterops,
        Family::NetFrameworkClrJit,
        Family::NetFrameworkClrLoading,
        Family::NetFrameworkClrLocksThreads,
        Family::NetFrameworkClrMemory,
        Family::NetFrameworkClrRemoting,
        Family::NetFrameworkClrSecurity,
        Family::MssqlInstances,
        Family::MssqlDbs,
        Family::ExchangeWorkload,
        Family::ExchangeLdap,
        Family::ExchangeHttpProxy,
        Family::HypervVmMemory,
        Family::HypervVmDevices,
        Family::HypervVmInterfaces,
        Family::HypervVswitch,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Family::Cores => "cores",
            Family::Volumes => "volumes",
            Family::Nics => "nics",
            Family::ThermalZones => "thermal_zones",
            Family::Processes => "processes",
            Family::Iis => "iis",
            Family::Adcs => "adcs",
            Family::Services => "services",
            Family::NetFrameworkClrExceptions => "netframework_clr_exceptions",
            Family::NetFrameworkClrInterops => "netframework_clr_interops",
            Family::NetFrameworkClrJit => "netframework_clr_jit",
            Family::NetFrameworkClrLoading => "netframework_clr_loading",
            Family::NetFrameworkClrLocksThreads => "netframework_clr_locks_threads",
            Family::NetFrameworkClrMemory => "netframework_clr_memory",
            Family::NetFrameworkClrRemoting => "netframework_clr_remoting",
            Family::NetFrameworkClrSecurity => "netframework_clr_security",
            Family::MssqlInstances => "mssql_instances",
            Family::MssqlDbs => "mssql_dbs",
            Family::ExchangeWorkload => "exchange_workload",
            Family::ExchangeLdap => "exchange_ldap",
            Family::ExchangeHttpProxy => "exchange_http_proxy",
            Family::HypervVmMemory => "hyperv_vm_memory",
            Family::HypervVmDevices => "hyperv_vm_devices",
            Family::HypervVmInterfaces => "hyperv_vm_interfaces",
            Family::HypervVswitch => "hyperv_vswitch",
            Family::Collectors => "collectors",
            Family::Collection => "collection",
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Family {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown entity family '{0}'")]
pub struct UnknownFamily(pub String);

impl FromStr for Family {
    type Err = UnknownFamily;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Family::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| UnknownFamily(s.to_string()))
    }
}

/// Set of entity ids known to exist within one family.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityFamily {
    members: HashSet<String>,
}

impl EntityFamily {
    pub fn contains(&self, id: &str) -> bool {
        self.members.contains(id)
    }

    /// Adds `id`. Adding an id that is already present is a no-op.
    pub fn mark_seen(&mut self, id: &str) {
        if !self.members.contains(id) {
            self.members.insert(id.to_string());
        }
    }

    /// Removes every member missing from `seen` and returns exactly the
    /// removed ids.
    pub fn prune(&mut self, seen: &HashSet<String>) -> HashSet<String> {
        let mut removed = HashSet::new();
        self.members.retain(|id| {
            if seen.contains(id) {
                true
            } else {
                removed.insert(id.clone());
                false
            }
        });
        removed
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Members in sorted order.
    pub fn sorted(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.members.iter().cloned().collect();
        ids.sort();
        ids
    }
}

/// One [`EntityFamily`] per [`Family`], all created empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityCache {
    families: HashMap<Family, EntityFamily>,
}

impl Default for EntityCache {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityCache {
    pub fn new() -> Self {
        let families = Family::ALL
            .into_iter()
            .map(|f| (f, EntityFamily::default()))
            .collect();
        Self { families }
    }

    pub fn family(&self, family: Family) -> Option<&EntityFamily> {
        self.families.get(&family)
    }

    pub fn family_mut(&mut self, family: Family) -> &mut EntityFamily {
        self.families.entry(family).or_default()
    }

    pub fn contains(&self, family: Family, id: &str) -> bool {
        self.family(family).is_some_and(|f| f.contains(id))
    }

    /// Total number of tracked entities across all families.
    pub fn total_len(&self) -> usize {
        self.families.values().map(EntityFamily::len).sum()
    }

    /// Sorted members of every family, for reporting.
    pub fn snapshot(&self) -> BTreeMap<Family, Vec<String>> {
        self.families
            .iter()
            .map(|(family, members)| (*family, members.sorted()))
            .collect()
    }
}

/// Per-family enable switches derived from configuration.
///
/// A disabled family is neither flattened nor diffed, so it never produces
/// lifecycle signals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FamilyFilter {
    disabled: HashSet<Family>,
}

impl FamilyFilter {
    /// Filter with every family enabled.
    pub fn all() -> Self {
        Self::default()
    }

    /// Builds a filter from optional include/exclude lists of family names.
    /// An include list enables only the named families; the exclude list then
    /// disables the named ones.
    pub fn from_lists(
        include: Option<&[String]>,
        exclude: Option<&[String]>,
    ) -> Result<Self, UnknownFamily> {
        let mut disabled = HashSet::new();

        if let Some(include) = include {
            let included = include
                .iter()
                .map(|name| name.parse::<Family>())
                .collect::<Result<HashSet<_>, _>>()?;
            disabled.extend(Family::ALL.into_iter().filter(|f| !included.contains(f)));
        }

        if let Some(exclude) = exclude {
            for name in exclude {
                disabled.insert(name.parse::<Family>()?);
            }
        }

        Ok(Self { disabled })
    }

    pub fn disable(mut self, family: Family) -> Self {
        self.disabled.insert(family);
        self
    }

    pub fn is_enabled(&self, family: Family) -> bool {
        !self.disabled.contains(&family)
    }

    pub fn enabled(&self) -> impl Iterator<Item = Family> + '_ {
        Family::ALL.into_iter().filter(|f| self.is_enabled(*f))
    }
}
