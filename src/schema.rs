//! Key schemas for the metrics exposed by `windows_exporter`.
//!
//! A [`MetricSchema`] tells the flattener which labels identify the entity a
//! sample belongs to, which label (if any) is a sub-dimension, and how the
//! composite key is spelled. Metrics without a schema are flattened
//! generically and feed no entity family.

use ahash::AHashMap as HashMap;
use once_cell::sync::Lazy;

use crate::entity::Family;

/// Prefix every exporter metric carries.
pub const METRIC_PREFIX: &str = "windows_";

/// How repeated writes to the same composite key combine within one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    /// Last write wins.
    Last,
    /// Values are added up (e.g. several processes sharing one name).
    Sum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricSchema {
    pub metric: &'static str,
    pub family: Family,
    pub prefix: &'static str,
    /// Labels whose values, joined with `_`, form the entity id.
    pub entity_labels: &'static [&'static str],
    pub dimension: Option<&'static str>,
    pub suffix: &'static str,
    pub multiplier: i64,
    pub aggregation: Aggregation,
}

impl MetricSchema {
    const fn new(
        metric: &'static str,
        family: Family,
        prefix: &'static str,
        entity_labels: &'static [&'static str],
        suffix: &'static str,
    ) -> Self {
        Self {
            metric,
            family,
            prefix,
            entity_labels,
            dimension: None,
            suffix,
            multiplier: 1,
            aggregation: Aggregation::Last,
        }
    }

    const fn by(self, dimension: &'static str) -> Self {
        Self {
            dimension: Some(dimension),
            ..self
        }
    }

    /// Seconds are kept with millisecond precision.
    const fn millis(self) -> Self {
        Self {
            multiplier: 1000,
            ..self
        }
    }

    const fn summed(self) -> Self {
        Self {
            aggregation: Aggregation::Sum,
            ..self
        }
    }

    /// Labels a sample must carry for this schema to apply.
    pub fn required_labels(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entity_labels.iter().copied().chain(self.dimension)
    }
}

const CORE: &[&str] = &["core"];
const VOLUME: &[&str] = &["volume"];
const NIC: &[&str] = &["nic"];
const ZONE: &[&str] = &["name"];
const PROCESS: &[&str] = &["process"];
const SITE: &[&str] = &["site"];
const TEMPLATE: &[&str] = &["cert_template"];
const SERVICE: &[&str] = &["name"];
const CLR_PROCESS: &[&str] = &["process"];
const MSSQL_INSTANCE: &[&str] = &["mssql_instance"];
const MSSQL_DB: &[&str] = &["mssql_instance", "database"];
const EXCHANGE_NAME: &[&str] = &["name"];
const VM: &[&str] = &["vm"];
const VM_DEVICE: &[&str] = &["vm_device"];
const VM_INTERFACE: &[&str] = &["vm_interface"];
const VSWITCH: &[&str] = &["vswitch"];
const COLLECTOR: &[&str] = &["collector"];

use Family::*;

#[rustfmt::skip]
static SCHEMAS: &[MetricSchema] = &[
    // ========== CPU ==========
    MetricSchema::new("windows_cpu_time_total", Cores, "cpu_core", CORE, "time").by("mode").millis(),
    MetricSchema::new("windows_cpu_interrupts_total", Cores, "cpu_core", CORE, "interrupts"),
    MetricSchema::new("windows_cpu_dpcs_total", Cores, "cpu_core", CORE, "dpcs"),
    MetricSchema::new("windows_cpu_cstate_seconds_total", Cores, "cpu_core", CORE, "cstate").by("state").millis(),
    MetricSchema::new("windows_cpu_core_frequency_mhz", Cores, "cpu_core", CORE, "frequency_mhz"),

    // ========== Logical disks ==========
    MetricSchema::new("windows_logical_disk_free_bytes", Volumes, "logical_disk", VOLUME, "free_space"),
    MetricSchema::new("windows_logical_disk_size_bytes", Volumes, "logical_disk", VOLUME, "total_space"),
    MetricSchema::new("windows_logical_disk_read_bytes_total", Volumes, "logical_disk", VOLUME, "read_bytes"),
    MetricSchema::new("windows_logical_disk_write_bytes_total", Volumes, "logical_disk", VOLUME, "write_bytes"),
    MetricSchema::new("windows_logical_disk_reads_total", Volumes, "logical_disk", VOLUME, "reads"),
    MetricSchema::new("windows_logical_disk_writes_total", Volumes, "logical_disk", VOLUME, "writes"),
    MetricSchema::new("windows_logical_disk_read_latency_seconds_total", Volumes, "logical_disk", VOLUME, "read_latency").millis(),
    MetricSchema::new("windows_logical_disk_write_latency_seconds_total", Volumes, "logical_disk", VOLUME, "write_latency").millis(),

    // ========== Network interfaces ==========
    MetricSchema::new("windows_net_bytes_received_total", Nics, "net_nic", NIC, "bytes_received"),
    MetricSchema::new("windows_net_bytes_sent_total", Nics, "net_nic", NIC, "bytes_sent"),
    MetricSchema::new("windows_net_packets_received_total", Nics, "net_nic", NIC, "packets_received"),
    MetricSchema::new("windows_net_packets_sent_total", Nics, "net_nic", NIC, "packets_sent"),
    MetricSchema::new("windows_net_packets_received_discarded_total", Nics, "net_nic", NIC, "packets_received_discarded"),
    MetricSchema::new("windows_net_packets_outbound_discarded_total", Nics, "net_nic", NIC, "packets_outbound_discarded"),
    MetricSchema::new("windows_net_packets_received_errors_total", Nics, "net_nic", NIC, "packets_received_errors"),
    MetricSchema::new("windows_net_packets_outbound_errors_total", Nics, "net_nic", NIC, "packets_outbound_errors"),
    MetricSchema::new("windows_net_current_bandwidth_bytes", Nics, "net_nic", NIC, "current_bandwidth"),

    // ========== Thermal zones ==========
    MetricSchema::new("windows_thermalzone_temperature_celsius", ThermalZones, "thermalzone", ZONE, "temperature"),
    MetricSchema::new("windows_thermalzone_percent_passive_limit", ThermalZones, "thermalzone", ZONE, "percent_passive_limit"),
    MetricSchema::new("windows_thermalzone_throttle_reasons", ThermalZones, "thermalzone", ZONE, "throttle_reasons"),

    // ========== Processes (one entity per process name) ==========
    MetricSchema::new("windows_process_cpu_time_total", Processes, "process", PROCESS, "cpu_time").by("mode").millis().summed(),
    MetricSchema::new("windows_process_working_set_private_bytes", Processes, "process", PROCESS, "working_set_private").summed(),
    MetricSchema::new("windows_process_page_file_bytes", Processes, "process", PROCESS, "page_file").summed(),
    MetricSchema::new("windows_process_handles", Processes, "process", PROCESS, "handles").summed(),
    MetricSchema::new("windows_process_threads", Processes, "process", PROCESS, "threads").summed(),
    MetricSchema::new("windows_process_io_bytes_total", Processes, "process", PROCESS, "io_bytes").by("mode").summed(),
    MetricSchema::new("windows_process_io_operations_total", Processes, "process", PROCESS, "io_operations").by("mode").summed(),
    MetricSchema::new("windows_process_page_faults_total", Processes, "process", PROCESS, "page_faults").summed(),

    // ========== IIS web sites ==========
    MetricSchema::new("windows_iis_current_connections", Iis, "iis_website", SITE, "current_connections"),
    MetricSchema::new("windows_iis_received_bytes_total", Iis, "iis_website", SITE, "received_bytes"),
    MetricSchema::new("windows_iis_sent_bytes_total", Iis, "iis_website", SITE, "sent_bytes"),
    MetricSchema::new("windows_iis_requests_total", Iis, "iis_website", SITE, "requests").by("method"),
    MetricSchema::new("windows_iis_anonymous_users_total", Iis, "iis_website", SITE, "anonymous_users"),
    MetricSchema::new("windows_iis_non_anonymous_users_total", Iis, "iis_website", SITE, "non_anonymous_users"),
    MetricSchema::new("windows_iis_not_found_errors_total", Iis, "iis_website", SITE, "not_found_errors"),

    // ========== AD CS certificate templates ==========
    MetricSchema::new("windows_adcs_requests_total", Adcs, "adcs_cert_template", TEMPLATE, "requests"),
    MetricSchema::new("windows_adcs_issued_requests_total", Adcs, "adcs_cert_template", TEMPLATE, "issued_requests"),
    MetricSchema::new("windows_adcs_failed_requests_total", Adcs, "adcs_cert_template", TEMPLATE, "failed_requests"),
    MetricSchema::new("windows_adcs_pending_requests_total", Adcs, "adcs_cert_template", TEMPLATE, "pending_requests"),
    MetricSchema::new("windows_adcs_request_processing_time_seconds", Adcs, "adcs_cert_template", TEMPLATE, "request_processing_time").millis(),
    MetricSchema::new("windows_adcs_retrievals_total", Adcs, "adcs_cert_template", TEMPLATE, "retrievals"),
    MetricSchema::new("windows_adcs_challenge_responses_total", Adcs, "adcs_cert_template", TEMPLATE, "challenge_responses"),

    // ========== Services ==========
    MetricSchema::new("windows_service_state", Services, "service", SERVICE, "state").by("state"),
    MetricSchema::new("windows_service_status", Services, "service", SERVICE, "status").by("status"),

    // ========== .NET CLR ==========
    MetricSchema::new("windows_netframework_clrexceptions_exceptions_thrown_total", NetFrameworkClrExceptions, "netframework", CLR_PROCESS, "clrexception_thrown"),
    MetricSchema::new("windows_netframework_clrexceptions_exceptions_filters_total", NetFrameworkClrExceptions, "netframework", CLR_PROCESS, "clrexception_filters"),
    MetricSchema::new("windows_netframework_clrexceptions_exceptions_finallys_total", NetFrameworkClrExceptions, "netframework", CLR_PROCESS, "clrexception_finallys"),
    MetricSchema::new("windows_netframework_clrexceptions_throw_to_catch_depth_total", NetFrameworkClrExceptions, "netframework", CLR_PROCESS, "clrexception_throw_to_catch_depth"),
    MetricSchema::new("windows_netframework_clrinterop_com_callable_wrappers_total", NetFrameworkClrInterops, "netframework", CLR_PROCESS, "clrinterop_com_callable_wrappers"),
    MetricSchema::new("windows_netframework_clrinterop_interop_marshalling_total", NetFrameworkClrInterops, "netframework", CLR_PROCESS, "clrinterop_interop_marshallings"),
    MetricSchema::new("windows_netframework_clrinterop_interop_stubs_created_total", NetFrameworkClrInterops, "netframework", CLR_PROCESS, "clrinterop_interop_stubs_created"),
    MetricSchema::new("windows_netframework_clrjit_jit_methods_total", NetFrameworkClrJit, "netframework", CLR_PROCESS, "clrjit_methods"),
    MetricSchema::new("windows_netframework_clrjit_jit_time_percent", NetFrameworkClrJit, "netframework", CLR_PROCESS, "clrjit_time"),
    MetricSchema::new("windows_netframework_clrjit_jit_standard_failures_total", NetFrameworkClrJit, "netframework", CLR_PROCESS, "clrjit_standard_failures"),
    MetricSchema::new("windows_netframework_clrjit_jit_il_bytes_total", NetFrameworkClrJit, "netframework", CLR_PROCESS, "clrjit_il_bytes"),
    MetricSchema::new("windows_netframework_clrloading_loader_heap_size_bytes", NetFrameworkClrLoading, "netframework", CLR_PROCESS, "clrloading_loader_heap_size"),
    MetricSchema::new("windows_netframework_clrloading_appdomains_loaded_total", NetFrameworkClrLoading, "netframework", CLR_PROCESS, "clrloading_appdomains_loaded"),
    MetricSchema::new("windows_netframework_clrloading_assemblies_loaded_total", NetFrameworkClrLoading, "netframework", CLR_PROCESS, "clrloading_assemblies_loaded"),
    MetricSchema::new("windows_netframework_clrloading_classes_loaded_total", NetFrameworkClrLoading, "netframework", CLR_PROCESS, "clrloading_classes_loaded"),
    MetricSchema::new("windows_netframework_clrloading_class_load_failures_total", NetFrameworkClrLoading, "netframework", CLR_PROCESS, "clrloading_class_load_failures"),
    MetricSchema::new("windows_netframework_clrlocksandthreads_current_logical_threads", NetFrameworkClrLocksThreads, "netframework", CLR_PROCESS, "clrlocksandthreads_current_logical_threads"),
    MetricSchema::new("windows_netframework_clrlocksandthreads_physical_threads_current", NetFrameworkClrLocksThreads, "netframework", CLR_PROCESS, "clrlocksandthreads_physical_threads_current"),
    MetricSchema::new("windows_netframework_clrlocksandthreads_contentions_total", NetFrameworkClrLocksThreads, "netframework", CLR_PROCESS, "clrlocksandthreads_contentions"),
    MetricSchema::new("windows_netframework_clrlocksandthreads_queue_length_total", NetFrameworkClrLocksThreads, "netframework", CLR_PROCESS, "clrlocksandthreads_queue_length"),
    MetricSchema::new("windows_netframework_clrlocksandthreads_recognized_threads_total", NetFrameworkClrLocksThreads, "netframework", CLR_PROCESS, "clrlocksandthreads_recognized_threads"),
    MetricSchema::new("windows_netframework_clrmemory_allocated_bytes_total", NetFrameworkClrMemory, "netframework", CLR_PROCESS, "clrmemory_allocated_bytes"),
    MetricSchema::new("windows_netframework_clrmemory_committed_bytes", NetFrameworkClrMemory, "netframework", CLR_PROCESS, "clrmemory_committed"),
    MetricSchema::new("windows_netframework_clrmemory_collections_total", NetFrameworkClrMemory, "netframework", CLR_PROCESS, "clrmemory_collections").by("area"),
    MetricSchema::new("windows_netframework_clrmemory_heap_size_bytes", NetFrameworkClrMemory, "netframework", CLR_PROCESS, "clrmemory_heap_size").by("area"),
    MetricSchema::new("windows_netframework_clrmemory_gc_time_percent", NetFrameworkClrMemory, "netframework", CLR_PROCESS, "clrmemory_gc_time"),
    MetricSchema::new("windows_netframework_clrmemory_promoted_bytes", NetFrameworkClrMemory, "netframework", CLR_PROCESS, "clrmemory_promoted"),
    MetricSchema::new("windows_netframework_clrremoting_channels_total", NetFrameworkClrRemoting, "netframework", CLR_PROCESS, "clrremoting_channels"),
    MetricSchema::new("windows_netframework_clrremoting_context_proxies_total", NetFrameworkClrRemoting, "netframework", CLR_PROCESS, "clrremoting_context_proxies"),
    MetricSchema::new("windows_netframework_clrremoting_contexts", NetFrameworkClrRemoting, "netframework", CLR_PROCESS, "clrremoting_contexts"),
    MetricSchema::new("windows_netframework_clrremoting_remote_calls_total", NetFrameworkClrRemoting, "netframework", CLR_PROCESS, "clrremoting_remote_calls"),
    MetricSchema::new("windows_netframework_clrsecurity_link_time_checks_total", NetFrameworkClrSecurity, "netframework", CLR_PROCESS, "clrsecurity_link_time_checks"),
    MetricSchema::new("windows_netframework_clrsecurity_rt_checks_time_percent", NetFrameworkClrSecurity, "netframework", CLR_PROCESS, "clrsecurity_checks_time"),
    MetricSchema::new("windows_netframework_clrsecurity_stack_walk_depth", NetFrameworkClrSecurity, "netframework", CLR_PROCESS, "clrsecurity_stack_walk_depth"),
    MetricSchema::new("windows_netframework_clrsecurity_runtime_checks_total", NetFrameworkClrSecurity, "netframework", CLR_PROCESS, "clrsecurity_runtime_checks"),

    // ========== MSSQL instances ==========
    MetricSchema::new("windows_mssql_genstats_user_connections", MssqlInstances, "mssql_instance", MSSQL_INSTANCE, "user_connection"),
    MetricSchema::new("windows_mssql_genstats_blocked_processes", MssqlInstances, "mssql_instance", MSSQL_INSTANCE, "blocked_processes"),
    MetricSchema::new("windows_mssql_sqlstats_batch_requests", MssqlInstances, "mssql_instance", MSSQL_INSTANCE, "sqlstats_batch_requests"),
    MetricSchema::new("windows_mssql_sqlstats_sql_compilations", MssqlInstances, "mssql_instance", MSSQL_INSTANCE, "sqlstats_sql_compilations"),
    MetricSchema::new("windows_mssql_sqlstats_sql_recompilations", MssqlInstances, "mssql_instance", MSSQL_INSTANCE, "sqlstats_sql_recompilations"),
    MetricSchema::new("windows_mssql_memmgr_total_server_memory_bytes", MssqlInstances, "mssql_instance", MSSQL_INSTANCE, "memmgr_total_server"),
    MetricSchema::new("windows_mssql_memmgr_connection_memory_bytes", MssqlInstances, "mssql_instance", MSSQL_INSTANCE, "memmgr_connection_memory_bytes"),
    MetricSchema::new("windows_mssql_accessmethods_page_splits", MssqlInstances, "mssql_instance", MSSQL_INSTANCE, "accessmethods_page_splits"),
    MetricSchema::new("windows_mssql_bufman_page_life_expectancy_seconds", MssqlInstances, "mssql_instance", MSSQL_INSTANCE, "bufman_page_life_expectancy"),
    MetricSchema::new("windows_mssql_locks_deadlocks", MssqlInstances, "mssql_instance", MSSQL_INSTANCE, "locks_deadlocks").by("resource"),

    // ========== MSSQL databases ==========
    MetricSchema::new("windows_mssql_databases_active_transactions", MssqlDbs, "mssql_db", MSSQL_DB, "active_transactions"),
    MetricSchema::new("windows_mssql_databases_data_files_size_bytes", MssqlDbs, "mssql_db", MSSQL_DB, "data_files_size"),
    MetricSchema::new("windows_mssql_databases_log_flushed_bytes_total", MssqlDbs, "mssql_db", MSSQL_DB, "log_flushed"),
    MetricSchema::new("windows_mssql_databases_transactions_total", MssqlDbs, "mssql_db", MSSQL_DB, "transactions"),
    MetricSchema::new("windows_mssql_databases_write_transactions_total", MssqlDbs, "mssql_db", MSSQL_DB, "write_transactions"),
    MetricSchema::new("windows_mssql_databases_backup_restore_operations_total", MssqlDbs, "mssql_db", MSSQL_DB, "backup_restore_operations"),

    // ========== Exchange ==========
    MetricSchema::new("windows_exchange_workload_active_tasks", ExchangeWorkload, "exchange_workload", EXCHANGE_NAME, "active_tasks"),
    MetricSchema::new("windows_exchange_workload_completed_tasks", ExchangeWorkload, "exchange_workload", EXCHANGE_NAME, "completed_tasks"),
    MetricSchema::new("windows_exchange_workload_queued_tasks", ExchangeWorkload, "exchange_workload", EXCHANGE_NAME, "queued_tasks"),
    MetricSchema::new("windows_exchange_workload_yielded_tasks", ExchangeWorkload, "exchange_workload", EXCHANGE_NAME, "yielded_tasks"),
    MetricSchema::new("windows_exchange_workload_is_active", ExchangeWorkload, "exchange_workload", EXCHANGE_NAME, "is_active"),
    MetricSchema::new("windows_exchange_ldap_long_running_ops_per_sec", ExchangeLdap, "exchange_ldap", EXCHANGE_NAME, "long_running_ops_per_sec"),
    MetricSchema::new("windows_exchange_ldap_read_time_sec", ExchangeLdap, "exchange_ldap", EXCHANGE_NAME, "read_time").millis(),
    MetricSchema::new("windows_exchange_ldap_search_time_sec", ExchangeLdap, "exchange_ldap", EXCHANGE_NAME, "search_time").millis(),
    MetricSchema::new("windows_exchange_ldap_write_time_sec", ExchangeLdap, "exchange_ldap", EXCHANGE_NAME, "write_time").millis(),
    MetricSchema::new("windows_exchange_ldap_timeout_errors_total", ExchangeLdap, "exchange_ldap", EXCHANGE_NAME, "timeout_errors"),
    MetricSchema::new("windows_exchange_http_proxy_avg_auth_latency", ExchangeHttpProxy, "exchange_http_proxy", EXCHANGE_NAME, "avg_auth_latency"),
    MetricSchema::new("windows_exchange_http_proxy_avg_cas_processing_latency_sec", ExchangeHttpProxy, "exchange_http_proxy", EXCHANGE_NAME, "avg_cas_processing_latency").millis(),
    MetricSchema::new("windows_exchange_http_proxy_mailbox_proxy_failure_rate", ExchangeHttpProxy, "exchange_http_proxy", EXCHANGE_NAME, "mailbox_proxy_failure_rate"),
    MetricSchema::new("windows_exchange_http_proxy_mailbox_server_locator_avg_latency_sec", ExchangeHttpProxy, "exchange_http_proxy", EXCHANGE_NAME, "mailbox_server_locator_avg_latency").millis(),
    MetricSchema::new("windows_exchange_http_proxy_outstanding_proxy_requests", ExchangeHttpProxy, "exchange_http_proxy", EXCHANGE_NAME, "outstanding_proxy_requests"),
    MetricSchema::new("windows_exchange_http_proxy_requests_total", ExchangeHttpProxy, "exchange_http_proxy", EXCHANGE_NAME, "requests"),

    // ========== Hyper-V ==========
    MetricSchema::new("windows_hyperv_vm_memory_physical", HypervVmMemory, "vm", VM, "memory_physical"),
    MetricSchema::new("windows_hyperv_vm_memory_physical_guest_visible", HypervVmMemory, "vm", VM, "memory_physical_guest_visible"),
    MetricSchema::new("windows_hyperv_vm_memory_pressure_current", HypervVmMemory, "vm", VM, "memory_pressure_current"),
    MetricSchema::new("windows_hyperv_vm_memory_reserved", HypervVmMemory, "vm", VM, "memory_reserved"),
    MetricSchema::new("windows_hyperv_vm_memory_add_operations_total", HypervVmMemory, "vm", VM, "memory_add_operations"),
    MetricSchema::new("windows_hyperv_vm_memory_remove_operations_total", HypervVmMemory, "vm", VM, "memory_remove_operations"),
    MetricSchema::new("windows_hyperv_vm_device_bytes_read", HypervVmDevices, "vm_device", VM_DEVICE, "bytes_read"),
    MetricSchema::new("windows_hyperv_vm_device_bytes_written", HypervVmDevices, "vm_device", VM_DEVICE, "bytes_written"),
    MetricSchema::new("windows_hyperv_vm_device_operations_read", HypervVmDevices, "vm_device", VM_DEVICE, "operations_read"),
    MetricSchema::new("windows_hyperv_vm_device_operations_written", HypervVmDevices, "vm_device", VM_DEVICE, "operations_written"),
    MetricSchema::new("windows_hyperv_vm_device_error_count", HypervVmDevices, "vm_device", VM_DEVICE, "error_count"),
    MetricSchema::new("windows_hyperv_vm_interface_bytes_received", HypervVmInterfaces, "vm_interface", VM_INTERFACE, "bytes_received"),
    MetricSchema::new("windows_hyperv_vm_interface_bytes_sent", HypervVmInterfaces, "vm_interface", VM_INTERFACE, "bytes_sent"),
    MetricSchema::new("windows_hyperv_vm_interface_packets_incoming_dropped", HypervVmInterfaces, "vm_interface", VM_INTERFACE, "packets_incoming_dropped"),
    MetricSchema::new("windows_hyperv_vm_interface_packets_outgoing_dropped", HypervVmInterfaces, "vm_interface", VM_INTERFACE, "packets_outgoing_dropped"),
    MetricSchema::new("windows_hyperv_vm_interface_packets_received", HypervVmInterfaces, "vm_interface", VM_INTERFACE, "packets_received"),
    MetricSchema::new("windows_hyperv_vm_interface_packets_sent", HypervVmInterfaces, "vm_interface", VM_INTERFACE, "packets_sent"),
    MetricSchema::new("windows_hyperv_vswitch_bytes_received_total", HypervVswitch, "vswitch", VSWITCH, "bytes_received"),
    MetricSchema::new("windows_hyperv_vswitch_bytes_sent_total", HypervVswitch, "vswitch", VSWITCH, "bytes_sent"),
    MetricSchema::new("windows_hyperv_vswitch_packets_received_total", HypervVswitch, "vswitch", VSWITCH, "packets_received"),
    MetricSchema::new("windows_hyperv_vswitch_packets_sent_total", HypervVswitch, "vswitch", VSWITCH, "packets_sent"),
    MetricSchema::new("windows_hyperv_vswitch_dropped_packets_incoming_total", HypervVswitch, "vswitch", VSWITCH, "dropped_packets_incoming"),
    MetricSchema::new("windows_hyperv_vswitch_dropped_packets_outcoming_total", HypervVswitch, "vswitch", VSWITCH, "dropped_packets_outgoing"),

    // ========== Exporter collectors ==========
    MetricSchema::new("windows_exporter_collector_success", Collectors, "collector", COLLECTOR, "status_success"),
    MetricSchema::new("windows_exporter_collector_timeout", Collectors, "collector", COLLECTOR, "status_timeout"),
    MetricSchema::new("windows_exporter_collector_duration_seconds", Collectors, "collector", COLLECTOR, "duration").millis(),
];

static BY_METRIC: Lazy<HashMap<&'static str, &'static MetricSchema>> =
    Lazy::new(|| SCHEMAS.iter().map(|s| (s.metric, s)).collect());

/// Schema for an exporter metric, if it is one this crate knows.
pub fn schema_for(metric: &str) -> Option<&'static MetricSchema> {
    BY_METRIC.get(metric).copied()
}

/// All known schemas.
pub fn schemas() -> &'static [MetricSchema] {
    SCHEMAS
}

/// Schemas feeding one entity family.
pub fn schemas_for_family(family: Family) -> impl Iterator<Item = &'static MetricSchema> {
    SCHEMAS.iter().filter(move |s| s.family == family)
}

/// Exporter collectors whose names contain `_`, longest first where one
/// name prefixes another.
const MULTI_TOKEN_GROUPS: &[&str] = &[
    "cpu_info",
    "logical_disk",
    "physical_disk",
    "netframework_clrexceptions",
    "netframework_clrinterop",
    "netframework_clrjit",
    "netframework_clrloading",
    "netframework_clrlocksandthreads",
    "netframework_clrmemory",
    "netframework_clrremoting",
    "netframework_clrsecurity",
    "remote_fx",
    "scheduled_task",
    "terminal_services",
    "teradici_pcoip",
    "vmware_blast",
];

/// Metric group of an exporter metric: the exporter collector that emits
/// it. Known multi-token collectors match by longest prefix
/// (`windows_logical_disk_free_bytes` belongs to `logical_disk`); anything
/// else falls back to the token after `windows_`.
pub fn metric_group(metric: &str) -> Option<&str> {
    let rest = metric.strip_prefix(METRIC_PREFIX)?;

    let known = MULTI_TOKEN_GROUPS
        .iter()
        .filter(|group| {
            rest.strip_prefix(*group)
                .is_some_and(|tail| tail.is_empty() || tail.starts_with('_'))
        })
        .max_by_key(|group| group.len());
    if let Some(group) = known {
        return Some(&rest[..group.len()]);
    }

    rest.split('_').next().filter(|group| !group.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ahash::AHashSet as HashSet;

    #[test]
    fn test_schema_lookup() {
        let schema = schema_for("windows_cpu_time_total").unwrap();
        assert_eq!(schema.family, Family::Cores);
        assert_eq!(schema.dimension, Some("mode"));
        assert_eq!(schema.multiplier, 1000);
        assert!(schema_for("windows_os_processes").is_none());
    }

    #[test]
    fn test_schema_metrics_are_unique() {
        let mut seen = HashSet::new();
        for schema in schemas() {
            assert!(seen.insert(schema.metric), "duplicate schema {}", schema.metric);
        }
    }

    #[test]
    fn test_every_tracked_family_has_a_schema() {
        for family in Family::ALL {
            if family == Family::Collection {
                continue;
            }
            assert!(
                schemas_for_family(family).next().is_some(),
                "no schema feeds {}",
                family
            );
        }
    }

    #[test]
    fn test_required_labels_include_dimension() {
        let schema = schema_for("windows_mssql_locks_deadlocks").unwrap();
        let labels: Vec<_> = schema.required_labels().collect();
        assert_eq!(labels, vec!["mssql_instance", "resource"]);
    }

    #[test]
    fn test_metric_group() {
        assert_eq!(metric_group("windows_cpu_time_total"), Some("cpu"));
        assert_eq!(metric_group("windows_exporter_build_info"), Some("exporter"));
        assert_eq!(metric_group("go_goroutines"), None);
        assert_eq!(metric_group("windows_"), None);
    }

    #[test]
    fn test_metric_group_multi_token_collectors() {
        assert_eq!(
            metric_group("windows_logical_disk_free_bytes"),
            Some("logical_disk")
        );
        assert_eq!(
            metric_group("windows_physical_disk_reads_total"),
            Some("physical_disk")
        );
        assert_eq!(
            metric_group("windows_netframework_clrjit_jit_methods_total"),
            Some("netframework_clrjit")
        );
        assert_eq!(
            metric_group("windows_netframework_clrmemory_allocated_bytes_total"),
            Some("netframework_clrmemory")
        );
        assert_eq!(metric_group("windows_cpu_info_core"), Some("cpu_info"));
        // `cpu_info` must not capture `cpu_*` metrics of the cpu collector
        assert_eq!(metric_group("windows_cpu_interrupts_total"), Some("cpu"));
    }
}
