//! Built-in hard and soft filters.
//!
//! Each filter is a zero-sized [`Stage`] implementation registered under
//! its documented name. Hard filters remove non-matching servers outright
//! (in capacity mode they instead annotate, handled uniformly by
//! `affects_capacity`/the capacity rewrite in `crate::capacity`); soft
//! filters propose a subset and adopt it only when non-empty.

use triton_core::uuid::VmUuid;

use crate::algorithm::{EvalContext, ServerView, Stage, StageKind, StageOutcome, StageState};
use crate::config::RATIO_EPSILON;
use crate::error::Error;
use crate::log::AllocatorLog;
use crate::matcher::{matches_traits, platform_at_least, platform_at_most};
use crate::model::{Traits, VmRequest};
use crate::recent::RecentServerMemory;

/// Fraction of the candidate set `hard-filter-large-servers` excludes from
/// ordinary placement: the servers with the most total RAM, reserved for
/// manually-targeted large workloads.
pub const LARGE_SERVER_EXCLUSION_FRACTION: f64 = 0.15;

fn partition<F>(servers: Vec<ServerView>, mut keep: F) -> StageOutcome
where
    F: FnMut(&ServerView) -> Result<(), String>,
{
    let mut kept = Vec::new();
    let mut reasons = Vec::new();
    for view in servers {
        match keep(&view) {
            Ok(()) => kept.push(view),
            Err(reason) => {
                reasons.push((view.server.uuid, reason));
            }
        }
    }
    StageOutcome {
        servers: kept,
        reasons,
    }
}

/// Merges a VM's required traits over its image's, over its package's,
/// per the precedence rule in `SPEC_FULL.md` §4.3 (VM overrides image
/// overrides package).
fn merged_required_traits(ctx: &EvalContext<'_>) -> Traits {
    let mut merged = ctx.package.traits.clone();
    merged.extend(ctx.image.traits.clone());
    merged.extend(ctx.vm.traits.clone());
    merged
}

fn is_docker_brand(vm: &VmRequest) -> bool {
    vm.brand == "lx" || vm.brand == "kvm" && vm.internal_metadata.contains_key("docker:restartpolicy")
}

pub struct HardFilterSetup;
impl Stage for HardFilterSetup {
    fn name(&self) -> &str {
        "hard-filter-setup"
    }
    fn kind(&self) -> StageKind {
        StageKind::Filter
    }
    fn run(
        &self,
        _log: &dyn AllocatorLog,
        _state: &mut StageState,
        servers: Vec<ServerView>,
        _ctx: &EvalContext<'_>,
    ) -> Result<StageOutcome, Error> {
        Ok(partition(servers, |view| {
            if view.server.status == "setup" {
                Err("server is still being set up".to_string())
            } else {
                Ok(())
            }
        }))
    }
}

pub struct HardFilterRunning;
impl Stage for HardFilterRunning {
    fn name(&self) -> &str {
        "hard-filter-running"
    }
    fn kind(&self) -> StageKind {
        StageKind::Filter
    }
    fn run(
        &self,
        _log: &dyn AllocatorLog,
        _state: &mut StageState,
        servers: Vec<ServerView>,
        _ctx: &EvalContext<'_>,
    ) -> Result<StageOutcome, Error> {
        Ok(partition(servers, |view| {
            if view.server.status == "running" {
                Ok(())
            } else {
                Err(format!("server status is {}, not running", view.server.status))
            }
        }))
    }
}

pub struct HardFilterReserved;
impl Stage for HardFilterReserved {
    fn name(&self) -> &str {
        "hard-filter-reserved"
    }
    fn kind(&self) -> StageKind {
        StageKind::Filter
    }
    fn run(
        &self,
        _log: &dyn AllocatorLog,
        _state: &mut StageState,
        servers: Vec<ServerView>,
        _ctx: &EvalContext<'_>,
    ) -> Result<StageOutcome, Error> {
        Ok(partition(servers, |view| {
            if view.server.reserved {
                Err("server is reserved".to_string())
            } else {
                Ok(())
            }
        }))
    }
}

pub struct HardFilterReservoir;
impl Stage for HardFilterReservoir {
    fn name(&self) -> &str {
        "hard-filter-reservoir"
    }
    fn kind(&self) -> StageKind {
        StageKind::Filter
    }
    fn run(
        &self,
        _log: &dyn AllocatorLog,
        _state: &mut StageState,
        servers: Vec<ServerView>,
        _ctx: &EvalContext<'_>,
    ) -> Result<StageOutcome, Error> {
        Ok(partition(servers, |view| {
            if view.server.reservoir {
                Err("server is a capacity reservoir".to_string())
            } else {
                Ok(())
            }
        }))
    }
}

pub struct HardFilterHeadnode;
impl Stage for HardFilterHeadnode {
    fn name(&self) -> &str {
        "hard-filter-headnode"
    }
    fn kind(&self) -> StageKind {
        StageKind::Filter
    }
    fn run(
        &self,
        _log: &dyn AllocatorLog,
        _state: &mut StageState,
        servers: Vec<ServerView>,
        ctx: &EvalContext<'_>,
    ) -> Result<StageOutcome, Error> {
        if !ctx.defaults.filter_headnode {
            return Ok(StageOutcome::kept(servers));
        }
        Ok(partition(servers, |view| {
            if view.server.headnode {
                Err("server is the headnode".to_string())
            } else {
                Ok(())
            }
        }))
    }
}

pub struct HardFilterVirtualServers;
impl Stage for HardFilterVirtualServers {
    fn name(&self) -> &str {
        "hard-filter-virtual-servers"
    }
    fn kind(&self) -> StageKind {
        StageKind::Filter
    }
    fn run(
        &self,
        _log: &dyn AllocatorLog,
        _state: &mut StageState,
        servers: Vec<ServerView>,
        _ctx: &EvalContext<'_>,
    ) -> Result<StageOutcome, Error> {
        use crate::model::TraitValue;
        Ok(partition(servers, |view| {
            match view.server.traits.get("virtual") {
                Some(TraitValue::Bool(true)) => Err("server is virtual".to_string()),
                _ => Ok(()),
            }
        }))
    }
}

pub struct HardFilterInvalidServers;
impl Stage for HardFilterInvalidServers {
    fn name(&self) -> &str {
        "hard-filter-invalid-servers"
    }
    fn kind(&self) -> StageKind {
        StageKind::Filter
    }
    fn run(
        &self,
        _log: &dyn AllocatorLog,
        _state: &mut StageState,
        servers: Vec<ServerView>,
        _ctx: &EvalContext<'_>,
    ) -> Result<StageOutcome, Error> {
        Ok(partition(servers, |view| {
            crate::validation::validate_server(&view.server)
                .map_err(|e| e.to_string())
                .and(if view.server.derivation_ok {
                    Ok(())
                } else {
                    Err("server derivation failed".to_string())
                })
        }))
    }
}

pub struct HardFilterMinRam;
impl Stage for HardFilterMinRam {
    fn name(&self) -> &str {
        "hard-filter-min-ram"
    }
    fn kind(&self) -> StageKind {
        StageKind::Filter
    }
    fn run(
        &self,
        _log: &dyn AllocatorLog,
        _state: &mut StageState,
        servers: Vec<ServerView>,
        ctx: &EvalContext<'_>,
    ) -> Result<StageOutcome, Error> {
        if !ctx.defaults.filter_min_resources {
            return Ok(StageOutcome::kept(servers));
        }
        let needed = ctx.vm.ram;
        Ok(partition(servers, |view| {
            if view.server.unreserved_ram >= needed {
                Ok(())
            } else {
                Err(format!(
                    "unreserved_ram {} MiB < required {needed} MiB",
                    view.server.unreserved_ram
                ))
            }
        }))
    }
}

pub struct HardFilterMinCpu;
impl Stage for HardFilterMinCpu {
    fn name(&self) -> &str {
        "hard-filter-min-cpu"
    }
    fn kind(&self) -> StageKind {
        StageKind::Filter
    }
    fn run(
        &self,
        _log: &dyn AllocatorLog,
        _state: &mut StageState,
        servers: Vec<ServerView>,
        ctx: &EvalContext<'_>,
    ) -> Result<StageOutcome, Error> {
        if !ctx.defaults.filter_min_resources {
            return Ok(StageOutcome::kept(servers));
        }
        let Some(needed) = ctx.vm.cpu_cap else {
            return Ok(StageOutcome::kept(servers));
        };
        Ok(partition(servers, |view| {
            if view.server.unreserved_cpu >= f64::from(needed) {
                Ok(())
            } else {
                Err(format!(
                    "unreserved_cpu {} < required {needed}",
                    view.server.unreserved_cpu
                ))
            }
        }))
    }
}

pub struct HardFilterMinDisk;
impl Stage for HardFilterMinDisk {
    fn name(&self) -> &str {
        "hard-filter-min-disk"
    }
    fn kind(&self) -> StageKind {
        StageKind::Filter
    }
    fn run(
        &self,
        _log: &dyn AllocatorLog,
        _state: &mut StageState,
        servers: Vec<ServerView>,
        ctx: &EvalContext<'_>,
    ) -> Result<StageOutcome, Error> {
        if !ctx.defaults.filter_min_resources {
            return Ok(StageOutcome::kept(servers));
        }
        let needed = ctx.vm.quota;
        Ok(partition(servers, |view| {
            if view.server.unreserved_disk >= needed {
                Ok(())
            } else {
                Err(format!(
                    "unreserved_disk {} MiB < required {needed} MiB",
                    view.server.unreserved_disk
                ))
            }
        }))
    }
}

/// Checks raw pool availability (ignoring the disk overprovision ratio),
/// distinct from `hard-filter-min-disk`'s overprovision-adjusted check.
pub struct HardFilterMinFreeDisk;
impl Stage for HardFilterMinFreeDisk {
    fn name(&self) -> &str {
        "hard-filter-min-free-disk"
    }
    fn kind(&self) -> StageKind {
        StageKind::Filter
    }
    fn run(
        &self,
        _log: &dyn AllocatorLog,
        _state: &mut StageState,
        servers: Vec<ServerView>,
        ctx: &EvalContext<'_>,
    ) -> Result<StageOutcome, Error> {
        const BYTES_PER_MIB: u64 = 1_048_576;
        let needed_mib = ctx.vm.quota;
        Ok(partition(servers, |view| {
            let server = &view.server;
            let pool_mib = server.disk_pool_size_bytes / BYTES_PER_MIB;
            let consumed_mib = (server.disk_installed_images_used_bytes
                + server.disk_kvm_quota_bytes
                + server.disk_cores_quota_bytes
                + server.disk_zone_quota_bytes)
                / BYTES_PER_MIB;
            let free_mib = pool_mib.saturating_sub(consumed_mib);
            if free_mib >= needed_mib {
                Ok(())
            } else {
                Err(format!("free disk {free_mib} MiB < required {needed_mib} MiB"))
            }
        }))
    }
}

pub struct HardFilterOverprovisionRatios;
impl Stage for HardFilterOverprovisionRatios {
    fn name(&self) -> &str {
        "hard-filter-overprovision-ratios"
    }
    fn kind(&self) -> StageKind {
        StageKind::Filter
    }
    fn run(
        &self,
        _log: &dyn AllocatorLog,
        _state: &mut StageState,
        servers: Vec<ServerView>,
        ctx: &EvalContext<'_>,
    ) -> Result<StageOutcome, Error> {
        Ok(partition(servers, |view| {
            let server_ratios = &view.server.overprovision_ratios;
            if let Some(server_cpu) = server_ratios.cpu {
                if (server_cpu - ctx.overprovision_ratio_cpu).abs() > RATIO_EPSILON {
                    return Err(format!(
                        "server cpu overprovision ratio {server_cpu} != requested {}",
                        ctx.overprovision_ratio_cpu
                    ));
                }
            }
            if let Some(server_ram) = server_ratios.ram {
                if (server_ram - ctx.overprovision_ratio_ram).abs() > RATIO_EPSILON {
                    return Err(format!(
                        "server ram overprovision ratio {server_ram} != requested {}",
                        ctx.overprovision_ratio_ram
                    ));
                }
            }
            if let Some(server_disk) = server_ratios.disk {
                if (server_disk - ctx.overprovision_ratio_disk).abs() > RATIO_EPSILON {
                    return Err(format!(
                        "server disk overprovision ratio {server_disk} != requested {}",
                        ctx.overprovision_ratio_disk
                    ));
                }
            }
            Ok(())
        }))
    }
}

pub struct HardFilterPlatformVersions;
impl Stage for HardFilterPlatformVersions {
    fn name(&self) -> &str {
        "hard-filter-platform-versions"
    }
    fn kind(&self) -> StageKind {
        StageKind::Filter
    }
    fn run(
        &self,
        _log: &dyn AllocatorLog,
        _state: &mut StageState,
        servers: Vec<ServerView>,
        ctx: &EvalContext<'_>,
    ) -> Result<StageOutcome, Error> {
        Ok(partition(servers, |view| {
            let sdc_version = &view.server.sdc_version;
            if let Some(min_platform) = ctx.image.min_platform.get(sdc_version) {
                if !platform_at_least(&view.server.platform_timestamp, min_platform) {
                    return Err(format!(
                        "platform {} older than required {min_platform} for SDC {sdc_version}",
                        view.server.platform_timestamp
                    ));
                }
            }
            if let Some(max_platform) = ctx.image.max_platform.get(sdc_version) {
                if !platform_at_most(&view.server.platform_timestamp, max_platform) {
                    return Err(format!(
                        "platform {} newer than permitted {max_platform} for SDC {sdc_version}",
                        view.server.platform_timestamp
                    ));
                }
            }
            Ok(())
        }))
    }
}

pub struct HardFilterFeatureMinPlatform;
impl Stage for HardFilterFeatureMinPlatform {
    fn name(&self) -> &str {
        "hard-filter-feature-min-platform"
    }
    fn kind(&self) -> StageKind {
        StageKind::Filter
    }
    fn run(
        &self,
        _log: &dyn AllocatorLog,
        _state: &mut StageState,
        servers: Vec<ServerView>,
        ctx: &EvalContext<'_>,
    ) -> Result<StageOutcome, Error> {
        let mut required_min: Option<&str> = None;
        if is_docker_brand(ctx.vm) {
            required_min = ctx.defaults.filter_docker_min_platform.as_deref();
        }
        if ctx.package.server_spread.is_some() {
            if let Some(flex_min) = ctx.defaults.filter_flexible_disk_min_platform.as_deref() {
                required_min = Some(required_min.map_or(flex_min, |cur| cur.max(flex_min)));
            }
        }
        if ctx.vm.internal_metadata.contains_key("docker:volumesfrom") {
            let automount_min = if is_docker_brand(ctx.vm) {
                ctx.defaults.filter_docker_nfs_volumes_automount_min_platform.as_deref()
            } else {
                ctx.defaults.filter_non_docker_nfs_volumes_automount_min_platform.as_deref()
            };
            if let Some(automount_min) = automount_min {
                required_min = Some(required_min.map_or(automount_min, |cur| cur.max(automount_min)));
            }
        }
        let Some(required_min) = required_min else {
            return Ok(StageOutcome::kept(servers));
        };
        let required_min = required_min.to_string();
        Ok(partition(servers, |view| {
            if platform_at_least(&view.server.platform_timestamp, &required_min) {
                Ok(())
            } else {
                Err(format!(
                    "platform {} does not meet feature minimum {required_min}",
                    view.server.platform_timestamp
                ))
            }
        }))
    }
}

pub struct HardFilterTraits;
impl Stage for HardFilterTraits {
    fn name(&self) -> &str {
        "hard-filter-traits"
    }
    fn kind(&self) -> StageKind {
        StageKind::Filter
    }
    fn run(
        &self,
        _log: &dyn AllocatorLog,
        _state: &mut StageState,
        servers: Vec<ServerView>,
        ctx: &EvalContext<'_>,
    ) -> Result<StageOutcome, Error> {
        let required = merged_required_traits(ctx);
        Ok(partition(servers, |view| {
            if matches_traits(&required, &view.server.traits) {
                Ok(())
            } else {
                Err("server traits do not satisfy required traits".to_string())
            }
        }))
    }
}

pub struct HardFilterVlans;
impl Stage for HardFilterVlans {
    fn name(&self) -> &str {
        "hard-filter-vlans"
    }
    fn kind(&self) -> StageKind {
        StageKind::Filter
    }
    fn run(
        &self,
        _log: &dyn AllocatorLog,
        _state: &mut StageState,
        servers: Vec<ServerView>,
        ctx: &EvalContext<'_>,
    ) -> Result<StageOutcome, Error> {
        if ctx.vm.nic_tags.is_empty() {
            return Ok(StageOutcome::kept(servers));
        }
        Ok(partition(servers, |view| {
            let reachable = |tag: &str| {
                view.server
                    .network_interfaces
                    .values()
                    .any(|iface| iface.up && iface.nic_names.iter().any(|name| name == tag))
            };
            if ctx.vm.nic_tags.iter().all(|tag| reachable(tag)) {
                Ok(())
            } else {
                Err("server does not reach all required nic tags on an up interface".to_string())
            }
        }))
    }
}

pub struct HardFilterVmCount;
impl Stage for HardFilterVmCount {
    fn name(&self) -> &str {
        "hard-filter-vm-count"
    }
    fn kind(&self) -> StageKind {
        StageKind::Filter
    }
    fn run(
        &self,
        _log: &dyn AllocatorLog,
        _state: &mut StageState,
        servers: Vec<ServerView>,
        ctx: &EvalContext<'_>,
    ) -> Result<StageOutcome, Error> {
        if ctx.defaults.filter_vm_limit == 0 {
            return Ok(StageOutcome::kept(servers));
        }
        let limit = ctx.defaults.filter_vm_limit as usize;
        Ok(partition(servers, |view| {
            let total = view.server.vms.len();
            if total < limit {
                Ok(())
            } else {
                Err(format!("server already hosts {total} VMs (limit {limit})"))
            }
        }))
    }
}

pub struct HardFilterLargeServers;
impl Stage for HardFilterLargeServers {
    fn name(&self) -> &str {
        "hard-filter-large-servers"
    }
    fn kind(&self) -> StageKind {
        StageKind::Filter
    }
    fn run(
        &self,
        _log: &dyn AllocatorLog,
        _state: &mut StageState,
        servers: Vec<ServerView>,
        ctx: &EvalContext<'_>,
    ) -> Result<StageOutcome, Error> {
        if !ctx.defaults.filter_large_servers || servers.len() < 2 {
            return Ok(StageOutcome::kept(servers));
        }

        let excluded_count =
            (servers.len() as f64 * LARGE_SERVER_EXCLUSION_FRACTION).ceil() as usize;
        if excluded_count == 0 {
            return Ok(StageOutcome::kept(servers));
        }

        let mut by_ram: Vec<_> = servers
            .iter()
            .map(|v| (v.server.uuid, v.server.unreserved_ram))
            .collect();
        by_ram.sort_by(|(a_uuid, a_ram), (b_uuid, b_ram)| {
            b_ram.cmp(a_ram).then_with(|| a_uuid.to_string().cmp(&b_uuid.to_string()))
        });
        let excluded: std::collections::HashSet<_> =
            by_ram.into_iter().take(excluded_count).map(|(uuid, _)| uuid).collect();

        Ok(partition(servers, |view| {
            if excluded.contains(&view.server.uuid) {
                Err("server excluded as one of the largest in the candidate set".to_string())
            } else {
                Ok(())
            }
        }))
    }
}

pub struct HardFilterRecentServers;
impl Stage for HardFilterRecentServers {
    fn name(&self) -> &str {
        "hard-filter-recent-servers"
    }
    fn kind(&self) -> StageKind {
        StageKind::Filter
    }
    fn run(
        &self,
        _log: &dyn AllocatorLog,
        state: &mut StageState,
        servers: Vec<ServerView>,
        ctx: &EvalContext<'_>,
    ) -> Result<StageOutcome, Error> {
        state.recent_servers.purge(ctx.now_ms);
        let recent = &state.recent_servers;
        let now_ms = ctx.now_ms;
        Ok(partition(servers, |view| {
            if recent.is_recent(view.server.uuid, now_ms) {
                Err("server was used too recently".to_string())
            } else {
                Ok(())
            }
        }))
    }

    fn post(
        &self,
        _log: &dyn AllocatorLog,
        state: &mut StageState,
        chosen: &ServerView,
        ctx: &EvalContext<'_>,
    ) {
        state.recent_servers.record(chosen.server.uuid, ctx.now_ms);
    }
}

/// Forces a failure when the VM carries
/// `internal_metadata.force_designation_failure`, otherwise passes through
/// unchanged. Used to exercise the facade's forced-failure error path
/// (`SPEC_FULL.md` §7's "Forced-failure" kind).
pub struct HardFilterForceFailure;
impl Stage for HardFilterForceFailure {
    fn name(&self) -> &str {
        "hard-filter-force-failure"
    }
    fn kind(&self) -> StageKind {
        StageKind::Filter
    }
    fn run(
        &self,
        _log: &dyn AllocatorLog,
        _state: &mut StageState,
        servers: Vec<ServerView>,
        ctx: &EvalContext<'_>,
    ) -> Result<StageOutcome, Error> {
        let forced = ctx
            .vm
            .internal_metadata
            .get("force_designation_failure")
            .is_some_and(|v| !matches!(v, serde_json::Value::Bool(false) | serde_json::Value::Null));
        if forced {
            return Err(Error::ForcedFailure(
                "vm internal_metadata.force_designation_failure set".to_string(),
            ));
        }
        Ok(StageOutcome::kept(servers))
    }
}

pub struct HardFilterLocalityHints;
impl Stage for HardFilterLocalityHints {
    fn name(&self) -> &str {
        "hard-filter-locality-hints"
    }
    fn kind(&self) -> StageKind {
        StageKind::Filter
    }
    fn run(
        &self,
        _log: &dyn AllocatorLog,
        _state: &mut StageState,
        servers: Vec<ServerView>,
        ctx: &EvalContext<'_>,
    ) -> Result<StageOutcome, Error> {
        let locality = ctx.locality;
        Ok(partition(servers, |view| {
            if locality.hard_far.contains(&view.server.uuid) {
                return Err("server is in a hard anti-affinity set".to_string());
            }
            if !locality.hard_near.is_empty() && !locality.hard_near.contains(&view.server.uuid) {
                return Err("server is not in the hard affinity set".to_string());
            }
            Ok(())
        }))
    }
}

/// Parses the JSON-encoded UUID list a VM carries under
/// `internal_metadata["docker:volumesfrom"]`, silently skipping entries
/// that are not well-formed UUID strings.
fn volumes_from_uuids(vm: &VmRequest) -> Vec<VmUuid> {
    vm.internal_metadata
        .get("docker:volumesfrom")
        .and_then(|value| value.as_array())
        .into_iter()
        .flatten()
        .filter_map(|entry| entry.as_str())
        .filter_map(|s| VmUuid::parse_str(s).ok())
        .collect()
}

pub struct HardFilterVolumesFrom;
impl Stage for HardFilterVolumesFrom {
    fn name(&self) -> &str {
        "hard-filter-volumes-from"
    }
    fn kind(&self) -> StageKind {
        StageKind::Filter
    }
    fn run(
        &self,
        _log: &dyn AllocatorLog,
        _state: &mut StageState,
        servers: Vec<ServerView>,
        ctx: &EvalContext<'_>,
    ) -> Result<StageOutcome, Error> {
        let required = volumes_from_uuids(ctx.vm);
        if required.is_empty() {
            return Ok(StageOutcome::kept(servers));
        }
        Ok(partition(servers, |view| {
            if required.iter().all(|vm_uuid| view.server.vms.contains_key(vm_uuid)) {
                Ok(())
            } else {
                Err("server does not host every VM named in docker:volumesfrom".to_string())
            }
        }))
    }
}

/// Proposes the subset of `servers` not in the soft anti-affinity set,
/// preferring the soft affinity set when it yields a non-empty result, and
/// otherwise leaves the input unchanged — the general "soft filter" rule
/// (adopt a non-empty proposal, else pass through) applied here directly,
/// per `SPEC_FULL.md` §4.5.
pub struct SoftFilterLocalityHints;
impl Stage for SoftFilterLocalityHints {
    fn name(&self) -> &str {
        "soft-filter-locality-hints"
    }
    fn kind(&self) -> StageKind {
        StageKind::SoftFilter
    }
    fn run(
        &self,
        log: &dyn AllocatorLog,
        _state: &mut StageState,
        servers: Vec<ServerView>,
        ctx: &EvalContext<'_>,
    ) -> Result<StageOutcome, Error> {
        let locality = ctx.locality;
        let without_far: Vec<ServerView> = servers
            .iter()
            .filter(|v| !locality.soft_far.contains(&v.server.uuid))
            .cloned()
            .collect();
        let base = if without_far.is_empty() {
            servers.clone()
        } else {
            without_far
        };

        if locality.soft_near.is_empty() {
            return Ok(StageOutcome::kept(base));
        }
        let preferred: Vec<ServerView> = base
            .iter()
            .filter(|v| locality.soft_near.contains(&v.server.uuid))
            .cloned()
            .collect();
        if preferred.is_empty() {
            log.debug("soft-filter-locality-hints: no server in the preferred set, keeping base");
            Ok(StageOutcome::kept(base))
        } else {
            Ok(StageOutcome::kept(preferred))
        }
    }
}

/// Drops up to 25% of current candidates (the most recently used first);
/// adopts the proposal only if it is non-empty.
pub struct SoftFilterRecentServers;
impl Stage for SoftFilterRecentServers {
    fn name(&self) -> &str {
        "soft-filter-recent-servers"
    }
    fn kind(&self) -> StageKind {
        StageKind::SoftFilter
    }
    fn run(
        &self,
        log: &dyn AllocatorLog,
        state: &mut StageState,
        servers: Vec<ServerView>,
        ctx: &EvalContext<'_>,
    ) -> Result<StageOutcome, Error> {
        state.recent_servers.purge(ctx.now_ms);
        let candidate_uuids: Vec<_> = servers.iter().map(|v| v.server.uuid).collect();
        let max_drop = RecentServerMemory::max_soft_drop(servers.len());
        let to_drop: std::collections::HashSet<_> = state
            .recent_servers
            .most_recent_first(&candidate_uuids)
            .into_iter()
            .take(max_drop)
            .collect();

        let proposal: Vec<ServerView> = servers
            .iter()
            .filter(|v| !to_drop.contains(&v.server.uuid))
            .cloned()
            .collect();

        if proposal.is_empty() {
            log.debug("soft-filter-recent-servers: proposal emptied, keeping original candidates");
            Ok(StageOutcome::kept(servers))
        } else {
            Ok(StageOutcome::kept(proposal))
        }
    }

    fn post(
        &self,
        _log: &dyn AllocatorLog,
        state: &mut StageState,
        chosen: &ServerView,
        ctx: &EvalContext<'_>,
    ) {
        state.recent_servers.record(chosen.server.uuid, ctx.now_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Defaults;
    use crate::locality::ResolvedLocality;
    use crate::model::{Image, Locality, OverprovisionRatios, Package, Server};
    use std::collections::HashMap;
    use triton_core::uuid::{ImageUuid, OwnerUuid, PackageUuid, ServerUuid, VmUuid};

    fn server(status: &str) -> Server {
        Server {
            uuid: ServerUuid::new_v4(),
            status: status.to_string(),
            reserved: false,
            reservoir: false,
            headnode: false,
            platform_timestamp: "20240115T000000Z".to_string(),
            sdc_version: "7.0".to_string(),
            memory_total_bytes: 0,
            memory_available_bytes: 0,
            reservation_ratio: 0.15,
            overprovision_ratios: OverprovisionRatios {
                cpu: Some(4.0),
                ram: Some(1.0),
                disk: Some(1.0),
            },
            disk_pool_size_bytes: 0,
            disk_installed_images_used_bytes: 0,
            disk_zone_quota_bytes: 0,
            disk_kvm_quota_bytes: 0,
            disk_cores_quota_bytes: 0,
            cpu_online_count: Some(32),
            traits: HashMap::new(),
            network_interfaces: HashMap::new(),
            vms: HashMap::new(),
            rack_identifier: None,
            next_reboot_ms: None,
            unreserved_ram: 4096,
            unreserved_cpu: 400.0,
            unreserved_disk: 10_240,
            derivation_ok: true,
        }
    }

    fn ctx_parts() -> (VmRequest, Image, Package, ResolvedLocality, Defaults) {
        let vm = VmRequest {
            uuid: VmUuid::new_v4(),
            owner_uuid: OwnerUuid::new_v4(),
            ram: 1024,
            cpu_cap: Some(100),
            quota: 1024,
            brand: "joyent".to_string(),
            nic_tags: vec![],
            traits: HashMap::new(),
            locality: Locality::default(),
            affinity: vec![],
            image_uuid: ImageUuid::new_v4(),
            package_uuid: PackageUuid::new_v4(),
            tags: HashMap::new(),
            internal_metadata: HashMap::new(),
        };
        let image = Image {
            uuid: vm.image_uuid,
            min_ram: None,
            max_ram: None,
            traits: HashMap::new(),
            min_platform: HashMap::new(),
            max_platform: HashMap::new(),
        };
        let package = Package {
            uuid: vm.package_uuid,
            max_physical_memory: 1024,
            quota: 1024,
            cpu_cap: Some(100),
            traits: HashMap::new(),
            overprovision_ratios: HashMap::new(),
            owner_uuids: vec![],
            server_spread: None,
        };
        (vm, image, package, ResolvedLocality::default(), Defaults::default())
    }

    macro_rules! ctx {
        ($vm:expr, $image:expr, $package:expr, $locality:expr, $defaults:expr) => {
            EvalContext {
                vm: &$vm,
                image: &$image,
                package: &$package,
                locality: &$locality,
                defaults: &$defaults,
                overprovision_ratio_cpu: 4.0,
                overprovision_ratio_ram: 1.0,
                overprovision_ratio_disk: 1.0,
                check_capacity: false,
                now_ms: 0,
                random_seed: Some(42),
            }
        };
    }

    #[test]
    fn hard_filter_running_rejects_non_running() {
        let (vm, image, package, locality, defaults) = ctx_parts();
        let eval_ctx = ctx!(vm, image, package, locality, defaults);
        let mut state = StageState::default();
        let views = vec![ServerView::new(server("running")), ServerView::new(server("offline"))];
        let out = HardFilterRunning
            .run(&crate::log::TracingLog, &mut state, views, &eval_ctx)
            .unwrap();
        assert_eq!(out.servers.len(), 1);
        assert_eq!(out.reasons.len(), 1);
    }

    #[test]
    fn hard_filter_min_ram_honors_defaults_toggle() {
        let (vm, image, package, locality, mut defaults) = ctx_parts();
        defaults.filter_min_resources = false;
        let eval_ctx = ctx!(vm, image, package, locality, defaults);
        let mut state = StageState::default();
        let mut small = server("running");
        small.unreserved_ram = 1;
        let out = HardFilterMinRam
            .run(&crate::log::TracingLog, &mut state, vec![ServerView::new(small)], &eval_ctx)
            .unwrap();
        assert_eq!(out.servers.len(), 1, "filter disabled, should pass through");
    }

    #[test]
    fn hard_filter_min_ram_rejects_undersized() {
        let (vm, image, package, locality, defaults) = ctx_parts();
        let eval_ctx = ctx!(vm, image, package, locality, defaults);
        let mut state = StageState::default();
        let mut small = server("running");
        small.unreserved_ram = 1;
        let out = HardFilterMinRam
            .run(&crate::log::TracingLog, &mut state, vec![ServerView::new(small)], &eval_ctx)
            .unwrap();
        assert!(out.servers.is_empty());
    }

    #[test]
    fn hard_filter_vm_count_drops_servers_at_the_total_limit() {
        let (vm, image, package, locality, mut defaults) = ctx_parts();
        defaults.filter_vm_limit = 2;
        let eval_ctx = ctx!(vm, image, package, locality, defaults);
        let mut state = StageState::default();

        let mut full = server("running");
        for _ in 0..2 {
            full.vms.insert(
                VmUuid::new_v4(),
                crate::model::ResidentVm {
                    max_physical_memory: 256,
                    cpu_cap: None,
                    owner_uuid: OwnerUuid::new_v4(),
                    alias: None,
                    docker_id: None,
                    tags: HashMap::new(),
                },
            );
        }
        let under = server("running");

        let out = HardFilterVmCount
            .run(
                &crate::log::TracingLog,
                &mut state,
                vec![ServerView::new(full.clone()), ServerView::new(under.clone())],
                &eval_ctx,
            )
            .unwrap();
        assert_eq!(out.servers.len(), 1);
        assert_eq!(out.servers[0].server.uuid, under.uuid);
        assert!(out.reasons.iter().any(|(uuid, _)| *uuid == full.uuid));
    }

    #[test]
    fn hard_filter_vm_count_disabled_when_limit_is_zero() {
        let (vm, image, package, locality, mut defaults) = ctx_parts();
        defaults.filter_vm_limit = 0;
        let eval_ctx = ctx!(vm, image, package, locality, defaults);
        let mut state = StageState::default();
        let huge = server("running");
        let out = HardFilterVmCount
            .run(&crate::log::TracingLog, &mut state, vec![ServerView::new(huge)], &eval_ctx)
            .unwrap();
        assert_eq!(out.servers.len(), 1);
    }

    #[test]
    fn hard_filter_force_failure_triggers_on_internal_metadata() {
        let (mut vm, image, package, locality, defaults) = ctx_parts();
        vm.internal_metadata.insert(
            "force_designation_failure".to_string(),
            serde_json::Value::Bool(true),
        );
        let eval_ctx = ctx!(vm, image, package, locality, defaults);
        let mut state = StageState::default();
        let err = HardFilterForceFailure
            .run(&crate::log::TracingLog, &mut state, vec![ServerView::new(server("running"))], &eval_ctx)
            .unwrap_err();
        assert!(matches!(err, Error::ForcedFailure(_)));
    }

    #[test]
    fn hard_filter_recent_servers_rejects_recently_used() {
        let (vm, image, package, locality, defaults) = ctx_parts();
        let eval_ctx = ctx!(vm, image, package, locality, defaults);
        let mut state = StageState::default();
        let view = ServerView::new(server("running"));
        state.recent_servers.record(view.server.uuid, 0);
        let out = HardFilterRecentServers
            .run(&crate::log::TracingLog, &mut state, vec![view], &eval_ctx)
            .unwrap();
        assert!(out.servers.is_empty());
    }

    #[test]
    fn soft_filter_recent_servers_falls_back_when_all_recent() {
        let (vm, image, package, locality, defaults) = ctx_parts();
        let eval_ctx = ctx!(vm, image, package, locality, defaults);
        let mut state = StageState::default();
        let view = ServerView::new(server("running"));
        state.recent_servers.record(view.server.uuid, 0);
        let out = SoftFilterRecentServers
            .run(&crate::log::TracingLog, &mut state, vec![view], &eval_ctx)
            .unwrap();
        assert_eq!(out.servers.len(), 1, "single candidate must survive even if recent");
    }

    #[test]
    fn hard_filter_overprovision_ratios_rejects_mismatch() {
        let (vm, image, package, locality, defaults) = ctx_parts();
        let eval_ctx = ctx!(vm, image, package, locality, defaults);
        let mut state = StageState::default();
        let mut mismatched = server("running");
        mismatched.overprovision_ratios.ram = Some(2.0);
        let out = HardFilterOverprovisionRatios
            .run(&crate::log::TracingLog, &mut state, vec![ServerView::new(mismatched)], &eval_ctx)
            .unwrap();
        assert!(out.servers.is_empty());
    }

    #[test]
    fn hard_filter_large_servers_drops_top_fraction_by_ram() {
        let (vm, image, package, locality, mut defaults) = ctx_parts();
        defaults.filter_large_servers = true;
        let eval_ctx = ctx!(vm, image, package, locality, defaults);
        let mut state = StageState::default();

        let ram_gib = [100u64, 95, 90, 85, 80, 75, 70, 65, 60, 55];
        let views: Vec<_> = ram_gib
            .iter()
            .map(|gib| {
                let mut s = server("running");
                s.memory_total_bytes = gib * 1024 * 1024 * 1024;
                s.unreserved_ram = gib * 1024;
                ServerView::new(s)
            })
            .collect();
        let largest_two: std::collections::HashSet<_> =
            views[0..2].iter().map(|v| v.server.uuid).collect();

        let out = HardFilterLargeServers
            .run(&crate::log::TracingLog, &mut state, views, &eval_ctx)
            .unwrap();
        assert_eq!(out.servers.len(), 8, "top ceil(0.15*10)=2 servers must be dropped");
        assert!(out.servers.iter().all(|v| !largest_two.contains(&v.server.uuid)));
    }

    #[test]
    fn hard_filter_large_servers_disabled_by_default() {
        let (vm, image, package, locality, defaults) = ctx_parts();
        assert!(!defaults.filter_large_servers);
        let eval_ctx = ctx!(vm, image, package, locality, defaults);
        let mut state = StageState::default();
        let mut huge = server("running");
        huge.memory_total_bytes = 1024 * 1024 * 1024 * 1024;
        let out = HardFilterLargeServers
            .run(&crate::log::TracingLog, &mut state, vec![ServerView::new(huge)], &eval_ctx)
            .unwrap();
        assert_eq!(out.servers.len(), 1);
    }

    #[test]
    fn hard_filter_traits_respects_merge_precedence() {
        use crate::model::TraitValue;
        let (mut vm, image, mut package, locality, defaults) = ctx_parts();
        package.traits.insert("rack".to_string(), TraitValue::Str("a".to_string()));
        vm.traits.insert("rack".to_string(), TraitValue::Str("b".to_string()));
        let eval_ctx = ctx!(vm, image, package, locality, defaults);
        let mut state = StageState::default();
        let mut srv = server("running");
        srv.traits.insert("rack".to_string(), TraitValue::Str("b".to_string()));
        let out = HardFilterTraits
            .run(&crate::log::TracingLog, &mut state, vec![ServerView::new(srv)], &eval_ctx)
            .unwrap();
        assert_eq!(out.servers.len(), 1, "VM trait should win over package trait");
    }

    #[test]
    fn hard_filter_large_servers_is_a_noop_with_one_survivor() {
        let (vm, image, package, locality, mut defaults) = ctx_parts();
        defaults.filter_large_servers = true;
        let eval_ctx = ctx!(vm, image, package, locality, defaults);
        let mut state = StageState::default();
        let lone = server("running");
        let out = HardFilterLargeServers
            .run(&crate::log::TracingLog, &mut state, vec![ServerView::new(lone)], &eval_ctx)
            .unwrap();
        assert_eq!(out.servers.len(), 1, "a sole survivor must never be excluded");
    }

    #[test]
    fn hard_filter_platform_versions_looks_up_by_server_sdc_version() {
        let (vm, mut image, package, locality, defaults) = ctx_parts();
        image.min_platform.insert("7.0".to_string(), "20240101T000000Z".to_string());
        image.max_platform.insert("7.0".to_string(), "20241231T000000Z".to_string());
        let eval_ctx = ctx!(vm, image, package, locality, defaults);
        let mut state = StageState::default();

        let mut too_old = server("running");
        too_old.sdc_version = "7.0".to_string();
        too_old.platform_timestamp = "20230101T000000Z".to_string();

        let mut in_range = server("running");
        in_range.sdc_version = "7.0".to_string();
        in_range.platform_timestamp = "20240601T000000Z".to_string();

        let mut too_new = server("running");
        too_new.sdc_version = "7.0".to_string();
        too_new.platform_timestamp = "20250101T000000Z".to_string();

        let mut other_sdc_version = server("running");
        other_sdc_version.sdc_version = "6.5".to_string();
        other_sdc_version.platform_timestamp = "19990101T000000Z".to_string();

        let out = HardFilterPlatformVersions
            .run(
                &crate::log::TracingLog,
                &mut state,
                vec![
                    ServerView::new(too_old.clone()),
                    ServerView::new(in_range.clone()),
                    ServerView::new(too_new.clone()),
                    ServerView::new(other_sdc_version.clone()),
                ],
                &eval_ctx,
            )
            .unwrap();
        let survivors: std::collections::HashSet<_> =
            out.servers.iter().map(|v| v.server.uuid).collect();
        assert!(survivors.contains(&in_range.uuid));
        assert!(survivors.contains(&other_sdc_version.uuid), "no entry for SDC 6.5 means no constraint");
        assert!(!survivors.contains(&too_old.uuid));
        assert!(!survivors.contains(&too_new.uuid));
    }

    #[test]
    fn hard_filter_vlans_requires_an_up_interface_carrying_the_tag() {
        let (mut vm, image, package, locality, defaults) = ctx_parts();
        vm.nic_tags = vec!["external".to_string()];
        let eval_ctx = ctx!(vm, image, package, locality, defaults);
        let mut state = StageState::default();

        let mut reachable = server("running");
        reachable.network_interfaces.insert(
            "net0".to_string(),
            crate::model::NetworkInterface {
                nic_names: vec!["external".to_string()],
                up: true,
            },
        );

        let mut down_interface = server("running");
        down_interface.network_interfaces.insert(
            "net0".to_string(),
            crate::model::NetworkInterface {
                nic_names: vec!["external".to_string()],
                up: false,
            },
        );

        let out = HardFilterVlans
            .run(
                &crate::log::TracingLog,
                &mut state,
                vec![ServerView::new(reachable.clone()), ServerView::new(down_interface.clone())],
                &eval_ctx,
            )
            .unwrap();
        assert_eq!(out.servers.len(), 1);
        assert_eq!(out.servers[0].server.uuid, reachable.uuid);
    }

    #[test]
    fn hard_filter_volumes_from_requires_hosting_every_listed_vm() {
        let (mut vm, image, package, locality, defaults) = ctx_parts();
        let needed = VmUuid::new_v4();
        vm.internal_metadata.insert(
            "docker:volumesfrom".to_string(),
            serde_json::json!([needed.to_string()]),
        );
        let eval_ctx = ctx!(vm, image, package, locality, defaults);
        let mut state = StageState::default();

        let mut hosting = server("running");
        hosting.vms.insert(
            needed,
            crate::model::ResidentVm {
                max_physical_memory: 256,
                cpu_cap: None,
                owner_uuid: OwnerUuid::new_v4(),
                alias: None,
                docker_id: None,
                tags: HashMap::new(),
            },
        );
        let not_hosting = server("running");

        let out = HardFilterVolumesFrom
            .run(
                &crate::log::TracingLog,
                &mut state,
                vec![ServerView::new(hosting.clone()), ServerView::new(not_hosting.clone())],
                &eval_ctx,
            )
            .unwrap();
        assert_eq!(out.servers.len(), 1);
        assert_eq!(out.servers[0].server.uuid, hosting.uuid);
    }
}
