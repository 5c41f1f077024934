//! Server derivation: computes the `unreserved_*` capacity fields from a
//! server's raw sysinfo/zfs fields, and projects in-flight reservation
//! tickets onto a server's resident-VM inventory before that computation
//! runs.

use std::collections::HashMap;

use crate::config::Defaults;
use crate::model::{ResidentVm, Server, Ticket};

const BYTES_PER_MIB: f64 = 1_048_576.0;

/// Projects outstanding tickets onto their target servers' `vms` maps, as
/// if the reserved VM were already resident. Tickets referencing a server
/// not present in `servers` are silently skipped — the allocator facade
/// only ever calls this with tickets drawn from the same snapshot.
pub fn project_tickets(servers: &mut HashMap<triton_core::uuid::ServerUuid, Server>, tickets: &[Ticket]) {
    for ticket in tickets {
        if let Some(server) = servers.get_mut(&ticket.server_uuid) {
            server.vms.insert(
                ticket.vm_uuid,
                ResidentVm {
                    max_physical_memory: ticket.ram,
                    cpu_cap: ticket.cpu_cap,
                    owner_uuid: triton_core::uuid::OwnerUuid::new_v4(),
                    alias: None,
                    docker_id: None,
                    tags: HashMap::new(),
                },
            );
        }
    }
}

/// The per-request overprovision-ratio precedence resolved by
/// [`crate::allocator::Allocator`] before derivation runs (`SPEC_FULL.md`
/// §4.3): `override-overprovisioning`, when enabled, forces every server to
/// use the defaults regardless of what it or its package advertise; when
/// disabled, an explicit package ratio wins, and a dimension neither the
/// package nor `override-overprovisioning` supplies falls through to the
/// server's own advertised ratio (resolved per server, inside
/// [`derive_server`], since that fallback can differ server to server).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OverprovisionOverrides {
    /// Forces every dimension to the defaults, ignoring package/server ratios.
    pub override_enabled: bool,
    /// Package-advertised RAM ratio, if any.
    pub package_ram: Option<f64>,
    /// Package-advertised CPU ratio, if any.
    pub package_cpu: Option<f64>,
    /// Package-advertised disk ratio, if any.
    pub package_disk: Option<f64>,
}

impl OverprovisionOverrides {
    /// No package ratios and no override: every dimension falls through to
    /// the server's own advertised ratio, then the defaults.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }
}

/// Derives the `unreserved_ram`, `unreserved_cpu`, `unreserved_disk`, and
/// `derivation_ok` fields on `server` in place.
///
/// A missing CPU overprovision ratio (after the `overrides` precedence
/// chain falls all the way through to the server's own advertised ratio)
/// means CPU is unbounded (the CPU hard filter becomes a no-op); a missing
/// RAM/disk ratio defaults to `1.0` (no overprovisioning for that
/// resource). A missing `cpu_online_count` cannot be worked around, since
/// there's no meaningful unbounded CPU capacity without knowing the core
/// count — it marks the whole server `derivation_ok: false` and zeroes all
/// three derived fields, the same demotion a malformed sysinfo document
/// would trigger.
pub fn derive_server(server: &mut Server, defaults: &Defaults, overrides: &OverprovisionOverrides) {
    let Some(cpu_online_count) = server.cpu_online_count else {
        server.unreserved_ram = 0;
        server.unreserved_cpu = 0.0;
        server.unreserved_disk = 0;
        server.derivation_ok = false;
        return;
    };

    let ram_ratio = if overrides.override_enabled {
        defaults.overprovision_ratio_ram
    } else {
        overrides
            .package_ram
            .or(server.overprovision_ratios.ram)
            .unwrap_or(defaults.overprovision_ratio_ram)
    };
    let disk_ratio = if overrides.override_enabled {
        defaults.overprovision_ratio_disk
    } else {
        overrides
            .package_disk
            .or(server.overprovision_ratios.disk)
            .unwrap_or(defaults.overprovision_ratio_disk)
    };
    let cpu_ratio = if overrides.override_enabled {
        Some(defaults.overprovision_ratio_cpu)
    } else {
        overrides.package_cpu.or(server.overprovision_ratios.cpu)
    };

    let vm_ram_sum: u64 = server
        .vms
        .values()
        .fold(0u64, |acc, vm| acc.saturating_add(vm.max_physical_memory));
    let vm_cpu_sum: u32 = server
        .vms
        .values()
        .fold(0u32, |acc, vm| acc.saturating_add(vm.cpu_cap.unwrap_or(0)));

    let total_ram_mib = server.memory_total_bytes as f64 / BYTES_PER_MIB;
    let raw_unreserved_ram =
        total_ram_mib * (1.0 - server.reservation_ratio) * ram_ratio - vm_ram_sum as f64;
    server.unreserved_ram = raw_unreserved_ram.max(0.0) as u64;

    server.unreserved_cpu = match cpu_ratio {
        Some(cpu_ratio) => {
            let raw = f64::from(cpu_online_count) * 100.0 * cpu_ratio - f64::from(vm_cpu_sum);
            raw.max(0.0)
        }
        None => f64::INFINITY,
    };

    let pool_mib = server.disk_pool_size_bytes as f64 / BYTES_PER_MIB;
    let images_used_mib = server.disk_installed_images_used_bytes as f64 / BYTES_PER_MIB;
    let kvm_quota_mib = server.disk_kvm_quota_bytes as f64 / BYTES_PER_MIB;
    let cores_quota_mib = server.disk_cores_quota_bytes as f64 / BYTES_PER_MIB;
    let zone_quota_mib = server.disk_zone_quota_bytes as f64 / BYTES_PER_MIB;
    let consumed_mib = images_used_mib + kvm_quota_mib + cores_quota_mib;

    let zone_cost_mib = if zone_quota_mib > consumed_mib {
        zone_quota_mib / disk_ratio
    } else {
        zone_quota_mib
    };
    let raw_unreserved_disk = pool_mib - consumed_mib - zone_cost_mib;
    server.unreserved_disk = raw_unreserved_disk.max(0.0) as u64;

    server.derivation_ok = true;
}
