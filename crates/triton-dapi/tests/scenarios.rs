//! Black-box scenario tests for the placement engine, driven entirely
//! through the public [`triton_dapi::Allocator`] facade.

use std::collections::HashMap;

use triton_core::uuid::{ImageUuid, OwnerUuid, PackageUuid, ServerUuid, VmUuid};
use triton_dapi::model::{
    Image, Locality, OverprovisionRatios, Package, ResidentVm, Server, Ticket, VmRequest,
};
use triton_dapi::{AllocationRequest, Allocator, Defaults};

fn server_with_ram_gib(ram_gib: u64) -> Server {
    Server {
        uuid: ServerUuid::new_v4(),
        status: "running".to_string(),
        reserved: false,
        reservoir: false,
        headnode: false,
        platform_timestamp: "20240115T000000Z".to_string(),
        sdc_version: "7.0".to_string(),
        memory_total_bytes: ram_gib * 1024 * 1024 * 1024,
        memory_available_bytes: ram_gib * 1024 * 1024 * 1024,
        reservation_ratio: 0.15,
        overprovision_ratios: OverprovisionRatios {
            cpu: Some(4.0),
            ram: Some(1.0),
            disk: Some(1.0),
        },
        disk_pool_size_bytes: 2 * 1024 * 1024 * 1024 * 1024,
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
        unreserved_ram: 0,
        unreserved_cpu: 0.0,
        unreserved_disk: 0,
        derivation_ok: true,
    }
}

fn vm_request(ram: u64) -> VmRequest {
    VmRequest {
        uuid: VmUuid::new_v4(),
        owner_uuid: OwnerUuid::new_v4(),
        ram,
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
    }
}

fn image_for(vm: &VmRequest) -> Image {
    Image {
        uuid: vm.image_uuid,
        min_ram: None,
        max_ram: None,
        traits: HashMap::new(),
        min_platform: HashMap::new(),
        max_platform: HashMap::new(),
    }
}

fn package_for(vm: &VmRequest) -> Package {
    Package {
        uuid: vm.package_uuid,
        max_physical_memory: vm.ram,
        quota: vm.quota,
        cpu_cap: vm.cpu_cap,
        traits: HashMap::new(),
        overprovision_ratios: HashMap::new(),
        owner_uuids: vec![],
        server_spread: None,
    }
}

fn request(servers: Vec<Server>, vm: VmRequest, now_ms: i64) -> AllocationRequest {
    let image = image_for(&vm);
    let package = package_for(&vm);
    AllocationRequest {
        servers,
        vm,
        image,
        package,
        tickets: vec![],
        check_capacity: false,
        now_ms,
        random_seed: Some(1),
    }
}

/// S1 — trivial fit: one server, no resident VMs, 2048 MiB VM request.
/// Expected: that server is chosen with unreserved_ram ~= 55705 MiB.
#[test]
fn s1_trivial_fit() {
    let server = server_with_ram_gib(64);
    let expected_uuid = server.uuid;
    let vm = vm_request(2048);
    let mut allocator = Allocator::with_defaults(Defaults::default());
    let result = allocator.allocate(request(vec![server], vm, 0)).unwrap();

    let chosen = result.chosen.expect("the only server should be chosen");
    assert_eq!(chosen.uuid, expected_uuid);
    assert!(
        (chosen.unreserved_ram as i64 - 55_705).abs() <= 1,
        "unreserved_ram was {}",
        chosen.unreserved_ram
    );
}

/// S2 — no-fit: a 2048 MiB request against a server whose derived
/// unreserved RAM falls well short. Expected: allocation fails, with the
/// rejection reason naming the RAM shortfall.
#[test]
fn s2_no_fit_insufficient_ram() {
    let mut server = server_with_ram_gib(1);
    server.memory_total_bytes = 1_024 * 1024 * 1024; // 1 GiB total
    let uuid = server.uuid;
    let vm = vm_request(2048);
    let mut allocator = Allocator::with_defaults(Defaults::default());
    let result = allocator.allocate(request(vec![server], vm, 0)).unwrap();

    assert!(result.chosen.is_none());
    let reason = result.reasons.get(&uuid).expect("server should carry a rejection reason");
    assert!(
        reason.contains("unreserved_ram") || reason.to_lowercase().contains("ram"),
        "reason was: {reason}"
    );
}

/// S5 — large-server preservation: 10 servers with RAM 100, 95, ..., 55
/// (GiB); `hard-filter-large-servers` drops the top ceil(0.15*10) = 2 (the
/// 100 and 95 GiB servers) once `filter-large-servers` is enabled.
#[test]
fn s5_large_server_preservation() {
    let ram_gib = [100u64, 95, 90, 85, 80, 75, 70, 65, 60, 55];
    let servers: Vec<Server> = ram_gib.iter().map(|gib| server_with_ram_gib(*gib)).collect();
    let largest_two: std::collections::HashSet<_> =
        servers[0..2].iter().map(|s| s.uuid).collect();

    let vm = vm_request(1024);
    let defaults = Defaults::default().with_filter_large_servers(true);
    let mut allocator = Allocator::with_defaults(defaults);
    let result = allocator.allocate(request(servers, vm, 0)).unwrap();

    let chosen = result.chosen.expect("one of the 8 smaller servers should be chosen");
    assert!(
        !largest_two.contains(&chosen.uuid),
        "the two largest servers must have been excluded from placement"
    );
}

/// S6 — recent-server soft drop: the allocator picks server X, then within
/// the recent-server TTL a second identical call arrives with the same 10
/// candidates (including X). X should be dropped from the pool X was
/// chosen from (9 remain) rather than chosen again back-to-back, since the
/// soft filter only drops up to 25% of candidates.
#[test]
fn s6_recent_server_soft_drop() {
    let servers: Vec<Server> = (0..10).map(|_| server_with_ram_gib(64)).collect();
    let mut allocator = Allocator::with_defaults(Defaults::default());

    let vm1 = vm_request(1024);
    let first = allocator
        .allocate(request(servers.clone(), vm1, 0))
        .unwrap();
    let chosen_uuid = first.chosen.expect("first call should choose a server").uuid;

    let vm2 = vm_request(1024);
    let second = allocator
        .allocate(request(servers, vm2, 500))
        .unwrap();
    let chosen_again = second.chosen.expect("second call should still place the VM");
    assert_ne!(
        chosen_again.uuid, chosen_uuid,
        "the recently-used server should not be chosen again within the TTL"
    );
}

/// Capacity mode never removes a server outright; it annotates each with
/// whether it would have passed the hard-filter chain.
#[test]
fn capacity_mode_reports_every_server() {
    let servers = vec![server_with_ram_gib(64), server_with_ram_gib(1)];
    let mut too_small = servers[1].clone();
    too_small.memory_total_bytes = 512 * 1024 * 1024;
    let servers = vec![servers[0].clone(), too_small];

    let vm = vm_request(4096);
    let mut req = request(servers, vm, 0);
    req.check_capacity = true;

    let mut allocator = Allocator::with_defaults(Defaults::default());
    let result = allocator.allocate(req).unwrap();

    assert!(result.chosen.is_none());
    let reports = result.capacity_reports.expect("capacity mode must report per-server capacity");
    assert_eq!(reports.len(), 2);
    assert!(reports.iter().any(|r| r.would_pass));
    assert!(reports.iter().any(|r| !r.would_pass));
}

/// Reservation tickets reduce a server's derived unreserved capacity as if
/// the reserved VM were already resident.
#[test]
fn tickets_reduce_server_capacity() {
    let server = server_with_ram_gib(8);
    let server_uuid = server.uuid;
    let vm = vm_request(4096);
    let ticket = Ticket {
        server_uuid,
        vm_uuid: VmUuid::new_v4(),
        ram: 6000,
        quota: 1024,
        cpu_cap: Some(100),
    };
    let mut req = request(vec![server], vm, 0);
    req.tickets = vec![ticket];

    let mut allocator = Allocator::with_defaults(Defaults::default());
    let result = allocator.allocate(req).unwrap();
    assert!(
        result.chosen.is_none(),
        "the ticketed reservation should leave too little room for the new VM"
    );
}

/// A resident VM already on a server is reflected the same way a
/// projected ticket is: it reduces unreserved capacity for a new request.
#[test]
fn resident_vms_are_already_accounted_for() {
    let mut server = server_with_ram_gib(8);
    server.vms.insert(
        VmUuid::new_v4(),
        ResidentVm {
            max_physical_memory: 7000,
            cpu_cap: Some(100),
            owner_uuid: OwnerUuid::new_v4(),
            alias: Some("existing-vm".to_string()),
            docker_id: None,
            tags: HashMap::new(),
        },
    );
    let vm = vm_request(2048);
    let mut allocator = Allocator::with_defaults(Defaults::default());
    let result = allocator.allocate(request(vec![server], vm, 0)).unwrap();
    assert!(result.chosen.is_none());
}
