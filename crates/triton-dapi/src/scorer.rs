//! The scorer framework and built-in scorers.
//!
//! Every scorer ranks the surviving servers along one dimension and adds a
//! non-negative contribution to [`ServerView::score`], scaled by the
//! scorer's configured weight. A negative weight inverts which end of the
//! ranking is rewarded (the spec's "formerly-largest becomes smallest")
//! while the contribution itself stays non-negative, since it is always
//! `normalized_rank * weight.abs()`.

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::algorithm::{EvalContext, ServerView, Stage, StageKind, StageOutcome, StageState};
use crate::error::Error;
use crate::log::AllocatorLog;

/// Ranks `servers` ascending by `values` (same length, same order) and adds
/// `normalized_rank * weight.abs()` to each server's score, where
/// `normalized_rank` runs from `0.0` (smallest value) to `1.0` (largest
/// value) — or the reverse, when `weight` is negative. A single survivor,
/// or a zero weight, contributes nothing (there is no ranking to speak
/// of, or nothing to scale it by).
///
/// The `normalized > 0.0` guard keeps an infinite weight (used by the
/// `server_spread` sugar, see `crate::allocator`) from producing
/// `0.0 * f64::INFINITY = NaN` for the worst-ranked server.
fn apply_rank_score(servers: &mut [ServerView], weight: f64, values: &[f64]) {
    let n = servers.len();
    if n <= 1 || weight == 0.0 {
        return;
    }
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        values[a]
            .partial_cmp(&values[b])
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| servers[a].server.uuid.to_string().cmp(&servers[b].server.uuid.to_string()))
    });
    for (rank, &i) in order.iter().enumerate() {
        let rank = if weight < 0.0 { n - 1 - rank } else { rank };
        let normalized = rank as f64 / (n - 1) as f64;
        if normalized > 0.0 {
            servers[i].score += normalized * weight.abs();
        }
    }
}

/// Converts a SmartOS platform timestamp (`YYYYMMDDTHHMMSSZ`) into a
/// numeric value preserving its lexicographic order, by dropping the
/// fixed `T`/`Z` separators.
fn platform_numeric(timestamp: &str) -> f64 {
    timestamp
        .chars()
        .filter(char::is_ascii_digit)
        .collect::<String>()
        .parse::<f64>()
        .unwrap_or(0.0)
}

/// Newer `Live Image` platform ⇒ higher score. Weight `weight_current_platform`.
pub struct ScoreCurrentPlatform;
impl Stage for ScoreCurrentPlatform {
    fn name(&self) -> &str {
        "score-current-platform"
    }
    fn kind(&self) -> StageKind {
        StageKind::Scorer
    }
    fn run(
        &self,
        _log: &dyn AllocatorLog,
        _state: &mut StageState,
        mut servers: Vec<ServerView>,
        ctx: &EvalContext<'_>,
    ) -> Result<StageOutcome, Error> {
        let values: Vec<f64> = servers
            .iter()
            .map(|v| platform_numeric(&v.server.platform_timestamp))
            .collect();
        apply_rank_score(&mut servers, ctx.defaults.weight_current_platform, &values);
        Ok(StageOutcome::kept(servers))
    }
}

/// Farther-in-the-future scheduled reboot ⇒ higher score; a server with no
/// scheduled reboot ranks as farthest. Weight `weight_next_reboot`.
pub struct ScoreNextReboot;
impl Stage for ScoreNextReboot {
    fn name(&self) -> &str {
        "score-next-reboot"
    }
    fn kind(&self) -> StageKind {
        StageKind::Scorer
    }
    fn run(
        &self,
        _log: &dyn AllocatorLog,
        _state: &mut StageState,
        mut servers: Vec<ServerView>,
        ctx: &EvalContext<'_>,
    ) -> Result<StageOutcome, Error> {
        let values: Vec<f64> = servers
            .iter()
            .map(|v| v.server.next_reboot_ms.map_or(f64::INFINITY, |ms| ms as f64))
            .collect();
        apply_rank_score(&mut servers, ctx.defaults.weight_next_reboot, &values);
        Ok(StageOutcome::kept(servers))
    }
}

/// Fewer VMs owned by the requesting account on a server ⇒ higher score.
/// Weight `weight_num_owner_zones`.
pub struct ScoreNumOwnerZones;
impl Stage for ScoreNumOwnerZones {
    fn name(&self) -> &str {
        "score-num-owner-zones"
    }
    fn kind(&self) -> StageKind {
        StageKind::Scorer
    }
    fn run(
        &self,
        _log: &dyn AllocatorLog,
        _state: &mut StageState,
        mut servers: Vec<ServerView>,
        ctx: &EvalContext<'_>,
    ) -> Result<StageOutcome, Error> {
        let owner = ctx.vm.owner_uuid;
        let values: Vec<f64> = servers
            .iter()
            .map(|v| {
                let owned = v
                    .server
                    .vms
                    .values()
                    .filter(|resident| resident.owner_uuid == owner)
                    .count();
                -(owned as f64)
            })
            .collect();
        apply_rank_score(&mut servers, ctx.defaults.weight_num_owner_zones, &values);
        Ok(StageOutcome::kept(servers))
    }
}

/// More unreserved RAM ⇒ higher score. Weight `weight_unreserved_ram`.
pub struct ScoreUnreservedRam;
impl Stage for ScoreUnreservedRam {
    fn name(&self) -> &str {
        "score-unreserved-ram"
    }
    fn kind(&self) -> StageKind {
        StageKind::Scorer
    }
    fn run(
        &self,
        _log: &dyn AllocatorLog,
        _state: &mut StageState,
        mut servers: Vec<ServerView>,
        ctx: &EvalContext<'_>,
    ) -> Result<StageOutcome, Error> {
        let values: Vec<f64> = servers.iter().map(|v| v.server.unreserved_ram as f64).collect();
        apply_rank_score(&mut servers, ctx.defaults.weight_unreserved_ram, &values);
        Ok(StageOutcome::kept(servers))
    }
}

/// More unreserved disk ⇒ higher score. Weight `weight_unreserved_disk`.
pub struct ScoreUnreservedDisk;
impl Stage for ScoreUnreservedDisk {
    fn name(&self) -> &str {
        "score-unreserved-disk"
    }
    fn kind(&self) -> StageKind {
        StageKind::Scorer
    }
    fn run(
        &self,
        _log: &dyn AllocatorLog,
        _state: &mut StageState,
        mut servers: Vec<ServerView>,
        ctx: &EvalContext<'_>,
    ) -> Result<StageOutcome, Error> {
        let values: Vec<f64> = servers.iter().map(|v| v.server.unreserved_disk as f64).collect();
        apply_rank_score(&mut servers, ctx.defaults.weight_unreserved_disk, &values);
        Ok(StageOutcome::kept(servers))
    }
}

/// A uniform-random contribution, deterministic when
/// [`EvalContext::random_seed`] is set (e.g. for tests), drawn from system
/// entropy otherwise. Weight `weight_uniform_random`.
pub struct ScoreUniformRandom;
impl Stage for ScoreUniformRandom {
    fn name(&self) -> &str {
        "score-uniform-random"
    }
    fn kind(&self) -> StageKind {
        StageKind::Scorer
    }
    fn run(
        &self,
        _log: &dyn AllocatorLog,
        _state: &mut StageState,
        mut servers: Vec<ServerView>,
        ctx: &EvalContext<'_>,
    ) -> Result<StageOutcome, Error> {
        let mut rng = match ctx.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let values: Vec<f64> = servers.iter().map(|_| rng.gen::<f64>()).collect();
        apply_rank_score(&mut servers, ctx.defaults.weight_uniform_random, &values);
        Ok(StageOutcome::kept(servers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Defaults;
    use crate::locality::ResolvedLocality;
    use crate::model::{Image, Locality, OverprovisionRatios, Package, Server, VmRequest};
    use std::collections::HashMap;
    use triton_core::uuid::{ImageUuid, OwnerUuid, PackageUuid, ServerUuid, VmUuid};

    fn server(unreserved_ram: u64, platform: &str) -> Server {
        Server {
            uuid: ServerUuid::new_v4(),
            status: "running".to_string(),
            reserved: false,
            reservoir: false,
            headnode: false,
            platform_timestamp: platform.to_string(),
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
            unreserved_ram,
            unreserved_cpu: 0.0,
            unreserved_disk: 0,
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
                random_seed: Some(7),
            }
        };
    }

    #[test]
    fn more_unreserved_ram_scores_higher() {
        let (vm, image, package, locality, defaults) = ctx_parts();
        let eval_ctx = ctx!(vm, image, package, locality, defaults);
        let mut state = StageState::default();
        let small = ServerView::new(server(100, "20240115T000000Z"));
        let big = ServerView::new(server(9000, "20240115T000000Z"));
        let out = ScoreUnreservedRam
            .run(&crate::log::TracingLog, &mut state, vec![small, big], &eval_ctx)
            .unwrap();
        assert!(out.servers[1].score > out.servers[0].score);
    }

    #[test]
    fn negative_weight_inverts_ranking() {
        let (vm, image, package, locality, mut defaults) = ctx_parts();
        defaults.weight_unreserved_ram = -2.0;
        let eval_ctx = ctx!(vm, image, package, locality, defaults);
        let mut state = StageState::default();
        let small = ServerView::new(server(100, "20240115T000000Z"));
        let big = ServerView::new(server(9000, "20240115T000000Z"));
        let out = ScoreUnreservedRam
            .run(&crate::log::TracingLog, &mut state, vec![small, big], &eval_ctx)
            .unwrap();
        assert!(out.servers[0].score > out.servers[1].score);
        assert!(out.servers.iter().all(|v| v.score >= 0.0));
    }

    #[test]
    fn zero_weight_contributes_nothing() {
        let (vm, image, package, locality, mut defaults) = ctx_parts();
        defaults.weight_unreserved_ram = 0.0;
        let eval_ctx = ctx!(vm, image, package, locality, defaults);
        let mut state = StageState::default();
        let views = vec![
            ServerView::new(server(100, "20240115T000000Z")),
            ServerView::new(server(9000, "20240115T000000Z")),
        ];
        let out = ScoreUnreservedRam
            .run(&crate::log::TracingLog, &mut state, views, &eval_ctx)
            .unwrap();
        assert!(out.servers.iter().all(|v| v.score == 0.0));
    }

    #[test]
    fn single_survivor_gets_no_contribution() {
        let (vm, image, package, locality, defaults) = ctx_parts();
        let eval_ctx = ctx!(vm, image, package, locality, defaults);
        let mut state = StageState::default();
        let out = ScoreUnreservedRam
            .run(
                &crate::log::TracingLog,
                &mut state,
                vec![ServerView::new(server(100, "20240115T000000Z"))],
                &eval_ctx,
            )
            .unwrap();
        assert_eq!(out.servers[0].score, 0.0);
    }

    #[test]
    fn newer_platform_scores_higher() {
        let (vm, image, package, locality, defaults) = ctx_parts();
        let eval_ctx = ctx!(vm, image, package, locality, defaults);
        let mut state = StageState::default();
        let old = ServerView::new(server(0, "20200101T000000Z"));
        let new = ServerView::new(server(0, "20240115T000000Z"));
        let out = ScoreCurrentPlatform
            .run(&crate::log::TracingLog, &mut state, vec![old, new], &eval_ctx)
            .unwrap();
        assert!(out.servers[1].score > out.servers[0].score);
    }

    #[test]
    fn no_scheduled_reboot_ranks_farthest() {
        let (vm, image, package, locality, defaults) = ctx_parts();
        let eval_ctx = ctx!(vm, image, package, locality, defaults);
        let mut state = StageState::default();
        let mut soon = server(0, "20240115T000000Z");
        soon.next_reboot_ms = Some(1_000);
        let mut never = server(0, "20240115T000000Z");
        never.next_reboot_ms = None;
        let out = ScoreNextReboot
            .run(
                &crate::log::TracingLog,
                &mut state,
                vec![ServerView::new(soon), ServerView::new(never)],
                &eval_ctx,
            )
            .unwrap();
        assert!(out.servers[1].score > out.servers[0].score);
    }

    #[test]
    fn fewer_owner_zones_scores_higher() {
        let (vm, image, package, locality, defaults) = ctx_parts();
        let owner = vm.owner_uuid;
        let eval_ctx = ctx!(vm, image, package, locality, defaults);
        let mut state = StageState::default();
        let mut crowded = server(0, "20240115T000000Z");
        crowded.vms.insert(
            VmUuid::new_v4(),
            crate::model::ResidentVm {
                max_physical_memory: 256,
                cpu_cap: None,
                owner_uuid: owner,
                alias: None,
                docker_id: None,
                tags: HashMap::new(),
            },
        );
        let empty = server(0, "20240115T000000Z");
        let out = ScoreNumOwnerZones
            .run(
                &crate::log::TracingLog,
                &mut state,
                vec![ServerView::new(crowded), ServerView::new(empty)],
                &eval_ctx,
            )
            .unwrap();
        assert!(out.servers[1].score > out.servers[0].score);
    }

    #[test]
    fn uniform_random_is_deterministic_given_seed() {
        let (vm, image, package, locality, defaults) = ctx_parts();
        let eval_ctx = ctx!(vm, image, package, locality, defaults);
        let views = || {
            vec![
                ServerView::new(server(100, "20240115T000000Z")),
                ServerView::new(server(200, "20240115T000000Z")),
                ServerView::new(server(300, "20240115T000000Z")),
            ]
        };
        let mut state_a = StageState::default();
        let out_a = ScoreUniformRandom
            .run(&crate::log::TracingLog, &mut state_a, views(), &eval_ctx)
            .unwrap();
        let mut state_b = StageState::default();
        let out_b = ScoreUniformRandom
            .run(&crate::log::TracingLog, &mut state_b, views(), &eval_ctx)
            .unwrap();
        let scores_a: Vec<f64> = out_a.servers.iter().map(|v| v.score).collect();
        let scores_b: Vec<f64> = out_b.servers.iter().map(|v| v.score).collect();
        assert_eq!(scores_a, scores_b);
    }

    #[test]
    fn scorer_stage_does_not_affect_capacity() {
        assert!(!ScoreUnreservedRam.affects_capacity());
    }
}
