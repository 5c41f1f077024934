//! The Allocator Facade: the engine's single public entry point.
//!
//! `Allocator::allocate` runs the nine steps `SPEC_FULL.md` §4.11
//! documents: validate inputs, merge constraints (including the
//! `override-overprovisioning` policy and the deprecated `server_spread`
//! sugar), project tickets onto server inventories, derive each server's
//! unreserved capacity, resolve locality/affinity, run the configured
//! pipeline, pick the max-score survivor (ties broken by UUID), fire every
//! stage's post-hook, and return the outcome.

use std::collections::HashMap;
use std::sync::Arc;

use triton_core::uuid::ServerUuid;

use crate::algorithm::{EvalContext, Registry, ServerView, Stage, StageOutcome, StageState};
use crate::capacity::{self, CapacityReport};
use crate::config::Defaults;
use crate::derive::{self, OverprovisionOverrides};
use crate::error::Error;
use crate::filters::*;
use crate::locality::{self, ResolvedLocality};
use crate::log::{AllocatorLog, TracingLog};
use crate::model::{Image, Package, Server, Ticket, VmRequest};
use crate::pipeline::{self, Description};
use crate::scorer::*;
use crate::validation;

/// Everything the caller hands the Facade for one placement decision.
#[derive(Debug, Clone)]
pub struct AllocationRequest {
    /// The fleet snapshot to choose from.
    pub servers: Vec<Server>,
    /// The VM to place.
    pub vm: VmRequest,
    /// The VM's image manifest.
    pub image: Image,
    /// The VM's package.
    pub package: Package,
    /// Open reservation tickets not yet reflected in `servers[].vms`.
    pub tickets: Vec<Ticket>,
    /// When `true`, runs in capacity mode (§4.10): no server is removed,
    /// and the result reports each server's maximum allocatable capacity
    /// instead of a single chosen server.
    pub check_capacity: bool,
    /// Wall-clock time in milliseconds, threaded through explicitly so the
    /// recent-server stages stay pure functions of their inputs (see
    /// `EvalContext::now_ms`).
    pub now_ms: i64,
    /// Seed for `score-uniform-random`; `None` draws from system entropy.
    pub random_seed: Option<u64>,
}

/// One stage's contribution to the allocation's audit trail: how many
/// servers it received versus how many survived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepSummary {
    /// The stage's registry name.
    pub stage: String,
    /// Candidate count entering the stage.
    pub before: usize,
    /// Candidate count leaving the stage.
    pub after: usize,
}

/// The result of one `allocate()` call.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationResult {
    /// The chosen server, or `None` if the pipeline emptied the candidate
    /// set (or `check_capacity` was requested, see `capacity_reports`).
    pub chosen: Option<Server>,
    /// An ordered log of each stage's remaining/removed counts.
    pub steps: Vec<StepSummary>,
    /// `{uuid: reason}` for every server a hard filter rejected.
    pub reasons: HashMap<ServerUuid, String>,
    /// Present only when `check_capacity` was requested: per-server
    /// maximum allocatable RAM/CPU/disk.
    pub capacity_reports: Option<Vec<CapacityReport>>,
}

/// The compute-node placement engine's entry point.
///
/// One `Allocator` owns exactly one `recent_servers` memory (§4.7) and one
/// algorithm registry; `allocate` takes `&mut self` so two overlapping
/// calls on the same instance cannot compile (`SPEC_FULL.md` §5's
/// "Enforcement in Rust" note) — a host that wants concurrent allocations
/// constructs one `Allocator` per worker.
pub struct Allocator {
    registry: Registry,
    description: Description,
    defaults: Defaults,
    log: Arc<dyn AllocatorLog>,
    state: StageState,
}

impl Allocator {
    /// Constructs an allocator with the built-in stage registry and the
    /// default pipeline description (hard filters, then soft filters, then
    /// scorers).
    #[must_use]
    pub fn new(log: Arc<dyn AllocatorLog>, defaults: Defaults) -> Self {
        Self {
            registry: built_in_registry(),
            description: default_description(),
            defaults,
            log,
            state: StageState::default(),
        }
    }

    /// Constructs an allocator with the default [`TracingLog`] sink.
    #[must_use]
    pub fn with_defaults(defaults: Defaults) -> Self {
        Self::new(Arc::new(TracingLog), defaults)
    }

    /// Registers an additional (or replacement) stage.
    pub fn register_stage(&mut self, stage: Arc<dyn Stage>) {
        self.registry.register(stage);
    }

    /// Overrides the pipeline description (the default runs the complete
    /// hard-filter → soft-filter → scorer chain).
    #[must_use]
    pub fn with_description(mut self, description: Description) -> Self {
        self.description = description;
        self
    }

    /// Runs one allocation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InputInvalid`] if the VM, image, package, any
    /// ticket, or the defaults fail validation (step 1); propagates any
    /// error a pipeline stage returns (an unresolved stage name, a forced
    /// test failure).
    pub fn allocate(&mut self, request: AllocationRequest) -> Result<AllocationResult, Error> {
        self.description.validate()?;
        validation::validate_defaults(&self.defaults)?;
        validation::validate_vm(&request.vm)?;
        validation::validate_package(&request.package)?;
        validation::validate_image_ram(request.image.min_ram, request.image.max_ram, request.vm.ram)?;
        for ticket in &request.tickets {
            validation::validate_ticket(ticket)?;
        }

        let overrides = self.resolve_overprovision_overrides(&request.package);
        let defaults = self.effective_defaults(&request.package);

        let mut by_uuid: HashMap<ServerUuid, Server> =
            request.servers.into_iter().map(|s| (s.uuid, s)).collect();
        derive::project_tickets(&mut by_uuid, &request.tickets);
        for server in by_uuid.values_mut() {
            derive::derive_server(server, &defaults, &overrides);
        }

        let refs: Vec<&Server> = by_uuid.values().collect();
        let locality = locality::resolve_locality(&request.vm, &refs);

        let requested_ratio = |package_ratio: Option<f64>, default_ratio: f64| {
            if overrides.override_enabled {
                default_ratio
            } else {
                package_ratio.unwrap_or(default_ratio)
            }
        };
        let ctx = EvalContext {
            vm: &request.vm,
            image: &request.image,
            package: &request.package,
            locality: &locality,
            defaults: &defaults,
            overprovision_ratio_cpu: requested_ratio(overrides.package_cpu, defaults.overprovision_ratio_cpu),
            overprovision_ratio_ram: requested_ratio(overrides.package_ram, defaults.overprovision_ratio_ram),
            overprovision_ratio_disk: requested_ratio(overrides.package_disk, defaults.overprovision_ratio_disk),
            check_capacity: request.check_capacity,
            now_ms: request.now_ms,
            random_seed: request.random_seed,
        };

        let registry = if request.check_capacity {
            capacity::capacity_registry(&self.registry)
        } else {
            self.registry.clone()
        };

        let mut views: Vec<ServerView> = by_uuid.into_values().map(ServerView::new).collect();
        views.sort_by(|a, b| a.server.uuid.to_string().cmp(&b.server.uuid.to_string()));
        let initial_count = views.len();

        let mut steps = vec![StepSummary {
            stage: "initial".to_string(),
            before: initial_count,
            after: initial_count,
        }];

        let outcome = self.run_pipeline(&registry, &ctx, views, &mut steps)?;

        let mut reasons: HashMap<ServerUuid, String> = HashMap::new();
        for (uuid, reason) in &outcome.reasons {
            reasons.entry(*uuid).or_insert_with(|| reason.clone());
        }

        if request.check_capacity {
            return Ok(AllocationResult {
                chosen: None,
                steps,
                reasons,
                capacity_reports: Some(capacity::collect_reports(&outcome.servers)),
            });
        }

        let chosen = pick_winner(&outcome.servers);
        if let Some(winner) = &chosen {
            for stage in self.registry.stages() {
                stage.post(self.log.as_ref(), &mut self.state, winner, &ctx);
            }
        }

        Ok(AllocationResult {
            chosen: chosen.map(|v| v.server),
            steps,
            reasons,
            capacity_reports: None,
        })
    }

    fn run_pipeline(
        &mut self,
        registry: &Registry,
        ctx: &EvalContext<'_>,
        views: Vec<ServerView>,
        steps: &mut Vec<StepSummary>,
    ) -> Result<StageOutcome, Error> {
        let before = views.len();
        let outcome = pipeline::run(
            &self.description,
            registry,
            self.log.as_ref(),
            &mut self.state,
            StageOutcome::kept(views),
            ctx,
        )?;
        steps.push(StepSummary {
            stage: "pipeline".to_string(),
            before,
            after: outcome.servers.len(),
        });
        if outcome.servers.is_empty() && !ctx.check_capacity {
            self.log.info("allocation found no surviving servers");
        }
        Ok(outcome)
    }

    /// Resolves the `SPEC_FULL.md` §4.3 overprovision-ratio precedence for
    /// this request: `override-overprovisioning`, if enabled, forces every
    /// dimension to the defaults; otherwise an explicit package ratio wins,
    /// falling through per server to that server's own advertised ratio.
    fn resolve_overprovision_overrides(&self, package: &Package) -> OverprovisionOverrides {
        OverprovisionOverrides {
            override_enabled: !self.defaults.disable_override_overprovisioning,
            package_ram: package.overprovision_ratios.get("ram").copied(),
            package_cpu: package.overprovision_ratios.get("cpu").copied(),
            package_disk: package.overprovision_ratios.get("disk").copied(),
        }
    }

    /// Applies the deprecated `server_spread` sugar (`SPEC_FULL.md` §9): a
    /// package- or defaults-level spread strategy becomes an extreme
    /// `weight_unreserved_{ram,disk}`, overriding the configured weight for
    /// the run. `random` zeroes both unreserved-resource weights so
    /// `score-uniform-random` alone decides ranking.
    fn effective_defaults(&self, package: &Package) -> Defaults {
        let mut defaults = self.defaults.clone();
        let Some(spread) = package.server_spread.or(self.defaults.server_spread) else {
            return defaults;
        };
        use crate::model::ServerSpread;
        match spread {
            ServerSpread::MaxRam => defaults.weight_unreserved_ram = f64::INFINITY,
            ServerSpread::MinRam => defaults.weight_unreserved_ram = f64::NEG_INFINITY,
            ServerSpread::MaxDisk => defaults.weight_unreserved_disk = f64::INFINITY,
            ServerSpread::MinDisk => defaults.weight_unreserved_disk = f64::NEG_INFINITY,
            ServerSpread::Random => {
                defaults.weight_unreserved_ram = 0.0;
                defaults.weight_unreserved_disk = 0.0;
            }
        }
        defaults
    }
}

/// Picks the maximum-score survivor; ties are broken by the
/// lexicographically smallest UUID string, per `SPEC_FULL.md` §4.6/§4.11.
fn pick_winner(servers: &[ServerView]) -> Option<ServerView> {
    servers
        .iter()
        .cloned()
        .reduce(|best, candidate| {
            if candidate.score > best.score {
                candidate
            } else if candidate.score < best.score {
                best
            } else if candidate.server.uuid.to_string() < best.server.uuid.to_string() {
                candidate
            } else {
                best
            }
        })
}

/// The default algorithm description: the complete hard-filter chain, then
/// the soft filters, then the scorers, in the order `SPEC_FULL.md` §4.4–4.6
/// lists them.
#[must_use]
pub fn default_description() -> Description {
    Description::pipe_of([
        "hard-filter-force-failure",
        "hard-filter-invalid-servers",
        "hard-filter-setup",
        "hard-filter-running",
        "hard-filter-reserved",
        "hard-filter-reservoir",
        "hard-filter-headnode",
        "hard-filter-virtual-servers",
        "hard-filter-min-ram",
        "hard-filter-min-cpu",
        "hard-filter-min-disk",
        "hard-filter-min-free-disk",
        "hard-filter-overprovision-ratios",
        "hard-filter-platform-versions",
        "hard-filter-feature-min-platform",
        "hard-filter-traits",
        "hard-filter-vlans",
        "hard-filter-vm-count",
        "hard-filter-volumes-from",
        "hard-filter-locality-hints",
        "hard-filter-large-servers",
        "hard-filter-recent-servers",
        "soft-filter-locality-hints",
        "soft-filter-recent-servers",
        "score-current-platform",
        "score-next-reboot",
        "score-num-owner-zones",
        "score-unreserved-ram",
        "score-unreserved-disk",
        "score-uniform-random",
    ])
}

/// Builds the registry of built-in stages, by name as documented in
/// `SPEC_FULL.md` §4.4–§4.7.
#[must_use]
pub fn built_in_registry() -> Registry {
    let mut registry = Registry::new();
    registry.register(Arc::new(HardFilterForceFailure));
    registry.register(Arc::new(HardFilterInvalidServers));
    registry.register(Arc::new(HardFilterSetup));
    registry.register(Arc::new(HardFilterRunning));
    registry.register(Arc::new(HardFilterReserved));
    registry.register(Arc::new(HardFilterReservoir));
    registry.register(Arc::new(HardFilterHeadnode));
    registry.register(Arc::new(HardFilterVirtualServers));
    registry.register(Arc::new(HardFilterMinRam));
    registry.register(Arc::new(HardFilterMinCpu));
    registry.register(Arc::new(HardFilterMinDisk));
    registry.register(Arc::new(HardFilterMinFreeDisk));
    registry.register(Arc::new(HardFilterOverprovisionRatios));
    registry.register(Arc::new(HardFilterPlatformVersions));
    registry.register(Arc::new(HardFilterFeatureMinPlatform));
    registry.register(Arc::new(HardFilterTraits));
    registry.register(Arc::new(HardFilterVlans));
    registry.register(Arc::new(HardFilterVmCount));
    registry.register(Arc::new(HardFilterVolumesFrom));
    registry.register(Arc::new(HardFilterLocalityHints));
    registry.register(Arc::new(HardFilterLargeServers));
    registry.register(Arc::new(HardFilterRecentServers));
    registry.register(Arc::new(SoftFilterLocalityHints));
    registry.register(Arc::new(SoftFilterRecentServers));
    registry.register(Arc::new(ScoreCurrentPlatform));
    registry.register(Arc::new(ScoreNextReboot));
    registry.register(Arc::new(ScoreNumOwnerZones));
    registry.register(Arc::new(ScoreUnreservedRam));
    registry.register(Arc::new(ScoreUnreservedDisk));
    registry.register(Arc::new(ScoreUniformRandom));
    registry
}
