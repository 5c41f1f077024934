//! The pipeline interpreter: a small recursive combinator language over
//! named algorithm stages, built from `pipe` (sequential composition,
//! short-circuiting once a stage empties the candidate set) and `or`
//! (first non-empty alternative, or the last alternative's output if every
//! branch empties out).

use crate::algorithm::{EvalContext, Registry, StageOutcome, StageState};
use crate::error::Error;
use crate::log::AllocatorLog;

/// An algorithm description: either a single named stage, a sequential
/// `pipe` of sub-descriptions, or a fallback `or` of sub-descriptions.
#[derive(Debug, Clone, PartialEq)]
pub enum Description {
    /// A single registered stage, by name.
    Stage(String),
    /// Runs each child in order; once a child empties the candidate set
    /// (outside capacity mode), the pipe short-circuits and returns that
    /// empty result immediately.
    Pipe(Vec<Description>),
    /// Runs each child against the *same* input and returns the first
    /// child whose output is non-empty; if every child empties out,
    /// returns the last child's output.
    Or(Vec<Description>),
}

impl Description {
    /// Builds a `pipe` from an iterator of stage names.
    pub fn pipe_of<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Pipe(names.into_iter().map(|n| Self::Stage(n.into())).collect())
    }

    /// Validates that no `pipe`/`or` node is empty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAlgorithmDescription`] if any `Pipe`/`Or`
    /// node has no children.
    pub fn validate(&self) -> Result<(), Error> {
        match self {
            Self::Stage(_) => Ok(()),
            Self::Pipe(children) | Self::Or(children) => {
                if children.is_empty() {
                    return Err(Error::InvalidAlgorithmDescription(
                        "pipe/or must have at least one child".to_string(),
                    ));
                }
                children.iter().try_for_each(Self::validate)
            }
        }
    }
}

/// Runs an algorithm description against the current candidate set.
///
/// # Errors
///
/// Propagates any error a stage returns (an unresolved stage name, a
/// forced test failure) and [`Error::InvalidAlgorithmDescription`] if
/// `description` is structurally invalid.
pub fn run(
    description: &Description,
    registry: &Registry,
    log: &dyn AllocatorLog,
    state: &mut StageState,
    outcome: StageOutcome,
    ctx: &EvalContext<'_>,
) -> Result<StageOutcome, Error> {
    match description {
        Description::Stage(name) => {
            let stage = registry.resolve(name)?;
            stage.run(log, state, outcome.servers, ctx).map(|mut next| {
                let mut reasons = outcome.reasons;
                reasons.append(&mut next.reasons);
                next.reasons = reasons;
                next
            })
        }
        Description::Pipe(children) => {
            if children.is_empty() {
                return Err(Error::InvalidAlgorithmDescription(
                    "pipe must have at least one child".to_string(),
                ));
            }
            let mut current = outcome;
            for child in children {
                current = run(child, registry, log, state, current, ctx)?;
                if current.servers.is_empty() && !ctx.check_capacity {
                    log.debug("pipe short-circuited: candidate set emptied");
                    return Ok(current);
                }
            }
            Ok(current)
        }
        Description::Or(children) => {
            if children.is_empty() {
                return Err(Error::InvalidAlgorithmDescription(
                    "or must have at least one child".to_string(),
                ));
            }
            let mut last = None;
            for child in children {
                let attempt = run(child, registry, log, state, outcome.clone(), ctx)?;
                if !attempt.servers.is_empty() || ctx.check_capacity {
                    return Ok(attempt);
                }
                last = Some(attempt);
            }
            Ok(last.expect("or always evaluates at least one child"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::{ServerView, Stage, StageKind};
    use crate::config::Defaults;
    use crate::locality::ResolvedLocality;
    use crate::model::{Image, Locality, Package, VmRequest};
    use std::collections::HashMap;
    use std::sync::Arc;
    use triton_core::uuid::{ImageUuid, OwnerUuid, PackageUuid, VmUuid};

    struct KeepEven;
    impl Stage for KeepEven {
        fn name(&self) -> &str {
            "keep-even"
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
            let mut kept = Vec::new();
            let mut reasons = Vec::new();
            for (i, view) in servers.into_iter().enumerate() {
                if i % 2 == 0 {
                    kept.push(view);
                } else {
                    reasons.push((view.server.uuid, "odd index".to_string()));
                }
            }
            Ok(StageOutcome {
                servers: kept,
                reasons,
            })
        }
    }

    struct RejectAll;
    impl Stage for RejectAll {
        fn name(&self) -> &str {
            "reject-all"
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
            let reasons = servers
                .iter()
                .map(|v| (v.server.uuid, "rejected".to_string()))
                .collect();
            Ok(StageOutcome {
                servers: Vec::new(),
                reasons,
            })
        }
    }

    fn sample_servers(n: usize) -> Vec<ServerView> {
        use crate::model::{OverprovisionRatios, Server};
        (0..n)
            .map(|_| {
                ServerView::new(Server {
                    uuid: triton_core::uuid::ServerUuid::new_v4(),
                    status: "running".to_string(),
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
                    unreserved_ram: 0,
                    unreserved_cpu: 0.0,
                    unreserved_disk: 0,
                    derivation_ok: true,
                })
            })
            .collect()
    }

    fn sample_ctx() -> (VmRequest, Image, Package, ResolvedLocality, Defaults) {
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

    #[test]
    fn pipe_short_circuits_on_empty() {
        let mut registry = Registry::new();
        registry.register(Arc::new(KeepEven));
        registry.register(Arc::new(RejectAll));
        let mut state = StageState::default();
        let (vm, image, package, locality, defaults) = sample_ctx();
        let ctx = EvalContext {
            vm: &vm,
            image: &image,
            package: &package,
            locality: &locality,
            defaults: &defaults,
            overprovision_ratio_cpu: 4.0,
            overprovision_ratio_ram: 1.0,
            overprovision_ratio_disk: 1.0,
            check_capacity: false,
            now_ms: 0,
            random_seed: Some(42),
        };

        let desc = Description::pipe_of(["reject-all", "keep-even"]);
        let outcome = run(
            &desc,
            &registry,
            &crate::log::TracingLog,
            &mut state,
            StageOutcome::kept(sample_servers(4)),
            &ctx,
        )
        .unwrap();
        assert!(outcome.servers.is_empty());
    }

    #[test]
    fn or_falls_back_to_non_empty_branch() {
        let mut registry = Registry::new();
        registry.register(Arc::new(KeepEven));
        registry.register(Arc::new(RejectAll));
        let mut state = StageState::default();
        let (vm, image, package, locality, defaults) = sample_ctx();
        let ctx = EvalContext {
            vm: &vm,
            image: &image,
            package: &package,
            locality: &locality,
            defaults: &defaults,
            overprovision_ratio_cpu: 4.0,
            overprovision_ratio_ram: 1.0,
            overprovision_ratio_disk: 1.0,
            check_capacity: false,
            now_ms: 0,
            random_seed: Some(42),
        };

        let desc = Description::Or(vec![
            Description::Stage("reject-all".to_string()),
            Description::Stage("keep-even".to_string()),
        ]);
        let outcome = run(
            &desc,
            &registry,
            &crate::log::TracingLog,
            &mut state,
            StageOutcome::kept(sample_servers(4)),
            &ctx,
        )
        .unwrap();
        assert_eq!(outcome.servers.len(), 2);
    }

    #[test]
    fn or_returns_last_branch_when_all_empty() {
        let mut registry = Registry::new();
        registry.register(Arc::new(RejectAll));
        let mut state = StageState::default();
        let (vm, image, package, locality, defaults) = sample_ctx();
        let ctx = EvalContext {
            vm: &vm,
            image: &image,
            package: &package,
            locality: &locality,
            defaults: &defaults,
            overprovision_ratio_cpu: 4.0,
            overprovision_ratio_ram: 1.0,
            overprovision_ratio_disk: 1.0,
            check_capacity: false,
            now_ms: 0,
            random_seed: Some(42),
        };

        let desc = Description::Or(vec![
            Description::Stage("reject-all".to_string()),
            Description::Stage("reject-all".to_string()),
        ]);
        let outcome = run(
            &desc,
            &registry,
            &crate::log::TracingLog,
            &mut state,
            StageOutcome::kept(sample_servers(2)),
            &ctx,
        )
        .unwrap();
        assert!(outcome.servers.is_empty());
        assert_eq!(outcome.reasons.len(), 2);
    }

    #[test]
    fn empty_pipe_description_fails_validation() {
        let desc = Description::Pipe(vec![]);
        assert!(desc.validate().is_err());
    }

    #[test]
    fn unknown_stage_name_errors() {
        let registry = Registry::new();
        let mut state = StageState::default();
        let (vm, image, package, locality, defaults) = sample_ctx();
        let ctx = EvalContext {
            vm: &vm,
            image: &image,
            package: &package,
            locality: &locality,
            defaults: &defaults,
            overprovision_ratio_cpu: 4.0,
            overprovision_ratio_ram: 1.0,
            overprovision_ratio_disk: 1.0,
            check_capacity: false,
            now_ms: 0,
            random_seed: Some(42),
        };
        let desc = Description::Stage("nonexistent".to_string());
        let err = run(
            &desc,
            &registry,
            &crate::log::TracingLog,
            &mut state,
            StageOutcome::kept(vec![]),
            &ctx,
        )
        .unwrap_err();
        assert!(matches!(err, Error::UnknownStage(_)));
    }
}
