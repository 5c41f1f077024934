//! The algorithm plugin interface and registry: the `Stage` trait every
//! filter/scorer/transform implements, the per-call evaluation context
//! threaded through the pipeline, and the registry that resolves a named
//! stage to its implementation.

use std::collections::HashMap;
use std::sync::Arc;

use triton_core::uuid::ServerUuid;

use crate::config::Defaults;
use crate::error::Error;
use crate::locality::ResolvedLocality;
use crate::log::AllocatorLog;
use crate::model::{Image, Package, Server, VmRequest};
use crate::recent::RecentServerMemory;

/// The per-server working value threaded through the pipeline: the raw
/// [`Server`] plus an accumulated score and, in capacity mode, a note about
/// the server's maximum allocatable resources.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerView {
    /// The underlying server, with derived fields already populated.
    pub server: Server,
    /// Accumulated score from scorer stages; irrelevant until the final
    /// ranking step.
    pub score: f64,
    /// Rejection reasons accumulated by filters this server has already
    /// failed in capacity mode (where failure annotates rather than
    /// removes).
    pub capacity_note: Option<CapacityNote>,
}

impl ServerView {
    /// Wraps a server with a zero starting score and no capacity note.
    #[must_use]
    pub const fn new(server: Server) -> Self {
        Self {
            server,
            score: 0.0,
            capacity_note: None,
        }
    }
}

/// A capacity-mode annotation: whether a hard filter would have passed this
/// server, and why not if not.
#[derive(Debug, Clone, PartialEq)]
pub struct CapacityNote {
    /// Name of the stage that produced this note.
    pub stage: String,
    /// Whether the server would have survived this stage outside capacity
    /// mode.
    pub would_pass: bool,
    /// The rejection reason, if `would_pass` is `false`.
    pub reason: Option<String>,
    /// The server's maximum allocatable RAM in MiB, as of this stage.
    pub max_ram: u64,
    /// The server's maximum allocatable CPU in percent-of-core.
    pub max_cpu: f64,
    /// The server's maximum allocatable disk in MiB.
    pub max_disk: u64,
}

/// The evaluation context a pipeline run shares across every stage: the
/// merged constraints, the original request inputs, and the resolved
/// locality sets.
#[derive(Debug, Clone)]
pub struct EvalContext<'a> {
    /// The VM being placed.
    pub vm: &'a VmRequest,
    /// The image the VM boots from.
    pub image: &'a Image,
    /// The package sizing the VM.
    pub package: &'a Package,
    /// Resolved near/far server sets from affinity rules and explicit
    /// locality hints.
    pub locality: &'a ResolvedLocality,
    /// Effective policy defaults for this call (after any per-request
    /// overrides have been merged in).
    pub defaults: &'a Defaults,
    /// Effective per-resource overprovision ratios for this request, after
    /// applying the precedence rules in `SPEC_FULL.md` §4.3.
    pub overprovision_ratio_cpu: f64,
    /// See [`EvalContext::overprovision_ratio_cpu`].
    pub overprovision_ratio_ram: f64,
    /// See [`EvalContext::overprovision_ratio_cpu`].
    pub overprovision_ratio_disk: f64,
    /// Whether this run is in capacity-check mode.
    pub check_capacity: bool,
    /// Current wall-clock time in milliseconds, used by the recent-server
    /// stages. Supplied by the caller (via [`crate::allocator::Allocator`])
    /// rather than read from the system clock, keeping every stage pure
    /// and deterministic given its inputs.
    pub now_ms: i64,
    /// Seed for `score-uniform-random`'s RNG. `None` draws from system
    /// entropy; `Some(seed)` makes the scorer's tie-breaking
    /// reproducible, e.g. for tests.
    pub random_seed: Option<u64>,
}

/// Mutable, allocator-instance-scoped state a stage may read and write
/// across calls. Currently this is only the recent-server memory (§4.7);
/// it is centralized here rather than on individual stages so a single
/// [`crate::allocator::Allocator`] owns exactly one copy regardless of how
/// many times `hard-filter-recent-servers`/`soft-filter-recent-servers`
/// appear in a pipeline description.
#[derive(Debug, Default)]
pub struct StageState {
    /// Last-used timestamps for recently allocated servers.
    pub recent_servers: RecentServerMemory,
}

/// The outcome of running one stage: the surviving servers, any rejection
/// reasons accumulated (ignored in capacity mode, where rejection becomes
/// an annotation instead of a removal), and whether each surviving server's
/// score changed.
#[derive(Debug, Clone, Default)]
pub struct StageOutcome {
    /// Servers that survived this stage.
    pub servers: Vec<ServerView>,
    /// `(server_uuid, reason)` pairs for servers this stage rejected.
    pub reasons: Vec<(ServerUuid, String)>,
}

impl StageOutcome {
    /// Wraps a server list with no rejections.
    #[must_use]
    pub const fn kept(servers: Vec<ServerView>) -> Self {
        Self {
            servers,
            reasons: Vec::new(),
        }
    }
}

/// The kind of stage, used to decide default pipeline placement and
/// whether `or` short-circuits apply the same way they do to filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    /// A hard filter: removes non-matching servers.
    Filter,
    /// A soft filter: proposes a subset, adopted only if non-empty (or
    /// meeting a configured minimum).
    SoftFilter,
    /// A scorer: adjusts `ServerView::score`, never removes servers.
    Scorer,
}

/// A single named stage in the algorithm registry: a filter, soft filter,
/// or scorer. This is the plugin interface external callers implement to
/// register custom stages with an [`crate::allocator::Allocator`].
pub trait Stage: Send + Sync {
    /// The stage's registry name, e.g. `"hard-filter-min-ram"`.
    fn name(&self) -> &str;

    /// Whether this is a hard filter, soft filter, or scorer.
    fn kind(&self) -> StageKind;

    /// Runs the stage against the current candidate set.
    ///
    /// # Errors
    ///
    /// Returns an error if the stage cannot evaluate its input (e.g. a
    /// forced-failure test stage, or a structurally invalid algorithm
    /// description was resolved to this stage).
    fn run(
        &self,
        log: &dyn AllocatorLog,
        state: &mut StageState,
        servers: Vec<ServerView>,
        ctx: &EvalContext<'_>,
    ) -> Result<StageOutcome, Error>;

    /// Called once with the final chosen server, after the pipeline has
    /// run to completion. Used by stages with side effects scoped to the
    /// allocator instance (recording the chosen server in recent-server
    /// memory).
    fn post(
        &self,
        _log: &dyn AllocatorLog,
        _state: &mut StageState,
        _chosen: &ServerView,
        _ctx: &EvalContext<'_>,
    ) {
    }

    /// Whether this stage participates in capacity-mode rewriting (hard
    /// filters annotate instead of removing). Scorers and soft filters
    /// return `false` and run unchanged in capacity mode.
    fn affects_capacity(&self) -> bool {
        matches!(self.kind(), StageKind::Filter)
    }
}

/// The algorithm registry: resolves a stage name to its implementation.
/// Populated with the built-in stages at construction and, optionally,
/// extended with host-supplied stages (runtime loading of arbitrary
/// user-supplied code is out of scope; registration is a Rust-level API).
#[derive(Clone, Default)]
pub struct Registry {
    stages: HashMap<String, Arc<dyn Stage>>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a stage, replacing any existing stage with the same name.
    pub fn register(&mut self, stage: Arc<dyn Stage>) {
        self.stages.insert(stage.name().to_string(), stage);
    }

    /// Looks up a stage by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Stage>> {
        self.stages.get(name).cloned()
    }

    /// Returns every registered stage, in no particular order. Used by
    /// [`crate::capacity::capacity_registry`] to build the capacity-mode
    /// wrapped registry from a base one.
    #[must_use]
    pub fn stages(&self) -> Vec<Arc<dyn Stage>> {
        self.stages.values().cloned().collect()
    }

    /// Resolves a name to a stage, or an [`Error::UnknownStage`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownStage`] if no stage is registered under
    /// `name`.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Stage>, Error> {
        self.get(name)
            .ok_or_else(|| Error::UnknownStage(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopFilter;

    impl Stage for NoopFilter {
        fn name(&self) -> &str {
            "noop-filter"
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
            Ok(StageOutcome::kept(servers))
        }
    }

    #[test]
    fn registry_resolves_registered_stage() {
        let mut registry = Registry::new();
        registry.register(Arc::new(NoopFilter));
        let stage = registry.resolve("noop-filter").unwrap();
        assert_eq!(stage.name(), "noop-filter");
    }

    #[test]
    fn registry_rejects_unknown_stage() {
        let registry = Registry::new();
        let err = registry.resolve("does-not-exist").unwrap_err();
        assert!(matches!(err, Error::UnknownStage(name) if name == "does-not-exist"));
    }

    #[test]
    fn filter_stage_affects_capacity_by_default() {
        assert!(NoopFilter.affects_capacity());
    }
}
