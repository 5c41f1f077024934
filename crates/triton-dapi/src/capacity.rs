//! Capacity mode: the alternate pipeline evaluation that never removes a
//! server, instead annotating each with whether the hard filters it passed
//! through would have kept it, plus its maximum allocatable RAM/CPU/disk.
//!
//! Implemented as a decorator over the registry rather than a parallel set
//! of filter implementations: [`capacity_registry`] wraps every stage whose
//! [`Stage::affects_capacity`] is `true` in a [`CapacityFilter`], which runs
//! the wrapped stage exactly as normal mode would, then reinstates whichever
//! servers it would have dropped with a [`CapacityNote`] instead of
//! discarding them. Stages that don't affect capacity (soft filters,
//! scorers) are registered unwrapped, so they still run — and still
//! remove/reorder — exactly as in normal mode, per `SPEC_FULL.md` §4.10.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::algorithm::{CapacityNote, EvalContext, Registry, ServerView, Stage, StageKind, StageOutcome, StageState};
use crate::error::Error;
use crate::log::AllocatorLog;

/// Decorates a hard filter so that, in capacity mode, it annotates instead
/// of removing. Outside capacity mode it is a transparent passthrough to
/// the wrapped stage.
pub struct CapacityFilter {
    inner: Arc<dyn Stage>,
}

impl CapacityFilter {
    /// Wraps `inner` for capacity-mode annotation.
    #[must_use]
    pub fn new(inner: Arc<dyn Stage>) -> Self {
        Self { inner }
    }
}

impl Stage for CapacityFilter {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn kind(&self) -> StageKind {
        self.inner.kind()
    }

    fn run(
        &self,
        log: &dyn AllocatorLog,
        state: &mut StageState,
        servers: Vec<ServerView>,
        ctx: &EvalContext<'_>,
    ) -> Result<StageOutcome, Error> {
        if !ctx.check_capacity {
            return self.inner.run(log, state, servers, ctx);
        }

        let original = servers.clone();
        let outcome = self.inner.run(log, state, servers, ctx)?;
        let survivors: HashSet<_> = outcome.servers.iter().map(|v| v.server.uuid).collect();
        let reasons: HashMap<_, _> = outcome.reasons.into_iter().collect();

        let annotated = original
            .into_iter()
            .map(|mut view| {
                // A server already marked as failing an earlier hard filter
                // in this pipeline stays failed: the first rejection is the
                // one that would actually have excluded it.
                let already_failed = view.capacity_note.as_ref().is_some_and(|n| !n.would_pass);
                if !already_failed {
                    let would_pass = survivors.contains(&view.server.uuid);
                    view.capacity_note = Some(CapacityNote {
                        stage: self.inner.name().to_string(),
                        would_pass,
                        reason: reasons.get(&view.server.uuid).cloned(),
                        max_ram: view.server.unreserved_ram,
                        max_cpu: view.server.unreserved_cpu,
                        max_disk: view.server.unreserved_disk,
                    });
                }
                view
            })
            .collect();

        Ok(StageOutcome {
            servers: annotated,
            reasons: Vec::new(),
        })
    }

    fn post(&self, log: &dyn AllocatorLog, state: &mut StageState, chosen: &ServerView, ctx: &EvalContext<'_>) {
        self.inner.post(log, state, chosen, ctx);
    }

    fn affects_capacity(&self) -> bool {
        self.inner.affects_capacity()
    }
}

/// Builds a capacity-mode registry from `base`: every stage with
/// `affects_capacity() == true` is wrapped in a [`CapacityFilter`]; every
/// other stage is registered unchanged.
#[must_use]
pub fn capacity_registry(base: &Registry) -> Registry {
    let mut wrapped = Registry::new();
    for stage in base.stages() {
        if stage.affects_capacity() {
            wrapped.register(Arc::new(CapacityFilter::new(stage)));
        } else {
            wrapped.register(stage);
        }
    }
    wrapped
}

/// One server's capacity-mode report: whether it would have survived every
/// hard filter it was checked against, and its maximum allocatable
/// RAM/CPU/disk.
#[derive(Debug, Clone, PartialEq)]
pub struct CapacityReport {
    /// The server this report describes.
    pub uuid: triton_core::uuid::ServerUuid,
    /// Whether the server would have survived the full hard-filter chain.
    pub would_pass: bool,
    /// The first rejection reason encountered, if any.
    pub reason: Option<String>,
    /// Maximum allocatable RAM in MiB.
    pub max_ram: u64,
    /// Maximum allocatable CPU in percent-of-core.
    pub max_cpu: f64,
    /// Maximum allocatable disk in MiB.
    pub max_disk: u64,
}

/// Collects a [`CapacityReport`] per server from the final capacity-mode
/// pipeline output. A server no hard filter ever annotated (an empty
/// pipeline, or one built entirely from soft filters/scorers) is reported
/// as passing at its own derived unreserved capacity.
#[must_use]
pub fn collect_reports(servers: &[ServerView]) -> Vec<CapacityReport> {
    servers
        .iter()
        .map(|view| match &view.capacity_note {
            Some(note) => CapacityReport {
                uuid: view.server.uuid,
                would_pass: note.would_pass,
                reason: note.reason.clone(),
                max_ram: note.max_ram,
                max_cpu: note.max_cpu,
                max_disk: note.max_disk,
            },
            None => CapacityReport {
                uuid: view.server.uuid,
                would_pass: true,
                reason: None,
                max_ram: view.server.unreserved_ram,
                max_cpu: view.server.unreserved_cpu,
                max_disk: view.server.unreserved_disk,
            },
        })
        .collect()
}
