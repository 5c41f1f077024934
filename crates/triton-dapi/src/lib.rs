//! Compute-node placement engine for Triton DataCenter.
//!
//! Chooses which server should host a new virtual machine from a fleet
//! snapshot, a VM/image/package request, and a configurable chain of hard
//! filters, soft filters, and scorers. See [`Allocator`] for the entry
//! point.

#![deny(missing_docs)]

pub mod algorithm;
pub mod allocator;
pub mod capacity;
pub mod config;
pub mod derive;
pub mod error;
pub mod filters;
pub mod locality;
pub mod log;
pub mod matcher;
pub mod model;
pub mod pipeline;
pub mod recent;
pub mod scorer;
pub mod validation;

pub use allocator::{Allocator, AllocationRequest, AllocationResult, StepSummary};
pub use capacity::CapacityReport;
pub use config::Defaults;
pub use error::{Error, ErrorDetail, ErrorResponse};
pub use model::{
    AffinityMatchType, AffinityOperator, AffinityRule, Image, Locality, NetworkInterface,
    OverprovisionRatios, Package, ResidentVm, Server, ServerSpread, Ticket, TraitValue, Traits,
    VmRequest,
};

/// Convenient result alias that reuses this crate's error type.
pub type Result<T> = std::result::Result<T, Error>;
