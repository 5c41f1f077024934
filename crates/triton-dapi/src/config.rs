//! The defaults record: configurable policy knobs for an [`Allocator`](crate::allocator::Allocator)
//! instance, following `triton_core::config::TritonClientConfig`'s shape —
//! `serde(default = ...)` per field, a `validator::Validate` derive for
//! range-checked fields, and a builder-style `with_*` chain of
//! `#[must_use] const fn`s.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::Error;
use crate::model::ServerSpread;

/// Tolerance used when comparing overprovision ratios for equality in
/// `hard-filter-overprovision-ratios`.
pub const RATIO_EPSILON: f64 = 1e-9;

/// Tolerance used when comparing an image's advertised min/max RAM against
/// a package's RAM allocation.
pub const IMAGE_RAM_EPSILON: f64 = 0.01;

/// How long (in milliseconds) a server stays in the recent-use memory
/// before it ages out.
pub const RECENT_SERVER_TTL_MS: i64 = 5000;

/// The maximum fraction of current candidates `soft-filter-recent-servers`
/// may drop.
pub const RECENT_SERVER_SOFT_DROP_FRACTION: f64 = 0.25;

/// Policy defaults for an allocator instance: exactly the keys the engine's
/// external interface documents, with defaults matching the historical
/// designation-API behavior. Unknown keys present in a deserialized source
/// are ignored; a known key of the wrong type fails deserialization, which
/// the facade surfaces as [`Error::InputInvalid`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "kebab-case")]
pub struct Defaults {
    /// Exclude the headnode from placement.
    #[serde(default = "default_true")]
    pub filter_headnode: bool,
    /// Apply the minimum RAM/CPU/disk hard filters.
    #[serde(default = "default_true")]
    pub filter_min_resources: bool,
    /// Exclude servers above a size threshold from ordinary placement
    /// (reserved for manually-targeted large workloads).
    #[serde(default)]
    pub filter_large_servers: bool,
    /// When true, a package's or server's advertised overprovision ratios
    /// are ignored in favor of these defaults.
    #[serde(default)]
    pub disable_override_overprovisioning: bool,
    /// Maximum number of VMs (of any owner) allowed on one server; `0`
    /// disables the check.
    #[serde(default = "default_vm_limit")]
    #[validate(range(min = 0, max = 10_000))]
    pub filter_vm_limit: u32,
    /// Minimum platform timestamp required to place `lx`/`kvm` ("docker")
    /// brands.
    #[serde(default)]
    pub filter_docker_min_platform: Option<String>,
    /// Minimum platform timestamp required for flexible-disk packages.
    #[serde(default)]
    pub filter_flexible_disk_min_platform: Option<String>,
    /// Minimum platform timestamp required for Docker NFS automount
    /// volumes-from.
    #[serde(default)]
    pub filter_docker_nfs_volumes_automount_min_platform: Option<String>,
    /// Minimum platform timestamp required for non-Docker NFS automount
    /// volumes-from.
    #[serde(default)]
    pub filter_non_docker_nfs_volumes_automount_min_platform: Option<String>,
    /// Default CPU overprovision ratio when neither package nor server
    /// advertises one.
    #[serde(default = "default_cpu_ratio")]
    #[validate(range(min = 0.0))]
    pub overprovision_ratio_cpu: f64,
    /// Default RAM overprovision ratio.
    #[serde(default = "default_unity_ratio")]
    #[validate(range(min = 0.0))]
    pub overprovision_ratio_ram: f64,
    /// Default disk overprovision ratio.
    #[serde(default = "default_unity_ratio")]
    #[validate(range(min = 0.0))]
    pub overprovision_ratio_disk: f64,
    /// Global default spread strategy, overridden per-package.
    #[serde(default)]
    pub server_spread: Option<ServerSpread>,
    /// Weight for `score-current-platform`.
    #[serde(default = "default_weight_one")]
    pub weight_current_platform: f64,
    /// Weight for `score-next-reboot`.
    #[serde(default = "default_weight_half")]
    pub weight_next_reboot: f64,
    /// Weight for `score-num-owner-zones`.
    #[serde(default)]
    pub weight_num_owner_zones: f64,
    /// Weight for `score-unreserved-ram`.
    #[serde(default = "default_weight_two")]
    pub weight_unreserved_ram: f64,
    /// Weight for `score-unreserved-disk`.
    #[serde(default = "default_weight_one")]
    pub weight_unreserved_disk: f64,
    /// Weight for `score-uniform-random`.
    #[serde(default = "default_weight_half")]
    pub weight_uniform_random: f64,
}

const fn default_true() -> bool {
    true
}

const fn default_cpu_ratio() -> f64 {
    4.0
}

const fn default_unity_ratio() -> f64 {
    1.0
}

const fn default_weight_one() -> f64 {
    1.0
}

const fn default_weight_half() -> f64 {
    0.5
}

const fn default_weight_two() -> f64 {
    2.0
}

const fn default_vm_limit() -> u32 {
    224
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            filter_headnode: default_true(),
            filter_min_resources: default_true(),
            filter_large_servers: false,
            disable_override_overprovisioning: false,
            filter_vm_limit: default_vm_limit(),
            filter_docker_min_platform: None,
            filter_flexible_disk_min_platform: None,
            filter_docker_nfs_volumes_automount_min_platform: None,
            filter_non_docker_nfs_volumes_automount_min_platform: None,
            overprovision_ratio_cpu: default_cpu_ratio(),
            overprovision_ratio_ram: default_unity_ratio(),
            overprovision_ratio_disk: default_unity_ratio(),
            server_spread: None,
            weight_current_platform: default_weight_one(),
            weight_next_reboot: default_weight_half(),
            weight_num_owner_zones: 0.0,
            weight_unreserved_ram: default_weight_two(),
            weight_unreserved_disk: default_weight_one(),
            weight_uniform_random: default_weight_half(),
        }
    }
}

impl Defaults {
    /// Validates this defaults record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InputInvalid`] if any ranged field is out of bounds.
    pub fn validate_defaults(&self) -> Result<(), Error> {
        self.validate()
            .map_err(|e| Error::input_invalid("defaults", e.to_string()))
    }

    /// Sets the per-server VM count limit.
    #[must_use]
    pub const fn with_vm_limit(mut self, limit: u32) -> Self {
        self.filter_vm_limit = limit;
        self
    }

    /// Sets the default spread strategy.
    #[must_use]
    pub fn with_server_spread(mut self, spread: ServerSpread) -> Self {
        self.server_spread = Some(spread);
        self
    }

    /// Sets whether large-server filtering is enabled.
    #[must_use]
    pub const fn with_filter_large_servers(mut self, enabled: bool) -> Self {
        self.filter_large_servers = enabled;
        self
    }

    /// Sets whether package/server overprovision ratios are overridden by
    /// these defaults.
    #[must_use]
    pub const fn with_override_overprovisioning(mut self, disable: bool) -> Self {
        self.disable_override_overprovisioning = disable;
        self
    }
}
