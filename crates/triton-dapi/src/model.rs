//! Data model: the VM request, image, package, server, and ticket shapes the
//! allocator consumes, plus the trait/affinity value types they share.
//!
//! Field names are kept aligned with `triton_cnapi::models::Server` and
//! `triton_papi::models::Package` so a caller's adapter from those wire
//! types to these decision types is a near-mechanical field copy; unlike
//! those wire models, numeric fields here are plain `u64`/`f64`/`i64`
//! rather than `serde_json::Value`, since the pipeline does arithmetic on
//! them directly.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use triton_core::uuid::{ImageUuid, OwnerUuid, PackageUuid, ServerUuid, VmUuid};

/// A trait value as it appears on a server, package, image, or VM.
///
/// Untagged so it round-trips the same JSON shapes CNAPI/PAPI/IMGAPI traits
/// use on the wire: a bare boolean, a bare string, or a list of strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TraitValue {
    /// A boolean trait, e.g. `"ssd": true`.
    Bool(bool),
    /// A scalar string trait, e.g. `"rack": "rack-a"`.
    Str(String),
    /// A list trait, e.g. `"rack": ["rack-a", "rack-b"]`.
    StrList(Vec<String>),
}

/// A map of trait name to trait value, as carried by servers, packages,
/// images, and VMs.
pub type Traits = HashMap<String, TraitValue>;

/// The comparison operator an affinity rule applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AffinityOperator {
    /// Place near instances/VMs matching the rule.
    Eq,
    /// Place away from instances/VMs matching the rule.
    Ne,
}

/// The match style an affinity rule applies when comparing `value` against
/// a candidate (instance reference or tag value).
///
/// Whether `value` is matched against an instance reference or a tag is
/// decided separately, by whether `key` is literally `instance`/`container`
/// (see [`crate::locality`]); this enum only controls comparison style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AffinityMatchType {
    /// Exact equality (for an instance reference, a full UUID, full alias,
    /// or unambiguous Docker-ID prefix).
    Exact,
    /// Shell-style glob (`*`, `?`) against the target string.
    Glob,
    /// Regular expression against the target string.
    Re,
}

/// A single affinity (locality hint) rule as supplied with a VM request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffinityRule {
    /// `instance`, `container`, or a tag name.
    pub key: String,
    /// Whether matching instances are sought (`Eq`) or avoided (`Ne`).
    pub operator: AffinityOperator,
    /// The instance identifier/tag value to match against.
    pub value: String,
    /// How `value` is compared against the target string.
    pub value_type: AffinityMatchType,
    /// Soft rules are advisory (best-effort); hard rules are mandatory.
    pub is_soft: bool,
}

/// Explicit locality hints carried directly on a VM request, independent of
/// the affinity rules resolved from VM tags (see [`crate::locality`]).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Locality {
    /// Servers to prefer/require (hard if `strict`).
    #[serde(default)]
    pub near: Vec<VmUuid>,
    /// Servers to avoid/forbid (hard if `strict`).
    #[serde(default)]
    pub far: Vec<VmUuid>,
    /// When true, `near`/`far` are hard constraints rather than hints.
    #[serde(default)]
    pub strict: bool,
}

/// A request to place a new virtual machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VmRequest {
    /// The VM's own UUID (pre-assigned by the caller).
    pub uuid: VmUuid,
    /// Owning account.
    pub owner_uuid: OwnerUuid,
    /// RAM in MiB the VM will consume (`max_physical_memory`).
    pub ram: u64,
    /// CPU cap as a percentage of one core (100 = one full core).
    pub cpu_cap: Option<u32>,
    /// Disk quota in MiB the VM will consume.
    pub quota: u64,
    /// Brand/kind, e.g. `"joyent"`, `"kvm"`, `"lx"`.
    pub brand: String,
    /// NIC tags this VM's NICs require reachability for.
    #[serde(default)]
    pub nic_tags: Vec<String>,
    /// Traits the VM requires of its server.
    #[serde(default)]
    pub traits: Traits,
    /// Explicit near/far server hints.
    #[serde(default)]
    pub locality: Locality,
    /// Affinity rules resolved against sibling VM tags/aliases.
    #[serde(default)]
    pub affinity: Vec<AffinityRule>,
    /// The image this VM boots from.
    pub image_uuid: ImageUuid,
    /// The package sizing this VM.
    pub package_uuid: PackageUuid,
    /// Free-form tags, consulted by affinity rules whose `key` is not
    /// `instance`/`container`.
    #[serde(default)]
    pub tags: HashMap<String, String>,
    /// Arbitrary internal metadata; the engine only inspects
    /// `docker:volumesfrom`.
    #[serde(default)]
    pub internal_metadata: HashMap<String, serde_json::Value>,
}

/// An image manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    /// Image UUID.
    pub uuid: ImageUuid,
    /// Minimum RAM (MiB) a server must offer to host a VM from this image.
    #[serde(default)]
    pub min_ram: Option<u64>,
    /// Maximum RAM (MiB) a VM from this image may request.
    #[serde(default)]
    pub max_ram: Option<u64>,
    /// Traits a server must satisfy to host this image (e.g. a required
    /// platform feature or hypervisor kind).
    #[serde(default)]
    pub traits: Traits,
    /// Minimum platform timestamp required, keyed by SDC version (e.g.
    /// `{"7.0": "20240101T000000Z"}`); the entry matching a candidate
    /// server's own `sdc_version` applies.
    #[serde(default)]
    pub min_platform: HashMap<String, String>,
    /// Maximum platform timestamp permitted, keyed by SDC version; same
    /// lookup rule as `min_platform`.
    #[serde(default)]
    pub max_platform: HashMap<String, String>,
}

/// The enumerated spread strategies a package may request, sugar over the
/// underlying scorer weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServerSpread {
    /// Prefer servers with the most unreserved RAM.
    MaxRam,
    /// Prefer servers with the least unreserved RAM.
    MinRam,
    /// Prefer servers with the most unreserved disk.
    MaxDisk,
    /// Prefer servers with the least unreserved disk.
    MinDisk,
    /// No preference; random selection among survivors.
    Random,
}

/// A package (instance sizing template).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    /// Package UUID.
    pub uuid: PackageUuid,
    /// RAM in MiB this package allocates.
    pub max_physical_memory: u64,
    /// Disk quota in MiB this package allocates.
    pub quota: u64,
    /// CPU cap as a percentage of one core.
    pub cpu_cap: Option<u32>,
    /// Traits this package requires of a server.
    #[serde(default)]
    pub traits: Traits,
    /// Per-resource overprovision ratios this package advertises, taking
    /// precedence over a server's own advertised ratios (unless
    /// `override-overprovisioning` is set).
    #[serde(default)]
    pub overprovision_ratios: HashMap<String, f64>,
    /// Accounts allowed to use this package; empty means unrestricted.
    #[serde(default)]
    pub owner_uuids: Vec<OwnerUuid>,
    /// Sugar over scorer weights; see [`ServerSpread`].
    #[serde(default)]
    pub server_spread: Option<ServerSpread>,
}

/// A reservation ticket: an in-flight allocation not yet reflected in the
/// server's own VM inventory, projected onto `Server::vms` before
/// derivation so concurrent allocations against a stale snapshot don't
/// double-book a server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    /// The server the ticket reserves capacity on.
    pub server_uuid: ServerUuid,
    /// The VM the ticket reserves capacity for.
    pub vm_uuid: VmUuid,
    /// RAM in MiB reserved.
    pub ram: u64,
    /// Disk in MiB reserved.
    pub quota: u64,
    /// CPU cap reserved.
    pub cpu_cap: Option<u32>,
}

/// A VM already resident on a server, as tracked in `Server::vms`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResidentVm {
    /// RAM in MiB allocated to the resident VM.
    pub max_physical_memory: u64,
    /// CPU cap allocated to the resident VM.
    #[serde(default)]
    pub cpu_cap: Option<u32>,
    /// Owning account of the resident VM.
    pub owner_uuid: OwnerUuid,
    /// Operator-assigned alias, consulted by affinity rules that reference
    /// an instance by name.
    #[serde(default)]
    pub alias: Option<String>,
    /// Docker container ID, consulted by affinity rules with
    /// `key: "container"`.
    #[serde(default)]
    pub docker_id: Option<String>,
    /// Free-form tags, consulted by affinity rules whose `key` is not
    /// `instance`/`container`.
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

/// One of a server's network interfaces, as carried under `sysinfo["Network
/// Interfaces"]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkInterface {
    /// NIC tag names reachable through this interface.
    #[serde(default)]
    pub nic_names: Vec<String>,
    /// Whether the interface is currently up; `hard-filter-vlans` only
    /// considers NIC tags reachable via an up interface.
    #[serde(default)]
    pub up: bool,
}

/// Per-resource overprovision ratios.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverprovisionRatios {
    /// CPU overprovision ratio; `None` means unbounded (no CPU filtering).
    #[serde(default)]
    pub cpu: Option<f64>,
    /// RAM overprovision ratio; `None` means `1.0`.
    #[serde(default)]
    pub ram: Option<f64>,
    /// Disk overprovision ratio; `None` means `1.0`.
    #[serde(default)]
    pub disk: Option<f64>,
}

/// A compute node (server), as known to the allocator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Server {
    /// Server UUID.
    pub uuid: ServerUuid,
    /// Lifecycle status, e.g. `"running"`, `"setup"`, `"offline"`.
    pub status: String,
    /// Whether the server is reserved (excluded from new placement).
    #[serde(default)]
    pub reserved: bool,
    /// Whether the server is a capacity reservoir (excluded from normal
    /// placement, used only for emergency overflow).
    #[serde(default)]
    pub reservoir: bool,
    /// Whether this is the headnode.
    #[serde(default)]
    pub headnode: bool,
    /// SmartOS platform image timestamp, e.g. `"20240115T000000Z"`.
    pub platform_timestamp: String,
    /// SDC version, e.g. `"7.0"`.
    pub sdc_version: String,
    /// Total physical memory in bytes.
    pub memory_total_bytes: u64,
    /// Physical memory currently free, in bytes.
    pub memory_available_bytes: u64,
    /// Fraction of memory/CPU/disk the system reserves for itself.
    pub reservation_ratio: f64,
    /// Per-resource overprovision ratios this server advertises.
    #[serde(default)]
    pub overprovision_ratios: OverprovisionRatios,
    /// Total storage pool size in bytes.
    pub disk_pool_size_bytes: u64,
    /// Bytes already used by installed images.
    #[serde(default)]
    pub disk_installed_images_used_bytes: u64,
    /// Bytes reserved for zone (non-KVM) quotas.
    #[serde(default)]
    pub disk_zone_quota_bytes: u64,
    /// Bytes reserved for KVM VM disks.
    #[serde(default)]
    pub disk_kvm_quota_bytes: u64,
    /// Bytes reserved for bhyve/"cores" quotas.
    #[serde(default)]
    pub disk_cores_quota_bytes: u64,
    /// Number of online CPUs (from `sysinfo["CPU Online Count"]`); `None`
    /// when sysinfo is missing or malformed.
    pub cpu_online_count: Option<u32>,
    /// Traits this server advertises.
    #[serde(default)]
    pub traits: Traits,
    /// This server's network interfaces, keyed by interface name, per
    /// `sysinfo["Network Interfaces"]`.
    #[serde(default)]
    pub network_interfaces: HashMap<String, NetworkInterface>,
    /// VMs currently resident on this server.
    #[serde(default)]
    pub vms: HashMap<VmUuid, ResidentVm>,
    /// Rack identifier, used only for informational scoring/logging.
    #[serde(default)]
    pub rack_identifier: Option<String>,
    /// Milliseconds since the epoch at which this server's next scheduled
    /// reboot (patch window, boot archive update) is due, if any. `None`
    /// means no reboot is scheduled, which `score-next-reboot` treats as
    /// farther in the future than any scheduled timestamp.
    #[serde(default)]
    pub next_reboot_ms: Option<i64>,

    // --- Derived fields, populated by `crate::derive` ---
    /// Unreserved RAM in MiB, clamped to zero.
    #[serde(default)]
    pub unreserved_ram: u64,
    /// Unreserved CPU in percent-of-core, clamped to zero.
    #[serde(default)]
    pub unreserved_cpu: f64,
    /// Unreserved disk in MiB, clamped to zero.
    #[serde(default)]
    pub unreserved_disk: u64,
    /// False when derivation could not be completed (malformed sysinfo,
    /// missing CPU count, etc.); such servers are demoted, not excluded
    /// from the snapshot.
    #[serde(default = "default_true")]
    pub derivation_ok: bool,
}

const fn default_true() -> bool {
    true
}
