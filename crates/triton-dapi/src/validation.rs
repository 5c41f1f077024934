//! Input validation: one pure function per input kind, each returning the
//! offending field and a human-readable reason on failure.
//!
//! Malformed VM/image/package/ticket/defaults input fails the whole
//! `allocate()` call (see [`crate::error::Error::InputInvalid`]); a
//! malformed server is tolerated here and handled instead by
//! `hard-filter-invalid-servers` in [`crate::filters`].

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::Defaults;
use crate::error::Error;
use crate::model::{Package, Server, Ticket, VmRequest};

static UUID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-f0-9]{8}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{12}$")
        .expect("UUID_PATTERN is a valid regex")
});

static PLATFORM_TIMESTAMP_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^20\d\d[01]\d[0123]\dT[012]\d[0-5]\d\d\dZ$")
        .expect("PLATFORM_TIMESTAMP_PATTERN is a valid regex")
});

static SDC_VERSION_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d\.\d$").expect("SDC_VERSION_PATTERN is a valid regex"));

/// Returns `true` if `s` is a canonical lowercase-hyphenated UUID string.
#[must_use]
pub fn is_valid_uuid_str(s: &str) -> bool {
    UUID_PATTERN.is_match(s)
}

/// Returns `true` if `s` matches a SmartOS platform image timestamp, e.g.
/// `"20240115T000000Z"`.
#[must_use]
pub fn is_valid_platform_timestamp(s: &str) -> bool {
    PLATFORM_TIMESTAMP_PATTERN.is_match(s)
}

/// Returns `true` if `s` matches an SDC version string, e.g. `"7.0"`.
#[must_use]
pub fn is_valid_sdc_version(s: &str) -> bool {
    SDC_VERSION_PATTERN.is_match(s)
}

/// Validates a VM placement request.
///
/// # Errors
///
/// Returns [`Error::InputInvalid`] on the first offending field found.
pub fn validate_vm(vm: &VmRequest) -> Result<(), Error> {
    if vm.ram == 0 {
        return Err(Error::input_invalid("vm.ram", "must be positive"));
    }
    if vm.quota == 0 {
        return Err(Error::input_invalid("vm.quota", "must be positive"));
    }
    if vm.brand.trim().is_empty() {
        return Err(Error::input_invalid("vm.brand", "must not be empty"));
    }
    for rule in &vm.affinity {
        if rule.value.trim().is_empty() {
            return Err(Error::input_invalid(
                "vm.affinity[].value",
                "must not be empty",
            ));
        }
    }
    Ok(())
}

/// Validates an image manifest's RAM bounds against a package's allocation.
///
/// The spec's RAM-tolerance epsilon is used so a package that allocates
/// marginally less RAM than an image's advertised minimum (within floating
/// point noise) is not spuriously rejected.
///
/// # Errors
///
/// Returns [`Error::InputInvalid`] if the package's RAM allocation falls
/// outside the image's advertised `[min_ram, max_ram]` bounds.
pub fn validate_image_ram(
    min_ram: Option<u64>,
    max_ram: Option<u64>,
    package_ram: u64,
) -> Result<(), Error> {
    const EPSILON: f64 = crate::config::IMAGE_RAM_EPSILON;
    let package_ram = package_ram as f64;

    if let Some(min_ram) = min_ram {
        if package_ram + EPSILON < min_ram as f64 {
            return Err(Error::input_invalid(
                "package.max_physical_memory",
                format!("below image min_ram ({min_ram} MiB)"),
            ));
        }
    }
    if let Some(max_ram) = max_ram {
        if package_ram - EPSILON > max_ram as f64 {
            return Err(Error::input_invalid(
                "package.max_physical_memory",
                format!("above image max_ram ({max_ram} MiB)"),
            ));
        }
    }
    Ok(())
}

/// Validates a package.
///
/// # Errors
///
/// Returns [`Error::InputInvalid`] on the first offending field found.
pub fn validate_package(package: &Package) -> Result<(), Error> {
    if package.max_physical_memory == 0 {
        return Err(Error::input_invalid(
            "package.max_physical_memory",
            "must be positive",
        ));
    }
    if package.quota == 0 {
        return Err(Error::input_invalid("package.quota", "must be positive"));
    }
    for (resource, ratio) in &package.overprovision_ratios {
        if *ratio < 0.0 {
            return Err(Error::input_invalid(
                format!("package.overprovision_ratios.{resource}"),
                "must be non-negative",
            ));
        }
    }
    Ok(())
}

/// Validates a reservation ticket.
///
/// # Errors
///
/// Returns [`Error::InputInvalid`] on the first offending field found.
pub fn validate_ticket(ticket: &Ticket) -> Result<(), Error> {
    if ticket.ram == 0 && ticket.quota == 0 {
        return Err(Error::input_invalid(
            "ticket",
            "must reserve a positive amount of ram or quota",
        ));
    }
    Ok(())
}

/// Validates the defaults record.
///
/// # Errors
///
/// Returns [`Error::InputInvalid`] if any ranged field is out of bounds.
pub fn validate_defaults(defaults: &Defaults) -> Result<(), Error> {
    defaults.validate_defaults()
}

/// Validates a server. Unlike the other `validate_*` functions, a failure
/// here is not fatal to the whole `allocate()` call: per the design note in
/// `SPEC_FULL.md` §9, server validation stays filter-level, invoked by
/// `hard-filter-invalid-servers` rather than the upfront fatal pass, so one
/// malformed entry in a large fleet snapshot doesn't abort placement for
/// every VM.
///
/// # Errors
///
/// Returns [`Error::InputInvalid`] describing the first offending field.
pub fn validate_server(server: &Server) -> Result<(), Error> {
    if !(0.0..=1.0).contains(&server.reservation_ratio) {
        return Err(Error::input_invalid(
            "server.reservation_ratio",
            "must be in [0, 1]",
        ));
    }
    if server.memory_available_bytes > server.memory_total_bytes {
        return Err(Error::input_invalid(
            "server.memory_available_bytes",
            "must not exceed memory_total_bytes",
        ));
    }
    if !is_valid_platform_timestamp(&server.platform_timestamp) {
        return Err(Error::input_invalid(
            "server.platform_timestamp",
            "must match SmartOS platform timestamp format",
        ));
    }
    if !is_valid_sdc_version(&server.sdc_version) {
        return Err(Error::input_invalid(
            "server.sdc_version",
            "must match SDC version format (e.g. \"7.0\")",
        ));
    }
    Ok(())
}
