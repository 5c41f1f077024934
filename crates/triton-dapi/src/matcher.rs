//! Trait and platform matching: the scalar/list comparison rules used by
//! `hard-filter-traits` and the lexicographic platform-timestamp
//! comparisons used by `hard-filter-platform-versions` and
//! `hard-filter-feature-min-platform`.

use crate::model::{TraitValue, Traits};

/// Returns `true` if `advertised` satisfies `required`, applying the
/// asymmetric scalar/list matching rules:
///
/// - scalar == scalar: direct equality.
/// - scalar required against a list advertised: satisfied if the scalar
///   appears in the list.
/// - list required against a scalar advertised: satisfied if the scalar
///   appears in the required list.
/// - list against list: satisfied if the two lists intersect.
/// - a missing advertised trait satisfies a `Bool(false)` requirement (the
///   absence of a trait means "doesn't have it", which is what `false`
///   asks for) but fails every other requirement.
#[must_use]
pub fn trait_matches(required: &TraitValue, advertised: Option<&TraitValue>) -> bool {
    let Some(advertised) = advertised else {
        return matches!(required, TraitValue::Bool(false));
    };

    match (required, advertised) {
        (TraitValue::Bool(r), TraitValue::Bool(a)) => r == a,
        (TraitValue::Str(r), TraitValue::Str(a)) => r == a,
        (TraitValue::Str(r), TraitValue::StrList(a)) => a.contains(r),
        (TraitValue::StrList(r), TraitValue::Str(a)) => r.contains(a),
        (TraitValue::StrList(r), TraitValue::StrList(a)) => r.iter().any(|v| a.contains(v)),
        _ => false,
    }
}

/// Returns `true` if every trait in `required` is satisfied by `advertised`.
#[must_use]
pub fn matches_traits(required: &Traits, advertised: &Traits) -> bool {
    required
        .iter()
        .all(|(key, value)| trait_matches(value, advertised.get(key)))
}

/// Compares two SmartOS platform timestamps. The format (`YYYYMMDDTHHMMSSZ`)
/// is fixed-width and zero-padded, so lexicographic string ordering is
/// exactly chronological ordering.
#[must_use]
pub fn platform_at_least(server_platform: &str, min_platform: &str) -> bool {
    server_platform >= min_platform
}

/// Symmetric to [`platform_at_least`]: `true` if `server_platform` is no
/// newer than `max_platform`.
#[must_use]
pub fn platform_at_most(server_platform: &str, max_platform: &str) -> bool {
    server_platform <= max_platform
}
