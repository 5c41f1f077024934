//! Locality/affinity resolution: projects a VM's affinity rules and
//! explicit `locality` hints onto the server fleet as `near`/`far` server
//! sets, which feed `soft-filter-locality-hints` and
//! `hard-filter-locality-hints`.

use std::collections::HashSet;

use regex::Regex;
use triton_core::uuid::{ServerUuid, VmUuid};

use crate::model::{AffinityMatchType, AffinityOperator, AffinityRule, Server, VmRequest};

/// The resolved near/far server sets for a placement request, split by
/// whether the originating rule was hard or soft.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedLocality {
    /// Servers a hard rule requires placement on or near.
    pub hard_near: HashSet<ServerUuid>,
    /// Servers a hard rule forbids placement on or near.
    pub hard_far: HashSet<ServerUuid>,
    /// Servers a soft rule prefers.
    pub soft_near: HashSet<ServerUuid>,
    /// Servers a soft rule prefers to avoid.
    pub soft_far: HashSet<ServerUuid>,
}

/// Translates a shell-style glob (`*`, `?`) into an anchored regex pattern.
fn glob_to_regex(pattern: &str) -> String {
    let mut out = String::from("^");
    for ch in pattern.chars() {
        match ch {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    out.push('$');
    out
}

fn matches_by_style(value: &str, candidate: &str, style: AffinityMatchType) -> bool {
    match style {
        AffinityMatchType::Exact => value == candidate,
        AffinityMatchType::Glob => {
            Regex::new(&glob_to_regex(value)).is_ok_and(|re| re.is_match(candidate))
        }
        AffinityMatchType::Re => Regex::new(value).is_ok_and(|re| re.is_match(candidate)),
    }
}

/// Matches an affinity rule's `value` against one VM's instance reference
/// (UUID, alias, or Docker-ID prefix), per the `key = "instance" |
/// "container"` rule in `SPEC_FULL.md` §4.8.
///
/// Glob and regex styles only match the alias; exact additionally accepts a
/// full UUID or an unambiguous Docker-ID prefix.
fn matches_instance_reference(
    vm_uuid: VmUuid,
    alias: Option<&str>,
    docker_id: Option<&str>,
    value: &str,
    style: AffinityMatchType,
) -> bool {
    match style {
        AffinityMatchType::Exact => {
            if vm_uuid.to_string() == value {
                return true;
            }
            if let Some(alias) = alias {
                if alias == value {
                    return true;
                }
            }
            if let Some(docker_id) = docker_id {
                if docker_id == value || docker_id.starts_with(value) {
                    return true;
                }
            }
            false
        }
        AffinityMatchType::Glob | AffinityMatchType::Re => {
            alias.is_some_and(|alias| matches_by_style(value, alias, style))
        }
    }
}

/// `true` when `key` names an instance reference rather than a tag.
fn is_instance_key(key: &str) -> bool {
    key == "instance" || key == "container"
}

fn servers_matching_rule(rule: &AffinityRule, servers: &[&Server]) -> HashSet<ServerUuid> {
    let mut matched = HashSet::new();
    for server in servers {
        for (vm_uuid, resident) in &server.vms {
            let is_match = if is_instance_key(&rule.key) {
                matches_instance_reference(
                    *vm_uuid,
                    resident.alias.as_deref(),
                    resident.docker_id.as_deref(),
                    &rule.value,
                    rule.value_type,
                )
            } else {
                resident
                    .tags
                    .get(&rule.key)
                    .is_some_and(|tag_value| matches_by_style(&rule.value, tag_value, rule.value_type))
            };
            if is_match {
                matched.insert(server.uuid);
                break;
            }
        }
    }
    matched
}

/// Resolves a VM request's affinity rules and explicit `locality` field
/// into a single [`ResolvedLocality`] against the given server fleet.
///
/// Affinity rules are resolved first (matching by VM alias/UUID/Docker ID
/// or tag, per rule's `value_type`); the VM's own `locality.near`/`far`
/// UUID lists are then folded in as additional hard or soft constraints
/// depending on `locality.strict`.
#[must_use]
pub fn resolve_locality(vm: &VmRequest, servers: &[&Server]) -> ResolvedLocality {
    let mut resolved = ResolvedLocality::default();

    for rule in &vm.affinity {
        let matched = servers_matching_rule(rule, servers);
        match (rule.operator, rule.is_soft) {
            (AffinityOperator::Eq, false) => resolved.hard_near.extend(matched),
            (AffinityOperator::Eq, true) => resolved.soft_near.extend(matched),
            (AffinityOperator::Ne, false) => resolved.hard_far.extend(matched),
            (AffinityOperator::Ne, true) => resolved.soft_far.extend(matched),
        }
    }

    let locality_servers_for = |target_vms: &[VmUuid]| -> HashSet<ServerUuid> {
        servers
            .iter()
            .filter(|server| target_vms.iter().any(|vm_uuid| server.vms.contains_key(vm_uuid)))
            .map(|server| server.uuid)
            .collect()
    };

    let near = locality_servers_for(&vm.locality.near);
    let far = locality_servers_for(&vm.locality.far);
    if vm.locality.strict {
        resolved.hard_near.extend(near);
        resolved.hard_far.extend(far);
    } else {
        resolved.soft_near.extend(near);
        resolved.soft_far.extend(far);
    }

    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{OverprovisionRatios, ResidentVm};
    use std::collections::HashMap;
    use triton_core::uuid::OwnerUuid;

    fn server_with_vm(vm_uuid: VmUuid, alias: Option<&str>) -> Server {
        let mut vms = HashMap::new();
        vms.insert(
            vm_uuid,
            ResidentVm {
                max_physical_memory: 1024,
                cpu_cap: Some(100),
                owner_uuid: OwnerUuid::new_v4(),
                alias: alias.map(str::to_string),
                docker_id: None,
                tags: HashMap::new(),
            },
        );
        Server {
            uuid: ServerUuid::new_v4(),
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
            vms,
            rack_identifier: None,
            next_reboot_ms: None,
            unreserved_ram: 0,
            unreserved_cpu: 0.0,
            unreserved_disk: 0,
            derivation_ok: true,
        }
    }

    fn base_vm() -> VmRequest {
        VmRequest {
            uuid: VmUuid::new_v4(),
            owner_uuid: OwnerUuid::new_v4(),
            ram: 1024,
            cpu_cap: Some(100),
            quota: 1024,
            brand: "joyent".to_string(),
            nic_tags: vec![],
            traits: HashMap::new(),
            locality: crate::model::Locality::default(),
            affinity: vec![],
            image_uuid: triton_core::uuid::ImageUuid::new_v4(),
            package_uuid: triton_core::uuid::PackageUuid::new_v4(),
            tags: HashMap::new(),
            internal_metadata: HashMap::new(),
        }
    }

    #[test]
    fn hard_affinity_rule_resolves_by_alias() {
        let sibling = VmUuid::new_v4();
        let server = server_with_vm(sibling, Some("web-1"));

        let mut vm = base_vm();
        vm.affinity.push(AffinityRule {
            key: "instance".to_string(),
            operator: AffinityOperator::Eq,
            value: "web-1".to_string(),
            value_type: AffinityMatchType::Exact,
            is_soft: false,
        });

        let resolved = resolve_locality(&vm, &[&server]);
        assert!(resolved.hard_near.contains(&server.uuid));
        assert!(resolved.hard_far.is_empty());
    }

    #[test]
    fn soft_anti_affinity_by_tag() {
        let sibling = VmUuid::new_v4();
        let mut server = server_with_vm(sibling, None);
        server
            .vms
            .get_mut(&sibling)
            .unwrap()
            .tags
            .insert("role".to_string(), "db".to_string());

        let mut vm = base_vm();
        vm.affinity.push(AffinityRule {
            key: "role".to_string(),
            operator: AffinityOperator::Ne,
            value: "db".to_string(),
            value_type: AffinityMatchType::Exact,
            is_soft: true,
        });

        let resolved = resolve_locality(&vm, &[&server]);
        assert!(resolved.soft_far.contains(&server.uuid));
        assert!(resolved.hard_far.is_empty());
    }

    #[test]
    fn strict_locality_field_is_hard() {
        let sibling = VmUuid::new_v4();
        let server = server_with_vm(sibling, None);

        let mut vm = base_vm();
        vm.locality.near = vec![sibling];
        vm.locality.strict = true;

        let resolved = resolve_locality(&vm, &[&server]);
        assert!(resolved.hard_near.contains(&server.uuid));
    }

    #[test]
    fn non_strict_locality_field_is_soft() {
        let sibling = VmUuid::new_v4();
        let server = server_with_vm(sibling, None);

        let mut vm = base_vm();
        vm.locality.far = vec![sibling];

        let resolved = resolve_locality(&vm, &[&server]);
        assert!(resolved.soft_far.contains(&server.uuid));
        assert!(resolved.hard_far.is_empty());
    }

    #[test]
    fn glob_affinity_rule_matches_alias_pattern() {
        let sibling = VmUuid::new_v4();
        let server = server_with_vm(sibling, Some("web-03"));

        let mut vm = base_vm();
        vm.affinity.push(AffinityRule {
            key: "instance".to_string(),
            operator: AffinityOperator::Eq,
            value: "web-*".to_string(),
            value_type: AffinityMatchType::Glob,
            is_soft: false,
        });

        let resolved = resolve_locality(&vm, &[&server]);
        assert!(resolved.hard_near.contains(&server.uuid));
    }

    #[test]
    fn regex_affinity_rule_matches_tag_value() {
        let sibling = VmUuid::new_v4();
        let mut server = server_with_vm(sibling, None);
        server
            .vms
            .get_mut(&sibling)
            .unwrap()
            .tags
            .insert("role".to_string(), "db-primary".to_string());

        let mut vm = base_vm();
        vm.affinity.push(AffinityRule {
            key: "role".to_string(),
            operator: AffinityOperator::Eq,
            value: "^db-.*$".to_string(),
            value_type: AffinityMatchType::Re,
            is_soft: false,
        });

        let resolved = resolve_locality(&vm, &[&server]);
        assert!(resolved.hard_near.contains(&server.uuid));
    }

    #[test]
    fn exact_instance_match_accepts_unambiguous_docker_prefix() {
        let sibling = VmUuid::new_v4();
        let mut server = server_with_vm(sibling, None);
        server.vms.get_mut(&sibling).unwrap().docker_id = Some("abcdef0123456789".to_string());

        let mut vm = base_vm();
        vm.affinity.push(AffinityRule {
            key: "container".to_string(),
            operator: AffinityOperator::Eq,
            value: "abcdef01".to_string(),
            value_type: AffinityMatchType::Exact,
            is_soft: false,
        });

        let resolved = resolve_locality(&vm, &[&server]);
        assert!(resolved.hard_near.contains(&server.uuid));
    }
}
