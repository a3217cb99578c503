//! Host-alias patch planning
//!
//! Computes the alias list a workload should carry and the merge patch
//! that takes it there. Pure functions; no API access.

use std::net::IpAddr;

use serde_json::json;

use super::types::{AliasStrategy, DesiredMutation, HostAliasEntry, WorkloadSnapshot};

/// Patch for a single workload's pod-template host aliases.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AliasPatch {
    /// Resource version the patch was planned against
    pub resource_version: Option<String>,
    /// Full alias list to store in the pod template
    pub host_aliases: Vec<HostAliasEntry>,
}

impl AliasPatch {
    /// Render as a JSON merge patch.
    ///
    /// When a resource version is known it is sent in `metadata`, which makes
    /// the API server reject the patch with 409 if the object moved on.
    pub fn to_merge_patch(&self) -> serde_json::Value {
        let mut patch = json!({
            "spec": {
                "template": {
                    "spec": {
                        "hostAliases": self.host_aliases
                    }
                }
            }
        });

        if let Some(version) = &self.resource_version {
            patch["metadata"] = json!({ "resourceVersion": version });
        }

        patch
    }
}

/// Comparison key for an alias IP. Different spellings of one address
/// (`::1` and `0:0:0:0:0:0:0:1`) share a key; unparsable values compare raw.
#[derive(PartialEq, Eq)]
enum IpKey<'a> {
    Addr(IpAddr),
    Raw(&'a str),
}

fn ip_key(ip: &str) -> IpKey<'_> {
    match ip.parse::<IpAddr>() {
        Ok(addr) => IpKey::Addr(addr),
        Err(_) => IpKey::Raw(ip),
    }
}

/// Union of `existing` and `desired`, de-duplicated by IP address.
///
/// Existing entries keep their position and spelling. Hostnames of entries
/// sharing an address are combined, existing ones first.
pub fn merge_host_aliases(
    existing: &[HostAliasEntry],
    desired: &[HostAliasEntry],
) -> Vec<HostAliasEntry> {
    let mut merged: Vec<HostAliasEntry> = Vec::with_capacity(existing.len() + desired.len());

    for entry in existing.iter().chain(desired) {
        let key = ip_key(&entry.ip);
        match merged.iter_mut().find(|m| ip_key(&m.ip) == key) {
            Some(slot) => extend_hostnames(&mut slot.hostnames, &entry.hostnames),
            None => {
                let mut hostnames = Vec::with_capacity(entry.hostnames.len());
                extend_hostnames(&mut hostnames, &entry.hostnames);
                merged.push(HostAliasEntry {
                    ip: entry.ip.clone(),
                    hostnames,
                });
            }
        }
    }

    merged
}

fn extend_hostnames(target: &mut Vec<String>, extra: &[String]) {
    for hostname in extra {
        if !target.contains(hostname) {
            target.push(hostname.clone());
        }
    }
}

/// The alias list `snapshot` should end up with under `strategy`.
pub fn target_aliases(
    snapshot: &WorkloadSnapshot,
    desired: &DesiredMutation,
    strategy: AliasStrategy,
) -> Vec<HostAliasEntry> {
    match strategy {
        AliasStrategy::Merge => merge_host_aliases(&snapshot.host_aliases, &desired.entries),
        AliasStrategy::Replace => desired.entries.clone(),
    }
}

/// Plan the patch for `snapshot`, or `None` if it is already converged.
pub fn plan_patch(
    snapshot: &WorkloadSnapshot,
    desired: &DesiredMutation,
    strategy: AliasStrategy,
) -> Option<AliasPatch> {
    let host_aliases = target_aliases(snapshot, desired, strategy);
    if host_aliases == snapshot.host_aliases {
        return None;
    }

    Some(AliasPatch {
        resource_version: snapshot.resource_version.clone(),
        host_aliases,
    })
}
