//! Typed views of the objects flowing through the watch-and-reconcile loop.

use std::fmt;

use k8s_openapi::api::apps::v1::Deployment;
use kube::ResourceExt;
use serde::{Deserialize, Serialize};

/// (namespace, name) of a workload. Stable for the object's lifetime.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceIdentity {
    pub namespace: String,
    pub name: String,
}

impl ResourceIdentity {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// A single `hostAliases` entry of a pod template.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostAliasEntry {
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub hostnames: Vec<String>,
}

impl HostAliasEntry {
    pub fn new<I, S>(ip: impl Into<String>, hostnames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ip: ip.into(),
            hostnames: hostnames.into_iter().map(Into::into).collect(),
        }
    }
}

/// Observed state of a Deployment at event time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkloadSnapshot {
    pub identity: ResourceIdentity,
    /// Optimistic-concurrency token, absent for objects not read from a server
    pub resource_version: Option<String>,
    pub host_aliases: Vec<HostAliasEntry>,
}

impl WorkloadSnapshot {
    /// Capture the identity and pod-template host aliases of a Deployment.
    pub fn from_deployment(deployment: &Deployment) -> Self {
        let host_aliases = deployment
            .spec
            .as_ref()
            .and_then(|spec| spec.template.spec.as_ref())
            .and_then(|pod| pod.host_aliases.as_ref())
            .map(|aliases| {
                aliases
                    .iter()
                    .filter_map(|alias| {
                        serde_json::to_value(alias)
                            .and_then(serde_json::from_value::<HostAliasEntry>)
                            .ok()
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            identity: ResourceIdentity::new(
                deployment
                    .namespace()
                    .unwrap_or_else(|| "default".to_string()),
                deployment.name_any(),
            ),
            resource_version: deployment.resource_version(),
            host_aliases,
        }
    }
}

/// Server-reported failure inside a watch stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WatchErrorInfo {
    pub code: u16,
    pub message: String,
}

/// A change observed during one watch session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChangeEvent {
    Added(WorkloadSnapshot),
    Modified(WorkloadSnapshot),
    Deleted(WorkloadSnapshot),
    Error(WatchErrorInfo),
}

impl ChangeEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            ChangeEvent::Added(_) => "added",
            ChangeEvent::Modified(_) => "modified",
            ChangeEvent::Deleted(_) => "deleted",
            ChangeEvent::Error(_) => "error",
        }
    }
}

/// The alias entries every in-scope workload must carry.
///
/// Built once from configuration and shared read-only.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DesiredMutation {
    pub entries: Vec<HostAliasEntry>,
}

impl DesiredMutation {
    pub fn new(entries: Vec<HostAliasEntry>) -> Self {
        Self { entries }
    }
}

/// How the desired entries are combined with what a workload already carries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AliasStrategy {
    /// Union with existing entries, de-duplicated by IP
    #[default]
    Merge,
    /// Overwrite the whole list with the desired entries
    Replace,
}
