//! In-memory workload store used by the controller tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};

use super::aliases::AliasPatch;
use super::client::{PatchError, WorkloadClient};
use super::types::{ChangeEvent, HostAliasEntry, ResourceIdentity, WorkloadSnapshot};

/// Behaves like a tiny API server: resource versions bump on every write and
/// stale patches get a 409 when `conditional` is set.
pub struct FakeCluster {
    objects: Mutex<HashMap<ResourceIdentity, WorkloadSnapshot>>,
    events: Mutex<Vec<ChangeEvent>>,
    conditional: bool,
    pub patch_calls: AtomicUsize,
    pub watch_calls: AtomicUsize,
}

impl FakeCluster {
    pub fn new(conditional: bool) -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
            events: Mutex::new(Vec::new()),
            conditional,
            patch_calls: AtomicUsize::new(0),
            watch_calls: AtomicUsize::new(0),
        }
    }

    pub fn insert(
        &self,
        namespace: &str,
        name: &str,
        aliases: Vec<HostAliasEntry>,
    ) -> WorkloadSnapshot {
        let snapshot = WorkloadSnapshot {
            identity: ResourceIdentity::new(namespace, name),
            resource_version: Some("1".to_string()),
            host_aliases: aliases,
        };
        self.objects
            .lock()
            .unwrap()
            .insert(snapshot.identity.clone(), snapshot.clone());
        snapshot
    }

    pub fn snapshot(&self, namespace: &str, name: &str) -> WorkloadSnapshot {
        self.objects.lock().unwrap()[&ResourceIdentity::new(namespace, name)].clone()
    }

    /// Events every watch session replays, in order.
    pub fn script(&self, events: Vec<ChangeEvent>) {
        *self.events.lock().unwrap() = events;
    }

    pub fn patches(&self) -> usize {
        self.patch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WorkloadClient for FakeCluster {
    async fn list_and_watch(
        &self,
        _namespace: &str,
        _timeout: Duration,
    ) -> BoxStream<'static, ChangeEvent> {
        self.watch_calls.fetch_add(1, Ordering::SeqCst);
        stream::iter(self.events.lock().unwrap().clone()).boxed()
    }

    async fn patch(
        &self,
        identity: &ResourceIdentity,
        patch: &AliasPatch,
    ) -> Result<WorkloadSnapshot, PatchError> {
        self.patch_calls.fetch_add(1, Ordering::SeqCst);
        // Let a concurrent reconcile interleave here.
        tokio::task::yield_now().await;

        let mut objects = self.objects.lock().unwrap();
        let current = objects.get_mut(identity).ok_or_else(|| PatchError::Rejected {
            code: 404,
            reason: "NotFound".to_string(),
            message: format!("deployments \"{}\" not found", identity.name),
        })?;

        if self.conditional
            && patch.resource_version.is_some()
            && patch.resource_version != current.resource_version
        {
            return Err(PatchError::Conflict {
                message: "the object has been modified".to_string(),
            });
        }

        let next: u64 = current
            .resource_version
            .as_deref()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
            + 1;
        current.resource_version = Some(next.to_string());
        current.host_aliases = patch.host_aliases.clone();
        Ok(current.clone())
    }

    async fn get(&self, identity: &ResourceIdentity) -> Result<WorkloadSnapshot, PatchError> {
        tokio::task::yield_now().await;
        self.objects
            .lock()
            .unwrap()
            .get(identity)
            .cloned()
            .ok_or_else(|| PatchError::Rejected {
                code: 404,
                reason: "NotFound".to_string(),
                message: format!("deployments \"{}\" not found", identity.name),
            })
    }

    fn supports_conditional_patch(&self) -> bool {
        self.conditional
    }
}
