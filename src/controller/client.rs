//! Workload client seam
//!
//! The reconcile loop only ever talks to the cluster through [`WorkloadClient`],
//! so it can be driven by the real API server or by a test double.

use std::time::Duration;

use async_trait::async_trait;
use futures::future;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use k8s_openapi::api::apps::v1::Deployment;
use kube::api::{Api, Patch, PatchParams, WatchEvent, WatchParams};
use kube::Client;
use thiserror::Error;
use tracing::{trace, warn};

#[cfg(test)]
use mockall::automock;

use super::aliases::AliasPatch;
use super::types::{ChangeEvent, ResourceIdentity, WatchErrorInfo, WorkloadSnapshot};

/// Field manager recorded on every patch
pub const FIELD_MANAGER: &str = "hostalias-operator";

/// Upper bound the API server accepts for `timeoutSeconds` on a watch
pub const MAX_WATCH_TIMEOUT_SECS: u32 = 290;

/// Why a patch submission failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatchError {
    /// The object's resource version moved since the snapshot was taken
    #[error("resource version conflict: {message}")]
    Conflict { message: String },

    /// The server refused the patch (not found, forbidden, invalid, ...)
    #[error("patch rejected ({code} {reason}): {message}")]
    Rejected {
        code: u16,
        reason: String,
        message: String,
    },

    /// No API status was received (connection, TLS, timeout)
    #[error("API server unavailable: {0}")]
    Unavailable(String),
}

impl From<kube::Error> for PatchError {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(resp) if resp.code == 409 => PatchError::Conflict {
                message: resp.message,
            },
            kube::Error::Api(resp) => PatchError::Rejected {
                code: resp.code,
                reason: resp.reason,
                message: resp.message,
            },
            other => PatchError::Unavailable(other.to_string()),
        }
    }
}

/// Trait abstracting the workload operations the controller needs
///
/// Authentication and context selection happen before an implementation is
/// constructed; the controller never sees credentials.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait WorkloadClient: Send + Sync {
    /// Replay the current workloads as `Added` events, then stream live
    /// changes until `timeout` elapses or the server closes the connection.
    ///
    /// Failures end the stream; they are logged, never returned.
    async fn list_and_watch(
        &self,
        namespace: &str,
        timeout: Duration,
    ) -> BoxStream<'static, ChangeEvent>;

    /// Submit an alias patch and return the resulting object.
    async fn patch(
        &self,
        identity: &ResourceIdentity,
        patch: &AliasPatch,
    ) -> Result<WorkloadSnapshot, PatchError>;

    /// Read the current state of a single workload.
    async fn get(&self, identity: &ResourceIdentity) -> Result<WorkloadSnapshot, PatchError>;

    /// Whether `patch` honours `AliasPatch::resource_version` as a precondition.
    fn supports_conditional_patch(&self) -> bool {
        true
    }
}

/// [`WorkloadClient`] backed by the Deployments API
#[derive(Clone)]
pub struct KubeWorkloadClient {
    client: Client,
}

impl KubeWorkloadClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn deployments(&self, namespace: &str) -> Api<Deployment> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

/// Server-side watch timeout for a session of length `timeout`.
pub fn server_watch_timeout(timeout: Duration) -> u32 {
    u32::try_from(timeout.as_secs())
        .unwrap_or(u32::MAX)
        .clamp(1, MAX_WATCH_TIMEOUT_SECS)
}

fn into_change_event(event: WatchEvent<Deployment>) -> Option<ChangeEvent> {
    match event {
        WatchEvent::Added(d) => Some(ChangeEvent::Added(WorkloadSnapshot::from_deployment(&d))),
        WatchEvent::Modified(d) => Some(ChangeEvent::Modified(
            WorkloadSnapshot::from_deployment(&d),
        )),
        WatchEvent::Deleted(d) => Some(ChangeEvent::Deleted(WorkloadSnapshot::from_deployment(
            &d,
        ))),
        WatchEvent::Bookmark(_) => {
            trace!("Skipping watch bookmark");
            None
        }
        WatchEvent::Error(resp) => Some(ChangeEvent::Error(WatchErrorInfo {
            code: resp.code,
            message: resp.message,
        })),
    }
}

/// Adapt a raw watch stream into change events.
///
/// The first transport error ends the stream; it is logged and later items are
/// never read.
pub fn change_events<S>(namespace: String, events: S) -> BoxStream<'static, ChangeEvent>
where
    S: Stream<Item = Result<WatchEvent<Deployment>, kube::Error>> + Send + 'static,
{
    events
        .take_while(move |item| {
            if let Err(e) = item {
                warn!(
                    namespace = %namespace,
                    classification = "TransientWatchFailure",
                    "Watch connection failed before the session ended: {}", e
                );
            }
            future::ready(item.is_ok())
        })
        .filter_map(|item| future::ready(item.ok().and_then(into_change_event)))
        .boxed()
}

#[async_trait]
impl WorkloadClient for KubeWorkloadClient {
    async fn list_and_watch(
        &self,
        namespace: &str,
        timeout: Duration,
    ) -> BoxStream<'static, ChangeEvent> {
        let params = WatchParams::default().timeout(server_watch_timeout(timeout));

        // Version "0" makes the server replay existing objects as ADDED first.
        let events = match self.deployments(namespace).watch(&params, "0").await {
            Ok(events) => events,
            Err(e) => {
                warn!(
                    namespace = %namespace,
                    classification = "TransientWatchFailure",
                    "Failed to open watch: {}", e
                );
                return stream::empty().boxed();
            }
        };

        change_events(namespace.to_string(), events)
    }

    async fn patch(
        &self,
        identity: &ResourceIdentity,
        patch: &AliasPatch,
    ) -> Result<WorkloadSnapshot, PatchError> {
        let body = patch.to_merge_patch();
        let updated = self
            .deployments(&identity.namespace)
            .patch(
                &identity.name,
                &PatchParams::apply(FIELD_MANAGER),
                &Patch::Merge(&body),
            )
            .await?;

        Ok(WorkloadSnapshot::from_deployment(&updated))
    }

    async fn get(&self, identity: &ResourceIdentity) -> Result<WorkloadSnapshot, PatchError> {
        let deployment = self
            .deployments(&identity.namespace)
            .get(&identity.name)
            .await?;
        Ok(WorkloadSnapshot::from_deployment(&deployment))
    }
}
