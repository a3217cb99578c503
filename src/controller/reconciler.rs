//! Host-alias reconciler
//!
//! Brings one workload to the desired alias set with a single conditional
//! patch. Failures are classified and logged here; nothing is retried inline,
//! the next trigger re-observes anything still unconverged.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, info, instrument};

use super::aliases::plan_patch;
use super::client::{PatchError, WorkloadClient};
use super::types::{AliasStrategy, DesiredMutation, ResourceIdentity, WorkloadSnapshot};

/// Result of reconciling a single workload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Already carried the desired aliases; nothing was submitted
    AlreadyConverged,
    Patched,
    /// Another writer moved the object first
    Conflict,
    Rejected { code: u16, reason: String },
    Unavailable,
}

impl ReconcileOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileOutcome::AlreadyConverged => "already_converged",
            ReconcileOutcome::Patched => "patched",
            ReconcileOutcome::Conflict => "conflict",
            ReconcileOutcome::Rejected { .. } => "rejected",
            ReconcileOutcome::Unavailable => "unavailable",
        }
    }
}

/// Per-identity mutual exclusion for transports without conditional patches.
#[derive(Default)]
pub struct IdentityGate {
    locks: Mutex<HashMap<ResourceIdentity, Arc<Mutex<()>>>>,
}

impl IdentityGate {
    pub async fn lock(&self, identity: &ResourceIdentity) -> OwnedMutexGuard<()> {
        let slot = {
            let mut locks = self.locks.lock().await;
            // Drop slots nobody holds or waits on.
            locks.retain(|_, slot| Arc::strong_count(slot) > 1);
            Arc::clone(locks.entry(identity.clone()).or_default())
        };
        slot.lock_owned().await
    }
}

pub struct Reconciler {
    client: Arc<dyn WorkloadClient>,
    desired: Arc<DesiredMutation>,
    strategy: AliasStrategy,
    gate: Option<IdentityGate>,
}

impl Reconciler {
    pub fn new(
        client: Arc<dyn WorkloadClient>,
        desired: Arc<DesiredMutation>,
        strategy: AliasStrategy,
    ) -> Self {
        let gate = (!client.supports_conditional_patch()).then(IdentityGate::default);
        Self {
            client,
            desired,
            strategy,
            gate,
        }
    }

    /// Converge `snapshot` toward the desired aliases.
    ///
    /// Never fails: every error is classified into the returned outcome.
    #[instrument(skip(self, snapshot), fields(identity = %snapshot.identity))]
    pub async fn reconcile(&self, snapshot: &WorkloadSnapshot) -> ReconcileOutcome {
        let Some(gate) = &self.gate else {
            return self.apply(snapshot).await;
        };

        let _guard = gate.lock(&snapshot.identity).await;
        // The snapshot may be stale by the time the gate opens.
        match self.client.get(&snapshot.identity).await {
            Ok(current) => self.apply(&current).await,
            Err(e) => self.classify_failure(&snapshot.identity, e),
        }
    }

    async fn apply(&self, snapshot: &WorkloadSnapshot) -> ReconcileOutcome {
        let identity = &snapshot.identity;

        let Some(patch) = plan_patch(snapshot, &self.desired, self.strategy) else {
            debug!(identity = %identity, "Host aliases already converged");
            return ReconcileOutcome::AlreadyConverged;
        };

        info!(
            identity = %identity,
            aliases = patch.host_aliases.len(),
            "Patching host aliases"
        );

        match self.client.patch(identity, &patch).await {
            Ok(updated) => {
                info!(
                    identity = %identity,
                    resource_version = ?updated.resource_version,
                    "Patched deployment with host aliases"
                );
                ReconcileOutcome::Patched
            }
            Err(e) => self.classify_failure(identity, e),
        }
    }

    fn classify_failure(&self, identity: &ResourceIdentity, err: PatchError) -> ReconcileOutcome {
        match err {
            PatchError::Conflict { message } => {
                debug!(
                    identity = %identity,
                    classification = "PatchConflict",
                    "Deployment changed concurrently, leaving it to the next observation: {}",
                    message
                );
                ReconcileOutcome::Conflict
            }
            PatchError::Rejected {
                code,
                reason,
                message,
            } => {
                error!(
                    identity = %identity,
                    classification = "PatchRejected",
                    code,
                    reason = %reason,
                    "Failed to patch deployment: {}", message
                );
                ReconcileOutcome::Rejected { code, reason }
            }
            PatchError::Unavailable(message) => {
                error!(
                    identity = %identity,
                    classification = "PatchUnavailable",
                    "Failed to reach API server: {}", message
                );
                ReconcileOutcome::Unavailable
            }
        }
    }
}
