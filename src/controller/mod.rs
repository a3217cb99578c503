//! Controller module for host-alias reconciliation
//!
//! Trigger → watch session → classifier → reconciler → workload client.

pub mod aliases;
mod classifier;
pub mod client;
pub mod connect;
#[cfg(feature = "metrics")]
pub mod metrics;
mod reconciler;
mod runtime;
mod scheduler;
#[cfg(test)]
mod testing;
pub mod types;
mod watch;

pub use classifier::{classify, Classification, DiscardReason};
pub use client::{KubeWorkloadClient, PatchError, WorkloadClient};
pub use connect::connect;
pub use reconciler::{IdentityGate, ReconcileOutcome, Reconciler};
pub use runtime::ControllerRuntime;
pub use scheduler::{SessionSummary, Trigger, TriggerScheduler};
pub use types::{
    AliasStrategy, ChangeEvent, DesiredMutation, HostAliasEntry, ResourceIdentity,
    WorkloadSnapshot,
};
pub use watch::WatchSessionManager;
