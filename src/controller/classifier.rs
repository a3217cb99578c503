//! Event classification
//!
//! Reconciliation only ever pushes workloads toward the desired aliases, so
//! only `Added` and `Modified` events are acted upon.

use tracing::{debug, warn};

use super::types::{ChangeEvent, WorkloadSnapshot};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiscardReason {
    Deleted,
    WatchError,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Classification<'a> {
    Actionable(&'a WorkloadSnapshot),
    Discard(DiscardReason),
}

/// Decide whether `event` should reach the reconciler.
pub fn classify(event: &ChangeEvent) -> Classification<'_> {
    match event {
        ChangeEvent::Added(snapshot) | ChangeEvent::Modified(snapshot) => {
            Classification::Actionable(snapshot)
        }
        ChangeEvent::Deleted(snapshot) => {
            debug!(
                identity = %snapshot.identity,
                classification = "ClassifierDiscard",
                "Ignoring deleted workload"
            );
            Classification::Discard(DiscardReason::Deleted)
        }
        ChangeEvent::Error(info) => {
            warn!(
                code = info.code,
                classification = "ClassifierDiscard",
                "Ignoring watch error event: {}", info.message
            );
            Classification::Discard(DiscardReason::WatchError)
        }
    }
}
