//! Trigger entry points
//!
//! `on_startup` and `on_timer` do the same bounded unit of work: open one
//! watch session and feed its events through the classifier and reconciler.
//! Each invocation owns its session; invocations may overlap.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::time::Instant;
use tracing::{info, instrument};

use super::classifier::{classify, Classification};
use super::client::WorkloadClient;
use super::reconciler::{ReconcileOutcome, Reconciler};
use super::watch::WatchSessionManager;
use crate::config::OperatorConfig;

#[cfg(feature = "metrics")]
use super::metrics;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Trigger {
    Startup,
    Timer,
}

impl Trigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trigger::Startup => "startup",
            Trigger::Timer => "timer",
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counts for one trigger invocation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub events: usize,
    pub discarded: usize,
    pub patched: usize,
    pub already_converged: usize,
    pub conflicts: usize,
    pub rejected: usize,
    pub unavailable: usize,
}

impl SessionSummary {
    fn record(&mut self, outcome: &ReconcileOutcome) {
        match outcome {
            ReconcileOutcome::AlreadyConverged => self.already_converged += 1,
            ReconcileOutcome::Patched => self.patched += 1,
            ReconcileOutcome::Conflict => self.conflicts += 1,
            ReconcileOutcome::Rejected { .. } => self.rejected += 1,
            ReconcileOutcome::Unavailable => self.unavailable += 1,
        }
    }
}

pub struct TriggerScheduler {
    sessions: WatchSessionManager,
    reconciler: Reconciler,
    namespace: String,
    watch_timeout: Duration,
}

impl TriggerScheduler {
    pub fn new(client: Arc<dyn WorkloadClient>, config: &OperatorConfig) -> Self {
        let desired = Arc::new(config.desired_mutation.clone());
        Self {
            sessions: WatchSessionManager::new(Arc::clone(&client)),
            reconciler: Reconciler::new(client, desired, config.alias_strategy),
            namespace: config.namespace.clone(),
            watch_timeout: config.watch_timeout,
        }
    }

    /// Called once when the process becomes ready.
    pub async fn on_startup(&self) -> SessionSummary {
        self.run_session(Trigger::Startup).await
    }

    /// Called every configured interval.
    pub async fn on_timer(&self) -> SessionSummary {
        self.run_session(Trigger::Timer).await
    }

    #[instrument(skip(self), fields(namespace = %self.namespace))]
    async fn run_session(&self, trigger: Trigger) -> SessionSummary {
        let started = Instant::now();
        info!(
            "Watching deployments in namespace {} for {:?} ({} trigger)",
            self.namespace, self.watch_timeout, trigger
        );

        #[cfg(feature = "metrics")]
        metrics::inc_watch_session(trigger.as_str());

        let mut summary = SessionSummary::default();
        let mut events = self.sessions.open(&self.namespace, self.watch_timeout).await;

        while let Some(event) = events.next().await {
            summary.events += 1;

            #[cfg(feature = "metrics")]
            metrics::inc_event(event.kind());

            match classify(&event) {
                Classification::Actionable(snapshot) => {
                    let outcome = self.reconciler.reconcile(snapshot).await;

                    #[cfg(feature = "metrics")]
                    metrics::inc_reconcile(outcome.as_str());

                    summary.record(&outcome);
                }
                Classification::Discard(_) => summary.discarded += 1,
            }
        }

        #[cfg(feature = "metrics")]
        metrics::observe_session_duration(trigger.as_str(), started.elapsed().as_secs_f64());

        info!(
            trigger = %trigger,
            events = summary.events,
            patched = summary.patched,
            already_converged = summary.already_converged,
            discarded = summary.discarded,
            conflicts = summary.conflicts,
            rejected = summary.rejected,
            unavailable = summary.unavailable,
            "Watch session finished after {:?}",
            started.elapsed()
        );

        summary
    }
}
