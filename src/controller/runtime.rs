//! Controller runtime
//!
//! Invokes the startup trigger once and the timer trigger every interval.
//! Each invocation runs as its own task so a long watch session never delays
//! the next tick.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tracing::{error, info, warn};

use super::scheduler::{SessionSummary, TriggerScheduler};

pub struct ControllerRuntime {
    scheduler: Arc<TriggerScheduler>,
    interval: Duration,
    shutdown_grace: Duration,
}

impl ControllerRuntime {
    /// `shutdown_grace` bounds how long in-flight sessions may keep running
    /// after shutdown is requested; it should cover one watch session.
    pub fn new(
        scheduler: Arc<TriggerScheduler>,
        interval: Duration,
        shutdown_grace: Duration,
    ) -> Self {
        Self {
            scheduler,
            interval,
            shutdown_grace,
        }
    }

    /// Drive the triggers until `shutdown` resolves, then let in-flight
    /// sessions finish within the grace period.
    pub async fn run<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut tasks: JoinSet<SessionSummary> = JoinSet::new();

        let startup = Arc::clone(&self.scheduler);
        tasks.spawn(async move { startup.on_startup().await });

        // The startup trigger covers t=0; the first timer fires one interval later.
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping triggers");
                    break;
                }
                _ = ticker.tick() => {
                    if !tasks.is_empty() {
                        warn!(
                            in_flight = tasks.len(),
                            "Starting timer trigger while earlier sessions are still running"
                        );
                    }
                    let scheduler = Arc::clone(&self.scheduler);
                    tasks.spawn(async move { scheduler.on_timer().await });
                }
                Some(joined) = tasks.join_next() => {
                    if let Err(e) = joined {
                        error!("Trigger invocation did not complete: {}", e);
                    }
                }
            }
        }

        if tasks.is_empty() {
            return;
        }

        info!(
            in_flight = tasks.len(),
            "Waiting up to {:?} for running sessions", self.shutdown_grace
        );
        let drained = timeout(self.shutdown_grace, async {
            while let Some(joined) = tasks.join_next().await {
                if let Err(e) = joined {
                    error!("Trigger invocation did not complete: {}", e);
                }
            }
        })
        .await;

        if drained.is_err() {
            warn!(
                in_flight = tasks.len(),
                "Grace period elapsed, aborting remaining sessions"
            );
            tasks.shutdown().await;
        }
    }
}
