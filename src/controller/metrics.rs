//! Prometheus metrics for the host-alias operator
//!
//! # Exported metrics
//! The `/metrics` endpoint (when built with `--features metrics`) exports:
//! - `hostalias_watch_sessions_total` (counter): watch sessions opened, labeled by trigger.
//! - `hostalias_events_total` (counter): change events observed, labeled by kind.
//! - `hostalias_reconcile_total` (counter): reconcile outcomes, labeled by outcome.
//! - `hostalias_session_duration_seconds` (histogram): session length, labeled by trigger.

use std::sync::atomic::AtomicU64;

use once_cell::sync::Lazy;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::registry::Registry;

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct TriggerLabels {
    /// "startup" or "timer"
    pub trigger: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct EventLabels {
    /// "added", "modified", "deleted" or "error"
    pub kind: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct OutcomeLabels {
    pub outcome: String,
}

pub static WATCH_SESSIONS_TOTAL: Lazy<Family<TriggerLabels, Counter<u64, AtomicU64>>> =
    Lazy::new(Family::default);

pub static EVENTS_TOTAL: Lazy<Family<EventLabels, Counter<u64, AtomicU64>>> =
    Lazy::new(Family::default);

pub static RECONCILE_TOTAL: Lazy<Family<OutcomeLabels, Counter<u64, AtomicU64>>> =
    Lazy::new(Family::default);

pub static SESSION_DURATION_SECONDS: Lazy<Family<TriggerLabels, Histogram>> = Lazy::new(|| {
    fn session_histogram() -> Histogram {
        // 10ms .. ~5min across 16 buckets.
        Histogram::new(exponential_buckets(0.01, 2.25, 16))
    }

    Family::new_with_constructor(session_histogram)
});

/// Counters are registered without their `_total` suffix; the encoder appends it.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let mut registry = Registry::default();

    registry.register(
        "hostalias_watch_sessions",
        "Total number of watch sessions opened",
        WATCH_SESSIONS_TOTAL.clone(),
    );
    registry.register(
        "hostalias_events",
        "Total number of change events observed",
        EVENTS_TOTAL.clone(),
    );
    registry.register(
        "hostalias_reconcile",
        "Total number of reconcile attempts by outcome",
        RECONCILE_TOTAL.clone(),
    );
    registry.register(
        "hostalias_session_duration_seconds",
        "Duration of watch sessions in seconds",
        SESSION_DURATION_SECONDS.clone(),
    );

    registry
});

pub fn inc_watch_session(trigger: &str) {
    WATCH_SESSIONS_TOTAL
        .get_or_create(&TriggerLabels {
            trigger: trigger.to_string(),
        })
        .inc();
}

pub fn inc_event(kind: &str) {
    EVENTS_TOTAL
        .get_or_create(&EventLabels {
            kind: kind.to_string(),
        })
        .inc();
}

pub fn inc_reconcile(outcome: &str) {
    RECONCILE_TOTAL
        .get_or_create(&OutcomeLabels {
            outcome: outcome.to_string(),
        })
        .inc();
}

pub fn observe_session_duration(trigger: &str, seconds: f64) {
    SESSION_DURATION_SECONDS
        .get_or_create(&TriggerLabels {
            trigger: trigger.to_string(),
        })
        .observe(seconds);
}

/// Render the registry in the Prometheus text format.
pub fn encode_registry() -> Result<String, std::fmt::Error> {
    let mut buffer = String::new();
    prometheus_client::encoding::text::encode(&mut buffer, &REGISTRY)?;
    Ok(buffer)
}
