//! Health and metrics HTTP endpoint
//!
//! Serves liveness for probes and, with the `metrics` feature, the
//! Prometheus registry.

mod handlers;
mod server;

pub use server::{router, run_server, DEFAULT_LISTEN_ADDR};
