//! HostAlias Operator: keeps a fixed set of `hostAliases` injected into the
//! pod templates of every Deployment in a namespace.
//!
//! The controller samples the Deployment change stream in bounded watch
//! sessions, started once at startup and then on a timer, and converges each
//! observed workload with a conditional merge patch.

pub mod config;
pub mod controller;
pub mod error;
pub mod telemetry;

#[cfg(feature = "rest-api")]
pub mod rest_api;

pub use crate::config::OperatorConfig;
pub use crate::error::{Error, Result};
