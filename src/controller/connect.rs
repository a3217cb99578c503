//! Cluster connection
//!
//! Prefers the in-cluster service account and falls back to the local
//! kubeconfig, optionally pinned to a named context.

use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Build an authenticated client for the target cluster.
pub async fn connect(context: Option<&str>) -> Result<Client> {
    let config = match Config::incluster() {
        Ok(config) => {
            info!("Loaded in-cluster configuration");
            config
        }
        Err(e) => {
            debug!("In-cluster configuration unavailable: {}", e);
            let options = KubeConfigOptions {
                context: context.map(str::to_string),
                ..Default::default()
            };
            let config = Config::from_kubeconfig(&options).await?;
            info!("Loaded kubeconfig file with context {:?}", context);
            log_active_context(context);
            config
        }
    };

    info!("Connecting to cluster at {}", config.cluster_url);
    Client::try_from(config).map_err(Error::KubeError)
}

fn log_active_context(requested: Option<&str>) {
    let active = match requested {
        Some(name) => Some(name.to_string()),
        None => match Kubeconfig::read() {
            Ok(kubeconfig) => kubeconfig.current_context,
            Err(e) => {
                debug!("Could not re-read kubeconfig: {}", e);
                None
            }
        },
    };

    match active {
        Some(name) => info!("The active context is {}", name),
        None => info!("No active context"),
    }
}
