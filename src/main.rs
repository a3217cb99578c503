use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use hostalias_operator::config::{parse_host_alias, ConfigOverrides};
use hostalias_operator::controller::{
    self, aliases, ControllerRuntime, HostAliasEntry, KubeWorkloadClient, TriggerScheduler,
    WorkloadSnapshot,
};
use hostalias_operator::{Error, OperatorConfig};
use k8s_openapi::api::apps::v1::Deployment;
use kube::api::{Api, ListParams};
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the operator
    Run(RunArgs),
    /// Show version information
    Version,
    /// Show which deployments still need the host aliases
    Info(InfoArgs),
}

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Options shared by every subcommand that talks to the cluster
#[derive(Parser, Debug)]
struct ClusterArgs {
    /// YAML configuration file
    #[arg(long, env = "HOSTALIAS_CONFIG")]
    config: Option<PathBuf>,

    /// Namespace to watch and patch
    #[arg(long, env = "OPERATOR_NAMESPACE")]
    namespace: Option<String>,

    /// Kubeconfig context used when running outside the cluster
    #[arg(long, env = "CLUSTER_CONTEXT")]
    context: Option<String>,

    /// Host alias to inject, as IP=HOST[,HOST...] (repeatable)
    #[arg(long = "host-alias", value_parser = parse_host_alias)]
    host_aliases: Vec<HostAliasEntry>,

    /// Overwrite the whole alias list instead of merging into it
    #[arg(long, env = "REPLACE_ALIASES")]
    replace_aliases: bool,
}

#[derive(Parser, Debug)]
struct RunArgs {
    #[command(flatten)]
    cluster: ClusterArgs,

    /// Seconds between timer triggers
    #[arg(long, env = "RECONCILE_INTERVAL_SECS")]
    interval_secs: Option<u64>,

    /// Seconds each watch session stays open
    #[arg(long, env = "WATCH_TIMEOUT_SECS")]
    watch_timeout_secs: Option<u64>,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Address of the health and metrics endpoint
    #[arg(long, env = "METRICS_ADDR", default_value = "0.0.0.0:8080")]
    metrics_addr: SocketAddr,
}

#[derive(Parser, Debug)]
struct InfoArgs {
    #[command(flatten)]
    cluster: ClusterArgs,
}

impl ClusterArgs {
    fn load_config(
        &self,
        interval_secs: Option<u64>,
        watch_timeout_secs: Option<u64>,
    ) -> Result<OperatorConfig, Error> {
        let overrides = ConfigOverrides {
            namespace: self.namespace.clone(),
            interval_secs,
            watch_timeout_secs,
            cluster_context: self.context.clone(),
            host_aliases: self.host_aliases.clone(),
            replace_aliases: self.replace_aliases,
        };
        OperatorConfig::load(self.config.as_deref(), overrides)
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Args::parse();

    match args.command {
        Commands::Version => {
            println!("HostAlias Operator v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Info(info_args) => run_info(info_args).await,
        Commands::Run(run_args) => run_operator(run_args).await,
    }
}

async fn run_info(args: InfoArgs) -> Result<(), Error> {
    let config = args.cluster.load_config(None, None)?;
    let client = controller::connect(config.cluster_context.as_deref()).await?;

    let api: Api<Deployment> = Api::namespaced(client, &config.namespace);
    let deployments = api
        .list(&ListParams::default())
        .await
        .map_err(Error::KubeError)?;

    let mut pending = 0;
    for deployment in &deployments.items {
        let snapshot = WorkloadSnapshot::from_deployment(deployment);
        match aliases::plan_patch(&snapshot, &config.desired_mutation, config.alias_strategy) {
            Some(patch) => {
                pending += 1;
                println!(
                    "{}: needs patch ({} -> {} alias entries)",
                    snapshot.identity,
                    snapshot.host_aliases.len(),
                    patch.host_aliases.len()
                );
            }
            None => println!("{}: converged", snapshot.identity),
        }
    }

    println!(
        "Deployments in {}: {} ({} pending)",
        config.namespace,
        deployments.items.len(),
        pending
    );
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let env_filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    let fmt_layer = match format {
        LogFormat::Text => fmt::layer().with_target(true).boxed(),
        LogFormat::Json => fmt::layer().json().with_target(true).boxed(),
    };

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer);

    let otel_layer = hostalias_operator::telemetry::init_telemetry(&registry);
    let otel_enabled = otel_layer.is_some();
    registry.with(otel_layer).init();

    if otel_enabled {
        info!("OpenTelemetry tracing initialized");
    } else {
        info!("OpenTelemetry tracing disabled (OTEL_EXPORTER_OTLP_ENDPOINT not set)");
    }
}

async fn run_operator(args: RunArgs) -> Result<(), Error> {
    init_tracing(args.log_format);

    info!("Starting HostAlias Operator v{}", env!("CARGO_PKG_VERSION"));

    let config = args
        .cluster
        .load_config(args.interval_secs, args.watch_timeout_secs)?;

    info!(
        namespace = %config.namespace,
        interval_secs = config.interval.as_secs(),
        watch_timeout_secs = config.watch_timeout.as_secs(),
        strategy = ?config.alias_strategy,
        "Loaded configuration with {} host alias entries",
        config.desired_mutation.entries.len()
    );
    if config.sessions_overlap() {
        warn!(
            "Watch timeout {:?} exceeds interval {:?}; timer sessions will overlap",
            config.watch_timeout, config.interval
        );
    }

    let client = controller::connect(config.cluster_context.as_deref()).await?;
    info!("Connected to Kubernetes cluster");

    #[cfg(not(feature = "rest-api"))]
    let _ = args.metrics_addr;

    #[cfg(feature = "rest-api")]
    {
        let addr = args.metrics_addr;
        tokio::spawn(async move {
            if let Err(e) = hostalias_operator::rest_api::run_server(addr).await {
                tracing::error!("Health endpoint error: {:?}", e);
            }
        });
    }

    let workloads = Arc::new(KubeWorkloadClient::new(client));
    let scheduler = Arc::new(TriggerScheduler::new(workloads, &config));

    // One full session plus slack for its last patch.
    let shutdown_grace = config.watch_timeout + Duration::from_secs(5);
    ControllerRuntime::new(scheduler, config.interval, shutdown_grace)
        .run(shutdown_signal())
        .await;

    // Flush any remaining traces
    hostalias_operator::telemetry::shutdown_telemetry();

    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
