use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use warden::admission::{AdmissionService, RuleRegistry, RulesConfig};
use warden::config::WardenConfig;
use warden::grpc::GateServer;

/// Per-caller admission control gate.
#[derive(Parser, Debug)]
#[command(name = "warden", version, about)]
struct Args {
    /// Service configuration file (YAML)
    #[arg(short, long)]
    config: Option<String>,

    /// Resource rules file (YAML), overrides `admission.rules_path`
    #[arg(short, long)]
    rules: Option<String>,

    /// gRPC listen address, overrides `server.grpc_addr`
    #[arg(long)]
    grpc_addr: Option<SocketAddr>,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_json);

    info!("Starting Warden Admission Service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = WardenConfig::load(args.config.as_deref())?;
    if let Some(rules) = args.rules {
        config.admission.rules_path = Some(rules);
    }
    if let Some(addr) = args.grpc_addr {
        config.server.grpc_addr = addr;
    }
    info!(grpc_addr = %config.server.grpc_addr, "Configuration loaded");

    let registry = match config.admission.rules_path.as_deref() {
        Some(path) => RulesConfig::from_file(path)?.into_registry()?,
        None => {
            warn!("No rules file configured, all resources are unlimited");
            RuleRegistry::default()
        }
    };
    info!(resources = registry.resource_count(), "Admission rules loaded");

    let admission = Arc::new(AdmissionService::new(registry));

    if let Some(interval) = config.admission.sweep_interval() {
        spawn_sweeper(admission.clone(), interval);
    }

    let server = GateServer::new(config.server.grpc_addr, admission);
    server.serve_with_shutdown(shutdown_signal()).await?;

    info!("Warden Admission Service stopped");
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Periodically drop histories that no rule can look at anymore.
///
/// A sweep walks every shard of the history map, so it runs on the blocking
/// pool rather than on a runtime worker.
fn spawn_sweeper(admission: Arc<AdmissionService>, interval: Duration) {
    info!(interval_secs = interval.as_secs(), "Idle history sweep enabled");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let admission = admission.clone();
            let sweep =
                tokio::task::spawn_blocking(move || admission.sweep_idle(chrono::Utc::now()));
            if let Err(e) = sweep.await {
                warn!(error = %e, "Idle history sweep failed");
            }
        }
    });
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
