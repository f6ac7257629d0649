// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Aegis Gateway
//!
//! The `aegis-gateway` binary wires the core services together and serves
//! the HTTP surface. Configuration comes from flags or environment
//! (`PORT`, `POLICY_DIR`, `OTEL_ENDPOINT`, `DECISION_RING_SIZE`,
//! `APPROVAL_TTL_SECONDS`).
//!
//! Exit codes: 0 clean shutdown, 1 fatal init error (e.g. policy directory
//! missing), 2 port bind failure.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

use aegis_core::application::dispatch::DispatchService;
use aegis_core::infrastructure::adapters::AdapterRegistry;
use aegis_core::infrastructure::telemetry::{init_otlp_tracer, Telemetry, TracingTelemetry};
use aegis_core::infrastructure::watcher::{PolicyWatcher, WatcherConfig};
use aegis_core::infrastructure::{ApprovalStore, DecisionRing, PolicyIndex, PolicyLoader};
use aegis_core::presentation::{app, AppState};

const SERVICE_NAME: &str = "aegis-gateway";
const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Aegis Gateway - least-privilege enforcement for agent tool calls
#[derive(Parser)]
#[command(name = "aegis-gateway")]
#[command(version, about, long_about = None)]
struct Cli {
    /// HTTP listen port
    #[arg(long, env = "PORT", default_value = "8080")]
    port: u16,

    /// Directory of YAML policy files
    #[arg(long, env = "POLICY_DIR", default_value = "./policies", value_name = "DIR")]
    policy_dir: PathBuf,

    /// OTLP collector endpoint; omit to disable trace export
    #[arg(long, env = "OTEL_ENDPOINT")]
    otel_endpoint: Option<String>,

    /// Capacity of the in-memory decision ring
    #[arg(long, env = "DECISION_RING_SIZE", default_value = "50")]
    decision_ring_size: usize,

    /// Pending-approval TTL in seconds
    #[arg(long, env = "APPROVAL_TTL_SECONDS", default_value = "900")]
    approval_ttl_seconds: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "AEGIS_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

enum Fatal {
    Init(anyhow::Error),
    Bind(anyhow::Error),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(&cli.log_level) {
        eprintln!("failed to initialize logging: {:#}", e);
        std::process::exit(1);
    }

    match run(cli).await {
        Ok(()) => {}
        Err(Fatal::Init(e)) => {
            error!("fatal init error: {:#}", e);
            std::process::exit(1);
        }
        Err(Fatal::Bind(e)) => {
            error!("bind failure: {:#}", e);
            std::process::exit(2);
        }
    }
}

async fn run(cli: Cli) -> Result<(), Fatal> {
    if !cli.policy_dir.is_dir() {
        return Err(Fatal::Init(anyhow::anyhow!(
            "policy directory does not exist: {}",
            cli.policy_dir.display()
        )));
    }

    let telemetry: Arc<dyn Telemetry> = Arc::new(TracingTelemetry::new());

    // Keep the provider alive for the life of the process; dropping it on
    // the way out flushes the batch queue.
    let _otlp_provider = match &cli.otel_endpoint {
        Some(endpoint) => match init_otlp_tracer(SERVICE_NAME, endpoint).await {
            Ok(provider) => Some(provider),
            Err(e) => {
                warn!(error = %e, "Failed to set up OTLP exporter; continuing without export");
                None
            }
        },
        None => None,
    };

    // Initial load is fatal only if the directory itself cannot be read;
    // individual bad files are warnings here, exactly as on reload.
    let (initial, warnings) = PolicyLoader::load(&cli.policy_dir)
        .map_err(|e| Fatal::Init(anyhow::Error::new(e).context("initial policy load failed")))?;
    telemetry.policy_reloaded(&initial, &warnings);

    let index = Arc::new(PolicyIndex::new(initial));
    let ring = Arc::new(DecisionRing::new(cli.decision_ring_size));
    let approvals = Arc::new(ApprovalStore::new(Duration::from_secs(
        cli.approval_ttl_seconds,
    )));
    let _sweeper = approvals.spawn_sweeper(SWEEP_INTERVAL);

    let _watcher = PolicyWatcher::spawn(
        cli.policy_dir.clone(),
        index.clone(),
        telemetry.clone(),
        WatcherConfig::default(),
    )
    .map_err(|e| Fatal::Init(anyhow::Error::new(e).context("failed to watch policy directory")))?;
    info!(dir = %cli.policy_dir.display(), "Watching for policy changes");

    let adapters = Arc::new(AdapterRegistry::with_mock_adapters());
    let dispatch = Arc::new(DispatchService::new(
        index.clone(),
        approvals.clone(),
        ring.clone(),
        adapters,
        telemetry,
    ));

    let router = app(AppState::new(dispatch, index, ring, approvals));

    let addr = format!("0.0.0.0:{}", cli.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))
        .map_err(Fatal::Bind)?;

    info!(addr = %addr, "Gateway listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")
        .map_err(Fatal::Init)?;

    info!("Gateway shutting down");
    Ok(())
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
