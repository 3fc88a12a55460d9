//! Dispatcher binary entry point.
//!
//! Owns an async runtime solely to host signal handling and coordinate
//! startup/shutdown ordering; none of the four thread roles it brings up
//! is itself asynchronous.

mod processor;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use config::Settings;
use diagnostics::DiagnosticsPublisher;
use model::{register_builtins, NodeRegistry, System};
use queue::WorkBuffer;
use rpc::{egress, ingress};
use simulator::client::{SimulatorClient, DEFAULT_SEND_TIMEOUT_MS};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::parse();
    init_logging();

    if let Err(e) = settings.validate() {
        eprintln!("{e}");
        std::process::exit(-1);
    }

    match run(settings).await {
        Ok(()) => Ok(()),
        Err(e) => {
            error!(error = %e, "startup failed");
            eprintln!("{e}");
            std::process::exit(-1);
        }
    }
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}

async fn run(settings: Settings) -> Result<()> {
    let ctx = zmq::Context::new();

    // Startup order: diagnostics publisher -> topology model -> processor -> RPC surface.
    let diagnostics = Arc::new(match &settings.logger {
        Some(endpoint) => DiagnosticsPublisher::enabled(ctx.clone(), endpoint.clone())
            .map_err(|e| anyhow::anyhow!("failed to start diagnostics publisher: {e}"))?,
        None => DiagnosticsPublisher::null(),
    });
    info!(enabled = diagnostics.is_enabled(), "diagnostics publisher started");

    let registry = NodeRegistry::new();
    register_builtins(&registry).context("failed to register built-in node models")?;
    let topology = System::new(registry);

    let document = settings
        .topology_document()
        .context("failed to resolve topology document")?;
    model::parser::load_topology(&topology, &document).context("failed to load topology")?;
    info!("topology loaded");

    let mut clients = Vec::with_capacity(settings.simulator_pool_size);
    for _ in 0..settings.simulator_pool_size {
        let client = SimulatorClient::connect(
            &ctx,
            &settings.simulator_endpoint,
            Duration::from_millis(DEFAULT_SEND_TIMEOUT_MS as u64),
            None,
            Arc::clone(&diagnostics),
        )
        .context("failed to connect a simulator client")?;
        clients.push(client);
    }

    // Exactly one create_system call, against the pool's first client.
    {
        let request = simulator::rpc::create_system(&settings.state_type);
        clients[0]
            .call(&request)
            .context("create_system failed")?;
    }
    info!(state_type = %settings.state_type, "simulator system created");

    // No CLI flag controls the work-buffer push-wait threshold; a
    // threshold of 1 reduces `wait_until_threshold` to "wake on every
    // push", which is the correct default absent an explicit batching
    // configuration.
    let incoming = Arc::new(WorkBuffer::new(1));
    let outgoing = Arc::new(WorkBuffer::new(1));

    let processor = processor::spawn(
        clients,
        topology.clone(),
        Arc::clone(&incoming),
        Arc::clone(&outgoing),
        Arc::clone(&diagnostics),
    );
    info!("processor started");

    let ingress_handle = ingress::start(
        ctx.clone(),
        &settings.ingress_endpoint,
        settings.ingress_threads,
        Arc::clone(&incoming),
        Arc::clone(&diagnostics),
    )
    .context("failed to start ingress")?;

    let egress_handle = egress::start(
        &ctx,
        &settings.egress_endpoint,
        Arc::clone(&outgoing),
        Arc::clone(&diagnostics),
    )
    .context("failed to start egress")?;
    info!("RPC surface started");

    wait_for_shutdown_signal().await;
    info!("shutdown signal received, tearing down");

    // Shutdown order: RPC surface, then processor, then diagnostics (dropped last, implicitly).
    ingress_handle.shutdown();
    egress_handle.shutdown();
    processor.shutdown();

    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
