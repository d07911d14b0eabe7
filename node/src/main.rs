// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Obligation Node
//!
//! Entry point for the `obligation-node` binary. Parses CLI arguments,
//! initializes logging and metrics, starts a notary and the configured
//! parties on an in-process network, and serves the HTTP API.
//!
//! Subcommands:
//!
//! - `run`: start the network and serve the API
//! - `version`: print build version information

mod api;
mod cli;
mod logging;
mod metrics;

use anyhow::{bail, Context, Result};
use clap::Parser;
use obligation_flows::{FlowNode, SimulatedNetwork};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::signal;

use cli::{Commands, ObligationNodeCli};
use metrics::NodeMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = ObligationNodeCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

async fn run_node(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(logging::DEFAULT_FILTER, args.log_format);

    let config = args.flow_config();
    tracing::info!(
        port = args.port,
        metrics_port = args.metrics_port,
        notary = %args.notary,
        parties = ?args.parties,
        config = ?config,
        "starting obligation-node"
    );

    // --- Network ---
    let net = SimulatedNetwork::new(config);
    net.add_notary(&args.notary);

    let mut nodes: HashMap<String, FlowNode> = HashMap::new();
    for name in &args.parties {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        if name == args.notary || nodes.contains_key(name) {
            bail!("party name {name} is used twice");
        }
        nodes.insert(name.to_string(), net.add_node(name));
    }
    if nodes.is_empty() {
        bail!("no parties configured");
    }

    // --- Metrics ---
    let node_metrics =
        Arc::new(NodeMetrics::new().context("failed to register Prometheus metrics")?);
    node_metrics.parties.set(nodes.len() as i64);

    // --- API server ---
    let app_state = api::AppState {
        nodes: Arc::new(nodes),
        network_map: net.network_map(),
        metrics: Arc::clone(&node_metrics),
    };
    let api_router = api::create_router(app_state);
    let api_addr = format!("0.0.0.0:{}", args.port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind API listener on {}", api_addr))?;
    tracing::info!("API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
    let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received");
        }
    }

    tracing::info!("obligation-node stopped");
    Ok(())
}

fn print_version() {
    println!("obligation-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol        {}", obligation_protocol::config::PROTOCOL_VERSION);
    println!(
        "wire protocol   {}",
        obligation_protocol::config::WIRE_PROTOCOL_VERSION
    );
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported. A handler that fails to
/// install is logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
