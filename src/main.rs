//! Adjacency daemon entry point.

use std::sync::Arc;

use log::{error, info};
use tokio::net::TcpListener;
use tokio::signal;

mod api;
mod collector;
mod config;
mod discovery;
mod error;
mod matrix;
mod metrics;
mod peer;
mod prober;
mod render;
mod types;

#[cfg(test)]
mod testutil;

use api::{metrics_router, router, Mesh};
use config::Config;
use discovery::{Discovery, HickoryDiscovery};
use metrics::Metrics;
use peer::PeerClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::init();

    // Load configuration
    let cfg = Config::load()?;
    info!("Starting adjacency daemon with config: {:?}", cfg);

    let discovery: Arc<dyn Discovery> = Arc::new(HickoryDiscovery::from_system_conf()?);

    // Probes and peer fetches use separate clients so each carries its own timeout.
    let ping_client = reqwest::Client::builder()
        .timeout(cfg.ping_timeout())
        .build()?;
    let vector_client = reqwest::Client::builder()
        .timeout(cfg.vector_timeout())
        .build()?;

    let metrics = Metrics::new()?;
    let mesh = Arc::new(Mesh {
        srv: cfg.srv_name()?,
        discovery: Arc::clone(&discovery),
        probers: prober::default_chain(ping_client, cfg.ping_timeout()),
        peers: Arc::new(PeerClient::new(vector_client, discovery)),
        metrics: metrics.clone(),
        graphviz_cmd: cfg.graphviz_cmd.clone(),
    });

    // Metrics listener
    let metrics_listener = TcpListener::bind(cfg.metrics_addr).await?;
    let metrics_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(metrics_listener, metrics_router(metrics)).await {
            error!("Metrics server failed: {}", e);
        }
    });

    // API listener
    let listener = TcpListener::bind(cfg.listen_addr).await?;
    info!("listening on {}", cfg.listen_addr);
    let api_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router(mesh)).await {
            error!("HTTP server failed: {}", e);
        }
    });

    // Graceful Shutdown
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Received Ctrl+C, shutting down...");
        }
        Err(err) => {
            error!("Unable to listen for shutdown signal: {}", err);
        }
    }

    api_handle.abort();
    metrics_handle.abort();

    info!("Shutdown complete.");
    Ok(())
}
