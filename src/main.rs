//! # Compass Runtime Agent
//!
//! Runs the agent's long-lived surfaces: the metrics and probe server, the
//! Director proxy and the loop keeping the proxy's client certificate current.
//!
//! Application synchronization is driven by [`runtime_agent::director::Synchronizer`]
//! once an embedding layer supplies a Director configuration client.

use anyhow::{Context, Result};
use kube::Client;
use runtime_agent::config::{AgentConfig, LogFormat};
use runtime_agent::observability::metrics;
use runtime_agent::proxy::{CertificateRefresher, KubeCertificateSource, Proxy};
use runtime_agent::server::{start_server, ServerState};
use std::future::Future;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Must run before anything opens a TLS connection
    rustls::crypto::ring::default_provider()
        .install_default()
        .unwrap_or_else(|_| panic!("Failed to install rustls crypto provider"));

    let config = AgentConfig::from_env();
    init_tracing(config.log_format);

    info!("Starting Compass Runtime Agent");
    info!(
        "Build info: timestamp={}, datetime={}, git_hash={}",
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );

    metrics::register_metrics()?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let server_state = Arc::new(ServerState::default());

    let server = tokio::spawn({
        let state = Arc::clone(&server_state);
        let shutdown = shutdown_signal(&shutdown_rx);
        let port = config.metrics_port;
        async move {
            if let Err(e) = start_server(port, state, shutdown).await {
                error!("HTTP server error: {e}");
            }
        }
    });

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let proxy = Arc::new(Proxy::new(config.proxy_insecure_skip_verify));
    let proxy_server = tokio::spawn({
        let proxy = Arc::clone(&proxy);
        let shutdown = shutdown_signal(&shutdown_rx);
        let port = config.proxy_port;
        async move {
            if let Err(e) = proxy.serve(port, shutdown).await {
                error!("Director proxy error: {e}");
            }
        }
    });

    let refresher = match &config.director_url {
        Some(url) => {
            let source = Arc::new(KubeCertificateSource::new(
                client.clone(),
                &config.cluster_certificates_secret,
                &config.namespace,
            ));
            let refresher = CertificateRefresher::new(source, Arc::clone(&proxy), url.as_str());
            let shutdown = shutdown_signal(&shutdown_rx);
            let interval = config.cert_refresh_interval();
            Some(tokio::spawn(refresher.run(interval, shutdown)))
        }
        None => {
            warn!("DIRECTOR_URL is not set, Director proxy stays unconfigured");
            None
        }
    };

    server_state.is_ready.store(true, Ordering::Relaxed);

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown signal received");
    server_state.is_ready.store(false, Ordering::Relaxed);
    shutdown_tx.send_replace(true);

    if let Some(refresher) = refresher {
        refresher.await.context("Certificate refresher panicked")?;
    }
    proxy_server.await.context("Director proxy task panicked")?;
    server.await.context("HTTP server task panicked")?;

    info!("Agent stopped");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "runtime_agent=info".into());

    match format {
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

/// Resolves once shutdown has been requested
fn shutdown_signal(rx: &watch::Receiver<bool>) -> impl Future<Output = ()> + Send + 'static {
    let mut rx = rx.clone();
    async move {
        // A dropped sender also means shutdown
        let _ = rx.wait_for(|stopped| *stopped).await;
    }
}
