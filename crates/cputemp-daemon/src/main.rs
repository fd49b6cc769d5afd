//! CPU temperature daemon
//!
//! Serves the CPU temperature as JSON and Prometheus metrics over HTTP.

mod config;
mod poll;
mod web;

use anyhow::{Context, Result};
use cputemp_core::{FileSource, RequestRouter, SensorCache, StaticAssets};
use std::future::IntoFuture;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use config::{Config, ConfigOrigin};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/default.toml".to_string());
    let (config, origin) =
        Config::resolve(&config_path).context("Failed to load configuration")?;

    // Setup logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .context("Invalid log level")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();
    match origin {
        ConfigOrigin::File => info!("Loaded configuration from: {}", config_path),
        ConfigOrigin::Defaults => info!(
            "Configuration file {} not found, using defaults",
            config_path
        ),
    }

    // Build the sensor cache and router
    let source = Arc::new(FileSource::new(&config.sensor_path));
    let cache = SensorCache::new(source, config.cache_settings());
    let assets = StaticAssets::load(Path::new(&config.asset_dir), &config.assets);
    info!(count = assets.len(), dir = %config.asset_dir, "Static assets loaded");
    let router = RequestRouter::new(cache.clone(), Arc::new(assets), &config.url_base);

    // Start poll loop
    let poll_cache = cache.clone();
    let poll_interval = Duration::from_millis(config.scrape_interval);
    tokio::spawn(async move {
        poll::poll_loop(poll_cache, poll_interval).await;
    });

    // Setup Unix signal handlers
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())?;

    let app = web::create_router(router);
    let addr = config.listen_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(
        url = %config.public_url(),
        port = config.port,
        temp_path = %config.sensor_path,
        interval_ms = config.scrape_interval,
        "Temperature monitoring API started"
    );

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        let _ = shutdown_rx.wait_for(|stop| *stop).await;
    });
    let mut server = std::pin::pin!(server.into_future());

    // Run server with shutdown handling
    let signal = tokio::select! {
        result = &mut server => {
            result?;
            return Ok(());
        }
        _ = cache.terminated() => {
            error!(
                max_retries = config.max_retries,
                "Maximum retries reached, exiting process"
            );
            std::process::exit(1);
        }
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };

    info!(signal, "Received {}, shutting down gracefully", signal);
    let _ = shutdown_tx.send(true);

    let grace = Duration::from_millis(config.shutdown_grace);
    match tokio::time::timeout(grace, server).await {
        Ok(result) => {
            result?;
            info!(shutdown_reason = signal, "HTTP server closed");
            Ok(())
        }
        Err(_) => {
            error!(
                timeout_ms = config.shutdown_grace,
                "Forced shutdown after timeout"
            );
            std::process::exit(1);
        }
    }
}
