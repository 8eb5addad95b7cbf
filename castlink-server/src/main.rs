//! Castlink server - Main entry point
//!
//! Wires the pipeline together: relay log tail -> parser -> dispatcher ->
//! store + fan-out broadcaster, the TTS worker, and the axum HTTP/SSE
//! surface the overlay widgets and operator panel talk to.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use castlink_common::config::Config;
use castlink_common::model::WidgetId;
use castlink_server::api;
use castlink_server::dispatch::Dispatcher;
use castlink_server::fanout::{InitialSnapshots, WidgetBroadcaster};
use castlink_server::ingest::{self, LogTailSource, RelaySource};
use castlink_server::store::Store;
use castlink_server::synth::{EngineSelector, SynthOptions};
use castlink_server::tts::{CommandSink, TtsQueue, TtsWorker};
use castlink_server::webhook::WebhookNotifier;

/// Command-line arguments for castlink-server
#[derive(Parser, Debug)]
#[command(name = "castlink-server")]
#[command(about = "Livestream overlay widget backend")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "CASTLINK_PORT")]
    port: Option<u16>,

    /// Path to the configuration file
    #[arg(short, long, env = "CASTLINK_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "castlink=debug,castlink_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    let port = args.port.unwrap_or(config.server.port);

    info!("Starting castlink server on port {port}");

    // Shared state
    let store = Arc::new(Store::new(&config.widgets).context("Invalid widget configuration")?);
    let queue = Arc::new(TtsQueue::new(
        config.tts.fairness,
        config.tts.queue_cap,
        config.tts.autoplay,
    ));
    let selector = Arc::new(EngineSelector::from_config(
        &config.tts,
        &config.local_engine,
        &config.cloud_engine,
    ));

    let broadcaster = Arc::new(WidgetBroadcaster::new(
        100,
        InitialSnapshots {
            monetization: store
                .counter_snapshot(WidgetId::Monetization)
                .await
                .context("Failed to snapshot monetization state")?,
            guard_progress: store
                .counter_snapshot(WidgetId::GuardProgress)
                .await
                .context("Failed to snapshot guard progress state")?,
            voting: store.voting_snapshot().await,
            tts: queue.snapshot().await,
        },
    ));

    let webhooks = Arc::new(WebhookNotifier::new(&config.webhooks));
    let dispatcher = Arc::new(Dispatcher::new(
        store.clone(),
        broadcaster.clone(),
        queue.clone(),
        webhooks,
        &config.tts,
        &config.sounds,
    ));

    // Ingestion: relay log tail -> parser -> dispatcher
    let (line_tx, line_rx) = mpsc::channel::<String>(1024);
    let (event_tx, event_rx) = mpsc::channel(1024);

    match (config.relay.room_id, &config.relay.log_dir) {
        (Some(room_id), Some(log_dir)) => {
            let mut source = LogTailSource::new(
                room_id,
                log_dir.clone(),
                Duration::from_millis(config.relay.poll_interval_ms),
            );
            tokio::spawn(async move {
                if let Err(e) = source.run(line_tx).await {
                    warn!("relay source exited with error: {e}");
                }
            });
        }
        _ => {
            warn!("relay room_id/log_dir not configured, ingestion disabled");
            drop(line_tx);
        }
    }
    tokio::spawn(ingest::run_parser(line_rx, event_tx));
    tokio::spawn(dispatcher.clone().run(event_rx));

    // TTS consumer
    let sink = Arc::new(
        CommandSink::new(&config.tts.player_command).context("Invalid player command")?,
    );
    let worker = TtsWorker {
        queue: queue.clone(),
        selector: selector.clone(),
        sink,
        broadcaster: broadcaster.clone(),
        options: SynthOptions::from_config(&config.tts),
        synth_timeout: Duration::from_secs(config.tts.synth_timeout_secs),
        gap: Duration::from_millis(config.tts.gap_ms),
    };
    tokio::spawn(worker.run());

    // HTTP surface
    let app = api::create_router(api::AppState {
        dispatcher,
        broadcaster,
        queue,
    });

    let addr = listen_addr(&config.server.bind, port)?;
    info!("Starting HTTP server on {addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolve the listen address from the configured bind host and port
fn listen_addr(bind: &str, port: u16) -> Result<SocketAddr> {
    let ip: std::net::IpAddr = bind
        .parse()
        .with_context(|| format!("Invalid server.bind address {bind:?}"))?;
    Ok(SocketAddr::new(ip, port))
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listen_addr_honors_configured_bind() {
        let config = Config::default();
        let addr = listen_addr(&config.server.bind, config.server.port).unwrap();
        assert_eq!(addr, "127.0.0.1:5600".parse::<SocketAddr>().unwrap());

        let addr = listen_addr("0.0.0.0", 8080).unwrap();
        assert_eq!(addr, "0.0.0.0:8080".parse::<SocketAddr>().unwrap());

        let addr = listen_addr("::1", 5600).unwrap();
        assert!(addr.is_ipv6());
    }

    #[test]
    fn test_listen_addr_rejects_garbage() {
        assert!(listen_addr("not-an-ip", 5600).is_err());
    }
}
