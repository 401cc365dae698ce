//! firesockd entry point.
//!
//! Bootstraps the identity bridge daemon: logging, environment
//! configuration, the connection admission gate, and the Unix-socket
//! listener, with signal handling for graceful shutdown.

use std::process::ExitCode;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info};

use firesock::config;
use firesock::ipc::{run_server, ConnectionPool};
use firesock::provider::{IdentityProvider, UnconfiguredProvider};
use firesock::shutdown::{ShutdownCoordinator, ShutdownResult};
use firesock::telemetry::{init_logging, LogConfig, LogFormat};

#[tokio::main]
async fn main() -> ExitCode {
    let log_config = LogConfig {
        format: log_format_from_env(),
        level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
    };
    if let Err(e) = init_logging(&log_config) {
        eprintln!("logging init failed: {e}");
        return ExitCode::FAILURE;
    }

    let cfg = config::load();
    info!(
        socket = %cfg.socket_path,
        max_connections = cfg.connections.max_connections,
        "starting identity bridge"
    );

    // The provider backend plugs in here; without one, every request is
    // answered with a descriptive err: line.
    let provider: Arc<dyn IdentityProvider> = Arc::new(UnconfiguredProvider);

    let connections = Arc::new(ConnectionPool::new(cfg.connections.clone()));
    let shutdown_coord = Arc::new(ShutdownCoordinator::new());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut server_handle = tokio::spawn(run_server(
        cfg.socket_path.clone(),
        provider,
        connections,
        Arc::clone(&shutdown_coord),
        shutdown_rx,
        cfg.handler_config(),
    ));

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                error!(error = %e, "failed to listen for shutdown signal");
                return ExitCode::FAILURE;
            }
            info!("shutdown signal received, draining");
            let _ = shutdown_tx.send(true);

            match shutdown_coord.initiate(cfg.shutdown_timeout).await {
                ShutdownResult::Complete => info!("drain complete"),
                ShutdownResult::Timeout { remaining } => {
                    info!(remaining, "drain timed out, abandoning connections");
                }
            }

            match server_handle.await {
                Ok(Ok(())) => ExitCode::SUCCESS,
                Ok(Err(e)) => {
                    error!(error = %e, "server error during shutdown");
                    ExitCode::FAILURE
                }
                Err(e) => {
                    error!(error = %e, "server task panicked");
                    ExitCode::FAILURE
                }
            }
        }
        result = &mut server_handle => {
            // The listener only returns early on a fatal error.
            match result {
                Ok(Ok(())) => ExitCode::SUCCESS,
                Ok(Err(e)) => {
                    error!(error = %e, "fatal listener error");
                    ExitCode::FAILURE
                }
                Err(e) => {
                    error!(error = %e, "server task panicked");
                    ExitCode::FAILURE
                }
            }
        }
    }
}

fn log_format_from_env() -> LogFormat {
    match std::env::var("FIRESOCK_LOG_FORMAT").as_deref() {
        Ok("pretty") => LogFormat::Pretty,
        _ => LogFormat::Json,
    }
}
