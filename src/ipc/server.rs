//! Unix-socket listener and accept loop.
//!
//! The listener owns the socket lifecycle: unlink any stale socket file,
//! bind, then accept until shutdown. Each accepted connection runs as an
//! independent task; the loop never awaits a handler, so one misbehaving
//! client cannot stall acceptance.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::UnixListener;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::connections::ConnectionPool;
use super::handler::{handle_connection, HandlerConfig};
use crate::provider::IdentityProvider;
use crate::shutdown::ShutdownCoordinator;

/// Backoff after a transient accept failure (momentary fd exhaustion etc).
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Listener-level failures. This is the only fatal error class: without its
/// socket the daemon cannot provide service, and both causes indicate a
/// misconfiguration needing operator intervention.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("failed to remove stale socket {path}: {source}")]
    StaleSocket { path: String, source: io::Error },

    #[error("failed to bind unix socket {path}: {source}")]
    Bind { path: String, source: io::Error },
}

/// Bind `socket_path` and serve until the shutdown signal flips.
///
/// Returns only on shutdown (`Ok`) or on a listener-level error. Handler
/// failures never propagate here; they die with their task, logged.
pub async fn run_server(
    socket_path: String,
    provider: Arc<dyn IdentityProvider>,
    connections: Arc<ConnectionPool>,
    shutdown_coord: Arc<ShutdownCoordinator>,
    mut shutdown: watch::Receiver<bool>,
    config: HandlerConfig,
) -> Result<(), ServerError> {
    match std::fs::remove_file(&socket_path) {
        Ok(()) => debug!(path = %socket_path, "removed stale socket file"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(ServerError::StaleSocket {
                path: socket_path,
                source: e,
            })
        }
    }

    let listener = UnixListener::bind(&socket_path).map_err(|e| ServerError::Bind {
        path: socket_path.clone(),
        source: e,
    })?;
    info!(path = %socket_path, max_connections = connections.max_connections(), "listening");

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, _addr)) => {
                        spawn_handler(stream, &provider, &connections, &shutdown_coord, config);
                    }
                    Err(e) => {
                        warn!(error = %e, "accept failed, retrying");
                        tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                    }
                }
            }
        }
    }

    // Best effort: the next instance unlinks it again anyway.
    if let Err(e) = std::fs::remove_file(&socket_path) {
        debug!(error = %e, "could not remove socket file on shutdown");
    }
    info!("listener stopped");
    Ok(())
}

fn spawn_handler(
    stream: tokio::net::UnixStream,
    provider: &Arc<dyn IdentityProvider>,
    connections: &Arc<ConnectionPool>,
    shutdown_coord: &Arc<ShutdownCoordinator>,
    config: HandlerConfig,
) {
    let Some(slot) = connections.try_acquire_owned() else {
        // Dropping the stream closes it; the client sees EOF.
        warn!(
            active = connections.active_count(),
            "connection limit reached, shedding connection"
        );
        return;
    };

    let Some(drain_guard) = shutdown_coord.track() else {
        debug!("draining, refusing new connection");
        return;
    };

    let provider = Arc::clone(provider);
    tokio::spawn(async move {
        let _slot = slot;
        let _drain = drain_guard;
        debug!("client connected");
        if let Err(e) = handle_connection(stream, provider, config).await {
            warn!(error = %e, "connection failed");
        }
        debug!("client closed");
    });
}
