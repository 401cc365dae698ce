//! Daemon configuration loading from environment variables.
//!
//! All values come from the environment with safe defaults. Invalid values
//! fall back to defaults without crashing.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `SOCK` | `/tmp/firebase.sock` | Listen socket path |
//! | `FIRESOCK_MAX_CONNECTIONS` | 64 | Max concurrent connections |
//! | `FIRESOCK_IO_TIMEOUT` | 30 | Per-connection read/write deadline (secs) |
//! | `FIRESOCK_MAX_LINE` | 8192 | Max request line length (bytes) |
//! | `FIRESOCK_SHUTDOWN_TIMEOUT` | 30 | Drain timeout on shutdown (secs) |
//!
//! `SOCK` keeps its historical name; every deployed client reads the same
//! variable to find the socket.

use std::time::Duration;

use crate::ipc::{ConnectionConfig, HandlerConfig, DEFAULT_MAX_LINE_LEN};

/// Default listen socket path when `SOCK` is unset.
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/firebase.sock";

/// All daemon configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub socket_path: String,
    pub connections: ConnectionConfig,
    pub io_timeout: Duration,
    pub max_line_len: usize,
    pub shutdown_timeout: Duration,
}

impl EnvConfig {
    /// Per-connection limits derived from this configuration.
    pub fn handler_config(&self) -> HandlerConfig {
        HandlerConfig {
            io_timeout: self.io_timeout,
            max_line_len: self.max_line_len,
        }
    }
}

/// Parse a `usize` env var, returning `default` on missing or invalid.
fn parse_usize(key: &str, default: usize) -> usize {
    match std::env::var(key) {
        Ok(val) => val.parse::<usize>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse a `u64` env var, returning `default` on missing or invalid.
fn parse_u64(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(val) => val.parse::<u64>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Load all configuration from environment variables.
///
/// Missing or invalid values fall back to safe defaults without panicking.
pub fn load() -> EnvConfig {
    let socket_path =
        std::env::var("SOCK").unwrap_or_else(|_| DEFAULT_SOCKET_PATH.to_string());

    let max_connections = parse_usize("FIRESOCK_MAX_CONNECTIONS", 64).max(1);
    let io_secs = parse_u64("FIRESOCK_IO_TIMEOUT", 30).max(1);
    let max_line_len = parse_usize("FIRESOCK_MAX_LINE", DEFAULT_MAX_LINE_LEN).max(64);
    let shutdown_secs = parse_u64("FIRESOCK_SHUTDOWN_TIMEOUT", 30).max(1);

    EnvConfig {
        socket_path,
        connections: ConnectionConfig { max_connections },
        io_timeout: Duration::from_secs(io_secs),
        max_line_len,
        shutdown_timeout: Duration::from_secs(shutdown_secs),
    }
}
