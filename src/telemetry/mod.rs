//! Telemetry for the identity bridge daemon.

pub mod logging;

pub use logging::{init_logging, LogConfig, LogError, LogFormat};
