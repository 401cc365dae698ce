//! IPC module for the identity bridge.
//!
//! Unix-socket communication only; one short-lived connection per request.

mod connections;
mod handler;
mod protocol;
mod server;

pub use connections::{ConnectionConfig, ConnectionGuard, ConnectionPool, OwnedConnectionGuard};
pub use handler::{handle_connection, HandlerConfig, HandlerError};
pub use protocol::{
    Command, ProtocolError, Request, Response, DEFAULT_MAX_LINE_LEN, RECORD_SEP,
};
pub use server::{run_server, ServerError};
