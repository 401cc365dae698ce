//! firesock - local identity bridge.
//!
//! A daemon listening on a Unix domain socket so non-privileged local
//! processes can delegate identity-token verification and user-profile
//! lookup to a trusted external identity provider, without holding
//! provider credentials or embedding the provider's client library.
//!
//! Each client connection carries exactly one two-line request (command
//! code, payload) and receives at most one response line; the connection
//! is then closed. See `ipc::protocol` for the wire format.
//!
//! # Failure isolation
//!
//! Connections are independent units of failure: a broken client, a
//! malformed request, or a provider error never affects the listener or
//! other in-flight connections. The only fatal errors are listener-level
//! (stale-socket unlink, bind).

pub mod config;
pub mod ipc;
pub mod provider;
pub mod shutdown;
pub mod telemetry;

pub use config::{load, EnvConfig, DEFAULT_SOCKET_PATH};
pub use provider::{AuthResult, IdentityProvider, ProviderError, UserProfile};
