//! Per-connection request handling.
//!
//! Each accepted connection is owned end-to-end by one call to
//! [`handle_connection`]: read the two request lines, dispatch to the
//! identity provider, write the single response line, flush, close. Every
//! failure here is connection-local; nothing escapes to the accept loop.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::time::timeout;
use tracing::{debug, warn};

use super::protocol::{Command, ProtocolError, Request, Response, DEFAULT_MAX_LINE_LEN};
use crate::provider::IdentityProvider;

/// Connection-local failures. The listener logs these and moves on; none of
/// them are fatal to the process.
#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("connection deadline exceeded")]
    Timeout,
}

/// Per-connection limits.
#[derive(Debug, Clone, Copy)]
pub struct HandlerConfig {
    /// Deadline applied separately to the read phase and the write phase,
    /// so a silent client cannot pin a handler task forever.
    pub io_timeout: Duration,
    /// Per-line byte cap for request framing.
    pub max_line_len: usize,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            io_timeout: Duration::from_secs(30),
            max_line_len: DEFAULT_MAX_LINE_LEN,
        }
    }
}

/// Serve exactly one request on `stream`, then close it.
///
/// Generic over the stream so tests can drive it with `tokio::io::duplex`.
/// The provider handle is injected per spec: no ambient global state.
pub async fn handle_connection<S>(
    stream: S,
    provider: Arc<dyn IdentityProvider>,
    config: HandlerConfig,
) -> Result<(), HandlerError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (read_half, mut write_half) = tokio::io::split(stream);
    let mut reader = BufReader::new(read_half);

    let request = timeout(
        config.io_timeout,
        read_request(&mut reader, config.max_line_len),
    )
    .await
    .map_err(|_| HandlerError::Timeout)??;

    debug!(code = request.command.code(), "request received");

    let response = match dispatch(&request, provider.as_ref()).await {
        Some(response) => response,
        None => return Ok(()),
    };

    match timeout(config.io_timeout, write_response(&mut write_half, &response)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) if is_peer_gone(&e) => {
            // The client stopped listening before the response landed.
            // Expected under normal operation, not a server defect.
            debug!("peer closed before response was flushed");
            Ok(())
        }
        Ok(Err(e)) => Err(HandlerError::Io(e)),
        Err(_) => Err(HandlerError::Timeout),
    }
}

/// Map a request to its response. `None` means close without writing,
/// which is the stance for unrecognized command codes.
async fn dispatch(request: &Request, provider: &dyn IdentityProvider) -> Option<Response> {
    match request.command {
        Command::Auth => Some(match provider.verify_id_token(&request.payload).await {
            Ok(auth) => Response::Uid {
                subject: auth.subject,
                provider: auth.provider,
            },
            Err(e) => Response::Error(e.to_string()),
        }),
        Command::UserInfo => Some(match provider.get_user_profile(&request.payload).await {
            Ok(profile) => Response::User {
                provider_id: profile.primary_provider().to_string(),
                display_name: profile.display_name,
                email: profile.email,
                photo_url: profile.photo_url,
            },
            Err(e) => Response::Error(e.to_string()),
        }),
        Command::Logout => Some(Response::LogoutAck),
        Command::Unknown(code) => {
            warn!(code, "unknown command code, closing without response");
            None
        }
    }
}

/// Read the two request lines and parse them.
async fn read_request<R>(reader: &mut R, max_line_len: usize) -> Result<Request, HandlerError>
where
    R: AsyncBufRead + Unpin,
{
    let code_line = read_line_bounded(reader, max_line_len).await?;
    let payload = match read_line_bounded(reader, max_line_len).await {
        Ok(line) => line,
        Err(HandlerError::Protocol(ProtocolError::UnexpectedEof)) => {
            return Err(ProtocolError::MissingPayload.into())
        }
        Err(e) => return Err(e),
    };
    Ok(Request::from_lines(&code_line, payload)?)
}

/// Read one `\n`-terminated line of at most `max` bytes, stripping the line
/// ending. A final line terminated by EOF instead of `\n` is accepted, as
/// the deployed clients rely on it.
async fn read_line_bounded<R>(reader: &mut R, max: usize) -> Result<String, HandlerError>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let mut limited = reader.take(max as u64 + 1);
    let n = limited.read_until(b'\n', &mut buf).await?;

    if n == 0 {
        return Err(ProtocolError::UnexpectedEof.into());
    }
    if buf.last() != Some(&b'\n') && buf.len() > max {
        return Err(ProtocolError::LineTooLong { max }.into());
    }

    let mut line = String::from_utf8_lossy(&buf).into_owned();
    if line.ends_with('\n') {
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
    }
    Ok(line)
}

async fn write_response<W>(writer: &mut W, response: &Response) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(response.encode().as_bytes()).await?;
    writer.flush().await
}

/// True for error kinds that mean the peer went away mid-write.
fn is_peer_gone(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
    )
}
