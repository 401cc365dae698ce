//! Wire format for the identity bridge protocol.
//!
//! One request per connection: two newline-terminated lines (command code,
//! then payload), answered by at most one newline-terminated response line.
//! Response fields are joined with the ASCII record separator (0x1E) so
//! user-supplied text containing commas or pipes cannot break field splits.

use thiserror::Error;

/// ASCII record separator, the in-line field delimiter.
pub const RECORD_SEP: char = '\x1e';

/// Maximum request line length accepted by default (bytes, excluding `\n`).
pub const DEFAULT_MAX_LINE_LEN: usize = 8 * 1024;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("connection closed before a command line was read")]
    UnexpectedEof,

    #[error("connection closed before the payload line was read")]
    MissingPayload,

    #[error("request line exceeds {max} bytes")]
    LineTooLong { max: usize },

    #[error("invalid command code: {0:?}")]
    InvalidCommandCode(String),
}

/// Closed set of wire commands. Unrecognized codes are preserved in
/// `Unknown` so dispatch stays exhaustive without being fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Code 1: verify an identity token.
    Auth,
    /// Code 2: fetch a user profile by subject.
    UserInfo,
    /// Code 3: log out (no server-side session exists; acknowledged only).
    Logout,
    /// Any other code.
    Unknown(i64),
}

impl Command {
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Command::Auth,
            2 => Command::UserInfo,
            3 => Command::Logout,
            other => Command::Unknown(other),
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            Command::Auth => 1,
            Command::UserInfo => 2,
            Command::Logout => 3,
            Command::Unknown(code) => *code,
        }
    }
}

/// A parsed client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub command: Command,
    pub payload: String,
}

impl Request {
    /// Build a request from the two raw request lines (line endings already
    /// stripped). A non-numeric command line is a protocol violation.
    pub fn from_lines(code_line: &str, payload: String) -> Result<Self, ProtocolError> {
        let code: i64 = code_line
            .parse()
            .map_err(|_| ProtocolError::InvalidCommandCode(code_line.to_string()))?;
        Ok(Self {
            command: Command::from_code(code),
            payload,
        })
    }
}

/// A single-line response. Constructed once, written once, never retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Successful token verification: `uid:<subject>\x1E<provider>`.
    Uid { subject: String, provider: String },
    /// Successful profile lookup:
    /// `user:<displayName>\x1E<email>\x1E<photoURL>\x1E<providerId>`.
    User {
        display_name: String,
        email: String,
        photo_url: String,
        provider_id: String,
    },
    /// Explicit logout acknowledgement: `ok:logout`.
    LogoutAck,
    /// Any failure: `err:<description>`.
    Error(String),
}

impl Response {
    /// Encode as exactly one newline-terminated line.
    pub fn encode(&self) -> String {
        match self {
            Response::Uid { subject, provider } => {
                format!("uid:{}{}{}\n", clean(subject), RECORD_SEP, clean(provider))
            }
            Response::User {
                display_name,
                email,
                photo_url,
                provider_id,
            } => format!(
                "user:{}{sep}{}{sep}{}{sep}{}\n",
                clean(display_name),
                clean(email),
                clean(photo_url),
                clean(provider_id),
                sep = RECORD_SEP,
            ),
            Response::LogoutAck => "ok:logout\n".to_string(),
            Response::Error(description) => format!("err:{}\n", clean(description)),
        }
    }
}

/// Strip bytes that would break the one-line, RS-delimited framing.
fn clean(field: &str) -> String {
    field.replace(['\n', '\r', RECORD_SEP], " ")
}
