use thiserror::Error;

use crate::protocol::StatusCode;

/// Classifies handshake and dialer errors for programmatic matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller input was rejected before any I/O (bad address, bad user-id)
    InvalidInput,
    /// The underlying transport failed (reset, timeout, closed, refused)
    Io,
    /// The peer did not speak SOCKS4, or request bytes were malformed
    Protocol,
    /// The proxy answered with a valid reply that was not "granted"
    Rejected,
    /// Dialer configuration is invalid
    Config,
}

/// SOCKS4 error types
#[derive(Error, Debug)]
pub enum Socks4Error {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid user id: {0}")]
    InvalidUserId(String),

    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("Not a SOCKS4 proxy: reply started with 0x{first_byte:02x}")]
    NotASocksProxy { first_byte: u8 },

    #[error("SOCKS4 connection rejected with code 0x{code:02x} ({})", describe_status(.code))]
    ConnectionRejected { code: u8 },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl Socks4Error {
    /// Get the error classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidAddress(_) | Self::InvalidUserId(_) => ErrorKind::InvalidInput,
            Self::Transport(_) => ErrorKind::Io,
            Self::NotASocksProxy { .. } | Self::Protocol(_) => ErrorKind::Protocol,
            Self::ConnectionRejected { .. } => ErrorKind::Rejected,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    /// Status reported by the proxy, if the error carries one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::ConnectionRejected { code } => Some(StatusCode::from(*code)),
            _ => None,
        }
    }

    /// Whether a fresh attempt on a new connection could succeed without
    /// reconfiguration. Only transport failures qualify.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Io
    }
}

pub type Result<T> = std::result::Result<T, Socks4Error>;

fn describe_status(code: &u8) -> &'static str {
    StatusCode::from(*code).description()
}
