//! Shared error type across tallyline crates.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

use crate::protocol::line::LineError;

/// Stable error codes (used in logs and asserted by tests).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Listener could not acquire its address.
    BindFailure,
    /// Transient failure while accepting a connection.
    AcceptFailure,
    /// Line had the wrong shape or a non-numeric field.
    ParseFailure,
    /// Read/write error on an accepted connection.
    ConnectionIo,
    /// Invalid metric identity or conflicting registration.
    RegistrationFailure,
    /// Config failed strict parsing or validation.
    BadConfig,
    /// Unsupported config version.
    UnsupportedVersion,
    /// Internal error.
    Internal,
}

impl ErrorKind {
    /// String representation used in structured logs.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::BindFailure => "BIND_FAILURE",
            ErrorKind::AcceptFailure => "ACCEPT_FAILURE",
            ErrorKind::ParseFailure => "PARSE_FAILURE",
            ErrorKind::ConnectionIo => "CONNECTION_IO",
            ErrorKind::RegistrationFailure => "REGISTRATION_FAILURE",
            ErrorKind::BadConfig => "BAD_CONFIG",
            ErrorKind::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ErrorKind::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, TallyError>;

/// Unified error type used by core and gateway.
#[derive(Debug, Error)]
pub enum TallyError {
    #[error("bind failed on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("accept failed: {0}")]
    Accept(#[source] io::Error),
    #[error("parse failed: {0}")]
    Parse(#[from] LineError),
    #[error("connection io: {0}")]
    ConnectionIo(#[source] io::Error),
    #[error("invalid metric identity: {0}")]
    InvalidIdentity(String),
    #[error("metric registered with a different kind: {0}")]
    KindMismatch(String),
    #[error("metric name collides with another family: {0}")]
    NameCollision(String),
    #[error("bad config: {0}")]
    BadConfig(String),
    #[error("unsupported config version")]
    UnsupportedVersion,
    #[error("internal: {0}")]
    Internal(String),
}

impl TallyError {
    /// Map an error to its stable code.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TallyError::Bind { .. } => ErrorKind::BindFailure,
            TallyError::Accept(_) => ErrorKind::AcceptFailure,
            TallyError::Parse(_) => ErrorKind::ParseFailure,
            TallyError::ConnectionIo(_) => ErrorKind::ConnectionIo,
            TallyError::InvalidIdentity(_)
            | TallyError::KindMismatch(_)
            | TallyError::NameCollision(_) => ErrorKind::RegistrationFailure,
            TallyError::BadConfig(_) => ErrorKind::BadConfig,
            TallyError::UnsupportedVersion => ErrorKind::UnsupportedVersion,
            TallyError::Internal(_) => ErrorKind::Internal,
        }
    }
}
