//! Network error taxonomy.
//!
//! One crate-wide error enum. Every failure is reported exactly once through
//! the completion callback of the operation that detected it; nothing in the
//! session API surfaces errors synchronously across the caller boundary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetError {
    /// DNS resolution produced no usable addresses.
    #[error("name resolution failed for {host}: {message}")]
    Resolution { host: String, message: String },

    /// Every candidate address was tried and none accepted a connection.
    #[error("connection to {host}:{port} failed: {message}")]
    Connection {
        host: String,
        port: u16,
        message: String,
    },

    /// TLS negotiation or the WebSocket upgrade failed. Never retried.
    #[error("handshake with {host} failed: {message}")]
    Handshake { host: String, message: String },

    /// Send attempted while the session is not open.
    #[error("session is not open")]
    NotConnected,

    /// Connect called on a client that already started a session.
    #[error("client already has a session")]
    AlreadyConnected,

    /// The transport rejected an outbound frame. The session is terminated.
    #[error("write failed: {message}")]
    Write { message: String },

    /// The transport failed while a receive was armed. The session is
    /// terminated.
    #[error("read failed: {message}")]
    Read { message: String },

    /// The peer closed the session.
    #[error("session closed by peer")]
    ConnectionClosed,

    /// The peer never acknowledged our close frame. The session is still
    /// torn down; this is a soft failure.
    #[error("timed out waiting for close acknowledgement")]
    CloseTimeout,

    /// A pending operation was abandoned because the client was closed.
    #[error("operation cancelled by close")]
    Cancelled,

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// The download endpoint answered with a non-success status.
    #[error("unexpected HTTP status {0}")]
    HttpStatus(u16),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl NetError {
    pub fn resolution(host: impl Into<String>, message: impl ToString) -> Self {
        NetError::Resolution {
            host: host.into(),
            message: message.to_string(),
        }
    }

    pub fn connection(host: impl Into<String>, port: u16, message: impl ToString) -> Self {
        NetError::Connection {
            host: host.into(),
            port,
            message: message.to_string(),
        }
    }

    pub fn handshake(host: impl Into<String>, message: impl ToString) -> Self {
        NetError::Handshake {
            host: host.into(),
            message: message.to_string(),
        }
    }

    pub fn write(message: impl ToString) -> Self {
        NetError::Write {
            message: message.to_string(),
        }
    }

    pub fn read(message: impl ToString) -> Self {
        NetError::Read {
            message: message.to_string(),
        }
    }
}
