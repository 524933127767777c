//! Session state machine.

use std::fmt;
use std::sync::{Mutex, PoisonError};

/// Lifecycle of a client's single session.
///
/// Send and receive are valid only in `Open`. `Closed` and `Failed` are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No session has been started.
    Idle,
    /// Resolving the endpoint host.
    Resolving,
    /// Trying candidate addresses.
    Connecting,
    /// Negotiating TLS and/or the WebSocket upgrade.
    Handshaking,
    /// Session established; send and receive are valid.
    Open,
    /// Close frame sent, waiting for acknowledgement.
    Closing,
    /// Session torn down cleanly.
    Closed,
    /// Session terminated by an error.
    Failed,
}

impl ConnectionState {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Resolving => "resolving",
            Self::Connecting => "connecting",
            Self::Handshaking => "handshaking",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Closed => "closed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Shared view of the session state.
///
/// The driver task is the only writer; client handles read it for fast-path
/// rejection and observability.
#[derive(Debug)]
pub(crate) struct StateCell(Mutex<ConnectionState>);

impl StateCell {
    pub fn new() -> Self {
        Self(Mutex::new(ConnectionState::Idle))
    }

    pub fn get(&self) -> ConnectionState {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set(&self, next: ConnectionState) {
        let mut current = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        tracing::trace!(from = %*current, to = %next, "session state transition");
        *current = next;
    }
}
