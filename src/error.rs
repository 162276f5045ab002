//! Error taxonomy for sync cycles.
//!
//! Every failure a transport can report falls into one of three classes:
//!
//! | Class | Meaning |
//! |-------|---------|
//! | [`TransportError`] | connect/send/receive failed at the network boundary |
//! | [`ProtocolError`] | a response arrived but cannot be accepted |
//! | [`CapacityError`] | data did not fit a fixed-size buffer |
//!
//! The orchestrator treats all of them the same way: the cycle is a no-op
//! and the same delta is retried later. Nothing is partially applied.

use core::fmt;

/// A bounded buffer ran out of room.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CapacityError;

impl fmt::Display for CapacityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "buffer capacity exceeded")
    }
}

/// Failures at the network boundary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportError {
    /// Could not open a connection to the server.
    Connect,
    /// Writing the request failed.
    Send,
    /// Reading the response failed.
    Receive,
    /// The server closed without sending anything.
    NoResponse,
    /// An operation did not finish in time.
    Timeout,
    /// The link is still being established; try again next cycle.
    Connecting,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Connect => write!(f, "connection failed"),
            TransportError::Send => write!(f, "send failed"),
            TransportError::Receive => write!(f, "receive failed"),
            TransportError::NoResponse => write!(f, "no response received"),
            TransportError::Timeout => write!(f, "timed out"),
            TransportError::Connecting => write!(f, "connection in progress"),
        }
    }
}

/// A response that must be discarded as a whole.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProtocolError {
    /// Body is not valid JSON or has unexpected field types.
    Malformed,
    /// The `status` field is missing.
    MissingStatus,
    /// The `status` field is present but not `"ok"`.
    Rejected,
    /// HTTP status line outside the 2xx range.
    HttpStatus(u16),
    /// Response ended before the advertised length or header terminator.
    Truncated,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::Malformed => write!(f, "malformed response"),
            ProtocolError::MissingStatus => write!(f, "response has no status"),
            ProtocolError::Rejected => write!(f, "server did not acknowledge"),
            ProtocolError::HttpStatus(code) => write!(f, "unexpected HTTP status {}", code),
            ProtocolError::Truncated => write!(f, "truncated response"),
        }
    }
}

/// Why a sync cycle failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncError {
    /// Network-level failure.
    Transport(TransportError),
    /// Unacceptable response.
    Protocol(ProtocolError),
    /// Outgoing payload did not fit its buffer.
    Capacity(CapacityError),
}

impl SyncError {
    /// Whether the failure happened before any response could be read.
    pub fn is_transport(&self) -> bool {
        matches!(self, SyncError::Transport(_))
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::Transport(e) => write!(f, "transport error: {}", e),
            SyncError::Protocol(e) => write!(f, "protocol error: {}", e),
            SyncError::Capacity(e) => write!(f, "capacity error: {}", e),
        }
    }
}

impl From<TransportError> for SyncError {
    fn from(e: TransportError) -> Self {
        SyncError::Transport(e)
    }
}

impl From<ProtocolError> for SyncError {
    fn from(e: ProtocolError) -> Self {
        SyncError::Protocol(e)
    }
}

impl From<CapacityError> for SyncError {
    fn from(e: CapacityError) -> Self {
        SyncError::Capacity(e)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for SyncError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let e: SyncError = TransportError::Timeout.into();
        assert_eq!(format!("{}", e), "transport error: timed out");

        let e: SyncError = ProtocolError::HttpStatus(503).into();
        assert_eq!(format!("{}", e), "protocol error: unexpected HTTP status 503");

        let e: SyncError = CapacityError.into();
        assert_eq!(format!("{}", e), "capacity error: buffer capacity exceeded");
    }

    #[test]
    fn transport_classification() {
        assert!(SyncError::from(TransportError::Connect).is_transport());
        assert!(!SyncError::from(ProtocolError::Rejected).is_transport());
    }
}
