//! Network abstraction traits for the dashboard link.
//!
//! # Traits
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`SyncTransport`] | One sync exchange with the dashboard |
//! | [`MqttClient`] | Pub/sub client used by the MQTT transport |
//! | [`Connector`] | Opens byte streams for the HTTP transport (`std`) |
//!
//! Transports are picked at construction time. The orchestrator is generic
//! over [`SyncTransport`] and never switches implementation at runtime.

extern crate alloc;
use alloc::string::String;
use alloc::vec::Vec;

use crate::config::{short_string, ShortString};
use crate::error::SyncError;
use crate::messages::{DeviceSyncState, ServerCommand};

/// Address of the dashboard server (or MQTT broker).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    /// Host name or IP address.
    pub host: ShortString,
    /// TCP port.
    pub port: u16,
}

impl Endpoint {
    /// Create an endpoint, truncating over-long host names.
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            host: short_string(host),
            port,
        }
    }
}

// ============================================================================
// Sync Transport
// ============================================================================

/// Successful outcome of a sync exchange.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncReply {
    /// The server answered with an accepted directive.
    Command(ServerCommand),
    /// The payload went out but no directive has arrived yet.
    ///
    /// Only publish/subscribe transports produce this. It counts as a
    /// successful send.
    NoDirective,
}

impl SyncReply {
    /// The directive, if one arrived.
    pub fn command(&self) -> Option<&ServerCommand> {
        match self {
            SyncReply::Command(cmd) => Some(cmd),
            SyncReply::NoDirective => None,
        }
    }
}

/// A single logical exchange with the dashboard.
///
/// Implementations perform at most one attempt per call and never retry
/// internally. The orchestrator decides when to call again.
pub trait SyncTransport {
    /// Send `state` to `endpoint` and collect the server's answer.
    fn sync(
        &mut self,
        endpoint: &Endpoint,
        state: &DeviceSyncState<'_>,
    ) -> Result<SyncReply, SyncError>;
}

impl<T: SyncTransport + ?Sized> SyncTransport for &mut T {
    fn sync(
        &mut self,
        endpoint: &Endpoint,
        state: &DeviceSyncState<'_>,
    ) -> Result<SyncReply, SyncError> {
        (**self).sync(endpoint, state)
    }
}

// ============================================================================
// MQTT Client Trait (Sync-First Design)
// ============================================================================

/// MQTT client used by the publish/subscribe transport.
///
/// Sync-first: works on the ESP32 (blocking I/O) and on desktop, where the
/// client runs its event loop on a background thread.
///
/// # Implementation Notes
///
/// - `connect` starts a connection attempt and returns without waiting for
///   the broker's acknowledgement; `is_connected` turns true once it arrives
/// - `publish` and `subscribe` only queue the request
/// - `try_recv` is non-blocking
pub trait MqttClient {
    /// Error type for MQTT operations.
    type Error: core::fmt::Debug;

    /// Begin connecting to the broker.
    fn connect(&mut self, host: &str, port: u16) -> Result<(), Self::Error>;

    /// Drop the connection (or abandon an attempt in progress).
    fn disconnect(&mut self);

    /// Publish a message to a topic.
    ///
    /// # Arguments
    /// - `topic`: MQTT topic path
    /// - `payload`: Message bytes
    /// - `retain`: If true, broker keeps message for new subscribers
    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), Self::Error>;

    /// Subscribe to a topic.
    fn subscribe(&mut self, topic: &str) -> Result<(), Self::Error>;

    /// Try to receive the next message (non-blocking).
    ///
    /// Returns `None` if no message is available. This should never block.
    fn try_recv(&mut self) -> Option<MqttMessage>;

    /// Check if connected to broker.
    fn is_connected(&self) -> bool;
}

/// An MQTT message received from a subscription.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MqttMessage {
    /// Topic the message was published to.
    pub topic: String,
    /// Message payload as raw bytes.
    pub payload: Vec<u8>,
}

impl MqttMessage {
    /// Create a new MQTT message.
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    /// Returns the payload as a UTF-8 string, if valid.
    pub fn payload_str(&self) -> Option<&str> {
        core::str::from_utf8(&self.payload).ok()
    }
}

// ============================================================================
// Stream Connector
// ============================================================================

/// Opens a fresh byte stream per request.
///
/// The HTTP transport drops the stream at the end of every exchange, which
/// closes the connection.
#[cfg(feature = "std")]
pub trait Connector {
    /// Stream type produced by this connector.
    type Stream: std::io::Read + std::io::Write;

    /// Connect to `host:port`, giving up after `timeout_ms`. The returned
    /// stream should apply the same timeout to reads and writes.
    fn connect(
        &mut self,
        host: &str,
        port: u16,
        timeout_ms: u32,
    ) -> Result<Self::Stream, crate::error::TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_truncates_host() {
        let long = "h".repeat(100);
        let endpoint = Endpoint::new(&long, 8080);
        assert_eq!(endpoint.host.len(), 64);
        assert_eq!(endpoint.port, 8080);
    }

    #[test]
    fn reply_command_accessor() {
        let reply = SyncReply::Command(ServerCommand::ok().with_blink(true));
        assert!(reply.command().unwrap().should_blink);
        assert!(SyncReply::NoDirective.command().is_none());
    }

    #[test]
    fn message_payload_str() {
        let msg = MqttMessage::new("pinecone/control", br#"{"status":"ok"}"#.to_vec());
        assert_eq!(msg.payload_str(), Some(r#"{"status":"ok"}"#));

        let msg = MqttMessage::new("t", vec![0xff, 0xfe]);
        assert_eq!(msg.payload_str(), None);
    }
}
