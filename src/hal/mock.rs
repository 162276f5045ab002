//! Mock implementations for testing without hardware.
//!
//! This module provides test doubles for the hardware and network traits,
//! enabling development and testing on desktop without a device or server.
//!
//! # Available Mocks
//!
//! | Mock | Trait | Purpose |
//! |------|-------|---------|
//! | [`MockClock`] | [`Clock`] | Controllable time source |
//! | [`MockLink`] | [`LinkMonitor`] | Switchable link state |
//! | [`MockOutputPin`] | `OutputPin` | Records the driven level |
//! | [`MockInputPin`] | `InputPin` | Settable input level |
//! | [`MockJoystick`] | [`JoystickInput`] | Settable axis positions |
//! | [`MockMqtt`] | [`MqttClient`] | Captures pub/sub operations |
//! | [`ScriptedTransport`] | [`SyncTransport`] | Replays queued outcomes, records payloads |
//! | [`MockConnector`] | `Connector` | Canned HTTP responses (`std`) |
//!
//! # Example
//!
//! ```rust
//! use pin_mirror::hal::{MockLink, ScriptedTransport};
//! use pin_mirror::pins::{PinMode, PinRegistry};
//! use pin_mirror::sync::SyncOrchestrator;
//! use pin_mirror::traits::Endpoint;
//!
//! let mut pins = PinRegistry::new();
//! pins.register_pin(4, "Button", PinMode::Input);
//!
//! let mut sync = SyncOrchestrator::new(
//!     ScriptedTransport::always_ok(),
//!     Endpoint::new("10.0.0.2", 80),
//!     "mac-aabbccddeeff",
//!     25,
//! );
//! sync.update(25, &pins, &MockLink::up());
//!
//! // Verify what went over the wire
//! let sent = &sync.transport().sent[0];
//! assert_eq!(sent.node_id, "mac-aabbccddeeff");
//! assert!(!sent.send_pins);
//! ```
//!
//! [`Clock`]: crate::traits::Clock
//! [`LinkMonitor`]: crate::traits::LinkMonitor
//! [`JoystickInput`]: crate::traits::JoystickInput
//! [`MqttClient`]: crate::traits::MqttClient
//! [`SyncTransport`]: crate::traits::SyncTransport

extern crate alloc;
use alloc::collections::VecDeque;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use core::cell::Cell;
use core::convert::Infallible;

use embedded_hal::digital::{ErrorType, InputPin, OutputPin};

use crate::error::SyncError;
use crate::messages::{DeviceSyncState, ServerCommand};
use crate::traits::{
    AxisPosition, Clock, Endpoint, JoystickInput, LinkMonitor, MqttClient, MqttMessage,
    SyncReply, SyncTransport,
};

// ============================================================================
// Hardware Mocks
// ============================================================================

/// Mock clock for testing time-dependent behavior.
///
/// Uses interior mutability so tests can advance time while a component
/// holds a shared reference to the clock.
///
/// # Example
///
/// ```rust
/// use pin_mirror::hal::MockClock;
/// use pin_mirror::traits::Clock;
///
/// let clock = MockClock::new();
/// assert_eq!(clock.now_ms(), 0);
///
/// clock.set(1000);
/// assert_eq!(clock.now_ms(), 1000);
///
/// clock.advance(500);
/// assert_eq!(clock.now_ms(), 1500);
/// ```
#[derive(Debug, Default)]
pub struct MockClock {
    current_ms: Cell<u64>,
}

impl MockClock {
    /// Creates a new mock clock starting at 0ms.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the current time in milliseconds.
    pub fn set(&self, ms: u64) {
        self.current_ms.set(ms);
    }

    /// Advances the clock by the given duration.
    pub fn advance(&self, ms: u64) {
        self.current_ms.set(self.current_ms.get() + ms);
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> u64 {
        self.current_ms.get()
    }
}

/// Mock network link.
#[derive(Debug, Default)]
pub struct MockLink {
    up: Cell<bool>,
}

impl MockLink {
    /// A link that is up.
    pub fn up() -> Self {
        Self { up: Cell::new(true) }
    }

    /// A link that is down.
    pub fn down() -> Self {
        Self::default()
    }

    /// Bring the link up or down.
    pub fn set_up(&self, up: bool) {
        self.up.set(up);
    }
}

impl LinkMonitor for MockLink {
    fn is_link_up(&self) -> bool {
        self.up.get()
    }
}

/// Mock digital output.
#[derive(Debug, Default)]
pub struct MockOutputPin {
    /// Current driven level.
    pub high: bool,
    /// Number of writes.
    pub writes: usize,
}

impl MockOutputPin {
    /// A pin driven low.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ErrorType for MockOutputPin {
    type Error = Infallible;
}

impl OutputPin for MockOutputPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.high = false;
        self.writes += 1;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.high = true;
        self.writes += 1;
        Ok(())
    }
}

/// Mock digital input.
#[derive(Debug, Default)]
pub struct MockInputPin {
    /// Level returned by reads.
    pub high: bool,
}

impl MockInputPin {
    /// A pin reading `high`.
    pub fn new(high: bool) -> Self {
        Self { high }
    }
}

impl ErrorType for MockInputPin {
    type Error = Infallible;
}

impl InputPin for MockInputPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.high)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.high)
    }
}

/// Mock joystick with directly settable state.
#[derive(Debug, Default)]
pub struct MockJoystick {
    /// Horizontal position.
    pub x: AxisPosition,
    /// Vertical position.
    pub y: AxisPosition,
    /// Button state.
    pub pressed: bool,
    /// Number of `poll` calls.
    pub polls: usize,
}

impl MockJoystick {
    /// A centered joystick.
    pub fn new() -> Self {
        Self::default()
    }
}

impl JoystickInput for MockJoystick {
    fn poll(&mut self) {
        self.polls += 1;
    }

    fn x(&self) -> AxisPosition {
        self.x
    }

    fn y(&self) -> AxisPosition {
        self.y
    }

    fn pressed(&self) -> bool {
        self.pressed
    }
}

// ============================================================================
// Network Mocks
// ============================================================================

/// Error returned by [`MockMqtt`] when told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockMqttError;

/// Mock MQTT client for testing pub/sub functionality.
///
/// # Example
///
/// ```rust
/// use pin_mirror::hal::MockMqtt;
/// use pin_mirror::traits::MqttClient;
///
/// let mut mqtt = MockMqtt::new();
///
/// // Queue incoming message
/// mqtt.queue_message("pinecone/control", br#"{"status":"ok"}"#.to_vec());
///
/// // Check subscriptions
/// mqtt.subscribe("pinecone/control").unwrap();
/// assert!(mqtt.is_subscribed("pinecone/control"));
///
/// // Check published messages
/// mqtt.publish("pinecone/heartbeat", b"{}", false).unwrap();
/// assert_eq!(mqtt.published_to("pinecone/heartbeat").len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MockMqtt {
    /// Messages that have been published (topic, payload, retain).
    pub published: Vec<(String, Vec<u8>, bool)>,
    /// Topics that have been subscribed to.
    pub subscriptions: Vec<String>,
    /// Queue of incoming messages returned by `try_recv()`, oldest first.
    pub incoming: VecDeque<MqttMessage>,
    /// Whether the client is connected.
    pub connected: bool,
    /// Broker passed to the last `connect` call.
    pub broker: Option<(String, u16)>,
    /// Number of `connect` calls.
    pub connect_calls: usize,
    /// Number of `disconnect` calls.
    pub disconnect_calls: usize,
    /// Make `publish` fail.
    pub fail_publish: bool,
    connect_immediately: bool,
}

impl MockMqtt {
    /// Creates a new mock MQTT client in connected state.
    pub fn new() -> Self {
        Self {
            connected: true,
            ..Default::default()
        }
    }

    /// Creates a client that needs `connect` and an explicit
    /// `connected = true` before it is usable.
    pub fn disconnected() -> Self {
        Self::default()
    }

    /// Make `connect` succeed synchronously.
    pub fn connect_immediately(mut self) -> Self {
        self.connect_immediately = true;
        self
    }

    /// Queue an incoming message.
    pub fn queue_message(&mut self, topic: impl Into<String>, payload: impl Into<Vec<u8>>) {
        self.incoming.push_back(MqttMessage::new(topic, payload));
    }

    /// Check if a topic was subscribed to.
    pub fn is_subscribed(&self, topic: &str) -> bool {
        self.subscriptions.iter().any(|t| t == topic)
    }

    /// Get published messages for a topic.
    pub fn published_to(&self, topic: &str) -> Vec<&(String, Vec<u8>, bool)> {
        self.published
            .iter()
            .filter(|(t, _, _)| t == topic)
            .collect()
    }
}

impl MqttClient for MockMqtt {
    type Error = MockMqttError;

    fn connect(&mut self, host: &str, port: u16) -> Result<(), Self::Error> {
        self.connect_calls += 1;
        self.broker = Some((host.to_string(), port));
        if self.connect_immediately {
            self.connected = true;
        }
        Ok(())
    }

    fn disconnect(&mut self) {
        self.disconnect_calls += 1;
        self.connected = false;
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), Self::Error> {
        if self.fail_publish {
            return Err(MockMqttError);
        }
        self.published
            .push((topic.to_string(), payload.to_vec(), retain));
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), Self::Error> {
        self.subscriptions.push(topic.to_string());
        Ok(())
    }

    fn try_recv(&mut self) -> Option<MqttMessage> {
        self.incoming.pop_front()
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

/// Owned copy of one [`DeviceSyncState`] handed to a [`ScriptedTransport`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentState {
    /// Node id sent.
    pub node_id: String,
    /// Description held at send time.
    pub description: String,
    /// Pins blob held at send time.
    pub pins: String,
    /// `full_sync` flag.
    pub send_full_sync: bool,
    /// `description` included.
    pub send_desc: bool,
    /// `pins` included.
    pub send_pins: bool,
    /// Encoded JSON payload.
    pub payload: String,
}

/// Transport that replays queued outcomes.
///
/// Once the script runs out every call answers with a bare `"ok"`.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    script: VecDeque<Result<SyncReply, SyncError>>,
    /// Every state passed to `sync`, in order.
    pub sent: Vec<SentState>,
    /// Endpoint of the last call.
    pub last_endpoint: Option<Endpoint>,
}

impl ScriptedTransport {
    /// Empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Acknowledge everything.
    pub fn always_ok() -> Self {
        Self::new()
    }

    /// Queue a bare acknowledgement.
    pub fn then_ok(self) -> Self {
        self.then_reply(ServerCommand::ok())
    }

    /// Queue a directive.
    pub fn then_reply(mut self, command: ServerCommand) -> Self {
        self.script.push_back(Ok(SyncReply::Command(command)));
        self
    }

    /// Queue a publish with no directive waiting.
    pub fn then_no_directive(mut self) -> Self {
        self.script.push_back(Ok(SyncReply::NoDirective));
        self
    }

    /// Queue a failure.
    pub fn then_fail(mut self, error: SyncError) -> Self {
        self.script.push_back(Err(error));
        self
    }

    /// Queue another outcome on an already-built transport.
    pub fn push(&mut self, outcome: Result<SyncReply, SyncError>) {
        self.script.push_back(outcome);
    }

    /// Outcomes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl SyncTransport for ScriptedTransport {
    fn sync(
        &mut self,
        endpoint: &Endpoint,
        state: &DeviceSyncState<'_>,
    ) -> Result<SyncReply, SyncError> {
        let mut payload = crate::messages::Payload::new();
        state.encode(&mut payload)?;

        self.sent.push(SentState {
            node_id: state.node_id.to_string(),
            description: state.description.to_string(),
            pins: state.pins.to_string(),
            send_full_sync: state.send_full_sync,
            send_desc: state.send_desc,
            send_pins: state.send_pins,
            payload: payload.as_str().to_string(),
        });
        self.last_endpoint = Some(endpoint.clone());

        self.script
            .pop_front()
            .unwrap_or(Ok(SyncReply::Command(ServerCommand::ok())))
    }
}

// ============================================================================
// Stream Mocks (std)
// ============================================================================

#[cfg(feature = "std")]
pub use stream::{MockConnector, MockStream};

#[cfg(feature = "std")]
mod stream {
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::io::{self, ErrorKind, Read, Write};
    use std::rc::Rc;

    use crate::error::TransportError;
    use crate::traits::Connector;

    /// In-memory stream with a canned response.
    #[derive(Debug)]
    pub struct MockStream {
        response: Vec<u8>,
        cursor: usize,
        written: Rc<RefCell<Vec<u8>>>,
        read_error: Option<ErrorKind>,
        fail_writes: bool,
    }

    impl MockStream {
        /// A stream that answers with `response` and then EOF.
        pub fn new(response: Vec<u8>) -> Self {
            Self {
                response,
                cursor: 0,
                written: Rc::new(RefCell::new(Vec::new())),
                read_error: None,
                fail_writes: false,
            }
        }

        /// Fail every read with `kind` once the response is consumed.
        pub fn fail_reads(mut self, kind: ErrorKind) -> Self {
            self.read_error = Some(kind);
            self
        }

        /// Fail every write.
        pub fn fail_writes(mut self) -> Self {
            self.fail_writes = true;
            self
        }
    }

    impl Read for MockStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let rest = &self.response[self.cursor..];
            if rest.is_empty() {
                return match self.read_error {
                    Some(kind) => Err(io::Error::from(kind)),
                    None => Ok(0),
                };
            }
            let n = rest.len().min(buf.len());
            buf[..n].copy_from_slice(&rest[..n]);
            self.cursor += n;
            Ok(n)
        }
    }

    impl Write for MockStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.fail_writes {
                return Err(io::Error::from(ErrorKind::BrokenPipe));
            }
            self.written.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Connector handing out queued [`MockStream`]s.
    ///
    /// Refuses connections once the queue is empty.
    #[derive(Debug, Default)]
    pub struct MockConnector {
        streams: VecDeque<MockStream>,
        requests: Vec<Rc<RefCell<Vec<u8>>>>,
        refuse: bool,
        last_timeout_ms: Option<u32>,
        last_target: Option<(String, u16)>,
    }

    impl MockConnector {
        /// A connector with nothing queued.
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue a connection answering with `response`.
        pub fn with_response(self, response: Vec<u8>) -> Self {
            self.with_stream(MockStream::new(response))
        }

        /// Queue a prepared stream.
        pub fn with_stream(mut self, stream: MockStream) -> Self {
            self.streams.push_back(stream);
            self
        }

        /// Refuse every connection.
        pub fn refusing(mut self) -> Self {
            self.refuse = true;
            self
        }

        /// Connections opened so far.
        pub fn connections(&self) -> usize {
            self.requests.len()
        }

        /// Bytes written on the most recent connection.
        pub fn last_request(&self) -> Option<String> {
            let bytes = self.requests.last()?.borrow().clone();
            String::from_utf8(bytes).ok()
        }

        /// Timeout passed to the most recent `connect`.
        pub fn last_timeout_ms(&self) -> Option<u32> {
            self.last_timeout_ms
        }

        /// Host and port of the most recent `connect`.
        pub fn last_target(&self) -> Option<&(String, u16)> {
            self.last_target.as_ref()
        }
    }

    impl Connector for MockConnector {
        type Stream = MockStream;

        fn connect(
            &mut self,
            host: &str,
            port: u16,
            timeout_ms: u32,
        ) -> Result<MockStream, TransportError> {
            self.last_timeout_ms = Some(timeout_ms);
            self.last_target = Some((host.to_string(), port));
            if self.refuse {
                return Err(TransportError::Connect);
            }
            let stream = self.streams.pop_front().ok_or(TransportError::Connect)?;
            self.requests.push(Rc::clone(&stream.written));
            Ok(stream)
        }
    }
}
