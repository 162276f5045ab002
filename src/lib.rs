//! # pin-mirror
//!
//! Mirrors a device's logical I/O pins to a remote dashboard and applies
//! the directives the dashboard sends back (blink, rename, forced resync).
//!
//! ## Features
//!
//! - **Pin registry**: fixed table of pins with a change counter
//! - **Bounded serialization**: deterministic JSON that truncates cleanly
//! - **Two transports**: blocking HTTP or fire-and-forget MQTT
//! - **Delta sync**: identity handshake, then only what changed
//! - **Failure-safe**: a failed cycle changes nothing but `connected`
//!
//! ## Architecture
//!
//! The crate is structured to allow testing on desktop without hardware:
//!
//! - `pins` - Pin registry
//! - `serializer` - Registry snapshot to wire blob
//! - `messages` - Request payload and server response
//! - `transport` - HTTP and MQTT sync transports
//! - `sync` - The synchronization state machine
//! - `views` - LED, button and joystick views
//! - `app` - Control-loop context
//! - `hal` - Concrete implementations (mock for testing, esp32 for hardware)
//!
//! ## Example
//!
//! ```rust
//! use pin_mirror::{
//!     hal::{MockLink, ScriptedTransport},
//!     PinMode, PinRegistry, ServerCommand, SyncOrchestrator, Endpoint,
//! };
//!
//! let mut pins = PinRegistry::new();
//! pins.register_pin(4, "Button", PinMode::Input);
//!
//! let transport = ScriptedTransport::new()
//!     .then_ok()
//!     .then_reply(ServerCommand::ok().with_blink(true));
//! let mut sync = SyncOrchestrator::new(transport, Endpoint::new("10.0.0.2", 80), "mac-aabbccddeeff", 25);
//! let link = MockLink::up();
//!
//! sync.update(25, &pins, &link); // handshake
//! pins.set_value_string(4, "1");
//! sync.update(25, &pins, &link); // pins delta
//!
//! assert!(sync.should_blink());
//! assert!(sync.transport().sent[1].send_pins);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

extern crate alloc;

/// Control-loop context and loop timing.
pub mod app;
/// Shared configuration system for desktop and ESP32.
pub mod config;
/// Error taxonomy for sync cycles.
pub mod error;
/// Hardware abstraction layer with mock implementations for testing.
pub mod hal;
/// Wire messages exchanged with the dashboard.
pub mod messages;
/// Pin registry.
pub mod pins;
/// Registry serialization.
pub mod serializer;
/// Synchronization state machine.
pub mod sync;
/// Core traits for hardware, network and views.
pub mod traits;
/// HTTP and MQTT sync transports.
#[cfg(feature = "std")]
pub mod transport;
/// Device views.
pub mod views;

// Re-exports for convenience
pub use app::{DeltaTimer, DeviceApp};
pub use error::{CapacityError, ProtocolError, SyncError, TransportError};
pub use messages::{node_id_from_mac, DeviceSyncState, ServerCommand};
pub use pins::{PinMode, PinRegistry};
pub use serializer::{JsonPinsFormatter, PinsFormatter, StateSerializer};
pub use sync::{SyncOrchestrator, SyncPhase, SyncSession};
pub use traits::{
    // Hardware
    Clock,
    // Network
    Endpoint,
    // Views
    InputView,
    JoystickInput,
    LinkMonitor,
    LinkStatus,
    MqttClient,
    MqttMessage,
    StatusView,
    SyncReply,
    SyncTransport,
};

#[cfg(feature = "std")]
pub use transport::{HttpTransport, MqttTransport, StdConnector};

// Config re-exports
pub use config::{Config, DashboardConfig, DeviceConfig, MqttConfig, TransportKind, WifiConfig};
