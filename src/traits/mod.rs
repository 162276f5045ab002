//! Trait definitions for hardware abstraction, networking and device views.
//!
//! These abstractions let pin-mirror:
//! - Run on different hardware (ESP32, desktop mock)
//! - Talk to the dashboard over HTTP or MQTT
//! - Plug device-specific views into one control loop
//!
//! # Submodules
//!
//! - `hardware`: clock, link monitor, joystick input
//! - `network`: sync transport, MQTT client, stream connector
//! - `view`: input and status views
//!
//! # Sync Transport
//!
//! [`SyncTransport`] is the seam between the orchestrator and the network.
//! The two implementations live in [`crate::transport`].

pub mod hardware;
pub mod network;
pub mod view;

pub use hardware::*;
pub use network::*;
pub use view::*;
