//! Hardware Abstraction Layer implementations.
//!
//! This module contains concrete implementations of the traits
//! defined in [`crate::traits`] for various platforms.
//!
//! # Available Implementations
//!
//! - `mock`: Test implementations for desktop development
//! - `rumqtt`: `rumqttc`-based MQTT client (requires `mqtt` feature)
//! - `esp32`: ESP32 clock, WiFi link and MQTT client (requires `esp32` feature)

pub mod mock;

#[cfg(feature = "mqtt")]
pub mod rumqtt;

#[cfg(feature = "esp32")]
pub mod esp32;

pub use mock::*;

#[cfg(feature = "mqtt")]
pub use rumqtt::{MqttError, RumqttClient};

#[cfg(feature = "esp32")]
pub use esp32::*;
