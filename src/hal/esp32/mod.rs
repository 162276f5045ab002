//! ESP32 hardware abstraction layer.
//!
//! # Hardware Configuration
//!
//! - **MCU**: ESP32-C3 SuperMini (RISC-V 160MHz, 4MB Flash)
//! - **Status LED**: onboard, active low
//! - **Button**: push button to ground, internal pull-up
//!
//! # Pin Assignments
//!
//! See the [`pins`] module for GPIO assignments.

mod clock;
mod mqtt;
mod wifi;

pub use clock::Esp32Clock;
pub use mqtt::{Esp32Mqtt, Esp32MqttError};
pub use wifi::Esp32Wifi;

/// Pin assignments for the SuperMini ESP32-C3.
///
/// Registry indices match the GPIO numbers.
pub mod pins {
    /// Onboard status LED (active low).
    pub const LED: u8 = 8;

    /// Push button (active low, internal pull-up).
    pub const BUTTON: u8 = 9;
}
