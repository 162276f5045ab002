//! Device views: the bridge between physical I/O and the pin registry.
//!
//! | View | Kind | Pins |
//! |------|------|------|
//! | [`LedView`] | status | one output, `"On"`/`"Off"` |
//! | [`ButtonView`] | input | one pull-up input, `"1"`/`"0"` |
//! | [`JoystickView`] | input | two axes plus optional button |
//!
//! Each view is the only writer of the pins it registers.

mod button;
mod joystick;
mod led;

pub use button::ButtonView;
pub use joystick::{AxisCalibration, JoystickPins, JoystickView};
pub use led::{LedView, LED_OFF, LED_ON};
