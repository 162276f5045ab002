//! Two-axis joystick with push button.

use crate::pins::{PinMode, PinRegistry};
use crate::traits::{AxisPosition, InputView, JoystickInput};

/// Thresholds turning a raw ADC reading into an [`AxisPosition`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AxisCalibration {
    /// Reading at rest.
    pub center: u16,
    /// Half-width of the dead band around `center`.
    pub deadzone: u16,
    /// Swap low and high.
    pub inverted: bool,
}

impl Default for AxisCalibration {
    fn default() -> Self {
        Self {
            center: 1600,
            deadzone: 600,
            inverted: false,
        }
    }
}

impl AxisCalibration {
    /// Classify a raw reading.
    ///
    /// ```
    /// use pin_mirror::traits::AxisPosition;
    /// use pin_mirror::views::AxisCalibration;
    ///
    /// let cal = AxisCalibration::default();
    /// assert_eq!(cal.map(100), AxisPosition::Low);
    /// assert_eq!(cal.map(1600), AxisPosition::Center);
    /// assert_eq!(cal.map(4000), AxisPosition::High);
    /// ```
    pub fn map(&self, raw: u16) -> AxisPosition {
        let low = self.center.saturating_sub(self.deadzone);
        let high = self.center.saturating_add(self.deadzone);
        let position = if raw < low {
            AxisPosition::Low
        } else if raw > high {
            AxisPosition::High
        } else {
            AxisPosition::Center
        };

        match (self.inverted, position) {
            (true, AxisPosition::Low) => AxisPosition::High,
            (true, AxisPosition::High) => AxisPosition::Low,
            (_, p) => p,
        }
    }
}

/// Registry pin indices used by a [`JoystickView`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JoystickPins {
    /// Horizontal axis.
    pub x: u8,
    /// Vertical axis.
    pub y: u8,
    /// Push button, if wired.
    pub button: Option<u8>,
}

/// Publishes joystick state: `"-1" | "0" | "1"` per axis and
/// `"PRESSED" | "RELEASED"` for the button.
pub struct JoystickView<J: JoystickInput> {
    joystick: J,
    pins: JoystickPins,
}

impl<J: JoystickInput> JoystickView<J> {
    /// Create a view over `joystick`.
    pub fn new(joystick: J, pins: JoystickPins) -> Self {
        Self { joystick, pins }
    }

    /// The joystick.
    pub fn joystick_mut(&mut self) -> &mut J {
        &mut self.joystick
    }
}

impl<J: JoystickInput> InputView for JoystickView<J> {
    fn register(&mut self, registry: &mut PinRegistry) {
        registry.register_pin(self.pins.x, "X", PinMode::Input);
        registry.register_pin(self.pins.y, "Y", PinMode::Input);
        if let Some(button) = self.pins.button {
            registry.register_pin(button, "Joy But", PinMode::PullUp);
        }
    }

    fn refresh(&mut self, registry: &mut PinRegistry) {
        self.joystick.poll();
        registry.set_value_string(self.pins.x, self.joystick.x().as_str());
        registry.set_value_string(self.pins.y, self.joystick.y().as_str());
        if let Some(button) = self.pins.button {
            let value = if self.joystick.pressed() {
                "PRESSED"
            } else {
                "RELEASED"
            };
            registry.set_value_string(button, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::MockJoystick;

    const PINS: JoystickPins = JoystickPins {
        x: 1,
        y: 2,
        button: Some(3),
    };

    #[test]
    fn registers_axes_and_button() {
        let mut registry = PinRegistry::new();
        let mut view = JoystickView::new(MockJoystick::new(), PINS);
        view.register(&mut registry);

        assert_eq!(registry.name(1).as_str(), "X");
        assert_eq!(registry.mode_str(2), "input");
        assert_eq!(registry.name(3).as_str(), "Joy But");
        assert_eq!(registry.mode_str(3), "pullup");
    }

    #[test]
    fn reports_positions() {
        let mut registry = PinRegistry::new();
        let mut view = JoystickView::new(MockJoystick::new(), PINS);
        view.register(&mut registry);

        view.joystick_mut().x = AxisPosition::Low;
        view.joystick_mut().y = AxisPosition::High;
        view.joystick_mut().pressed = true;
        view.refresh(&mut registry);

        assert_eq!(registry.value_string(1), "-1");
        assert_eq!(registry.value_string(2), "1");
        assert_eq!(registry.value_string(3), "PRESSED");
        assert_eq!(view.joystick_mut().polls, 1);
    }

    #[test]
    fn no_button_leaves_slot_free() {
        let mut registry = PinRegistry::new();
        let pins = JoystickPins { button: None, ..PINS };
        let mut view = JoystickView::new(MockJoystick::new(), pins);
        view.register(&mut registry);
        view.refresh(&mut registry);
        assert!(!registry.is_configured(3));
    }

    #[test]
    fn calibration_deadzone_and_inversion() {
        let cal = AxisCalibration {
            center: 2000,
            deadzone: 100,
            inverted: true,
        };
        assert_eq!(cal.map(1899), AxisPosition::High);
        assert_eq!(cal.map(1900), AxisPosition::Center);
        assert_eq!(cal.map(2100), AxisPosition::Center);
        assert_eq!(cal.map(2101), AxisPosition::Low);
    }
}
