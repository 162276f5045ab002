//! Push button input.

use embedded_hal::digital::InputPin;

use crate::pins::{PinMode, PinRegistry};
use crate::traits::InputView;

/// Single push button wired to ground with a pull-up (pressed reads low).
///
/// Reports `"1"` while pressed and `"0"` otherwise. A failed pin read leaves
/// the last value in place.
pub struct ButtonView<P: InputPin> {
    pin: P,
    index: u8,
    name: &'static str,
    pressed: bool,
}

impl<P: InputPin> ButtonView<P> {
    /// Create a view for a button on registry pin `index`.
    pub fn new(pin: P, index: u8, name: &'static str) -> Self {
        Self {
            pin,
            index,
            name,
            pressed: false,
        }
    }

    /// Last sampled state.
    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    /// The sampled pin.
    pub fn pin_mut(&mut self) -> &mut P {
        &mut self.pin
    }
}

impl<P: InputPin> InputView for ButtonView<P> {
    fn register(&mut self, pins: &mut PinRegistry) {
        pins.register_pin(self.index, self.name, PinMode::PullUp);
    }

    fn refresh(&mut self, pins: &mut PinRegistry) {
        match self.pin.is_low() {
            Ok(pressed) => self.pressed = pressed,
            Err(_) => {
                log::warn!("button pin {} read failed", self.index);
                return;
            }
        }
        pins.set_value_string(self.index, if self.pressed { "1" } else { "0" });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::MockInputPin;

    #[test]
    fn registers_as_pullup() {
        let mut pins = PinRegistry::new();
        let mut button = ButtonView::new(MockInputPin::new(true), 4, "Button");
        button.register(&mut pins);
        assert_eq!(pins.mode_str(4), "pullup");
        assert_eq!(pins.name(4).as_str(), "Button");
    }

    #[test]
    fn active_low_press() {
        let mut pins = PinRegistry::new();
        let mut button = ButtonView::new(MockInputPin::new(true), 4, "Button");
        button.register(&mut pins);

        button.refresh(&mut pins);
        assert_eq!(pins.value_string(4), "0");

        button.pin_mut().high = false;
        button.refresh(&mut pins);
        assert!(button.is_pressed());
        assert_eq!(pins.value_string(4), "1");
    }
}
