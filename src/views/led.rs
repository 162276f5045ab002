//! Status LED driven by the dashboard link state.

use embedded_hal::digital::OutputPin;

use crate::pins::{PinMode, PinRegistry};
use crate::traits::{LinkStatus, StatusView};

/// Registry value while the LED is lit.
pub const LED_ON: &str = "On";

/// Registry value while the LED is dark.
pub const LED_OFF: &str = "Off";

/// Connection indicator.
///
/// | Link state | LED |
/// |------------|-----|
/// | disconnected | off |
/// | connected | steady on |
/// | connected, blink requested | toggles every `blink_interval_ms` |
///
/// # Example
///
/// ```rust
/// use pin_mirror::hal::MockOutputPin;
/// use pin_mirror::pins::PinRegistry;
/// use pin_mirror::traits::{LinkStatus, StatusView};
/// use pin_mirror::views::LedView;
///
/// let mut pins = PinRegistry::new();
/// let mut led = LedView::new(MockOutputPin::new(), 11, 500);
/// led.register(&mut pins);
///
/// let status = LinkStatus { connected: true, should_blink: false };
/// led.update(20, status, &mut pins);
/// assert_eq!(pins.value_string(11), "On");
/// ```
pub struct LedView<P: OutputPin> {
    pin: P,
    index: u8,
    blink_interval_ms: u32,
    blink_elapsed_ms: u32,
    active_low: bool,
    lit: bool,
}

impl<P: OutputPin> LedView<P> {
    /// Create a view for an LED on registry pin `index`.
    pub fn new(pin: P, index: u8, blink_interval_ms: u32) -> Self {
        Self {
            pin,
            index,
            blink_interval_ms: blink_interval_ms.max(1),
            blink_elapsed_ms: 0,
            active_low: false,
            lit: false,
        }
    }

    /// The LED lights when the pin is driven low.
    pub fn active_low(mut self) -> Self {
        self.active_low = true;
        self
    }

    /// Whether the LED is currently lit.
    pub fn is_lit(&self) -> bool {
        self.lit
    }

    /// The driven pin.
    pub fn pin(&self) -> &P {
        &self.pin
    }

    fn show(&mut self, lit: bool, pins: &mut PinRegistry) {
        self.lit = lit;
        let drive_high = lit != self.active_low;
        let result = if drive_high {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        if result.is_err() {
            log::warn!("LED pin {} write failed", self.index);
        }
        pins.set_value_string(self.index, if lit { LED_ON } else { LED_OFF });
    }
}

impl<P: OutputPin> StatusView for LedView<P> {
    fn register(&mut self, pins: &mut PinRegistry) {
        pins.register_pin(self.index, "LED", PinMode::Output);
        self.blink_elapsed_ms = 0;
        self.show(false, pins);
    }

    fn update(&mut self, elapsed_ms: u32, status: LinkStatus, pins: &mut PinRegistry) {
        if !status.connected {
            self.blink_elapsed_ms = 0;
            self.show(false, pins);
        } else if status.should_blink {
            self.blink_elapsed_ms = self.blink_elapsed_ms.saturating_add(elapsed_ms);
            if self.blink_elapsed_ms >= self.blink_interval_ms {
                self.blink_elapsed_ms = 0;
                let next = !self.lit;
                self.show(next, pins);
            }
        } else {
            self.blink_elapsed_ms = 0;
            self.show(true, pins);
        }
    }
}
