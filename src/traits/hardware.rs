//! Hardware abstraction traits for time, link state and analog inputs.
//!
//! # Key Traits
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`Clock`] | Time source for `no_std` environments |
//! | [`LinkMonitor`] | Whether the network link is up |
//! | [`JoystickInput`] | Two-axis joystick with push button |
//!
//! Digital pins use `embedded-hal` 1.0 `InputPin`/`OutputPin` directly.
//!
//! # Implementation
//!
//! For testing and desktop development, use the mock implementations
//! from [`crate::hal::mock`]. For ESP32 hardware, use the
//! implementations from `hal::esp32` (requires `esp32` feature).

/// Monotonic time source.
///
/// # Example
///
/// ```rust
/// use pin_mirror::traits::Clock;
/// use pin_mirror::hal::MockClock;
///
/// let clock = MockClock::new();
/// assert_eq!(clock.now_ms(), 0);
///
/// clock.advance(100);
/// assert_eq!(clock.now_ms(), 100);
/// ```
pub trait Clock {
    /// Returns current time in milliseconds since an arbitrary epoch.
    fn now_ms(&self) -> u64;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}

/// Reports whether the device currently has a network link.
///
/// Establishing the link (WiFi association and so on) happens elsewhere;
/// the orchestrator only asks.
pub trait LinkMonitor {
    /// True when the device can reach the network.
    fn is_link_up(&self) -> bool;
}

impl<L: LinkMonitor + ?Sized> LinkMonitor for &L {
    fn is_link_up(&self) -> bool {
        (**self).is_link_up()
    }
}

/// Direction of one joystick axis after thresholding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum AxisPosition {
    /// Pushed towards the low end.
    Low,
    /// Resting in the middle.
    #[default]
    Center,
    /// Pushed towards the high end.
    High,
}

impl AxisPosition {
    /// Display value used for the pin registry.
    ///
    /// ```
    /// use pin_mirror::traits::AxisPosition;
    ///
    /// assert_eq!(AxisPosition::Low.as_str(), "-1");
    /// assert_eq!(AxisPosition::Center.as_str(), "0");
    /// assert_eq!(AxisPosition::High.as_str(), "1");
    /// ```
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            AxisPosition::Low => "-1",
            AxisPosition::Center => "0",
            AxisPosition::High => "1",
        }
    }
}

/// Two-axis joystick with a push button.
pub trait JoystickInput {
    /// Sample the hardware. Called once per tick before reading.
    fn poll(&mut self);

    /// Horizontal axis.
    fn x(&self) -> AxisPosition;

    /// Vertical axis.
    fn y(&self) -> AxisPosition;

    /// True while the stick is pressed in.
    fn pressed(&self) -> bool;
}
