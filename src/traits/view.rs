//! Device view traits.
//!
//! A view owns a set of pin indices and is the only writer of their
//! registry entries. Input views refresh their pins before the sync step;
//! status views react to the sync outcome afterwards.

use crate::pins::PinRegistry;

/// Link state handed to status views after the sync step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LinkStatus {
    /// Last sync attempt succeeded.
    pub connected: bool,
    /// Server asked for blinking (only ever true while connected).
    pub should_blink: bool,
}

/// A view that samples hardware into the registry.
pub trait InputView {
    /// Register owned pins. Called once before the first tick.
    fn register(&mut self, pins: &mut PinRegistry);

    /// Sample hardware and write display values.
    fn refresh(&mut self, pins: &mut PinRegistry);
}

/// A view that drives indicators from the link state.
pub trait StatusView {
    /// Register owned pins. Called once before the first tick.
    fn register(&mut self, pins: &mut PinRegistry);

    /// Update outputs for `elapsed_ms` of wall time.
    fn update(&mut self, elapsed_ms: u32, status: LinkStatus, pins: &mut PinRegistry);
}
