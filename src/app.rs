//! Application context and loop timing.
//!
//! [`DeviceApp`] owns everything the control loop mutates: the pin registry,
//! the sync orchestrator (and through it the session and transport) and the
//! link monitor. Views are passed in on every tick, so the app never holds
//! hardware it does not need.
//!
//! # Tick order
//!
//! 1. input views refresh their pins
//! 2. at most one sync attempt
//! 3. status views react to the outcome
//!
//! # Example
//!
//! ```rust
//! use pin_mirror::app::DeviceApp;
//! use pin_mirror::hal::{MockInputPin, MockLink, MockOutputPin, ScriptedTransport};
//! use pin_mirror::sync::SyncOrchestrator;
//! use pin_mirror::traits::{Endpoint, InputView, StatusView};
//! use pin_mirror::views::{ButtonView, LedView};
//!
//! let sync = SyncOrchestrator::new(
//!     ScriptedTransport::always_ok(),
//!     Endpoint::new("10.0.0.2", 80),
//!     "mac-aabbccddeeff",
//!     25,
//! );
//! let mut app = DeviceApp::new(sync, MockLink::up());
//!
//! let mut button = ButtonView::new(MockInputPin::new(true), 4, "Button");
//! let mut led = LedView::new(MockOutputPin::new(), 11, 500);
//! let mut inputs: [&mut dyn InputView; 1] = [&mut button];
//! let mut outputs: [&mut dyn StatusView; 1] = [&mut led];
//!
//! app.register(&mut inputs, &mut outputs);
//! let status = app.tick(25, &mut inputs, &mut outputs);
//! assert!(status.connected);
//! assert_eq!(app.pins().value_string(11), "On");
//! ```

use crate::pins::PinRegistry;
use crate::sync::SyncOrchestrator;
use crate::traits::{Clock, InputView, LinkMonitor, LinkStatus, StatusView, SyncTransport};

/// Frames between statistics resets.
const STATS_WINDOW: u32 = 1000;

// ============================================================================
// Delta Timer
// ============================================================================

/// Loop timing statistics over a rolling window of frames.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Shortest frame in the window.
    pub min_ms: u64,
    /// Longest frame in the window.
    pub max_ms: u64,
    /// Frames counted in the window.
    pub frames: u32,
    total_ms: u64,
}

impl FrameStats {
    /// Mean frame time, or 0 with no frames recorded.
    pub fn average_ms(&self) -> u64 {
        if self.frames == 0 {
            0
        } else {
            self.total_ms / u64::from(self.frames)
        }
    }

    fn record(&mut self, delta_ms: u64) {
        if self.frames == 0 || delta_ms < self.min_ms {
            self.min_ms = delta_ms;
        }
        if delta_ms > self.max_ms {
            self.max_ms = delta_ms;
        }
        self.total_ms = self.total_ms.saturating_add(delta_ms);
        self.frames += 1;
    }
}

/// Turns a [`Clock`] into per-tick elapsed times.
///
/// The delta is signed: a clock that steps backwards yields a negative value,
/// which the orchestrator rejects.
pub struct DeltaTimer<K: Clock> {
    clock: K,
    last_ms: u64,
    stats: FrameStats,
    last_window: FrameStats,
}

impl<K: Clock> DeltaTimer<K> {
    /// Start timing from the clock's current reading.
    pub fn new(clock: K) -> Self {
        let last_ms = clock.now_ms();
        Self {
            clock,
            last_ms,
            stats: FrameStats::default(),
            last_window: FrameStats::default(),
        }
    }

    /// Milliseconds since the previous call (or since construction).
    pub fn tick(&mut self) -> i64 {
        let now = self.clock.now_ms();
        let delta = now.wrapping_sub(self.last_ms) as i64;
        self.last_ms = now;

        if delta > 0 {
            self.stats.record(delta as u64);
            if self.stats.frames >= STATS_WINDOW {
                self.last_window = self.stats;
                self.stats = FrameStats::default();
                log::debug!(
                    "frame time avg {} ms, min {} ms, max {} ms",
                    self.last_window.average_ms(),
                    self.last_window.min_ms,
                    self.last_window.max_ms
                );
            }
        }
        delta
    }

    /// Statistics of the last completed window.
    pub fn stats(&self) -> FrameStats {
        self.last_window
    }

    /// Statistics of the window in progress.
    pub fn current_stats(&self) -> FrameStats {
        self.stats
    }
}

// ============================================================================
// Application Context
// ============================================================================

/// Everything the control loop owns.
pub struct DeviceApp<T: SyncTransport, L: LinkMonitor> {
    pins: PinRegistry,
    sync: SyncOrchestrator<T>,
    link: L,
}

impl<T: SyncTransport, L: LinkMonitor> DeviceApp<T, L> {
    /// Create a context with an empty registry.
    pub fn new(sync: SyncOrchestrator<T>, link: L) -> Self {
        Self {
            pins: PinRegistry::new(),
            sync,
            link,
        }
    }

    /// Let every view register its pins. Call once before the first tick.
    pub fn register(
        &mut self,
        inputs: &mut [&mut dyn InputView],
        outputs: &mut [&mut dyn StatusView],
    ) {
        for view in inputs.iter_mut() {
            view.register(&mut self.pins);
        }
        for view in outputs.iter_mut() {
            view.register(&mut self.pins);
        }
        log::info!("{} pins registered", self.pins.configured_pins().count());
    }

    /// Run one control-loop iteration.
    pub fn tick(
        &mut self,
        elapsed_ms: i64,
        inputs: &mut [&mut dyn InputView],
        outputs: &mut [&mut dyn StatusView],
    ) -> LinkStatus {
        for view in inputs.iter_mut() {
            view.refresh(&mut self.pins);
        }

        self.sync.update(elapsed_ms, &self.pins, &self.link);
        let status = self.status();

        let elapsed = u32::try_from(elapsed_ms.max(0)).unwrap_or(u32::MAX);
        for view in outputs.iter_mut() {
            view.update(elapsed, status, &mut self.pins);
        }
        status
    }

    /// Link state as seen by status views.
    pub fn status(&self) -> LinkStatus {
        LinkStatus {
            connected: self.sync.is_connected(),
            should_blink: self.sync.should_blink(),
        }
    }

    /// The pin registry.
    pub fn pins(&self) -> &PinRegistry {
        &self.pins
    }

    /// Mutable access to the pin registry.
    pub fn pins_mut(&mut self) -> &mut PinRegistry {
        &mut self.pins
    }

    /// The orchestrator.
    pub fn sync(&self) -> &SyncOrchestrator<T> {
        &self.sync
    }

    /// Mutable access to the orchestrator.
    pub fn sync_mut(&mut self) -> &mut SyncOrchestrator<T> {
        &mut self.sync
    }

    /// The link monitor.
    pub fn link(&self) -> &L {
        &self.link
    }

    /// Mutable access to the link monitor.
    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }
}
