//! Boot-relative time from the ESP-IDF high resolution timer.

use core::time::Duration;

use crate::traits::Clock;

/// Time since boot, read from `esp_timer_get_time()`.
///
/// ```ignore
/// let mut timer = DeltaTimer::new(Esp32Clock::new());
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct Esp32Clock;

impl Esp32Clock {
    /// Clock handle. The timer itself is started by ESP-IDF at boot.
    pub const fn new() -> Self {
        Self
    }

    /// Time since boot.
    pub fn uptime(&self) -> Duration {
        // SAFETY: reads a free-running counter and has no preconditions.
        let micros = unsafe { esp_idf_hal::sys::esp_timer_get_time() };
        Duration::from_micros(u64::try_from(micros).unwrap_or(0))
    }
}

impl Clock for Esp32Clock {
    fn now_ms(&self) -> u64 {
        self.uptime().as_millis() as u64
    }
}
