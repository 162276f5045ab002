//! Authoritative in-memory table of logical pins.
//!
//! Each entry carries a mode, a display name and a display value. Views
//! register the pins they own and keep their values current; the sync
//! engine reads the table and watches [`PinRegistry::revision`] to decide
//! when the serialized snapshot must be rebuilt.
//!
//! No operation here can fail. Out-of-range indices are ignored and
//! over-long strings are truncated, because the registry is written from
//! the control loop where dropping a malformed update is preferable to
//! aborting.
//!
//! # Example
//!
//! ```rust
//! use pin_mirror::pins::{PinMode, PinRegistry};
//!
//! let mut pins = PinRegistry::new();
//! pins.register_pin(4, "Button", PinMode::Input);
//! pins.set_value_string(4, "1");
//!
//! assert_eq!(pins.mode_str(4), "input");
//! assert_eq!(pins.value_string(4), "1");
//! assert_eq!(pins.name(5).as_str(), "gpio5");
//! ```

use core::fmt::Write;

use heapless::String as HString;

use crate::config::bounded;

/// Number of addressable pin slots.
pub const MAX_PINS: usize = 23;

/// Maximum stored length of a pin name in bytes.
pub const MAX_PIN_NAME: usize = 15;

/// Maximum stored length of a pin display value in bytes.
pub const MAX_PIN_VALUE: usize = 31;

/// Bounded pin display name.
pub type PinName = HString<MAX_PIN_NAME>;

/// Bounded pin display value.
pub type PinValue = HString<MAX_PIN_VALUE>;

/// Display value reported for pins that never had one set.
pub const DEFAULT_VALUE: &str = "0";

/// Electrical mode of a logical pin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PinMode {
    /// Not set up by any view.
    #[default]
    Unconfigured,
    /// Floating input.
    Input,
    /// Push-pull output.
    Output,
    /// Input with pull-up resistor.
    PullUp,
    /// Input with pull-down resistor.
    PullDown,
}

impl PinMode {
    /// Wire name of the mode.
    ///
    /// ```
    /// use pin_mirror::pins::PinMode;
    ///
    /// assert_eq!(PinMode::PullUp.as_str(), "pullup");
    /// ```
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            PinMode::Unconfigured => "unconfigured",
            PinMode::Input => "input",
            PinMode::Output => "output",
            PinMode::PullUp => "pullup",
            PinMode::PullDown => "pulldown",
        }
    }
}

#[derive(Clone, Debug, Default)]
struct PinEntry {
    mode: PinMode,
    name: PinName,
    value: PinValue,
    configured: bool,
}

/// Read-only view of one configured pin, as handed to serializers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PinSnapshot<'a> {
    /// Pin index.
    pub index: u8,
    /// Effective display name (generated when unset).
    pub name: PinName,
    /// Wire name of the mode.
    pub mode: &'static str,
    /// Effective display value.
    pub value: &'a str,
}

/// Table of all logical pins plus a change counter.
///
/// The revision only moves when something that appears in the serialized
/// snapshot changes: a configured pin's mode, name or value, or a pin
/// becoming configured. Rewriting identical data leaves it alone.
#[derive(Clone, Debug)]
pub struct PinRegistry {
    pins: [PinEntry; MAX_PINS],
    revision: u32,
}

impl Default for PinRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PinRegistry {
    /// Create a registry with every slot unconfigured.
    pub fn new() -> Self {
        Self {
            pins: core::array::from_fn(|_| PinEntry::default()),
            revision: 0,
        }
    }

    #[inline]
    fn entry(&self, index: u8) -> Option<&PinEntry> {
        self.pins.get(usize::from(index))
    }

    /// Register a pin with a name and mode. Calling it again with the same
    /// arguments changes nothing.
    pub fn register_pin(&mut self, index: u8, name: &str, mode: PinMode) {
        let before = match self.entry(index) {
            None => return,
            Some(entry) if entry.configured => Some((entry.mode, self.name(index))),
            Some(_) => None,
        };
        let Some(entry) = self.pins.get_mut(usize::from(index)) else {
            return;
        };

        entry.configured = true;
        entry.mode = mode;
        entry.name = bounded(name);

        // Compare what the snapshot shows, not the stored name.
        let changed = match before {
            None => true,
            Some((was_mode, was_name)) => was_mode != mode || was_name != self.name(index),
        };
        if changed {
            self.bump();
        }
    }

    /// Rename a pin. An empty name falls back to the generated `gpioN`.
    pub fn set_name(&mut self, index: u8, name: &str) {
        let before = self.name(index);
        let Some(entry) = self.pins.get_mut(usize::from(index)) else {
            return;
        };

        entry.name = bounded(name);
        let visible = entry.configured;
        if visible && self.name(index) != before {
            self.bump();
        }
    }

    /// Effective display name, `gpioN` if none was set.
    pub fn name(&self, index: u8) -> PinName {
        match self.entry(index) {
            None => PinName::new(),
            Some(entry) if !entry.name.is_empty() => entry.name.clone(),
            Some(_) => {
                let mut generated = PinName::new();
                let _ = write!(generated, "gpio{}", index);
                generated
            }
        }
    }

    /// Set the display value of a pin.
    pub fn set_value_string(&mut self, index: u8, value: &str) {
        let Some(entry) = self.pins.get_mut(usize::from(index)) else {
            return;
        };

        let value: PinValue = bounded(value);
        let before = effective_value(&entry.value);
        let changed = entry.configured && before != effective_value(&value);

        entry.value = value;

        if changed {
            self.bump();
        }
    }

    /// Display value of a pin, `"0"` if unset or out of range.
    pub fn value_string(&self, index: u8) -> &str {
        self.entry(index)
            .map(|entry| effective_value(&entry.value))
            .unwrap_or(DEFAULT_VALUE)
    }

    /// Mode of a pin; out-of-range pins read as unconfigured.
    pub fn mode(&self, index: u8) -> PinMode {
        self.entry(index)
            .map(|entry| entry.mode)
            .unwrap_or(PinMode::Unconfigured)
    }

    /// Wire name of a pin's mode.
    pub fn mode_str(&self, index: u8) -> &'static str {
        self.mode(index).as_str()
    }

    /// Whether a view has registered this pin.
    pub fn is_configured(&self, index: u8) -> bool {
        self.entry(index).map(|entry| entry.configured).unwrap_or(false)
    }

    /// Current change counter.
    #[inline]
    pub fn revision(&self) -> u32 {
        self.revision
    }

    /// Configured pins in ascending index order.
    pub fn configured_pins(&self) -> impl Iterator<Item = PinSnapshot<'_>> + '_ {
        (0..MAX_PINS as u8).filter_map(move |index| {
            let entry = self.entry(index)?;
            if !entry.configured {
                return None;
            }
            Some(PinSnapshot {
                index,
                name: self.name(index),
                mode: entry.mode.as_str(),
                value: effective_value(&entry.value),
            })
        })
    }

    fn bump(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }
}

fn effective_value(value: &PinValue) -> &str {
    if value.is_empty() {
        DEFAULT_VALUE
    } else {
        value.as_str()
    }
}
