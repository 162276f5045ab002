//! Turning a [`PinRegistry`] snapshot into a size-bounded wire blob.
//!
//! The serializer owns iteration order and truncation; the wire encoding
//! lives behind [`PinsFormatter`], so a different encoding only needs a new
//! formatter.
//!
//! # Truncation
//!
//! Output goes into a fixed [`BoundedBuf`]. Before each pin the serializer
//! records a mark; if the entry does not fit while still leaving room for
//! the formatter's closing bytes, the partial entry is rolled back and
//! iteration stops. The structure is then closed, so a full buffer means
//! fewer pins, never a broken blob.
//!
//! # Example
//!
//! ```rust
//! use pin_mirror::pins::{PinMode, PinRegistry};
//! use pin_mirror::serializer::{JsonPinsFormatter, PinsBlob, StateSerializer};
//!
//! let mut pins = PinRegistry::new();
//! pins.register_pin(4, "Button", PinMode::Input);
//!
//! let serializer = StateSerializer::new(JsonPinsFormatter);
//! let mut blob = PinsBlob::new();
//! let report = serializer.serialize(&pins, &mut blob);
//!
//! assert_eq!(blob.as_str(), r#"{"GPIO4":{"n":"Button","m":"input","v":"0"}}"#);
//! assert_eq!(report.pins_written, 1);
//! assert!(!report.truncated);
//! ```

use core::fmt::{self, Write};

use serde::Serialize;

use crate::error::CapacityError;
use crate::pins::{PinRegistry, PinSnapshot};

/// Capacity of a serialized pins blob in bytes.
pub const PINS_BLOB_CAPACITY: usize = 768;

/// Buffer holding one serialized registry snapshot.
pub type PinsBlob = BoundedBuf<PINS_BLOB_CAPACITY>;

// ============================================================================
// Bounded builder
// ============================================================================

/// Fixed-capacity text builder.
///
/// Every append either fits completely or leaves the buffer untouched and
/// returns [`CapacityError`]. Contents are always valid UTF-8.
#[derive(Clone)]
pub struct BoundedBuf<const N: usize> {
    bytes: [u8; N],
    len: usize,
}

impl<const N: usize> BoundedBuf<N> {
    /// Create an empty buffer.
    pub const fn new() -> Self {
        Self {
            bytes: [0; N],
            len: 0,
        }
    }

    /// Total capacity in bytes.
    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Bytes written so far.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether nothing has been written.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes still available.
    #[inline]
    pub fn remaining(&self) -> usize {
        N - self.len
    }

    /// Discard all contents.
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Append raw text.
    pub fn push_str(&mut self, s: &str) -> Result<(), CapacityError> {
        let end = self.len + s.len();
        if end > N {
            return Err(CapacityError);
        }
        self.bytes[self.len..end].copy_from_slice(s.as_bytes());
        self.len = end;
        Ok(())
    }

    /// Append `value` encoded as JSON (strings are quoted and escaped).
    pub fn push_json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), CapacityError> {
        let written = serde_json_core::to_slice(value, &mut self.bytes[self.len..])
            .map_err(|_| CapacityError)?;
        self.len += written;
        Ok(())
    }

    /// Current write position, for a later [`rollback`](Self::rollback).
    #[inline]
    pub fn mark(&self) -> usize {
        self.len
    }

    /// Drop everything written after `mark`.
    pub fn rollback(&mut self, mark: usize) {
        if mark < self.len {
            self.len = mark;
        }
    }

    /// Contents as a string slice.
    pub fn as_str(&self) -> &str {
        // Only whole `&str`s and serde-json-core output are ever appended.
        core::str::from_utf8(&self.bytes[..self.len]).unwrap_or("")
    }

    /// Contents as bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

impl<const N: usize> Default for BoundedBuf<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> PartialEq for BoundedBuf<N> {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl<const N: usize> Eq for BoundedBuf<N> {}

impl<const N: usize> fmt::Debug for BoundedBuf<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BoundedBuf").field(&self.as_str()).finish()
    }
}

impl<const N: usize> fmt::Write for BoundedBuf<N> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.push_str(s).map_err(|_| fmt::Error)
    }
}

// ============================================================================
// Formatter strategy
// ============================================================================

/// Wire encoding hooks used by [`StateSerializer`].
///
/// Implementations write into the blob and report [`CapacityError`] when an
/// append does not fit; the serializer handles rollback.
pub trait PinsFormatter {
    /// Open the enclosing structure.
    fn begin(&self, out: &mut PinsBlob) -> Result<(), CapacityError>;

    /// Write one pin entry. `first` is true for the first entry written.
    fn pin(&self, out: &mut PinsBlob, pin: &PinSnapshot<'_>, first: bool)
        -> Result<(), CapacityError>;

    /// Close the enclosing structure.
    fn end(&self, out: &mut PinsBlob) -> Result<(), CapacityError>;

    /// Bytes [`end`](Self::end) needs; kept free while entries are added.
    fn closing_len(&self) -> usize;
}

/// Compact JSON object keyed `GPIO<N>` with abbreviated fields:
/// `{"GPIO4":{"n":"Button","m":"input","v":"0"}}`.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonPinsFormatter;

#[derive(Serialize)]
struct PinFields<'a> {
    n: &'a str,
    m: &'a str,
    v: &'a str,
}

impl PinsFormatter for JsonPinsFormatter {
    fn begin(&self, out: &mut PinsBlob) -> Result<(), CapacityError> {
        out.push_str("{")
    }

    fn pin(
        &self,
        out: &mut PinsBlob,
        pin: &PinSnapshot<'_>,
        first: bool,
    ) -> Result<(), CapacityError> {
        if !first {
            out.push_str(",")?;
        }
        write!(out, "\"GPIO{}\":", pin.index).map_err(|_| CapacityError)?;
        out.push_json(&PinFields {
            n: pin.name.as_str(),
            m: pin.mode,
            v: pin.value,
        })
    }

    fn end(&self, out: &mut PinsBlob) -> Result<(), CapacityError> {
        out.push_str("}")
    }

    fn closing_len(&self) -> usize {
        1
    }
}

// ============================================================================
// Serializer
// ============================================================================

/// Outcome of one [`StateSerializer::serialize`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct SerializeReport {
    /// Number of pin entries in the blob.
    pub pins_written: usize,
    /// Whether configured pins were left out for lack of space.
    pub truncated: bool,
}

/// Deterministic registry serializer with a pluggable encoding.
#[derive(Clone, Debug, Default)]
pub struct StateSerializer<F: PinsFormatter = JsonPinsFormatter> {
    formatter: F,
}

impl<F: PinsFormatter> StateSerializer<F> {
    /// Create a serializer using `formatter`.
    pub fn new(formatter: F) -> Self {
        Self { formatter }
    }

    /// Serialize all configured pins in ascending index order into `out`,
    /// replacing its contents.
    pub fn serialize(&self, pins: &PinRegistry, out: &mut PinsBlob) -> SerializeReport {
        out.clear();
        let mut report = SerializeReport::default();
        let reserve = self.formatter.closing_len();

        if self.formatter.begin(out).is_err() || out.remaining() < reserve {
            // Nothing sensible fits; leave an empty blob rather than a broken one.
            out.clear();
            report.truncated = pins.configured_pins().next().is_some();
            return report;
        }

        for pin in pins.configured_pins() {
            let mark = out.mark();
            let fits = self
                .formatter
                .pin(out, &pin, report.pins_written == 0)
                .is_ok()
                && out.remaining() >= reserve;

            if !fits {
                out.rollback(mark);
                report.truncated = true;
                log::warn!(
                    "pins blob full, dropped GPIO{} and later pins ({} written)",
                    pin.index,
                    report.pins_written
                );
                break;
            }
            report.pins_written += 1;
        }

        // Room for the closing bytes was reserved above.
        let _ = self.formatter.end(out);
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pins::{PinMode, MAX_PINS};

    fn sample_registry() -> PinRegistry {
        let mut pins = PinRegistry::new();
        pins.register_pin(4, "Button", PinMode::Input);
        pins.register_pin(11, "LED", PinMode::Output);
        pins.set_value_string(11, "On");
        pins
    }

    #[test]
    fn bounded_buf_push_is_all_or_nothing() {
        let mut buf: BoundedBuf<4> = BoundedBuf::new();
        buf.push_str("ab").unwrap();
        assert_eq!(buf.push_str("cde"), Err(CapacityError));
        assert_eq!(buf.as_str(), "ab");
        buf.push_str("cd").unwrap();
        assert_eq!(buf.remaining(), 0);
    }

    #[test]
    fn bounded_buf_push_json_escapes() {
        let mut buf: BoundedBuf<32> = BoundedBuf::new();
        buf.push_json("say \"hi\"").unwrap();
        assert_eq!(buf.as_str(), r#""say \"hi\"""#);
    }

    #[test]
    fn bounded_buf_rollback() {
        let mut buf: BoundedBuf<16> = BoundedBuf::new();
        buf.push_str("{").unwrap();
        let mark = buf.mark();
        buf.push_str("\"partial").unwrap();
        buf.rollback(mark);
        assert_eq!(buf.as_str(), "{");
    }

    #[test]
    fn empty_registry_serializes_to_empty_object() {
        let pins = PinRegistry::new();
        let mut blob = PinsBlob::new();
        let report = StateSerializer::new(JsonPinsFormatter).serialize(&pins, &mut blob);
        assert_eq!(blob.as_str(), "{}");
        assert_eq!(report.pins_written, 0);
        assert!(!report.truncated);
    }

    #[test]
    fn serializes_configured_pins_in_order() {
        let pins = sample_registry();
        let mut blob = PinsBlob::new();
        StateSerializer::new(JsonPinsFormatter).serialize(&pins, &mut blob);
        assert_eq!(
            blob.as_str(),
            r#"{"GPIO4":{"n":"Button","m":"input","v":"0"},"GPIO11":{"n":"LED","m":"output","v":"On"}}"#
        );
    }

    #[test]
    fn serialize_is_idempotent() {
        let pins = sample_registry();
        let serializer = StateSerializer::new(JsonPinsFormatter);
        let mut first = PinsBlob::new();
        let mut second = PinsBlob::new();
        serializer.serialize(&pins, &mut first);
        serializer.serialize(&pins, &mut second);
        assert_eq!(first, second);
    }

    #[test]
    fn round_trip_through_json_parser() {
        let pins = sample_registry();
        let mut blob = PinsBlob::new();
        StateSerializer::new(JsonPinsFormatter).serialize(&pins, &mut blob);

        let parsed: serde_json::Value = serde_json::from_str(blob.as_str()).unwrap();
        let obj = parsed.as_object().unwrap();
        assert_eq!(obj.len(), 2);
        assert_eq!(obj["GPIO4"]["m"], "input");
        assert_eq!(obj["GPIO4"]["v"], "0");
        assert_eq!(obj["GPIO11"]["m"], "output");
        assert_eq!(obj["GPIO11"]["v"], "On");
    }

    #[test]
    fn names_with_quotes_stay_valid_json() {
        let mut pins = PinRegistry::new();
        pins.register_pin(1, "say \"hi\"", PinMode::Input);
        pins.set_value_string(1, "a\\b");

        let mut blob = PinsBlob::new();
        StateSerializer::new(JsonPinsFormatter).serialize(&pins, &mut blob);
        let parsed: serde_json::Value = serde_json::from_str(blob.as_str()).unwrap();
        assert_eq!(parsed["GPIO1"]["n"], "say \"hi\"");
        assert_eq!(parsed["GPIO1"]["v"], "a\\b");
    }

    #[test]
    fn full_registry_truncates_but_stays_valid() {
        let mut pins = PinRegistry::new();
        for index in 0..MAX_PINS as u8 {
            pins.register_pin(index, "ABCDEFGHIJKLMNO", PinMode::PullDown);
            pins.set_value_string(index, "0123456789012345678901234567890");
        }

        let mut blob = PinsBlob::new();
        let report = StateSerializer::new(JsonPinsFormatter).serialize(&pins, &mut blob);

        assert!(report.truncated);
        assert!(report.pins_written > 0);
        assert!(report.pins_written < MAX_PINS);
        assert!(blob.len() <= PINS_BLOB_CAPACITY);

        let parsed: serde_json::Value = serde_json::from_str(blob.as_str()).unwrap();
        assert_eq!(parsed.as_object().unwrap().len(), report.pins_written);
        // lowest indices survive
        assert!(parsed.get("GPIO0").is_some());
    }

    struct PipeFormatter;

    impl PinsFormatter for PipeFormatter {
        fn begin(&self, out: &mut PinsBlob) -> Result<(), CapacityError> {
            out.push_str("[")
        }

        fn pin(
            &self,
            out: &mut PinsBlob,
            pin: &PinSnapshot<'_>,
            first: bool,
        ) -> Result<(), CapacityError> {
            if !first {
                out.push_str("|")?;
            }
            write!(out, "{}={}", pin.index, pin.value).map_err(|_| CapacityError)
        }

        fn end(&self, out: &mut PinsBlob) -> Result<(), CapacityError> {
            out.push_str("]")
        }

        fn closing_len(&self) -> usize {
            1
        }
    }

    #[test]
    fn custom_formatter_reuses_iteration() {
        let pins = sample_registry();
        let mut blob = PinsBlob::new();
        StateSerializer::new(PipeFormatter).serialize(&pins, &mut blob);
        assert_eq!(blob.as_str(), "[4=0|11=On]");
    }
}
