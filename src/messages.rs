//! Wire messages exchanged with the dashboard server.
//!
//! Both transports carry the same JSON documents.
//!
//! # Device to server
//!
//! ```text
//! {"node_id":"mac-aabbccddeeff","full_sync":true,"description":"Lab bench","pins":{"GPIO4":{...}}}
//! ```
//!
//! Only `node_id` is always present; the other fields appear when the
//! corresponding send flag of [`DeviceSyncState`] is set.
//!
//! # Server to device
//!
//! ```text
//! {"status":"ok","node_id":"bench-1","description":"Lab bench","blink":true,"force_full_sync":true}
//! ```
//!
//! Anything other than `"status":"ok"` rejects the whole response.

use core::fmt::{self, Write};

use heapless::String as HString;
use serde::de::{self, Deserializer, Visitor};
use serde::Deserialize;

use crate::config::bounded;
use crate::error::{CapacityError, ProtocolError};
use crate::serializer::BoundedBuf;

/// Maximum node id length in bytes.
pub const MAX_NODE_ID: usize = 64;

/// Maximum description length in bytes.
pub const MAX_DESCRIPTION: usize = 128;

/// Capacity of an encoded request payload in bytes.
pub const PAYLOAD_CAPACITY: usize = 2048;

/// Device identity as known to the server.
pub type NodeId = HString<MAX_NODE_ID>;

/// Server-assigned free-form description.
pub type Description = HString<MAX_DESCRIPTION>;

/// Buffer holding one encoded request payload.
pub type Payload = BoundedBuf<PAYLOAD_CAPACITY>;

/// Build the default node id from a MAC address: `mac-` plus 12 lowercase
/// hex digits.
///
/// ```
/// use pin_mirror::messages::node_id_from_mac;
///
/// let id = node_id_from_mac([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
/// assert_eq!(id.as_str(), "mac-aabbccddeeff");
/// ```
pub fn node_id_from_mac(mac: [u8; 6]) -> NodeId {
    let mut id = NodeId::new();
    let _ = id.push_str("mac-");
    for byte in mac {
        let _ = write!(id, "{:02x}", byte);
    }
    id
}

// ============================================================================
// Outgoing
// ============================================================================

/// Everything one sync attempt intends to transmit.
///
/// Built fresh by the orchestrator for every cycle. Fields whose flag is
/// false are left out of the payload entirely.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceSyncState<'a> {
    /// Device identity, always sent.
    pub node_id: &'a str,
    /// Current description.
    pub description: &'a str,
    /// Serialized pins object.
    pub pins: &'a str,
    /// Mark this cycle as a server-requested full sync.
    pub send_full_sync: bool,
    /// Include `description`.
    pub send_desc: bool,
    /// Include `pins`.
    pub send_pins: bool,
}

impl<'a> DeviceSyncState<'a> {
    /// Identity-only payload used for the handshake.
    pub fn handshake(node_id: &'a str) -> Self {
        Self {
            node_id,
            description: "",
            pins: "",
            send_full_sync: false,
            send_desc: false,
            send_pins: false,
        }
    }

    /// Encode as JSON into `out`, replacing its contents.
    ///
    /// Fails with [`CapacityError`] if the payload does not fit; `out` is left
    /// empty in that case.
    pub fn encode<const N: usize>(&self, out: &mut BoundedBuf<N>) -> Result<(), CapacityError> {
        out.clear();
        let result = self.encode_into(out);
        if result.is_err() {
            out.clear();
        }
        result
    }

    fn encode_into<const N: usize>(&self, out: &mut BoundedBuf<N>) -> Result<(), CapacityError> {
        out.push_str("{\"node_id\":")?;
        out.push_json(self.node_id)?;
        if self.send_full_sync {
            out.push_str(",\"full_sync\":true")?;
        }
        if self.send_desc {
            out.push_str(",\"description\":")?;
            out.push_json(self.description)?;
        }
        if self.send_pins {
            out.push_str(",\"pins\":")?;
            // already a JSON object
            out.push_str(if self.pins.is_empty() { "{}" } else { self.pins })?;
        }
        out.push_str("}")
    }
}

// ============================================================================
// Incoming
// ============================================================================

/// Parsed, accepted server directive.
///
/// Only produced for responses with `"status":"ok"`; a rejected response
/// never becomes a `ServerCommand`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerCommand {
    /// The server acknowledged the sync.
    pub status_ok: bool,
    /// New node id, if the server assigned one.
    pub new_node_id: Option<NodeId>,
    /// New description, if the server assigned one.
    pub new_description: Option<Description>,
    /// Whether the device should blink its LED.
    pub should_blink: bool,
    /// Whether the next cycle must send everything.
    pub force_full_sync: bool,
}

impl Default for ServerCommand {
    fn default() -> Self {
        Self::ok()
    }
}

impl ServerCommand {
    /// A bare acknowledgement with no directives.
    pub fn ok() -> Self {
        Self {
            status_ok: true,
            new_node_id: None,
            new_description: None,
            should_blink: false,
            force_full_sync: false,
        }
    }

    /// Assign a new node id.
    pub fn with_node_id(mut self, node_id: &str) -> Self {
        self.new_node_id = non_empty(node_id);
        self
    }

    /// Assign a new description.
    pub fn with_description(mut self, description: &str) -> Self {
        self.new_description = non_empty(description);
        self
    }

    /// Request blinking.
    pub fn with_blink(mut self, blink: bool) -> Self {
        self.should_blink = blink;
        self
    }

    /// Request a full sync on the next cycle.
    pub fn with_force_full_sync(mut self, force: bool) -> Self {
        self.force_full_sync = force;
        self
    }

    /// Parse a response body.
    ///
    /// Unknown fields are ignored. Escape sequences in strings are decoded.
    /// Empty `node_id`/`description` strings read as "not specified".
    ///
    /// ```
    /// use pin_mirror::messages::ServerCommand;
    ///
    /// let cmd = ServerCommand::parse(br#"{"status":"ok","blink":true,"node_id":""}"#).unwrap();
    /// assert!(cmd.should_blink);
    /// assert_eq!(cmd.new_node_id, None);
    ///
    /// assert!(ServerCommand::parse(br#"{"status":"error"}"#).is_err());
    /// ```
    pub fn parse(body: &[u8]) -> Result<Self, ProtocolError> {
        let mut scratch = [0u8; UNESCAPE_CAPACITY];
        let (raw, _) = serde_json_core::from_slice_escaped::<RawResponse>(body, &mut scratch)
            .map_err(|_| ProtocolError::Malformed)?;

        match &raw.status {
            None => return Err(ProtocolError::MissingStatus),
            Some(status) if status.0.as_str() == "ok" => {}
            Some(_) => return Err(ProtocolError::Rejected),
        }

        Ok(Self {
            status_ok: true,
            new_node_id: raw.node_id.and_then(BoundedField::non_empty),
            new_description: raw.description.and_then(BoundedField::non_empty),
            should_blink: raw.blink.unwrap_or(false),
            force_full_sync: raw.force_full_sync.unwrap_or(false),
        })
    }
}

/// Room for one decoded string field that contains escape sequences.
const UNESCAPE_CAPACITY: usize = 4 * MAX_DESCRIPTION;

#[derive(Deserialize)]
struct RawResponse {
    #[serde(default)]
    status: Option<BoundedField<8>>,
    #[serde(default)]
    node_id: Option<BoundedField<MAX_NODE_ID>>,
    #[serde(default)]
    description: Option<BoundedField<MAX_DESCRIPTION>>,
    #[serde(default)]
    blink: Option<bool>,
    #[serde(default)]
    force_full_sync: Option<bool>,
}

fn non_empty<const N: usize>(s: &str) -> Option<HString<N>> {
    if s.is_empty() {
        None
    } else {
        Some(bounded(s))
    }
}

/// Decoded string field, truncated to `N` bytes on a UTF-8 boundary.
struct BoundedField<const N: usize>(HString<N>);

impl<const N: usize> BoundedField<N> {
    fn non_empty(self) -> Option<HString<N>> {
        if self.0.is_empty() {
            None
        } else {
            Some(self.0)
        }
    }
}

impl<'de, const N: usize> Deserialize<'de> for BoundedField<N> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FieldVisitor<const N: usize>;

        impl<'de, const N: usize> Visitor<'de> for FieldVisitor<N> {
            type Value = BoundedField<N>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a string")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(BoundedField(bounded(v)))
            }
        }

        deserializer.deserialize_str(FieldVisitor)
    }
}
