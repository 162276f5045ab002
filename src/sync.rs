//! The synchronization state machine.
//!
//! [`SyncOrchestrator`] decides when to talk to the dashboard and what to
//! send, and applies the directives that come back.
//!
//! # Phases
//!
//! ```text
//!                link up                 handshake ok
//! Disconnected ─────────► AwaitingHandshake ─────────► Synchronized
//!      ▲                                                    │
//!      └──────────────── link down / failed cycle ─────────┘
//! ```
//!
//! - **Handshake**: the first exchange carries only `node_id`. When it is
//!   acknowledged, the current description and pins blob become the diff
//!   baselines without being transmitted.
//! - **Steady state**: description and pins are sent only when they differ
//!   from what the server last acknowledged, or when the server asked for a
//!   full sync on the previous cycle.
//! - **Failure**: the cycle is a no-op apart from clearing `connected`. The
//!   same delta goes out again on the next due cycle.
//!
//! # Timing
//!
//! Each [`update`](SyncOrchestrator::update) adds the elapsed time to an
//! accumulator. A cycle runs when the accumulator reaches the interval, and
//! the interval (not the whole accumulator) is subtracted afterwards.
//!
//! # Example
//!
//! ```rust
//! use pin_mirror::hal::{MockLink, ScriptedTransport};
//! use pin_mirror::pins::{PinMode, PinRegistry};
//! use pin_mirror::sync::{SyncOrchestrator, SyncPhase};
//! use pin_mirror::traits::Endpoint;
//!
//! let mut pins = PinRegistry::new();
//! pins.register_pin(4, "Button", PinMode::Input);
//!
//! let transport = ScriptedTransport::always_ok();
//! let mut sync = SyncOrchestrator::new(transport, Endpoint::new("10.0.0.2", 80), "mac-aabbccddeeff", 25);
//! let link = MockLink::up();
//!
//! assert!(!sync.update(10, &pins, &link)); // not due yet
//! assert!(sync.update(15, &pins, &link)); // handshake
//! assert_eq!(sync.phase(&link), SyncPhase::Synchronized);
//! ```

use log::{debug, info, warn};

use crate::config::bounded;
use crate::messages::{Description, DeviceSyncState, NodeId, ServerCommand};
use crate::pins::PinRegistry;
use crate::serializer::{JsonPinsFormatter, PinsBlob, PinsFormatter, StateSerializer};
use crate::traits::{Endpoint, LinkMonitor, SyncReply, SyncTransport};

/// Where the orchestrator is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncPhase {
    /// No link, or the last cycle failed after the handshake.
    Disconnected,
    /// Link is up but the server has not acknowledged our identity yet.
    AwaitingHandshake,
    /// Handshake done and the last cycle succeeded.
    Synchronized,
}

/// Sync state that lives for the device's uptime.
#[derive(Clone, Debug)]
pub struct SyncSession {
    /// Identity sent with every payload.
    pub node_id: NodeId,
    /// Current description (server-assigned).
    pub description: Description,
    /// Description the server last acknowledged.
    pub last_sent_description: Description,
    /// Pins blob the server last acknowledged.
    pub last_sent_pins: PinsBlob,
    /// Identity handshake acknowledged.
    pub handshake_done: bool,
    /// Next cycle must send everything.
    pub pending_force_full_sync: bool,
    /// Last due cycle succeeded.
    pub connected: bool,
    /// Server asked for blinking.
    pub should_blink: bool,
    /// Time banked towards the next cycle.
    pub time_accumulator_ms: i64,
}

impl SyncSession {
    /// Fresh session for `node_id`.
    pub fn new(node_id: &str) -> Self {
        Self {
            node_id: bounded(node_id),
            description: Description::new(),
            last_sent_description: Description::new(),
            last_sent_pins: PinsBlob::new(),
            handshake_done: false,
            pending_force_full_sync: false,
            connected: false,
            should_blink: false,
            time_accumulator_ms: 0,
        }
    }
}

/// What one cycle decided to send.
#[derive(Clone, Copy, Debug)]
struct CyclePlan {
    handshake: bool,
    full_sync: bool,
    send_desc: bool,
    send_pins: bool,
}

/// Drives periodic sync cycles over a [`SyncTransport`].
pub struct SyncOrchestrator<T: SyncTransport, F: PinsFormatter = JsonPinsFormatter> {
    transport: T,
    endpoint: Endpoint,
    serializer: StateSerializer<F>,
    session: SyncSession,
    update_interval_ms: i64,
    pins_blob: PinsBlob,
    blob_revision: Option<u32>,
}

impl<T: SyncTransport> SyncOrchestrator<T> {
    /// Create an orchestrator using the default JSON pin encoding.
    pub fn new(transport: T, endpoint: Endpoint, node_id: &str, update_interval_ms: u32) -> Self {
        Self::with_serializer(
            transport,
            endpoint,
            node_id,
            update_interval_ms,
            StateSerializer::default(),
        )
    }
}

impl<T: SyncTransport, F: PinsFormatter> SyncOrchestrator<T, F> {
    /// Create an orchestrator with a custom serializer.
    pub fn with_serializer(
        transport: T,
        endpoint: Endpoint,
        node_id: &str,
        update_interval_ms: u32,
        serializer: StateSerializer<F>,
    ) -> Self {
        Self {
            transport,
            endpoint,
            serializer,
            session: SyncSession::new(node_id),
            update_interval_ms: i64::from(update_interval_ms.max(1)),
            pins_blob: PinsBlob::new(),
            blob_revision: None,
        }
    }

    /// Advance time by `elapsed_ms` and run a sync cycle if one is due.
    ///
    /// Non-positive `elapsed_ms` is ignored. Returns whether the device is
    /// considered connected.
    pub fn update<L: LinkMonitor + ?Sized>(
        &mut self,
        elapsed_ms: i64,
        pins: &PinRegistry,
        link: &L,
    ) -> bool {
        if elapsed_ms <= 0 {
            return self.session.connected;
        }

        let session = &mut self.session;
        session.time_accumulator_ms = session.time_accumulator_ms.saturating_add(elapsed_ms);
        if session.time_accumulator_ms < self.update_interval_ms {
            return session.connected;
        }
        session.time_accumulator_ms -= self.update_interval_ms;

        if !link.is_link_up() {
            if session.connected {
                info!("link down");
            }
            session.connected = false;
            session.should_blink = false;
            return false;
        }

        self.refresh_blob(pins);
        self.run_cycle();
        self.session.connected
    }

    /// Re-serialize only when the registry changed since the last cycle.
    fn refresh_blob(&mut self, pins: &PinRegistry) {
        let revision = pins.revision();
        if self.blob_revision == Some(revision) {
            return;
        }
        let report = self.serializer.serialize(pins, &mut self.pins_blob);
        self.blob_revision = Some(revision);
        debug!(
            "pins re-serialized at revision {} ({} pins, {} bytes)",
            revision,
            report.pins_written,
            self.pins_blob.len()
        );
    }

    fn plan(&self) -> CyclePlan {
        let session = &self.session;
        if !session.handshake_done {
            return CyclePlan {
                handshake: true,
                full_sync: false,
                send_desc: false,
                send_pins: false,
            };
        }

        let full_sync = session.pending_force_full_sync;
        CyclePlan {
            handshake: false,
            full_sync,
            send_desc: full_sync || session.description != session.last_sent_description,
            send_pins: full_sync || self.pins_blob != session.last_sent_pins,
        }
    }

    fn run_cycle(&mut self) {
        let plan = self.plan();
        let state = DeviceSyncState {
            node_id: self.session.node_id.as_str(),
            description: self.session.description.as_str(),
            pins: self.pins_blob.as_str(),
            send_full_sync: plan.full_sync,
            send_desc: plan.send_desc,
            send_pins: plan.send_pins,
        };

        match self.transport.sync(&self.endpoint, &state) {
            Ok(reply) => self.on_success(plan, reply),
            Err(e) => {
                // Repeated transport failures while offline are expected.
                if self.session.connected || !e.is_transport() {
                    warn!("sync failed: {}", e);
                } else {
                    debug!("sync failed: {}", e);
                }
                self.session.connected = false;
            }
        }
    }

    fn on_success(&mut self, plan: CyclePlan, reply: SyncReply) {
        if !self.session.connected {
            info!("dashboard reachable");
        }
        self.session.connected = true;

        if plan.handshake {
            // Baselines take the description as amended by this response.
            self.apply(reply.command());
            let session = &mut self.session;
            session.handshake_done = true;
            session.last_sent_description = session.description.clone();
            session.last_sent_pins = self.pins_blob.clone();
            info!("handshake complete as {}", session.node_id);
        } else {
            if plan.full_sync {
                self.session.pending_force_full_sync = false;
            }
            // A rename answering a description we just sent is not echoed.
            self.apply(reply.command());
            let session = &mut self.session;
            if plan.send_desc {
                session.last_sent_description = session.description.clone();
            }
            if plan.send_pins {
                session.last_sent_pins = self.pins_blob.clone();
            }
        }

        debug!(
            "node {} description {:?} blink {}",
            self.session.node_id, self.session.description, self.session.should_blink
        );
    }

    fn apply(&mut self, command: Option<&ServerCommand>) {
        let Some(command) = command else {
            return;
        };
        let session = &mut self.session;

        if let Some(node_id) = &command.new_node_id {
            if *node_id != session.node_id {
                info!("server renamed node {} -> {}", session.node_id, node_id);
            }
            session.node_id = node_id.clone();
        }
        if let Some(description) = &command.new_description {
            session.description = description.clone();
        }
        session.should_blink = command.should_blink;
        if command.force_full_sync {
            debug!("full sync requested for next cycle");
            session.pending_force_full_sync = true;
        }
    }

    /// Whether the last due cycle succeeded.
    pub fn is_connected(&self) -> bool {
        self.session.connected
    }

    /// Whether the LED should blink: connected and requested by the server.
    pub fn should_blink(&self) -> bool {
        self.session.connected && self.session.should_blink
    }

    /// Current lifecycle phase given the link state.
    pub fn phase<L: LinkMonitor + ?Sized>(&self, link: &L) -> SyncPhase {
        if self.session.connected && self.session.handshake_done {
            SyncPhase::Synchronized
        } else if link.is_link_up() && !self.session.handshake_done {
            SyncPhase::AwaitingHandshake
        } else {
            SyncPhase::Disconnected
        }
    }

    /// Session state.
    pub fn session(&self) -> &SyncSession {
        &self.session
    }

    /// Cached serialized pins.
    pub fn pins_blob(&self) -> &str {
        self.pins_blob.as_str()
    }

    /// Dashboard address.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// The transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutable access to the transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}
