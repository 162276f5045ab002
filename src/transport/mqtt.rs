//! Publish/subscribe transport over MQTT.
//!
//! The payload is published fire-and-forget on the publish topic. Server
//! directives arrive on the subscribe topic whenever the server gets to them,
//! usually after the `sync` call that triggered them has returned, so each
//! call reports whatever directive is waiting at that moment:
//!
//! - no message: [`SyncReply::NoDirective`], still a successful send
//! - messages on other topics: discarded
//! - several matching messages: only the newest is applied
//!
//! # Connection handling
//!
//! The transport owns the broker connection. While the client is down each
//! call fails with [`TransportError::Connecting`]; the first such call starts
//! an attempt. An attempt older than the configured timeout is abandoned
//! with [`TransportError::Timeout`] and the next call starts over.

use log::{debug, info, warn};

use crate::config::{LongString, MqttConfig};
use crate::error::{SyncError, TransportError};
use crate::messages::{DeviceSyncState, Payload, ServerCommand};
use crate::traits::{Clock, Endpoint, MqttClient, MqttMessage, SyncReply, SyncTransport};

/// MQTT sync transport.
///
/// # Example
///
/// ```rust
/// use pin_mirror::config::MqttConfig;
/// use pin_mirror::hal::{MockClock, MockMqtt};
/// use pin_mirror::messages::DeviceSyncState;
/// use pin_mirror::traits::{Endpoint, SyncReply, SyncTransport};
/// use pin_mirror::transport::MqttTransport;
///
/// let clock = MockClock::new();
/// let mut mqtt = MqttTransport::new(MockMqtt::new(), &clock, &MqttConfig::default());
/// let broker = Endpoint::new("192.168.0.10", 1883);
///
/// let reply = mqtt.sync(&broker, &DeviceSyncState::handshake("n1")).unwrap();
/// assert_eq!(reply, SyncReply::NoDirective);
/// ```
pub struct MqttTransport<C: MqttClient, K: Clock> {
    client: C,
    clock: K,
    publish_topic: LongString,
    subscribe_topic: LongString,
    connect_timeout_ms: u32,
    connecting_since: Option<u64>,
    subscribed: bool,
    payload: Payload,
}

impl<C: MqttClient, K: Clock> MqttTransport<C, K> {
    /// Create a transport using the topics and timeout from `config`.
    pub fn new(client: C, clock: K, config: &MqttConfig) -> Self {
        Self {
            client,
            clock,
            publish_topic: config.publish_topic.clone(),
            subscribe_topic: config.subscribe_topic.clone(),
            connect_timeout_ms: config.connect_timeout_ms,
            connecting_since: None,
            subscribed: false,
            payload: Payload::new(),
        }
    }

    /// The underlying client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Mutable access to the underlying client.
    pub fn client_mut(&mut self) -> &mut C {
        &mut self.client
    }

    /// Whether a connection attempt is in progress.
    pub fn is_connecting(&self) -> bool {
        self.connecting_since.is_some()
    }

    /// Make sure the client is connected and subscribed.
    fn ensure_ready(&mut self, endpoint: &Endpoint) -> Result<(), TransportError> {
        if !self.client.is_connected() {
            self.subscribed = false;
            self.poll_connect(endpoint)?;
        }
        self.connecting_since = None;

        if !self.subscribed {
            self.client
                .subscribe(self.subscribe_topic.as_str())
                .map_err(|e| {
                    warn!("subscribe to {} failed: {:?}", self.subscribe_topic, e);
                    TransportError::Send
                })?;
            self.subscribed = true;
            debug!("subscribed to {}", self.subscribe_topic);
        }
        Ok(())
    }

    /// Drive the connection attempt. `Ok` only once the client is connected.
    fn poll_connect(&mut self, endpoint: &Endpoint) -> Result<(), TransportError> {
        let now = self.clock.now_ms();

        match self.connecting_since {
            None => {
                info!("connecting to broker {}:{}", endpoint.host, endpoint.port);
                self.client
                    .connect(endpoint.host.as_str(), endpoint.port)
                    .map_err(|e| {
                        warn!("broker connect failed: {:?}", e);
                        TransportError::Connect
                    })?;
                self.connecting_since = Some(now);
            }
            Some(started) if now.saturating_sub(started) >= u64::from(self.connect_timeout_ms) => {
                warn!(
                    "broker connect timed out after {} ms, retrying",
                    now.saturating_sub(started)
                );
                self.client.disconnect();
                self.connecting_since = None;
                return Err(TransportError::Timeout);
            }
            Some(_) => {}
        }

        if self.client.is_connected() {
            info!("connected to broker");
            Ok(())
        } else {
            Err(TransportError::Connecting)
        }
    }

    /// Drain the inbox, keeping the newest message on our topic.
    fn take_directive(&mut self) -> Option<MqttMessage> {
        let mut latest = None;
        while let Some(message) = self.client.try_recv() {
            if message.topic == self.subscribe_topic.as_str() {
                if latest.is_some() {
                    debug!("superseded directive dropped");
                }
                latest = Some(message);
            } else {
                debug!(
                    "discarding message on {}: {}",
                    message.topic,
                    message.payload_str().unwrap_or("<binary>")
                );
            }
        }
        latest
    }
}

impl<C: MqttClient, K: Clock> SyncTransport for MqttTransport<C, K> {
    fn sync(
        &mut self,
        endpoint: &Endpoint,
        state: &DeviceSyncState<'_>,
    ) -> Result<SyncReply, SyncError> {
        self.ensure_ready(endpoint)?;
        state.encode(&mut self.payload)?;

        self.client
            .publish(self.publish_topic.as_str(), self.payload.as_bytes(), false)
            .map_err(|e| {
                warn!("publish to {} failed: {:?}", self.publish_topic, e);
                TransportError::Send
            })?;
        debug!(
            "published {} bytes to {}",
            self.payload.len(),
            self.publish_topic
        );

        match self.take_directive() {
            None => Ok(SyncReply::NoDirective),
            Some(message) => Ok(SyncReply::Command(ServerCommand::parse(&message.payload)?)),
        }
    }
}
