//! [`MqttClient`] backed by `rumqttc` (desktop and other `std` targets).
//!
//! `rumqttc` drives its event loop through a blocking iterator, so each
//! connection gets a background thread that forwards publishes over a
//! channel and flips a shared `connected` flag on CONNACK and on errors.
//! The control loop only ever polls.
//!
//! ```ignore
//! use pin_mirror::config::MqttConfig;
//! use pin_mirror::hal::RumqttClient;
//! use pin_mirror::traits::MqttClient;
//!
//! let mut mqtt = RumqttClient::new(&MqttConfig::default());
//! mqtt.connect("192.168.0.10", 1883)?;
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};
use rumqttc::{Client, Connection, Event, Incoming, MqttOptions, QoS};

use crate::config::MqttConfig;
use crate::traits::{MqttClient, MqttMessage};

/// Request queue depth between the client handle and its event loop.
const REQUEST_CAPACITY: usize = 10;

/// MQTT-related errors.
#[derive(Debug)]
pub enum MqttError {
    /// Not connected to a broker.
    NotConnected,
    /// Failed to subscribe to topic.
    Subscribe(String),
    /// Failed to publish message.
    Publish(String),
}

impl core::fmt::Display for MqttError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            MqttError::NotConnected => write!(f, "MQTT client not connected"),
            MqttError::Subscribe(e) => write!(f, "MQTT subscribe failed: {}", e),
            MqttError::Publish(e) => write!(f, "MQTT publish failed: {}", e),
        }
    }
}

impl std::error::Error for MqttError {}

struct Session {
    client: Client,
    messages: Receiver<MqttMessage>,
    connected: Arc<AtomicBool>,
}

/// Blocking-iterator `rumqttc` client.
pub struct RumqttClient {
    client_id: String,
    credentials: Option<(String, String)>,
    keep_alive: Duration,
    session: Option<Session>,
}

impl RumqttClient {
    /// Create an unconnected client from configuration.
    pub fn new(config: &MqttConfig) -> Self {
        let credentials = config.has_auth().then(|| {
            (
                config.username.as_str().to_string(),
                config.password.as_str().to_string(),
            )
        });
        Self {
            client_id: config.client_id.as_str().to_string(),
            credentials,
            keep_alive: Duration::from_secs(u64::from(config.keep_alive_secs.max(5))),
            session: None,
        }
    }

    fn session_mut(&mut self) -> Result<&mut Session, MqttError> {
        self.session.as_mut().ok_or(MqttError::NotConnected)
    }
}

impl MqttClient for RumqttClient {
    type Error = MqttError;

    fn connect(&mut self, host: &str, port: u16) -> Result<(), Self::Error> {
        self.disconnect();

        let mut options = MqttOptions::new(&self.client_id, host, port);
        options.set_keep_alive(self.keep_alive);
        if let Some((username, password)) = &self.credentials {
            options.set_credentials(username, password);
        }

        let (client, connection) = Client::new(options, REQUEST_CAPACITY);
        let (tx, rx) = channel();
        let connected = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&connected);
        thread::spawn(move || run_event_loop(connection, tx, flag));

        debug!("MQTT event loop started for {}:{}", host, port);
        self.session = Some(Session {
            client,
            messages: rx,
            connected,
        });
        Ok(())
    }

    fn disconnect(&mut self) {
        if let Some(session) = self.session.take() {
            session.connected.store(false, Ordering::SeqCst);
            // The event loop thread exits once its connection errors out.
            let _ = session.client.try_disconnect();
        }
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), Self::Error> {
        self.session_mut()?
            .client
            .try_publish(topic, QoS::AtMostOnce, retain, payload.to_vec())
            .map_err(|e| MqttError::Publish(e.to_string()))
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), Self::Error> {
        self.session_mut()?
            .client
            .try_subscribe(topic, QoS::AtMostOnce)
            .map_err(|e| MqttError::Subscribe(e.to_string()))
    }

    fn try_recv(&mut self) -> Option<MqttMessage> {
        let session = self.session.as_mut()?;
        match session.messages.try_recv() {
            Ok(msg) => Some(msg),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                session.connected.store(false, Ordering::SeqCst);
                None
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.session
            .as_ref()
            .map(|s| s.connected.load(Ordering::SeqCst))
            .unwrap_or(false)
    }
}

impl Drop for RumqttClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}

fn run_event_loop(mut connection: Connection, tx: Sender<MqttMessage>, connected: Arc<AtomicBool>) {
    for notification in connection.iter() {
        match notification {
            Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                info!("MQTT connected");
                connected.store(true, Ordering::SeqCst);
            }
            Ok(Event::Incoming(Incoming::Publish(publish))) => {
                let msg = MqttMessage::new(publish.topic.clone(), publish.payload.to_vec());
                if tx.send(msg).is_err() {
                    break;
                }
            }
            Ok(Event::Incoming(Incoming::Disconnect)) => {
                connected.store(false, Ordering::SeqCst);
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("MQTT connection error: {}", e);
                connected.store(false, Ordering::SeqCst);
                break;
            }
        }
    }
    debug!("MQTT event loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_disconnected() {
        let mut client = RumqttClient::new(&MqttConfig::default());
        assert!(!client.is_connected());
        assert!(client.try_recv().is_none());
        assert!(matches!(
            client.publish("t", b"x", false),
            Err(MqttError::NotConnected)
        ));
    }

    #[test]
    fn credentials_only_when_configured() {
        let client = RumqttClient::new(&MqttConfig::default());
        assert!(client.credentials.is_none());

        let client = RumqttClient::new(&MqttConfig::default().with_auth("user", "pw"));
        assert_eq!(
            client.credentials,
            Some(("user".to_string(), "pw".to_string()))
        );
    }
}
