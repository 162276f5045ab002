//! MQTT client for ESP32.
//!
//! Wraps `esp-idf-svc`'s client behind [`MqttClient`]. `connect` only
//! creates the client; the connection thread reports CONNACK and drops
//! through a shared flag, and received publishes through a channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use esp_idf_svc::mqtt::client::{
    EspMqttClient, EspMqttConnection, EventPayload, MqttClientConfiguration, QoS,
};
use log::{debug, info, warn};

use crate::config::MqttConfig;
use crate::traits::{MqttClient, MqttMessage};

/// Error type for ESP32 MQTT operations.
#[derive(Debug)]
pub struct Esp32MqttError(pub String);

impl core::fmt::Display for Esp32MqttError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "MQTT error: {}", self.0)
    }
}

/// ESP-IDF MQTT client.
pub struct Esp32Mqtt {
    config: MqttConfig,
    client: Option<EspMqttClient<'static>>,
    message_rx: Option<Receiver<MqttMessage>>,
    connected: Arc<AtomicBool>,
}

impl Esp32Mqtt {
    /// Create an unconnected client.
    pub fn new(config: &MqttConfig) -> Self {
        Self {
            config: config.clone(),
            client: None,
            message_rx: None,
            connected: Arc::new(AtomicBool::new(false)),
        }
    }

    fn client_mut(&mut self) -> Result<&mut EspMqttClient<'static>, Esp32MqttError> {
        self.client
            .as_mut()
            .ok_or_else(|| Esp32MqttError("not connected".into()))
    }
}

impl MqttClient for Esp32Mqtt {
    type Error = Esp32MqttError;

    fn connect(&mut self, host: &str, port: u16) -> Result<(), Self::Error> {
        self.disconnect();

        let broker_url = format!("mqtt://{}:{}", host, port);
        let username = self.config.has_auth().then(|| self.config.username.as_str());
        let password = self.config.has_auth().then(|| self.config.password.as_str());
        let mqtt_config = MqttClientConfiguration {
            client_id: Some(self.config.client_id.as_str()),
            username,
            password,
            keep_alive_interval: Some(Duration::from_secs(u64::from(
                self.config.keep_alive_secs,
            ))),
            ..Default::default()
        };

        let (client, mut connection) = EspMqttClient::new(&broker_url, &mqtt_config)
            .map_err(|e| Esp32MqttError(format!("{:?}", e)))?;

        // Fresh flag per connection so a stale thread cannot flip it.
        let connected = Arc::new(AtomicBool::new(false));
        let (message_tx, message_rx) = channel::<MqttMessage>();
        let flag = Arc::clone(&connected);
        thread::Builder::new()
            .stack_size(6 * 1024)
            .spawn(move || handle_mqtt_events(&mut connection, message_tx, flag))
            .map_err(|e| Esp32MqttError(format!("{:?}", e)))?;

        debug!("MQTT client created for {}", broker_url);
        self.client = Some(client);
        self.message_rx = Some(message_rx);
        self.connected = connected;
        Ok(())
    }

    fn disconnect(&mut self) {
        self.connected.store(false, Ordering::SeqCst);
        self.message_rx = None;
        // Dropping the client stops the connection and ends the event thread.
        self.client = None;
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), Self::Error> {
        self.client_mut()?
            .enqueue(topic, QoS::AtMostOnce, retain, payload)
            .map_err(|e| Esp32MqttError(format!("{:?}", e)))?;
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), Self::Error> {
        self.client_mut()?
            .subscribe(topic, QoS::AtMostOnce)
            .map_err(|e| Esp32MqttError(format!("{:?}", e)))?;
        Ok(())
    }

    fn try_recv(&mut self) -> Option<MqttMessage> {
        let rx = self.message_rx.as_ref()?;
        match rx.try_recv() {
            Ok(msg) => Some(msg),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.connected.store(false, Ordering::SeqCst);
                None
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

fn handle_mqtt_events(
    connection: &mut EspMqttConnection,
    message_tx: Sender<MqttMessage>,
    connected: Arc<AtomicBool>,
) {
    while let Ok(event) = connection.next() {
        match event.payload() {
            EventPayload::Connected(_) => {
                info!("MQTT connected");
                connected.store(true, Ordering::SeqCst);
            }
            EventPayload::Disconnected => {
                warn!("MQTT disconnected");
                connected.store(false, Ordering::SeqCst);
            }
            EventPayload::Received {
                topic: Some(topic),
                data,
                ..
            } => {
                let msg = MqttMessage::new(topic.to_string(), data.to_vec());
                if message_tx.send(msg).is_err() {
                    break;
                }
            }
            EventPayload::Error(e) => {
                warn!("MQTT error: {:?}", e);
            }
            _ => {}
        }
    }
    connected.store(false, Ordering::SeqCst);
    debug!("MQTT event thread stopped");
}
