//! Shared configuration system for desktop and ESP32.
//!
//! Uses `heapless::String` for `no_std` compatibility while remaining
//! ergonomic to use on desktop with `std`.
//!
//! # Example
//!
//! ```rust
//! use pin_mirror::config::{Config, DashboardConfig, TransportKind};
//!
//! // Use defaults
//! let config = Config::default();
//!
//! // Or customize
//! let config = Config::default().with_dashboard(
//!     DashboardConfig::default()
//!         .with_host("192.168.1.100")
//!         .with_transport(TransportKind::Mqtt),
//! );
//! assert_eq!(config.dashboard.host.as_str(), "192.168.1.100");
//! ```

use heapless::String as HString;

use crate::traits::Endpoint;

/// Maximum length for short config strings (hostnames, client IDs)
pub const MAX_SHORT_STRING: usize = 64;

/// Maximum length for longer config strings (topics)
pub const MAX_LONG_STRING: usize = 128;

/// Type alias for short config strings
pub type ShortString = HString<MAX_SHORT_STRING>;

/// Type alias for longer config strings
pub type LongString = HString<MAX_LONG_STRING>;

// ============================================================================
// Helper for creating heapless strings
// ============================================================================

/// Copy `s` into a bounded string, truncating on a UTF-8 boundary if it
/// does not fit.
pub fn bounded<const N: usize>(s: &str) -> HString<N> {
    let mut hs = HString::new();
    let valid_end = s
        .char_indices()
        .take_while(|(i, c)| i + c.len_utf8() <= N)
        .last()
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    let _ = hs.push_str(&s[..valid_end]);
    hs
}

/// Create a ShortString from a &str, truncating if too long
pub fn short_string(s: &str) -> ShortString {
    bounded(s)
}

/// Create a LongString from a &str, truncating if too long
pub fn long_string(s: &str) -> LongString {
    bounded(s)
}

// ============================================================================
// Main Config
// ============================================================================

/// Complete application configuration
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// WiFi connection configuration
    pub wifi: WifiConfig,
    /// Dashboard server and sync timing
    pub dashboard: DashboardConfig,
    /// MQTT transport configuration
    pub mqtt: MqttConfig,
    /// Device-local settings
    pub device: DeviceConfig,
}

impl Config {
    /// Set WiFi configuration
    pub fn with_wifi(mut self, wifi: WifiConfig) -> Self {
        self.wifi = wifi;
        self
    }

    /// Set dashboard configuration
    pub fn with_dashboard(mut self, dashboard: DashboardConfig) -> Self {
        self.dashboard = dashboard;
        self
    }

    /// Set MQTT configuration
    pub fn with_mqtt(mut self, mqtt: MqttConfig) -> Self {
        self.mqtt = mqtt;
        self
    }

    /// Set device configuration
    pub fn with_device(mut self, device: DeviceConfig) -> Self {
        self.device = device;
        self
    }
}

// ============================================================================
// Dashboard Config
// ============================================================================

/// Which transport carries sync exchanges to the dashboard.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum TransportKind {
    /// One HTTP POST per sync attempt.
    #[default]
    Http,
    /// Publish to a topic, directives arrive on a subscribed topic.
    Mqtt,
}

/// Dashboard server location and sync timing.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DashboardConfig {
    /// Server hostname or IP (HTTP server or MQTT broker)
    pub host: ShortString,
    /// Server port
    pub port: u16,
    /// Transport used for sync exchanges
    pub transport: TransportKind,
    /// Minimum time between sync attempts in milliseconds
    pub update_interval_ms: u32,
    /// Connect/read/write timeout for one HTTP exchange in milliseconds
    pub request_timeout_ms: u32,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            host: short_string("192.168.0.1"),
            port: 80,
            transport: TransportKind::Http,
            update_interval_ms: 25,
            request_timeout_ms: 5_000,
        }
    }
}

impl DashboardConfig {
    /// Set the server host
    pub fn with_host(mut self, host: &str) -> Self {
        self.host = short_string(host);
        self
    }

    /// Set the server port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the transport kind
    pub fn with_transport(mut self, transport: TransportKind) -> Self {
        self.transport = transport;
        self
    }

    /// Set the sync interval
    pub fn with_update_interval_ms(mut self, ms: u32) -> Self {
        self.update_interval_ms = ms;
        self
    }

    /// Set the per-request timeout
    pub fn with_request_timeout_ms(mut self, ms: u32) -> Self {
        self.request_timeout_ms = ms;
        self
    }

    /// Server endpoint handed to the transport on every sync.
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.host.as_str(), self.port)
    }

    /// Check that a host and a non-zero port are configured
    pub fn is_configured(&self) -> bool {
        !self.host.is_empty() && self.port != 0
    }
}

// ============================================================================
// MQTT Config
// ============================================================================

/// MQTT transport configuration.
///
/// The broker address comes from [`DashboardConfig`]; this only carries the
/// session parameters and topics.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MqttConfig {
    /// Client ID (should be unique per device)
    pub client_id: ShortString,
    /// Username for authentication (empty = no auth)
    pub username: ShortString,
    /// Password for authentication
    pub password: ShortString,
    /// Device -> server topic
    pub publish_topic: LongString,
    /// Server -> device topic
    pub subscribe_topic: LongString,
    /// Keep-alive interval in seconds
    pub keep_alive_secs: u16,
    /// How long a connection attempt may stay pending before it is
    /// torn down and retried, in milliseconds
    pub connect_timeout_ms: u32,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            client_id: short_string("pin-mirror"),
            username: ShortString::new(),
            password: ShortString::new(),
            publish_topic: long_string("pinecone/heartbeat"),
            subscribe_topic: long_string("pinecone/control"),
            keep_alive_secs: 60,
            connect_timeout_ms: 10_000,
        }
    }
}

impl MqttConfig {
    /// Set the client ID
    pub fn with_client_id(mut self, id: &str) -> Self {
        self.client_id = short_string(id);
        self
    }

    /// Set authentication credentials
    pub fn with_auth(mut self, username: &str, password: &str) -> Self {
        self.username = short_string(username);
        self.password = short_string(password);
        self
    }

    /// Set the publish and subscribe topics
    pub fn with_topics(mut self, publish: &str, subscribe: &str) -> Self {
        self.publish_topic = long_string(publish);
        self.subscribe_topic = long_string(subscribe);
        self
    }

    /// Set the keep-alive interval
    pub fn with_keep_alive_secs(mut self, secs: u16) -> Self {
        self.keep_alive_secs = secs;
        self
    }

    /// Set the connection attempt timeout
    pub fn with_connect_timeout_ms(mut self, ms: u32) -> Self {
        self.connect_timeout_ms = ms;
        self
    }

    /// Check if authentication is configured
    pub fn has_auth(&self) -> bool {
        !self.username.is_empty()
    }
}

// ============================================================================
// WiFi Config
// ============================================================================

/// WiFi connection configuration
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WifiConfig {
    /// WiFi network SSID
    pub ssid: ShortString,
    /// WiFi password
    pub password: ShortString,
    /// Connection timeout in milliseconds
    pub connect_timeout_ms: u32,
}

impl Default for WifiConfig {
    fn default() -> Self {
        Self {
            ssid: ShortString::new(),
            password: ShortString::new(),
            connect_timeout_ms: 30_000,
        }
    }
}

impl WifiConfig {
    /// Set the SSID
    pub fn with_ssid(mut self, ssid: &str) -> Self {
        self.ssid = short_string(ssid);
        self
    }

    /// Set the password
    pub fn with_password(mut self, password: &str) -> Self {
        self.password = short_string(password);
        self
    }

    /// Set the connection timeout
    pub fn with_connect_timeout_ms(mut self, ms: u32) -> Self {
        self.connect_timeout_ms = ms;
        self
    }

    /// Check if WiFi credentials are configured
    pub fn is_configured(&self) -> bool {
        !self.ssid.is_empty()
    }
}

// ============================================================================
// Device Config
// ============================================================================

/// Device-local settings for the built-in views.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceConfig {
    /// Pin index of the status LED
    pub led_pin: u8,
    /// LED toggle period while the dashboard requests blinking
    pub blink_interval_ms: u32,
    /// Control loop period in milliseconds
    pub loop_interval_ms: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            led_pin: 11,
            blink_interval_ms: 500,
            loop_interval_ms: 20,
        }
    }
}

impl DeviceConfig {
    /// Set the LED pin index
    pub fn with_led_pin(mut self, pin: u8) -> Self {
        self.led_pin = pin;
        self
    }

    /// Set the blink interval
    pub fn with_blink_interval_ms(mut self, ms: u32) -> Self {
        self.blink_interval_ms = ms;
        self
    }

    /// Set the control loop period
    pub fn with_loop_interval_ms(mut self, ms: u32) -> Self {
        self.loop_interval_ms = ms;
        self
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.dashboard.port, 80);
        assert_eq!(config.dashboard.update_interval_ms, 25);
        assert_eq!(config.dashboard.transport, TransportKind::Http);
        assert_eq!(config.device.led_pin, 11);
    }

    #[test]
    fn dashboard_endpoint() {
        let dashboard = DashboardConfig::default()
            .with_host("dash.local")
            .with_port(8080);
        let endpoint = dashboard.endpoint();
        assert_eq!(endpoint.host.as_str(), "dash.local");
        assert_eq!(endpoint.port, 8080);
    }

    #[test]
    fn dashboard_is_configured() {
        assert!(DashboardConfig::default().is_configured());
        assert!(!DashboardConfig::default().with_host("").is_configured());
        assert!(!DashboardConfig::default().with_port(0).is_configured());
    }

    #[test]
    fn mqtt_auth_detection() {
        let no_auth = MqttConfig::default();
        assert!(!no_auth.has_auth());

        let with_auth = MqttConfig::default().with_auth("user", "pass");
        assert!(with_auth.has_auth());
    }

    #[test]
    fn mqtt_config_builder() {
        let mqtt = MqttConfig::default()
            .with_client_id("node-7")
            .with_topics("dash/up", "dash/down")
            .with_keep_alive_secs(30)
            .with_connect_timeout_ms(2_000);

        assert_eq!(mqtt.client_id.as_str(), "node-7");
        assert_eq!(mqtt.publish_topic.as_str(), "dash/up");
        assert_eq!(mqtt.subscribe_topic.as_str(), "dash/down");
        assert_eq!(mqtt.keep_alive_secs, 30);
        assert_eq!(mqtt.connect_timeout_ms, 2_000);
    }

    #[test]
    fn wifi_config_is_configured() {
        assert!(!WifiConfig::default().is_configured());
        assert!(WifiConfig::default().with_ssid("MyNetwork").is_configured());
        assert!(!WifiConfig::default().with_ssid("").is_configured());
    }

    #[test]
    fn builder_pattern() {
        let config = Config::default()
            .with_dashboard(
                DashboardConfig::default()
                    .with_host("broker.local")
                    .with_port(1883)
                    .with_transport(TransportKind::Mqtt)
                    .with_update_interval_ms(500),
            )
            .with_device(DeviceConfig::default().with_led_pin(14));

        assert_eq!(config.dashboard.host.as_str(), "broker.local");
        assert_eq!(config.dashboard.port, 1883);
        assert_eq!(config.dashboard.transport, TransportKind::Mqtt);
        assert_eq!(config.dashboard.update_interval_ms, 500);
        assert_eq!(config.device.led_pin, 14);
    }

    #[test]
    fn short_string_truncation() {
        let long_input = "a".repeat(100);
        let s = short_string(&long_input);
        assert_eq!(s.len(), MAX_SHORT_STRING);
    }

    #[test]
    fn long_string_truncation() {
        let long_input = "b".repeat(200);
        let s = long_string(&long_input);
        assert_eq!(s.len(), MAX_LONG_STRING);
    }

    #[test]
    fn bounded_respects_utf8_boundary() {
        // 4-byte chars: only two fit in 10 bytes
        let s: HString<10> = bounded("🚂🚃🚄");
        assert_eq!(s.as_str(), "🚂🚃");
    }

    #[test]
    fn bounded_keeps_short_input() {
        let s: HString<16> = bounded("Button");
        assert_eq!(s.as_str(), "Button");
    }
}
