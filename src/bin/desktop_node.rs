//! Desktop dashboard node.
//!
//! Simulates a device against a real dashboard server: a joystick that
//! sweeps its axes, a button that toggles every few seconds and a console
//! LED. Useful for exercising the server without hardware.
//!
//! # Usage
//!
//! ```bash
//! DASHBOARD_HOST=127.0.0.1 DASHBOARD_PORT=5000 cargo run --features desktop --bin desktop_node
//!
//! # Through an MQTT broker instead
//! DASHBOARD_TRANSPORT=mqtt DASHBOARD_PORT=1883 cargo run --features desktop --bin desktop_node
//!
//! # More output
//! RUST_LOG=debug cargo run --features desktop --bin desktop_node
//! ```

use std::convert::Infallible;
use std::env;
use std::thread;
use std::time::{Duration, Instant};

use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
use log::info;

use pin_mirror::app::{DeltaTimer, DeviceApp};
use pin_mirror::hal::RumqttClient;
use pin_mirror::messages::node_id_from_mac;
use pin_mirror::sync::SyncOrchestrator;
use pin_mirror::traits::{
    AxisPosition, Clock, InputView, JoystickInput, LinkMonitor, StatusView, SyncTransport,
};
use pin_mirror::transport::{HttpTransport, MqttTransport, StdConnector};
use pin_mirror::views::{AxisCalibration, ButtonView, JoystickPins, JoystickView, LedView};
use pin_mirror::{Config, DashboardConfig, MqttConfig, TransportKind};

/// Locally administered MAC used when `NODE_MAC` is not set.
const DEFAULT_MAC: [u8; 6] = [0x02, 0x00, 0x00, 0x00, 0x00, 0x01];

const LED_PIN: u8 = 11;
const BUTTON_PIN: u8 = 4;
const JOYSTICK_PINS: JoystickPins = JoystickPins {
    x: 1,
    y: 2,
    button: Some(3),
};

// ============================================================================
// Simulated hardware
// ============================================================================

/// Wall clock since process start.
struct SystemClock {
    start: Instant,
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

/// The host network is assumed to be up.
struct HostLink;

impl LinkMonitor for HostLink {
    fn is_link_up(&self) -> bool {
        true
    }
}

/// LED that logs level changes.
#[derive(Default)]
struct ConsoleLed {
    high: Option<bool>,
}

impl ErrorType for ConsoleLed {
    type Error = Infallible;
}

impl OutputPin for ConsoleLed {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        if self.high != Some(false) {
            info!("LED off");
        }
        self.high = Some(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        if self.high != Some(true) {
            info!("LED on");
        }
        self.high = Some(true);
        Ok(())
    }
}

/// Button pressed for one second out of every five.
struct PeriodicButton {
    start: Instant,
}

impl ErrorType for PeriodicButton {
    type Error = Infallible;
}

impl InputPin for PeriodicButton {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.start.elapsed().as_secs() % 5 != 0)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.is_high().map(|high| !high)
    }
}

/// Joystick whose raw readings sweep the ADC range.
struct SweepJoystick {
    start: Instant,
    calibration: AxisCalibration,
    x: AxisPosition,
    y: AxisPosition,
    pressed: bool,
}

impl SweepJoystick {
    fn raw(&self, period_ms: u128) -> u16 {
        let phase = self.start.elapsed().as_millis() % period_ms;
        (phase * 4095 / period_ms) as u16
    }
}

impl JoystickInput for SweepJoystick {
    fn poll(&mut self) {
        self.x = self.calibration.map(self.raw(6000));
        self.y = self.calibration.map(self.raw(9000));
        self.pressed = self.start.elapsed().as_secs() % 7 == 0;
    }

    fn x(&self) -> AxisPosition {
        self.x
    }

    fn y(&self) -> AxisPosition {
        self.y
    }

    fn pressed(&self) -> bool {
        self.pressed
    }
}

// ============================================================================
// Main
// ============================================================================

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = build_config();
    if !config.dashboard.is_configured() {
        anyhow::bail!("dashboard not configured (set DASHBOARD_HOST and DASHBOARD_PORT)");
    }
    let node_id = match env::var("NODE_MAC").ok().and_then(|m| parse_mac(&m)) {
        Some(mac) => node_id_from_mac(mac),
        None => node_id_from_mac(DEFAULT_MAC),
    };
    let endpoint = config.dashboard.endpoint();
    let interval = config.dashboard.update_interval_ms;

    info!(
        "node {} -> {}:{} ({:?})",
        node_id, endpoint.host, endpoint.port, config.dashboard.transport
    );

    let start = Instant::now();
    let mut led = LedView::new(ConsoleLed::default(), LED_PIN, config.device.blink_interval_ms);
    let mut button = ButtonView::new(PeriodicButton { start }, BUTTON_PIN, "Button");
    let mut joystick = JoystickView::new(
        SweepJoystick {
            start,
            calibration: AxisCalibration::default(),
            x: AxisPosition::Center,
            y: AxisPosition::Center,
            pressed: false,
        },
        JOYSTICK_PINS,
    );

    match config.dashboard.transport {
        TransportKind::Http => {
            let http = HttpTransport::new(StdConnector)
                .with_timeout_ms(config.dashboard.request_timeout_ms);
            let sync = SyncOrchestrator::new(http, endpoint, node_id.as_str(), interval);
            run(DeviceApp::new(sync, HostLink), &config, start, &mut button, &mut joystick, &mut led)
        }
        TransportKind::Mqtt => {
            let clock = SystemClock { start };
            let mqtt = MqttTransport::new(RumqttClient::new(&config.mqtt), clock, &config.mqtt);
            let sync = SyncOrchestrator::new(mqtt, endpoint, node_id.as_str(), interval);
            run(DeviceApp::new(sync, HostLink), &config, start, &mut button, &mut joystick, &mut led)
        }
    }
}

fn build_config() -> Config {
    let var = |name: &str, build_time: Option<&'static str>| {
        env::var(name).ok().or_else(|| build_time.map(str::to_string))
    };

    let transport = match var("DASHBOARD_TRANSPORT", option_env!("DASHBOARD_TRANSPORT")).as_deref() {
        Some("mqtt") => TransportKind::Mqtt,
        _ => TransportKind::Http,
    };
    let default_port = match transport {
        TransportKind::Http => 5000,
        TransportKind::Mqtt => 1883,
    };
    let host = var("DASHBOARD_HOST", option_env!("DASHBOARD_HOST"))
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let port = var("DASHBOARD_PORT", option_env!("DASHBOARD_PORT"))
        .and_then(|p| p.parse().ok())
        .unwrap_or(default_port);

    let mut mqtt = MqttConfig::default().with_client_id("pin-mirror-desktop");
    if let (Some(user), Some(pass)) = (env::var("MQTT_USERNAME").ok(), env::var("MQTT_PASSWORD").ok()) {
        mqtt = mqtt.with_auth(&user, &pass);
    }

    Config::default()
        .with_dashboard(
            DashboardConfig::default()
                .with_host(&host)
                .with_port(port)
                .with_transport(transport),
        )
        .with_mqtt(mqtt)
}

/// Parse `aa:bb:cc:dd:ee:ff`.
fn parse_mac(s: &str) -> Option<[u8; 6]> {
    let mut mac = [0u8; 6];
    let mut parts = s.split(':');
    for byte in mac.iter_mut() {
        *byte = u8::from_str_radix(parts.next()?, 16).ok()?;
    }
    parts.next().is_none().then_some(mac)
}

fn run<T: SyncTransport>(
    mut app: DeviceApp<T, HostLink>,
    config: &Config,
    start: Instant,
    button: &mut dyn InputView,
    joystick: &mut dyn InputView,
    led: &mut dyn StatusView,
) -> anyhow::Result<()> {
    let mut inputs: [&mut dyn InputView; 2] = [button, joystick];
    let mut outputs: [&mut dyn StatusView; 1] = [led];
    app.register(&mut inputs, &mut outputs);

    let mut timer = DeltaTimer::new(SystemClock { start });
    let mut last_revision = None;
    let mut was_connected = false;
    let loop_interval = Duration::from_millis(u64::from(config.device.loop_interval_ms));

    loop {
        let elapsed = timer.tick();
        let status = app.tick(elapsed, &mut inputs, &mut outputs);

        if status.connected != was_connected {
            info!(
                "dashboard {}",
                if status.connected { "connected" } else { "unreachable" }
            );
            was_connected = status.connected;
        }

        let revision = app.pins().revision();
        if last_revision != Some(revision) && !app.sync().pins_blob().is_empty() {
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(app.sync().pins_blob()) {
                log::debug!("pins: {}", serde_json::to_string_pretty(&value)?);
            }
            last_revision = Some(revision);
        }

        thread::sleep(loop_interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mac_parsing() {
        assert_eq!(
            parse_mac("aa:bb:cc:dd:ee:ff"),
            Some([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff])
        );
        assert_eq!(parse_mac("aa:bb"), None);
        assert_eq!(parse_mac("aa:bb:cc:dd:ee:ff:00"), None);
        assert_eq!(parse_mac("zz:bb:cc:dd:ee:ff"), None);
    }
}
