//! ESP32-C3 SuperMini dashboard node.
//!
//! Runs the control loop on hardware:
//! - Samples the push button into the pin registry
//! - Syncs the registry with the dashboard over HTTP or MQTT
//! - Drives the status LED from the link state
//!
//! # Build
//!
//! ```bash
//! WIFI_SSID=... WIFI_PASSWORD=... DASHBOARD_HOST=192.168.0.10 DASHBOARD_PORT=5000 \
//!     cargo build --release --features esp32 --bin esp32_main
//!
//! # MQTT instead of HTTP
//! DASHBOARD_TRANSPORT=mqtt DASHBOARD_PORT=1883 ...
//! ```

use std::thread;
use std::time::Duration;

use esp_idf_hal::gpio::{PinDriver, Pull};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use log::{info, warn};

use pin_mirror::app::{DeltaTimer, DeviceApp};
use pin_mirror::hal::esp32::{pins, Esp32Clock, Esp32Mqtt, Esp32Wifi};
use pin_mirror::messages::node_id_from_mac;
use pin_mirror::sync::SyncOrchestrator;
use pin_mirror::traits::{InputView, LinkMonitor, StatusView, SyncTransport};
use pin_mirror::transport::{HttpTransport, MqttTransport, StdConnector};
use pin_mirror::views::{ButtonView, LedView};
use pin_mirror::{Config, DashboardConfig, MqttConfig, TransportKind, WifiConfig};

/// Time between WiFi reconnect attempts while the link is down.
const RECONNECT_INTERVAL_MS: i64 = 5000;

fn main() -> anyhow::Result<()> {
    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    info!("pin-mirror node starting");

    // =========================================================================
    // Configuration
    // =========================================================================
    let config = build_config();
    if !config.wifi.is_configured() {
        anyhow::bail!("WiFi not configured (set WIFI_SSID/WIFI_PASSWORD at build time)");
    }
    if !config.dashboard.is_configured() {
        anyhow::bail!("dashboard not configured (set DASHBOARD_HOST at build time)");
    }

    // =========================================================================
    // Hardware
    // =========================================================================
    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take().ok();

    let wifi = Esp32Wifi::new(peripherals.modem, sysloop, nvs, &config.wifi)?;
    let node_id = node_id_from_mac(wifi.mac()?);
    info!("node id {} (up {} ms)", node_id, Esp32Clock::new().uptime().as_millis());

    let led_pin = PinDriver::output(peripherals.pins.gpio8)?;
    let mut button_pin = PinDriver::input(peripherals.pins.gpio9)?;
    button_pin.set_pull(Pull::Up)?;

    let mut led = LedView::new(led_pin, pins::LED, config.device.blink_interval_ms).active_low();
    let mut button = ButtonView::new(button_pin, pins::BUTTON, "Button");

    let endpoint = config.dashboard.endpoint();
    let interval = config.dashboard.update_interval_ms;

    match config.dashboard.transport {
        TransportKind::Http => {
            info!("syncing via HTTP to {}:{}", endpoint.host, endpoint.port);
            let http = HttpTransport::new(StdConnector)
                .with_timeout_ms(config.dashboard.request_timeout_ms);
            let sync = SyncOrchestrator::new(http, endpoint, node_id.as_str(), interval);
            run(DeviceApp::new(sync, wifi), &config, &mut button, &mut led)
        }
        TransportKind::Mqtt => {
            info!("syncing via MQTT broker {}:{}", endpoint.host, endpoint.port);
            let mqtt = MqttTransport::new(Esp32Mqtt::new(&config.mqtt), Esp32Clock::new(), &config.mqtt);
            let sync = SyncOrchestrator::new(mqtt, endpoint, node_id.as_str(), interval);
            run(DeviceApp::new(sync, wifi), &config, &mut button, &mut led)
        }
    }
}

fn build_config() -> Config {
    let transport = match option_env!("DASHBOARD_TRANSPORT") {
        Some("mqtt") => TransportKind::Mqtt,
        _ => TransportKind::Http,
    };
    let port = option_env!("DASHBOARD_PORT")
        .and_then(|p| p.parse().ok())
        .unwrap_or(80);

    Config::default()
        .with_wifi(
            WifiConfig::default()
                .with_ssid(option_env!("WIFI_SSID").unwrap_or(""))
                .with_password(option_env!("WIFI_PASSWORD").unwrap_or("")),
        )
        .with_dashboard(
            DashboardConfig::default()
                .with_host(option_env!("DASHBOARD_HOST").unwrap_or("192.168.0.1"))
                .with_port(port)
                .with_transport(transport),
        )
        .with_mqtt(MqttConfig::default().with_auth(
            option_env!("MQTT_USERNAME").unwrap_or(""),
            option_env!("MQTT_PASSWORD").unwrap_or(""),
        ))
}

fn run<T: SyncTransport>(
    mut app: DeviceApp<T, Esp32Wifi<'static>>,
    config: &Config,
    button: &mut dyn InputView,
    led: &mut dyn StatusView,
) -> anyhow::Result<()> {
    let mut inputs: [&mut dyn InputView; 1] = [button];
    let mut outputs: [&mut dyn StatusView; 1] = [led];
    app.register(&mut inputs, &mut outputs);

    let mut timer = DeltaTimer::new(Esp32Clock::new());
    let mut link_down_ms: i64 = 0;
    let loop_interval = Duration::from_millis(u64::from(config.device.loop_interval_ms));

    loop {
        let elapsed = timer.tick();
        app.tick(elapsed, &mut inputs, &mut outputs);

        if app.link().is_link_up() {
            link_down_ms = 0;
        } else {
            link_down_ms += elapsed.max(0);
            if link_down_ms >= RECONNECT_INTERVAL_MS {
                warn!("WiFi down, reconnecting");
                app.link_mut().reconnect();
                link_down_ms = 0;
            }
        }

        thread::sleep(loop_interval);
    }
}
