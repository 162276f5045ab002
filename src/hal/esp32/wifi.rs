//! WiFi station link for ESP32.
//!
//! Association happens once at startup; afterwards the control loop only
//! asks [`LinkMonitor::is_link_up`]. The station MAC seeds the node id.
//!
//! # Example
//!
//! ```ignore
//! use pin_mirror::config::WifiConfig;
//! use pin_mirror::hal::esp32::Esp32Wifi;
//! use pin_mirror::messages::node_id_from_mac;
//!
//! let config = WifiConfig::default()
//!     .with_ssid("MyNetwork")
//!     .with_password("secret123");
//!
//! let wifi = Esp32Wifi::new(modem, sysloop, nvs, &config)?;
//! let node_id = node_id_from_mac(wifi.mac()?);
//! ```

use std::net::Ipv4Addr;

use esp_idf_hal::modem::Modem;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{BlockingWifi, ClientConfiguration, Configuration, EspWifi};
use log::{info, warn};

use crate::config::WifiConfig;
use crate::traits::LinkMonitor;

/// WiFi connection manager for ESP32.
///
/// The connection is established during construction and the driver keeps
/// reconnecting in the background for the lifetime of this struct.
pub struct Esp32Wifi<'a> {
    wifi: BlockingWifi<EspWifi<'a>>,
}

impl<'a> Esp32Wifi<'a> {
    /// Bring up station mode, connect, and wait for DHCP.
    ///
    /// # Errors
    ///
    /// Returns an error if driver setup, association or DHCP fails.
    pub fn new(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        nvs: Option<EspDefaultNvsPartition>,
        config: &WifiConfig,
    ) -> anyhow::Result<Self> {
        let esp_wifi = EspWifi::new(modem, sysloop.clone(), nvs)?;
        let mut wifi = BlockingWifi::wrap(esp_wifi, sysloop)?;

        let mut ssid: heapless::String<32> = heapless::String::new();
        let _ = ssid.push_str(config.ssid.as_str());

        let mut password: heapless::String<64> = heapless::String::new();
        let _ = password.push_str(config.password.as_str());

        wifi.set_configuration(&Configuration::Client(ClientConfiguration {
            ssid,
            password,
            ..Default::default()
        }))?;

        wifi.start()?;
        info!("connecting to '{}'", config.ssid);
        wifi.connect()?;
        wifi.wait_netif_up()?;

        if let Ok(ip_info) = wifi.wifi().sta_netif().get_ip_info() {
            info!("WiFi up, IP {}", ip_info.ip);
        }

        Ok(Self { wifi })
    }

    /// Station MAC address.
    pub fn mac(&self) -> anyhow::Result<[u8; 6]> {
        Ok(self.wifi.wifi().sta_netif().get_mac()?)
    }

    /// Current IP address, if connected.
    pub fn ip_addr(&self) -> Option<Ipv4Addr> {
        self.wifi
            .wifi()
            .sta_netif()
            .get_ip_info()
            .ok()
            .map(|info| info.ip)
    }

    /// Try to re-associate after the link dropped.
    pub fn reconnect(&mut self) {
        if let Err(e) = self.wifi.connect() {
            warn!("WiFi reconnect failed: {:?}", e);
        }
    }
}

impl LinkMonitor for Esp32Wifi<'_> {
    fn is_link_up(&self) -> bool {
        self.wifi.is_connected().unwrap_or(false)
    }
}
