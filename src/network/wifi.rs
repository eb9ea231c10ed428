//! ESP32 WiFi join engine.
//!
//! Drives the ESP-IDF station driver and reads the last provisioned
//! credentials from NVS for `try_last_saved`.

use super::{wait_for_association, JoinLimits, NetworkJoin};
use crate::clock::SystemClock;
use crate::config::WifiConfig;
use crate::wifi::{load_wifi_config, open_nvs, WifiManager};
use esp_idf_hal::modem::Modem;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};
use esp_idf_sys::EspError;
use log::{debug, info, warn};
use std::net::IpAddr;

/// WiFi-based join engine for ESP32.
pub struct WifiNetwork<'a> {
    wifi: WifiManager<'a>,
    nvs: EspNvs<NvsDefault>,
    clock: SystemClock,
}

impl<'a> WifiNetwork<'a> {
    /// Create a new WiFi join engine.
    ///
    /// # Arguments
    ///
    /// * `modem` - The WiFi/BT modem peripheral
    /// * `sysloop` - The ESP-IDF system event loop
    /// * `partition` - NVS partition holding the provisioned credentials
    pub fn new(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        partition: EspDefaultNvsPartition,
    ) -> Result<Self, EspError> {
        Ok(Self {
            wifi: WifiManager::new(modem, sysloop)?,
            nvs: open_nvs(partition)?,
            clock: SystemClock,
        })
    }

    /// Check if WiFi credentials are saved.
    pub fn is_configured(&self) -> bool {
        load_wifi_config(&self.nvs).is_some()
    }
}

impl<'a> NetworkJoin for WifiNetwork<'a> {
    fn try_connect(&mut self, config: &WifiConfig, limits: JoinLimits) -> bool {
        if let Err(e) = self.wifi.begin_connect(config) {
            warn!("WiFi join of '{}' not started: {}", config.ssid, e);
            return false;
        }

        let wifi = &self.wifi;
        let connected = wait_for_association(&self.clock, limits.timeout, limits.poll_interval, || {
            wifi.is_connected()
        });

        if connected {
            match self.wifi.get_ip() {
                Some(ip) => info!("WiFi connected, IP: {}", ip),
                None => warn!("WiFi connected but no IP reported"),
            }
        } else {
            info!("WiFi join of '{}' timed out after {:?}", config.ssid, limits.timeout);
        }
        connected
    }

    fn try_last_saved(&mut self, limits: JoinLimits) -> bool {
        let Some(config) = load_wifi_config(&self.nvs) else {
            debug!("No saved WiFi credentials");
            return false;
        };
        self.try_connect(&config, limits)
    }

    fn current_address(&self) -> Option<IpAddr> {
        self.wifi.get_ip()
    }

    fn is_connected(&self) -> bool {
        self.wifi.is_connected()
    }

    fn disconnect(&mut self, erase_config: bool) {
        if let Err(e) = self.wifi.disconnect(erase_config) {
            warn!("WiFi disconnect failed: {:?}", e);
        }
    }
}
