//! WiFi connection management.
//!
//! Wraps the ESP-IDF WiFi driver in station mode. Unlike `BlockingWifi`,
//! connecting only *starts* the association; the caller decides how long to
//! wait by polling [`WifiManager::is_connected`].

use crate::config::WifiConfig;
use esp_idf_hal::modem::Modem;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::wifi::{AuthMethod, ClientConfiguration, Configuration, EspWifi};
use esp_idf_sys::EspError;
use log::{debug, info};
use std::net::IpAddr;

/// WiFi connection manager.
pub struct WifiManager<'a> {
    /// ESP-IDF WiFi driver.
    wifi: EspWifi<'a>,
}

impl<'a> WifiManager<'a> {
    /// Create a new WiFi manager.
    ///
    /// The driver is created without an NVS partition: credentials are
    /// persisted by the credential store, not by the driver.
    pub fn new(modem: Modem, sysloop: EspSystemEventLoop) -> Result<Self, EspError> {
        let wifi = EspWifi::new(modem, sysloop, None)?;
        Ok(Self { wifi })
    }

    /// Configure station mode and start associating with `config`.
    ///
    /// Returns as soon as the driver accepted the request.
    pub fn begin_connect(&mut self, config: &WifiConfig) -> Result<(), WifiError> {
        info!("Connecting to WiFi: {}", config.ssid);

        // Minimum auth the driver will accept from the AP
        let auth_method = if config.is_open() {
            AuthMethod::None
        } else if config.is_wpa_passphrase() {
            AuthMethod::WPA2Personal
        } else {
            AuthMethod::WEP
        };

        let wifi_config = Configuration::Client(ClientConfiguration {
            ssid: config
                .ssid
                .as_str()
                .try_into()
                .map_err(|_| WifiError::InvalidSsid)?,
            password: config
                .password
                .as_str()
                .try_into()
                .map_err(|_| WifiError::InvalidPassword)?,
            auth_method,
            ..Default::default()
        });

        // Drop any previous association before reconfiguring
        if self.wifi.is_started()? {
            if let Err(e) = self.wifi.disconnect() {
                debug!("Disconnect before reconfiguring failed: {:?}", e);
            }
        }

        self.wifi.set_configuration(&wifi_config)?;
        if !self.wifi.is_started()? {
            self.wifi.start()?;
        }
        self.wifi.connect().map_err(WifiError::ConnectionFailed)?;
        Ok(())
    }

    /// Associated and holding a DHCP lease.
    pub fn is_connected(&self) -> bool {
        let associated = self.wifi.is_connected().unwrap_or(false);
        associated && self.wifi.sta_netif().is_up().unwrap_or(false)
    }

    /// Get current IP address if connected.
    pub fn get_ip(&self) -> Option<IpAddr> {
        if !self.is_connected() {
            return None;
        }
        let info = self.wifi.sta_netif().get_ip_info().ok()?;
        format!("{}", info.ip).parse().ok()
    }

    /// Disconnect from the current network.
    ///
    /// With `erase_config` the station configuration is reset so the driver
    /// keeps no trace of the old network.
    pub fn disconnect(&mut self, erase_config: bool) -> Result<(), EspError> {
        info!("Disconnecting from WiFi");
        if self.wifi.is_started()? {
            self.wifi.disconnect()?;
        }
        if erase_config {
            debug!("Resetting station configuration");
            self.wifi
                .set_configuration(&Configuration::Client(ClientConfiguration::default()))?;
            self.wifi.stop()?;
        }
        Ok(())
    }
}

/// Errors that can occur during WiFi operations.
#[derive(Debug)]
pub enum WifiError {
    /// SSID is invalid (too long or contains invalid characters).
    InvalidSsid,
    /// Password is invalid.
    InvalidPassword,
    /// The driver refused to start associating.
    ConnectionFailed(EspError),
    /// ESP-IDF error.
    EspError(EspError),
}

impl From<EspError> for WifiError {
    fn from(e: EspError) -> Self {
        Self::EspError(e)
    }
}

impl std::fmt::Display for WifiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidSsid => write!(f, "invalid SSID"),
            Self::InvalidPassword => write!(f, "invalid password"),
            Self::ConnectionFailed(e) => write!(f, "connection failed: {:?}", e),
            Self::EspError(e) => write!(f, "ESP error: {:?}", e),
        }
    }
}

impl std::error::Error for WifiError {}
