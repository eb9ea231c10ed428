//! Provisioning configuration.
//!
//! - [`wifi`] - WiFi credential type and validation (host-testable)
//! - [`ProvisionConfig`] - tunables for the provisioning session and BLE transport

mod wifi;

use crate::ble::{RX_MAX_LEN, RX_QUIET_PERIOD};
use crate::network::JoinLimits;
use log::warn;
use std::time::Duration;

// Re-export WiFi configuration types (platform-independent)
pub use wifi::{ConfigError, WifiConfig, MAX_PASSWORD_LEN, MAX_SSID_LEN, MIN_WPA_PASSWORD_LEN};

/// Provisioning window length when none is configured.
pub const DEFAULT_PROVISION_TTL: Duration = Duration::from_millis(180_000);

/// Upper bound for a single join attempt.
pub const WIFI_CONNECT_TIMEOUT: Duration = Duration::from_millis(12_000);

/// How often association is polled during a join attempt.
pub const WIFI_POLL_INTERVAL: Duration = Duration::from_millis(150);

/// BLE advertisement name.
pub const DEFAULT_DEVICE_NAME: &str = "ESP32-CAM-Setup";

/// ATT MTU requested from the central. The client has the final say.
pub const DEFAULT_PREFERRED_MTU: u16 = 247;

/// Tunables for a provisioning session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionConfig {
    /// Capacity of the RX line buffer in bytes.
    pub rx_max_len: usize,
    /// Silence after which unterminated input is treated as a complete line.
    pub rx_quiet_period: Duration,
    /// Upper bound for one join attempt.
    pub join_timeout: Duration,
    /// Association polling interval during a join attempt.
    pub join_poll_interval: Duration,
    /// BLE advertisement name.
    pub device_name: String,
    /// Requested ATT MTU.
    pub preferred_mtu: u16,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            rx_max_len: RX_MAX_LEN,
            rx_quiet_period: RX_QUIET_PERIOD,
            join_timeout: WIFI_CONNECT_TIMEOUT,
            join_poll_interval: WIFI_POLL_INTERVAL,
            device_name: DEFAULT_DEVICE_NAME.to_string(),
            preferred_mtu: DEFAULT_PREFERRED_MTU,
        }
    }
}

impl ProvisionConfig {
    /// Set the RX buffer capacity.
    pub fn with_rx_max_len(mut self, rx_max_len: usize) -> Self {
        self.rx_max_len = rx_max_len;
        self
    }

    /// Set the quiet period for unterminated input.
    pub fn with_rx_quiet_period(mut self, period: Duration) -> Self {
        self.rx_quiet_period = period;
        self
    }

    /// Set the join attempt bound.
    pub fn with_join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = timeout;
        self
    }

    /// Set the association polling interval.
    pub fn with_join_poll_interval(mut self, interval: Duration) -> Self {
        self.join_poll_interval = interval;
        self
    }

    /// Bound and polling cadence handed to the join engine.
    pub fn join_limits(&self) -> JoinLimits {
        JoinLimits::new(self.join_timeout, self.join_poll_interval)
    }

    /// Set the BLE advertisement name.
    pub fn with_device_name(mut self, name: impl Into<String>) -> Self {
        self.device_name = name.into();
        self
    }
}

/// Parse a window TTL given in milliseconds (`PROVISION_TTL_MS`).
///
/// Missing or malformed values fall back to [`DEFAULT_PROVISION_TTL`].
/// `0` means the window never expires.
pub fn parse_ttl_ms(value: Option<&str>) -> Duration {
    match value.map(str::trim) {
        None | Some("") => DEFAULT_PROVISION_TTL,
        Some(raw) => match raw.parse::<u64>() {
            Ok(ms) => Duration::from_millis(ms),
            Err(_) => {
                warn!("Invalid provisioning TTL '{}', using default", raw);
                DEFAULT_PROVISION_TTL
            }
        },
    }
}
