//! WiFi driver and storage.
//!
//! This module provides the ESP-IDF WiFi driver wrapper and NVS storage
//! for provisioned credentials.
//!
//! # Components
//!
//! - [`connection`] - ESP-IDF WiFi driver wrapper (ESP32 only)
//! - [`storage`] - NVS persistence for credentials (ESP32 only)
//!
//! The credential type itself lives in [`crate::config`] so it can be tested
//! on the host.

#[cfg(feature = "esp32")]
mod connection;
#[cfg(feature = "esp32")]
mod storage;

#[cfg(feature = "esp32")]
pub use connection::{WifiError, WifiManager};
#[cfg(feature = "esp32")]
pub use storage::{
    clear_wifi_config, load_wifi_config, open_nvs, save_wifi_config, NvsCredentialStore,
    NVS_NAMESPACE,
};
