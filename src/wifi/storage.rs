//! NVS persistence for WiFi credentials.
//!
//! Stores the provisioned credentials in ESP32's Non-Volatile Storage (NVS)
//! so they survive reboots.

use crate::config::{WifiConfig, MAX_PASSWORD_LEN, MAX_SSID_LEN};
use crate::persistence::{CredentialStore, StoreError};
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};
use esp_idf_sys::EspError;
use log::{debug, warn};

/// NVS namespace for WiFi configuration.
pub const NVS_NAMESPACE: &str = "wifi";

/// NVS key for stored credentials.
const NVS_KEY: &str = "credentials";

/// Maximum buffer size for WiFi config serialization.
/// Format: [ssid_len:1][ssid:32][password_len:1][password:64] = 98 bytes.
const MAX_CONFIG_BUFFER_SIZE: usize = 1 + MAX_SSID_LEN + 1 + MAX_PASSWORD_LEN;

/// Load WiFi configuration from NVS.
///
/// Returns `None` if no configuration is stored or if it's corrupted.
pub fn load_wifi_config(nvs: &EspNvs<NvsDefault>) -> Option<WifiConfig> {
    let mut buf = [0u8; MAX_CONFIG_BUFFER_SIZE];
    let bytes = match nvs.get_raw(NVS_KEY, &mut buf) {
        Ok(Some(bytes)) => bytes,
        Ok(None) => {
            debug!("No WiFi credentials in NVS");
            return None;
        }
        Err(e) => {
            warn!("Failed to read WiFi credentials from NVS: {:?}", e);
            return None;
        }
    };

    match WifiConfig::from_bytes(bytes) {
        Ok(config) => Some(config),
        Err(e) => {
            warn!("Stored WiFi credentials are corrupted: {}", e);
            None
        }
    }
}

/// Save WiFi configuration to NVS.
pub fn save_wifi_config(nvs: &mut EspNvs<NvsDefault>, config: &WifiConfig) -> Result<(), EspError> {
    let bytes = config.to_bytes();
    nvs.set_raw(NVS_KEY, &bytes)?;
    Ok(())
}

/// Clear stored WiFi configuration from NVS.
pub fn clear_wifi_config(nvs: &mut EspNvs<NvsDefault>) -> Result<(), EspError> {
    nvs.remove(NVS_KEY)?;
    Ok(())
}

/// Open the WiFi namespace on the default NVS partition.
pub fn open_nvs(partition: EspDefaultNvsPartition) -> Result<EspNvs<NvsDefault>, EspError> {
    EspNvs::new(partition, NVS_NAMESPACE, true)
}

/// Credential store backed by NVS.
pub struct NvsCredentialStore {
    nvs: EspNvs<NvsDefault>,
}

impl NvsCredentialStore {
    /// Open the store on the default NVS partition.
    pub fn new(partition: EspDefaultNvsPartition) -> Result<Self, EspError> {
        Ok(Self {
            nvs: open_nvs(partition)?,
        })
    }
}

impl CredentialStore for NvsCredentialStore {
    fn load(&self) -> Option<WifiConfig> {
        load_wifi_config(&self.nvs)
    }

    fn save(&mut self, config: &WifiConfig) -> Result<(), StoreError> {
        save_wifi_config(&mut self.nvs, config).map_err(StoreError::from)
    }

    fn erase(&mut self) -> Result<(), StoreError> {
        clear_wifi_config(&mut self.nvs).map_err(StoreError::from)
    }
}
