//! Credential persistence.
//!
//! The provisioning session saves credentials after a successful join and
//! erases them on `CLEAR`. Backends:
//! - [`MemoryCredentialStore`] - in RAM (tests, volatile setups)
//! - [`crate::persistence_host::FileCredentialStore`] - JSON file on the host
//! - `NvsCredentialStore` - ESP32 NVS (`esp32` feature, in [`crate::wifi`])

use crate::config::WifiConfig;
use std::fmt;

/// Persistent store for one saved network.
pub trait CredentialStore {
    /// The saved credentials, if any.
    fn load(&self) -> Option<WifiConfig>;

    /// Replace the saved credentials.
    fn save(&mut self, config: &WifiConfig) -> Result<(), StoreError>;

    /// Forget the saved credentials. Erasing an empty store succeeds.
    fn erase(&mut self) -> Result<(), StoreError>;
}

/// Errors from a credential store backend.
#[derive(Debug)]
pub enum StoreError {
    /// File I/O failed.
    Io(std::io::Error),
    /// Stored data could not be encoded or decoded.
    Encoding(String),
    /// ESP-IDF NVS error.
    #[cfg(feature = "esp32")]
    Esp(esp_idf_sys::EspError),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {}", e),
            Self::Encoding(msg) => write!(f, "encoding error: {}", msg),
            #[cfg(feature = "esp32")]
            Self::Esp(e) => write!(f, "NVS error: {:?}", e),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

#[cfg(feature = "esp32")]
impl From<esp_idf_sys::EspError> for StoreError {
    fn from(e: esp_idf_sys::EspError) -> Self {
        Self::Esp(e)
    }
}

/// Credential store kept in RAM.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    saved: Option<WifiConfig>,
    saves: usize,
    erases: usize,
}

impl MemoryCredentialStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds `config`.
    pub fn with_saved(config: WifiConfig) -> Self {
        Self {
            saved: Some(config),
            ..Self::default()
        }
    }

    /// Number of successful `save` calls.
    pub fn save_count(&self) -> usize {
        self.saves
    }

    /// Number of `erase` calls.
    pub fn erase_count(&self) -> usize {
        self.erases
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Option<WifiConfig> {
        self.saved.clone()
    }

    fn save(&mut self, config: &WifiConfig) -> Result<(), StoreError> {
        self.saved = Some(config.clone());
        self.saves += 1;
        Ok(())
    }

    fn erase(&mut self) -> Result<(), StoreError> {
        self.saved = None;
        self.erases += 1;
        Ok(())
    }
}
