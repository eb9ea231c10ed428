//! Credential persistence for host (development) builds.
//!
//! Stores the provisioned network as JSON so it persists across runs of the
//! host simulator. Uses `~/.wifi-provision-esp32/credentials.json` by default.
//!
//! # Usage
//!
//! ```ignore
//! use wifi_provision_esp32::persistence_host::FileCredentialStore;
//!
//! let store = FileCredentialStore::at_default_path()?;
//! if let Some(config) = store.load() {
//!     log::info!("Saved network: {}", config.ssid);
//! }
//! ```

use crate::config::WifiConfig;
use crate::persistence::{CredentialStore, StoreError};
use log::{debug, info, warn};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Get the default credential file path.
///
/// Returns `~/.wifi-provision-esp32/credentials.json`
pub fn default_credentials_path() -> io::Result<PathBuf> {
    let home = std::env::var("HOME")
        .map_err(|_| io::Error::new(io::ErrorKind::NotFound, "HOME not set"))?;
    Ok(PathBuf::from(home)
        .join(".wifi-provision-esp32")
        .join("credentials.json"))
}

/// Credential store backed by a JSON file.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    /// Create a store using the given file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Create a store at the default path.
    pub fn at_default_path() -> io::Result<Self> {
        Ok(Self::new(default_credentials_path()?))
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Option<WifiConfig> {
        let json = match fs::read_to_string(&self.path) {
            Ok(s) => s,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No credential file found at {:?}", self.path);
                return None;
            }
            Err(e) => {
                warn!("Failed to read credential file: {}", e);
                return None;
            }
        };

        let config: WifiConfig = match serde_json::from_str(&json) {
            Ok(config) => config,
            Err(e) => {
                warn!("Failed to parse credential file: {}", e);
                return None;
            }
        };

        // Reject hand-edited files that the device could never have saved
        match config.validate() {
            Ok(()) => Some(config),
            Err(e) => {
                warn!("Ignoring invalid stored credentials: {}", e);
                None
            }
        }
    }

    fn save(&mut self, config: &WifiConfig) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json =
            serde_json::to_string_pretty(config).map_err(|e| StoreError::Encoding(e.to_string()))?;
        fs::write(&self.path, json)?;

        info!("Credentials for '{}' saved to {:?}", config.ssid, self.path);
        Ok(())
    }

    fn erase(&mut self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!("Credentials erased from {:?}", self.path);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::atomic::{AtomicU32, Ordering};

    // Counter to ensure unique test files even in parallel execution
    static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

    fn unique_store() -> FileCredentialStore {
        let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        let pid = std::process::id();
        FileCredentialStore::new(
            env::temp_dir()
                .join(format!("wifi-provision-test-{}-{}", pid, id))
                .join("credentials.json"),
        )
    }

    #[test]
    fn test_save_load_roundtrip() {
        let mut store = unique_store();
        assert!(store.load().is_none());

        let config = WifiConfig::new("Home", "a;b;c").unwrap();
        store.save(&config).expect("Failed to save");
        assert_eq!(store.load(), Some(config));

        let _ = fs::remove_dir_all(store.path().parent().unwrap());
    }

    #[test]
    fn test_save_replaces_previous() {
        let mut store = unique_store();
        store.save(&WifiConfig::new("Old", "one").unwrap()).unwrap();
        store.save(&WifiConfig::new("New", "two").unwrap()).unwrap();
        assert_eq!(store.load().map(|c| c.ssid.clone()), Some("New".to_string()));

        let _ = fs::remove_dir_all(store.path().parent().unwrap());
    }

    #[test]
    fn test_erase() {
        let mut store = unique_store();
        store.save(&WifiConfig::open("Cafe").unwrap()).unwrap();
        store.erase().expect("Failed to erase");
        assert!(store.load().is_none());

        // Erasing again is not an error
        assert!(store.erase().is_ok());

        let _ = fs::remove_dir_all(store.path().parent().unwrap());
    }

    #[test]
    fn test_corrupted_file_loads_nothing() {
        let store = unique_store();
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "not json").unwrap();
        assert!(store.load().is_none());

        fs::write(store.path(), r#"{"ssid":"","password":"x"}"#).unwrap();
        assert!(store.load().is_none());

        let _ = fs::remove_dir_all(store.path().parent().unwrap());
    }
}
