//! BLE Wi-Fi provisioning firmware library.
//!
//! A companion app writes text commands to a BLE characteristic; the device
//! reassembles them into lines, parses them, attempts a bounded Wi-Fi join,
//! persists credentials on success and reports back over notifications.
//!
//! Everything except the ESP-IDF drivers (BLE transport, Wi-Fi driver, NVS,
//! LED) is platform-independent and tested on the host.

pub mod ble;
pub mod clock;
pub mod command;
pub mod config;
pub mod indicator;
pub mod network;
pub mod persistence;
#[cfg(not(target_os = "espidf"))]
pub mod persistence_host;
pub mod session;
pub mod wifi;

// Re-export commonly used items
pub use ble::LineBuffer;
pub use clock::{Clock, SystemClock};
pub use command::{Command, Notification};
pub use config::{ConfigError, ProvisionConfig, WifiConfig};
pub use network::{wait_for_association, HostNetwork, JoinLimits, NetworkJoin};
pub use persistence::{CredentialStore, MemoryCredentialStore, StoreError};
pub use session::{ProvisioningSession, SessionState, StatusIndicator, Transport, TransportError};
