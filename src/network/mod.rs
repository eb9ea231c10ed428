//! Network join abstraction.
//!
//! The provisioning session never talks to a WiFi driver directly. It goes
//! through [`NetworkJoin`], which has two implementations:
//! - **ESP32** (`esp32` feature): [`WifiNetwork`] on the ESP-IDF WiFi driver
//! - **Host**: [`HostNetwork`], a simulated set of access points
//!
//! Every join attempt is bounded by [`JoinLimits`]. Implementations start the
//! association and then wait with [`wait_for_association`], which polls at the
//! given interval and never waits past the bound.
//!
//! # Example
//!
//! ```
//! use wifi_provision_esp32::config::WifiConfig;
//! use wifi_provision_esp32::network::{HostNetwork, JoinLimits, NetworkJoin};
//! use std::time::Duration;
//!
//! let mut network = HostNetwork::new().with_access_point("Home", "secret");
//! let config = WifiConfig::new("Home", "secret").unwrap();
//! let limits = JoinLimits::new(Duration::from_secs(1), Duration::from_millis(50));
//! assert!(network.try_connect(&config, limits));
//! assert!(network.is_connected());
//! ```

use crate::clock::Clock;
use crate::config::{WifiConfig, WIFI_CONNECT_TIMEOUT, WIFI_POLL_INTERVAL};
use std::net::IpAddr;
use std::time::Duration;

mod host;

#[cfg(feature = "esp32")]
mod wifi;

// Re-exports
pub use host::HostNetwork;

#[cfg(feature = "esp32")]
pub use wifi::WifiNetwork;

/// Smallest sleep between association polls.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Bound and polling cadence of one join attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinLimits {
    /// Longest the attempt may block.
    pub timeout: Duration,
    /// Interval between association checks.
    pub poll_interval: Duration,
}

impl JoinLimits {
    /// Limits with the given bound and polling interval.
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval,
        }
    }
}

impl Default for JoinLimits {
    fn default() -> Self {
        Self::new(WIFI_CONNECT_TIMEOUT, WIFI_POLL_INTERVAL)
    }
}

/// Network join engine.
///
/// Join attempts block the caller for at most `limits.timeout`.
pub trait NetworkJoin {
    /// Try to associate with the given network within the limits.
    ///
    /// Returns `true` once associated with an address assigned.
    fn try_connect(&mut self, config: &WifiConfig, limits: JoinLimits) -> bool;

    /// Try to associate using whatever credentials are currently saved.
    ///
    /// Returns `false` immediately if nothing is saved.
    fn try_last_saved(&mut self, limits: JoinLimits) -> bool;

    /// The assigned address, if associated.
    fn current_address(&self) -> Option<IpAddr>;

    /// Check if currently associated.
    fn is_connected(&self) -> bool;

    /// Drop the association. With `erase_config`, also forget the network
    /// configuration held by the driver.
    fn disconnect(&mut self, erase_config: bool);
}

/// Poll `probe` until it reports association or `timeout` elapses.
///
/// `probe` runs once immediately, then after every `poll_interval`. The last
/// sleep is shortened so the total wait never exceeds `timeout`.
pub fn wait_for_association<C, F>(
    clock: &C,
    timeout: Duration,
    poll_interval: Duration,
    mut probe: F,
) -> bool
where
    C: Clock + ?Sized,
    F: FnMut() -> bool,
{
    let started = clock.now();
    let poll_interval = poll_interval.max(MIN_POLL_INTERVAL);

    loop {
        if probe() {
            return true;
        }

        let elapsed = clock.now().saturating_duration_since(started);
        if elapsed >= timeout {
            return false;
        }

        clock.sleep(poll_interval.min(timeout - elapsed));
    }
}
