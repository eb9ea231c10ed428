//! Host network simulation.
//!
//! On a development machine there is no WiFi radio to provision. This
//! provider simulates a set of access points so the full provisioning flow
//! (bounded join, status, clear) can be exercised from the host binary and
//! from tests.

use super::{wait_for_association, JoinLimits, NetworkJoin};
use crate::clock::{Clock, SystemClock};
use crate::config::WifiConfig;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::time::{Duration, Instant};

/// Address reported when the local address cannot be detected.
const FALLBACK_ADDRESS: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// Simulated WiFi network provider for host builds.
pub struct HostNetwork<C: Clock = SystemClock> {
    /// Reachable access points: SSID to password.
    access_points: HashMap<String, String>,
    /// How long a correct join takes to associate.
    association_delay: Duration,
    /// Network the simulated driver remembers for `try_last_saved`.
    saved: Option<WifiConfig>,
    /// Assigned address while associated.
    ip_addr: Option<IpAddr>,
    clock: C,
}

impl HostNetwork<SystemClock> {
    /// Create a provider with no reachable access points.
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for HostNetwork<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> HostNetwork<C> {
    /// Create a provider driven by the given clock.
    pub fn with_clock(clock: C) -> Self {
        Self {
            access_points: HashMap::new(),
            association_delay: Duration::ZERO,
            saved: None,
            ip_addr: None,
            clock,
        }
    }

    /// Add a reachable access point.
    pub fn with_access_point(mut self, ssid: impl Into<String>, password: impl Into<String>) -> Self {
        self.access_points.insert(ssid.into(), password.into());
        self
    }

    /// Add access points from a `ssid:password,ssid:password` list.
    ///
    /// The password is everything after the first `:`; an entry without `:`
    /// is an open network. Blank entries are skipped.
    pub fn with_access_points_from(mut self, list: &str) -> Self {
        for entry in list.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (ssid, password) = entry.split_once(':').unwrap_or((entry, ""));
            if ssid.is_empty() {
                warn!("Ignoring access point entry without SSID");
                continue;
            }
            self.access_points
                .insert(ssid.to_string(), password.to_string());
        }
        self
    }

    /// Set how long a correct join takes to associate.
    pub fn with_association_delay(mut self, delay: Duration) -> Self {
        self.association_delay = delay;
        self
    }

    /// Seed the network remembered for `try_last_saved`.
    pub fn with_saved(mut self, config: Option<WifiConfig>) -> Self {
        self.saved = config;
        self
    }

    /// The clock driving association waits.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Number of simulated access points.
    pub fn access_point_count(&self) -> usize {
        self.access_points.len()
    }

    /// Get the primary local IP address.
    ///
    /// This uses a trick: create a UDP socket and "connect" to a public IP
    /// (doesn't actually send anything), then check which local address was chosen.
    fn detect_local_ip() -> Option<IpAddr> {
        use std::net::UdpSocket;

        let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
        socket.connect("8.8.8.8:80").ok()?;
        let local_addr = socket.local_addr().ok()?;
        Some(local_addr.ip())
    }

    /// When a join with these credentials would associate, if ever.
    fn association_time(&self, config: &WifiConfig) -> Option<Instant> {
        match self.access_points.get(&config.ssid) {
            Some(password) if *password == config.password => {
                Some(self.clock.now() + self.association_delay)
            }
            Some(_) => {
                debug!("Simulated AP '{}' rejects the password", config.ssid);
                None
            }
            None => {
                debug!("Simulated AP '{}' is out of range", config.ssid);
                None
            }
        }
    }
}

impl<C: Clock> NetworkJoin for HostNetwork<C> {
    fn try_connect(&mut self, config: &WifiConfig, limits: JoinLimits) -> bool {
        info!("Joining simulated network: {}", config.ssid);
        self.ip_addr = None;

        let associate_at = self.association_time(config);
        let clock = &self.clock;
        let associated = wait_for_association(clock, limits.timeout, limits.poll_interval, || {
            associate_at.is_some_and(|at| clock.now() >= at)
        });

        if associated {
            let ip = Self::detect_local_ip().unwrap_or(FALLBACK_ADDRESS);
            info!("Simulated network joined, IP: {}", ip);
            self.ip_addr = Some(ip);
            self.saved = Some(config.clone());
        } else {
            info!("Simulated join of '{}' timed out", config.ssid);
        }
        associated
    }

    fn try_last_saved(&mut self, limits: JoinLimits) -> bool {
        let Some(config) = self.saved.clone() else {
            debug!("No saved network to rejoin");
            return false;
        };
        self.try_connect(&config, limits)
    }

    fn current_address(&self) -> Option<IpAddr> {
        self.ip_addr
    }

    fn is_connected(&self) -> bool {
        self.ip_addr.is_some()
    }

    fn disconnect(&mut self, erase_config: bool) {
        info!("Leaving simulated network");
        self.ip_addr = None;
        if erase_config {
            self.saved = None;
        }
    }
}
