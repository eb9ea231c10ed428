//! Host simulator for the provisioning flow.
//!
//! Each stdin line is delivered as one BLE write (with its newline), and
//! notifications are printed to stdout. Joins run against simulated access
//! points.
//!
//! # Usage
//!
//! ```bash
//! PROVISION_NETWORKS="Home:hunter22,Cafe" cargo run --bin host-provision
//! ```
//!
//! # Environment
//!
//! - `PROVISION_TTL_MS` - window length in milliseconds (`0` = no expiry,
//!   default 180000)
//! - `PROVISION_NETWORKS` - reachable access points, `ssid:password,...`
//! - `PROVISION_STORE` - credential file (default
//!   `~/.wifi-provision-esp32/credentials.json`)
//! - `RUST_LOG` - log filter (default `info`)

#[cfg(not(target_os = "espidf"))]
#[tokio::main(flavor = "current_thread")]
async fn main() {
    simulator::run().await;
}

#[cfg(target_os = "espidf")]
fn main() {
    println!("host-provision runs on the host only; flash the 'provision' binary instead.");
}

#[cfg(not(target_os = "espidf"))]
mod simulator {
    use log::{error, info, warn};
    use std::io::{BufRead, Write};
    use std::time::{Duration, Instant};
    use tokio_util::sync::CancellationToken;
    use wifi_provision_esp32::ble::{BleEvent, BleEventQueue};
    use wifi_provision_esp32::config::parse_ttl_ms;
    use wifi_provision_esp32::indicator::LogIndicator;
    use wifi_provision_esp32::persistence_host::FileCredentialStore;
    use wifi_provision_esp32::{
        CredentialStore, HostNetwork, NetworkJoin, ProvisionConfig, ProvisioningSession,
        Transport, TransportError,
    };

    /// Session tick period.
    const TICK_INTERVAL: Duration = Duration::from_millis(10);

    /// Transport that prints notifications to stdout.
    struct ConsoleTransport;

    impl Transport for ConsoleTransport {
        fn start(&mut self) -> Result<(), TransportError> {
            println!("Provisioning window open. Commands: STATUS, CLEAR, ssid=<name>;pass=<password>");
            let _ = std::io::stdout().flush();
            Ok(())
        }

        fn stop(&mut self) {
            println!("Provisioning window closed.");
        }

        fn notify(&mut self, message: &str) {
            println!("< {}", message);
            let _ = std::io::stdout().flush();
        }
    }

    fn credential_store() -> std::io::Result<FileCredentialStore> {
        match std::env::var("PROVISION_STORE") {
            Ok(path) if !path.trim().is_empty() => Ok(FileCredentialStore::new(path)),
            _ => FileCredentialStore::at_default_path(),
        }
    }

    pub async fn run() {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

        info!("=== WiFi provisioning simulator starting ===");

        let store = match credential_store() {
            Ok(store) => store,
            Err(e) => {
                error!("No credential store available: {}", e);
                std::process::exit(1);
            }
        };
        info!("Credential file: {:?}", store.path());

        let networks = std::env::var("PROVISION_NETWORKS").unwrap_or_default();
        let network = HostNetwork::new()
            .with_access_points_from(&networks)
            .with_saved(store.load());
        if network.access_point_count() == 0 {
            warn!("No simulated access points (set PROVISION_NETWORKS); every join will fail");
        }

        let mut session = ProvisioningSession::new(
            ConsoleTransport,
            network,
            store,
            ProvisionConfig::default(),
        )
        .with_indicator(LogIndicator::new());

        if session.reconnect_saved() {
            if let Some(ip) = session.network().current_address() {
                info!("Joined saved network, IP {}", ip);
            }
            info!("Provisioning window not needed");
            return;
        }

        let ttl = parse_ttl_ms(std::env::var("PROVISION_TTL_MS").ok().as_deref());
        if let Err(e) = session.begin(ttl, Instant::now()) {
            error!("Could not open provisioning window: {}", e);
            std::process::exit(1);
        }

        let cancel = CancellationToken::new();
        let events = BleEventQueue::default();

        // stdin plays the BLE host task: it only pushes into the queue.
        // A detached thread so a pending read never blocks shutdown.
        let stdin_events = events.clone();
        let stdin_cancel = cancel.clone();
        std::thread::spawn(move || {
            stdin_events.push(BleEvent::Connected);
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                match line {
                    Ok(line) => stdin_events.push(BleEvent::Data(format!("{}\n", line).into_bytes())),
                    Err(e) => {
                        warn!("stdin read failed: {}", e);
                        break;
                    }
                }
            }
            stdin_events.push(BleEvent::Disconnected);
            stdin_cancel.cancel();
        });

        let mut ticker = tokio::time::interval(TICK_INTERVAL);
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutting down...");
                    session.stop();
                    break;
                }
                _ = cancel.cancelled() => {
                    // Deliver what was read before EOF, then stop
                    events.deliver_to(&mut session, Instant::now());
                    info!("stdin closed");
                    session.stop();
                    break;
                }
                _ = ticker.tick() => {
                    events.pump(&mut session, Instant::now());
                    if !session.is_active() {
                        break;
                    }
                }
            }
        }

        match session.network().current_address() {
            Some(ip) if session.network().is_connected() => info!("Provisioned, IP {}", ip),
            _ => info!("Provisioning ended without a connection"),
        }
        info!("Shutdown complete");
    }
}
