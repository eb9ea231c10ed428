//! ESP32 provisioning firmware.
//!
//! Boot joins the saved network if there is one. Otherwise the BLE UART
//! provisioning window opens and the main loop drives it until a join
//! succeeds or the window expires.
//!
//! The window length comes from `PROVISION_TTL_MS` at build time
//! (milliseconds, `0` = no expiry, default 180000).

#[cfg(feature = "esp32")]
fn main() {
    // Link ESP-IDF patches (must be first!)
    esp_idf_sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    if let Err(e) = run() {
        log::error!("Provisioning firmware failed: {:?}", e);
    }
}

#[cfg(feature = "esp32")]
fn run() -> Result<(), esp_idf_sys::EspError> {
    use esp_idf_hal::gpio::OutputPin;
    use esp_idf_hal::peripherals::Peripherals;
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_svc::nvs::EspDefaultNvsPartition;
    use log::{info, warn};
    use std::time::{Duration, Instant};
    use wifi_provision_esp32::ble::{BleEventQueue, BleUartTransport};
    use wifi_provision_esp32::config::parse_ttl_ms;
    use wifi_provision_esp32::indicator::LedIndicator;
    use wifi_provision_esp32::network::{NetworkJoin, WifiNetwork};
    use wifi_provision_esp32::wifi::NvsCredentialStore;
    use wifi_provision_esp32::{ProvisionConfig, ProvisioningSession};

    /// Main loop period. Bounds TTL and quiet-flush latency.
    const LOOP_PERIOD: Duration = Duration::from_millis(10);
    const IDLE_PERIOD: Duration = Duration::from_secs(60);

    info!("=== WiFi provisioning starting ===");

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let partition = EspDefaultNvsPartition::take()?;

    let network = WifiNetwork::new(peripherals.modem, sysloop, partition.clone())?;
    let store = NvsCredentialStore::new(partition)?;
    // ESP32-CAM flash LED
    let led = LedIndicator::new(peripherals.pins.gpio4.downgrade_output())?;

    let config = ProvisionConfig::default();
    let events = BleEventQueue::default();
    let transport = BleUartTransport::new(&config, events.clone());

    let mut session =
        ProvisioningSession::new(transport, network, store, config).with_indicator(led);

    if session.reconnect_saved() {
        if let Some(ip) = session.network().current_address() {
            info!("Joined saved network, IP {}", ip);
        }
    } else {
        let ttl = parse_ttl_ms(option_env!("PROVISION_TTL_MS"));
        match session.begin(ttl, Instant::now()) {
            Ok(()) => {
                while session.is_active() {
                    events.pump(&mut session, Instant::now());
                    std::thread::sleep(LOOP_PERIOD);
                }
            }
            Err(e) => warn!("Could not open provisioning window: {}", e),
        }

        match session.network().current_address() {
            Some(ip) if session.network().is_connected() => info!("Provisioned, IP {}", ip),
            _ => info!("Provisioning window closed without a connection"),
        }
    }

    // The Wi-Fi driver lives in the session; keep it up for the application
    loop {
        std::thread::sleep(IDLE_PERIOD);
        log::debug!("Heartbeat (connected: {})", session.network().is_connected());
    }
}

#[cfg(not(feature = "esp32"))]
fn main() {
    println!("This binary requires the 'esp32' feature.");
    println!("Use 'cargo run --bin host-provision' to simulate provisioning on the host.");
}
