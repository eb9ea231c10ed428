//! Nordic UART Service transport on NimBLE.
//!
//! ```text
//! Service: Nordic UART (6E400001-...)
//! ├── RX (Write, Write Without Response) - client to device
//! └── TX (Notify)                        - device to client
//! ```

use super::events::{BleEvent, BleEventQueue};
use crate::config::ProvisionConfig;
use crate::session::{Transport, TransportError};
use esp32_nimble::utilities::mutex::Mutex;
use esp32_nimble::utilities::BleUuid;
use esp32_nimble::{uuid128, BLEAdvertisementData, BLECharacteristic, BLEDevice, NimbleProperties};
use log::{debug, info, warn};
use std::sync::Arc;

/// Nordic UART service.
pub const NUS_SERVICE_UUID: BleUuid = uuid128!("6E400001-B5A3-F393-E0A9-E50E24DCCA9E");

/// RX characteristic (client writes).
pub const NUS_RX_UUID: BleUuid = uuid128!("6E400002-B5A3-F393-E0A9-E50E24DCCA9E");

/// TX characteristic (device notifies).
pub const NUS_TX_UUID: BleUuid = uuid128!("6E400003-B5A3-F393-E0A9-E50E24DCCA9E");

/// BLE UART transport. Callbacks only push into the event queue.
pub struct BleUartTransport {
    device_name: String,
    preferred_mtu: u16,
    events: BleEventQueue,
    tx: Option<Arc<Mutex<BLECharacteristic>>>,
}

impl BleUartTransport {
    /// Create a transport that reports client activity into `events`.
    pub fn new(config: &ProvisionConfig, events: BleEventQueue) -> Self {
        Self {
            device_name: config.device_name.clone(),
            preferred_mtu: config.preferred_mtu,
            events,
            tx: None,
        }
    }

    fn advertise(&self) -> Result<(), TransportError> {
        let advertising = BLEDevice::take().get_advertising();
        let mut advertising = advertising.lock();
        advertising
            .set_data(
                BLEAdvertisementData::new()
                    .name(&self.device_name)
                    .add_service_uuid(NUS_SERVICE_UUID),
            )
            .map_err(|e| TransportError::AdvertisingFailed(format!("{:?}", e)))?;
        advertising
            .start()
            .map_err(|e| TransportError::AdvertisingFailed(format!("{:?}", e)))
    }
}

impl Transport for BleUartTransport {
    fn start(&mut self) -> Result<(), TransportError> {
        let device = BLEDevice::take();
        BLEDevice::set_device_name(&self.device_name)
            .map_err(|e| TransportError::InitFailed(format!("{:?}", e)))?;
        if let Err(e) = device.set_preferred_mtu(self.preferred_mtu) {
            warn!("Failed to set preferred MTU {}: {:?}", self.preferred_mtu, e);
        }

        let server = device.get_server();
        // The session decides when to advertise again
        server.advertise_on_disconnect(false);

        let events = self.events.clone();
        server.on_connect(move |_server, desc| {
            info!("BLE client connected: {:?}", desc.address());
            events.push(BleEvent::Connected);
        });

        let events = self.events.clone();
        server.on_disconnect(move |_desc, reason| {
            info!("BLE client disconnected ({:?})", reason);
            events.push(BleEvent::Disconnected);
        });

        let service = server.create_service(NUS_SERVICE_UUID);

        let tx = service
            .lock()
            .create_characteristic(NUS_TX_UUID, NimbleProperties::NOTIFY);

        let rx = service.lock().create_characteristic(
            NUS_RX_UUID,
            NimbleProperties::WRITE | NimbleProperties::WRITE_NO_RSP,
        );
        let events = self.events.clone();
        rx.lock().on_write(move |args| {
            events.push(BleEvent::Data(args.recv_data().to_vec()));
        });

        self.tx = Some(tx);
        self.advertise()?;
        info!("BLE advertising as '{}'", self.device_name);
        Ok(())
    }

    fn stop(&mut self) {
        if let Err(e) = BLEDevice::take().get_advertising().lock().stop() {
            warn!("Failed to stop advertising: {:?}", e);
        }
        self.tx = None;
        if let Err(e) = BLEDevice::deinit() {
            warn!("Failed to deinit BLE: {:?}", e);
        }
        info!("BLE stopped");
    }

    fn notify(&mut self, message: &str) {
        match &self.tx {
            Some(tx) => {
                tx.lock().set_value(message.as_bytes()).notify();
            }
            None => warn!("BLE notify while stopped: {}", message),
        }
    }

    fn resume_advertising(&mut self) {
        if BLEDevice::take().get_advertising().lock().is_advertising() {
            debug!("Already advertising");
            return;
        }
        if let Err(e) = self.advertise() {
            warn!("Failed to restart advertising: {}", e);
        }
    }
}
