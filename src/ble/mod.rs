//! BLE UART side of provisioning.
//!
//! Clients write text commands to the RX characteristic in arbitrary chunks.
//! [`LineBuffer`] reassembles them into lines, [`BleEventQueue`] carries
//! callbacks from the BLE host task to the provisioning loop, and (with the
//! `esp32` feature) `BleUartTransport` exposes the Nordic UART service.

mod events;
mod line_buffer;
#[cfg(feature = "esp32")]
mod transport;

pub use events::{BleEvent, BleEventQueue, MAX_QUEUED_EVENTS};
pub use line_buffer::{LineBuffer, RX_MAX_LEN, RX_QUIET_PERIOD};
#[cfg(feature = "esp32")]
pub use transport::{BleUartTransport, NUS_RX_UUID, NUS_SERVICE_UUID, NUS_TX_UUID};
