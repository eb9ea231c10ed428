//! Join-in-progress indicators.

use crate::session::StatusIndicator;
use log::info;

/// Indicator that only logs state changes.
#[derive(Debug, Default)]
pub struct LogIndicator {
    active: bool,
}

impl LogIndicator {
    /// Create an indicator in the off state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn is_active(&self) -> bool {
        self.active
    }
}

impl StatusIndicator for LogIndicator {
    fn set_active(&mut self, active: bool) {
        if self.active != active {
            info!("Indicator {}", if active { "on" } else { "off" });
        }
        self.active = active;
    }
}

#[cfg(feature = "esp32")]
pub use led::LedIndicator;

#[cfg(feature = "esp32")]
mod led {
    use crate::session::StatusIndicator;
    use esp_idf_hal::gpio::{AnyOutputPin, Output, PinDriver};
    use esp_idf_sys::EspError;
    use log::warn;

    /// GPIO LED (active high).
    pub struct LedIndicator {
        pin: PinDriver<'static, AnyOutputPin, Output>,
    }

    impl LedIndicator {
        /// Drive the LED on `pin`, starting switched off.
        pub fn new(pin: AnyOutputPin) -> Result<Self, EspError> {
            let mut pin = PinDriver::output(pin)?;
            pin.set_low()?;
            Ok(Self { pin })
        }
    }

    impl StatusIndicator for LedIndicator {
        fn set_active(&mut self, active: bool) {
            let result = if active {
                self.pin.set_high()
            } else {
                self.pin.set_low()
            };
            if let Err(e) = result {
                warn!("Failed to switch LED: {:?}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_indicator_tracks_state() {
        let mut indicator = LogIndicator::new();
        assert!(!indicator.is_active());
        indicator.set_active(true);
        assert!(indicator.is_active());
        indicator.set_active(false);
        assert!(!indicator.is_active());
    }
}
