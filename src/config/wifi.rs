//! WiFi credential data structures.
//!
//! Platform-independent types for the credentials a client provisions, so the
//! validation and storage format can be tested on the host machine.
//!
//! # Example
//!
//! ```
//! use wifi_provision_esp32::config::WifiConfig;
//!
//! let config = WifiConfig::new("Home", "a;b;c").unwrap();
//! let restored = WifiConfig::from_bytes(&config.to_bytes()).unwrap();
//! assert_eq!(config, restored);
//! ```

use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Longest SSID allowed by IEEE 802.11, in bytes.
pub const MAX_SSID_LEN: usize = 32;

/// Longest password the ESP-IDF station config holds, in bytes.
pub const MAX_PASSWORD_LEN: usize = 64;

/// Minimum passphrase length for WPA/WPA2-PSK.
///
/// Shorter non-empty passwords are still accepted (WEP keys are 5 or 13
/// characters); the join engine picks the auth threshold from the length.
pub const MIN_WPA_PASSWORD_LEN: usize = 8;

/// Credentials received from the companion app.
///
/// Both fields are zeroed when the value is dropped.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
#[cfg_attr(
    not(target_os = "espidf"),
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct WifiConfig {
    /// SSID, 1 to 32 bytes.
    pub ssid: String,
    /// Password; empty means an open network.
    pub password: String,
}

impl WifiConfig {
    /// Build credentials, rejecting values no station config can hold.
    pub fn new(ssid: impl Into<String>, password: impl Into<String>) -> Result<Self, ConfigError> {
        let config = Self {
            ssid: ssid.into(),
            password: password.into(),
        };
        config.validate().map(|()| config)
    }

    /// Credentials for an open network.
    pub fn open(ssid: impl Into<String>) -> Result<Self, ConfigError> {
        Self::new(ssid, String::new())
    }

    /// Check the structural limits. WPA length rules are not checked here.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match (self.ssid.len(), self.password.len()) {
            (0, _) => Err(ConfigError::SsidEmpty),
            (len, _) if len > MAX_SSID_LEN => Err(ConfigError::SsidTooLong {
                len,
                max: MAX_SSID_LEN,
            }),
            (_, len) if len > MAX_PASSWORD_LEN => Err(ConfigError::PasswordTooLong {
                len,
                max: MAX_PASSWORD_LEN,
            }),
            _ => Ok(()),
        }
    }

    /// No password set.
    pub fn is_open(&self) -> bool {
        self.password.is_empty()
    }

    /// Check if the password is long enough to be a WPA passphrase.
    pub fn is_wpa_passphrase(&self) -> bool {
        self.password.len() >= MIN_WPA_PASSWORD_LEN
    }

    /// NVS blob: `[ssid_len:1][ssid][password_len:1][password]`.
    ///
    /// Both lengths fit in one byte once [`validate`](Self::validate) passed.
    pub fn to_bytes(&self) -> Vec<u8> {
        [self.ssid.as_bytes(), self.password.as_bytes()]
            .into_iter()
            .flat_map(|field| std::iter::once(field.len() as u8).chain(field.iter().copied()))
            .collect()
    }

    /// Decode the [`to_bytes`](Self::to_bytes) layout and validate the result.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        let (ssid, rest) = take_field(bytes, "SSID")?;
        let (password, _) = take_field(rest, "password")?;
        Self::new(ssid, password)
    }
}

/// Split one length-prefixed UTF-8 field off the front of `bytes`.
fn take_field<'a>(bytes: &'a [u8], name: &str) -> Result<(String, &'a [u8]), ConfigError> {
    let (&len, rest) = bytes
        .split_first()
        .ok_or_else(|| ConfigError::InvalidFormat(format!("missing {} length", name)))?;
    let len = usize::from(len);
    if rest.len() < len {
        return Err(ConfigError::InvalidFormat(format!("truncated {}", name)));
    }
    let (raw, rest) = rest.split_at(len);
    let text = std::str::from_utf8(raw)
        .map_err(|_| ConfigError::InvalidFormat(format!("{} is not UTF-8", name)))?;
    Ok((text.to_string(), rest))
}

impl fmt::Debug for WifiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WifiConfig")
            .field("ssid", &self.ssid)
            .field("password", &"****")
            .finish()
    }
}

/// Why credentials were rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No SSID given.
    SsidEmpty,
    /// SSID longer than [`MAX_SSID_LEN`] bytes.
    SsidTooLong { len: usize, max: usize },
    /// Password longer than [`MAX_PASSWORD_LEN`] bytes.
    PasswordTooLong { len: usize, max: usize },
    /// A stored blob could not be decoded.
    InvalidFormat(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SsidEmpty => write!(f, "empty SSID"),
            Self::SsidTooLong { len, max } => write!(f, "SSID is {} bytes, limit {}", len, max),
            Self::PasswordTooLong { len, max } => {
                write!(f, "password is {} bytes, limit {}", len, max)
            }
            Self::InvalidFormat(msg) => write!(f, "malformed credentials: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}
