//! Provisioning command protocol.
//!
//! The companion app writes one command per line to the RX characteristic.
//! Keywords are case-insensitive.
//!
//! # Commands
//!
//! | Line                | Effect                              | Response                          |
//! |---------------------|-------------------------------------|-----------------------------------|
//! | `STATUS`            | query                               | address, or `WIFI:DISCONNECTED`   |
//! | `CLEAR`             | erase saved credentials, disconnect | `CLEARED`                         |
//! | `ssid=<S>;pass=<P>` | attempt join with `S`/`P`           | `TRY:<S>` then `OK <ip>` or `FAIL`|
//! | anything else       | none                                | `ERR:UNKNOWN_CMD`                 |
//!
//! The password runs to the end of the line, so it may contain `;`.
//!
//! # Example
//!
//! ```
//! use wifi_provision_esp32::command::Command;
//!
//! assert_eq!(Command::parse("status"), Command::Status);
//! assert_eq!(
//!     Command::parse("ssid=Home;pass=a;b;c"),
//!     Command::SetCredentials { ssid: "Home".into(), pass: "a;b;c".into() }
//! );
//! ```

use std::fmt;
use std::net::IpAddr;

/// Marker that introduces the SSID in a set-credentials line.
const SSID_KEY: &str = "ssid=";

/// Marker that introduces the password in a set-credentials line.
const PASS_KEY: &str = "pass=";

/// A parsed provisioning command.
#[derive(Clone, PartialEq, Eq)]
pub enum Command {
    /// Report the current network association.
    Status,
    /// Disconnect and erase saved credentials.
    Clear,
    /// Try to join a network and save the credentials on success.
    SetCredentials { ssid: String, pass: String },
    /// Anything else; carries the original line.
    Unknown { raw: String },
}

// Keep passwords out of logs
impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status => write!(f, "Status"),
            Self::Clear => write!(f, "Clear"),
            Self::SetCredentials { ssid, .. } => f
                .debug_struct("SetCredentials")
                .field("ssid", ssid)
                .finish_non_exhaustive(),
            Self::Unknown { raw } => f.debug_struct("Unknown").field("raw", raw).finish(),
        }
    }
}

impl Command {
    /// Parse a command from a line.
    pub fn parse(line: &str) -> Self {
        let line = line.trim();

        if line.eq_ignore_ascii_case("STATUS") {
            return Self::Status;
        }
        if line.eq_ignore_ascii_case("CLEAR") {
            return Self::Clear;
        }

        if let Some((ssid, pass)) = parse_credentials(line) {
            return Self::SetCredentials { ssid, pass };
        }

        Self::Unknown {
            raw: line.to_string(),
        }
    }
}

impl From<&str> for Command {
    fn from(line: &str) -> Self {
        Self::parse(line)
    }
}

/// Extract `(ssid, pass)` from a `ssid=<S>;pass=<P>` line.
///
/// The SSID ends at the first `;` after `ssid=`; the password is everything
/// after `pass=`. Both are trimmed. Returns `None` if either marker is
/// missing or the SSID is empty.
fn parse_credentials(line: &str) -> Option<(String, String)> {
    let ssid_pos = line.find(SSID_KEY)?;
    let pass_pos = line.find(PASS_KEY)?;

    let ssid_start = ssid_pos + SSID_KEY.len();
    let ssid_end = line[ssid_pos..]
        .find(';')
        .map(|offset| ssid_pos + offset)
        .unwrap_or(line.len());
    let ssid = line[ssid_start..ssid_end].trim();
    let pass = line[pass_pos + PASS_KEY.len()..].trim();

    if ssid.is_empty() {
        return None;
    }

    Some((ssid.to_string(), pass.to_string()))
}

/// Notifications sent back to the companion app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Answer to `STATUS`: the assigned address, or `None` when not associated.
    Status(Option<IpAddr>),
    /// Credentials were erased.
    Cleared,
    /// A join attempt is starting.
    Trying { ssid: String },
    /// The join attempt succeeded.
    Connected { ip: Option<IpAddr> },
    /// The join attempt failed.
    Failed,
    /// The line was not a known command.
    UnknownCommand,
}

impl Notification {
    /// Convert notification to the text sent over BLE.
    pub fn to_ble_string(&self) -> String {
        match self {
            Self::Status(Some(ip)) => ip.to_string(),
            Self::Status(None) => "WIFI:DISCONNECTED".to_string(),
            Self::Cleared => "CLEARED".to_string(),
            Self::Trying { ssid } => format!("TRY:{}", ssid),
            Self::Connected { ip: Some(ip) } => format!("OK {}", ip),
            // Associated but no lease reported; keep the reply shape
            Self::Connected { ip: None } => "OK 0.0.0.0".to_string(),
            Self::Failed => "FAIL".to_string(),
            Self::UnknownCommand => "ERR:UNKNOWN_CMD".to_string(),
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_ble_string())
    }
}
