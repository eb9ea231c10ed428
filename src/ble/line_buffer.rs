//! Line reassembly for BLE characteristic writes.
//!
//! A BLE write carries at most one ATT payload (20-244 bytes depending on the
//! negotiated MTU) and phone apps split long commands arbitrarily. Nothing
//! guarantees that a write ends on a command boundary, so this module turns
//! the stream of chunks back into text lines.
//!
//! Lines end at `\n` or `\r`. Any run of CR/LF characters counts as a single
//! delimiter, so CR, LF and CRLF clients all behave the same. Clients that
//! never send a delimiter are served by [`LineBuffer::flush_if_quiet`], which
//! releases buffered input after a period of silence.
//!
//! # Memory Safety
//!
//! The buffer never grows beyond its capacity. When a chunk would not fit,
//! everything accumulated so far is discarded before the chunk is appended.
//! Data is dropped, never truncated: truncation could splice the head of one
//! command onto the tail of another.
//!
//! # Example
//!
//! ```
//! use wifi_provision_esp32::ble::LineBuffer;
//! use std::time::{Duration, Instant};
//!
//! let mut buffer = LineBuffer::new(64);
//! let now = Instant::now();
//!
//! buffer.append(b"ssid=Home;pa", now);
//! assert!(buffer.drain_lines().is_empty());
//!
//! buffer.append(b"ss=secret\r\nSTA", now);
//! assert_eq!(buffer.drain_lines(), vec!["ssid=Home;pass=secret".to_string()]);
//!
//! let later = now + Duration::from_millis(500);
//! buffer.append(b"TUS", now);
//! let line = buffer.flush_if_quiet(later, Duration::from_millis(120));
//! assert_eq!(line.as_deref(), Some("STATUS"));
//! ```

use log::warn;
use std::time::{Duration, Instant};
use zeroize::Zeroize;

/// Default capacity of the receive buffer in bytes.
pub const RX_MAX_LEN: usize = 2048;

/// Default silence after which unterminated input is released as a line.
pub const RX_QUIET_PERIOD: Duration = Duration::from_millis(120);

/// Returns true for the bytes that terminate a line.
#[inline]
fn is_delimiter(byte: u8) -> bool {
    byte == b'\n' || byte == b'\r'
}

/// Accumulates raw chunks and emits complete, trimmed lines.
#[derive(Debug)]
pub struct LineBuffer {
    /// Bytes received but not yet emitted as a line.
    pending: Vec<u8>,
    /// Capacity bound for `pending`.
    max_len: usize,
    /// When the last non-empty chunk arrived.
    last_append_at: Option<Instant>,
}

impl LineBuffer {
    /// Create a buffer holding at most `max_len` bytes.
    pub fn new(max_len: usize) -> Self {
        Self {
            pending: Vec::new(),
            max_len,
            last_append_at: None,
        }
    }

    /// Create a buffer with the default capacity ([`RX_MAX_LEN`]).
    pub fn with_defaults() -> Self {
        Self::new(RX_MAX_LEN)
    }

    /// Append a chunk received at `now`.
    ///
    /// If the chunk does not fit, the previously buffered bytes are discarded
    /// first. A chunk that exceeds the capacity on its own is discarded as
    /// well. Empty chunks are ignored and do not count as activity.
    pub fn append(&mut self, chunk: &[u8], now: Instant) {
        if chunk.is_empty() {
            return;
        }

        if self.pending.len() + chunk.len() > self.max_len {
            warn!(
                "RX buffer overflow ({} + {} > {} bytes), discarding buffered input",
                self.pending.len(),
                chunk.len(),
                self.max_len
            );
            self.clear();
        }

        // Invariant: pending never exceeds max_len
        if chunk.len() > self.max_len {
            warn!(
                "Discarding oversized chunk: {} bytes (max {})",
                chunk.len(),
                self.max_len
            );
            return;
        }

        self.pending.extend_from_slice(chunk);
        self.last_append_at = Some(now);
    }

    /// Split off every complete line currently buffered.
    ///
    /// Lines come out in arrival order, trimmed; lines that are empty after
    /// trimming are dropped. Bytes after the last delimiter stay buffered.
    pub fn drain_lines(&mut self) -> Vec<String> {
        let mut lines = Vec::new();

        while let Some(pos) = self.pending.iter().position(|&b| is_delimiter(b)) {
            // Collapse the whole CR/LF run into one delimiter
            let mut end = pos + 1;
            while end < self.pending.len() && is_delimiter(self.pending[end]) {
                end += 1;
            }

            let mut raw: Vec<u8> = self.pending.drain(..end).collect();
            if let Some(line) = Self::to_line(&raw[..pos]) {
                lines.push(line);
            }
            raw.zeroize();
        }

        lines
    }

    /// Release unterminated input once the writer has been quiet long enough.
    ///
    /// Fires only when `now - last append > quiet_period`. The whole buffer is
    /// emitted as one trimmed line and cleared; whitespace-only input is
    /// cleared without producing a line.
    pub fn flush_if_quiet(&mut self, now: Instant, quiet_period: Duration) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }

        let last = self.last_append_at?;
        if now.saturating_duration_since(last) <= quiet_period {
            return None;
        }

        let line = Self::to_line(&self.pending);
        self.clear();
        line
    }

    /// Number of bytes currently buffered.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Check if nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Capacity of the buffer in bytes.
    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Discard everything buffered.
    ///
    /// The discarded bytes may hold a password, so they are zeroed first.
    pub fn clear(&mut self) {
        self.pending.zeroize();
        self.last_append_at = None;
    }

    /// Convert raw bytes into a trimmed line, or `None` if nothing is left.
    fn to_line(bytes: &[u8]) -> Option<String> {
        let text = String::from_utf8_lossy(bytes);
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::with_defaults()
    }
}
