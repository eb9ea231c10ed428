//! Provisioning session state machine.
//!
//! A session owns the RX line buffer and the provisioning window. The host
//! drives it from a single loop:
//!
//! ```text
//!   begin(ttl) ──> Listening ──(TTL expired / stop / join OK + 1 tick)──> Closed
//!                    │  ▲
//!          on_bytes  │  │ notifications
//!                    ▼  │
//!             LineBuffer ─> Command ─> dispatch ─> NetworkJoin / CredentialStore
//! ```
//!
//! Everything runs to completion on the caller's thread. The one long call is
//! a credential join, which blocks for at most the configured join timeout.
//! No other command is processed meanwhile. Hosts that receive BLE writes on
//! another thread must funnel them to the session through a single queue.
//!
//! # Example
//!
//! ```
//! use wifi_provision_esp32::network::HostNetwork;
//! use wifi_provision_esp32::persistence::{CredentialStore, MemoryCredentialStore};
//! use wifi_provision_esp32::session::{ProvisioningSession, SessionState, Transport, TransportError};
//! use wifi_provision_esp32::ProvisionConfig;
//! use std::time::{Duration, Instant};
//!
//! #[derive(Default)]
//! struct Console(Vec<String>);
//!
//! impl Transport for Console {
//!     fn start(&mut self) -> Result<(), TransportError> { Ok(()) }
//!     fn stop(&mut self) {}
//!     fn notify(&mut self, message: &str) { self.0.push(message.to_string()); }
//! }
//!
//! let network = HostNetwork::new().with_access_point("Home", "pw");
//! let mut session = ProvisioningSession::new(
//!     Console::default(),
//!     network,
//!     MemoryCredentialStore::new(),
//!     ProvisionConfig::default(),
//! );
//!
//! let now = Instant::now();
//! session.begin(Duration::from_secs(180), now).unwrap();
//! session.on_bytes(b"ssid=Home;pass=pw\n", now);
//!
//! assert_eq!(session.transport().0[0], "TRY:Home");
//! assert!(session.transport().0[1].starts_with("OK "));
//! assert!(session.store().load().is_some());
//!
//! session.tick(now);
//! assert_eq!(session.state(), SessionState::Closed);
//! ```

use crate::ble::LineBuffer;
use crate::command::{Command, Notification};
use crate::config::{ProvisionConfig, WifiConfig};
use crate::network::{JoinLimits, NetworkJoin};
use crate::persistence::CredentialStore;
use log::{debug, info, warn};
use std::fmt;
use std::time::{Duration, Instant};

/// Outbound side of the provisioning channel (e.g. a BLE UART service).
pub trait Transport {
    /// Bring the transport up (start the GATT service and advertise).
    fn start(&mut self) -> Result<(), TransportError>;

    /// Tear the transport down.
    fn stop(&mut self);

    /// Send one text notification to the connected client.
    fn notify(&mut self, message: &str);

    /// Make the device discoverable again after a client left.
    fn resume_advertising(&mut self) {}
}

/// Visual (or other) signal that a join attempt is in progress.
pub trait StatusIndicator {
    /// Switch the indicator on or off.
    fn set_active(&mut self, active: bool);
}

/// Errors from bringing up a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The underlying stack failed to initialise.
    InitFailed(String),
    /// Advertising could not be started.
    AdvertisingFailed(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InitFailed(msg) => write!(f, "transport init failed: {}", msg),
            Self::AdvertisingFailed(msg) => write!(f, "advertising failed: {}", msg),
        }
    }
}

impl std::error::Error for TransportError {}

/// Lifecycle state of a provisioning session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Never started.
    Idle,
    /// Transport up, accepting commands.
    Listening,
    /// Transport torn down; a new `begin` is required.
    Closed,
}

/// When the provisioning window closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Deadline {
    /// Stays open until stopped.
    Never,
    /// Closes on the first tick strictly after this instant.
    At(Instant),
    /// Closes on the next tick, whatever the time.
    NextTick,
}

/// Provisioning session over a transport, a join engine and a credential store.
pub struct ProvisioningSession<T, N, S> {
    transport: T,
    network: N,
    store: S,
    indicator: Option<Box<dyn StatusIndicator>>,
    config: ProvisionConfig,
    rx: LineBuffer,
    state: SessionState,
    deadline: Deadline,
}

impl<T, N, S> ProvisioningSession<T, N, S>
where
    T: Transport,
    N: NetworkJoin,
    S: CredentialStore,
{
    /// Create an idle session.
    pub fn new(transport: T, network: N, store: S, config: ProvisionConfig) -> Self {
        let rx = LineBuffer::new(config.rx_max_len);
        Self {
            transport,
            network,
            store,
            indicator: None,
            config,
            rx,
            state: SessionState::Idle,
            deadline: Deadline::Never,
        }
    }

    /// Attach an indicator that is lit while a join attempt runs.
    pub fn with_indicator(mut self, indicator: impl StatusIndicator + 'static) -> Self {
        self.indicator = Some(Box::new(indicator));
        self
    }

    /// Open the provisioning window.
    ///
    /// A `ttl` of zero keeps the window open until [`stop`](Self::stop) or a
    /// successful join. Calling `begin` on an open session only re-arms the
    /// deadline.
    pub fn begin(&mut self, ttl: Duration, now: Instant) -> Result<(), TransportError> {
        if self.state != SessionState::Listening {
            info!("Starting provisioning window");
            self.transport.start()?;
            self.rx.clear();
            self.state = SessionState::Listening;
        }

        self.deadline = if ttl.is_zero() {
            Deadline::Never
        } else {
            Deadline::At(now + ttl)
        };
        match self.deadline {
            Deadline::At(_) => info!("Provisioning window open for {:?}", ttl),
            _ => info!("Provisioning window open (no expiry)"),
        }
        Ok(())
    }

    /// Advance the session: expire the window, then flush quiet input.
    ///
    /// Must be called often enough for the quiet period and TTL to be
    /// observed with acceptable latency.
    pub fn tick(&mut self, now: Instant) {
        if self.state != SessionState::Listening {
            return;
        }

        match self.deadline {
            Deadline::NextTick => {
                info!("Provisioning complete, closing window");
                self.close();
                return;
            }
            Deadline::At(deadline) if now > deadline => {
                info!("Provisioning window TTL expired, closing");
                self.close();
                return;
            }
            _ => {}
        }

        if let Some(line) = self.rx.flush_if_quiet(now, self.config.rx_quiet_period) {
            debug!("Flushing unterminated input after quiet period");
            self.handle_line(&line);
        }
    }

    /// Close the window on request. Cancels any pending deadline.
    pub fn stop(&mut self) {
        if self.state == SessionState::Listening {
            info!("Provisioning window stopped");
            self.close();
        }
    }

    /// Feed one raw chunk written by the client.
    ///
    /// Every line completed by the chunk is dispatched in order.
    pub fn on_bytes(&mut self, chunk: &[u8], now: Instant) {
        if self.state != SessionState::Listening {
            debug!("Ignoring {} bytes: session not listening", chunk.len());
            return;
        }

        self.rx.append(chunk, now);
        for line in self.rx.drain_lines() {
            self.handle_line(&line);
        }
    }

    /// A client connected to the transport.
    pub fn on_connect(&mut self) {
        info!("Central connected");
    }

    /// The client disconnected. Partial input is dropped and the device
    /// becomes discoverable again.
    pub fn on_disconnect(&mut self) {
        info!("Central disconnected");
        self.rx.clear();
        if self.state == SessionState::Listening {
            self.transport.resume_advertising();
        }
    }

    /// Drop partially reassembled input, e.g. after writes were lost.
    pub fn discard_input(&mut self) {
        if !self.rx.is_empty() {
            warn!("Discarding {} bytes of partial input", self.rx.len());
        }
        self.rx.clear();
    }

    /// Execute one command. Ignored unless the session is listening.
    pub fn dispatch(&mut self, command: Command) {
        if self.state != SessionState::Listening {
            debug!("Ignoring {:?}: session not listening", command);
            return;
        }

        match command {
            Command::Status => {
                let address = if self.network.is_connected() {
                    self.network.current_address()
                } else {
                    None
                };
                self.notify(Notification::Status(address));
            }
            Command::Clear => {
                self.network.disconnect(true);
                if let Err(e) = self.store.erase() {
                    warn!("Failed to erase saved credentials: {}", e);
                }
                self.notify(Notification::Cleared);
            }
            Command::SetCredentials { ssid, pass } => {
                self.notify(Notification::Trying { ssid: ssid.clone() });
                match WifiConfig::new(ssid, pass) {
                    Ok(config) => self.join(&config),
                    Err(e) => {
                        warn!("Rejected credentials: {}", e);
                        self.notify(Notification::Failed);
                    }
                }
            }
            Command::Unknown { raw } => {
                debug!("Unknown command: {:?}", raw);
                self.notify(Notification::UnknownCommand);
            }
        }
    }

    /// Try the credentials the join engine has saved.
    ///
    /// Used at boot, before deciding whether a provisioning window is needed.
    pub fn reconnect_saved(&mut self) -> bool {
        info!("Trying saved WiFi credentials");
        self.network.try_last_saved(self.config.join_limits())
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Check if the session accepts commands.
    pub fn is_active(&self) -> bool {
        self.state == SessionState::Listening
    }

    /// Bytes waiting in the RX buffer for a delimiter or the quiet period.
    pub fn pending_input(&self) -> usize {
        self.rx.len()
    }

    /// Session configuration.
    pub fn config(&self) -> &ProvisionConfig {
        &self.config
    }

    /// The transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The join engine.
    pub fn network(&self) -> &N {
        &self.network
    }

    /// The credential store.
    pub fn store(&self) -> &S {
        &self.store
    }

    fn handle_line(&mut self, line: &str) {
        let command = Command::parse(line);
        debug!("RX command: {:?}", command);
        self.dispatch(command);
    }

    /// Bounded join attempt; on success save and close on the next tick.
    fn join(&mut self, config: &WifiConfig) {
        info!("Trying WiFi '{}' (bound {:?})", config.ssid, self.config.join_timeout);

        self.set_indicator(true);
        let connected = self.network.try_connect(config, self.config.join_limits());
        self.set_indicator(false);

        if !connected {
            info!("Join of '{}' failed", config.ssid);
            self.notify(Notification::Failed);
            return;
        }

        if let Err(e) = self.store.save(config) {
            warn!("Joined '{}' but failed to save credentials: {}", config.ssid, e);
        }
        let ip = self.network.current_address();
        self.notify(Notification::Connected { ip });

        // One tick of grace lets the transport flush the OK notification
        self.deadline = Deadline::NextTick;
    }

    fn set_indicator(&mut self, active: bool) {
        if let Some(indicator) = self.indicator.as_mut() {
            indicator.set_active(active);
        }
    }

    fn notify(&mut self, notification: Notification) {
        let message = notification.to_ble_string();
        info!("[BLE] {}", message);
        self.transport.notify(&message);
    }

    fn close(&mut self) {
        self.transport.stop();
        self.rx.clear();
        self.deadline = Deadline::Never;
        self.state = SessionState::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::{BleEvent, BleEventQueue};
    use crate::network::test_clock::FakeClock;
    use crate::network::HostNetwork;
    use crate::persistence::MemoryCredentialStore;
    use std::cell::RefCell;
    use std::net::{IpAddr, Ipv4Addr};
    use std::rc::Rc;

    const ADDR: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7));

    #[derive(Default)]
    struct RecordingTransport {
        notifications: Vec<String>,
        starts: usize,
        stops: usize,
        advertising_restarts: usize,
        fail_start: bool,
    }

    impl Transport for RecordingTransport {
        fn start(&mut self) -> Result<(), TransportError> {
            if self.fail_start {
                return Err(TransportError::InitFailed("no controller".into()));
            }
            self.starts += 1;
            Ok(())
        }

        fn stop(&mut self) {
            self.stops += 1;
        }

        fn notify(&mut self, message: &str) {
            self.notifications.push(message.to_string());
        }

        fn resume_advertising(&mut self) {
            self.advertising_restarts += 1;
        }
    }

    /// Join engine whose outcome is fixed up front.
    #[derive(Default)]
    struct ScriptedNetwork {
        succeed: bool,
        connected: bool,
        attempts: Vec<(String, String, JoinLimits)>,
        saved_attempts: usize,
        disconnects: Vec<bool>,
    }

    impl ScriptedNetwork {
        fn succeeding() -> Self {
            Self {
                succeed: true,
                ..Self::default()
            }
        }

        fn failing() -> Self {
            Self::default()
        }
    }

    impl NetworkJoin for ScriptedNetwork {
        fn try_connect(&mut self, config: &WifiConfig, limits: JoinLimits) -> bool {
            self.attempts
                .push((config.ssid.clone(), config.password.clone(), limits));
            self.connected = self.succeed;
            self.succeed
        }

        fn try_last_saved(&mut self, _limits: JoinLimits) -> bool {
            self.saved_attempts += 1;
            self.connected = self.succeed;
            self.succeed
        }

        fn current_address(&self) -> Option<IpAddr> {
            self.connected.then_some(ADDR)
        }

        fn is_connected(&self) -> bool {
            self.connected
        }

        fn disconnect(&mut self, erase_config: bool) {
            self.connected = false;
            self.disconnects.push(erase_config);
        }
    }

    struct SharedIndicator(Rc<RefCell<Vec<bool>>>);

    impl StatusIndicator for SharedIndicator {
        fn set_active(&mut self, active: bool) {
            self.0.borrow_mut().push(active);
        }
    }

    type TestSession = ProvisioningSession<RecordingTransport, ScriptedNetwork, MemoryCredentialStore>;

    fn session(network: ScriptedNetwork) -> TestSession {
        ProvisioningSession::new(
            RecordingTransport::default(),
            network,
            MemoryCredentialStore::new(),
            ProvisionConfig::default(),
        )
    }

    fn set(ssid: &str, pass: &str) -> Command {
        Command::SetCredentials {
            ssid: ssid.to_string(),
            pass: pass.to_string(),
        }
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    // ==================== Lifecycle Tests ====================

    #[test]
    fn test_begin_starts_transport() {
        let mut s = session(ScriptedNetwork::failing());
        assert_eq!(s.state(), SessionState::Idle);

        s.begin(Duration::ZERO, Instant::now()).unwrap();
        assert_eq!(s.state(), SessionState::Listening);
        assert_eq!(s.transport().starts, 1);
    }

    #[test]
    fn test_begin_failure_stays_idle() {
        let mut s = session(ScriptedNetwork::failing());
        s.transport.fail_start = true;

        assert!(s.begin(Duration::ZERO, Instant::now()).is_err());
        assert_eq!(s.state(), SessionState::Idle);
    }

    #[test]
    fn test_ttl_expiry_closes_session() {
        let mut s = session(ScriptedNetwork::failing());
        let start = Instant::now();
        s.begin(ms(5000), start).unwrap();

        s.tick(start + ms(5000));
        assert_eq!(s.state(), SessionState::Listening);

        s.tick(start + ms(5001));
        assert_eq!(s.state(), SessionState::Closed);
        assert_eq!(s.transport().stops, 1);
    }

    #[test]
    fn test_zero_ttl_never_expires() {
        let mut s = session(ScriptedNetwork::failing());
        let start = Instant::now();
        s.begin(Duration::ZERO, start).unwrap();
        s.tick(start + Duration::from_secs(24 * 3600));
        assert!(s.is_active());
    }

    #[test]
    fn test_stop_closes_and_cancels_deadline() {
        let mut s = session(ScriptedNetwork::failing());
        let start = Instant::now();
        s.begin(ms(5000), start).unwrap();

        s.stop();
        assert_eq!(s.state(), SessionState::Closed);
        assert_eq!(s.transport().stops, 1);

        // Expired deadline no longer fires a second teardown
        s.tick(start + ms(10_000));
        assert_eq!(s.transport().stops, 1);

        // Stopping a closed session is a no-op
        s.stop();
        assert_eq!(s.transport().stops, 1);
    }

    #[test]
    fn test_closed_session_ignores_input() {
        let mut s = session(ScriptedNetwork::failing());
        let start = Instant::now();
        s.begin(Duration::ZERO, start).unwrap();
        s.stop();

        s.on_bytes(b"STATUS\n", start);
        s.dispatch(Command::Status);
        assert!(s.transport().notifications.is_empty());
        assert_eq!(s.pending_input(), 0);
    }

    #[test]
    fn test_begin_reopens_closed_session() {
        let mut s = session(ScriptedNetwork::failing());
        let start = Instant::now();
        s.begin(ms(100), start).unwrap();
        s.tick(start + ms(200));
        assert_eq!(s.state(), SessionState::Closed);

        s.begin(ms(100), start + ms(300)).unwrap();
        assert!(s.is_active());
        assert_eq!(s.transport().starts, 2);
    }

    #[test]
    fn test_begin_while_listening_rearms_deadline() {
        let mut s = session(ScriptedNetwork::failing());
        let start = Instant::now();
        s.begin(ms(100), start).unwrap();
        s.begin(ms(1000), start + ms(50)).unwrap();
        assert_eq!(s.transport().starts, 1);

        s.tick(start + ms(500));
        assert!(s.is_active());
        s.tick(start + ms(1051));
        assert_eq!(s.state(), SessionState::Closed);
    }

    // ==================== Command Tests ====================

    #[test]
    fn test_set_credentials_success_closes_on_next_tick() {
        let mut s = session(ScriptedNetwork::succeeding());
        let start = Instant::now();
        s.begin(Duration::ZERO, start).unwrap();

        s.dispatch(set("Home", "pw"));
        assert_eq!(s.transport().notifications, vec!["TRY:Home", "OK 10.0.0.7"]);
        assert_eq!(s.store().load(), Some(WifiConfig::new("Home", "pw").unwrap()));
        assert_eq!(s.store().save_count(), 1);

        // One tick of grace: still listening right after the OK
        assert!(s.is_active());
        s.tick(start);
        assert_eq!(s.state(), SessionState::Closed);
        assert_eq!(s.transport().stops, 1);
    }

    #[test]
    fn test_set_credentials_failure_keeps_listening() {
        let mut s = session(ScriptedNetwork::failing());
        let start = Instant::now();
        s.begin(Duration::ZERO, start).unwrap();

        s.dispatch(set("Home", "pw"));
        assert_eq!(s.transport().notifications, vec!["TRY:Home", "FAIL"]);
        assert!(s.store().load().is_none());
        assert_eq!(s.store().save_count(), 0);

        s.tick(start + ms(1000));
        assert!(s.is_active());
    }

    #[test]
    fn test_join_uses_configured_bound() {
        let mut s = ProvisioningSession::new(
            RecordingTransport::default(),
            ScriptedNetwork::failing(),
            MemoryCredentialStore::new(),
            ProvisionConfig::default()
                .with_join_timeout(ms(3000))
                .with_join_poll_interval(ms(500)),
        );
        s.begin(Duration::ZERO, Instant::now()).unwrap();
        s.dispatch(set("Lab", "a;b"));

        assert_eq!(
            s.network().attempts,
            vec![(
                "Lab".to_string(),
                "a;b".to_string(),
                JoinLimits::new(ms(3000), ms(500))
            )]
        );
    }

    #[test]
    fn test_join_polls_at_configured_interval() {
        let network = HostNetwork::with_clock(FakeClock::new()).with_access_point("Home", "pw");
        let mut s = ProvisioningSession::new(
            RecordingTransport::default(),
            network,
            MemoryCredentialStore::new(),
            ProvisionConfig::default()
                .with_join_timeout(ms(2500))
                .with_join_poll_interval(ms(1000)),
        );
        s.begin(Duration::ZERO, Instant::now()).unwrap();
        s.on_bytes(b"ssid=Home;pass=bad\n", Instant::now());

        assert_eq!(s.transport().notifications, vec!["TRY:Home", "FAIL"]);
        assert_eq!(
            *s.network().clock().sleeps.borrow(),
            vec![ms(1000), ms(1000), ms(500)]
        );
    }

    #[test]
    fn test_invalid_credentials_skip_join() {
        let mut s = session(ScriptedNetwork::succeeding());
        s.begin(Duration::ZERO, Instant::now()).unwrap();

        let long_ssid = "x".repeat(40);
        s.dispatch(set(&long_ssid, "pw"));
        assert_eq!(
            s.transport().notifications,
            vec![format!("TRY:{}", long_ssid), "FAIL".to_string()]
        );
        assert!(s.network().attempts.is_empty());
        assert!(s.is_active());
    }

    #[test]
    fn test_indicator_lit_during_join() {
        let events = Rc::new(RefCell::new(Vec::new()));
        let mut s = session(ScriptedNetwork::failing()).with_indicator(SharedIndicator(events.clone()));
        s.begin(Duration::ZERO, Instant::now()).unwrap();

        s.dispatch(Command::Status);
        assert!(events.borrow().is_empty());

        s.dispatch(set("Home", "pw"));
        assert_eq!(*events.borrow(), vec![true, false]);
    }

    #[test]
    fn test_status_reports_address_or_disconnected() {
        let mut s = session(ScriptedNetwork::failing());
        s.begin(Duration::ZERO, Instant::now()).unwrap();

        s.dispatch(Command::Status);
        s.network.connected = true;
        s.dispatch(Command::Status);

        assert_eq!(
            s.transport().notifications,
            vec!["WIFI:DISCONNECTED", "10.0.0.7"]
        );
    }

    #[test]
    fn test_clear_erases_and_disconnects() {
        let mut s = ProvisioningSession::new(
            RecordingTransport::default(),
            ScriptedNetwork {
                connected: true,
                ..ScriptedNetwork::default()
            },
            MemoryCredentialStore::with_saved(WifiConfig::new("Home", "pw").unwrap()),
            ProvisionConfig::default(),
        );
        s.begin(Duration::ZERO, Instant::now()).unwrap();

        s.dispatch(Command::Clear);
        assert_eq!(s.store().erase_count(), 1);
        assert!(s.store().load().is_none());
        assert_eq!(s.network().disconnects, vec![true]);
        assert!(!s.network().is_connected());
        assert_eq!(s.transport().notifications, vec!["CLEARED"]);
    }

    #[test]
    fn test_unknown_command() {
        let mut s = session(ScriptedNetwork::failing());
        s.begin(Duration::ZERO, Instant::now()).unwrap();

        s.dispatch(Command::parse("reboot"));
        assert_eq!(s.transport().notifications, vec!["ERR:UNKNOWN_CMD"]);
        assert!(s.is_active());
    }

    #[test]
    fn test_reconnect_saved_delegates_to_network() {
        let mut s = session(ScriptedNetwork::succeeding());
        assert!(s.reconnect_saved());
        assert_eq!(s.network().saved_attempts, 1);
    }

    // ==================== Input Path Tests ====================

    #[test]
    fn test_fragmented_write_is_dispatched() {
        let mut s = session(ScriptedNetwork::succeeding());
        let now = Instant::now();
        s.begin(Duration::ZERO, now).unwrap();

        s.on_bytes(b"ssid=Ho", now);
        s.on_bytes(b"me;pass=p", now);
        assert!(s.transport().notifications.is_empty());

        s.on_bytes(b"w\r\n", now);
        assert_eq!(s.transport().notifications, vec!["TRY:Home", "OK 10.0.0.7"]);
        assert_eq!(s.network().attempts[0].1, "pw");
    }

    #[test]
    fn test_lines_dispatched_in_order() {
        let mut s = session(ScriptedNetwork::failing());
        let now = Instant::now();
        s.begin(Duration::ZERO, now).unwrap();

        s.on_bytes(b"STATUS\nbogus\rCLEAR\r\n", now);
        assert_eq!(
            s.transport().notifications,
            vec!["WIFI:DISCONNECTED", "ERR:UNKNOWN_CMD", "CLEARED"]
        );
    }

    #[test]
    fn test_quiet_flush_dispatches_unterminated_command() {
        let mut s = session(ScriptedNetwork::failing());
        let start = Instant::now();
        s.begin(Duration::ZERO, start).unwrap();

        s.on_bytes(b"STATUS", start);
        s.tick(start + ms(100));
        assert!(s.transport().notifications.is_empty());

        s.tick(start + ms(121));
        assert_eq!(s.transport().notifications, vec!["WIFI:DISCONNECTED"]);
        assert_eq!(s.pending_input(), 0);
    }

    #[test]
    fn test_expiring_tick_does_not_flush() {
        let mut s = session(ScriptedNetwork::failing());
        let start = Instant::now();
        s.begin(ms(50), start).unwrap();

        s.on_bytes(b"STATUS", start);
        s.tick(start + ms(500));
        assert_eq!(s.state(), SessionState::Closed);
        assert!(s.transport().notifications.is_empty());
    }

    #[test]
    fn test_disconnect_drops_partial_input() {
        let mut s = session(ScriptedNetwork::failing());
        let start = Instant::now();
        s.begin(Duration::ZERO, start).unwrap();

        s.on_connect();
        s.on_bytes(b"ssid=Home;pa", start);
        s.on_disconnect();
        assert_eq!(s.pending_input(), 0);
        assert_eq!(s.transport().advertising_restarts, 1);

        s.tick(start + ms(1000));
        assert!(s.transport().notifications.is_empty());
    }

    #[test]
    fn test_event_queue_delivery() {
        let mut s = session(ScriptedNetwork::failing());
        let now = Instant::now();
        s.begin(Duration::ZERO, now).unwrap();

        let queue = BleEventQueue::new(8);
        queue.push(BleEvent::Connected);
        queue.push(BleEvent::Data(b"CLE".to_vec()));
        queue.push(BleEvent::Overrun);
        queue.push(BleEvent::Data(b"STATUS\n".to_vec()));
        queue.deliver_to(&mut s, now);

        // The overrun dropped "CLE" before STATUS completed
        assert_eq!(s.transport().notifications, vec!["WIFI:DISCONNECTED"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_loop_iteration_keeps_transport_up_after_ok() {
        let mut s = session(ScriptedNetwork::succeeding());
        let t0 = Instant::now();
        s.begin(Duration::ZERO, t0).unwrap();

        let queue = BleEventQueue::new(8);
        queue.push(BleEvent::Data(b"ssid=Home;pass=pw\n".to_vec()));
        queue.pump(&mut s, t0);

        // OK went out; teardown waits for the next iteration
        assert_eq!(s.transport().notifications, vec!["TRY:Home", "OK 10.0.0.7"]);
        assert_eq!(s.transport().stops, 0);
        assert!(s.is_active());

        queue.pump(&mut s, t0 + ms(10));
        assert_eq!(s.transport().stops, 1);
        assert_eq!(s.state(), SessionState::Closed);
    }

    #[test]
    fn test_overflow_discards_without_notification() {
        let mut s = ProvisioningSession::new(
            RecordingTransport::default(),
            ScriptedNetwork::failing(),
            MemoryCredentialStore::new(),
            ProvisionConfig::default().with_rx_max_len(16),
        );
        let now = Instant::now();
        s.begin(Duration::ZERO, now).unwrap();

        s.on_bytes(b"garbage-garbage", now);
        s.on_bytes(b"STATUS\n", now);
        assert_eq!(s.transport().notifications, vec!["WIFI:DISCONNECTED"]);
    }
}
