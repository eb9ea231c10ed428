//! Hand-off of BLE callbacks to the provisioning loop.
//!
//! NimBLE invokes characteristic and server callbacks on its own host task.
//! The session must only be touched from the provisioning loop, so callbacks
//! push [`BleEvent`]s into a [`BleEventQueue`] and the loop drains it once per
//! iteration, in arrival order.

use crate::network::NetworkJoin;
use crate::persistence::CredentialStore;
use crate::session::{ProvisioningSession, Transport};
use log::warn;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

/// Default maximum number of queued events.
pub const MAX_QUEUED_EVENTS: usize = 64;

/// Something that happened on the BLE host task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BleEvent {
    /// A central connected.
    Connected,
    /// The central disconnected.
    Disconnected,
    /// The central wrote to the RX characteristic.
    Data(Vec<u8>),
    /// Events were dropped because the loop fell behind.
    Overrun,
}

/// Bounded multi-producer, single-consumer event queue.
///
/// When full, the queue collapses to an [`BleEvent::Overrun`] marker followed
/// by the most recent connection event, if any. The consumer then discards
/// partial input instead of splicing unrelated chunks together, and still
/// learns whether a client is attached. The length never exceeds the
/// capacity (at least 2).
#[derive(Debug, Clone)]
pub struct BleEventQueue {
    inner: Arc<Mutex<VecDeque<BleEvent>>>,
    capacity: usize,
}

impl BleEventQueue {
    /// Create a queue holding at most `capacity` events.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(VecDeque::new())),
            capacity: capacity.max(2),
        }
    }

    /// Queue an event (called from BLE callbacks).
    pub fn push(&self, event: BleEvent) {
        let mut queue = self.lock();
        if queue.len() < self.capacity {
            queue.push_back(event);
            return;
        }

        warn!("BLE event queue full, dropping queued events");
        let last_link = queue
            .iter()
            .rev()
            .find(|e| matches!(e, BleEvent::Connected | BleEvent::Disconnected))
            .cloned();
        queue.clear();
        queue.push_back(BleEvent::Overrun);
        match event {
            // A write after the gap cannot complete a command
            BleEvent::Data(_) | BleEvent::Overrun => queue.extend(last_link),
            link => queue.push_back(link),
        }
    }

    /// Take every queued event in arrival order.
    pub fn drain(&self) -> Vec<BleEvent> {
        self.lock().drain(..).collect()
    }

    /// Number of queued events.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Check if no events are queued.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Deliver queued events to `session`, stamping writes with `now`.
    pub fn deliver_to<T, N, S>(&self, session: &mut ProvisioningSession<T, N, S>, now: Instant)
    where
        T: Transport,
        N: NetworkJoin,
        S: CredentialStore,
    {
        for event in self.drain() {
            match event {
                BleEvent::Connected => session.on_connect(),
                BleEvent::Disconnected => session.on_disconnect(),
                BleEvent::Data(chunk) => session.on_bytes(&chunk, now),
                BleEvent::Overrun => session.discard_input(),
            }
        }
    }

    /// One iteration of the provisioning loop: tick, then deliver.
    ///
    /// Ticking first leaves a full loop period between a notification sent
    /// while handling delivered input and a close armed by that input, so
    /// the transport can flush it before teardown.
    pub fn pump<T, N, S>(&self, session: &mut ProvisioningSession<T, N, S>, now: Instant)
    where
        T: Transport,
        N: NetworkJoin,
        S: CredentialStore,
    {
        session.tick(now);
        self.deliver_to(session, now);
    }

    // A panicking producer must not wedge the provisioning loop
    fn lock(&self) -> MutexGuard<'_, VecDeque<BleEvent>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for BleEventQueue {
    fn default() -> Self {
        Self::new(MAX_QUEUED_EVENTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(bytes: &[u8]) -> BleEvent {
        BleEvent::Data(bytes.to_vec())
    }

    #[test]
    fn test_drain_preserves_order() {
        let queue = BleEventQueue::new(8);
        queue.push(BleEvent::Connected);
        queue.push(data(b"STA"));
        queue.push(data(b"TUS\n"));
        queue.push(BleEvent::Disconnected);

        assert_eq!(
            queue.drain(),
            vec![
                BleEvent::Connected,
                data(b"STA"),
                data(b"TUS\n"),
                BleEvent::Disconnected
            ]
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn test_clones_share_queue() {
        let producer = BleEventQueue::new(8);
        let consumer = producer.clone();
        producer.push(data(b"x"));
        assert_eq!(consumer.len(), 1);
    }

    #[test]
    fn test_overflow_replaces_writes_with_overrun() {
        let queue = BleEventQueue::new(3);
        queue.push(BleEvent::Connected);
        queue.push(data(b"a"));
        queue.push(data(b"b"));
        queue.push(data(b"c"));

        assert_eq!(queue.drain(), vec![BleEvent::Overrun, BleEvent::Connected]);
    }

    #[test]
    fn test_overflow_keeps_connection_events() {
        let queue = BleEventQueue::new(2);
        queue.push(data(b"a"));
        queue.push(data(b"b"));
        queue.push(BleEvent::Disconnected);

        assert_eq!(
            queue.drain(),
            vec![BleEvent::Overrun, BleEvent::Disconnected]
        );
    }

    #[test]
    fn test_link_churn_stays_within_capacity() {
        let queue = BleEventQueue::new(2);
        for _ in 0..10 {
            queue.push(BleEvent::Connected);
            assert!(queue.len() <= 2);
            queue.push(BleEvent::Disconnected);
            assert!(queue.len() <= 2);
        }

        assert_eq!(
            queue.drain(),
            vec![BleEvent::Overrun, BleEvent::Disconnected]
        );
    }

    #[test]
    fn test_overflow_without_link_events() {
        let queue = BleEventQueue::new(2);
        for chunk in [&b"a"[..], b"b", b"c", b"d"] {
            queue.push(data(chunk));
        }
        assert_eq!(queue.drain(), vec![BleEvent::Overrun, data(b"d")]);
    }

    #[test]
    fn test_push_from_other_thread() {
        let queue = BleEventQueue::default();
        let producer = queue.clone();
        std::thread::spawn(move || {
            for chunk in [&b"ssid=Home;"[..], b"pass=pw\n"] {
                producer.push(BleEvent::Data(chunk.to_vec()));
            }
        })
        .join()
        .unwrap();

        assert_eq!(queue.drain(), vec![data(b"ssid=Home;"), data(b"pass=pw\n")]);
    }
}
