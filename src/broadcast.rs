//! # Broadcast Module
//!
//! One-to-many fan-out with per-subscriber bounded queues.
//!
//! ## Overview
//!
//! A [`Broadcast`] publisher owns a set of subscriber channels. Each
//! [`Subscription`] is a single-consumer queue bounded at subscribe time:
//! a publish clones the value into every live queue, and a queue that is
//! already full silently drops that value *for that subscriber only* —
//! publishing never blocks on a slow consumer. Dropped values are counted
//! for observability.
//!
//! ## Ordering
//!
//! Values delivered to one subscriber arrive in publish order. No ordering
//! is guaranteed across subscribers.
//!
//! ## Teardown
//!
//! Dropping a subscription (or calling [`Subscription::unsubscribe`])
//! removes it from the publisher and wakes any pending `recv` with `None`.
//! Dropping the publisher closes every subscriber queue the same way.
//! Subscribers that disappear without unsubscribing are pruned on the next
//! publish.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};

use may::sync::mpsc;
use tracing::debug;

const DEFAULT_SUBSCRIBER_CAPACITY: usize = 64;

struct SubscriberSlot<T> {
    id: u64,
    tx: mpsc::Sender<T>,
    depth: Arc<AtomicUsize>,
    capacity: usize,
}

struct Shared<T> {
    subscribers: Mutex<Vec<SubscriberSlot<T>>>,
    next_id: AtomicU64,
    dropped: AtomicU64,
    default_capacity: usize,
}

/// Fan-out publisher with per-subscriber bounded queues.
pub struct Broadcast<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Default for Broadcast<T> {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_CAPACITY)
    }
}

impl<T> Broadcast<T> {
    /// Create a publisher whose subscribers default to queues of
    /// `default_capacity` values.
    pub fn new(default_capacity: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                subscribers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
                default_capacity,
            }),
        }
    }

    /// Register a subscriber with the publisher's default queue capacity.
    pub fn subscribe(&self) -> Subscription<T> {
        self.subscribe_with_capacity(self.shared.default_capacity)
    }

    /// Register a subscriber with an explicit queue capacity.
    pub fn subscribe_with_capacity(&self, capacity: usize) -> Subscription<T> {
        let (tx, rx) = mpsc::channel();
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let depth = Arc::new(AtomicUsize::new(0));
        self.shared.subscribers.lock().unwrap().push(SubscriberSlot {
            id,
            tx,
            depth: depth.clone(),
            capacity,
        });
        debug!(subscriber_id = id, capacity = capacity, "subscriber added");
        Subscription {
            id,
            rx,
            depth,
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Number of currently registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.shared.subscribers.lock().unwrap().len()
    }

    /// Total values dropped because a subscriber's queue was full.
    pub fn dropped_count(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }
}

impl<T: Clone> Broadcast<T> {
    /// Publish a value to every subscriber.
    ///
    /// Full queues drop the value for that subscriber; subscribers whose
    /// receiving half is gone are pruned. Returns how many subscribers the
    /// value was delivered to.
    pub fn send(&self, value: T) -> usize {
        let mut delivered = 0;
        let mut subscribers = self.shared.subscribers.lock().unwrap();
        subscribers.retain(|slot| {
            if slot.depth.load(Ordering::Acquire) >= slot.capacity {
                self.shared.dropped.fetch_add(1, Ordering::Relaxed);
                debug!(subscriber_id = slot.id, "subscriber queue full, value dropped");
                return true;
            }
            slot.depth.fetch_add(1, Ordering::AcqRel);
            match slot.tx.send(value.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(_) => {
                    debug!(subscriber_id = slot.id, "subscriber gone, pruned");
                    false
                }
            }
        });
        delivered
    }
}

/// The consuming half of one subscriber queue.
///
/// Exactly one of [`unsubscribe`](Subscription::unsubscribe) or a plain
/// drop ends the registration; both are equivalent and wake any later
/// `recv` with `None`.
pub struct Subscription<T> {
    id: u64,
    rx: mpsc::Receiver<T>,
    depth: Arc<AtomicUsize>,
    shared: Weak<Shared<T>>,
}

impl<T> Subscription<T> {
    /// Wait cooperatively for the next value.
    ///
    /// `None` means the channel is closed: the publisher went away or this
    /// subscription was removed.
    pub fn recv(&self) -> Option<T> {
        match self.rx.recv() {
            Ok(value) => {
                self.depth.fetch_sub(1, Ordering::AcqRel);
                Some(value)
            }
            Err(_) => None,
        }
    }

    /// Non-blocking variant of [`recv`](Subscription::recv); `None` when
    /// the queue is currently empty or closed.
    pub fn try_recv(&self) -> Option<T> {
        match self.rx.try_recv() {
            Ok(value) => {
                self.depth.fetch_sub(1, Ordering::AcqRel);
                Some(value)
            }
            Err(_) => None,
        }
    }

    /// Remove this subscription from the publisher.
    pub fn unsubscribe(self) {
        // Drop does the work.
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            shared
                .subscribers
                .lock()
                .unwrap()
                .retain(|slot| slot.id != self.id);
            debug!(subscriber_id = self.id, "subscriber removed");
        }
    }
}
