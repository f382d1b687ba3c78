//! Subscriber registry and fan-out.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// A relayed line. Cloning shares the allocation between subscribers.
pub type Line = std::sync::Arc<str>;

/// Default number of lines buffered per subscriber.
pub const DEFAULT_SUBSCRIBER_QUEUE: usize = 64;

/// Identity of a registered subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Read side of one subscriber's queue.
///
/// [`Subscription::recv`] returns `None` once the subscriber has been removed
/// from the registry and every line queued before that has been read.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    rx: mpsc::Receiver<Line>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub async fn recv(&mut self) -> Option<Line> {
        self.rx.recv().await
    }
}

/// Replicates lines to every registered subscriber.
///
/// Each subscriber has its own bounded queue. [`Broadcaster::publish`] never
/// waits: a subscriber whose queue is full misses that line, and everybody
/// else is unaffected.
#[derive(Debug)]
pub struct Broadcaster {
    subscribers: RwLock<HashMap<SubscriberId, mpsc::Sender<Line>>>,
    next_id: AtomicU64,
    queue_capacity: usize,
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_QUEUE)
    }
}

impl Broadcaster {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            queue_capacity: queue_capacity.max(1),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<SubscriberId, mpsc::Sender<Line>>> {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<SubscriberId, mpsc::Sender<Line>>> {
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new subscriber. It sees lines published from now on.
    pub fn subscribe(&self) -> Subscription {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        self.write().insert(id, tx);
        Subscription { id, rx }
    }

    /// Remove a subscriber and close its queue.
    ///
    /// Returns `false` if it was already removed.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.write().remove(&id).is_some()
    }

    /// Offer `line` to every subscriber. Returns how many queues accepted it.
    pub fn publish(&self, line: &Line) -> usize {
        let subscribers = self.read();
        let mut delivered = 0;
        for (id, tx) in subscribers.iter() {
            match tx.try_send(line.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::trace!(subscriber = %id, "subscriber queue full, line skipped");
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::trace!(subscriber = %id, "subscriber gone, line skipped");
                }
            }
        }
        delivered
    }

    /// Remove every subscriber. Returns how many were registered.
    pub fn close(&self) -> usize {
        let mut subscribers = self.write();
        let count = subscribers.len();
        subscribers.clear();
        count
    }

    pub fn subscriber_count(&self) -> usize {
        self.read().len()
    }
}
