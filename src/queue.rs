use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam::queue::ArrayQueue;
use tokio::sync::Notify;

use crate::packet::Advertisement;

/// Bounded hand-off between the packet receiver and the decision loop.
///
/// Pushing never blocks: once full, the oldest queued advertisement is
/// dropped to make room, so a slow decision loop cannot stall the receiver.
#[derive(Debug)]
pub struct PacketQueue {
    ring: ArrayQueue<Advertisement>,
    notify: Notify,
    dropped: AtomicU64,
}

impl PacketQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: ArrayQueue::new(capacity.max(1)),
            notify: Notify::new(),
            dropped: AtomicU64::new(0),
        }
    }

    /// Returns `false` when an older advertisement had to be dropped.
    pub fn push(&self, advert: Advertisement) -> bool {
        let evicted = self.ring.force_push(advert);
        self.notify.notify_one();
        match evicted {
            Some(old) => {
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                log::debug!(
                    "packet queue full at {}, dropped advertisement from {} ({total} so far)",
                    self.capacity(),
                    old.source()
                );
                false
            }
            None => true,
        }
    }

    pub fn try_pop(&self) -> Option<Advertisement> {
        self.ring.pop()
    }

    /// Waits for the next advertisement. Cancel safe: nothing is removed
    /// from the queue until the future completes.
    pub async fn pop(&self) -> Advertisement {
        loop {
            if let Some(advert) = self.try_pop() {
                return advert;
            }
            self.notify.notified().await;
        }
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
