// Path: crates/node/src/status.rs
//! Transaction status store and broadcast bus.

use lru::LruCache;
use meridian_types::app::{Hash, TxStatus};
use std::num::NonZeroUsize;
use std::sync::Mutex;
use tokio::sync::broadcast;

const STATUS_CAPACITY: usize = 100_000;

fn is_terminal(status: TxStatus) -> bool {
    matches!(
        status,
        TxStatus::Committed
            | TxStatus::Rejected
            | TxStatus::MstExpired
            | TxStatus::StatefulValidationFailed(_)
    )
}

/// Retains the latest status per transaction hash and broadcasts every
/// transition.
pub struct StatusBus {
    statuses: Mutex<LruCache<Hash, TxStatus>>,
    tx: broadcast::Sender<(Hash, TxStatus)>,
}

impl StatusBus {
    /// Creates a bus with the default retention capacity.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1024);
        Self {
            statuses: Mutex::new(LruCache::new(
                NonZeroUsize::new(STATUS_CAPACITY).unwrap_or(NonZeroUsize::MIN),
            )),
            tx,
        }
    }

    /// Records and broadcasts a status. A terminal status is final; later
    /// pipeline stages never overwrite it.
    pub fn publish(&self, hash: Hash, status: TxStatus) {
        let mut guard = match self.statuses.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(existing) = guard.peek(&hash) {
            if is_terminal(*existing) {
                return;
            }
        }
        guard.put(hash, status);
        drop(guard);
        let _ = self.tx.send((hash, status));
    }

    /// The latest known status of a transaction.
    pub fn get(&self, hash: &Hash) -> Option<TxStatus> {
        let mut guard = match self.statuses.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.get(hash).copied()
    }

    /// Subscribes to status transitions.
    pub fn subscribe(&self) -> broadcast::Receiver<(Hash, TxStatus)> {
        self.tx.subscribe()
    }
}

impl Default for StatusBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses_are_sticky() {
        let bus = StatusBus::new();
        let hash = Hash::of(b"tx");

        bus.publish(hash, TxStatus::EnoughSignaturesCollected);
        assert_eq!(bus.get(&hash), Some(TxStatus::EnoughSignaturesCollected));

        bus.publish(hash, TxStatus::Committed);
        bus.publish(hash, TxStatus::EnoughSignaturesCollected);
        bus.publish(hash, TxStatus::Rejected);
        assert_eq!(bus.get(&hash), Some(TxStatus::Committed));
    }

    #[tokio::test]
    async fn transitions_are_broadcast() {
        let bus = StatusBus::new();
        let mut rx = bus.subscribe();
        let hash = Hash::of(b"tx");
        bus.publish(hash, TxStatus::Committed);
        assert_eq!(rx.recv().await.unwrap(), (hash, TxStatus::Committed));
    }
}
