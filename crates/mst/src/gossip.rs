// Path: crates/mst/src/gossip.rs
//! Gossip peer selection.
//!
//! Round-robin over a random permutation of the current ledger peers,
//! refreshed whenever the queue runs dry or the peer list changes size.

use meridian_types::app::{Peer, PublicKey};
use rand::seq::SliceRandom;
use rand::thread_rng;
use std::collections::VecDeque;

/// Selects gossip targets from the ledger peer list.
pub struct GossipPropagationStrategy {
    own_key: PublicKey,
    non_visited: VecDeque<usize>,
    last_len: usize,
}

impl GossipPropagationStrategy {
    /// Creates a strategy that never selects the peer with `own_key`.
    pub fn new(own_key: PublicKey) -> Self {
        Self {
            own_key,
            non_visited: VecDeque::new(),
            last_len: 0,
        }
    }

    fn refill(&mut self, len: usize) {
        let mut order: Vec<usize> = (0..len).collect();
        order.shuffle(&mut thread_rng());
        self.non_visited = order.into();
        self.last_len = len;
    }

    /// Picks up to `amount` peers for this tick.
    pub fn select(&mut self, peers: &[Peer], amount: usize) -> Vec<Peer> {
        let mut selected = Vec::with_capacity(amount);
        if peers.iter().all(|p| p.public_key == self.own_key) {
            return selected;
        }
        let mut guard = 0;
        while selected.len() < amount && guard < peers.len() * 2 + amount {
            guard += 1;
            if self.non_visited.is_empty() || self.last_len != peers.len() {
                self.refill(peers.len());
            }
            let Some(index) = self.non_visited.pop_front() else {
                break;
            };
            match peers.get(index) {
                Some(peer) if peer.public_key != self.own_key => selected.push(peer.clone()),
                _ => {}
            }
        }
        selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(byte: u8) -> Peer {
        Peer {
            address: format!("127.0.0.1:{}", 10000 + byte as u16),
            public_key: PublicKey([byte; 32]),
        }
    }

    #[test]
    fn visits_every_other_peer_before_repeating() {
        let peers = vec![peer(1), peer(2), peer(3), peer(4)];
        let mut strategy = GossipPropagationStrategy::new(PublicKey([1u8; 32]));

        let mut seen = std::collections::HashSet::new();
        for _ in 0..3 {
            for p in strategy.select(&peers, 1) {
                seen.insert(p.public_key);
            }
        }
        assert!(!seen.contains(&PublicKey([1u8; 32])));
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn lone_peer_selects_nobody() {
        let peers = vec![peer(1)];
        let mut strategy = GossipPropagationStrategy::new(PublicKey([1u8; 32]));
        assert!(strategy.select(&peers, 2).is_empty());
    }

    #[test]
    fn empty_ledger_selects_nobody() {
        let mut strategy = GossipPropagationStrategy::new(PublicKey([1u8; 32]));
        assert!(strategy.select(&[], 2).is_empty());
    }
}
