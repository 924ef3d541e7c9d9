// Path: crates/consensus/src/yac.rs
//! The YAC state machine.
//!
//! One instance per node. `vote` starts the timed walk over the round's
//! peer ring; `on_state` feeds inbound vote sets through the vote storage
//! and drives certificate propagation: the first appearance of a
//! certificate is pushed to the whole cluster, its second appearance
//! closes the round and emits the outcome, and any later single vote gets
//! the stored certificate back directly (repair for late peers).

use crate::cluster::ClusterOrdering;
use crate::storage::{Answer, ProposalState, YacVoteStorage};
use crate::timer::Timer;
use meridian_api::network::YacNetwork;
use meridian_crypto::KeyPair;
use meridian_types::app::{Peer, VoteMessage, YacHash};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// The YAC state machine.
pub struct Yac {
    vote_storage: Mutex<YacVoteStorage>,
    cluster: Mutex<Option<ClusterOrdering>>,
    network: Arc<dyn YacNetwork>,
    key_pair: KeyPair,
    timer: Timer,
    vote_delay: Duration,
    outcome_tx: mpsc::Sender<Answer>,
}

impl Yac {
    /// Creates the state machine; round outcomes are emitted into
    /// `outcome_tx` exactly once per resolved round.
    pub fn new(
        network: Arc<dyn YacNetwork>,
        key_pair: KeyPair,
        vote_delay: Duration,
        outcome_tx: mpsc::Sender<Answer>,
    ) -> Arc<Self> {
        Arc::new(Self {
            vote_storage: Mutex::new(YacVoteStorage::new()),
            cluster: Mutex::new(None),
            network,
            key_pair,
            timer: Timer::new(),
            vote_delay,
            outcome_tx,
        })
    }

    fn lock_storage(&self) -> std::sync::MutexGuard<'_, YacVoteStorage> {
        match self.vote_storage.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn lock_cluster(&self) -> std::sync::MutexGuard<'_, Option<ClusterOrdering>> {
        match self.cluster.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Signs `hash` and starts the vote walk over `order`.
    pub fn vote(self: &Arc<Self>, hash: YacHash, order: ClusterOrdering) {
        info!(
            round = %hash.round,
            proposal = %hash.proposal_hash,
            block = %hash.block_hash,
            peers = order.len(),
            "voting"
        );
        let vote = VoteMessage {
            signature: self.key_pair.sign(&hash.signable_bytes()),
            hash,
        };
        *self.lock_cluster() = Some(order.clone());

        let this = self.clone();
        let walk = tokio::spawn(async move {
            let round = vote.hash.round;
            let mut ring = order;
            // The walk wraps around the ring until the round resolves;
            // the timer abort on close_round is the primary cancel, the
            // resolution check covers a round resolved by a later vote.
            loop {
                if this.lock_storage().is_resolved(round) {
                    break;
                }
                let leader = ring.current_leader().clone();
                debug!(peer = %leader.public_key, "vote step");
                if let Err(e) = this.network.send_state(&leader, vec![vote.clone()]).await {
                    // The timer advances the ring regardless; no retry.
                    warn!(peer = %leader.public_key, error = %e, "vote send failed");
                }
                tokio::time::sleep(this.vote_delay).await;
                ring.switch_to_next();
            }
        });
        self.timer.schedule(walk);
    }

    /// Handles an inbound vote set from the network.
    pub async fn on_state(self: &Arc<Self>, state: Vec<VoteMessage>) {
        if state.is_empty() {
            return;
        }
        let cluster_size = match self.lock_cluster().as_ref() {
            Some(order) => order.len(),
            None => {
                warn!("vote state received before the first round; dropped");
                return;
            }
        };

        let answer = self.lock_storage().store(state.clone(), cluster_size);
        let Some(answer) = answer else {
            return;
        };
        self.apply_answer(&state, answer).await;
    }

    async fn apply_answer(self: &Arc<Self>, state: &[VoteMessage], answer: Answer) {
        let Some(first) = state.first() else {
            return;
        };
        let round = first.hash.round;
        let proposal_hash = first.hash.proposal_hash;

        // A received certificate (more than one vote) that matches our own
        // means some peer has already collected and propagated it.
        if state.len() > 1 {
            let received_is_commit = state
                .iter()
                .all(|v| v.hash.block_hash == first.hash.block_hash);
            let answer_is_commit = matches!(answer, Answer::Commit(_));
            let mut storage = self.lock_storage();
            if received_is_commit == answer_is_commit
                && storage.processing_state(round, &proposal_hash)
                    == ProposalState::NotSentNotProcessed
            {
                storage.next_processing_state(round, &proposal_hash);
            }
        }

        let current = self.lock_storage().processing_state(round, &proposal_hash);
        match current {
            ProposalState::NotSentNotProcessed => {
                self.lock_storage().next_processing_state(round, &proposal_hash);
                info!(round = %round, "propagating certificate to the cluster");
                self.propagate(answer).await;
            }
            ProposalState::SentNotProcessed => {
                self.lock_storage().next_processing_state(round, &proposal_hash);
                self.close_round(round, &answer);
                if self.outcome_tx.send(answer).await.is_err() {
                    warn!("consensus outcome consumer is gone");
                }
            }
            ProposalState::SentProcessed => {
                if state.len() == 1 {
                    if let Some(peer) = self.find_peer(first) {
                        debug!(peer = %peer.public_key, "repairing late peer");
                        self.propagate_directly(&peer, answer).await;
                    }
                }
            }
        }
    }

    fn close_round(&self, round: meridian_types::app::Round, answer: &Answer) {
        self.timer.deny();
        self.lock_storage()
            .finalize_round(round, matches!(answer, Answer::Commit(_)));
    }

    async fn propagate(&self, answer: Answer) {
        let peers = match self.lock_cluster().as_ref() {
            Some(order) => order.peers().to_vec(),
            None => return,
        };
        for peer in peers {
            self.propagate_directly(&peer, answer.clone()).await;
        }
    }

    async fn propagate_directly(&self, to: &Peer, answer: Answer) {
        let votes = answer.votes().to_vec();
        if let Err(e) = self.network.send_state(to, votes).await {
            warn!(peer = %to.public_key, error = %e, "certificate send failed");
        }
    }

    fn find_peer(&self, vote: &VoteMessage) -> Option<Peer> {
        self.lock_cluster().as_ref().and_then(|order| {
            order
                .peers()
                .iter()
                .find(|p| p.public_key == vote.signature.public_key)
                .cloned()
        })
    }
}
