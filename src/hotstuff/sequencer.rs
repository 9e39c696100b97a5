/*
    Copyright © 2024, QuorumShard Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The commit sequencer: the FIFO of admitted proposals, the single-in-flight marker, the
//! block-sync ack counter, and the input locks that keep queued proposals from spending
//! each other's outputs.
//!
//! One proposal is in flight per collecting leader at a time. The next one starts only
//! after enough followers acknowledge having replicated the committed block. There is no
//! timeout: a round that never completes keeps its queue frozen.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};

use crate::error::ProtocolError;
use crate::types::basic::{ProposalId, TxId, WalletAddress};

use super::types::QuorumCertificate;

/// A queued proposal: its certificate and the wallets whose shards the route was resolved
/// from. Wallets are kept rather than resolved shards because the topology may change
/// while the proposal waits; routes are re-resolved at promotion.
struct QueuedProposal {
    certificate: QuorumCertificate,
    from: WalletAddress,
    to: WalletAddress,
}

/// What [`CommitSequencer::retire`] leaves behind.
pub(crate) enum Retirement {
    /// Another proposal was promoted to in-flight and its round should start now.
    Next {
        certificate: QuorumCertificate,
        from: WalletAddress,
        to: WalletAddress,
    },

    /// The queue drained. `batch_elapsed` measures from the enqueue that started the
    /// batch to the retirement that emptied it.
    Drained { batch_elapsed: Duration },
}

pub(crate) struct CommitSequencer {
    queue: VecDeque<QueuedProposal>,
    processing: Option<ProposalId>,
    sync_acks: usize,
    used_tx_ids: HashMap<TxId, ProposalId>,
    reservations: HashMap<ProposalId, Vec<TxId>>,
    completed: HashSet<ProposalId>,
    batch_start: Option<Instant>,
}

impl CommitSequencer {
    pub(crate) fn new() -> CommitSequencer {
        CommitSequencer {
            queue: VecDeque::new(),
            processing: None,
            sync_acks: 0,
            used_tx_ids: HashMap::new(),
            reservations: HashMap::new(),
            completed: HashSet::new(),
            batch_start: None,
        }
    }

    pub(crate) fn processing(&self) -> Option<&ProposalId> {
        self.processing.as_ref()
    }

    pub(crate) fn is_completed(&self, id: &ProposalId) -> bool {
        self.completed.contains(id)
    }

    /// Remember `id` as completed without it ever having been queued here. Collecting
    /// leaders that do not own the proposal's queue record completion at quorum time.
    pub(crate) fn mark_completed(&mut self, id: ProposalId) {
        self.completed.insert(id);
    }

    /// Reserve `inputs` for `id`. Fails without reserving anything if any input is
    /// already held by a queued proposal.
    pub(crate) fn try_reserve(
        &mut self,
        id: &ProposalId,
        inputs: &[TxId],
    ) -> Result<(), ProtocolError> {
        if inputs
            .iter()
            .any(|input| self.used_tx_ids.contains_key(input))
        {
            return Err(ProtocolError::ConflictingInputs(id.clone()));
        }
        for input in inputs {
            self.used_tx_ids.insert(input.clone(), id.clone());
        }
        self.reservations.insert(id.clone(), inputs.to_vec());
        Ok(())
    }

    /// Append a proposal to the queue. Returns `true` if it became the in-flight head and
    /// its round should start immediately.
    pub(crate) fn enqueue(
        &mut self,
        certificate: QuorumCertificate,
        from: WalletAddress,
        to: WalletAddress,
    ) -> bool {
        let id = certificate.proposal.id.clone();
        self.queue.push_back(QueuedProposal {
            certificate,
            from,
            to,
        });
        if self.batch_start.is_none() {
            self.batch_start = Some(Instant::now());
        }
        if self.processing.is_none() {
            self.processing = Some(id);
            true
        } else {
            false
        }
    }

    /// Count one block-sync acknowledgement. Returns `true` once `required` have arrived
    /// for the in-flight proposal.
    pub(crate) fn record_ack(&mut self, required: usize) -> bool {
        if self.processing.is_none() {
            return false;
        }
        self.sync_acks += 1;
        self.sync_acks >= required
    }

    /// Retire the in-flight proposal: release exactly the inputs it reserved, remember it
    /// as completed, reset the ack counter, and promote the next queued proposal if one
    /// exists.
    pub(crate) fn retire(&mut self) -> Option<Retirement> {
        let retired = self.processing.take()?;
        self.queue.pop_front();
        self.sync_acks = 0;
        if let Some(inputs) = self.reservations.remove(&retired) {
            for input in inputs {
                self.used_tx_ids.remove(&input);
            }
        }
        self.completed.insert(retired);

        if let Some(head) = self.queue.front() {
            self.processing = Some(head.certificate.proposal.id.clone());
            Some(Retirement::Next {
                certificate: head.certificate.clone(),
                from: head.from.clone(),
                to: head.to.clone(),
            })
        } else {
            let batch_elapsed = self
                .batch_start
                .take()
                .map(|start| start.elapsed())
                .unwrap_or_default();
            self.completed.clear();
            Some(Retirement::Drained { batch_elapsed })
        }
    }
}
