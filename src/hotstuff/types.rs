/*
    Copyright © 2024, QuorumShard Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions of types specific to the quorum commit protocol: proposals, votes, the
//! single-signature [`QuorumCertificate`], route resolution, and the [`VoteCollector`]
//! with its dual agreement thresholds.

use std::collections::HashMap;

use borsh::{BorshDeserialize, BorshSerialize};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};

use crate::types::{
    basic::{NodeAddress, ProposalId, PublicKeyBytes, ShardId, SignatureBytes, ViewNumber},
    command::Command,
    keypair::Keypair,
    topology::ShardTopology,
    transaction::Transaction,
};

/// The phase a certificate attests to. The protocol commits directly out of vote
/// collection and never rotates views, so the pre-prepare phase is the only one minted.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, BorshDeserialize, BorshSerialize)]
pub enum Phase {
    PrePrepare,
}

/// A command bound to its protocol identity: the minting shard, node, and nonce.
#[derive(Clone, PartialEq, Eq, Debug, BorshDeserialize, BorshSerialize)]
pub struct Proposal {
    pub id: ProposalId,
    pub command: Command,
    pub proposer: NodeAddress,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, BorshDeserialize, BorshSerialize)]
pub enum VoteKind {
    Agree,
    Disagree,
}

/// A node's signed agreement (or refusal) over a proposal's command.
///
/// An agreeing vote built by the node that constructed the transfer transaction carries
/// that transaction, so the leader that eventually collects the quorum can commit it
/// without rebuilding it.
#[derive(Clone, PartialEq, Eq, Debug, BorshDeserialize, BorshSerialize)]
pub struct Vote {
    pub kind: VoteKind,
    pub voter: NodeAddress,
    pub public_key: PublicKeyBytes,
    pub signature: SignatureBytes,
    pub transaction: Option<Transaction>,
}

impl Vote {
    /// Create an agreeing vote signed by `me` over `command`'s signing bytes.
    pub(crate) fn agree(
        me: &Keypair,
        voter: NodeAddress,
        command: &Command,
        transaction: Option<Transaction>,
    ) -> Vote {
        Vote {
            kind: VoteKind::Agree,
            voter,
            public_key: me.public_bytes(),
            signature: me.sign(&command.signing_bytes()),
            transaction,
        }
    }

    /// Verify the vote's signature over `command` against the public key the vote itself
    /// carries.
    pub(crate) fn is_correct_for(&self, command: &Command) -> bool {
        let Ok(verifying_key) = VerifyingKey::from_bytes(&self.public_key.bytes()) else {
            return false;
        };
        let signature = Signature::from_bytes(&self.signature.bytes());
        verifying_key
            .verify(&command.signing_bytes(), &signature)
            .is_ok()
    }
}

/// Proof that a proposal was minted by a proposer willing to stand behind it: the
/// proposal together with the proposer's own founding vote. The certificate never
/// aggregates further signatures. Quorum is tracked by the [`VoteCollector`] at whichever
/// leader the route names, and the certificate is the seed every participant co-signs.
#[derive(Clone, PartialEq, Eq, Debug, BorshDeserialize, BorshSerialize)]
pub struct QuorumCertificate {
    pub view: ViewNumber,
    pub phase: Phase,
    pub proposal: Proposal,
    pub founding_vote: Vote,
}

impl QuorumCertificate {
    pub(crate) fn new(proposal: Proposal, founding_vote: Vote) -> QuorumCertificate {
        QuorumCertificate {
            view: ViewNumber::init(),
            phase: Phase::PrePrepare,
            proposal,
            founding_vote,
        }
    }

    /// Checks that the founding vote agrees and is correctly signed over the proposal's
    /// command.
    pub(crate) fn is_correct(&self) -> bool {
        self.founding_vote.kind == VoteKind::Agree
            && self.founding_vote.voter == self.proposal.proposer
            && self.founding_vote.is_correct_for(&self.proposal.command)
    }
}

/// How a transfer travels between its source and target shards, and therefore where its
/// votes are collected.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Route {
    /// Sender and recipient live on the same shard. The shard leader collects.
    SameShard { shard: ShardId },

    /// A third shard mediates. The mediator's leader collects and commits both halves.
    Mediated {
        source: ShardId,
        target: ShardId,
        mediator: ShardId,
    },

    /// No relation exists between the endpoint shards. Both endpoint leaders collect
    /// independently and each commits its own half.
    Unmediated { source: ShardId, target: ShardId },
}

impl Route {
    /// Resolve the route between `source` and `target` against the relation table.
    pub fn resolve(topology: &ShardTopology, source: ShardId, target: ShardId) -> Route {
        if source == target {
            Route::SameShard { shard: source }
        } else if let Some(mediator) = topology.mediator(source, target) {
            Route::Mediated {
                source,
                target,
                mediator,
            }
        } else {
            Route::Unmediated { source, target }
        }
    }

    pub fn source(&self) -> ShardId {
        match self {
            Route::SameShard { shard } => *shard,
            Route::Mediated { source, .. } => *source,
            Route::Unmediated { source, .. } => *source,
        }
    }

    pub fn target(&self) -> ShardId {
        match self {
            Route::SameShard { shard } => *shard,
            Route::Mediated { target, .. } => *target,
            Route::Unmediated { target, .. } => *target,
        }
    }

    /// The quorum thresholds this route demands, computed from current member counts.
    pub fn policy(&self, topology: &ShardTopology) -> Option<QuorumPolicy> {
        let members_of = |shard: &ShardId| topology.members(shard).map(Vec::len);
        match self {
            Route::SameShard { shard } => Some(QuorumPolicy::same_shard(members_of(shard)?)),
            Route::Mediated { mediator, .. } => Some(QuorumPolicy::mediated(members_of(mediator)?)),
            Route::Unmediated { source, target } => Some(QuorumPolicy::unmediated(
                members_of(source)?,
                members_of(target)?,
            )),
        }
    }
}

/// The dual thresholds a [`VoteCollector`] fires on.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct QuorumPolicy {
    pub required_agrees: usize,
    pub required_leader_agrees: usize,
}

impl QuorumPolicy {
    /// Majority of the shard, including its leader.
    pub fn same_shard(members: usize) -> QuorumPolicy {
        QuorumPolicy {
            required_agrees: members / 2 + 1,
            required_leader_agrees: 1,
        }
    }

    /// Majority of the mediating shard, including its leader.
    pub fn mediated(mediator_members: usize) -> QuorumPolicy {
        QuorumPolicy {
            required_agrees: mediator_members / 2 + 1,
            required_leader_agrees: 1,
        }
    }

    /// 80% of both endpoint shards combined, including both endpoint leaders.
    pub fn unmediated(source_members: usize, target_members: usize) -> QuorumPolicy {
        QuorumPolicy {
            required_agrees: (source_members + target_members) * 8 / 10,
            required_leader_agrees: 2,
        }
    }
}

/// Accumulates votes for one proposal and fires exactly once when both thresholds are
/// met.
///
/// The firing condition is exact equality on both counters, checked after each admitted
/// vote. A collector whose agree count steps past `required_agrees` while the leader
/// count is still short can therefore never fire: the round stalls and its queue entry is
/// only cleared by block-sync retirement of some other path. Callers should not reorder
/// vote delivery in a way that starves leader votes.
pub(crate) struct VoteCollector {
    proposal: Proposal,
    policy: QuorumPolicy,
    votes: HashMap<NodeAddress, Vote>,
    total_agrees: usize,
    leader_agrees: usize,
    decided: bool,
}

impl VoteCollector {
    pub(crate) fn new(proposal: Proposal, policy: QuorumPolicy) -> VoteCollector {
        VoteCollector {
            proposal,
            policy,
            votes: HashMap::new(),
            total_agrees: 0,
            leader_agrees: 0,
            decided: false,
        }
    }

    pub(crate) fn proposal(&self) -> &Proposal {
        &self.proposal
    }

    /// Admit `vote`, counting it toward the thresholds if it agrees. `is_leader_vote`
    /// tells the collector whether the voter currently leads any shard.
    ///
    /// Returns `true` exactly once, on the vote that satisfies both thresholds.
    ///
    /// # Preconditions
    ///
    /// The vote's signature has been verified by the caller.
    pub(crate) fn collect(&mut self, is_leader_vote: bool, vote: Vote) -> bool {
        if self.decided || self.votes.contains_key(&vote.voter) {
            return false;
        }
        let agrees = vote.kind == VoteKind::Agree;
        self.votes.insert(vote.voter.clone(), vote);
        if !agrees {
            return false;
        }
        self.total_agrees += 1;
        if is_leader_vote {
            self.leader_agrees += 1;
        }
        if self.total_agrees == self.policy.required_agrees
            && self.leader_agrees == self.policy.required_leader_agrees
        {
            self.decided = true;
            return true;
        }
        false
    }

    /// The transaction attached to any collected vote, preferring the earliest-seen. The
    /// commit pipeline reads it when the quorum fires.
    pub(crate) fn attached_transaction(&self) -> Option<&Transaction> {
        self.votes
            .values()
            .find_map(|vote| vote.transaction.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::SigningKey;
    use rand_core::OsRng;

    use crate::types::basic::WalletAddress;

    fn proposal() -> Proposal {
        Proposal {
            id: ProposalId::new(ShardId::new(0), NodeAddress::new("a0"), 0),
            command: Command::Transfer {
                from: WalletAddress::new("alice"),
                to: WalletAddress::new("bob"),
                amount: 5,
            },
            proposer: NodeAddress::new("a0"),
        }
    }

    fn agree(name: &str, command: &Command) -> Vote {
        let keypair = Keypair::new(SigningKey::generate(&mut OsRng));
        Vote::agree(&keypair, NodeAddress::new(name), command, None)
    }

    #[test]
    fn policies_match_member_counts() {
        assert_eq!(
            QuorumPolicy::same_shard(4),
            QuorumPolicy {
                required_agrees: 3,
                required_leader_agrees: 1
            }
        );
        assert_eq!(
            QuorumPolicy::mediated(4),
            QuorumPolicy {
                required_agrees: 3,
                required_leader_agrees: 1
            }
        );
        assert_eq!(
            QuorumPolicy::unmediated(3, 5),
            QuorumPolicy {
                required_agrees: 6,
                required_leader_agrees: 2
            }
        );
    }

    #[test]
    fn founding_vote_verifies_against_its_own_key() {
        let keypair = Keypair::new(SigningKey::generate(&mut OsRng));
        let proposal = proposal();
        let vote = Vote::agree(&keypair, proposal.proposer.clone(), &proposal.command, None);
        assert!(vote.is_correct_for(&proposal.command));

        let other = Command::Transfer {
            from: WalletAddress::new("alice"),
            to: WalletAddress::new("bob"),
            amount: 6,
        };
        assert!(!vote.is_correct_for(&other));

        let qc = QuorumCertificate::new(proposal, vote);
        assert!(qc.is_correct());
    }

    #[test]
    fn collector_fires_once_on_both_thresholds() {
        let proposal = proposal();
        let mut collector =
            VoteCollector::new(proposal.clone(), QuorumPolicy::same_shard(4));

        assert!(!collector.collect(true, agree("a0", &proposal.command)));
        assert!(!collector.collect(false, agree("a1", &proposal.command)));
        assert!(collector.collect(false, agree("a2", &proposal.command)));
        // Latched: further votes never re-fire.
        assert!(!collector.collect(false, agree("a3", &proposal.command)));
    }

    #[test]
    fn duplicate_voters_are_ignored() {
        let proposal = proposal();
        let mut collector =
            VoteCollector::new(proposal.clone(), QuorumPolicy::same_shard(4));

        assert!(!collector.collect(true, agree("a0", &proposal.command)));
        assert!(!collector.collect(true, agree("a0", &proposal.command)));
        assert!(!collector.collect(false, agree("a1", &proposal.command)));
        // Still needs a third distinct voter.
        assert!(collector.collect(false, agree("a2", &proposal.command)));
    }

    #[test]
    fn votes_render_for_debug_logging() {
        let proposal = proposal();
        let vote = agree("a0", &proposal.command);
        let rendered = format!("{:?}", vote);
        assert!(rendered.contains("Agree"));
        assert!(rendered.contains("a0"));
    }

    #[test]
    fn disagreeing_votes_take_no_quorum_slot() {
        let proposal = proposal();
        let mut collector =
            VoteCollector::new(proposal.clone(), QuorumPolicy::same_shard(4));

        assert!(!collector.collect(true, agree("a0", &proposal.command)));
        let mut refusal = agree("a1", &proposal.command);
        refusal.kind = VoteKind::Disagree;
        assert!(!collector.collect(false, refusal));
        // The refusal holds a1's single slot but moved neither counter.
        assert!(!collector.collect(false, agree("a1", &proposal.command)));
        assert!(!collector.collect(false, agree("a2", &proposal.command)));
        assert!(collector.collect(false, agree("a3", &proposal.command)));
    }

    #[test]
    fn overshooting_the_agree_threshold_stalls_the_collector() {
        // Unmediated 3+5 demands exactly 6 agrees with exactly 2 leader votes. If the
        // second leader's vote arrives seventh, the equality check can never be met
        // again. This pins the stall so any change to the firing condition is deliberate.
        let proposal = proposal();
        let mut collector =
            VoteCollector::new(proposal.clone(), QuorumPolicy::unmediated(3, 5));

        assert!(!collector.collect(true, agree("l0", &proposal.command)));
        for follower in ["f1", "f2", "f3", "f4", "f5"] {
            assert!(!collector.collect(false, agree(follower, &proposal.command)));
        }
        // Sixth agree arrived with one leader vote: no fire. The late leader overshoots.
        assert!(!collector.collect(true, agree("l1", &proposal.command)));
        assert!(!collector.collect(false, agree("f6", &proposal.command)));
    }
}
