/*
    Copyright © 2024, QuorumShard Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions for structured messages that are sent between nodes as part of the quorum
//! commit protocol.

use borsh::{BorshDeserialize, BorshSerialize};

use crate::messages::Message;
use crate::types::{
    basic::{NodeAddress, ProposalId, ShardId, SignatureBytes, WalletAddress},
    command::Command,
    signed_messages::SignedMessage,
    topology::ShardTopology,
};

use super::types::{Proposal, QuorumCertificate, Vote};

#[derive(Clone, BorshDeserialize, BorshSerialize)]
pub enum ProgressMessage {
    NewProposal(NewProposal),
    Prepare(Prepare),
    CrossShardData(CrossShardData),
    Vote(VoteMessage),
    BlockSyncAck(BlockSyncAck),
    ConflictNotice(ConflictNotice),
    Topology(TopologyUpdate),
    BalanceQuery(BalanceQuery),
    BalanceReport(BalanceReport),
}

impl Into<Message> for ProgressMessage {
    fn into(self) -> Message {
        Message::ProgressMessage(self)
    }
}

/// A client command entering the protocol at whichever node the client reached. Forwarded
/// to the node's own shard leader if the receiver does not lead.
#[derive(Clone, BorshDeserialize, BorshSerialize)]
pub struct NewProposal {
    pub command: Command,
    pub origin: NodeAddress,
}

/// A certificate fanned out for co-signing. Receivers vote back to `sender`, not to the
/// proposer: on relayed paths the relay is who forwards votes onward.
#[derive(Clone, BorshDeserialize, BorshSerialize)]
pub struct Prepare {
    pub qc: QuorumCertificate,
    pub sender: NodeAddress,
    pub source: ShardId,
    pub target: ShardId,
}

/// A certificate handed to the leaders a cross-shard route names, so they open their own
/// vote collectors before relaying [`Prepare`] into their shards.
#[derive(Clone, BorshDeserialize, BorshSerialize)]
pub struct CrossShardData {
    pub qc: QuorumCertificate,
    pub sender: NodeAddress,
    pub source: ShardId,
    pub target: ShardId,
    pub mediated: bool,
}

/// A vote travelling to a collecting leader. Carries the full proposal so the receiver
/// can verify the signature without having seen the certificate first.
#[derive(Clone, BorshDeserialize, BorshSerialize)]
pub struct VoteMessage {
    pub vote: Vote,
    pub proposal: Proposal,
    pub source: ShardId,
    pub target: ShardId,
}

impl SignedMessage for VoteMessage {
    fn message_bytes(&self) -> Vec<u8> {
        self.proposal.command.signing_bytes()
    }

    fn signature_bytes(&self) -> SignatureBytes {
        self.vote.signature
    }
}

/// A follower telling its shard leader it has caught up to the committed block.
#[derive(Clone, BorshDeserialize, BorshSerialize)]
pub struct BlockSyncAck {
    pub follower: NodeAddress,
    pub shard: ShardId,
}

/// Rejection of a proposal whose inputs collide with an already-queued proposal.
#[derive(Clone, BorshDeserialize, BorshSerialize)]
pub struct ConflictNotice {
    pub proposal: ProposalId,
}

/// Full replacement of the receiver's topology.
#[derive(Clone, BorshDeserialize, BorshSerialize)]
pub struct TopologyUpdate {
    pub topology: ShardTopology,
}

/// Ask a shard leader for one wallet's balance on its shard.
#[derive(Clone, BorshDeserialize, BorshSerialize)]
pub struct BalanceQuery {
    pub wallet: WalletAddress,
    pub origin: NodeAddress,
}

/// One shard's answer to a [`BalanceQuery`].
#[derive(Clone, BorshDeserialize, BorshSerialize)]
pub struct BalanceReport {
    pub wallet: WalletAddress,
    pub shard: ShardId,
    pub amount: u64,
}
