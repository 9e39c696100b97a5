//! Definitions of protocol events for event handling and logging.
//! Note: an event for a given action indicates that the action has been completed.

use std::sync::mpsc::Sender;
use std::time::{Duration, SystemTime};

use crate::hotstuff::types::Proposal;
use crate::types::basic::{
    BlockHeight, CryptoHash, NodeAddress, ProposalId, ShardId, WalletAddress,
};

pub enum Event {
    // Events that involve sending a progress message.
    Propose(ProposeEvent),
    VoteCast(VoteCastEvent),
    // Events that involve receiving a progress message.
    ReceivePrepare(ReceivePrepareEvent),
    ReceiveVote(ReceiveVoteEvent),
    ReceiveBlockSyncAck(ReceiveBlockSyncAckEvent),
    // Round outcomes.
    CollectQuorum(CollectQuorumEvent),
    CommitBlock(CommitBlockEvent),
    Conflict(ConflictEvent),
    // Queue movement.
    AdvanceQueue(AdvanceQueueEvent),
    QueueDrained(QueueDrainedEvent),
    // Cluster state.
    UpdateTopology(UpdateTopologyEvent),
    TotalBalance(TotalBalanceEvent),
}

impl Event {
    pub(crate) fn publish(event_publisher: &Option<Sender<Event>>, event: Event) {
        if let Some(event_publisher) = event_publisher {
            event_publisher.send(event).unwrap()
        }
    }
}

pub struct ProposeEvent {
    pub timestamp: SystemTime,
    pub proposal: Proposal,
}

pub struct VoteCastEvent {
    pub timestamp: SystemTime,
    pub recipient: NodeAddress,
    pub proposal: ProposalId,
}

pub struct ReceivePrepareEvent {
    pub timestamp: SystemTime,
    pub origin: NodeAddress,
    pub proposal: ProposalId,
}

pub struct ReceiveVoteEvent {
    pub timestamp: SystemTime,
    pub origin: NodeAddress,
    pub proposal: ProposalId,
}

pub struct ReceiveBlockSyncAckEvent {
    pub timestamp: SystemTime,
    pub follower: NodeAddress,
    pub shard: ShardId,
}

pub struct CollectQuorumEvent {
    pub timestamp: SystemTime,
    pub proposal: Proposal,
}

pub struct CommitBlockEvent {
    pub timestamp: SystemTime,
    pub shard: ShardId,
    pub block: CryptoHash,
    pub height: BlockHeight,
}

pub struct ConflictEvent {
    pub timestamp: SystemTime,
    pub proposal: ProposalId,
}

pub struct AdvanceQueueEvent {
    pub timestamp: SystemTime,
    pub retired: ProposalId,
    pub next: Option<ProposalId>,
}

pub struct QueueDrainedEvent {
    pub timestamp: SystemTime,
    pub batch_elapsed: Duration,
}

pub struct UpdateTopologyEvent {
    pub timestamp: SystemTime,
    pub shard_count: usize,
}

pub struct TotalBalanceEvent {
    pub timestamp: SystemTime,
    pub wallet: WalletAddress,
    pub amount: u64,
}
