/*
    Copyright © 2024, QuorumShard Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Functions that log out events.
//!
//! The logs defined in this module are printed if the user enabled them via the node's
//! [config](crate::config::Configuration).
//!
//! Logging goes through the [log](https://docs.rs/log/latest/log/) crate. To get these
//! messages printed onto a terminal or to a file, set up a
//! [logging implementation](https://docs.rs/log/latest/log/#available-logging-implementations).
//!
//! ## Log message format
//!
//! Log messages are CSVs (Comma Separated Values) with at least two values. The first two
//! values are always:
//! 1. The name of the [event](crate::events) in PascalCase (defined in this module as constants).
//! 2. The time the event was emitted (as number of seconds since the Unix Epoch).
//!
//! The rest of the values differ depending on the kind of event. For example, the following
//! snippet is how a [CommitBlock](crate::events::CommitBlockEvent) is printed:
//!
//! ```text
//! CommitBlock, 1718929264, 2, fNGCJyk, 5
//! ```
//!
//! In the snippet:
//! - The third value is the shard whose chain grew.
//! - The fourth value is the first seven characters of the Base64 encoding of the block's hash.
//! - The fifth value is the height of the committed block.

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use std::time::SystemTime;

use crate::events::*;

// Names of each event in PascalCase for printing:
pub const PROPOSE: &str = "Propose";
pub const VOTE_CAST: &str = "VoteCast";

pub const RECEIVE_PREPARE: &str = "ReceivePrepare";
pub const RECEIVE_VOTE: &str = "ReceiveVote";
pub const RECEIVE_BLOCK_SYNC_ACK: &str = "ReceiveBlockSyncAck";

pub const COLLECT_QUORUM: &str = "CollectQuorum";
pub const COMMIT_BLOCK: &str = "CommitBlock";
pub const CONFLICT: &str = "Conflict";

pub const ADVANCE_QUEUE: &str = "AdvanceQueue";
pub const QUEUE_DRAINED: &str = "QueueDrained";

pub const UPDATE_TOPOLOGY: &str = "UpdateTopology";
pub const TOTAL_BALANCE: &str = "TotalBalance";

/// Implemented by event types. Used to get a closure that logs the event.
pub(crate) trait Logger {
    /// Returns a pointer to the default logging handler for a given event type.
    fn get_logger() -> Box<dyn Fn(&Self) + Send>;
}

impl Logger for ProposeEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |propose_event: &ProposeEvent| {
            log::info!(
                "{}, {}, {}, {}",
                PROPOSE,
                secs_since_unix_epoch(propose_event.timestamp),
                propose_event.proposal.id,
                propose_event.proposal.command
            )
        };
        Box::new(logger)
    }
}

impl Logger for VoteCastEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |vote_cast_event: &VoteCastEvent| {
            log::info!(
                "{}, {}, {}, {}",
                VOTE_CAST,
                secs_since_unix_epoch(vote_cast_event.timestamp),
                vote_cast_event.recipient,
                vote_cast_event.proposal
            )
        };
        Box::new(logger)
    }
}

impl Logger for ReceivePrepareEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |receive_prepare_event: &ReceivePrepareEvent| {
            log::info!(
                "{}, {}, {}, {}",
                RECEIVE_PREPARE,
                secs_since_unix_epoch(receive_prepare_event.timestamp),
                receive_prepare_event.origin,
                receive_prepare_event.proposal
            )
        };
        Box::new(logger)
    }
}

impl Logger for ReceiveVoteEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |receive_vote_event: &ReceiveVoteEvent| {
            log::info!(
                "{}, {}, {}, {}",
                RECEIVE_VOTE,
                secs_since_unix_epoch(receive_vote_event.timestamp),
                receive_vote_event.origin,
                receive_vote_event.proposal
            )
        };
        Box::new(logger)
    }
}

impl Logger for ReceiveBlockSyncAckEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |receive_block_sync_ack_event: &ReceiveBlockSyncAckEvent| {
            log::info!(
                "{}, {}, {}, {}",
                RECEIVE_BLOCK_SYNC_ACK,
                secs_since_unix_epoch(receive_block_sync_ack_event.timestamp),
                receive_block_sync_ack_event.follower,
                receive_block_sync_ack_event.shard
            )
        };
        Box::new(logger)
    }
}

impl Logger for CollectQuorumEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |collect_quorum_event: &CollectQuorumEvent| {
            log::info!(
                "{}, {}, {}",
                COLLECT_QUORUM,
                secs_since_unix_epoch(collect_quorum_event.timestamp),
                collect_quorum_event.proposal.id
            )
        };
        Box::new(logger)
    }
}

impl Logger for CommitBlockEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |commit_block_event: &CommitBlockEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                COMMIT_BLOCK,
                secs_since_unix_epoch(commit_block_event.timestamp),
                commit_block_event.shard,
                first_seven_base64_chars(&commit_block_event.block.bytes()),
                commit_block_event.height
            )
        };
        Box::new(logger)
    }
}

impl Logger for ConflictEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |conflict_event: &ConflictEvent| {
            log::info!(
                "{}, {}, {}",
                CONFLICT,
                secs_since_unix_epoch(conflict_event.timestamp),
                conflict_event.proposal
            )
        };
        Box::new(logger)
    }
}

impl Logger for AdvanceQueueEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |advance_queue_event: &AdvanceQueueEvent| match &advance_queue_event.next {
            Some(next) => log::info!(
                "{}, {}, {}, {}",
                ADVANCE_QUEUE,
                secs_since_unix_epoch(advance_queue_event.timestamp),
                advance_queue_event.retired,
                next
            ),
            None => log::info!(
                "{}, {}, {}",
                ADVANCE_QUEUE,
                secs_since_unix_epoch(advance_queue_event.timestamp),
                advance_queue_event.retired
            ),
        };
        Box::new(logger)
    }
}

impl Logger for QueueDrainedEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |queue_drained_event: &QueueDrainedEvent| {
            log::info!(
                "{}, {}, {}",
                QUEUE_DRAINED,
                secs_since_unix_epoch(queue_drained_event.timestamp),
                queue_drained_event.batch_elapsed.as_millis()
            )
        };
        Box::new(logger)
    }
}

impl Logger for UpdateTopologyEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |update_topology_event: &UpdateTopologyEvent| {
            log::info!(
                "{}, {}, {}",
                UPDATE_TOPOLOGY,
                secs_since_unix_epoch(update_topology_event.timestamp),
                update_topology_event.shard_count
            )
        };
        Box::new(logger)
    }
}

impl Logger for TotalBalanceEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |total_balance_event: &TotalBalanceEvent| {
            log::info!(
                "{}, {}, {}, {}",
                TOTAL_BALANCE,
                secs_since_unix_epoch(total_balance_event.timestamp),
                total_balance_event.wallet,
                total_balance_event.amount
            )
        };
        Box::new(logger)
    }
}

fn first_seven_base64_chars(bytes: &[u8]) -> String {
    let encoded = STANDARD_NO_PAD.encode(bytes);
    if encoded.len() > 7 {
        encoded[0..7].to_string()
    } else {
        encoded
    }
}

fn secs_since_unix_epoch(timestamp: SystemTime) -> u64 {
    timestamp
        .duration_since(SystemTime::UNIX_EPOCH)
        .expect("timestamp is before the unix epoch")
        .as_secs()
}
