/*
    Copyright © 2024, QuorumShard Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Chain replication between shard members.
//!
//! After a leader commits a block it advertises its new chain tip with a [`Version`]
//! message. Receivers that are behind pull the missing blocks down with a
//! `GetBlocks`/`Inv`/`GetData` exchange and apply them in ascending height order;
//! receivers that are ahead answer with their own tip instead. A
//! follower that drains its in-transit list tells its own shard leader with a
//! [`BlockSyncAck`](crate::hotstuff::messages::BlockSyncAck): those acknowledgements are
//! what let the leader's commit sequencer promote the next proposal. Leaders replicate
//! too, but never acknowledge.
//!
//! [`Version`]: ReplicationMessage::Version

use std::collections::{HashMap, VecDeque};

use borsh::{BorshDeserialize, BorshSerialize};
use log::debug;

use crate::hotstuff::messages::{BlockSyncAck, ProgressMessage};
use crate::ledger::{Block, Ledger, LedgerError};
use crate::messages::Message;
use crate::networking::{Network, SenderHandle};
use crate::types::{
    basic::{BlockHeight, CryptoHash, NodeAddress, ShardId},
    topology::ShardTopology,
};

#[derive(Clone, BorshDeserialize, BorshSerialize)]
pub enum ReplicationMessage {
    /// Advertisement of the sender's chain tip for one shard.
    Version {
        shard: ShardId,
        best_height: BlockHeight,
        sender: NodeAddress,
    },

    /// Request for the hashes of every block above `above` on the sender's copy of the
    /// shard's chain.
    GetBlocks {
        shard: ShardId,
        above: BlockHeight,
        sender: NodeAddress,
    },

    /// The hashes a `GetBlocks` asked for, in ascending height order.
    Inv {
        shard: ShardId,
        hashes: Vec<CryptoHash>,
        sender: NodeAddress,
    },

    /// Request for one block body.
    GetData {
        shard: ShardId,
        hash: CryptoHash,
        sender: NodeAddress,
    },

    /// One block body.
    BlockData {
        shard: ShardId,
        block: Block,
        sender: NodeAddress,
    },
}

impl Into<Message> for ReplicationMessage {
    fn into(self) -> Message {
        Message::ReplicationMessage(self)
    }
}

/// Per-node replication state: the blocks known to exist but not yet downloaded, per
/// shard. Blocks are requested one at a time so they arrive and apply in height order.
pub(crate) struct Replication<N: Network> {
    address: NodeAddress,
    sender: SenderHandle<N>,
    in_transit: HashMap<ShardId, VecDeque<CryptoHash>>,
}

impl<N: Network> Replication<N> {
    pub(crate) fn new(address: NodeAddress, sender: SenderHandle<N>) -> Replication<N> {
        Replication {
            address,
            sender,
            in_transit: HashMap::new(),
        }
    }

    pub(crate) fn on_message(
        &mut self,
        ledger: &mut impl Ledger,
        topology: &ShardTopology,
        message: ReplicationMessage,
    ) -> Result<(), LedgerError> {
        match message {
            ReplicationMessage::Version {
                shard,
                best_height,
                sender,
            } => self.on_version(ledger, shard, best_height, sender),
            ReplicationMessage::GetBlocks {
                shard,
                above,
                sender,
            } => self.on_get_blocks(ledger, shard, above, sender),
            ReplicationMessage::Inv {
                shard,
                hashes,
                sender,
            } => self.on_inv(ledger, shard, hashes, sender),
            ReplicationMessage::GetData {
                shard,
                hash,
                sender,
            } => self.on_get_data(ledger, shard, hash, sender),
            ReplicationMessage::BlockData {
                shard,
                block,
                sender,
            } => self.on_block_data(ledger, topology, shard, block, sender)?,
        }
        Ok(())
    }

    fn on_version(
        &mut self,
        ledger: &mut impl Ledger,
        shard: ShardId,
        best_height: BlockHeight,
        sender: NodeAddress,
    ) {
        let ours = ledger.best_height(shard);
        if best_height > ours {
            self.sender.send(
                sender,
                ReplicationMessage::GetBlocks {
                    shard,
                    above: ours,
                    sender: self.address.clone(),
                },
            );
        } else if best_height < ours {
            // The advertiser is behind us; answer with our own tip so it pulls from us.
            self.sender.send(
                sender,
                ReplicationMessage::Version {
                    shard,
                    best_height: ours,
                    sender: self.address.clone(),
                },
            );
        }
    }

    fn on_get_blocks(
        &mut self,
        ledger: &impl Ledger,
        shard: ShardId,
        above: BlockHeight,
        sender: NodeAddress,
    ) {
        let hashes = ledger.block_hashes(shard, above);
        self.sender.send(
            sender,
            ReplicationMessage::Inv {
                shard,
                hashes,
                sender: self.address.clone(),
            },
        );
    }

    fn on_inv(
        &mut self,
        ledger: &impl Ledger,
        shard: ShardId,
        hashes: Vec<CryptoHash>,
        sender: NodeAddress,
    ) {
        let transit = self.in_transit.entry(shard).or_default();
        let was_draining = !transit.is_empty();
        for hash in hashes {
            // Raced catch-up exchanges advertise overlapping inventories. Queue each
            // block once, and never one that already landed on the chain.
            if transit.contains(&hash) || ledger.block(shard, &hash).is_some() {
                continue;
            }
            transit.push_back(hash);
        }
        if was_draining {
            // A GetData for the current front is already outstanding.
            return;
        }
        if let Some(first) = transit.front().copied() {
            self.sender.send(
                sender,
                ReplicationMessage::GetData {
                    shard,
                    hash: first,
                    sender: self.address.clone(),
                },
            );
        }
    }

    fn on_get_data(
        &mut self,
        ledger: &impl Ledger,
        shard: ShardId,
        hash: CryptoHash,
        sender: NodeAddress,
    ) {
        match ledger.block(shard, &hash) {
            Some(block) => {
                self.sender.send(
                    sender,
                    ReplicationMessage::BlockData {
                        shard,
                        block,
                        sender: self.address.clone(),
                    },
                );
            }
            None => debug!("no block {:?} on shard {} to serve", hash, shard),
        }
    }

    /// Apply a downloaded block, pull the next one if any remain, and acknowledge to the
    /// own shard leader once nothing is left in transit. Only non-leaders acknowledge.
    fn on_block_data(
        &mut self,
        ledger: &mut impl Ledger,
        topology: &ShardTopology,
        shard: ShardId,
        block: Block,
        served_by: NodeAddress,
    ) -> Result<(), LedgerError> {
        let transit = self.in_transit.entry(shard).or_default();
        if block.height <= ledger.best_height(shard) {
            // Redelivery from an overlapping exchange. The block already landed, so only
            // its transit entry, if one is still queued at the front, needs clearing.
            if transit.front() != Some(&block.hash) {
                return Ok(());
            }
            transit.pop_front();
        } else {
            ledger.apply_block(shard, block)?;
            transit.pop_front();
        }

        if let Some(next) = transit.front().copied() {
            // Keep pulling from whoever served this block. On mediated routes that is
            // the mediator's leader, not the synced shard's own leader.
            self.sender.send(
                served_by,
                ReplicationMessage::GetData {
                    shard,
                    hash: next,
                    sender: self.address.clone(),
                },
            );
            return Ok(());
        }

        if topology.is_leader(&self.address) {
            return Ok(());
        }
        let Some(own_shard) = topology.shard_of_node(&self.address) else {
            return Ok(());
        };
        if let Some(leader) = topology.leader(&own_shard).cloned() {
            self.sender.send(
                leader,
                ProgressMessage::BlockSyncAck(BlockSyncAck {
                    follower: self.address.clone(),
                    shard: own_shard,
                }),
            );
        }
        Ok(())
    }
}
