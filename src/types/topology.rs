/*
    Copyright © 2024, QuorumShard Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The [`ShardTopology`] every node carries: shard member lists, the relation table naming
//! mediating shards, and the residents directory mapping wallets to their home shards.
//!
//! The topology is gossiped as a whole. A node that receives a `Topology` message replaces
//! its copy; there is no incremental update protocol.

use borsh::{BorshDeserialize, BorshSerialize};
use std::collections::{BTreeMap, HashMap};

use super::basic::{NodeAddress, ShardId, WalletAddress};

/// Full view of the sharded cluster.
///
/// The member at position 0 of each shard's list is that shard's leader. Leadership moves
/// only when [`remove_member`](Self::remove_member) deletes the current leader, promoting
/// the next member in list order.
#[derive(Clone, Default, PartialEq, Eq, Debug, BorshDeserialize, BorshSerialize)]
pub struct ShardTopology {
    members: BTreeMap<ShardId, Vec<NodeAddress>>,
    relations: HashMap<(ShardId, ShardId), ShardId>,
    residents: HashMap<WalletAddress, ShardId>,
}

impl ShardTopology {
    pub fn new() -> ShardTopology {
        ShardTopology::default()
    }

    /// Register a shard with its ordered member list. Replaces any previous list for the
    /// same shard.
    pub fn insert_shard(&mut self, shard: ShardId, members: Vec<NodeAddress>) {
        self.members.insert(shard, members);
    }

    /// Record that transfers between `a` and `b` are mediated by `mediator`. The pair is
    /// stored unordered.
    pub fn insert_relation(&mut self, a: ShardId, b: ShardId, mediator: ShardId) {
        self.relations.insert(Self::relation_key(a, b), mediator);
    }

    /// Record that `wallet`'s outputs live on `shard`.
    pub fn insert_resident(&mut self, wallet: WalletAddress, shard: ShardId) {
        self.residents.insert(wallet, shard);
    }

    pub fn shard_count(&self) -> usize {
        self.members.len()
    }

    pub fn shards(&self) -> impl Iterator<Item = ShardId> + '_ {
        self.members.keys().copied()
    }

    pub fn members(&self, shard: &ShardId) -> Option<&Vec<NodeAddress>> {
        self.members.get(shard)
    }

    /// The leader of `shard`: the member at position 0.
    pub fn leader(&self, shard: &ShardId) -> Option<&NodeAddress> {
        self.members.get(shard).and_then(|members| members.first())
    }

    /// Whether `node` leads the given shard.
    pub fn leads(&self, node: &NodeAddress, shard: &ShardId) -> bool {
        self.leader(shard) == Some(node)
    }

    /// Whether `node` is the leader of any shard. Vote admission and leader-vote counting
    /// use this shard-agnostic check.
    pub fn is_leader(&self, node: &NodeAddress) -> bool {
        self.members
            .values()
            .any(|members| members.first() == Some(node))
    }

    /// The shard whose member list contains `node`.
    pub fn shard_of_node(&self, node: &NodeAddress) -> Option<ShardId> {
        self.members
            .iter()
            .find(|(_, members)| members.contains(node))
            .map(|(shard, _)| *shard)
    }

    /// The home shard of `wallet`: the residents directory first, then a scan of member
    /// lists for a node address equal to the wallet string. The scan keeps bootstrap flows
    /// working where wallets are the member addresses themselves.
    pub fn shard_of_wallet(&self, wallet: &WalletAddress) -> Option<ShardId> {
        if let Some(shard) = self.residents.get(wallet) {
            return Some(*shard);
        }
        self.members
            .iter()
            .find(|(_, members)| members.iter().any(|node| node.str() == wallet.str()))
            .map(|(shard, _)| *shard)
    }

    /// The shard mediating transfers between `a` and `b`, if the relation table names one.
    pub fn mediator(&self, a: ShardId, b: ShardId) -> Option<ShardId> {
        self.relations.get(&Self::relation_key(a, b)).copied()
    }

    /// Drop `node` from whichever shard holds it. If it was the leader, the next member in
    /// list order becomes leader.
    pub fn remove_member(&mut self, node: &NodeAddress) {
        for members in self.members.values_mut() {
            members.retain(|member| member != node);
        }
    }

    fn relation_key(a: ShardId, b: ShardId) -> (ShardId, ShardId) {
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }
}
