//! Commits a transfer between two wallets resident on the same shard and checks that the
//! committed block replicates to every member and the leader's proposal queue drains.

mod common;

use std::{thread, time::Duration};

use log::LevelFilter;

use quorumshard::{
    ledger::{Block, Ledger},
    types::{
        basic::{BlockHeight, NodeAddress, ShardId, WalletAddress},
        command::Command,
        topology::ShardTopology,
        transaction::Transaction,
    },
};

use common::logging::setup_logger;
use common::mem_ledger::MemLedger;
use common::network::mock_network;
use common::node::TestNode;

#[test]
fn same_shard_commit_test() {
    setup_logger(LevelFilter::Info);

    // 1. One shard of 4 members, alice and bob resident on it, and alice funded with a
    // single 100-value output on every member's copy of the chain.
    let addresses: Vec<NodeAddress> = (0..4)
        .map(|i| NodeAddress::new(format!("same_shard_{}", i)))
        .collect();
    let shard = ShardId::new(0);
    let alice = WalletAddress::new("alice");
    let bob = WalletAddress::new("bob");

    let mut topology = ShardTopology::new();
    topology.insert_shard(shard, addresses.clone());
    topology.insert_resident(alice.clone(), shard);
    topology.insert_resident(bob.clone(), shard);

    let genesis = Block::new(
        BlockHeight::new(1),
        vec![Transaction::coinbase_with_amount(&alice, 100)],
    );
    let mut nodes: Vec<TestNode> = addresses
        .iter()
        .cloned()
        .zip(mock_network(addresses.iter().cloned()))
        .map(|(address, network)| {
            let mut ledger = MemLedger::default();
            ledger.apply_block(shard, genesis.clone()).unwrap();
            TestNode::start(address, network, ledger, topology.clone())
        })
        .collect();

    // 2. Submit the transfer at a follower, which forwards it to the shard leader.
    nodes[1].submit(Command::Transfer {
        from: alice.clone(),
        to: bob.clone(),
        amount: 30,
    });

    // 3. Wait until the block is committed and replicated to every member.
    log::debug!("Waiting for the transfer to commit and replicate.");
    while !nodes
        .iter()
        .all(|node| node.ledger.balance(shard, &bob) == 30)
    {
        thread::sleep(Duration::from_millis(500));
    }
    for node in &nodes {
        // 70 change plus the 10 coinbase subsidy minted to the sender.
        assert_eq!(node.ledger.balance(shard, &alice), 80);
        assert_eq!(node.ledger.best_height(shard), BlockHeight::new(2));
    }

    // 4. The leader retires the proposal once its followers acknowledge.
    log::debug!("Waiting for the leader's queue to drain.");
    while *nodes[0].drains.lock().unwrap() == 0 {
        thread::sleep(Duration::from_millis(500));
    }

    // Only the shard leader collects votes.
    assert_eq!(nodes[0].quorums.lock().unwrap().len(), 1);
    for follower in &nodes[1..] {
        assert!(follower.quorums.lock().unwrap().is_empty());
    }
}
