//! Input locking and commit sequencing: a proposal that would double-spend a reserved
//! output is rejected, and two non-conflicting proposals commit one after another.

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
fn conflicting_inputs_rejected_test() {
    setup_logger(LevelFilter::Info);

    // 1. One shard of 4 members. alice holds a single 100-value output, so any two
    // transfers from her must spend the same output.
    let addresses: Vec<NodeAddress> = (0..4)
        .map(|i| NodeAddress::new(format!("conflict_{}", i)))
        .collect();
    let shard = ShardId::new(30);
    let alice = WalletAddress::new("alice");
    let bob = WalletAddress::new("bob");
    let carol = WalletAddress::new("carol");

    let mut topology = ShardTopology::new();
    topology.insert_shard(shard, addresses.clone());
    topology.insert_resident(alice.clone(), shard);
    topology.insert_resident(bob.clone(), shard);
    topology.insert_resident(carol.clone(), shard);

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

    // 2. Submit two transfers from alice back-to-back at the leader. The second arrives
    // while the first still holds the reservation on her only output.
    nodes[0].submit(Command::Transfer {
        from: alice.clone(),
        to: bob.clone(),
        amount: 30,
    });
    nodes[0].submit(Command::Transfer {
        from: alice.clone(),
        to: carol.clone(),
        amount: 20,
    });

    // 3. The first transfer commits; the second is rejected with a conflict notice.
    log::debug!("Waiting for the first transfer to commit and the queue to drain.");
    while *nodes[0].drains.lock().unwrap() == 0 {
        thread::sleep(Duration::from_millis(500));
    }
    assert!(*nodes[0].conflicts.lock().unwrap() >= 1);

    log::debug!("Waiting for replication to the followers.");
    while !nodes
        .iter()
        .all(|node| node.ledger.balance(shard, &bob) == 30)
    {
        thread::sleep(Duration::from_millis(500));
    }
    for node in &nodes {
        assert_eq!(node.ledger.balance(shard, &alice), 80);
        assert_eq!(node.ledger.balance(shard, &carol), 0);
    }
}

#[test]
fn queue_advances_in_order_test() {
    setup_logger(LevelFilter::Info);

    // 1. One shard of 3 members, with alice and carol each funded separately so their
    // transfers spend disjoint outputs.
    let addresses: Vec<NodeAddress> = (0..3)
        .map(|i| NodeAddress::new(format!("queue_{}", i)))
        .collect();
    let shard = ShardId::new(40);
    let alice = WalletAddress::new("alice");
    let bob = WalletAddress::new("bob");
    let carol = WalletAddress::new("carol");
    let dave = WalletAddress::new("dave");

    let mut topology = ShardTopology::new();
    topology.insert_shard(shard, addresses.clone());
    for wallet in [&alice, &bob, &carol, &dave] {
        topology.insert_resident(wallet.clone(), shard);
    }

    let genesis = Block::new(
        BlockHeight::new(1),
        vec![
            Transaction::coinbase_with_amount(&alice, 100),
            Transaction::coinbase_with_amount(&carol, 100),
        ],
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

    // 2. Submit both transfers at the leader. The second queues behind the first and
    // only starts its round after the first retires.
    nodes[0].submit(Command::Transfer {
        from: alice.clone(),
        to: bob.clone(),
        amount: 30,
    });
    nodes[0].submit(Command::Transfer {
        from: carol.clone(),
        to: dave.clone(),
        amount: 20,
    });

    // 3. Wait until both blocks are committed and replicated to every member.
    log::debug!("Waiting for both transfers to commit and replicate.");
    while !nodes
        .iter()
        .all(|node| node.ledger.balance(shard, &bob) == 30 && node.ledger.balance(shard, &dave) == 20)
    {
        thread::sleep(Duration::from_millis(500));
    }
    for node in &nodes {
        assert_eq!(node.ledger.balance(shard, &alice), 80);
        assert_eq!(node.ledger.balance(shard, &carol), 90);
        assert_eq!(node.ledger.best_height(shard), BlockHeight::new(3));
    }

    // 4. The queue advanced once to the second proposal and then drained.
    log::debug!("Waiting for the leader's queue to drain.");
    while *nodes[0].drains.lock().unwrap() == 0 {
        thread::sleep(Duration::from_millis(500));
    }
    let advances = nodes[0].advances.lock().unwrap();
    assert_eq!(advances.len(), 2);
    assert!(advances[0].is_some());
    assert!(advances[1].is_none());
    assert!(*nodes[0].conflicts.lock().unwrap() == 0);
}
