//! Cross-shard transfers over both routes: the unmediated route where both endpoint
//! shards' leaders collect, and the mediated route where the relation table hands the
//! whole round to a third shard's leader.

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
fn unmediated_transfer_test() {
    setup_logger(LevelFilter::Info);

    // 1. Two unrelated shards: 3 members holding alice, 5 members holding bob. The vote
    // threshold is (3 + 5) * 8 / 10 = 6 agrees including both endpoint leaders.
    let source = ShardId::new(10);
    let target = ShardId::new(11);
    let source_addresses: Vec<NodeAddress> = (0..3)
        .map(|i| NodeAddress::new(format!("unmediated_a{}", i)))
        .collect();
    let target_addresses: Vec<NodeAddress> = (0..5)
        .map(|i| NodeAddress::new(format!("unmediated_b{}", i)))
        .collect();
    let alice = WalletAddress::new("alice");
    let bob = WalletAddress::new("bob");

    let mut topology = ShardTopology::new();
    topology.insert_shard(source, source_addresses.clone());
    topology.insert_shard(target, target_addresses.clone());
    topology.insert_resident(alice.clone(), source);
    topology.insert_resident(bob.clone(), target);

    let genesis = Block::new(
        BlockHeight::new(1),
        vec![Transaction::coinbase_with_amount(&alice, 100)],
    );
    let addresses: Vec<NodeAddress> = source_addresses
        .iter()
        .chain(target_addresses.iter())
        .cloned()
        .collect();
    let mut nodes: Vec<TestNode> = addresses
        .iter()
        .cloned()
        .zip(mock_network(addresses.iter().cloned()))
        .map(|(address, network)| {
            let mut ledger = MemLedger::default();
            ledger.apply_block(source, genesis.clone()).unwrap();
            TestNode::start(address, network, ledger, topology.clone())
        })
        .collect();

    // 2. Submit the transfer at the source shard's leader.
    nodes[0].submit(Command::Transfer {
        from: alice.clone(),
        to: bob.clone(),
        amount: 40,
    });

    // 3. The debit block lands on the source shard's chain, the credit block on the
    // target shard's chain.
    log::debug!("Waiting for both halves to commit and replicate.");
    while !nodes[..3]
        .iter()
        .all(|node| node.ledger.balance(source, &alice) == 70)
        || !nodes[3..]
            .iter()
            .all(|node| node.ledger.balance(target, &bob) == 40)
    {
        thread::sleep(Duration::from_millis(500));
    }

    // 4. The source shard's leader retires the proposal once its own followers catch up.
    log::debug!("Waiting for the source leader's queue to drain.");
    while *nodes[0].drains.lock().unwrap() == 0 {
        thread::sleep(Duration::from_millis(500));
    }

    // Both endpoint leaders collect; nobody else does.
    assert_eq!(nodes[0].quorums.lock().unwrap().len(), 1);
    assert_eq!(nodes[3].quorums.lock().unwrap().len(), 1);
    for follower in nodes[..3].iter().skip(1).chain(nodes[3..].iter().skip(1)) {
        assert!(follower.quorums.lock().unwrap().is_empty());
    }
}

#[test]
fn mediated_transfer_test() {
    setup_logger(LevelFilter::Info);

    // 1. Two endpoint shards of 2 members each and a 4-member mediator shard named by
    // the relation table. The mediator's leader runs the whole round: threshold
    // 4 / 2 + 1 = 3 agrees including itself.
    let source = ShardId::new(20);
    let target = ShardId::new(21);
    let mediator = ShardId::new(22);
    let source_addresses: Vec<NodeAddress> = (0..2)
        .map(|i| NodeAddress::new(format!("mediated_a{}", i)))
        .collect();
    let target_addresses: Vec<NodeAddress> = (0..2)
        .map(|i| NodeAddress::new(format!("mediated_b{}", i)))
        .collect();
    let mediator_addresses: Vec<NodeAddress> = (0..4)
        .map(|i| NodeAddress::new(format!("mediated_m{}", i)))
        .collect();
    let alice = WalletAddress::new("alice");
    let bob = WalletAddress::new("bob");

    let mut topology = ShardTopology::new();
    topology.insert_shard(source, source_addresses.clone());
    topology.insert_shard(target, target_addresses.clone());
    topology.insert_shard(mediator, mediator_addresses.clone());
    topology.insert_relation(source, target, mediator);
    topology.insert_resident(alice.clone(), source);
    topology.insert_resident(bob.clone(), target);

    let genesis = Block::new(
        BlockHeight::new(1),
        vec![Transaction::coinbase_with_amount(&alice, 100)],
    );
    let addresses: Vec<NodeAddress> = source_addresses
        .iter()
        .chain(target_addresses.iter())
        .chain(mediator_addresses.iter())
        .cloned()
        .collect();
    let mut nodes: Vec<TestNode> = addresses
        .iter()
        .cloned()
        .zip(mock_network(addresses.iter().cloned()))
        .map(|(address, network)| {
            let mut ledger = MemLedger::default();
            ledger.apply_block(source, genesis.clone()).unwrap();
            TestNode::start(address, network, ledger, topology.clone())
        })
        .collect();

    // 2. Submit the transfer at the source shard's leader.
    nodes[0].submit(Command::Transfer {
        from: alice.clone(),
        to: bob.clone(),
        amount: 25,
    });

    // 3. The mediator's leader commits both halves and serves them to the members of
    // both endpoint shards, leaders included.
    log::debug!("Waiting for both halves to replicate from the mediator's leader.");
    while !nodes[..2]
        .iter()
        .all(|node| node.ledger.balance(source, &alice) == 85)
        || !nodes[2..4]
            .iter()
            .all(|node| node.ledger.balance(target, &bob) == 25)
    {
        thread::sleep(Duration::from_millis(500));
    }
    assert_eq!(nodes[4].ledger.balance(source, &alice), 85);
    assert_eq!(nodes[4].ledger.balance(target, &bob), 25);

    // 4. The source shard's leader retires the proposal once its follower catches up.
    log::debug!("Waiting for the source leader's queue to drain.");
    while *nodes[0].drains.lock().unwrap() == 0 {
        thread::sleep(Duration::from_millis(500));
    }

    // On a mediated route only the mediator's leader collects; in particular the
    // endpoint leaders never do.
    assert_eq!(nodes[4].quorums.lock().unwrap().len(), 1);
    assert!(nodes[0].quorums.lock().unwrap().is_empty());
    assert!(nodes[2].quorums.lock().unwrap().is_empty());
}
