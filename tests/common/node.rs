use std::sync::{Arc, Mutex};

use ed25519_dalek::SigningKey;
use rand_core::OsRng;

use quorumshard::{
    config::Configuration,
    events::{
        AdvanceQueueEvent, CollectQuorumEvent, ConflictEvent, QueueDrainedEvent,
        TotalBalanceEvent, UpdateTopologyEvent,
    },
    node::{Node, NodeSpec},
    types::{
        basic::{NodeAddress, ProposalId},
        command::Command,
        topology::ShardTopology,
    },
};

use super::mem_ledger::MemLedger;
use super::network::NetworkStub;

/// A running node together with a handle to its ledger and the counters its event
/// handlers feed. Tests poll the counters and the ledger to observe progress.
#[allow(dead_code)]
pub(crate) struct TestNode {
    pub(crate) address: NodeAddress,
    pub(crate) ledger: MemLedger,
    pub(crate) quorums: Arc<Mutex<Vec<ProposalId>>>,
    pub(crate) conflicts: Arc<Mutex<usize>>,
    pub(crate) advances: Arc<Mutex<Vec<Option<ProposalId>>>>,
    pub(crate) drains: Arc<Mutex<usize>>,
    pub(crate) total_balance: Arc<Mutex<Option<u64>>>,
    pub(crate) topology_updates: Arc<Mutex<usize>>,
    node: Node<NetworkStub>,
}

#[allow(dead_code)]
impl TestNode {
    pub(crate) fn start(
        address: NodeAddress,
        network: NetworkStub,
        ledger: MemLedger,
        topology: ShardTopology,
    ) -> TestNode {
        let quorums = Arc::new(Mutex::new(Vec::new()));
        let conflicts = Arc::new(Mutex::new(0));
        let advances = Arc::new(Mutex::new(Vec::new()));
        let drains = Arc::new(Mutex::new(0));
        let total_balance = Arc::new(Mutex::new(None));
        let topology_updates = Arc::new(Mutex::new(0));

        let configuration = Configuration::builder()
            .me(SigningKey::generate(&mut OsRng))
            .address(address.clone())
            .log_events(true)
            .build();

        let quorums_handle = quorums.clone();
        let conflicts_handle = conflicts.clone();
        let advances_handle = advances.clone();
        let drains_handle = drains.clone();
        let total_balance_handle = total_balance.clone();
        let topology_updates_handle = topology_updates.clone();

        let node = NodeSpec::builder()
            .network(network)
            .ledger(ledger.clone())
            .configuration(configuration)
            .initial_topology(topology)
            .on_collect_quorum(move |event: &CollectQuorumEvent| {
                quorums_handle
                    .lock()
                    .unwrap()
                    .push(event.proposal.id.clone())
            })
            .on_conflict(move |_: &ConflictEvent| *conflicts_handle.lock().unwrap() += 1)
            .on_advance_queue(move |event: &AdvanceQueueEvent| {
                advances_handle.lock().unwrap().push(event.next.clone())
            })
            .on_queue_drained(move |_: &QueueDrainedEvent| *drains_handle.lock().unwrap() += 1)
            .on_total_balance(move |event: &TotalBalanceEvent| {
                *total_balance_handle.lock().unwrap() = Some(event.amount)
            })
            .on_update_topology(move |_: &UpdateTopologyEvent| {
                *topology_updates_handle.lock().unwrap() += 1
            })
            .build()
            .start();

        TestNode {
            address,
            ledger,
            quorums,
            conflicts,
            advances,
            drains,
            total_balance,
            topology_updates,
            node,
        }
    }

    pub(crate) fn submit(&mut self, command: Command) {
        self.node.submit(command)
    }

    pub(crate) fn announce_topology(&mut self, topology: ShardTopology) {
        self.node.announce_topology(topology)
    }
}
