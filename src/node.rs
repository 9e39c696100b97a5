/*
    Copyright © 2024, QuorumShard Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Methods to build and run a node.
//!
//! A node is one process in the sharded cluster. Whether it acts as a shard leader or a
//! follower at any moment is decided entirely by the topology it currently holds: the
//! member at position 0 of a shard's list leads that shard, and every node runs the same
//! message handlers.
//!
//! The key components of this module are:
//! - The builder-pattern interface to construct a [specification of the node](NodeSpec) with:
//!   1. `NodeSpec::builder` to construct a `NodeSpecBuilder`,
//!   2. The setters of the `NodeSpecBuilder`, and
//!   3. The `NodeSpecBuilder::build` method to construct a [NodeSpec],
//! - The function to [start](NodeSpec::start) a [Node] given its specification,
//! - [The type](Node) which keeps the node alive, accepts client
//!   [commands](crate::types::command::Command), and gracefully shuts the background
//!   threads down when dropped.
//!
//! ## Starting a node
//!
//! ```ignore
//! let node = NodeSpec::builder()
//!     .network(network)
//!     .ledger(ledger)
//!     .configuration(configuration)
//!     .initial_topology(topology)
//!     .on_commit_block(commit_handler)
//!     .build()
//!     .start();
//!
//! node.submit(Command::Transfer { from, to, amount: 5 });
//! ```
//!
//! ### Required setters
//!
//! - `.network(...)`
//! - `.ledger(...)`
//! - `.configuration(...)`
//!
//! ### Optional setters
//!
//! `.initial_topology(...)`, and one `.on_*(...)` setter per event in [crate::events] for
//! registering user-defined event handlers.

use std::sync::mpsc::{self, Sender};
use std::thread::JoinHandle;

use typed_builder::TypedBuilder;

use crate::algorithm::Algorithm;
use crate::config::Configuration;
use crate::event_bus::*;
use crate::events::*;
use crate::hotstuff::messages::{NewProposal, ProgressMessage, TopologyUpdate};
use crate::hotstuff::protocol::QuorumProtocol;
use crate::ledger::Ledger;
use crate::messages::Message;
use crate::networking::{start_polling, Network, SenderHandle, TopologyUpdateHandle};
use crate::replication::Replication;
use crate::types::basic::NodeAddress;
use crate::types::command::Command;
use crate::types::keypair::Keypair;
use crate::types::topology::ShardTopology;

/// Stores all necessary parameters and trait implementations required to run a [Node].
#[derive(TypedBuilder)]
#[builder(builder_method(doc = "
    Create a builder for building a [NodeSpec]. On the builder call the following methods to construct a valid [NodeSpec].

    Required:
    - `.network(...)`
    - `.ledger(...)`
    - `.configuration(...)`

    Optional:
    - `.initial_topology(...)`
    - `.on_propose(...)`
    - `.on_vote_cast(...)`
    - `.on_receive_prepare(...)`
    - `.on_receive_vote(...)`
    - `.on_receive_block_sync_ack(...)`
    - `.on_collect_quorum(...)`
    - `.on_commit_block(...)`
    - `.on_conflict(...)`
    - `.on_advance_queue(...)`
    - `.on_queue_drained(...)`
    - `.on_update_topology(...)`
    - `.on_total_balance(...)`
"))]
pub struct NodeSpec<N: Network + 'static, L: Ledger> {
    // Required parameters
    #[builder(setter(doc = "Set the implementation of peer-to-peer networking. The argument must implement the [Network](crate::networking::Network) trait. Required."))]
    network: N,
    #[builder(setter(doc = "Set the implementation of the chain and UTXO store. The argument must implement the [Ledger](crate::ledger::Ledger) trait. Required."))]
    ledger: L,
    #[builder(setter(doc = "Set the [configuration](Configuration), which contains the necessary parameters to run a node. Required."))]
    configuration: Configuration,
    // Optional parameters
    #[builder(default, setter(strip_option, doc = "Set the topology the node wakes up with. Without one, the node idles until a topology broadcast arrives. Optional."))]
    initial_topology: Option<ShardTopology>,
    #[builder(default, setter(transform = |handler: impl Fn(&ProposeEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<ProposeEvent>),
    doc = "Register a handler closure to be invoked after the node admits and queues a proposal. Optional."))]
    on_propose: Option<HandlerPtr<ProposeEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&VoteCastEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<VoteCastEvent>),
    doc = "Register a handler closure to be invoked after the node sends a vote. Optional."))]
    on_vote_cast: Option<HandlerPtr<VoteCastEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&ReceivePrepareEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<ReceivePrepareEvent>),
    doc = "Register a handler closure to be invoked after the node receives a certificate for co-signing. Optional."))]
    on_receive_prepare: Option<HandlerPtr<ReceivePrepareEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&ReceiveVoteEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<ReceiveVoteEvent>),
    doc = "Register a handler closure to be invoked after the node receives a vote. Optional."))]
    on_receive_vote: Option<HandlerPtr<ReceiveVoteEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&ReceiveBlockSyncAckEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<ReceiveBlockSyncAckEvent>),
    doc = "Register a handler closure to be invoked after the node receives a block-sync acknowledgement. Optional."))]
    on_receive_block_sync_ack: Option<HandlerPtr<ReceiveBlockSyncAckEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&CollectQuorumEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<CollectQuorumEvent>),
    doc = "Register a handler closure to be invoked after one of the node's vote collectors satisfies both of its thresholds. Optional."))]
    on_collect_quorum: Option<HandlerPtr<CollectQuorumEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&CommitBlockEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<CommitBlockEvent>),
    doc = "Register a handler closure to be invoked after the node commits a block. Optional."))]
    on_commit_block: Option<HandlerPtr<CommitBlockEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&ConflictEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<ConflictEvent>),
    doc = "Register a handler closure to be invoked after a proposal is rejected for conflicting inputs. Optional."))]
    on_conflict: Option<HandlerPtr<ConflictEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&AdvanceQueueEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<AdvanceQueueEvent>),
    doc = "Register a handler closure to be invoked after the node retires the in-flight proposal. Optional."))]
    on_advance_queue: Option<HandlerPtr<AdvanceQueueEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&QueueDrainedEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<QueueDrainedEvent>),
    doc = "Register a handler closure to be invoked after the node's proposal queue empties. Optional."))]
    on_queue_drained: Option<HandlerPtr<QueueDrainedEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&UpdateTopologyEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<UpdateTopologyEvent>),
    doc = "Register a handler closure to be invoked after the node replaces its topology. Optional."))]
    on_update_topology: Option<HandlerPtr<UpdateTopologyEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&TotalBalanceEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<TotalBalanceEvent>),
    doc = "Register a handler closure to be invoked after a balance aggregation completes. Optional."))]
    on_total_balance: Option<HandlerPtr<TotalBalanceEvent>>,
}

impl<N: Network + 'static, L: Ledger> NodeSpec<N, L> {
    /// Starts all threads and channels associated with running a node, and returns the
    /// handles to them in a [Node] struct.
    pub fn start(mut self) -> Node<N> {
        self.network
            .init_topology(self.initial_topology.clone().unwrap_or_default());

        let keypair = Keypair::new(self.configuration.me);
        let address = self.configuration.address;

        let (poller_shutdown, poller_shutdown_receiver) = mpsc::channel();
        let (poller, progress_msgs, replication_msgs) =
            start_polling(self.network.clone(), poller_shutdown_receiver);

        let event_handlers = EventHandlers::new(
            self.configuration.log_events,
            self.on_propose,
            self.on_vote_cast,
            self.on_receive_prepare,
            self.on_receive_vote,
            self.on_receive_block_sync_ack,
            self.on_collect_quorum,
            self.on_commit_block,
            self.on_conflict,
            self.on_advance_queue,
            self.on_queue_drained,
            self.on_update_topology,
            self.on_total_balance,
        );

        let (event_publisher, event_subscriber) = if !event_handlers.is_empty() {
            Some(mpsc::channel()).unzip()
        } else {
            (None, None)
        };

        let protocol = QuorumProtocol::new(
            keypair,
            address.clone(),
            self.initial_topology,
            SenderHandle::new(self.network.clone()),
            TopologyUpdateHandle::new(self.network.clone()),
            event_publisher,
        );
        let replication = Replication::new(address.clone(), SenderHandle::new(self.network.clone()));

        let (algorithm_shutdown, algorithm_shutdown_receiver) = mpsc::channel();
        let algorithm = Algorithm::new(
            protocol,
            replication,
            self.ledger,
            progress_msgs,
            replication_msgs,
            algorithm_shutdown_receiver,
        )
        .start();

        let (event_bus_shutdown, event_bus_shutdown_receiver) = if !event_handlers.is_empty() {
            Some(mpsc::channel()).unzip()
        } else {
            (None, None)
        };
        let event_bus = event_subscriber.map(|event_subscriber| {
            start_event_bus(
                event_handlers,
                event_subscriber,
                event_bus_shutdown_receiver.unwrap(), // Safety: should be Some(...).
            )
        });

        Node {
            network: self.network,
            address,
            poller: Some(poller),
            poller_shutdown,
            algorithm: Some(algorithm),
            algorithm_shutdown,
            event_bus,
            event_bus_shutdown,
        }
    }
}

/// A handle to the background threads of a running node. When this value is dropped, all
/// background threads are gracefully shut down.
pub struct Node<N: Network> {
    network: N,
    address: NodeAddress,
    poller: Option<JoinHandle<()>>,
    poller_shutdown: Sender<()>,
    algorithm: Option<JoinHandle<()>>,
    algorithm_shutdown: Sender<()>,
    event_bus: Option<JoinHandle<()>>,
    event_bus_shutdown: Option<Sender<()>>,
}

impl<N: Network> Node<N> {
    /// Submit a client command to this node. The command enters the protocol exactly as
    /// if it had arrived from a peer, so it may be forwarded to a leader before anything
    /// happens.
    pub fn submit(&mut self, command: Command) {
        let message: Message = ProgressMessage::NewProposal(NewProposal {
            command,
            origin: self.address.clone(),
        })
        .into();
        self.network.send(self.address.clone(), message);
    }

    /// Broadcast a full topology replacement to every peer, this node included. Nodes
    /// that end up behind their shard's chain after the replacement sync up immediately.
    pub fn announce_topology(&mut self, topology: ShardTopology) {
        let message: Message = ProgressMessage::Topology(TopologyUpdate { topology }).into();
        self.network.broadcast(message);
    }

    /// The address this node participates in the topology under.
    pub fn address(&self) -> &NodeAddress {
        &self.address
    }
}

impl<N: Network> Drop for Node<N> {
    fn drop(&mut self) {
        // Safety: the order of thread shutdown in this function is important, as the
        // threads make assumptions about the validity of their channels based on this.
        // The algorithm thread receives messages from the poller, and assumes that the
        // poller will live longer than it.

        self.event_bus_shutdown
            .iter()
            .for_each(|shutdown| shutdown.send(()).unwrap());
        if self.event_bus.is_some() {
            self.event_bus.take().unwrap().join().unwrap();
        }

        self.algorithm_shutdown.send(()).unwrap();
        self.algorithm.take().unwrap().join().unwrap();

        self.poller_shutdown.send(()).unwrap();
        self.poller.take().unwrap().join().unwrap();
    }
}
