/*
    Copyright © 2024, QuorumShard Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The [`Network`] trait that library users implement to provide peer-to-peer networking,
//! the poller thread that drains it, and the handle components use to send messages.

use std::{
    sync::mpsc::{self, Receiver, TryRecvError},
    thread::{self, JoinHandle},
};

use crate::messages::{Message, ProgressMessage, ReplicationMessage};
use crate::types::{basic::NodeAddress, topology::ShardTopology};

pub trait Network: Clone + Send {
    /// Inform the network provider of the cluster topology on wake-up.
    fn init_topology(&mut self, topology: ShardTopology);

    /// Inform the network provider of a replaced topology, so it can open connections to
    /// new members and drop removed ones.
    fn update_topology(&mut self, topology: ShardTopology);

    /// Send a message to the specified peer without blocking. Sending to one's own address
    /// must deliver the message like any other. Returns `false` if the peer is known to be
    /// unreachable, in which case the protocol drops it from its topology.
    fn send(&mut self, peer: NodeAddress, message: Message) -> bool;

    /// Send a message to all peers without blocking.
    fn broadcast(&mut self, message: Message);

    /// Receive a message from any peer. Returns immediately with a None if no message is
    /// available now.
    fn recv(&mut self) -> Option<(NodeAddress, Message)>;
}

/// Spawn the poller thread, which polls the [`Network`] for messages and distributes them
/// into receiver handles: progress messages for the algorithm thread's protocol handlers,
/// replication messages for its replication handlers.
pub(crate) fn start_polling<N: Network + 'static>(
    mut network: N,
    shutdown_signal: Receiver<()>,
) -> (
    JoinHandle<()>,
    Receiver<(NodeAddress, ProgressMessage)>,
    Receiver<(NodeAddress, ReplicationMessage)>,
) {
    let (to_progress_msg_receiver, progress_msg_receiver) = mpsc::channel();
    let (to_replication_msg_receiver, replication_msg_receiver) = mpsc::channel();

    let poller_thread = thread::spawn(move || loop {
        match shutdown_signal.try_recv() {
            Ok(()) => return,
            Err(TryRecvError::Empty) => (),
            Err(TryRecvError::Disconnected) => {
                panic!("Poller thread disconnected from main thread")
            }
        }

        if let Some((origin, msg)) = network.recv() {
            match msg {
                Message::ProgressMessage(p_msg) => {
                    let _ = to_progress_msg_receiver.send((origin, p_msg));
                }
                Message::ReplicationMessage(r_msg) => {
                    let _ = to_replication_msg_receiver.send((origin, r_msg));
                }
            }
        } else {
            thread::yield_now()
        }
    });
    (
        poller_thread,
        progress_msg_receiver,
        replication_msg_receiver,
    )
}

/// Handle for sending and broadcasting messages to the [`Network`].
///
/// It can be used to send or broadcast instances of any type that implement the
/// [`Into<Message>`] trait.
#[derive(Clone)]
pub(crate) struct SenderHandle<N: Network> {
    network: N,
}

impl<N: Network> SenderHandle<N> {
    pub(crate) fn new(network: N) -> Self {
        Self { network }
    }

    /// Returns `false` if the network provider reported `peer` unreachable.
    pub(crate) fn send<S: Into<Message>>(&mut self, peer: NodeAddress, msg: S) -> bool {
        self.network.send(peer, msg.into())
    }
}

/// Handle for informing the network provider about topology replacements.
#[derive(Clone)]
pub(crate) struct TopologyUpdateHandle<N: Network> {
    network: N,
}

impl<N: Network> TopologyUpdateHandle<N> {
    pub(crate) fn new(network: N) -> Self {
        Self { network }
    }

    pub(crate) fn update_topology(&mut self, topology: ShardTopology) {
        self.network.update_topology(topology)
    }
}
