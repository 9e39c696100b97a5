/*
    Copyright © 2024, QuorumShard Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The algorithm thread: the single writer of all protocol state.
//!
//! Every message the poller receives is handled here, one at a time, against state only
//! this thread touches: the topology, the vote collectors, the commit sequencer, the
//! replication transit lists, and the ledger. Handler errors are local by design. The
//! offending message is logged and dropped, and the thread moves on to the next one.

use std::sync::mpsc::{Receiver, TryRecvError};
use std::thread::{self, JoinHandle};

use log::info;

use crate::hotstuff::protocol::QuorumProtocol;
use crate::ledger::Ledger;
use crate::messages::{ProgressMessage, ReplicationMessage};
use crate::networking::Network;
use crate::replication::Replication;
use crate::types::{basic::NodeAddress, topology::ShardTopology};

pub(crate) struct Algorithm<N: Network + 'static, L: Ledger> {
    protocol: QuorumProtocol<N>,
    replication: Replication<N>,
    ledger: L,
    progress_msgs: Receiver<(NodeAddress, ProgressMessage)>,
    replication_msgs: Receiver<(NodeAddress, ReplicationMessage)>,
    shutdown_signal: Receiver<()>,
}

impl<N: Network + 'static, L: Ledger> Algorithm<N, L> {
    pub(crate) fn new(
        protocol: QuorumProtocol<N>,
        replication: Replication<N>,
        ledger: L,
        progress_msgs: Receiver<(NodeAddress, ProgressMessage)>,
        replication_msgs: Receiver<(NodeAddress, ReplicationMessage)>,
        shutdown_signal: Receiver<()>,
    ) -> Algorithm<N, L> {
        Algorithm {
            protocol,
            replication,
            ledger,
            progress_msgs,
            replication_msgs,
            shutdown_signal,
        }
    }

    pub(crate) fn start(mut self) -> JoinHandle<()> {
        thread::spawn(move || {
            let empty_topology = ShardTopology::new();
            loop {
                match self.shutdown_signal.try_recv() {
                    Ok(()) => return,
                    Err(TryRecvError::Empty) => (),
                    Err(TryRecvError::Disconnected) => {
                        panic!("algorithm thread disconnected from main thread")
                    }
                }

                let mut idle = true;

                if let Ok((_, msg)) = self.progress_msgs.try_recv() {
                    idle = false;
                    if let Err(error) = self.protocol.on_message(&mut self.ledger, msg) {
                        info!("dropping progress message: {}", error);
                    }
                }

                if let Ok((_, msg)) = self.replication_msgs.try_recv() {
                    idle = false;
                    let topology = self.protocol.topology().unwrap_or(&empty_topology);
                    if let Err(error) =
                        self.replication
                            .on_message(&mut self.ledger, topology, msg)
                    {
                        info!("dropping replication message: {}", error);
                    }
                }

                if idle {
                    thread::yield_now()
                }
            }
        })
    }
}
