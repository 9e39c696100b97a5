use std::{
    collections::HashMap,
    sync::{
        mpsc::{self, Receiver, Sender, TryRecvError},
        Arc, Mutex,
    },
};

use quorumshard::{
    messages::Message,
    networking::Network,
    types::{basic::NodeAddress, topology::ShardTopology},
};

/// A mock network stub which passes messages from and to threads using channels. A node's
/// own address is included in `all_peers`, so sends to oneself deliver like any other.
#[derive(Clone)]
pub(crate) struct NetworkStub {
    my_address: NodeAddress,
    all_peers: HashMap<NodeAddress, Sender<(NodeAddress, Message)>>,
    inbox: Arc<Mutex<Receiver<(NodeAddress, Message)>>>,
}

impl Network for NetworkStub {
    fn init_topology(&mut self, _: ShardTopology) {}

    fn update_topology(&mut self, _: ShardTopology) {}

    fn send(&mut self, peer: NodeAddress, message: Message) -> bool {
        match self.all_peers.get(&peer) {
            Some(peer) => {
                let _ = peer.send((self.my_address.clone(), message));
                true
            }
            None => false,
        }
    }

    fn broadcast(&mut self, message: Message) {
        for (_, peer) in &self.all_peers {
            let _ = peer.send((self.my_address.clone(), message.clone()));
        }
    }

    fn recv(&mut self) -> Option<(NodeAddress, Message)> {
        match self.inbox.lock().unwrap().try_recv() {
            Ok(o_m) => Some(o_m),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => panic!(),
        }
    }
}

pub(crate) fn mock_network(peers: impl Iterator<Item = NodeAddress>) -> Vec<NetworkStub> {
    let mut all_peers = HashMap::new();
    let peer_and_inboxes: Vec<(NodeAddress, Receiver<(NodeAddress, Message)>)> = peers
        .map(|peer| {
            let (sender, receiver) = mpsc::channel();
            all_peers.insert(peer.clone(), sender);

            (peer, receiver)
        })
        .collect();

    peer_and_inboxes
        .into_iter()
        .map(|(my_address, inbox)| NetworkStub {
            my_address,
            all_peers: all_peers.clone(),
            inbox: Arc::new(Mutex::new(inbox)),
        })
        .collect()
}
