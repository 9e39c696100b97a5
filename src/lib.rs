/*
    Copyright © 2024, QuorumShard Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! A sharded ledger node with a HotStuff-derived quorum-certificate commit protocol.
//!
//! Every node in the cluster runs the same code; the shard topology decides who leads.
//! Client transfers are admitted by the sender's shard leader, carried through a single
//! co-signing round along a [route](crate::hotstuff::types::Route) that depends on where
//! the sender's and recipient's wallets live, committed as UTXO blocks by the leader(s)
//! the route names, and replicated to the rest of the shard before the next proposal in
//! the queue starts.
//!
//! Library users provide two trait implementations:
//! - [`Network`](crate::networking::Network) for peer-to-peer transport, and
//! - [`Ledger`](crate::ledger::Ledger) for the per-shard chains and unspent-output sets,
//!
//! then build and start a [`Node`](crate::node::Node) through
//! [`NodeSpec`](crate::node::NodeSpec).

pub mod config;

pub mod error;

pub mod events;

pub mod hotstuff;

pub mod ledger;

pub mod logging;

pub mod messages;

pub mod networking;

pub mod node;

pub mod replication;

pub mod types;

pub(crate) mod algorithm;

pub(crate) mod event_bus;
