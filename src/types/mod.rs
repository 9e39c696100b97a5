/*
    Copyright © 2024, QuorumShard Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types and traits that are used across multiple components of the node.
//!
//! Types specific to a single component live in that component's own modules, e.g.,
//! [`crate::hotstuff::types`].

pub mod basic;

pub mod command;

pub mod keypair;

pub mod signed_messages;

pub mod topology;

pub mod transaction;
