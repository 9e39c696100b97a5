/*
    Copyright © 2024, QuorumShard Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions for structured messages that are sent between nodes.
//!
//! This includes messages [used in the quorum commit protocol](ProgressMessage), and those
//! [used for chain replication](ReplicationMessage).

use borsh::{BorshDeserialize, BorshSerialize};

pub use crate::hotstuff::messages::ProgressMessage;
pub use crate::replication::ReplicationMessage;

#[derive(Clone, BorshDeserialize, BorshSerialize)]
pub enum Message {
    ProgressMessage(ProgressMessage),
    ReplicationMessage(ReplicationMessage),
}
