/*
    Copyright © 2024, QuorumShard Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The errors a message handler can produce. All of them are local: the algorithm thread
//! logs the error, drops the message that caused it, and keeps serving the next one.

use thiserror::Error;

use crate::ledger::LedgerError;
use crate::types::basic::{NodeAddress, ProposalId, ShardId, WalletAddress};

#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A transfer recipient could not be mapped to any shard.
    #[error("no shard found for recipient wallet {0}")]
    UnresolvableRecipient(WalletAddress),

    /// A message referenced a shard the topology does not contain.
    #[error("unknown shard {0}")]
    UnknownShard(ShardId),

    /// A proposal arrived before the node learned the cluster topology.
    #[error("no topology received yet, cannot route proposals")]
    NotYetSharded,

    /// A vote or certificate failed signature verification.
    #[error("invalid signature on message from {0}")]
    InvalidSignature(NodeAddress),

    /// A proposal tried to spend an output already reserved by a queued proposal.
    #[error("inputs of proposal {0} conflict with a queued proposal")]
    ConflictingInputs(ProposalId),

    /// The sender's spendable outputs do not cover the transfer amount.
    #[error("insufficient funds: {available} available, {needed} needed")]
    InsufficientFunds { available: u64, needed: u64 },

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}
