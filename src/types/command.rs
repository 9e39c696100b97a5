/*
    Copyright © 2024, QuorumShard Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The tagged [`Command`] type that client requests are parsed into, once, at ingress.
//!
//! Every downstream component (the proposal builder, the vote collectors, the commit
//! pipeline) matches on the variants of this enum and never re-parses a request. Votes and
//! quorum certificates sign over a command's Borsh bytes.

use borsh::{BorshDeserialize, BorshSerialize};
use std::fmt::{self, Display, Formatter};

use super::basic::WalletAddress;

/// A client request admitted into the protocol.
#[derive(Clone, PartialEq, Eq, Debug, BorshDeserialize, BorshSerialize)]
pub enum Command {
    /// Move `amount` from the `from` wallet to the `to` wallet, possibly across shards.
    /// The only variant that goes through a quorum round.
    Transfer {
        from: WalletAddress,
        to: WalletAddress,
        amount: u64,
    },

    /// Mint `amount` into the `to` wallet on the leader's own shard. Committed locally by
    /// the shard leader without a quorum round.
    DistributeRewards { to: WalletAddress, amount: u64 },

    /// Read-only aggregation of a wallet's balance across every shard.
    GetBalance { of: WalletAddress },
}

impl Command {
    /// The bytes that proposer and voter signatures are computed over.
    pub(crate) fn signing_bytes(&self) -> Vec<u8> {
        self.try_to_vec().unwrap()
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Command::Transfer { from, to, amount } => {
                write!(f, "transfer {} from {} to {}", amount, from, to)
            }
            Command::DistributeRewards { to, amount } => {
                write!(f, "distribute {} to {}", amount, to)
            }
            Command::GetBalance { of } => write!(f, "balance of {}", of),
        }
    }
}
