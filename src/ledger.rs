/*
    Copyright © 2024, QuorumShard Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The [`Ledger`] trait, the node's seam to the chain and UTXO store it commits into.
//!
//! The node never interprets chain storage itself. Users provide a `Ledger` implementation
//! the same way they provide a [`Network`](crate::networking::Network) implementation, and
//! the protocol calls it from the single algorithm thread, so implementations are never
//! accessed concurrently through the same handle.
//!
//! A ledger keeps one chain and one unspent-output set per shard. A node normally only
//! writes to its own shard's chain, but tracks other shards' chains through replication.

use borsh::{BorshDeserialize, BorshSerialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::types::basic::{BlockHeight, CryptoHash, ShardId, TxId, WalletAddress};
use crate::types::transaction::Transaction;

/// A committed block in a shard's chain.
#[derive(Clone, PartialEq, Eq, Debug, BorshDeserialize, BorshSerialize)]
pub struct Block {
    pub height: BlockHeight,
    pub hash: CryptoHash,
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Assemble a block at `height`, hashing over the height and the contained transactions.
    pub fn new(height: BlockHeight, transactions: Vec<Transaction>) -> Block {
        let mut hasher = Sha256::new();
        hasher.update(height.int().to_le_bytes());
        for transaction in &transactions {
            hasher.update(transaction.id.bytes());
        }
        let hash = CryptoHash::new(hasher.finalize().into());
        Block {
            height,
            hash,
            transactions,
        }
    }
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("no chain for shard {0}")]
    UnknownChain(ShardId),

    #[error("block {0:?} not found")]
    UnknownBlock(CryptoHash),

    #[error("block at height {got} does not extend chain at height {tip}")]
    NonSequentialBlock { tip: BlockHeight, got: BlockHeight },
}

/// The chain and UTXO store a node commits into.
pub trait Ledger: Send + 'static {
    /// Append a new block containing `transactions` to `shard`'s chain and update the
    /// unspent-output set. Returns the committed block.
    fn commit(
        &mut self,
        shard: ShardId,
        transactions: Vec<Transaction>,
    ) -> Result<Block, LedgerError>;

    /// Apply a block received through replication. The block must extend the chain's
    /// current tip by exactly one height.
    fn apply_block(&mut self, shard: ShardId, block: Block) -> Result<(), LedgerError>;

    /// The height of `shard`'s chain tip, or [`BlockHeight::new(0)`](BlockHeight) for an
    /// empty chain.
    fn best_height(&self, shard: ShardId) -> BlockHeight;

    /// The hashes of `shard`'s blocks strictly above `height`, in ascending height order.
    fn block_hashes(&self, shard: ShardId, above: BlockHeight) -> Vec<CryptoHash>;

    /// Look up a block in `shard`'s chain by hash.
    fn block(&self, shard: ShardId, hash: &CryptoHash) -> Option<Block>;

    /// Unspent outputs of `wallet` on `shard` that together cover at least `amount`, with
    /// their accumulated value. Stops accumulating once `amount` is reached; the
    /// accumulated value may fall short if the wallet cannot cover it.
    fn spendable_outputs(
        &self,
        shard: ShardId,
        wallet: &WalletAddress,
        amount: u64,
    ) -> (u64, Vec<(TxId, u32)>);

    /// The total value of `wallet`'s unspent outputs on `shard`.
    fn balance(&self, shard: ShardId, wallet: &WalletAddress) -> u64;
}
