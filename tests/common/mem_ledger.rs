use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use quorumshard::{
    ledger::{Block, Ledger, LedgerError},
    types::{
        basic::{BlockHeight, CryptoHash, ShardId, TxId, WalletAddress},
        transaction::{Transaction, TxOutput},
    },
};

/// A simple in-memory implementation of the [Ledger] trait: one chain and one
/// unspent-output map per shard. Clones share state, so a test can keep a handle to a
/// node's ledger and inspect it while the node runs.
#[derive(Clone, Default)]
pub(crate) struct MemLedger {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    chains: HashMap<ShardId, Vec<Block>>,
    unspent: HashMap<ShardId, HashMap<(TxId, u32), TxOutput>>,
}

impl Inner {
    fn apply_transactions(&mut self, shard: ShardId, transactions: &[Transaction]) {
        let unspent = self.unspent.entry(shard).or_default();
        for transaction in transactions {
            if !transaction.is_coinbase() {
                for input in &transaction.vin {
                    unspent.remove(&(input.txid.clone(), input.vout));
                }
            }
            for (vout, output) in transaction.vout.iter().enumerate() {
                unspent.insert((transaction.id.clone(), vout as u32), output.clone());
            }
        }
    }
}

impl Ledger for MemLedger {
    fn commit(
        &mut self,
        shard: ShardId,
        transactions: Vec<Transaction>,
    ) -> Result<Block, LedgerError> {
        let mut inner = self.inner.lock().unwrap();
        let height = BlockHeight::new(inner.chains.entry(shard).or_default().len() as u64 + 1);
        let block = Block::new(height, transactions);
        inner.apply_transactions(shard, &block.transactions);
        inner.chains.entry(shard).or_default().push(block.clone());
        Ok(block)
    }

    fn apply_block(&mut self, shard: ShardId, block: Block) -> Result<(), LedgerError> {
        let mut inner = self.inner.lock().unwrap();
        let tip = BlockHeight::new(inner.chains.entry(shard).or_default().len() as u64);
        if block.height.int() != tip.int() + 1 {
            return Err(LedgerError::NonSequentialBlock {
                tip,
                got: block.height,
            });
        }
        inner.apply_transactions(shard, &block.transactions);
        inner.chains.entry(shard).or_default().push(block);
        Ok(())
    }

    fn best_height(&self, shard: ShardId) -> BlockHeight {
        let inner = self.inner.lock().unwrap();
        BlockHeight::new(inner.chains.get(&shard).map_or(0, |chain| chain.len()) as u64)
    }

    fn block_hashes(&self, shard: ShardId, above: BlockHeight) -> Vec<CryptoHash> {
        let inner = self.inner.lock().unwrap();
        inner.chains.get(&shard).map_or(Vec::new(), |chain| {
            chain
                .iter()
                .filter(|block| block.height > above)
                .map(|block| block.hash)
                .collect()
        })
    }

    fn block(&self, shard: ShardId, hash: &CryptoHash) -> Option<Block> {
        let inner = self.inner.lock().unwrap();
        inner
            .chains
            .get(&shard)?
            .iter()
            .find(|block| block.hash == *hash)
            .cloned()
    }

    fn spendable_outputs(
        &self,
        shard: ShardId,
        wallet: &WalletAddress,
        amount: u64,
    ) -> (u64, Vec<(TxId, u32)>) {
        let inner = self.inner.lock().unwrap();
        let Some(unspent) = inner.unspent.get(&shard) else {
            return (0, Vec::new());
        };
        // Sort for a deterministic pick order across nodes.
        let mut owned: Vec<(&(TxId, u32), &TxOutput)> = unspent
            .iter()
            .filter(|(_, output)| output.to == *wallet)
            .collect();
        owned.sort_by(|a, b| a.0.cmp(b.0));

        let mut total = 0;
        let mut outputs = Vec::new();
        for ((txid, vout), output) in owned {
            if total >= amount {
                break;
            }
            total += output.value;
            outputs.push((txid.clone(), *vout));
        }
        (total, outputs)
    }

    fn balance(&self, shard: ShardId, wallet: &WalletAddress) -> u64 {
        let inner = self.inner.lock().unwrap();
        inner.unspent.get(&shard).map_or(0, |unspent| {
            unspent
                .values()
                .filter(|output| output.to == *wallet)
                .map(|output| output.value)
                .sum()
        })
    }
}
