/*
    Copyright © 2024, QuorumShard Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The UTXO transaction data model.
//!
//! Transactions are built by the node that first receives a client command (from the
//! spendable outputs its [`Ledger`](crate::ledger::Ledger) reports), carried through the
//! quorum round attached to the founding vote, and committed to a shard's chain by the
//! leader that collects the quorum. They are not individually signed: the protocol signs
//! the command, and the attached transaction is ratified as part of it.

use borsh::{BorshDeserialize, BorshSerialize};
use rand::Rng;
use sha2::{Digest, Sha256};

use super::basic::{TxId, WalletAddress};

/// Reward minted by the coinbase transaction that accompanies every quorum commit.
pub const SUBSIDY: u64 = 10;

/// Sentinel `vout` marking a coinbase input, which references no previous output.
const COINBASE_VOUT: u32 = u32::MAX;

/// A reference to an unspent output of a previous transaction.
#[derive(Clone, PartialEq, Eq, Debug, BorshDeserialize, BorshSerialize)]
pub struct TxInput {
    pub txid: TxId,
    pub vout: u32,
    pub from: WalletAddress,
}

impl TxInput {
    pub fn is_coinbase(&self) -> bool {
        self.vout == COINBASE_VOUT
    }
}

/// A new output, spendable by the named wallet.
#[derive(Clone, PartialEq, Eq, Debug, BorshDeserialize, BorshSerialize)]
pub struct TxOutput {
    pub value: u64,
    pub to: WalletAddress,
}

#[derive(Clone, PartialEq, Eq, Debug, BorshDeserialize, BorshSerialize)]
pub struct Transaction {
    pub id: TxId,
    pub vin: Vec<TxInput>,
    pub vout: Vec<TxOutput>,
}

impl Transaction {
    /// A coinbase transaction minting the standard [`SUBSIDY`] into `to`.
    pub fn coinbase(to: &WalletAddress) -> Transaction {
        Self::coinbase_with_amount(to, SUBSIDY)
    }

    /// A coinbase transaction minting an explicit `amount` into `to`. Used for the credit
    /// half of a cross-shard transfer and for reward distribution.
    pub fn coinbase_with_amount(to: &WalletAddress, amount: u64) -> Transaction {
        // Random entropy in the input's txid keeps two coinbases to the same wallet from
        // hashing identically.
        let entropy: [u8; 16] = rand::thread_rng().gen();
        let vin = vec![TxInput {
            txid: TxId::new(entropy.to_vec()),
            vout: COINBASE_VOUT,
            from: to.clone(),
        }];
        let vout = vec![TxOutput {
            value: amount,
            to: to.clone(),
        }];
        let mut tx = Transaction {
            id: TxId::default(),
            vin,
            vout,
        };
        tx.id = tx.hash();
        tx
    }

    /// A transfer spending the given outputs of `from`. `total` is the sum of the spent
    /// outputs; anything above `amount` comes back to `from` as change.
    pub fn transfer(
        from: &WalletAddress,
        to: &WalletAddress,
        amount: u64,
        total: u64,
        outputs: Vec<(TxId, u32)>,
    ) -> Transaction {
        let vin = outputs
            .into_iter()
            .map(|(txid, vout)| TxInput {
                txid,
                vout,
                from: from.clone(),
            })
            .collect();
        let mut vout = vec![TxOutput {
            value: amount,
            to: to.clone(),
        }];
        if total > amount {
            vout.push(TxOutput {
                value: total - amount,
                to: from.clone(),
            });
        }
        let mut tx = Transaction {
            id: TxId::default(),
            vin,
            vout,
        };
        tx.id = tx.hash();
        tx
    }

    pub fn is_coinbase(&self) -> bool {
        self.vin.len() == 1 && self.vin[0].is_coinbase()
    }

    /// The SHA256 hash of the transaction's serialized form, with the id field cleared.
    pub fn hash(&self) -> TxId {
        let mut cleared = self.clone();
        cleared.id = TxId::default();
        let bytes = cleared.try_to_vec().unwrap();
        TxId::new(Sha256::digest(bytes).to_vec())
    }
}
