/*
    Copyright © 2024, QuorumShard Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The proposal builder: mints proposal identities, signs the founding vote, and seeds
//! the certificate that the rest of the round co-signs.

use crate::error::ProtocolError;
use crate::types::{
    basic::{NodeAddress, ProposalId, ShardId},
    command::Command,
    keypair::Keypair,
    transaction::Transaction,
};

use super::types::{Proposal, QuorumCertificate, Vote};

pub(crate) struct ProposalBuilder {
    me: Keypair,
    address: NodeAddress,
    next_nonce: u64,
}

impl ProposalBuilder {
    pub(crate) fn new(me: Keypair, address: NodeAddress) -> ProposalBuilder {
        ProposalBuilder {
            me,
            address,
            next_nonce: 0,
        }
    }

    /// Mint a proposal for `command` owned by `shard` and seed its certificate with this
    /// node's founding vote. The signature is verified against our own public key before
    /// the certificate leaves the node, so a bad key fails here rather than at a quorum
    /// that silently never forms.
    pub(crate) fn build(
        &mut self,
        shard: ShardId,
        command: Command,
        transaction: Option<Transaction>,
    ) -> Result<QuorumCertificate, ProtocolError> {
        let id = ProposalId::new(shard, self.address.clone(), self.next_nonce);
        self.next_nonce += 1;

        let proposal = Proposal {
            id,
            command,
            proposer: self.address.clone(),
        };
        let founding_vote = Vote::agree(
            &self.me,
            self.address.clone(),
            &proposal.command,
            transaction,
        );
        if !founding_vote.is_correct_for(&proposal.command) {
            return Err(ProtocolError::InvalidSignature(self.address.clone()));
        }
        Ok(QuorumCertificate::new(proposal, founding_vote))
    }
}
