/*
    Copyright © 2024, QuorumShard Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The message router of the quorum commit protocol.
//!
//! Every progress message a node receives lands here, on the algorithm thread. The same
//! handler code runs on every node; what a node does with a message is decided entirely
//! by what the current topology says about it, so leadership changes need no
//! reconfiguration.
//!
//! The overall flow of one transfer:
//! 1. A client command enters at some node ([`on_new_proposal`](QuorumProtocol::on_new_proposal))
//!    and is forwarded to the leader of the sender's shard, which builds the transaction,
//!    reserves its inputs, mints the certificate, and queues it.
//! 2. When the proposal reaches the head of the queue, the round starts: the certificate
//!    fans out for co-signing, directly on same-shard routes, through
//!    [`CrossShardData`] on cross-shard ones.
//! 3. Votes flow back to the collecting leader(s). When a collector satisfies both of its
//!    thresholds, the commit pipeline writes the block(s) and advertises the new chain
//!    tips.
//! 4. Followers replicate and acknowledge; enough acknowledgements retire the proposal
//!    and promote the next.

use std::collections::HashMap;
use std::sync::mpsc::Sender;
use std::time::SystemTime;

use ed25519_dalek::VerifyingKey;
use log::{debug, info};

use crate::error::ProtocolError;
use crate::events::*;
use crate::ledger::{Block, Ledger};
use crate::messages::Message;
use crate::networking::{Network, SenderHandle, TopologyUpdateHandle};
use crate::replication::ReplicationMessage;
use crate::types::{
    basic::{BlockHeight, NodeAddress, ProposalId, ShardId, TxId, WalletAddress},
    command::Command,
    keypair::Keypair,
    signed_messages::SignedMessage,
    topology::ShardTopology,
    transaction::Transaction,
};

use super::messages::*;
use super::proposer::ProposalBuilder;
use super::sequencer::{CommitSequencer, Retirement};
use super::types::{QuorumCertificate, Route, Vote, VoteCollector};

/// A balance aggregation in flight: how many shard reports are still outstanding and the
/// sum so far.
struct BalanceAggregation {
    expected: usize,
    received: usize,
    total: u64,
}

pub(crate) struct QuorumProtocol<N: Network> {
    me: Keypair,
    address: NodeAddress,
    topology: Option<ShardTopology>,
    proposer: ProposalBuilder,
    sequencer: CommitSequencer,
    collectors: HashMap<ProposalId, VoteCollector>,
    pending_balances: HashMap<WalletAddress, BalanceAggregation>,
    sender: SenderHandle<N>,
    topology_update: TopologyUpdateHandle<N>,
    event_publisher: Option<Sender<Event>>,
}

impl<N: Network> QuorumProtocol<N> {
    pub(crate) fn new(
        me: Keypair,
        address: NodeAddress,
        topology: Option<ShardTopology>,
        sender: SenderHandle<N>,
        topology_update: TopologyUpdateHandle<N>,
        event_publisher: Option<Sender<Event>>,
    ) -> QuorumProtocol<N> {
        let proposer = ProposalBuilder::new(me.clone(), address.clone());
        QuorumProtocol {
            me,
            address,
            topology,
            proposer,
            sequencer: CommitSequencer::new(),
            collectors: HashMap::new(),
            pending_balances: HashMap::new(),
            sender,
            topology_update,
            event_publisher,
        }
    }

    pub(crate) fn on_message(
        &mut self,
        ledger: &mut impl Ledger,
        message: ProgressMessage,
    ) -> Result<(), ProtocolError> {
        match message {
            ProgressMessage::NewProposal(msg) => self.on_new_proposal(ledger, msg),
            ProgressMessage::Prepare(msg) => self.on_prepare(msg),
            ProgressMessage::CrossShardData(msg) => self.on_cross_shard_data(ledger, msg),
            ProgressMessage::Vote(msg) => self.on_vote(ledger, msg),
            ProgressMessage::BlockSyncAck(msg) => self.on_block_sync_ack(msg),
            ProgressMessage::ConflictNotice(msg) => {
                info!("proposal {} rejected for conflicting inputs", msg.proposal);
                self.publish(Event::Conflict(ConflictEvent {
                    timestamp: SystemTime::now(),
                    proposal: msg.proposal,
                }));
                Ok(())
            }
            ProgressMessage::Topology(msg) => {
                self.on_topology(ledger, msg);
                Ok(())
            }
            ProgressMessage::BalanceQuery(msg) => self.on_balance_query(ledger, msg),
            ProgressMessage::BalanceReport(msg) => {
                self.on_balance_report(msg);
                Ok(())
            }
        }
    }

    /// The topology this node currently routes with. Replication handlers need it too.
    pub(crate) fn topology(&self) -> Option<&ShardTopology> {
        self.topology.as_ref()
    }

    fn on_topology(&mut self, ledger: &mut impl Ledger, msg: TopologyUpdate) {
        let shard_count = msg.topology.shard_count();
        self.topology_update.update_topology(msg.topology.clone());
        self.topology = Some(msg.topology);
        self.publish(Event::UpdateTopology(UpdateTopologyEvent {
            timestamp: SystemTime::now(),
            shard_count,
        }));

        // Tell the shard leader where our chain stands, so a freshly sharded node
        // catches up right away instead of waiting for the next commit.
        let announce = self.topology.as_ref().and_then(|topology| {
            topology.shard_of_node(&self.address).and_then(|own_shard| {
                topology
                    .leader(&own_shard)
                    .filter(|leader| **leader != self.address)
                    .map(|leader| (own_shard, leader.clone()))
            })
        });
        if let Some((own_shard, leader)) = announce {
            let best_height = ledger.best_height(own_shard);
            self.send(
                leader,
                ReplicationMessage::Version {
                    shard: own_shard,
                    best_height,
                    sender: self.address.clone(),
                },
            );
        }
    }

    /// Ingress of a client command. Non-leaders forward to their shard leader; the leader
    /// dispatches on the command kind.
    fn on_new_proposal(
        &mut self,
        ledger: &mut impl Ledger,
        msg: NewProposal,
    ) -> Result<(), ProtocolError> {
        let (own_shard, leads) = {
            let topology = self.require_topology()?;
            let own_shard = topology
                .shard_of_node(&self.address)
                .ok_or(ProtocolError::NotYetSharded)?;
            (own_shard, topology.leads(&self.address, &own_shard))
        };
        if !leads {
            let leader = self.shard_leader(&own_shard)?;
            self.send(leader, ProgressMessage::NewProposal(msg));
            return Ok(());
        }

        match msg.command.clone() {
            Command::GetBalance { of } => self.start_balance_aggregation(ledger, of),
            Command::DistributeRewards { to, amount } => {
                self.commit_reward(ledger, own_shard, &to, amount)
            }
            Command::Transfer { from, to, amount } => {
                self.admit_transfer(ledger, own_shard, msg, from, to, amount)
            }
        }
    }

    /// Leader-side admission of a transfer: resolve shards, build the transaction from
    /// spendable outputs, reserve its inputs, mint the certificate, and queue it.
    fn admit_transfer(
        &mut self,
        ledger: &mut impl Ledger,
        own_shard: ShardId,
        msg: NewProposal,
        from: WalletAddress,
        to: WalletAddress,
        amount: u64,
    ) -> Result<(), ProtocolError> {
        // The proposal belongs to the sender wallet's shard. A leader that received it on
        // behalf of another shard hands it over.
        let (source, resolvable) = {
            let topology = self.require_topology()?;
            (
                topology.shard_of_wallet(&from).unwrap_or(own_shard),
                topology.shard_of_wallet(&to).is_some(),
            )
        };
        if source != own_shard {
            let leader = self.shard_leader(&source)?;
            self.send(leader, ProgressMessage::NewProposal(msg));
            return Ok(());
        }
        if !resolvable {
            return Err(ProtocolError::UnresolvableRecipient(to));
        }

        let (total, outputs) = ledger.spendable_outputs(source, &from, amount);
        if total < amount {
            return Err(ProtocolError::InsufficientFunds {
                available: total,
                needed: amount,
            });
        }
        let transaction = Transaction::transfer(&from, &to, amount, total, outputs);
        let inputs: Vec<TxId> = transaction
            .vin
            .iter()
            .map(|input| input.txid.clone())
            .collect();

        let certificate =
            self.proposer
                .build(source, msg.command, Some(transaction))?;
        if let Err(conflict) = self
            .sequencer
            .try_reserve(&certificate.proposal.id, &inputs)
        {
            self.send(
                msg.origin,
                ProgressMessage::ConflictNotice(ConflictNotice {
                    proposal: certificate.proposal.id.clone(),
                }),
            );
            self.publish(Event::Conflict(ConflictEvent {
                timestamp: SystemTime::now(),
                proposal: certificate.proposal.id,
            }));
            return Err(conflict);
        }

        self.publish(Event::Propose(ProposeEvent {
            timestamp: SystemTime::now(),
            proposal: certificate.proposal.clone(),
        }));

        if self.sequencer.enqueue(certificate.clone(), from.clone(), to.clone()) {
            self.begin_round(certificate, &from, &to)?;
        }
        Ok(())
    }

    /// Start the round for the proposal at the head of the queue: open collectors and fan
    /// the certificate out along its route. Shards are re-resolved from the wallets here
    /// because the topology may have changed while the proposal waited.
    fn begin_round(
        &mut self,
        certificate: QuorumCertificate,
        from: &WalletAddress,
        to: &WalletAddress,
    ) -> Result<(), ProtocolError> {
        let (source, target, route) = {
            let topology = self.require_topology()?;
            let source = topology
                .shard_of_wallet(from)
                .unwrap_or(certificate.proposal.id.shard);
            let target = topology
                .shard_of_wallet(to)
                .ok_or_else(|| ProtocolError::UnresolvableRecipient(to.clone()))?;
            (source, target, Route::resolve(topology, source, target))
        };

        match route {
            Route::SameShard { shard } => {
                self.open_collector(&certificate, &route)?;
                let members = self.shard_members(&shard)?;
                for member in members {
                    if member != self.address {
                        self.send(
                            member,
                            ProgressMessage::Prepare(Prepare {
                                qc: certificate.clone(),
                                sender: self.address.clone(),
                                source,
                                target,
                            }),
                        );
                    }
                }
                // The leader's own vote goes through the network like everyone else's.
                self.send(
                    self.address.clone(),
                    ProgressMessage::Vote(VoteMessage {
                        vote: certificate.founding_vote.clone(),
                        proposal: certificate.proposal.clone(),
                        source,
                        target,
                    }),
                );
            }
            Route::Mediated { mediator, .. } => {
                let leader = self.shard_leader(&mediator)?;
                self.send(
                    leader,
                    ProgressMessage::CrossShardData(CrossShardData {
                        qc: certificate,
                        sender: self.address.clone(),
                        source,
                        target,
                        mediated: true,
                    }),
                );
            }
            Route::Unmediated { source, target } => {
                for shard in [source, target] {
                    let leader = self.shard_leader(&shard)?;
                    self.send(
                        leader,
                        ProgressMessage::CrossShardData(CrossShardData {
                            qc: certificate.clone(),
                            sender: self.address.clone(),
                            source,
                            target,
                            mediated: false,
                        }),
                    );
                }
            }
        }
        Ok(())
    }

    /// A follower co-signs a certificate and votes back to whoever fanned it out.
    fn on_prepare(&mut self, msg: Prepare) -> Result<(), ProtocolError> {
        self.publish(Event::ReceivePrepare(ReceivePrepareEvent {
            timestamp: SystemTime::now(),
            origin: msg.sender.clone(),
            proposal: msg.qc.proposal.id.clone(),
        }));
        if !msg.qc.is_correct() {
            return Err(ProtocolError::InvalidSignature(msg.sender));
        }

        let vote = Vote::agree(
            &self.me,
            self.address.clone(),
            &msg.qc.proposal.command,
            msg.qc.founding_vote.transaction.clone(),
        );
        let proposal = msg.qc.proposal;
        self.send(
            msg.sender.clone(),
            ProgressMessage::Vote(VoteMessage {
                vote,
                proposal: proposal.clone(),
                source: msg.source,
                target: msg.target,
            }),
        );
        self.publish(Event::VoteCast(VoteCastEvent {
            timestamp: SystemTime::now(),
            recipient: msg.sender,
            proposal: proposal.id,
        }));
        Ok(())
    }

    /// A collecting leader named by a cross-shard route receives the certificate, opens
    /// its collector, votes itself, and relays the certificate for co-signing.
    fn on_cross_shard_data(
        &mut self,
        ledger: &mut impl Ledger,
        msg: CrossShardData,
    ) -> Result<(), ProtocolError> {
        if !msg.qc.is_correct() {
            return Err(ProtocolError::InvalidSignature(msg.sender));
        }
        if self.sequencer.is_completed(&msg.qc.proposal.id) {
            return Ok(());
        }
        let (own_shard, route) = {
            let topology = self.require_topology()?;
            let own_shard = topology
                .shard_of_node(&self.address)
                .ok_or(ProtocolError::NotYetSharded)?;
            (own_shard, Route::resolve(topology, msg.source, msg.target))
        };
        self.open_collector(&msg.qc, &route)?;

        let own_vote = Vote::agree(
            &self.me,
            self.address.clone(),
            &msg.qc.proposal.command,
            msg.qc.founding_vote.transaction.clone(),
        );
        let own_vote_msg = VoteMessage {
            vote: own_vote,
            proposal: msg.qc.proposal.clone(),
            source: msg.source,
            target: msg.target,
        };

        if msg.mediated {
            // Mediator's leader: collect locally, fan out to own shard for co-signing.
            let members = self.shard_members(&own_shard)?;
            for member in members {
                if member != self.address {
                    self.send(
                        member,
                        ProgressMessage::Prepare(Prepare {
                            qc: msg.qc.clone(),
                            sender: self.address.clone(),
                            source: msg.source,
                            target: msg.target,
                        }),
                    );
                }
            }
            self.admit_vote(ledger, own_vote_msg)?;
        } else {
            // Endpoint leader: both endpoint leaders run a collector, so the vote also
            // goes to the opposite leader, and the certificate fans out to the followers
            // of both shards.
            let other = if own_shard == msg.source {
                msg.target
            } else {
                msg.source
            };
            let other_leader = self.shard_leader(&other)?;
            self.send(
                other_leader.clone(),
                ProgressMessage::Vote(own_vote_msg.clone()),
            );

            let mut recipients = Vec::new();
            for member in self.shard_members(&own_shard)? {
                if member != self.address {
                    recipients.push(member);
                }
            }
            for member in self.shard_members(&other)? {
                if member != other_leader {
                    recipients.push(member);
                }
            }
            for recipient in recipients {
                self.send(
                    recipient,
                    ProgressMessage::Prepare(Prepare {
                        qc: msg.qc.clone(),
                        sender: self.address.clone(),
                        source: msg.source,
                        target: msg.target,
                    }),
                );
            }
            self.admit_vote(ledger, own_vote_msg)?;
        }
        Ok(())
    }

    fn on_vote(
        &mut self,
        ledger: &mut impl Ledger,
        msg: VoteMessage,
    ) -> Result<(), ProtocolError> {
        self.publish(Event::ReceiveVote(ReceiveVoteEvent {
            timestamp: SystemTime::now(),
            origin: msg.vote.voter.clone(),
            proposal: msg.proposal.id.clone(),
        }));
        self.admit_vote(ledger, msg)
    }

    /// Verify and collect a vote, and run the commit pipeline if it completes a quorum.
    fn admit_vote(
        &mut self,
        ledger: &mut impl Ledger,
        msg: VoteMessage,
    ) -> Result<(), ProtocolError> {
        let topology = self.require_topology()?;
        let route = Route::resolve(topology, msg.source, msg.target);

        // Only the leaders the route names collect. Anyone else drops the vote.
        let collecting_shards: Vec<ShardId> = match route {
            Route::SameShard { shard } => vec![shard],
            Route::Mediated { mediator, .. } => vec![mediator],
            Route::Unmediated { source, target } => vec![source, target],
        };
        if !collecting_shards
            .iter()
            .any(|shard| topology.leads(&self.address, shard))
        {
            debug!(
                "dropping vote for {}: not a collecting leader",
                msg.proposal.id
            );
            return Ok(());
        }
        if self.sequencer.is_completed(&msg.proposal.id) {
            return Ok(());
        }

        let Ok(verifying_key) = VerifyingKey::from_bytes(&msg.vote.public_key.bytes()) else {
            return Err(ProtocolError::InvalidSignature(msg.vote.voter));
        };
        if !msg.is_correct(&verifying_key) {
            return Err(ProtocolError::InvalidSignature(msg.vote.voter));
        }

        let is_leader_vote = topology.is_leader(&msg.vote.voter);
        let policy = route
            .policy(topology)
            .ok_or(ProtocolError::UnknownShard(msg.source))?;
        let collector = self
            .collectors
            .entry(msg.proposal.id.clone())
            .or_insert_with(|| VoteCollector::new(msg.proposal.clone(), policy));

        if collector.collect(is_leader_vote, msg.vote) {
            let proposal = collector.proposal().clone();
            let transaction = collector.attached_transaction().cloned();
            self.publish(Event::CollectQuorum(CollectQuorumEvent {
                timestamp: SystemTime::now(),
                proposal: proposal.clone(),
            }));
            self.commit_quorum(ledger, route, &proposal.command, transaction)?;

            // The leader that queued the proposal keeps its decided collector until
            // block-sync retirement clears it. A mediator or opposite-endpoint leader
            // has no retirement, so it drops the collector now and remembers the
            // proposal as completed to keep straggler votes from reopening it.
            if self.sequencer.processing() != Some(&proposal.id) {
                self.sequencer.mark_completed(proposal.id.clone());
                self.collectors.remove(&proposal.id);
            }
        }
        Ok(())
    }

    /// Write the committed block(s) for a collected quorum and advertise the new chain
    /// tips for replication.
    fn commit_quorum(
        &mut self,
        ledger: &mut impl Ledger,
        route: Route,
        command: &Command,
        transaction: Option<Transaction>,
    ) -> Result<(), ProtocolError> {
        let Command::Transfer { from, to, amount } = command.clone() else {
            debug!("quorum collected for a non-transfer command, nothing to commit");
            return Ok(());
        };
        let Some(transaction) = transaction else {
            debug!("quorum collected but no vote carried the transaction");
            return Ok(());
        };

        match route {
            Route::SameShard { shard } => {
                let block = ledger.commit(
                    shard,
                    vec![Transaction::coinbase(&from), transaction],
                )?;
                self.publish_commit(shard, &block);
                self.advertise(shard, block.height, &self.members_except_self(&shard)?);
            }
            Route::Mediated { source, target, .. } => {
                // The mediator's leader writes both halves and serves both shards'
                // members, leaders included: nobody else holds these blocks yet.
                let debit = ledger.commit(
                    source,
                    vec![Transaction::coinbase(&from), transaction],
                )?;
                self.publish_commit(source, &debit);
                let credit =
                    ledger.commit(target, vec![Transaction::coinbase_with_amount(&to, amount)])?;
                self.publish_commit(target, &credit);

                let source_members = self.shard_members(&source)?;
                let target_members = self.shard_members(&target)?;
                self.advertise(source, debit.height, &source_members);
                self.advertise(target, credit.height, &target_members);
            }
            Route::Unmediated { source, target } => {
                let topology = self.require_topology()?;
                let leads_source = topology.leads(&self.address, &source);
                let leads_target = topology.leads(&self.address, &target);
                if leads_source {
                    let debit = ledger.commit(
                        source,
                        vec![Transaction::coinbase(&from), transaction.clone()],
                    )?;
                    self.publish_commit(source, &debit);
                    self.advertise(source, debit.height, &self.members_except_self(&source)?);
                }
                if leads_target {
                    let credit = ledger
                        .commit(target, vec![Transaction::coinbase_with_amount(&to, amount)])?;
                    self.publish_commit(target, &credit);
                    self.advertise(target, credit.height, &self.members_except_self(&target)?);
                }
            }
        }
        Ok(())
    }

    /// A follower finished replicating. Count it, and retire the in-flight proposal once
    /// every follower of the acknowledged shard has caught up.
    fn on_block_sync_ack(&mut self, msg: BlockSyncAck) -> Result<(), ProtocolError> {
        self.publish(Event::ReceiveBlockSyncAck(ReceiveBlockSyncAckEvent {
            timestamp: SystemTime::now(),
            follower: msg.follower,
            shard: msg.shard,
        }));
        let topology = self.require_topology()?;
        if !topology.leads(&self.address, &msg.shard) {
            return Ok(());
        }
        let required = self.shard_members(&msg.shard)?.len().saturating_sub(1);
        if !self.sequencer.record_ack(required) {
            return Ok(());
        }

        let Some(retired) = self.sequencer.processing().cloned() else {
            return Ok(());
        };
        self.collectors.remove(&retired);
        match self.sequencer.retire() {
            Some(Retirement::Next {
                certificate,
                from,
                to,
            }) => {
                self.publish(Event::AdvanceQueue(AdvanceQueueEvent {
                    timestamp: SystemTime::now(),
                    retired,
                    next: Some(certificate.proposal.id.clone()),
                }));
                self.begin_round(certificate, &from, &to)
            }
            Some(Retirement::Drained { batch_elapsed }) => {
                info!(
                    "proposal queue drained, batch took {} ms",
                    batch_elapsed.as_millis()
                );
                self.publish(Event::AdvanceQueue(AdvanceQueueEvent {
                    timestamp: SystemTime::now(),
                    retired,
                    next: None,
                }));
                self.publish(Event::QueueDrained(QueueDrainedEvent {
                    timestamp: SystemTime::now(),
                    batch_elapsed,
                }));
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Fan a balance query out to every shard leader and start aggregating replies.
    fn start_balance_aggregation(
        &mut self,
        ledger: &mut impl Ledger,
        wallet: WalletAddress,
    ) -> Result<(), ProtocolError> {
        let topology = self.require_topology()?;
        let expected = topology.shard_count();
        let shards: Vec<ShardId> = topology.shards().collect();
        self.pending_balances.insert(
            wallet.clone(),
            BalanceAggregation {
                expected,
                received: 0,
                total: 0,
            },
        );
        for shard in shards {
            let leader = self.shard_leader(&shard)?;
            if leader == self.address {
                let amount = ledger.balance(shard, &wallet);
                self.on_balance_report(BalanceReport {
                    wallet: wallet.clone(),
                    shard,
                    amount,
                });
            } else {
                self.send(
                    leader,
                    ProgressMessage::BalanceQuery(BalanceQuery {
                        wallet: wallet.clone(),
                        origin: self.address.clone(),
                    }),
                );
            }
        }
        Ok(())
    }

    fn on_balance_query(
        &mut self,
        ledger: &mut impl Ledger,
        msg: BalanceQuery,
    ) -> Result<(), ProtocolError> {
        let topology = self.require_topology()?;
        let own_shard = topology
            .shard_of_node(&self.address)
            .ok_or(ProtocolError::NotYetSharded)?;
        let amount = ledger.balance(own_shard, &msg.wallet);
        self.send(
            msg.origin,
            ProgressMessage::BalanceReport(BalanceReport {
                wallet: msg.wallet,
                shard: own_shard,
                amount,
            }),
        );
        Ok(())
    }

    fn on_balance_report(&mut self, msg: BalanceReport) {
        let Some(aggregation) = self.pending_balances.get_mut(&msg.wallet) else {
            debug!("unsolicited balance report for {}", msg.wallet);
            return;
        };
        aggregation.received += 1;
        aggregation.total += msg.amount;
        if aggregation.received >= aggregation.expected {
            let total = aggregation.total;
            self.pending_balances.remove(&msg.wallet);
            info!("total balance of {}: {}", msg.wallet, total);
            self.publish(Event::TotalBalance(TotalBalanceEvent {
                timestamp: SystemTime::now(),
                wallet: msg.wallet,
                amount: total,
            }));
        }
    }

    /// Leader-local reward minting: no quorum round, just a committed block on the own
    /// shard's chain.
    fn commit_reward(
        &mut self,
        ledger: &mut impl Ledger,
        own_shard: ShardId,
        to: &WalletAddress,
        amount: u64,
    ) -> Result<(), ProtocolError> {
        let block = ledger.commit(
            own_shard,
            vec![Transaction::coinbase_with_amount(to, amount)],
        )?;
        self.publish_commit(own_shard, &block);
        self.advertise(
            own_shard,
            block.height,
            &self.members_except_self(&own_shard)?,
        );
        Ok(())
    }

    fn open_collector(
        &mut self,
        certificate: &QuorumCertificate,
        route: &Route,
    ) -> Result<(), ProtocolError> {
        let topology = self.require_topology()?;
        let policy = route
            .policy(topology)
            .ok_or(ProtocolError::UnknownShard(route.source()))?;
        self.collectors
            .entry(certificate.proposal.id.clone())
            .or_insert_with(|| VoteCollector::new(certificate.proposal.clone(), policy));
        Ok(())
    }

    fn advertise(&mut self, shard: ShardId, height: BlockHeight, members: &[NodeAddress]) {
        for member in members {
            self.send(
                member.clone(),
                ReplicationMessage::Version {
                    shard,
                    best_height: height,
                    sender: self.address.clone(),
                },
            );
        }
    }

    fn publish_commit(&self, shard: ShardId, block: &Block) {
        self.publish(Event::CommitBlock(CommitBlockEvent {
            timestamp: SystemTime::now(),
            shard,
            block: block.hash,
            height: block.height,
        }));
    }

    fn require_topology(&self) -> Result<&ShardTopology, ProtocolError> {
        self.topology.as_ref().ok_or(ProtocolError::NotYetSharded)
    }

    fn shard_members(&self, shard: &ShardId) -> Result<Vec<NodeAddress>, ProtocolError> {
        Ok(self
            .require_topology()?
            .members(shard)
            .ok_or(ProtocolError::UnknownShard(*shard))?
            .clone())
    }

    fn members_except_self(&self, shard: &ShardId) -> Result<Vec<NodeAddress>, ProtocolError> {
        Ok(self
            .shard_members(shard)?
            .into_iter()
            .filter(|member| *member != self.address)
            .collect())
    }

    fn shard_leader(&self, shard: &ShardId) -> Result<NodeAddress, ProtocolError> {
        Ok(self
            .require_topology()?
            .leader(shard)
            .ok_or(ProtocolError::UnknownShard(*shard))?
            .clone())
    }

    /// Send through the network, dropping peers the provider reports unreachable from the
    /// local topology so they stop being counted as members.
    fn send<S: Into<Message>>(&mut self, peer: NodeAddress, msg: S) {
        if !self.sender.send(peer.clone(), msg) {
            if let Some(topology) = &mut self.topology {
                debug!("peer {} unreachable, removing from topology", peer);
                topology.remove_member(&peer);
            }
        }
    }

    fn publish(&self, event: Event) {
        Event::publish(&self.event_publisher, event);
    }
}
