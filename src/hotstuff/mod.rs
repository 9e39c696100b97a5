//! Subprotocol for committing transfers under quorum certificates.
//!
//! ## One round, end to end
//!
//! A transfer round starts at the leader of the sender wallet's shard, which mints a
//! [`Proposal`](types::Proposal) for the command and seeds a
//! [`QuorumCertificate`](types::QuorumCertificate) with its own signed founding vote. The
//! certificate carries that single signature for its whole life: downstream nodes verify
//! the proposer's signature and then co-sign the command themselves, they never extend
//! the certificate.
//!
//! Where the certificate travels, and who counts the votes, depends on the
//! [`Route`](types::Route) between the sender's and recipient's shards:
//!
//! - **Same shard**: the shard leader fans [`Prepare`](messages::Prepare) out to its own
//!   members and collects. Quorum is a majority of the shard including the leader itself.
//! - **Mediated**: the relation table names a third shard. Its leader receives
//!   [`CrossShardData`](messages::CrossShardData), collects, and on quorum (majority of
//!   the mediating shard) commits both the debit and the credit block itself.
//! - **Unmediated**: both endpoint leaders receive `CrossShardData`, both collect, and
//!   each needs 80% of the combined memberships with both leaders among the voters. Each
//!   leader commits only its own half.
//!
//! Vote counting enforces two thresholds at once: a total agreement count and a count of
//! votes from shard leaders. Both must be hit exactly; see
//! [`VoteCollector`](types::VoteCollector) for the stall this implies when the totals
//! step past the thresholds.
//!
//! ## Sequencing
//!
//! Each collecting leader runs at most one proposal at a time. Admitted proposals wait in
//! the [`CommitSequencer`](sequencer::CommitSequencer)'s FIFO with their transaction
//! inputs locked, so a queued proposal cannot double-spend an output a predecessor is
//! about to consume. The in-flight proposal retires only when the shard's followers have
//! replicated the committed block and acknowledged it.

pub mod messages;

pub mod types;

pub(crate) mod proposer;

pub(crate) mod sequencer;

pub(crate) mod protocol;
