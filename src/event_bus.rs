use std::sync::mpsc::{Receiver, TryRecvError};
use std::thread::{self, JoinHandle};

use crate::events::*;
use crate::logging::Logger;

pub(crate) type HandlerPtr<T> = Box<dyn Fn(&T) + Send>;

pub(crate) struct EventHandlers {
    pub(crate) propose_handlers: Vec<HandlerPtr<ProposeEvent>>,
    pub(crate) vote_cast_handlers: Vec<HandlerPtr<VoteCastEvent>>,
    pub(crate) receive_prepare_handlers: Vec<HandlerPtr<ReceivePrepareEvent>>,
    pub(crate) receive_vote_handlers: Vec<HandlerPtr<ReceiveVoteEvent>>,
    pub(crate) receive_block_sync_ack_handlers: Vec<HandlerPtr<ReceiveBlockSyncAckEvent>>,
    pub(crate) collect_quorum_handlers: Vec<HandlerPtr<CollectQuorumEvent>>,
    pub(crate) commit_block_handlers: Vec<HandlerPtr<CommitBlockEvent>>,
    pub(crate) conflict_handlers: Vec<HandlerPtr<ConflictEvent>>,
    pub(crate) advance_queue_handlers: Vec<HandlerPtr<AdvanceQueueEvent>>,
    pub(crate) queue_drained_handlers: Vec<HandlerPtr<QueueDrainedEvent>>,
    pub(crate) update_topology_handlers: Vec<HandlerPtr<UpdateTopologyEvent>>,
    pub(crate) total_balance_handlers: Vec<HandlerPtr<TotalBalanceEvent>>,
}

impl EventHandlers {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        log_events: bool,
        on_propose: Option<HandlerPtr<ProposeEvent>>,
        on_vote_cast: Option<HandlerPtr<VoteCastEvent>>,
        on_receive_prepare: Option<HandlerPtr<ReceivePrepareEvent>>,
        on_receive_vote: Option<HandlerPtr<ReceiveVoteEvent>>,
        on_receive_block_sync_ack: Option<HandlerPtr<ReceiveBlockSyncAckEvent>>,
        on_collect_quorum: Option<HandlerPtr<CollectQuorumEvent>>,
        on_commit_block: Option<HandlerPtr<CommitBlockEvent>>,
        on_conflict: Option<HandlerPtr<ConflictEvent>>,
        on_advance_queue: Option<HandlerPtr<AdvanceQueueEvent>>,
        on_queue_drained: Option<HandlerPtr<QueueDrainedEvent>>,
        on_update_topology: Option<HandlerPtr<UpdateTopologyEvent>>,
        on_total_balance: Option<HandlerPtr<TotalBalanceEvent>>,
    ) -> EventHandlers {
        fn handlers<T: Logger>(
            log_events: bool,
            user_handler: Option<HandlerPtr<T>>,
        ) -> Vec<HandlerPtr<T>> {
            let mut handlers = Vec::new();
            if log_events {
                handlers.push(T::get_logger());
            }
            if let Some(handler) = user_handler {
                handlers.push(handler);
            }
            handlers
        }

        EventHandlers {
            propose_handlers: handlers(log_events, on_propose),
            vote_cast_handlers: handlers(log_events, on_vote_cast),
            receive_prepare_handlers: handlers(log_events, on_receive_prepare),
            receive_vote_handlers: handlers(log_events, on_receive_vote),
            receive_block_sync_ack_handlers: handlers(log_events, on_receive_block_sync_ack),
            collect_quorum_handlers: handlers(log_events, on_collect_quorum),
            commit_block_handlers: handlers(log_events, on_commit_block),
            conflict_handlers: handlers(log_events, on_conflict),
            advance_queue_handlers: handlers(log_events, on_advance_queue),
            queue_drained_handlers: handlers(log_events, on_queue_drained),
            update_topology_handlers: handlers(log_events, on_update_topology),
            total_balance_handlers: handlers(log_events, on_total_balance),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.propose_handlers.is_empty()
            && self.vote_cast_handlers.is_empty()
            && self.receive_prepare_handlers.is_empty()
            && self.receive_vote_handlers.is_empty()
            && self.receive_block_sync_ack_handlers.is_empty()
            && self.collect_quorum_handlers.is_empty()
            && self.commit_block_handlers.is_empty()
            && self.conflict_handlers.is_empty()
            && self.advance_queue_handlers.is_empty()
            && self.queue_drained_handlers.is_empty()
            && self.update_topology_handlers.is_empty()
            && self.total_balance_handlers.is_empty()
    }

    pub(crate) fn fire_handlers(&self, event: Event) {
        match event {
            Event::Propose(event) => self.propose_handlers.iter().for_each(|handler| handler(&event)),

            Event::VoteCast(event) => self.vote_cast_handlers.iter().for_each(|handler| handler(&event)),

            Event::ReceivePrepare(event) => self
                .receive_prepare_handlers
                .iter()
                .for_each(|handler| handler(&event)),

            Event::ReceiveVote(event) => self
                .receive_vote_handlers
                .iter()
                .for_each(|handler| handler(&event)),

            Event::ReceiveBlockSyncAck(event) => self
                .receive_block_sync_ack_handlers
                .iter()
                .for_each(|handler| handler(&event)),

            Event::CollectQuorum(event) => self
                .collect_quorum_handlers
                .iter()
                .for_each(|handler| handler(&event)),

            Event::CommitBlock(event) => self
                .commit_block_handlers
                .iter()
                .for_each(|handler| handler(&event)),

            Event::Conflict(event) => self.conflict_handlers.iter().for_each(|handler| handler(&event)),

            Event::AdvanceQueue(event) => self
                .advance_queue_handlers
                .iter()
                .for_each(|handler| handler(&event)),

            Event::QueueDrained(event) => self
                .queue_drained_handlers
                .iter()
                .for_each(|handler| handler(&event)),

            Event::UpdateTopology(event) => self
                .update_topology_handlers
                .iter()
                .for_each(|handler| handler(&event)),

            Event::TotalBalance(event) => self
                .total_balance_handlers
                .iter()
                .for_each(|handler| handler(&event)),
        }
    }
}

pub(crate) fn start_event_bus(
    event_handlers: EventHandlers,
    event_subscriber: Receiver<Event>,
    shutdown_signal: Receiver<()>,
) -> JoinHandle<()> {
    thread::spawn(move || loop {
        match shutdown_signal.try_recv() {
            Ok(()) => return,
            Err(TryRecvError::Empty) => (),
            Err(TryRecvError::Disconnected) => {
                panic!("event_bus thread disconnected from main thread")
            }
        }

        if let Ok(event) = event_subscriber.try_recv() {
            event_handlers.fire_handlers(event)
        }
    })
}
