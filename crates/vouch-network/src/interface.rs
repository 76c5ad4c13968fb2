use std::collections::VecDeque;

use crate::message::Envelope;

/// FIFO delivery queue between agents.
///
/// Message handlers never call each other directly; they return the
/// envelopes they want sent and the network drains this queue until it is
/// empty. Keeping delivery in posting order makes every exchange replayable
/// and keeps deep request chains from recursing.
#[derive(Debug, Default)]
pub struct NetworkInterface {
    queue: VecDeque<Envelope>,
}

impl NetworkInterface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn post(&mut self, envelope: Envelope) {
        self.queue.push_back(envelope);
    }

    pub fn post_all(&mut self, envelopes: impl IntoIterator<Item = Envelope>) {
        for envelope in envelopes {
            self.post(envelope);
        }
    }

    pub fn take_next(&mut self) -> Option<Envelope> {
        self.queue.pop_front()
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn is_idle(&self) -> bool {
        self.queue.is_empty()
    }
}
