//! # Self-Echo Suppression
//!
//! The transport hands every frame back to its sender. Ids registered here
//! are swallowed exactly once when they come back, so an engine never
//! dispatches its own requests or answers.
//!
//! Entries are bounded by age, not by count: an id is kept for the echo
//! window and only garbage-collected once it is older than that. A burst of
//! outgoing frames, however large, is fully remembered until its echoes
//! arrive; a transport that never echoes cannot grow the set beyond one
//! window's worth of traffic.

use crate::domain::MessageId;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

pub(crate) struct EchoSuppressor {
    /// Ids awaiting their echo with their registration time, oldest first.
    pending: Mutex<VecDeque<(MessageId, Instant)>>,

    window: Duration,
}

impl EchoSuppressor {
    pub fn new(window: Duration) -> Self {
        Self {
            pending: Mutex::new(VecDeque::new()),
            window,
        }
    }

    /// Expect one echo of `id`. Returns how many expired ids were dropped.
    pub fn register(&self, id: MessageId) -> usize {
        let now = Instant::now();
        let mut pending = self.pending.lock();
        let expired = Self::collect_garbage(&mut pending, now, self.window);
        pending.push_back((id, now));
        expired
    }

    /// Consume one pending echo of `id`. True if it was expected.
    pub fn consume(&self, id: &MessageId) -> bool {
        let mut pending = self.pending.lock();
        match pending.iter().position(|(p, _)| p == id) {
            Some(index) => {
                pending.remove(index);
                true
            }
            None => false,
        }
    }

    /// Drop an expectation whose frame never made it onto the transport.
    pub fn forget(&self, id: &MessageId) {
        self.consume(id);
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    fn collect_garbage(
        pending: &mut VecDeque<(MessageId, Instant)>,
        now: Instant,
        window: Duration,
    ) -> usize {
        let before = pending.len();
        while pending
            .front()
            .is_some_and(|(_, registered)| now.duration_since(*registered) > window)
        {
            pending.pop_front();
        }
        before - pending.len()
    }
}
