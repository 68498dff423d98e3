//! Pending Responder Store - maps request ids to waiting answer futures.
//!
//! Flow:
//! 1. `post` calls `register()` to get a oneshot receiver
//! 2. `post` broadcasts the request envelope
//! 3. The listener sees an answer and calls `resolve()`
//! 4. The answer future receives the data, or times out and calls `remove()`

use crate::domain::MessageId;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::oneshot;
use tracing::debug;

/// Identifies one responder among those sharing a request id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ResponderToken(u64);

/// One outstanding answer future.
struct PendingResponder {
    token: ResponderToken,
    sender: oneshot::Sender<Value>,
    created_at: Instant,
}

pub(crate) struct PendingResponderStore {
    /// Request id to every responder waiting on it
    pending: DashMap<MessageId, Vec<PendingResponder>>,
    next_token: AtomicU64,
}

impl PendingResponderStore {
    pub fn new() -> Self {
        Self {
            pending: DashMap::new(),
            next_token: AtomicU64::new(0),
        }
    }

    /// Register a responder for `request_id` and get the receiving end.
    pub fn register(&self, request_id: &MessageId) -> (ResponderToken, oneshot::Receiver<Value>) {
        let token = ResponderToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = oneshot::channel();

        self.pending
            .entry(request_id.clone())
            .or_default()
            .push(PendingResponder {
                token,
                sender,
                created_at: Instant::now(),
            });

        (token, receiver)
    }

    /// Resolve every responder waiting on `request_id` with `data`.
    ///
    /// All matching responders are removed before any is resolved. Returns
    /// how many receivers actually got the data.
    pub fn resolve(&self, request_id: &MessageId, data: &Value) -> usize {
        let Some((_, responders)) = self.pending.remove(request_id) else {
            return 0;
        };

        let mut delivered = 0;
        for responder in responders {
            if responder.sender.send(data.clone()).is_ok() {
                delivered += 1;
            } else {
                // Receiver dropped between its last poll and now
                debug!(
                    request_id = %request_id,
                    waited_ms = responder.created_at.elapsed().as_millis(),
                    "Responder receiver dropped"
                );
            }
        }
        delivered
    }

    /// Remove a single responder. Others for the same id are untouched.
    pub fn remove(&self, request_id: &MessageId, token: ResponderToken) -> bool {
        let removed = match self.pending.get_mut(request_id) {
            Some(mut responders) => {
                let before = responders.len();
                responders.retain(|r| r.token != token);
                responders.len() != before
            }
            None => false,
        };
        self.pending.remove_if(request_id, |_, responders| responders.is_empty());
        removed
    }

    /// Drop every responder; their futures observe a closed channel.
    pub fn clear(&self) -> usize {
        let count = self.pending_count();
        self.pending.clear();
        count
    }

    /// Number of responders currently waiting.
    pub fn pending_count(&self) -> usize {
        self.pending.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn is_pending(&self, request_id: &MessageId) -> bool {
        self.pending.contains_key(request_id)
    }
}
