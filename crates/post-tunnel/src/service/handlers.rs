//! Handler registry. Registration order is dispatch order.

use crate::domain::HandlerId;
use futures::future::BoxFuture;
use parking_lot::RwLock;
use std::sync::Arc;

/// A type-erased handler. `None` means "no answer".
pub(crate) type BoxedHandler<M, A> = Arc<dyn Fn(M) -> BoxFuture<'static, Option<A>> + Send + Sync>;

struct HandlerRegistration<M, A> {
    id: HandlerId,
    handler: BoxedHandler<M, A>,
}

pub(crate) struct HandlerRegistry<M, A> {
    handlers: RwLock<Vec<HandlerRegistration<M, A>>>,
}

impl<M, A> HandlerRegistry<M, A> {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
        }
    }

    pub fn register(&self, id: HandlerId, handler: BoxedHandler<M, A>) {
        self.handlers
            .write()
            .push(HandlerRegistration { id, handler });
    }

    /// Remove the first registration with `id`.
    pub fn remove(&self, id: &HandlerId) -> bool {
        let mut handlers = self.handlers.write();
        match handlers.iter().position(|h| &h.id == id) {
            Some(index) => {
                handlers.remove(index);
                true
            }
            None => false,
        }
    }

    /// Handlers registered right now, in order. Later changes to the
    /// registry do not affect the returned list.
    pub fn snapshot(&self) -> Vec<(HandlerId, BoxedHandler<M, A>)> {
        self.handlers
            .read()
            .iter()
            .map(|h| (h.id.clone(), Arc::clone(&h.handler)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    pub fn clear(&self) {
        self.handlers.write().clear();
    }
}
