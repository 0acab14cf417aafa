use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::codec::Message;

/// Unique across every registry in the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

impl HandlerId {
    fn next() -> Self {
        HandlerId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Add/remove observer list. Handlers run outside the lock, so a handler may
/// register or remove handlers (including itself) while being invoked.
pub(crate) struct HandlerRegistry<T> {
    handlers: Mutex<Vec<(HandlerId, Handler<T>)>>,
}

impl<T> HandlerRegistry<T> {
    pub fn new() -> Self {
        Self {
            handlers: Mutex::new(Vec::new()),
        }
    }

    pub fn add<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = HandlerId::next();
        self.handlers.lock().push((id, Arc::new(handler)));
        id
    }

    pub fn remove(&self, id: HandlerId) -> bool {
        let mut handlers = self.handlers.lock();
        let before = handlers.len();
        handlers.retain(|(h, _)| *h != id);
        handlers.len() != before
    }

    /// Returns false when nobody was listening.
    pub fn emit(&self, value: &T) -> bool {
        let snapshot: Vec<Handler<T>> = self
            .handlers
            .lock()
            .iter()
            .map(|(_, h)| Arc::clone(h))
            .collect();
        for handler in &snapshot {
            handler(value);
        }
        !snapshot.is_empty()
    }
}

impl<T> Default for HandlerRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Handlers bound to one exact address. A message goes to the first
/// registered handler whose path matches, and to no other.
#[derive(Default)]
pub(crate) struct PathHandlers {
    handlers: Mutex<Vec<(HandlerId, Arc<str>, Handler<Message>)>>,
}

impl PathHandlers {
    pub fn add<F>(&self, path: impl Into<Arc<str>>, handler: F) -> HandlerId
    where
        F: Fn(&Message) + Send + Sync + 'static,
    {
        let id = HandlerId::next();
        self.handlers.lock().push((id, path.into(), Arc::new(handler)));
        id
    }

    pub fn remove(&self, id: HandlerId) -> bool {
        let mut handlers = self.handlers.lock();
        let before = handlers.len();
        handlers.retain(|(h, _, _)| *h != id);
        handlers.len() != before
    }

    /// Returns false when no handler accepted the message.
    pub fn dispatch(&self, message: &Message) -> bool {
        let matched = self
            .handlers
            .lock()
            .iter()
            .find(|(_, path, _)| **path == *message.path)
            .map(|(_, _, h)| Arc::clone(h));
        match matched {
            Some(handler) => {
                handler(message);
                true
            }
            None => false,
        }
    }
}
