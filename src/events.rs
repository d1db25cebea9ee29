//! Typed publish/subscribe bus for terminal events.
//!
//! Handlers are invoked synchronously, in registration order, on the task
//! that publishes. The registry lock is released before handlers run, so a
//! handler may subscribe, unsubscribe or publish again.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::types::BackendError;

/// Event topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    ConnectionLost,
    ConnectionTokenCreationError,
}

impl Topic {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConnectionLost => "CONNECTION_LOST",
            Self::ConnectionTokenCreationError => "CONNECTION_TOKEN_CREATION_ERROR",
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event together with its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The reader dropped without the caller asking for it.
    ConnectionLost,
    /// The backend refused to mint a connection token.
    ConnectionTokenCreationError(BackendError),
}

impl Event {
    #[must_use]
    pub fn topic(&self) -> Topic {
        match self {
            Self::ConnectionLost => Topic::ConnectionLost,
            Self::ConnectionTokenCreationError(_) => Topic::ConnectionTokenCreationError,
        }
    }
}

/// Handle returned by [`EventBus::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    handlers: HashMap<Topic, Vec<(SubscriptionId, Handler)>>,
}

/// Cloneable event bus; clones share the same registry.
#[derive(Clone, Default)]
pub struct EventBus {
    registry: Arc<Mutex<Registry>>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `topic`. Handlers run after every handler
    /// registered before them.
    pub fn subscribe<F>(&self, topic: Topic, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let mut registry = self.lock();
        let id = SubscriptionId(registry.next_id);
        registry.next_id += 1;
        registry
            .handlers
            .entry(topic)
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Remove a subscription. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut registry = self.lock();
        for handlers in registry.handlers.values_mut() {
            if let Some(pos) = handlers.iter().position(|(sid, _)| *sid == id) {
                handlers.remove(pos);
                return true;
            }
        }
        false
    }

    /// Deliver `event` to every subscriber of its topic. Returns the number
    /// of handlers invoked.
    pub fn publish(&self, event: Event) -> usize {
        let topic = event.topic();
        let handlers: Vec<Handler> = self
            .lock()
            .handlers
            .get(&topic)
            .map(|hs| hs.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default();

        tracing::debug!(topic = %topic, subscribers = handlers.len(), "Publishing event");
        for handler in &handlers {
            handler(&event);
        }
        handlers.len()
    }

    #[must_use]
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.lock().handlers.get(&topic).map_or(0, Vec::len)
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.lock();
        let mut map = f.debug_map();
        for (topic, handlers) in &registry.handlers {
            map.entry(&topic.as_str(), &handlers.len());
        }
        map.finish()
    }
}
