//! Typed publish/subscribe between the session engine and presentation
//!
//! Subscribers get a [`SubscriptionId`] back and unsubscribe with it. Handlers
//! run synchronously on the publishing task, in the order they subscribed.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::protocol::Utterance;
use crate::transport::ConnectionState;

/// Named topic a handler listens on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// A user or character utterance should be shown
    MessageAdded,
    /// The session connection state changed
    ConnectionStatusChanged,
    /// Human-readable connection progress text
    ConnectingProgress,
    /// Speech output switched on or off
    SoundToggle,
    /// The user asked to open the session
    CallRequested,
    /// The user asked to close the session
    CallEnded,
}

/// Payload published on the bus
#[derive(Debug, Clone, PartialEq)]
pub enum BusEvent {
    MessageAdded(Utterance),
    ConnectionStatusChanged(ConnectionState),
    ConnectingProgress(String),
    SoundToggle(bool),
    CallRequested,
    CallEnded,
}

impl BusEvent {
    /// Topic this event is delivered on
    #[must_use]
    pub const fn topic(&self) -> Topic {
        match self {
            Self::MessageAdded(_) => Topic::MessageAdded,
            Self::ConnectionStatusChanged(_) => Topic::ConnectionStatusChanged,
            Self::ConnectingProgress(_) => Topic::ConnectingProgress,
            Self::SoundToggle(_) => Topic::SoundToggle,
            Self::CallRequested => Topic::CallRequested,
            Self::CallEnded => Topic::CallEnded,
        }
    }
}

/// Event handler
pub type Handler = Arc<dyn Fn(&BusEvent) + Send + Sync>;

/// Handle returned by [`EventBus::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    topic: Topic,
    handler: Handler,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    subscriptions: Vec<Subscription>,
}

/// Publish/subscribe registry
#[derive(Default)]
pub struct EventBus {
    registry: Mutex<Registry>,
}

impl EventBus {
    /// Create an empty bus
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `handler` on `topic`
    ///
    /// Subscribing the same handler to the same topic again returns the
    /// existing subscription.
    pub fn subscribe(&self, topic: Topic, handler: Handler) -> SubscriptionId {
        let mut registry = self.registry();

        if let Some(existing) = registry
            .subscriptions
            .iter()
            .find(|s| s.topic == topic && Arc::ptr_eq(&s.handler, &handler))
        {
            return existing.id;
        }

        registry.next_id += 1;
        let id = SubscriptionId(registry.next_id);
        registry.subscriptions.push(Subscription { id, topic, handler });
        tracing::trace!(?topic, ?id, "subscribed");
        id
    }

    /// Remove a subscription; unknown or already removed ids are ignored
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.registry().subscriptions.retain(|s| s.id != id);
    }

    /// Deliver `event` to every subscriber of its topic
    pub fn publish(&self, event: &BusEvent) {
        let topic = event.topic();
        let handlers: Vec<Handler> = self
            .registry()
            .subscriptions
            .iter()
            .filter(|s| s.topic == topic)
            .map(|s| Arc::clone(&s.handler))
            .collect();

        tracing::trace!(?topic, subscribers = handlers.len(), "publishing");
        for handler in handlers {
            handler(event);
        }
    }

    /// Number of live subscriptions on `topic`
    #[must_use]
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.registry()
            .subscriptions
            .iter()
            .filter(|s| s.topic == topic)
            .count()
    }
}
