//! Event bus for broadcasting named events to subscribers.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

use crate::event::HostEvent;
use crate::subscriber::{FilterSubscriber, SubscriberId, SubscriberRegistry};

/// Default channel capacity for the event bus.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Event bus for broadcasting events to all subscribers.
///
/// Cloning an `EventBus` yields a handle onto the same channel and the same
/// synchronous handler registry, so the host can hand clones to every module.
///
/// **WARNING:** A synchronous handler that captures a clone of the bus it is
/// registered on forms an `Arc` cycle and is never freed until `off` is
/// called for it.
#[derive(Debug)]
pub struct EventBus {
    /// Sender for broadcasting events.
    sender: broadcast::Sender<Arc<HostEvent>>,
    /// Registry for synchronous handlers.
    registry: Arc<SubscriberRegistry>,
    /// Channel capacity.
    capacity: usize,
}

impl EventBus {
    /// Create a new event bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new event bus with specified capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            registry: Arc::new(SubscriberRegistry::new()),
            capacity,
        }
    }

    /// Register a synchronous handler for events named `event`.
    ///
    /// The handler runs inline inside [`emit`](Self::emit). Returns the id
    /// needed to remove it again with [`off`](Self::off).
    pub fn on<F>(&self, event: impl Into<String>, handler: F) -> SubscriberId
    where
        F: Fn(&HostEvent) + Send + Sync + 'static,
    {
        let event = event.into();
        let filter_name = event.clone();
        let subscriber = FilterSubscriber::new(format!("on:{event}"), handler)
            .with_filter(move |e| e.is(&filter_name));
        self.registry.register(Arc::new(subscriber))
    }

    /// Remove a handler registered with [`on`](Self::on).
    ///
    /// Returns `true` if the handler was registered.
    pub fn off(&self, id: SubscriberId) -> bool {
        self.registry.unregister(id)
    }

    /// Emit a named event with a JSON payload.
    ///
    /// Returns the number of async receivers that received the event.
    pub fn emit(&self, event: impl Into<String>, payload: serde_json::Value) -> usize {
        self.publish(HostEvent::new(event, payload))
    }

    /// Publish a fully-built event to all subscribers.
    ///
    /// Async receivers are fed first so they never wait on synchronous
    /// handlers. Returns the number of async receivers that received it.
    pub fn publish(&self, event: HostEvent) -> usize {
        let event = Arc::new(event);

        trace!(event_name = %event.name, "Publishing event");

        let count = if let Ok(c) = self.sender.send(Arc::clone(&event)) {
            debug!(event_name = %event.name, receiver_count = c, "Event published");
            c
        } else {
            trace!(event_name = %event.name, "No receivers for event");
            0
        };

        self.registry.notify(&event);

        count
    }

    /// Subscribe to every event.
    #[must_use]
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver::new(self.sender.subscribe(), None)
    }

    /// Subscribe to events whose name matches `pattern`.
    ///
    /// The pattern is an exact name (`app:before-quit`) or a prefix ending in
    /// `*` (`search:*`).
    #[must_use]
    pub fn subscribe_event(&self, pattern: impl Into<String>) -> EventReceiver {
        EventReceiver::new(self.sender.subscribe(), Some(pattern.into()))
    }

    /// Get the synchronous subscriber registry.
    #[must_use]
    pub fn registry(&self) -> &SubscriberRegistry {
        &self.registry
    }

    /// Get the current number of subscribers (async and synchronous).
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender
            .receiver_count()
            .saturating_add(self.registry.len())
    }

    /// Get the channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            registry: Arc::clone(&self.registry),
            capacity: self.capacity,
        }
    }
}

/// Receiver for events from the event bus.
pub struct EventReceiver {
    receiver: broadcast::Receiver<Arc<HostEvent>>,
    /// Optional name pattern. `None` yields every event.
    pattern: Option<String>,
}

impl EventReceiver {
    fn new(receiver: broadcast::Receiver<Arc<HostEvent>>, pattern: Option<String>) -> Self {
        Self { receiver, pattern }
    }

    fn matches(&self, event: &HostEvent) -> bool {
        let Some(pattern) = &self.pattern else {
            return true;
        };

        if let Some(prefix) = pattern.strip_suffix('*') {
            event.name.starts_with(prefix)
        } else {
            event.name == *pattern
        }
    }

    /// Receive the next matching event.
    ///
    /// Returns `None` once the channel is closed. Lagged events are logged
    /// and skipped.
    pub async fn recv(&mut self) -> Option<Arc<HostEvent>> {
        let mut skipped: usize = 0;
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.matches(&event) {
                        return Some(event);
                    }
                    skipped = skipped.wrapping_add(1);
                    if skipped.is_multiple_of(100) {
                        tokio::task::yield_now().await;
                    }
                },
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    warn!(skipped = count, "Event receiver lagged, events dropped");
                },
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Try to receive the next matching event without blocking.
    pub fn try_recv(&mut self) -> Option<Arc<HostEvent>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.matches(&event) {
                        return Some(event);
                    }
                },
                Err(broadcast::error::TryRecvError::Lagged(count)) => {
                    warn!(skipped = count, "Event receiver lagged, events dropped");
                },
                Err(
                    broadcast::error::TryRecvError::Empty | broadcast::error::TryRecvError::Closed,
                ) => return None,
            }
        }
    }
}
