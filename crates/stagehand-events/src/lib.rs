//! Stagehand Events - Named-event bus for the Stagehand module host.
//!
//! This crate provides:
//! - [`HostEvent`], a named event carrying a JSON payload
//! - [`EventBus`], a broadcast bus with both async receivers and synchronous
//!   handlers registered through `on`/`off`
//!
//! # Architecture
//!
//! Events are emitted on an `EventBus` which delivers them two ways:
//!
//! 1. **Async receivers**: `bus.subscribe()` or `bus.subscribe_event(name)`
//!    return an `EventReceiver` that can be polled asynchronously.
//!
//! 2. **Synchronous handlers**: `bus.on(name, handler)` registers a callback
//!    invoked inline during `emit`. `bus.off(id)` removes it again.
//!
//! # Example
//!
//! ```rust
//! use stagehand_events::EventBus;
//!
//! # async fn example() {
//! let bus = EventBus::new();
//! let mut receiver = bus.subscribe_event("app:before-quit");
//!
//! bus.emit("app:before-quit", serde_json::json!({ "code": 0 }));
//!
//! let event = receiver.recv().await.unwrap();
//! assert_eq!(event.name, "app:before-quit");
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod bus;
mod event;
mod subscriber;

pub use bus::{DEFAULT_CHANNEL_CAPACITY, EventBus, EventReceiver};
pub use event::{EventMetadata, HostEvent};
pub use subscriber::{
    EventFilter, EventSubscriber, FilterSubscriber, SubscriberId, SubscriberRegistry,
};
