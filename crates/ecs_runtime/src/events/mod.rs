//! Event system
//!
//! Synchronous publish/subscribe with a deferred queue. Listeners are invoked
//! with the owning context so they can react by changing the world:
//!
//! - **Immediate**: [`EventBus::emit`] dispatches before returning
//! - **Deferred**: [`EventBus::queue`] + [`EventBus::flush`] deliver in FIFO order
//! - **Wildcard**: `on_any` listeners observe every event, ahead of typed ones

pub mod bus;
pub mod world_event;

pub use bus::{BusEvent, Callback, EventBus, EventBusStats, EventContext, EventRecord, ListenerId};
pub use world_event::{CustomEvent, EventKind, WorldEvent};
