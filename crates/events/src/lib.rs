//! Change events and their fan-out transport.
//!
//! The transport is generic over the message type; reservation-specific
//! events live with the domain that emits them.

pub mod bus;
pub mod in_memory_bus;
pub mod scope;

pub use bus::{EventBus, RecvError, Subscription, TryRecvError};
pub use in_memory_bus::{InMemoryEventBus, DEFAULT_SUBSCRIBER_CAPACITY, MAX_SUBSCRIBER_CAPACITY};
pub use scope::{SubscriptionFilter, UnitScoped};
