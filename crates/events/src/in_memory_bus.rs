//! In-process event bus.

use std::convert::Infallible;

use tokio::sync::broadcast;
use tracing::trace;

use crate::bus::{EventBus, Subscription};
use crate::scope::{SubscriptionFilter, UnitScoped};

/// Per-subscriber buffer used by [`InMemoryEventBus::new`].
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 1024;

/// Upper bound accepted by [`InMemoryEventBus::with_capacity`].
pub const MAX_SUBSCRIBER_CAPACITY: usize = 1 << 20;

/// In-memory pub/sub bus over a lossy broadcast channel.
///
/// - No IO, no runtime required
/// - Filtered on the receive side, one cursor per subscriber
/// - Publishing never waits for a consumer
///
/// Dropping the bus disconnects every subscription once its pending messages
/// have been read.
#[derive(Debug)]
pub struct InMemoryEventBus<M> {
    sender: broadcast::Sender<M>,
    capacity: usize,
}

impl<M: Clone> InMemoryEventBus<M> {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_SUBSCRIBER_CAPACITY)
    }

    /// Create a bus whose subscribers can lag at most `capacity` messages
    /// before the oldest are skipped.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, MAX_SUBSCRIBER_CAPACITY);
        let (sender, _) = broadcast::channel(capacity);
        Self { sender, capacity }
    }
}

impl<M> InMemoryEventBus<M> {
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl<M: Clone> Default for InMemoryEventBus<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> EventBus<M> for InMemoryEventBus<M>
where
    M: UnitScoped + Clone + Send + 'static,
{
    type Error = Infallible;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        let unit_id = message.unit_id();
        if self.sender.send(message).is_err() {
            trace!(unit_id = %unit_id, "no subscribers; event not delivered");
        }
        Ok(())
    }

    fn subscribe(&self, filter: SubscriptionFilter) -> Subscription<M> {
        Subscription::new(self.sender.subscribe(), filter)
    }
}
