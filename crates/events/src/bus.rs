//! Event publishing/subscription abstraction (mechanics only).
//!
//! This module provides the **event bus pattern**: a pub/sub mechanism for
//! distributing committed unit changes to every interested consumer (client
//! reconcilers, countdown displays, the CLI event stream).
//!
//! ## Delivery contract
//!
//! - **At-least-once, best-effort**: consumers must tolerate duplicates
//! - **Per-unit ordering**: messages for the same unit arrive in the order they
//!   were published; nothing is promised across units
//! - **Bounded, lossy delivery**: a slow consumer loses its *oldest* pending
//!   messages instead of slowing the publisher or any other consumer
//!
//! The bus is for distribution, not storage: the inventory store remains the
//! source of truth and a consumer that lost messages re-reads current state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::broadcast;
use tracing::warn;

use crate::scope::{SubscriptionFilter, UnitScoped};

/// The bus was closed and every pending message has been consumed.
#[derive(Debug, Error, Copy, Clone, PartialEq, Eq)]
#[error("event bus disconnected")]
pub struct RecvError;

#[derive(Debug, Error, Copy, Clone, PartialEq, Eq)]
pub enum TryRecvError {
    #[error("no message pending")]
    Empty,
    #[error("event bus disconnected")]
    Disconnected,
}

/// A subscription to an event stream.
///
/// Backed by one receiver of the bus's broadcast channel. The channel is
/// bounded: a subscriber that falls behind skips the oldest messages it has
/// not read yet and counts them in [`Subscription::dropped`]. Filtering
/// happens on the receive side.
///
/// ## Usage Pattern
///
/// ```ignore
/// let subscription = bus.subscribe(SubscriptionFilter::Project(project_id));
///
/// while let Ok(event) = subscription.recv() {
///     render(event);
/// }
/// // bus closed
/// ```
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Mutex<broadcast::Receiver<M>>,
    filter: SubscriptionFilter,
    dropped: AtomicU64,
}

impl<M> Subscription<M> {
    pub(crate) fn new(receiver: broadcast::Receiver<M>, filter: SubscriptionFilter) -> Self {
        Self {
            receiver: Mutex::new(receiver),
            filter,
            dropped: AtomicU64::new(0),
        }
    }

    pub fn filter(&self) -> &SubscriptionFilter {
        &self.filter
    }

    /// Number of messages skipped because this subscriber fell behind.
    ///
    /// Counted before filtering, so it may include messages the filter would
    /// have discarded anyway.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn receiver(&self) -> MutexGuard<'_, broadcast::Receiver<M>> {
        self.receiver.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record_lag(&self, missed: u64) {
        self.dropped.fetch_add(missed, Ordering::Relaxed);
        warn!(missed, "slow subscriber: oldest pending events dropped");
    }
}

impl<M> Subscription<M>
where
    M: UnitScoped + Clone,
{
    /// Block until the next accepted message is available.
    ///
    /// Must not be called from inside an async runtime.
    pub fn recv(&self) -> Result<M, RecvError> {
        let mut receiver = self.receiver();
        loop {
            match receiver.blocking_recv() {
                Ok(message) if self.filter.accepts(&message) => return Ok(message),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(missed)) => self.record_lag(missed),
                Err(broadcast::error::RecvError::Closed) => return Err(RecvError),
            }
        }
    }

    /// Try to receive an accepted message without blocking.
    pub fn try_recv(&self) -> Result<M, TryRecvError> {
        let mut receiver = self.receiver();
        loop {
            match receiver.try_recv() {
                Ok(message) if self.filter.accepts(&message) => return Ok(message),
                Ok(_) => {}
                Err(broadcast::error::TryRecvError::Lagged(missed)) => self.record_lag(missed),
                Err(broadcast::error::TryRecvError::Empty) => return Err(TryRecvError::Empty),
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(TryRecvError::Disconnected);
                }
            }
        }
    }

    /// Drain every accepted message currently pending, without blocking.
    pub fn drain(&self) -> Vec<M> {
        std::iter::from_fn(|| self.try_recv().ok()).collect()
    }
}

/// Domain-agnostic event bus (pub/sub abstraction).
///
/// The bus sits after the store's conditional write:
///
/// ```text
/// Coordinator → Store (conditional write) → EventBus (publish) → Subscribers
///                                                                  ├─ Client reconcilers
///                                                                  ├─ Countdown displays
///                                                                  └─ Event stream (CLI)
/// ```
///
/// Messages are published only after the change they describe is committed,
/// so a lost message never describes a change that did not happen.
///
/// ## Thread Safety
///
/// The trait requires `Send + Sync`; multiple threads may publish concurrently.
/// Publishers that need per-key ordering must serialize their own publishes for
/// that key (the coordinator does so per unit).
pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self, filter: SubscriptionFilter) -> Subscription<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self, filter: SubscriptionFilter) -> Subscription<M> {
        (**self).subscribe(filter)
    }
}
