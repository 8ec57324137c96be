//! `holdfast-client` — consumer-side view of unit reservations.
//!
//! Applies optimistic state for the consumer's own requests, reconciles it
//! with authoritative outcomes and change events, and raises conflict
//! signals for the UI.

pub mod reconciler;
pub mod signal;
pub mod view;

pub use reconciler::{ClientError, Reconciler};
pub use signal::{ConflictKind, ConflictSignal, SignalSource};
pub use view::{LocalUnitView, PendingAction, PendingKind, UnitSnapshot};
