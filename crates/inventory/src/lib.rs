//! Unit sale lifecycle (pure domain logic).
//!
//! This crate owns the unit record, the authoritative transition table and
//! the decision rules for every reservation operation. It performs no IO:
//! decisions produce [`UnitMutation`]s which the infrastructure commits with a
//! compare-and-swap on the unit version.

pub mod change;
pub mod mutation;
pub mod reservation;
pub mod status;
pub mod unit;

pub use change::{ChangeCause, UnitChangeEvent};
pub use mutation::UnitMutation;
pub use reservation::{Reservation, ReservationError, ReservationService};
pub use status::UnitStatus;
pub use unit::{Unit, UnitAttributes};
