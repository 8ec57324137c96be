//! Local, possibly optimistic, copies of unit state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use holdfast_core::{ActorId, ProjectId, UnitId};
use holdfast_inventory::{Reservation, Unit, UnitChangeEvent, UnitStatus};

/// The reservation-relevant part of a unit at one version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSnapshot {
    pub status: UnitStatus,
    pub holder: Option<ActorId>,
    pub hold_expiry: Option<DateTime<Utc>>,
    pub version: u64,
}

impl UnitSnapshot {
    pub fn from_unit(unit: &Unit) -> Self {
        Self {
            status: unit.status(),
            holder: unit.holder(),
            hold_expiry: unit.hold_expiry(),
            version: unit.version(),
        }
    }

    pub fn from_event(event: &UnitChangeEvent) -> Self {
        Self {
            status: event.new_status,
            holder: event.holder,
            hold_expiry: event.hold_expiry,
            version: event.version,
        }
    }

    pub fn from_reservation(reservation: &Reservation) -> Self {
        Self {
            status: UnitStatus::Reserved,
            holder: Some(reservation.holder),
            hold_expiry: Some(reservation.hold_expiry),
            version: reservation.version,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingKind {
    Claim,
    Release,
    Extend,
}

/// A request sent but not yet answered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAction {
    pub kind: PendingKind,
    /// Last confirmed state, restored if the request is rejected.
    pub rollback: UnitSnapshot,
    pub requested_at: DateTime<Utc>,
}

/// What a consumer currently shows for one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalUnitView {
    pub unit_id: UnitId,
    pub project_id: ProjectId,
    /// Shown state; optimistic while `pending` is set.
    pub state: UnitSnapshot,
    pub pending: Option<PendingAction>,
    /// Highest version a conflict signal was raised for.
    #[serde(default)]
    pub(crate) signaled_version: Option<u64>,
}

impl LocalUnitView {
    pub fn from_unit(unit: &Unit) -> Self {
        Self {
            unit_id: unit.id(),
            project_id: unit.project_id(),
            state: UnitSnapshot::from_unit(unit),
            pending: None,
            signaled_version: None,
        }
    }

    pub fn status(&self) -> UnitStatus {
        self.state.status
    }

    pub fn holder(&self) -> Option<ActorId> {
        self.state.holder
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Version of the last authoritative state seen, ignoring optimism.
    pub fn confirmed_version(&self) -> u64 {
        self.pending
            .as_ref()
            .map_or(self.state.version, |p| p.rollback.version)
    }

    /// Whole seconds left on the shown hold, for countdown displays.
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> Option<i64> {
        self.state
            .hold_expiry
            .map(|expiry| (expiry - now).num_seconds().max(0))
    }
}
