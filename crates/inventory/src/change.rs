use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use holdfast_core::{ActorId, ProjectId, UnitId};
use holdfast_events::UnitScoped;

use crate::status::UnitStatus;
use crate::unit::Unit;

/// Why a unit changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeCause {
    Reserved,
    /// The holder (or an override) gave the unit up.
    Released,
    /// The hold ran out and the sweeper reclaimed it.
    Expired,
    Extended,
    Advanced,
    Cancelled,
}

impl core::fmt::Display for ChangeCause {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            ChangeCause::Reserved => "reserved",
            ChangeCause::Released => "released",
            ChangeCause::Expired => "expired",
            ChangeCause::Extended => "extended",
            ChangeCause::Advanced => "advanced",
            ChangeCause::Cancelled => "cancelled",
        })
    }
}

/// A committed change to one unit, as published to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitChangeEvent {
    pub event_id: Uuid,
    pub unit_id: UnitId,
    pub project_id: ProjectId,
    pub prev_status: UnitStatus,
    pub new_status: UnitStatus,
    /// Holder after the change.
    pub holder: Option<ActorId>,
    /// Hold expiry after the change (drives countdown displays).
    pub hold_expiry: Option<DateTime<Utc>>,
    pub cause: ChangeCause,
    /// Actor that requested the change; `None` for sweeper expiries.
    pub actor: Option<ActorId>,
    /// Unit version after the change.
    pub version: u64,
    pub timestamp: DateTime<Utc>,
}

impl UnitChangeEvent {
    /// Describe the transition from `prev` to the committed `next`.
    pub fn from_commit(
        prev: &Unit,
        next: &Unit,
        cause: ChangeCause,
        actor: Option<ActorId>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            unit_id: next.id(),
            project_id: next.project_id(),
            prev_status: prev.status(),
            new_status: next.status(),
            holder: next.holder(),
            hold_expiry: next.hold_expiry(),
            cause,
            actor,
            version: next.version(),
            timestamp,
        }
    }
}

impl UnitScoped for UnitChangeEvent {
    fn unit_id(&self) -> UnitId {
        self.unit_id
    }

    fn project_id(&self) -> ProjectId {
        self.project_id
    }
}
