use serde::{Deserialize, Serialize};

use holdfast_core::{ActorId, UnitId};
use holdfast_inventory::ChangeCause;

use crate::view::UnitSnapshot;

/// Why the local view of a unit turned out to be wrong.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConflictKind {
    /// Another actor holds the unit now.
    HeldByOther { holder: ActorId },
    /// The viewer's own hold ran out and was reclaimed.
    OwnHoldExpired,
    /// Someone else ended the viewer's hold (override release, booking or
    /// cancellation).
    HoldRevoked {
        by: Option<ActorId>,
        cause: ChangeCause,
    },
    /// The viewer acted on stale state: it never held the unit, or the unit
    /// moved on before the request arrived.
    NeverHeld,
}

/// Where the conflict was noticed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalSource {
    /// A rejected request.
    Response,
    /// A change event, with no request involved.
    Event,
}

/// A conflict to surface to the user (banner, toast, row highlight).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictSignal {
    pub unit_id: UnitId,
    pub kind: ConflictKind,
    pub source: SignalSource,
    /// Authoritative state behind the signal, when known.
    pub observed: Option<UnitSnapshot>,
}

impl ConflictSignal {
    pub fn message(&self) -> String {
        match &self.kind {
            ConflictKind::HeldByOther { holder } => {
                format!("unit {} is now held by {}", self.unit_id, holder)
            }
            ConflictKind::OwnHoldExpired => {
                format!("your hold on unit {} expired", self.unit_id)
            }
            ConflictKind::HoldRevoked { by: Some(by), cause } => {
                format!("your hold on unit {} was ended by {} ({})", self.unit_id, by, cause)
            }
            ConflictKind::HoldRevoked { by: None, cause } => {
                format!("your hold on unit {} was ended ({})", self.unit_id, cause)
            }
            ConflictKind::NeverHeld => {
                format!("unit {} changed before your request arrived", self.unit_id)
            }
        }
    }
}
