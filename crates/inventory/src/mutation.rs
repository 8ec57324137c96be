use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use holdfast_core::{ActorId, DomainResult};

use crate::change::ChangeCause;
use crate::status::UnitStatus;
use crate::unit::Unit;

/// A decided change to one unit, committed by the store against the version
/// it was decided on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnitMutation {
    Reserve {
        holder: ActorId,
        hold_expiry: DateTime<Utc>,
    },
    Release {
        /// Released by someone other than the holder.
        overridden: bool,
    },
    Expire,
    Extend {
        hold_expiry: DateTime<Utc>,
    },
    Advance {
        to: UnitStatus,
        /// Intermediate statuses were skipped under override.
        skipped: bool,
    },
    Cancel,
}

impl UnitMutation {
    pub fn cause(&self) -> ChangeCause {
        match self {
            UnitMutation::Reserve { .. } => ChangeCause::Reserved,
            UnitMutation::Release { .. } => ChangeCause::Released,
            UnitMutation::Expire => ChangeCause::Expired,
            UnitMutation::Extend { .. } => ChangeCause::Extended,
            UnitMutation::Advance { .. } => ChangeCause::Advanced,
            UnitMutation::Cancel => ChangeCause::Cancelled,
        }
    }

    /// Apply to a copy of `current`, bump the version and validate the result.
    ///
    /// `current` is never modified, so a rejected commit leaves nothing
    /// half-applied.
    pub fn commit(&self, current: &Unit) -> DomainResult<Unit> {
        let mut next = current.clone();
        next.apply(self);
        next.check_invariants()?;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::UnitAttributes;
    use holdfast_core::{ProjectId, UnitId};

    #[test]
    fn commit_leaves_input_untouched() {
        let unit = Unit::new(UnitId::new(), ProjectId::new(), UnitAttributes::default());
        let mutation = UnitMutation::Reserve {
            holder: ActorId::new(),
            hold_expiry: Utc::now(),
        };

        let next = mutation.commit(&unit).unwrap();
        assert_eq!(unit.version(), 0);
        assert_eq!(unit.status(), UnitStatus::Available);
        assert_eq!(next.version(), 1);
    }

    #[test]
    fn commit_rejects_mutation_that_breaks_invariants() {
        // Extending a hold on an available unit would set an expiry without a holder.
        let unit = Unit::new(UnitId::new(), ProjectId::new(), UnitAttributes::default());
        let mutation = UnitMutation::Extend {
            hold_expiry: Utc::now(),
        };
        assert!(mutation.commit(&unit).is_err());
    }

    #[test]
    fn causes_distinguish_release_from_expiry() {
        assert_eq!(
            UnitMutation::Release { overridden: false }.cause(),
            ChangeCause::Released
        );
        assert_eq!(UnitMutation::Expire.cause(), ChangeCause::Expired);
    }
}
