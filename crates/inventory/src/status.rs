//! Sale status and the authoritative transition table.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use holdfast_core::DomainError;

/// Sale status of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    Available,
    Reserved,
    Booked,
    SpaPending,
    SpaSigned,
    SpaExecuted,
    Registered,
    HandedOver,
    Cancelled,
}

use UnitStatus::*;

static FORWARD: [UnitStatus; 8] = UnitStatus::LIFECYCLE;

impl UnitStatus {
    pub const ALL: [UnitStatus; 9] = [
        Available,
        Reserved,
        Booked,
        SpaPending,
        SpaSigned,
        SpaExecuted,
        Registered,
        HandedOver,
        Cancelled,
    ];

    /// The forward sale lifecycle, in order. `Cancelled` is off-path.
    pub const LIFECYCLE: [UnitStatus; 8] = [
        Available,
        Reserved,
        Booked,
        SpaPending,
        SpaSigned,
        SpaExecuted,
        Registered,
        HandedOver,
    ];

    /// Legal next statuses. This table is total and closed: anything not
    /// listed here is rejected.
    pub fn successors(self) -> &'static [UnitStatus] {
        match self {
            Available => &[Reserved, Cancelled],
            Reserved => &[Available, Booked, Cancelled],
            Booked => &[SpaPending, Cancelled],
            SpaPending => &[SpaSigned, Cancelled],
            SpaSigned => &[SpaExecuted, Cancelled],
            SpaExecuted => &[Registered, Cancelled],
            Registered => &[HandedOver, Cancelled],
            HandedOver => &[],
            Cancelled => &[],
        }
    }

    pub fn can_transition_to(self, next: UnitStatus) -> bool {
        self.successors().contains(&next)
    }

    pub fn is_terminal(self) -> bool {
        self.successors().is_empty()
    }

    /// Position along [`UnitStatus::LIFECYCLE`], `None` for `Cancelled`.
    pub fn lifecycle_rank(self) -> Option<usize> {
        Self::LIFECYCLE.iter().position(|s| *s == self)
    }

    /// Whether `target` lies strictly ahead of `self` on the forward lifecycle.
    pub fn precedes(self, target: UnitStatus) -> bool {
        match (self.lifecycle_rank(), target.lifecycle_rank()) {
            (Some(from), Some(to)) => to > from,
            _ => false,
        }
    }

    /// Statuses that sit strictly between `self` and `target` on the lifecycle.
    pub fn skipped_to(self, target: UnitStatus) -> &'static [UnitStatus] {
        match (self.lifecycle_rank(), target.lifecycle_rank()) {
            (Some(from), Some(to)) if to > from + 1 => &FORWARD[from + 1..to],
            _ => &[],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Available => "available",
            Reserved => "reserved",
            Booked => "booked",
            SpaPending => "spa_pending",
            SpaSigned => "spa_signed",
            SpaExecuted => "spa_executed",
            Registered => "registered",
            HandedOver => "handed_over",
            Cancelled => "cancelled",
        }
    }
}

impl core::fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnitStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown unit status '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn every_non_terminal_status_can_be_cancelled() {
        for status in UnitStatus::ALL {
            assert_eq!(
                status.can_transition_to(Cancelled),
                !matches!(status, HandedOver | Cancelled),
                "{status}"
            );
        }
    }

    #[test]
    fn only_reserved_may_return_to_available() {
        let back_to_available: Vec<_> = UnitStatus::ALL
            .into_iter()
            .filter(|s| s.can_transition_to(Available))
            .collect();
        assert_eq!(back_to_available, vec![Reserved]);
    }

    #[test]
    fn available_cannot_jump_to_spa_signed() {
        assert!(!Available.can_transition_to(SpaSigned));
        assert_eq!(Available.skipped_to(SpaSigned), &[Reserved, Booked, SpaPending]);
    }

    #[test]
    fn status_names_round_trip_through_display() {
        for status in UnitStatus::ALL {
            assert_eq!(status.to_string().parse::<UnitStatus>().unwrap(), status);
        }
        assert!("sold".parse::<UnitStatus>().is_err());
    }

    #[test]
    fn serde_uses_snake_case() {
        assert_eq!(serde_json::to_string(&SpaPending).unwrap(), "\"spa_pending\"");
    }

    fn any_status() -> impl Strategy<Value = UnitStatus> {
        prop::sample::select(UnitStatus::ALL.to_vec())
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: apart from the release/expiry edge and cancellation,
        /// every legal edge moves exactly one step forward on the lifecycle.
        #[test]
        fn legal_edges_are_single_forward_steps(from in any_status(), to in any_status()) {
            if from.can_transition_to(to) {
                let is_release = from == Reserved && to == Available;
                if !is_release && to != Cancelled {
                    let (a, b) = (from.lifecycle_rank().unwrap(), to.lifecycle_rank().unwrap());
                    prop_assert_eq!(b, a + 1);
                }
            }
        }

        /// Property: terminal statuses have no way out.
        #[test]
        fn terminal_statuses_are_closed(from in any_status(), to in any_status()) {
            if from.is_terminal() {
                prop_assert!(!from.can_transition_to(to));
            }
        }
    }
}
