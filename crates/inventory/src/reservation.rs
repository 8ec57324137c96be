//! Caller-facing reservation API: results, error taxonomy and the service
//! trait implemented by the coordinator.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use holdfast_auth::Actor;
use holdfast_core::{ActorId, DomainError, UnitId};

use crate::status::UnitStatus;
use crate::unit::Unit;

/// A confirmed hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub unit_id: UnitId,
    pub holder: ActorId,
    pub hold_expiry: DateTime<Utc>,
    /// Unit version that recorded this hold.
    pub version: u64,
}

impl Reservation {
    /// The hold recorded on `unit`, if any.
    pub fn from_unit(unit: &Unit) -> Option<Self> {
        match (unit.holder(), unit.hold_expiry()) {
            (Some(holder), Some(hold_expiry)) => Some(Self {
                unit_id: unit.id(),
                holder,
                hold_expiry,
                version: unit.version(),
            }),
            _ => None,
        }
    }

    /// Time left on the hold, clamped at zero.
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.hold_expiry - now).max(Duration::zero())
    }
}

/// Failure of a reservation operation.
///
/// Every variant that concerns an existing unit carries the authoritative
/// state observed when the operation was rejected, so callers can render a
/// specific message and refresh their view without another read.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReservationError {
    #[error("unit {0} not found")]
    NotFound(UnitId),

    /// The unit was not claimable (already held, moved on, or changed
    /// concurrently). Nothing was mutated; re-read and decide again.
    #[error("conflict on unit {}: {reason}", .current.id())]
    Conflict { reason: String, current: Box<Unit> },

    /// The caller does not satisfy the precondition (e.g. not the holder).
    #[error("precondition failed on unit {}: {reason}", .current.id())]
    PreconditionFailed { reason: String, current: Box<Unit> },

    /// The caller's hold ran out and was reclaimed.
    #[error("hold on unit {} expired: {reason}", .current.id())]
    Expired { reason: String, current: Box<Unit> },

    #[error("unit {unit_id} cannot move from '{from}' to '{to}'")]
    InvalidTransition {
        unit_id: UnitId,
        from: UnitStatus,
        to: UnitStatus,
    },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The store could not be reached; the outcome is unknown only if the
    /// store says so, otherwise nothing was written.
    #[error("inventory store unavailable: {0}")]
    Unavailable(String),
}

impl ReservationError {
    /// Attach the observed unit state to a domain rejection.
    ///
    /// `target` is the status the operation tried to reach, used for
    /// transition errors.
    pub fn from_domain(err: DomainError, current: &Unit, target: Option<UnitStatus>) -> Self {
        match err {
            DomainError::NotFound => Self::NotFound(current.id()),
            DomainError::Conflict(reason) => Self::Conflict {
                reason,
                current: Box::new(current.clone()),
            },
            DomainError::PreconditionFailed(reason) => Self::PreconditionFailed {
                reason,
                current: Box::new(current.clone()),
            },
            DomainError::Expired(reason) => Self::Expired {
                reason,
                current: Box::new(current.clone()),
            },
            DomainError::InvalidTransition { from, to } => Self::InvalidTransition {
                unit_id: current.id(),
                from: from.parse().unwrap_or(current.status()),
                to: target.or_else(|| to.parse().ok()).unwrap_or(current.status()),
            },
            DomainError::Unauthorized => {
                Self::Unauthorized("missing permission for this operation".to_string())
            }
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => Self::Validation(msg),
            DomainError::InvariantViolation(msg) => Self::Conflict {
                reason: msg,
                current: Box::new(current.clone()),
            },
        }
    }

    /// The concurrent writer won: the version read no longer matches.
    pub fn stale(current: Unit) -> Self {
        Self::Conflict {
            reason: format!("unit changed concurrently (now at version {})", current.version()),
            current: Box::new(current),
        }
    }

    /// Authoritative unit state observed with the rejection, if any.
    pub fn current(&self) -> Option<&Unit> {
        match self {
            Self::Conflict { current, .. }
            | Self::PreconditionFailed { current, .. }
            | Self::Expired { current, .. } => Some(current.as_ref()),
            _ => None,
        }
    }

    /// Stable machine-readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Conflict { .. } => "conflict",
            Self::PreconditionFailed { .. } => "precondition_failed",
            Self::Expired { .. } => "expired",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::Validation(_) => "validation",
            Self::Unauthorized(_) => "unauthorized",
            Self::Unavailable(_) => "unavailable",
        }
    }
}

/// The four caller operations plus administrative cancellation.
///
/// Every call returns promptly with a definitive outcome and is never retried
/// internally; retrying is the caller's decision after re-reading state.
pub trait ReservationService: Send + Sync {
    /// Claim an available unit for `holder` for `ttl`.
    fn reserve(
        &self,
        unit_id: UnitId,
        holder: &Actor,
        ttl: Duration,
    ) -> Result<Reservation, ReservationError>;

    /// Give a hold up. Non-holders need the release override.
    fn release(&self, unit_id: UnitId, actor: &Actor) -> Result<Unit, ReservationError>;

    /// Push the hold expiry out by `additional`.
    fn extend(
        &self,
        unit_id: UnitId,
        holder: &Actor,
        additional: Duration,
    ) -> Result<Reservation, ReservationError>;

    /// Move one step forward on the sale lifecycle (more with the skip override).
    fn advance(
        &self,
        unit_id: UnitId,
        target: UnitStatus,
        actor: &Actor,
    ) -> Result<Unit, ReservationError>;

    fn cancel(&self, unit_id: UnitId, actor: &Actor) -> Result<Unit, ReservationError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::UnitAttributes;
    use holdfast_core::ProjectId;

    #[test]
    fn from_domain_keeps_typed_transition() {
        let unit = Unit::new(UnitId::new(), ProjectId::new(), UnitAttributes::default());
        let err = ReservationError::from_domain(
            DomainError::invalid_transition(UnitStatus::Available, UnitStatus::SpaSigned),
            &unit,
            Some(UnitStatus::SpaSigned),
        );
        assert_eq!(
            err,
            ReservationError::InvalidTransition {
                unit_id: unit.id(),
                from: UnitStatus::Available,
                to: UnitStatus::SpaSigned,
            }
        );
        assert_eq!(err.kind(), "invalid_transition");
    }

    #[test]
    fn conflict_carries_current_state() {
        let unit = Unit::new(UnitId::new(), ProjectId::new(), UnitAttributes::default());
        let err = ReservationError::stale(unit.clone());
        assert_eq!(err.current(), Some(&unit));
        assert!(err.to_string().contains("changed concurrently"));
    }

    #[test]
    fn remaining_is_clamped() {
        let now = Utc::now();
        let reservation = Reservation {
            unit_id: UnitId::new(),
            holder: ActorId::new(),
            hold_expiry: now,
            version: 1,
        };
        assert_eq!(reservation.remaining(now + Duration::hours(1)), Duration::zero());
        assert_eq!(reservation.remaining(now - Duration::seconds(30)), Duration::seconds(30));
    }
}
