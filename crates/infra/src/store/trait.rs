use chrono::{DateTime, Utc};
use thiserror::Error;

use holdfast_core::{ProjectId, UnitId};
use holdfast_inventory::{Unit, UnitMutation};
use std::sync::Arc;

/// Inventory store operation error.
///
/// These are **infrastructure errors**. A version mismatch is not an error:
/// it is an ordinary [`UpdateOutcome`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unit {0} not found")]
    NotFound(UnitId),

    #[error("unit {0} already exists")]
    AlreadyExists(UnitId),

    /// The mutation would leave the record invalid; nothing was written.
    #[error("write rejected: {0}")]
    Rejected(String),

    /// Backend unreachable or internally broken (e.g. poisoned lock).
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Result of a conditional write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The expected version matched and the mutation is now durable.
    Committed { previous: Unit, current: Unit },
    /// Someone else committed first; nothing was written.
    VersionMismatch { current: Unit },
}

/// Read path over unit records.
///
/// Reads return copies; holding one never blocks writers.
pub trait InventoryRead: Send + Sync {
    fn get_unit(&self, id: UnitId) -> Result<Unit, StoreError>;

    /// All units, or those of one project, in no particular order.
    fn list_units(&self, project_id: Option<ProjectId>) -> Result<Vec<Unit>, StoreError>;

    /// Reserved units whose hold expiry is at or before `now`, earliest first,
    /// at most `limit` of them.
    fn expired_holds(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<Unit>, StoreError>;
}

/// Keyed, versioned storage of unit records.
///
/// ## Write Semantics
///
/// `conditional_update()`:
/// - Compares `expected_version` with the stored version (compare-and-swap)
/// - On match, applies the mutation to a copy, bumps the version, validates
///   the unit invariants and swaps the copy in (all or nothing)
/// - On mismatch, writes nothing and returns the current record
///
/// Implementations must never expose a partially applied mutation to readers.
pub trait InventoryStore: InventoryRead {
    /// Create a unit during inventory load. Units are never deleted.
    fn insert(&self, unit: Unit) -> Result<(), StoreError>;

    fn conditional_update(
        &self,
        id: UnitId,
        expected_version: u64,
        mutation: &UnitMutation,
    ) -> Result<UpdateOutcome, StoreError>;
}

impl<S> InventoryRead for Arc<S>
where
    S: InventoryRead + ?Sized,
{
    fn get_unit(&self, id: UnitId) -> Result<Unit, StoreError> {
        (**self).get_unit(id)
    }

    fn list_units(&self, project_id: Option<ProjectId>) -> Result<Vec<Unit>, StoreError> {
        (**self).list_units(project_id)
    }

    fn expired_holds(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<Unit>, StoreError> {
        (**self).expired_holds(now, limit)
    }
}

impl<S> InventoryStore for Arc<S>
where
    S: InventoryStore + ?Sized,
{
    fn insert(&self, unit: Unit) -> Result<(), StoreError> {
        (**self).insert(unit)
    }

    fn conditional_update(
        &self,
        id: UnitId,
        expected_version: u64,
        mutation: &UnitMutation,
    ) -> Result<UpdateOutcome, StoreError> {
        (**self).conditional_update(id, expected_version, mutation)
    }
}
