use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use holdfast_core::{ProjectId, UnitId};
use holdfast_inventory::{Unit, UnitStatus};

use super::r#trait::{InventoryRead, StoreError};

/// Read-only handle on the inventory.
///
/// This is what offer generation, analytics and other downstream consumers
/// receive. It wraps the store as `dyn InventoryRead`, so no mutation method is
/// reachable through it.
#[derive(Clone)]
pub struct InventoryReader {
    inner: Arc<dyn InventoryRead>,
}

impl InventoryReader {
    pub fn new<R>(inner: R) -> Self
    where
        R: InventoryRead + 'static,
    {
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn get(&self, id: UnitId) -> Result<Unit, StoreError> {
        self.inner.get_unit(id)
    }

    pub fn list(&self, project_id: Option<ProjectId>) -> Result<Vec<Unit>, StoreError> {
        self.inner.list_units(project_id)
    }

    /// Units of a project currently open for reservation.
    pub fn available_in(&self, project_id: ProjectId) -> Result<Vec<Unit>, StoreError> {
        let mut units: Vec<Unit> = self
            .inner
            .list_units(Some(project_id))?
            .into_iter()
            .filter(|u| u.status() == UnitStatus::Available)
            .collect();
        units.sort_by(|a, b| a.attributes().code.cmp(&b.attributes().code));
        Ok(units)
    }

    /// Time left on a unit's hold, if it is held.
    pub fn hold_remaining(&self, id: UnitId, now: DateTime<Utc>) -> Result<Option<Duration>, StoreError> {
        let unit = self.inner.get_unit(id)?;
        Ok(unit
            .hold_expiry()
            .map(|expiry| (expiry - now).max(Duration::zero())))
    }
}

impl core::fmt::Debug for InventoryReader {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("InventoryReader").finish_non_exhaustive()
    }
}
