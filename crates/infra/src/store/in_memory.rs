use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use holdfast_core::{ProjectId, UnitId};
use holdfast_inventory::{Unit, UnitMutation};

use super::r#trait::{InventoryRead, InventoryStore, StoreError, UpdateOutcome};

#[derive(Debug, Default)]
struct State {
    units: HashMap<UnitId, Unit>,
    /// Active holds ordered by expiry, for the sweeper.
    expiry_index: BTreeSet<(DateTime<Utc>, UnitId)>,
}

/// In-memory inventory store.
///
/// Intended for tests/dev and single-process deployments. The conditional
/// write holds the write lock only for the compare, copy and swap.
#[derive(Debug, Default)]
pub struct InMemoryInventoryStore {
    state: RwLock<State>,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state.units.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}

fn poisoned() -> StoreError {
    StoreError::Unavailable("lock poisoned".to_string())
}

impl InventoryRead for InMemoryInventoryStore {
    fn get_unit(&self, id: UnitId) -> Result<Unit, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        state.units.get(&id).cloned().ok_or(StoreError::NotFound(id))
    }

    fn list_units(&self, project_id: Option<ProjectId>) -> Result<Vec<Unit>, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state
            .units
            .values()
            .filter(|u| project_id.is_none_or(|p| u.project_id() == p))
            .cloned()
            .collect())
    }

    fn expired_holds(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<Unit>, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state
            .expiry_index
            .iter()
            .take_while(|(expiry, _)| *expiry <= now)
            .filter_map(|(_, id)| state.units.get(id).cloned())
            .take(limit)
            .collect())
    }
}

impl InventoryStore for InMemoryInventoryStore {
    fn insert(&self, unit: Unit) -> Result<(), StoreError> {
        unit.check_invariants()
            .map_err(|e| StoreError::Rejected(e.to_string()))?;

        let mut state = self.state.write().map_err(|_| poisoned())?;
        let id = unit.id();
        if state.units.contains_key(&id) {
            return Err(StoreError::AlreadyExists(id));
        }
        if let Some(expiry) = unit.hold_expiry() {
            state.expiry_index.insert((expiry, id));
        }
        state.units.insert(id, unit);
        Ok(())
    }

    fn conditional_update(
        &self,
        id: UnitId,
        expected_version: u64,
        mutation: &UnitMutation,
    ) -> Result<UpdateOutcome, StoreError> {
        let mut guard = self.state.write().map_err(|_| poisoned())?;
        let State {
            units,
            expiry_index,
        } = &mut *guard;

        let slot = units.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if slot.version() != expected_version {
            return Ok(UpdateOutcome::VersionMismatch {
                current: slot.clone(),
            });
        }

        // Build the next record on the side; the stored one is replaced only
        // once it is known to be valid.
        let next = mutation
            .commit(slot)
            .map_err(|e| StoreError::Rejected(e.to_string()))?;

        if let Some(expiry) = slot.hold_expiry() {
            expiry_index.remove(&(expiry, id));
        }
        if let Some(expiry) = next.hold_expiry() {
            expiry_index.insert((expiry, id));
        }

        let previous = std::mem::replace(slot, next.clone());
        Ok(UpdateOutcome::Committed {
            previous,
            current: next,
        })
    }
}
