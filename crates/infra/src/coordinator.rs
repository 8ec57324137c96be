//! Reservation coordinator: the only write path to unit records.
//!
//! Every operation runs the same pipeline:
//!
//! ```text
//! read unit (no lock held)
//!   ↓
//! decide (pure, against the version just read)
//!   ↓
//! take the unit's commit stripe
//!   ↓
//! conditional_update(expected_version)  ── mismatch ──→ Conflict (nothing written)
//!   ↓
//! publish UnitChangeEvent (non-blocking)
//!   ↓
//! release the stripe
//! ```
//!
//! The store's compare-and-swap decides every race, so two callers can never
//! both succeed against the same version. The stripe only spans the commit and
//! the publish; it keeps each unit's events in commit order on the bus and is
//! never held while deciding or while a subscriber consumes.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use holdfast_auth::Actor;
use holdfast_core::{ActorId, Clock, DomainError, DomainResult, ProjectId, UnitId};
use holdfast_events::{EventBus, Subscription, SubscriptionFilter};
use holdfast_inventory::{
    Reservation, ReservationError, ReservationService, Unit, UnitChangeEvent, UnitMutation,
    UnitStatus,
};

use crate::config::EngineConfig;
use crate::store::{InventoryRead, InventoryReader, InventoryStore, StoreError, UpdateOutcome};

impl From<StoreError> for ReservationError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(id) => ReservationError::NotFound(id),
            StoreError::AlreadyExists(id) => {
                ReservationError::Validation(format!("unit {id} already exists"))
            }
            StoreError::Rejected(msg) => ReservationError::Validation(msg),
            StoreError::Unavailable(msg) => ReservationError::Unavailable(msg),
        }
    }
}

/// Fixed set of mutexes, one picked per unit by hashing its id.
#[derive(Debug)]
struct CommitStripes {
    stripes: Vec<Mutex<()>>,
}

impl CommitStripes {
    fn new(count: usize) -> Self {
        Self {
            stripes: (0..count.max(1)).map(|_| Mutex::new(())).collect(),
        }
    }

    fn lock(&self, unit_id: UnitId) -> MutexGuard<'_, ()> {
        let mut hasher = DefaultHasher::new();
        unit_id.hash(&mut hasher);
        let index = (hasher.finish() % self.stripes.len() as u64) as usize;
        // The guarded value is `()`, so a poisoned stripe carries no broken state.
        self.stripes[index]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// A mutation that made it into the store.
#[derive(Debug, Clone)]
struct Committed {
    previous: Unit,
    current: Unit,
    mutation: UnitMutation,
}

/// Serializes competing operations on each unit and publishes every
/// committed change.
///
/// Generic over the store, the bus and the clock so tests can run with the
/// in-memory implementations and a manual clock.
///
/// The coordinator owns its store handle and never lends it out; callers get
/// an [`InventoryReader`] at most, so every write goes through the commit
/// path:
///
/// ```compile_fail
/// use std::sync::Arc;
/// use holdfast_core::SystemClock;
/// use holdfast_events::InMemoryEventBus;
/// use holdfast_infra::{InMemoryInventoryStore, ReservationCoordinator};
/// use holdfast_inventory::UnitChangeEvent;
///
/// let coordinator = ReservationCoordinator::new(
///     Arc::new(InMemoryInventoryStore::new()),
///     Arc::new(InMemoryEventBus::<UnitChangeEvent>::new()),
///     SystemClock,
/// );
/// let _writer = coordinator.store();
/// ```
#[derive(Debug)]
pub struct ReservationCoordinator<S, B, C> {
    store: S,
    bus: B,
    clock: C,
    stripes: CommitStripes,
    default_ttl: Duration,
    max_ttl: Duration,
}

impl<S, B, C> ReservationCoordinator<S, B, C> {
    pub fn new(store: S, bus: B, clock: C) -> Self {
        Self::with_config(store, bus, clock, &EngineConfig::default())
    }

    pub fn with_config(store: S, bus: B, clock: C, config: &EngineConfig) -> Self {
        Self {
            store,
            bus,
            clock,
            stripes: CommitStripes::new(config.commit_stripes),
            default_ttl: config.default_ttl,
            max_ttl: config.max_ttl,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn max_ttl(&self) -> Duration {
        self.max_ttl
    }

    #[cfg(test)]
    pub(crate) fn store(&self) -> &S {
        &self.store
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }
}

impl<S, B, C> ReservationCoordinator<S, B, C>
where
    S: InventoryStore,
    B: EventBus<UnitChangeEvent>,
    C: Clock,
{
    fn execute<F>(
        &self,
        unit_id: UnitId,
        actor: Option<ActorId>,
        target: Option<UnitStatus>,
        decide: F,
    ) -> Result<Committed, ReservationError>
    where
        F: FnOnce(&Unit, DateTime<Utc>) -> DomainResult<UnitMutation>,
    {
        let observed = self.store.get_unit(unit_id)?;
        let now = self.clock.now();
        let mutation = decide(&observed, now)
            .map_err(|e| ReservationError::from_domain(e, &observed, target))?;

        let _stripe = self.stripes.lock(unit_id);
        match self
            .store
            .conditional_update(unit_id, observed.version(), &mutation)?
        {
            UpdateOutcome::Committed { previous, current } => {
                let event = UnitChangeEvent::from_commit(
                    &previous,
                    &current,
                    mutation.cause(),
                    actor,
                    self.clock.now(),
                );
                if let Err(err) = self.bus.publish(event) {
                    // The commit stands; subscribers recover by re-reading.
                    warn!(
                        unit_id = %unit_id,
                        version = current.version(),
                        error = ?err,
                        "change committed but event publication failed"
                    );
                }
                debug!(
                    unit_id = %unit_id,
                    cause = %mutation.cause(),
                    from = %previous.status(),
                    to = %current.status(),
                    version = current.version(),
                    "unit change committed"
                );
                Ok(Committed {
                    previous,
                    current,
                    mutation,
                })
            }
            UpdateOutcome::VersionMismatch { current } => {
                debug!(
                    unit_id = %unit_id,
                    expected_version = observed.version(),
                    actual_version = current.version(),
                    "lost commit race"
                );
                Err(ReservationError::stale(current))
            }
        }
    }

    /// Reserve with the configured default hold length.
    pub fn reserve_default(
        &self,
        unit_id: UnitId,
        holder: &Actor,
    ) -> Result<Reservation, ReservationError> {
        self.reserve(unit_id, holder, self.default_ttl)
    }

    /// Reclaim an elapsed hold on behalf of the sweeper.
    ///
    /// Returns `Ok(None)` when there is nothing to reclaim: the unit is no
    /// longer reserved, its hold was extended, or it changed concurrently.
    pub fn expire(&self, unit_id: UnitId) -> Result<Option<Unit>, ReservationError> {
        match self.execute(unit_id, None, None, |unit, now| unit.decide_expire(now)) {
            Ok(committed) => {
                info!(
                    unit_id = %unit_id,
                    lapsed_holder = ?committed.previous.holder(),
                    hold_expiry = ?committed.previous.hold_expiry(),
                    "hold expired"
                );
                Ok(Some(committed.current))
            }
            Err(ReservationError::PreconditionFailed { .. } | ReservationError::Conflict { .. }) => {
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Reserved units whose hold has elapsed as of now, earliest first.
    pub fn due_holds(&self, limit: usize) -> Result<Vec<Unit>, StoreError> {
        self.store.expired_holds(self.clock.now(), limit)
    }

    pub fn get(&self, unit_id: UnitId) -> Result<Unit, ReservationError> {
        Ok(self.store.get_unit(unit_id)?)
    }

    pub fn list(&self, project_id: Option<ProjectId>) -> Result<Vec<Unit>, ReservationError> {
        Ok(self.store.list_units(project_id)?)
    }

    pub fn subscribe(&self, filter: SubscriptionFilter) -> Subscription<UnitChangeEvent> {
        self.bus.subscribe(filter)
    }

    fn check_ttl(&self, ttl: Duration) -> DomainResult<()> {
        if ttl > self.max_ttl {
            return Err(DomainError::validation(format!(
                "hold of {}s exceeds the maximum of {}s",
                ttl.num_seconds(),
                self.max_ttl.num_seconds()
            )));
        }
        Ok(())
    }
}

impl<S, B, C> ReservationCoordinator<S, B, C>
where
    S: InventoryRead + Clone + 'static,
{
    /// Read-only view of the inventory for consumers that must not write.
    pub fn reader(&self) -> InventoryReader {
        InventoryReader::new(self.store.clone())
    }
}

impl<S, B, C> ReservationService for ReservationCoordinator<S, B, C>
where
    S: InventoryStore,
    B: EventBus<UnitChangeEvent>,
    C: Clock,
{
    fn reserve(
        &self,
        unit_id: UnitId,
        holder: &Actor,
        ttl: Duration,
    ) -> Result<Reservation, ReservationError> {
        let committed = self.execute(unit_id, Some(holder.id), None, |unit, now| {
            self.check_ttl(ttl)?;
            unit.decide_reserve(holder.id, ttl, now)
        })?;

        info!(
            unit_id = %unit_id,
            holder = %holder.id,
            hold_expiry = ?committed.current.hold_expiry(),
            "unit reserved"
        );
        Reservation::from_unit(&committed.current).ok_or_else(|| {
            ReservationError::Unavailable("committed reservation carries no hold".to_string())
        })
    }

    fn release(&self, unit_id: UnitId, actor: &Actor) -> Result<Unit, ReservationError> {
        let committed = self.execute(unit_id, Some(actor.id), None, |unit, _| {
            unit.decide_release(actor)
        })?;

        if matches!(committed.mutation, UnitMutation::Release { overridden: true }) {
            warn!(
                unit_id = %unit_id,
                actor = %actor.id,
                holder = ?committed.previous.holder(),
                "hold released by override"
            );
        } else {
            info!(unit_id = %unit_id, holder = %actor.id, "hold released");
        }
        Ok(committed.current)
    }

    fn extend(
        &self,
        unit_id: UnitId,
        holder: &Actor,
        additional: Duration,
    ) -> Result<Reservation, ReservationError> {
        let committed = self.execute(unit_id, Some(holder.id), None, |unit, now| {
            self.check_ttl(additional)?;
            let mutation = unit.decide_extend(holder.id, additional, now)?;
            if let UnitMutation::Extend { hold_expiry } = &mutation {
                self.check_ttl(*hold_expiry - now)?;
            }
            Ok(mutation)
        })?;

        info!(
            unit_id = %unit_id,
            holder = %holder.id,
            hold_expiry = ?committed.current.hold_expiry(),
            "hold extended"
        );
        Reservation::from_unit(&committed.current).ok_or_else(|| {
            ReservationError::Unavailable("committed extension carries no hold".to_string())
        })
    }

    fn advance(
        &self,
        unit_id: UnitId,
        target: UnitStatus,
        actor: &Actor,
    ) -> Result<Unit, ReservationError> {
        let committed = self.execute(unit_id, Some(actor.id), Some(target), |unit, _| {
            unit.decide_advance(target, actor)
        })?;

        let from = committed.previous.status();
        if matches!(committed.mutation, UnitMutation::Advance { skipped: true, .. }) {
            warn!(
                unit_id = %unit_id,
                actor = %actor.id,
                %from,
                to = %target,
                skipped = ?from.skipped_to(target),
                "lifecycle steps skipped by override"
            );
        } else {
            info!(unit_id = %unit_id, actor = %actor.id, %from, to = %target, "unit advanced");
        }
        Ok(committed.current)
    }

    fn cancel(&self, unit_id: UnitId, actor: &Actor) -> Result<Unit, ReservationError> {
        let committed = self.execute(
            unit_id,
            Some(actor.id),
            Some(UnitStatus::Cancelled),
            |unit, _| unit.decide_cancel(actor),
        )?;

        info!(
            unit_id = %unit_id,
            actor = %actor.id,
            from = %committed.previous.status(),
            "unit cancelled"
        );
        Ok(committed.current)
    }
}
