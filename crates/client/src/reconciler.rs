//! Optimistic local state reconciled against authoritative results and
//! change events.
//!
//! A `Reconciler` belongs to one consumer (a UI session) acting as one actor.
//! It never talks to the store: it only sees what the reservation service
//! returns and what the change feed delivers, which keeps the coordinator's
//! correctness independent of any particular UI update cycle.
//!
//! ## Flow
//!
//! ```text
//! user clicks "hold"
//!   ↓
//! begin_claim      shows Reserved-by-me immediately (pending)
//!   ↓
//! service.reserve
//!   ↓
//! settle_claim     Ok  → confirmed state replaces the optimistic one
//!                  Err → roll back to authoritative state, raise a signal
//! ```
//!
//! Change events are applied independently: stale or duplicate versions are
//! ignored, and an event showing another holder raises a signal even if the
//! viewer never sent a request.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::{debug, warn};

use holdfast_auth::Actor;
use holdfast_core::{ActorId, UnitId};
use holdfast_events::Subscription;
use holdfast_inventory::{
    ChangeCause, Reservation, ReservationError, ReservationService, Unit, UnitChangeEvent,
    UnitStatus,
};

use crate::signal::{ConflictKind, ConflictSignal, SignalSource};
use crate::view::{LocalUnitView, PendingAction, PendingKind, UnitSnapshot};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("a request for unit {0} is already in flight")]
    RequestPending(UnitId),

    #[error("hold length {0}s is out of range")]
    HoldOutOfRange(i64),

    #[error(transparent)]
    Rejected(#[from] ReservationError),
}

#[derive(Debug)]
pub struct Reconciler {
    actor: Actor,
    views: HashMap<UnitId, LocalUnitView>,
    events_dropped: u64,
    needs_resync: bool,
}

impl Reconciler {
    pub fn new(actor: Actor) -> Self {
        Self {
            actor,
            views: HashMap::new(),
            events_dropped: 0,
            needs_resync: false,
        }
    }

    pub fn viewer(&self) -> ActorId {
        self.actor.id
    }

    /// Start showing `unit`, or refresh it if it is already shown.
    pub fn display(&mut self, unit: &Unit) {
        match self.views.get_mut(&unit.id()) {
            Some(view) => refresh(view, UnitSnapshot::from_unit(unit)),
            None => {
                self.views.insert(unit.id(), LocalUnitView::from_unit(unit));
            }
        }
    }

    pub fn hide(&mut self, unit_id: UnitId) -> Option<LocalUnitView> {
        self.views.remove(&unit_id)
    }

    pub fn view(&self, unit_id: UnitId) -> Option<&LocalUnitView> {
        self.views.get(&unit_id)
    }

    pub fn views(&self) -> impl Iterator<Item = &LocalUnitView> {
        self.views.values()
    }

    /// Whether change events were lost and shown state may lag behind.
    pub fn needs_resync(&self) -> bool {
        self.needs_resync
    }

    /// Refresh shown units from authoritative reads after lost events.
    pub fn resync<'a>(&mut self, units: impl IntoIterator<Item = &'a Unit>) {
        for unit in units {
            if let Some(view) = self.views.get_mut(&unit.id()) {
                refresh(view, UnitSnapshot::from_unit(unit));
            }
        }
        self.needs_resync = false;
    }

    pub fn begin_claim(
        &mut self,
        unit_id: UnitId,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<(), ClientError> {
        let viewer = self.viewer();
        let hold_expiry = extend_from(now, ttl)?;
        self.begin(unit_id, PendingKind::Claim, now, |state| {
            Ok(UnitSnapshot {
                status: UnitStatus::Reserved,
                holder: Some(viewer),
                hold_expiry: Some(hold_expiry),
                version: state.version,
            })
        })
    }

    pub fn begin_release(&mut self, unit_id: UnitId, now: DateTime<Utc>) -> Result<(), ClientError> {
        self.begin(unit_id, PendingKind::Release, now, |state| {
            Ok(UnitSnapshot {
                status: UnitStatus::Available,
                holder: None,
                hold_expiry: None,
                version: state.version,
            })
        })
    }

    pub fn begin_extend(
        &mut self,
        unit_id: UnitId,
        additional: Duration,
        now: DateTime<Utc>,
    ) -> Result<(), ClientError> {
        self.begin(unit_id, PendingKind::Extend, now, |state| {
            let hold_expiry = state
                .hold_expiry
                .map(|expiry| extend_from(expiry.max(now), additional))
                .transpose()?;
            Ok(UnitSnapshot {
                hold_expiry,
                ..state.clone()
            })
        })
    }

    fn begin<F>(
        &mut self,
        unit_id: UnitId,
        kind: PendingKind,
        now: DateTime<Utc>,
        optimistic: F,
    ) -> Result<(), ClientError>
    where
        F: FnOnce(&UnitSnapshot) -> Result<UnitSnapshot, ClientError>,
    {
        // Units that are not shown get no optimistic state.
        let Some(view) = self.views.get_mut(&unit_id) else {
            return Ok(());
        };
        if view.is_pending() {
            return Err(ClientError::RequestPending(unit_id));
        }
        let shown = optimistic(&view.state)?;
        view.pending = Some(PendingAction {
            kind,
            rollback: std::mem::replace(&mut view.state, shown),
            requested_at: now,
        });
        Ok(())
    }

    pub fn settle_claim(
        &mut self,
        unit_id: UnitId,
        outcome: &Result<Reservation, ReservationError>,
    ) -> Option<ConflictSignal> {
        self.settle(unit_id, outcome.as_ref().map(UnitSnapshot::from_reservation))
    }

    pub fn settle_release(
        &mut self,
        unit_id: UnitId,
        outcome: &Result<Unit, ReservationError>,
    ) -> Option<ConflictSignal> {
        self.settle(unit_id, outcome.as_ref().map(UnitSnapshot::from_unit))
    }

    pub fn settle_extend(
        &mut self,
        unit_id: UnitId,
        outcome: &Result<Reservation, ReservationError>,
    ) -> Option<ConflictSignal> {
        self.settle(unit_id, outcome.as_ref().map(UnitSnapshot::from_reservation))
    }

    fn settle(
        &mut self,
        unit_id: UnitId,
        outcome: Result<UnitSnapshot, &ReservationError>,
    ) -> Option<ConflictSignal> {
        let viewer = self.viewer();

        if let Err(ReservationError::NotFound(_)) = outcome {
            self.views.remove(&unit_id)?;
            return Some(ConflictSignal {
                unit_id,
                kind: ConflictKind::NeverHeld,
                source: SignalSource::Response,
                observed: None,
            });
        }

        let view = self.views.get_mut(&unit_id)?;
        let base = match view.pending.take() {
            Some(pending) => pending.rollback,
            None => view.state.clone(),
        };

        match outcome {
            Ok(confirmed) => {
                view.state = newest(confirmed, base);
                None
            }
            Err(err) => match err.current() {
                Some(current) => {
                    let observed = UnitSnapshot::from_unit(current);
                    view.state = newest(observed.clone(), base);

                    let kind = match observed.holder {
                        // Already ours; the request was redundant.
                        Some(holder) if holder == viewer => return None,
                        Some(holder) => ConflictKind::HeldByOther { holder },
                        None if matches!(err, ReservationError::Expired { .. })
                            || current.lapsed_holder() == Some(viewer) =>
                        {
                            ConflictKind::OwnHoldExpired
                        }
                        None => ConflictKind::NeverHeld,
                    };
                    raise(view, kind, SignalSource::Response, Some(observed))
                }
                None => {
                    debug!(unit_id = %unit_id, kind = err.kind(), "request rejected, rolled back");
                    view.state = base;
                    None
                }
            },
        }
    }

    /// Apply one change event; returns the conflict it reveals, if any.
    pub fn apply_event(&mut self, event: &UnitChangeEvent) -> Option<ConflictSignal> {
        let viewer = self.viewer();
        let view = self.views.get_mut(&event.unit_id)?;

        if event.version <= view.confirmed_version() {
            debug!(
                unit_id = %event.unit_id,
                version = event.version,
                "ignoring stale change event"
            );
            return None;
        }

        let snapshot = UnitSnapshot::from_event(event);
        let confirmed_holder = view
            .pending
            .as_ref()
            .map_or(view.state.holder, |p| p.rollback.holder);

        // The viewer held the unit and this change took the hold away
        // without the viewer asking for it.
        let hold_lost = confirmed_holder == Some(viewer)
            && snapshot.holder != Some(viewer)
            && event.actor != Some(viewer);

        if let Some(pending) = view.pending.as_mut() {
            if event.actor == Some(viewer) && completes(pending.kind, event.cause) {
                // Our own request committed ahead of its response.
                view.pending = None;
                view.state = snapshot;
                return None;
            }
            let overtaken = hold_lost || snapshot.holder.is_some_and(|h| h != viewer);
            if !overtaken {
                pending.rollback = snapshot;
                return None;
            }
            // Someone else got there first; the optimistic state is wrong.
            view.pending = None;
        }

        view.state = snapshot.clone();
        let kind = match snapshot.holder {
            Some(holder) if holder != viewer => ConflictKind::HeldByOther { holder },
            _ if hold_lost && event.cause == ChangeCause::Expired => ConflictKind::OwnHoldExpired,
            _ if hold_lost => ConflictKind::HoldRevoked {
                by: event.actor,
                cause: event.cause,
            },
            _ => return None,
        };
        raise(view, kind, SignalSource::Event, Some(snapshot))
    }

    /// Apply everything waiting on `subscription`.
    pub fn pump(&mut self, subscription: &Subscription<UnitChangeEvent>) -> Vec<ConflictSignal> {
        // Losses are only discovered while receiving.
        let events = subscription.drain();
        let dropped = subscription.dropped();
        if dropped > self.events_dropped {
            warn!(
                viewer = %self.viewer(),
                lost = dropped - self.events_dropped,
                "change events were dropped; shown state needs a resync"
            );
            self.events_dropped = dropped;
            self.needs_resync = true;
        }

        events
            .iter()
            .filter_map(|event| self.apply_event(event))
            .collect()
    }

    /// Optimistically claim, call the service and reconcile the answer.
    pub fn claim<S>(
        &mut self,
        service: &S,
        unit_id: UnitId,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<(Reservation, Option<ConflictSignal>), ClientError>
    where
        S: ReservationService + ?Sized,
    {
        self.begin_claim(unit_id, ttl, now)?;
        let outcome = service.reserve(unit_id, &self.actor, ttl);
        let signal = self.settle_claim(unit_id, &outcome);
        finish(outcome, signal)
    }

    pub fn release<S>(
        &mut self,
        service: &S,
        unit_id: UnitId,
        now: DateTime<Utc>,
    ) -> Result<(Unit, Option<ConflictSignal>), ClientError>
    where
        S: ReservationService + ?Sized,
    {
        self.begin_release(unit_id, now)?;
        let outcome = service.release(unit_id, &self.actor);
        let signal = self.settle_release(unit_id, &outcome);
        finish(outcome, signal)
    }

    pub fn extend<S>(
        &mut self,
        service: &S,
        unit_id: UnitId,
        additional: Duration,
        now: DateTime<Utc>,
    ) -> Result<(Reservation, Option<ConflictSignal>), ClientError>
    where
        S: ReservationService + ?Sized,
    {
        self.begin_extend(unit_id, additional, now)?;
        let outcome = service.extend(unit_id, &self.actor, additional);
        let signal = self.settle_extend(unit_id, &outcome);
        finish(outcome, signal)
    }
}

fn finish<T>(
    outcome: Result<T, ReservationError>,
    signal: Option<ConflictSignal>,
) -> Result<(T, Option<ConflictSignal>), ClientError> {
    match outcome {
        Ok(value) => Ok((value, signal)),
        Err(err) => {
            if let Some(signal) = &signal {
                debug!(unit_id = %signal.unit_id, kind = ?signal.kind, "conflict raised");
            }
            Err(err.into())
        }
    }
}

fn extend_from(start: DateTime<Utc>, by: Duration) -> Result<DateTime<Utc>, ClientError> {
    start
        .checked_add_signed(by)
        .ok_or(ClientError::HoldOutOfRange(by.num_seconds()))
}

fn completes(kind: PendingKind, cause: ChangeCause) -> bool {
    matches!(
        (kind, cause),
        (PendingKind::Claim, ChangeCause::Reserved)
            | (PendingKind::Release, ChangeCause::Released)
            | (PendingKind::Extend, ChangeCause::Extended)
    )
}

fn newest(candidate: UnitSnapshot, base: UnitSnapshot) -> UnitSnapshot {
    if candidate.version >= base.version {
        candidate
    } else {
        base
    }
}

fn refresh(view: &mut LocalUnitView, snapshot: UnitSnapshot) {
    if snapshot.version <= view.confirmed_version() {
        return;
    }
    match view.pending.as_mut() {
        Some(pending) => pending.rollback = snapshot,
        None => view.state = snapshot,
    }
}

/// Record a signal unless one was already raised for this version.
fn raise(
    view: &mut LocalUnitView,
    kind: ConflictKind,
    source: SignalSource,
    observed: Option<UnitSnapshot>,
) -> Option<ConflictSignal> {
    let version = observed.as_ref().map_or(view.state.version, |s| s.version);
    if view.signaled_version.is_some_and(|v| v >= version) {
        return None;
    }
    view.signaled_version = Some(version);
    Some(ConflictSignal {
        unit_id: view.unit_id,
        kind,
        source,
        observed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use holdfast_core::ProjectId;
    use holdfast_inventory::{UnitAttributes, UnitMutation};

    fn unit() -> Unit {
        Unit::new(UnitId::new(), ProjectId::new(), UnitAttributes::default())
    }

    fn commit(unit: &Unit, mutation: UnitMutation) -> Unit {
        mutation.commit(unit).unwrap()
    }

    fn event(prev: &Unit, next: &Unit, cause: ChangeCause, actor: Option<ActorId>) -> UnitChangeEvent {
        UnitChangeEvent::from_commit(prev, next, cause, actor, Utc::now())
    }

    fn reserve(unit: &Unit, holder: ActorId, now: DateTime<Utc>) -> Unit {
        commit(
            unit,
            UnitMutation::Reserve {
                holder,
                hold_expiry: now + Duration::hours(48),
            },
        )
    }

    /// Answers every reserve with a scripted result.
    struct Scripted {
        reserve: Mutex<Option<Result<Reservation, ReservationError>>>,
    }

    impl ReservationService for Scripted {
        fn reserve(&self, _: UnitId, _: &Actor, _: Duration) -> Result<Reservation, ReservationError> {
            self.reserve
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Err(ReservationError::Unavailable("no script".to_string())))
        }

        fn release(&self, _: UnitId, _: &Actor) -> Result<Unit, ReservationError> {
            Err(ReservationError::Unavailable("no script".to_string()))
        }

        fn extend(&self, _: UnitId, _: &Actor, _: Duration) -> Result<Reservation, ReservationError> {
            Err(ReservationError::Unavailable("no script".to_string()))
        }

        fn advance(&self, _: UnitId, _: UnitStatus, _: &Actor) -> Result<Unit, ReservationError> {
            Err(ReservationError::Unavailable("no script".to_string()))
        }

        fn cancel(&self, _: UnitId, _: &Actor) -> Result<Unit, ReservationError> {
            Err(ReservationError::Unavailable("no script".to_string()))
        }
    }

    #[test]
    fn optimistic_claim_is_replaced_by_confirmation() {
        let me = Actor::agent(ActorId::new());
        let now = Utc::now();
        let u = unit();
        let mut reconciler = Reconciler::new(me.clone());
        reconciler.display(&u);

        reconciler.begin_claim(u.id(), Duration::hours(48), now).unwrap();
        let shown = reconciler.view(u.id()).unwrap();
        assert!(shown.is_pending());
        assert_eq!(shown.status(), UnitStatus::Reserved);
        assert_eq!(shown.holder(), Some(me.id));

        let confirmed = reserve(&u, me.id, now);
        let outcome = Ok(Reservation::from_unit(&confirmed).unwrap());
        assert_eq!(reconciler.settle_claim(u.id(), &outcome), None);

        let shown = reconciler.view(u.id()).unwrap();
        assert!(!shown.is_pending());
        assert_eq!(shown.status(), UnitStatus::Reserved);
        assert_eq!(shown.state.version, 1);
    }

    #[test]
    fn lost_race_rolls_back_and_names_the_holder() {
        let me = Actor::agent(ActorId::new());
        let rival = ActorId::new();
        let now = Utc::now();
        let u = unit();
        let taken = reserve(&u, rival, now);
        let service = Scripted {
            reserve: Mutex::new(Some(Err(ReservationError::from_domain(
                holdfast_core::DomainError::conflict("unit is reserved"),
                &taken,
                None,
            )))),
        };

        let mut reconciler = Reconciler::new(me);
        reconciler.display(&u);
        let err = reconciler
            .claim(&service, u.id(), Duration::hours(48), now)
            .unwrap_err();
        assert!(matches!(err, ClientError::Rejected(ReservationError::Conflict { .. })));

        let shown = reconciler.view(u.id()).unwrap();
        assert!(!shown.is_pending());
        assert_eq!(shown.holder(), Some(rival));
    }

    #[test]
    fn settle_classifies_rejections() {
        let me = Actor::agent(ActorId::new());
        let rival = ActorId::new();
        let now = Utc::now();

        // (a) someone else holds it
        let u = unit();
        let mut reconciler = Reconciler::new(me.clone());
        reconciler.display(&u);
        reconciler.begin_claim(u.id(), Duration::hours(1), now).unwrap();
        let outcome = Err(ReservationError::stale(reserve(&u, rival, now)));
        let signal = reconciler.settle_claim(u.id(), &outcome).unwrap();
        assert_eq!(signal.kind, ConflictKind::HeldByOther { holder: rival });
        assert_eq!(signal.source, SignalSource::Response);

        // (b) own hold expired
        let held = reserve(&unit(), me.id, now);
        let lapsed = commit(&held, UnitMutation::Expire);
        reconciler.display(&held);
        reconciler.begin_release(held.id(), now).unwrap();
        let outcome = Err(ReservationError::from_domain(
            holdfast_core::DomainError::expired("hold elapsed"),
            &lapsed,
            None,
        ));
        let signal = reconciler.settle_release(held.id(), &outcome).unwrap();
        assert_eq!(signal.kind, ConflictKind::OwnHoldExpired);
        assert_eq!(reconciler.view(held.id()).unwrap().status(), UnitStatus::Available);

        // (c) never held
        let booked = unit().with_status(UnitStatus::Booked).unwrap();
        reconciler.display(&booked);
        reconciler.begin_release(booked.id(), now).unwrap();
        let outcome = Err(ReservationError::from_domain(
            holdfast_core::DomainError::precondition("unit is booked"),
            &booked,
            None,
        ));
        let signal = reconciler.settle_release(booked.id(), &outcome).unwrap();
        assert_eq!(signal.kind, ConflictKind::NeverHeld);
    }

    #[test]
    fn passive_detection_without_any_request() {
        let me = ActorId::new();
        let rival = ActorId::new();
        let u = unit();
        let mut reconciler = Reconciler::new(Actor::agent(me));
        reconciler.display(&u);

        let next = reserve(&u, rival, Utc::now());
        let signal = reconciler
            .apply_event(&event(&u, &next, ChangeCause::Reserved, Some(rival)))
            .unwrap();
        assert_eq!(signal.kind, ConflictKind::HeldByOther { holder: rival });
        assert_eq!(signal.source, SignalSource::Event);
        assert_eq!(reconciler.view(u.id()).unwrap().holder(), Some(rival));
    }

    #[test]
    fn duplicate_and_stale_events_are_ignored() {
        let rival = ActorId::new();
        let u = unit();
        let mut reconciler = Reconciler::new(Actor::agent(ActorId::new()));
        reconciler.display(&u);

        let held = reserve(&u, rival, Utc::now());
        let released = commit(&held, UnitMutation::Release { overridden: false });
        let first = event(&u, &held, ChangeCause::Reserved, Some(rival));

        assert!(reconciler.apply_event(&first).is_some());
        assert!(reconciler.apply_event(&first).is_none());
        reconciler.apply_event(&event(&held, &released, ChangeCause::Released, Some(rival)));
        assert!(reconciler.apply_event(&first).is_none());
        assert_eq!(reconciler.view(u.id()).unwrap().status(), UnitStatus::Available);
    }

    #[test]
    fn own_commit_event_confirms_a_pending_claim() {
        let me = Actor::agent(ActorId::new());
        let now = Utc::now();
        let u = unit();
        let mut reconciler = Reconciler::new(me.clone());
        reconciler.display(&u);
        reconciler.begin_claim(u.id(), Duration::hours(48), now).unwrap();

        let held = reserve(&u, me.id, now);
        assert!(reconciler
            .apply_event(&event(&u, &held, ChangeCause::Reserved, Some(me.id)))
            .is_none());
        assert!(!reconciler.view(u.id()).unwrap().is_pending());

        // The late response agrees and changes nothing.
        let outcome = Ok(Reservation::from_unit(&held).unwrap());
        assert!(reconciler.settle_claim(u.id(), &outcome).is_none());
        assert_eq!(reconciler.view(u.id()).unwrap().state.version, 1);
    }

    #[test]
    fn expiry_of_own_hold_is_signalled_from_events() {
        let me = ActorId::new();
        let u = unit();
        let held = reserve(&u, me, Utc::now());
        let expired = commit(&held, UnitMutation::Expire);
        let mut reconciler = Reconciler::new(Actor::agent(me));
        reconciler.display(&held);

        let signal = reconciler
            .apply_event(&event(&held, &expired, ChangeCause::Expired, None))
            .unwrap();
        assert_eq!(signal.kind, ConflictKind::OwnHoldExpired);
    }

    #[test]
    fn second_request_while_pending_is_refused() {
        let u = unit();
        let mut reconciler = Reconciler::new(Actor::agent(ActorId::new()));
        reconciler.display(&u);
        reconciler.begin_claim(u.id(), Duration::hours(1), Utc::now()).unwrap();
        assert_eq!(
            reconciler.begin_claim(u.id(), Duration::hours(1), Utc::now()),
            Err(ClientError::RequestPending(u.id()))
        );
    }

    #[test]
    fn signals_serialize_for_ui_consumers() {
        let signal = ConflictSignal {
            unit_id: UnitId::new(),
            kind: ConflictKind::OwnHoldExpired,
            source: SignalSource::Event,
            observed: None,
        };
        let json = serde_json::to_value(&signal).unwrap();
        assert_eq!(json["kind"]["kind"], "own_hold_expired");
        assert_eq!(json["source"], "event");
        assert!(signal.message().contains("expired"));
    }

    #[test]
    fn override_release_of_own_hold_is_signalled() {
        let me = ActorId::new();
        let supervisor = ActorId::new();
        let u = unit();
        let held = reserve(&u, me, Utc::now());
        let released = commit(&held, UnitMutation::Release { overridden: true });
        let mut reconciler = Reconciler::new(Actor::agent(me));
        reconciler.display(&held);

        let signal = reconciler
            .apply_event(&event(&held, &released, ChangeCause::Released, Some(supervisor)))
            .unwrap();
        assert_eq!(
            signal.kind,
            ConflictKind::HoldRevoked {
                by: Some(supervisor),
                cause: ChangeCause::Released,
            }
        );
        assert_eq!(signal.source, SignalSource::Event);
        assert_eq!(reconciler.view(u.id()).unwrap().holder(), None);
        assert!(signal.message().contains(&supervisor.to_string()));
    }

    #[test]
    fn cancellation_of_own_hold_is_signalled_even_while_extending() {
        let me = ActorId::new();
        let admin = ActorId::new();
        let now = Utc::now();
        let u = unit();
        let held = reserve(&u, me, now);
        let cancelled = commit(&held, UnitMutation::Cancel);
        let mut reconciler = Reconciler::new(Actor::agent(me));
        reconciler.display(&held);
        reconciler.begin_extend(u.id(), Duration::hours(1), now).unwrap();

        let signal = reconciler
            .apply_event(&event(&held, &cancelled, ChangeCause::Cancelled, Some(admin)))
            .unwrap();
        assert_eq!(
            signal.kind,
            ConflictKind::HoldRevoked {
                by: Some(admin),
                cause: ChangeCause::Cancelled,
            }
        );
        let view = reconciler.view(u.id()).unwrap();
        assert!(!view.is_pending());
        assert_eq!(view.status(), UnitStatus::Cancelled);
    }

    #[test]
    fn own_booking_raises_nothing() {
        let me = ActorId::new();
        let u = unit();
        let held = reserve(&u, me, Utc::now());
        let booked = commit(
            &held,
            UnitMutation::Advance {
                to: UnitStatus::Booked,
                skipped: false,
            },
        );
        let mut reconciler = Reconciler::new(Actor::agent(me));
        reconciler.display(&held);

        assert!(reconciler
            .apply_event(&event(&held, &booked, ChangeCause::Advanced, Some(me)))
            .is_none());
        assert_eq!(reconciler.view(u.id()).unwrap().status(), UnitStatus::Booked);
    }

    #[test]
    fn unrepresentable_hold_length_is_refused_locally() {
        let me = ActorId::new();
        let now = Utc::now();
        let u = unit();
        let mut reconciler = Reconciler::new(Actor::agent(me));
        reconciler.display(&u);

        let huge = Duration::try_seconds(i64::MAX / 1_000).unwrap();
        assert!(matches!(
            reconciler.begin_claim(u.id(), huge, now),
            Err(ClientError::HoldOutOfRange(_))
        ));
        assert!(!reconciler.view(u.id()).unwrap().is_pending());

        let held = reserve(&u, me, now);
        reconciler.display(&held);
        assert!(matches!(
            reconciler.begin_extend(u.id(), huge, now),
            Err(ClientError::HoldOutOfRange(_))
        ));
        assert_eq!(
            reconciler.view(u.id()).unwrap().state.hold_expiry,
            held.hold_expiry()
        );
    }
}
