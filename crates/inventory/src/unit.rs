use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use holdfast_auth::{authorize, Actor};
use holdfast_auth::permissions::{ADVANCE_SKIP, CANCEL, RELEASE_OVERRIDE};
use holdfast_core::{ActorId, DomainError, DomainResult, ProjectId, UnitId};

use crate::mutation::UnitMutation;
use crate::status::UnitStatus;

/// Static commercial attributes. Never touched by the reservation engine.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UnitAttributes {
    /// Human-facing label, e.g. "T2-14-03".
    pub code: String,
    /// Price in smallest currency unit (e.g., cents).
    pub price_cents: u64,
    #[serde(default)]
    pub bedrooms: u8,
    #[serde(default)]
    pub area_sqm: u32,
}

/// A sellable unit as held by the inventory store.
///
/// Invariants (checked by [`Unit::check_invariants`] before every commit):
/// - `holder` is set iff `status == reserved`
/// - `hold_expiry` is set iff `holder` is set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    id: UnitId,
    project_id: ProjectId,
    status: UnitStatus,
    holder: Option<ActorId>,
    hold_expiry: Option<DateTime<Utc>>,
    /// Actor whose hold was most recently reclaimed by expiry.
    #[serde(default)]
    lapsed_holder: Option<ActorId>,
    version: u64,
    attributes: UnitAttributes,
}

impl Unit {
    /// A freshly loaded, available unit at version 0.
    pub fn new(id: UnitId, project_id: ProjectId, attributes: UnitAttributes) -> Self {
        Self {
            id,
            project_id,
            status: UnitStatus::Available,
            holder: None,
            hold_expiry: None,
            lapsed_holder: None,
            version: 0,
            attributes,
        }
    }

    /// Seed a unit that is already further along its lifecycle (inventory
    /// migration). Holds cannot be seeded; use `reserve` after loading.
    pub fn with_status(mut self, status: UnitStatus) -> DomainResult<Self> {
        if status == UnitStatus::Reserved {
            return Err(DomainError::validation(
                "reserved units cannot be seeded; reserve them after loading",
            ));
        }
        self.status = status;
        Ok(self)
    }

    pub fn id(&self) -> UnitId {
        self.id
    }

    pub fn project_id(&self) -> ProjectId {
        self.project_id
    }

    pub fn status(&self) -> UnitStatus {
        self.status
    }

    pub fn holder(&self) -> Option<ActorId> {
        self.holder
    }

    pub fn hold_expiry(&self) -> Option<DateTime<Utc>> {
        self.hold_expiry
    }

    pub fn lapsed_holder(&self) -> Option<ActorId> {
        self.lapsed_holder
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn attributes(&self) -> &UnitAttributes {
        &self.attributes
    }

    pub fn is_held_by(&self, actor_id: ActorId) -> bool {
        self.holder == Some(actor_id)
    }

    /// A reserved unit whose hold has elapsed but which has not been swept yet.
    pub fn is_hold_due(&self, now: DateTime<Utc>) -> bool {
        self.status == UnitStatus::Reserved && self.hold_expiry.is_some_and(|exp| exp <= now)
    }

    pub fn check_invariants(&self) -> DomainResult<()> {
        let reserved = self.status == UnitStatus::Reserved;
        if reserved != self.holder.is_some() {
            return Err(DomainError::invariant(format!(
                "holder must be set iff status is reserved (status: {}, holder: {:?})",
                self.status, self.holder
            )));
        }
        if self.holder.is_some() != self.hold_expiry.is_some() {
            return Err(DomainError::invariant(
                "hold_expiry must be set iff holder is set",
            ));
        }
        Ok(())
    }

    pub(crate) fn apply(&mut self, mutation: &UnitMutation) {
        match mutation {
            UnitMutation::Reserve { holder, hold_expiry } => {
                self.status = UnitStatus::Reserved;
                self.holder = Some(*holder);
                self.hold_expiry = Some(*hold_expiry);
                self.lapsed_holder = None;
            }
            UnitMutation::Release { .. } => {
                self.status = UnitStatus::Available;
                self.holder = None;
                self.hold_expiry = None;
            }
            UnitMutation::Expire => {
                self.status = UnitStatus::Available;
                self.lapsed_holder = self.holder.take();
                self.hold_expiry = None;
            }
            UnitMutation::Extend { hold_expiry } => {
                self.hold_expiry = Some(*hold_expiry);
            }
            UnitMutation::Advance { to, .. } => {
                self.status = *to;
                self.holder = None;
                self.hold_expiry = None;
                self.lapsed_holder = None;
            }
            UnitMutation::Cancel => {
                self.status = UnitStatus::Cancelled;
                self.holder = None;
                self.hold_expiry = None;
                self.lapsed_holder = None;
            }
        }

        self.version += 1;
    }
}

fn hold_until(start: DateTime<Utc>, ttl: Duration) -> DomainResult<DateTime<Utc>> {
    start
        .checked_add_signed(ttl)
        .ok_or_else(|| DomainError::validation("hold expiry out of range"))
}

// Decision rules. Each takes the state read from the store and either rejects
// or returns the mutation to commit against that state's version.
impl Unit {
    pub fn decide_reserve(
        &self,
        holder: ActorId,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> DomainResult<UnitMutation> {
        if ttl <= Duration::zero() {
            return Err(DomainError::validation("ttl must be positive"));
        }
        if self.status != UnitStatus::Available {
            return Err(DomainError::conflict(format!("unit is {}", self.status)));
        }
        Ok(UnitMutation::Reserve {
            holder,
            hold_expiry: hold_until(now, ttl)?,
        })
    }

    pub fn decide_release(&self, actor: &Actor) -> DomainResult<UnitMutation> {
        if self.status == UnitStatus::Reserved {
            if self.is_held_by(actor.id) {
                return Ok(UnitMutation::Release { overridden: false });
            }
            if actor.has(&RELEASE_OVERRIDE) {
                return Ok(UnitMutation::Release { overridden: true });
            }
            return Err(DomainError::precondition("unit is held by another actor"));
        }
        Err(self.not_held_error(actor.id))
    }

    pub fn decide_extend(
        &self,
        holder: ActorId,
        additional: Duration,
        now: DateTime<Utc>,
    ) -> DomainResult<UnitMutation> {
        if additional <= Duration::zero() {
            return Err(DomainError::validation("additional ttl must be positive"));
        }
        if self.status == UnitStatus::Reserved {
            return match (self.is_held_by(holder), self.hold_expiry) {
                (true, Some(current)) => Ok(UnitMutation::Extend {
                    hold_expiry: hold_until(current.max(now), additional)?,
                }),
                _ => Err(DomainError::precondition("unit is held by another actor")),
            };
        }
        Err(self.not_held_error(holder))
    }

    /// Reclaim an elapsed hold. Rejects anything that is not both reserved and due.
    pub fn decide_expire(&self, now: DateTime<Utc>) -> DomainResult<UnitMutation> {
        if self.status != UnitStatus::Reserved {
            return Err(DomainError::precondition("unit is not reserved"));
        }
        if !self.is_hold_due(now) {
            return Err(DomainError::precondition("hold has not elapsed"));
        }
        Ok(UnitMutation::Expire)
    }

    pub fn decide_advance(&self, target: UnitStatus, actor: &Actor) -> DomainResult<UnitMutation> {
        // Entering or leaving a hold goes through reserve/release/expiry, and
        // cancellation has its own administrative operation.
        if matches!(
            target,
            UnitStatus::Available | UnitStatus::Reserved | UnitStatus::Cancelled
        ) {
            return Err(DomainError::invalid_transition(self.status, target));
        }

        // Booking lost to the sweeper: report the lapse, not the edge.
        if self.status == UnitStatus::Available && self.lapsed_holder == Some(actor.id) {
            return Err(self.not_held_error(actor.id));
        }

        let skipped = if self.status.can_transition_to(target) {
            false
        } else if self.status.precedes(target) && actor.has(&ADVANCE_SKIP) {
            true
        } else {
            return Err(DomainError::invalid_transition(self.status, target));
        };

        if self.status == UnitStatus::Reserved
            && !self.is_held_by(actor.id)
            && !actor.has(&RELEASE_OVERRIDE)
        {
            return Err(DomainError::precondition(
                "only the holder can book a reserved unit",
            ));
        }

        Ok(UnitMutation::Advance {
            to: target,
            skipped,
        })
    }

    pub fn decide_cancel(&self, actor: &Actor) -> DomainResult<UnitMutation> {
        authorize(actor, &CANCEL)?;
        if !self.status.can_transition_to(UnitStatus::Cancelled) {
            return Err(DomainError::invalid_transition(
                self.status,
                UnitStatus::Cancelled,
            ));
        }
        Ok(UnitMutation::Cancel)
    }

    fn not_held_error(&self, actor_id: ActorId) -> DomainError {
        if self.lapsed_holder == Some(actor_id) {
            DomainError::expired("hold elapsed and was released")
        } else {
            DomainError::precondition(format!("unit is {}, not reserved", self.status))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn test_unit() -> Unit {
        Unit::new(
            UnitId::new(),
            ProjectId::new(),
            UnitAttributes {
                code: "T1-01-01".to_string(),
                price_cents: 45_000_000,
                bedrooms: 2,
                area_sqm: 80,
            },
        )
    }

    fn commit(unit: &Unit, mutation: UnitMutation) -> Unit {
        mutation.commit(unit).unwrap()
    }

    fn reserved_by(holder: ActorId, now: DateTime<Utc>, ttl: Duration) -> Unit {
        let unit = test_unit();
        let m = unit.decide_reserve(holder, ttl, now).unwrap();
        commit(&unit, m)
    }

    #[test]
    fn reserve_sets_holder_expiry_and_bumps_version() {
        let now = Utc::now();
        let agent = ActorId::new();
        let unit = reserved_by(agent, now, Duration::hours(48));

        assert_eq!(unit.status(), UnitStatus::Reserved);
        assert_eq!(unit.holder(), Some(agent));
        assert_eq!(unit.hold_expiry(), Some(now + Duration::hours(48)));
        assert_eq!(unit.version(), 1);
        unit.check_invariants().unwrap();
    }

    #[test]
    fn reserve_on_reserved_unit_conflicts() {
        let now = Utc::now();
        let unit = reserved_by(ActorId::new(), now, Duration::hours(1));

        let err = unit
            .decide_reserve(ActorId::new(), Duration::hours(1), now)
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn reserve_rejects_non_positive_ttl() {
        let err = test_unit()
            .decide_reserve(ActorId::new(), Duration::zero(), Utc::now())
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn release_by_non_holder_requires_override() {
        let now = Utc::now();
        let unit = reserved_by(ActorId::new(), now, Duration::hours(1));

        let stranger = Actor::agent(ActorId::new());
        assert!(matches!(
            unit.decide_release(&stranger),
            Err(DomainError::PreconditionFailed(_))
        ));

        let supervisor = Actor::agent(ActorId::new()).with_permission(RELEASE_OVERRIDE);
        assert_eq!(
            unit.decide_release(&supervisor),
            Ok(UnitMutation::Release { overridden: true })
        );
    }

    #[test]
    fn extend_adds_to_the_later_of_expiry_and_now() {
        let now = Utc::now();
        let agent = ActorId::new();
        let unit = reserved_by(agent, now, Duration::hours(1));

        // Still running: extend from the current expiry.
        let m = unit.decide_extend(agent, Duration::hours(2), now).unwrap();
        assert_eq!(
            m,
            UnitMutation::Extend {
                hold_expiry: now + Duration::hours(3)
            }
        );

        // Elapsed but not yet swept: extend from now.
        let later = now + Duration::hours(5);
        let m = unit.decide_extend(agent, Duration::hours(2), later).unwrap();
        assert_eq!(
            m,
            UnitMutation::Extend {
                hold_expiry: later + Duration::hours(2)
            }
        );
    }

    #[test]
    fn unrepresentable_hold_expiry_is_a_validation_error() {
        let now = Utc::now();
        let agent = ActorId::new();
        let huge = Duration::try_seconds(i64::MAX / 1_000).unwrap();

        let err = test_unit().decide_reserve(agent, huge, now).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let unit = reserved_by(agent, now, Duration::hours(1));
        let err = unit.decide_extend(agent, huge, now).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn expired_holder_gets_expired_instead_of_precondition() {
        let now = Utc::now();
        let agent = ActorId::new();
        let unit = reserved_by(agent, now, Duration::hours(1));

        assert!(unit.decide_expire(now).is_err());
        let swept = commit(&unit, unit.decide_expire(now + Duration::hours(1)).unwrap());
        assert_eq!(swept.status(), UnitStatus::Available);
        assert_eq!(swept.lapsed_holder(), Some(agent));

        assert!(matches!(
            swept.decide_release(&Actor::agent(agent)),
            Err(DomainError::Expired(_))
        ));
        assert!(matches!(
            swept.decide_extend(agent, Duration::hours(1), now),
            Err(DomainError::Expired(_))
        ));
        assert!(matches!(
            swept.decide_release(&Actor::agent(ActorId::new())),
            Err(DomainError::PreconditionFailed(_))
        ));

        // A new hold clears the lapse marker.
        let again = commit(
            &swept,
            swept
                .decide_reserve(ActorId::new(), Duration::hours(1), now)
                .unwrap(),
        );
        assert_eq!(again.lapsed_holder(), None);
    }

    #[test]
    fn advance_from_available_to_spa_signed_is_invalid() {
        let err = test_unit()
            .decide_advance(UnitStatus::SpaSigned, &Actor::agent(ActorId::new()))
            .unwrap_err();
        assert_eq!(
            err,
            DomainError::InvalidTransition {
                from: "available".to_string(),
                to: "spa_signed".to_string()
            }
        );
    }

    #[test]
    fn holder_books_reserved_unit_and_hold_is_cleared() {
        let now = Utc::now();
        let agent = ActorId::new();
        let unit = reserved_by(agent, now, Duration::hours(1));

        let stranger = Actor::agent(ActorId::new());
        assert!(matches!(
            unit.decide_advance(UnitStatus::Booked, &stranger),
            Err(DomainError::PreconditionFailed(_))
        ));

        let booked = commit(
            &unit,
            unit.decide_advance(UnitStatus::Booked, &Actor::agent(agent))
                .unwrap(),
        );
        assert_eq!(booked.status(), UnitStatus::Booked);
        assert_eq!(booked.holder(), None);
        assert_eq!(booked.hold_expiry(), None);
    }

    #[test]
    fn lapsed_holder_booking_is_reported_as_expired() {
        let now = Utc::now();
        let agent = ActorId::new();
        let unit = reserved_by(agent, now, Duration::hours(1));
        let swept = commit(&unit, unit.decide_expire(now + Duration::hours(2)).unwrap());

        assert!(matches!(
            swept.decide_advance(UnitStatus::Booked, &Actor::agent(agent)),
            Err(DomainError::Expired(_))
        ));
        assert!(matches!(
            swept.decide_advance(UnitStatus::Booked, &Actor::agent(ActorId::new())),
            Err(DomainError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn skip_requires_override_and_only_moves_forward() {
        let booked = test_unit().with_status(UnitStatus::Booked).unwrap();
        let agent = Actor::agent(ActorId::new());
        let admin = Actor::admin(ActorId::new());

        assert!(booked.decide_advance(UnitStatus::SpaSigned, &agent).is_err());
        assert_eq!(
            booked.decide_advance(UnitStatus::SpaSigned, &admin),
            Ok(UnitMutation::Advance {
                to: UnitStatus::SpaSigned,
                skipped: true
            })
        );

        let signed = booked.with_status(UnitStatus::SpaSigned).unwrap();
        assert!(matches!(
            signed.decide_advance(UnitStatus::SpaPending, &admin),
            Err(DomainError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn advance_never_targets_hold_or_cancel_edges() {
        let admin = Actor::admin(ActorId::new());
        let unit = test_unit();
        for target in [
            UnitStatus::Available,
            UnitStatus::Reserved,
            UnitStatus::Cancelled,
        ] {
            assert!(matches!(
                unit.decide_advance(target, &admin),
                Err(DomainError::InvalidTransition { .. })
            ));
        }
    }

    #[test]
    fn cancel_requires_permission_and_non_terminal_status() {
        let unit = test_unit();
        assert_eq!(
            unit.decide_cancel(&Actor::agent(ActorId::new())),
            Err(DomainError::Unauthorized)
        );

        let admin = Actor::admin(ActorId::new());
        assert_eq!(unit.decide_cancel(&admin), Ok(UnitMutation::Cancel));

        let handed_over = test_unit().with_status(UnitStatus::HandedOver).unwrap();
        assert!(matches!(
            handed_over.decide_cancel(&admin),
            Err(DomainError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn reserved_units_cannot_be_seeded() {
        assert!(test_unit().with_status(UnitStatus::Reserved).is_err());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Reserve(usize, i64),
        Release(usize),
        Extend(usize, i64),
        Expire,
        Advance(usize),
        Cancel,
        Tick(i64),
    }

    fn any_op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0usize..3, 1i64..100).prop_map(|(a, t)| Op::Reserve(a, t)),
            (0usize..3).prop_map(Op::Release),
            (0usize..3, 1i64..100).prop_map(|(a, t)| Op::Extend(a, t)),
            Just(Op::Expire),
            (0usize..9).prop_map(Op::Advance),
            Just(Op::Cancel),
            (0i64..200).prop_map(Op::Tick),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: any sequence of accepted decisions keeps the holder
        /// invariants, moves only along the table and bumps the version by one.
        #[test]
        fn accepted_decisions_preserve_invariants(ops in prop::collection::vec(any_op(), 1..40)) {
            let actors: Vec<Actor> = vec![
                Actor::agent(ActorId::new()),
                Actor::agent(ActorId::new()),
                Actor::admin(ActorId::new()),
            ];
            let mut now = Utc::now();
            let mut unit = test_unit();

            for op in ops {
                let decided = match op {
                    Op::Reserve(a, mins) => unit.decide_reserve(actors[a].id, Duration::minutes(mins), now),
                    Op::Release(a) => unit.decide_release(&actors[a]),
                    Op::Extend(a, mins) => unit.decide_extend(actors[a].id, Duration::minutes(mins), now),
                    Op::Expire => unit.decide_expire(now),
                    Op::Advance(i) => unit.decide_advance(UnitStatus::ALL[i], &actors[2]),
                    Op::Cancel => unit.decide_cancel(&actors[2]),
                    Op::Tick(mins) => {
                        now += Duration::minutes(mins);
                        continue;
                    }
                };

                if let Ok(mutation) = decided {
                    let next = mutation.commit(&unit).unwrap();
                    prop_assert!(next.check_invariants().is_ok());
                    prop_assert_eq!(next.version(), unit.version() + 1);
                    if next.status() != unit.status() && !matches!(mutation, UnitMutation::Advance { skipped: true, .. }) {
                        prop_assert!(unit.status().can_transition_to(next.status()));
                    }
                    unit = next;
                }
            }
        }
    }
}
