//! Read-only ranking of vehicles for a lane.

use std::collections::{HashMap, HashSet, hash_map::Entry};

use chrono::{DateTime, Utc};
use handover_core::{
    LaneAnchorResolver, OperatorBacklog, OperatorRoster, VehicleRegistry, VehicleScorer,
};
use handover_scorer::{CandidateScorer, LoadBalancer, RankedVehicle, rank};

use crate::{DispatchError, RecommendQuery, Recommendation, ValidationKind};

/// Accepted search radius, in km.
pub(crate) const DISTANCE_KM: (f64, f64) = (0.5, 50.0);
/// Accepted minimum battery level, in percent.
const BATTERY_PCT: (f64, f64) = (0.0, 100.0);
/// Accepted telemetry age, in minutes.
const TELEMETRY_AGE_MINUTES: (f64, f64) = (1.0, 1440.0);
/// Accepted number of returned vehicles.
const LIMIT: (i64, i64) = (1, 30);

impl RecommendQuery {
    /// Check the constraints and the limit against their accepted ranges.
    ///
    /// NaN and infinities are rejected along with out-of-range values.
    ///
    /// # Errors
    ///
    /// - [`ValidationKind::MeasureOutOfRange`] when `max_km` is outside
    ///   `0.5..=50`, the battery floor outside `0..=100` or the telemetry age
    ///   outside `1..=1440` minutes.
    /// - [`ValidationKind::OutOfRange`] when `limit` is outside `1..=30`.
    pub fn validate(&self) -> Result<(), ValidationKind> {
        let constraints = &self.constraints;
        measure_within("max_km", constraints.max_distance_km, DISTANCE_KM)?;
        measure_within("min_battery_pct", constraints.min_battery_pct, BATTERY_PCT)?;
        measure_within(
            "max_telemetry_age_min",
            constraints.max_telemetry_age_minutes,
            TELEMETRY_AGE_MINUTES,
        )?;
        let limit = i64::try_from(self.limit).unwrap_or(i64::MAX);
        let (min, max) = LIMIT;
        if (min..=max).contains(&limit) {
            return Ok(());
        }
        Err(ValidationKind::OutOfRange {
            field: "limit",
            value: limit,
            min,
            max,
        })
    }
}

pub(crate) fn measure_within(
    field: &'static str,
    value: f64,
    (min, max): (f64, f64),
) -> Result<(), ValidationKind> {
    if (min..=max).contains(&value) {
        return Ok(());
    }
    Err(ValidationKind::MeasureOutOfRange {
        field,
        value,
        min,
        max,
    })
}

/// Scores, balances, and ranks vehicles for a lane.
///
/// The recommender takes no locks and may observe stale state; callers that
/// commit an assignment re-validate inside their write transaction. Queries
/// are ranked as given; [`RecommendQuery::validate`] checks them first.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use handover_core::{LaneAnchorResolver, MatchConstraints, test_support::{MemoryStore, active_vehicle}};
/// use handover_dispatch::{RecommendQuery, Recommender};
///
/// let now = Utc::now();
/// let store = MemoryStore::default()
///     .with_operator("fleet")
///     .with_vehicle(active_vehicle("v1", "fleet", 18.5204, 73.8567, 80.0, now));
/// let recommender = Recommender::new(LaneAnchorResolver::default(), 1200);
/// let query = RecommendQuery {
///     lane_id: "store:PUNE:WAKAD".into(),
///     requester_position: None,
///     constraints: MatchConstraints::new(12.0, 20.0, 120.0),
///     limit: 3,
/// };
/// let ranked = recommender.recommend(&store, &store, &query, now).expect("in-memory store");
/// assert_eq!(ranked.recommended.map(|v| v.vehicle_id).as_deref(), Some("v1"));
/// ```
#[derive(Debug, Clone)]
pub struct Recommender<S = CandidateScorer>
where
    S: VehicleScorer,
{
    scorer: S,
    balancer: LoadBalancer,
    resolver: LaneAnchorResolver,
    scan_limit: usize,
}

impl Recommender<CandidateScorer> {
    /// Recommender using the standard scorer and load balancer.
    #[must_use]
    pub fn new(resolver: LaneAnchorResolver, scan_limit: usize) -> Self {
        Self::with_parts(CandidateScorer, LoadBalancer::default(), resolver, scan_limit)
    }
}

impl<S> Recommender<S>
where
    S: VehicleScorer,
{
    /// Recommender with an explicit scorer and balancer.
    #[must_use]
    pub const fn with_parts(
        scorer: S,
        balancer: LoadBalancer,
        resolver: LaneAnchorResolver,
        scan_limit: usize,
    ) -> Self {
        Self {
            scorer,
            balancer,
            resolver,
            scan_limit,
        }
    }

    /// Scorer used for eligibility and audit scores.
    #[must_use]
    pub const fn scorer(&self) -> &S {
        &self.scorer
    }

    /// Resolver used to anchor lanes.
    #[must_use]
    pub const fn resolver(&self) -> &LaneAnchorResolver {
        &self.resolver
    }

    /// Rank vehicles of rostered operators for `query.lane_id`.
    ///
    /// Scans up to the configured number of vehicles, newest first, drops
    /// ineligible ones, and applies the operator backlog penalty. The first
    /// ranked vehicle becomes `recommended`; at most `max(1, limit)` are
    /// returned in total.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Internal`] when the registry or roster fails.
    pub fn recommend<R, O>(
        &self,
        registry: &R,
        roster: &O,
        query: &RecommendQuery,
        now: DateTime<Utc>,
    ) -> Result<Recommendation, DispatchError>
    where
        R: VehicleRegistry,
        O: OperatorRoster,
    {
        let lane = self
            .resolver
            .resolve(&query.lane_id, query.requester_position);
        let rostered: HashSet<String> = roster
            .operators()
            .map_err(DispatchError::internal)?
            .into_iter()
            .map(|operator| operator.id)
            .collect();
        if rostered.is_empty() {
            return Ok(Recommendation {
                lane,
                recommended: None,
                alternatives: Vec::new(),
                generated_at: now,
            });
        }

        let vehicles = registry
            .recent_vehicles(self.scan_limit)
            .map_err(DispatchError::internal)?;
        let mut backlogs: HashMap<String, OperatorBacklog> = HashMap::new();
        let mut ranked = Vec::new();
        for vehicle in vehicles
            .iter()
            .filter(|vehicle| rostered.contains(&vehicle.operator_id))
        {
            let card = self
                .scorer
                .score(vehicle, &lane, &query.constraints, now);
            if !card.eligible {
                continue;
            }
            let backlog = match backlogs.entry(vehicle.operator_id.clone()) {
                Entry::Occupied(entry) => *entry.get(),
                Entry::Vacant(entry) => *entry.insert(
                    roster
                        .backlog(&vehicle.operator_id)
                        .map_err(DispatchError::internal)?,
                ),
            };
            ranked.push(RankedVehicle::new(vehicle, self.balancer.apply(card, backlog)));
        }
        log::debug!(
            "{} of {} scanned vehicles eligible for lane {}",
            ranked.len(),
            vehicles.len(),
            lane.lane_id
        );

        rank(&mut ranked);
        ranked.truncate(query.limit.max(1));
        let mut top = ranked.into_iter();
        Ok(Recommendation {
            lane,
            recommended: top.next(),
            alternatives: top.collect(),
            generated_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use handover_core::MatchConstraints;
    use handover_core::test_support::{MemoryStore, active_vehicle};
    use rstest::{fixture, rstest};

    const LANE: &str = "store:PUNE:WAKAD";

    #[fixture]
    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    fn query(limit: usize) -> RecommendQuery {
        RecommendQuery {
            lane_id: LANE.into(),
            requester_position: None,
            constraints: MatchConstraints::new(25.0, 20.0, 120.0),
            limit,
        }
    }

    fn recommender() -> Recommender {
        Recommender::new(LaneAnchorResolver::default(), 1200)
    }

    fn ids(recommendation: &Recommendation) -> Vec<String> {
        recommendation
            .recommended
            .iter()
            .chain(&recommendation.alternatives)
            .map(|vehicle| vehicle.vehicle_id.clone())
            .collect()
    }

    #[rstest]
    fn empty_roster_recommends_nothing(now: DateTime<Utc>) {
        let store = MemoryStore::default()
            .with_vehicle(active_vehicle("v1", "fleet", 18.52, 73.85, 90.0, now));
        let result = recommender()
            .recommend(&store, &store, &query(3), now)
            .expect("in-memory store");
        assert!(result.recommended.is_none());
        assert!(result.alternatives.is_empty());
        assert_eq!(result.lane.lane_id, LANE);
    }

    #[rstest]
    fn unrostered_and_ineligible_vehicles_are_dropped(now: DateTime<Utc>) {
        let mut stale = active_vehicle("stale", "fleet", 18.52, 73.85, 90.0, now);
        stale.telemetry_at = Some(now - Duration::hours(5));
        let store = MemoryStore::default()
            .with_operator("fleet")
            .with_vehicle(active_vehicle("ok", "fleet", 18.52, 73.85, 90.0, now))
            .with_vehicle(active_vehicle("stray", "ghost", 18.52, 73.85, 90.0, now))
            .with_vehicle(stale);
        let result = recommender()
            .recommend(&store, &store, &query(6), now)
            .expect("in-memory store");
        assert_eq!(ids(&result), ["ok"]);
    }

    #[rstest]
    fn busy_operators_rank_below_idle_ones(now: DateTime<Utc>) {
        let store = MemoryStore::default()
            .with_operator("busy")
            .with_operator("idle")
            .with_backlog("busy", 5, 0)
            .with_vehicle(active_vehicle("b1", "busy", 18.52, 73.85, 90.0, now))
            .with_vehicle(active_vehicle("i1", "idle", 18.52, 73.85, 90.0, now));
        let result = recommender()
            .recommend(&store, &store, &query(2), now)
            .expect("in-memory store");
        assert_eq!(ids(&result), ["i1", "b1"]);
        let busy = result.alternatives.first().expect("busy vehicle ranked");
        assert!(
            busy.reasons
                .last()
                .is_some_and(|reason| reason.starts_with("op_load:new=5,contacted=0"))
        );
    }

    #[rstest]
    #[case(0, 1)]
    #[case(1, 1)]
    #[case(2, 2)]
    #[case(10, 3)]
    fn limit_is_at_least_one(now: DateTime<Utc>, #[case] limit: usize, #[case] expected: usize) {
        let store = MemoryStore::default()
            .with_operator("fleet")
            .with_vehicle(active_vehicle("v1", "fleet", 18.52, 73.85, 90.0, now))
            .with_vehicle(active_vehicle("v2", "fleet", 18.53, 73.86, 70.0, now))
            .with_vehicle(active_vehicle("v3", "fleet", 18.54, 73.87, 50.0, now));
        let result = recommender()
            .recommend(&store, &store, &query(limit), now)
            .expect("in-memory store");
        assert_eq!(ids(&result).len(), expected);
    }
    #[rstest]
    #[case(MatchConstraints::new(f64::NAN, 20.0, 120.0), "max_km")]
    #[case(MatchConstraints::new(f64::INFINITY, 20.0, 120.0), "max_km")]
    #[case(MatchConstraints::new(0.4, 20.0, 120.0), "max_km")]
    #[case(MatchConstraints::new(50.1, 20.0, 120.0), "max_km")]
    #[case(MatchConstraints::new(8.0, -1.0, 120.0), "min_battery_pct")]
    #[case(MatchConstraints::new(8.0, f64::NAN, 120.0), "min_battery_pct")]
    #[case(MatchConstraints::new(8.0, 20.0, 0.5), "max_telemetry_age_min")]
    #[case(MatchConstraints::new(8.0, 20.0, 1441.0), "max_telemetry_age_min")]
    fn invalid_constraints_name_their_field(
        #[case] constraints: MatchConstraints,
        #[case] expected: &str,
    ) {
        let invalid = RecommendQuery {
            constraints,
            ..query(6)
        };
        match invalid.validate() {
            Err(ValidationKind::MeasureOutOfRange { field, .. }) => assert_eq!(field, expected),
            other => panic!("expected {expected} to be rejected, got {other:?}"),
        }
    }

    #[rstest]
    #[case(MatchConstraints::new(0.5, 0.0, 1.0), 1)]
    #[case(MatchConstraints::new(50.0, 100.0, 1440.0), 30)]
    fn range_edges_are_accepted(#[case] constraints: MatchConstraints, #[case] limit: usize) {
        let edge = RecommendQuery {
            constraints,
            ..query(limit)
        };
        assert_eq!(edge.validate(), Ok(()));
    }

    #[rstest]
    #[case(0)]
    #[case(31)]
    fn limits_outside_one_to_thirty_are_rejected(#[case] limit: usize) {
        assert!(matches!(
            query(limit).validate(),
            Err(ValidationKind::OutOfRange { field: "limit", .. })
        ));
    }
}
