//! Property-based tests for vehicle scoring.
//!
//! # Invariants tested
//!
//! - **Score bounds:** scores stay within `0.0..=100.0` for any snapshot and
//!   constraints, before and after the load penalty.
//! - **Hard predicates:** a vehicle that is not `ACTIVE` or has no telemetry
//!   is never eligible, whatever its other attributes.
//! - **Load balancing:** the backlog penalty never changes eligibility and
//!   never exceeds its cap.

use chrono::{DateTime, Duration, Utc};
use geo::Coord;
use handover_core::{
    LaneAnchor, LaneAnchorResolver, MAX_SCORE, MatchConstraints, OperatorBacklog, VehicleScorer,
    VehicleSnapshot, VehicleStatus,
};
use handover_scorer::{CandidateScorer, LoadBalancer};
use proptest::prelude::*;

fn now() -> DateTime<Utc> {
    DateTime::from_timestamp(1_750_000_000, 0).expect("valid timestamp")
}

fn anchor() -> LaneAnchor {
    LaneAnchorResolver::default().resolve("store:PUNE:WAKAD", None)
}

fn status_strategy() -> impl Strategy<Value = VehicleStatus> {
    prop::sample::select(VehicleStatus::ALL.to_vec())
}

prop_compose! {
    fn vehicle_strategy()(
        status in status_strategy(),
        position in prop::option::of((72.0_f64..80.0, 12.0_f64..30.0)),
        battery_pct in prop::option::of(-10.0_f64..150.0),
        telemetry_minutes in prop::option::of(-30_i64..2_000),
    ) -> VehicleSnapshot {
        let now = now();
        VehicleSnapshot {
            id: "veh".into(),
            operator_id: "fleet".into(),
            registration_number: "MH12AB1234".into(),
            status,
            position: position.map(|(x, y)| Coord { x, y }),
            battery_pct,
            telemetry_at: telemetry_minutes.map(|m| now - Duration::minutes(m)),
            created_at: now,
        }
    }
}

prop_compose! {
    fn constraints_strategy()(
        max_distance_km in 0.0_f64..50.0,
        min_battery_pct in 0.0_f64..100.0,
        max_telemetry_age_minutes in 0.0_f64..600.0,
    ) -> MatchConstraints {
        MatchConstraints::new(max_distance_km, min_battery_pct, max_telemetry_age_minutes)
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Property: scores are finite and within bounds.
    #[test]
    fn scores_stay_in_bounds(
        vehicle in vehicle_strategy(),
        constraints in constraints_strategy(),
        new in 0_u32..50,
        contacted in 0_u32..50,
    ) {
        let card = CandidateScorer.score(&vehicle, &anchor(), &constraints, now());
        prop_assert!(card.score.is_finite());
        prop_assert!((0.0..=MAX_SCORE).contains(&card.score), "score {}", card.score);

        let eligible = card.eligible;
        let balanced = LoadBalancer::default().apply(card, OperatorBacklog { new, contacted });
        prop_assert!((0.0..=MAX_SCORE).contains(&balanced.score));
        prop_assert_eq!(balanced.eligible, eligible);
    }

    /// Property: status and telemetry presence are hard predicates.
    #[test]
    fn inactive_or_silent_vehicles_are_never_eligible(
        mut vehicle in vehicle_strategy(),
        constraints in constraints_strategy(),
        silent in any::<bool>(),
    ) {
        if silent {
            vehicle.telemetry_at = None;
        } else if vehicle.status == VehicleStatus::Active {
            vehicle.status = VehicleStatus::Inactive;
        }
        let card = CandidateScorer.score(&vehicle, &anchor(), &constraints, now());
        prop_assert!(!card.eligible, "reasons {:?}", card.reasons);
    }

    /// Property: the backlog penalty is capped.
    #[test]
    fn penalty_never_exceeds_cap(new in any::<u32>(), contacted in any::<u32>()) {
        let balancer = LoadBalancer::default();
        let penalty = balancer.penalty(OperatorBacklog { new, contacted });
        prop_assert!((0.0..=balancer.cap).contains(&penalty));
    }
}
