//! Explainable eligibility and scoring of one vehicle against a lane anchor.

use chrono::{DateTime, Duration, Utc};
use handover_core::{
    LaneAnchor, MAX_SCORE, MatchConstraints, ScoreCard, VehicleScorer, VehicleSnapshot,
    haversine_km,
};

/// Largest deduction for distance from the anchor.
const DISTANCE_WEIGHT: f64 = 55.0;
/// Flat deduction when the vehicle position is unknown.
const UNKNOWN_DISTANCE_PENALTY: f64 = 35.0;
/// Largest bonus for a full battery.
const BATTERY_WEIGHT: f64 = 18.0;
/// Flat deduction when the battery level is unknown.
const UNKNOWN_BATTERY_PENALTY: f64 = 8.0;
/// Largest deduction for stale telemetry; also applied when it is missing.
const TELEMETRY_WEIGHT: f64 = 18.0;

/// Default [`VehicleScorer`] used for recommendations and assignment audits.
///
/// Hard predicates (status, distance, battery, telemetry) decide eligibility;
/// bounded adjustments then move the score away from 100. Every predicate
/// that fails and every adjustment made appends a reason.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use handover_core::{
///     LaneAnchorResolver, MatchConstraints, VehicleScorer, VehicleSnapshot, VehicleStatus,
/// };
/// use handover_scorer::CandidateScorer;
///
/// let now = Utc::now();
/// let anchor = LaneAnchorResolver::default().resolve("store:PUNE:WAKAD", None);
/// let vehicle = VehicleSnapshot {
///     id: "veh-1".into(),
///     operator_id: "fleet".into(),
///     registration_number: "MH12AB1234".into(),
///     status: VehicleStatus::Active,
///     position: Some(anchor.position),
///     battery_pct: Some(100.0),
///     telemetry_at: Some(now),
///     created_at: now,
/// };
/// let card = CandidateScorer.score(&vehicle, &anchor, &MatchConstraints::new(8.0, 20.0, 120.0), now);
/// assert!(card.eligible);
/// assert!(card.score > 99.0);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct CandidateScorer;

impl VehicleScorer for CandidateScorer {
    fn score(
        &self,
        vehicle: &VehicleSnapshot,
        anchor: &LaneAnchor,
        constraints: &MatchConstraints,
        now: DateTime<Utc>,
    ) -> ScoreCard {
        let distance_km = vehicle
            .position
            .map(|position| haversine_km(position, anchor.position));
        let age_minutes = vehicle.telemetry_age(now).map(minutes);
        let mut reasons = Vec::new();
        let eligible = passes_hard_predicates(
            vehicle,
            distance_km,
            age_minutes,
            constraints,
            &mut reasons,
        );
        let raw = adjusted_score(vehicle, distance_km, age_minutes, constraints, &mut reasons);
        if !eligible {
            log::trace!("vehicle {} is ineligible: {reasons:?}", vehicle.id);
        }
        ScoreCard {
            score: Self::sanitise(raw),
            distance_km,
            reasons,
            eligible,
        }
    }
}

/// Evaluate every hard predicate, recording a reason for each one that fails.
fn passes_hard_predicates(
    vehicle: &VehicleSnapshot,
    distance_km: Option<f64>,
    age_minutes: Option<f64>,
    constraints: &MatchConstraints,
    reasons: &mut Vec<String>,
) -> bool {
    let mut eligible = true;

    if !vehicle.is_active() {
        eligible = false;
        reasons.push(format!("blocked:vehicle_status={}", vehicle.status));
    }

    match distance_km {
        Some(distance) if distance > constraints.max_distance_km => {
            eligible = false;
            reasons.push(format!(
                "blocked:distance>{:.1}km (≈{distance:.1}km)",
                constraints.max_distance_km
            ));
        }
        Some(_) => {}
        None => reasons.push("penalty:no_location".to_owned()),
    }

    match vehicle.battery_pct {
        Some(battery) if battery < constraints.min_battery_pct => {
            eligible = false;
            reasons.push(format!(
                "blocked:battery<{:.0}% ({battery:.0}%)",
                constraints.min_battery_pct
            ));
        }
        Some(_) => {}
        None => reasons.push("penalty:no_battery".to_owned()),
    }

    match age_minutes {
        Some(age) if age > constraints.max_telemetry_age_minutes => {
            eligible = false;
            reasons.push(format!(
                "blocked:telemetry_stale>{:.0}m (≈{age:.0}m)",
                constraints.max_telemetry_age_minutes
            ));
        }
        Some(_) => {}
        None => {
            eligible = false;
            reasons.push("blocked:no_telemetry".to_owned());
        }
    }

    eligible
}

/// Apply the bounded distance, battery, and telemetry adjustments.
#[expect(
    clippy::float_arithmetic,
    reason = "score components are fractional by construction"
)]
fn adjusted_score(
    vehicle: &VehicleSnapshot,
    distance_km: Option<f64>,
    age_minutes: Option<f64>,
    constraints: &MatchConstraints,
    reasons: &mut Vec<String>,
) -> f64 {
    let mut score = MAX_SCORE;

    if let Some(distance) = distance_km {
        let scale = constraints.max_distance_km.max(0.5);
        score -= (distance / scale * DISTANCE_WEIGHT).min(DISTANCE_WEIGHT);
        reasons.push(format!("distance≈{distance:.1}km"));
    } else {
        score -= UNKNOWN_DISTANCE_PENALTY;
    }

    if let Some(battery) = vehicle.battery_pct {
        let headroom = (MAX_SCORE - constraints.min_battery_pct).max(1.0);
        let bonus = ((battery - constraints.min_battery_pct) / headroom * BATTERY_WEIGHT)
            .clamp(0.0, BATTERY_WEIGHT);
        score += bonus;
        reasons.push(format!("battery≈{battery:.0}% (bonus +{bonus:.1})"));
    } else {
        score -= UNKNOWN_BATTERY_PENALTY;
    }

    if let Some(age) = age_minutes {
        let scale = constraints.max_telemetry_age_minutes.max(1.0);
        let penalty = (age / scale * TELEMETRY_WEIGHT).clamp(0.0, TELEMETRY_WEIGHT);
        score -= penalty;
        reasons.push(format!("telemetry_age≈{age:.0}m (penalty -{penalty:.1})"));
    } else {
        score -= TELEMETRY_WEIGHT;
    }

    score
}

#[expect(clippy::float_arithmetic, reason = "converting seconds to minutes")]
fn minutes(age: Duration) -> f64 {
    age.to_std()
        .map_or(0.0, |elapsed| elapsed.as_secs_f64() / 60.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Coord;
    use handover_core::{LaneAnchorResolver, VehicleStatus};
    use rstest::{fixture, rstest};

    #[fixture]
    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_750_000_000, 0).expect("valid timestamp")
    }

    #[fixture]
    fn anchor() -> LaneAnchor {
        LaneAnchorResolver::default().resolve("store:PUNE:WAKAD", None)
    }

    #[fixture]
    fn constraints() -> MatchConstraints {
        MatchConstraints::new(8.0, 20.0, 120.0)
    }

    fn vehicle_at(anchor: &LaneAnchor, now: DateTime<Utc>) -> VehicleSnapshot {
        VehicleSnapshot {
            id: "veh-1".into(),
            operator_id: "fleet".into(),
            registration_number: "MH12AB1234".into(),
            status: VehicleStatus::Active,
            position: Some(anchor.position),
            battery_pct: Some(60.0),
            telemetry_at: Some(now - Duration::minutes(30)),
            created_at: now,
        }
    }

    #[rstest]
    fn reasons_follow_predicates_then_adjustments(
        anchor: LaneAnchor,
        constraints: MatchConstraints,
        now: DateTime<Utc>,
    ) {
        let card = CandidateScorer.score(&vehicle_at(&anchor, now), &anchor, &constraints, now);
        assert!(card.eligible);
        assert_eq!(
            card.reasons,
            [
                "distance≈0.0km",
                "battery≈60% (bonus +9.0)",
                "telemetry_age≈30m (penalty -4.5)",
            ]
        );
        assert!((card.score - MAX_SCORE).abs() < 1e-9, "bonus should saturate at the cap");
    }

    #[rstest]
    fn unknown_position_and_battery_are_penalties_not_blocks(
        anchor: LaneAnchor,
        constraints: MatchConstraints,
        now: DateTime<Utc>,
    ) {
        let mut vehicle = vehicle_at(&anchor, now);
        vehicle.position = None;
        vehicle.battery_pct = None;
        vehicle.telemetry_at = Some(now);
        let card = CandidateScorer.score(&vehicle, &anchor, &constraints, now);
        assert!(card.eligible);
        assert_eq!(card.distance_km, None);
        assert_eq!(
            card.reasons.first().map(String::as_str),
            Some("penalty:no_location")
        );
        assert!((card.score - 57.0).abs() < 1e-9, "score {}", card.score);
    }

    #[rstest]
    #[case::inactive(|v: &mut VehicleSnapshot, _: DateTime<Utc>| v.status = VehicleStatus::InMaintenance, "blocked:vehicle_status=IN_MAINTENANCE")]
    #[case::far(|v: &mut VehicleSnapshot, _: DateTime<Utc>| v.position = Some(Coord { x: 77.2090, y: 28.6139 }), "blocked:distance>8.0km")]
    #[case::flat(|v: &mut VehicleSnapshot, _: DateTime<Utc>| v.battery_pct = Some(5.0), "blocked:battery<20% (5%)")]
    #[case::stale(|v: &mut VehicleSnapshot, now: DateTime<Utc>| v.telemetry_at = Some(now - Duration::hours(3)), "blocked:telemetry_stale>120m (≈180m)")]
    #[case::silent(|v: &mut VehicleSnapshot, _: DateTime<Utc>| v.telemetry_at = None, "blocked:no_telemetry")]
    fn each_hard_predicate_blocks_alone(
        anchor: LaneAnchor,
        constraints: MatchConstraints,
        now: DateTime<Utc>,
        #[case] mutate: fn(&mut VehicleSnapshot, DateTime<Utc>),
        #[case] reason: &str,
    ) {
        let mut vehicle = vehicle_at(&anchor, now);
        mutate(&mut vehicle, now);
        let card = CandidateScorer.score(&vehicle, &anchor, &constraints, now);
        assert!(!card.eligible);
        assert!(
            card.reasons.iter().any(|r| r.starts_with(reason)),
            "missing {reason} in {:?}",
            card.reasons
        );
        assert!((0.0..=MAX_SCORE).contains(&card.score));
    }

    #[rstest]
    fn missing_telemetry_costs_full_weight(
        anchor: LaneAnchor,
        constraints: MatchConstraints,
        now: DateTime<Utc>,
    ) {
        let mut vehicle = vehicle_at(&anchor, now);
        vehicle.battery_pct = Some(20.0);
        vehicle.telemetry_at = None;
        let card = CandidateScorer.score(&vehicle, &anchor, &constraints, now);
        assert!((card.score - 82.0).abs() < 1e-9, "score {}", card.score);
    }
}
