//! Score vehicles against a lane anchor.
//!
//! The `VehicleScorer` trait turns a [`VehicleSnapshot`] into an explainable
//! [`ScoreCard`]. Scores live in `0.0..=100.0`; every adjustment leaves a
//! human-readable reason so assignments can be audited later.

use chrono::{DateTime, Utc};

use crate::{LaneAnchor, VehicleSnapshot};

/// Upper bound of a score.
pub const MAX_SCORE: f64 = 100.0;

/// Hard limits a vehicle must satisfy to be eligible.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MatchConstraints {
    /// Furthest acceptable distance from the lane anchor.
    pub max_distance_km: f64,
    /// Lowest acceptable battery level, in percent.
    pub min_battery_pct: f64,
    /// Oldest acceptable telemetry report, in minutes.
    pub max_telemetry_age_minutes: f64,
}

impl MatchConstraints {
    /// Build constraints from their three limits.
    #[must_use]
    pub const fn new(
        max_distance_km: f64,
        min_battery_pct: f64,
        max_telemetry_age_minutes: f64,
    ) -> Self {
        Self {
            max_distance_km,
            min_battery_pct,
            max_telemetry_age_minutes,
        }
    }
}

/// Explainable result of scoring one vehicle.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ScoreCard {
    /// Score in `0.0..=100.0`.
    pub score: f64,
    /// Distance to the anchor, when the vehicle position is known.
    pub distance_km: Option<f64>,
    /// Ordered reasons for every predicate and adjustment.
    pub reasons: Vec<String>,
    /// Whether every hard predicate passed.
    pub eligible: bool,
}

/// Calculate an eligibility verdict and score for a vehicle.
///
/// Implementations must be thread-safe (`Send` + `Sync`) and infallible:
/// missing telemetry is expressed through the card, never through an error.
///
/// Implementations must:
/// - Produce finite scores.
/// - Keep scores within `0.0..=100.0`.
///
/// Use [`VehicleScorer::sanitise`] to apply these guards.
pub trait VehicleScorer: Send + Sync {
    /// Score `vehicle` against `anchor` under `constraints` as of `now`.
    fn score(
        &self,
        vehicle: &VehicleSnapshot,
        anchor: &LaneAnchor,
        constraints: &MatchConstraints,
        now: DateTime<Utc>,
    ) -> ScoreCard;

    /// Clamp and validate a raw score.
    ///
    /// Returns `0.0` for non-finite values and clamps to `0.0..=100.0`.
    fn sanitise(score: f64) -> f64
    where
        Self: Sized,
    {
        if !score.is_finite() {
            return 0.0;
        }
        score.clamp(0.0, MAX_SCORE)
    }
}
