//! Ranked recommendation entries and their ordering.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use handover_core::{ScoreCard, VehicleSnapshot, VehicleStatus};
use serde::Serialize;

/// One eligible vehicle with its balanced score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedVehicle {
    /// Registry identifier.
    pub vehicle_id: String,
    /// Number plate.
    pub registration_number: String,
    /// Owning operator.
    pub operator_id: String,
    /// Registry status at scoring time.
    pub status: VehicleStatus,
    /// Last telemetry report.
    pub telemetry_at: Option<DateTime<Utc>>,
    /// Battery level in percent.
    pub battery_pct: Option<f64>,
    /// Distance to the lane anchor.
    pub distance_km: Option<f64>,
    /// Score after the load penalty.
    pub score: f64,
    /// Ordered explanation of the score.
    pub reasons: Vec<String>,
}

impl RankedVehicle {
    /// Combine a snapshot with its score card.
    #[must_use]
    pub fn new(vehicle: &VehicleSnapshot, card: ScoreCard) -> Self {
        Self {
            vehicle_id: vehicle.id.clone(),
            registration_number: vehicle.registration_number.clone(),
            operator_id: vehicle.operator_id.clone(),
            status: vehicle.status,
            telemetry_at: vehicle.telemetry_at,
            battery_pct: vehicle.battery_pct,
            distance_km: card.distance_km,
            score: card.score,
            reasons: card.reasons,
        }
    }

    /// Distance used for ordering; unknown distances sort last.
    fn distance_key(&self) -> f64 {
        self.distance_km.unwrap_or(f64::INFINITY)
    }
}

/// Order by score descending, then distance ascending with unknown last.
///
/// The sort is stable, so equal entries keep their scan order.
pub fn rank(candidates: &mut [RankedVehicle]) {
    candidates.sort_by(compare);
}

fn compare(a: &RankedVehicle, b: &RankedVehicle) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.distance_key().total_cmp(&b.distance_key()))
}
