//! Read model of vehicles as reported by the fleet registry.

use chrono::{DateTime, Duration, Utc};
use geo::{Coord, Intersects, Rect};

use crate::labels::labelled_enum;

labelled_enum! {
    /// Operational status reported by the registry.
    pub enum VehicleStatus as "vehicle status" {
        /// In service and eligible for assignment.
        Active => "ACTIVE",
        /// Off the road for repairs.
        InMaintenance => "IN_MAINTENANCE",
        /// Retired or parked.
        Inactive => "INACTIVE",
    }
}

/// Point-in-time view of a vehicle used for scoring and assignment.
///
/// The engine never writes these fields; they arrive from the registry.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VehicleSnapshot {
    /// Registry identifier.
    pub id: String,
    /// Operator that owns the vehicle.
    pub operator_id: String,
    /// Number plate shown to riders and encoded in pickup codes.
    pub registration_number: String,
    /// Operational status.
    pub status: VehicleStatus,
    /// Last known position (`x = longitude`, `y = latitude`).
    pub position: Option<Coord<f64>>,
    /// Battery level in percent.
    pub battery_pct: Option<f64>,
    /// Time of the last telemetry report.
    pub telemetry_at: Option<DateTime<Utc>>,
    /// Registration time in the fleet registry.
    pub created_at: DateTime<Utc>,
}

impl VehicleSnapshot {
    /// Elapsed time since the last telemetry report, if any.
    ///
    /// Reports timestamped in the future count as fresh.
    #[must_use]
    pub fn telemetry_age(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.telemetry_at
            .map(|at| (now - at).max(Duration::zero()))
    }

    /// Whether the vehicle has a known position inside `bbox`.
    #[must_use]
    pub fn is_within(&self, bbox: &Rect<f64>) -> bool {
        // `Intersects` treats boundary points as inside the rectangle.
        self.position.is_some_and(|position| bbox.intersects(&position))
    }

    /// Whether the registry reports the vehicle as in service.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == VehicleStatus::Active
    }
}

/// Axis-aligned box of `half_lat`/`half_lon` degrees around `centre`.
#[must_use]
pub fn bounding_box(centre: Coord<f64>, half_lat: f64, half_lon: f64) -> Rect<f64> {
    Rect::new(
        Coord {
            x: centre.x - half_lon,
            y: centre.y - half_lat,
        },
        Coord {
            x: centre.x + half_lon,
            y: centre.y + half_lat,
        },
    )
}
