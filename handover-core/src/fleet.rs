//! Operators, riders, and the fleet snapshot document used to seed a store.

use chrono::{DateTime, Utc};
use geo::Coord;

use crate::{City, VehicleSnapshot, VehicleStatus};

/// A tenant operating vehicles.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Operator {
    /// Slug identifier, e.g. `"fleet-east"`.
    pub id: String,
    /// Display name.
    pub name: String,
}

/// Rider identity as shown to operators.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Requester {
    /// Rider identifier.
    pub id: String,
    /// Name shown in operator inboxes.
    #[cfg_attr(feature = "serde", serde(default))]
    pub display_name: Option<String>,
    /// Contact number.
    #[cfg_attr(feature = "serde", serde(default))]
    pub phone: Option<String>,
}

/// Open inbox items for an operator, used for load balancing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct OperatorBacklog {
    /// Rows in `NEW`.
    pub new: u32,
    /// Rows in `CONTACTED`.
    pub contacted: u32,
}

/// Pickup hub an operator runs in a city.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HubRecord {
    /// City served by the hub.
    pub city: City,
    /// Hub name shown to riders.
    pub label: String,
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
}

/// Operator entry in a [`FleetSnapshot`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OperatorRecord {
    /// Slug identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Pickup hubs by city.
    #[cfg_attr(feature = "serde", serde(default))]
    pub hubs: Vec<HubRecord>,
}

/// Vehicle entry in a [`FleetSnapshot`] using explicit latitude/longitude.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VehicleRecord {
    /// Registry identifier.
    pub id: String,
    /// Owning operator.
    pub operator_id: String,
    /// Number plate; trimmed and upper-cased on import.
    pub registration_number: String,
    /// Operational status.
    pub status: VehicleStatus,
    /// Latitude in degrees.
    #[cfg_attr(feature = "serde", serde(default))]
    pub lat: Option<f64>,
    /// Longitude in degrees.
    #[cfg_attr(feature = "serde", serde(default))]
    pub lon: Option<f64>,
    /// Battery level in percent.
    #[cfg_attr(feature = "serde", serde(default))]
    pub battery_pct: Option<f64>,
    /// Last telemetry report.
    #[cfg_attr(feature = "serde", serde(default))]
    pub telemetry_at: Option<DateTime<Utc>>,
    /// Registration time.
    pub created_at: DateTime<Utc>,
}

impl From<VehicleRecord> for VehicleSnapshot {
    fn from(record: VehicleRecord) -> Self {
        let position = record
            .lat
            .zip(record.lon)
            .map(|(lat, lon)| Coord { x: lon, y: lat });
        Self {
            id: record.id,
            operator_id: record.operator_id,
            registration_number: record.registration_number.trim().to_uppercase(),
            status: record.status,
            position,
            battery_pct: record.battery_pct,
            telemetry_at: record.telemetry_at,
            created_at: record.created_at,
        }
    }
}

/// Registry export used to seed or refresh a store.
///
/// Stands in for the live registry and identity feeds.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FleetSnapshot {
    /// Operators and their hubs.
    #[cfg_attr(feature = "serde", serde(default))]
    pub operators: Vec<OperatorRecord>,
    /// Rider identities.
    #[cfg_attr(feature = "serde", serde(default))]
    pub requesters: Vec<Requester>,
    /// Vehicle snapshots.
    #[cfg_attr(feature = "serde", serde(default))]
    pub vehicles: Vec<VehicleRecord>,
}
