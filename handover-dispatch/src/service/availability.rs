//! Per-operator supply summary for a lane.

use chrono::{DateTime, Duration, Utc};
use geo::Coord;
use handover_core::{
    Clock, LaneAnchor, Operator, OperatorBacklog, VehicleSnapshot, haversine_km,
};

use super::HandoverService;
use crate::recommend::{DISTANCE_KM, measure_within};
use crate::{Availability, DispatchError, NearbyVehicle, OperatorAvailability};

/// Oldest telemetry that still counts as available.
const AVAILABLE_TELEMETRY_HOURS: i64 = 4;
/// Smallest known battery level that counts as available.
const AVAILABLE_MIN_BATTERY_PCT: f64 = 20.0;
/// Vehicles listed per operator.
const NEAREST_LIMIT: usize = 6;

impl<C> HandoverService<C>
where
    C: Clock,
{
    /// Summarise every rostered operator's supply around a lane.
    ///
    /// A vehicle is available when it is `ACTIVE`, reported within the last
    /// four hours, and its battery is unknown or at least 20 %. Up to six
    /// available vehicles within `max_km` are listed, nearest first.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationKind::MeasureOutOfRange`](crate::ValidationKind::MeasureOutOfRange)
    /// unless `max_km` is within `0.5..=50`, or [`DispatchError::Internal`]
    /// when the store fails.
    pub fn availability(
        &self,
        lane_id: &str,
        requester_position: Option<Coord<f64>>,
        max_km: f64,
    ) -> Result<Availability, DispatchError> {
        measure_within("max_km", max_km, DISTANCE_KM)?;
        let now = self.now();
        let lane = self.recommender.resolver().resolve(lane_id, requester_position);
        let session = self.session()?;
        let operators = session
            .operators()?
            .into_iter()
            .map(|operator| {
                let vehicles = session.operator_vehicles(&operator.id)?;
                let backlog = session.backlog(&operator.id)?;
                Ok(summarise(operator, &vehicles, backlog, &lane, max_km, now))
            })
            .collect::<Result<Vec<_>, DispatchError>>()?;
        Ok(Availability {
            lane,
            operators,
            generated_at: now,
        })
    }
}

fn summarise(
    operator: Operator,
    vehicles: &[VehicleSnapshot],
    backlog: OperatorBacklog,
    lane: &LaneAnchor,
    max_km: f64,
    now: DateTime<Utc>,
) -> OperatorAvailability {
    let available: Vec<&VehicleSnapshot> = vehicles
        .iter()
        .filter(|vehicle| is_available(vehicle, now))
        .collect();
    let mut nearest: Vec<NearbyVehicle> = available
        .iter()
        .filter_map(|vehicle| {
            let distance_km = vehicle
                .position
                .map(|position| haversine_km(position, lane.position));
            if distance_km.is_some_and(|distance| distance > max_km) {
                return None;
            }
            Some(NearbyVehicle {
                vehicle_id: vehicle.id.clone(),
                registration_number: vehicle.registration_number.clone(),
                distance_km,
                battery_pct: vehicle.battery_pct,
                telemetry_at: vehicle.telemetry_at,
            })
        })
        .collect();
    nearest.sort_by(|a, b| {
        let key = |entry: &NearbyVehicle| entry.distance_km.unwrap_or(f64::INFINITY);
        key(a).total_cmp(&key(b))
    });
    nearest.truncate(NEAREST_LIMIT);

    OperatorAvailability {
        operator_id: operator.id,
        operator_name: operator.name,
        active_vehicles: vehicles.iter().filter(|vehicle| vehicle.is_active()).count(),
        available_vehicles: available.len(),
        backlog,
        nearest,
    }
}

fn is_available(vehicle: &VehicleSnapshot, now: DateTime<Utc>) -> bool {
    vehicle.is_active()
        && vehicle
            .telemetry_age(now)
            .is_some_and(|age| age <= Duration::hours(AVAILABLE_TELEMETRY_HOURS))
        && vehicle
            .battery_pct
            .is_none_or(|battery| battery >= AVAILABLE_MIN_BATTERY_PCT)
}
