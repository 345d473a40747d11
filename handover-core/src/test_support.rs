//! In-memory registry and roster used by unit and behaviour tests.

use std::collections::HashMap;
use std::convert::Infallible;

use chrono::{DateTime, Utc};
use geo::Coord;

use crate::{
    Operator, OperatorBacklog, OperatorRoster, VehicleRegistry, VehicleSnapshot, VehicleStatus,
};

/// In-memory [`VehicleRegistry`] and [`OperatorRoster`].
///
/// Vehicles are returned in insertion order; the store performs no sorting.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    operators: Vec<Operator>,
    vehicles: Vec<VehicleSnapshot>,
    backlogs: HashMap<String, OperatorBacklog>,
}

impl MemoryStore {
    /// Register an operator with an empty backlog.
    #[must_use]
    pub fn with_operator(mut self, id: &str) -> Self {
        self.operators.push(Operator {
            id: id.to_owned(),
            name: id.to_owned(),
        });
        self
    }

    /// Add a vehicle snapshot.
    #[must_use]
    pub fn with_vehicle(mut self, vehicle: VehicleSnapshot) -> Self {
        self.vehicles.push(vehicle);
        self
    }

    /// Set the inbox backlog reported for `operator_id`.
    #[must_use]
    pub fn with_backlog(mut self, operator_id: &str, new: u32, contacted: u32) -> Self {
        self.backlogs
            .insert(operator_id.to_owned(), OperatorBacklog { new, contacted });
        self
    }
}

impl VehicleRegistry for MemoryStore {
    type Error = Infallible;

    fn recent_vehicles(&self, limit: usize) -> Result<Vec<VehicleSnapshot>, Self::Error> {
        Ok(self.vehicles.iter().take(limit).cloned().collect())
    }
}

impl OperatorRoster for MemoryStore {
    type Error = Infallible;

    fn operators(&self) -> Result<Vec<Operator>, Self::Error> {
        let mut operators = self.operators.clone();
        operators.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(operators)
    }

    fn backlog(&self, operator_id: &str) -> Result<OperatorBacklog, Self::Error> {
        Ok(self.backlogs.get(operator_id).copied().unwrap_or_default())
    }
}

/// Build an `ACTIVE` vehicle at `(lat, lon)` with fresh telemetry.
#[must_use]
pub fn active_vehicle(
    id: &str,
    operator_id: &str,
    lat: f64,
    lon: f64,
    battery_pct: f64,
    now: DateTime<Utc>,
) -> VehicleSnapshot {
    VehicleSnapshot {
        id: id.to_owned(),
        operator_id: operator_id.to_owned(),
        registration_number: format!("REG-{id}"),
        status: VehicleStatus::Active,
        position: Some(Coord { x: lon, y: lat }),
        battery_pct: Some(battery_pct),
        telemetry_at: Some(now),
        created_at: now,
    }
}
