//! Inputs and results of [`HandoverService`](crate::HandoverService) operations.

use chrono::{DateTime, Utc};
use geo::Coord;
use handover_core::{
    InboxState, LaneAnchor, LockMode, MatchConstraints, OperatorBacklog, PickupLocation,
    RequestId, Requester,
};
use handover_scorer::RankedVehicle;
use serde::Serialize;

/// Parameters of a read-only recommendation.
#[derive(Debug, Clone, PartialEq)]
pub struct RecommendQuery {
    /// Lane the rider wants to work.
    pub lane_id: String,
    /// Rider position, when known.
    pub requester_position: Option<Coord<f64>>,
    /// Hard limits applied by the scorer.
    pub constraints: MatchConstraints,
    /// Number of vehicles to return; at least one is always requested.
    pub limit: usize,
}

/// Ranked vehicles for a lane.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    /// Resolved lane anchor.
    pub lane: LaneAnchor,
    /// Best vehicle, if any was eligible.
    pub recommended: Option<RankedVehicle>,
    /// Runners-up in rank order.
    pub alternatives: Vec<RankedVehicle>,
    /// Time the ranking was computed.
    pub generated_at: DateTime<Utc>,
}

/// A rider's request to open.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewRequest {
    /// Rider raising the request.
    pub requester_id: String,
    /// Lane the rider wants to work.
    pub lane_id: String,
    /// Preferred time window.
    pub time_window: Option<String>,
    /// Free-text requirements.
    pub requirements: Option<String>,
    /// Rider position, when known.
    pub requester_position: Option<Coord<f64>>,
    /// Operator chosen by the rider; recommended when absent.
    pub operator_id: Option<String>,
}

/// Assignment made (or found) by [`HandoverService::accept`](crate::HandoverService::accept).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AcceptOutcome {
    /// Inbox state after the call; always `ONBOARDED`.
    pub state: InboxState,
    /// Bound vehicle.
    pub matched_vehicle_id: String,
    /// Registration number of the bound vehicle.
    pub matched_vehicle_registration: String,
    /// Audit score recorded with the assignment.
    pub matched_score: Option<f64>,
    /// Audit reasons recorded with the assignment.
    pub matched_reasons: Option<Vec<String>>,
}

/// One request as shown in an operator inbox.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InboxItem {
    /// Request identifier.
    pub request_id: RequestId,
    /// Lane of the request.
    pub lane_id: String,
    /// Request creation time.
    pub created_at: DateTime<Utc>,
    /// Inbox state; `NEW` when no row was saved.
    pub state: InboxState,
    /// Operator note.
    pub note: Option<String>,
    /// Last inbox save.
    pub inbox_updated_at: Option<DateTime<Utc>>,
    /// Pickup hub.
    pub pickup_location: Option<PickupLocation>,
    /// Preferred time window.
    pub time_window: Option<String>,
    /// Free-text requirements.
    pub requirements: Option<String>,
    /// Vehicle recommended or bound.
    pub matched_vehicle_id: Option<String>,
    /// When the handover was verified.
    pub pickup_verified_at: Option<DateTime<Utc>>,
    /// Rider identity; only the identifier is known for unregistered riders.
    pub requester: Requester,
}

/// A commitment a rider makes to one operator and lane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitmentRequest {
    /// Rider making the commitment.
    pub requester_id: String,
    /// Operator the rider commits to.
    pub operator_id: String,
    /// Committed lane.
    pub lane_id: String,
    /// Length of the commitment in days, `1..=30`.
    pub min_days: i64,
    /// Restriction applied while the commitment is active.
    pub lock_mode: LockMode,
}

/// Outcome of a pickup verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PickupVerification {
    /// Verified request.
    pub request_id: RequestId,
    /// First successful verification time.
    pub verified_at: DateTime<Utc>,
    /// Actor who verified the handover.
    pub verified_by: Option<String>,
}

/// Supply summary for a lane.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Availability {
    /// Resolved lane anchor.
    pub lane: LaneAnchor,
    /// One entry per rostered operator.
    pub operators: Vec<OperatorAvailability>,
    /// Time the summary was computed.
    pub generated_at: DateTime<Utc>,
}

/// Supply of one operator near a lane.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperatorAvailability {
    /// Operator slug.
    pub operator_id: String,
    /// Operator display name.
    pub operator_name: String,
    /// Vehicles with registry status `ACTIVE`.
    pub active_vehicles: usize,
    /// Active vehicles with fresh telemetry and enough charge.
    pub available_vehicles: usize,
    /// Open inbox rows.
    pub backlog: OperatorBacklog,
    /// Nearest available vehicles within range; unknown distances last.
    pub nearest: Vec<NearbyVehicle>,
}

/// An available vehicle listed in an availability summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NearbyVehicle {
    /// Registry identifier.
    pub vehicle_id: String,
    /// Number plate.
    pub registration_number: String,
    /// Distance to the lane anchor, when the position is known.
    pub distance_km: Option<f64>,
    /// Battery level in percent.
    pub battery_pct: Option<f64>,
    /// Last telemetry report.
    pub telemetry_at: Option<DateTime<Utc>>,
}
