//! Fulfillment requests raised by riders against a lane.

use chrono::{DateTime, Utc};
use geo::Coord;

use crate::labels::labelled_enum;
use crate::{InboxState, RequestId};

labelled_enum! {
    /// Coarse request status kept alongside the inbox state.
    pub enum RequestStatus as "request status" {
        /// Persisted but not yet matched to an operator.
        Created => "CREATED",
        /// An operator has been chosen.
        Matched => "MATCHED",
        /// Withdrawn or declined.
        Rejected => "REJECTED",
    }
}

/// Where the rider collects the vehicle.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PickupLocation {
    /// Human-readable hub name.
    pub label: String,
    /// Hub position (`x = longitude`, `y = latitude`).
    pub position: Coord<f64>,
}

/// A rider's request to be matched to a vehicle on a lane.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FulfillmentRequest {
    /// Request identifier.
    pub id: RequestId,
    /// Rider who raised the request.
    pub requester_id: String,
    /// Lane the request targets.
    pub lane_id: String,
    /// Preferred time window, as entered by the rider.
    pub time_window: Option<String>,
    /// Free-text requirements.
    pub requirements: Option<String>,
    /// Operator handling the request, once matched.
    pub operator_id: Option<String>,
    /// Pickup hub chosen for the operator and lane city.
    pub pickup_location: Option<PickupLocation>,
    /// Vehicle bound to the request.
    pub assigned_vehicle_id: Option<String>,
    /// Audit score recorded with the assignment.
    pub assigned_score: Option<f64>,
    /// Audit reasons recorded with the assignment.
    pub assigned_reasons: Option<Vec<String>>,
    /// Time the physical handover was verified.
    pub pickup_verified_at: Option<DateTime<Utc>>,
    /// Actor who verified the handover.
    pub pickup_verified_by: Option<String>,
    /// Coarse status.
    pub status: RequestStatus,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl FulfillmentRequest {
    /// Create a fresh, unmatched request.
    #[must_use]
    pub fn new(
        requester_id: impl Into<String>,
        lane_id: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: RequestId::new(),
            requester_id: requester_id.into(),
            lane_id: lane_id.into(),
            time_window: None,
            requirements: None,
            operator_id: None,
            pickup_location: None,
            assigned_vehicle_id: None,
            assigned_score: None,
            assigned_reasons: None,
            pickup_verified_at: None,
            pickup_verified_by: None,
            status: RequestStatus::Created,
            created_at,
        }
    }

    /// Whether the request still blocks its rider from opening another.
    ///
    /// A request stays active until it is rejected (by status or inbox) or
    /// its pickup is verified.
    #[must_use]
    pub fn is_active(&self, inbox: Option<InboxState>) -> bool {
        self.status != RequestStatus::Rejected
            && self.pickup_verified_at.is_none()
            && inbox != Some(InboxState::Rejected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn request() -> FulfillmentRequest {
        FulfillmentRequest::new("rider-1", "store:PUNE:WAKAD", Utc::now())
    }

    #[rstest]
    #[case(None, true)]
    #[case(Some(InboxState::New), true)]
    #[case(Some(InboxState::Onboarded), true)]
    #[case(Some(InboxState::Rejected), false)]
    fn activity_follows_inbox_rejection(
        request: FulfillmentRequest,
        #[case] inbox: Option<InboxState>,
        #[case] active: bool,
    ) {
        assert_eq!(request.is_active(inbox), active);
    }

    #[rstest]
    fn verified_pickup_ends_activity(mut request: FulfillmentRequest) {
        request.pickup_verified_at = Some(Utc::now());
        assert!(!request.is_active(Some(InboxState::Onboarded)));
    }

    #[rstest]
    fn rejected_status_ends_activity(mut request: FulfillmentRequest) {
        request.status = RequestStatus::Rejected;
        assert!(!request.is_active(None));
    }
}
