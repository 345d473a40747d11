//! Error taxonomy for dispatch operations.

use handover_core::{CommitmentId, InboxState, RequestId, SqliteStoreError, TransitionError};
use thiserror::Error;

/// Failures raised by [`HandoverService`](crate::HandoverService).
///
/// Every variant except [`DispatchError::Internal`] describes a business
/// outcome the caller can act on; none are retried internally.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A referenced entity does not exist.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Kind of entity, e.g. `"request"`.
        entity: &'static str,
        /// Identifier that was looked up.
        id: String,
    },
    /// The request conflicts with current state.
    #[error(transparent)]
    Conflict(#[from] ConflictKind),
    /// The input is malformed or the move is illegal.
    #[error(transparent)]
    Validation(#[from] ValidationKind),
    /// The acting operator does not own the request.
    #[error("operator {operator_id} may not act on request {request_id}")]
    Authorization {
        /// Operator that attempted the action.
        operator_id: String,
        /// Request owned by another operator.
        request_id: RequestId,
    },
    /// The store failed.
    #[error("storage failure")]
    Internal(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl DispatchError {
    pub(crate) fn request_not_found(id: &RequestId) -> Self {
        Self::NotFound {
            entity: "request",
            id: id.to_string(),
        }
    }

    pub(crate) fn commitment_not_found(id: &CommitmentId) -> Self {
        Self::NotFound {
            entity: "commitment",
            id: id.to_string(),
        }
    }

    pub(crate) fn internal<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Internal(Box::new(source))
    }
}

impl From<SqliteStoreError> for DispatchError {
    fn from(source: SqliteStoreError) -> Self {
        Self::internal(source)
    }
}

/// Conflicts with current state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConflictKind {
    /// The rider already has an active request.
    #[error("requester already has active request {request_id}")]
    ActiveRequestExists {
        /// The request that is still active.
        request_id: RequestId,
    },
    /// Every candidate vehicle was bound to another request, or none existed.
    #[error("no available vehicle for request {request_id}")]
    NoAvailableVehicle {
        /// Request being accepted.
        request_id: RequestId,
    },
    /// Pickup was attempted before the request was onboarded.
    #[error("request {request_id} is {state}, not ONBOARDED")]
    NotOnboarded {
        /// Request being verified.
        request_id: RequestId,
        /// Its current inbox state.
        state: InboxState,
    },
    /// The vehicle is already bound to another onboarded request.
    #[error("vehicle {vehicle_id} is already bound to request {bound_to}")]
    VehicleAlreadyBound {
        /// Contested vehicle.
        vehicle_id: String,
        /// Request currently holding the vehicle.
        bound_to: RequestId,
    },
    /// The request has not been routed to an operator.
    #[error("request {request_id} has no operator")]
    OperatorUnassigned {
        /// Request without an operator.
        request_id: RequestId,
    },
}

/// Malformed input or illegal transitions.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationKind {
    /// The inbox transition table has no entry for the move.
    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),
    /// The entered pickup code did not match.
    #[error("pickup code does not match request {request_id}")]
    PickupCodeMismatch {
        /// Request being verified.
        request_id: RequestId,
    },
    /// A numeric parameter fell outside its accepted range.
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        /// Parameter name.
        field: &'static str,
        /// Value supplied.
        value: i64,
        /// Smallest accepted value.
        min: i64,
        /// Largest accepted value.
        max: i64,
    },
    /// A measured limit was not finite or fell outside its accepted range.
    #[error("{field} must be between {min} and {max}, got {value}")]
    MeasureOutOfRange {
        /// Parameter name.
        field: &'static str,
        /// Value supplied.
        value: f64,
        /// Smallest accepted value.
        min: f64,
        /// Largest accepted value.
        max: f64,
    },
}
