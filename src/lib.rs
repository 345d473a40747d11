//! Facade crate for the handover engine.
//!
//! This crate re-exports the core domain types and the vehicle scorer, and
//! exposes the SQLite store and the transactional dispatch service behind
//! feature flags.

#![forbid(unsafe_code)]

pub use handover_core::{
    AccessAction, AccessReason, Clock, Commitment, CommitmentId, CommitmentStatus, FleetSnapshot,
    FulfillmentRequest, InboxState, LaneAnchor, LaneAnchorResolver, LockMode, MatchConstraints,
    OperatorRoster, PolicyDecision, RequestId, ScoreCard, SystemClock, VehicleRegistry,
    VehicleScorer, VehicleSnapshot, VehicleStatus,
};
pub use handover_scorer::{CandidateScorer, LoadBalancer, RankedVehicle, rank};

#[cfg(feature = "store-sqlite")]
pub use handover_core::{SqliteStore, SqliteStoreError};

#[cfg(feature = "dispatch")]
pub use handover_dispatch::{DispatchError, HandoverService, ServiceConfig};
