//! Core domain types for the handover engine.
//!
//! The engine matches riders' fulfillment requests on a demand lane to fleet
//! operators and vehicles, tracks each request through the operator inbox,
//! restricts riders with time-boxed commitments, and verifies the physical
//! vehicle handover.
//!
//! This crate holds the pieces every other crate shares: typed identifiers,
//! the lane anchor resolver, the inbox state machine, the commitment policy,
//! the scoring trait, and the SQLite-backed store.
//!
//! # Examples
//!
//! ```
//! use handover_core::RequestId;
//!
//! let id = RequestId::new();
//! let parsed: RequestId = id.to_string().parse().expect("round trip");
//! assert_eq!(parsed, id);
//! assert!(id.to_string().starts_with("req-"));
//! ```

#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod labels;

mod clock;
mod commitment;
mod fleet;
mod ids;
mod inbox;
mod lane;
mod request;
mod scorer;
mod store;
mod vehicle;

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-support")))]
pub mod test_support;

pub use clock::{Clock, FixedClock, SystemClock};
pub use commitment::{
    AccessAction, AccessReason, Commitment, CommitmentStatus, DEFAULT_CANCEL_REASON, LockMode,
    PolicyDecision,
};
pub use fleet::{
    FleetSnapshot, HubRecord, Operator, OperatorBacklog, OperatorRecord, Requester, VehicleRecord,
};
pub use ids::{CommitmentId, CommitmentMarker, Id, IdMarker, ParseIdError, RequestId, RequestMarker};
pub use inbox::{InboxRecord, InboxState, TransitionEffect, TransitionError};
pub use labels::ParseLabelError;
pub use lane::{
    AnchorSource, City, EARTH_RADIUS_KM, LaneAnchor, LaneAnchorResolver, haversine_km,
    stable_unit_interval,
};
pub use request::{FulfillmentRequest, PickupLocation, RequestStatus};
pub use scorer::{MAX_SCORE, MatchConstraints, ScoreCard, VehicleScorer};
pub use store::{OperatorRoster, VehicleRegistry};
#[cfg(feature = "store-sqlite")]
pub use store::{ImportSummary, SqliteStore, SqliteStoreError, StoreSession, StoreWriter};
pub use vehicle::{VehicleSnapshot, VehicleStatus, bounding_box};
