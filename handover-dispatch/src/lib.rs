//! Transactional orchestration for the handover engine.
//!
//! [`HandoverService`] ties the core types and the scorer to the SQLite
//! store. It recommends vehicles for a lane, opens requests, binds vehicles
//! on accept, drives the operator inbox, enforces rider commitments, and
//! verifies the physical handover with signed pickup codes.
//!
//! # Examples
//!
//! ```
//! use handover_core::{FleetSnapshot, SqliteStore};
//! use handover_dispatch::{HandoverService, ServiceConfig};
//!
//! let dir = tempfile::tempdir().expect("temporary directory");
//! let store = SqliteStore::open(dir.path().join("handover.db")).expect("open store");
//! let service = HandoverService::new(store, ServiceConfig::default());
//! let summary = service.import_fleet(&FleetSnapshot::default()).expect("import");
//! assert_eq!(summary.vehicles, 0);
//! ```

#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod config;
mod error;
mod pickup;
mod recommend;
mod service;
mod views;

pub use config::{MAX_COMMITMENT_DAYS, MIN_COMMITMENT_DAYS, ServiceConfig};
pub use error::{ConflictKind, DispatchError, ValidationKind};
pub use pickup::{PickupCode, PickupKeyError, PickupSigner};
pub use recommend::Recommender;
pub use service::HandoverService;
pub use views::{
    AcceptOutcome, Availability, CommitmentRequest, InboxItem, NearbyVehicle, NewRequest,
    OperatorAvailability, PickupVerification, RecommendQuery, Recommendation,
};
