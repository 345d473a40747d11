//! Vehicle scoring for the handover engine.
//!
//! The crate provides three pieces used by the dispatch service:
//! - [`CandidateScorer`] implements
//!   [`VehicleScorer`](handover_core::VehicleScorer): hard eligibility
//!   predicates plus a bounded, explainable 0–100 score.
//! - [`LoadBalancer`] lowers scores for operators with a busy inbox so demand
//!   is not concentrated on one tenant.
//! - [`rank`] orders [`RankedVehicle`] entries for presentation.
//!
//! # Examples
//!
//! ```
//! use handover_core::{OperatorBacklog, ScoreCard};
//! use handover_scorer::LoadBalancer;
//!
//! let card = ScoreCard { score: 90.0, distance_km: Some(2.0), reasons: Vec::new(), eligible: true };
//! let balanced = LoadBalancer::default().apply(card, OperatorBacklog { new: 1, contacted: 0 });
//! assert_eq!(balanced.score, 88.4);
//! ```

#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod balance;
mod candidate;
mod ranking;

pub use balance::LoadBalancer;
pub use candidate::CandidateScorer;
pub use ranking::{RankedVehicle, rank};
