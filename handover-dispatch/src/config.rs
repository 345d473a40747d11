//! Tunables for [`HandoverService`](crate::HandoverService).

use handover_core::{City, LockMode, MatchConstraints};

/// Shortest accepted commitment, in days.
pub const MIN_COMMITMENT_DAYS: u32 = 1;
/// Longest accepted commitment, in days.
pub const MAX_COMMITMENT_DAYS: u32 = 30;

/// Service configuration.
///
/// `Default` matches production behaviour; only the pickup secret is
/// expected to change between deployments.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    /// Key used to sign pickup codes.
    pub pickup_secret: String,
    /// Length of commitments created on onboarding, in days; accepted within
    /// [`MIN_COMMITMENT_DAYS`]`..=`[`MAX_COMMITMENT_DAYS`].
    pub commitment_days: u32,
    /// Restriction applied by commitments created on onboarding.
    pub commitment_lock_mode: LockMode,
    /// Limits used to audit the vehicle chosen by `accept`.
    pub accept_constraints: MatchConstraints,
    /// Limits used for the recommendation made when a request is created.
    pub request_constraints: MatchConstraints,
    /// Number of vehicles recommended when a request is created.
    pub request_limit: usize,
    /// Most vehicles scanned by one recommendation.
    pub scan_limit: usize,
    /// Half height of the city bounding box, in degrees latitude.
    pub bbox_half_lat: f64,
    /// Half width of the city bounding box, in degrees longitude.
    pub bbox_half_lon: f64,
    /// Operator used when neither the caller nor the recommendation names one.
    pub default_operator: Option<String>,
    /// City assumed for lanes that do not name a known one.
    pub default_city: City,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            pickup_secret: "change-me".to_owned(),
            commitment_days: 5,
            commitment_lock_mode: LockMode::HideAllDemand,
            accept_constraints: MatchConstraints::new(12.0, 20.0, 240.0),
            request_constraints: MatchConstraints::new(8.0, 20.0, 120.0),
            request_limit: 6,
            scan_limit: 1200,
            bbox_half_lat: 0.55,
            bbox_half_lon: 0.70,
            default_operator: None,
            default_city: City::Pune,
        }
    }
}
