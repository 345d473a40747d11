//! Time-boxed restrictions on a rider's access to further demand.

use chrono::{DateTime, Utc};

use crate::CommitmentId;
use crate::labels::labelled_enum;

labelled_enum! {
    /// What a commitment restricts.
    pub enum LockMode as "lock mode" {
        /// Demand remains visible, but only for the committed lane.
        RestrictToLane => "RESTRICT_TO_LANE",
        /// No demand is visible until the commitment ends.
        HideAllDemand => "HIDE_ALL_DEMAND",
    }
}

labelled_enum! {
    /// Lifecycle of a commitment.
    pub enum CommitmentStatus as "commitment status" {
        /// In force while its window contains the current time.
        Active => "ACTIVE",
        /// Withdrawn by an administrator.
        Cancelled => "CANCELLED",
        /// Ran to completion.
        Completed => "COMPLETED",
    }
}

/// Reason recorded when an administrator cancels without giving one.
pub const DEFAULT_CANCEL_REASON: &str = "ADMIN_CANCEL";

/// A rider's commitment to one operator and lane.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Commitment {
    /// Commitment identifier.
    pub id: CommitmentId,
    /// Rider bound by the commitment.
    pub requester_id: String,
    /// Operator the rider committed to.
    pub operator_id: String,
    /// Lane the rider committed to.
    pub lane_id: String,
    /// Restriction applied while active.
    pub lock_mode: LockMode,
    /// Lifecycle status.
    pub status: CommitmentStatus,
    /// Start of the window (inclusive).
    pub starts_at: DateTime<Utc>,
    /// End of the window (exclusive).
    pub ends_at: DateTime<Utc>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Time of administrative cancellation.
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Reason given for cancellation.
    pub cancel_reason: Option<String>,
}

impl Commitment {
    /// Whether the commitment is in force at `now`.
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.status == CommitmentStatus::Active && self.starts_at <= now && now < self.ends_at
    }
}

/// Actions gated by commitments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessAction {
    /// Browse open demand.
    ViewDemand,
    /// Any other action; commitments never restrict these.
    Other(String),
}

impl AccessAction {
    /// Parse an action name; unknown names become [`AccessAction::Other`].
    #[must_use]
    pub fn parse(name: &str) -> Self {
        if name.trim().eq_ignore_ascii_case("VIEW_DEMAND") {
            Self::ViewDemand
        } else {
            Self::Other(name.trim().to_owned())
        }
    }
}

/// Machine-readable reason attached to a [`PolicyDecision`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum AccessReason {
    /// Demand is hidden until the commitment ends.
    CommitmentLocked,
    /// Demand is limited to the committed lane.
    CommitmentRestrictedToLane,
}

/// Outcome of an access check.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PolicyDecision {
    /// Whether the action may proceed.
    pub allowed: bool,
    /// Why the decision is restricted, if it is.
    pub reason: Option<AccessReason>,
    /// When the governing commitment ends.
    pub unlock_at: Option<DateTime<Utc>>,
    /// Only lane visible under a lane restriction.
    pub allowed_lane_id: Option<String>,
}

impl PolicyDecision {
    /// Unrestricted access.
    #[must_use]
    pub const fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
            unlock_at: None,
            allowed_lane_id: None,
        }
    }

    /// Decide `action` for a rider whose active commitment, if any, is
    /// `active`.
    ///
    /// Without an active commitment access is granted.
    #[must_use]
    pub fn evaluate(active: Option<&Commitment>, action: &AccessAction) -> Self {
        let (Some(commitment), AccessAction::ViewDemand) = (active, action) else {
            return Self::allow();
        };
        match commitment.lock_mode {
            LockMode::HideAllDemand => Self {
                allowed: false,
                reason: Some(AccessReason::CommitmentLocked),
                unlock_at: Some(commitment.ends_at),
                allowed_lane_id: None,
            },
            LockMode::RestrictToLane => Self {
                allowed: true,
                reason: Some(AccessReason::CommitmentRestrictedToLane),
                unlock_at: Some(commitment.ends_at),
                allowed_lane_id: Some(commitment.lane_id.clone()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rstest::{fixture, rstest};

    #[fixture]
    fn commitment() -> Commitment {
        let start = Utc
            .with_ymd_and_hms(2025, 3, 1, 10, 0, 0)
            .single()
            .expect("valid timestamp");
        Commitment {
            id: CommitmentId::new(),
            requester_id: "rider-1".into(),
            operator_id: "fleet".into(),
            lane_id: "store:PUNE:WAKAD".into(),
            lock_mode: LockMode::HideAllDemand,
            status: CommitmentStatus::Active,
            starts_at: start,
            ends_at: start + Duration::days(5),
            created_at: start,
            cancelled_at: None,
            cancel_reason: None,
        }
    }

    #[rstest]
    fn window_is_half_open(commitment: Commitment) {
        assert!(commitment.is_active_at(commitment.starts_at));
        assert!(commitment.is_active_at(commitment.ends_at - Duration::seconds(1)));
        assert!(!commitment.is_active_at(commitment.ends_at));
        assert!(!commitment.is_active_at(commitment.starts_at - Duration::seconds(1)));
    }

    #[rstest]
    fn cancelled_commitments_are_never_active(mut commitment: Commitment) {
        commitment.status = CommitmentStatus::Cancelled;
        assert!(!commitment.is_active_at(commitment.starts_at));
    }

    #[rstest]
    fn hide_all_demand_denies_viewing(commitment: Commitment) {
        let decision = PolicyDecision::evaluate(Some(&commitment), &AccessAction::ViewDemand);
        assert!(!decision.allowed);
        assert_eq!(decision.reason, Some(AccessReason::CommitmentLocked));
        assert_eq!(decision.unlock_at, Some(commitment.ends_at));
    }

    #[rstest]
    fn lane_restriction_allows_one_lane(mut commitment: Commitment) {
        commitment.lock_mode = LockMode::RestrictToLane;
        let decision = PolicyDecision::evaluate(Some(&commitment), &AccessAction::ViewDemand);
        assert!(decision.allowed);
        assert_eq!(decision.allowed_lane_id.as_deref(), Some("store:PUNE:WAKAD"));
        assert_eq!(decision.unlock_at, Some(commitment.ends_at));
    }

    #[rstest]
    #[case("view_demand", AccessAction::ViewDemand)]
    #[case("CREATE_REQUEST", AccessAction::Other("CREATE_REQUEST".into()))]
    fn actions_parse_leniently(#[case] name: &str, #[case] expected: AccessAction) {
        assert_eq!(AccessAction::parse(name), expected);
    }

    #[rstest]
    fn other_actions_are_never_restricted(commitment: Commitment) {
        let decision =
            PolicyDecision::evaluate(Some(&commitment), &AccessAction::parse("CREATE_REQUEST"));
        assert_eq!(decision, PolicyDecision::allow());
    }
}
