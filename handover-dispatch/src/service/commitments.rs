//! Commitment policy: issuing, checking, and cancelling restrictions.

use chrono::{DateTime, Duration, Utc};
use handover_core::{
    AccessAction, Clock, Commitment, CommitmentId, CommitmentStatus, DEFAULT_CANCEL_REASON,
    FulfillmentRequest, LockMode, PolicyDecision,
};

use super::HandoverService;
use crate::{
    CommitmentRequest, DispatchError, MAX_COMMITMENT_DAYS, MIN_COMMITMENT_DAYS, ValidationKind,
};

impl<C> HandoverService<C>
where
    C: Clock,
{
    /// Record a rider's commitment to an operator and lane.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationKind::OutOfRange`] unless `min_days` is within
    /// `1..=30`, or [`DispatchError::Internal`] when the store fails.
    pub fn create_commitment(
        &self,
        request: &CommitmentRequest,
    ) -> Result<Commitment, DispatchError> {
        let length = commitment_length("min_days", request.min_days)?;
        let commitment = new_commitment(
            &request.requester_id,
            &request.operator_id,
            &request.lane_id,
            length,
            request.lock_mode,
            self.now(),
        );
        self.session()?
            .write(|writer| writer.save_commitment(&commitment))?;
        log::info!(
            "requester {} committed to {} on {} until {}",
            commitment.requester_id,
            commitment.operator_id,
            commitment.lane_id,
            commitment.ends_at
        );
        Ok(commitment)
    }

    /// The rider's most recent commitment in force now.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Internal`] when the store fails.
    pub fn active_commitment(
        &self,
        requester_id: &str,
    ) -> Result<Option<Commitment>, DispatchError> {
        let now = self.now();
        Ok(self
            .session()?
            .active_commitments(requester_id)?
            .into_iter()
            .find(|commitment| commitment.is_active_at(now)))
    }

    /// Decide whether the rider may perform `action`.
    ///
    /// Riders without an active commitment are always allowed.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Internal`] when the store fails.
    pub fn check_access(
        &self,
        requester_id: &str,
        action: &AccessAction,
    ) -> Result<PolicyDecision, DispatchError> {
        let active = self.active_commitment(requester_id)?;
        Ok(PolicyDecision::evaluate(active.as_ref(), action))
    }

    /// Cancel a commitment; cancelling a non-active one changes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::NotFound`] for unknown commitments, or
    /// [`DispatchError::Internal`] when the store fails.
    pub fn cancel_commitment(
        &self,
        commitment_id: &CommitmentId,
        reason: Option<&str>,
    ) -> Result<Commitment, DispatchError> {
        let mut session = self.session()?;
        session.write(|writer| -> Result<_, DispatchError> {
            let mut commitment = writer
                .commitment(commitment_id)?
                .ok_or_else(|| DispatchError::commitment_not_found(commitment_id))?;
            if commitment.status != CommitmentStatus::Active {
                log::debug!("commitment {commitment_id} already {}", commitment.status);
                return Ok(commitment);
            }
            commitment.status = CommitmentStatus::Cancelled;
            commitment.cancelled_at = Some(self.now());
            commitment.cancel_reason = Some(reason.unwrap_or(DEFAULT_CANCEL_REASON).to_owned());
            writer.save_commitment(&commitment)?;
            log::info!("cancelled commitment {commitment_id}");
            Ok(commitment)
        })
    }

    /// Commitment issued when `request` first enters `ONBOARDED`.
    ///
    /// Fails with [`ValidationKind::OutOfRange`] when the configured length
    /// is outside `1..=30` days.
    pub(super) fn onboarding_commitment(
        &self,
        request: &FulfillmentRequest,
        operator_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Commitment, DispatchError> {
        let days = i64::from(self.config.commitment_days);
        let length = commitment_length("commitment_days", days)?;
        Ok(new_commitment(
            &request.requester_id,
            operator_id,
            &request.lane_id,
            length,
            self.config.commitment_lock_mode,
            now,
        ))
    }
}

fn commitment_length(field: &'static str, days: i64) -> Result<Duration, ValidationKind> {
    let (min, max) = (
        i64::from(MIN_COMMITMENT_DAYS),
        i64::from(MAX_COMMITMENT_DAYS),
    );
    if (min..=max).contains(&days) {
        return Ok(Duration::days(days));
    }
    Err(ValidationKind::OutOfRange {
        field,
        value: days,
        min,
        max,
    })
}

fn new_commitment(
    requester_id: &str,
    operator_id: &str,
    lane_id: &str,
    length: Duration,
    lock_mode: LockMode,
    now: DateTime<Utc>,
) -> Commitment {
    Commitment {
        id: CommitmentId::new(),
        requester_id: requester_id.to_owned(),
        operator_id: operator_id.to_owned(),
        lane_id: lane_id.to_owned(),
        lock_mode,
        status: CommitmentStatus::Active,
        starts_at: now,
        ends_at: now + length,
        created_at: now,
        cancelled_at: None,
        cancel_reason: None,
    }
}
