//! Opening fulfillment requests.

use handover_core::{City, Clock, FulfillmentRequest, RequestStatus};

use super::HandoverService;
use crate::{ConflictKind, DispatchError, NewRequest, RecommendQuery};

impl<C> HandoverService<C>
where
    C: Clock,
{
    /// Persist a rider's request and route it to an operator.
    ///
    /// Without an explicit operator the request adopts the top recommendation
    /// (vehicle, audit score and reasons included) and its operator, falling
    /// back to the configured default operator. A routed request is `MATCHED`
    /// and picks up the operator's hub for the lane's city. The rider's
    /// active-request check runs inside the write transaction, so a rider
    /// racing from several processes still ends up with one active request.
    ///
    /// # Errors
    ///
    /// - [`ConflictKind::ActiveRequestExists`] when the rider already has an
    ///   active request.
    /// - [`DispatchError::NotFound`] when the named operator is unknown.
    /// - [`DispatchError::Validation`] when the configured request-time
    ///   constraints are out of range.
    /// - [`DispatchError::Internal`] when the store fails.
    pub fn create_request(&self, new: &NewRequest) -> Result<FulfillmentRequest, DispatchError> {
        let mut request =
            FulfillmentRequest::new(new.requester_id.as_str(), new.lane_id.as_str(), self.now());
        request.time_window.clone_from(&new.time_window);
        request.requirements.clone_from(&new.requirements);
        let recommended_operator = if new.operator_id.is_none() {
            self.adopt_recommendation(new, &mut request)?
        } else {
            None
        };
        request.operator_id = new
            .operator_id
            .clone()
            .or(recommended_operator)
            .or_else(|| self.config.default_operator.clone());

        let mut session = self.session()?;
        session.write(|writer| -> Result<_, DispatchError> {
            if let Some(existing) = writer.active_request(&new.requester_id)? {
                log::info!(
                    "requester {} already has active request {}",
                    new.requester_id,
                    existing.id
                );
                return Err(ConflictKind::ActiveRequestExists {
                    request_id: existing.id,
                }
                .into());
            }
            if let Some(operator_id) = new.operator_id.as_deref()
                && writer.operator(operator_id)?.is_none()
            {
                return Err(DispatchError::NotFound {
                    entity: "operator",
                    id: operator_id.to_owned(),
                });
            }
            if let Some(operator_id) = request.operator_id.as_deref() {
                let city = City::of_lane(&request.lane_id).unwrap_or(self.config.default_city);
                request.pickup_location = writer.pickup_hub(operator_id, city)?;
                request.status = RequestStatus::Matched;
            }
            writer.save_request(&request)?;
            Ok(())
        })?;
        log::info!(
            "created request {} for {} on {} (operator {})",
            request.id,
            request.requester_id,
            request.lane_id,
            request.operator_id.as_deref().unwrap_or("unassigned")
        );
        Ok(request)
    }

    /// Record the top recommendation on `request`; returns its operator.
    fn adopt_recommendation(
        &self,
        new: &NewRequest,
        request: &mut FulfillmentRequest,
    ) -> Result<Option<String>, DispatchError> {
        let recommendation = self.recommend(&RecommendQuery {
            lane_id: new.lane_id.clone(),
            requester_position: new.requester_position,
            constraints: self.config.request_constraints,
            limit: self.config.request_limit,
        })?;
        let Some(top) = recommendation.recommended else {
            log::debug!("no eligible vehicle to recommend for lane {}", new.lane_id);
            return Ok(None);
        };
        request.assigned_vehicle_id = Some(top.vehicle_id);
        request.assigned_score = Some(top.score);
        request.assigned_reasons = Some(top.reasons);
        Ok(Some(top.operator_id))
    }
}
