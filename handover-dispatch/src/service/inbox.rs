//! Operator inbox: manual transitions and listings.

use handover_core::{
    Clock, FulfillmentRequest, InboxRecord, InboxState, RequestId, Requester, StoreSession,
    TransitionEffect,
};

use super::{HandoverService, authorize, load_request};
use crate::{ConflictKind, DispatchError, InboxItem, ValidationKind};

impl<C> HandoverService<C>
where
    C: Clock,
{
    /// Move a request to `state` in the operator's inbox.
    ///
    /// Saving the current state again only refreshes the note and timestamp.
    /// Entering `ONBOARDED` binds the request's vehicle, if it has one, and
    /// issues a commitment. The current state and the vehicle binding are
    /// read inside the write transaction.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::NotFound`] for unknown requests.
    /// - [`DispatchError::Authorization`] when `operator_id` does not own the
    ///   request.
    /// - [`ValidationKind::InvalidTransition`] for moves absent from the
    ///   transition table.
    /// - [`ConflictKind::VehicleAlreadyBound`] when onboarding would bind a
    ///   vehicle held by another onboarded request.
    /// - [`ValidationKind::OutOfRange`] when onboarding with a configured
    ///   commitment length outside `1..=30` days.
    pub fn set_inbox_state(
        &self,
        operator_id: &str,
        request_id: &RequestId,
        state: InboxState,
        note: Option<&str>,
    ) -> Result<InboxRecord, DispatchError> {
        let mut session = self.session()?;
        let (previous, record) = session.write(|writer| -> Result<_, DispatchError> {
            let request = load_request(writer, request_id)?;
            authorize(&request, operator_id)?;
            let previous = writer
                .inbox(operator_id, request_id)?
                .map_or(InboxState::New, |record| record.state);
            let effect = previous
                .transition_to(state)
                .map_err(ValidationKind::from)?;

            let now = self.now();
            let record = InboxRecord {
                operator_id: operator_id.to_owned(),
                request_id: *request_id,
                state,
                note: note.map(str::to_owned),
                updated_at: now,
            };
            if effect == TransitionEffect::Onboard {
                ensure_vehicle_free(writer, &request, operator_id)?;
                writer.save_commitment(&self.onboarding_commitment(&request, operator_id, now)?)?;
            }
            writer.save_inbox(&record)?;
            Ok((previous, record))
        })?;
        log::info!("request {request_id} moved from {previous} to {state} by {operator_id}");
        Ok(record)
    }

    /// Requests routed to `operator_id`, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Internal`] when the store fails.
    pub fn list_inbox(
        &self,
        operator_id: &str,
        limit: usize,
    ) -> Result<Vec<InboxItem>, DispatchError> {
        let session = self.session()?;
        session
            .operator_requests(operator_id, limit)?
            .into_iter()
            .map(|request| inbox_item(&session, operator_id, request))
            .collect()
    }

    /// One request of the operator's inbox.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::NotFound`] for unknown requests and
    /// [`DispatchError::Authorization`] for requests of other operators.
    pub fn inbox_detail(
        &self,
        operator_id: &str,
        request_id: &RequestId,
    ) -> Result<InboxItem, DispatchError> {
        let session = self.session()?;
        let request = load_request(&session, request_id)?;
        authorize(&request, operator_id)?;
        inbox_item(&session, operator_id, request)
    }
}

/// Fail if the request's vehicle is bound to another onboarded request.
fn ensure_vehicle_free(
    session: &StoreSession,
    request: &FulfillmentRequest,
    operator_id: &str,
) -> Result<(), DispatchError> {
    let Some(vehicle_id) = request.assigned_vehicle_id.as_deref() else {
        return Ok(());
    };
    if let Some(bound_to) = session.vehicle_binding(operator_id, vehicle_id, &request.id)? {
        log::warn!("vehicle {vehicle_id} is already bound to request {bound_to}");
        return Err(ConflictKind::VehicleAlreadyBound {
            vehicle_id: vehicle_id.to_owned(),
            bound_to,
        }
        .into());
    }
    Ok(())
}

fn inbox_item(
    session: &StoreSession,
    operator_id: &str,
    request: FulfillmentRequest,
) -> Result<InboxItem, DispatchError> {
    let inbox = session.inbox(operator_id, &request.id)?;
    let requester = session
        .requester(&request.requester_id)?
        .unwrap_or_else(|| Requester {
            id: request.requester_id.clone(),
            display_name: None,
            phone: None,
        });
    let (state, note, inbox_updated_at) = inbox.map_or((InboxState::New, None, None), |record| {
        (record.state, record.note, Some(record.updated_at))
    });
    Ok(InboxItem {
        request_id: request.id,
        lane_id: request.lane_id,
        created_at: request.created_at,
        state,
        note,
        inbox_updated_at,
        pickup_location: request.pickup_location,
        time_window: request.time_window,
        requirements: request.requirements,
        matched_vehicle_id: request.assigned_vehicle_id,
        pickup_verified_at: request.pickup_verified_at,
        requester,
    })
}
