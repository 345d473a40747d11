//! Binding a vehicle to a request.

use std::collections::HashSet;

use geo::Rect;
use handover_core::{
    Clock, FulfillmentRequest, InboxRecord, InboxState, RequestId, StoreSession, StoreWriter,
    VehicleScorer, VehicleSnapshot, bounding_box,
};

use super::{HandoverService, load_request};
use crate::{AcceptOutcome, ConflictKind, DispatchError, ValidationKind};

impl<C> HandoverService<C>
where
    C: Clock,
{
    /// Accept a request and bind the best available vehicle to it.
    ///
    /// The inbox state, the set of vehicles bound to other onboarded requests
    /// and the candidate scan are all read inside the write transaction, so
    /// accepts racing from other threads, handles or processes are serialised
    /// by the database writer lock. Concurrent accepts of one request converge
    /// on the first assignment, and a vehicle is never bound twice.
    ///
    /// Candidates are tried in order: the vehicle recommended at creation,
    /// the best vehicle inside the lane's bounding box, then the best vehicle
    /// anywhere. The first transition into `ONBOARDED` issues a commitment.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::NotFound`] for unknown requests.
    /// - [`ConflictKind::OperatorUnassigned`] when the request has no operator.
    /// - [`ConflictKind::NoAvailableVehicle`] when every candidate is blocked;
    ///   nothing is written.
    /// - [`ValidationKind::InvalidTransition`] for rejected requests.
    pub fn accept(
        &self,
        request_id: &RequestId,
        note: Option<&str>,
    ) -> Result<AcceptOutcome, DispatchError> {
        let mut session = self.session()?;
        session.write(|writer| self.accept_within(writer, request_id, note))
    }

    fn accept_within(
        &self,
        writer: &StoreWriter<'_>,
        request_id: &RequestId,
        note: Option<&str>,
    ) -> Result<AcceptOutcome, DispatchError> {
        let mut request = load_request(writer, request_id)?;
        let Some(operator_id) = request.operator_id.clone() else {
            return Err(ConflictKind::OperatorUnassigned {
                request_id: *request_id,
            }
            .into());
        };

        let previous = writer
            .inbox(&operator_id, request_id)?
            .map_or(InboxState::New, |record| record.state);
        if previous == InboxState::Onboarded {
            log::info!("request {request_id} already onboarded; returning its assignment");
            return existing_assignment(writer, &request);
        }
        previous
            .transition_to(InboxState::Onboarded)
            .map_err(ValidationKind::from)?;

        let now = self.now();
        let lane = self.recommender.resolver().resolve(&request.lane_id, None);
        let bbox = bounding_box(
            lane.position,
            self.config.bbox_half_lat,
            self.config.bbox_half_lon,
        );
        let blocked = writer.bound_vehicles(&operator_id, request_id)?;
        let Some(vehicle) = self.pick_vehicle(writer, &request, &operator_id, &bbox, &blocked)?
        else {
            log::warn!("no available vehicle for request {request_id} of {operator_id}");
            return Err(ConflictKind::NoAvailableVehicle {
                request_id: *request_id,
            }
            .into());
        };

        let card = self.recommender.scorer().score(
            &vehicle,
            &lane,
            &self.config.accept_constraints,
            now,
        );
        request.assigned_vehicle_id = Some(vehicle.id.clone());
        request.assigned_score = Some(card.score);
        request.assigned_reasons = Some(card.reasons);
        let record = InboxRecord {
            operator_id: operator_id.clone(),
            request_id: *request_id,
            state: InboxState::Onboarded,
            note: Some(note.map_or_else(
                || {
                    format!(
                        "Accepted. Auto-assigned vehicle {}.",
                        vehicle.registration_number
                    )
                },
                str::to_owned,
            )),
            updated_at: now,
        };
        let commitment = self.onboarding_commitment(&request, &operator_id, now)?;
        writer.save_request(&request)?;
        writer.save_inbox(&record)?;
        writer.save_commitment(&commitment)?;
        log::info!(
            "request {request_id} onboarded with vehicle {} (score {:.2}); commitment {} until {}",
            vehicle.id,
            card.score,
            commitment.id,
            commitment.ends_at
        );

        Ok(AcceptOutcome {
            state: InboxState::Onboarded,
            matched_vehicle_id: vehicle.id,
            matched_vehicle_registration: vehicle.registration_number,
            matched_score: request.assigned_score,
            matched_reasons: request.assigned_reasons,
        })
    }

    /// First candidate not bound to another onboarded request.
    fn pick_vehicle(
        &self,
        session: &StoreSession,
        request: &FulfillmentRequest,
        operator_id: &str,
        bbox: &Rect<f64>,
        blocked: &HashSet<String>,
    ) -> Result<Option<VehicleSnapshot>, DispatchError> {
        let preferred = request
            .assigned_vehicle_id
            .as_deref()
            .filter(|id| !blocked.contains(*id))
            .map(|id| session.vehicle(id))
            .transpose()?
            .flatten()
            .filter(|vehicle| {
                vehicle.operator_id == operator_id && vehicle.is_active() && vehicle.is_within(bbox)
            });
        if preferred.is_some() {
            return Ok(preferred);
        }

        for area in [Some(bbox), None] {
            let free = session
                .assignable_vehicles(operator_id, area, self.config.scan_limit)?
                .into_iter()
                .find(|vehicle| {
                    let taken = blocked.contains(&vehicle.id);
                    if taken {
                        log::debug!("vehicle {} is already bound; skipping", vehicle.id);
                    }
                    !taken
                });
            if free.is_some() {
                return Ok(free);
            }
        }
        Ok(None)
    }
}

fn existing_assignment(
    session: &StoreSession,
    request: &FulfillmentRequest,
) -> Result<AcceptOutcome, DispatchError> {
    let vehicle = request
        .assigned_vehicle_id
        .as_deref()
        .map(|id| session.vehicle(id))
        .transpose()?
        .flatten();
    Ok(AcceptOutcome {
        state: InboxState::Onboarded,
        matched_vehicle_id: request.assigned_vehicle_id.clone().unwrap_or_default(),
        matched_vehicle_registration: vehicle
            .map(|vehicle| vehicle.registration_number)
            .unwrap_or_default(),
        matched_score: request.assigned_score,
        matched_reasons: request.assigned_reasons.clone(),
    })
}
