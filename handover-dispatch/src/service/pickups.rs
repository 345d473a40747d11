//! Pickup codes and handover verification.

use handover_core::{Clock, FulfillmentRequest, InboxRecord, InboxState, RequestId, StoreSession};

use super::{HandoverService, load_request};
use crate::{
    ConflictKind, DispatchError, PickupCode, PickupSigner, PickupVerification, ValidationKind,
};

/// Inbox note recorded once the handover is verified.
const PICKUP_VERIFIED_NOTE: &str = "Pickup verified (QR).";

impl<C> HandoverService<C>
where
    C: Clock,
{
    /// QR payload and short code for an onboarded request.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::NotFound`] for unknown requests and
    /// [`ConflictKind::NotOnboarded`] before the request is accepted.
    pub fn pickup_payload(&self, request_id: &RequestId) -> Result<PickupCode, DispatchError> {
        let session = self.session()?;
        let request = load_request(&session, request_id)?;
        let inbox = onboarded_inbox(&session, &request)?;
        let registration = registration(&session, &request)?;
        Ok(self
            .signer()?
            .code(request_id, &inbox.operator_id, &registration))
    }

    /// Verify the code shown by the rider and record the handover.
    ///
    /// Verifying an already verified request returns the original timestamp
    /// without checking the code again. `entered_code` is either the short
    /// code or the scanned QR payload.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::NotFound`] for unknown requests.
    /// - [`ConflictKind::NotOnboarded`] before the request is accepted.
    /// - [`ValidationKind::PickupCodeMismatch`] when the code is wrong; nothing
    ///   is written.
    pub fn verify_pickup(
        &self,
        request_id: &RequestId,
        entered_code: &str,
        verified_by: Option<&str>,
    ) -> Result<PickupVerification, DispatchError> {
        let signer = self.signer()?;
        let mut session = self.session()?;
        session.write(|writer| -> Result<_, DispatchError> {
            let mut request = load_request(writer, request_id)?;
            let mut inbox = onboarded_inbox(writer, &request)?;
            if let Some(verified_at) = request.pickup_verified_at {
                log::debug!("pickup for request {request_id} already verified at {verified_at}");
                return Ok(PickupVerification {
                    request_id: *request_id,
                    verified_at,
                    verified_by: request.pickup_verified_by,
                });
            }

            let registration = registration(writer, &request)?;
            if !signer.matches(request_id, &inbox.operator_id, &registration, entered_code) {
                log::warn!("pickup code mismatch for request {request_id}");
                return Err(ValidationKind::PickupCodeMismatch {
                    request_id: *request_id,
                }
                .into());
            }

            let now = self.now();
            request.pickup_verified_at = Some(now);
            request.pickup_verified_by = verified_by.map(str::to_owned);
            inbox.note = Some(PICKUP_VERIFIED_NOTE.to_owned());
            inbox.updated_at = now;
            writer.save_request(&request)?;
            writer.save_inbox(&inbox)?;
            log::info!("pickup verified for request {request_id}");
            Ok(PickupVerification {
                request_id: *request_id,
                verified_at: now,
                verified_by: request.pickup_verified_by,
            })
        })
    }

    fn signer(&self) -> Result<PickupSigner, DispatchError> {
        PickupSigner::new(&self.config.pickup_secret).map_err(DispatchError::internal)
    }
}

/// The request's inbox row, which must be `ONBOARDED`.
fn onboarded_inbox(
    session: &StoreSession,
    request: &FulfillmentRequest,
) -> Result<InboxRecord, DispatchError> {
    let Some(operator_id) = request.operator_id.as_deref() else {
        return Err(ConflictKind::OperatorUnassigned {
            request_id: request.id,
        }
        .into());
    };
    match session.inbox(operator_id, &request.id)? {
        Some(record) if record.state == InboxState::Onboarded => Ok(record),
        other => Err(ConflictKind::NotOnboarded {
            request_id: request.id,
            state: other.map_or(InboxState::New, |record| record.state),
        }
        .into()),
    }
}

/// Registration of the bound vehicle, or empty when none is bound.
fn registration(
    session: &StoreSession,
    request: &FulfillmentRequest,
) -> Result<String, DispatchError> {
    Ok(request
        .assigned_vehicle_id
        .as_deref()
        .map(|id| session.vehicle(id))
        .transpose()?
        .flatten()
        .map(|vehicle| vehicle.registration_number)
        .unwrap_or_default())
}
