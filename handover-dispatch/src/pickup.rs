//! Signed pickup codes proving the physical vehicle handover.
//!
//! The signature is an HMAC-SHA256 over `request|operator|REGISTRATION`,
//! truncated to 16 bytes and encoded as unpadded base64url. Riders show the
//! long payload as a QR code; operators either scan it or type the
//! six-character short code instead.

use std::fmt;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use handover_core::RequestId;
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Bytes of the HMAC tag kept in the signature.
const SIGNATURE_BYTES: usize = 16;
/// Characters of the signature used as the short code.
const SHORT_CODE_CHARS: usize = 6;
/// Prefix of QR payloads.
const PAYLOAD_TAG: &str = "HANDOVER";

/// The configured secret could not key the HMAC.
#[derive(Debug, Error)]
#[error("pickup secret cannot key HMAC-SHA256")]
pub struct PickupKeyError;

/// Codes handed to the rider for an onboarded request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PickupCode {
    /// Payload encoded in the QR code.
    pub qr_payload: String,
    /// Human-enterable fallback.
    pub short_code: String,
}

/// Signs and checks pickup codes with a shared secret.
///
/// # Examples
///
/// ```
/// use handover_core::RequestId;
/// use handover_dispatch::PickupSigner;
///
/// let signer = PickupSigner::new("secret").expect("HMAC accepts any key length");
/// let request = RequestId::new();
/// let code = signer.code(&request, " fleet ", "mh12ab1234");
/// assert!(code.qr_payload.starts_with("HANDOVER|REQ:"));
/// assert!(signer.matches(&request, "fleet", "MH12AB1234", &code.short_code.to_lowercase()));
/// ```
#[derive(Clone)]
pub struct PickupSigner {
    mac: HmacSha256,
}

impl fmt::Debug for PickupSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PickupSigner").finish_non_exhaustive()
    }
}

impl PickupSigner {
    /// Key a signer with `secret`.
    ///
    /// # Errors
    ///
    /// Returns [`PickupKeyError`] if the HMAC rejects the key.
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, PickupKeyError> {
        let mac = HmacSha256::new_from_slice(secret.as_ref()).map_err(|_| PickupKeyError)?;
        Ok(Self { mac })
    }

    /// Unpadded base64url signature for the handover.
    #[must_use]
    pub fn signature(&self, request_id: &RequestId, operator_id: &str, registration: &str) -> String {
        let message = format!(
            "{request_id}|{}|{}",
            operator_id.trim(),
            registration.trim().to_uppercase()
        );
        let mut mac = self.mac.clone();
        mac.update(message.as_bytes());
        let tag = mac.finalize().into_bytes();
        let truncated = tag.get(..SIGNATURE_BYTES).unwrap_or(&tag);
        URL_SAFE_NO_PAD.encode(truncated)
    }

    /// QR payload and short code for the handover.
    #[must_use]
    pub fn code(&self, request_id: &RequestId, operator_id: &str, registration: &str) -> PickupCode {
        let signature = self.signature(request_id, operator_id, registration);
        let short_code = short_code(&signature);
        PickupCode {
            qr_payload: format!(
                "{PAYLOAD_TAG}|REQ:{request_id}|OP:{}|VEH:{}|SIG:{signature}",
                operator_id.trim(),
                registration.trim().to_uppercase()
            ),
            short_code,
        }
    }

    /// Whether `entered` is the short code or the QR payload for the
    /// handover.
    ///
    /// Input is trimmed. Payloads (anything starting with `HANDOVER|`) must
    /// match exactly; short codes are upper-cased first. Comparisons run in
    /// constant time.
    #[must_use]
    pub fn matches(
        &self,
        request_id: &RequestId,
        operator_id: &str,
        registration: &str,
        entered: &str,
    ) -> bool {
        let input = entered.trim();
        let expected = self.code(request_id, operator_id, registration);
        let is_payload = input
            .strip_prefix(PAYLOAD_TAG)
            .is_some_and(|rest| rest.starts_with('|'));
        if is_payload {
            return constant_time_eq(input.as_bytes(), expected.qr_payload.as_bytes());
        }
        constant_time_eq(
            input.to_uppercase().as_bytes(),
            expected.short_code.as_bytes(),
        )
    }
}

fn short_code(signature: &str) -> String {
    signature
        .chars()
        .take(SHORT_CODE_CHARS)
        .collect::<String>()
        .to_ascii_uppercase()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0_u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
