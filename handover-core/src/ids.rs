//! Strongly typed identifiers for records owned by the engine.
//!
//! Identifiers wrap a [`Ulid`] so they sort by creation time and can be
//! minted without coordination. A zero-sized marker keeps request and
//! commitment identifiers from being mixed up at compile time.

use std::{fmt, marker::PhantomData, str::FromStr};

use thiserror::Error;
use ulid::Ulid;

/// Marker trait providing the display prefix for an identifier family.
pub trait IdMarker: Send + Sync + 'static {
    /// Prefix rendered before the ULID, for example `"req-"`.
    const PREFIX: &'static str;
}

/// ULID-backed identifier tagged with a marker type.
///
/// # Examples
///
/// ```
/// use handover_core::RequestId;
///
/// let id = RequestId::new();
/// let parsed: RequestId = id.to_string().parse().unwrap();
/// assert_eq!(id, parsed);
/// assert!(id.to_string().starts_with("req-"));
/// ```
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    /// Mint a fresh identifier.
    #[must_use]
    pub fn new() -> Self {
        Self::from_ulid(Ulid::new())
    }

    /// Wrap an existing ULID.
    #[must_use]
    pub const fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            marker: PhantomData,
        }
    }

    /// Return the wrapped ULID.
    #[must_use]
    pub const fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> Default for Id<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::PREFIX, self.ulid)
    }
}

/// Errors returned when parsing an [`Id`] from text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseIdError {
    /// The text did not start with the expected prefix.
    #[error("identifier {input:?} must start with {expected:?}")]
    MissingPrefix {
        /// Text that failed to parse.
        input: String,
        /// Prefix required by the identifier family.
        expected: &'static str,
    },
    /// The text after the prefix was not a valid ULID.
    #[error("identifier {input:?} is not a valid ULID: {source}")]
    InvalidUlid {
        /// Text that failed to parse.
        input: String,
        /// Decoding failure reported by `ulid`.
        #[source]
        source: ulid::DecodeError,
    },
}

impl<T: IdMarker> FromStr for Id<T> {
    type Err = ParseIdError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        let Some(body) = trimmed.strip_prefix(T::PREFIX) else {
            return Err(ParseIdError::MissingPrefix {
                input: input.to_owned(),
                expected: T::PREFIX,
            });
        };
        Ulid::from_string(body)
            .map(Self::from_ulid)
            .map_err(|source| ParseIdError::InvalidUlid {
                input: input.to_owned(),
                source,
            })
    }
}

#[cfg(feature = "serde")]
impl<T: IdMarker> serde::Serialize for Id<T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de, T: IdMarker> serde::Deserialize<'de> for Id<T> {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Marker for fulfillment request identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RequestMarker {}

impl IdMarker for RequestMarker {
    const PREFIX: &'static str = "req-";
}

/// Marker for commitment identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CommitmentMarker {}

impl IdMarker for CommitmentMarker {
    const PREFIX: &'static str = "cmt-";
}

/// Identifier of a [`FulfillmentRequest`](crate::FulfillmentRequest).
pub type RequestId = Id<RequestMarker>;

/// Identifier of a [`Commitment`](crate::Commitment).
pub type CommitmentId = Id<CommitmentMarker>;
