//! Operator inbox lifecycle for fulfillment requests.
//!
//! Each (operator, request) pair has at most one [`InboxRecord`]; a missing
//! record reads as [`InboxState::New`]. Legal moves live in a lookup table
//! keyed by `(current, requested)` that yields the side effect to run.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::RequestId;
use crate::labels::labelled_enum;

labelled_enum! {
    /// Where a request sits in an operator's inbox.
    pub enum InboxState as "inbox state" {
        /// Not yet handled. Implied when no record exists.
        New => "NEW",
        /// The operator has reached out to the requester.
        Contacted => "CONTACTED",
        /// A vehicle is bound to the requester.
        Onboarded => "ONBOARDED",
        /// The operator declined the request.
        Rejected => "REJECTED",
    }
}

impl Default for InboxState {
    fn default() -> Self {
        Self::New
    }
}

impl InboxState {
    /// Whether no further transitions are accepted.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Onboarded | Self::Rejected)
    }

    /// Look up the side effect of moving from `self` to `requested`.
    ///
    /// Re-saving the current state is always legal and has no side effect.
    ///
    /// # Examples
    ///
    /// ```
    /// use handover_core::{InboxState, TransitionEffect};
    ///
    /// assert_eq!(
    ///     InboxState::Contacted.transition_to(InboxState::Onboarded),
    ///     Ok(TransitionEffect::Onboard)
    /// );
    /// assert!(InboxState::Rejected.transition_to(InboxState::New).is_err());
    /// ```
    pub fn transition_to(self, requested: Self) -> Result<TransitionEffect, TransitionError> {
        if self == requested {
            return Ok(TransitionEffect::Resave);
        }
        TRANSITIONS
            .iter()
            .find(|(from, to, _)| *from == self && *to == requested)
            .map(|(_, _, effect)| *effect)
            .ok_or(TransitionError {
                from: self,
                to: requested,
            })
    }
}

/// Side effect attached to an inbox transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionEffect {
    /// Same state saved again; only the note and timestamp change.
    Resave,
    /// Store the new state.
    Record,
    /// Store `ONBOARDED`, bind the vehicle, and issue a commitment.
    Onboard,
}

const TRANSITIONS: &[(InboxState, InboxState, TransitionEffect)] = &[
    (InboxState::New, InboxState::Contacted, TransitionEffect::Record),
    (InboxState::New, InboxState::Onboarded, TransitionEffect::Onboard),
    (InboxState::New, InboxState::Rejected, TransitionEffect::Record),
    (InboxState::Contacted, InboxState::Onboarded, TransitionEffect::Onboard),
    (InboxState::Contacted, InboxState::Rejected, TransitionEffect::Record),
];

/// A transition not present in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot move inbox state from {from} to {to}")]
pub struct TransitionError {
    /// State before the attempted move.
    pub from: InboxState,
    /// Requested state.
    pub to: InboxState,
}

/// Persisted inbox row for one operator and request.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InboxRecord {
    /// Operator owning the inbox.
    pub operator_id: String,
    /// Request the row tracks.
    pub request_id: RequestId,
    /// Current state.
    pub state: InboxState,
    /// Free-text operator note.
    pub note: Option<String>,
    /// Time of the last save.
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(InboxState::New, InboxState::Contacted, TransitionEffect::Record)]
    #[case(InboxState::New, InboxState::Onboarded, TransitionEffect::Onboard)]
    #[case(InboxState::Contacted, InboxState::Onboarded, TransitionEffect::Onboard)]
    #[case(InboxState::Contacted, InboxState::Rejected, TransitionEffect::Record)]
    #[case(InboxState::Onboarded, InboxState::Onboarded, TransitionEffect::Resave)]
    #[case(InboxState::Rejected, InboxState::Rejected, TransitionEffect::Resave)]
    fn legal_transitions_yield_their_effect(
        #[case] from: InboxState,
        #[case] to: InboxState,
        #[case] effect: TransitionEffect,
    ) {
        assert_eq!(from.transition_to(to), Ok(effect));
    }

    #[rstest]
    #[case(InboxState::Onboarded, InboxState::Rejected)]
    #[case(InboxState::Onboarded, InboxState::New)]
    #[case(InboxState::Rejected, InboxState::Contacted)]
    #[case(InboxState::Contacted, InboxState::New)]
    fn illegal_transitions_are_rejected(#[case] from: InboxState, #[case] to: InboxState) {
        assert_eq!(from.transition_to(to), Err(TransitionError { from, to }));
    }

    #[rstest]
    fn only_onboarding_moves_issue_commitments() {
        let onboarding: Vec<_> = InboxState::ALL
            .iter()
            .flat_map(|from| InboxState::ALL.iter().map(move |to| (*from, *to)))
            .filter(|(from, to)| from.transition_to(*to) == Ok(TransitionEffect::Onboard))
            .collect();
        assert!(onboarding.iter().all(|(from, to)| from != to && *to == InboxState::Onboarded));
        assert_eq!(onboarding.len(), 2);
    }
}
