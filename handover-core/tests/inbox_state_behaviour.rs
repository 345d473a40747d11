//! Behavioural tests for the inbox transition table.

use std::cell::RefCell;

use handover_core::{InboxState, TransitionEffect, TransitionError};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

type Outcome = RefCell<Option<Result<TransitionEffect, TransitionError>>>;

#[fixture]
fn current() -> RefCell<Option<InboxState>> {
    RefCell::new(None)
}

#[fixture]
fn outcome() -> Outcome {
    RefCell::new(None)
}

fn parse_state(label: &str) -> InboxState {
    label
        .trim_matches('"')
        .parse()
        .unwrap_or_else(|err| panic!("invalid state in feature file: {err}"))
}

#[given("a request sitting in the {state} state")]
fn given_state(#[from(current)] current: &RefCell<Option<InboxState>>, state: String) {
    current.replace(Some(parse_state(&state)));
}

#[when("the operator moves it to {state}")]
fn when_move(
    #[from(current)] current: &RefCell<Option<InboxState>>,
    #[from(outcome)] outcome: &Outcome,
    state: String,
) {
    let from = current
        .borrow()
        .unwrap_or_else(|| panic!("current state should be set"));
    outcome.replace(Some(from.transition_to(parse_state(&state))));
}

fn recorded(outcome: &Outcome) -> Result<TransitionEffect, TransitionError> {
    outcome
        .borrow()
        .unwrap_or_else(|| panic!("a transition should be attempted"))
}

#[then("the move is recorded")]
fn then_recorded(#[from(outcome)] outcome: &Outcome) {
    assert_eq!(recorded(outcome), Ok(TransitionEffect::Record));
}

#[then("the move onboards the rider")]
fn then_onboards(#[from(outcome)] outcome: &Outcome) {
    assert_eq!(recorded(outcome), Ok(TransitionEffect::Onboard));
}

#[then("the move is refused")]
fn then_refused(#[from(outcome)] outcome: &Outcome) {
    let err = recorded(outcome).expect_err("transition should be refused");
    assert_eq!(err.from, InboxState::Rejected);
}

#[then("the move only re-saves the row")]
fn then_resave(#[from(outcome)] outcome: &Outcome) {
    assert_eq!(recorded(outcome), Ok(TransitionEffect::Resave));
}

#[scenario(path = "tests/features/inbox_state.feature", index = 0)]
fn contact_new_request(
    current: RefCell<Option<InboxState>>,
    outcome: Outcome,
) {
    let _ = (current, outcome);
}

#[scenario(path = "tests/features/inbox_state.feature", index = 1)]
fn onboard_contacted_request(
    current: RefCell<Option<InboxState>>,
    outcome: Outcome,
) {
    let _ = (current, outcome);
}

#[scenario(path = "tests/features/inbox_state.feature", index = 2)]
fn rejected_is_terminal(
    current: RefCell<Option<InboxState>>,
    outcome: Outcome,
) {
    let _ = (current, outcome);
}

#[scenario(path = "tests/features/inbox_state.feature", index = 3)]
fn same_state_resave(
    current: RefCell<Option<InboxState>>,
    outcome: Outcome,
) {
    let _ = (current, outcome);
}
