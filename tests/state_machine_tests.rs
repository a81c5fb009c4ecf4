use std::collections::{HashSet, VecDeque};

use chatflows::models::payments::{AmountMode, QrAmount, QrType};
use chatflows::services::conversation::context::{ContextField, ContextPatch, FieldValue};
use chatflows::services::conversation::state_machine::{
    FlowType, HOME, State, StateMachine, TransitionError, TransitionTable,
};
use uuid::Uuid;

fn reachable_from(table: &TransitionTable, start: State) -> HashSet<State> {
    let mut seen = HashSet::from([start]);
    let mut queue = VecDeque::from([start]);
    while let Some(state) = queue.pop_front() {
        for next in table.allowed_targets(state) {
            if seen.insert(next) {
                queue.push_back(next);
            }
        }
    }
    seen
}

#[test]
fn test_every_state_is_reachable_from_home() {
    let table = TransitionTable::new();
    let reachable = reachable_from(&table, HOME);
    for state in State::all() {
        assert!(table.contains(state), "{state} missing from the table");
        assert!(reachable.contains(&state), "{state} unreachable from home");
    }
}

#[test]
fn test_every_state_can_return_home() {
    let table = TransitionTable::new();
    for state in State::all().filter(|s| *s != HOME) {
        assert!(
            table.is_valid_transition(state, HOME),
            "{state} has no edge to home"
        );
    }
}

#[test]
fn test_flows_only_meet_at_the_hub() {
    let table = TransitionTable::new();
    for from in State::all() {
        for to in table.allowed_targets(from) {
            let crosses = from.flow_type() != to.flow_type();
            if crosses {
                assert!(
                    from.flow_type() == FlowType::Hub || to == HOME,
                    "{from} -> {to} leaves a flow without passing the hub"
                );
                if from.flow_type() == FlowType::Hub {
                    assert_eq!(to, to.flow_type().entry_state(), "{from} -> {to} skips the entry state");
                }
            }
        }
    }
}

#[test]
fn test_walk_through_qr_flow() {
    let mut machine = StateMachine::new();
    machine.transition_to(State::QrMenu, ContextPatch::new()).unwrap();

    let refused = machine.transition_to(State::QrIdentifierInput, ContextPatch::new());
    assert_eq!(
        refused,
        Err(TransitionError::MissingContext {
            target: State::QrIdentifierInput,
            missing: vec![ContextField::QrType],
        })
    );
    assert_eq!(machine.current_state(), State::QrMenu);

    machine
        .transition_to(State::QrIdentifierInput, FieldValue::QrType(QrType::MomoCode).into())
        .unwrap();
    machine
        .transition_to(
            State::QrAmountMode,
            FieldValue::QrIdentifier("12345".to_string()).into(),
        )
        .unwrap();
    let step = machine
        .transition_to(
            State::QrGenerated,
            ContextPatch::new()
                .set(FieldValue::AmountMode(AmountMode::NoAmount))
                .set(FieldValue::Amount(QrAmount::Open))
                .set(FieldValue::QrCodeId(Uuid::now_v7())),
        )
        .unwrap();
    assert!(step.state_changed);
    assert!(machine.is_terminal());
    assert_eq!(machine.log_size(), 4);

    let (state, context) = machine.export_state();
    let mut restored = StateMachine::with_context(state, context.clone());
    assert_eq!(restored.current_state(), State::QrGenerated);
    assert_eq!(restored.context(), &context);

    restored.return_home();
    assert_eq!(restored.current_state(), HOME);
    assert!(restored.context().qr.qr_identifier.is_none());
}

#[test]
fn test_invalid_edge_leaves_machine_untouched() {
    let mut machine = StateMachine::new();
    let before = machine.export_state();

    let refused = machine.transition_to(State::QrGenerated, ContextPatch::new());
    assert_eq!(
        refused,
        Err(TransitionError::InvalidTransition {
            from: HOME,
            attempted: State::QrGenerated,
        })
    );
    assert_eq!(machine.export_state(), before);
}

#[test]
fn test_reset_returns_to_last_safe_state() {
    let mut machine = StateMachine::new();
    machine.transition_to(State::InsuranceMenu, ContextPatch::new()).unwrap();
    machine.transition_to(State::InsurancePlate, ContextPatch::new()).unwrap();

    assert_eq!(machine.reset_to_safe_state(), State::InsuranceMenu);
    assert_eq!(machine.current_state(), State::InsuranceMenu);
}
