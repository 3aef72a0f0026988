//! Static analysis of machines: truth tables, verification and rendered
//! diagnostics, checked against machines built through the editing API.

use states_common::BitValue;
use states_config::load_config_from_str;
use states_diagnostics::{DiagnosticRenderer, ElementRef, Severity, TerminalRenderer};
use states_ir::{Equation, Fsm, OperatorKind, VariableKind};
use states_sim::{verify, TruthTable};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn column(table: &TruthTable, col: usize) -> Vec<String> {
    (0..table.row_count())
        .map(|row| table.output_at(row, col).unwrap().to_string())
        .collect()
}

fn codes(fsm: &Fsm, config_text: &str) -> Vec<String> {
    let config = load_config_from_str(config_text).unwrap();
    verify(fsm, &config.verifier)
        .iter()
        .map(|d| d.code.to_string())
        .collect()
}

// ---------------------------------------------------------------------------
// Truth tables
// ---------------------------------------------------------------------------

#[test]
fn truth_table_of_stored_condition() {
    let mut fsm = Fsm::new();
    let a = fsm.add_variable("a", VariableKind::Input, 1).unwrap();
    let b = fsm.add_variable("b", VariableKind::Input, 1).unwrap();
    let and = fsm.add_equation(Equation::new(OperatorKind::And, vec![a.into(), b.into()]));
    let nor = fsm.add_equation(Equation::new(OperatorKind::Nor, vec![a.into(), b.into()]));

    let equations = [fsm.equation(and).unwrap(), fsm.equation(nor).unwrap()];
    let table = TruthTable::build(&equations, fsm.variables());
    assert_eq!(table.variables(), &[a, b]);
    assert_eq!(column(&table, 0), ["0", "0", "0", "1"]);
    assert_eq!(column(&table, 1), ["1", "0", "0", "0"]);
}

#[test]
fn truth_table_ignores_current_values() {
    let mut fsm = Fsm::new();
    let a = fsm.add_variable("a", VariableKind::Input, 1).unwrap();
    let eq = fsm.add_equation(Equation::new(OperatorKind::Not, vec![a.into()]));
    fsm.variables_mut()
        .write(a, &BitValue::one(1), states_common::BitRange::All)
        .unwrap();

    let table = TruthTable::build(&[fsm.equation(eq).unwrap()], fsm.variables());
    assert_eq!(column(&table, 0), ["1", "0"]);
    assert_eq!(
        fsm.variables().variable(a).unwrap().current_value().to_string(),
        "1"
    );
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

#[test]
fn removing_initial_state_is_reported() {
    let mut fsm = Fsm::new();
    let a = fsm.add_state("A");
    let b = fsm.add_state("B");
    let t = fsm.add_transition(a, b, None).unwrap();
    fsm.add_transition(b, a, None).unwrap();
    fsm.set_initial_state(Some(a)).unwrap();
    assert!(codes(&fsm, "").is_empty());

    fsm.remove_state(a).unwrap();
    assert_eq!(fsm.initial_state(), None);
    assert!(fsm.transition(t).is_none());
    assert!(fsm.outgoing(b).is_empty());
    assert!(fsm.incoming(b).is_empty());
    assert_eq!(codes(&fsm, ""), ["E001"]);
}

#[test]
fn unreachable_check_follows_configuration() {
    let mut fsm = Fsm::new();
    let a = fsm.add_state("A");
    fsm.add_state("Orphan");
    fsm.set_initial_state(Some(a)).unwrap();

    assert_eq!(codes(&fsm, ""), ["W004"]);
    assert!(codes(&fsm, "[verifier]\ncheck_unreachable_states = false\n").is_empty());
}

#[test]
fn rendered_report() {
    let mut fsm = Fsm::new();
    let req = fsm.add_variable("req", VariableKind::Input, 1).unwrap();
    let idle = fsm.add_state("Idle");
    let busy = fsm.add_state("Busy");
    let cond = fsm.add_equation(Equation::identity(req));
    fsm.add_transition(idle, busy, Some(cond)).unwrap();
    fsm.add_transition(idle, idle, None).unwrap();
    fsm.add_transition(busy, idle, None).unwrap();
    fsm.set_initial_state(Some(idle)).unwrap();

    let config = load_config_from_str("").unwrap();
    let diags = verify(&fsm, &config.verifier);
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].severity, Severity::Warning);
    assert_eq!(diags[0].location, Some(ElementRef::State(idle)));

    let text = TerminalRenderer::new().render(&diags[0], &fsm);
    assert_eq!(
        text,
        "warning[W003]: outgoing conditions overlap in 1 of 2 input combinations\n\
         \x20 --> state `Idle`\n\
         \x20 = note: req=1: transitions to Idle, Busy all hold\n\
         \x20 = help: make the conditions mutually exclusive\n"
    );
}
