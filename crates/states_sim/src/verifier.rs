//! Static checks of a machine, reported as diagnostics.
//!
//! The verifier is a read-only consumer of the [`Fsm`]: it looks for a
//! missing initial state, broken or non-boolean transition conditions,
//! states whose outgoing conditions can hold simultaneously, and states
//! that cannot be reached.

use std::collections::{HashSet, VecDeque};

use log::debug;
use states_config::VerifierConfig;
use states_diagnostics::{Category, Diagnostic, DiagnosticCode, DiagnosticSink, ElementRef};
use states_ir::{Equation, Fsm, StateId, TransitionId};

use crate::truth_table::TruthTable;

/// The machine has no initial state.
pub const MISSING_INITIAL_STATE: DiagnosticCode = DiagnosticCode::new(Category::Error, 1);
/// A transition condition has a structural failure.
pub const BROKEN_CONDITION: DiagnosticCode = DiagnosticCode::new(Category::Warning, 1);
/// A transition condition is not one bit wide.
pub const NON_BOOLEAN_CONDITION: DiagnosticCode = DiagnosticCode::new(Category::Warning, 2);
/// Outgoing conditions of a state can be true at the same time.
pub const OVERLAPPING_CONDITIONS: DiagnosticCode = DiagnosticCode::new(Category::Warning, 3);
/// A state cannot be reached from the initial state.
pub const UNREACHABLE_STATE: DiagnosticCode = DiagnosticCode::new(Category::Warning, 4);
/// The overlap check of a state was skipped.
pub const OVERLAP_CHECK_SKIPPED: DiagnosticCode = DiagnosticCode::new(Category::Note, 1);

/// How many conflicting input rows an overlap diagnostic lists.
const MAX_EXAMPLE_ROWS: usize = 4;

/// Checks `fsm` and returns every finding, errors first by check order.
pub fn verify(fsm: &Fsm, config: &VerifierConfig) -> Vec<Diagnostic> {
    let sink = DiagnosticSink::new();
    check_initial_state(fsm, &sink);
    check_conditions(fsm, &sink);
    check_overlaps(fsm, config, &sink);
    if config.check_unreachable_states {
        check_reachability(fsm, &sink);
    }
    let diagnostics = sink.take_all();
    debug!("verification produced {} diagnostics", diagnostics.len());
    diagnostics
}

fn check_initial_state(fsm: &Fsm, sink: &DiagnosticSink) {
    if fsm.initial_state().is_none() {
        sink.emit(
            Diagnostic::new(MISSING_INITIAL_STATE, "machine has no initial state")
                .with_help("designate one state as the initial state"),
        );
    }
}

fn check_conditions(fsm: &Fsm, sink: &DiagnosticSink) {
    for (id, transition) in fsm.transitions() {
        let Some(eq) = transition.condition().and_then(|c| fsm.equation(c)) else {
            continue;
        };
        if let Some(failure) = eq.failure() {
            sink.emit(
                Diagnostic::new(
                    BROKEN_CONDITION,
                    format!("transition condition is invalid: {failure}"),
                )
                .at(ElementRef::Transition(id))
                .with_note("an invalid condition is treated as false during simulation"),
            );
        } else if eq.size() != 1 {
            sink.emit(
                Diagnostic::new(
                    NON_BOOLEAN_CONDITION,
                    format!("transition condition is {} bits wide, expected 1", eq.size()),
                )
                .at(ElementRef::Transition(id))
                .with_note("a non-boolean condition is treated as false during simulation"),
            );
        }
    }
}

/// A guard that takes part in the overlap check: `None` is always true.
fn usable_condition<'f>(fsm: &'f Fsm, id: TransitionId) -> Option<Option<&'f Equation>> {
    match fsm.transition(id)?.condition() {
        None => Some(None),
        Some(c) => {
            let eq = fsm.equation(c)?;
            (eq.failure().is_none() && eq.size() == 1).then_some(Some(eq))
        }
    }
}

fn check_overlaps(fsm: &Fsm, config: &VerifierConfig, sink: &DiagnosticSink) {
    for (state, _) in fsm.states() {
        let mut unconditional = Vec::new();
        let mut guarded: Vec<(TransitionId, &Equation)> = Vec::new();
        for &id in fsm.outgoing(state) {
            match usable_condition(fsm, id) {
                Some(None) => unconditional.push(id),
                Some(Some(eq)) => guarded.push((id, eq)),
                None => {}
            }
        }
        if unconditional.len() + guarded.len() < 2 {
            continue;
        }

        let equations: Vec<&Equation> = guarded.iter().map(|(_, eq)| *eq).collect();
        let width = TruthTable::input_width(&equations, fsm.variables());
        if width > config.max_truth_table_width {
            sink.emit(
                Diagnostic::new(
                    OVERLAP_CHECK_SKIPPED,
                    format!(
                        "overlap check skipped: conditions read {width} input bits (limit {})",
                        config.max_truth_table_width
                    ),
                )
                .at(ElementRef::State(state)),
            );
            continue;
        }

        let table = TruthTable::build(&equations, fsm.variables());
        let mut examples = Vec::new();
        let mut conflicting_rows = 0usize;
        for row in 0..table.row_count() {
            let mut active = unconditional.clone();
            for (col, (id, _)) in guarded.iter().enumerate() {
                if table.output_at(row, col).is_some_and(|v| v.bit(0)) {
                    active.push(*id);
                }
            }
            if active.len() < 2 {
                continue;
            }
            conflicting_rows += 1;
            if examples.len() < MAX_EXAMPLE_ROWS {
                examples.push(describe_row(fsm, &table, row, &active));
            }
        }
        if conflicting_rows == 0 {
            continue;
        }
        let mut diag = Diagnostic::new(
            OVERLAPPING_CONDITIONS,
            format!(
                "outgoing conditions overlap in {conflicting_rows} of {} input combinations",
                table.row_count()
            ),
        )
        .at(ElementRef::State(state))
        .with_help("make the conditions mutually exclusive");
        for example in examples {
            diag = diag.with_note(example);
        }
        sink.emit(diag);
    }
}

fn describe_row(fsm: &Fsm, table: &TruthTable, row: usize, active: &[TransitionId]) -> String {
    let inputs: Vec<String> = table
        .input_headers()
        .iter()
        .enumerate()
        .map(|(col, name)| {
            let value = table
                .input_at(row, col)
                .map(ToString::to_string)
                .unwrap_or_default();
            format!("{name}={value}")
        })
        .collect();
    let targets: Vec<String> = active
        .iter()
        .filter_map(|id| fsm.transition(*id))
        .filter_map(|t| fsm.state(t.target()))
        .map(|s| s.name().to_string())
        .collect();
    let inputs = if inputs.is_empty() {
        "always".to_string()
    } else {
        inputs.join(", ")
    };
    format!("{inputs}: transitions to {} all hold", targets.join(", "))
}

fn check_reachability(fsm: &Fsm, sink: &DiagnosticSink) {
    let Some(initial) = fsm.initial_state() else {
        return;
    };
    let mut seen: HashSet<StateId> = HashSet::from([initial]);
    let mut queue = VecDeque::from([initial]);
    while let Some(state) = queue.pop_front() {
        for &id in fsm.outgoing(state) {
            if let Some(t) = fsm.transition(id) {
                if seen.insert(t.target()) {
                    queue.push_back(t.target());
                }
            }
        }
    }
    for (state, _) in fsm.states() {
        if !seen.contains(&state) {
            sink.emit(
                Diagnostic::new(UNREACHABLE_STATE, "state is unreachable from the initial state")
                    .at(ElementRef::State(state)),
            );
        }
    }
}
