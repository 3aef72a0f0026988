//! References to the machine element a diagnostic is about.

use serde::{Deserialize, Serialize};
use states_ir::{EquationId, Fsm, StateId, TransitionId, VariableId};
use std::fmt;

/// A machine element that a diagnostic points at.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum ElementRef {
    /// A state.
    State(StateId),
    /// A transition.
    Transition(TransitionId),
    /// A variable.
    Variable(VariableId),
    /// An equation.
    Equation(EquationId),
}

impl ElementRef {
    /// Describes the element with names resolved against `fsm`.
    ///
    /// Elements that no longer exist are described by their id.
    pub fn describe(&self, fsm: &Fsm) -> String {
        match *self {
            ElementRef::State(id) => match fsm.state(id) {
                Some(state) => format!("state `{}`", state.name()),
                None => format!("{id}"),
            },
            ElementRef::Transition(id) => match fsm.transition(id) {
                Some(t) => {
                    let name = |s: StateId| {
                        fsm.state(s)
                            .map_or_else(|| s.to_string(), |st| st.name().to_string())
                    };
                    format!("transition `{}` -> `{}`", name(t.source()), name(t.target()))
                }
                None => format!("{id}"),
            },
            ElementRef::Variable(id) => match fsm.variables().variable(id) {
                Some(var) => format!("variable `{}`", var.name()),
                None => format!("{id}"),
            },
            ElementRef::Equation(id) => match fsm.equation(id) {
                Some(eq) => format!("equation `{}`", eq.display(fsm.variables())),
                None => format!("{id}"),
            },
        }
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementRef::State(id) => write!(f, "{id}"),
            ElementRef::Transition(id) => write!(f, "{id}"),
            ElementRef::Variable(id) => write!(f, "{id}"),
            ElementRef::Equation(id) => write!(f, "{id}"),
        }
    }
}
