//! The static machine model of the StateS editor.
//!
//! This crate defines the id-addressed entities that a diagram is made of:
//! [`Variable`]s held by a [`VariableRegistry`], combinational [`Equation`]
//! trees, [`Action`]s on variables, and the [`Fsm`] graph of states and
//! transitions. Entities live in [`Arena`]s and refer to each other only by
//! id; nothing here knows about rendering or file formats.

#![warn(missing_docs)]

pub mod action;
pub mod arena;
pub mod equation;
pub mod error;
pub mod fsm;
pub mod ids;
pub mod naming;
pub mod variable;

pub use action::{Action, ActionCategory, ActionKind};
pub use arena::{Arena, ArenaId};
pub use equation::{
    compute, substitute, Arity, Equation, EquationError, OperatorKind, Operand,
};
pub use error::IrError;
pub use fsm::{Fsm, FsmState, FsmTransition};
pub use ids::{EquationId, StateId, TransitionId, VariableId};
pub use naming::unique_name;
pub use variable::{Variable, VariableKind, VariableRegistry, VariableSource};
