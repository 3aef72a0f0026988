//! Error types for editing operations on the machine model.

use crate::action::ActionKind;
use crate::ids::{EquationId, StateId, TransitionId, VariableId};

/// Errors returned when an edit of the static model is rejected.
///
/// A rejected edit leaves the model untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IrError {
    /// The referenced variable does not exist.
    #[error("unknown {0}")]
    UnknownVariable(VariableId),

    /// The referenced equation does not exist.
    #[error("unknown {0}")]
    UnknownEquation(EquationId),

    /// The referenced state does not exist.
    #[error("unknown {0}")]
    UnknownState(StateId),

    /// The referenced transition does not exist.
    #[error("unknown {0}")]
    UnknownTransition(TransitionId),

    /// A name was empty after trimming.
    #[error("name must not be empty")]
    EmptyName,

    /// A name is already used by another entity of the same kind.
    #[error("name '{0}' is already in use")]
    DuplicateName(String),

    /// A variable size outside `1..=64`.
    #[error("invalid variable size {0} (expected 1 to 64)")]
    InvalidSize(u32),

    /// A value does not have the size its destination requires.
    #[error("size mismatch: expected {expected} bits, found {found}")]
    SizeMismatch {
        /// The size required by the destination.
        expected: u32,
        /// The size of the supplied value.
        found: u32,
    },

    /// A bit range does not fit the addressed variable.
    #[error("bit range {range} does not fit a {size}-bit variable")]
    InvalidRange {
        /// Textual form of the rejected range.
        range: String,
        /// Size of the addressed variable.
        size: u32,
    },

    /// Constants cannot be written or acted upon.
    #[error("variable '{0}' is a constant")]
    ConstantWrite(String),

    /// An action kind that is not valid in its context.
    #[error("{kind:?} actions are not allowed on {context}")]
    ActionNotAllowed {
        /// The rejected action kind.
        kind: ActionKind,
        /// Where the action was attached.
        context: &'static str,
    },

    /// An action index past the end of an action list.
    #[error("no action at index {0}")]
    UnknownAction(usize),

    /// An operand slot index past the end of an equation's operand list.
    #[error("operand index {index} out of range (equation has {count} operands)")]
    OperandIndex {
        /// The requested slot.
        index: usize,
        /// The number of slots.
        count: usize,
    },

    /// Operand count changes on an operator with fixed arity, or below two.
    #[error("operand count cannot change to {requested}")]
    OperandCount {
        /// The count the edit would have produced.
        requested: usize,
    },
}
