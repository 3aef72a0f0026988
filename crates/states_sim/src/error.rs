//! Simulation error types.
//!
//! Broken conditions and failed value computations never surface here; they
//! degrade to `false` or null. Only control mistakes by the caller do.

use states_ir::{IrError, TransitionId, VariableId};

/// Errors returned by simulation control operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SimError {
    /// The machine has no initial state to activate.
    #[error("machine has no initial state")]
    NoInitialState,

    /// The operation needs an active state; the simulator is idle.
    #[error("simulation is idle; reset it first")]
    Idle,

    /// An ambiguity must be resolved before ticking can continue.
    #[error("an ambiguity between {0} transitions is pending")]
    AmbiguityPending(usize),

    /// `resolve_ambiguity` was called with nothing to resolve.
    #[error("no ambiguity is pending")]
    NoAmbiguityPending,

    /// The chosen transition is not one of the ambiguous candidates.
    #[error("{0} is not a pending candidate")]
    NotACandidate(TransitionId),

    /// The variable is not an input and cannot be driven from outside.
    #[error("{0} is not an input variable")]
    NotAnInput(VariableId),

    /// A bit index lies outside the variable.
    #[error("bit {bit} is out of range for a {size}-bit variable")]
    BitOutOfRange {
        /// The requested bit.
        bit: u32,
        /// The variable size.
        size: u32,
    },

    /// The underlying write was rejected by the variable registry.
    #[error(transparent)]
    Ir(#[from] IrError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(SimError::NoInitialState.to_string(), "machine has no initial state");
        assert_eq!(
            SimError::AmbiguityPending(2).to_string(),
            "an ambiguity between 2 transitions is pending"
        );
        assert_eq!(
            SimError::BitOutOfRange { bit: 4, size: 2 }.to_string(),
            "bit 4 is out of range for a 2-bit variable"
        );
    }

    #[test]
    fn ir_errors_are_transparent() {
        let err = SimError::from(IrError::EmptyName);
        assert_eq!(err.to_string(), IrError::EmptyName.to_string());
    }
}
