//! Actions that states and transitions perform on variables.

use serde::{Deserialize, Serialize};
use states_common::{BitRange, BitValue};

use crate::ids::VariableId;

/// What an action does to its variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    /// Drives the active value for exactly one tick.
    Pulse,
    /// Drives the active value while the owning state is active (states only).
    ActiveOnState,
    /// Stores all ones.
    Set,
    /// Stores all zeros.
    Reset,
    /// Stores the action's value.
    Assign,
    /// Adds one.
    Increment,
    /// Subtracts one.
    Decrement,
}

/// When and how long an action's write lasts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActionCategory {
    /// Undone on the next tick.
    Pulse,
    /// Held while the owner is active, re-applied every tick for counters.
    Continuous,
    /// Persists until overwritten.
    Memorized,
}

/// An action on (a range of) one variable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// The variable acted upon.
    pub variable: VariableId,
    /// What the action does.
    pub kind: ActionKind,
    /// Value used by `Assign`, and by `Pulse`/`ActiveOnState` when non-null.
    pub value: BitValue,
    /// The addressed bits of the variable.
    pub range: BitRange,
}

impl Action {
    /// Creates an action over the whole variable with no explicit value.
    pub fn new(variable: VariableId, kind: ActionKind) -> Self {
        Self {
            variable,
            kind,
            value: BitValue::null(),
            range: BitRange::All,
        }
    }

    /// Sets the action value.
    pub fn with_value(mut self, value: BitValue) -> Self {
        self.value = value;
        self
    }

    /// Restricts the action to a range of the variable.
    pub fn with_range(mut self, range: BitRange) -> Self {
        self.range = range;
        self
    }

    /// Category of this action when attached to a state.
    pub fn category_on_state(&self) -> ActionCategory {
        match self.kind {
            ActionKind::Pulse => ActionCategory::Pulse,
            ActionKind::ActiveOnState | ActionKind::Increment | ActionKind::Decrement => {
                ActionCategory::Continuous
            }
            ActionKind::Set | ActionKind::Reset | ActionKind::Assign => ActionCategory::Memorized,
        }
    }

    /// Category of this action when attached to a transition.
    pub fn category_on_transition(&self) -> ActionCategory {
        match self.kind {
            ActionKind::Pulse | ActionKind::ActiveOnState => ActionCategory::Pulse,
            _ => ActionCategory::Memorized,
        }
    }

    /// Returns `true` for actions that hold a level rather than compute
    /// from the current value.
    pub fn is_level(&self) -> bool {
        !matches!(self.kind, ActionKind::Increment | ActionKind::Decrement)
    }

    /// Computes the bits the action writes, given the current bits of the
    /// addressed range.
    ///
    /// Returns the null value when the action value does not match the
    /// range width.
    pub fn next_value(&self, current: &BitValue) -> BitValue {
        let width = current.size();
        match self.kind {
            ActionKind::Pulse | ActionKind::ActiveOnState => {
                if self.value.is_null() {
                    BitValue::one(width)
                } else {
                    self.checked_value(width)
                }
            }
            ActionKind::Set => BitValue::one(width),
            ActionKind::Reset => BitValue::zero(width),
            ActionKind::Assign => self.checked_value(width),
            ActionKind::Increment => {
                let mut next = current.clone();
                next.increment();
                next
            }
            ActionKind::Decrement => {
                let mut next = current.clone();
                next.decrement();
                next
            }
        }
    }

    fn checked_value(&self, width: u32) -> BitValue {
        if self.value.size() == width {
            self.value.clone()
        } else {
            BitValue::null()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var() -> VariableId {
        VariableId::from_raw(0)
    }

    #[test]
    fn categories() {
        let inc = Action::new(var(), ActionKind::Increment);
        assert_eq!(inc.category_on_state(), ActionCategory::Continuous);
        assert_eq!(inc.category_on_transition(), ActionCategory::Memorized);
        let pulse = Action::new(var(), ActionKind::Pulse);
        assert_eq!(pulse.category_on_state(), ActionCategory::Pulse);
        assert_eq!(pulse.category_on_transition(), ActionCategory::Pulse);
        let set = Action::new(var(), ActionKind::Set);
        assert_eq!(set.category_on_state(), ActionCategory::Memorized);
    }

    #[test]
    fn next_values() {
        let cur = BitValue::from_binary_str("011");
        assert_eq!(
            Action::new(var(), ActionKind::Set).next_value(&cur),
            BitValue::one(3)
        );
        assert_eq!(
            Action::new(var(), ActionKind::Reset).next_value(&cur),
            BitValue::zero(3)
        );
        assert_eq!(
            Action::new(var(), ActionKind::Increment)
                .next_value(&cur)
                .to_string(),
            "100"
        );
        assert_eq!(
            Action::new(var(), ActionKind::Decrement)
                .next_value(&cur)
                .to_string(),
            "010"
        );
        assert_eq!(
            Action::new(var(), ActionKind::Pulse).next_value(&cur),
            BitValue::one(3)
        );
    }

    #[test]
    fn assign_requires_matching_width() {
        let cur = BitValue::zero(2);
        let ok = Action::new(var(), ActionKind::Assign).with_value(BitValue::from_binary_str("10"));
        assert_eq!(ok.next_value(&cur).to_string(), "10");
        let bad = Action::new(var(), ActionKind::Assign).with_value(BitValue::from_binary_str("1"));
        assert!(bad.next_value(&cur).is_null());
    }
}
