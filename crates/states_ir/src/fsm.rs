//! The finite-state-machine graph.
//!
//! An [`Fsm`] owns its variables, its top-level equations, its states and
//! its transitions. A state's outgoing list is the authoritative, owning
//! adjacency; the incoming lists are a derived index rebuilt on load and
//! never consulted to decide what gets destroyed.
//!
//! Invariant: every transition's source and target resolve to a live state.
//! Removing a state first removes every transition touching it.

use std::collections::HashMap;

use log::debug;
use serde::{Deserialize, Serialize};
use states_common::BitValue;

use crate::action::{Action, ActionKind};
use crate::arena::Arena;
use crate::equation::Equation;
use crate::error::IrError;
use crate::ids::{EquationId, StateId, TransitionId, VariableId};
use crate::naming::unique_name;
use crate::variable::{VariableKind, VariableRegistry};

/// A state of the machine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FsmState {
    name: String,
    outgoing: Vec<TransitionId>,
    actions: Vec<Action>,
}

impl FsmState {
    /// The state's machine-unique name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Transitions leaving this state, in creation order.
    pub fn outgoing(&self) -> &[TransitionId] {
        &self.outgoing
    }

    /// Actions performed while this state is active.
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }
}

/// A transition between two states.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FsmTransition {
    source: StateId,
    target: StateId,
    condition: Option<EquationId>,
    actions: Vec<Action>,
}

impl FsmTransition {
    /// The state this transition leaves.
    pub fn source(&self) -> StateId {
        self.source
    }

    /// The state this transition enters.
    pub fn target(&self) -> StateId {
        self.target
    }

    /// The guarding equation; `None` means always true.
    pub fn condition(&self) -> Option<EquationId> {
        self.condition
    }

    /// Actions performed when the transition is crossed.
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }
}

/// A finite state machine: variables, equations, states and transitions.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Fsm {
    variables: VariableRegistry,
    equations: Arena<EquationId, Equation>,
    states: Arena<StateId, FsmState>,
    transitions: Arena<TransitionId, FsmTransition>,
    initial_state: Option<StateId>,
    #[serde(skip)]
    incoming: HashMap<StateId, Vec<TransitionId>>,
}

impl Fsm {
    /// Creates an empty machine.
    pub fn new() -> Self {
        Self::default()
    }

    // ---- variables ----

    /// Read access to the variables.
    pub fn variables(&self) -> &VariableRegistry {
        &self.variables
    }

    /// Write access to variable values.
    ///
    /// Structural edits (add, remove, rename, resize) must go through the
    /// `Fsm` methods so that equations and actions stay consistent.
    pub fn variables_mut(&mut self) -> &mut VariableRegistry {
        &mut self.variables
    }

    /// Adds a variable. See [`VariableRegistry::add_variable`].
    pub fn add_variable(
        &mut self,
        name: &str,
        kind: VariableKind,
        size: u32,
    ) -> Result<VariableId, IrError> {
        let id = self.variables.add_variable(name, kind, size)?;
        self.revalidate_equations();
        Ok(id)
    }

    /// Removes a variable together with every action on it.
    ///
    /// Equation operands that referenced it are left in place and record a
    /// null-operand failure.
    pub fn remove_variable(&mut self, id: VariableId) -> Result<(), IrError> {
        self.variables.remove_variable(id)?;
        for (_, state) in self.states.iter_mut() {
            state.actions.retain(|a| a.variable != id);
        }
        for (_, transition) in self.transitions.iter_mut() {
            transition.actions.retain(|a| a.variable != id);
        }
        self.revalidate_equations();
        Ok(())
    }

    /// Renames a variable. See [`VariableRegistry::rename_variable`].
    pub fn rename_variable(&mut self, id: VariableId, name: &str) -> Result<(), IrError> {
        self.variables.rename_variable(id, name)
    }

    /// Resizes a variable and revalidates every equation.
    ///
    /// Rejected, leaving the machine unchanged, when an attached action
    /// would no longer fit the new size (a range past the top bit or an
    /// action value of the old width).
    pub fn resize_variable(&mut self, id: VariableId, size: u32) -> Result<(), IrError> {
        if let Some(var) = self.variables.variable(id) {
            let kind = var.kind();
            let attached = self
                .states
                .values()
                .flat_map(|s| s.actions.iter())
                .chain(self.transitions.values().flat_map(|t| t.actions.iter()))
                .filter(|a| a.variable == id);
            for action in attached {
                if let Err(err) = check_action_fits(action, kind, var.name(), size) {
                    debug!("resize of {id} to {size} bits rejected: {err}");
                    return Err(err);
                }
            }
        }
        self.variables.resize_variable(id, size)?;
        self.revalidate_equations();
        Ok(())
    }

    /// Sets a variable's initial value.
    pub fn set_initial_value(&mut self, id: VariableId, value: BitValue) -> Result<(), IrError> {
        self.variables.set_initial_value(id, value)
    }

    // ---- equations ----

    /// Adds a top-level equation, validating it against the variables.
    pub fn add_equation(&mut self, mut equation: Equation) -> EquationId {
        equation.validate(&self.variables);
        self.equations.alloc(equation)
    }

    /// Returns an equation by id.
    pub fn equation(&self, id: EquationId) -> Option<&Equation> {
        self.equations.get(id)
    }

    /// Iterates over all top-level equations in creation order.
    pub fn equations(&self) -> impl Iterator<Item = (EquationId, &Equation)> {
        self.equations.iter()
    }

    /// Edits an equation in place, then revalidates it.
    pub fn edit_equation<R>(
        &mut self,
        id: EquationId,
        edit: impl FnOnce(&mut Equation) -> R,
    ) -> Result<R, IrError> {
        let equation = self
            .equations
            .get_mut(id)
            .ok_or(IrError::UnknownEquation(id))?;
        let result = edit(equation);
        equation.validate(&self.variables);
        Ok(result)
    }

    /// Removes an equation; transitions guarded by it become unconditional.
    pub fn remove_equation(&mut self, id: EquationId) -> Result<Equation, IrError> {
        let equation = self
            .equations
            .remove(id)
            .ok_or(IrError::UnknownEquation(id))?;
        for (_, transition) in self.transitions.iter_mut() {
            if transition.condition == Some(id) {
                transition.condition = None;
            }
        }
        Ok(equation)
    }

    fn revalidate_equations(&mut self) {
        for (_, equation) in self.equations.iter_mut() {
            equation.validate(&self.variables);
        }
    }

    // ---- states ----

    /// Adds a state. The name is disambiguated rather than rejected.
    pub fn add_state(&mut self, proposal: &str) -> StateId {
        let name = self.unique_state_name(proposal);
        debug!("add state '{name}'");
        self.states.alloc(FsmState {
            name,
            outgoing: Vec::new(),
            actions: Vec::new(),
        })
    }

    /// Removes a state after removing every transition that touches it.
    ///
    /// Clears the initial-state pointer if it designated this state.
    pub fn remove_state(&mut self, id: StateId) -> Result<FsmState, IrError> {
        if !self.states.contains(id) {
            return Err(IrError::UnknownState(id));
        }
        let touching: Vec<TransitionId> = self
            .transitions
            .iter()
            .filter(|(_, t)| t.source == id || t.target == id)
            .map(|(tid, _)| tid)
            .collect();
        for tid in touching {
            self.remove_transition(tid)?;
        }
        self.incoming.remove(&id);
        if self.initial_state == Some(id) {
            self.initial_state = None;
        }
        self.states.remove(id).ok_or(IrError::UnknownState(id))
    }

    /// Renames a state. The name is trimmed and must be non-empty and unique.
    pub fn rename_state(&mut self, id: StateId, name: &str) -> Result<(), IrError> {
        if !self.states.contains(id) {
            return Err(IrError::UnknownState(id));
        }
        let name = name.trim();
        if name.is_empty() {
            return Err(IrError::EmptyName);
        }
        if self.states.iter().any(|(sid, s)| sid != id && s.name == name) {
            return Err(IrError::DuplicateName(name.to_string()));
        }
        if let Some(state) = self.states.get_mut(id) {
            state.name = name.to_string();
        }
        Ok(())
    }

    /// Returns the first free state name derived from `proposal`.
    pub fn unique_state_name(&self, proposal: &str) -> String {
        unique_name(proposal, |candidate| {
            self.states.values().any(|s| s.name == candidate)
        })
    }

    /// Designates the initial state, or clears it with `None`.
    pub fn set_initial_state(&mut self, id: Option<StateId>) -> Result<(), IrError> {
        if let Some(id) = id {
            if !self.states.contains(id) {
                return Err(IrError::UnknownState(id));
            }
        }
        self.initial_state = id;
        Ok(())
    }

    /// The initial state, if any.
    pub fn initial_state(&self) -> Option<StateId> {
        self.initial_state
    }

    /// Returns a state by id.
    pub fn state(&self, id: StateId) -> Option<&FsmState> {
        self.states.get(id)
    }

    /// Iterates over all states in creation order.
    pub fn states(&self) -> impl Iterator<Item = (StateId, &FsmState)> {
        self.states.iter()
    }

    /// Finds a state by trimmed name.
    pub fn find_state(&self, name: &str) -> Option<StateId> {
        let name = name.trim();
        self.states
            .iter()
            .find(|(_, s)| s.name == name)
            .map(|(id, _)| id)
    }

    /// Transitions leaving `id`; empty for unknown states.
    pub fn outgoing(&self, id: StateId) -> &[TransitionId] {
        self.states
            .get(id)
            .map(|s| s.outgoing.as_slice())
            .unwrap_or(&[])
    }

    /// Transitions entering `id`; empty for unknown states.
    pub fn incoming(&self, id: StateId) -> &[TransitionId] {
        self.incoming.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    // ---- transitions ----

    /// Adds a transition between two live states.
    pub fn add_transition(
        &mut self,
        source: StateId,
        target: StateId,
        condition: Option<EquationId>,
    ) -> Result<TransitionId, IrError> {
        self.check_endpoints(source, target)?;
        if let Some(eq) = condition {
            if !self.equations.contains(eq) {
                return Err(IrError::UnknownEquation(eq));
            }
        }
        let id = self.transitions.alloc(FsmTransition {
            source,
            target,
            condition,
            actions: Vec::new(),
        });
        self.link(id, source, target);
        Ok(id)
    }

    /// Removes a transition and unlinks it from both endpoints.
    pub fn remove_transition(&mut self, id: TransitionId) -> Result<FsmTransition, IrError> {
        let transition = self
            .transitions
            .remove(id)
            .ok_or(IrError::UnknownTransition(id))?;
        self.unlink(id, transition.source, transition.target);
        Ok(transition)
    }

    /// Moves a transition to new endpoints.
    pub fn redirect_transition(
        &mut self,
        id: TransitionId,
        source: StateId,
        target: StateId,
    ) -> Result<(), IrError> {
        self.check_endpoints(source, target)?;
        let (old_source, old_target) = {
            let t = self
                .transitions
                .get_mut(id)
                .ok_or(IrError::UnknownTransition(id))?;
            let old = (t.source, t.target);
            t.source = source;
            t.target = target;
            old
        };
        self.unlink(id, old_source, old_target);
        self.link(id, source, target);
        Ok(())
    }

    /// Sets or clears a transition's condition.
    pub fn set_condition(
        &mut self,
        id: TransitionId,
        condition: Option<EquationId>,
    ) -> Result<(), IrError> {
        if let Some(eq) = condition {
            if !self.equations.contains(eq) {
                return Err(IrError::UnknownEquation(eq));
            }
        }
        let transition = self
            .transitions
            .get_mut(id)
            .ok_or(IrError::UnknownTransition(id))?;
        transition.condition = condition;
        Ok(())
    }

    /// Returns a transition by id.
    pub fn transition(&self, id: TransitionId) -> Option<&FsmTransition> {
        self.transitions.get(id)
    }

    /// Iterates over all transitions in creation order.
    pub fn transitions(&self) -> impl Iterator<Item = (TransitionId, &FsmTransition)> {
        self.transitions.iter()
    }

    fn check_endpoints(&self, source: StateId, target: StateId) -> Result<(), IrError> {
        for id in [source, target] {
            if !self.states.contains(id) {
                return Err(IrError::UnknownState(id));
            }
        }
        Ok(())
    }

    fn link(&mut self, id: TransitionId, source: StateId, target: StateId) {
        if let Some(state) = self.states.get_mut(source) {
            state.outgoing.push(id);
        }
        self.incoming.entry(target).or_default().push(id);
    }

    fn unlink(&mut self, id: TransitionId, source: StateId, target: StateId) {
        if let Some(state) = self.states.get_mut(source) {
            state.outgoing.retain(|t| *t != id);
        }
        if let Some(list) = self.incoming.get_mut(&target) {
            list.retain(|t| *t != id);
        }
    }

    // ---- actions ----

    /// Attaches an action to a state. Returns its index in the action list.
    pub fn add_state_action(&mut self, state: StateId, action: Action) -> Result<usize, IrError> {
        if !self.states.contains(state) {
            return Err(IrError::UnknownState(state));
        }
        self.check_action(&action)?;
        let actions = &mut self
            .states
            .get_mut(state)
            .ok_or(IrError::UnknownState(state))?
            .actions;
        actions.push(action);
        Ok(actions.len() - 1)
    }

    /// Detaches the action at `index` from a state.
    pub fn remove_state_action(&mut self, state: StateId, index: usize) -> Result<Action, IrError> {
        let actions = &mut self
            .states
            .get_mut(state)
            .ok_or(IrError::UnknownState(state))?
            .actions;
        if index >= actions.len() {
            return Err(IrError::UnknownAction(index));
        }
        Ok(actions.remove(index))
    }

    /// Attaches an action to a transition. `ActiveOnState` is rejected.
    pub fn add_transition_action(
        &mut self,
        transition: TransitionId,
        action: Action,
    ) -> Result<usize, IrError> {
        if !self.transitions.contains(transition) {
            return Err(IrError::UnknownTransition(transition));
        }
        if action.kind == ActionKind::ActiveOnState {
            return Err(IrError::ActionNotAllowed {
                kind: action.kind,
                context: "transitions",
            });
        }
        self.check_action(&action)?;
        let actions = &mut self
            .transitions
            .get_mut(transition)
            .ok_or(IrError::UnknownTransition(transition))?
            .actions;
        actions.push(action);
        Ok(actions.len() - 1)
    }

    /// Detaches the action at `index` from a transition.
    pub fn remove_transition_action(
        &mut self,
        transition: TransitionId,
        index: usize,
    ) -> Result<Action, IrError> {
        let actions = &mut self
            .transitions
            .get_mut(transition)
            .ok_or(IrError::UnknownTransition(transition))?
            .actions;
        if index >= actions.len() {
            return Err(IrError::UnknownAction(index));
        }
        Ok(actions.remove(index))
    }

    fn check_action(&self, action: &Action) -> Result<(), IrError> {
        let var = self
            .variables
            .variable(action.variable)
            .ok_or(IrError::UnknownVariable(action.variable))?;
        check_action_fits(action, var.kind(), var.name(), var.size())
    }

    // ---- persistence support ----

    /// Rebuilds derived indices and cached equation data after
    /// deserialization.
    pub fn rebuild_indices(&mut self) {
        self.incoming.clear();
        for (id, transition) in self.transitions.iter() {
            self.incoming.entry(transition.target).or_default().push(id);
        }
        self.revalidate_equations();
    }
}

/// Checks an action against a variable of the given kind and size.
///
/// `Assign` needs a value of the range width; `Pulse` and `ActiveOnState`
/// need one only when they carry a value.
fn check_action_fits(
    action: &Action,
    kind: VariableKind,
    name: &str,
    size: u32,
) -> Result<(), IrError> {
    if kind == VariableKind::Constant {
        return Err(IrError::ConstantWrite(name.to_string()));
    }
    let Some((msb, lsb)) = action.range.resolve(size) else {
        return Err(IrError::InvalidRange {
            range: format!("{:?}", action.range),
            size,
        });
    };
    let width = msb - lsb + 1;
    let carries_value = match action.kind {
        ActionKind::Assign => true,
        ActionKind::Pulse | ActionKind::ActiveOnState => !action.value.is_null(),
        _ => false,
    };
    if carries_value && action.value.size() != width {
        return Err(IrError::SizeMismatch {
            expected: width,
            found: action.value.size(),
        });
    }
    Ok(())
}
