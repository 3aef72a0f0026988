//! The notification hub of one simulation session.

use std::collections::BTreeMap;

use log::info;
use states_common::{BitRange, BitValue};
use states_ir::{EquationId, Fsm, IrError, VariableId, VariableRegistry};

use crate::reactive::{ChangeListener, ReactiveEquation};

/// Callback invoked with a variable and its new current value.
pub type ValueListener = Box<dyn FnMut(VariableId, &BitValue)>;

/// Owns the reactive mirrors of every equation of a machine for one session.
///
/// Every variable write during simulation goes through
/// [`write`](Self::write): the registry validates and applies it, each
/// mirror reading the variable recomputes, and value listeners are invoked
/// once per effective change.
pub struct SignalSession {
    mirrors: BTreeMap<EquationId, ReactiveEquation>,
    value_listeners: Vec<ValueListener>,
}

impl SignalSession {
    /// Builds mirrors for every equation of `fsm` from its current values.
    pub fn start(fsm: &Fsm) -> Self {
        let mirrors: BTreeMap<_, _> = fsm
            .equations()
            .map(|(id, eq)| (id, ReactiveEquation::build(eq, fsm.variables())))
            .collect();
        info!("simulation session started with {} equations", mirrors.len());
        Self {
            mirrors,
            value_listeners: Vec::new(),
        }
    }

    /// Writes `value` into the addressed bits of a variable and propagates
    /// the change. Returns whether the current value changed.
    pub fn write(
        &mut self,
        vars: &mut VariableRegistry,
        id: VariableId,
        value: &BitValue,
        range: BitRange,
    ) -> Result<bool, IrError> {
        if !vars.write(id, value, range)? {
            return Ok(false);
        }
        self.propagate(vars, id);
        Ok(true)
    }

    /// Restores a variable to its initial value and propagates the change.
    pub fn reset_variable(&mut self, vars: &mut VariableRegistry, id: VariableId) -> bool {
        if !vars.reset_to_initial(id) {
            return false;
        }
        self.propagate(vars, id);
        true
    }

    fn propagate(&mut self, vars: &VariableRegistry, id: VariableId) {
        for mirror in self.mirrors.values_mut() {
            mirror.variable_changed(id, vars);
        }
        if let Some(var) = vars.variable(id) {
            let value = var.current_value();
            for listener in &mut self.value_listeners {
                listener(id, value);
            }
        }
    }

    /// Registers a callback invoked after any variable value changes.
    pub fn on_value_changed(&mut self, listener: ValueListener) {
        self.value_listeners.push(listener);
    }

    /// Registers a callback on one equation's mirror. Returns `false` for
    /// unknown equations.
    pub fn on_equation_changed(&mut self, id: EquationId, listener: ChangeListener) -> bool {
        match self.mirrors.get_mut(&id) {
            Some(mirror) => {
                mirror.on_changed(listener);
                true
            }
            None => false,
        }
    }

    /// The live value of an equation, or `None` for unknown ids.
    pub fn value(&self, id: EquationId) -> Option<&BitValue> {
        self.mirrors.get(&id).map(ReactiveEquation::value)
    }

    /// The mirror of an equation.
    pub fn mirror(&self, id: EquationId) -> Option<&ReactiveEquation> {
        self.mirrors.get(&id)
    }
}

impl std::fmt::Debug for SignalSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalSession")
            .field("mirrors", &self.mirrors)
            .field("value_listeners", &self.value_listeners.len())
            .finish()
    }
}
