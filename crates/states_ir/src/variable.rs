//! Named, sized machine variables and the registry that owns them.
//!
//! The [`VariableRegistry`] enforces name uniqueness and size limits, and
//! its [`write`](VariableRegistry::write) method is the single entry point
//! through which current values change.

use crate::arena::Arena;
use crate::error::IrError;
use crate::ids::VariableId;
use serde::{Deserialize, Serialize};
use states_common::{BitRange, BitValue};

/// Largest size a variable may have.
pub const MAX_VARIABLE_SIZE: u32 = 64;

/// The role a variable plays in the machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariableKind {
    /// Driven from outside the machine.
    Input,
    /// Driven by machine actions and visible outside.
    Output,
    /// Internal storage driven by machine actions.
    Local,
    /// Fixed value.
    Constant,
}

/// A named bit vector with an initial and a current value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    name: String,
    kind: VariableKind,
    initial_value: BitValue,
    current_value: BitValue,
}

impl Variable {
    /// The variable's unique, trimmed name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The variable's role.
    pub fn kind(&self) -> VariableKind {
        self.kind
    }

    /// Number of bits.
    pub fn size(&self) -> u32 {
        self.initial_value.size()
    }

    /// Value loaded on simulation reset.
    pub fn initial_value(&self) -> &BitValue {
        &self.initial_value
    }

    /// Value as of the last write.
    pub fn current_value(&self) -> &BitValue {
        &self.current_value
    }
}

/// Read access to variables by id.
///
/// Implemented by [`VariableRegistry`]; equation evaluation only needs this
/// view.
pub trait VariableSource {
    /// Returns the size of a variable, or `None` if the id is unknown.
    fn variable_size(&self, id: VariableId) -> Option<u32>;

    /// Returns the current value of a variable.
    fn variable_value(&self, id: VariableId) -> Option<&BitValue>;

    /// Returns the name of a variable.
    fn variable_name(&self, id: VariableId) -> Option<&str>;
}

/// Owner of all variables of a machine.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct VariableRegistry {
    variables: Arena<VariableId, Variable>,
}

impl VariableRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a variable initialized to zero.
    ///
    /// The name is trimmed and must be non-empty and unused.
    pub fn add_variable(
        &mut self,
        name: &str,
        kind: VariableKind,
        size: u32,
    ) -> Result<VariableId, IrError> {
        let name = self.check_name(name, None)?;
        check_size(size)?;
        Ok(self.variables.alloc(Variable {
            name,
            kind,
            initial_value: BitValue::zero(size),
            current_value: BitValue::zero(size),
        }))
    }

    /// Removes a variable, returning it.
    pub fn remove_variable(&mut self, id: VariableId) -> Result<Variable, IrError> {
        self.variables
            .remove(id)
            .ok_or(IrError::UnknownVariable(id))
    }

    /// Renames a variable. The new name is trimmed and must be unique.
    pub fn rename_variable(&mut self, id: VariableId, name: &str) -> Result<(), IrError> {
        if !self.variables.contains(id) {
            return Err(IrError::UnknownVariable(id));
        }
        let name = self.check_name(name, Some(id))?;
        if let Some(var) = self.variables.get_mut(id) {
            var.name = name;
        }
        Ok(())
    }

    /// Changes a variable's size; values grow with cleared bits or truncate.
    pub fn resize_variable(&mut self, id: VariableId, size: u32) -> Result<(), IrError> {
        check_size(size)?;
        let var = self
            .variables
            .get_mut(id)
            .ok_or(IrError::UnknownVariable(id))?;
        var.initial_value.resize(size);
        var.current_value.resize(size);
        Ok(())
    }

    /// Sets the value loaded on reset. For constants this is also the
    /// current value.
    pub fn set_initial_value(&mut self, id: VariableId, value: BitValue) -> Result<(), IrError> {
        let var = self
            .variables
            .get_mut(id)
            .ok_or(IrError::UnknownVariable(id))?;
        if value.size() != var.size() {
            return Err(IrError::SizeMismatch {
                expected: var.size(),
                found: value.size(),
            });
        }
        if var.kind == VariableKind::Constant {
            var.current_value = value.clone();
        }
        var.initial_value = value;
        Ok(())
    }

    /// Writes `value` into the addressed bits of a variable's current value.
    ///
    /// The range must fit the variable and the value size must equal the
    /// range width; nothing is written otherwise. Returns whether the
    /// current value changed.
    pub fn write(
        &mut self,
        id: VariableId,
        value: &BitValue,
        range: BitRange,
    ) -> Result<bool, IrError> {
        let var = self
            .variables
            .get_mut(id)
            .ok_or(IrError::UnknownVariable(id))?;
        if var.kind == VariableKind::Constant {
            return Err(IrError::ConstantWrite(var.name.clone()));
        }
        let size = var.size();
        let Some((msb, lsb)) = range.resolve(size) else {
            return Err(IrError::InvalidRange {
                range: format!("{range:?}"),
                size,
            });
        };
        if value.size() != msb - lsb + 1 {
            return Err(IrError::SizeMismatch {
                expected: msb - lsb + 1,
                found: value.size(),
            });
        }
        let mut next = var.current_value.clone();
        next.set_subrange(value, range);
        if next == var.current_value {
            return Ok(false);
        }
        var.current_value = next;
        Ok(true)
    }

    /// Restores a variable's current value to its initial value.
    ///
    /// Returns whether the current value changed. Applies to constants too.
    pub fn reset_to_initial(&mut self, id: VariableId) -> bool {
        match self.variables.get_mut(id) {
            Some(var) if var.current_value != var.initial_value => {
                var.current_value = var.initial_value.clone();
                true
            }
            _ => false,
        }
    }

    /// Returns a variable by id.
    pub fn variable(&self, id: VariableId) -> Option<&Variable> {
        self.variables.get(id)
    }

    /// Finds a variable by exact (trimmed) name.
    pub fn find(&self, name: &str) -> Option<VariableId> {
        let name = name.trim();
        self.variables
            .iter()
            .find(|(_, v)| v.name == name)
            .map(|(id, _)| id)
    }

    /// Iterates over all variables in creation order.
    pub fn iter(&self) -> impl Iterator<Item = (VariableId, &Variable)> {
        self.variables.iter()
    }

    /// Iterates over the ids of variables of one kind, in creation order.
    pub fn of_kind(&self, kind: VariableKind) -> impl Iterator<Item = VariableId> + '_ {
        self.variables
            .iter()
            .filter(move |(_, v)| v.kind == kind)
            .map(|(id, _)| id)
    }

    /// Returns the number of variables.
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    /// Returns `true` if there are no variables.
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    fn check_name(&self, name: &str, renaming: Option<VariableId>) -> Result<String, IrError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(IrError::EmptyName);
        }
        let taken = self
            .variables
            .iter()
            .any(|(id, v)| v.name == name && Some(id) != renaming);
        if taken {
            return Err(IrError::DuplicateName(name.to_string()));
        }
        Ok(name.to_string())
    }
}

impl VariableSource for VariableRegistry {
    fn variable_size(&self, id: VariableId) -> Option<u32> {
        self.variables.get(id).map(Variable::size)
    }

    fn variable_value(&self, id: VariableId) -> Option<&BitValue> {
        self.variables.get(id).map(Variable::current_value)
    }

    fn variable_name(&self, id: VariableId) -> Option<&str> {
        self.variables.get(id).map(Variable::name)
    }
}

fn check_size(size: u32) -> Result<(), IrError> {
    if size == 0 || size > MAX_VARIABLE_SIZE {
        return Err(IrError::InvalidSize(size));
    }
    Ok(())
}
