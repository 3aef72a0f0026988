//! Combinational equation trees.
//!
//! An [`Equation`] is an operator node over ordered operand slots. Each
//! [`Operand`] is a variable reference, a constant, or a nested equation
//! owned exclusively by its parent, so every equation is a tree.
//!
//! Structural faults (empty slot, size mismatch, bad extract range) are not
//! errors: [`Equation::validate`] records them as an [`EquationError`] on the
//! node, and a failed node evaluates to the null value until it is fixed.

use crate::error::IrError;
use crate::ids::VariableId;
use crate::variable::VariableSource;
use serde::{Deserialize, Serialize};
use states_common::{BitRange, BitValue};
use std::collections::HashMap;
use std::fmt;

/// Operator of an equation node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperatorKind {
    /// Bitwise complement of the single operand.
    Not,
    /// The single operand, unchanged.
    Identity,
    /// `1` when both operands are equal.
    Equal,
    /// `1` when the operands differ.
    Diff,
    /// A bit or bit range of the single operand.
    Extract,
    /// Bitwise AND of all operands.
    And,
    /// Bitwise OR of all operands.
    Or,
    /// Bitwise XOR of all operands.
    Xor,
    /// Complemented AND.
    Nand,
    /// Complemented OR.
    Nor,
    /// Complemented XOR.
    Xnor,
    /// Operands joined MSB-first.
    Concat,
}

/// How many operand slots an operator takes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Arity {
    /// Exactly one.
    Unary,
    /// Exactly two.
    Binary,
    /// Two or more.
    Variadic,
}

/// The computation an operator performs before the optional complement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BaseOperator {
    Identity,
    Equal,
    Extract,
    Concat,
    And,
    Or,
    Xor,
}

impl OperatorKind {
    /// Returns the operand arity of this operator.
    pub fn arity(self) -> Arity {
        match self {
            Self::Not | Self::Identity | Self::Extract => Arity::Unary,
            Self::Equal | Self::Diff => Arity::Binary,
            Self::And
            | Self::Or
            | Self::Xor
            | Self::Nand
            | Self::Nor
            | Self::Xnor
            | Self::Concat => Arity::Variadic,
        }
    }

    /// Returns `true` for operators that complement their base result.
    pub fn is_inverted(self) -> bool {
        matches!(
            self,
            Self::Not | Self::Diff | Self::Nand | Self::Nor | Self::Xnor
        )
    }

    fn base(self) -> BaseOperator {
        match self {
            Self::Not | Self::Identity => BaseOperator::Identity,
            Self::Equal | Self::Diff => BaseOperator::Equal,
            Self::Extract => BaseOperator::Extract,
            Self::Concat => BaseOperator::Concat,
            Self::And | Self::Nand => BaseOperator::And,
            Self::Or | Self::Nor => BaseOperator::Or,
            Self::Xor | Self::Xnor => BaseOperator::Xor,
        }
    }

    /// Number of slots a node of this kind keeps when it currently has
    /// `len`: fixed arities are exact, variadic ones hold at least two.
    fn slot_count(self, len: usize) -> usize {
        match self.arity() {
            Arity::Variadic => len.max(2),
            _ => self.default_operand_count(),
        }
    }

    /// Returns the number of operand slots a fresh node of this kind has.
    pub fn default_operand_count(self) -> usize {
        match self.arity() {
            Arity::Unary => 1,
            Arity::Binary | Arity::Variadic => 2,
        }
    }

    fn keyword(self) -> &'static str {
        match self {
            Self::Not => "not",
            Self::Identity | Self::Extract => "",
            Self::Equal => "=",
            Self::Diff => "/=",
            Self::And => "and",
            Self::Or => "or",
            Self::Xor => "xor",
            Self::Nand => "nand",
            Self::Nor => "nor",
            Self::Xnor => "xnor",
            Self::Concat => "&",
        }
    }
}

/// Why an equation node cannot produce a value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum EquationError {
    /// An operand slot is empty, or references a variable that no longer exists.
    #[error("an operand is missing")]
    NullOperand,
    /// A nested equation operand has a failure of its own.
    #[error("a nested equation is incomplete")]
    IncompleteOperand,
    /// Operand sizes are incompatible with the operator.
    #[error("operand sizes do not match")]
    SizeMismatch,
    /// An extract node has no range.
    #[error("extract range is missing")]
    MissingParameter,
    /// An extract range does not fit its operand.
    #[error("extract range does not fit the operand")]
    IncorrectParameter,
}

/// One input slot of an equation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    /// Non-owning reference to a variable.
    Variable(VariableId),
    /// A literal value.
    Constant(BitValue),
    /// A nested equation owned by this slot.
    Equation(Box<Equation>),
}

impl From<VariableId> for Operand {
    fn from(id: VariableId) -> Self {
        Operand::Variable(id)
    }
}

impl From<BitValue> for Operand {
    fn from(value: BitValue) -> Self {
        Operand::Constant(value)
    }
}

impl From<Equation> for Operand {
    fn from(equation: Equation) -> Self {
        Operand::Equation(Box::new(equation))
    }
}

/// A node of a combinational expression tree.
///
/// The slot count always fits the operator's arity, including for nodes
/// read back through serde.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawEquation")]
pub struct Equation {
    kind: OperatorKind,
    operands: Vec<Option<Operand>>,
    range: BitRange,
    /// Size computed by the last `validate`; 0 when failed.
    #[serde(skip)]
    size: u32,
    #[serde(skip)]
    failure: Option<EquationError>,
}

/// Serialized form of an [`Equation`], before slot normalization.
#[derive(Deserialize)]
struct RawEquation {
    kind: OperatorKind,
    operands: Vec<Option<Operand>>,
    range: BitRange,
}

impl From<RawEquation> for Equation {
    fn from(raw: RawEquation) -> Self {
        let mut operands = raw.operands;
        operands.resize_with(raw.kind.slot_count(operands.len()), || None);
        Self {
            kind: raw.kind,
            operands,
            range: raw.range,
            size: 0,
            failure: None,
        }
    }
}

impl Equation {
    /// Creates a node from the given operands.
    ///
    /// Missing slots up to the operator's arity are left empty; extra
    /// operands for a fixed-arity operator are dropped. The node must be
    /// [`validate`](Self::validate)d before its size and failure are known.
    pub fn new(kind: OperatorKind, operands: Vec<Operand>) -> Self {
        let mut slots: Vec<Option<Operand>> = operands.into_iter().map(Some).collect();
        slots.resize_with(kind.slot_count(slots.len()), || None);
        Self {
            kind,
            operands: slots,
            range: BitRange::All,
            size: 0,
            failure: None,
        }
    }

    /// Creates an identity node over one operand.
    pub fn identity(operand: impl Into<Operand>) -> Self {
        Self::new(OperatorKind::Identity, vec![operand.into()])
    }

    /// Creates an extract node over one operand.
    pub fn extract(operand: impl Into<Operand>, range: BitRange) -> Self {
        Self::new(OperatorKind::Extract, vec![operand.into()]).with_range(range)
    }

    /// Sets the extract range.
    pub fn with_range(mut self, range: BitRange) -> Self {
        self.range = range;
        self
    }

    /// The operator of this node.
    pub fn kind(&self) -> OperatorKind {
        self.kind
    }

    /// The operand slots in declaration order.
    pub fn operands(&self) -> &[Option<Operand>] {
        &self.operands
    }

    /// The extract range; [`BitRange::All`] when unset.
    pub fn range(&self) -> BitRange {
        self.range
    }

    /// Size computed by the last validation; 0 if the node failed.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Failure recorded by the last validation.
    pub fn failure(&self) -> Option<EquationError> {
        self.failure
    }

    /// Changes the operator, keeping leading operands that still fit.
    pub fn set_operator(&mut self, kind: OperatorKind) {
        self.operands
            .resize_with(kind.slot_count(self.operands.len()), || None);
        if kind != OperatorKind::Extract {
            self.range = BitRange::All;
        }
        self.kind = kind;
    }

    /// Fills an operand slot.
    pub fn set_operand(&mut self, index: usize, operand: impl Into<Operand>) -> Result<(), IrError> {
        let count = self.operands.len();
        let slot = self
            .operands
            .get_mut(index)
            .ok_or(IrError::OperandIndex { index, count })?;
        *slot = Some(operand.into());
        Ok(())
    }

    /// Empties an operand slot, returning its previous content.
    pub fn clear_operand(&mut self, index: usize) -> Result<Option<Operand>, IrError> {
        let count = self.operands.len();
        let slot = self
            .operands
            .get_mut(index)
            .ok_or(IrError::OperandIndex { index, count })?;
        Ok(slot.take())
    }

    /// Appends an empty slot to a variadic node.
    pub fn increase_operand_count(&mut self) -> Result<(), IrError> {
        let requested = self.operands.len() + 1;
        if self.kind.arity() != Arity::Variadic {
            return Err(IrError::OperandCount { requested });
        }
        self.operands.push(None);
        Ok(())
    }

    /// Drops the last slot of a variadic node, never going below two.
    pub fn decrease_operand_count(&mut self) -> Result<(), IrError> {
        let requested = self.operands.len().saturating_sub(1);
        if self.kind.arity() != Arity::Variadic || requested < 2 {
            return Err(IrError::OperandCount { requested });
        }
        self.operands.pop();
        Ok(())
    }

    /// Sets the extract range.
    pub fn set_range(&mut self, range: BitRange) {
        self.range = range;
    }

    /// Recomputes the cached size and failure of this node and all nested
    /// nodes. Returns the failure of this node, if any.
    pub fn validate(&mut self, vars: &impl VariableSource) -> Option<EquationError> {
        let mut sizes = Vec::with_capacity(self.operands.len());
        let mut failure = None;
        for slot in &mut self.operands {
            let size = match slot {
                None => None,
                Some(Operand::Variable(id)) => vars.variable_size(*id),
                Some(Operand::Constant(value)) => Some(value.size()).filter(|s| *s > 0),
                Some(Operand::Equation(eq)) => match eq.validate(vars) {
                    Some(_) => {
                        failure.get_or_insert(EquationError::IncompleteOperand);
                        Some(0)
                    }
                    None => Some(eq.size),
                },
            };
            match size {
                Some(size) => sizes.push(size),
                None => failure = Some(EquationError::NullOperand),
            }
        }
        let result = match failure {
            Some(err) => Err(err),
            None => self.size_from(&sizes),
        };
        match result {
            Ok(size) => {
                self.size = size;
                self.failure = None;
            }
            Err(err) => {
                self.size = 0;
                self.failure = Some(err);
            }
        }
        self.failure
    }

    fn size_from(&self, sizes: &[u32]) -> Result<u32, EquationError> {
        if sizes.len() != self.kind.slot_count(sizes.len()) {
            return Err(EquationError::NullOperand);
        }
        let first = sizes.first().copied().ok_or(EquationError::NullOperand)?;
        match self.kind.base() {
            BaseOperator::Identity => Ok(first),
            BaseOperator::Equal => match sizes {
                [a, b] if a == b => Ok(1),
                _ => Err(EquationError::SizeMismatch),
            },
            BaseOperator::Extract => match self.range {
                BitRange::All => Err(EquationError::MissingParameter),
                range => range
                    .resolve(first)
                    .map(|(msb, lsb)| msb - lsb + 1)
                    .ok_or(EquationError::IncorrectParameter),
            },
            BaseOperator::Concat => Ok(sizes.iter().sum()),
            BaseOperator::And | BaseOperator::Or | BaseOperator::Xor => {
                if sizes.windows(2).all(|w| w[0] == w[1]) {
                    Ok(first)
                } else {
                    Err(EquationError::SizeMismatch)
                }
            }
        }
    }

    /// Evaluates the tree against current variable values.
    ///
    /// A node with a recorded failure yields the null value.
    pub fn evaluate(&self, vars: &impl VariableSource) -> BitValue {
        if self.failure.is_some() {
            return BitValue::null();
        }
        let values: Vec<BitValue> = self
            .operands
            .iter()
            .map(|slot| match slot {
                None => BitValue::null(),
                Some(Operand::Variable(id)) => {
                    vars.variable_value(*id).cloned().unwrap_or_default()
                }
                Some(Operand::Constant(value)) => value.clone(),
                Some(Operand::Equation(eq)) => eq.evaluate(vars),
            })
            .collect();
        compute(self.kind, self.range, &values)
    }

    /// Returns every distinct variable referenced by the tree, in first-seen
    /// order.
    pub fn variables(&self) -> Vec<VariableId> {
        let mut out = Vec::new();
        self.collect_variables(&mut out);
        out
    }

    /// Appends variables not yet in `out`, in first-seen order.
    pub fn collect_variables(&self, out: &mut Vec<VariableId>) {
        for slot in self.operands.iter().flatten() {
            match slot {
                Operand::Variable(id) => {
                    if !out.contains(id) {
                        out.push(*id);
                    }
                }
                Operand::Constant(_) => {}
                Operand::Equation(eq) => eq.collect_variables(out),
            }
        }
    }

    /// Returns `true` if the tree references `id` anywhere.
    pub fn references(&self, id: VariableId) -> bool {
        self.operands.iter().flatten().any(|slot| match slot {
            Operand::Variable(v) => *v == id,
            Operand::Constant(_) => false,
            Operand::Equation(eq) => eq.references(id),
        })
    }

    /// Renders the tree as text, resolving variable names through `vars`.
    pub fn display<'a, V: VariableSource>(&'a self, vars: &'a V) -> EquationDisplay<'a, V> {
        EquationDisplay {
            equation: self,
            vars,
        }
    }
}

/// Applies an operator to already-computed operand values.
///
/// Any null operand makes the result null. This is the single place where
/// operator semantics live; static evaluation, the reactive evaluator and
/// truth tables all go through it.
pub fn compute(kind: OperatorKind, range: BitRange, operands: &[BitValue]) -> BitValue {
    if operands.is_empty() || operands.iter().any(BitValue::is_null) {
        return BitValue::null();
    }
    let raw = match kind.base() {
        BaseOperator::Identity => operands[0].clone(),
        BaseOperator::Equal => match operands {
            [a, b] if a.size() == b.size() => BitValue::from_bool(a == b),
            _ => BitValue::null(),
        },
        BaseOperator::Extract => match range {
            BitRange::All => BitValue::null(),
            range => operands[0].subrange(range),
        },
        BaseOperator::Concat => BitValue::concat(operands),
        BaseOperator::And => fold(operands, |a, b| a & b),
        BaseOperator::Or => fold(operands, |a, b| a | b),
        BaseOperator::Xor => fold(operands, |a, b| a ^ b),
    };
    if kind.is_inverted() {
        !&raw
    } else {
        raw
    }
}

fn fold(operands: &[BitValue], op: impl Fn(&BitValue, &BitValue) -> BitValue) -> BitValue {
    let mut acc = operands[0].clone();
    for value in &operands[1..] {
        acc = op(&acc, value);
    }
    acc
}

/// Returns a copy of `equation` where every reference to a variable in
/// `values` is replaced by a constant, recursively.
///
/// Substituted values are expected to have the size of the variable they
/// replace; cached sizes and failures are carried over unchanged.
pub fn substitute(equation: &Equation, values: &HashMap<VariableId, BitValue>) -> Equation {
    let operands = equation
        .operands
        .iter()
        .map(|slot| {
            slot.as_ref().map(|operand| match operand {
                Operand::Variable(id) => match values.get(id) {
                    Some(value) => Operand::Constant(value.clone()),
                    None => Operand::Variable(*id),
                },
                Operand::Constant(value) => Operand::Constant(value.clone()),
                Operand::Equation(eq) => Operand::Equation(Box::new(substitute(eq, values))),
            })
        })
        .collect();
    Equation {
        kind: equation.kind,
        operands,
        range: equation.range,
        size: equation.size,
        failure: equation.failure,
    }
}

/// Display adapter returned by [`Equation::display`].
pub struct EquationDisplay<'a, V> {
    equation: &'a Equation,
    vars: &'a V,
}

impl<V: VariableSource> EquationDisplay<'_, V> {
    fn operand(&self, f: &mut fmt::Formatter<'_>, slot: &Option<Operand>) -> fmt::Result {
        match slot {
            None => write!(f, "?"),
            Some(Operand::Variable(id)) => {
                write!(f, "{}", self.vars.variable_name(*id).unwrap_or("?"))
            }
            Some(Operand::Constant(value)) if value.size() == 1 => write!(f, "'{value}'"),
            Some(Operand::Constant(value)) => write!(f, "\"{value}\""),
            Some(Operand::Equation(eq)) => write!(f, "{}", eq.display(self.vars)),
        }
    }
}

impl<V: VariableSource> fmt::Display for EquationDisplay<'_, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let eq = self.equation;
        let first = eq.operands.first().unwrap_or(&None);
        match eq.kind {
            OperatorKind::Identity => self.operand(f, first),
            OperatorKind::Not => {
                write!(f, "not (")?;
                self.operand(f, first)?;
                write!(f, ")")
            }
            OperatorKind::Extract => {
                self.operand(f, first)?;
                write!(f, "{}", eq.range)
            }
            kind => {
                write!(f, "(")?;
                for (i, slot) in eq.operands.iter().enumerate() {
                    if i > 0 {
                        write!(f, " {} ", kind.keyword())?;
                    }
                    self.operand(f, slot)?;
                }
                write!(f, ")")
            }
        }
    }
}
