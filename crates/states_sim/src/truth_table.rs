//! Exhaustive enumeration of equation outputs over all input combinations.

use std::collections::HashMap;

use log::{debug, warn};
use states_common::BitValue;
use states_ir::{substitute, Equation, VariableId, VariableSource};

/// Widest input the table enumerates; wider inputs give an empty table.
pub const MAX_INPUT_WIDTH: u32 = 24;

/// Input and output values of a set of equations for every combination of
/// the variables they reference.
///
/// Rows start from the all-zero assignment. The composite input advances by
/// a ripple increment in which the last-collected variable varies fastest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TruthTable {
    variables: Vec<VariableId>,
    input_headers: Vec<String>,
    output_headers: Vec<String>,
    inputs: Vec<Vec<BitValue>>,
    outputs: Vec<Vec<BitValue>>,
}

impl TruthTable {
    /// Builds the table of `equations` against the variables of `vars`.
    ///
    /// Inputs wider than [`MAX_INPUT_WIDTH`] bits are not enumerated: the
    /// table keeps its headers and has no rows. Callers with their own
    /// lower limit check [`input_width`](Self::input_width) first.
    pub fn build(equations: &[&Equation], vars: &impl VariableSource) -> Self {
        let variables = collect_variables(equations, vars);
        let sizes: Vec<u32> = variables
            .iter()
            .map(|id| vars.variable_size(*id).unwrap_or(0))
            .collect();
        let width: u32 = sizes.iter().sum();
        if width > MAX_INPUT_WIDTH {
            warn!("truth table over {width} input bits exceeds {MAX_INPUT_WIDTH}; no rows built");
            return Self::empty(variables, equations, vars);
        }
        let row_count = 1usize << width;
        debug!(
            "enumerating {row_count} rows over {} variables",
            variables.len()
        );

        let mut current: Vec<BitValue> = sizes.iter().map(|size| BitValue::zero(*size)).collect();
        let mut inputs = Vec::with_capacity(row_count);
        let mut outputs = Vec::with_capacity(row_count);
        for _ in 0..row_count {
            let assignment: HashMap<VariableId, BitValue> = variables
                .iter()
                .copied()
                .zip(current.iter().cloned())
                .collect();
            outputs.push(
                equations
                    .iter()
                    .map(|eq| substitute(eq, &assignment).evaluate(vars))
                    .collect(),
            );
            inputs.push(current.clone());
            for slice in current.iter_mut().rev() {
                if !slice.increment() {
                    break;
                }
            }
        }

        let mut table = Self::empty(variables, equations, vars);
        table.inputs = inputs;
        table.outputs = outputs;
        table
    }

    fn empty(variables: Vec<VariableId>, equations: &[&Equation], vars: &impl VariableSource) -> Self {
        let input_headers = variables
            .iter()
            .map(|id| vars.variable_name(*id).unwrap_or("?").to_string())
            .collect();
        let output_headers = equations
            .iter()
            .map(|eq| eq.display(vars).to_string())
            .collect();
        Self {
            variables,
            input_headers,
            output_headers,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Total number of input bits the table of `equations` would enumerate.
    pub fn input_width(equations: &[&Equation], vars: &impl VariableSource) -> u32 {
        collect_variables(equations, vars)
            .iter()
            .filter_map(|id| vars.variable_size(*id))
            .sum()
    }

    /// The input variables, in column order.
    pub fn variables(&self) -> &[VariableId] {
        &self.variables
    }

    /// Number of rows.
    pub fn row_count(&self) -> usize {
        self.inputs.len()
    }

    /// Number of input columns, one per variable.
    pub fn input_count(&self) -> usize {
        self.variables.len()
    }

    /// Number of output columns, one per equation.
    pub fn output_count(&self) -> usize {
        self.output_headers.len()
    }

    /// The value of input column `col` in `row`.
    pub fn input_at(&self, row: usize, col: usize) -> Option<&BitValue> {
        self.inputs.get(row)?.get(col)
    }

    /// The value of output column `col` in `row`.
    pub fn output_at(&self, row: usize, col: usize) -> Option<&BitValue> {
        self.outputs.get(row)?.get(col)
    }

    /// Variable names heading the input columns.
    pub fn input_headers(&self) -> &[String] {
        &self.input_headers
    }

    /// Equation texts heading the output columns.
    pub fn output_headers(&self) -> &[String] {
        &self.output_headers
    }
}

/// Distinct variables referenced by `equations`, in first-seen order.
///
/// References to variables unknown to `vars` are skipped.
fn collect_variables(equations: &[&Equation], vars: &impl VariableSource) -> Vec<VariableId> {
    let mut out = Vec::new();
    for eq in equations {
        eq.collect_variables(&mut out);
    }
    out.retain(|id| vars.variable_size(*id).is_some());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use states_ir::{OperatorKind, VariableKind, VariableRegistry};

    fn row_text(table: &TruthTable, row: usize) -> String {
        let inputs = (0..table.input_count())
            .map(|c| table.input_at(row, c).unwrap().to_string())
            .collect::<Vec<_>>()
            .join(",");
        let outputs = (0..table.output_count())
            .map(|c| table.output_at(row, c).unwrap().to_string())
            .collect::<Vec<_>>()
            .join(",");
        format!("{inputs} -> {outputs}")
    }

    #[test]
    fn two_input_and() {
        let mut vars = VariableRegistry::new();
        let a = vars.add_variable("a", VariableKind::Input, 1).unwrap();
        let b = vars.add_variable("b", VariableKind::Input, 1).unwrap();
        let mut eq = Equation::new(OperatorKind::And, vec![a.into(), b.into()]);
        eq.validate(&vars);

        let table = TruthTable::build(&[&eq], &vars);
        assert_eq!(table.row_count(), 4);
        assert_eq!(table.input_headers(), &["a".to_string(), "b".to_string()]);
        assert_eq!(table.output_headers(), &["(a and b)".to_string()]);
        let rows: Vec<String> = (0..4).map(|r| row_text(&table, r)).collect();
        assert_eq!(rows, ["0,0 -> 0", "0,1 -> 0", "1,0 -> 0", "1,1 -> 1"]);
    }

    #[test]
    fn last_collected_variable_varies_fastest_across_slices() {
        let mut vars = VariableRegistry::new();
        let hi = vars.add_variable("hi", VariableKind::Input, 1).unwrap();
        let lo = vars.add_variable("lo", VariableKind::Input, 2).unwrap();
        let mut eq = Equation::new(OperatorKind::Concat, vec![hi.into(), lo.into()]);
        eq.validate(&vars);

        let table = TruthTable::build(&[&eq], &vars);
        assert_eq!(table.row_count(), 8);
        for row in 0..8 {
            let out = table.output_at(row, 0).unwrap();
            assert_eq!(out.to_u64(), Some(row as u64));
        }
        assert_eq!(table.input_at(4, 0).unwrap().to_string(), "1");
        assert_eq!(table.input_at(4, 1).unwrap().to_string(), "00");
    }

    #[test]
    fn variables_collected_across_equations_and_nesting() {
        let mut vars = VariableRegistry::new();
        let a = vars.add_variable("a", VariableKind::Input, 1).unwrap();
        let b = vars.add_variable("b", VariableKind::Input, 1).unwrap();
        let c = vars.add_variable("c", VariableKind::Input, 1).unwrap();
        let mut first = Equation::new(
            OperatorKind::Or,
            vec![
                c.into(),
                Equation::new(OperatorKind::Not, vec![a.into()]).into(),
            ],
        );
        let mut second = Equation::new(OperatorKind::Equal, vec![a.into(), b.into()]);
        first.validate(&vars);
        second.validate(&vars);

        assert_eq!(TruthTable::input_width(&[&first, &second], &vars), 3);
        let table = TruthTable::build(&[&first, &second], &vars);
        assert_eq!(table.variables(), &[c, a, b]);
        assert_eq!(table.row_count(), 8);
        assert_eq!(table.output_count(), 2);
        // Row 0: c=0 a=0 b=0 -> not a = 1, a = b.
        assert_eq!(row_text(&table, 0), "0,0,0 -> 1,1");
        // Row 3: c=0 a=1 b=1 -> 0, 1.
        assert_eq!(row_text(&table, 3), "0,1,1 -> 0,1");
    }

    #[test]
    fn constant_equation_has_one_row() {
        let vars = VariableRegistry::new();
        let mut eq = Equation::identity(BitValue::from_binary_str("10"));
        eq.validate(&vars);
        let table = TruthTable::build(&[&eq], &vars);
        assert_eq!(table.row_count(), 1);
        assert_eq!(table.input_count(), 0);
        assert_eq!(table.output_at(0, 0).unwrap().to_string(), "10");
        assert_eq!(table.output_at(1, 0), None);
    }

    #[test]
    fn failed_equation_yields_null_outputs() {
        let mut vars = VariableRegistry::new();
        let a = vars.add_variable("a", VariableKind::Input, 1).unwrap();
        let b = vars.add_variable("b", VariableKind::Input, 2).unwrap();
        let mut eq = Equation::new(OperatorKind::Xor, vec![a.into(), b.into()]);
        assert!(eq.validate(&vars).is_some());
        let table = TruthTable::build(&[&eq], &vars);
        assert_eq!(table.row_count(), 8);
        assert!((0..8).all(|r| table.output_at(r, 0).unwrap().is_null()));
    }

    #[test]
    fn wide_inputs_are_not_enumerated() {
        let mut vars = VariableRegistry::new();
        let hi = vars.add_variable("hi", VariableKind::Input, 32).unwrap();
        let lo = vars.add_variable("lo", VariableKind::Input, 30).unwrap();
        let mut eq = Equation::new(OperatorKind::Concat, vec![hi.into(), lo.into()]);
        eq.validate(&vars);

        assert_eq!(TruthTable::input_width(&[&eq], &vars), 62);
        let table = TruthTable::build(&[&eq], &vars);
        assert_eq!(table.row_count(), 0);
        assert_eq!(table.input_count(), 2);
        assert_eq!(table.output_headers(), &["(hi & lo)".to_string()]);
    }
}
