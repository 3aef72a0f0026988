//! Live mirrors of equation trees with incremental recomputation.
//!
//! A [`ReactiveEquation`] flattens a static [`Equation`] into nodes stored in
//! post-order, so every child sits at a lower index than its parent. A
//! variable change marks the nodes that read the variable directly as dirty;
//! dirty nodes are then recomputed in ascending index order and a node whose
//! value changed marks its parent. Each node is therefore recomputed at most
//! once per change, and the root notifies its listeners at most once, even
//! when the variable feeds several branches of the tree.

use std::collections::{BTreeSet, HashMap};

use log::trace;
use states_common::{BitRange, BitValue};
use states_ir::{compute, Equation, Operand, OperatorKind, VariableId, VariableSource};

/// Callback invoked with the new root value after it changed.
pub type ChangeListener = Box<dyn FnMut(&BitValue)>;

#[derive(Debug)]
enum NodeInput {
    Variable(VariableId),
    Constant(BitValue),
    Node(usize),
    Empty,
}

#[derive(Debug)]
struct MirrorNode {
    kind: OperatorKind,
    range: BitRange,
    inputs: Vec<NodeInput>,
    parent: Option<usize>,
    value: BitValue,
    /// Set when the source node carried a failure at build time.
    invalid: bool,
    recomputes: u64,
}

/// The simulated mirror of one equation tree.
pub struct ReactiveEquation {
    nodes: Vec<MirrorNode>,
    /// Variable to the nodes that read it as a direct operand.
    subscriptions: HashMap<VariableId, Vec<usize>>,
    listeners: Vec<ChangeListener>,
}

impl ReactiveEquation {
    /// Builds the mirror of `equation` and computes every node once.
    ///
    /// A node whose source recorded a failure stays null for the lifetime
    /// of the mirror, even if the failure is later corrected.
    pub fn build(equation: &Equation, vars: &impl VariableSource) -> Self {
        let mut mirror = Self {
            nodes: Vec::new(),
            subscriptions: HashMap::new(),
            listeners: Vec::new(),
        };
        mirror.add_node(equation);
        for index in 0..mirror.nodes.len() {
            mirror.recompute(index, vars);
        }
        mirror
    }

    fn add_node(&mut self, equation: &Equation) -> usize {
        let mut inputs = Vec::with_capacity(equation.operands().len());
        let mut children = Vec::new();
        let mut variables = Vec::new();
        for slot in equation.operands() {
            let input = match slot {
                None => NodeInput::Empty,
                Some(Operand::Variable(id)) => {
                    variables.push(*id);
                    NodeInput::Variable(*id)
                }
                Some(Operand::Constant(value)) => NodeInput::Constant(value.clone()),
                Some(Operand::Equation(child)) => {
                    let index = self.add_node(child);
                    children.push(index);
                    NodeInput::Node(index)
                }
            };
            inputs.push(input);
        }
        let index = self.nodes.len();
        self.nodes.push(MirrorNode {
            kind: equation.kind(),
            range: equation.range(),
            inputs,
            parent: None,
            value: BitValue::null(),
            invalid: equation.failure().is_some(),
            recomputes: 0,
        });
        for child in children {
            self.nodes[child].parent = Some(index);
        }
        for id in variables {
            let subscribers = self.subscriptions.entry(id).or_default();
            if !subscribers.contains(&index) {
                subscribers.push(index);
            }
        }
        index
    }

    /// Recomputes one node. Returns whether its value changed.
    fn recompute(&mut self, index: usize, vars: &impl VariableSource) -> bool {
        let node = &self.nodes[index];
        let next = if node.invalid {
            BitValue::null()
        } else {
            let values: Vec<BitValue> = node
                .inputs
                .iter()
                .map(|input| match input {
                    NodeInput::Variable(id) => vars.variable_value(*id).cloned().unwrap_or_default(),
                    NodeInput::Constant(value) => value.clone(),
                    NodeInput::Node(child) => self.nodes[*child].value.clone(),
                    NodeInput::Empty => BitValue::null(),
                })
                .collect();
            compute(node.kind, node.range, &values)
        };
        let node = &mut self.nodes[index];
        node.recomputes += 1;
        if next == node.value {
            return false;
        }
        trace!("mirror node {index} ({:?}) -> {next}", node.kind);
        node.value = next;
        true
    }

    /// Propagates a change of `variable` through the tree.
    ///
    /// Listeners are invoked once if the root value changed. Returns whether
    /// it did.
    pub fn variable_changed(&mut self, variable: VariableId, vars: &impl VariableSource) -> bool {
        let Some(subscribers) = self.subscriptions.get(&variable) else {
            return false;
        };
        let mut dirty: BTreeSet<usize> = subscribers.iter().copied().collect();
        let mut root_changed = false;
        while let Some(index) = dirty.pop_first() {
            if !self.recompute(index, vars) {
                continue;
            }
            match self.nodes[index].parent {
                Some(parent) => {
                    dirty.insert(parent);
                }
                None => root_changed = true,
            }
        }
        if root_changed {
            let value = &self.nodes[self.nodes.len() - 1].value;
            for listener in &mut self.listeners {
                listener(value);
            }
        }
        root_changed
    }

    /// Registers a callback invoked after the root value changes.
    pub fn on_changed(&mut self, listener: ChangeListener) {
        self.listeners.push(listener);
    }

    /// The current root value.
    pub fn value(&self) -> &BitValue {
        // Construction always pushes at least the root.
        &self.nodes[self.nodes.len() - 1].value
    }

    /// Returns `false` when the root failed at build time.
    pub fn is_valid(&self) -> bool {
        !self.nodes[self.nodes.len() - 1].invalid
    }

    /// Returns `true` if any node reads `variable` directly.
    pub fn depends_on(&self, variable: VariableId) -> bool {
        self.subscriptions.contains_key(&variable)
    }

    /// Number of mirror nodes, nested equations included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// How many times the root has been recomputed, the initial
    /// computation included.
    pub fn root_recompute_count(&self) -> u64 {
        self.nodes[self.nodes.len() - 1].recomputes
    }
}

impl std::fmt::Debug for ReactiveEquation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReactiveEquation")
            .field("nodes", &self.nodes)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use states_ir::{VariableKind, VariableRegistry};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn write(vars: &mut VariableRegistry, id: VariableId, bits: &str) {
        vars.write(id, &BitValue::from_binary_str(bits), BitRange::All)
            .unwrap();
    }

    #[test]
    fn shared_input_recomputes_root_once() {
        let mut vars = VariableRegistry::new();
        let x = vars.add_variable("x", VariableKind::Input, 1).unwrap();
        let y = vars.add_variable("y", VariableKind::Input, 1).unwrap();
        let z = vars.add_variable("z", VariableKind::Input, 1).unwrap();
        write(&mut vars, y, "1");
        write(&mut vars, z, "1");

        // (x and y) or (x and z)
        let mut eq = Equation::new(
            OperatorKind::Or,
            vec![
                Equation::new(OperatorKind::And, vec![x.into(), y.into()]).into(),
                Equation::new(OperatorKind::And, vec![x.into(), z.into()]).into(),
            ],
        );
        assert_eq!(eq.validate(&vars), None);

        let mut mirror = ReactiveEquation::build(&eq, &vars);
        assert_eq!(mirror.node_count(), 3);
        assert_eq!(mirror.value().to_string(), "0");
        assert_eq!(mirror.root_recompute_count(), 1);

        let notifications = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&notifications);
        mirror.on_changed(Box::new(move |v| sink.borrow_mut().push(v.to_string())));

        write(&mut vars, x, "1");
        assert!(mirror.variable_changed(x, &vars));
        assert_eq!(mirror.root_recompute_count(), 2);
        assert_eq!(*notifications.borrow(), vec!["1".to_string()]);
    }

    #[test]
    fn unchanged_child_stops_propagation() {
        let mut vars = VariableRegistry::new();
        let a = vars.add_variable("a", VariableKind::Input, 1).unwrap();
        let b = vars.add_variable("b", VariableKind::Input, 1).unwrap();
        let c = vars.add_variable("c", VariableKind::Input, 1).unwrap();
        // (a and b) or c, with b = 0: toggling a leaves the AND at 0.
        let mut eq = Equation::new(
            OperatorKind::Or,
            vec![
                Equation::new(OperatorKind::And, vec![a.into(), b.into()]).into(),
                c.into(),
            ],
        );
        eq.validate(&vars);
        let mut mirror = ReactiveEquation::build(&eq, &vars);

        write(&mut vars, a, "1");
        assert!(!mirror.variable_changed(a, &vars));
        assert_eq!(mirror.root_recompute_count(), 1);

        write(&mut vars, c, "1");
        assert!(mirror.variable_changed(c, &vars));
        assert_eq!(mirror.value().to_string(), "1");
    }

    #[test]
    fn unrelated_variable_is_ignored() {
        let mut vars = VariableRegistry::new();
        let a = vars.add_variable("a", VariableKind::Input, 2).unwrap();
        let other = vars.add_variable("other", VariableKind::Input, 1).unwrap();
        let mut eq = Equation::new(OperatorKind::Not, vec![a.into()]);
        eq.validate(&vars);
        let mut mirror = ReactiveEquation::build(&eq, &vars);
        assert!(mirror.depends_on(a));
        assert!(!mirror.depends_on(other));
        write(&mut vars, other, "1");
        assert!(!mirror.variable_changed(other, &vars));
        assert_eq!(mirror.value().to_string(), "11");
    }

    #[test]
    fn failed_source_stays_null() {
        let mut vars = VariableRegistry::new();
        let a = vars.add_variable("a", VariableKind::Input, 1).unwrap();
        let b = vars.add_variable("b", VariableKind::Input, 2).unwrap();
        let mut eq = Equation::new(OperatorKind::And, vec![a.into(), b.into()]);
        assert!(eq.validate(&vars).is_some());

        let mut mirror = ReactiveEquation::build(&eq, &vars);
        assert!(!mirror.is_valid());
        assert!(mirror.value().is_null());
        write(&mut vars, a, "1");
        assert!(!mirror.variable_changed(a, &vars));
        assert!(mirror.value().is_null());
    }

    #[test]
    fn extract_and_concat_follow_inputs() {
        let mut vars = VariableRegistry::new();
        let bus = vars.add_variable("bus", VariableKind::Input, 4).unwrap();
        let flag = vars.add_variable("flag", VariableKind::Input, 1).unwrap();
        let mut eq = Equation::new(
            OperatorKind::Concat,
            vec![
                flag.into(),
                Equation::extract(bus, BitRange::Span { msb: 2, lsb: 1 }).into(),
            ],
        );
        assert_eq!(eq.validate(&vars), None);
        let mut mirror = ReactiveEquation::build(&eq, &vars);
        assert_eq!(mirror.value().to_string(), "000");

        write(&mut vars, bus, "0110");
        mirror.variable_changed(bus, &vars);
        assert_eq!(mirror.value().to_string(), "011");

        write(&mut vars, flag, "1");
        mirror.variable_changed(flag, &vars);
        assert_eq!(mirror.value().to_string(), "111");
    }
}
