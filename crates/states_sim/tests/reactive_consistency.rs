//! Property: after any sequence of writes, every live mirror agrees with a
//! from-scratch evaluation of its equation.

use proptest::prelude::*;
use states_common::{BitRange, BitValue};
use states_ir::{Equation, EquationId, Fsm, OperatorKind, VariableId, VariableKind};
use states_sim::SignalSession;

struct Bench {
    fsm: Fsm,
    bus: VariableId,
    x: VariableId,
    y: VariableId,
    equations: Vec<EquationId>,
}

fn bench() -> Bench {
    let mut fsm = Fsm::new();
    let bus = fsm.add_variable("bus", VariableKind::Input, 4).unwrap();
    let x = fsm.add_variable("x", VariableKind::Input, 1).unwrap();
    let y = fsm.add_variable("y", VariableKind::Local, 1).unwrap();

    let mixed = fsm.add_equation(Equation::new(
        OperatorKind::Concat,
        vec![
            Equation::new(
                OperatorKind::Xor,
                vec![Equation::extract(bus, BitRange::Bit(0)).into(), x.into()],
            )
            .into(),
            Equation::new(
                OperatorKind::Nand,
                vec![x.into(), Equation::extract(bus, BitRange::Bit(3)).into()],
            )
            .into(),
            Equation::new(
                OperatorKind::Equal,
                vec![bus.into(), BitValue::from_binary_str("1010").into()],
            )
            .into(),
            Equation::new(
                OperatorKind::Not,
                vec![Equation::extract(bus, BitRange::Span { msb: 2, lsb: 1 }).into()],
            )
            .into(),
        ],
    ));
    let shared = fsm.add_equation(Equation::new(
        OperatorKind::And,
        vec![
            Equation::new(OperatorKind::Or, vec![x.into(), y.into()]).into(),
            Equation::new(OperatorKind::Xnor, vec![x.into(), y.into()]).into(),
        ],
    ));
    let broken = fsm.add_equation(Equation::new(OperatorKind::And, vec![bus.into(), x.into()]));

    Bench {
        fsm,
        bus,
        x,
        y,
        equations: vec![mixed, shared, broken],
    }
}

proptest! {
    #[test]
    fn mirrors_match_static_evaluation(
        writes in prop::collection::vec((0usize..3, any::<u8>(), 0u32..5), 0..40)
    ) {
        let Bench { mut fsm, bus, x, y, equations } = bench();
        let mut session = SignalSession::start(&fsm);

        for (target, raw, bit) in writes {
            let (id, value, range) = match target {
                0 if bit < 4 => (bus, BitValue::from_bool(raw & 1 == 1), BitRange::Bit(bit)),
                0 => (bus, BitValue::from_u64(u64::from(raw & 0xF), 4), BitRange::All),
                1 => (x, BitValue::from_bool(raw & 1 == 1), BitRange::All),
                _ => (y, BitValue::from_bool(raw & 1 == 1), BitRange::All),
            };
            session.write(fsm.variables_mut(), id, &value, range).unwrap();

            for eq in &equations {
                let expected = fsm.equation(*eq).unwrap().evaluate(fsm.variables());
                prop_assert_eq!(session.value(*eq).unwrap(), &expected);
            }
        }
    }
}
