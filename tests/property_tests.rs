//! Property tests: printing and parsing agree, and the lattice behaves.

mod common;

use proptest::prelude::*;

use common::fixture_table;
use ruleset_engine::{
    Expression, Instruction, Intensity, Metric, Requirement, ScaledExpression, Type,
};

// ---------------------------------------------------------------------------
// Strategies
//
// Generated trees stay within what the printer can round-trip: collections
// never directly nest a same-precedence collection (the printer would flatten
// them), and `Per` never wraps another `Per`.
// ---------------------------------------------------------------------------

fn class_name() -> impl Strategy<Value = &'static str> {
    prop::sample::select(&["Foo", "Plant", "Heat", "Energy", "Steel", "Titanium"][..])
}

fn expression() -> impl Strategy<Value = Expression> {
    let leaf = class_name().prop_map(Expression::name);
    (class_name(), prop::collection::vec(leaf, 0..3))
        .prop_map(|(name, args)| Expression::of(name, args))
}

fn scaled() -> impl Strategy<Value = ScaledExpression> {
    (1..9i64, expression()).prop_map(|(n, e)| ScaledExpression::new(n, e))
}

fn requirement_leaf() -> impl Strategy<Value = Requirement> {
    prop_oneof![
        scaled().prop_map(Requirement::Min),
        scaled().prop_map(Requirement::Max),
        scaled().prop_map(Requirement::Exact),
    ]
}

fn or_of_leaves() -> impl Strategy<Value = Requirement> {
    prop::collection::vec(requirement_leaf(), 2..4).prop_map(Requirement::Or)
}

fn and_of_leaves() -> impl Strategy<Value = Requirement> {
    prop::collection::vec(requirement_leaf(), 2..4).prop_map(Requirement::And)
}

fn requirement() -> impl Strategy<Value = Requirement> {
    prop_oneof![
        requirement_leaf(),
        or_of_leaves(),
        prop::collection::vec(prop_oneof![requirement_leaf(), or_of_leaves()], 2..4)
            .prop_map(Requirement::And),
        prop::collection::vec(prop_oneof![requirement_leaf(), and_of_leaves()], 2..4)
            .prop_map(Requirement::Or),
    ]
}

fn intensity() -> impl Strategy<Value = Option<Intensity>> {
    prop_oneof![
        Just(None),
        Just(Some(Intensity::Mandatory)),
        Just(Some(Intensity::Amap)),
        Just(Some(Intensity::Optional)),
    ]
}

fn change() -> impl Strategy<Value = Instruction> {
    prop_oneof![
        (scaled(), intensity())
            .prop_map(|(scaled, intensity)| Instruction::Gain { scaled, intensity }),
        (scaled(), intensity())
            .prop_map(|(scaled, intensity)| Instruction::Remove { scaled, intensity }),
        (1..9i64, expression(), expression(), intensity()).prop_map(
            |(count, gaining, removing, intensity)| Instruction::Transmute {
                count,
                gaining,
                removing,
                intensity,
            }
        ),
    ]
}

fn node() -> impl Strategy<Value = Instruction> {
    let gated = (requirement(), any::<bool>(), change()).prop_map(|(gate, mandatory, inner)| {
        Instruction::Gated {
            gate,
            mandatory,
            inner: Box::new(inner),
        }
    });
    let per = (change(), 1..4i64, expression()).prop_map(|(inner, unit, e)| Instruction::Per {
        inner: Box::new(inner),
        metric: Metric::new(unit, e),
    });
    prop_oneof![change(), gated, per]
}

fn or_node() -> impl Strategy<Value = Instruction> {
    prop::collection::vec(node(), 2..4).prop_map(Instruction::Or)
}

fn then_node() -> impl Strategy<Value = Instruction> {
    prop::collection::vec(prop_oneof![node(), or_node()], 2..4).prop_map(Instruction::Then)
}

fn instruction() -> impl Strategy<Value = Instruction> {
    let multi = prop::collection::vec(prop_oneof![node(), or_node(), then_node()], 2..4)
        .prop_map(Instruction::Multi);
    prop_oneof![node(), or_node(), then_node(), multi]
}

fn refined_expression() -> impl Strategy<Value = Expression> {
    (expression(), prop::option::of(requirement_leaf())).prop_map(|(e, r)| match r {
        Some(r) => e.has(r),
        None => e,
    })
}

// ---------------------------------------------------------------------------
// Printing and parsing agree
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn test_instruction_round_trips_through_text(original in instruction()) {
        let text = original.to_string();
        let parsed: Instruction = text.parse().unwrap();
        prop_assert_eq!(parsed, original, "text was {}", text);
    }

    #[test]
    fn test_requirement_round_trips_through_text(original in requirement()) {
        let text = original.to_string();
        let parsed: Requirement = text.parse().unwrap();
        prop_assert_eq!(parsed, original, "text was {}", text);
    }

    #[test]
    fn test_expression_round_trips_through_text(original in refined_expression()) {
        let text = original.to_string();
        let parsed: Expression = text.parse().unwrap();
        prop_assert_eq!(parsed, original, "text was {}", text);
    }
}

// ---------------------------------------------------------------------------
// The lattice behaves
// ---------------------------------------------------------------------------

const FIXTURE_TYPES: &[&str] = &[
    "Component",
    "Foo",
    "Player",
    "Player1",
    "Player2",
    "Owned",
    "Owned<Player2>",
    "Heat",
    "Heat<Player1>",
    "Heat<Player2>",
    "Plant",
    "Energy",
    "Class<Heat>",
];

fn fixture_type() -> impl Strategy<Value = &'static str> {
    prop::sample::select(FIXTURE_TYPES)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_subtyping_reflexive(text in fixture_type()) {
        let table = fixture_table();
        let t: Type = table.resolve(&text.parse().unwrap()).unwrap();
        prop_assert!(table.is_subtype(&t, &t));
    }

    #[test]
    fn test_glb_commutes(a in fixture_type(), b in fixture_type()) {
        let table = fixture_table();
        let a: Type = table.resolve(&a.parse().unwrap()).unwrap();
        let b: Type = table.resolve(&b.parse().unwrap()).unwrap();
        prop_assert_eq!(table.glb(&a, &b).ok(), table.glb(&b, &a).ok());
    }

    #[test]
    fn test_glb_idempotent(text in fixture_type()) {
        let table = fixture_table();
        let t: Type = table.resolve(&text.parse().unwrap()).unwrap();
        prop_assert_eq!(table.glb(&t, &t).unwrap(), t);
    }

    #[test]
    fn test_glb_is_a_lower_bound(a in fixture_type(), b in fixture_type()) {
        let table = fixture_table();
        let a: Type = table.resolve(&a.parse().unwrap()).unwrap();
        let b: Type = table.resolve(&b.parse().unwrap()).unwrap();
        if let Ok(glb) = table.glb(&a, &b) {
            prop_assert!(table.is_subtype(&glb, &a));
            prop_assert!(table.is_subtype(&glb, &b));
        }
    }
}
