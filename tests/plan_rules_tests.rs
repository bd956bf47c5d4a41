//! Scan selection, expansion rules and the remaining clauses.

mod support;

use std::collections::HashMap;

use cypher_planner::config::PlannerConfig;
use cypher_planner::cypher_ast::ast::*;
use cypher_planner::query_planner::operators::BoundType;
use cypher_planner::query_planner::{DatabaseIndexes, LogicalOperator};
use support::*;

/// Index oracle backed by a fixed table of (label, property) counts.
struct TestIndexes {
    counts: HashMap<(String, String), i64>,
}

impl TestIndexes {
    fn new(entries: &[(&str, &str, i64)]) -> Self {
        Self {
            counts: entries
                .iter()
                .map(|(label, property, count)| {
                    ((label.to_string(), property.to_string()), *count)
                })
                .collect(),
        }
    }
}

impl DatabaseIndexes for TestIndexes {
    fn label_property_index_exists(&self, label: &str, property: &str) -> bool {
        self.counts
            .contains_key(&(label.to_string(), property.to_string()))
    }

    fn vertices_count(&self, label: &str, property: &str) -> i64 {
        self.counts
            .get(&(label.to_string(), property.to_string()))
            .copied()
            .unwrap_or(i64::MAX)
    }
}

#[test]
fn inline_property_with_index_scans_by_value() {
    // MATCH (n:L {p: 5}) RETURN n, with an index on :L(p)
    let mut b = QueryBuilder::new();
    let n = b.node_atom_with_props("n", &["L"], vec![("p", int(5))]);
    let pattern = b.pattern(vec![PatternAtom::Node(n)]);
    let match_clause = b.match_clause(vec![pattern], None);
    let n_ref = b.ident("n");
    let item = b.named("n", n_ref);
    let return_clause = b.return_clause(vec![item]);

    let indexes = TestIndexes::new(&[("L", "p", 100)]);
    let plan = b
        .plan_with(
            vec![match_clause, return_clause],
            &indexes,
            &PlannerConfig::default(),
        )
        .unwrap();
    assert_eq!(
        op_names(&plan),
        ["Produce", "ScanAllByLabelPropertyValue", "Once"]
    );
    match nth_op(&plan, 1) {
        LogicalOperator::ScanAllByLabelPropertyValue(scan) => {
            assert_eq!(scan.label, "L");
            assert_eq!(scan.property, "p");
            assert_eq!(scan.expression, int(5));
        }
        other => panic!("expected value scan, got {}", other.name()),
    }
    assert_symbols_bound(&plan, &b.table);
}

#[test]
fn range_comparison_with_index_scans_by_range() {
    // MATCH (n:L) WHERE n.p > 3 RETURN n, with an index on :L(p)
    let mut b = QueryBuilder::new();
    let n = b.node_atom("n", &["L"]);
    let pattern = b.pattern(vec![PatternAtom::Node(n)]);
    let where_clause = Where {
        expression: gt(b.prop("n", "p"), int(3)),
    };
    let match_clause = b.match_clause(vec![pattern], Some(where_clause));
    let n_ref = b.ident("n");
    let item = b.named("n", n_ref);
    let return_clause = b.return_clause(vec![item]);

    let indexes = TestIndexes::new(&[("L", "p", 100)]);
    let plan = b
        .plan_with(
            vec![match_clause, return_clause],
            &indexes,
            &PlannerConfig::default(),
        )
        .unwrap();
    assert_eq!(
        op_names(&plan),
        ["Produce", "ScanAllByLabelPropertyRange", "Once"]
    );
    match nth_op(&plan, 1) {
        LogicalOperator::ScanAllByLabelPropertyRange(scan) => {
            let lower = scan.lower_bound.as_ref().expect("lower bound");
            assert_eq!(lower.bound_type, BoundType::Exclusive);
            assert_eq!(lower.expression, int(3));
            assert!(scan.upper_bound.is_none());
        }
        other => panic!("expected range scan, got {}", other.name()),
    }
    assert_symbols_bound(&plan, &b.table);
}

#[test]
fn small_indexed_side_expands_to_existing() {
    // MATCH (a:A {k: 2})-[e]->(b:B {id: 1}) RETURN a
    // :B(id) holds 5 vertices, below the threshold of 10: look b up by
    // index and expand to it as an existing node.
    let mut b = QueryBuilder::new();
    let a = b.node_atom_with_props("a", &["A"], vec![("k", int(2))]);
    let e = b.edge_atom("e", &[]);
    let node_b = b.node_atom_with_props("b", &["B"], vec![("id", int(1))]);
    let pattern = b.pattern(vec![
        PatternAtom::Node(a),
        PatternAtom::Edge(e),
        PatternAtom::Node(node_b),
    ]);
    let match_clause = b.match_clause(vec![pattern], None);
    let a_ref = b.ident("a");
    let item = b.named("a", a_ref);
    let return_clause = b.return_clause(vec![item]);

    let indexes = TestIndexes::new(&[("A", "k", 100), ("B", "id", 5)]);
    let plan = b
        .plan_with(
            vec![match_clause, return_clause],
            &indexes,
            &PlannerConfig::default(),
        )
        .unwrap();
    assert_eq!(
        op_names(&plan),
        [
            "Produce",
            "Expand",
            "ScanAllByLabelPropertyValue",
            "ScanAllByLabelPropertyValue",
            "Once"
        ]
    );
    match nth_op(&plan, 1) {
        LogicalOperator::Expand(expand) => {
            assert!(expand.existing_node);
            assert_eq!(expand.node_symbol.name, "b");
        }
        other => panic!("expected Expand, got {}", other.name()),
    }
    assert_symbols_bound(&plan, &b.table);
}

#[test]
fn threshold_minus_one_disables_expand_to_existing() {
    let mut b = QueryBuilder::new();
    let a = b.node_atom_with_props("a", &["A"], vec![("k", int(2))]);
    let e = b.edge_atom("e", &[]);
    let node_b = b.node_atom_with_props("b", &["B"], vec![("id", int(1))]);
    let pattern = b.pattern(vec![
        PatternAtom::Node(a),
        PatternAtom::Edge(e),
        PatternAtom::Node(node_b),
    ]);
    let match_clause = b.match_clause(vec![pattern], None);
    let a_ref = b.ident("a");
    let item = b.named("a", a_ref);
    let return_clause = b.return_clause(vec![item]);

    let indexes = TestIndexes::new(&[("A", "k", 100), ("B", "id", 5)]);
    let config = PlannerConfig {
        vertex_count_to_expand_existing: -1,
    };
    let plan = b
        .plan_with(vec![match_clause, return_clause], &indexes, &config)
        .unwrap();
    // b's constraints arrive as a plain filter above the regular expansion.
    assert_eq!(
        op_names(&plan),
        [
            "Produce",
            "Filter",
            "Expand",
            "ScanAllByLabelPropertyValue",
            "Once"
        ]
    );
    match nth_op(&plan, 2) {
        LogicalOperator::Expand(expand) => assert!(!expand.existing_node),
        other => panic!("expected Expand, got {}", other.name()),
    }
    assert_symbols_bound(&plan, &b.table);
}

#[test]
fn unwind_binds_its_alias() {
    // MATCH (n) UNWIND n.items AS x RETURN x
    let mut b = QueryBuilder::new();
    let n = b.node_atom("n", &[]);
    let pattern = b.pattern(vec![PatternAtom::Node(n)]);
    let match_clause = b.match_clause(vec![pattern], None);
    let list = b.prop("n", "items");
    let unwind_clause = b.unwind_clause("x", list);
    let x_ref = b.ident("x");
    let item = b.named("x", x_ref);
    let return_clause = b.return_clause(vec![item]);

    let plan = b
        .plan(vec![match_clause, unwind_clause, return_clause])
        .unwrap();
    assert_eq!(op_names(&plan), ["Produce", "Unwind", "ScanAll", "Once"]);
    match nth_op(&plan, 1) {
        LogicalOperator::Unwind(unwind) => assert_eq!(unwind.output_symbol.name, "x"),
        other => panic!("expected Unwind, got {}", other.name()),
    }
    assert_symbols_bound(&plan, &b.table);
    assert_single_introduction(&plan, &b.table);
}

#[test]
fn variable_length_edges_expand_variable() {
    // MATCH (a)-[e*1..3]->(b) RETURN a
    let mut b = QueryBuilder::new();
    let a = b.node_atom("a", &[]);
    let mut e = b.edge_atom("e", &[]);
    e.variable_length = Some(VariableLength {
        lower_bound: Some(1),
        upper_bound: Some(3),
    });
    let node_b = b.node_atom("b", &[]);
    let pattern = b.pattern(vec![
        PatternAtom::Node(a),
        PatternAtom::Edge(e),
        PatternAtom::Node(node_b),
    ]);
    let match_clause = b.match_clause(vec![pattern], None);
    let a_ref = b.ident("a");
    let item = b.named("a", a_ref);
    let return_clause = b.return_clause(vec![item]);

    let plan = b.plan(vec![match_clause, return_clause]).unwrap();
    assert_eq!(
        op_names(&plan),
        ["Produce", "ExpandVariable", "ScanAll", "Once"]
    );
    match nth_op(&plan, 1) {
        LogicalOperator::ExpandVariable(expand) => {
            assert_eq!(expand.lower_bound, Some(1));
            assert_eq!(expand.upper_bound, Some(3));
            assert!(!expand.existing_node);
        }
        other => panic!("expected ExpandVariable, got {}", other.name()),
    }
    assert_symbols_bound(&plan, &b.table);
}

#[test]
fn set_property_accumulates_into_return() {
    // MATCH (n) SET n.x = 1 RETURN n
    let mut b = QueryBuilder::new();
    let n = b.node_atom("n", &[]);
    let pattern = b.pattern(vec![PatternAtom::Node(n)]);
    let match_clause = b.match_clause(vec![pattern], None);
    let lookup = b.prop_lookup("n", "x");
    let set_clause = Clause::SetProperty(SetProperty {
        property_lookup: lookup,
        expression: int(1),
    });
    let n_ref = b.ident("n");
    let item = b.named("n", n_ref);
    let return_clause = b.return_clause(vec![item]);

    let plan = b
        .plan(vec![match_clause, set_clause, return_clause])
        .unwrap();
    assert_eq!(
        op_names(&plan),
        ["Produce", "Accumulate", "SetProperty", "ScanAll", "Once"]
    );
    match nth_op(&plan, 1) {
        LogicalOperator::Accumulate(accumulate) => assert!(!accumulate.advance_command),
        other => panic!("expected Accumulate, got {}", other.name()),
    }
    assert_symbols_bound(&plan, &b.table);
}

#[test]
fn write_before_with_advances_the_command() {
    // CREATE (a) WITH a RETURN a
    let mut b = QueryBuilder::new();
    let a = b.node_atom("a", &[]);
    let pattern = b.pattern(vec![PatternAtom::Node(a)]);
    let create_clause = Clause::Create(Create {
        patterns: vec![pattern],
    });
    let a_ref = b.ident("a");
    let a_item = b.named("a", a_ref);
    let with_clause = b.with_clause(vec![a_item], None);
    let a_again = b.ident("a");
    let return_item = b.named("a", a_again);
    let return_clause = b.return_clause(vec![return_item]);

    let plan = b
        .plan(vec![create_clause, with_clause, return_clause])
        .unwrap();
    assert_eq!(
        op_names(&plan),
        ["Produce", "Produce", "Accumulate", "CreateNode", "Once"]
    );
    match nth_op(&plan, 2) {
        LogicalOperator::Accumulate(accumulate) => assert!(accumulate.advance_command),
        other => panic!("expected Accumulate, got {}", other.name()),
    }
    assert_symbols_bound(&plan, &b.table);
}

#[test]
fn detach_delete_without_return_ends_the_pipeline() {
    // MATCH (n) DETACH DELETE n
    let mut b = QueryBuilder::new();
    let n = b.node_atom("n", &[]);
    let pattern = b.pattern(vec![PatternAtom::Node(n)]);
    let match_clause = b.match_clause(vec![pattern], None);
    let n_ref = b.ident("n");
    let delete_clause = Clause::Delete(Delete {
        expressions: vec![n_ref],
        detach: true,
    });

    let plan = b.plan(vec![match_clause, delete_clause]).unwrap();
    assert_eq!(op_names(&plan), ["Delete", "ScanAll", "Once"]);
    match &plan {
        LogicalOperator::Delete(delete) => assert!(delete.detach),
        other => panic!("expected Delete, got {}", other.name()),
    }
    assert_symbols_bound(&plan, &b.table);
}

#[test]
fn merge_plans_match_and_create_branches() {
    // MATCH (a) MERGE (a)-[e:R]->(b)
    //   ON MATCH SET b.seen = true ON CREATE SET b.created = true
    // RETURN a
    let mut b = QueryBuilder::new();
    let a = b.node_atom("a", &[]);
    let pattern = b.pattern(vec![PatternAtom::Node(a)]);
    let match_clause = b.match_clause(vec![pattern], None);

    let a_again = b.node_atom("a", &[]);
    let e = b.edge_atom("e", &["R"]);
    let node_b = b.node_atom("b", &[]);
    let merge_pattern = b.pattern(vec![
        PatternAtom::Node(a_again),
        PatternAtom::Edge(e),
        PatternAtom::Node(node_b),
    ]);
    let seen = b.prop_lookup("b", "seen");
    let created = b.prop_lookup("b", "created");
    let merge_clause = Clause::Merge(Merge {
        pattern: merge_pattern,
        on_match: vec![Clause::SetProperty(SetProperty {
            property_lookup: seen,
            expression: Expression::Literal(Literal::Boolean(true)),
        })],
        on_create: vec![Clause::SetProperty(SetProperty {
            property_lookup: created,
            expression: Expression::Literal(Literal::Boolean(true)),
        })],
    });
    let a_ref = b.ident("a");
    let item = b.named("a", a_ref);
    let return_clause = b.return_clause(vec![item]);

    let plan = b
        .plan(vec![match_clause, merge_clause, return_clause])
        .unwrap();
    assert_eq!(
        op_names(&plan),
        ["Produce", "Accumulate", "Merge", "ScanAll", "Once"]
    );
    match nth_op(&plan, 2) {
        LogicalOperator::Merge(merge) => {
            assert_eq!(op_names(&merge.merge_match), ["SetProperty", "Expand", "Once"]);
            assert_eq!(
                op_names(&merge.merge_create),
                ["SetProperty", "CreateExpand", "Once"]
            );
        }
        other => panic!("expected Merge, got {}", other.name()),
    }
    assert_symbols_bound(&plan, &b.table);
    assert_single_introduction(&plan, &b.table);
}

#[test]
fn optional_match_binds_nullable_symbols() {
    // MATCH (a) OPTIONAL MATCH (a)-[e]->(b) RETURN b
    let mut b = QueryBuilder::new();
    let a = b.node_atom("a", &[]);
    let pattern = b.pattern(vec![PatternAtom::Node(a)]);
    let match_clause = b.match_clause(vec![pattern], None);

    let a_again = b.node_atom("a", &[]);
    let e = b.edge_atom("e", &[]);
    let node_b = b.node_atom("b", &[]);
    let optional_pattern = b.pattern(vec![
        PatternAtom::Node(a_again),
        PatternAtom::Edge(e),
        PatternAtom::Node(node_b),
    ]);
    let optional_clause = Clause::Match(Match {
        optional: true,
        patterns: vec![optional_pattern],
        where_clause: None,
    });
    let b_ref = b.ident("b");
    let item = b.named("b", b_ref);
    let return_clause = b.return_clause(vec![item]);

    let plan = b
        .plan(vec![match_clause, optional_clause, return_clause])
        .unwrap();
    assert_eq!(op_names(&plan), ["Produce", "Optional", "ScanAll", "Once"]);
    match nth_op(&plan, 1) {
        LogicalOperator::Optional(optional) => {
            assert_eq!(op_names(&optional.optional), ["Expand", "Once"]);
            let names: Vec<&str> = optional
                .optional_symbols
                .iter()
                .map(|symbol| symbol.name.as_str())
                .collect();
            assert_eq!(names, ["e", "b"]);
        }
        other => panic!("expected Optional, got {}", other.name()),
    }
    assert_symbols_bound(&plan, &b.table);
    assert_single_introduction(&plan, &b.table);
}
