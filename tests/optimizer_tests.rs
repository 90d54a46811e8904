//! Plan rewriter integration tests

use std::sync::Arc;

use relq::allocator::{PlanNodeIdAllocator, SymbolAllocator};
use relq::expr::{ComparisonOp, Expression};
use relq::functions::FunctionResolution;
use relq::lookup::IdentityLookup;
use relq::optimizer::{verify, Context, Optimizer};
use relq::plan::display::format_plan;
use relq::plan::{
    search_first, AggregateCall, AggregationStep, Assignments, JoinKind, PlanNode,
    SetOperationMapping, Variable,
};
use relq::types::DataType;
use relq::PlannerError;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn bigint(name: &str) -> Variable {
    Variable::new(name, DataType::Bigint)
}

fn scan(ids: &mut PlanNodeIdAllocator, table: &str, columns: &[&str]) -> Arc<PlanNode> {
    Arc::new(PlanNode::Scan {
        id: ids.next_id(),
        table: table.to_string(),
        outputs: columns.iter().map(|c| bigint(c)).collect(),
    })
}

fn count_column(argument: &str) -> AggregateCall {
    AggregateCall {
        function: FunctionResolution.count_column_function(),
        arguments: vec![Expression::symbol(argument)],
        filter: None,
        order_by: Vec::new(),
        distinct: false,
        mask: None,
    }
}

/// Run the default rewrite pipeline on a hand-built plan
fn optimize(plan: Arc<PlanNode>, ids: &mut PlanNodeIdAllocator) -> Arc<PlanNode> {
    init_tracing();
    let mut symbols = SymbolAllocator::from_plan(&plan);
    let mut context = Context::new(&mut symbols, ids, &IdentityLookup);
    Optimizer::new(FunctionResolution)
        .optimize(plan, &mut context)
        .expect("optimization should succeed")
}

fn output_names(plan: &PlanNode) -> Vec<String> {
    plan.output_variables().into_iter().map(|v| v.name).collect()
}

// ============ Count Simplification ============

fn count_over_project(
    ids: &mut PlanNodeIdAllocator,
    projected: Expression,
) -> Arc<PlanNode> {
    let source = scan(ids, "t", &["x"]);
    let mut assignments = Assignments::new();
    assignments.put(bigint("s"), projected);
    let project = Arc::new(PlanNode::Project {
        id: ids.next_id(),
        source,
        assignments,
    });
    Arc::new(PlanNode::Aggregation {
        id: ids.next_id(),
        source: project,
        aggregations: vec![(bigint("c"), count_column("s"))],
        grouping_set: vec![],
        step: AggregationStep::Single,
        hash_variable: None,
        group_id_variable: None,
    })
}

#[test]
fn test_count_over_constant_becomes_count_star() {
    let mut ids = PlanNodeIdAllocator::new();
    let plan = count_over_project(&mut ids, Expression::Long(7));
    let optimized = optimize(plan, &mut ids);

    match &*optimized {
        PlanNode::Aggregation {
            source,
            aggregations,
            ..
        } => {
            assert!(matches!(&**source, PlanNode::Project { .. }));
            assert_eq!(aggregations.len(), 1);
            assert!(aggregations[0].1.arguments.is_empty());
        }
        other => panic!("Expected Aggregation, got {:?}", other),
    }
}

#[test]
fn test_count_over_null_is_unchanged() {
    let mut ids = PlanNodeIdAllocator::new();
    let plan = count_over_project(&mut ids, Expression::Null);
    let before = format_plan(&plan);
    let optimized = optimize(plan, &mut ids);
    assert_eq!(format_plan(&optimized), before);
}

// ============ Set Operations ============

fn two_source_set_operation(
    ids: &mut PlanNodeIdAllocator,
    except: bool,
) -> Arc<PlanNode> {
    let s1 = scan(ids, "s1", &["x"]);
    let s2 = scan(ids, "s2", &["y"]);
    let mut mapping = SetOperationMapping::new();
    mapping.put(bigint("a"), vec![bigint("x"), bigint("y")]);
    let id = ids.next_id();
    if except {
        Arc::new(PlanNode::Except {
            id,
            sources: vec![s1, s2],
            mapping,
        })
    } else {
        Arc::new(PlanNode::Intersect {
            id,
            sources: vec![s1, s2],
            mapping,
        })
    }
}

/// Walk the project/filter/aggregation/union spine shared by the two
/// set-operation rewrites, returning the filter predicate
fn set_operation_spine(plan: &PlanNode) -> &Expression {
    let PlanNode::Project { source, .. } = plan else {
        panic!("Expected Project at the root");
    };
    let PlanNode::Filter {
        source: aggregation,
        predicate,
        ..
    } = &**source
    else {
        panic!("Expected Filter under the projection");
    };
    let PlanNode::Aggregation {
        source: union,
        aggregations,
        grouping_set,
        ..
    } = &**aggregation
    else {
        panic!("Expected Aggregation under the filter");
    };
    assert_eq!(grouping_set.len(), 1, "grouped by the set-op outputs");
    assert_eq!(aggregations.len(), 2, "one count per source");
    let PlanNode::Union { sources, .. } = &**union else {
        panic!("Expected Union under the aggregation");
    };
    assert_eq!(sources.len(), 2);
    for branch in sources {
        assert!(matches!(&**branch, PlanNode::Project { .. }));
    }
    predicate
}

#[test]
fn test_intersect_is_lowered_to_union() {
    let mut ids = PlanNodeIdAllocator::new();
    let plan = two_source_set_operation(&mut ids, false);
    let optimized = optimize(plan, &mut ids);

    assert_eq!(output_names(&optimized), vec!["a"]);
    let predicate = set_operation_spine(&optimized);
    let Expression::And(conjuncts) = predicate else {
        panic!("Expected conjunctive filter, got {:?}", predicate);
    };
    assert!(conjuncts.iter().all(|c| matches!(
        c,
        Expression::Comparison {
            op: ComparisonOp::GtEq,
            ..
        }
    )));
}

#[test]
fn test_except_is_lowered_to_union() {
    let mut ids = PlanNodeIdAllocator::new();
    let plan = two_source_set_operation(&mut ids, true);
    let optimized = optimize(plan, &mut ids);

    assert_eq!(output_names(&optimized), vec!["a"]);
    let predicate = set_operation_spine(&optimized);
    let Expression::And(conjuncts) = predicate else {
        panic!("Expected conjunctive filter, got {:?}", predicate);
    };
    assert_eq!(conjuncts.len(), 2);
    assert!(matches!(
        conjuncts[0],
        Expression::Comparison {
            op: ComparisonOp::GtEq,
            ..
        }
    ));
    assert!(matches!(
        conjuncts[1],
        Expression::Comparison {
            op: ComparisonOp::Eq,
            ..
        }
    ));
}

#[test]
fn test_nested_set_operations_expand_fully() {
    let mut ids = PlanNodeIdAllocator::new();
    let inner = two_source_set_operation(&mut ids, false);
    let s3 = scan(&mut ids, "s3", &["z"]);
    let mut mapping = SetOperationMapping::new();
    mapping.put(bigint("r"), vec![bigint("a"), bigint("z")]);
    let plan = Arc::new(PlanNode::Intersect {
        id: ids.next_id(),
        sources: vec![inner, s3],
        mapping,
    });

    let optimized = optimize(plan, &mut ids);
    assert_eq!(output_names(&optimized), vec!["r"]);
    let leftover = search_first(&optimized, &IdentityLookup, &|node| {
        matches!(node, PlanNode::Intersect { .. } | PlanNode::Except { .. })
    });
    assert!(leftover.is_none(), "no set operations may remain");
}

// ============ Correlated IN ============

fn correlated_in_apply(ids: &mut PlanNodeIdAllocator) -> Arc<PlanNode> {
    // A(k, v); subquery Filter(b_k = k) over B(b_k, b); o := v IN b
    let input = scan(ids, "a", &["k", "v"]);
    let subquery = Arc::new(PlanNode::Filter {
        id: ids.next_id(),
        source: scan(ids, "b", &["b_k", "b"]),
        predicate: Expression::compare(
            ComparisonOp::Eq,
            Expression::symbol("b_k"),
            Expression::symbol("k"),
        ),
    });
    let mut subquery_assignments = Assignments::new();
    subquery_assignments.put(
        Variable::new("o", DataType::Boolean),
        Expression::In {
            value: Box::new(Expression::symbol("v")),
            value_list: Box::new(Expression::symbol("b")),
        },
    );
    Arc::new(PlanNode::Apply {
        id: ids.next_id(),
        input,
        subquery,
        subquery_assignments,
        correlation: vec![bigint("k")],
        origin_subquery_error: "subquery on line 3: %s".to_string(),
    })
}

#[test]
fn test_correlated_in_becomes_left_join() {
    let mut ids = PlanNodeIdAllocator::new();
    let plan = correlated_in_apply(&mut ids);
    let expected_outputs = output_names(&plan);
    let optimized = optimize(plan, &mut ids);

    assert_eq!(output_names(&optimized), expected_outputs);
    verify::check_subqueries_rewritten(&optimized, &IdentityLookup)
        .expect("no subquery nodes may remain");

    let PlanNode::Project {
        source,
        assignments,
        ..
    } = &*optimized
    else {
        panic!("Expected Project at the root");
    };
    assert!(matches!(
        assignments.get("o"),
        Some(Expression::SearchedCase { .. })
    ));

    let PlanNode::Aggregation {
        source: join,
        aggregations,
        ..
    } = &**source
    else {
        panic!("Expected Aggregation under the projection");
    };
    assert_eq!(aggregations.len(), 2);
    assert!(aggregations
        .iter()
        .all(|(_, call)| call.filter.is_some() && call.arguments.is_empty()));

    let PlanNode::Join {
        kind,
        left,
        right,
        filter,
        ..
    } = &**join
    else {
        panic!("Expected Join under the aggregation");
    };
    assert_eq!(*kind, JoinKind::Left);
    assert!(matches!(&**left, PlanNode::AssignUniqueId { .. }));
    assert!(matches!(&**right, PlanNode::Project { .. }));

    // ((v IS NULL) OR (v = b) OR (b IS NULL)) AND (b_k = k)
    let Some(Expression::And(conjuncts)) = filter else {
        panic!("Expected conjunctive join filter");
    };
    assert_eq!(conjuncts.len(), 2);
    let Expression::Or(disjuncts) = &conjuncts[0] else {
        panic!("Expected disjunction, got {:?}", conjuncts[0]);
    };
    assert_eq!(disjuncts.len(), 3);
    assert!(matches!(
        conjuncts[1],
        Expression::Comparison {
            op: ComparisonOp::Eq,
            ..
        }
    ));
}

#[test]
fn test_unsupported_correlated_apply_reaches_verifier() {
    // Correlated EXISTS-style assignment is not IN-shaped, so no rule
    // fires and the verifier reports the user-facing error.
    let mut ids = PlanNodeIdAllocator::new();
    let input = scan(&mut ids, "a", &["k"]);
    let subquery = Arc::new(PlanNode::Filter {
        id: ids.next_id(),
        source: scan(&mut ids, "b", &["b_k"]),
        predicate: Expression::compare(
            ComparisonOp::Eq,
            Expression::symbol("b_k"),
            Expression::symbol("k"),
        ),
    });
    let mut subquery_assignments = Assignments::new();
    subquery_assignments.put(
        Variable::new("exists", DataType::Boolean),
        Expression::symbol("b_k"),
    );
    let plan = Arc::new(PlanNode::Apply {
        id: ids.next_id(),
        input,
        subquery,
        subquery_assignments,
        correlation: vec![bigint("k")],
        origin_subquery_error: "subquery on line 9: %s".to_string(),
    });

    let optimized = optimize(plan, &mut ids);
    let error = verify::check_subqueries_rewritten(&optimized, &IdentityLookup)
        .expect_err("verification should fail");
    assert_eq!(
        error,
        PlannerError::UnsupportedSubquery(
            "subquery on line 9: Given correlated subquery is not supported".to_string()
        )
    );
}

// ============ Lateral Joins ============

#[test]
fn test_unreferenced_scalar_lateral_sides_are_elided() {
    let mut ids = PlanNodeIdAllocator::new();
    let scalar = Arc::new(PlanNode::Aggregation {
        id: ids.next_id(),
        source: scan(&mut ids, "t", &["x"]),
        aggregations: vec![],
        grouping_set: vec![],
        step: AggregationStep::Single,
        hash_variable: None,
        group_id_variable: None,
    });
    let keep = scan(&mut ids, "q", &["y"]);
    let plan = Arc::new(PlanNode::LateralJoin {
        id: ids.next_id(),
        input: scalar,
        subquery: Arc::clone(&keep),
        correlation: vec![],
        origin_subquery_error: "line 2:1: %s".to_string(),
    });

    let optimized = optimize(plan, &mut ids);
    match &*optimized {
        PlanNode::Scan { table, .. } => assert_eq!(table, "q"),
        other => panic!("Expected the subquery side to survive, got {:?}", other),
    }
    verify::check_subqueries_rewritten(&optimized, &IdentityLookup)
        .expect("lateral join should be gone");
}

// ============ Verifier ============

#[test]
fn test_verifier_formats_origin_template() {
    let mut ids = PlanNodeIdAllocator::new();
    let plan = Arc::new(PlanNode::Apply {
        id: ids.next_id(),
        input: scan(&mut ids, "a", &["k"]),
        subquery: scan(&mut ids, "b", &["b_k"]),
        subquery_assignments: Assignments::new(),
        correlation: vec![bigint("k")],
        origin_subquery_error: "subquery on line 3: %s".to_string(),
    });

    let error = verify::check_subqueries_rewritten(&plan, &IdentityLookup)
        .expect_err("verification should fail");
    assert_eq!(
        error,
        PlannerError::UnsupportedSubquery(
            "subquery on line 3: Given correlated subquery is not supported".to_string()
        )
    );
}

// ============ Driver Properties ============

#[test]
fn test_optimizing_a_fixed_point_changes_nothing() {
    let mut ids = PlanNodeIdAllocator::new();
    let plan = correlated_in_apply(&mut ids);
    let optimized = optimize(plan, &mut ids);
    let first = format_plan(&optimized);

    let again = optimize(optimized, &mut ids);
    assert_eq!(format_plan(&again), first);
}

#[test]
fn test_fresh_variable_names_are_deterministic() {
    let mut ids_a = PlanNodeIdAllocator::new();
    let first = optimize(correlated_in_apply(&mut ids_a), &mut ids_a);

    let mut ids_b = PlanNodeIdAllocator::new();
    let second = optimize(correlated_in_apply(&mut ids_b), &mut ids_b);

    assert_eq!(format_plan(&first), format_plan(&second));
}

#[test]
fn test_no_dangling_symbol_references() {
    // Every symbol referenced by a node must be produced by its sources
    // (or be one of the node's own outputs, for projections).
    fn check(node: &Arc<PlanNode>) {
        let mut available: Vec<String> = Vec::new();
        for child in node.sources() {
            available.extend(output_names(child));
            check(child);
        }
        if node.sources().is_empty() {
            return;
        }
        match &**node {
            // Apply subquery assignments may reference both sides by design
            PlanNode::Apply { .. } | PlanNode::LateralJoin { .. } => {}
            _ => {
                for name in node.referenced_names() {
                    assert!(
                        available.contains(&name) || output_names(node).contains(&name),
                        "symbol {} not in scope at node {:?}",
                        name,
                        node.id()
                    );
                }
            }
        }
    }

    let mut ids = PlanNodeIdAllocator::new();
    let optimized = optimize(correlated_in_apply(&mut ids), &mut ids);
    check(&optimized);

    let mut ids = PlanNodeIdAllocator::new();
    let optimized = optimize(two_source_set_operation(&mut ids, false), &mut ids);
    check(&optimized);
}
