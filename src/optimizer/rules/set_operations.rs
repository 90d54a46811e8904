//! INTERSECT / EXCEPT lowering
//!
//! Both set operations are encoded over a single UNION ALL by tagging each
//! source with a one-hot boolean marker column, counting markers per
//! distinct row, and filtering on the counts:
//!
//! ```text
//! Intersect(S1, S2) [a]
//! ```
//!
//! becomes
//!
//! ```text
//! Project (a)
//!   Filter (count_1 >= 1 AND count_2 >= 1)
//!     Aggregation (group by a; count_i := count(marker_i))
//!       Union
//!         Project (a := S1.a, marker_1 := true, marker_2 := null)
//!         Project (a := S2.a, marker_1 := null, marker_2 := true)
//! ```
//!
//! EXCEPT uses the same shape with filter
//! `count_1 >= 1 AND count_2 = 0 AND ...`. Sources are rewritten bottom-up
//! by the driver, so nested set operations expand fully.

use std::sync::Arc;

use crate::error::PlannerResult;
use crate::expr::{self, ComparisonOp, Expression};
use crate::functions::FunctionResolution;
use crate::optimizer::{Context, Rule};
use crate::pattern::{Captures, Pattern};
use crate::plan::{
    AggregateCall, AggregationStep, Assignments, NodeTag, PlanNode, SetOperationMapping, Variable,
};
use crate::types::DataType;

/// Rewrites `Intersect` into union/count/filter form
pub struct ImplementIntersectAsUnion {
    functions: FunctionResolution,
    pattern: Pattern,
}

impl ImplementIntersectAsUnion {
    pub fn new(functions: FunctionResolution) -> Self {
        Self {
            functions,
            pattern: Pattern::node(NodeTag::Intersect),
        }
    }
}

impl Rule for ImplementIntersectAsUnion {
    fn name(&self) -> &'static str {
        "implement_intersect_as_union"
    }

    fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    fn apply(
        &self,
        node: &Arc<PlanNode>,
        _captures: &Captures,
        context: &mut Context<'_>,
    ) -> PlannerResult<Option<Arc<PlanNode>>> {
        let PlanNode::Intersect {
            sources, mapping, ..
        } = &**node
        else {
            return Ok(None);
        };
        let rewritten =
            rewrite_as_union(sources, mapping, self.functions, context, intersect_filter)?;
        Ok(Some(rewritten))
    }
}

/// Rewrites `Except` into union/count/filter form
pub struct ImplementExceptAsUnion {
    functions: FunctionResolution,
    pattern: Pattern,
}

impl ImplementExceptAsUnion {
    pub fn new(functions: FunctionResolution) -> Self {
        Self {
            functions,
            pattern: Pattern::node(NodeTag::Except),
        }
    }
}

impl Rule for ImplementExceptAsUnion {
    fn name(&self) -> &'static str {
        "implement_except_as_union"
    }

    fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    fn apply(
        &self,
        node: &Arc<PlanNode>,
        _captures: &Captures,
        context: &mut Context<'_>,
    ) -> PlannerResult<Option<Arc<PlanNode>>> {
        let PlanNode::Except {
            sources, mapping, ..
        } = &**node
        else {
            return Ok(None);
        };
        let rewritten =
            rewrite_as_union(sources, mapping, self.functions, context, except_filter)?;
        Ok(Some(rewritten))
    }
}

/// Shared lowering; `build_filter` decides intersect vs except semantics
/// over the per-source count variables.
fn rewrite_as_union(
    sources: &[Arc<PlanNode>],
    mapping: &SetOperationMapping,
    functions: FunctionResolution,
    context: &mut Context<'_>,
    build_filter: fn(&[Variable]) -> Expression,
) -> PlannerResult<Arc<PlanNode>> {
    let outputs: Vec<Variable> = mapping.outputs().cloned().collect();

    let markers: Vec<Variable> = (0..sources.len())
        .map(|_| context.symbols.new_variable("marker", DataType::Boolean))
        .collect();

    // Per-source projection: rename the source's columns onto fresh
    // variables and append one-hot markers.
    let mut column_inputs: Vec<Vec<Variable>> = vec![Vec::new(); outputs.len()];
    let mut marker_inputs: Vec<Vec<Variable>> = vec![Vec::new(); markers.len()];
    let mut with_markers = Vec::with_capacity(sources.len());
    for (source_index, source) in sources.iter().enumerate() {
        let mut assignments = Assignments::new();
        for (output_index, output) in outputs.iter().enumerate() {
            let input = mapping.input_at(output_index, source_index);
            let renamed = context
                .symbols
                .new_variable(&output.name, output.data_type.clone());
            assignments.put(renamed.clone(), Expression::symbol(input.name.clone()));
            column_inputs[output_index].push(renamed);
        }
        for (marker_index, marker) in markers.iter().enumerate() {
            let value = if marker_index == source_index {
                Expression::Boolean(true)
            } else {
                Expression::Cast {
                    expr: Box::new(Expression::Null),
                    target: DataType::Boolean,
                }
            };
            let renamed = context
                .symbols
                .new_variable(&marker.name, DataType::Boolean);
            assignments.put(renamed.clone(), value);
            marker_inputs[marker_index].push(renamed);
        }
        with_markers.push(Arc::new(PlanNode::Project {
            id: context.ids.next_id(),
            source: Arc::clone(source),
            assignments,
        }));
    }

    // Union keeps the set operation's output names and adds the markers.
    let mut union_mapping = SetOperationMapping::new();
    for (output, inputs) in outputs.iter().zip(column_inputs) {
        union_mapping.put(output.clone(), inputs);
    }
    for (marker, inputs) in markers.iter().zip(marker_inputs) {
        union_mapping.put(marker.clone(), inputs);
    }
    let union = Arc::new(PlanNode::Union {
        id: context.ids.next_id(),
        sources: with_markers,
        mapping: union_mapping,
    });

    // count(marker_i) counts the rows contributed by source i per group.
    let counts: Vec<Variable> = markers
        .iter()
        .map(|_| context.symbols.new_variable("count", DataType::Bigint))
        .collect();
    let aggregations = counts
        .iter()
        .zip(&markers)
        .map(|(count, marker)| {
            (
                count.clone(),
                AggregateCall {
                    function: functions.count_column_function(),
                    arguments: vec![marker.to_expression()],
                    filter: None,
                    order_by: Vec::new(),
                    distinct: false,
                    mask: None,
                },
            )
        })
        .collect();
    let aggregation = Arc::new(PlanNode::Aggregation {
        id: context.ids.next_id(),
        source: union,
        aggregations,
        grouping_set: outputs.clone(),
        step: AggregationStep::Single,
        hash_variable: None,
        group_id_variable: None,
    });

    let filter = Arc::new(PlanNode::Filter {
        id: context.ids.next_id(),
        source: aggregation,
        predicate: build_filter(&counts),
    });

    Ok(Arc::new(PlanNode::Project {
        id: context.ids.next_id(),
        source: filter,
        assignments: Assignments::identity(outputs),
    }))
}

/// A row survives an intersect when every source contributed it
fn intersect_filter(counts: &[Variable]) -> Expression {
    expr::and(counts.iter().map(at_least_one))
}

/// A row survives an except when the first source contributed it and no
/// other source did
fn except_filter(counts: &[Variable]) -> Expression {
    let mut conjuncts = Vec::with_capacity(counts.len());
    let mut counts = counts.iter();
    if let Some(first) = counts.next() {
        conjuncts.push(at_least_one(first));
    }
    for count in counts {
        conjuncts.push(equals_zero(count));
    }
    expr::and(conjuncts)
}

fn at_least_one(count: &Variable) -> Expression {
    Expression::compare(
        ComparisonOp::GtEq,
        count.to_expression(),
        bigint_literal("1"),
    )
}

fn equals_zero(count: &Variable) -> Expression {
    Expression::compare(ComparisonOp::Eq, count.to_expression(), bigint_literal("0"))
}

fn bigint_literal(value: &str) -> Expression {
    Expression::GenericLiteral {
        ty: DataType::Bigint,
        value: value.to_string(),
    }
}
