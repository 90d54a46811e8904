//! Correlated IN-predicate elimination
//!
//! Rewrites a correlated `Apply` whose single subquery assignment is
//! `o := v IN b`:
//!
//! ```text
//! Apply (o := v IN b, correlation: [k])
//!   input:    A producing v
//!   subquery: B producing b, filtering on k
//! ```
//!
//! into a left join with case analysis over two filtered counts:
//!
//! ```text
//! Project (A.*, o := CASE WHEN count_matches > 0 THEN true
//!                         WHEN count_null_matches > 0 THEN null
//!                         ELSE false END)
//!   Aggregation (group by A'.*; count_matches, count_null_matches)
//!     Join (LEFT, filter: ((v IS NULL) OR (v = b) OR (b IS NULL))
//!                         AND pulled-up correlation predicates)
//!       AssignUniqueId (A' = A + unique)
//!       Project (B.*, build_side_non_null := 0::BIGINT)
//! ```
//!
//! The join admits every candidate match including null comparisons;
//! `build_side_non_null` distinguishes "joined a build row but the
//! comparison was unknown" from "no join match at all", which is what makes
//! the CASE produce correct three-valued IN results.

use std::sync::Arc;

use crate::error::PlannerResult;
use crate::expr::{self, ComparisonOp, Expression, WhenClause};
use crate::functions::FunctionResolution;
use crate::optimizer::decorrelate::Decorrelator;
use crate::optimizer::{Context, Rule};
use crate::pattern::{Captures, Pattern};
use crate::plan::{
    AggregateCall, AggregationStep, Assignments, JoinKind, NodeTag, PlanNode, Variable,
};
use crate::types::DataType;

/// Rewrites correlated IN-predicate `Apply` nodes into joins
pub struct TransformCorrelatedInPredicateToJoin {
    functions: FunctionResolution,
    pattern: Pattern,
}

impl TransformCorrelatedInPredicateToJoin {
    pub fn new(functions: FunctionResolution) -> Self {
        Self {
            functions,
            pattern: Pattern::node(NodeTag::Apply).matching(|node| {
                matches!(node, PlanNode::Apply { correlation, .. } if !correlation.is_empty())
            }),
        }
    }

    fn count_with_filter(&self, condition: Expression) -> AggregateCall {
        AggregateCall {
            function: self.functions.count_function(),
            arguments: Vec::new(),
            filter: Some(condition),
            order_by: Vec::new(),
            distinct: false,
            mask: None,
        }
    }
}

impl Rule for TransformCorrelatedInPredicateToJoin {
    fn name(&self) -> &'static str {
        "transform_correlated_in_predicate_to_join"
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
        let PlanNode::Apply {
            input,
            subquery,
            subquery_assignments,
            correlation,
            ..
        } = &**node
        else {
            return Ok(None);
        };

        if subquery_assignments.len() != 1 {
            return Ok(None);
        }
        let Some((output_variable, assignment)) = subquery_assignments.iter().next() else {
            return Ok(None);
        };
        let Expression::In { value, value_list } = assignment else {
            return Ok(None);
        };
        let (Expression::Symbol(probe_name), Expression::Symbol(build_name)) =
            (value.as_ref(), value_list.as_ref())
        else {
            return Ok(None);
        };

        let decorrelated = Decorrelator::new(
            context.lookup,
            correlation,
            context.symbols.types(),
            &mut *context.ids,
        )
        .decorrelate(subquery);
        let Some(decorrelated) = decorrelated else {
            return Ok(None);
        };

        let probe = Expression::symbol(probe_name.clone());
        let build = Expression::symbol(build_name.clone());
        let correlation_condition = expr::and(decorrelated.correlated_predicates);

        let probe_side = Arc::new(PlanNode::AssignUniqueId {
            id: context.ids.next_id(),
            source: Arc::clone(input),
            id_variable: context.symbols.new_variable("unique", DataType::Bigint),
        });

        // Constant column that is non-null exactly when the outer join
        // found a build-side row.
        let non_null_marker = context
            .symbols
            .new_variable("build_side_non_null", DataType::Bigint);
        let build_source = decorrelated.decorrelated_node;
        let mut build_assignments = Assignments::identity(build_source.output_variables());
        build_assignments.put(non_null_marker.clone(), bigint(0));
        let build_side = Arc::new(PlanNode::Project {
            id: context.ids.next_id(),
            source: build_source,
            assignments: build_assignments,
        });

        let join_filter = expr::and(vec![
            expr::or(vec![
                Expression::IsNull(Box::new(probe.clone())),
                Expression::compare(ComparisonOp::Eq, probe.clone(), build.clone()),
                Expression::IsNull(Box::new(build.clone())),
            ]),
            correlation_condition,
        ]);
        let mut join_outputs = probe_side.output_variables();
        join_outputs.extend(build_side.output_variables());
        let join = Arc::new(PlanNode::Join {
            id: context.ids.next_id(),
            kind: JoinKind::Left,
            left: Arc::clone(&probe_side),
            right: build_side,
            criteria: Vec::new(),
            outputs: join_outputs,
            filter: Some(join_filter),
        });

        let match_condition = expr::and(vec![
            Expression::IsNotNull(Box::new(probe.clone())),
            Expression::IsNotNull(Box::new(build.clone())),
        ]);
        let null_match_condition = expr::and(vec![
            Expression::IsNotNull(Box::new(non_null_marker.to_expression())),
            Expression::Not(Box::new(match_condition.clone())),
        ]);

        let count_matches = context
            .symbols
            .new_variable("count_matches", DataType::Bigint);
        let count_null_matches = context
            .symbols
            .new_variable("count_null_matches", DataType::Bigint);
        let aggregation = Arc::new(PlanNode::Aggregation {
            id: context.ids.next_id(),
            source: join,
            aggregations: vec![
                (
                    count_matches.clone(),
                    self.count_with_filter(match_condition),
                ),
                (
                    count_null_matches.clone(),
                    self.count_with_filter(null_match_condition),
                ),
            ],
            grouping_set: probe_side.output_variables(),
            step: AggregationStep::Single,
            hash_variable: None,
            group_id_variable: None,
        });

        let in_equivalent = Expression::SearchedCase {
            when_clauses: vec![
                WhenClause {
                    condition: is_greater_than(&count_matches, 0),
                    result: Expression::Boolean(true),
                },
                WhenClause {
                    condition: is_greater_than(&count_null_matches, 0),
                    result: Expression::Cast {
                        expr: Box::new(Expression::Null),
                        target: DataType::Boolean,
                    },
                },
            ],
            default: Some(Box::new(Expression::Boolean(false))),
        };

        let mut assignments = Assignments::identity(input.output_variables());
        assignments.put(output_variable.clone(), in_equivalent);
        Ok(Some(Arc::new(PlanNode::Project {
            id: context.ids.next_id(),
            source: aggregation,
            assignments,
        })))
    }
}

fn bigint(value: i64) -> Expression {
    Expression::Cast {
        expr: Box::new(Expression::Long(value)),
        target: DataType::Bigint,
    }
}

fn is_greater_than(variable: &Variable, value: i64) -> Expression {
    Expression::compare(ComparisonOp::Gt, variable.to_expression(), bigint(value))
}
