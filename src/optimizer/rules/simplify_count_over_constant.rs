//! `count(constant)` simplification
//!
//! A single-argument `count` never sees a null when its argument is a
//! non-null literal, directly or through the child projection, so it is
//! equivalent to `count(*)`.

use std::sync::Arc;

use crate::error::{PlannerError, PlannerResult};
use crate::expr::Expression;
use crate::functions::FunctionResolution;
use crate::optimizer::{Context, Rule};
use crate::pattern::{Capture, Captures, Pattern};
use crate::plan::{AggregateCall, Assignments, NodeTag, PlanNode};

const CHILD: Capture = Capture::new(0);

/// Rewrites `count(constant)` aggregates over a projection into `count()`
pub struct SimplifyCountOverConstant {
    functions: FunctionResolution,
    pattern: Pattern,
}

impl SimplifyCountOverConstant {
    pub fn new(functions: FunctionResolution) -> Self {
        Self {
            functions,
            pattern: Pattern::node(NodeTag::Aggregation)
                .with_source(Pattern::node(NodeTag::Project).captured_as(CHILD)),
        }
    }
}

impl Rule for SimplifyCountOverConstant {
    fn name(&self) -> &'static str {
        "simplify_count_over_constant"
    }

    fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    fn apply(
        &self,
        node: &Arc<PlanNode>,
        captures: &Captures,
        context: &mut Context<'_>,
    ) -> PlannerResult<Option<Arc<PlanNode>>> {
        let PlanNode::Aggregation {
            aggregations,
            grouping_set,
            step,
            hash_variable,
            group_id_variable,
            ..
        } = &**node
        else {
            return Ok(None);
        };
        let child = captures.get(CHILD).ok_or_else(|| {
            PlannerError::Internal("aggregation pattern did not bind its child".to_string())
        })?;
        let PlanNode::Project {
            assignments: child_assignments,
            ..
        } = &**child
        else {
            return Ok(None);
        };

        let mut changed = false;
        let mut rewritten = aggregations.clone();
        for (_, call) in rewritten.iter_mut() {
            if is_count_over_constant(&self.functions, call, child_assignments) {
                changed = true;
                let mask = call.mask.take();
                *call = AggregateCall {
                    function: self.functions.count_function(),
                    arguments: Vec::new(),
                    filter: None,
                    order_by: Vec::new(),
                    distinct: false,
                    mask,
                };
            }
        }

        if !changed {
            return Ok(None);
        }

        Ok(Some(Arc::new(PlanNode::Aggregation {
            id: context.ids.next_id(),
            source: Arc::clone(child),
            aggregations: rewritten,
            grouping_set: grouping_set.clone(),
            step: *step,
            hash_variable: hash_variable.clone(),
            group_id_variable: group_id_variable.clone(),
        })))
    }
}

fn is_count_over_constant(
    functions: &FunctionResolution,
    call: &AggregateCall,
    inputs: &Assignments,
) -> bool {
    if !functions.is_count_function(&call.function) || call.arguments.len() != 1 {
        return false;
    }
    let mut argument = &call.arguments[0];
    if let Expression::Symbol(name) = argument {
        match inputs.get(name) {
            Some(bound) => argument = bound,
            None => return false,
        }
    }
    argument.is_literal() && !matches!(argument, Expression::Null)
}
