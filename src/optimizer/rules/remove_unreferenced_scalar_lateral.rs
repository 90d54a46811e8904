//! Unreferenced scalar lateral elision
//!
//! A lateral join where one side contributes no columns and is statically
//! known to produce exactly one row is a no-op around the other side.

use std::sync::Arc;

use crate::cardinality::is_scalar;
use crate::error::PlannerResult;
use crate::lookup::Lookup;
use crate::optimizer::{Context, Rule};
use crate::pattern::{Captures, Pattern};
use crate::plan::{NodeTag, PlanNode};

/// Replaces a `LateralJoin` by its only contributing side
pub struct RemoveUnreferencedScalarLateralNodes {
    pattern: Pattern,
}

impl RemoveUnreferencedScalarLateralNodes {
    pub fn new() -> Self {
        Self {
            pattern: Pattern::node(NodeTag::LateralJoin),
        }
    }
}

impl Default for RemoveUnreferencedScalarLateralNodes {
    fn default() -> Self {
        Self::new()
    }
}

impl Rule for RemoveUnreferencedScalarLateralNodes {
    fn name(&self) -> &'static str {
        "remove_unreferenced_scalar_lateral_nodes"
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
        let PlanNode::LateralJoin {
            input, subquery, ..
        } = &**node
        else {
            return Ok(None);
        };

        if is_unreferenced_scalar(input, context.lookup) {
            return Ok(Some(Arc::clone(subquery)));
        }
        if is_unreferenced_scalar(subquery, context.lookup) {
            return Ok(Some(Arc::clone(input)));
        }
        Ok(None)
    }
}

fn is_unreferenced_scalar(node: &Arc<PlanNode>, lookup: &dyn Lookup) -> bool {
    lookup.resolve(node).output_variables().is_empty() && is_scalar(node, lookup)
}
