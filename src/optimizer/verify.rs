//! Post-rewrite verification
//!
//! After the rewriters reach a fixed point no `Apply` or `LateralJoin` may
//! remain: everything downstream only understands joins, filters,
//! aggregations, projections and unions. A survivor means the query used a
//! correlated subquery shape no rule supports, which is a user-facing
//! error. A *non-correlated* survivor is a planner bug, because those forms
//! are eliminated before this layer runs.

use std::sync::Arc;

use tracing::debug;

use crate::error::{PlannerError, PlannerResult};
use crate::lookup::Lookup;
use crate::plan::{search_first, PlanNode, Variable};

/// Message substituted into the offending node's error template
pub const UNSUPPORTED_SUBQUERY_MESSAGE: &str = "Given correlated subquery is not supported";

/// Assert that no subquery nodes survived rewriting
pub fn check_subqueries_rewritten(
    plan: &Arc<PlanNode>,
    lookup: &dyn Lookup,
) -> PlannerResult<()> {
    if let Some(node) = search_first(plan, lookup, &|node| {
        matches!(node, PlanNode::Apply { .. })
    }) {
        if let PlanNode::Apply {
            correlation,
            origin_subquery_error,
            ..
        } = &*node
        {
            return Err(subquery_error(correlation, origin_subquery_error));
        }
    }

    if let Some(node) = search_first(plan, lookup, &|node| {
        matches!(node, PlanNode::LateralJoin { .. })
    }) {
        if let PlanNode::LateralJoin {
            correlation,
            origin_subquery_error,
            ..
        } = &*node
        {
            return Err(subquery_error(correlation, origin_subquery_error));
        }
    }

    debug!("no subquery nodes remain in the plan");
    Ok(())
}

fn subquery_error(correlation: &[Variable], template: &str) -> PlannerError {
    if correlation.is_empty() {
        return PlannerError::Internal(
            "non-correlated subquery node survived to verification".to_string(),
        );
    }
    PlannerError::UnsupportedSubquery(template.replacen("%s", UNSUPPORTED_SUBQUERY_MESSAGE, 1))
}
