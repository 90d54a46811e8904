//! Static cardinality analysis
//!
//! A node is *scalar* when it provably produces exactly one row for any
//! input. Only shapes the rewriters rely on are recognized; anything else
//! conservatively reports not-scalar.

use std::sync::Arc;

use crate::lookup::Lookup;
use crate::plan::{AggregationStep, PlanNode};

/// Whether `node` is statically known to produce exactly one row
pub fn is_scalar(node: &Arc<PlanNode>, lookup: &dyn Lookup) -> bool {
    let resolved = lookup.resolve(node);
    match &*resolved {
        PlanNode::Values { rows, .. } => rows.len() == 1,
        PlanNode::Aggregation {
            grouping_set, step, ..
        } => grouping_set.is_empty() && *step == AggregationStep::Single,
        PlanNode::Project { source, .. } => is_scalar(source, lookup),
        _ => false,
    }
}
