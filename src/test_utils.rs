//! Shared test fixtures for plan rewriter tests

use std::sync::Arc;

use crate::plan::{PlanNode, PlanNodeId, Variable};
use crate::types::DataType;

/// BIGINT variable
pub fn bigint_var(name: &str) -> Variable {
    Variable::new(name, DataType::Bigint)
}

/// Table scan producing BIGINT columns
pub fn scan(id: u64, table: &str, columns: &[&str]) -> Arc<PlanNode> {
    Arc::new(PlanNode::Scan {
        id: PlanNodeId(id),
        table: table.to_string(),
        outputs: columns.iter().map(|c| bigint_var(c)).collect(),
    })
}

/// Literal relation with `rows` empty rows and no columns
pub fn values(id: u64, rows: usize) -> Arc<PlanNode> {
    Arc::new(PlanNode::Values {
        id: PlanNodeId(id),
        outputs: vec![],
        rows: vec![vec![]; rows],
    })
}
