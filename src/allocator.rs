//! Symbol and plan-node-id allocators
//!
//! Rewriters synthesize new variables (markers, counts, unique row ids) and
//! new plan nodes. Both kinds of identity come from per-query allocators so
//! that planning the same input twice yields byte-identical plans.

use std::sync::Arc;

use crate::plan::{PlanNode, PlanNodeId, Variable};
use crate::types::{DataType, TypeProvider};

/// Allocates fresh, collision-free plan variables
#[derive(Debug, Clone, Default)]
pub struct SymbolAllocator {
    types: TypeProvider,
    next_id: u64,
}

impl SymbolAllocator {
    /// Allocator with no pre-registered variables
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocator seeded with every variable appearing in `plan`, so fresh
    /// names cannot collide with existing ones
    pub fn from_plan(plan: &Arc<PlanNode>) -> Self {
        let mut allocator = Self::new();
        allocator.register_plan(plan);
        allocator
    }

    fn register_plan(&mut self, node: &Arc<PlanNode>) {
        for variable in node.output_variables() {
            self.types.insert(variable.name, variable.data_type);
        }
        for child in node.sources() {
            self.register_plan(child);
        }
    }

    /// Allocate a fresh variable. The name is `hint` (with any trailing
    /// `_<digits>` stripped) plus a monotonic suffix that skips names
    /// already in use.
    pub fn new_variable(&mut self, hint: &str, data_type: DataType) -> Variable {
        let hint = strip_counter_suffix(hint);
        loop {
            self.next_id += 1;
            let name = format!("{}_{}", hint, self.next_id);
            if !self.types.contains(&name) {
                self.types.insert(name.clone(), data_type.clone());
                return Variable::new(name, data_type);
            }
        }
    }

    /// Types of every variable known to this allocator
    pub fn types(&self) -> &TypeProvider {
        &self.types
    }
}

/// Strip trailing `_<digits>` segments so re-deriving a name from an
/// allocated variable does not stack counters
fn strip_counter_suffix(hint: &str) -> &str {
    let mut hint = hint;
    while let Some(pos) = hint.rfind('_') {
        let suffix = &hint[pos + 1..];
        if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
            break;
        }
        hint = &hint[..pos];
    }
    hint
}

/// Allocates plan node identities
#[derive(Debug, Clone, Default)]
pub struct PlanNodeIdAllocator {
    next: u64,
}

impl PlanNodeIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next unused id
    pub fn next_id(&mut self) -> PlanNodeId {
        let id = PlanNodeId(self.next);
        self.next += 1;
        id
    }
}
