//! Plan node resolution
//!
//! Rewriters traverse plans whose children may be opaque group references
//! into a memo. Every child access goes through a [`Lookup`] so the same
//! rule code works with or without a memo; without one, resolution is the
//! identity.

use std::sync::Arc;

use crate::plan::PlanNode;

/// Resolves a plan node handle to the canonical concrete node
pub trait Lookup {
    /// Resolve `node`, chasing any group indirection
    fn resolve(&self, node: &Arc<PlanNode>) -> Arc<PlanNode>;
}

/// Lookup for fully materialized plans: resolution is the identity
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityLookup;

impl Lookup for IdentityLookup {
    fn resolve(&self, node: &Arc<PlanNode>) -> Arc<PlanNode> {
        Arc::clone(node)
    }
}
