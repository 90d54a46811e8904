//! Iterative plan rewriting
//!
//! The optimizer owns an ordered set of rewrite rules and applies them
//! bottom-up until the plan reaches a fixed point.
//!
//! ## Pipeline
//!
//! ```text
//! PlanNode (with Apply / LateralJoin / Intersect / Except)
//!   → Optimizer::optimize() → PlanNode (joins, unions, aggregations)
//!   → verify::check_subqueries_rewritten()
//!   → physical planning
//! ```
//!
//! Within one pass each position tries every rule in declaration order; the
//! first rule returning a replacement wins and the replacement subtree is
//! immediately re-visited. Passes repeat until one changes nothing, which
//! makes the result deterministic for identical inputs and allocator states.

pub mod decorrelate;
pub mod rules;
pub mod verify;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::allocator::{PlanNodeIdAllocator, SymbolAllocator};
use crate::error::{PlannerError, PlannerResult};
use crate::functions::FunctionResolution;
use crate::lookup::Lookup;
use crate::pattern::{Captures, Pattern};
use crate::plan::PlanNode;

pub use self::rules::correlated_in_to_join::TransformCorrelatedInPredicateToJoin;
pub use self::rules::remove_unreferenced_scalar_lateral::RemoveUnreferencedScalarLateralNodes;
pub use self::rules::set_operations::{ImplementExceptAsUnion, ImplementIntersectAsUnion};
pub use self::rules::simplify_count_over_constant::SimplifyCountOverConstant;

/// Cooperative cancellation flag, checked between rewrite passes
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; the driver stops before its next pass
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Per-query state threaded through every rule application
pub struct Context<'a> {
    pub symbols: &'a mut SymbolAllocator,
    pub ids: &'a mut PlanNodeIdAllocator,
    pub lookup: &'a dyn Lookup,
    pub cancel: CancelFlag,
}

impl<'a> Context<'a> {
    pub fn new(
        symbols: &'a mut SymbolAllocator,
        ids: &'a mut PlanNodeIdAllocator,
        lookup: &'a dyn Lookup,
    ) -> Self {
        Self {
            symbols,
            ids,
            lookup,
            cancel: CancelFlag::default(),
        }
    }

    /// Attach a cancellation flag
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }
}

/// A single rewrite rule
///
/// A rule declares the node shape it fires on and produces either a
/// replacement subtree or nothing. Rules never partially mutate a plan.
pub trait Rule {
    /// Rule name for logging
    fn name(&self) -> &'static str;

    /// Shape of nodes this rule fires on
    fn pattern(&self) -> &Pattern;

    /// Apply the rule; `Ok(None)` means no change
    fn apply(
        &self,
        node: &Arc<PlanNode>,
        captures: &Captures,
        context: &mut Context<'_>,
    ) -> PlannerResult<Option<Arc<PlanNode>>>;
}

/// Driver configuration
#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    /// Upper bound on full rewrite passes before planning is aborted
    pub max_passes: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self { max_passes: 10 }
    }
}

/// Fixed-point rewrite driver over an ordered rule set
pub struct Optimizer {
    rules: Vec<Box<dyn Rule>>,
    config: OptimizerConfig,
}

impl Optimizer {
    /// Optimizer with the default rule set
    pub fn new(functions: FunctionResolution) -> Self {
        Self::with_config(functions, OptimizerConfig::default())
    }

    /// Default rule set with an explicit configuration
    pub fn with_config(functions: FunctionResolution, config: OptimizerConfig) -> Self {
        Self {
            rules: vec![
                Box::new(TransformCorrelatedInPredicateToJoin::new(functions)),
                Box::new(ImplementIntersectAsUnion::new(functions)),
                Box::new(ImplementExceptAsUnion::new(functions)),
                Box::new(SimplifyCountOverConstant::new(functions)),
                Box::new(RemoveUnreferencedScalarLateralNodes::new()),
            ],
            config,
        }
    }

    /// Optimizer with a custom rule set
    pub fn with_rules(rules: Vec<Box<dyn Rule>>) -> Self {
        Self {
            rules,
            config: OptimizerConfig::default(),
        }
    }

    /// Names of all rules, in application order
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Rewrite `plan` to a fixed point
    pub fn optimize(
        &self,
        plan: Arc<PlanNode>,
        context: &mut Context<'_>,
    ) -> PlannerResult<Arc<PlanNode>> {
        let mut current = plan;
        for pass in 0..self.config.max_passes {
            if context.cancel.is_cancelled() {
                return Err(PlannerError::Cancelled);
            }
            let (next, changed) = self.rewrite_node(&current, context)?;
            current = next;
            if !changed {
                trace!(passes = pass + 1, "plan reached fixed point");
                return Ok(current);
            }
            trace!(pass = pass + 1, "plan changed, running another pass");
        }
        Err(PlannerError::Internal(format!(
            "plan did not reach a fixed point within {} passes",
            self.config.max_passes
        )))
    }

    /// One bottom-up visit of `node`: children first, then the first
    /// matching rule at this position. Replacements are re-visited in full.
    fn rewrite_node(
        &self,
        node: &Arc<PlanNode>,
        context: &mut Context<'_>,
    ) -> PlannerResult<(Arc<PlanNode>, bool)> {
        let resolved = context.lookup.resolve(node);

        let mut children_changed = false;
        let mut new_children = Vec::with_capacity(resolved.sources().len());
        for child in resolved.sources() {
            let (rewritten, changed) = self.rewrite_node(child, context)?;
            children_changed |= changed;
            new_children.push(rewritten);
        }
        let current = if children_changed {
            Arc::new(resolved.with_sources(new_children))
        } else {
            resolved
        };

        for rule in &self.rules {
            if let Some(captures) = rule.pattern().matches(&current, context.lookup) {
                if let Some(replacement) = rule.apply(&current, &captures, context)? {
                    debug!(rule = rule.name(), node = ?current.id(), "rewrote plan node");
                    let (revisited, _) = self.rewrite_node(&replacement, context)?;
                    return Ok((revisited, true));
                }
            }
        }

        Ok((current, children_changed))
    }
}
