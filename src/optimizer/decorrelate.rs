//! Subquery decorrelation
//!
//! Given a subplan and the set of outer-scope variables it may reference,
//! the decorrelator tries to split it into an uncorrelated core plus a list
//! of pulled-up predicates. Filters are hoisted wholesale; projects are kept
//! but widened so the hoisted predicates' inputs stay visible above them.
//! Any other node that touches a correlation variable makes the whole
//! subplan non-decorrelatable.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::allocator::PlanNodeIdAllocator;
use crate::expr::Expression;
use crate::lookup::Lookup;
use crate::plan::{PlanNode, Variable};
use crate::types::TypeProvider;

/// Result of successful decorrelation
#[derive(Debug)]
pub struct Decorrelated {
    /// Predicates hoisted out of the subplan; they may reference the outer
    /// input's variables and the correlation set
    pub correlated_predicates: Vec<Expression>,
    /// The subplan with those predicates removed; its outputs cover every
    /// variable the predicates reference except the correlation set itself
    pub decorrelated_node: Arc<PlanNode>,
}

/// Bottom-up decorrelation visitor
pub struct Decorrelator<'a> {
    lookup: &'a dyn Lookup,
    correlation: BTreeSet<String>,
    types: &'a TypeProvider,
    ids: &'a mut PlanNodeIdAllocator,
}

impl<'a> Decorrelator<'a> {
    pub fn new(
        lookup: &'a dyn Lookup,
        correlation: &[Variable],
        types: &'a TypeProvider,
        ids: &'a mut PlanNodeIdAllocator,
    ) -> Self {
        Self {
            lookup,
            correlation: correlation.iter().map(|v| v.name.clone()).collect(),
            types,
            ids,
        }
    }

    /// Decorrelate `node`, or `None` when correlation cannot be pulled out
    pub fn decorrelate(&mut self, node: &Arc<PlanNode>) -> Option<Decorrelated> {
        let resolved = self.lookup.resolve(node);
        match &*resolved {
            PlanNode::Project {
                source,
                assignments,
                ..
            } => {
                if self.is_correlated_shallowly(&resolved) {
                    return None;
                }
                let inner = self.decorrelate(source)?;

                // Keep every variable the hoisted predicates reference
                // (outside the correlation set) visible above this project.
                let mut assignments = assignments.clone();
                for predicate in &inner.correlated_predicates {
                    for name in predicate.symbols() {
                        if self.correlation.contains(&name) {
                            continue;
                        }
                        let data_type = self.types.get(&name)?.clone();
                        assignments.put_identity(Variable::new(name, data_type));
                    }
                }

                Some(Decorrelated {
                    correlated_predicates: inner.correlated_predicates,
                    decorrelated_node: Arc::new(PlanNode::Project {
                        id: self.ids.next_id(),
                        source: inner.decorrelated_node,
                        assignments,
                    }),
                })
            }

            PlanNode::Filter {
                source, predicate, ..
            } => {
                let inner = self.decorrelate(source)?;
                let mut predicates = inner.correlated_predicates;
                // Hoisted wholesale; predicate pushdown re-sinks any
                // uncorrelated conjuncts later, so no need to split here.
                predicates.push(predicate.clone());
                Some(Decorrelated {
                    correlated_predicates: predicates,
                    decorrelated_node: inner.decorrelated_node,
                })
            }

            _ => {
                if self.is_correlated_recursively(&resolved) {
                    None
                } else {
                    Some(Decorrelated {
                        correlated_predicates: Vec::new(),
                        decorrelated_node: Arc::clone(node),
                    })
                }
            }
        }
    }

    fn is_correlated_recursively(&self, node: &Arc<PlanNode>) -> bool {
        if self.is_correlated_shallowly(node) {
            return true;
        }
        node.sources()
            .into_iter()
            .map(|child| self.lookup.resolve(child))
            .any(|child| self.is_correlated_recursively(&child))
    }

    fn is_correlated_shallowly(&self, node: &Arc<PlanNode>) -> bool {
        node.referenced_names()
            .iter()
            .any(|name| self.correlation.contains(name))
    }
}
