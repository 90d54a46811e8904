//! Declarative plan-node patterns
//!
//! A [`Pattern`] selects a node by variant tag plus structural predicates,
//! optionally descending into the node's first source. Matched subtrees can
//! be bound to [`Capture`] handles and retrieved from the resulting
//! [`Captures`].

use std::sync::Arc;

use crate::lookup::Lookup;
use crate::plan::{NodeTag, PlanNode};

/// Handle naming a captured subtree within a rule's pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capture(usize);

impl Capture {
    /// Create a capture handle; indices only need to be unique per pattern
    pub const fn new(index: usize) -> Self {
        Self(index)
    }
}

/// Subtrees bound by a successful match
#[derive(Debug, Default)]
pub struct Captures {
    bound: Vec<(Capture, Arc<PlanNode>)>,
}

impl Captures {
    fn bind(&mut self, capture: Capture, node: Arc<PlanNode>) {
        self.bound.push((capture, node));
    }

    /// Subtree bound to `capture`, if the pattern bound one
    pub fn get(&self, capture: Capture) -> Option<&Arc<PlanNode>> {
        self.bound
            .iter()
            .find(|(c, _)| *c == capture)
            .map(|(_, node)| node)
    }
}

type Predicate = Box<dyn Fn(&PlanNode) -> bool + Send + Sync>;

/// Structural matcher over plan nodes
pub struct Pattern {
    tag: NodeTag,
    predicates: Vec<Predicate>,
    source: Option<Box<Pattern>>,
    capture: Option<Capture>,
}

impl Pattern {
    /// Match any node of the given variant
    pub fn node(tag: NodeTag) -> Self {
        Self {
            tag,
            predicates: Vec::new(),
            source: None,
            capture: None,
        }
    }

    /// Require `predicate` to hold on the candidate
    pub fn matching<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&PlanNode) -> bool + Send + Sync + 'static,
    {
        self.predicates.push(Box::new(predicate));
        self
    }

    /// Require the candidate's first source to match a nested pattern
    pub fn with_source(mut self, pattern: Pattern) -> Self {
        self.source = Some(Box::new(pattern));
        self
    }

    /// Bind the matched node to `capture`
    pub fn captured_as(mut self, capture: Capture) -> Self {
        self.capture = Some(capture);
        self
    }

    /// Try to match `node`, resolving nested sources through `lookup`
    pub fn matches(&self, node: &Arc<PlanNode>, lookup: &dyn Lookup) -> Option<Captures> {
        let mut captures = Captures::default();
        if self.match_into(node, lookup, &mut captures) {
            Some(captures)
        } else {
            None
        }
    }

    fn match_into(
        &self,
        node: &Arc<PlanNode>,
        lookup: &dyn Lookup,
        captures: &mut Captures,
    ) -> bool {
        if node.tag() != self.tag {
            return false;
        }
        if !self.predicates.iter().all(|predicate| predicate(node)) {
            return false;
        }
        if let Some(source_pattern) = &self.source {
            let Some(first) = node.sources().first().copied() else {
                return false;
            };
            let resolved = lookup.resolve(first);
            if !source_pattern.match_into(&resolved, lookup, captures) {
                return false;
            }
        }
        if let Some(capture) = self.capture {
            captures.bind(capture, Arc::clone(node));
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Expression;
    use crate::lookup::IdentityLookup;
    use crate::plan::{Assignments, PlanNodeId};

    const CHILD: Capture = Capture::new(0);

    fn values() -> Arc<PlanNode> {
        Arc::new(PlanNode::Values {
            id: PlanNodeId(0),
            outputs: vec![],
            rows: vec![],
        })
    }

    fn project_over_values() -> Arc<PlanNode> {
        Arc::new(PlanNode::Project {
            id: PlanNodeId(1),
            source: values(),
            assignments: Assignments::new(),
        })
    }

    #[test]
    fn test_tag_mismatch_fails() {
        let pattern = Pattern::node(NodeTag::Filter);
        assert!(pattern.matches(&project_over_values(), &IdentityLookup).is_none());
    }

    #[test]
    fn test_source_pattern_binds_capture() {
        let pattern = Pattern::node(NodeTag::Project)
            .with_source(Pattern::node(NodeTag::Values).captured_as(CHILD));
        let captures = pattern
            .matches(&project_over_values(), &IdentityLookup)
            .expect("pattern should match");
        let child = captures.get(CHILD).expect("child should be bound");
        assert!(matches!(&**child, PlanNode::Values { .. }));
    }

    #[test]
    fn test_predicate_is_applied() {
        let pattern = Pattern::node(NodeTag::Filter)
            .matching(|node| matches!(node, PlanNode::Filter { predicate, .. } if *predicate == Expression::Boolean(false)));
        let filter = Arc::new(PlanNode::Filter {
            id: PlanNodeId(1),
            source: values(),
            predicate: Expression::Boolean(true),
        });
        assert!(pattern.matches(&filter, &IdentityLookup).is_none());
    }
}
