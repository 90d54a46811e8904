//! Plan formatting
//!
//! One node per line, children indented. Used by diagnostics and tests.

use std::fmt::Write;

use crate::plan::{PlanNode, Variable};

/// Format a plan as an indented tree
pub fn format_plan(plan: &PlanNode) -> String {
    let mut out = String::new();
    format_node(plan, 0, &mut out);
    out
}

fn format_node(plan: &PlanNode, indent: usize, out: &mut String) {
    let prefix = "  ".repeat(indent);

    match plan {
        PlanNode::Scan { table, outputs, .. } => {
            let _ = writeln!(out, "{}Scan: {} [{}]", prefix, table, names(outputs));
        }

        PlanNode::Values { outputs, rows, .. } => {
            let _ = writeln!(
                out,
                "{}Values: [{}] ({} rows)",
                prefix,
                names(outputs),
                rows.len()
            );
        }

        PlanNode::Project {
            source,
            assignments,
            ..
        } => {
            let bindings: Vec<String> = assignments
                .iter()
                .map(|(v, e)| format!("{} := {:?}", v.name, e))
                .collect();
            let _ = writeln!(out, "{}Project: [{}]", prefix, bindings.join(", "));
            format_node(source, indent + 1, out);
        }

        PlanNode::Filter {
            source, predicate, ..
        } => {
            let _ = writeln!(out, "{}Filter: {:?}", prefix, predicate);
            format_node(source, indent + 1, out);
        }

        PlanNode::Aggregation {
            source,
            aggregations,
            grouping_set,
            ..
        } => {
            let aggs: Vec<String> = aggregations
                .iter()
                .map(|(v, call)| {
                    format!("{} := {}({:?})", v.name, call.function.name(), call.arguments)
                })
                .collect();
            let _ = writeln!(out, "{}Aggregation: [{}]", prefix, aggs.join(", "));
            if !grouping_set.is_empty() {
                let _ = writeln!(out, "{}  group by: [{}]", prefix, names(grouping_set));
            }
            format_node(source, indent + 1, out);
        }

        PlanNode::Union {
            sources, mapping, ..
        } => {
            let outputs: Vec<Variable> = mapping.outputs().cloned().collect();
            let _ = writeln!(out, "{}Union: [{}]", prefix, names(&outputs));
            for source in sources {
                format_node(source, indent + 1, out);
            }
        }

        PlanNode::Intersect {
            sources, mapping, ..
        } => {
            let outputs: Vec<Variable> = mapping.outputs().cloned().collect();
            let _ = writeln!(out, "{}Intersect: [{}]", prefix, names(&outputs));
            for source in sources {
                format_node(source, indent + 1, out);
            }
        }

        PlanNode::Except {
            sources, mapping, ..
        } => {
            let outputs: Vec<Variable> = mapping.outputs().cloned().collect();
            let _ = writeln!(out, "{}Except: [{}]", prefix, names(&outputs));
            for source in sources {
                format_node(source, indent + 1, out);
            }
        }

        PlanNode::Join {
            kind,
            left,
            right,
            criteria,
            filter,
            ..
        } => {
            let _ = writeln!(out, "{}Join: {:?}", prefix, kind);
            if !criteria.is_empty() {
                let pairs: Vec<String> = criteria
                    .iter()
                    .map(|(l, r)| format!("{} = {}", l.name, r.name))
                    .collect();
                let _ = writeln!(out, "{}  criteria: [{}]", prefix, pairs.join(", "));
            }
            if let Some(filter) = filter {
                let _ = writeln!(out, "{}  filter: {:?}", prefix, filter);
            }
            format_node(left, indent + 1, out);
            format_node(right, indent + 1, out);
        }

        PlanNode::AssignUniqueId {
            source,
            id_variable,
            ..
        } => {
            let _ = writeln!(out, "{}AssignUniqueId: {}", prefix, id_variable.name);
            format_node(source, indent + 1, out);
        }

        PlanNode::Apply {
            input,
            subquery,
            subquery_assignments,
            correlation,
            ..
        } => {
            let bindings: Vec<String> = subquery_assignments
                .iter()
                .map(|(v, e)| format!("{} := {:?}", v.name, e))
                .collect();
            let _ = writeln!(
                out,
                "{}Apply: [{}] correlation [{}]",
                prefix,
                bindings.join(", "),
                names(correlation)
            );
            format_node(input, indent + 1, out);
            format_node(subquery, indent + 1, out);
        }

        PlanNode::LateralJoin {
            input,
            subquery,
            correlation,
            ..
        } => {
            let _ = writeln!(
                out,
                "{}LateralJoin: correlation [{}]",
                prefix,
                names(correlation)
            );
            format_node(input, indent + 1, out);
            format_node(subquery, indent + 1, out);
        }
    }
}

fn names(variables: &[Variable]) -> String {
    variables
        .iter()
        .map(|v| v.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
