//! Rewrite rules
//!
//! Each rule eliminates one high-level relational construct in favor of
//! executor-friendly operators.

pub mod correlated_in_to_join;
pub mod remove_unreferenced_scalar_lateral;
pub mod set_operations;
pub mod simplify_count_over_constant;
