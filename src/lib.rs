//! relq - relational query plan rewriters
//!
//! The middle-end of a SQL planner: takes the analyzer's plan, which may
//! still contain correlated subquery constructs (`Apply`, `LateralJoin`)
//! and high-level set operations (`Intersect`, `Except`), and lowers it to
//! the operators the executor understands.
//!
//! ## Pipeline
//!
//! ```text
//! analyzer plan
//!   → Optimizer::optimize() → fixed point over the rewrite rules
//!   → verify::check_subqueries_rewritten() → subquery-free plan
//!   → physical planning
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use relq::allocator::{PlanNodeIdAllocator, SymbolAllocator};
//! use relq::lookup::IdentityLookup;
//! use relq::optimizer::{verify, Context, Optimizer};
//!
//! let mut symbols = SymbolAllocator::from_plan(&plan);
//! let mut ids = PlanNodeIdAllocator::new();
//! let mut context = Context::new(&mut symbols, &mut ids, &IdentityLookup);
//! let optimized = Optimizer::new(functions).optimize(plan, &mut context)?;
//! verify::check_subqueries_rewritten(&optimized, &IdentityLookup)?;
//! ```

pub mod allocator;
pub mod cardinality;
pub mod error;
pub mod expr;
pub mod functions;
pub mod lookup;
pub mod optimizer;
pub mod pattern;
pub mod plan;
pub mod types;

#[cfg(test)]
pub mod test_utils;

pub use error::{PlannerError, PlannerResult};
pub use optimizer::{Context, Optimizer, OptimizerConfig, Rule};
pub use plan::PlanNode;
