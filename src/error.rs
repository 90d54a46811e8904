//! Planner error types

use thiserror::Error;

/// Errors raised while rewriting a query plan
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlannerError {
    /// A subquery form the rewriters cannot eliminate
    #[error("{0}")]
    UnsupportedSubquery(String),

    /// Planning was cancelled between rewrite passes
    #[error("Query planning was cancelled")]
    Cancelled,

    /// Broken planner invariant
    #[error("Internal planner error: {0}")]
    Internal(String),
}

/// Result type for planner operations
pub type PlannerResult<T> = Result<T, PlannerError>;
