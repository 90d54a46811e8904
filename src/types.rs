//! Data types carried on plan variables
//!
//! The rewriters only ever inspect `Bigint` and `Boolean`; every other type
//! flows through opaquely.

use std::collections::HashMap;

/// Data type of a plan variable
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DataType {
    /// 64-bit signed integer
    Bigint,
    /// Boolean
    Boolean,
    /// Any other type, carried but never inspected
    Other(String),
}

/// Read-only view of the types of all variables known to a plan
#[derive(Debug, Clone, Default)]
pub struct TypeProvider {
    types: HashMap<String, DataType>,
}

impl TypeProvider {
    /// Create an empty provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a variable's type
    pub fn insert(&mut self, name: impl Into<String>, data_type: DataType) {
        self.types.insert(name.into(), data_type);
    }

    /// Look up the type of a variable by name
    pub fn get(&self, name: &str) -> Option<&DataType> {
        self.types.get(name)
    }

    /// Whether a variable with this name is known
    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }
}
