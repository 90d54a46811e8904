//! Function resolution for the standard aggregations used by the rewriters

use crate::types::DataType;

/// Resolved handle to a scalar or aggregate function
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionHandle {
    name: String,
    argument_types: Vec<DataType>,
}

impl FunctionHandle {
    /// Function name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared argument types
    pub fn argument_types(&self) -> &[DataType] {
        &self.argument_types
    }
}

/// Resolves the standard functions the rewriters synthesize calls to
#[derive(Debug, Clone, Copy, Default)]
pub struct FunctionResolution;

impl FunctionResolution {
    /// Zero-argument `count()`, i.e. `count(*)`
    pub fn count_function(&self) -> FunctionHandle {
        FunctionHandle {
            name: "count".to_string(),
            argument_types: Vec::new(),
        }
    }

    /// Single-argument `count(BIGINT)` counting non-null inputs
    pub fn count_column_function(&self) -> FunctionHandle {
        FunctionHandle {
            name: "count".to_string(),
            argument_types: vec![DataType::Bigint],
        }
    }

    /// Whether the handle refers to `count` in any arity
    pub fn is_count_function(&self, handle: &FunctionHandle) -> bool {
        handle.name == "count"
    }
}
