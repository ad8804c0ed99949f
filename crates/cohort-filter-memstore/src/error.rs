//! Error types for plan execution.

use cohort_filter_compiler::{Column, Value};
use thiserror::Error;

/// Errors that can occur while evaluating a compiled plan.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecError {
    /// A subquery reads a name that is not defined before it.
    #[error("subquery {subquery} reads unknown subquery {name}")]
    UnknownSubquery {
        /// The reading subquery.
        subquery: String,
        /// The missing name.
        name: String,
    },

    /// The plan's root is not one of its subqueries.
    #[error("plan root {0} is not defined")]
    MissingRoot(String),

    /// A subquery's placeholders and values disagree.
    #[error("subquery {subquery} has {expected} placeholders but {actual} values")]
    ParamCountMismatch {
        /// Subquery name.
        subquery: String,
        /// Placeholders in the body.
        expected: usize,
        /// Values supplied.
        actual: usize,
    },

    /// A stored cell cannot be compared with a parameter value.
    #[error("cannot compare column {column} with {value}")]
    TypeMismatch {
        /// Column name.
        column: &'static str,
        /// Parameter value.
        value: String,
    },
}

impl ExecError {
    pub(crate) fn type_mismatch(column: Column, value: &Value) -> Self {
        ExecError::TypeMismatch {
            column: column.name(),
            value: value.to_string(),
        }
    }
}

/// Result type for plan execution.
pub type ExecResult<T> = std::result::Result<T, ExecError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ExecError::ParamCountMismatch {
            subquery: "f_0".to_string(),
            expected: 3,
            actual: 2,
        };
        assert_eq!(err.to_string(), "subquery f_0 has 3 placeholders but 2 values");

        let err = ExecError::type_mismatch(Column::Value, &Value::text("abc"));
        assert_eq!(err.to_string(), "cannot compare column value with 'abc'");
    }
}
