//! Error types for the rule engine core

use pyo3::exceptions::{PyKeyError, PyValueError};
use pyo3::PyErr;
use thiserror::Error;

/// Main error type for the rule engine core
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuleEngineError {
    #[error("Invalid expression: {0}")]
    InvalidExpression(String),

    #[error("Unbalanced parentheses: {0}")]
    UnbalancedParentheses(String),

    #[error("Malformed expression: {0}")]
    MalformedExpression(String),

    #[error("Unknown operator: {0}")]
    UnknownOperator(String),

    #[error("Malformed condition: {0}")]
    MalformedCondition(String),

    #[error("Rule not found: {0}")]
    RuleNotFound(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

impl From<serde_json::Error> for RuleEngineError {
    fn from(err: serde_json::Error) -> Self {
        RuleEngineError::Deserialization(err.to_string())
    }
}

impl From<RuleEngineError> for PyErr {
    fn from(err: RuleEngineError) -> PyErr {
        match err {
            RuleEngineError::RuleNotFound(id) => {
                PyKeyError::new_err(format!("Rule not found: {}", id))
            }
            other => PyValueError::new_err(other.to_string()),
        }
    }
}

/// Result type alias for the rule engine core
pub type Result<T> = std::result::Result<T, RuleEngineError>;
