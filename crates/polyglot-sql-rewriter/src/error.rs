//! Error types for polyglot-sql-rewriter

use thiserror::Error;

/// The result type for rewrite operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while rewriting a command tree
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// Unexpected internal failure (a required function descriptor or binding is missing)
    #[error("Component error: {0}")]
    Component(String),

    /// Semantically invalid input detected during rewrite
    #[error("Validation error: {0}")]
    Validation(String),

    /// Constant folding failed inside the evaluator
    #[error("Evaluation error: {message}")]
    Evaluation { message: String },

    /// A metadata lookup failed
    #[error("Metadata error: {0}")]
    Metadata(String),
}

impl Error {
    /// Create a component error
    pub fn component(message: impl Into<String>) -> Self {
        Error::Component(message.into())
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    /// Create an evaluation error
    pub fn evaluation(message: impl Into<String>) -> Self {
        Error::Evaluation {
            message: message.into(),
        }
    }

    /// Create a metadata error
    pub fn metadata(message: impl Into<String>) -> Self {
        Error::Metadata(message.into())
    }

    /// Whether the error should be reported to the end user as a query-preparation failure
    /// rather than an internal fault.
    pub fn is_processing(&self) -> bool {
        matches!(self, Error::Validation(_) | Error::Evaluation { .. })
    }
}
