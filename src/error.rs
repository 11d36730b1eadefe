//! Error types shared across the pipeline.

use thiserror::Error;

/// Errors reported by pipeline construction and value validation.
#[derive(Debug, Error)]
pub enum PlotError {
    /// Viewport bounds or pixel size violate the snapshot invariants.
    #[error("invalid viewport: {reason}")]
    InvalidViewport {
        /// Which invariant failed.
        reason: &'static str,
    },
    /// A background thread could not be started.
    #[error("failed to spawn {name} thread")]
    Spawn {
        /// Thread name.
        name: &'static str,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// The expression (or one of its bindings) does not parse.
///
/// This is the only error kind that reaches the caller, through
/// `GeometrySink::on_structural_error`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ParseError {
    message: String,
    offset: Option<usize>,
}

impl ParseError {
    /// Create a parse error without a source position.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            offset: None,
        }
    }

    /// Create a parse error pointing at a byte offset in the input.
    pub fn at(offset: usize, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            offset: Some(offset),
        }
    }

    /// Human readable description.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Byte offset of the problem, when known.
    pub fn offset(&self) -> Option<usize> {
        self.offset
    }
}

/// A single evaluation fell outside the function's domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DomainError {
    /// Division by zero.
    #[error("division by zero")]
    DivisionByZero,
    /// A function argument outside its domain.
    #[error("argument outside the domain of {0}")]
    OutOfDomain(&'static str),
}

/// Failure of one `ArithmeticEvaluator::evaluate` call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    /// The expression is structurally invalid; the whole pass aborts.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// The sample is undefined; it becomes a discontinuity.
    #[error(transparent)]
    Domain(#[from] DomainError),
}
