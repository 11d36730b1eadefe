//! Plot requests and the arithmetic evaluator boundary.
//!
//! The pipeline never evaluates expressions itself. It asks an
//! [`ArithmeticEvaluator`] to classify a request and to evaluate it at world
//! coordinates. [`ExprEvaluator`] is the built-in `f64` implementation.

mod eval;
mod parse;

use std::collections::BTreeMap;
use std::sync::Arc;

pub use eval::ExprEvaluator;

use crate::error::{EvalError, ParseError};
use crate::geom::Point;

/// Variable bindings: name to textual value.
pub type Variables = BTreeMap<String, String>;

/// Immutable expression plus variable bindings.
///
/// Cloning is cheap; a new request replaces the old one wholesale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlotRequest {
    expression: Arc<str>,
    variables: Arc<Variables>,
}

impl PlotRequest {
    /// Create a request from an expression and its bindings.
    pub fn new<I, K, V>(expression: impl Into<String>, variables: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let variables = variables
            .into_iter()
            .map(|(name, value)| (name.into(), value.into()))
            .collect();
        let expression: String = expression.into();
        Self {
            expression: Arc::from(expression),
            variables: Arc::new(variables),
        }
    }

    /// Create a request without bindings.
    pub fn expression_only(expression: impl Into<String>) -> Self {
        Self::new(expression, std::iter::empty::<(String, String)>())
    }

    /// Expression text.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Variable bindings.
    pub fn variables(&self) -> &Variables {
        &self.variables
    }
}

/// How an expression is turned into geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurveKind {
    /// `y = f(x)`; sampled per screen column into a polyline.
    Explicit,
    /// `F(x, y) = 0`; contoured into line segments.
    Implicit,
}

/// Black-box numeric engine used by curve computation.
///
/// Implementations must be callable from the worker thread. The pipeline
/// calls one evaluator from a single thread at a time and never holds a lock
/// across a call.
pub trait ArithmeticEvaluator: Send + Sync {
    /// Decide whether the expression is an explicit function of `x` or an
    /// implicit curve in `x` and `y`.
    fn classify(&self, expression: &str, variables: &Variables) -> Result<CurveKind, ParseError>;

    /// Evaluate at world coordinates.
    ///
    /// For explicit expressions the result is `f(at.x)`; for implicit ones it
    /// is `F(at.x, at.y)`.
    fn evaluate(&self, expression: &str, variables: &Variables, at: Point)
    -> Result<f64, EvalError>;
}

impl<T: ArithmeticEvaluator + ?Sized> ArithmeticEvaluator for Arc<T> {
    fn classify(&self, expression: &str, variables: &Variables) -> Result<CurveKind, ParseError> {
        (**self).classify(expression, variables)
    }

    fn evaluate(
        &self,
        expression: &str,
        variables: &Variables,
        at: Point,
    ) -> Result<f64, EvalError> {
        (**self).evaluate(expression, variables, at)
    }
}
