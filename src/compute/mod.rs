//! Curve computation: explicit sampling and implicit contour extraction.
//!
//! A pass either returns complete geometry for one request and one viewport,
//! or stops early with [`ComputeError`]. Partial output is dropped.

mod explicit;
mod implicit;

use thiserror::Error;

use crate::config::PipelineConfig;
use crate::error::{EvalError, ParseError};
use crate::expr::{ArithmeticEvaluator, CurveKind, PlotRequest};
use crate::generation::CancellationToken;
use crate::geom::{PlotGeometry, Point};
use crate::view::ViewportSnapshot;

/// Why a pass produced no geometry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComputeError {
    /// The token reported stale. Flow control, not a failure.
    #[error("computation cancelled")]
    Cancelled,
    /// The expression does not parse.
    #[error("structural error: {0}")]
    Structural(#[from] ParseError),
}

/// Compute geometry for `request` over `snapshot`.
///
/// Per-sample domain failures and non-finite values become discontinuities.
/// The token is polled every `config.column_batch` columns (explicit) or once
/// per grid row (implicit).
pub fn compute_geometry(
    evaluator: &dyn ArithmeticEvaluator,
    request: &PlotRequest,
    snapshot: &ViewportSnapshot,
    token: &CancellationToken,
    config: &PipelineConfig,
) -> Result<PlotGeometry, ComputeError> {
    if token.is_cancelled() {
        return Err(ComputeError::Cancelled);
    }
    let kind = evaluator.classify(request.expression(), request.variables())?;
    let sampler = Sampler { evaluator, request };
    match kind {
        CurveKind::Explicit => explicit::sample(&sampler, snapshot, token, config),
        CurveKind::Implicit => implicit::extract(&sampler, snapshot, token, config),
    }
}

/// Evaluator bound to one request.
struct Sampler<'a> {
    evaluator: &'a dyn ArithmeticEvaluator,
    request: &'a PlotRequest,
}

impl Sampler<'_> {
    /// Finite value at `at`, `None` for an undefined sample.
    fn sample(&self, at: Point) -> Result<Option<f64>, ComputeError> {
        match self
            .evaluator
            .evaluate(self.request.expression(), self.request.variables(), at)
        {
            Ok(value) => Ok(value.is_finite().then_some(value)),
            Err(EvalError::Domain(_)) => Ok(None),
            Err(EvalError::Parse(error)) => Err(ComputeError::Structural(error)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::ExprEvaluator;
    use crate::generation::GenerationGuard;

    fn snapshot() -> ViewportSnapshot {
        ViewportSnapshot::new(-1.0, 1.0, -1.0, 1.0, 64, 64).expect("valid")
    }

    #[test]
    fn structural_error_aborts() {
        let result = compute_geometry(
            &ExprEvaluator::new(),
            &PlotRequest::expression_only("x * (1 +"),
            &snapshot(),
            &CancellationToken::detached(),
            &PipelineConfig::default(),
        );
        assert!(matches!(result, Err(ComputeError::Structural(_))));
    }

    #[test]
    fn stale_token_produces_nothing() {
        let guard = GenerationGuard::new();
        let token = guard.token_for(guard.mint_next());
        guard.mint_next();
        for expression in ["x", "x^2 + y^2 - 1"] {
            let result = compute_geometry(
                &ExprEvaluator::new(),
                &PlotRequest::expression_only(expression),
                &snapshot(),
                &token,
                &PipelineConfig::default(),
            );
            assert_eq!(result, Err(ComputeError::Cancelled));
        }
    }
}
