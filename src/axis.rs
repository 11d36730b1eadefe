//! Nice-step selection.
//!
//! The `{1, 2, 5} x 10^k` rule sizes the cells of implicit-curve extraction,
//! so density degrades gracefully at extreme zoom.

/// Largest `{1, 2, 5} x 10^k` step not exceeding `target`.
///
/// Returns `None` when `target` is not a positive finite number or the step
/// would not be representable.
pub fn nice_step(target: f64) -> Option<f64> {
    if !target.is_finite() || target <= 0.0 {
        return None;
    }
    let mut exponent = target.log10().floor() as i32;
    // log10 rounding can land one decade off near exact powers of ten.
    if target < decade(exponent) * (1.0 - 1e-12) {
        exponent -= 1;
    } else if target >= decade(exponent + 1) * (1.0 - 1e-12) {
        exponent += 1;
    }
    let mantissa = target / decade(exponent);
    let factor = if mantissa >= 5.0 * (1.0 - 1e-12) {
        5.0
    } else if mantissa >= 2.0 * (1.0 - 1e-12) {
        2.0
    } else {
        1.0
    };
    let step = scaled(factor, exponent);
    (step.is_finite() && step > 0.0).then_some(step)
}

fn decade(exponent: i32) -> f64 {
    scaled(1.0, exponent)
}

/// `factor x 10^exponent`, dividing for negative exponents so decimal steps
/// such as `0.1` come out correctly rounded.
fn scaled(factor: f64, exponent: i32) -> f64 {
    if exponent >= 0 {
        factor * 10_f64.powi(exponent)
    } else {
        factor / 10_f64.powi(-exponent)
    }
}

/// Next step up in the `{1, 2, 5} x 10^k` sequence.
pub fn next_nice_step(step: f64) -> Option<f64> {
    let current = nice_step(step)?;
    nice_step(current * 2.5).filter(|next| *next > current)
}
