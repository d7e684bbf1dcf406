//! Clamp/limiter shared by the corrector and trajectory code.

/// Bound `value` to `[min, max]`.
///
/// Unlike [`f64::clamp`] this never panics: a NaN `value` resolves to `min`,
/// so callers with finite bounds always get a finite result.
#[inline]
pub fn limit(value: f64, min: f64, max: f64) -> f64 {
    value.max(min).min(max)
}
