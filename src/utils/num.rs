//! Numeric conversions used by logging and the shell.
//!
//! Saturating variants clamp instead of truncating; they feed metrics and benchmark lines
//! where an exact value past `u64::MAX` is meaningless.

#[inline]
#[must_use]
pub fn usize_to_u64(v: usize) -> u64 {
    u64::try_from(v).unwrap_or(u64::MAX)
}

#[inline]
#[must_use]
pub fn u128_to_u64_saturating(v: u128) -> u64 {
    u64::try_from(v).unwrap_or(u64::MAX)
}

#[inline]
#[must_use]
pub fn f64_to_usize(v: f64) -> Option<usize> {
    if !v.is_finite() || v < 0.0 || v.fract() != 0.0 || v > 9_007_199_254_740_992.0 {
        return None;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Some(v as usize)
}

/// An `f64` that is integral and fits `i32`.
#[inline]
#[must_use]
pub fn f64_to_i32_exact(v: f64) -> Option<i32> {
    if v.fract() != 0.0 || v < f64::from(i32::MIN) || v > f64::from(i32::MAX) {
        return None;
    }
    #[allow(clippy::cast_possible_truncation)]
    Some(v as i32)
}
