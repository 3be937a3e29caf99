//! Scalar helpers shared by the filters and sub-controllers

use libm::fabsf;

/// Lower bound for configured denominators
pub const EPSILON: f32 = 1e-6;

/// Reference loop rate the gains were historically tuned at [Hz]
pub const LOOP_HERTZ_COMPAT: f32 = 832.0;

/// 1 / LOOP_HERTZ_COMPAT
pub const LOOP_HERTZ_COMPAT_RECIP: f32 = 1.0 / LOOP_HERTZ_COMPAT;

/// Sign of `x` with zero counted as positive
#[inline]
pub fn sign(x: f32) -> f32 {
    if x < 0.0 {
        -1.0
    } else {
        1.0
    }
}

/// Moves `value` toward `target` by at most `step`
#[inline]
pub fn rate_limit(value: &mut f32, target: f32, step: f32) {
    let diff = target - *value;
    if fabsf(diff) < step {
        *value = target;
    } else {
        *value += sign(diff) * step;
    }
}

/// Cubic smoothstep, input clamped to [0, 1]
#[inline]
pub fn smoothstep(x: f32) -> f32 {
    let x = x.clamp(0.0, 1.0);
    x * x * (3.0 - 2.0 * x)
}

/// `max(x, EPSILON)` for a denominator taken from configuration
#[inline]
pub fn guard(x: f32) -> f32 {
    x.max(EPSILON)
}

#[inline]
pub fn deg2rad(deg: f32) -> f32 {
    deg * (core::f32::consts::PI / 180.0)
}

#[inline]
pub fn rad2deg(rad: f32) -> f32 {
    rad * (180.0 / core::f32::consts::PI)
}
