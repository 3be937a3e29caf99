//! Smoothed setpoint
//!
//! Three-stage trajectory shaper: a lag filter on the raw target, an eased
//! rate-of-change stage (separate ease-in for moving away from level and for
//! returning to it) and an integrator limited to direction dependent speeds.
//! Every tilt sub-controller drives its target through one of these.

use super::ema::alpha_for;
use crate::math::sign;
use libm::{fabsf, powf};

/// Tuning of a trajectory shaper
///
/// Cutoffs in Hz, speeds in degrees/second. "up" speeds apply while the value
/// leans in the direction of travel, "down" speeds against it; "on" speeds
/// wind the tilt up, "off" speeds wind it back down.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShaperTuning {
    pub cutoff: f32,
    pub ease_in_away_cutoff: f32,
    pub ease_in_back_cutoff: f32,
    pub speed_up_on: f32,
    pub speed_up_off: f32,
    pub speed_down_on: f32,
    pub speed_down_off: f32,
}

impl ShaperTuning {
    /// Build from filter strengths (`cutoff = 10^(2 - strength)`)
    ///
    /// # Arguments
    /// * `strength` - Main lag filter strength
    /// * `on_ease_in` - Ease-in strength when leaning away from level
    /// * `off_ease_in` - Ease-in strength when returning to level
    /// * `speeds` - (up_on, up_off, down_on, down_off) [deg/s]
    pub fn from_strengths(
        strength: f32,
        on_ease_in: f32,
        off_ease_in: f32,
        speeds: (f32, f32, f32, f32),
    ) -> Self {
        Self {
            cutoff: strength_to_cutoff(strength),
            ease_in_away_cutoff: strength_to_cutoff(on_ease_in),
            ease_in_back_cutoff: strength_to_cutoff(off_ease_in),
            speed_up_on: speeds.0,
            speed_up_off: speeds.1,
            speed_down_on: speeds.2,
            speed_down_off: speeds.3,
        }
    }
}

/// Filter strength to cutoff frequency [Hz]
pub fn strength_to_cutoff(strength: f32) -> f32 {
    powf(10.0, 2.0 - strength)
}

/// Shapes a raw (noisy or stepwise) target into a ride trajectory
pub trait TrajectoryShaper {
    /// Recompute coefficients for a tuning and loop frequency
    fn configure(&mut self, tuning: &ShaperTuning, frequency: f32);

    /// Restart from `value` with no motion
    fn reset(&mut self, value: f32);

    /// Advance one tick toward `target`
    fn update(&mut self, target: f32, dt: f32, forward: bool);

    /// Current output [deg]
    fn value(&self) -> f32;

    /// Scale the output toward zero without passing through the filter stages
    fn decay(&mut self, factor: f32);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothSetpoint {
    speed_up_on: f32,
    speed_up_off: f32,
    speed_down_on: f32,
    speed_down_off: f32,

    alpha: f32,
    in_alpha_away: f32,
    in_alpha_back: f32,

    /// Lag-filtered target
    v1: f32,
    /// Current rate of change per tick
    step: f32,
    /// Output
    value: f32,
}

impl SmoothSetpoint {
    /// Unconfigured shaper: holds its value until configured
    pub const fn new() -> Self {
        Self {
            speed_up_on: 0.0,
            speed_up_off: 0.0,
            speed_down_on: 0.0,
            speed_down_off: 0.0,
            alpha: 0.0,
            in_alpha_away: 0.0,
            in_alpha_back: 0.0,
            v1: 0.0,
            step: 0.0,
            value: 0.0,
        }
    }
}

impl Default for SmoothSetpoint {
    fn default() -> Self {
        Self::new()
    }
}

impl TrajectoryShaper for SmoothSetpoint {
    fn configure(&mut self, tuning: &ShaperTuning, frequency: f32) {
        self.speed_up_on = tuning.speed_up_on.max(0.0);
        self.speed_up_off = tuning.speed_up_off.max(0.0);
        self.speed_down_on = tuning.speed_down_on.max(0.0);
        self.speed_down_off = tuning.speed_down_off.max(0.0);

        self.alpha = alpha_for(tuning.cutoff, frequency);
        self.in_alpha_away = alpha_for(tuning.ease_in_away_cutoff, frequency);
        self.in_alpha_back = alpha_for(tuning.ease_in_back_cutoff, frequency);
    }

    fn reset(&mut self, value: f32) {
        self.v1 = 0.0;
        self.step = 0.0;
        self.value = value;
    }

    fn update(&mut self, target: f32, dt: f32, forward: bool) {
        let is_up = (self.value >= 0.0) == forward;

        // 1. lag filter
        self.v1 += self.alpha * (target - self.v1);
        let delta = self.alpha * (self.v1 - self.value);

        // 2. ease the rate in while it grows or reverses
        if fabsf(delta) > fabsf(self.step) || sign(delta) != sign(self.step) {
            let in_alpha = if sign(self.value) == sign(delta) {
                self.in_alpha_away
            } else {
                self.in_alpha_back
            };
            self.step += in_alpha * (delta - self.step);
        } else {
            self.step = delta;
        }

        // 3. speed limited integration
        let (on_speed, off_speed) = if is_up {
            (self.speed_up_on, self.speed_up_off)
        } else {
            (self.speed_down_on, self.speed_down_off)
        };
        let speed_limit = if self.value * target < 0.0 {
            on_speed.max(off_speed)
        } else if fabsf(self.value) > fabsf(target) {
            off_speed
        } else {
            on_speed
        };

        self.value += sign(self.step) * fabsf(self.step).min(speed_limit * dt);
    }

    #[inline]
    fn value(&self) -> f32 {
        self.value
    }

    fn decay(&mut self, factor: f32) {
        self.value *= factor;
        self.v1 *= factor;
        self.step *= factor;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-3;
    const FREQUENCY: f32 = 1000.0;
    const DT: f32 = 1.0 / FREQUENCY;

    fn shaper(speed: f32) -> SmoothSetpoint {
        let mut st = SmoothSetpoint::new();
        st.configure(
            &ShaperTuning::from_strengths(1.0, 0.5, 0.5, (speed, speed, speed, speed)),
            FREQUENCY,
        );
        st.reset(0.0);
        st
    }

    #[test]
    fn test_strength_to_cutoff() {
        assert!((strength_to_cutoff(1.0) - 10.0).abs() < 1e-4);
        assert!((strength_to_cutoff(2.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_converges_to_constant_target() {
        let speed = 10.0;
        let mut st = shaper(speed);
        for _ in 0..(20.0 * FREQUENCY) as usize {
            st.update(5.0, DT, true);
            // never further past the target than one tick at the speed limit
            assert!(st.value() <= 5.0 + speed * DT);
        }
        assert!((st.value() - 5.0).abs() < EPSILON);
    }

    #[test]
    fn test_monotonic_approach() {
        let mut st = shaper(20.0);
        let mut last = st.value();
        for _ in 0..5000 {
            st.update(-4.0, DT, true);
            assert!(st.value() <= last);
            last = st.value();
        }
        assert!((last + 4.0).abs() < EPSILON);
    }

    #[test]
    fn test_respects_speed_limit() {
        let speed = 2.0;
        let mut st = shaper(speed);
        let mut last = st.value();
        for _ in 0..2000 {
            st.update(50.0, DT, true);
            assert!(st.value() - last <= speed * DT + 1e-6);
            last = st.value();
        }
    }

    #[test]
    fn test_asymmetric_off_speed() {
        let mut st = SmoothSetpoint::new();
        st.configure(
            &ShaperTuning::from_strengths(1.0, 0.5, 0.5, (1.0, 10.0, 1.0, 10.0)),
            FREQUENCY,
        );
        st.reset(5.0);
        let before = st.value();
        for _ in 0..100 {
            st.update(0.0, DT, true);
        }
        // winding down uses the faster "off" limit
        assert!(before - st.value() > 1.0 * 100.0 * DT);
    }

    #[test]
    fn test_reset_holds_value_without_motion() {
        let mut st = shaper(10.0);
        st.reset(3.0);
        assert_eq!(st.value(), 3.0);
        assert_eq!(st.step, 0.0);
    }

    #[test]
    fn test_decay_scales_output() {
        let mut st = shaper(10.0);
        st.reset(4.0);
        st.decay(0.5);
        assert_eq!(st.value(), 2.0);
    }
}
