// Balance PID with direction dependent brake scaling

use crate::config::BalanceConfig;
use crate::math::{sign, LOOP_HERTZ_COMPAT};
use crate::motor::MotorData;
use libm::fabsf;

/// Below this speed every scale eases back to 1.0 [erpm]
const SCALE_RESET_ERPM: f32 = 500.0;

/// Per-tick smoothing of the gain scales
const SCALE_ALPHA: f32 = 0.01;

/// P + I + rate controller on balance pitch
///
/// The rate term replaces D and uses the gyro pitch rate directly.
#[derive(Debug, Clone)]
pub struct Pid {
    /// Proportional term [A]
    pub p: f32,
    /// Integral term [A]
    pub i: f32,
    /// Rate term [A]
    pub rate_p: f32,

    kp_brake_scale: f32,
    kp2_brake_scale: f32,
    kp_accel_scale: f32,
    kp2_accel_scale: f32,
}

impl Pid {
    pub fn new() -> Self {
        Self {
            p: 0.0,
            i: 0.0,
            rate_p: 0.0,
            kp_brake_scale: 1.0,
            kp2_brake_scale: 1.0,
            kp_accel_scale: 1.0,
            kp2_accel_scale: 1.0,
        }
    }

    /// Update the PID
    ///
    /// # Arguments
    /// * `setpoint` - Combined lean setpoint [deg]
    /// * `balance_pitch` - Measured balance pitch [deg]
    /// * `pitch_rate` - Gyro pitch rate [deg/s]
    /// * `motor` - Motor state of this tick
    /// * `config` - Active configuration
    /// * `dt` - Tick length [s]
    ///
    /// # Returns
    /// p + i + rate_p [A]
    pub fn update(
        &mut self,
        setpoint: f32,
        balance_pitch: f32,
        pitch_rate: f32,
        motor: &MotorData,
        config: &BalanceConfig,
        dt: f32,
    ) -> f32 {
        let error = setpoint - balance_pitch;

        // Integral term, gains are tuned per 832Hz tick
        self.i += error * config.ki * dt * LOOP_HERTZ_COMPAT;
        if config.ki_limit > 0.0 && fabsf(self.i) > config.ki_limit {
            self.i = config.ki_limit * sign(self.i);
        }

        self.update_scales(motor, config);

        let p_scale = if error > 0.0 {
            self.kp_accel_scale
        } else {
            self.kp_brake_scale
        };
        self.p = error * config.kp * p_scale;

        let rate_p = -pitch_rate * config.kp2;
        let rate_scale = if rate_p > 0.0 {
            self.kp2_accel_scale
        } else {
            self.kp2_brake_scale
        };
        self.rate_p = rate_p * rate_scale;

        self.p + self.i + self.rate_p
    }

    /// Reset all terms and scales (on engage)
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Get the current integral term
    pub fn get_integral(&self) -> f32 {
        self.i
    }

    /// Brake scaling is eased in so the gain never jumps at a direction change
    fn update_scales(&mut self, motor: &MotorData, config: &BalanceConfig) {
        let (brake_target, accel_target) = if motor.abs_erpm < SCALE_RESET_ERPM {
            ((1.0, 1.0), (1.0, 1.0))
        } else if motor.erpm > 0.0 {
            ((config.kp_brake, config.kp2_brake), (1.0, 1.0))
        } else {
            // rolling backwards, braking pushes the nose the other way
            ((1.0, 1.0), (config.kp_brake, config.kp2_brake))
        };

        ease(&mut self.kp_brake_scale, brake_target.0);
        ease(&mut self.kp2_brake_scale, brake_target.1);
        ease(&mut self.kp_accel_scale, accel_target.0);
        ease(&mut self.kp2_accel_scale, accel_target.1);
    }
}

impl Default for Pid {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn ease(scale: &mut f32, target: f32) {
    *scale = SCALE_ALPHA * target + (1.0 - SCALE_ALPHA) * *scale;
}
