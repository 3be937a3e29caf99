// Booster: extra current once the nose is pushed past an angle

use crate::config::BalanceConfig;
use crate::math::{guard, sign};
use crate::motor::MotorData;
use libm::fabsf;

#[derive(Debug, Clone, Default)]
pub struct Booster {
    /// Smoothed booster current [A]
    pub current: f32,
}

impl Booster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.current = 0.0;
    }

    /// # Arguments
    /// * `motor` - Motor state of this tick
    /// * `config` - Active configuration
    /// * `proportional` - setpoint - brake tilt - telemetry pitch [deg]
    pub fn update(&mut self, motor: &MotorData, config: &BalanceConfig, proportional: f32) -> f32 {
        let (angle, ramp, max_current) = if motor.braking {
            (
                config.brkbooster_angle,
                config.brkbooster_ramp,
                config.brkbooster_current,
            )
        } else {
            (
                config.booster_angle,
                config.booster_ramp,
                config.booster_current,
            )
        };

        let abs_proportional = fabsf(proportional);
        let new_current = if abs_proportional > angle {
            ((abs_proportional - angle) / guard(ramp)).min(1.0) * max_current * sign(proportional)
        } else {
            0.0
        };

        self.current = 0.99 * self.current + 0.01 * new_current;
        self.current
    }
}
