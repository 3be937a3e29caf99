// Brake tilt
//
// Lifts the nose with a lingering delay while braking hard, unless the ATR
// acceleration gap says we are going downhill.

use super::{SETPOINT_DECAY, TARGET_DECAY};
use crate::config::BalanceConfig;
use crate::filters::{ShaperTuning, SmoothSetpoint, TrajectoryShaper};
use crate::math::sign;
use crate::motor::MotorData;
use libm::fabsf;

const MIN_BRAKING_ERPM: f32 = 2000.0;

#[derive(Debug, Clone)]
pub struct BrakeTilt<S: TrajectoryShaper = SmoothSetpoint> {
    /// Negative divisor of the balance offset, 0 = disabled
    factor: f32,
    target: f32,
    shaper: S,
}

impl<S: TrajectoryShaper + Default> BrakeTilt<S> {
    pub fn new() -> Self {
        Self {
            factor: 0.0,
            target: 0.0,
            shaper: S::default(),
        }
    }
}

impl<S: TrajectoryShaper + Default> Default for BrakeTilt<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: TrajectoryShaper> BrakeTilt<S> {
    pub fn configure(&mut self, config: &BalanceConfig, frequency: f32) {
        self.factor = if config.braketilt_strength == 0.0 {
            0.0
        } else {
            -(0.5 + (20.0 - config.braketilt_strength) / 5.0)
        };

        let off_speed = config.atr_off_speed / config.braketilt_lingering.max(1.0);
        let tuning = ShaperTuning::from_strengths(
            config.atr_filter_strength,
            config.atr_on_ease_in,
            config.atr_off_ease_in,
            (config.atr_on_speed, off_speed, config.atr_on_speed, off_speed),
        );
        self.shaper.configure(&tuning, frequency);
    }

    pub fn reset(&mut self) {
        self.target = 0.0;
        self.shaper.reset(0.0);
    }

    /// Advance one tick
    ///
    /// # Arguments
    /// * `motor` - Motor state of this tick
    /// * `accel_diff` - ATR acceleration gap of this tick
    /// * `balance_offset` - setpoint - balance pitch [deg]
    /// * `wheelslip` - Only decay
    /// * `dt` - Tick length [s]
    pub fn update(
        &mut self,
        motor: &MotorData,
        accel_diff: f32,
        balance_offset: f32,
        wheelslip: bool,
        dt: f32,
    ) {
        if wheelslip {
            self.target *= TARGET_DECAY;
        } else if self.factor < 0.0 && motor.braking && motor.abs_erpm > MIN_BRAKING_ERPM {
            // negative current alone is not active braking, the offset has to oppose travel too
            if sign(balance_offset) != motor.erpm_sign {
                let mut downhill_damper = 1.0;
                if (motor.erpm > 1000.0 && accel_diff < -1.0)
                    || (motor.erpm < -1000.0 && accel_diff > 1.0)
                {
                    downhill_damper += fabsf(accel_diff) / 2.0;
                }

                self.target = if downhill_damper > 2.0 {
                    0.0
                } else {
                    balance_offset / self.factor / downhill_damper
                };
            }
        } else {
            self.target = 0.0;
        }

        self.shaper.update(self.target, dt, motor.forward);
    }

    pub fn winddown(&mut self) {
        self.target *= TARGET_DECAY;
        self.shaper.decay(SETPOINT_DECAY);
    }

    pub fn setpoint(&self) -> f32 {
        self.shaper.value()
    }

    pub fn target(&self) -> f32 {
        self.target
    }
}
