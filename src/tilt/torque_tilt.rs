// Torque tilt
//
// Leans the nose in proportion to the motor current above a start threshold.

use super::{SETPOINT_DECAY, TARGET_DECAY};
use crate::config::BalanceConfig;
use crate::filters::{ShaperTuning, SmoothSetpoint, TrajectoryShaper};
use crate::math::sign;
use crate::motor::MotorData;
use libm::fabsf;

#[derive(Debug, Clone)]
pub struct TorqueTilt<S: TrajectoryShaper = SmoothSetpoint> {
    target: f32,
    shaper: S,
}

impl<S: TrajectoryShaper + Default> TorqueTilt<S> {
    pub fn new() -> Self {
        Self {
            target: 0.0,
            shaper: S::default(),
        }
    }
}

impl<S: TrajectoryShaper + Default> Default for TorqueTilt<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: TrajectoryShaper> TorqueTilt<S> {
    pub fn configure(&mut self, config: &BalanceConfig, frequency: f32) {
        let tuning = ShaperTuning::from_strengths(
            config.torquetilt_filter_strength,
            config.torquetilt_on_ease_in,
            config.torquetilt_off_ease_in,
            (
                config.torquetilt_on_speed,
                config.torquetilt_off_speed,
                config.torquetilt_on_speed,
                config.torquetilt_off_speed,
            ),
        );
        self.shaper.configure(&tuning, frequency);
    }

    pub fn reset(&mut self) {
        self.target = 0.0;
        self.shaper.reset(0.0);
    }

    pub fn update(&mut self, motor: &MotorData, config: &BalanceConfig, wheelslip: bool, dt: f32) {
        if wheelslip {
            self.target *= TARGET_DECAY;
        } else {
            let strength = if motor.braking {
                config.torquetilt_strength_regen
            } else {
                config.torquetilt_strength
            };

            // 電流がしきい値を超えた分だけ傾ける
            let current = motor.filtered_current;
            let excess = (fabsf(current) - config.torquetilt_start_current).max(0.0);
            self.target = (excess * strength).min(config.torquetilt_angle_limit) * sign(current);
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motor::MotorSample;

    const HZ: f32 = 832.0;
    const DT: f32 = 1.0 / HZ;
    const EPSILON: f32 = 1e-3;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < EPSILON
    }

    fn motor(erpm: f32, current: f32) -> MotorData {
        let mut md = MotorData::new();
        md.configure(&BalanceConfig::default(), HZ);
        for _ in 0..3000 {
            md.update(
                &MotorSample {
                    erpm,
                    current,
                    ..Default::default()
                },
                DT,
            );
        }
        md
    }

    fn torque_tilt() -> TorqueTilt {
        let mut tt = TorqueTilt::new();
        tt.configure(&BalanceConfig::default(), HZ);
        tt
    }

    #[test]
    fn test_below_start_current_is_zero() {
        let config = BalanceConfig::default();
        let mut tt = torque_tilt();
        tt.update(&motor(3000.0, 9.0), &config, false, DT);
        assert_eq!(tt.target(), 0.0);
    }

    #[test]
    fn test_target_proportional_and_limited() {
        let config = BalanceConfig::default();
        let mut tt = torque_tilt();

        // (20 - 10) * 0.15 = 1.5
        tt.update(&motor(3000.0, 20.0), &config, false, DT);
        assert!(approx_eq(tt.target(), 1.5));

        tt.update(&motor(3000.0, 100.0), &config, false, DT);
        assert!(approx_eq(tt.target(), config.torquetilt_angle_limit));
    }

    #[test]
    fn test_regen_strength_and_sign() {
        let mut config = BalanceConfig::default();
        config.torquetilt_strength_regen = 0.1;
        let mut tt = torque_tilt();

        tt.update(&motor(3000.0, -20.0), &config, false, DT);
        assert!(approx_eq(tt.target(), -1.0));
    }

    #[test]
    fn test_setpoint_converges() {
        let config = BalanceConfig::default();
        let md = motor(3000.0, 20.0);
        let mut tt = torque_tilt();
        for _ in 0..(HZ as usize * 5) {
            tt.update(&md, &config, false, DT);
        }
        assert!((tt.setpoint() - 1.5).abs() < 1e-2);
    }

    #[test]
    fn test_wheelslip_decays() {
        let config = BalanceConfig::default();
        let mut tt = torque_tilt();
        tt.update(&motor(3000.0, 20.0), &config, false, DT);
        tt.update(&motor(3000.0, 80.0), &config, true, DT);
        assert!(approx_eq(tt.target(), 1.5 * TARGET_DECAY));
    }
}
