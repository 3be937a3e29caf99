// Adaptive Torque Response
//
// Compares the acceleration the applied current should produce with the one
// actually measured. A persistent gap (incline, soft ground) leans the nose
// in the direction that lets the rider counter it.

use super::{SETPOINT_DECAY, TARGET_DECAY};
use crate::config::BalanceConfig;
use crate::filters::{ShaperTuning, SmoothSetpoint, TrajectoryShaper};
use crate::math::sign;
use crate::motor::MotorData;
use libm::fabsf;

/// Current needed just to hold speed while balancing [A]
const TORQUE_OFFSET: f32 = 8.0;

/// Above this current the torque/acceleration relation flattens [A]
const TORQUE_KNEE: f32 = 25.0;

/// Ratio of the accel-per-amp factor above the knee
const TORQUE_KNEE_FACTOR: f32 = 1.3;

/// Measured acceleration is clamped to this (erpm per reference tick)
const MEASURED_ACCEL_LIMIT: f32 = 5.0;

const SPEED_BOOST_START_ERPM: f32 = 3000.0;

#[derive(Debug, Clone)]
pub struct Atr<S: TrajectoryShaper = SmoothSetpoint> {
    /// Smoothed expected - measured acceleration
    pub accel_diff: f32,
    /// Current strength boost from speed (-1..1)
    pub speed_boost: f32,
    pub expected_acceleration: f32,
    pub measured_acceleration: f32,
    /// Target after the deadband, before smoothing
    raw_target: f32,
    target: f32,
    speed_boost_mult: f32,
    shaper: S,
}

impl<S: TrajectoryShaper + Default> Atr<S> {
    pub fn new() -> Self {
        Self {
            accel_diff: 0.0,
            speed_boost: 0.0,
            expected_acceleration: 0.0,
            measured_acceleration: 0.0,
            raw_target: 0.0,
            target: 0.0,
            speed_boost_mult: 1.0 / SPEED_BOOST_START_ERPM,
            shaper: S::default(),
        }
    }
}

impl<S: TrajectoryShaper + Default> Default for Atr<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: TrajectoryShaper> Atr<S> {
    pub fn configure(&mut self, config: &BalanceConfig, frequency: f32) {
        let tuning = ShaperTuning::from_strengths(
            config.atr_filter_strength,
            config.atr_on_ease_in,
            config.atr_off_ease_in,
            (
                config.atr_on_speed,
                config.atr_off_speed,
                config.atr_on_speed,
                config.atr_off_speed * config.atr_transition_boost,
            ),
        );
        self.shaper.configure(&tuning, frequency);

        // above 0.4, each extra 10% of boost stretches the ramp by 500 erpm
        let boost = fabsf(config.atr_speed_boost);
        self.speed_boost_mult = if boost > 0.4 {
            1.0 / ((boost - 0.4) * 5000.0 + SPEED_BOOST_START_ERPM)
        } else {
            1.0 / SPEED_BOOST_START_ERPM
        };
    }

    pub fn reset(&mut self) {
        self.accel_diff = 0.0;
        self.speed_boost = 0.0;
        self.raw_target = 0.0;
        self.target = 0.0;
        self.shaper.reset(0.0);
    }

    /// Advance one tick
    ///
    /// # Arguments
    /// * `motor` - Motor state of this tick
    /// * `config` - Active configuration
    /// * `wheelslip` - Motor cues are unreliable, only decay
    /// * `dt` - Tick length [s]
    pub fn update(&mut self, motor: &MotorData, config: &BalanceConfig, wheelslip: bool, dt: f32) {
        let forward = if wheelslip {
            self.target *= TARGET_DECAY;
            motor.forward
        } else {
            self.calculate_target(motor, config)
        };
        self.shaper.update(self.target, dt, forward);
    }

    /// Decay toward zero while disengaged
    pub fn winddown(&mut self) {
        self.target *= TARGET_DECAY;
        self.shaper.decay(SETPOINT_DECAY);
    }

    /// Shaped lean contribution [deg]
    pub fn setpoint(&self) -> f32 {
        self.shaper.value()
    }

    pub fn raw_target(&self) -> f32 {
        self.raw_target
    }

    /// Returns the direction used for shaping
    fn calculate_target(&mut self, motor: &MotorData, config: &BalanceConfig) -> bool {
        let current = motor.filtered_current;
        let abs_torque = fabsf(current);
        let (threshold, accel_factor) = if motor.braking {
            (config.atr_threshold_down, config.atr_amps_decel_ratio)
        } else {
            (config.atr_threshold_up, config.atr_amps_accel_ratio)
        };
        let accel_factor2 = accel_factor * TORQUE_KNEE_FACTOR;

        self.measured_acceleration = motor
            .acceleration
            .clamp(-MEASURED_ACCEL_LIMIT, MEASURED_ACCEL_LIMIT);

        self.expected_acceleration = if abs_torque < TORQUE_KNEE {
            (current - motor.erpm_sign * TORQUE_OFFSET) / accel_factor
        } else {
            let torque_sign = sign(current);
            (torque_sign * TORQUE_KNEE - motor.erpm_sign * TORQUE_OFFSET) / accel_factor
                + torque_sign * (abs_torque - TORQUE_KNEE) / accel_factor2
        };

        let mut forward = motor.erpm > 0.0;
        if motor.abs_erpm < 250.0 && abs_torque > 30.0 {
            forward = self.expected_acceleration > 0.0;
        }

        // 低速ほどノイズが多いので強くフィルタする
        let new_diff = self.expected_acceleration - self.measured_acceleration;
        self.accel_diff = if motor.abs_erpm > 2000.0 {
            0.9 * self.accel_diff + 0.1 * new_diff
        } else if motor.abs_erpm > 1000.0 {
            0.95 * self.accel_diff + 0.05 * new_diff
        } else if motor.abs_erpm > 250.0 {
            0.98 * self.accel_diff + 0.02 * new_diff
        } else {
            0.0
        };

        let mut strength = if forward == (self.accel_diff > 0.0) {
            config.atr_strength_up
        } else {
            config.atr_strength_down
        };

        if motor.abs_erpm > SPEED_BOOST_START_ERPM && !motor.braking {
            let ramp = (motor.abs_erpm - SPEED_BOOST_START_ERPM) * self.speed_boost_mult;
            self.speed_boost = ramp.min(1.0) * config.atr_speed_boost;
            strength += strength * self.speed_boost;
        } else {
            self.speed_boost = 0.0;
        }

        let mut new_target = strength * self.accel_diff;
        if fabsf(new_target) < threshold {
            new_target = 0.0;
        } else {
            new_target -= sign(new_target) * threshold;
        }
        self.raw_target = new_target;

        self.target = (self.target * 0.95 + 0.05 * new_target)
            .clamp(-config.atr_angle_limit, config.atr_angle_limit);

        forward
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motor::MotorSample;

    const HZ: f32 = 832.0;
    const DT: f32 = 1.0 / HZ;

    fn atr() -> Atr {
        let mut atr = Atr::new();
        atr.configure(&BalanceConfig::default(), HZ);
        atr
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

    #[test]
    fn test_expected_acceleration_above_knee() {
        let config = BalanceConfig::default();
        let md = motor(5000.0, 40.0);
        let mut atr = atr();
        for _ in 0..2000 {
            atr.update(&md, &config, false, DT);
        }

        // (25 - 8) / 15 + (40 - 25) / (15 * 1.3)
        let expected = 17.0 / 15.0 + 15.0 / 19.5;
        assert!((atr.expected_acceleration - expected).abs() < 1e-2);
        assert!(atr.setpoint().is_finite());
        assert!(atr.setpoint().abs() <= config.atr_angle_limit + 1e-3);
        assert!(atr.setpoint() > 0.0);
    }

    #[test]
    fn test_deadband_gives_exact_zero() {
        let config = BalanceConfig::default();
        // 8Aのオフセット分だけ = 期待加速度0、実測0
        let md = motor(2500.0, 8.0);
        let mut atr = atr();
        for _ in 0..500 {
            atr.update(&md, &config, false, DT);
            assert!(fabsf(atr.accel_diff * config.atr_strength_up) < config.atr_threshold_up);
            assert_eq!(atr.raw_target(), 0.0);
        }
        assert_eq!(atr.setpoint(), 0.0);
    }

    #[test]
    fn test_standstill_clears_accel_diff() {
        let config = BalanceConfig::default();
        let md = motor(100.0, 20.0);
        let mut atr = atr();
        atr.accel_diff = 3.0;
        atr.update(&md, &config, false, DT);
        assert_eq!(atr.accel_diff, 0.0);
    }

    #[test]
    fn test_speed_boost_only_when_accelerating_fast() {
        let mut config = BalanceConfig::default();
        config.atr_speed_boost = 0.3;
        let mut atr = atr();

        atr.update(&motor(6000.0, 20.0), &config, false, DT);
        assert!((atr.speed_boost - 0.3).abs() < 1e-3);

        atr.update(&motor(2000.0, 20.0), &config, false, DT);
        assert_eq!(atr.speed_boost, 0.0);

        atr.update(&motor(6000.0, -20.0), &config, false, DT);
        assert_eq!(atr.speed_boost, 0.0);
    }

    #[test]
    fn test_wheelslip_decays_target() {
        let config = BalanceConfig::default();
        let md = motor(5000.0, 40.0);
        let mut atr = atr();
        for _ in 0..2000 {
            atr.update(&md, &config, false, DT);
        }
        let before = atr.target;
        atr.update(&md, &config, true, DT);
        assert!((atr.target - before * TARGET_DECAY).abs() < 1e-6);
    }

    #[test]
    fn test_winddown_and_reset() {
        let config = BalanceConfig::default();
        let md = motor(5000.0, 40.0);
        let mut atr = atr();
        for _ in 0..2000 {
            atr.update(&md, &config, false, DT);
        }
        let before = atr.setpoint();
        atr.winddown();
        assert!(atr.setpoint().abs() < before.abs());

        atr.reset();
        assert_eq!(atr.setpoint(), 0.0);
        assert_eq!(atr.accel_diff, 0.0);
    }

    #[test]
    fn test_spike_stays_bounded() {
        let config = BalanceConfig::default();
        let mut md = motor(5000.0, 40.0);
        md.acceleration = 1.0e9;
        md.filtered_current = 1.0e6;
        let mut atr = atr();
        atr.update(&md, &config, false, DT);
        assert!(atr.measured_acceleration <= MEASURED_ACCEL_LIMIT);
        assert!(atr.target.abs() <= config.atr_angle_limit);
    }
}
