// Base setpoint: centering, pushbacks, reverse stop and noseangling
//
// Everything here is a plain rate limit. Step sizes are per tick at the
// nominal loop frequency.

use crate::config::BalanceConfig;
use crate::math::{rate_limit, sign};
use crate::state::{RideState, SetpointAdjustmentType};
use libm::fabsf;

/// Reverse stop moves its own setpoint smoothly, this only caps it [deg/s]
const REVERSE_STOP_SPEED: f32 = 100.0;

#[derive(Debug, Clone, Default)]
pub struct SetpointAdjustment {
    /// Where the base setpoint is heading [deg]
    pub target: f32,
    /// Rate limited base setpoint [deg]
    pub interpolated: f32,

    startup_step: f32,
    return_step: f32,
    duty_step: f32,
    hv_step: f32,
    lv_step: f32,
    reverse_stop_step: f32,

    duty_angle: f32,
    hv_angle: f32,
    lv_angle: f32,
}

impl SetpointAdjustment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn configure(&mut self, config: &BalanceConfig) {
        let dt = config.dt();
        self.startup_step = config.startup_speed * dt;
        self.return_step = config.tiltback_return_speed * dt;
        self.duty_step = config.tiltback_duty_speed * dt;
        self.hv_step = config.tiltback_hv_speed * dt;
        self.lv_step = config.tiltback_lv_speed * dt;
        self.reverse_stop_step = REVERSE_STOP_SPEED * dt;

        self.duty_angle = config.tiltback_duty_angle;
        self.hv_angle = config.tiltback_hv_angle;
        self.lv_angle = config.tiltback_lv_angle;
    }

    /// Start centering from the engage angle
    pub fn reset(&mut self, balance_pitch: f32) {
        self.target = 0.0;
        self.interpolated = balance_pitch;
    }

    /// Advance one tick
    ///
    /// # Arguments
    /// * `ride` - Ride state; centering ends here once level
    /// * `erpm_sign` - Direction of travel
    /// * `reverse_stop_setpoint` - Used while the reason is `ReverseStop` [deg]
    ///
    /// # Returns
    /// Interpolated base setpoint [deg]
    pub fn update(
        &mut self,
        ride: &mut RideState,
        erpm_sign: f32,
        reverse_stop_setpoint: f32,
    ) -> f32 {
        if ride.sat == SetpointAdjustmentType::Centering && self.interpolated == self.target {
            ride.sat = SetpointAdjustmentType::None;
        }

        let (step, target) = match ride.sat {
            SetpointAdjustmentType::None => (self.return_step, 0.0),
            SetpointAdjustmentType::Centering => (self.startup_step, 0.0),
            SetpointAdjustmentType::ReverseStop => (self.reverse_stop_step, reverse_stop_setpoint),
            SetpointAdjustmentType::PbDuty => (self.duty_step, self.duty_angle * erpm_sign),
            SetpointAdjustmentType::PbHighVoltage => (self.hv_step, self.hv_angle * erpm_sign),
            SetpointAdjustmentType::PbTemperature => (self.hv_step, self.lv_angle * erpm_sign),
            SetpointAdjustmentType::PbLowVoltage | SetpointAdjustmentType::PbBmsConnection => {
                (self.lv_step, self.lv_angle * erpm_sign)
            }
        };

        self.target = if ride.wheelslip { 0.0 } else { target };
        rate_limit(&mut self.interpolated, self.target, step);
        self.interpolated
    }
}

/// Speed dependent nose lift
#[derive(Debug, Clone, Default)]
pub struct Noseangling {
    /// Rate limited output [deg]
    pub value: f32,
    step: f32,
    /// [deg/erpm], signed like tiltback_variable_max
    variable_per_erpm: f32,
    variable_max_erpm: f32,
    constant: f32,
    constant_erpm: f32,
    variable_erpm: f32,
}

impl Noseangling {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn configure(&mut self, config: &BalanceConfig) {
        self.step = config.noseangling_speed * config.dt();
        self.variable_per_erpm =
            config.tiltback_variable / 1000.0 * sign(config.tiltback_variable_max);
        self.variable_max_erpm = if self.variable_per_erpm != 0.0 {
            fabsf(config.tiltback_variable_max / self.variable_per_erpm)
        } else {
            0.0
        };
        self.constant = config.tiltback_constant;
        self.constant_erpm = config.tiltback_constant_erpm;
        self.variable_erpm = config.tiltback_variable_erpm;
    }

    pub fn reset(&mut self) {
        self.value = 0.0;
    }

    pub fn update(&mut self, abs_erpm: f32, erpm_sign: f32) -> f32 {
        let variable_erpm = (abs_erpm - self.variable_erpm).clamp(0.0, self.variable_max_erpm);
        let mut target = self.variable_per_erpm * variable_erpm * erpm_sign;

        if abs_erpm > self.constant_erpm {
            target += self.constant * erpm_sign;
        }

        rate_limit(&mut self.value, target, self.step);
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-4;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < EPSILON
    }

    fn adjustment(config: &BalanceConfig) -> SetpointAdjustment {
        let mut sa = SetpointAdjustment::new();
        sa.configure(config);
        sa
    }

    #[test]
    fn test_centering_reaches_level_then_none() {
        let config = BalanceConfig::default();
        let mut sa = adjustment(&config);
        let mut ride = RideState::new();
        ride.sat = SetpointAdjustmentType::Centering;
        sa.reset(3.0);

        // 3° at 30°/s = 0.1s
        let ticks = (0.1 * config.hertz as f32) as usize + 2;
        for _ in 0..ticks {
            sa.update(&mut ride, 1.0, 0.0);
        }
        assert_eq!(sa.interpolated, 0.0);

        sa.update(&mut ride, 1.0, 0.0);
        assert_eq!(ride.sat, SetpointAdjustmentType::None);
    }

    #[test]
    fn test_step_size_per_reason() {
        let config = BalanceConfig::default();
        let mut sa = adjustment(&config);
        let mut ride = RideState::new();

        ride.sat = SetpointAdjustmentType::PbDuty;
        sa.update(&mut ride, 1.0, 0.0);
        assert!(approx_eq(sa.interpolated, config.tiltback_duty_speed * config.dt()));
        assert!(approx_eq(sa.target, config.tiltback_duty_angle));

        sa.interpolated = 0.0;
        ride.sat = SetpointAdjustmentType::PbLowVoltage;
        sa.update(&mut ride, -1.0, 0.0);
        assert!(approx_eq(sa.interpolated, -config.tiltback_lv_speed * config.dt()));
        assert!(approx_eq(sa.target, -config.tiltback_lv_angle));

        sa.interpolated = 0.0;
        ride.sat = SetpointAdjustmentType::PbTemperature;
        sa.update(&mut ride, 1.0, 0.0);
        assert!(approx_eq(sa.interpolated, config.tiltback_hv_speed * config.dt()));
        assert!(approx_eq(sa.target, config.tiltback_lv_angle));
    }

    #[test]
    fn test_reverse_stop_follows_its_setpoint() {
        let config = BalanceConfig::default();
        let mut sa = adjustment(&config);
        let mut ride = RideState::new();
        ride.sat = SetpointAdjustmentType::ReverseStop;

        sa.update(&mut ride, -1.0, 0.05);
        assert!(approx_eq(sa.interpolated, 0.05));
    }

    #[test]
    fn test_wheelslip_holds_target_at_zero() {
        let config = BalanceConfig::default();
        let mut sa = adjustment(&config);
        let mut ride = RideState::new();
        ride.sat = SetpointAdjustmentType::PbDuty;
        ride.wheelslip = true;
        sa.update(&mut ride, 1.0, 0.0);
        assert_eq!(sa.target, 0.0);
        assert_eq!(sa.interpolated, 0.0);
    }

    #[test]
    fn test_noseangling_variable_and_constant() {
        let mut config = BalanceConfig::default();
        config.tiltback_variable = 1.0;
        config.tiltback_variable_max = 2.0;
        config.tiltback_variable_erpm = 1000.0;
        config.tiltback_constant = 1.0;
        config.tiltback_constant_erpm = 500.0;
        config.noseangling_speed = 10_000.0;
        let mut na = Noseangling::new();
        na.configure(&config);

        // 1000erpm超過分 × 0.001°/erpm + 定数1°
        assert!(approx_eq(na.update(2500.0, 1.0), 1.5 + 1.0));
        // variable_max で頭打ち
        assert!(approx_eq(na.update(9000.0, 1.0), 2.0 + 1.0));
        assert!(approx_eq(na.update(9000.0, -1.0), -3.0));
    }

    #[test]
    fn test_noseangling_disabled_by_default() {
        let config = BalanceConfig::default();
        let mut na = Noseangling::new();
        na.configure(&config);
        assert_eq!(na.update(8000.0, 1.0), 0.0);
    }

    #[test]
    fn test_noseangling_rate_limited() {
        let mut config = BalanceConfig::default();
        config.tiltback_constant = 2.0;
        let mut na = Noseangling::new();
        na.configure(&config);
        let value = na.update(3000.0, 1.0);
        assert!(approx_eq(value, config.noseangling_speed * config.dt()));
    }
}
