// Motor state aggregation
//
// Derives speed, direction, braking, filtered current and an acceleration
// estimate from one telemetry sample per tick.

use crate::config::BalanceConfig;
use crate::filters::{Biquad, BiquadType, Sma};
use crate::math::{sign, EPSILON, LOOP_HERTZ_COMPAT};
use libm::fabsf;

/// Below this speed the erpm sign is considered noise [erpm]
const DIRECTION_DEADZONE_ERPM: f32 = 250.0;

/// Cutoff of the acceleration moving average [Hz]
const ACCEL_CUTOFF: f32 = 8.0;

/// Ring capacity of the acceleration average (window ≈ 0.443·f/8)
///
/// 10 kHz, the highest accepted loop rate, needs 553 slots. The rest is
/// headroom for a measured frequency above nominal.
const ACCEL_WINDOW_CAPACITY: usize = 600;

/// Raw motor telemetry handed over by the host every tick
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotorSample {
    /// Electrical RPM, signed
    pub erpm: f32,
    /// Motor current, positive = forward torque [A]
    pub current: f32,
    /// Duty cycle (-1.0..1.0)
    pub duty_cycle: f32,
    /// Battery current, negative while regenerating [A]
    pub battery_current: f32,
    /// [V]
    pub battery_voltage: f32,
    /// [°C]
    pub mosfet_temp: f32,
    /// [°C]
    pub motor_temp: f32,
    /// Signed travelled distance from the tachometer [m]
    pub distance: f32,
}

#[derive(Debug, Clone)]
pub struct MotorData {
    pub erpm: f32,
    pub abs_erpm: f32,
    pub abs_erpm_smooth: f32,
    /// +1 / -1 (zero counts as forward)
    pub erpm_sign: f32,
    pub last_erpm_sign: f32,
    last_erpm: f32,

    /// Raw motor current [A]
    pub current: f32,
    /// Low-passed current used by torque-based features [A]
    pub filtered_current: f32,
    /// Current opposes the direction of travel
    pub braking: bool,
    /// Direction of travel with a dead-zone around standstill
    pub forward: bool,
    /// Smoothed |duty cycle|
    pub duty_cycle: f32,
    /// |duty cycle| of the last sample
    pub duty_raw: f32,
    /// erpm change per 832Hz reference tick, averaged
    pub acceleration: f32,

    pub battery_current: f32,
    pub battery_voltage: f32,
    pub mosfet_temp: f32,
    pub motor_temp: f32,
    pub distance: f32,

    /// Min/max seen since the last reset [A]
    pub current_min_seen: f32,
    pub current_max_seen: f32,
    pub battery_current_min_seen: f32,
    pub battery_current_max_seen: f32,

    /// Motor current limit, accelerating [A]
    pub current_max: f32,
    /// Motor current limit, braking (magnitude) [A]
    pub current_min: f32,
    battery_current_max: f32,
    battery_current_min: f32,

    current_filter: Biquad,
    current_filter_enabled: bool,
    accel_average: Sma<ACCEL_WINDOW_CAPACITY>,
}

impl MotorData {
    pub fn new() -> Self {
        Self {
            erpm: 0.0,
            abs_erpm: 0.0,
            abs_erpm_smooth: 0.0,
            erpm_sign: 1.0,
            last_erpm_sign: 1.0,
            last_erpm: 0.0,
            current: 0.0,
            filtered_current: 0.0,
            braking: false,
            forward: true,
            duty_cycle: 0.0,
            duty_raw: 0.0,
            acceleration: 0.0,
            battery_current: 0.0,
            battery_voltage: 0.0,
            mosfet_temp: 0.0,
            motor_temp: 0.0,
            distance: 0.0,
            current_min_seen: 0.0,
            current_max_seen: 0.0,
            battery_current_min_seen: 0.0,
            battery_current_max_seen: 0.0,
            current_max: EPSILON,
            current_min: EPSILON,
            battery_current_max: EPSILON,
            battery_current_min: EPSILON,
            current_filter: Biquad::new(),
            current_filter_enabled: false,
            accel_average: Sma::new(),
        }
    }

    /// Apply limits and recompute the frequency dependent filters
    ///
    /// # Arguments
    /// * `config` - Sanitized configuration
    /// * `frequency` - Actual loop frequency [Hz]
    pub fn configure(&mut self, config: &BalanceConfig, frequency: f32) {
        self.current_max = config.current_max.max(EPSILON);
        self.current_min = config.current_min.max(EPSILON);
        self.battery_current_max = config.battery_current_max.max(EPSILON);
        self.battery_current_min = config.battery_current_min.max(EPSILON);

        if config.atr_filter > 0.0 {
            self.current_filter
                .configure(BiquadType::LowPass, config.atr_filter, frequency);
            self.current_filter_enabled = true;
        } else {
            self.current_filter_enabled = false;
        }

        self.accel_average.configure(ACCEL_CUTOFF, frequency);
    }

    /// Clear filter history (on engage)
    pub fn reset(&mut self) {
        self.abs_erpm_smooth = 0.0;
        self.acceleration = 0.0;
        self.accel_average.reset();
        self.current_filter.reset(0.0);
        self.current_min_seen = 0.0;
        self.current_max_seen = 0.0;
        self.battery_current_min_seen = 0.0;
        self.battery_current_max_seen = 0.0;
    }

    /// Ingest one telemetry sample
    ///
    /// # Arguments
    /// * `sample` - Raw telemetry
    /// * `dt` - Time since the previous sample [s]
    pub fn update(&mut self, sample: &MotorSample, dt: f32) {
        self.last_erpm_sign = self.erpm_sign;

        // 壊れたサンプルは前回値を保持
        if sample.erpm.is_finite() {
            self.erpm = sample.erpm;
        }
        self.abs_erpm = fabsf(self.erpm);
        self.abs_erpm_smooth = self.abs_erpm_smooth * 0.9 + self.abs_erpm * 0.1;
        self.erpm_sign = sign(self.erpm);

        if sample.current.is_finite() {
            self.current = sample.current;
        }
        self.braking =
            self.abs_erpm > DIRECTION_DEADZONE_ERPM && self.current * self.erpm_sign < 0.0;
        self.forward = if self.abs_erpm > DIRECTION_DEADZONE_ERPM {
            self.erpm > 0.0
        } else {
            self.current > 0.0
        };

        if sample.duty_cycle.is_finite() {
            self.duty_raw = fabsf(sample.duty_cycle);
            self.duty_cycle = self.duty_cycle * 0.9 + self.duty_raw * 0.1;
        }

        // erpm差分を832Hz基準のティックあたりに正規化
        let ticks = if dt > 0.0 { dt * LOOP_HERTZ_COMPAT } else { 1.0 };
        let erpm_change = (self.erpm - self.last_erpm) / ticks;
        self.last_erpm = self.erpm;
        self.acceleration = self.accel_average.update(erpm_change);

        self.filtered_current = if self.current_filter_enabled {
            self.current_filter.update(self.current)
        } else {
            self.current
        };

        self.battery_current = sample.battery_current;
        self.battery_voltage = sample.battery_voltage;
        self.mosfet_temp = sample.mosfet_temp;
        self.motor_temp = sample.motor_temp;
        self.distance = sample.distance;

        self.current_min_seen = self.current_min_seen.min(self.current);
        self.current_max_seen = self.current_max_seen.max(self.current);
        self.battery_current_min_seen = self.battery_current_min_seen.min(self.battery_current);
        self.battery_current_max_seen = self.battery_current_max_seen.max(self.battery_current);
    }

    /// How close the controller runs to its hard current limits
    ///
    /// # Returns
    /// max(motor current / motor limit, battery current / battery limit),
    /// each in the direction currently in use. 1.0 = at the limit.
    pub fn get_current_saturation(&self) -> f32 {
        let motor_limit = if self.braking {
            self.current_min
        } else {
            self.current_max
        };
        let motor = fabsf(self.filtered_current) / motor_limit;

        let battery_limit = if self.battery_current < 0.0 {
            self.battery_current_min
        } else {
            self.battery_current_max
        };
        let battery = fabsf(self.battery_current) / battery_limit;

        motor.max(battery)
    }
}

impl Default for MotorData {
    fn default() -> Self {
        Self::new()
    }
}
