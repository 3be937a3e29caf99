// Turn tilt
//
// Leans into sustained turns. Yaw rate is aggregated into a running turn
// angle so that wiggles on rough ground do not count as turning.

use super::{SETPOINT_DECAY, TARGET_DECAY};
use crate::config::BalanceConfig;
use crate::filters::{Ema, ShaperTuning, SmoothSetpoint, TrajectoryShaper};
use crate::math::{sign, LOOP_HERTZ_COMPAT_RECIP};
use crate::motor::MotorData;
use libm::fabsf;

/// Yaw rate smoothing cutoff [Hz]
const YAW_CHANGE_CUTOFF: f32 = 25.0;

/// Yaw rate clamp against low speed overreaction [deg/s]
const YAW_RATE_LIMIT: f32 = 72.0;

/// Yaw rate below which turning is ignored [deg/s]
const MIN_YAW_RATE: f32 = 30.0;

#[derive(Debug, Clone)]
pub struct TurnTilt<S: TrajectoryShaper = SmoothSetpoint> {
    last_yaw: f32,
    /// Smoothed yaw rate [deg/s]
    yaw_change: Ema,
    /// Accumulated turn angle in the current direction [deg]
    pub yaw_aggregate: f32,
    boost_per_erpm: f32,
    target: f32,
    shaper: S,
}

impl<S: TrajectoryShaper + Default> TurnTilt<S> {
    pub fn new() -> Self {
        Self {
            last_yaw: 0.0,
            yaw_change: Ema::new(),
            yaw_aggregate: 0.0,
            boost_per_erpm: 0.0,
            target: 0.0,
            shaper: S::default(),
        }
    }
}

impl<S: TrajectoryShaper + Default> Default for TurnTilt<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: TrajectoryShaper> TurnTilt<S> {
    pub fn configure(&mut self, config: &BalanceConfig, frequency: f32) {
        self.yaw_change.configure(YAW_CHANGE_CUTOFF, frequency);
        self.boost_per_erpm = config.turntilt_erpm_boost / 100.0 / config.turntilt_erpm_boost_end;

        let tuning = ShaperTuning::from_strengths(
            config.turntilt_filter_strength,
            config.turntilt_on_ease_in,
            config.turntilt_off_ease_in,
            (
                config.turntilt_speed,
                config.turntilt_speed,
                config.turntilt_speed,
                config.turntilt_speed,
            ),
        );
        self.shaper.configure(&tuning, frequency);
    }

    /// 最後のヨー角は保持したままリセット
    pub fn reset(&mut self) {
        self.yaw_change.reset(0.0);
        self.yaw_aggregate = 0.0;
        self.target = 0.0;
        self.shaper.reset(0.0);
    }

    /// Track yaw every tick, running or not
    ///
    /// # Arguments
    /// * `yaw` - Telemetry yaw [deg]
    /// * `dt` - Tick length [s]
    pub fn aggregate(&mut self, yaw: f32, dt: f32) {
        if !yaw.is_finite() {
            return;
        }
        let mut change = yaw - self.last_yaw;
        if change < -180.0 {
            change += 360.0;
        } else if change > 180.0 {
            change -= 360.0;
        }
        self.last_yaw = yaw;

        let rate = if dt > 0.0 { change / dt } else { 0.0 };
        let yaw_change = self
            .yaw_change
            .update(rate.clamp(-YAW_RATE_LIMIT, YAW_RATE_LIMIT));

        // 旋回方向が変わったら積算をクリア
        if sign(yaw_change) != sign(self.yaw_aggregate) {
            self.yaw_aggregate = 0.0;
        }

        if fabsf(yaw_change) > MIN_YAW_RATE {
            self.yaw_aggregate += change;
        }
    }

    pub fn update(&mut self, motor: &MotorData, config: &BalanceConfig, wheelslip: bool, dt: f32) {
        if wheelslip {
            self.target *= TARGET_DECAY;
        } else {
            self.calculate_target(motor, config);
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

    /// Smoothed yaw rate [deg/s]
    pub fn yaw_rate(&self) -> f32 {
        self.yaw_change.value
    }

    fn calculate_target(&mut self, motor: &MotorData, config: &BalanceConfig) {
        if config.turntilt_strength == 0.0 {
            return;
        }

        let abs_yaw_change = fabsf(self.yaw_change.value);
        let abs_yaw_aggregate = fabsf(self.yaw_aggregate);

        if abs_yaw_aggregate < config.turntilt_start_angle || abs_yaw_change < MIN_YAW_RATE {
            self.target = 0.0;
            return;
        }

        let mut target = abs_yaw_change * LOOP_HERTZ_COMPAT_RECIP * config.turntilt_strength;

        let speed_boost = if motor.abs_erpm < config.turntilt_erpm_boost_end {
            1.0 + motor.abs_erpm * self.boost_per_erpm
        } else {
            1.0 + config.turntilt_erpm_boost / 100.0
        };
        target *= speed_boost;

        // 積算旋回角で最大2倍まで強める
        let aggregate_damper = if motor.abs_erpm < 2000.0 { 0.5 } else { 1.0 };
        let aggregate_boost =
            (1.0 + aggregate_damper * abs_yaw_aggregate / config.turntilt_yaw_aggregate).min(2.0);
        target *= aggregate_boost;

        target = target.clamp(-config.turntilt_angle_limit, config.turntilt_angle_limit);

        self.target = if motor.abs_erpm < config.turntilt_start_erpm {
            0.0
        } else {
            target * motor.erpm_sign
        };
    }
}
