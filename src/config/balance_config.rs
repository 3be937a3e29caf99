//! バランス制御の設定構造体
//!
//! すべてのチューニング値をフラットな値オブジェクトとして保持します。
//! 制御ループ中に書き換えることはなく、ティック間で丸ごと差し替えます。

use super::params;
use crate::math::EPSILON;

/// Remote transport used for input tilt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RemoteType {
    None,
    Uart,
    Ppm,
}

/// When the motor is held with zero duty instead of brake current
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParkingBrakeMode {
    Always,
    /// Only while idle and (nearly) stationary
    Idle,
    Never,
}

/// 設定検証エラー
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// ループ周波数が範囲外（100～10000Hz）
    LoopFrequency,
    /// NaN/Infを含む
    NonFinite,
    /// 負の速度制限
    NegativeSpeed,
    /// リモートのデッドバンドが範囲外（0～1未満）
    Deadband,
    /// 負の角度制限
    AngleLimit,
    /// 電流制限が0以下
    CurrentLimit,
    /// 最大デューティ比が範囲外（0より大きく1以下）
    DutyLimit,
}

/// バランス制御設定
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BalanceConfig {
    // === ループ ===
    /// 公称ループ周波数 [Hz]
    pub hertz: u16,

    // === PID ===
    pub kp: f32,
    pub ki: f32,
    pub kp2: f32,
    pub kp_brake: f32,
    pub kp2_brake: f32,
    pub ki_limit: f32,

    // === 姿勢推定 ===
    pub mahony_kp: f32,
    pub mahony_kp_roll: f32,
    pub mahony_ki: f32,
    pub bf_accel_confidence_decay: f32,

    // === 起動・プッシュバック ===
    pub startup_speed: f32,
    pub tiltback_duty_angle: f32,
    pub tiltback_duty_speed: f32,
    pub tiltback_hv_angle: f32,
    pub tiltback_hv_speed: f32,
    pub tiltback_lv_angle: f32,
    pub tiltback_lv_speed: f32,
    pub tiltback_return_speed: f32,

    // === ノーズアングリング ===
    pub tiltback_constant: f32,
    pub tiltback_constant_erpm: f32,
    pub tiltback_variable: f32,
    pub tiltback_variable_max: f32,
    pub tiltback_variable_erpm: f32,
    pub noseangling_speed: f32,

    // === リモート ===
    pub inputtilt_remote_type: RemoteType,
    pub inputtilt_speed: f32,
    pub inputtilt_angle_limit: f32,
    pub inputtilt_invert_throttle: bool,
    pub inputtilt_deadband: f32,
    pub inputtilt_filter_strength: f32,
    pub inputtilt_on_ease_in: f32,
    pub inputtilt_off_ease_in: f32,

    // === ブレーキ ===
    pub brake_current: f32,
    pub parking_brake_mode: ParkingBrakeMode,

    // === ブースター ===
    pub booster_angle: f32,
    pub booster_ramp: f32,
    pub booster_current: f32,
    pub brkbooster_angle: f32,
    pub brkbooster_ramp: f32,
    pub brkbooster_current: f32,

    // === トルクチルト ===
    pub torquetilt_start_current: f32,
    pub torquetilt_angle_limit: f32,
    pub torquetilt_on_speed: f32,
    pub torquetilt_off_speed: f32,
    pub torquetilt_strength: f32,
    pub torquetilt_strength_regen: f32,
    pub torquetilt_filter_strength: f32,
    pub torquetilt_on_ease_in: f32,
    pub torquetilt_off_ease_in: f32,

    // === ATR ===
    pub atr_strength_up: f32,
    pub atr_strength_down: f32,
    pub atr_threshold_up: f32,
    pub atr_threshold_down: f32,
    pub atr_speed_boost: f32,
    pub atr_angle_limit: f32,
    pub atr_on_speed: f32,
    pub atr_off_speed: f32,
    pub atr_transition_boost: f32,
    /// 電流ローパスのカットオフ [Hz]
    pub atr_filter: f32,
    pub atr_amps_accel_ratio: f32,
    pub atr_amps_decel_ratio: f32,
    pub atr_filter_strength: f32,
    pub atr_on_ease_in: f32,
    pub atr_off_ease_in: f32,

    // === ブレーキチルト ===
    pub braketilt_strength: f32,
    pub braketilt_lingering: f32,

    // === ターンチルト ===
    pub turntilt_strength: f32,
    pub turntilt_angle_limit: f32,
    pub turntilt_start_angle: f32,
    pub turntilt_start_erpm: f32,
    pub turntilt_speed: f32,
    pub turntilt_erpm_boost: f32,
    pub turntilt_erpm_boost_end: f32,
    pub turntilt_yaw_aggregate: f32,
    pub turntilt_filter_strength: f32,
    pub turntilt_on_ease_in: f32,
    pub turntilt_off_ease_in: f32,

    // === リバースストップ ===
    pub fault_reversestop_enabled: bool,

    // === モーター電流制限 ===
    pub current_max: f32,
    /// ブレーキ方向（絶対値）
    pub current_min: f32,
    pub battery_current_max: f32,
    /// 回生方向（絶対値）
    pub battery_current_min: f32,
    /// 最大デューティ比（ホイールスリップの解除判定に使用）
    pub max_duty: f32,
}

impl BalanceConfig {
    /// デフォルト設定を生成（params.rsの値を使用）
    pub const fn new() -> Self {
        use params::*;
        Self {
            hertz: DEFAULT_HERTZ,

            kp: pid::DEFAULT_KP,
            ki: pid::DEFAULT_KI,
            kp2: pid::DEFAULT_KP2,
            kp_brake: pid::DEFAULT_KP_BRAKE,
            kp2_brake: pid::DEFAULT_KP2_BRAKE,
            ki_limit: pid::DEFAULT_KI_LIMIT,

            mahony_kp: balance_filter::DEFAULT_MAHONY_KP,
            mahony_kp_roll: balance_filter::DEFAULT_MAHONY_KP_ROLL,
            mahony_ki: balance_filter::DEFAULT_MAHONY_KI,
            bf_accel_confidence_decay: balance_filter::DEFAULT_ACCEL_CONFIDENCE_DECAY,

            startup_speed: tiltback::DEFAULT_STARTUP_SPEED,
            tiltback_duty_angle: tiltback::DEFAULT_DUTY_ANGLE,
            tiltback_duty_speed: tiltback::DEFAULT_DUTY_SPEED,
            tiltback_hv_angle: tiltback::DEFAULT_HV_ANGLE,
            tiltback_hv_speed: tiltback::DEFAULT_HV_SPEED,
            tiltback_lv_angle: tiltback::DEFAULT_LV_ANGLE,
            tiltback_lv_speed: tiltback::DEFAULT_LV_SPEED,
            tiltback_return_speed: tiltback::DEFAULT_RETURN_SPEED,

            tiltback_constant: noseangling::DEFAULT_CONSTANT,
            tiltback_constant_erpm: noseangling::DEFAULT_CONSTANT_ERPM,
            tiltback_variable: noseangling::DEFAULT_VARIABLE,
            tiltback_variable_max: noseangling::DEFAULT_VARIABLE_MAX,
            tiltback_variable_erpm: noseangling::DEFAULT_VARIABLE_ERPM,
            noseangling_speed: noseangling::DEFAULT_SPEED,

            inputtilt_remote_type: RemoteType::None,
            inputtilt_speed: remote::DEFAULT_SPEED,
            inputtilt_angle_limit: remote::DEFAULT_ANGLE_LIMIT,
            inputtilt_invert_throttle: false,
            inputtilt_deadband: remote::DEFAULT_DEADBAND,
            inputtilt_filter_strength: remote::DEFAULT_FILTER_STRENGTH,
            inputtilt_on_ease_in: remote::DEFAULT_ON_EASE_IN,
            inputtilt_off_ease_in: remote::DEFAULT_OFF_EASE_IN,

            brake_current: brake::DEFAULT_BRAKE_CURRENT,
            parking_brake_mode: ParkingBrakeMode::Idle,

            booster_angle: booster::DEFAULT_ANGLE,
            booster_ramp: booster::DEFAULT_RAMP,
            booster_current: booster::DEFAULT_CURRENT,
            brkbooster_angle: booster::DEFAULT_BRAKE_ANGLE,
            brkbooster_ramp: booster::DEFAULT_BRAKE_RAMP,
            brkbooster_current: booster::DEFAULT_BRAKE_CURRENT,

            torquetilt_start_current: torque_tilt::DEFAULT_START_CURRENT,
            torquetilt_angle_limit: torque_tilt::DEFAULT_ANGLE_LIMIT,
            torquetilt_on_speed: torque_tilt::DEFAULT_ON_SPEED,
            torquetilt_off_speed: torque_tilt::DEFAULT_OFF_SPEED,
            torquetilt_strength: torque_tilt::DEFAULT_STRENGTH,
            torquetilt_strength_regen: torque_tilt::DEFAULT_STRENGTH_REGEN,
            torquetilt_filter_strength: torque_tilt::DEFAULT_FILTER_STRENGTH,
            torquetilt_on_ease_in: torque_tilt::DEFAULT_ON_EASE_IN,
            torquetilt_off_ease_in: torque_tilt::DEFAULT_OFF_EASE_IN,

            atr_strength_up: atr::DEFAULT_STRENGTH_UP,
            atr_strength_down: atr::DEFAULT_STRENGTH_DOWN,
            atr_threshold_up: atr::DEFAULT_THRESHOLD_UP,
            atr_threshold_down: atr::DEFAULT_THRESHOLD_DOWN,
            atr_speed_boost: atr::DEFAULT_SPEED_BOOST,
            atr_angle_limit: atr::DEFAULT_ANGLE_LIMIT,
            atr_on_speed: atr::DEFAULT_ON_SPEED,
            atr_off_speed: atr::DEFAULT_OFF_SPEED,
            atr_transition_boost: atr::DEFAULT_TRANSITION_BOOST,
            atr_filter: atr::DEFAULT_CURRENT_FILTER,
            atr_amps_accel_ratio: atr::DEFAULT_AMPS_ACCEL_RATIO,
            atr_amps_decel_ratio: atr::DEFAULT_AMPS_DECEL_RATIO,
            atr_filter_strength: atr::DEFAULT_FILTER_STRENGTH,
            atr_on_ease_in: atr::DEFAULT_ON_EASE_IN,
            atr_off_ease_in: atr::DEFAULT_OFF_EASE_IN,

            braketilt_strength: brake_tilt::DEFAULT_STRENGTH,
            braketilt_lingering: brake_tilt::DEFAULT_LINGERING,

            turntilt_strength: turn_tilt::DEFAULT_STRENGTH,
            turntilt_angle_limit: turn_tilt::DEFAULT_ANGLE_LIMIT,
            turntilt_start_angle: turn_tilt::DEFAULT_START_ANGLE,
            turntilt_start_erpm: turn_tilt::DEFAULT_START_ERPM,
            turntilt_speed: turn_tilt::DEFAULT_SPEED,
            turntilt_erpm_boost: turn_tilt::DEFAULT_ERPM_BOOST,
            turntilt_erpm_boost_end: turn_tilt::DEFAULT_ERPM_BOOST_END,
            turntilt_yaw_aggregate: turn_tilt::DEFAULT_YAW_AGGREGATE,
            turntilt_filter_strength: turn_tilt::DEFAULT_FILTER_STRENGTH,
            turntilt_on_ease_in: turn_tilt::DEFAULT_ON_EASE_IN,
            turntilt_off_ease_in: turn_tilt::DEFAULT_OFF_EASE_IN,

            fault_reversestop_enabled: false,

            current_max: limits::DEFAULT_CURRENT_MAX,
            current_min: limits::DEFAULT_CURRENT_MIN,
            battery_current_max: limits::DEFAULT_BATTERY_CURRENT_MAX,
            battery_current_min: limits::DEFAULT_BATTERY_CURRENT_MIN,
            max_duty: limits::DEFAULT_MAX_DUTY,
        }
    }

    /// Float tunables in declaration order
    fn floats(&self) -> [f32; 79] {
        [
            self.kp,
            self.ki,
            self.kp2,
            self.kp_brake,
            self.kp2_brake,
            self.ki_limit,
            self.mahony_kp,
            self.mahony_kp_roll,
            self.mahony_ki,
            self.bf_accel_confidence_decay,
            self.startup_speed,
            self.tiltback_duty_angle,
            self.tiltback_duty_speed,
            self.tiltback_hv_angle,
            self.tiltback_hv_speed,
            self.tiltback_lv_angle,
            self.tiltback_lv_speed,
            self.tiltback_return_speed,
            self.tiltback_constant,
            self.tiltback_constant_erpm,
            self.tiltback_variable,
            self.tiltback_variable_max,
            self.tiltback_variable_erpm,
            self.noseangling_speed,
            self.inputtilt_speed,
            self.inputtilt_angle_limit,
            self.inputtilt_deadband,
            self.inputtilt_filter_strength,
            self.inputtilt_on_ease_in,
            self.inputtilt_off_ease_in,
            self.brake_current,
            self.booster_angle,
            self.booster_ramp,
            self.booster_current,
            self.brkbooster_angle,
            self.brkbooster_ramp,
            self.brkbooster_current,
            self.torquetilt_start_current,
            self.torquetilt_angle_limit,
            self.torquetilt_on_speed,
            self.torquetilt_off_speed,
            self.torquetilt_strength,
            self.torquetilt_strength_regen,
            self.torquetilt_filter_strength,
            self.torquetilt_on_ease_in,
            self.torquetilt_off_ease_in,
            self.atr_strength_up,
            self.atr_strength_down,
            self.atr_threshold_up,
            self.atr_threshold_down,
            self.atr_speed_boost,
            self.atr_angle_limit,
            self.atr_on_speed,
            self.atr_off_speed,
            self.atr_transition_boost,
            self.atr_filter,
            self.atr_amps_accel_ratio,
            self.atr_amps_decel_ratio,
            self.atr_filter_strength,
            self.atr_on_ease_in,
            self.atr_off_ease_in,
            self.braketilt_strength,
            self.braketilt_lingering,
            self.turntilt_strength,
            self.turntilt_angle_limit,
            self.turntilt_start_angle,
            self.turntilt_start_erpm,
            self.turntilt_speed,
            self.turntilt_erpm_boost,
            self.turntilt_erpm_boost_end,
            self.turntilt_yaw_aggregate,
            self.turntilt_filter_strength,
            self.turntilt_on_ease_in,
            self.turntilt_off_ease_in,
            self.current_max,
            self.current_min,
            self.battery_current_max,
            self.battery_current_min,
            self.max_duty,
        ]
    }

    /// 設定値を検証
    ///
    /// # Returns
    /// * `Ok(())` - 適用可能
    /// * `Err(ConfigError)` - 最初に見つかった問題
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(100..=10_000).contains(&self.hertz) {
            return Err(ConfigError::LoopFrequency);
        }
        if self.floats().iter().any(|x| !x.is_finite()) {
            return Err(ConfigError::NonFinite);
        }

        let speeds = [
            self.startup_speed,
            self.tiltback_duty_speed,
            self.tiltback_hv_speed,
            self.tiltback_lv_speed,
            self.tiltback_return_speed,
            self.noseangling_speed,
            self.inputtilt_speed,
            self.torquetilt_on_speed,
            self.torquetilt_off_speed,
            self.atr_on_speed,
            self.atr_off_speed,
            self.turntilt_speed,
        ];
        if speeds.iter().any(|s| *s < 0.0) {
            return Err(ConfigError::NegativeSpeed);
        }

        if !(0.0..1.0).contains(&self.inputtilt_deadband) {
            return Err(ConfigError::Deadband);
        }

        let angle_limits = [
            self.inputtilt_angle_limit,
            self.torquetilt_angle_limit,
            self.atr_angle_limit,
            self.turntilt_angle_limit,
        ];
        if angle_limits.iter().any(|a| *a < 0.0) {
            return Err(ConfigError::AngleLimit);
        }

        let current_limits = [
            self.current_max,
            self.current_min,
            self.battery_current_max,
            self.battery_current_min,
        ];
        if current_limits.iter().any(|c| *c <= 0.0) {
            return Err(ConfigError::CurrentLimit);
        }

        if self.max_duty <= 0.0 || self.max_duty > 1.0 {
            return Err(ConfigError::DutyLimit);
        }

        Ok(())
    }

    /// Copy with every denominator clamped away from zero
    pub fn sanitized(&self) -> Self {
        let mut c = *self;
        c.atr_amps_accel_ratio = c.atr_amps_accel_ratio.max(EPSILON);
        c.atr_amps_decel_ratio = c.atr_amps_decel_ratio.max(EPSILON);
        c.turntilt_erpm_boost_end = c.turntilt_erpm_boost_end.max(EPSILON);
        c.turntilt_yaw_aggregate = c.turntilt_yaw_aggregate.max(EPSILON);
        c.booster_ramp = c.booster_ramp.max(EPSILON);
        c.brkbooster_ramp = c.brkbooster_ramp.max(EPSILON);
        c.braketilt_lingering = c.braketilt_lingering.max(1.0);
        c.inputtilt_deadband = c.inputtilt_deadband.clamp(0.0, 0.99);
        c.current_max = c.current_max.max(EPSILON);
        c.current_min = c.current_min.max(EPSILON);
        c.battery_current_max = c.battery_current_max.max(EPSILON);
        c.battery_current_min = c.battery_current_min.max(EPSILON);
        c.hertz = c.hertz.max(1);
        c
    }

    /// Loop period at the nominal frequency [s]
    pub fn dt(&self) -> f32 {
        1.0 / self.hertz.max(1) as f32
    }
}

impl Default for BalanceConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = BalanceConfig::default();
        assert_eq!(config.hertz, 832);
        assert_eq!(config.kp, 20.0);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_rejects_loop_frequency() {
        let mut config = BalanceConfig::new();
        config.hertz = 50;
        assert_eq!(config.validate(), Err(ConfigError::LoopFrequency));
    }

    #[test]
    fn test_rejects_nan() {
        let mut config = BalanceConfig::new();
        config.atr_strength_up = f32::NAN;
        assert_eq!(config.validate(), Err(ConfigError::NonFinite));
    }

    #[test]
    fn test_rejects_negative_speed() {
        let mut config = BalanceConfig::new();
        config.atr_off_speed = -1.0;
        assert_eq!(config.validate(), Err(ConfigError::NegativeSpeed));
    }

    #[test]
    fn test_rejects_deadband() {
        let mut config = BalanceConfig::new();
        config.inputtilt_deadband = 1.0;
        assert_eq!(config.validate(), Err(ConfigError::Deadband));
    }

    #[test]
    fn test_rejects_zero_current_limit() {
        let mut config = BalanceConfig::new();
        config.current_min = 0.0;
        assert_eq!(config.validate(), Err(ConfigError::CurrentLimit));
    }

    #[test]
    fn test_rejects_max_duty_out_of_range() {
        let mut config = BalanceConfig::new();
        config.max_duty = 1.2;
        assert_eq!(config.validate(), Err(ConfigError::DutyLimit));
        config.max_duty = 0.0;
        assert_eq!(config.validate(), Err(ConfigError::DutyLimit));
    }

    #[test]
    fn test_sanitized_guards_denominators() {
        let mut config = BalanceConfig::new();
        config.atr_amps_accel_ratio = 0.0;
        config.turntilt_erpm_boost_end = 0.0;
        config.braketilt_lingering = 0.0;
        let c = config.sanitized();
        assert!(c.atr_amps_accel_ratio > 0.0);
        assert!(c.turntilt_erpm_boost_end > 0.0);
        assert_eq!(c.braketilt_lingering, 1.0);
    }
}
