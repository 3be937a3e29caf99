//! バランス制御のデフォルトパラメータ

/// 制御ループ周波数 [Hz]（デフォルト値）
pub const DEFAULT_HERTZ: u16 = 832;

/// PIDゲイン（デフォルト値）
pub mod pid {
    /// 比例ゲイン [A/deg]
    pub const DEFAULT_KP: f32 = 20.0;
    /// 積分ゲイン（832Hz換算）
    pub const DEFAULT_KI: f32 = 0.005;
    /// レート（ジャイロ）ゲイン [A/(deg/s)]
    pub const DEFAULT_KP2: f32 = 0.6;
    /// ブレーキ時の比例ゲイン倍率
    pub const DEFAULT_KP_BRAKE: f32 = 1.0;
    /// ブレーキ時のレートゲイン倍率
    pub const DEFAULT_KP2_BRAKE: f32 = 1.0;
    /// 積分項の上限 [A]（0で無制限）
    pub const DEFAULT_KI_LIMIT: f32 = 30.0;
}

/// 姿勢推定フィルタ（Mahony）
pub mod balance_filter {
    pub const DEFAULT_MAHONY_KP: f32 = 2.0;
    pub const DEFAULT_MAHONY_KP_ROLL: f32 = 1.5;
    /// 積分ゲイン（通常0）
    pub const DEFAULT_MAHONY_KI: f32 = 0.0;
    /// 加速度信頼度の減衰係数
    pub const DEFAULT_ACCEL_CONFIDENCE_DECAY: f32 = 0.02;
}

/// 起動・プッシュバック
pub mod tiltback {
    /// センタリング速度 [deg/s]
    pub const DEFAULT_STARTUP_SPEED: f32 = 30.0;
    pub const DEFAULT_DUTY_ANGLE: f32 = 5.0;
    pub const DEFAULT_DUTY_SPEED: f32 = 3.0;
    pub const DEFAULT_HV_ANGLE: f32 = 10.0;
    pub const DEFAULT_HV_SPEED: f32 = 3.0;
    pub const DEFAULT_LV_ANGLE: f32 = 10.0;
    pub const DEFAULT_LV_SPEED: f32 = 3.0;
    /// プッシュバック解除時の戻り速度 [deg/s]
    pub const DEFAULT_RETURN_SPEED: f32 = 5.0;
}

/// ノーズアングリング
pub mod noseangling {
    /// 一定傾斜角 [deg]
    pub const DEFAULT_CONSTANT: f32 = 0.0;
    pub const DEFAULT_CONSTANT_ERPM: f32 = 500.0;
    /// 可変傾斜 [deg/1000erpm]
    pub const DEFAULT_VARIABLE: f32 = 0.0;
    /// 可変傾斜の上限 [deg]
    pub const DEFAULT_VARIABLE_MAX: f32 = 0.0;
    pub const DEFAULT_VARIABLE_ERPM: f32 = 1000.0;
    /// 傾斜速度 [deg/s]
    pub const DEFAULT_SPEED: f32 = 5.0;
}

/// リモート入力による傾斜
pub mod remote {
    pub const DEFAULT_SPEED: f32 = 20.0;
    pub const DEFAULT_ANGLE_LIMIT: f32 = 8.0;
    pub const DEFAULT_DEADBAND: f32 = 0.035;
    pub const DEFAULT_FILTER_STRENGTH: f32 = 1.0;
    pub const DEFAULT_ON_EASE_IN: f32 = 1.0;
    pub const DEFAULT_OFF_EASE_IN: f32 = 1.0;
}

/// ブレーキ
pub mod brake {
    /// 停止時のブレーキ電流 [A]
    pub const DEFAULT_BRAKE_CURRENT: f32 = 20.0;
}

/// ブースター（大きな角度誤差での追加電流）
pub mod booster {
    pub const DEFAULT_ANGLE: f32 = 8.0;
    pub const DEFAULT_RAMP: f32 = 4.0;
    pub const DEFAULT_CURRENT: f32 = 0.0;
    pub const DEFAULT_BRAKE_ANGLE: f32 = 8.0;
    pub const DEFAULT_BRAKE_RAMP: f32 = 4.0;
    pub const DEFAULT_BRAKE_CURRENT: f32 = 0.0;
}

/// トルクチルト
pub mod torque_tilt {
    /// 開始電流 [A]
    pub const DEFAULT_START_CURRENT: f32 = 10.0;
    pub const DEFAULT_ANGLE_LIMIT: f32 = 4.0;
    pub const DEFAULT_ON_SPEED: f32 = 4.0;
    pub const DEFAULT_OFF_SPEED: f32 = 4.0;
    /// 強度 [deg/A]
    pub const DEFAULT_STRENGTH: f32 = 0.15;
    pub const DEFAULT_STRENGTH_REGEN: f32 = 0.15;
    pub const DEFAULT_FILTER_STRENGTH: f32 = 1.0;
    pub const DEFAULT_ON_EASE_IN: f32 = 0.5;
    pub const DEFAULT_OFF_EASE_IN: f32 = 0.5;
}

/// ATR（Adaptive Torque Response）
pub mod atr {
    pub const DEFAULT_STRENGTH_UP: f32 = 1.5;
    pub const DEFAULT_STRENGTH_DOWN: f32 = 1.5;
    pub const DEFAULT_THRESHOLD_UP: f32 = 1.5;
    pub const DEFAULT_THRESHOLD_DOWN: f32 = 1.5;
    /// 速度ブースト（-1.0～1.0）
    pub const DEFAULT_SPEED_BOOST: f32 = 0.3;
    pub const DEFAULT_ANGLE_LIMIT: f32 = 10.0;
    pub const DEFAULT_ON_SPEED: f32 = 4.0;
    pub const DEFAULT_OFF_SPEED: f32 = 3.0;
    pub const DEFAULT_TRANSITION_BOOST: f32 = 2.5;
    /// 電流ローパスフィルタのカットオフ [Hz]（0で無効）
    pub const DEFAULT_CURRENT_FILTER: f32 = 5.0;
    /// 加速時の電流/加速度比 [A/(erpm/tick)]
    pub const DEFAULT_AMPS_ACCEL_RATIO: f32 = 15.0;
    /// 減速時の電流/加速度比
    pub const DEFAULT_AMPS_DECEL_RATIO: f32 = 17.0;
    pub const DEFAULT_FILTER_STRENGTH: f32 = 1.0;
    pub const DEFAULT_ON_EASE_IN: f32 = 0.5;
    pub const DEFAULT_OFF_EASE_IN: f32 = 0.5;
}

/// ブレーキチルト
pub mod brake_tilt {
    /// 強度（0で無効、最大20）
    pub const DEFAULT_STRENGTH: f32 = 0.0;
    /// 残留係数
    pub const DEFAULT_LINGERING: f32 = 2.0;
}

/// ターンチルト
pub mod turn_tilt {
    /// 強度（0で無効）
    pub const DEFAULT_STRENGTH: f32 = 0.0;
    pub const DEFAULT_ANGLE_LIMIT: f32 = 3.0;
    /// 開始ヨー累積角 [deg]
    pub const DEFAULT_START_ANGLE: f32 = 1.0;
    pub const DEFAULT_START_ERPM: f32 = 1000.0;
    pub const DEFAULT_SPEED: f32 = 5.0;
    /// 速度ブースト [%]
    pub const DEFAULT_ERPM_BOOST: f32 = 200.0;
    pub const DEFAULT_ERPM_BOOST_END: f32 = 5000.0;
    /// ヨー累積の基準角 [deg]
    pub const DEFAULT_YAW_AGGREGATE: f32 = 90.0;
    pub const DEFAULT_FILTER_STRENGTH: f32 = 1.0;
    pub const DEFAULT_ON_EASE_IN: f32 = 1.0;
    pub const DEFAULT_OFF_EASE_IN: f32 = 1.0;
}

/// モーター電流制限（ホストのモーター設定からのミラー）
pub mod limits {
    pub const DEFAULT_CURRENT_MAX: f32 = 80.0;
    /// ブレーキ方向の電流制限（絶対値）
    pub const DEFAULT_CURRENT_MIN: f32 = 80.0;
    pub const DEFAULT_BATTERY_CURRENT_MAX: f32 = 40.0;
    /// 回生方向のバッテリー電流制限（絶対値）
    pub const DEFAULT_BATTERY_CURRENT_MIN: f32 = 15.0;
    /// モーターコントローラ側の最大デューティ比
    pub const DEFAULT_MAX_DUTY: f32 = 0.95;
}
