//! ホイールスリップ検出
//!
//! 進行方向への急加速を高デューティ・高速域で検出し、トラクション喪失として
//! `RideState`に反映します。検出後は0.2秒保持してから解除します。
//! ダークライド中はトラクションコントロール（出力電流0）も同時に有効にします。

use embassy_time::{Duration, Instant};

use crate::config::BalanceConfig;
use crate::math::sign;
use crate::motor::MotorData;
use crate::state::{Mode, RideState, SetpointAdjustmentType};
use libm::fabsf;

/// スリップとみなす加速度 [erpm/tick @832Hz]
const SLIP_ACCELERATION: f32 = 15.0;

/// トラクションが戻ったとみなす加速度 [erpm/tick @832Hz]
const RECOVERED_ACCELERATION: f32 = 10.0;

/// 検出に必要な平滑化デューティ
const SLIP_MIN_DUTY: f32 = 0.3;

/// 低速では加速度が大きく跳ねるため検出しない [erpm]
const SLIP_MIN_ERPM: f32 = 2000.0;

/// 解除までの保持時間
const HOLD_TIME: Duration = Duration::from_millis(200);

/// 生デューティがこれ以上なら解除しない
const RELEASE_MAX_DUTY: f32 = 0.85;

/// 最大デューティからのマージン
const MAX_DUTY_MARGIN: f32 = 0.05;

#[derive(Debug, Clone)]
pub struct WheelslipDetector {
    /// 最後にスリップ条件を満たした時刻
    timer: Instant,
    max_duty_with_margin: f32,
}

impl WheelslipDetector {
    pub fn new(now: Instant) -> Self {
        Self {
            timer: now,
            max_duty_with_margin: 1.0 - MAX_DUTY_MARGIN,
        }
    }

    pub fn configure(&mut self, config: &BalanceConfig) {
        self.max_duty_with_margin = config.max_duty - MAX_DUTY_MARGIN;
    }

    pub fn reset(&mut self, now: Instant) {
        self.timer = now;
    }

    /// 1ティック分の判定
    ///
    /// センタリングとリバースストップ中は判定しない。
    ///
    /// # 引数
    /// * `motor` - 今ティックのモーター状態
    /// * `ride` - `wheelslip`/`traction_control`を更新する
    /// * `now` - 現在時刻
    pub fn update(&mut self, motor: &MotorData, ride: &mut RideState, now: Instant) {
        if matches!(
            ride.sat,
            SetpointAdjustmentType::Centering | SetpointAdjustmentType::ReverseStop
        ) {
            return;
        }

        if self.slipping(motor, ride.mode) {
            if !ride.wheelslip {
                debug!("Wheelslip at {} erpm", motor.erpm);
            }
            ride.wheelslip = true;
            ride.sat = SetpointAdjustmentType::None;
            self.timer = now;
            if ride.darkride {
                ride.traction_control = true;
            }
        } else if ride.wheelslip {
            if fabsf(motor.acceleration) < RECOVERED_ACCELERATION {
                ride.traction_control = false;
            }

            // 最大デューティ付近では保持を延長
            if motor.duty_cycle > self.max_duty_with_margin {
                self.timer = now;
            } else if now.saturating_duration_since(self.timer) > HOLD_TIME
                && motor.duty_raw < RELEASE_MAX_DUTY
            {
                ride.traction_control = false;
                ride.wheelslip = false;
            }
        }
    }

    fn slipping(&self, motor: &MotorData, mode: Mode) -> bool {
        mode != Mode::Flywheel
            && fabsf(motor.acceleration) > SLIP_ACCELERATION
            && sign(motor.acceleration) == motor.erpm_sign
            && motor.duty_cycle > SLIP_MIN_DUTY
            && motor.abs_erpm > SLIP_MIN_ERPM
    }
}
