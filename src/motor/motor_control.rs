//! モーター出力の決定
//!
//! 走行中は要求電流をそのまま出し、それ以外はブレーキ電流・
//! パーキングブレーキ（duty 0）・解放のいずれかを選択します。
//! 実際の出力はホストが実装する`MotorDriver`を通して行います。

use embassy_time::{Duration, Instant};

use super::motor_data::MotorData;
use crate::config::{BalanceConfig, ParkingBrakeMode};
use crate::state::RunState;

/// ブレーキ保持を続けるための速度しきい値 [erpm]
pub const ERPM_MOVING_THRESHOLD: f32 = 1000.0;

/// 停止判定後にブレーキを保持する時間
const BRAKE_TIMEOUT: Duration = Duration::from_secs(1);

/// パーキングブレーキを使う最大速度 [erpm]
const PARKING_BRAKE_MAX_ERPM: f32 = 2000.0;

/// アイドル時にパーキングブレーキを有効にする速度 [erpm]
const PARKING_BRAKE_IDLE_ERPM: f32 = 50.0;

/// ホスト側のモーター出力プリミティブ
pub trait MotorDriver {
    /// 電流指令 [A]（正 = 前進トルク）
    fn set_current(&mut self, current: f32);

    /// ブレーキ電流指令 [A]
    fn set_brake_current(&mut self, current: f32);

    /// Duty指令（-1.0～1.0）
    fn set_duty(&mut self, duty: f32);
}

/// 1ティックで発行した出力指令
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MotorCommand {
    Current(f32),
    BrakeCurrent(f32),
    Duty(f32),
    /// 電流0（フリー）
    Release,
}

impl MotorCommand {
    fn issue<D: MotorDriver>(self, driver: &mut D) -> Self {
        match self {
            MotorCommand::Current(current) => driver.set_current(current),
            MotorCommand::BrakeCurrent(current) => driver.set_brake_current(current),
            MotorCommand::Duty(duty) => driver.set_duty(duty),
            MotorCommand::Release => driver.set_current(0.0),
        }
        self
    }
}

#[derive(Debug, Clone)]
pub struct MotorControl {
    requested_current: Option<f32>,
    brake_current: f32,
    parking_brake_mode: ParkingBrakeMode,
    parking_brake_active: bool,
    /// この時刻を過ぎたらブレーキを解放（Noneは解放済み）
    brake_timeout: Option<Instant>,
}

impl MotorControl {
    pub fn new() -> Self {
        Self {
            requested_current: None,
            brake_current: 0.0,
            parking_brake_mode: ParkingBrakeMode::Idle,
            parking_brake_active: false,
            brake_timeout: None,
        }
    }

    pub fn configure(&mut self, config: &BalanceConfig) {
        self.brake_current = config.brake_current;
        self.parking_brake_mode = config.parking_brake_mode;
    }

    /// 走行中の電流を要求（次の`apply`で出力）
    pub fn request_current(&mut self, current: f32) {
        self.requested_current = Some(current);
    }

    /// 1ティック分の出力を決定してドライバーに発行
    ///
    /// # 引数
    /// * `driver` - 出力先
    /// * `motor` - 今ティックのモーター状態
    /// * `run_state` - ホストの実行状態
    /// * `now` - 現在時刻
    ///
    /// # 戻り値
    /// 発行した指令
    pub fn apply<D: MotorDriver>(
        &mut self,
        driver: &mut D,
        motor: &MotorData,
        run_state: RunState,
        now: Instant,
    ) -> MotorCommand {
        self.update_parking_brake(motor, run_state);

        if let Some(current) = self.requested_current.take() {
            return MotorCommand::Current(current).issue(driver);
        }

        if motor.abs_erpm_smooth > ERPM_MOVING_THRESHOLD {
            self.brake_timeout = Some(now + BRAKE_TIMEOUT);
        }

        let command = match self.brake_timeout {
            Some(timeout) if now <= timeout => {
                if self.parking_brake_active && motor.abs_erpm_smooth < PARKING_BRAKE_MAX_ERPM {
                    MotorCommand::Duty(0.0)
                } else {
                    MotorCommand::BrakeCurrent(self.brake_current)
                }
            }
            _ => MotorCommand::Release,
        };
        command.issue(driver)
    }

    /// エンゲージ時にブレーキ保持を開始
    pub fn hold_brake(&mut self, now: Instant) {
        self.brake_timeout = Some(now + BRAKE_TIMEOUT);
    }

    fn update_parking_brake(&mut self, motor: &MotorData, run_state: RunState) {
        self.parking_brake_active = match self.parking_brake_mode {
            ParkingBrakeMode::Always => true,
            ParkingBrakeMode::Never => false,
            ParkingBrakeMode::Idle => {
                if run_state == RunState::Running {
                    false
                } else if motor.abs_erpm_smooth < PARKING_BRAKE_IDLE_ERPM
                    || motor.last_erpm_sign != motor.erpm_sign
                {
                    true
                } else {
                    self.parking_brake_active
                }
            }
        };
    }
}

impl Default for MotorControl {
    fn default() -> Self {
        Self::new()
    }
}
