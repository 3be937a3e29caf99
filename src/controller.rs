//! バランス制御ループ
//!
//! 姿勢推定・モーター状態・各チルト制御・PIDを1ティックごとに順番に
//! 実行し、モーター指令を1つ発行します。ホストは周期タイマーから
//! `tick()`を呼び、実行状態（`RideState`）を所有します。

use embassy_time::Instant;

use crate::config::{BalanceConfig, ConfigError, ConfigSignal};
use crate::frequency_tracker::FrequencyTracker;
use crate::math::sign;
use crate::motor::{
    MotorCommand, MotorControl, MotorData, MotorDriver, MotorSample, WheelslipDetector,
};
use crate::orientation::{BalanceFilter, Imu, ImuSample};
use crate::stabilizer::{Booster, Pid};
use crate::state::{RideState, SetpointAdjustmentType};
use crate::tilt::{
    Atr, BrakeTilt, Noseangling, Remote, RemoteSample, ReverseStop, SetpointAdjustment,
    TorqueTilt, TurnTilt,
};
use libm::fabsf;

/// ソフトスタートの電流上昇速度 [A/s]
const SOFTSTART_SPEED: f32 = 100.0;

/// バランス電流の平滑化係数（新しい値の重み）
const BALANCE_CURRENT_ALPHA: f32 = 0.2;

/// 1ティック分の入力
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickInput {
    /// 現在時刻
    pub now: Instant,
    /// 前回のティックからの経過時間 [s]
    pub dt: f32,
    pub imu: ImuSample,
    pub motor: MotorSample,
    pub remote: RemoteSample,
}

/// テレメトリのスナップショット
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Telemetry {
    // === 角度 [deg] ===
    pub pitch: f32,
    pub balance_pitch: f32,
    pub roll: f32,
    pub yaw: f32,
    /// [deg/s]
    pub pitch_rate: f32,

    // === セットポイント [deg] ===
    pub setpoint: f32,
    pub setpoint_target: f32,
    pub setpoint_target_interpolated: f32,
    pub noseangling: f32,
    pub remote_setpoint: f32,
    pub atr_setpoint: f32,
    pub brake_tilt_setpoint: f32,
    pub torque_tilt_setpoint: f32,
    pub turn_tilt_setpoint: f32,
    pub reverse_stop_setpoint: f32,

    // === 電流 [A] ===
    pub balance_current: f32,
    pub pid_p: f32,
    pub pid_i: f32,
    pub pid_rate_p: f32,
    pub booster_current: f32,

    // === ATR ===
    pub atr_accel_diff: f32,
    pub atr_speed_boost: f32,

    // === その他 ===
    pub current_saturation: f32,
    /// 実測ループ周波数 [Hz]
    pub frequency: f32,
    pub dt_ms: f32,
    pub recalculations: u32,
}

/// バランス制御コア
///
/// `D`はホスト側のモーター出力。構築時に注入し、毎ティック`apply`で1回だけ使う。
pub struct BalanceController<D: MotorDriver> {
    driver: D,
    config: BalanceConfig,

    balance_filter: BalanceFilter,
    imu: Imu,
    motor: MotorData,
    motor_control: MotorControl,
    wheelslip: WheelslipDetector,

    atr: Atr,
    torque_tilt: TorqueTilt,
    brake_tilt: BrakeTilt,
    turn_tilt: TurnTilt,
    remote: Remote,
    reverse_stop: ReverseStop,
    setpoint_adjustment: SetpointAdjustment,
    noseangling: Noseangling,

    pid: Pid,
    booster: Booster,
    frequency_tracker: FrequencyTracker,

    setpoint: f32,
    balance_current: f32,
    softstart_limit: f32,
    softstart_step: f32,

    engaged: bool,
    last_tick: Instant,
    trace_ticks: u32,
}

impl<D: MotorDriver> BalanceController<D> {
    /// # 引数
    /// * `driver` - モーター出力
    /// * `config` - 初期設定（検証済みであること）
    /// * `now` - 現在時刻
    ///
    /// # 戻り値
    /// * `Err(ConfigError)` - 設定が不正
    pub fn new(driver: D, config: BalanceConfig, now: Instant) -> Result<Self, ConfigError> {
        config.validate()?;
        let config = config.sanitized();
        let frequency = config.hertz as f32;

        let mut controller = Self {
            driver,
            config,
            balance_filter: BalanceFilter::new(),
            imu: Imu::new(),
            motor: MotorData::new(),
            motor_control: MotorControl::new(),
            wheelslip: WheelslipDetector::new(now),
            atr: Atr::new(),
            torque_tilt: TorqueTilt::new(),
            brake_tilt: BrakeTilt::new(),
            turn_tilt: TurnTilt::new(),
            remote: Remote::new(),
            reverse_stop: ReverseStop::new(now),
            setpoint_adjustment: SetpointAdjustment::new(),
            noseangling: Noseangling::new(),
            pid: Pid::new(),
            booster: Booster::new(),
            frequency_tracker: FrequencyTracker::new(frequency, now),
            setpoint: 0.0,
            balance_current: 0.0,
            softstart_limit: 0.0,
            softstart_step: 0.0,
            engaged: false,
            last_tick: now,
            trace_ticks: 0,
        };
        controller.configure_tunables();
        controller.reconfigure(frequency);
        Ok(controller)
    }

    /// ホストの姿勢推定値から四元数を初期化 [rad]
    pub fn init_attitude(&mut self, roll: f32, pitch: f32, yaw: f32) {
        self.balance_filter.init_from_euler(roll, pitch, yaw);
    }

    /// 保留中の設定があれば適用（ティックの先頭で呼ぶ）
    pub fn poll_config(&mut self, signal: &ConfigSignal) -> Result<(), ConfigError> {
        match signal.try_take() {
            Some(config) => self.apply_config(config),
            None => Ok(()),
        }
    }

    /// 設定を丸ごと差し替える
    ///
    /// 不正な設定は適用せず、現在の設定を維持する。
    pub fn apply_config(&mut self, config: BalanceConfig) -> Result<(), ConfigError> {
        if let Err(e) = config.validate() {
            warn!("Configuration rejected: {}", e);
            return Err(e);
        }

        let config = config.sanitized();
        let hertz_changed = config.hertz != self.config.hertz;
        self.config = config;
        self.configure_tunables();

        let frequency = if hertz_changed {
            // 公称周波数が変わったら追跡もやり直す
            let frequency = config.hertz as f32;
            self.frequency_tracker = FrequencyTracker::new(frequency, self.last_tick);
            frequency
        } else {
            self.frequency_tracker.filter_frequency()
        };
        self.reconfigure(frequency);
        Ok(())
    }

    /// 周波数依存のフィルタだけを再計算（チューニング値には触れない）
    pub fn reconfigure(&mut self, frequency: f32) {
        info!("Configuring filters for {}Hz", frequency);
        self.motor.configure(&self.config, frequency);
        self.atr.configure(&self.config, frequency);
        self.torque_tilt.configure(&self.config, frequency);
        self.brake_tilt.configure(&self.config, frequency);
        self.turn_tilt.configure(&self.config, frequency);
        self.remote.configure(&self.config, frequency);
        self.reverse_stop.configure(frequency);
    }

    /// 走行開始時のリセット
    ///
    /// セットポイントは現在のバランスピッチから始まり、センタリングで0へ戻る。
    pub fn engage(&mut self, ride: &mut RideState, now: Instant) {
        info!("Engaged at {} deg", self.imu.balance_pitch);

        self.motor.reset();
        self.atr.reset();
        self.torque_tilt.reset();
        self.brake_tilt.reset();
        self.turn_tilt.reset();
        self.remote.reset();
        self.reverse_stop.reset(self.motor.distance, now);
        self.wheelslip.reset(now);
        self.setpoint_adjustment.reset(self.imu.balance_pitch);
        self.noseangling.reset();
        self.pid.reset();
        self.booster.reset();

        self.setpoint = self.imu.balance_pitch;
        self.balance_current = 0.0;
        self.softstart_limit = 0.0;

        ride.sat = SetpointAdjustmentType::Centering;
        ride.stop_requested = false;
        ride.traction_control = false;
        self.engaged = true;
    }

    /// 1ティック実行
    ///
    /// # 引数
    /// * `input` - 今ティックのセンサー値
    /// * `ride` - ホストの実行状態（センタリング終了・リバースストップで更新される）
    ///
    /// # 戻り値
    /// 発行したモーター指令
    pub fn tick(&mut self, input: &TickInput, ride: &mut RideState) -> MotorCommand {
        let dt = input.dt;
        let now = input.now;
        self.last_tick = now;

        // 1. センサー
        self.balance_filter
            .update(input.imu.gyro, input.imu.accel, dt);
        self.imu.update(&self.balance_filter, &input.imu, ride.mode);
        self.motor.update(&input.motor, dt);
        self.remote.input(&input.remote, &self.config);
        self.turn_tilt.aggregate(self.imu.yaw, dt);

        // 2. ループ周波数
        self.frequency_tracker.update(dt);
        let mut drifted = None;
        self.frequency_tracker
            .check(ride.is_running(), now, |f| drifted = Some(f));
        if let Some(frequency) = drifted {
            self.reconfigure(frequency);
        }

        // 3. 制御
        if ride.is_running() {
            if !self.engaged {
                self.engage(ride, now);
            }
            self.running_tick(ride, dt, now);
        } else {
            if self.engaged {
                info!("Disengaged");
                self.engaged = false;
                ride.wheelslip = false;
                self.balance_current = 0.0;
                self.motor_control.hold_brake(now);
            }
            self.winddown();
            ride.stop_requested = false;
        }

        self.trace_ticks += 1;
        if self.trace_ticks >= self.config.hertz as u32 {
            self.trace_ticks = 0;
            trace!(
                "balance current {}A, setpoint {} deg",
                self.balance_current,
                self.setpoint
            );
        }

        // 4. 出力
        self.motor_control
            .apply(&mut self.driver, &self.motor, ride.run_state, now)
    }

    fn running_tick(&mut self, ride: &mut RideState, dt: f32, now: Instant) {
        // リバースストップ
        let reverse_stop_enabled = self.config.fault_reversestop_enabled
            && !ride.darkride
            && ride.sat != SetpointAdjustmentType::Centering;
        if self.reverse_stop.update(
            self.motor.distance,
            self.setpoint_adjustment.interpolated,
            now,
            reverse_stop_enabled,
        ) {
            info!("Reverse stop triggered");
        }
        if reverse_stop_enabled && self.reverse_stop.active() {
            ride.sat = SetpointAdjustmentType::ReverseStop;
        } else if ride.sat == SetpointAdjustmentType::ReverseStop {
            ride.sat = SetpointAdjustmentType::None;
        }
        ride.stop_requested =
            ride.sat == SetpointAdjustmentType::ReverseStop && self.reverse_stop.stop(now);

        // ホイールスリップ
        self.wheelslip.update(&self.motor, ride, now);

        // ベースセットポイント + リモート
        let mut setpoint = self.setpoint_adjustment.update(
            ride,
            self.motor.erpm_sign,
            self.reverse_stop.setpoint(),
        );
        self.remote.update(&self.config, ride.darkride, dt);
        setpoint += self.remote.setpoint();

        if !ride.darkride {
            if !ride.wheelslip {
                setpoint += self
                    .noseangling
                    .update(self.motor.abs_erpm, self.motor.erpm_sign);
                self.turn_tilt
                    .update(&self.motor, &self.config, ride.wheelslip, dt);
                setpoint += self.turn_tilt.setpoint();
            }

            self.torque_tilt
                .update(&self.motor, &self.config, ride.wheelslip, dt);
            self.atr
                .update(&self.motor, &self.config, ride.wheelslip, dt);
            self.brake_tilt.update(
                &self.motor,
                self.atr.accel_diff,
                setpoint - self.imu.balance_pitch,
                ride.wheelslip,
                dt,
            );

            // ATR+ブレーキチルトとトルクチルトは同じ向きなら大きい方だけ
            let atr_brake = self.atr.setpoint() + self.brake_tilt.setpoint();
            let torque = self.torque_tilt.setpoint();
            if sign(atr_brake) == sign(torque) {
                setpoint += sign(atr_brake) * fabsf(atr_brake).max(fabsf(torque));
            } else {
                setpoint += atr_brake + torque;
            }
        }
        self.setpoint = setpoint;

        // PID + ブースター
        self.pid.update(
            setpoint,
            self.imu.balance_pitch,
            self.imu.pitch_rate,
            &self.motor,
            &self.config,
            dt,
        );
        self.booster.update(
            &self.motor,
            &self.config,
            setpoint - self.brake_tilt.setpoint() - self.imu.pitch,
        );

        let mut pitch_based = self.pid.rate_p + self.booster.current;
        if self.softstart_limit < self.motor.current_max {
            pitch_based = fabsf(pitch_based).min(self.softstart_limit) * sign(pitch_based);
            self.softstart_limit += self.softstart_step;
        }

        let limit = if self.motor.braking {
            self.motor.current_min
        } else {
            self.motor.current_max
        };
        let new_current = self.pid.p + self.pid.i + pitch_based;
        // 非有限値は出力しない
        let new_current = if new_current.is_finite() {
            new_current.clamp(-limit, limit)
        } else {
            self.balance_current
        };

        self.balance_current = if ride.traction_control {
            0.0
        } else {
            self.balance_current * (1.0 - BALANCE_CURRENT_ALPHA)
                + new_current * BALANCE_CURRENT_ALPHA
        };
        self.motor_control.request_current(self.balance_current);
    }

    /// 非走行中は各チルトを急に0にせず減衰させる
    fn winddown(&mut self) {
        self.atr.winddown();
        self.torque_tilt.winddown();
        self.brake_tilt.winddown();
        self.turn_tilt.winddown();
    }

    fn configure_tunables(&mut self) {
        self.balance_filter.configure(
            self.config.mahony_kp,
            self.config.mahony_kp_roll,
            self.config.mahony_ki,
            self.config.bf_accel_confidence_decay,
        );
        self.motor_control.configure(&self.config);
        self.wheelslip.configure(&self.config);
        self.setpoint_adjustment.configure(&self.config);
        self.noseangling.configure(&self.config);
        self.softstart_step = SOFTSTART_SPEED * self.config.dt();
    }

    /// フライホイールモード用に現在の姿勢を基準として記録
    pub fn set_flywheel_offsets(&mut self) {
        self.imu.set_flywheel_offsets();
        debug!(
            "Flywheel offsets captured: pitch {} roll {}",
            self.imu.pitch,
            self.imu.roll
        );
    }

    pub fn telemetry(&self) -> Telemetry {
        Telemetry {
            pitch: self.imu.pitch,
            balance_pitch: self.imu.balance_pitch,
            roll: self.imu.roll,
            yaw: self.imu.yaw,
            pitch_rate: self.imu.pitch_rate,
            setpoint: self.setpoint,
            setpoint_target: self.setpoint_adjustment.target,
            setpoint_target_interpolated: self.setpoint_adjustment.interpolated,
            noseangling: self.noseangling.value,
            remote_setpoint: self.remote.setpoint(),
            atr_setpoint: self.atr.setpoint(),
            brake_tilt_setpoint: self.brake_tilt.setpoint(),
            torque_tilt_setpoint: self.torque_tilt.setpoint(),
            turn_tilt_setpoint: self.turn_tilt.setpoint(),
            reverse_stop_setpoint: self.reverse_stop.setpoint(),
            balance_current: self.balance_current,
            pid_p: self.pid.p,
            pid_i: self.pid.i,
            pid_rate_p: self.pid.rate_p,
            booster_current: self.booster.current,
            atr_accel_diff: self.atr.accel_diff,
            atr_speed_boost: self.atr.speed_boost,
            current_saturation: self.motor.get_current_saturation(),
            frequency: self.frequency_tracker.frequency(),
            dt_ms: self.frequency_tracker.dt_ms,
            recalculations: self.frequency_tracker.recalculations,
        }
    }

    pub fn current_saturation(&self) -> f32 {
        self.motor.get_current_saturation()
    }

    /// [deg]
    pub fn roll(&self) -> f32 {
        self.imu.roll
    }

    /// [deg]
    pub fn pitch(&self) -> f32 {
        self.imu.pitch
    }

    /// [deg]
    pub fn yaw(&self) -> f32 {
        self.imu.yaw
    }

    pub fn config(&self) -> &BalanceConfig {
        &self.config
    }

    pub fn motor(&self) -> &MotorData {
        &self.motor
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::deg2rad;
    use crate::state::RunState;

    const EPSILON: f32 = 1e-2;
    const HZ: f32 = 832.0;

    #[derive(Default)]
    struct CountingDriver {
        commands: usize,
    }

    impl MotorDriver for CountingDriver {
        fn set_current(&mut self, _current: f32) {
            self.commands += 1;
        }

        fn set_brake_current(&mut self, _current: f32) {
            self.commands += 1;
        }

        fn set_duty(&mut self, _duty: f32) {
            self.commands += 1;
        }
    }

    fn controller(config: BalanceConfig) -> BalanceController<CountingDriver> {
        let mut c = BalanceController::new(CountingDriver::default(), config, at(0, HZ))
            .unwrap_or_else(|e| panic!("config rejected: {:?}", e));
        c.init_attitude(0.0, 0.0, 0.0);
        c
    }

    fn at(n: u64, hz: f32) -> Instant {
        Instant::from_micros(1_000_000 + n * (1_000_000.0 / hz) as u64)
    }

    fn level(n: u64, hz: f32) -> TickInput {
        TickInput {
            now: at(n, hz),
            dt: 1.0 / hz,
            imu: ImuSample {
                accel: [0.0, 0.0, 1.0],
                ..Default::default()
            },
            motor: MotorSample::default(),
            remote: RemoteSample::default(),
        }
    }

    fn running() -> RideState {
        let mut ride = RideState::new();
        ride.run_state = RunState::Running;
        ride
    }

    fn current_of(command: MotorCommand) -> f32 {
        match command {
            MotorCommand::Current(current) => current,
            other => panic!("expected a current command, got {:?}", other),
        }
    }

    #[test]
    fn test_level_rest_stays_level() {
        let mut config = BalanceConfig::default();
        config.hertz = 1000;
        let mut c = controller(config);
        let mut ride = RideState::new();

        for n in 0..500 {
            c.tick(&level(n, 1000.0), &mut ride);
        }
        assert!(c.telemetry().balance_pitch.abs() < EPSILON);

        for n in 500..10_500 {
            c.tick(&level(n, 1000.0), &mut ride);
            let t = c.telemetry();
            assert!(t.balance_pitch.abs() < EPSILON);
        }
        assert_eq!(c.driver().commands, 10_500);
    }

    #[test]
    fn test_zero_error_gives_zero_current() {
        let mut c = controller(BalanceConfig::default());
        let mut ride = running();
        for n in 0..200 {
            let current = current_of(c.tick(&level(n, HZ), &mut ride));
            assert!(current.abs() < 1e-4);
        }
        let t = c.telemetry();
        assert!(t.pid_p.abs() < 1e-4);
        assert!(t.pid_i.abs() < 1e-4);
    }

    #[test]
    fn test_engage_centers_from_current_pitch() {
        let mut c = controller(BalanceConfig::default());
        c.init_attitude(0.0, deg2rad(3.0), 0.0);
        let mut ride = running();

        c.tick(&level(0, HZ), &mut ride);
        assert_eq!(ride.sat, SetpointAdjustmentType::Centering);
        let t = c.telemetry();
        assert!(t.setpoint_target_interpolated > 2.5);
        assert_eq!(t.setpoint_target, 0.0);

        for n in 1..HZ as u64 {
            c.tick(&level(n, HZ), &mut ride);
        }
        assert_eq!(ride.sat, SetpointAdjustmentType::None);
        assert_eq!(c.telemetry().setpoint_target_interpolated, 0.0);
    }

    #[test]
    fn test_leaning_forward_pushes_forward() {
        let mut c = controller(BalanceConfig::default());
        c.init_attitude(0.0, deg2rad(-2.0), 0.0);
        let mut ride = running();
        let mut current = 0.0;
        for n in 0..100 {
            current = current_of(c.tick(&level(n, HZ), &mut ride));
        }
        // balance_pitch < setpoint -> positive error
        assert!(current > 0.0);
        assert!(current <= c.config().current_max);
    }

    #[test]
    fn test_traction_control_zeroes_current() {
        let mut c = controller(BalanceConfig::default());
        c.init_attitude(0.0, deg2rad(5.0), 0.0);
        let mut ride = running();
        c.tick(&level(0, HZ), &mut ride);

        ride.traction_control = true;
        for n in 1..50 {
            assert_eq!(c.tick(&level(n, HZ), &mut ride), MotorCommand::Current(0.0));
        }
    }

    #[test]
    fn test_wheel_spin_up_sets_and_clears_wheelslip() {
        let mut c = controller(BalanceConfig::default());
        let mut ride = running();
        for n in 0..10 {
            c.tick(&level(n, HZ), &mut ride);
        }
        assert_eq!(ride.sat, SetpointAdjustmentType::None);
        ride.darkride = true;

        let spinning = |n: u64, erpm: f32| TickInput {
            motor: MotorSample {
                erpm,
                duty_cycle: 0.5,
                ..Default::default()
            },
            ..level(n, HZ)
        };

        // 1ティックあたり20erpmで空転
        let mut erpm = 3000.0;
        for n in 10..110 {
            erpm += 20.0;
            let command = c.tick(&spinning(n, erpm), &mut ride);
            if ride.traction_control {
                assert_eq!(command, MotorCommand::Current(0.0));
            }
        }
        assert!(ride.wheelslip);
        assert!(ride.traction_control);

        // 一定速度に戻ると0.2秒後に解除
        for n in 110..(110 + HZ as u64 / 2) {
            c.tick(&spinning(n, erpm), &mut ride);
        }
        assert!(!ride.wheelslip);
        assert!(!ride.traction_control);
    }

    #[test]
    fn test_disengage_holds_parking_brake_then_releases() {
        let mut c = controller(BalanceConfig::default());
        let mut ride = running();
        for n in 0..100 {
            c.tick(&level(n, HZ), &mut ride);
        }

        ride.run_state = RunState::Ready;
        assert_eq!(c.tick(&level(100, HZ), &mut ride), MotorCommand::Duty(0.0));

        // 1秒後に解放
        let mut last = MotorCommand::Duty(0.0);
        for n in 101..(100 + 2 * HZ as u64) {
            last = c.tick(&level(n, HZ), &mut ride);
        }
        assert_eq!(last, MotorCommand::Release);
    }

    #[test]
    fn test_rejected_config_keeps_previous() {
        let mut c = controller(BalanceConfig::default());
        let before = *c.config();

        let mut bad = BalanceConfig::default();
        bad.hertz = 50;
        bad.kp = 99.0;
        assert_eq!(c.apply_config(bad), Err(ConfigError::LoopFrequency));
        assert_eq!(*c.config(), before);

        let mut bad = BalanceConfig::default();
        bad.current_max = 0.0;
        assert_eq!(c.apply_config(bad), Err(ConfigError::CurrentLimit));
        assert_eq!(*c.config(), before);
    }

    #[test]
    fn test_poll_config_applies_pending() {
        let mut c = controller(BalanceConfig::default());
        let signal = ConfigSignal::new();
        assert_eq!(c.poll_config(&signal), Ok(()));

        let mut config = BalanceConfig::default();
        config.kp = 12.5;
        signal.signal(config);
        assert_eq!(c.poll_config(&signal), Ok(()));
        assert_eq!(c.config().kp, 12.5);

        // 取り出し済み
        assert_eq!(c.poll_config(&signal), Ok(()));
    }

    #[test]
    fn test_frequency_drift_reconfigures() {
        let mut c = controller(BalanceConfig::default());
        let mut ride = RideState::new();
        for n in 0..1500 {
            c.tick(&level(n, 1000.0), &mut ride);
        }
        let t = c.telemetry();
        assert_eq!(t.recalculations, 1);
        assert!((t.frequency - 1000.0).abs() < 5.0);
        assert!((t.dt_ms - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_reverse_stop_requests_stop() {
        let mut config = BalanceConfig::default();
        config.fault_reversestop_enabled = true;
        let mut c = controller(config);
        let mut ride = running();

        // センタリング完了まで
        for n in 0..HZ as u64 {
            c.tick(&level(n, HZ), &mut ride);
        }
        assert_eq!(ride.sat, SetpointAdjustmentType::None);

        // 0.2m/sで後退
        let mut saw_reverse_stop = false;
        let mut stop_requested = false;
        for n in 0..(8 * HZ as u64) {
            let mut input = level(HZ as u64 + n, HZ);
            input.motor.distance = -0.2 * n as f32 / HZ;
            c.tick(&input, &mut ride);
            saw_reverse_stop |= ride.sat == SetpointAdjustmentType::ReverseStop;
            if ride.stop_requested {
                stop_requested = true;
                break;
            }
        }
        assert!(saw_reverse_stop);
        assert!(stop_requested);
        assert!(c.telemetry().reverse_stop_setpoint > 0.0);
    }

    #[test]
    fn test_reverse_stop_disabled_by_default() {
        let mut c = controller(BalanceConfig::default());
        let mut ride = running();
        for n in 0..(4 * HZ as u64) {
            let mut input = level(n, HZ);
            input.motor.distance = -0.2 * n as f32 / HZ;
            c.tick(&input, &mut ride);
            assert_ne!(ride.sat, SetpointAdjustmentType::ReverseStop);
            assert!(!ride.stop_requested);
        }
    }

    #[test]
    fn test_pathological_samples_stay_bounded() {
        let mut c = controller(BalanceConfig::default());
        let mut ride = running();
        let limit = c.config().current_max;
        for n in 0..100 {
            c.tick(&level(n, HZ), &mut ride);
        }

        let mut nan = level(100, HZ);
        nan.imu.gyro = [f32::NAN; 3];
        nan.imu.accel = [f32::NAN; 3];
        nan.motor.current = f32::NAN;
        nan.motor.erpm = f32::NAN;
        let current = current_of(c.tick(&nan, &mut ride));
        assert!(current.is_finite() && current.abs() <= limit);

        let mut spike = level(101, HZ);
        spike.imu.gyro = [1e6, 1e6, 1e6];
        spike.motor.current = 1e9;
        spike.motor.erpm = 1e9;
        let current = current_of(c.tick(&spike, &mut ride));
        assert!(current.is_finite() && current.abs() <= limit);

        for n in 102..2000 {
            let current = current_of(c.tick(&level(n, HZ), &mut ride));
            assert!(current.is_finite() && current.abs() <= limit);
        }
    }

    #[test]
    fn test_telemetry_angles_follow_host_attitude() {
        let mut c = controller(BalanceConfig::default());
        let mut ride = RideState::new();
        let mut input = level(0, HZ);
        input.imu.attitude = [deg2rad(4.0), deg2rad(-6.0), deg2rad(90.0)];
        c.tick(&input, &mut ride);
        assert!((c.roll() - 4.0).abs() < EPSILON);
        assert!((c.pitch() + 6.0).abs() < EPSILON);
        assert!((c.yaw() - 90.0).abs() < EPSILON);
    }

    #[test]
    fn test_invalid_initial_config_rejected() {
        let mut config = BalanceConfig::default();
        config.kp = f32::NAN;
        let result = BalanceController::new(CountingDriver::default(), config, at(0, HZ));
        assert!(matches!(result, Err(ConfigError::NonFinite)));
    }
}
