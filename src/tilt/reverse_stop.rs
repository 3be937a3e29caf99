// Reverse stop
//
// When the wheel rolls backwards against the board, the nose is lowered
// toward a stop angle over a distance proportional to the angle still to go.
// Rolling forward again returns it. The host disengages once `stop()` says so.

use embassy_time::{Duration, Instant};

use crate::filters::Ema;
use crate::math::{sign, smoothstep};
use libm::fabsf;

/// Distance over which the full stop angle is reached [m]
const REVERSE_STOP_DISTANCE: f32 = 0.5;

/// [deg]
const TARGET_STOP_ANGLE: f32 = 15.0;

const DISTANCE_PER_DEGREE: f32 = REVERSE_STOP_DISTANCE / TARGET_STOP_ANGLE;

/// The stop timer ages only while the setpoint is beyond this [deg]
const TIMER_ANGLE_THRESHOLD: f32 = TARGET_STOP_ANGLE / 2.0;

/// Approximate travel of one motor step [m]
const MOTOR_STEP_DISTANCE: f32 = 0.01;

/// Progress smoothing cutoff [Hz]
const PROGRESS_CUTOFF: f32 = 1.0;

/// Progress this close to 1 counts as complete
const PROGRESS_SNAP: f32 = 1e-3;

#[derive(Debug, Clone)]
pub struct ReverseStop {
    start_setpoint: f32,
    target_setpoint: f32,
    /// Tachometer distance at the last trigger [m]
    start_distance: f32,
    /// Travel toward the target since the trigger [m]
    current_distance: f32,
    /// Signed travel needed to reach the target [m]
    target_distance: f32,
    progress: Ema,
    timer: Instant,
}

impl ReverseStop {
    pub fn new(now: Instant) -> Self {
        let mut rs = Self {
            start_setpoint: 0.0,
            target_setpoint: 0.0,
            start_distance: 0.0,
            current_distance: 0.0,
            target_distance: 0.0,
            progress: Ema::new(),
            timer: now,
        };
        rs.reset(0.0, now);
        rs
    }

    pub fn configure(&mut self, frequency: f32) {
        self.progress.configure(PROGRESS_CUTOFF, frequency);
    }

    /// Idle at `distance` with the nose level
    pub fn reset(&mut self, distance: f32, now: Instant) {
        self.start_setpoint = 0.0;
        self.target_setpoint = 0.0;
        self.start_distance = distance;
        self.current_distance = 0.0;
        self.target_distance = 0.0;
        self.progress.reset(1.0);
        self.timer = now;
    }

    /// Advance one tick
    ///
    /// # Arguments
    /// * `distance` - Signed tachometer distance [m]
    /// * `setpoint` - Current base setpoint [deg]
    /// * `now` - Current time
    /// * `enabled` - Whether a new reverse stop may start
    ///
    /// # Returns
    /// `true` on the tick a reverse stop (or its return) triggers
    pub fn update(&mut self, distance: f32, setpoint: f32, now: Instant, enabled: bool) -> bool {
        if !enabled && self.progress.value >= 1.0 {
            self.start_distance = distance;
            return false;
        }

        let new_distance = distance - self.start_distance;
        let distance_diff = (new_distance - self.current_distance) * sign(self.target_distance);

        if distance_diff < -2.0 * MOTOR_STEP_DISTANCE {
            self.trigger(distance, setpoint, now);
            return true;
        }

        if self.progress.value >= 1.0 {
            if distance_diff > 0.0 {
                self.start_distance = distance;
            }
            return false;
        }

        if distance_diff > 0.0 {
            self.current_distance = new_distance;
        }

        let ratio = if self.target_distance != 0.0 {
            self.current_distance / self.target_distance
        } else {
            1.0
        };
        self.progress.update(ratio);
        if 1.0 - self.progress.value < PROGRESS_SNAP {
            self.progress.reset(1.0);
        }

        if self.progress.value >= 1.0 {
            self.start_distance = distance;
            self.target_distance = 0.0;
            self.current_distance = 0.0;
        }

        // 戻り中、または角度がしきい値未満ならタイマーを更新
        if self.target_setpoint == 0.0 || setpoint < TIMER_ANGLE_THRESHOLD {
            self.timer = now;
        }

        false
    }

    /// Lean setpoint of the stop [deg]
    pub fn setpoint(&self) -> f32 {
        let progress = smoothstep(self.progress.value);
        self.start_setpoint + progress * (self.target_setpoint - self.start_setpoint)
    }

    pub fn active(&self) -> bool {
        self.target_setpoint > 0.0 || self.progress.value < 1.0
    }

    /// Whether the host should disengage
    ///
    /// The timer runs out after 3s at no progress, 1s at full progress.
    pub fn stop(&self, now: Instant) -> bool {
        let progress = self.progress.value;
        let threshold = 3.0 - 2.0 * progress;
        let threshold = Duration::from_micros((threshold.max(0.0) * 1_000_000.0) as u64);
        if now.saturating_duration_since(self.timer) > threshold {
            return true;
        }

        self.target_setpoint > 0.0 && progress >= 1.0
    }

    pub fn progress(&self) -> f32 {
        self.progress.value
    }

    fn trigger(&mut self, distance: f32, setpoint: f32, now: Instant) {
        self.target_setpoint = if self.target_setpoint > 0.0 {
            0.0
        } else {
            TARGET_STOP_ANGLE
        };
        self.start_setpoint = setpoint;
        self.start_distance = distance;
        self.current_distance = 0.0;
        self.target_distance =
            fabsf(self.start_setpoint - self.target_setpoint) * DISTANCE_PER_DEGREE;
        // 符号は目標側に合わせる（負のセットポイントから入って戻る場合も同じ）
        if self.target_setpoint > 0.0 {
            self.target_distance = -self.target_distance;
        }

        let new_progress = if fabsf(self.target_distance) < MOTOR_STEP_DISTANCE {
            self.target_distance = 0.0;
            1.0
        } else {
            0.0
        };
        self.progress.reset(new_progress);
        self.timer = now;
    }
}
