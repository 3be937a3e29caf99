// Remote input tilt
//
// Maps a throttle-like remote axis to a lean angle. The remote transport is
// owned by the host; a reading older than one second counts as disconnected.

use embassy_time::Duration;

use crate::config::{BalanceConfig, RemoteType};
use crate::filters::{ShaperTuning, SmoothSetpoint, TrajectoryShaper};
use crate::math::sign;
use libm::fabsf;

/// Readings older than this are ignored
const REMOTE_TIMEOUT: Duration = Duration::from_secs(1);

/// One remote axis value with its age
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RemoteReading {
    /// -1.0..1.0
    pub value: f32,
    /// Time since the host last received it
    pub age: Duration,
}

/// Latest readings of each transport, `None` if never received
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RemoteSample {
    pub ppm: Option<RemoteReading>,
    pub uart: Option<RemoteReading>,
}

#[derive(Debug, Clone)]
pub struct Remote<S: TrajectoryShaper = SmoothSetpoint> {
    /// Deadbanded, normalized input (-1.0..1.0)
    pub input: f32,
    shaper: S,
}

impl<S: TrajectoryShaper + Default> Remote<S> {
    pub fn new() -> Self {
        Self {
            input: 0.0,
            shaper: S::default(),
        }
    }
}

impl<S: TrajectoryShaper + Default> Default for Remote<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: TrajectoryShaper> Remote<S> {
    pub fn configure(&mut self, config: &BalanceConfig, frequency: f32) {
        let tuning = ShaperTuning::from_strengths(
            config.inputtilt_filter_strength,
            config.inputtilt_on_ease_in,
            config.inputtilt_off_ease_in,
            (
                config.inputtilt_speed,
                config.inputtilt_speed,
                config.inputtilt_speed,
                config.inputtilt_speed,
            ),
        );
        self.shaper.configure(&tuning, frequency);
    }

    pub fn reset(&mut self) {
        self.shaper.reset(0.0);
    }

    /// Read the configured transport every tick, running or not
    pub fn input(&mut self, sample: &RemoteSample, config: &BalanceConfig) {
        let reading = match config.inputtilt_remote_type {
            RemoteType::Ppm => sample.ppm,
            RemoteType::Uart => sample.uart,
            RemoteType::None => None,
        };

        let value = match reading {
            Some(reading) if reading.age < REMOTE_TIMEOUT && reading.value.is_finite() => {
                reading.value.clamp(-1.0, 1.0)
            }
            _ => {
                self.input = 0.0;
                return;
            }
        };

        let deadband = config.inputtilt_deadband;
        let mut value = if fabsf(value) < deadband {
            0.0
        } else {
            sign(value) * (fabsf(value) - deadband) / (1.0 - deadband)
        };

        if config.inputtilt_invert_throttle {
            value = -value;
        }

        self.input = value;
    }

    pub fn update(&mut self, config: &BalanceConfig, darkride: bool, dt: f32) {
        let mut target = self.input * config.inputtilt_angle_limit;
        if darkride {
            target = -target;
        }
        self.shaper.update(target, dt, true);
    }

    pub fn setpoint(&self) -> f32 {
        self.shaper.value()
    }
}
