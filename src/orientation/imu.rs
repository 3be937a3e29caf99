// IMU-derived angles in degrees
//
// Telemetry angles come from the host's own attitude estimate; the balance
// pitch comes from our balance filter.

use super::balance_filter::BalanceFilter;
use crate::math::rad2deg;
use crate::state::Mode;
use libm::{cosf, sinf};

/// Raw inertial sample handed over by the host every tick
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ImuSample {
    /// Angular rates [rad/s]
    pub gyro: [f32; 3],
    /// Acceleration [g]
    pub accel: [f32; 3],
    /// Host attitude estimate (roll, pitch, yaw) [rad]
    pub attitude: [f32; 3],
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Imu {
    /// Telemetry pitch [deg]
    pub pitch: f32,
    /// Pitch used for stabilization [deg]
    pub balance_pitch: f32,
    pub roll: f32,
    pub yaw: f32,
    /// Pitch rate with the yaw component removed [deg/s]
    pub pitch_rate: f32,

    flywheel_pitch_offset: f32,
    flywheel_roll_offset: f32,
}

impl Imu {
    pub const fn new() -> Self {
        Self {
            pitch: 0.0,
            balance_pitch: 0.0,
            roll: 0.0,
            yaw: 0.0,
            pitch_rate: 0.0,
            flywheel_pitch_offset: 0.0,
            flywheel_roll_offset: 0.0,
        }
    }

    /// Refresh the angles from the filter and the host sample
    pub fn update(&mut self, filter: &BalanceFilter, sample: &ImuSample, mode: Mode) {
        let [roll_rad, pitch_rad, yaw_rad] = sample.attitude;

        self.pitch = rad2deg(pitch_rad);
        self.roll = rad2deg(roll_rad);
        self.yaw = rad2deg(yaw_rad);
        self.balance_pitch = rad2deg(filter.get_pitch());

        // Rotate so that turning while rolled does not leak into the pitch rate
        let sin_roll = sinf(roll_rad);
        let cos_roll = cosf(roll_rad);
        let rate = cos_roll * cos_roll * sample.gyro[1] + sin_roll * cos_roll * sample.gyro[2];
        if rate.is_finite() {
            self.pitch_rate = rad2deg(rate);
        }

        if mode == Mode::Flywheel {
            self.pitch = self.flywheel_pitch_offset - self.pitch;
            self.balance_pitch = self.pitch;
            self.roll -= self.flywheel_roll_offset;
            if self.roll < -200.0 {
                self.roll += 360.0;
            } else if self.roll > 200.0 {
                self.roll -= 360.0;
            }
        }
    }

    /// Capture the current pitch/roll as the flywheel reference
    pub fn set_flywheel_offsets(&mut self) {
        self.flywheel_pitch_offset = self.pitch;
        self.flywheel_roll_offset = self.roll;
    }
}
