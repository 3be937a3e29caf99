// Mahony AHRS for the balance pitch
//
// Gravity-referenced complementary filter: the accelerometer corrects the
// integrated gyro rates through the cross product between measured and
// predicted gravity, weighted by how much the accelerometer can be trusted.

use core::f32::consts::FRAC_PI_2;
use libm::{asinf, atan2f, cosf, fabsf, sinf, sqrtf};

/// Below this accelerometer norm [g] no correction is applied
const MIN_ACCEL_NORM: f32 = 0.01;

/// Mahony filter state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BalanceFilter {
    q0: f32,
    q1: f32,
    q2: f32,
    q3: f32,
    /// Integral feedback (roll, pitch, yaw axes) [rad/s]
    integral_fb: [f32; 3],
    /// Low-passed accelerometer magnitude [g]
    acc_mag: f32,

    kp_pitch: f32,
    kp_roll: f32,
    kp_yaw: f32,
    ki: f32,
    acc_confidence_decay: f32,
}

impl BalanceFilter {
    /// Identity orientation, no correction gains
    pub const fn new() -> Self {
        Self {
            q0: 1.0,
            q1: 0.0,
            q2: 0.0,
            q3: 0.0,
            integral_fb: [0.0; 3],
            acc_mag: 1.0,
            kp_pitch: 0.0,
            kp_roll: 0.0,
            kp_yaw: 0.0,
            ki: 0.0,
            acc_confidence_decay: 0.0,
        }
    }

    /// Seed from the host's orientation estimate so the filter does not have
    /// to converge from scratch
    ///
    /// # Arguments
    /// * `quaternion` - [w, x, y, z]
    pub fn init(&mut self, quaternion: [f32; 4]) {
        let [q0, q1, q2, q3] = quaternion;
        let norm = sqrtf(q0 * q0 + q1 * q1 + q2 * q2 + q3 * q3);
        if norm > MIN_ACCEL_NORM {
            self.q0 = q0 / norm;
            self.q1 = q1 / norm;
            self.q2 = q2 / norm;
            self.q3 = q3 / norm;
        } else {
            self.q0 = 1.0;
            self.q1 = 0.0;
            self.q2 = 0.0;
            self.q3 = 0.0;
        }
        self.integral_fb = [0.0; 3];
        self.acc_mag = 1.0;
    }

    /// Seed from Euler angles in the vehicle convention (same as the getters)
    ///
    /// # Arguments
    /// * `roll`, `pitch`, `yaw` - [rad]
    pub fn init_from_euler(&mut self, roll: f32, pitch: f32, yaw: f32) {
        // Getters flip roll and yaw relative to the mathematical ZYX angles
        let (cr, sr) = (cosf(-roll * 0.5), sinf(-roll * 0.5));
        let (cp, sp) = (cosf(pitch * 0.5), sinf(pitch * 0.5));
        let (cy, sy) = (cosf(-yaw * 0.5), sinf(-yaw * 0.5));

        self.init([
            cr * cp * cy + sr * sp * sy,
            sr * cp * cy - cr * sp * sy,
            cr * sp * cy + sr * cp * sy,
            cr * cp * sy - sr * sp * cy,
        ]);
    }

    /// Set the correction gains
    ///
    /// # Arguments
    /// * `kp_pitch` - Proportional gain on the pitch axis
    /// * `kp_roll` - Proportional gain on the roll axis
    /// * `ki` - Integral gain (0 disables the integral feedback)
    /// * `confidence_decay` - How fast accelerometer trust drops away from 1g
    pub fn configure(&mut self, kp_pitch: f32, kp_roll: f32, ki: f32, confidence_decay: f32) {
        self.kp_pitch = kp_pitch;
        self.kp_roll = kp_roll;
        // Yaw has little effect on balancing, use the middle value
        self.kp_yaw = (kp_pitch + kp_roll) * 0.5;
        self.ki = ki.max(0.0);
        self.acc_confidence_decay = confidence_decay;
        if self.ki == 0.0 {
            self.integral_fb = [0.0; 3];
        }
    }

    fn accel_confidence(&mut self, accel_norm: f32) -> f32 {
        self.acc_mag = self.acc_mag * 0.9 + accel_norm * 0.1;
        let confidence = 1.0 - self.acc_confidence_decay * sqrtf(fabsf(self.acc_mag - 1.0));
        confidence.max(0.0)
    }

    /// One filter step
    ///
    /// # Arguments
    /// * `gyro` - Angular rates [rad/s]
    /// * `accel` - Acceleration [g]
    /// * `dt` - Time step [s]
    pub fn update(&mut self, gyro: [f32; 3], accel: [f32; 3], dt: f32) {
        let [mut gx, mut gy, mut gz] = gyro;
        let [ax, ay, az] = accel;

        let accel_norm = sqrtf(ax * ax + ay * ay + az * az);

        // A non-finite norm would stick in acc_mag
        if accel_norm.is_finite() && accel_norm > MIN_ACCEL_NORM {
            let confidence = self.accel_confidence(accel_norm);
            let two_kp_roll = 2.0 * self.kp_roll * confidence;
            let two_kp_pitch = 2.0 * self.kp_pitch * confidence;
            let two_kp_yaw = 2.0 * self.kp_yaw * confidence;

            let ax = ax / accel_norm;
            let ay = ay / accel_norm;
            let az = az / accel_norm;

            // Predicted gravity direction (half)
            let halfvx = self.q1 * self.q3 - self.q0 * self.q2;
            let halfvy = self.q0 * self.q1 + self.q2 * self.q3;
            let halfvz = self.q0 * self.q0 - 0.5 + self.q3 * self.q3;

            // Error = measured × predicted
            let halfex = ay * halfvz - az * halfvy;
            let halfey = az * halfvx - ax * halfvz;
            let halfez = ax * halfvy - ay * halfvx;

            if self.ki > 0.0 {
                let two_ki = 2.0 * self.ki * confidence;
                self.integral_fb[0] += two_ki * halfex * dt;
                self.integral_fb[1] += two_ki * halfey * dt;
                self.integral_fb[2] += two_ki * halfez * dt;
                gx += self.integral_fb[0];
                gy += self.integral_fb[1];
                gz += self.integral_fb[2];
            }

            gx += two_kp_roll * halfex;
            gy += two_kp_pitch * halfey;
            gz += two_kp_yaw * halfez;
        }

        // Quaternion kinematics
        gx *= 0.5 * dt;
        gy *= 0.5 * dt;
        gz *= 0.5 * dt;
        let qa = self.q0;
        let qb = self.q1;
        let qc = self.q2;
        let qd = self.q3;
        let q0 = qa - qb * gx - qc * gy - qd * gz;
        let q1 = qb + qa * gx + qc * gz - qd * gy;
        let q2 = qc + qa * gy - qb * gz + qd * gx;
        let q3 = qd + qa * gz + qb * gy - qc * gx;

        let norm = sqrtf(q0 * q0 + q1 * q1 + q2 * q2 + q3 * q3);
        if norm.is_finite() && norm > MIN_ACCEL_NORM {
            self.q0 = q0 / norm;
            self.q1 = q1 / norm;
            self.q2 = q2 / norm;
            self.q3 = q3 / norm;
        }
        // otherwise a corrupt sample is dropped and the previous attitude kept
    }

    /// Roll [rad]
    pub fn get_roll(&self) -> f32 {
        let (q0, q1, q2, q3) = (self.q0, self.q1, self.q2, self.q3);
        -atan2f(q0 * q1 + q2 * q3, 0.5 - (q1 * q1 + q2 * q2))
    }

    /// Pitch [rad]
    pub fn get_pitch(&self) -> f32 {
        let sin = -2.0 * (self.q1 * self.q3 - self.q0 * self.q2);
        if sin <= -1.0 {
            -FRAC_PI_2
        } else if sin >= 1.0 {
            FRAC_PI_2
        } else {
            asinf(sin)
        }
    }

    /// Yaw [rad]
    pub fn get_yaw(&self) -> f32 {
        let (q0, q1, q2, q3) = (self.q0, self.q1, self.q2, self.q3);
        -atan2f(q0 * q3 + q1 * q2, 0.5 - (q2 * q2 + q3 * q3))
    }

    /// [w, x, y, z]
    pub fn get_quaternion(&self) -> [f32; 4] {
        [self.q0, self.q1, self.q2, self.q3]
    }
}

impl Default for BalanceFilter {
    fn default() -> Self {
        Self::new()
    }
}
