//! Orientation estimation
//!
//! Quaternion AHRS fusion (Mahony) and the derived IMU angles consumed by the
//! stabilizer and the tilt sub-controllers.

pub mod balance_filter;
pub mod imu;

pub use balance_filter::BalanceFilter;
pub use imu::{Imu, ImuSample};
