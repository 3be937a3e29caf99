//! Motor state and actuation
//!
//! `motor_data` turns raw telemetry into the filtered quantities the
//! sub-controllers read; `wheelslip` watches them for loss of traction;
//! `motor_control` decides which directive reaches the host's actuation
//! primitives each tick.

pub mod motor_control;
pub mod motor_data;
pub mod wheelslip;

pub use motor_control::{MotorCommand, MotorControl, MotorDriver};
pub use motor_data::{MotorData, MotorSample};
pub use wheelslip::WheelslipDetector;
