//! Current stabilizer
//!
//! The PID turns the lean error into current; the booster adds extra current
//! when the board is pushed far past its setpoint.

pub mod booster;
pub mod pid;

pub use booster::Booster;
pub use pid::Pid;
