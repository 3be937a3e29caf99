//! Balance-control core for a self-balancing one-wheel vehicle
//!
//! The host calls [`BalanceController::tick`] from a fixed-rate timer with the
//! IMU and motor samples of that tick. The core estimates the board attitude,
//! shapes a lean setpoint from the tilt sub-controllers and turns the lean
//! error into a single motor directive.
//!
//! ```text
//! sensors -> orientation + motor data -> tilt sub-controllers -> setpoint
//!         -> PID + booster -> MotorCommand -> MotorDriver (host)
//! ```
#![cfg_attr(not(test), no_std)]

// fmt must come first so the logging macros are visible everywhere
mod fmt;

pub mod config;
pub mod controller;
pub mod filters;
pub mod frequency_tracker;
pub mod math;
pub mod motor;
pub mod orientation;
pub mod stabilizer;
pub mod state;
pub mod tilt;

pub use config::{BalanceConfig, ConfigError, ConfigSignal, ParkingBrakeMode, RemoteType};
pub use controller::{BalanceController, Telemetry, TickInput};
pub use motor::{MotorCommand, MotorDriver, MotorSample};
pub use orientation::ImuSample;
pub use state::{Mode, RideState, RunState, SetpointAdjustmentType};
pub use tilt::{RemoteReading, RemoteSample};
