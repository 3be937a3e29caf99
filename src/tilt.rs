//! Tilt sub-controllers
//!
//! Each one turns a physical cue into a lean-angle target [deg] and shapes it
//! through a [`TrajectoryShaper`](crate::filters::TrajectoryShaper). The
//! controller sums their outputs into the setpoint handed to the stabilizer.

pub mod atr;
pub mod brake_tilt;
pub mod remote;
pub mod reverse_stop;
pub mod setpoint_adjustment;
pub mod torque_tilt;
pub mod turn_tilt;

pub use atr::Atr;
pub use brake_tilt::BrakeTilt;
pub use remote::{Remote, RemoteReading, RemoteSample};
pub use reverse_stop::ReverseStop;
pub use setpoint_adjustment::{Noseangling, SetpointAdjustment};
pub use torque_tilt::TorqueTilt;
pub use turn_tilt::TurnTilt;

/// Per-tick decay of a raw target while its cue is unreliable (wheelslip)
pub(crate) const TARGET_DECAY: f32 = 0.99;

/// Per-tick decay of a shaped output while disengaged
pub(crate) const SETPOINT_DECAY: f32 = 0.995;
