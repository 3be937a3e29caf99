//! Scalar smoothing filters
//!
//! EMA, biquad and moving-average primitives plus the three-stage
//! smoothed setpoint used by every tilt sub-controller.

pub mod biquad;
pub mod ema;
pub mod sma;
pub mod smooth_setpoint;

pub use biquad::{Biquad, BiquadType};
pub use ema::Ema;
pub use sma::Sma;
pub use smooth_setpoint::{ShaperTuning, SmoothSetpoint, TrajectoryShaper};
