//! ライド状態
//!
//! 上位のステートマシン（ホスト側）が所有し、このコアが読み書きする状態のみを定義します。

/// Top-level run state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RunState {
    Disabled,
    Startup,
    Ready,
    Running,
}

/// Riding mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    Normal,
    /// Board held upside down and spun as a flywheel
    Flywheel,
}

/// Reason the base setpoint is being adjusted (pushback / centering)
///
/// Pushback reasons are detected by the host; this core only shapes the
/// resulting tilt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SetpointAdjustmentType {
    None,
    /// Bringing the nose from the engage angle back to level
    Centering,
    ReverseStop,
    PbDuty,
    PbHighVoltage,
    PbLowVoltage,
    PbTemperature,
    PbBmsConnection,
}

/// State shared with the host state machine
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RideState {
    pub run_state: RunState,
    pub mode: Mode,
    pub sat: SetpointAdjustmentType,
    /// Traction loss, set and cleared by the wheelslip detector
    pub wheelslip: bool,
    /// Riding upside down
    pub darkride: bool,
    /// Freewheel (zero current) while traction is lost in darkride
    pub traction_control: bool,
    /// Set by reverse stop when the board should disengage
    pub stop_requested: bool,
}

impl RideState {
    pub const fn new() -> Self {
        Self {
            run_state: RunState::Startup,
            mode: Mode::Normal,
            sat: SetpointAdjustmentType::None,
            wheelslip: false,
            darkride: false,
            traction_control: false,
            stop_requested: false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.run_state == RunState::Running
    }
}

impl Default for RideState {
    fn default() -> Self {
        Self::new()
    }
}
