// Exponential moving average (single-pole IIR low-pass)

use core::f32::consts::PI;

/// EMA coefficient for a cutoff frequency
///
/// `alpha = 1 - e^(-ω)` with `ω = 2π·cutoff/frequency`, replaced by its
/// second-order Taylor expansion. Cutoffs are always far below the loop rate.
///
/// # Arguments
/// * `cutoff` - Cutoff frequency [Hz]
/// * `frequency` - Update frequency [Hz]
pub fn alpha_for(cutoff: f32, frequency: f32) -> f32 {
    let omega = 2.0 * PI * cutoff / frequency.max(1.0);
    (omega - 0.5 * omega * omega).clamp(0.0, 1.0)
}

/// Exponential moving average
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ema {
    /// Filter coefficient (0.0-1.0)
    alpha: f32,
    /// Current output
    pub value: f32,
}

impl Ema {
    pub const fn new() -> Self {
        Self {
            alpha: 0.0,
            value: 0.0,
        }
    }

    /// Set the cutoff frequency
    ///
    /// # Arguments
    /// * `cutoff` - Cutoff frequency [Hz]
    /// * `frequency` - Update frequency [Hz]
    pub fn configure(&mut self, cutoff: f32, frequency: f32) {
        self.alpha = alpha_for(cutoff, frequency);
    }

    pub fn reset(&mut self, value: f32) {
        self.value = value;
    }

    /// Advance one sample and return the new output
    #[inline]
    pub fn update(&mut self, sample: f32) -> f32 {
        self.value += self.alpha * (sample - self.value);
        self.value
    }
}

impl Default for Ema {
    fn default() -> Self {
        Self::new()
    }
}
