// Second-order IIR section (Butterworth-like, Q = 0.707)

use core::f32::consts::PI;
use libm::tanf;

const Q: f32 = 0.707;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BiquadType {
    LowPass,
    HighPass,
}

/// Biquad filter in transposed direct form II
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Biquad {
    a0: f32,
    a1: f32,
    a2: f32,
    b1: f32,
    b2: f32,
    z1: f32,
    z2: f32,
    /// Last output
    pub value: f32,
}

impl Biquad {
    /// Pass-through until configured
    pub const fn new() -> Self {
        Self {
            a0: 1.0,
            a1: 0.0,
            a2: 0.0,
            b1: 0.0,
            b2: 0.0,
            z1: 0.0,
            z2: 0.0,
            value: 0.0,
        }
    }

    /// Compute coefficients
    ///
    /// # Arguments
    /// * `kind` - Low-pass or high-pass
    /// * `cutoff` - Cutoff frequency [Hz]
    /// * `frequency` - Sample frequency [Hz]
    pub fn configure(&mut self, kind: BiquadType, cutoff: f32, frequency: f32) {
        // Nyquist未満に制限
        let fc = (cutoff / frequency.max(1.0)).clamp(1e-5, 0.49);
        let k = tanf(PI * fc);
        let norm = 1.0 / (1.0 + k / Q + k * k);

        match kind {
            BiquadType::LowPass => {
                self.a0 = k * k * norm;
                self.a1 = 2.0 * self.a0;
                self.a2 = self.a0;
            }
            BiquadType::HighPass => {
                self.a0 = norm;
                self.a1 = -2.0 * self.a0;
                self.a2 = self.a0;
            }
        }
        self.b1 = 2.0 * (k * k - 1.0) * norm;
        self.b2 = (1.0 - k / Q + k * k) * norm;
    }

    /// Seed the delay line so a constant input `value` produces a constant output
    pub fn reset(&mut self, value: f32) {
        self.value = value;
        self.z1 = value * (1.0 - self.a0);
        self.z2 = value * (self.a2 - self.b2);
    }

    #[inline]
    pub fn update(&mut self, sample: f32) -> f32 {
        let out = sample * self.a0 + self.z1;
        self.z1 = sample * self.a1 + self.z2 - self.b1 * out;
        self.z2 = sample * self.a2 - self.b2 * out;
        self.value = out;
        out
    }
}

impl Default for Biquad {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-3;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < EPSILON
    }

    #[test]
    fn test_lowpass_unity_dc_gain() {
        let mut bq = Biquad::new();
        bq.configure(BiquadType::LowPass, 5.0, 800.0);
        bq.reset(0.0);
        for _ in 0..8000 {
            bq.update(10.0);
        }
        assert!(approx_eq(bq.value, 10.0));
    }

    #[test]
    fn test_highpass_rejects_dc() {
        let mut bq = Biquad::new();
        bq.configure(BiquadType::HighPass, 5.0, 800.0);
        bq.reset(0.0);
        for _ in 0..8000 {
            bq.update(10.0);
        }
        assert!(approx_eq(bq.value, 0.0));
    }

    #[test]
    fn test_reset_is_steady_state() {
        let mut bq = Biquad::new();
        bq.configure(BiquadType::LowPass, 20.0, 1000.0);
        bq.reset(4.0);
        for _ in 0..10 {
            assert!(approx_eq(bq.update(4.0), 4.0));
        }
    }

    #[test]
    fn test_unconfigured_passes_through() {
        let mut bq = Biquad::new();
        assert_eq!(bq.update(7.5), 7.5);
    }
}
