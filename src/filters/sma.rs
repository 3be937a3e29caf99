// Simple moving average with a fixed-capacity ring buffer

use libm::sqrtf;

/// Window length approximating a given -3dB cutoff
///
/// # Arguments
/// * `cutoff` - Cutoff frequency [Hz]
/// * `frequency` - Update frequency [Hz]
fn window_for(cutoff: f32, frequency: f32) -> usize {
    let fc = (cutoff / frequency.max(1.0)).max(1e-4);
    let n = sqrtf(0.196202 + fc * fc) / fc;
    n as usize
}

/// Simple moving average over at most `CAP` samples
///
/// The window may change at runtime (e.g. after a loop-frequency
/// recalibration); the change is applied when the ring wraps so the live
/// value can be corrected for the removed or added slots.
#[derive(Debug, Clone)]
pub struct Sma<const CAP: usize> {
    buffer: [f32; CAP],
    /// Active window length (1..=CAP)
    n: usize,
    /// Pending window length, 0 if none
    new_n: usize,
    idx: usize,
    configured: bool,
    /// Current average
    pub value: f32,
}

impl<const CAP: usize> Sma<CAP> {
    pub const fn new() -> Self {
        Self {
            buffer: [0.0; CAP],
            n: 1,
            new_n: 0,
            idx: 0,
            configured: false,
            value: 0.0,
        }
    }

    /// Set the window from a cutoff frequency
    pub fn configure(&mut self, cutoff: f32, frequency: f32) {
        let n = window_for(cutoff, frequency).clamp(1, CAP);
        if !self.configured {
            self.configured = true;
            self.n = n;
            self.reset();
        } else if n != self.n && self.new_n == 0 {
            self.new_n = n;
        }
    }

    pub fn reset(&mut self) {
        self.value = 0.0;
        self.idx = 0;
        self.buffer = [0.0; CAP];
    }

    /// Add a sample and return the new average
    pub fn update(&mut self, sample: f32) -> f32 {
        self.value += (sample - self.buffer[self.idx]) / self.n as f32;
        self.buffer[self.idx] = sample;

        if self.new_n > 0 && self.idx == self.n - 1 {
            if self.new_n < self.n {
                let removed: f32 = self.buffer[self.new_n..self.n].iter().sum();
                self.value -= removed / self.n as f32;
                self.value *= self.n as f32 / self.new_n as f32;
            } else {
                for slot in &mut self.buffer[self.n..self.new_n] {
                    *slot = self.value;
                }
            }
            self.n = self.new_n;
            self.new_n = 0;
        }

        self.idx += 1;
        if self.idx >= self.n {
            self.idx = 0;
        }
        self.value
    }

    pub fn get_window(&self) -> usize {
        self.n
    }
}

impl<const CAP: usize> Default for Sma<CAP> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-4;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < EPSILON
    }

    #[test]
    fn test_window_for_8hz_at_832hz() {
        // fc = 8/832 -> n ≈ 46
        assert_eq!(window_for(8.0, 832.0), 46);
    }

    #[test]
    fn test_average_of_window() {
        let mut sma: Sma<16> = Sma::new();
        sma.configure(1.0, 9.9);
        assert_eq!(sma.get_window(), 4);
        for x in [1.0, 2.0, 3.0, 4.0] {
            sma.update(x);
        }
        assert!(approx_eq(sma.value, 2.5));
        sma.update(5.0);
        assert!(approx_eq(sma.value, 3.5));
    }

    #[test]
    fn test_window_clamped_to_capacity() {
        let mut sma: Sma<8> = Sma::new();
        sma.configure(1.0, 10_000.0);
        assert_eq!(sma.get_window(), 8);
    }

    #[test]
    fn test_shrinking_window_keeps_average() {
        let mut sma: Sma<16> = Sma::new();
        sma.configure(1.0, 21.3);
        let n = sma.get_window();
        for _ in 0..n {
            sma.update(2.0);
        }
        sma.configure(1.0, 9.9);
        for _ in 0..(2 * n) {
            sma.update(2.0);
        }
        assert_eq!(sma.get_window(), 4);
        assert!(approx_eq(sma.value, 2.0));
    }

    #[test]
    fn test_growing_window_keeps_average() {
        let mut sma: Sma<16> = Sma::new();
        sma.configure(1.0, 9.9);
        for _ in 0..4 {
            sma.update(3.0);
        }
        sma.configure(1.0, 21.3);
        for _ in 0..20 {
            sma.update(3.0);
        }
        assert!(sma.get_window() > 4);
        assert!(approx_eq(sma.value, 3.0));
    }
}
