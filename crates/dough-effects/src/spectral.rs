//! FFT plumbing shared by the convolution reverb, the phase vocoder and the
//! analyser: window functions and an allocation-free in-place FFT pair.

use std::f32::consts::PI;
use std::sync::Arc;

use rustfft::{Fft, FftPlanner, num_complex::Complex};

/// Window function types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    /// Rectangular (no windowing).
    Rectangular,
    /// Periodic Hann window (raised cosine).
    Hann,
    /// Blackman window.
    Blackman,
}

impl Window {
    /// Window coefficients for `size` points.
    pub fn coefficients(self, size: usize) -> Vec<f32> {
        let n = size as f32;
        (0..size)
            .map(|i| {
                let x = 2.0 * PI * i as f32 / n;
                match self {
                    Self::Rectangular => 1.0,
                    Self::Hann => 0.5 * (1.0 - x.cos()),
                    Self::Blackman => 0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos(),
                }
            })
            .collect()
    }
}

/// Forward and inverse plans of one size plus their scratch space.
///
/// Unlike `Fft::process`, nothing here allocates after construction, so it
/// is safe to call from a node's `process`.
pub struct FftPair {
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    scratch: Vec<Complex<f32>>,
    size: usize,
}

impl FftPair {
    /// Plan both directions for `size` points.
    pub fn new(size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(size);
        let inverse = planner.plan_fft_inverse(size);
        let scratch_len = forward
            .get_inplace_scratch_len()
            .max(inverse.get_inplace_scratch_len());
        Self {
            forward,
            inverse,
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
            size,
        }
    }

    /// Transform size.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Unnormalized forward transform in place.
    pub fn forward(&mut self, buffer: &mut [Complex<f32>]) {
        self.forward.process_with_scratch(buffer, &mut self.scratch);
    }

    /// Inverse transform in place, normalized by `1 / size`.
    pub fn inverse(&mut self, buffer: &mut [Complex<f32>]) {
        self.inverse.process_with_scratch(buffer, &mut self.scratch);
        let scale = 1.0 / self.size as f32;
        for c in buffer.iter_mut() {
            *c *= scale;
        }
    }
}

/// Magnitude spectrum in dB of the first `bins` bins.
pub fn magnitude_db(spectrum: &[Complex<f32>], bins: usize) -> Vec<f32> {
    spectrum
        .iter()
        .take(bins)
        .map(|c| 20.0 * c.norm().max(1e-10).log10())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fft_roundtrip() {
        let mut fft = FftPair::new(256);
        let input: Vec<f32> = (0..256)
            .map(|i| (2.0 * PI * 10.0 * i as f32 / 256.0).sin())
            .collect();
        let mut buffer: Vec<Complex<f32>> = input.iter().map(|&x| Complex::new(x, 0.0)).collect();
        fft.forward(&mut buffer);
        assert!(buffer[10].norm() > 100.0);
        fft.inverse(&mut buffer);
        for (a, b) in input.iter().zip(&buffer) {
            assert!((a - b.re).abs() < 1e-3);
        }
    }

    #[test]
    fn test_hann_sums_flat_at_quarter_hop() {
        let w = Window::Hann.coefficients(64);
        for n in 0..16 {
            let sum: f32 = (0..4).map(|k| w[n + 16 * k] * w[n + 16 * k]).sum();
            assert!((sum - 1.5).abs() < 1e-4);
        }
    }
}
