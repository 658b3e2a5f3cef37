//! Biquad (bi-quadratic) filter section.
//!
//! A second-order IIR filter plus the RBJ Audio EQ Cookbook coefficient
//! formulas for the response types the filter stages need.
//! [`BiquadKind::coefficients`] dispatches over them so a node can hold the
//! kind as data and recompute on every frequency change.

use core::f32::consts::PI;
use libm::{cosf, sinf};

/// Raw `(b0, b1, b2, a0, a1, a2)` coefficients, not yet normalized by `a0`.
pub type Coefficients = (f32, f32, f32, f32, f32, f32);

/// Response type of a biquad section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BiquadKind {
    /// 12 dB/oct low-pass.
    #[default]
    Lowpass,
    /// 12 dB/oct high-pass.
    Highpass,
    /// Band-pass with 0 dB peak gain.
    Bandpass,
    /// Band-reject.
    Notch,
    /// Unity-magnitude phase rotation (phaser stages).
    Allpass,
}

impl BiquadKind {
    /// Compute coefficients for this response type.
    pub fn coefficients(self, frequency: f32, q: f32, sample_rate: f32) -> Coefficients {
        match self {
            Self::Lowpass => lowpass_coefficients(frequency, q, sample_rate),
            Self::Highpass => highpass_coefficients(frequency, q, sample_rate),
            Self::Bandpass => bandpass_coefficients(frequency, q, sample_rate),
            Self::Notch => notch_coefficients(frequency, q, sample_rate),
            Self::Allpass => allpass_coefficients(frequency, q, sample_rate),
        }
    }

    /// Short lowercase name used in logs and graph introspection.
    pub fn name(self) -> &'static str {
        match self {
            Self::Lowpass => "lowpass",
            Self::Highpass => "highpass",
            Self::Bandpass => "bandpass",
            Self::Notch => "notch",
            Self::Allpass => "allpass",
        }
    }
}

/// Biquad coefficients and Direct Form I state.
///
/// ```text
/// y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2]
///                - a1*y[n-1] - a2*y[n-2]
/// ```
#[derive(Debug, Clone)]
pub struct Biquad {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,

    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl Biquad {
    /// Create a passthrough section (`y[n] = x[n]`).
    pub fn new() -> Self {
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    /// Set coefficients, normalizing by `a0`.
    pub fn set_coefficients(&mut self, b0: f32, b1: f32, b2: f32, a0: f32, a1: f32, a2: f32) {
        let a0_inv = 1.0 / a0;
        self.b0 = b0 * a0_inv;
        self.b1 = b1 * a0_inv;
        self.b2 = b2 * a0_inv;
        self.a1 = a1 * a0_inv;
        self.a2 = a2 * a0_inv;
    }

    /// Set coefficients from a [`Coefficients`] tuple.
    #[inline]
    pub fn set(&mut self, c: Coefficients) {
        self.set_coefficients(c.0, c.1, c.2, c.3, c.4, c.5);
    }

    /// Process one sample.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let output = self.b0 * input + self.b1 * self.x1 + self.b2 * self.x2
            - self.a1 * self.y1
            - self.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = crate::math::flush_denormal(output);

        output
    }

    /// Clear the delay lines, keeping coefficients.
    pub fn clear(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }
}

impl Default for Biquad {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn omega_terms(frequency: f32, q: f32, sample_rate: f32) -> (f32, f32) {
    let nyquist = sample_rate * 0.5;
    let f = frequency.clamp(1.0, nyquist * 0.999);
    let omega = 2.0 * PI * f / sample_rate;
    let alpha = sinf(omega) / (2.0 * q.max(1e-4));
    (cosf(omega), alpha)
}

/// Low-pass coefficients.
pub fn lowpass_coefficients(frequency: f32, q: f32, sample_rate: f32) -> Coefficients {
    let (cos_omega, alpha) = omega_terms(frequency, q, sample_rate);
    let b1 = 1.0 - cos_omega;
    (
        b1 / 2.0,
        b1,
        b1 / 2.0,
        1.0 + alpha,
        -2.0 * cos_omega,
        1.0 - alpha,
    )
}

/// High-pass coefficients.
pub fn highpass_coefficients(frequency: f32, q: f32, sample_rate: f32) -> Coefficients {
    let (cos_omega, alpha) = omega_terms(frequency, q, sample_rate);
    let b0 = (1.0 + cos_omega) / 2.0;
    (
        b0,
        -(1.0 + cos_omega),
        b0,
        1.0 + alpha,
        -2.0 * cos_omega,
        1.0 - alpha,
    )
}

/// Band-pass coefficients (0 dB peak gain).
pub fn bandpass_coefficients(frequency: f32, q: f32, sample_rate: f32) -> Coefficients {
    let (cos_omega, alpha) = omega_terms(frequency, q, sample_rate);
    (alpha, 0.0, -alpha, 1.0 + alpha, -2.0 * cos_omega, 1.0 - alpha)
}

/// Notch coefficients.
pub fn notch_coefficients(frequency: f32, q: f32, sample_rate: f32) -> Coefficients {
    let (cos_omega, alpha) = omega_terms(frequency, q, sample_rate);
    (
        1.0,
        -2.0 * cos_omega,
        1.0,
        1.0 + alpha,
        -2.0 * cos_omega,
        1.0 - alpha,
    )
}

/// All-pass coefficients.
pub fn allpass_coefficients(frequency: f32, q: f32, sample_rate: f32) -> Coefficients {
    let (cos_omega, alpha) = omega_terms(frequency, q, sample_rate);
    (
        1.0 - alpha,
        -2.0 * cos_omega,
        1.0 + alpha,
        1.0 + alpha,
        -2.0 * cos_omega,
        1.0 - alpha,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settle(kind: BiquadKind, freq: f32, input_freq: f32) -> f32 {
        let sr = 48000.0;
        let mut bq = Biquad::new();
        bq.set(kind.coefficients(freq, 0.707, sr));
        let mut peak = 0.0f32;
        for i in 0..9600 {
            let x = libm::sinf(2.0 * PI * input_freq * i as f32 / sr);
            let y = bq.process(x);
            if i > 4800 {
                peak = peak.max(y.abs());
            }
        }
        peak
    }

    #[test]
    fn test_passthrough_by_default() {
        let mut bq = Biquad::new();
        assert_eq!(bq.process(0.3), 0.3);
    }

    #[test]
    fn test_lowpass_attenuates_highs() {
        assert!(settle(BiquadKind::Lowpass, 500.0, 100.0) > 0.9);
        assert!(settle(BiquadKind::Lowpass, 500.0, 8000.0) < 0.05);
    }

    #[test]
    fn test_highpass_attenuates_lows() {
        assert!(settle(BiquadKind::Highpass, 2000.0, 100.0) < 0.05);
        assert!(settle(BiquadKind::Highpass, 2000.0, 10000.0) > 0.9);
    }

    #[test]
    fn test_allpass_keeps_magnitude() {
        let level = settle(BiquadKind::Allpass, 1000.0, 1000.0);
        assert!((level - 1.0).abs() < 0.02);
    }

    #[test]
    fn test_coefficients_survive_cutoff_above_nyquist() {
        let mut bq = Biquad::new();
        bq.set(BiquadKind::Lowpass.coefficients(40000.0, 1.0, 48000.0));
        for _ in 0..1000 {
            assert!(bq.process(1.0).is_finite());
        }
    }
}
