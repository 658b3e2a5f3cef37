//! Mathematical utility functions for DSP.
//!
//! Allocation-free helpers shared by the generators, the effects and the
//! event compiler.
//!
//! # Level and Pitch Conversions
//!
//! - [`db_to_linear`] / [`linear_to_db`] - Convert between dB and linear gain
//! - [`midi_to_freq`] / [`freq_to_midi`] - Equal-tempered pitch, A4 = 440 Hz
//! - [`cents_to_ratio`] / [`semitones_to_ratio`] - Pitch offsets as frequency ratios
//!
//! # Curves
//!
//! - [`warp`] - Curvature-warped phase used by envelopes and parameter sweeps
//! - [`signed_pow`] - Sign-preserving power used for generator output curves
//!
//! # Utilities
//!
//! - [`wrap_phase`] - Keep a normalized phase in `[0, 1)`
//! - [`poly_blep`] - Polynomial band-limited step residual for edge smoothing
//! - [`equal_power_pan`] - Constant-power stereo gains
//! - [`flush_denormal`] - Zero out denormals in feedback paths

use libm::{expf, floorf, log10f, log2f, powf};

/// Convert decibels to linear gain.
///
/// # Example
/// ```rust
/// use dough_core::db_to_linear;
///
/// assert!((db_to_linear(0.0) - 1.0).abs() < 0.001);
/// assert!((db_to_linear(-6.02) - 0.5).abs() < 0.01);
/// ```
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    powf(10.0, db / 20.0)
}

/// Convert linear gain to decibels.
///
/// Values at or below zero are clamped to -200 dB.
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    if linear <= 1e-10 {
        -200.0
    } else {
        20.0 * log10f(linear)
    }
}

/// Convert a (possibly fractional) MIDI note number to frequency in Hz.
///
/// ```rust
/// use dough_core::midi_to_freq;
///
/// assert!((midi_to_freq(69.0) - 440.0).abs() < 1e-3);
/// ```
#[inline]
pub fn midi_to_freq(note: f32) -> f32 {
    440.0 * powf(2.0, (note - 69.0) / 12.0)
}

/// Convert frequency in Hz to a fractional MIDI note number.
#[inline]
pub fn freq_to_midi(freq: f32) -> f32 {
    69.0 + 12.0 * log2f(freq / 440.0)
}

/// Convert cents to a frequency ratio (100 cents = 1 semitone).
#[inline]
pub fn cents_to_ratio(cents: f32) -> f32 {
    powf(2.0, cents / 1200.0)
}

/// Convert semitones to a frequency ratio.
#[inline]
pub fn semitones_to_ratio(semitones: f32) -> f32 {
    powf(2.0, semitones / 12.0)
}

/// Warp a normalized phase by a curvature amount.
///
/// `curvature > 0` front-loads the change (fast start, slow finish),
/// `curvature < 0` back-loads it, `0` is linear. The endpoints are fixed:
/// `warp(0, c) == 0` and `warp(1, c) == 1` for every `c`.
///
/// ```rust
/// use dough_core::warp;
///
/// assert_eq!(warp(0.5, 0.0), 0.5);
/// assert!(warp(0.5, 4.0) > 0.5);
/// assert!(warp(0.5, -4.0) < 0.5);
/// ```
#[inline]
pub fn warp(phase: f32, curvature: f32) -> f32 {
    let x = phase.clamp(0.0, 1.0);
    if curvature.abs() < 1e-4 {
        return x;
    }
    (1.0 - expf(-curvature * x)) / (1.0 - expf(-curvature))
}

/// Sign-preserving power: `sign(x) * |x|^exponent`.
#[inline]
pub fn signed_pow(x: f32, exponent: f32) -> f32 {
    if exponent == 1.0 {
        return x;
    }
    let magnitude = powf(x.abs(), exponent);
    if x < 0.0 { -magnitude } else { magnitude }
}

/// Wrap a phase into `[0, 1)`.
#[inline]
pub fn wrap_phase(phase: f32) -> f32 {
    let wrapped = phase - floorf(phase);
    // tiny negative inputs round up to exactly 1.0
    if wrapped >= 1.0 { 0.0 } else { wrapped }
}

/// PolyBLEP residual for a discontinuity at phase 0.
///
/// `t` is the current phase in `[0, 1)`, `dt` the phase increment per sample.
/// Subtracting the residual from a naive saw rounds off the reset edge.
#[inline]
pub fn poly_blep(t: f32, dt: f32) -> f32 {
    if dt <= 0.0 {
        return 0.0;
    }
    if t < dt {
        let x = t / dt;
        x + x - x * x - 1.0
    } else if t > 1.0 - dt {
        let x = (t - 1.0) / dt;
        x * x + x + x + 1.0
    } else {
        0.0
    }
}

/// Constant-power pan gains for `pan` in `[-1, 1]` (0 = centre).
#[inline]
pub fn equal_power_pan(pan: f32) -> (f32, f32) {
    let p = (pan.clamp(-1.0, 1.0) + 1.0) * 0.5;
    let angle = p * core::f32::consts::FRAC_PI_2;
    (libm::cosf(angle), libm::sinf(angle))
}

/// Flush denormal floats to zero.
///
/// Feedback paths (delay, reverb tails, filter state) decay into the
/// denormal range, which is very slow on some CPUs.
#[inline]
pub fn flush_denormal(x: f32) -> f32 {
    if x.abs() < 1e-20 { 0.0 } else { x }
}
