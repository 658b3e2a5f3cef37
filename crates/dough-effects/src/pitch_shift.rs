//! Phase-vocoder pitch shifter.
//!
//! # Theory
//!
//! The input is cut into Hann-windowed frames of [`FRAME`] samples with
//! 4x overlap. For each frame and bin the true frequency is recovered from
//! the phase advance since the previous frame:
//!
//! ```text
//! dphi  = phase[k] - last_phase[k] - k · 2π · hop / N     (wrapped to ±π)
//! freq  = (k + dphi · osamp / 2π) · sr / N
//! ```
//!
//! Shifting moves each bin's magnitude to bin `k · ratio` and scales its
//! frequency by `ratio`; synthesis re-accumulates phase from the shifted
//! frequencies, inverse-transforms and overlap-adds. Latency is
//! `FRAME - hop` samples.

use core::any::Any;
use core::f32::consts::{PI, TAU};

use dough_core::{
    AudioNode, NodeKind, NodeState, ParamSpec, ProcessContext, StereoBlock, semitones_to_ratio,
};
use libm::roundf;
use rustfft::num_complex::Complex;

use crate::spectral::{FftPair, Window};

/// Analysis frame length.
pub const FRAME: usize = 2048;
const OVERSAMPLE: usize = 4;
const HOP: usize = FRAME / OVERSAMPLE;
/// Input-to-output delay in samples.
pub const LATENCY: usize = FRAME - HOP;
const BINS: usize = FRAME / 2 + 1;
// Hann² summed over four hops
const OVERLAP_GAIN: f32 = 1.5;

const PITCH_SHIFT_PARAMS: &[ParamSpec] = &[ParamSpec::new("shift", 0.0, -48.0, 48.0)];

/// One channel of vocoder state.
struct Vocoder {
    in_fifo: Vec<f32>,
    out_fifo: Vec<f32>,
    accum: Vec<f32>,
    last_phase: Vec<f32>,
    sum_phase: Vec<f32>,
    ana_magn: Vec<f32>,
    ana_freq: Vec<f32>,
    syn_magn: Vec<f32>,
    syn_freq: Vec<f32>,
    rover: usize,
}

impl Vocoder {
    fn new() -> Self {
        Self {
            in_fifo: vec![0.0; FRAME],
            out_fifo: vec![0.0; HOP],
            accum: vec![0.0; 2 * FRAME],
            last_phase: vec![0.0; BINS],
            sum_phase: vec![0.0; BINS],
            ana_magn: vec![0.0; BINS],
            ana_freq: vec![0.0; BINS],
            syn_magn: vec![0.0; BINS],
            syn_freq: vec![0.0; BINS],
            rover: LATENCY,
        }
    }

    fn clear(&mut self) {
        for buf in [
            &mut self.in_fifo,
            &mut self.out_fifo,
            &mut self.accum,
            &mut self.last_phase,
            &mut self.sum_phase,
        ] {
            buf.fill(0.0);
        }
        self.rover = LATENCY;
    }

    #[inline]
    fn process(&mut self, input: f32, ratio: f32, shared: &mut Shared) -> f32 {
        self.in_fifo[self.rover] = input;
        let out = self.out_fifo[self.rover - LATENCY];
        self.rover += 1;
        if self.rover >= FRAME {
            self.rover = LATENCY;
            self.frame(ratio, shared);
        }
        out
    }

    fn frame(&mut self, ratio: f32, shared: &mut Shared) {
        let Shared {
            fft,
            window,
            work,
            sample_rate,
        } = shared;
        let bin_hz = *sample_rate / FRAME as f32;
        let expected = TAU * HOP as f32 / FRAME as f32;

        for ((dst, &x), &w) in work.iter_mut().zip(&self.in_fifo).zip(window.iter()) {
            *dst = Complex::new(x * w, 0.0);
        }
        fft.forward(work);

        for k in 0..BINS {
            let (magn, phase) = work[k].to_polar();
            let mut delta = phase - self.last_phase[k] - k as f32 * expected;
            self.last_phase[k] = phase;
            delta -= TAU * roundf(delta / TAU);
            self.ana_magn[k] = magn;
            self.ana_freq[k] = (k as f32 + delta * OVERSAMPLE as f32 / TAU) * bin_hz;
        }

        self.syn_magn.fill(0.0);
        self.syn_freq.fill(0.0);
        for k in 0..BINS {
            let index = (k as f32 * ratio) as usize;
            if index < BINS {
                self.syn_magn[index] += self.ana_magn[k];
                self.syn_freq[index] = self.ana_freq[k] * ratio;
            }
        }

        for k in 0..BINS {
            let deviation = self.syn_freq[k] / bin_hz - k as f32;
            self.sum_phase[k] += TAU * deviation / OVERSAMPLE as f32 + k as f32 * expected;
            // keep the accumulator small so f32 phase stays precise
            self.sum_phase[k] -= TAU * roundf(self.sum_phase[k] / TAU);
            work[k] = Complex::from_polar(self.syn_magn[k], self.sum_phase[k]);
        }
        for k in BINS..FRAME {
            work[k] = work[FRAME - k].conj();
        }
        fft.inverse(work);

        for ((acc, c), &w) in self.accum.iter_mut().zip(work.iter()).zip(window.iter()) {
            *acc += w * c.re / OVERLAP_GAIN;
        }
        self.out_fifo.copy_from_slice(&self.accum[..HOP]);
        self.accum.copy_within(HOP.., 0);
        let len = self.accum.len();
        self.accum[len - HOP..].fill(0.0);
        self.in_fifo.copy_within(HOP.., 0);
    }
}

struct Shared {
    fft: FftPair,
    window: Vec<f32>,
    work: Vec<Complex<f32>>,
    sample_rate: f32,
}

/// Stereo pitch shifter, `shift` in semitones.
pub struct PitchShiftNode {
    left: Vocoder,
    right: Vocoder,
    shared: Shared,
}

impl PitchShiftNode {
    /// Pitch shifter with cleared state.
    pub fn new(sample_rate: f32) -> Self {
        Self {
            left: Vocoder::new(),
            right: Vocoder::new(),
            shared: Shared {
                fft: FftPair::new(FRAME),
                window: Window::Hann.coefficients(FRAME),
                work: vec![Complex::new(0.0, 0.0); FRAME],
                sample_rate,
            },
        }
    }
}

impl AudioNode for PitchShiftNode {
    fn kind(&self) -> NodeKind {
        NodeKind::PitchShift
    }

    fn params(&self) -> &'static [ParamSpec] {
        PITCH_SHIFT_PARAMS
    }

    fn process(
        &mut self,
        ctx: &ProcessContext<'_>,
        input: &StereoBlock,
        output: &mut StereoBlock,
    ) -> NodeState {
        let shift = ctx.param(0);
        for i in ctx.span.clone() {
            let ratio = semitones_to_ratio(shift[i]);
            output.left[i] = self.left.process(input.left[i], ratio, &mut self.shared);
            output.right[i] = self.right.process(input.right[i], ratio, &mut self.shared);
        }
        NodeState::Active
    }

    fn reset(&mut self) {
        self.left.clear();
        self.right.clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crossings(samples: &[f32]) -> usize {
        samples
            .windows(2)
            .filter(|w| (w[0] < 0.0) != (w[1] < 0.0))
            .count()
    }

    fn shifted(semitones: f32) -> Vec<f32> {
        let frames = 48000;
        let lanes = vec![semitones; frames];
        let mut input = StereoBlock::new(frames);
        for i in 0..frames {
            let s = 0.5 * libm::sinf(2.0 * PI * 440.0 * i as f32 / 48000.0);
            input.left[i] = s;
            input.right[i] = s;
        }
        let ctx = ProcessContext::new(48000.0, 0.0, frames, 0..frames, &lanes);
        let mut out = StereoBlock::new(frames);
        PitchShiftNode::new(48000.0).process(&ctx, &input, &mut out);
        out.left[24000..].to_vec()
    }

    #[test]
    fn test_zero_shift_keeps_pitch_and_level() {
        let out = shifted(0.0);
        let c = crossings(&out) as f32;
        assert!((c - 440.0).abs() < 10.0, "crossings {c}");
        let peak = out.iter().fold(0.0f32, |a, s| a.max(s.abs()));
        assert!((peak - 0.5).abs() < 0.05, "peak {peak}");
    }

    #[test]
    fn test_octave_up_doubles_frequency() {
        let c = crossings(&shifted(12.0)) as f32;
        assert!((c - 880.0).abs() < 40.0, "crossings {c}");
    }
}
