//! Convolution reverb over a generated noise impulse response.
//!
//! # Impulse Response
//!
//! Each channel gets its own white-noise tail shaped by
//!
//! - an exponential decay reaching -60 dB after `size` seconds,
//! - a linear fade-in over the first `fade` seconds,
//! - a low-pass whose cutoff glides exponentially from `lp` to `dim` Hz
//!   over the tail, so the room darkens as it decays.
//!
//! # Convolution
//!
//! Uniformly partitioned overlap-save: the response is cut into
//! [`PARTITION`]-sample pieces whose spectra are multiplied against a
//! frequency-domain delay line of past input blocks. Latency is one
//! partition; cost per sample grows with the number of partitions, not the
//! response length squared.

use core::any::Any;

use dough_core::{AudioNode, Biquad, BiquadKind, NodeKind, NodeState, ProcessContext, StereoBlock};
use libm::powf;
use rustfft::num_complex::Complex;

use crate::spectral::FftPair;

/// Samples per convolution partition.
pub const PARTITION: usize = 512;

const ZERO: Complex<f32> = Complex { re: 0.0, im: 0.0 };

/// Room settings the impulse response is generated from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReverbSettings {
    /// Tail length in seconds (time to -60 dB).
    pub size: f32,
    /// Fade-in time in seconds.
    pub fade: f32,
    /// Low-pass cutoff at the start of the tail, Hz.
    pub lp: f32,
    /// Low-pass cutoff at the end of the tail, Hz.
    pub dim: f32,
}

impl Default for ReverbSettings {
    fn default() -> Self {
        Self {
            size: 2.0,
            fade: 0.1,
            lp: 15000.0,
            dim: 1000.0,
        }
    }
}

/// Generate one channel of impulse response.
pub fn generate_impulse(sample_rate: f32, settings: &ReverbSettings, seed: u32) -> Vec<f32> {
    let size = settings.size.max(0.01);
    let len = ((size * sample_rate) as usize).max(1);
    let fade = settings.fade.max(0.0);
    let lp = settings.lp.clamp(20.0, sample_rate * 0.49);
    let dim = settings.dim.clamp(20.0, sample_rate * 0.49);

    let mut state = seed.max(1);
    let mut filter = Biquad::new();
    let mut ir = Vec::with_capacity(len);
    for n in 0..len {
        let t = n as f32 / sample_rate;
        if n % 64 == 0 {
            let cutoff = lp * powf(dim / lp, t / size);
            let q = core::f32::consts::FRAC_1_SQRT_2;
            filter.set(BiquadKind::Lowpass.coefficients(cutoff, q, sample_rate));
        }
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        let noise = (state as i32 as f32) / (i32::MAX as f32);
        let decay = powf(10.0, -3.0 * t / size);
        let fade_in = if fade > 0.0 && t < fade { t / fade } else { 1.0 };
        ir.push(filter.process(noise * decay * fade_in));
    }
    ir
}

/// Uniformly partitioned overlap-save convolver, one channel.
pub struct PartitionedConvolver {
    fft: FftPair,
    ir_spectra: Vec<Vec<Complex<f32>>>,
    history: Vec<Vec<Complex<f32>>>,
    head: usize,
    frame: Vec<f32>,
    fill: usize,
    ready: Vec<f32>,
    work: Vec<Complex<f32>>,
    accum: Vec<Complex<f32>>,
}

impl PartitionedConvolver {
    /// Convolver for `impulse`. An empty impulse yields silence.
    pub fn new(impulse: &[f32]) -> Self {
        let size = 2 * PARTITION;
        let mut fft = FftPair::new(size);
        let ir_spectra: Vec<Vec<Complex<f32>>> = impulse
            .chunks(PARTITION)
            .map(|chunk| {
                let mut spectrum = vec![ZERO; size];
                for (dst, &s) in spectrum.iter_mut().zip(chunk) {
                    dst.re = s;
                }
                fft.forward(&mut spectrum);
                spectrum
            })
            .collect();
        let history = vec![vec![ZERO; size]; ir_spectra.len()];
        Self {
            fft,
            ir_spectra,
            history,
            head: 0,
            frame: vec![0.0; size],
            fill: 0,
            ready: vec![0.0; PARTITION],
            work: vec![ZERO; size],
            accum: vec![ZERO; size],
        }
    }

    /// Number of partitions in the response.
    pub fn partitions(&self) -> usize {
        self.ir_spectra.len()
    }

    /// Push one input sample, pop one output sample (delayed by [`PARTITION`]).
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let out = self.ready[self.fill];
        self.frame[PARTITION + self.fill] = input;
        self.fill += 1;
        if self.fill == PARTITION {
            self.fill = 0;
            self.run_partition();
        }
        out
    }

    fn run_partition(&mut self) {
        let count = self.ir_spectra.len();
        if count == 0 {
            self.ready.fill(0.0);
            return;
        }
        for (dst, &s) in self.work.iter_mut().zip(&self.frame) {
            *dst = Complex::new(s, 0.0);
        }
        self.fft.forward(&mut self.work);
        self.history[self.head].copy_from_slice(&self.work);

        self.accum.fill(ZERO);
        for (k, h) in self.ir_spectra.iter().enumerate() {
            let x = &self.history[(self.head + count - k) % count];
            for ((acc, a), b) in self.accum.iter_mut().zip(x).zip(h) {
                *acc += a * b;
            }
        }
        self.fft.inverse(&mut self.accum);
        for (dst, c) in self.ready.iter_mut().zip(&self.accum[PARTITION..]) {
            *dst = c.re;
        }
        self.frame.copy_within(PARTITION.., 0);
        self.head = (self.head + 1) % count;
    }

    /// Clear all signal history, keeping the response.
    pub fn clear(&mut self) {
        for h in &mut self.history {
            h.fill(ZERO);
        }
        self.frame.fill(0.0);
        self.ready.fill(0.0);
        self.fill = 0;
        self.head = 0;
    }
}

/// Stereo convolution reverb node. Outputs only the wet signal.
pub struct ReverbNode {
    sample_rate: f32,
    settings: Option<ReverbSettings>,
    left: PartitionedConvolver,
    right: PartitionedConvolver,
    generations: u32,
}

impl ReverbNode {
    /// Silent reverb; call [`configure`](Self::configure) to build a room.
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            settings: None,
            left: PartitionedConvolver::new(&[]),
            right: PartitionedConvolver::new(&[]),
            generations: 0,
        }
    }

    /// Regenerate the impulse response if `settings` differ from the last
    /// ones. Returns `true` when it regenerated.
    pub fn configure(&mut self, settings: ReverbSettings) -> bool {
        if self.settings == Some(settings) {
            return false;
        }
        let left = generate_impulse(self.sample_rate, &settings, 0x1234_5678);
        let right = generate_impulse(self.sample_rate, &settings, 0x0BAD_F00D);
        self.set_impulse(&left, &right);
        self.settings = Some(settings);
        true
    }

    /// Install a custom stereo impulse response.
    pub fn set_impulse(&mut self, left: &[f32], right: &[f32]) {
        self.left = PartitionedConvolver::new(left);
        self.right = PartitionedConvolver::new(right);
        self.settings = None;
        self.generations += 1;
    }

    /// Settings of the generated response in use, if any.
    pub fn settings(&self) -> Option<ReverbSettings> {
        self.settings
    }

    /// How many times a response has been installed.
    pub fn generations(&self) -> u32 {
        self.generations
    }
}

impl AudioNode for ReverbNode {
    fn kind(&self) -> NodeKind {
        NodeKind::Reverb
    }

    fn process(
        &mut self,
        ctx: &ProcessContext<'_>,
        input: &StereoBlock,
        output: &mut StereoBlock,
    ) -> NodeState {
        for i in ctx.span.clone() {
            output.left[i] = self.left.process(input.left[i]);
            output.right[i] = self.right.process(input.right[i]);
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
