//! Analysis tap.
//!
//! Passes audio through unchanged while keeping the most recent
//! `fft_size` mono samples for time- and frequency-domain snapshots.

use core::any::Any;

use dough_core::{AudioNode, NodeKind, NodeState, ProcessContext, StereoBlock};
use rustfft::num_complex::Complex;

use crate::spectral::{FftPair, Window, magnitude_db};

/// Snapshot domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyserDomain {
    /// Raw samples, oldest first.
    Time,
    /// Blackman-windowed magnitude spectrum in dB, `fft_size / 2` bins.
    Frequency,
}

impl AnalyserDomain {
    /// Parse `time` or `frequency`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "time" => Some(Self::Time),
            "frequency" => Some(Self::Frequency),
            _ => None,
        }
    }
}

/// Ring-buffered analysis tap.
#[derive(Debug, Clone)]
pub struct AnalyserNode {
    ring: Vec<f32>,
    pos: usize,
}

impl AnalyserNode {
    /// Tap holding `fft_size` samples (rounded up to a power of two, at least 32).
    pub fn new(fft_size: usize) -> Self {
        Self {
            ring: vec![0.0; fft_size.max(32).next_power_of_two()],
            pos: 0,
        }
    }

    /// Window length.
    pub fn fft_size(&self) -> usize {
        self.ring.len()
    }

    /// Latest `fft_size` samples, oldest first.
    pub fn time_domain(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.ring.len());
        out.extend_from_slice(&self.ring[self.pos..]);
        out.extend_from_slice(&self.ring[..self.pos]);
        out
    }

    /// Magnitude spectrum of the latest window in dB.
    pub fn frequency_domain(&self) -> Vec<f32> {
        let size = self.ring.len();
        let window = Window::Blackman.coefficients(size);
        let mut buffer: Vec<Complex<f32>> = self
            .time_domain()
            .iter()
            .zip(&window)
            .map(|(&x, &w)| Complex::new(x * w, 0.0))
            .collect();
        let mut fft = FftPair::new(size);
        fft.forward(&mut buffer);
        let scale = 1.0 / size as f32;
        for c in &mut buffer {
            *c *= scale;
        }
        magnitude_db(&buffer, size / 2)
    }

    /// Snapshot in either domain.
    pub fn snapshot(&self, domain: AnalyserDomain) -> Vec<f32> {
        match domain {
            AnalyserDomain::Time => self.time_domain(),
            AnalyserDomain::Frequency => self.frequency_domain(),
        }
    }
}

impl AudioNode for AnalyserNode {
    fn kind(&self) -> NodeKind {
        NodeKind::Analyser
    }

    fn process(
        &mut self,
        ctx: &ProcessContext<'_>,
        input: &StereoBlock,
        output: &mut StereoBlock,
    ) -> NodeState {
        for i in ctx.span.clone() {
            self.ring[self.pos] = input.mono_at(i);
            self.pos = (self.pos + 1) % self.ring.len();
            output.left[i] = input.left[i];
            output.right[i] = input.right[i];
        }
        NodeState::Active
    }

    fn reset(&mut self) {
        self.ring.fill(0.0);
        self.pos = 0;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
