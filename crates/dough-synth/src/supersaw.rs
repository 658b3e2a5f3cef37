//! Detuned saw stack.
//!
//! `voices` PolyBLEP saws spread evenly over `±detune / 2` semitones and
//! panned evenly over the stereo `spread`. Start phases are scattered from a
//! fixed seed so the stack does not start with a click-like peak.

use core::any::Any;

use dough_core::{
    AudioNode, NodeKind, NodeState, ParamSpec, ProcessContext, StereoBlock, cents_to_ratio,
    equal_power_pan, poly_blep, semitones_to_ratio, wrap_phase,
};
use libm::sqrtf;

const SUPERSAW_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("frequency", 440.0, -1.0e6, 1.0e6),
    ParamSpec::new("detune", 0.0, -1.0e6, 1.0e6),
    ParamSpec::new("spread", 0.18, 0.0, 48.0),
];

/// Upper bound on stacked voices.
pub const MAX_UNISON: usize = 100;

/// Supersaw source. `detune` is in cents (global pitch offset), `spread` in
/// semitones (width of the detune fan).
#[derive(Debug, Clone)]
pub struct SupersawNode {
    sample_rate: f32,
    phases: Vec<f32>,
    pans: Vec<(f32, f32)>,
    offsets: Vec<f32>,
    stereo_spread: f32,
}

impl SupersawNode {
    /// A stack of `voices` saws over `stereo_spread` (0 = mono, 1 = full width).
    pub fn new(sample_rate: f32, voices: usize, stereo_spread: f32) -> Self {
        let mut node = Self {
            sample_rate,
            phases: Vec::new(),
            pans: Vec::new(),
            offsets: Vec::new(),
            stereo_spread,
        };
        node.set_voices(voices);
        node
    }

    /// Number of stacked saws.
    pub fn voices(&self) -> usize {
        self.phases.len()
    }

    /// Rebuild the stack with `voices` saws.
    pub fn set_voices(&mut self, voices: usize) {
        let voices = voices.clamp(1, MAX_UNISON);
        let spread = self.stereo_spread.clamp(0.0, 1.0);
        self.offsets = (0..voices)
            .map(|v| {
                if voices == 1 {
                    0.0
                } else {
                    v as f32 / (voices - 1) as f32 - 0.5
                }
            })
            .collect();
        self.pans = self
            .offsets
            .iter()
            .map(|&o| equal_power_pan(2.0 * o * spread))
            .collect();
        self.reset_phases();
    }

    fn reset_phases(&mut self) {
        let mut seed: u32 = 0x9E37_79B9;
        self.phases = (0..self.offsets.len())
            .map(|_| {
                seed ^= seed << 13;
                seed ^= seed >> 17;
                seed ^= seed << 5;
                (seed >> 8) as f32 / (1u32 << 24) as f32
            })
            .collect();
    }
}

impl AudioNode for SupersawNode {
    fn kind(&self) -> NodeKind {
        NodeKind::Supersaw
    }

    fn params(&self) -> &'static [ParamSpec] {
        SUPERSAW_PARAMS
    }

    fn process(
        &mut self,
        ctx: &ProcessContext<'_>,
        _input: &StereoBlock,
        output: &mut StereoBlock,
    ) -> NodeState {
        let frequency = ctx.param(0);
        let detune = ctx.param(1);
        let spread = ctx.param(2);
        let norm = 1.0 / sqrtf(self.phases.len() as f32);
        for i in ctx.span.clone() {
            let base = frequency[i] * cents_to_ratio(detune[i]);
            let (mut l, mut r) = (0.0, 0.0);
            for ((phase, &offset), &(gl, gr)) in
                self.phases.iter_mut().zip(&self.offsets).zip(&self.pans)
            {
                let f = base * semitones_to_ratio(offset * spread[i]);
                let dt = f / self.sample_rate;
                let y = 2.0 * *phase - 1.0 - poly_blep(*phase, dt.abs());
                *phase = wrap_phase(*phase + dt);
                l += y * gl;
                r += y * gr;
            }
            output.left[i] = l * norm;
            output.right[i] = r * norm;
        }
        NodeState::Active
    }

    fn reset(&mut self) {
        self.reset_phases();
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

    #[test]
    fn test_voice_offsets_symmetric() {
        let node = SupersawNode::new(48000.0, 5, 0.6);
        assert_eq!(node.voices(), 5);
        assert!((node.offsets[0] + 0.5).abs() < 1e-6);
        assert!((node.offsets[4] - 0.5).abs() < 1e-6);
        assert!(node.offsets[2].abs() < 1e-6);
    }

    #[test]
    fn test_voice_count_clamped() {
        let node = SupersawNode::new(48000.0, 0, 0.0);
        assert_eq!(node.voices(), 1);
    }

    #[test]
    fn test_phases_in_range() {
        let node = SupersawNode::new(48000.0, 7, 0.5);
        assert!(node.phases.iter().all(|p| (0.0..1.0).contains(p)));
    }
}
