//! Phaser: a first-order allpass cascade swept by an internal sine LFO.
//!
//! The wet path is summed with the dry input, so every allpass stage pair
//! carves a notch that sweeps around `center` by up to `± sweep / 2` Hz.
//! The right channel's LFO runs a quarter cycle ahead for stereo width.

use core::any::Any;
use core::f32::consts::{PI, TAU};

use dough_core::{
    AudioNode, NodeKind, NodeState, ParamSpec, ProcessContext, StereoBlock, flush_denormal,
    wrap_phase,
};
use libm::{sinf, tanf};

const STAGES: usize = 4;
const COEFF_UPDATE_INTERVAL: u32 = 16;

const PHASER_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("rate", 1.0, 0.0, 100.0),
    ParamSpec::new("depth", 0.75, 0.0, 1.0),
    ParamSpec::new("center", 1000.0, 20.0, 20000.0),
    ParamSpec::new("sweep", 2000.0, 0.0, 20000.0),
];

/// Simple first-order allpass filter.
///
/// `y[n] = a * x[n] + x[n-1] - a * y[n-1]`
/// where `a = (tan(pi*fc/fs) - 1) / (tan(pi*fc/fs) + 1)`
#[derive(Debug, Clone, Copy, Default)]
struct FirstOrderAllpass {
    a: f32,
    x1: f32,
    y1: f32,
}

impl FirstOrderAllpass {
    #[inline]
    fn set_frequency(&mut self, freq: f32, sample_rate: f32) {
        let freq = freq.clamp(10.0, sample_rate * 0.4);
        let t = tanf(PI * freq / sample_rate);
        self.a = (t - 1.0) / (t + 1.0);
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let output = self.a * input + self.x1 - self.a * self.y1;
        self.x1 = input;
        self.y1 = flush_denormal(output);
        output
    }
}

/// Stereo phaser node.
///
/// ## Parameters
///
/// | Index | Name | Range | Default |
/// |-------|------|-------|---------|
/// | 0 | rate | 0–100 Hz | 1 |
/// | 1 | depth | 0–1 | 0.75 |
/// | 2 | center | 20–20000 Hz | 1000 |
/// | 3 | sweep | 0–20000 Hz | 2000 |
#[derive(Debug, Clone, Default)]
pub struct PhaserNode {
    left: [FirstOrderAllpass; STAGES],
    right: [FirstOrderAllpass; STAGES],
    phase: f32,
    counter: u32,
}

impl PhaserNode {
    /// Phaser with its LFO at phase zero.
    pub fn new() -> Self {
        Self::default()
    }

    fn retune(&mut self, center: f32, sweep: f32, sample_rate: f32) {
        let lfo_l = sinf(TAU * self.phase);
        let lfo_r = sinf(TAU * wrap_phase(self.phase + 0.25));
        for (k, (l, r)) in self.left.iter_mut().zip(self.right.iter_mut()).enumerate() {
            // spread the stages a little so the notches do not coincide
            let spread = 1.0 + k as f32 * 0.1;
            l.set_frequency((center + 0.5 * sweep * lfo_l) * spread, sample_rate);
            r.set_frequency((center + 0.5 * sweep * lfo_r) * spread, sample_rate);
        }
    }
}

impl AudioNode for PhaserNode {
    fn kind(&self) -> NodeKind {
        NodeKind::Phaser
    }

    fn params(&self) -> &'static [ParamSpec] {
        PHASER_PARAMS
    }

    fn process(
        &mut self,
        ctx: &ProcessContext<'_>,
        input: &StereoBlock,
        output: &mut StereoBlock,
    ) -> NodeState {
        let rate = ctx.param(0);
        let depth = ctx.param(1);
        let center = ctx.param(2);
        let sweep = ctx.param(3);
        for i in ctx.span.clone() {
            if self.counter == 0 {
                self.retune(center[i], sweep[i], ctx.sample_rate);
                self.counter = COEFF_UPDATE_INTERVAL;
            }
            self.counter -= 1;
            self.phase = wrap_phase(self.phase + rate[i] / ctx.sample_rate);

            let mut wet_l = input.left[i];
            let mut wet_r = input.right[i];
            for (l, r) in self.left.iter_mut().zip(self.right.iter_mut()) {
                wet_l = l.process(wet_l);
                wet_r = r.process(wet_r);
            }
            output.left[i] = 0.5 * (input.left[i] + wet_l * depth[i]);
            output.right[i] = 0.5 * (input.right[i] + wet_r * depth[i]);
        }
        NodeState::Active
    }

    fn reset(&mut self) {
        *self = Self::default();
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
    fn test_first_order_allpass_unity_dc() {
        let mut ap = FirstOrderAllpass::default();
        ap.set_frequency(1000.0, 48000.0);
        let mut y = 0.0;
        for _ in 0..10000 {
            y = ap.process(1.0);
        }
        assert!((y - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_phaser_output_bounded() {
        let frames = 2048;
        let mut lanes = Vec::new();
        for p in [2.0, 1.0, 1000.0, 2000.0] {
            lanes.extend(core::iter::repeat_n(p, frames));
        }
        let mut input = StereoBlock::new(frames);
        for i in 0..frames {
            let s = sinf(TAU * 440.0 * i as f32 / 48000.0);
            input.left[i] = s;
            input.right[i] = s;
        }
        let ctx = ProcessContext::new(48000.0, 0.0, frames, 0..frames, &lanes);
        let mut out = StereoBlock::new(frames);
        PhaserNode::new().process(&ctx, &input, &mut out);
        assert!(out.peak() < 1.5);
        assert!(out.peak() > 0.1);
    }
}
