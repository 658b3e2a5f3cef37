//! Gain stage and equal-power panner.
//!
//! The gain node is the busiest node in a voice: it carries the amplitude
//! envelope, the tremolo depth, FM index scaling, send levels and the orbit
//! output with its duck automation. All of that is automation on one
//! `gain` parameter, so the node itself is a plain multiply.

use core::any::Any;

use dough_core::{
    AudioNode, NodeKind, NodeState, ParamSpec, ProcessContext, StereoBlock, equal_power_pan,
};

const GAIN_PARAMS: &[ParamSpec] = &[ParamSpec::new("gain", 1.0, -1.0e9, 1.0e9)];

/// Multiplies its input by the `gain` parameter.
#[derive(Debug, Clone, Default)]
pub struct GainNode;

impl GainNode {
    /// Unity gain stage.
    pub fn new() -> Self {
        Self
    }
}

impl AudioNode for GainNode {
    fn kind(&self) -> NodeKind {
        NodeKind::Gain
    }

    fn params(&self) -> &'static [ParamSpec] {
        GAIN_PARAMS
    }

    fn process(
        &mut self,
        ctx: &ProcessContext<'_>,
        input: &StereoBlock,
        output: &mut StereoBlock,
    ) -> NodeState {
        let gain = ctx.param(0);
        for i in ctx.span.clone() {
            output.left[i] = input.left[i] * gain[i];
            output.right[i] = input.right[i] * gain[i];
        }
        NodeState::Active
    }

    fn reset(&mut self) {}

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

const PAN_PARAMS: &[ParamSpec] = &[ParamSpec::new("pan", 0.0, -1.0, 1.0)];

/// Equal-power stereo panner. `pan` runs from -1 (left) to 1 (right).
///
/// The input is folded to mono first, so a hard-panned input lands
/// entirely on the chosen side.
#[derive(Debug, Clone, Default)]
pub struct PannerNode;

impl PannerNode {
    /// Centred panner.
    pub fn new() -> Self {
        Self
    }
}

impl AudioNode for PannerNode {
    fn kind(&self) -> NodeKind {
        NodeKind::Panner
    }

    fn params(&self) -> &'static [ParamSpec] {
        PAN_PARAMS
    }

    fn process(
        &mut self,
        ctx: &ProcessContext<'_>,
        input: &StereoBlock,
        output: &mut StereoBlock,
    ) -> NodeState {
        let pan = ctx.param(0);
        for i in ctx.span.clone() {
            let (gl, gr) = equal_power_pan(pan[i]);
            let mono = input.mono_at(i);
            output.left[i] = mono * gl;
            output.right[i] = mono * gr;
        }
        NodeState::Active
    }

    fn reset(&mut self) {}

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

    fn run(node: &mut dyn AudioNode, params: &[f32], input: &StereoBlock) -> StereoBlock {
        let frames = input.len();
        let ctx = ProcessContext::new(48000.0, 0.0, frames, 0..frames, params);
        let mut out = StereoBlock::new(frames);
        node.process(&ctx, input, &mut out);
        out
    }

    #[test]
    fn test_gain_scales_both_channels() {
        let mut input = StereoBlock::new(2);
        input.left.copy_from_slice(&[1.0, -1.0]);
        input.right.copy_from_slice(&[0.5, 0.5]);
        let out = run(&mut GainNode::new(), &[0.5, 2.0], &input);
        assert_eq!(out.left, vec![0.5, -2.0]);
        assert_eq!(out.right, vec![0.25, 1.0]);
    }

    #[test]
    fn test_hard_left_pan() {
        let mut input = StereoBlock::new(1);
        input.left[0] = 1.0;
        input.right[0] = 1.0;
        let out = run(&mut PannerNode::new(), &[-1.0], &input);
        assert!((out.left[0] - 1.0).abs() < 1e-6);
        assert!(out.right[0].abs() < 1e-6);
    }
}
