//! Range clamp for modulation signals.
//!
//! Sits between a modulator and the parameter it drives so the sum of the
//! parameter's value and the modulation stays inside a safe range.

use core::any::Any;

use dough_core::{AudioNode, NodeKind, NodeState, ParamSpec, ProcessContext, StereoBlock};

const CLAMP_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("min", -1.0e9, -1.0e9, 1.0e9),
    ParamSpec::new("max", 1.0e9, -1.0e9, 1.0e9),
];

/// Clamps each channel to `[min, max]`.
#[derive(Debug, Clone, Default)]
pub struct ClampNode;

impl ClampNode {
    /// Clamp with an unbounded range; set `min`/`max` on the graph params.
    pub fn new() -> Self {
        Self
    }
}

impl AudioNode for ClampNode {
    fn kind(&self) -> NodeKind {
        NodeKind::Clamp
    }

    fn params(&self) -> &'static [ParamSpec] {
        CLAMP_PARAMS
    }

    fn process(
        &mut self,
        ctx: &ProcessContext<'_>,
        input: &StereoBlock,
        output: &mut StereoBlock,
    ) -> NodeState {
        let min = ctx.param(0);
        let max = ctx.param(1);
        for i in ctx.span.clone() {
            let (lo, hi) = (min[i].min(max[i]), max[i].max(min[i]));
            output.left[i] = input.left[i].clamp(lo, hi);
            output.right[i] = input.right[i].clamp(lo, hi);
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

    #[test]
    fn test_clamps_to_range() {
        let mut input = StereoBlock::new(3);
        input.left.copy_from_slice(&[-5.0, 0.5, 5.0]);
        let lanes = [-1.0, -1.0, -1.0, 2.0, 2.0, 2.0];
        let ctx = ProcessContext::new(48000.0, 0.0, 3, 0..3, &lanes);
        let mut out = StereoBlock::new(3);
        ClampNode::new().process(&ctx, &input, &mut out);
        assert_eq!(out.left, vec![-1.0, 0.5, 2.0]);
        assert_eq!(out.right, vec![0.0, 0.0, 0.0]);
    }
}
