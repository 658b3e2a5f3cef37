//! Constant (DC) source.
//!
//! Used as the carrier for bus-derived modulation and anywhere a scheduled
//! flat signal is needed; the level is the automatable `offset` parameter.

use core::any::Any;

use dough_core::{AudioNode, NodeKind, NodeState, ParamSpec, ProcessContext, StereoBlock};

const CONSTANT_PARAMS: &[ParamSpec] = &[ParamSpec::new("offset", 1.0, -1.0e9, 1.0e9)];

/// Scheduled constant source.
#[derive(Debug, Clone, Default)]
pub struct ConstantNode;

impl ConstantNode {
    /// Create a constant source.
    pub fn new() -> Self {
        Self
    }
}

impl AudioNode for ConstantNode {
    fn kind(&self) -> NodeKind {
        NodeKind::Constant
    }

    fn params(&self) -> &'static [ParamSpec] {
        CONSTANT_PARAMS
    }

    fn process(
        &mut self,
        ctx: &ProcessContext<'_>,
        _input: &StereoBlock,
        output: &mut StereoBlock,
    ) -> NodeState {
        let offset = ctx.param(0);
        for i in ctx.span.clone() {
            output.left[i] = offset[i];
            output.right[i] = offset[i];
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
