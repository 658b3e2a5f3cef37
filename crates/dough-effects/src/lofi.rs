//! Lo-fi processors: bit reduction, sample-rate reduction, waveshaper and
//! exponential distortion.
//!
//! # Bit Reduction
//!
//! With `B` bits the amplitude axis is split into `2^(B-1)` steps per
//! polarity and each sample is rounded to the nearest step:
//!
//! ```text
//! steps = 2^(B - 1)
//! y = round(x · steps) / steps
//! ```
//!
//! # Sample-Rate Reduction
//!
//! Zero-order hold: one input sample is latched every `N` frames and held,
//! folding high frequencies back into the audible range.
//!
//! # Waveshaping
//!
//! Both shapers are the rational soft clipper
//!
//! ```text
//! y = (1 + k) · x / (1 + k · |x|)
//! ```
//!
//! The waveshaper maps its 0..1 amount to `k = 2s / (1 - s)`, the
//! distortion maps its amount exponentially, `k = e^d - 1`, so large values
//! keep getting harsher instead of saturating at a hard clip.

use core::any::Any;

use dough_core::{AudioNode, NodeKind, NodeState, ParamSpec, ProcessContext, StereoBlock};
use libm::{expm1f, powf, roundf};

#[inline]
fn rational_clip(x: f32, k: f32) -> f32 {
    (1.0 + k) * x / (1.0 + k * x.abs())
}

/// Quantize `x` to `bits` of resolution.
#[inline]
pub fn quantize(x: f32, bits: f32) -> f32 {
    let steps = powf(2.0, bits.clamp(1.0, 16.0) - 1.0);
    roundf(x * steps) / steps
}

const CRUSH_PARAMS: &[ParamSpec] = &[ParamSpec::new("crush", 16.0, 1.0, 16.0)];

/// Bit-depth reduction.
#[derive(Debug, Clone, Default)]
pub struct CrushNode;

impl CrushNode {
    /// Bit crusher.
    pub fn new() -> Self {
        Self
    }
}

impl AudioNode for CrushNode {
    fn kind(&self) -> NodeKind {
        NodeKind::Crush
    }

    fn params(&self) -> &'static [ParamSpec] {
        CRUSH_PARAMS
    }

    fn process(
        &mut self,
        ctx: &ProcessContext<'_>,
        input: &StereoBlock,
        output: &mut StereoBlock,
    ) -> NodeState {
        let bits = ctx.param(0);
        for i in ctx.span.clone() {
            output.left[i] = quantize(input.left[i], bits[i]);
            output.right[i] = quantize(input.right[i], bits[i]);
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

const COARSE_PARAMS: &[ParamSpec] = &[ParamSpec::new("coarse", 1.0, 1.0, 1024.0)];

/// Sample-and-hold rate reduction by an integer factor.
#[derive(Debug, Clone, Default)]
pub struct CoarseNode {
    counter: u32,
    held: (f32, f32),
}

impl CoarseNode {
    /// Rate reducer with an empty hold.
    pub fn new() -> Self {
        Self::default()
    }
}

impl AudioNode for CoarseNode {
    fn kind(&self) -> NodeKind {
        NodeKind::Coarse
    }

    fn params(&self) -> &'static [ParamSpec] {
        COARSE_PARAMS
    }

    fn process(
        &mut self,
        ctx: &ProcessContext<'_>,
        input: &StereoBlock,
        output: &mut StereoBlock,
    ) -> NodeState {
        let factor = ctx.param(0);
        for i in ctx.span.clone() {
            let hold = (factor[i] as u32).max(1);
            if self.counter % hold == 0 {
                self.held = (input.left[i], input.right[i]);
                self.counter = 0;
            }
            self.counter += 1;
            output.left[i] = self.held.0;
            output.right[i] = self.held.1;
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

const SHAPE_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("shape", 0.0, 0.0, 1.0),
    ParamSpec::new("postgain", 1.0, 0.0, 1.0e3),
];

/// Waveshaper, `shape` 0..1.
#[derive(Debug, Clone, Default)]
pub struct ShapeNode;

impl ShapeNode {
    /// Waveshaper.
    pub fn new() -> Self {
        Self
    }

    /// Curve coefficient for a shape amount, capped short of the pole at 1.
    #[inline]
    pub fn coefficient(shape: f32) -> f32 {
        let s = shape.clamp(0.0, 0.99);
        2.0 * s / (1.0 - s)
    }
}

impl AudioNode for ShapeNode {
    fn kind(&self) -> NodeKind {
        NodeKind::Shape
    }

    fn params(&self) -> &'static [ParamSpec] {
        SHAPE_PARAMS
    }

    fn process(
        &mut self,
        ctx: &ProcessContext<'_>,
        input: &StereoBlock,
        output: &mut StereoBlock,
    ) -> NodeState {
        let shape = ctx.param(0);
        let postgain = ctx.param(1);
        for i in ctx.span.clone() {
            let k = Self::coefficient(shape[i]);
            output.left[i] = rational_clip(input.left[i], k) * postgain[i];
            output.right[i] = rational_clip(input.right[i], k) * postgain[i];
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

const DISTORT_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("distort", 0.0, 0.0, 20.0),
    ParamSpec::new("postgain", 1.0, 0.0, 1.0e3),
];

/// Exponential soft-clip distortion.
#[derive(Debug, Clone, Default)]
pub struct DistortNode;

impl DistortNode {
    /// Distortion.
    pub fn new() -> Self {
        Self
    }
}

impl AudioNode for DistortNode {
    fn kind(&self) -> NodeKind {
        NodeKind::Distort
    }

    fn params(&self) -> &'static [ParamSpec] {
        DISTORT_PARAMS
    }

    fn process(
        &mut self,
        ctx: &ProcessContext<'_>,
        input: &StereoBlock,
        output: &mut StereoBlock,
    ) -> NodeState {
        let amount = ctx.param(0);
        let postgain = ctx.param(1);
        for i in ctx.span.clone() {
            let k = expm1f(amount[i]);
            output.left[i] = rational_clip(input.left[i], k) * postgain[i];
            output.right[i] = rational_clip(input.right[i], k) * postgain[i];
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
