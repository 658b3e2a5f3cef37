//! Dynamics compressor with soft-knee characteristics.
//!
//! A feed-forward compressor with linked stereo detection.
//!
//! # Signal Flow
//!
//! ```text
//! Input → Envelope Follower (mid) → Gain Computer → Gain Reduction → Output
//! ```
//!
//! # Parameters
//!
//! | Parameter | Range | Default |
//! |-----------|-------|---------|
//! | threshold | -100 to 0 dB | -24 |
//! | knee | 0 to 40 dB | 30 |
//! | ratio | 1 to 20 | 12 |
//! | attack | 0 to 1 s | 0.003 |
//! | release | 0 to 1 s | 0.25 |

use core::any::Any;

use dough_core::{
    AudioNode, NodeKind, NodeState, ParamSpec, ProcessContext, StereoBlock, db_to_linear,
    linear_to_db,
};
use libm::expf;

const COMPRESSOR_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("threshold", -24.0, -100.0, 0.0),
    ParamSpec::new("knee", 30.0, 0.0, 40.0),
    ParamSpec::new("ratio", 12.0, 1.0, 20.0),
    ParamSpec::new("attack", 0.003, 0.0, 1.0),
    ParamSpec::new("release", 0.25, 0.0, 1.0),
];

/// Static compression curve.
///
/// Returns the gain change in dB (always non-positive) for a detector level.
#[inline]
pub fn compute_gain_db(input_db: f32, threshold_db: f32, knee_db: f32, ratio: f32) -> f32 {
    let overshoot = input_db - threshold_db;
    let slope = 1.0 - 1.0 / ratio.max(1.0);
    let half_knee = knee_db / 2.0;
    if overshoot <= -half_knee {
        0.0
    } else if overshoot > half_knee || knee_db <= 0.0 {
        -(overshoot * slope)
    } else {
        let knee_factor = (overshoot + half_knee) / knee_db;
        -(knee_factor * knee_factor * overshoot * slope)
    }
}

/// Peak envelope follower with separate attack and release.
#[derive(Debug, Clone)]
struct EnvelopeFollower {
    envelope: f32,
    times: (f32, f32),
    coeffs: (f32, f32),
}

impl EnvelopeFollower {
    fn new() -> Self {
        Self {
            envelope: 0.0,
            times: (f32::NAN, f32::NAN),
            coeffs: (0.0, 0.0),
        }
    }

    #[inline]
    fn set_times(&mut self, attack: f32, release: f32, sample_rate: f32) {
        if (attack, release) == self.times {
            return;
        }
        let coeff = |seconds: f32| {
            if seconds <= 0.0 {
                0.0
            } else {
                expf(-1.0 / (seconds * sample_rate))
            }
        };
        self.coeffs = (coeff(attack), coeff(release));
        self.times = (attack, release);
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let level = input.abs();
        let coeff = if level > self.envelope {
            self.coeffs.0
        } else {
            self.coeffs.1
        };
        self.envelope = coeff * self.envelope + (1.0 - coeff) * level;
        self.envelope
    }
}

/// Compressor node.
#[derive(Debug, Clone)]
pub struct CompressorNode {
    follower: EnvelopeFollower,
    last_gain_reduction_db: f32,
}

impl Default for CompressorNode {
    fn default() -> Self {
        Self::new()
    }
}

impl CompressorNode {
    /// Compressor with a silent detector.
    pub fn new() -> Self {
        Self {
            follower: EnvelopeFollower::new(),
            last_gain_reduction_db: 0.0,
        }
    }

    /// Gain reduction applied to the last frame, in dB (non-positive).
    pub fn gain_reduction_db(&self) -> f32 {
        self.last_gain_reduction_db
    }
}

impl AudioNode for CompressorNode {
    fn kind(&self) -> NodeKind {
        NodeKind::Compressor
    }

    fn params(&self) -> &'static [ParamSpec] {
        COMPRESSOR_PARAMS
    }

    fn process(
        &mut self,
        ctx: &ProcessContext<'_>,
        input: &StereoBlock,
        output: &mut StereoBlock,
    ) -> NodeState {
        let threshold = ctx.param(0);
        let knee = ctx.param(1);
        let ratio = ctx.param(2);
        let attack = ctx.param(3);
        let release = ctx.param(4);
        for i in ctx.span.clone() {
            self.follower
                .set_times(attack[i], release[i], ctx.sample_rate);
            let envelope = self.follower.process(input.mono_at(i));
            let reduction = compute_gain_db(linear_to_db(envelope), threshold[i], knee[i], ratio[i]);
            self.last_gain_reduction_db = reduction;
            let gain = db_to_linear(reduction);
            output.left[i] = input.left[i] * gain;
            output.right[i] = input.right[i] * gain;
        }
        NodeState::Active
    }

    fn reset(&mut self) {
        self.follower.envelope = 0.0;
        self.last_gain_reduction_db = 0.0;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
