//! Feedback delay used by the orbit delay send.
//!
//! The node outputs only the wet signal; the per-voice send gain sets how
//! much of a voice enters it. Delay time glides over a few milliseconds
//! when an event changes it on a live orbit.

use core::any::Any;

use dough_core::{
    AudioNode, InterpolatedDelay, NodeKind, NodeState, ParamSpec, ProcessContext, SmoothedParam,
    StereoBlock, flush_denormal,
};

/// Longest delay time the line can hold, in seconds.
pub const MAX_DELAY_SECONDS: f32 = 10.0;

const TIME_GLIDE_MS: f32 = 20.0;

const DELAY_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("time", 0.25, 0.0, MAX_DELAY_SECONDS),
    ParamSpec::new("feedback", 0.5, 0.0, 0.98),
];

/// Stereo feedback delay.
///
/// ## Parameters
///
/// | Index | Name | Range | Default |
/// |-------|------|-------|---------|
/// | 0 | time | 0–10 s | 0.25 |
/// | 1 | feedback | 0–0.98 | 0.5 |
///
/// # Example
///
/// ```rust
/// use dough_core::Graph;
/// use dough_effects::DelayNode;
///
/// let mut graph = Graph::new(48000.0, 128, 2);
/// let delay = graph.add(DelayNode::new(48000.0));
/// graph.param_mut(delay, "time").unwrap().set_value(0.375);
/// graph.param_mut(delay, "feedback").unwrap().set_value(0.4);
/// ```
#[derive(Debug, Clone)]
pub struct DelayNode {
    left: InterpolatedDelay,
    right: InterpolatedDelay,
    time: SmoothedParam,
    primed: bool,
}

impl DelayNode {
    /// Delay line sized for [`MAX_DELAY_SECONDS`].
    pub fn new(sample_rate: f32) -> Self {
        Self {
            left: InterpolatedDelay::from_time(sample_rate, MAX_DELAY_SECONDS),
            right: InterpolatedDelay::from_time(sample_rate, MAX_DELAY_SECONDS),
            time: SmoothedParam::with_config(0.25, sample_rate, TIME_GLIDE_MS),
            primed: false,
        }
    }
}

impl AudioNode for DelayNode {
    fn kind(&self) -> NodeKind {
        NodeKind::Delay
    }

    fn params(&self) -> &'static [ParamSpec] {
        DELAY_PARAMS
    }

    fn process(
        &mut self,
        ctx: &ProcessContext<'_>,
        input: &StereoBlock,
        output: &mut StereoBlock,
    ) -> NodeState {
        let time = ctx.param(0);
        let feedback = ctx.param(1);
        if !self.primed {
            if let Some(&first) = time.get(ctx.span.start) {
                self.time.set_immediate(first);
            }
            self.primed = true;
        }
        for i in ctx.span.clone() {
            self.time.set_target(time[i]);
            // read(0) is the previous write, so a delay of d samples reads d - 1
            let d = (self.time.advance() * ctx.sample_rate - 1.0).max(0.0);
            let wet_l = self.left.read(d);
            let wet_r = self.right.read(d);
            self.left
                .write(flush_denormal(input.left[i] + wet_l * feedback[i]));
            self.right
                .write(flush_denormal(input.right[i] + wet_r * feedback[i]));
            output.left[i] = wet_l;
            output.right[i] = wet_r;
        }
        NodeState::Active
    }

    fn reset(&mut self) {
        self.left.clear();
        self.right.clear();
        self.primed = false;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
