//! Node identity, kinds and the [`AudioNode`] processing trait.
//!
//! Every processing unit in the graph implements [`AudioNode`]. The graph
//! owns the node behind a `Box<dyn AudioNode>`, addresses it by a
//! generation-counted [`NodeId`], and drives it once per block with a
//! [`ProcessContext`] carrying the block's timing and the per-sample values
//! of the node's automatable parameters.

use core::any::Any;
use core::fmt;
use core::ops::Range;

use super::buffer::StereoBlock;

/// Handle to a node in a [`Graph`](super::Graph).
///
/// The index addresses an arena slot; the generation is bumped every time a
/// slot is vacated, so an id kept past its node's destruction never aliases
/// the slot's next occupant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl NodeId {
    /// Arena slot index.
    #[inline]
    pub fn index(self) -> u32 {
        self.index
    }

    /// Slot generation this id was issued for.
    #[inline]
    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({}v{})", self.index, self.generation)
    }
}

/// What a node is. Also the key the resource pool files released nodes under.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKind {
    /// Band-limited audio oscillator (sine, square, saw, triangle), optionally FM'd.
    Oscillator,
    /// White, pink or brown noise.
    Noise,
    /// Detuned saw stack.
    Supersaw,
    /// Variable-width pulse oscillator.
    Pulse,
    /// Wavetable oscillator with phase warping.
    Wavetable,
    /// Constant (DC) source.
    Constant,
    /// Gain stage.
    Gain,
    /// Biquad filter section.
    Biquad,
    /// Four-pole ladder low-pass.
    Ladder,
    /// Vowel formant filter bank.
    Vowel,
    /// Bit-depth reduction.
    Crush,
    /// Sample-rate reduction (sample and hold).
    Coarse,
    /// Waveshaper.
    Shape,
    /// Exponential soft-clip distortion.
    Distort,
    /// Dynamics compressor.
    Compressor,
    /// Equal-power stereo panner.
    Panner,
    /// Allpass-chain phaser.
    Phaser,
    /// Feedback delay.
    Delay,
    /// Convolution reverb.
    Reverb,
    /// Periodic modulation generator.
    Lfo,
    /// Curved ADSR envelope generator.
    Envelope,
    /// Phase-vocoder pitch shifter.
    PitchShift,
    /// Soft range clamp for modulation signals.
    Clamp,
    /// Analysis tap.
    Analyser,
    /// A node type defined outside this workspace.
    Custom(&'static str),
}

impl NodeKind {
    /// Short lowercase name for logs and introspection.
    pub fn name(self) -> &'static str {
        match self {
            Self::Oscillator => "oscillator",
            Self::Noise => "noise",
            Self::Supersaw => "supersaw",
            Self::Pulse => "pulse",
            Self::Wavetable => "wavetable",
            Self::Constant => "constant",
            Self::Gain => "gain",
            Self::Biquad => "biquad",
            Self::Ladder => "ladder",
            Self::Vowel => "vowel",
            Self::Crush => "crush",
            Self::Coarse => "coarse",
            Self::Shape => "shape",
            Self::Distort => "distort",
            Self::Compressor => "compressor",
            Self::Panner => "panner",
            Self::Phaser => "phaser",
            Self::Delay => "delay",
            Self::Reverb => "reverb",
            Self::Lfo => "lfo",
            Self::Envelope => "envelope",
            Self::PitchShift => "pshift",
            Self::Clamp => "clamp",
            Self::Analyser => "analyser",
            Self::Custom(name) => name,
        }
    }

    /// Scheduled sources: silent until started, finished once stopped.
    pub fn is_source(self) -> bool {
        matches!(
            self,
            Self::Oscillator
                | Self::Noise
                | Self::Supersaw
                | Self::Pulse
                | Self::Wavetable
                | Self::Constant
        )
    }

    /// Self-terminating kinds. These are destroyed on release, never pooled.
    pub fn is_one_shot(self) -> bool {
        self.is_source()
    }

    /// Kinds that carry a declared end time and finish a grace period after it.
    pub fn is_worklet(self) -> bool {
        matches!(
            self,
            Self::Crush
                | Self::Coarse
                | Self::Shape
                | Self::Distort
                | Self::Ladder
                | Self::Lfo
                | Self::Envelope
                | Self::PitchShift
                | Self::Supersaw
                | Self::Pulse
                | Self::Wavetable
        )
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-block lifecycle state reported by (or imposed on) a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum NodeState {
    /// Scheduled but not yet started; produces silence.
    #[default]
    Pending,
    /// Producing output.
    Active,
    /// Producing its release tail; will finish on its own.
    Releasing,
    /// Finished. The graph disconnects and destroys it after the block.
    Done,
}

impl NodeState {
    /// Anything but `Done` keeps the node alive.
    #[inline]
    pub fn keep_alive(self) -> bool {
        self != Self::Done
    }
}

/// Static description of one automatable parameter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParamSpec {
    /// Parameter name used by [`Graph::param_mut`](super::Graph::param_mut).
    pub name: &'static str,
    /// Initial intrinsic value.
    pub default: f32,
    /// Nominal minimum.
    pub min: f32,
    /// Nominal maximum.
    pub max: f32,
}

impl ParamSpec {
    /// Describe a parameter.
    pub const fn new(name: &'static str, default: f32, min: f32, max: f32) -> Self {
        Self {
            name,
            default,
            min,
            max,
        }
    }
}

/// Timing and parameter values for one call to [`AudioNode::process`].
pub struct ProcessContext<'a> {
    /// Sample rate in Hz.
    pub sample_rate: f32,
    /// Clock time of frame 0 in seconds.
    pub block_start: f64,
    /// Frames in this block.
    pub frames: usize,
    /// Frames in which a scheduled node is live. `0..frames` for everything else.
    pub span: Range<usize>,
    params: &'a [f32],
}

impl<'a> ProcessContext<'a> {
    /// Build a context. `params` holds `frames` values per parameter, back to back.
    pub fn new(
        sample_rate: f32,
        block_start: f64,
        frames: usize,
        span: Range<usize>,
        params: &'a [f32],
    ) -> Self {
        Self {
            sample_rate,
            block_start,
            frames,
            span,
            params,
        }
    }

    /// Per-sample values of parameter `index` (the position in [`AudioNode::params`]).
    #[inline]
    pub fn param(&self, index: usize) -> &[f32] {
        let start = index * self.frames;
        self.params.get(start..start + self.frames).unwrap_or(&[])
    }

    /// Value of parameter `index` at `frame`, or 0 if out of range.
    #[inline]
    pub fn param_at(&self, index: usize, frame: usize) -> f32 {
        self.param(index).get(frame).copied().unwrap_or(0.0)
    }

    /// Clock time of `frame`.
    #[inline]
    pub fn time_at(&self, frame: usize) -> f64 {
        self.block_start + frame as f64 / f64::from(self.sample_rate)
    }
}

/// A block-processing unit living in the graph.
///
/// `process` receives the sum of every audio edge into the node and writes
/// one stereo block. Scheduled nodes (sources, envelopes) should only write
/// inside `ctx.span`; the graph zeroes the output before each call.
pub trait AudioNode: Send {
    /// What this node is.
    fn kind(&self) -> NodeKind;

    /// Automatable parameters, in the order `ctx.param(i)` exposes them.
    fn params(&self) -> &'static [ParamSpec] {
        &[]
    }

    /// Render one block.
    fn process(
        &mut self,
        ctx: &ProcessContext<'_>,
        input: &StereoBlock,
        output: &mut StereoBlock,
    ) -> NodeState;

    /// Clear internal state so the node can be reused from a pool.
    fn reset(&mut self);

    /// Typed access for configuration.
    fn as_any(&self) -> &dyn Any;

    /// Typed mutable access for configuration.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sources_are_one_shot() {
        assert!(NodeKind::Oscillator.is_one_shot());
        assert!(NodeKind::Noise.is_one_shot());
        assert!(!NodeKind::Gain.is_one_shot());
        assert!(!NodeKind::Crush.is_one_shot());
    }

    #[test]
    fn test_worklet_kinds() {
        assert!(NodeKind::Envelope.is_worklet());
        assert!(NodeKind::PitchShift.is_worklet());
        assert!(!NodeKind::Biquad.is_worklet());
    }

    #[test]
    fn test_context_param_slices() {
        let values = [1.0, 1.0, 2.0, 2.0];
        let ctx = ProcessContext::new(48000.0, 0.0, 2, 0..2, &values);
        assert_eq!(ctx.param(1), &[2.0, 2.0]);
        assert_eq!(ctx.param_at(0, 1), 1.0);
        assert!(ctx.param(2).is_empty());
    }

    #[test]
    fn test_node_id_display() {
        let id = NodeId {
            index: 3,
            generation: 2,
        };
        assert_eq!(id.to_string(), "NodeId(3v2)");
    }
}
