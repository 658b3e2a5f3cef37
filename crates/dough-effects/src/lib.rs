//! Dough Effects - effect nodes for the dough engine
//!
//! Every effect is an [`AudioNode`](dough_core::AudioNode) whose settings
//! are automatable graph parameters, so envelopes, LFOs and bus signals can
//! drive them per sample.
//!
//! - [`GainNode`] / [`PannerNode`] - Gain stage and equal-power panner
//! - [`BiquadNode`] - Low-, high-, band-pass, notch and allpass sections
//! - [`LadderNode`] - Saturating 24 dB/oct ladder low-pass
//! - [`VowelNode`] - Five-formant vowel filter
//! - [`DjFilterNode`] - Single-knob low-pass/high-pass cross-fade
//! - [`CrushNode`] / [`CoarseNode`] - Bit and sample-rate reduction
//! - [`ShapeNode`] / [`DistortNode`] - Rational waveshaper and exponential distortion
//! - [`CompressorNode`] - Soft-knee feed-forward compressor
//! - [`PhaserNode`] - Swept allpass phaser
//! - [`DelayNode`] - Stereo feedback delay
//! - [`ReverbNode`] - Partitioned convolution over a generated room response
//! - [`PitchShiftNode`] - Phase-vocoder pitch shifter
//! - [`ClampNode`] - Range clamp for modulation signals
//! - [`AnalyserNode`] - Ring-buffered analysis tap
//!
//! ## Example
//!
//! ```rust
//! use dough_core::{BiquadKind, Graph};
//! use dough_effects::{BiquadNode, GainNode};
//!
//! let mut graph = Graph::new(48000.0, 128, 2);
//! let gain = graph.add(GainNode::new());
//! let lpf = graph.add(BiquadNode::new(BiquadKind::Lowpass));
//! graph.connect(gain, lpf).unwrap();
//! graph.param_mut(lpf, "frequency").unwrap().set_value(1000.0);
//! graph.connect_output(lpf, &[]).unwrap();
//! graph.render_block();
//! ```

pub mod analyser;
pub mod clamp;
pub mod compressor;
pub mod delay;
pub mod filter;
pub mod gain;
pub mod lofi;
pub mod phaser;
pub mod pitch_shift;
pub mod reverb;
pub mod spectral;

pub use analyser::{AnalyserDomain, AnalyserNode};
pub use clamp::ClampNode;
pub use compressor::{CompressorNode, compute_gain_db};
pub use delay::{DelayNode, MAX_DELAY_SECONDS};
pub use filter::{BiquadNode, DjFilterNode, LadderNode, Vowel, VowelNode};
pub use gain::{GainNode, PannerNode};
pub use lofi::{CoarseNode, CrushNode, DistortNode, ShapeNode, quantize};
pub use phaser::PhaserNode;
pub use pitch_shift::PitchShiftNode;
pub use reverb::{PartitionedConvolver, ReverbNode, ReverbSettings, generate_impulse};
pub use spectral::{FftPair, Window};
