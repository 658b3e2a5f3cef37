//! Dough Core - graph runtime and DSP primitives for the dough engine
//!
//! This crate holds everything the generators, effects and event compiler
//! share: the processing graph, sample-accurate parameter automation and the
//! small DSP building blocks several nodes reuse.
//!
//! # Core Abstractions
//!
//! ## Processing Graph
//!
//! - [`Graph`] - Arena of nodes with audio, parameter and hardware connections
//! - [`AudioNode`] - Trait every processing node implements
//! - [`NodeId`] - Generation-counted node handle
//! - [`NodeKind`] / [`NodeState`] - Node classification and per-block lifecycle
//!
//! ## Parameter Automation
//!
//! - [`AudioParam`] - Sample-accurate automation timeline (set, ramps, target, cancel)
//! - [`apply_adsr`] - ADSR-shaped sweep between two values
//! - [`SmoothedParam`] - One-pole smoothing for settings changed between blocks
//!
//! ## Filters and Delays
//!
//! - [`Biquad`] - Second-order IIR section with RBJ cookbook coefficients
//! - [`InterpolatedDelay`] - Fractional-read circular delay line
//!
//! ## Utilities
//!
//! - Math functions: [`db_to_linear`], [`midi_to_freq`], [`warp`], [`poly_blep`], etc.
//!
//! # Example
//!
//! ```rust
//! use dough_core::{AudioParam, apply_adsr, AdsrShape, RampCurve};
//!
//! let mut cutoff = AudioParam::new(200.0);
//! let shape = AdsrShape { attack: 0.01, decay: 0.1, sustain: 0.5, release: 0.1 };
//! let done = apply_adsr(&mut cutoff, &shape, 200.0, 3200.0, 0.0, 0.5, RampCurve::Exponential);
//! assert!((cutoff.value_at(0.01) - 3200.0).abs() < 1.0);
//! assert!((done - 0.6).abs() < 1e-9);
//! ```

pub mod biquad;
pub mod delay;
pub mod graph;
pub mod math;
pub mod param;

pub use biquad::{
    Biquad, BiquadKind, Coefficients, allpass_coefficients, bandpass_coefficients,
    highpass_coefficients, lowpass_coefficients, notch_coefficients,
};
pub use delay::{InterpolatedDelay, Interpolation};
pub use graph::{
    AudioNode, DEFAULT_BLOCK_SIZE, Graph, GraphError, NodeId, NodeKind, NodeState, OutputRoute,
    ParamSpec, ProcessContext, StereoBlock,
};
pub use math::{
    cents_to_ratio, db_to_linear, equal_power_pan, flush_denormal, freq_to_midi, linear_to_db,
    midi_to_freq, poly_blep, semitones_to_ratio, signed_pow, warp, wrap_phase,
};
pub use param::{AdsrShape, AudioParam, ParamEvent, RampCurve, SmoothedParam, apply_adsr};
