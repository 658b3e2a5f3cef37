//! Dough Synth - signal generators for the dough engine
//!
//! Every generator ships as a per-sample kernel plus an
//! [`AudioNode`](dough_core::AudioNode) wrapper that lives in the
//! processing graph.
//!
//! # Sources
//!
//! Scheduled with `Graph::start` / `Graph::stop`, silent outside that span:
//!
//! - [`OscillatorNode`] - PolyBLEP sine, triangle, sawtooth, square ([`Oscillator`] kernel)
//! - [`PulseNode`] - Pulse with automatable width
//! - [`SupersawNode`] - Detuned, stereo-spread saw stack
//! - [`NoiseNode`] - White, pink and brown noise
//! - [`WavetableNode`] - Frame-scanning [`Wavetable`] player with [`WarpMode`]s
//! - [`ConstantNode`] - Flat signal with an automatable level
//!
//! # Modulators
//!
//! - [`LfoNode`] - [`PeriodicGenerator`] with the [`PeriodicShape`] palette,
//!   dc offset, depth, curve and clamp
//! - [`EnvelopeNode`] - [`CurvedEnvelope`], a five-state ADSR with warped
//!   segments and a retrigger policy
//!
//! ```rust
//! use dough_synth::{CurvedEnvelope, EnvelopeState};
//!
//! let mut env = CurvedEnvelope::new(48000.0);
//! env.gate_on();
//! assert_eq!(env.state(), EnvelopeState::Attack);
//! let level = env.advance();
//! assert!(level > 0.0);
//! ```

pub mod constant;
pub mod envelope;
pub mod noise;
pub mod oscillator;
pub mod periodic;
pub mod supersaw;
pub mod wavetable;

pub use constant::ConstantNode;
pub use envelope::{CurvedEnvelope, EnvelopeNode, EnvelopeShape, EnvelopeState};
pub use noise::{Noise, NoiseColor, NoiseNode};
pub use oscillator::{Oscillator, OscillatorNode, PulseNode, Waveform};
pub use periodic::{LfoNode, PeriodicGenerator, PeriodicShape};
pub use supersaw::{MAX_UNISON, SupersawNode};
pub use wavetable::{WarpMode, Wavetable, WavetableNode};
