//! Dough Engine - event-to-graph compiler for live-coded synthesis
//!
//! Each trigger from a pattern scheduler arrives as an [`Event`]: a flat
//! dictionary of named controls. The engine turns it into a short-lived
//! voice inside a shared processing graph, routes the voice into an orbit
//! (a shared output bus with delay and reverb), attaches any modulators the
//! event asks for and reclaims the nodes once the voice has rung out.
//!
//! # Core Abstractions
//!
//! ## Compilation
//!
//! - [`EngineContext`] - Owns all engine state; `synthesize` compiles one event
//! - [`VoiceParams`] - Typed view of an event's controls
//! - [`SourceRegistry`] - Named source generators (oscillators, noise, wavetables, custom)
//! - [`Voice`] / [`Chain`] / [`Role`] - The compiled node chain, role-tagged
//!
//! ## Resources
//!
//! - [`ResourcePool`] - Free lists of reusable nodes, keyed by node kind
//! - [`PolyphonyGovernor`] - FIFO voice ceiling with fade-out eviction
//! - [`Orbit`] / [`BusMap`] - Shared output buses and named sidechain buses
//!
//! ## Modulation
//!
//! - [`resolve_target`] - Control-target table lookup
//! - [`router::attach`] - Wire an LFO, envelope or bus into a voice parameter
//!
//! ## Offline Rendering
//!
//! - [`OfflineRenderer`] - Compile a scheduled event list and render it to buffers
//!
//! # Example
//!
//! ```rust
//! use dough_engine::{EngineConfig, EngineContext, Event, Role};
//!
//! let mut engine = EngineContext::new(EngineConfig::default()).unwrap();
//! let event = Event::new()
//!     .with("s", "sawtooth")
//!     .with("note", "c3")
//!     .with("cutoff", 1200)
//!     .with("room", 0.3);
//! let voice = engine.synthesize(&event, 0.0, 0.5, 0.5, 0.0).unwrap().unwrap();
//! let roles = engine.voice(voice.id).unwrap().roles();
//! assert_eq!(roles[..3], [Role::Source, Role::Gain, Role::Lpf]);
//! engine.render_block();
//! ```

pub mod bus;
pub mod compiler;
pub mod config;
pub mod context;
pub mod controls;
pub mod error;
pub mod event;
pub mod governor;
pub mod orbit;
pub mod pool;
pub mod render;
pub mod router;
pub mod sources;
pub mod voice;

pub use bus::BusMap;
pub use config::EngineConfig;
pub use context::{EngineContext, ParamCurve};
pub use controls::{
    DEFAULT_AMP_ENVELOPE, FilterSlope, ModDepth, ModSignal, ModulatorSpec, Rate, VoiceParams,
    resolve_envelope, split_modulators,
};
pub use error::{ConfigError, EngineWarning, PoolError, SynthError};
pub use event::{ControlValue, Event, note_to_midi};
pub use governor::{Admission, DEFAULT_MAX_POLYPHONY, PolyphonyGovernor};
pub use orbit::Orbit;
pub use pool::{PoolStats, ResourcePool};
pub use render::{OfflineRenderer, RenderOutput, ScheduledEvent};
pub use router::{CONTROL_TARGETS, ControlTarget, VoiceTiming, resolve_target};
pub use sources::{
    SourceContext, SourceInfo, SourceKind, SourceOutput, SourceRegistry, SourceTrigger,
    resolve_frequency,
};
pub use voice::{Chain, Role, Voice, VoiceArena, VoiceHandle, VoiceId};

pub use dough_effects::AnalyserDomain;
