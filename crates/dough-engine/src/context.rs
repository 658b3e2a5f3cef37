//! Engine context.
//!
//! [`EngineContext`] owns every piece of engine state: the processing graph,
//! the node pool, the polyphony governor, orbits, named buses, analysers,
//! the source registry and the live voices. Nothing is global; `reset`
//! rebuilds the state from the stored configuration.
//!
//! The compile path lives in [`crate::compiler`]; this module holds
//! construction, configuration, rendering and the voice reaper.

use std::collections::BTreeMap;
use std::sync::Arc;

use dough_core::{Graph, NodeId};
use dough_effects::{AnalyserDomain, AnalyserNode};
use dough_synth::Wavetable;

use crate::bus::BusMap;
use crate::config::EngineConfig;
use crate::error::{ConfigError, EngineWarning, SynthError};
use crate::event::Event;
use crate::governor::PolyphonyGovernor;
use crate::orbit::Orbit;
use crate::pool::{PoolStats, ResourcePool};
use crate::sources::{SourceContext, SourceInfo, SourceOutput, SourceRegistry, SourceTrigger};
use crate::voice::{Voice, VoiceArena, VoiceId};

/// Perceptual rescaling applied to gain, delay send and bus send levels.
pub type ParamCurve = Arc<dyn Fn(f32) -> f32 + Send + Sync>;

/// All engine state.
///
/// ```rust
/// use dough_engine::{EngineConfig, EngineContext, Event};
///
/// let mut engine = EngineContext::new(EngineConfig::default()).unwrap();
/// let event = Event::new().with("s", "sine").with("note", 57);
/// let voice = engine.synthesize(&event, 0.0, 0.25, 0.5, 0.0).unwrap().unwrap();
/// assert!(engine.voice(voice.id).is_some());
/// for _ in 0..200 {
///     engine.render_block();
/// }
/// assert!(engine.voice(voice.id).is_none());
/// ```
pub struct EngineContext {
    pub(crate) config: EngineConfig,
    pub(crate) graph: Graph,
    pub(crate) pool: ResourcePool,
    pub(crate) governor: PolyphonyGovernor,
    pub(crate) orbits: BTreeMap<u32, Orbit>,
    pub(crate) buses: BusMap,
    pub(crate) analysers: BTreeMap<String, NodeId>,
    pub(crate) sources: SourceRegistry,
    pub(crate) voices: VoiceArena,
    pub(crate) curve: ParamCurve,
    pub(crate) warnings: Vec<EngineWarning>,
}

impl EngineContext {
    /// Build a context from a validated configuration.
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let graph = Self::build_graph(&config);
        tracing::debug!(
            target: "dough::engine",
            sample_rate = config.sample_rate,
            block_size = config.block_size,
            channels = config.output_channels,
            "engine created"
        );
        Ok(Self {
            pool: ResourcePool::new(config.pooling),
            governor: PolyphonyGovernor::new(config.max_polyphony),
            graph,
            orbits: BTreeMap::new(),
            buses: BusMap::new(),
            analysers: BTreeMap::new(),
            sources: SourceRegistry::new(),
            voices: VoiceArena::new(),
            curve: Arc::new(|x| x),
            warnings: Vec::new(),
            config,
        })
    }

    fn build_graph(config: &EngineConfig) -> Graph {
        let mut graph = Graph::new(config.sample_rate_hz(), config.block_size, config.output_channels);
        graph.set_worklet_grace(config.worklet_grace);
        graph
    }

    /// Configuration in effect.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Change the polyphony ceiling; takes effect on the next admission.
    pub fn set_max_polyphony(&mut self, ceiling: usize) {
        self.config.max_polyphony = ceiling.max(1);
        self.governor.set_ceiling(ceiling);
    }

    /// Route orbits to their own channel pairs instead of all to the first pair.
    pub fn set_multi_channel_routing(&mut self, enabled: bool) {
        self.config.multi_channel_routing = enabled;
    }

    /// Register (or replace) a source generator.
    pub fn register_source<F>(&mut self, name: &str, info: SourceInfo, generator: F)
    where
        F: Fn(&mut SourceContext<'_>, &Event, &SourceTrigger) -> Result<SourceOutput, SynthError>
            + Send
            + Sync
            + 'static,
    {
        tracing::debug!(target: "dough::engine", source = name, "source registered");
        self.sources.register(name, info, generator);
    }

    /// Register a wavetable as a source.
    pub fn register_wavetable(&mut self, name: &str, table: Wavetable) {
        tracing::debug!(target: "dough::engine", source = name, "wavetable registered");
        self.sources.register_wavetable(name, table);
    }

    /// The source registry.
    pub fn sources(&self) -> &SourceRegistry {
        &self.sources
    }

    /// Replace the level curve (identity by default).
    pub fn set_parameter_curve<F>(&mut self, curve: F)
    where
        F: Fn(f32) -> f32 + Send + Sync + 'static,
    {
        self.curve = Arc::new(curve);
    }

    /// Apply the level curve.
    pub fn apply_curve(&self, value: f32) -> f32 {
        (self.curve)(value)
    }

    /// Tear down every orbit and bus. Later events recreate them.
    pub fn reset_global_effects(&mut self) {
        for (_, orbit) in std::mem::take(&mut self.orbits) {
            orbit.teardown(&mut self.graph);
        }
        self.buses.teardown(&mut self.graph);
        tracing::debug!(target: "dough::engine", "global effects reset");
    }

    /// Rebuild all state from the configuration. The clock restarts at zero;
    /// registered sources and the level curve are kept.
    pub fn reset(&mut self) {
        self.graph = Self::build_graph(&self.config);
        self.pool = ResourcePool::new(self.config.pooling);
        self.governor = PolyphonyGovernor::new(self.config.max_polyphony);
        self.orbits.clear();
        self.buses = BusMap::new();
        self.analysers.clear();
        self.voices.clear();
        self.warnings.clear();
        tracing::debug!(target: "dough::engine", "engine reset");
    }

    /// Drain recorded warnings.
    pub fn take_warnings(&mut self) -> Vec<EngineWarning> {
        std::mem::take(&mut self.warnings)
    }

    /// Warnings recorded since the last drain.
    pub fn warnings(&self) -> &[EngineWarning] {
        &self.warnings
    }

    pub(crate) fn warn(&mut self, component: &'static str, error: SynthError) {
        match component {
            "router" => tracing::warn!(target: "dough::router", %error, "modulator skipped"),
            "governor" => tracing::warn!(target: "dough::governor", %error, "voice warning"),
            _ => tracing::warn!(target: "dough::compiler", %error, "trigger warning"),
        }
        self.warnings.push(EngineWarning { component, error });
    }

    /// Render one block, then reclaim finished voices.
    pub fn render_block(&mut self) {
        self.graph.render_block();
        self.reap();
    }

    /// Output of the last block, one buffer per channel.
    pub fn output(&self) -> &[Vec<f32>] {
        self.graph.output()
    }

    /// Clock time in seconds.
    pub fn current_time(&self) -> f64 {
        self.graph.current_time()
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> f32 {
        self.graph.sample_rate()
    }

    /// The processing graph.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// The polyphony governor.
    pub fn governor(&self) -> &PolyphonyGovernor {
        &self.governor
    }

    /// Live voice behind `id`.
    pub fn voice(&self, id: VoiceId) -> Option<&Voice> {
        self.voices.get(id)
    }

    /// Ids of every live voice.
    pub fn active_voices(&self) -> Vec<VoiceId> {
        self.voices.ids()
    }

    /// Pool counters.
    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// The resource pool.
    pub fn pool(&self) -> &ResourcePool {
        &self.pool
    }

    /// The orbit with this number, if any event has used it.
    pub fn orbit(&self, number: u32) -> Option<&Orbit> {
        self.orbits.get(&number)
    }

    /// Number of live orbits.
    pub fn orbit_count(&self) -> usize {
        self.orbits.len()
    }

    /// Named buses.
    pub fn buses(&self) -> &BusMap {
        &self.buses
    }

    /// Latest analyser data for `id`, `None` if no event has tapped it.
    pub fn analyser_snapshot(&self, id: &str, domain: AnalyserDomain) -> Option<Vec<f32>> {
        let node = *self.analysers.get(id)?;
        self.graph
            .node_ref::<AnalyserNode>(node)
            .map(|analyser| analyser.snapshot(domain))
    }

    /// Hardware channels (0-based) for an orbit.
    ///
    /// Without multi-channel routing every orbit plays on the first pair.
    /// With it, explicit 1-based `requested` channels win, else orbit `n`
    /// takes pair `n - 1`, wrapping around the available channels.
    pub fn orbit_channels(&self, number: u32, requested: Option<&[usize]>) -> Vec<usize> {
        let available = self.config.output_channels.max(1);
        if !self.config.multi_channel_routing {
            return if available == 1 { vec![0] } else { vec![0, 1] };
        }
        if let Some(channels) = requested.filter(|c| !c.is_empty()) {
            return channels
                .iter()
                .map(|&c| c.saturating_sub(1) % available)
                .collect();
        }
        let pair = number.saturating_sub(1) as usize;
        vec![(2 * pair) % available, (2 * pair + 1) % available]
    }

    /// Orbit `number`, created on `channels` on first use. Its channels are
    /// fixed from then on until the orbits are torn down.
    pub(crate) fn ensure_orbit(&mut self, number: u32, channels: &[usize]) -> Result<&mut Orbit, SynthError> {
        if !self.orbits.contains_key(&number) {
            let orbit = Orbit::new(&mut self.graph, number, channels)?;
            self.orbits.insert(number, orbit);
        }
        self.orbits
            .get_mut(&number)
            .ok_or_else(|| SynthError::MalformedEvent(format!("orbit {number} unavailable")))
    }

    /// Analyser tap for `id`, created on first use.
    pub(crate) fn analyser(&mut self, id: &str) -> NodeId {
        if let Some(&node) = self.analysers.get(id)
            && self.graph.contains(node)
        {
            return node;
        }
        let node = self.graph.add(AnalyserNode::new(self.config.analyser_fft_size));
        self.analysers.insert(id.to_string(), node);
        node
    }

    /// Release voices whose time is up or whose source has finished.
    fn reap(&mut self) {
        let now = self.graph.current_time();
        let slack = self.config.release_tail;
        for id in self.voices.ids() {
            let expired = self.voices.get(id).is_some_and(|voice| {
                voice.release_end() + slack <= now || !self.graph.contains(voice.anchor())
            });
            if expired && let Some(voice) = self.voices.remove(id) {
                tracing::debug!(target: "dough::engine", voice = %id, now, "voice reclaimed");
                self.governor.forget(voice.trigger_id());
                self.release_voice(&voice, now);
            }
        }
    }

    pub(crate) fn release_voice(&mut self, voice: &Voice, now: f64) {
        self.release_nodes(&voice.all_nodes(), now);
    }

    pub(crate) fn release_nodes(&mut self, nodes: &[NodeId], now: f64) {
        for &node in nodes {
            if let Err(error) = self.pool.release(&mut self.graph, node, now) {
                tracing::warn!(target: "dough::pool", %error, "release failed");
            }
        }
    }
}
