//! Source registry and the built-in synth sources.
//!
//! A source generator receives the trigger's static controls and timing,
//! builds whatever nodes it needs, and returns the node the effect chain
//! continues from. Every node it created is filed under the voice's
//! `source` role. Built-in sources wrap their signal in an envelope gain that
//! carries the amplitude ADSR, so the chain's gain stage stays a plain level.

use std::collections::BTreeMap;
use std::sync::Arc;

use dough_core::{AdsrShape, AudioNode, Graph, NodeId, NodeKind, RampCurve, apply_adsr, midi_to_freq};
use dough_effects::GainNode;
use dough_synth::{
    LfoNode, NoiseColor, NoiseNode, OscillatorNode, PeriodicShape, PulseNode, SupersawNode, WarpMode,
    Waveform, Wavetable, WavetableNode,
};

use crate::controls::resolve_envelope;
use crate::error::SynthError;
use crate::event::{ControlValue, Event};
use crate::pool::ResourcePool;
use crate::voice::{Chain, Role};

/// Pitch used when an event sets none.
pub const DEFAULT_NOTE: f64 = 36.0;

const DEFAULT_PITCH_ENVELOPE: AdsrShape = AdsrShape {
    attack: 0.2,
    decay: 0.001,
    sustain: 1.0,
    release: 0.001,
};

/// What kind of generator a source is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Built-in oscillator or noise.
    Synth,
    /// Registered wavetable.
    Wavetable,
    /// Registered by the host.
    Custom,
}

/// Registry metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceInfo {
    /// Kind.
    pub kind: SourceKind,
    /// One-line description.
    pub description: String,
}

impl SourceInfo {
    /// Metadata for a host-registered source.
    pub fn custom(description: impl Into<String>) -> Self {
        Self {
            kind: SourceKind::Custom,
            description: description.into(),
        }
    }
}

/// Timing and envelope a source is triggered with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceTrigger {
    /// Trigger time.
    pub begin: f64,
    /// Gate close.
    pub end: f64,
    /// When the release tail lands; one-shot nodes stop here.
    pub release_end: f64,
    /// Pattern cycles per second.
    pub cps: f64,
    /// Pattern cycle position of the trigger.
    pub cycle: f64,
    /// Amplitude envelope.
    pub envelope: AdsrShape,
}

/// Graph access handed to a source generator.
///
/// Nodes built through [`add`](Self::add) and [`checkout`](Self::checkout)
/// are recorded, so a generator that fails halfway leaves nothing behind.
pub struct SourceContext<'a> {
    /// The processing graph.
    pub graph: &'a mut Graph,
    /// Pool for reusable helper nodes.
    pub pool: &'a mut ResourcePool,
    created: Vec<NodeId>,
}

impl<'a> SourceContext<'a> {
    /// Context over `graph` and `pool`.
    pub fn new(graph: &'a mut Graph, pool: &'a mut ResourcePool) -> Self {
        Self {
            graph,
            pool,
            created: Vec::new(),
        }
    }

    /// Add a fresh node.
    pub fn add<N: AudioNode + 'static>(&mut self, node: N) -> NodeId {
        let id = self.graph.add(node);
        self.created.push(id);
        id
    }

    /// Check a node out of the pool.
    pub fn checkout<N, F>(&mut self, kind: NodeKind, make: F) -> Result<NodeId, SynthError>
    where
        N: AudioNode + 'static,
        F: FnOnce() -> N,
    {
        let id = self.pool.checkout(self.graph, kind, make)?;
        self.created.push(id);
        Ok(id)
    }

    /// Nodes built through this context so far.
    pub fn created(&self) -> &[NodeId] {
        &self.created
    }
}

/// What a source generator built.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceOutput {
    /// Node the effect chain continues from.
    pub output: NodeId,
    /// Scheduled source whose end marks the end of the voice.
    pub anchor: NodeId,
    /// Every node created, `output` and `anchor` included.
    pub nodes: Vec<NodeId>,
}

/// Source generator signature.
pub type SourceFn =
    dyn Fn(&mut SourceContext<'_>, &Event, &SourceTrigger) -> Result<SourceOutput, SynthError> + Send + Sync;

struct SourceEntry {
    info: SourceInfo,
    generator: Arc<SourceFn>,
}

/// Named source generators.
///
/// ```rust
/// use dough_engine::SourceRegistry;
///
/// let registry = SourceRegistry::new();
/// assert!(registry.contains("sawtooth"));
/// assert!(registry.contains("pink"));
/// assert!(!registry.contains("piano"));
/// ```
pub struct SourceRegistry {
    entries: BTreeMap<String, SourceEntry>,
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceRegistry {
    /// Registry with the built-in synth sources.
    pub fn new() -> Self {
        let mut registry = Self {
            entries: BTreeMap::new(),
        };
        registry.register_builtin_sources();
        registry
    }

    fn register_builtin_sources(&mut self) {
        for (names, waveform, description) in [
            (&["sine", "sin"][..], Waveform::Sine, "Sine oscillator"),
            (&["square", "sqr"][..], Waveform::Square, "Band-limited square"),
            (&["sawtooth", "saw"][..], Waveform::Sawtooth, "Band-limited sawtooth"),
            (&["triangle", "tri"][..], Waveform::Triangle, "Triangle oscillator"),
        ] {
            for name in names {
                self.register(
                    name,
                    SourceInfo {
                        kind: SourceKind::Synth,
                        description: description.into(),
                    },
                    move |ctx, event, trigger| oscillator_source(ctx, event, trigger, waveform),
                );
            }
        }

        for (name, color) in [
            ("white", NoiseColor::White),
            ("pink", NoiseColor::Pink),
            ("brown", NoiseColor::Brown),
        ] {
            self.register(
                name,
                SourceInfo {
                    kind: SourceKind::Synth,
                    description: format!("{name} noise"),
                },
                move |ctx, _event, trigger| noise_source(ctx, trigger, color),
            );
        }

        self.register(
            "supersaw",
            SourceInfo {
                kind: SourceKind::Synth,
                description: "Detuned saw stack".into(),
            },
            supersaw_source,
        );

        self.register(
            "pulse",
            SourceInfo {
                kind: SourceKind::Synth,
                description: "Variable-width pulse".into(),
            },
            pulse_source,
        );
    }

    /// Register (or replace) a source.
    pub fn register<F>(&mut self, name: &str, info: SourceInfo, generator: F)
    where
        F: Fn(&mut SourceContext<'_>, &Event, &SourceTrigger) -> Result<SourceOutput, SynthError>
            + Send
            + Sync
            + 'static,
    {
        self.entries.insert(
            name.to_string(),
            SourceEntry {
                info,
                generator: Arc::new(generator),
            },
        );
    }

    /// Register a wavetable under `name`.
    pub fn register_wavetable(&mut self, name: &str, table: Wavetable) {
        let table = Arc::new(table);
        self.register(
            name,
            SourceInfo {
                kind: SourceKind::Wavetable,
                description: format!(
                    "Wavetable, {} frames of {} samples",
                    table.frame_count(),
                    table.frame_len()
                ),
            },
            move |ctx, event, trigger| wavetable_source(ctx, event, trigger, &table),
        );
    }

    /// Generator for `name`.
    pub fn get(&self, name: &str) -> Option<Arc<SourceFn>> {
        self.entries.get(name).map(|e| Arc::clone(&e.generator))
    }

    /// Metadata for `name`.
    pub fn info(&self, name: &str) -> Option<&SourceInfo> {
        self.entries.get(name).map(|e| &e.info)
    }

    /// True if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

/// Frequency in Hz from `freq`, else `note` (number or name), else `n`, else the default note.
pub fn resolve_frequency(event: &Event) -> Result<f32, SynthError> {
    if let Some(freq) = event.number("freq")? {
        return Ok(freq as f32);
    }
    let note = match event.note()? {
        Some(note) => note,
        None => event.number("n")?.unwrap_or(DEFAULT_NOTE),
    };
    Ok(midi_to_freq(note as f32))
}

fn noise_seed(trigger: &SourceTrigger) -> u32 {
    let bits = trigger.begin.to_bits();
    ((bits ^ (bits >> 32)) as u32) | 1
}

/// Schedule a one-shot node across the trigger.
fn schedule(graph: &mut Graph, node: NodeId, trigger: &SourceTrigger) -> Result<(), SynthError> {
    graph.start(node, trigger.begin)?;
    graph.stop(node, trigger.release_end)?;
    Ok(())
}

/// Append the amplitude-envelope gain and package the output.
///
/// `side` holds nodes that feed parameters rather than the audio path.
fn finish(
    ctx: &mut SourceContext<'_>,
    mut chain: Chain,
    side: Vec<NodeId>,
    anchor: NodeId,
    trigger: &SourceTrigger,
) -> Result<SourceOutput, SynthError> {
    let env = ctx.checkout(NodeKind::Gain, GainNode::new)?;
    apply_adsr(
        ctx.graph.param_mut(env, "gain")?,
        &trigger.envelope,
        0.0,
        1.0,
        trigger.begin,
        trigger.end,
        RampCurve::Linear,
    );
    chain.push(ctx.graph, Role::Source, env)?;
    let mut nodes: Vec<NodeId> = chain.links().iter().map(|&(_, node)| node).collect();
    nodes.extend(side);
    Ok(SourceOutput {
        output: env,
        anchor,
        nodes,
    })
}

fn oscillator_source(
    ctx: &mut SourceContext<'_>,
    event: &Event,
    trigger: &SourceTrigger,
    waveform: Waveform,
) -> Result<SourceOutput, SynthError> {
    let sample_rate = ctx.graph.sample_rate();
    let frequency = resolve_frequency(event)?;
    let detune = event.number_or("detune", 0.0)? as f32;
    let osc = ctx.add(OscillatorNode::new(sample_rate, waveform));
    ctx.graph.param_mut(osc, "frequency")?.set_value(frequency);
    ctx.graph.param_mut(osc, "detune")?.set_value(detune);
    schedule(ctx.graph, osc, trigger)?;
    let mut chain = Chain::new(Role::Source, osc);
    let mut side = Vec::new();

    // FM: operator -> index gain -> carrier frequency
    if let Some(index) = event.number_f32("fmi")?.filter(|&i| i != 0.0) {
        let harmonicity = event.number_or("fmh", 1.0)? as f32;
        let mod_wave = match event.text("fmwave")? {
            Some(name) => Waveform::from_name(name)
                .ok_or_else(|| SynthError::MalformedEvent(format!("unknown fm waveform '{name}'")))?,
            None => Waveform::Sine,
        };
        let mod_freq = frequency * harmonicity;
        let operator = ctx.add(OscillatorNode::new(sample_rate, mod_wave));
        ctx.graph.param_mut(operator, "frequency")?.set_value(mod_freq);
        schedule(ctx.graph, operator, trigger)?;
        let depth = ctx.checkout(NodeKind::Gain, GainNode::new)?;
        ctx.graph.param_mut(depth, "gain")?.set_value(index * mod_freq);
        ctx.graph.connect(operator, depth)?;
        ctx.graph.connect_param(depth, osc, "frequency")?;
        side.extend([operator, depth]);
    }

    if let Some(rate) = event.number_f32("vib")?.filter(|&v| v > 0.0) {
        let semitones = event.number_or("vibmod", 0.5)? as f32;
        let lfo = ctx.checkout(NodeKind::Lfo, || LfoNode::new(sample_rate))?;
        if let Some(node) = ctx.graph.node_mut::<LfoNode>(lfo) {
            node.generator_mut().set_shape(PeriodicShape::Sine);
            node.set_initial_phase(0.0);
        }
        ctx.graph.param_mut(lfo, "frequency")?.set_value(rate);
        // output spans ±depth/2, in cents
        ctx.graph.param_mut(lfo, "depth")?.set_value(semitones * 200.0);
        ctx.graph.start(lfo, trigger.begin)?;
        ctx.graph.set_end_time(lfo, trigger.release_end)?;
        ctx.graph.connect_param(lfo, osc, "detune")?;
        side.push(lfo);
    }

    if let Some(semitones) = event.number_f32("penv")?.filter(|&p| p != 0.0) {
        let shape = resolve_envelope(
            [
                event.number("pattack")?,
                event.number("pdecay")?,
                event.number("psustain")?,
                event.number("prelease")?,
            ],
            DEFAULT_PITCH_ENVELOPE,
        );
        apply_adsr(
            ctx.graph.param_mut(osc, "detune")?,
            &shape,
            detune,
            detune + semitones * 100.0,
            trigger.begin,
            trigger.end,
            RampCurve::Linear,
        );
    }

    if let Some(level) = event.number_f32("noise")?.filter(|&n| n > 0.0) {
        let noise = ctx.add(NoiseNode::new(NoiseColor::White, noise_seed(trigger)));
        schedule(ctx.graph, noise, trigger)?;
        let mix = ctx.checkout(NodeKind::Gain, GainNode::new)?;
        ctx.graph.param_mut(mix, "gain")?.set_value(level);
        ctx.graph.connect(noise, mix)?;
        side.push(noise);
        chain.branch(Role::Source, mix);
    }

    finish(ctx, chain, side, osc, trigger)
}

fn noise_source(
    ctx: &mut SourceContext<'_>,
    trigger: &SourceTrigger,
    color: NoiseColor,
) -> Result<SourceOutput, SynthError> {
    let noise = ctx.add(NoiseNode::new(color, noise_seed(trigger)));
    schedule(ctx.graph, noise, trigger)?;
    finish(ctx, Chain::new(Role::Source, noise), Vec::new(), noise, trigger)
}

fn supersaw_source(
    ctx: &mut SourceContext<'_>,
    event: &Event,
    trigger: &SourceTrigger,
) -> Result<SourceOutput, SynthError> {
    let sample_rate = ctx.graph.sample_rate();
    let voices = event.number_or("unison", 5.0)?.max(1.0) as usize;
    let stereo = event.number_or("spread", 0.6)? as f32;
    let saw = ctx.add(SupersawNode::new(sample_rate, voices, stereo));
    ctx.graph.param_mut(saw, "frequency")?.set_value(resolve_frequency(event)?);
    // detune is the width of the fan in semitones here
    ctx.graph
        .param_mut(saw, "spread")?
        .set_value(event.number_or("detune", 0.18)? as f32);
    schedule(ctx.graph, saw, trigger)?;
    finish(ctx, Chain::new(Role::Source, saw), Vec::new(), saw, trigger)
}

fn pulse_source(
    ctx: &mut SourceContext<'_>,
    event: &Event,
    trigger: &SourceTrigger,
) -> Result<SourceOutput, SynthError> {
    let sample_rate = ctx.graph.sample_rate();
    let pulse = ctx.add(PulseNode::new(sample_rate));
    ctx.graph.param_mut(pulse, "frequency")?.set_value(resolve_frequency(event)?);
    ctx.graph
        .param_mut(pulse, "detune")?
        .set_value(event.number_or("detune", 0.0)? as f32);
    ctx.graph
        .param_mut(pulse, "pulsewidth")?
        .set_value(event.number_or("pw", 0.5)? as f32);
    schedule(ctx.graph, pulse, trigger)?;
    finish(ctx, Chain::new(Role::Source, pulse), Vec::new(), pulse, trigger)
}

fn wavetable_source(
    ctx: &mut SourceContext<'_>,
    event: &Event,
    trigger: &SourceTrigger,
    table: &Arc<Wavetable>,
) -> Result<SourceOutput, SynthError> {
    let mode = match event.get("wtwarpmode") {
        None => WarpMode::None,
        Some(ControlValue::Number(n)) => WarpMode::from_index(n.max(0.0) as usize),
        Some(ControlValue::Text(name)) => WarpMode::from_name(name)
            .ok_or_else(|| SynthError::MalformedEvent(format!("unknown warp mode '{name}'")))?,
        Some(_) => {
            return Err(SynthError::MalformedEvent("wtwarpmode should be a name or index".into()));
        }
    };
    let sample_rate = ctx.graph.sample_rate();
    let node = ctx.add(WavetableNode::new(sample_rate, Arc::clone(table), mode));
    ctx.graph.param_mut(node, "frequency")?.set_value(resolve_frequency(event)?);
    ctx.graph
        .param_mut(node, "detune")?
        .set_value(event.number_or("detune", 0.0)? as f32);
    ctx.graph
        .param_mut(node, "position")?
        .set_value(event.number_or("wtpos", 0.0)? as f32);
    ctx.graph
        .param_mut(node, "warp")?
        .set_value(event.number_or("wtwarp", 0.0)? as f32);
    schedule(ctx.graph, node, trigger)?;
    finish(ctx, Chain::new(Role::Source, node), Vec::new(), node, trigger)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trigger() -> SourceTrigger {
        SourceTrigger {
            begin: 0.0,
            end: 0.5,
            release_end: 0.51,
            cps: 0.5,
            cycle: 0.0,
            envelope: crate::controls::DEFAULT_AMP_ENVELOPE,
        }
    }

    fn build(registry: &SourceRegistry, name: &str, event: &Event) -> (Graph, SourceOutput) {
        let mut graph = Graph::new(48000.0, 128, 2);
        let mut pool = ResourcePool::new(true);
        let generator = registry.get(name).unwrap();
        let out = {
            let mut ctx = SourceContext::new(&mut graph, &mut pool);
            generator(&mut ctx, event, &trigger()).unwrap()
        };
        (graph, out)
    }

    #[test]
    fn test_builtin_aliases() {
        let registry = SourceRegistry::new();
        for name in ["sine", "sin", "saw", "sawtooth", "tri", "square", "white", "brown", "supersaw", "pulse"] {
            assert!(registry.contains(name), "{name}");
        }
        assert_eq!(registry.info("pink").unwrap().kind, SourceKind::Synth);
    }

    #[test]
    fn test_frequency_precedence() {
        let event = Event::new().with("freq", 220.0).with("note", 60);
        assert_eq!(resolve_frequency(&event).unwrap(), 220.0);
        let event = Event::new().with("note", "a4").with("n", 3);
        assert!((resolve_frequency(&event).unwrap() - 440.0).abs() < 1e-3);
        let event = Event::new();
        assert!((resolve_frequency(&event).unwrap() - midi_to_freq(36.0)).abs() < 1e-3);
    }

    #[test]
    fn test_oscillator_output_is_envelope_gain() {
        let registry = SourceRegistry::new();
        let (graph, out) = build(&registry, "saw", &Event::new().with("note", 48));
        assert_eq!(graph.kind(out.output), Some(NodeKind::Gain));
        assert_eq!(graph.kind(out.anchor), Some(NodeKind::Oscillator));
        assert_eq!(graph.inputs(out.output), &[out.anchor]);
        let gain = graph.param(out.output, "gain").unwrap();
        assert_eq!(gain.value_at(0.0), 0.0);
    }

    #[test]
    fn test_noise_layer_is_summed() {
        let registry = SourceRegistry::new();
        let (graph, out) = build(&registry, "sine", &Event::new().with("noise", 0.3));
        assert_eq!(graph.inputs(out.output).len(), 2);
        assert!(out.nodes.iter().any(|&n| graph.kind(n) == Some(NodeKind::Noise)));
    }

    #[test]
    fn test_vibrato_feeds_detune() {
        let registry = SourceRegistry::new();
        let (graph, out) = build(&registry, "tri", &Event::new().with("vib", 5.0));
        let lfo = out
            .nodes
            .iter()
            .copied()
            .find(|&n| graph.kind(n) == Some(NodeKind::Lfo))
            .unwrap();
        assert!(graph.param_outputs(lfo).contains(&(out.anchor, 1)));
    }

    #[test]
    fn test_unknown_fm_waveform() {
        let registry = SourceRegistry::new();
        let mut graph = Graph::new(48000.0, 128, 2);
        let mut pool = ResourcePool::new(true);
        let generator = registry.get("sine").unwrap();
        let mut ctx = SourceContext::new(&mut graph, &mut pool);
        let event = Event::new().with("fmi", 1.0).with("fmwave", "kazoo");
        assert!(matches!(
            generator(&mut ctx, &event, &trigger()),
            Err(SynthError::MalformedEvent(_))
        ));
        // the carrier was built before the failure and is on record
        assert_eq!(ctx.created().len(), 1);
    }

    #[test]
    fn test_wavetable_registration() {
        let mut registry = SourceRegistry::new();
        let table = Wavetable::new(vec![vec![0.0, 1.0, 0.0, -1.0]; 2]).unwrap();
        registry.register_wavetable("wt_test", table);
        assert_eq!(registry.info("wt_test").unwrap().kind, SourceKind::Wavetable);
        let (graph, out) = build(&registry, "wt_test", &Event::new().with("wtpos", 0.5));
        assert_eq!(graph.kind(out.anchor), Some(NodeKind::Wavetable));
        assert_eq!(graph.param(out.anchor, "position").unwrap().value(), 0.5);
    }

    #[test]
    fn test_custom_source() {
        let mut registry = SourceRegistry::new();
        registry.register("click", SourceInfo::custom("one gain"), |ctx, _event, _trigger| {
            let node = ctx.graph.add(GainNode::new());
            Ok(SourceOutput {
                output: node,
                anchor: node,
                nodes: vec![node],
            })
        });
        assert_eq!(registry.names().filter(|&n| n == "click").count(), 1);
        let (_, out) = build(&registry, "click", &Event::new());
        assert_eq!(out.nodes, vec![out.output]);
    }
}
