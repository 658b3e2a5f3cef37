//! Modulation router.
//!
//! [`CONTROL_TARGETS`] maps a control name (optionally qualified by a
//! sub-control) to the voice role and parameter it modulates. [`attach`]
//! resolves a [`ModulatorSpec`] against a voice's tracker, builds the signal
//! (LFO, envelope or bus tap), scales it to the target's current value,
//! inserts a clamp when a finite range applies, and patches it into every
//! node filed under the role.

use dough_core::{Graph, NodeId, NodeKind};
use dough_effects::{ClampNode, GainNode};
use dough_synth::{EnvelopeNode, LfoNode};

use crate::bus::BusMap;
use crate::controls::{ModSignal, ModulatorSpec};
use crate::error::SynthError;
use crate::pool::ResourcePool;
use crate::voice::{Role, Voice};

/// Octaves either side of the current value a frequency modulation may reach.
pub const FREQUENCY_SAFE_OCTAVES: f32 = 4.0;
/// Lowest frequency a modulation may drive a filter to.
pub const FREQUENCY_FLOOR: f32 = 20.0;

/// One row of the control-target table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlTarget {
    /// Control names this row answers to.
    pub controls: &'static [&'static str],
    /// Required sub-control, if any.
    pub subcontrol: Option<&'static str>,
    /// Voice role holding the target nodes.
    pub role: Role,
    /// Parameter names, first one the node has wins.
    pub params: &'static [&'static str],
}

impl ControlTarget {
    const fn new(controls: &'static [&'static str], role: Role, params: &'static [&'static str]) -> Self {
        Self {
            controls,
            subcontrol: None,
            role,
            params,
        }
    }

    const fn sub(
        controls: &'static [&'static str],
        subcontrol: &'static str,
        role: Role,
        params: &'static [&'static str],
    ) -> Self {
        Self {
            controls,
            subcontrol: Some(subcontrol),
            role,
            params,
        }
    }

    /// True for cutoff-like targets that get an automatic safe range.
    pub fn is_frequency(&self) -> bool {
        self.params.iter().any(|p| matches!(*p, "frequency" | "center"))
    }
}

const LPF: &[&str] = &["cutoff", "lpf"];
const HPF: &[&str] = &["hcutoff", "hpf"];
const BPF: &[&str] = &["bandf", "bpf"];
const RESONANCE: &[&str] = &["Q", "q"];

/// Control name to (role, parameter).
pub const CONTROL_TARGETS: &[ControlTarget] = &[
    ControlTarget::new(&["gain", "velocity"], Role::Gain, &["gain"]),
    ControlTarget::new(&["postgain"], Role::PostGain, &["gain"]),
    ControlTarget::new(&["freq"], Role::Source, &["frequency"]),
    ControlTarget::new(&["detune"], Role::Source, &["detune"]),
    ControlTarget::new(&["pw"], Role::Source, &["pulsewidth"]),
    ControlTarget::new(&["wtpos"], Role::Source, &["position"]),
    ControlTarget::new(&["wtwarp"], Role::Source, &["warp"]),
    ControlTarget::new(LPF, Role::Lpf, &["frequency"]),
    ControlTarget::sub(LPF, "q", Role::Lpf, RESONANCE),
    ControlTarget::sub(LPF, "resonance", Role::Lpf, RESONANCE),
    ControlTarget::sub(LPF, "detune", Role::Lpf, &["detune"]),
    ControlTarget::new(&["resonance", "lpq"], Role::Lpf, RESONANCE),
    ControlTarget::new(HPF, Role::Hpf, &["frequency"]),
    ControlTarget::sub(HPF, "q", Role::Hpf, RESONANCE),
    ControlTarget::sub(HPF, "resonance", Role::Hpf, RESONANCE),
    ControlTarget::new(&["hresonance", "hpq"], Role::Hpf, RESONANCE),
    ControlTarget::new(BPF, Role::Bpf, &["frequency"]),
    ControlTarget::sub(BPF, "q", Role::Bpf, RESONANCE),
    ControlTarget::new(&["bandq", "bpq"], Role::Bpf, RESONANCE),
    ControlTarget::new(&["crush"], Role::Crush, &["crush"]),
    ControlTarget::new(&["coarse"], Role::Coarse, &["coarse"]),
    ControlTarget::new(&["shape"], Role::Shape, &["shape"]),
    ControlTarget::new(&["shapevol"], Role::Shape, &["postgain"]),
    ControlTarget::new(&["distort"], Role::Distort, &["distort"]),
    ControlTarget::new(&["distortvol"], Role::Distort, &["postgain"]),
    ControlTarget::new(&["compressor"], Role::Compressor, &["threshold"]),
    ControlTarget::sub(&["compressor"], "ratio", Role::Compressor, &["ratio"]),
    ControlTarget::sub(&["compressor"], "knee", Role::Compressor, &["knee"]),
    ControlTarget::sub(&["compressor"], "attack", Role::Compressor, &["attack"]),
    ControlTarget::sub(&["compressor"], "release", Role::Compressor, &["release"]),
    ControlTarget::new(&["compressorRatio"], Role::Compressor, &["ratio"]),
    ControlTarget::new(&["compressorKnee"], Role::Compressor, &["knee"]),
    ControlTarget::new(&["compressorAttack"], Role::Compressor, &["attack"]),
    ControlTarget::new(&["compressorRelease"], Role::Compressor, &["release"]),
    ControlTarget::new(&["pan"], Role::Pan, &["pan"]),
    ControlTarget::new(&["phaserrate"], Role::Phaser, &["rate"]),
    ControlTarget::new(&["phaserdepth"], Role::Phaser, &["depth"]),
    ControlTarget::new(&["phasercenter"], Role::Phaser, &["center"]),
    ControlTarget::new(&["phasersweep"], Role::Phaser, &["sweep"]),
    ControlTarget::new(&["pshift"], Role::PitchShift, &["shift"]),
    ControlTarget::new(&["delay"], Role::DelaySend, &["gain"]),
    ControlTarget::new(&["room"], Role::RoomSend, &["gain"]),
    ControlTarget::new(&["busgain"], Role::BusSend, &["gain"]),
];

/// Look up a control, optionally qualified by a sub-control.
///
/// ```rust
/// use dough_engine::{resolve_target, Role};
///
/// assert_eq!(resolve_target("cutoff", None).unwrap().role, Role::Lpf);
/// assert_eq!(resolve_target("lpf", Some("q")).unwrap().params[0], "Q");
/// assert!(resolve_target("banana", None).is_none());
/// ```
pub fn resolve_target(control: &str, subcontrol: Option<&str>) -> Option<&'static ControlTarget> {
    CONTROL_TARGETS
        .iter()
        .find(|t| t.subcontrol == subcontrol && t.controls.contains(&control))
}

/// Timing of the voice a modulator attaches to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceTiming {
    /// Trigger time.
    pub begin: f64,
    /// Gate close.
    pub end: f64,
    /// Release end of the voice.
    pub release_end: f64,
    /// Pattern cycles per second.
    pub cps: f64,
    /// Pattern cycle position of the trigger.
    pub cycle: f64,
}

/// What an attachment built.
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    /// Resolved role.
    pub role: Role,
    /// Resolved parameter.
    pub param: &'static str,
    /// Depth in target units.
    pub depth: f32,
    /// Nodes created, all filed under [`Role::Modulator`].
    pub nodes: Vec<NodeId>,
    /// Nodes whose parameter now receives the signal.
    pub targets: Vec<NodeId>,
}

fn target_nodes(graph: &Graph, voice: &Voice, target: &ControlTarget) -> Vec<(NodeId, &'static str)> {
    let candidates: Vec<NodeId> = if target.role == Role::Source {
        vec![voice.anchor()]
    } else {
        voice.nodes(target.role).to_vec()
    };
    candidates
        .into_iter()
        .filter_map(|node| {
            target
                .params
                .iter()
                .find(|p| graph.has_param(node, p))
                .map(|&p| (node, p))
        })
        .collect()
}

/// Attach one modulator block to `voice`.
///
/// Fails with `NotModulatable` for a control the table does not know and
/// with `UnresolvedTarget` when the voice has no node for the role. Nothing
/// is built in either case.
/// Any node built is filed under [`Role::Modulator`] as soon as it is
/// checked out, so a later failure leaves it owned by the voice.
pub fn attach(
    graph: &mut Graph,
    pool: &mut ResourcePool,
    buses: &mut BusMap,
    voice: &mut Voice,
    spec: &ModulatorSpec,
    timing: &VoiceTiming,
) -> Result<Attachment, SynthError> {
    let target = resolve_target(&spec.control, spec.subcontrol.as_deref())
        .ok_or_else(|| SynthError::NotModulatable(spec.control.clone()))?;
    let targets = target_nodes(graph, voice, target);
    let Some(&(first, param)) = targets.first() else {
        return Err(SynthError::UnresolvedTarget {
            control: spec.control.clone(),
            role: target.role.name(),
        });
    };

    let current = graph.param(first, param)?.value_at(timing.begin);
    let depth = spec.depth.scale(current);
    let sample_rate = graph.sample_rate();
    let mut nodes = Vec::new();

    let (mut lo, mut hi) = if target.is_frequency() {
        let span = libm::exp2f(FREQUENCY_SAFE_OCTAVES);
        (
            Some((current / span).max(FREQUENCY_FLOOR)),
            Some((current * span).min(sample_rate / 2.0)),
        )
    } else {
        (None, None)
    };

    let signal = match &spec.signal {
        ModSignal::Lfo(lfo) => {
            let node = pool.checkout(graph, NodeKind::Lfo, || LfoNode::new(sample_rate))?;
            voice.track(Role::Modulator, node);
            if let Some(lfo_node) = graph.node_mut::<LfoNode>(node) {
                let generator = lfo_node.generator_mut();
                generator.set_shape(lfo.shape.clone());
                generator.set_skew(lfo.skew);
                generator.set_curve(lfo.curve);
                generator.set_dc_offset(lfo.dc_offset);
                lfo_node.set_initial_phase(lfo.rate.start_phase(timing.cycle, lfo.phase));
            }
            graph.param_mut(node, "frequency")?.set_value(lfo.rate.hz(timing.cps));
            graph.param_mut(node, "depth")?.set_value(depth);
            graph.start(node, timing.begin)?;
            graph.set_end_time(node, timing.release_end)?;
            if let Some(min) = lfo.min {
                lo = Some(lo.map_or(min, |l| l.max(min)));
            }
            if let Some(max) = lfo.max {
                hi = Some(hi.map_or(max, |h| h.min(max)));
            }
            nodes.push(node);
            node
        }
        ModSignal::Envelope(env) => {
            let node = pool.checkout(graph, NodeKind::Envelope, || EnvelopeNode::new(sample_rate))?;
            voice.track(Role::Modulator, node);
            if let Some(env_node) = graph.node_mut::<EnvelopeNode>(node) {
                let kernel = env_node.envelope_mut();
                kernel.set_shape(env.shape);
                kernel.set_retrigger(env.retrigger);
                env_node.set_gate_off(timing.end);
            }
            graph.param_mut(node, "depth")?.set_value(depth);
            graph.start(node, timing.begin)?;
            graph.set_end_time(node, timing.end + f64::from(env.shape.release).max(0.0))?;
            nodes.push(node);
            node
        }
        ModSignal::Bus(name) => {
            let bus = buses.get_or_create(graph, name);
            let node = pool.checkout(graph, NodeKind::Gain, GainNode::new)?;
            voice.track(Role::Modulator, node);
            graph.param_mut(node, "gain")?.set_value(depth);
            graph.connect(bus, node)?;
            nodes.push(node);
            node
        }
    };

    let output = if lo.is_some() || hi.is_some() {
        let clamp = pool.checkout(graph, NodeKind::Clamp, ClampNode::new)?;
        voice.track(Role::Modulator, clamp);
        // the clamp sees the offset from the current value, not the value
        if let Some(lo) = lo {
            graph.param_mut(clamp, "min")?.set_value(lo - current);
        }
        if let Some(hi) = hi {
            graph.param_mut(clamp, "max")?.set_value(hi - current);
        }
        graph.connect(signal, clamp)?;
        nodes.push(clamp);
        clamp
    } else {
        signal
    };

    for &(node, name) in &targets {
        graph.connect_param(output, node, name)?;
    }
    tracing::debug!(
        target: "dough::router",
        control = %spec.control,
        role = %target.role,
        param,
        depth,
        targets = targets.len(),
        "modulator attached"
    );
    Ok(Attachment {
        role: target.role,
        param,
        depth,
        nodes,
        targets: targets.into_iter().map(|(node, _)| node).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controls::{EnvSpec, LfoSpec, ModDepth, Rate};
    use dough_core::BiquadKind;
    use dough_effects::{BiquadNode, PannerNode};
    use dough_synth::{EnvelopeShape, PeriodicShape};

    fn timing() -> VoiceTiming {
        VoiceTiming {
            begin: 0.0,
            end: 1.0,
            release_end: 1.1,
            cps: 0.5,
            cycle: 0.0,
        }
    }

    fn lfo_spec(control: &str, depth: ModDepth) -> ModulatorSpec {
        ModulatorSpec {
            id: None,
            control: control.into(),
            subcontrol: None,
            depth,
            signal: ModSignal::Lfo(LfoSpec {
                rate: Rate::Hz(2.0),
                shape: PeriodicShape::Sine,
                skew: 0.5,
                curve: 1.0,
                dc_offset: -0.5,
                phase: 0.0,
                min: None,
                max: None,
            }),
        }
    }

    fn relative(relative: f32) -> ModDepth {
        ModDepth {
            relative,
            absolute: None,
        }
    }

    fn voice_with(graph: &mut Graph, role: Role, node: NodeId) -> Voice {
        let out = graph.add(GainNode::new());
        let mut voice = Voice::new(vec![out], out, 0.0, 1.0, 1.1);
        voice.push(graph, role, node).unwrap();
        voice
    }

    #[test]
    fn test_every_table_row_names_a_known_control() {
        for row in CONTROL_TARGETS {
            for control in row.controls {
                assert_eq!(
                    resolve_target(control, row.subcontrol).map(|t| (t.role, t.params)),
                    Some((row.role, row.params)),
                    "{control}"
                );
            }
        }
    }

    #[test]
    fn test_cutoff_lfo_gets_safe_range() {
        let mut g = Graph::new(48000.0, 128, 2);
        let mut pool = ResourcePool::new(true);
        let mut buses = BusMap::new();
        let lpf = g.add(BiquadNode::new(BiquadKind::Lowpass));
        g.param_mut(lpf, "frequency").unwrap().set_value(1000.0);
        let mut voice = voice_with(&mut g, Role::Lpf, lpf);
        let spec = lfo_spec("cutoff", relative(0.5));
        let att = attach(&mut g, &mut pool, &mut buses, &mut voice, &spec, &timing()).unwrap();
        assert_eq!(att.role, Role::Lpf);
        assert_eq!(att.depth, 500.0);
        assert_eq!(att.nodes.len(), 2);
        let clamp = att.nodes[1];
        assert_eq!(g.kind(clamp), Some(NodeKind::Clamp));
        assert!((g.param(clamp, "min").unwrap().value() - (62.5 - 1000.0)).abs() < 1e-3);
        assert!((g.param(clamp, "max").unwrap().value() - 15000.0).abs() < 1e-3);
        assert_eq!(g.param_outputs(clamp).len(), 1);
        assert_eq!(voice.nodes(Role::Modulator).len(), 2);
    }

    #[test]
    fn test_plain_target_skips_clamp() {
        let mut g = Graph::new(48000.0, 128, 2);
        let mut pool = ResourcePool::new(true);
        let mut buses = BusMap::new();
        let pan = g.add(PannerNode::new());
        let mut voice = voice_with(&mut g, Role::Pan, pan);
        let spec = lfo_spec("pan", relative(0.5));
        let att = attach(&mut g, &mut pool, &mut buses, &mut voice, &spec, &timing()).unwrap();
        // pan sits at zero, so the relative depth scales against one
        assert_eq!(att.depth, 0.5);
        assert_eq!(att.nodes.len(), 1);
        assert_eq!(g.kind(att.nodes[0]), Some(NodeKind::Lfo));
    }

    #[test]
    fn test_unknown_control_is_not_modulatable() {
        let mut g = Graph::new(48000.0, 128, 2);
        let mut pool = ResourcePool::new(true);
        let mut buses = BusMap::new();
        let pan = g.add(PannerNode::new());
        let mut voice = voice_with(&mut g, Role::Pan, pan);
        let before = g.node_count();
        let err = attach(
            &mut g,
            &mut pool,
            &mut buses,
            &mut voice,
            &lfo_spec("banana", relative(1.0)),
            &timing(),
        )
        .unwrap_err();
        assert_eq!(err, SynthError::NotModulatable("banana".into()));
        assert_eq!(g.node_count(), before);
    }

    #[test]
    fn test_missing_role_is_unresolved() {
        let mut g = Graph::new(48000.0, 128, 2);
        let mut pool = ResourcePool::new(true);
        let mut buses = BusMap::new();
        let pan = g.add(PannerNode::new());
        let mut voice = voice_with(&mut g, Role::Pan, pan);
        let before = g.node_count();
        let err = attach(
            &mut g,
            &mut pool,
            &mut buses,
            &mut voice,
            &lfo_spec("hcutoff", relative(1.0)),
            &timing(),
        )
        .unwrap_err();
        assert!(matches!(err, SynthError::UnresolvedTarget { role: "hpf", .. }));
        assert_eq!(g.node_count(), before);
    }

    #[test]
    fn test_envelope_on_gain() {
        let mut g = Graph::new(48000.0, 128, 2);
        let mut pool = ResourcePool::new(true);
        let mut buses = BusMap::new();
        let gain = g.add(GainNode::new());
        let mut voice = voice_with(&mut g, Role::Gain, gain);
        let spec = ModulatorSpec {
            id: Some("swell".into()),
            control: "gain".into(),
            subcontrol: None,
            depth: ModDepth {
                relative: 1.0,
                absolute: Some(0.25),
            },
            signal: ModSignal::Envelope(EnvSpec {
                shape: EnvelopeShape::default(),
                retrigger: false,
            }),
        };
        let att = attach(&mut g, &mut pool, &mut buses, &mut voice, &spec, &timing()).unwrap();
        assert_eq!(att.depth, 0.25);
        let env = att.nodes[0];
        assert_eq!(g.kind(env), Some(NodeKind::Envelope));
        assert!((g.end_time(env).unwrap() - 1.1).abs() < 1e-6);
    }

    #[test]
    fn test_bus_modulator_reads_named_bus() {
        let mut g = Graph::new(48000.0, 128, 2);
        let mut pool = ResourcePool::new(true);
        let mut buses = BusMap::new();
        let gain = g.add(GainNode::new());
        let mut voice = voice_with(&mut g, Role::Gain, gain);
        let spec = ModulatorSpec {
            id: None,
            control: "gain".into(),
            subcontrol: None,
            depth: relative(1.0),
            signal: ModSignal::Bus("side".into()),
        };
        let att = attach(&mut g, &mut pool, &mut buses, &mut voice, &spec, &timing()).unwrap();
        let bus = buses.get("side").unwrap();
        assert_eq!(g.outputs(bus), &[att.nodes[0]]);
    }
}
