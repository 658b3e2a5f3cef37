//! Integration tests for dough-effects.
//!
//! Runs the effect nodes inside a dough-core graph fed by dough-synth
//! sources: echo timing, reverb tails, worklet lifetimes, modulation
//! clamping and vocoder latency.

use dough_core::{BiquadKind, Graph, NodeId};
use dough_effects::{
    BiquadNode, ClampNode, CrushNode, DelayNode, GainNode, PitchShiftNode, ReverbNode,
    ReverbSettings, pitch_shift,
};
use dough_synth::{ConstantNode, NoiseColor, NoiseNode, OscillatorNode, Waveform};

const SR: f32 = 48000.0;

fn render(graph: &mut Graph, blocks: usize) -> Vec<f32> {
    let mut left = Vec::new();
    for _ in 0..blocks {
        graph.render_block();
        left.extend_from_slice(&graph.output()[0]);
    }
    left
}

fn constant(graph: &mut Graph, value: f32, start: f64, stop: Option<f64>) -> NodeId {
    let dc = graph.add(ConstantNode::new());
    graph.param_mut(dc, "offset").unwrap().set_value(value);
    graph.start(dc, start).unwrap();
    if let Some(stop) = stop {
        graph.stop(dc, stop).unwrap();
    }
    dc
}

fn energy(signal: &[f32]) -> f32 {
    signal.iter().map(|s| s * s).sum::<f32>() / signal.len().max(1) as f32
}

#[test]
fn delay_echo_lands_at_delay_time() {
    let mut graph = Graph::new(SR, 128, 2);
    let click = constant(&mut graph, 1.0, 0.0, Some(1.0 / f64::from(SR)));
    let delay = graph.add(DelayNode::new(SR));
    graph.param_mut(delay, "time").unwrap().set_value(0.01);
    graph.param_mut(delay, "feedback").unwrap().set_value(0.0);
    graph.connect(click, delay).unwrap();
    graph.connect_output(delay, &[]).unwrap();
    let out = render(&mut graph, 8);
    assert!(out[..480].iter().all(|s| s.abs() < 1e-6));
    assert!((out[480] - 1.0).abs() < 1e-3);
    assert!(out[482..].iter().all(|s| s.abs() < 1e-3));
}

#[test]
fn reverb_tail_outlives_its_source() {
    let mut graph = Graph::new(SR, 128, 2);
    let burst = graph.add(NoiseNode::new(NoiseColor::White, 3));
    graph.start(burst, 0.0).unwrap();
    graph.stop(burst, 0.01).unwrap();
    let mut reverb = ReverbNode::new(SR);
    reverb.configure(ReverbSettings {
        size: 0.3,
        ..Default::default()
    });
    let room = graph.add(reverb);
    graph.connect(burst, room).unwrap();
    graph.connect_output(room, &[]).unwrap();
    let out = render(&mut graph, 40);
    assert!(!graph.contains(burst));
    assert!(energy(&out[2400..4800]) > 1e-6);
    assert!(energy(&out[4800..]) < energy(&out[..4800]));
}

#[test]
fn worklet_finishes_after_grace() {
    let mut graph = Graph::new(SR, 128, 2);
    graph.set_worklet_grace(0.0);
    let crush = graph.add(CrushNode::new());
    let gain = graph.add(GainNode::new());
    graph.set_end_time(crush, 0.001).unwrap();
    graph.connect(crush, gain).unwrap();
    render(&mut graph, 1);
    assert!(graph.contains(crush));
    render(&mut graph, 1);
    assert!(!graph.contains(crush));
    assert!(graph.contains(gain));
    assert!(graph.inputs(gain).is_empty());
}

#[test]
fn clamp_limits_parameter_modulation() {
    let mut graph = Graph::new(SR, 128, 2);
    let carrier = constant(&mut graph, 1.0, 0.0, None);
    let gain = graph.add(GainNode::new());
    graph.param_mut(gain, "gain").unwrap().set_value(0.0);
    let modulator = constant(&mut graph, 5.0, 0.0, None);
    let clamp = graph.add(ClampNode::new());
    graph.param_mut(clamp, "max").unwrap().set_value(0.75);
    graph.connect(carrier, gain).unwrap();
    graph.connect(modulator, clamp).unwrap();
    graph.connect_param(clamp, gain, "gain").unwrap();
    graph.connect_output(gain, &[]).unwrap();
    let out = render(&mut graph, 1);
    assert!(out.iter().all(|&s| (s - 0.75).abs() < 1e-6));
}

#[test]
fn lowpass_sweep_darkens_noise() {
    let mut graph = Graph::new(SR, 128, 2);
    let noise = graph.add(NoiseNode::new(NoiseColor::White, 11));
    graph.start(noise, 0.0).unwrap();
    let lpf = graph.add(BiquadNode::new(BiquadKind::Lowpass));
    let cutoff = graph.param_mut(lpf, "frequency").unwrap();
    cutoff.set_value_at_time(12000.0, 0.0);
    cutoff.exponential_ramp_to_value_at_time(100.0, 0.1);
    graph.connect(noise, lpf).unwrap();
    graph.connect_output(lpf, &[]).unwrap();
    let out = render(&mut graph, 75);
    assert!(energy(&out[..1200]) > 10.0 * energy(&out[4800..]));
}

#[test]
fn pitch_shifter_is_silent_for_its_latency() {
    let mut graph = Graph::new(SR, 128, 2);
    let osc = graph.add(OscillatorNode::new(SR, Waveform::Sine));
    graph.start(osc, 0.0).unwrap();
    let shifter = graph.add(PitchShiftNode::new(SR));
    graph.param_mut(shifter, "shift").unwrap().set_value(7.0);
    graph.connect(osc, shifter).unwrap();
    graph.connect_output(shifter, &[]).unwrap();
    let out = render(&mut graph, 40);
    assert!(out[..pitch_shift::LATENCY].iter().all(|s| s.abs() < 1e-4));
    assert!(out[pitch_shift::LATENCY + 2048..].iter().any(|s| s.abs() > 0.3));
}
