//! Audio-rate oscillators with PolyBLEP anti-aliasing.
//!
//! [`Oscillator`] is the bare kernel; [`OscillatorNode`] and [`PulseNode`]
//! put it in the graph with automatable `frequency` and `detune` (cents)
//! parameters, so FM operators, vibrato LFOs and pitch envelopes can reach
//! them through parameter edges.

use core::any::Any;
use core::f32::consts::TAU;

use dough_core::{
    AudioNode, NodeKind, NodeState, ParamSpec, ProcessContext, StereoBlock, cents_to_ratio,
    poly_blep, wrap_phase,
};
use libm::sinf;

/// Oscillator waveforms.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Waveform {
    /// Pure fundamental.
    Sine,
    /// Odd harmonics, soft.
    #[default]
    Triangle,
    /// All harmonics, bright.
    Sawtooth,
    /// 50% duty pulse.
    Square,
    /// Variable duty pulse (0..1).
    Pulse(f32),
}

impl Waveform {
    /// Parse a source name (`sine`, `triangle`/`tri`, `sawtooth`/`saw`, `square`/`sqr`).
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "sine" | "sin" => Self::Sine,
            "triangle" | "tri" => Self::Triangle,
            "sawtooth" | "saw" => Self::Sawtooth,
            "square" | "sqr" => Self::Square,
            _ => return None,
        })
    }
}

/// Band-limited oscillator kernel.
///
/// ```rust
/// use dough_synth::{Oscillator, Waveform};
///
/// let mut osc = Oscillator::new(48000.0, Waveform::Sawtooth);
/// let first = osc.advance(440.0);
/// assert!(first.abs() <= 1.0);
/// ```
#[derive(Debug, Clone)]
pub struct Oscillator {
    waveform: Waveform,
    sample_rate: f32,
    phase: f32,
}

impl Oscillator {
    /// Oscillator at phase 0.
    pub fn new(sample_rate: f32, waveform: Waveform) -> Self {
        Self {
            waveform,
            sample_rate,
            phase: 0.0,
        }
    }

    /// Change the waveform.
    pub fn set_waveform(&mut self, waveform: Waveform) {
        self.waveform = waveform;
    }

    /// Current waveform.
    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    /// Set the phase (wrapped into `[0, 1)`).
    pub fn set_phase(&mut self, phase: f32) {
        self.phase = wrap_phase(phase);
    }

    /// Current phase.
    pub fn phase(&self) -> f32 {
        self.phase
    }

    /// Back to phase 0.
    pub fn reset(&mut self) {
        self.phase = 0.0;
    }

    /// Produce one sample at `frequency` Hz and advance.
    ///
    /// Negative frequencies run the phase backwards.
    #[inline]
    pub fn advance(&mut self, frequency: f32) -> f32 {
        let dt = frequency / self.sample_rate;
        let y = render(self.waveform, self.phase, dt.abs());
        self.phase = wrap_phase(self.phase + dt);
        y
    }
}

/// Waveform value at `phase` with PolyBLEP width `dt`.
#[inline]
fn render(waveform: Waveform, phase: f32, dt: f32) -> f32 {
    match waveform {
        Waveform::Sine => sinf(TAU * phase),
        Waveform::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
        Waveform::Sawtooth => 2.0 * phase - 1.0 - poly_blep(phase, dt),
        Waveform::Square => pulse(phase, 0.5, dt),
        Waveform::Pulse(width) => pulse(phase, width.clamp(0.01, 0.99), dt),
    }
}

#[inline]
fn pulse(phase: f32, width: f32, dt: f32) -> f32 {
    let naive = if phase < width { 1.0 } else { -1.0 };
    naive + poly_blep(phase, dt) - poly_blep(wrap_phase(phase - width), dt)
}

const OSCILLATOR_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("frequency", 440.0, -1.0e6, 1.0e6),
    ParamSpec::new("detune", 0.0, -1.0e6, 1.0e6),
];

/// Scheduled oscillator source.
#[derive(Debug, Clone)]
pub struct OscillatorNode {
    osc: Oscillator,
}

impl OscillatorNode {
    /// Create a source with the given waveform.
    pub fn new(sample_rate: f32, waveform: Waveform) -> Self {
        Self {
            osc: Oscillator::new(sample_rate, waveform),
        }
    }

    /// Waveform in use.
    pub fn waveform(&self) -> Waveform {
        self.osc.waveform()
    }
}

impl AudioNode for OscillatorNode {
    fn kind(&self) -> NodeKind {
        NodeKind::Oscillator
    }

    fn params(&self) -> &'static [ParamSpec] {
        OSCILLATOR_PARAMS
    }

    fn process(
        &mut self,
        ctx: &ProcessContext<'_>,
        _input: &StereoBlock,
        output: &mut StereoBlock,
    ) -> NodeState {
        let frequency = ctx.param(0);
        let detune = ctx.param(1);
        for i in ctx.span.clone() {
            let f = frequency[i] * cents_to_ratio(detune[i]);
            let y = self.osc.advance(f);
            output.left[i] = y;
            output.right[i] = y;
        }
        NodeState::Active
    }

    fn reset(&mut self) {
        self.osc.reset();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

const PULSE_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("frequency", 440.0, -1.0e6, 1.0e6),
    ParamSpec::new("detune", 0.0, -1.0e6, 1.0e6),
    ParamSpec::new("pulsewidth", 0.5, 0.0, 1.0),
];

/// Pulse source whose width is an automatable parameter.
#[derive(Debug, Clone)]
pub struct PulseNode {
    osc: Oscillator,
}

impl PulseNode {
    /// Create a pulse source.
    pub fn new(sample_rate: f32) -> Self {
        Self {
            osc: Oscillator::new(sample_rate, Waveform::Pulse(0.5)),
        }
    }
}

impl AudioNode for PulseNode {
    fn kind(&self) -> NodeKind {
        NodeKind::Pulse
    }

    fn params(&self) -> &'static [ParamSpec] {
        PULSE_PARAMS
    }

    fn process(
        &mut self,
        ctx: &ProcessContext<'_>,
        _input: &StereoBlock,
        output: &mut StereoBlock,
    ) -> NodeState {
        let frequency = ctx.param(0);
        let detune = ctx.param(1);
        let width = ctx.param(2);
        for i in ctx.span.clone() {
            self.osc.set_waveform(Waveform::Pulse(width[i]));
            let y = self.osc.advance(frequency[i] * cents_to_ratio(detune[i]));
            output.left[i] = y;
            output.right[i] = y;
        }
        NodeState::Active
    }

    fn reset(&mut self) {
        self.osc.reset();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cycle(waveform: Waveform) -> Vec<f32> {
        let mut osc = Oscillator::new(48000.0, waveform);
        (0..480).map(|_| osc.advance(100.0)).collect()
    }

    #[test]
    fn test_waveforms_bounded() {
        for wf in [
            Waveform::Sine,
            Waveform::Triangle,
            Waveform::Sawtooth,
            Waveform::Square,
            Waveform::Pulse(0.2),
        ] {
            assert!(cycle(wf).iter().all(|s| s.abs() <= 1.01), "{wf:?}");
        }
    }

    #[test]
    fn test_sine_quarter_cycle_peak() {
        let samples = cycle(Waveform::Sine);
        assert!((samples[120] - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_pulse_duty_cycle() {
        let samples = cycle(Waveform::Pulse(0.25));
        let high = samples.iter().filter(|&&s| s > 0.0).count();
        assert!((110..=130).contains(&high), "high = {high}");
    }

    #[test]
    fn test_negative_frequency_stays_in_phase_range() {
        let mut osc = Oscillator::new(1000.0, Waveform::Sawtooth);
        for _ in 0..100 {
            osc.advance(-37.0);
            assert!((0.0..1.0).contains(&osc.phase()));
        }
    }

    #[test]
    fn test_waveform_names() {
        assert_eq!(Waveform::from_name("saw"), Some(Waveform::Sawtooth));
        assert_eq!(Waveform::from_name("bogus"), None);
    }
}
