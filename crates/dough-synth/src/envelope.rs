//! Curved ADSR envelope generator.
//!
//! A five-state machine (idle, attack, decay, sustain, release) where every
//! segment interpolates from its start value to its target along a
//! curvature-warped phase ([`dough_core::warp`]). Segments start from the
//! value the envelope actually holds, so a release during the attack, or a
//! retrigger during the decay, never jumps.

use core::any::Any;

use dough_core::{AudioNode, NodeKind, NodeState, ParamSpec, ProcessContext, StereoBlock, warp};

/// Envelope stage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EnvelopeState {
    /// Inactive, output resting at zero.
    #[default]
    Idle,
    /// Rising toward 1.
    Attack,
    /// Falling from 1 toward the sustain level.
    Decay,
    /// Holding the sustain level while the gate is open.
    Sustain,
    /// Falling toward zero after the gate closed.
    Release,
}

/// Segment times in seconds, sustain level and per-segment curvature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvelopeShape {
    /// Attack time in seconds.
    pub attack: f32,
    /// Decay time in seconds.
    pub decay: f32,
    /// Sustain level, 0..1.
    pub sustain: f32,
    /// Release time in seconds.
    pub release: f32,
    /// Attack curvature (see [`warp`]).
    pub attack_curve: f32,
    /// Decay curvature.
    pub decay_curve: f32,
    /// Release curvature.
    pub release_curve: f32,
}

impl Default for EnvelopeShape {
    fn default() -> Self {
        Self {
            attack: 0.01,
            decay: 0.1,
            sustain: 0.5,
            release: 0.1,
            attack_curve: 0.0,
            decay_curve: 0.0,
            release_curve: 0.0,
        }
    }
}

/// Per-sample curved ADSR.
///
/// ```rust
/// use dough_synth::{CurvedEnvelope, EnvelopeShape, EnvelopeState};
///
/// let mut env = CurvedEnvelope::new(1000.0);
/// env.set_shape(EnvelopeShape { attack: 0.01, decay: 0.01, sustain: 0.5, release: 0.01, ..Default::default() });
/// env.gate_on();
/// for _ in 0..30 {
///     env.advance();
/// }
/// assert_eq!(env.state(), EnvelopeState::Sustain);
/// assert!((env.value() - 0.5).abs() < 1e-6);
/// ```
#[derive(Debug, Clone)]
pub struct CurvedEnvelope {
    shape: EnvelopeShape,
    sample_rate: f32,
    retrigger: bool,
    state: EnvelopeState,
    value: f32,
    segment_start: f32,
    segment_pos: u32,
    segment_len: u32,
}

impl CurvedEnvelope {
    /// Idle envelope with the default shape and retrigger enabled.
    pub fn new(sample_rate: f32) -> Self {
        Self {
            shape: EnvelopeShape::default(),
            sample_rate,
            retrigger: true,
            state: EnvelopeState::Idle,
            value: 0.0,
            segment_start: 0.0,
            segment_pos: 0,
            segment_len: 0,
        }
    }

    /// Replace the shape. Takes effect at the next segment boundary.
    pub fn set_shape(&mut self, shape: EnvelopeShape) {
        self.shape = EnvelopeShape {
            sustain: shape.sustain.clamp(0.0, 1.0),
            ..shape
        };
    }

    /// Current shape.
    pub fn shape(&self) -> &EnvelopeShape {
        &self.shape
    }

    /// Whether a gate-on while active restarts the attack.
    pub fn set_retrigger(&mut self, retrigger: bool) {
        self.retrigger = retrigger;
    }

    /// Current stage.
    pub fn state(&self) -> EnvelopeState {
        self.state
    }

    /// Current output value.
    pub fn value(&self) -> f32 {
        self.value
    }

    /// True unless idle.
    pub fn is_active(&self) -> bool {
        self.state != EnvelopeState::Idle
    }

    /// Open the gate.
    ///
    /// From idle this starts the attack. While active it restarts the
    /// attack from the current value if retrigger is on, and does nothing
    /// otherwise.
    pub fn gate_on(&mut self) {
        if self.state != EnvelopeState::Idle && !self.retrigger {
            return;
        }
        self.enter(EnvelopeState::Attack);
    }

    /// Close the gate: release from the current value.
    pub fn gate_off(&mut self) {
        if self.state != EnvelopeState::Idle && self.state != EnvelopeState::Release {
            self.enter(EnvelopeState::Release);
        }
    }

    /// Return to idle at zero.
    pub fn reset(&mut self) {
        self.state = EnvelopeState::Idle;
        self.value = 0.0;
        self.segment_start = 0.0;
        self.segment_pos = 0;
        self.segment_len = 0;
    }

    /// Produce the next sample.
    #[inline]
    pub fn advance(&mut self) -> f32 {
        let (target, curve) = match self.state {
            EnvelopeState::Idle | EnvelopeState::Sustain => return self.value,
            EnvelopeState::Attack => (1.0, self.shape.attack_curve),
            EnvelopeState::Decay => (self.shape.sustain, self.shape.decay_curve),
            EnvelopeState::Release => (0.0, self.shape.release_curve),
        };

        self.segment_pos += 1;
        if self.segment_pos >= self.segment_len {
            self.value = target;
            let next = match self.state {
                EnvelopeState::Attack => EnvelopeState::Decay,
                EnvelopeState::Decay => EnvelopeState::Sustain,
                _ => EnvelopeState::Idle,
            };
            self.enter(next);
        } else {
            let phase = self.segment_pos as f32 / self.segment_len as f32;
            self.value = self.segment_start + (target - self.segment_start) * warp(phase, curve);
        }
        self.value
    }

    fn enter(&mut self, state: EnvelopeState) {
        let seconds = match state {
            EnvelopeState::Attack => self.shape.attack,
            EnvelopeState::Decay => self.shape.decay,
            EnvelopeState::Release => self.shape.release,
            EnvelopeState::Idle | EnvelopeState::Sustain => 0.0,
        };
        self.state = state;
        self.segment_start = self.value;
        self.segment_pos = 0;
        self.segment_len = (seconds.max(0.0) * self.sample_rate).round().max(1.0) as u32;
        if state == EnvelopeState::Sustain {
            self.value = self.shape.sustain;
        }
    }
}

const ENVELOPE_PARAMS: &[ParamSpec] = &[ParamSpec::new("depth", 1.0, -1.0e9, 1.0e9)];

/// Graph node playing a [`CurvedEnvelope`] against the clock.
///
/// The gate opens at the node's scheduled start, at every extra trigger
/// time, and closes at the gate-off time. Output is `value * depth`.
#[derive(Debug, Clone)]
pub struct EnvelopeNode {
    envelope: CurvedEnvelope,
    gate_off_at: Option<f64>,
    triggers: Vec<f64>,
    started: bool,
    released: bool,
}

impl EnvelopeNode {
    /// Idle envelope node.
    pub fn new(sample_rate: f32) -> Self {
        Self {
            envelope: CurvedEnvelope::new(sample_rate),
            gate_off_at: None,
            triggers: Vec::new(),
            started: false,
            released: false,
        }
    }

    /// The envelope kernel for shape and retrigger configuration.
    pub fn envelope_mut(&mut self) -> &mut CurvedEnvelope {
        &mut self.envelope
    }

    /// The envelope kernel.
    pub fn envelope(&self) -> &CurvedEnvelope {
        &self.envelope
    }

    /// Close the gate at `time`.
    pub fn set_gate_off(&mut self, time: f64) {
        self.gate_off_at = Some(time);
    }

    /// Open the gate again at `time` (subject to the retrigger policy).
    pub fn trigger_at(&mut self, time: f64) {
        let idx = self.triggers.partition_point(|&t| t <= time);
        self.triggers.insert(idx, time);
    }
}

impl AudioNode for EnvelopeNode {
    fn kind(&self) -> NodeKind {
        NodeKind::Envelope
    }

    fn params(&self) -> &'static [ParamSpec] {
        ENVELOPE_PARAMS
    }

    fn process(
        &mut self,
        ctx: &ProcessContext<'_>,
        _input: &StereoBlock,
        output: &mut StereoBlock,
    ) -> NodeState {
        let depth = ctx.param(0);
        for i in ctx.span.clone() {
            let now = ctx.time_at(i);
            if !self.started {
                self.started = true;
                self.envelope.gate_on();
            }
            while self.triggers.first().is_some_and(|&t| t <= now) {
                self.triggers.remove(0);
                self.envelope.gate_on();
                self.released = false;
            }
            if !self.released && self.gate_off_at.is_some_and(|t| now >= t) {
                self.released = true;
                self.envelope.gate_off();
            }
            let y = self.envelope.advance() * depth[i];
            output.left[i] = y;
            output.right[i] = y;
        }
        if self.envelope.state() == EnvelopeState::Release {
            NodeState::Releasing
        } else {
            NodeState::Active
        }
    }

    fn reset(&mut self) {
        self.envelope.reset();
        self.gate_off_at = None;
        self.triggers.clear();
        self.started = false;
        self.released = false;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
