//! Property-based tests for dough-synth.
//!
//! Envelope continuity under retrigger, LFO output bounds and oscillator
//! amplitude bounds for randomized settings.

use dough_synth::{
    CurvedEnvelope, EnvelopeShape, EnvelopeState, Oscillator, PeriodicGenerator, PeriodicShape,
    Waveform,
};
use proptest::prelude::*;

fn shape(attack: f32, decay: f32, sustain: f32, curve: f32) -> EnvelopeShape {
    EnvelopeShape {
        attack,
        decay,
        sustain,
        release: 0.05,
        attack_curve: curve,
        decay_curve: -curve,
        release_curve: curve,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    /// Retriggering mid-decay starts the new attack from the held value:
    /// the first sample after the retrigger moves no more than one attack step.
    #[test]
    fn retrigger_mid_decay_is_continuous(
        attack in 0.005f32..0.05,
        decay in 0.02f32..0.2,
        sustain in 0.0f32..1.0,
        curve in -4.0f32..4.0,
        into_decay in 0.1f32..0.9,
    ) {
        let sr = 1000.0;
        let mut env = CurvedEnvelope::new(sr);
        env.set_shape(shape(attack, decay, sustain, curve));
        env.gate_on();
        let attack_samples = (attack * sr).round() as usize;
        let decay_samples = ((decay * sr).round() * into_decay) as usize;
        for _ in 0..attack_samples + decay_samples.max(1) {
            env.advance();
        }
        prop_assume!(env.state() == EnvelopeState::Decay);
        let held = env.value();
        env.gate_on();
        let next = env.advance();
        prop_assert!(next >= held - 1e-6);
        prop_assert!(next - held <= 1.0 - held + 1e-6);
        let max_step = 1.0 / (attack * sr).round().max(1.0);
        let warp_slack = 1.0 + curve.abs() * 2.0;
        prop_assert!(next - held <= max_step * warp_slack + 1e-4);
    }

    /// Without retrigger, gate-on while active never changes the stage.
    #[test]
    fn no_retrigger_is_noop(steps in 1usize..200) {
        let mut env = CurvedEnvelope::new(1000.0);
        env.set_retrigger(false);
        env.set_shape(shape(0.02, 0.05, 0.5, 0.0));
        env.gate_on();
        for _ in 0..steps {
            env.advance();
        }
        let state = env.state();
        let value = env.value();
        env.gate_on();
        prop_assert_eq!(env.state(), state);
        prop_assert_eq!(env.value(), value);
    }

    /// Envelope output stays in [0, 1].
    #[test]
    fn envelope_bounded(
        attack in 0.0f32..0.05,
        decay in 0.0f32..0.05,
        sustain in 0.0f32..1.0,
        curve in -8.0f32..8.0,
        off_at in 0usize..200,
    ) {
        let mut env = CurvedEnvelope::new(1000.0);
        env.set_shape(shape(attack, decay, sustain, curve));
        env.gate_on();
        for i in 0..300 {
            if i == off_at {
                env.gate_off();
            }
            let v = env.advance();
            prop_assert!((-1e-6..=1.0 + 1e-6).contains(&v), "v = {}", v);
        }
    }

    /// LFO output respects its clamp and, unclamped, its depth.
    #[test]
    fn lfo_bounded(
        index in 0usize..6,
        freq in 0.1f32..50.0,
        depth in 0.0f32..10.0,
        skew in 0.0f32..1.0,
    ) {
        let mut lfo = PeriodicGenerator::new(1000.0);
        lfo.set_shape(PeriodicShape::from_index(index));
        lfo.set_frequency(freq);
        lfo.set_depth(depth);
        lfo.set_skew(skew);
        for _ in 0..2000 {
            let y = lfo.next();
            prop_assert!(y.abs() <= 0.5 * depth * 1.05 + 1e-4, "y = {}", y);
        }
        lfo.set_range(-0.1, 0.1);
        for _ in 0..2000 {
            let y = lfo.next();
            prop_assert!((-0.1..=0.1).contains(&y));
        }
    }

    /// Oscillators stay within a small overshoot of unity.
    #[test]
    fn oscillator_bounded(freq in 20.0f32..15000.0, kind in 0usize..4) {
        let waveform = [Waveform::Sine, Waveform::Triangle, Waveform::Sawtooth, Waveform::Square][kind];
        let mut osc = Oscillator::new(48000.0, waveform);
        for _ in 0..4800 {
            let y = osc.advance(freq);
            prop_assert!(y.abs() <= 1.1);
        }
    }
}
