//! Property-based tests for dough-core.
//!
//! Automation timeline continuity, pruning invariance, curve bounds and
//! filter stability under randomized input.

use dough_core::{AudioParam, Biquad, BiquadKind, warp};
use proptest::prelude::*;

fn kind_from(variant: usize) -> BiquadKind {
    match variant % 5 {
        0 => BiquadKind::Lowpass,
        1 => BiquadKind::Highpass,
        2 => BiquadKind::Bandpass,
        3 => BiquadKind::Notch,
        _ => BiquadKind::Allpass,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// A linear ramp never leaves the interval spanned by its endpoints.
    #[test]
    fn linear_ramp_stays_between_endpoints(
        v0 in -100.0f32..100.0,
        v1 in -100.0f32..100.0,
        len in 0.001f64..10.0,
        probe in 0.0f64..1.0,
    ) {
        let mut p = AudioParam::new(0.0);
        p.set_value_at_time(v0, 1.0);
        p.linear_ramp_to_value_at_time(v1, 1.0 + len);
        let v = p.value_at(1.0 + probe * len);
        let (lo, hi) = if v0 < v1 { (v0, v1) } else { (v1, v0) };
        prop_assert!(v >= lo - 1e-3 && v <= hi + 1e-3, "{} outside [{}, {}]", v, lo, hi);
    }

    /// Exponential ramps between positive endpoints stay positive and bounded.
    #[test]
    fn exponential_ramp_positive(
        v0 in 0.01f32..20000.0,
        v1 in 0.01f32..20000.0,
        probe in 0.0f64..1.0,
    ) {
        let mut p = AudioParam::new(v0);
        p.set_value_at_time(v0, 0.0);
        p.exponential_ramp_to_value_at_time(v1, 1.0);
        let v = p.value_at(probe);
        prop_assert!(v > 0.0);
        prop_assert!(v <= v0.max(v1) * 1.001);
    }

    /// Pruning at `now` never changes the curve at or after `now`.
    #[test]
    fn prune_preserves_future(
        values in prop::collection::vec(0.0f32..10.0, 2..8),
        now in 0.0f64..8.0,
        kinds in prop::collection::vec(0usize..4, 8),
    ) {
        let mut p = AudioParam::new(1.0);
        for (i, &v) in values.iter().enumerate() {
            let t = i as f64;
            match kinds[i] {
                0 => p.set_value_at_time(v, t),
                1 => p.linear_ramp_to_value_at_time(v, t),
                2 => p.exponential_ramp_to_value_at_time(v + 0.1, t),
                _ => p.set_target_at_time(v, t, 0.3),
            }
        }
        let probes: Vec<f64> = (0..10).map(|k| now + k as f64 * 0.7).collect();
        let before: Vec<f32> = probes.iter().map(|&t| p.value_at(t)).collect();
        p.prune(now);
        for (t, v) in probes.iter().zip(before) {
            prop_assert!((p.value_at(*t) - v).abs() <= 1e-3 * v.abs().max(1.0), "t={}", t);
        }
    }

    /// Warped phases stay inside [0, 1].
    #[test]
    fn warp_bounded(phase in -1.0f32..2.0, curve in -20.0f32..20.0) {
        let w = warp(phase, curve);
        prop_assert!((-1e-5..=1.0 + 1e-5).contains(&w));
    }

    /// Biquads stay finite for any audible cutoff and sane Q.
    #[test]
    fn biquad_stability(
        freq in 20.0f32..20000.0,
        q in 0.1f32..20.0,
        variant in 0usize..5,
        input in prop::array::uniform32(-1.0f32..=1.0),
    ) {
        let mut bq = Biquad::new();
        bq.set(kind_from(variant).coefficients(freq, q, 48000.0));
        for _ in 0..32 {
            for &x in &input {
                prop_assert!(bq.process(x).is_finite());
            }
        }
    }
}
