//! Integration tests for dough-engine.
//!
//! Whole-engine scenarios: compiling events into role-tagged chains, late
//! triggers, polyphony eviction, pool reuse across voices, modulator
//! attachment, orbit effects and multi-channel routing, plus the offline
//! renderer driving all of it.

use dough_core::NodeKind;
use dough_effects::GainNode;
use dough_engine::{
    AnalyserDomain, EngineConfig, EngineContext, Event, OfflineRenderer, Role, ScheduledEvent,
    SourceInfo, SourceOutput, SynthError,
};

fn engine() -> EngineContext {
    EngineContext::new(EngineConfig::default()).unwrap()
}

fn event(json: &str) -> Event {
    Event::from_json(json).unwrap()
}

fn render_seconds(engine: &mut EngineContext, seconds: f64) {
    let target = engine.current_time() + seconds;
    while engine.current_time() < target {
        engine.render_block();
    }
}

fn energy(samples: &[f32]) -> f32 {
    samples.iter().map(|s| s * s).sum()
}

// ============================================================================
// Chain compilation
// ============================================================================

#[test]
fn plain_event_builds_source_gain_postgain() {
    let mut e = engine();
    let handle = e
        .synthesize(&event(r#"{"s": "sine"}"#), 0.0, 0.25, 0.5, 0.0)
        .unwrap()
        .unwrap();
    let voice = e.voice(handle.id).unwrap();
    assert_eq!(voice.roles(), vec![Role::Source, Role::Gain, Role::PostGain]);
    assert_eq!(voice.output(), voice.nodes(Role::PostGain)[0]);
}

#[test]
fn filtered_saw_has_lowpass_and_no_highpass() {
    let mut e = engine();
    let handle = e
        .synthesize(
            &event(r#"{"s": "sawtooth", "gain": 0.8, "cutoff": 1000}"#),
            1.0,
            0.5,
            0.5,
            0.0,
        )
        .unwrap()
        .unwrap();
    assert_eq!(handle.begin, 1.0);
    assert_eq!(handle.end, 1.5);
    assert!((handle.release_end - 1.51).abs() < 1e-9);

    let voice = e.voice(handle.id).unwrap();
    assert_eq!(
        voice.roles(),
        vec![Role::Source, Role::Gain, Role::Lpf, Role::PostGain]
    );
    assert!(!voice.has_role(Role::Hpf));

    let lpf = voice.nodes(Role::Lpf)[0];
    assert_eq!(e.graph().kind(lpf), Some(NodeKind::Biquad));
    assert_eq!(e.graph().param(lpf, "frequency").unwrap().value(), 1000.0);
    let gain = voice.nodes(Role::Gain)[0];
    assert!((e.graph().param(gain, "gain").unwrap().value() - 0.8).abs() < 1e-6);
}

#[test]
fn custom_source_feeds_the_same_chain() {
    let mut e = engine();
    e.register_source("silence", SourceInfo::custom("unconnected gain"), |ctx, _event, _trigger| {
        let node = ctx.graph.add(GainNode::new());
        Ok(SourceOutput {
            output: node,
            anchor: node,
            nodes: vec![node],
        })
    });
    let handle = e
        .synthesize(&event(r#"{"s": "silence", "pan": 0.25}"#), 0.0, 0.1, 0.5, 0.0)
        .unwrap()
        .unwrap();
    assert_eq!(
        e.voice(handle.id).unwrap().roles(),
        vec![Role::Source, Role::Gain, Role::Pan, Role::PostGain]
    );
}

#[test]
fn unknown_source_and_malformed_controls_are_fatal() {
    let mut e = engine();
    assert_eq!(
        e.synthesize(&event(r#"{"s": "glockenspiel"}"#), 0.0, 0.1, 0.5, 0.0),
        Err(SynthError::UnknownSource("glockenspiel".into()))
    );
    let result = e.synthesize(&event(r#"{"s": "sine", "gain": "loud"}"#), 0.0, 0.1, 0.5, 0.0);
    assert!(matches!(result, Err(SynthError::MalformedEvent(_))));
    assert!(e.active_voices().is_empty());
    // other voices are unaffected
    assert!(e.synthesize(&event(r#"{"s": "sine"}"#), 0.0, 0.1, 0.5, 0.0).unwrap().is_some());
}

// ============================================================================
// Timing and polyphony
// ============================================================================

#[test]
fn late_trigger_is_dropped_with_one_warning() {
    let mut e = engine();
    render_seconds(&mut e, 0.1);
    let result = e.synthesize(&event(r#"{"s": "sine"}"#), 0.05, 0.2, 0.5, 0.0);
    assert_eq!(result, Ok(None));
    assert!(e.active_voices().is_empty());
    let warnings = e.take_warnings();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].is_late_trigger());
    assert_eq!(e.pool_stats().misses, 0);
}

#[test]
fn polyphony_ceiling_evicts_oldest_with_fade() {
    let mut e = engine();
    e.set_max_polyphony(1);
    let first = e
        .synthesize(&event(r#"{"s": "sine"}"#), 0.0, 1.0, 0.5, 0.0)
        .unwrap()
        .unwrap();
    let second = e
        .synthesize(&event(r#"{"s": "sine"}"#), 0.01, 1.0, 0.5, 0.0)
        .unwrap()
        .unwrap();
    assert_ne!(second.trigger_id, first.trigger_id);

    let evicted = e.voice(first.id).unwrap();
    assert!(evicted.is_evicted());
    assert!(evicted.release_end() <= 0.01 + 0.25 + 1e-9);
    let out = e.graph().param(evicted.output(), "gain").unwrap();
    assert!(out.value_at(0.26) < 1e-6);
    let stop = e.graph().end_time(evicted.anchor()).unwrap();
    assert!(stop <= 0.01 + 0.25 + 1e-9, "source stops at {stop}");
    assert!(!e.voice(second.id).unwrap().is_evicted());
    assert_eq!(e.governor().len(), 1);

    render_seconds(&mut e, 0.4);
    assert!(e.voice(first.id).is_none());
    assert!(e.voice(second.id).is_some());
}

#[test]
fn reclaimed_voice_frees_its_polyphony_slot() {
    let mut e = engine();
    e.set_max_polyphony(2);
    let pad = e
        .synthesize(&event(r#"{"s": "sawtooth"}"#), 0.0, 10.0, 0.5, 0.0)
        .unwrap()
        .unwrap();
    let hit = e
        .synthesize(&event(r#"{"s": "sine"}"#), 0.0, 0.01, 0.5, 0.0)
        .unwrap()
        .unwrap();

    render_seconds(&mut e, 0.5);
    assert!(e.voice(hit.id).is_none());
    assert_eq!(e.governor().len(), 1);

    let third = e
        .synthesize(&event(r#"{"s": "sine"}"#), 0.6, 1.0, 0.5, 0.0)
        .unwrap()
        .unwrap();
    assert!(!e.voice(pad.id).unwrap().is_evicted());
    assert!(!e.voice(third.id).unwrap().is_evicted());
    assert_eq!(e.active_voices().len(), 2);
    let tracked: Vec<_> = e.governor().entries().map(|a| a.voice).collect();
    assert_eq!(tracked, vec![pad.id, third.id]);
}

#[test]
fn finished_voices_are_reclaimed() {
    let mut r = OfflineRenderer::new(EngineConfig::default()).unwrap();
    let events = (0..8)
        .map(|i| ScheduledEvent::new(event(r#"{"s": "triangle", "note": 52}"#), f64::from(i) * 0.05, 0.04))
        .collect();
    let out = r.render(events, 1.0);
    assert_eq!(out.voices, 8);
    assert!(out.peak() > 0.01);
    assert!(out.channels.iter().flatten().all(|s| s.is_finite()));
    assert!(r.context().active_voices().is_empty());
}

// ============================================================================
// Pooling
// ============================================================================

#[test]
fn released_nodes_are_reused_by_later_voices() {
    let mut e = engine();
    let first = e
        .synthesize(&event(r#"{"s": "sine", "cutoff": 800}"#), 0.0, 0.05, 0.5, 0.0)
        .unwrap()
        .unwrap();
    let first_nodes = e.voice(first.id).unwrap().all_nodes();
    render_seconds(&mut e, 0.2);
    assert!(e.voice(first.id).is_none());

    let now = e.current_time();
    let second = e
        .synthesize(&event(r#"{"s": "sine", "cutoff": 800}"#), now, 0.05, 0.5, 0.0)
        .unwrap()
        .unwrap();
    let voice = e.voice(second.id).unwrap();
    assert!(first_nodes.contains(&voice.nodes(Role::Gain)[0]));
    assert!(first_nodes.contains(&voice.nodes(Role::Lpf)[0]));
    assert!(e.pool_stats().hits >= 4);
}

#[test]
fn disabled_pool_never_shares_nodes() {
    let config = EngineConfig {
        pooling: false,
        ..EngineConfig::default()
    };
    let mut e = EngineContext::new(config).unwrap();
    let first = e
        .synthesize(&event(r#"{"s": "sine", "cutoff": 800}"#), 0.0, 0.05, 0.5, 0.0)
        .unwrap()
        .unwrap();
    let first_nodes = e.voice(first.id).unwrap().all_nodes();
    render_seconds(&mut e, 0.2);

    let now = e.current_time();
    let second = e
        .synthesize(&event(r#"{"s": "sine", "cutoff": 800}"#), now, 0.05, 0.5, 0.0)
        .unwrap()
        .unwrap();
    let second_nodes = e.voice(second.id).unwrap().all_nodes();
    assert!(second_nodes.iter().all(|n| !first_nodes.contains(n)));
    assert!(first_nodes.iter().all(|&n| !e.graph().contains(n)));
    assert_eq!(e.pool_stats().hits, 0);
}

// ============================================================================
// Modulation
// ============================================================================

#[test]
fn lfo_modulator_drives_cutoff() {
    let mut e = engine();
    let handle = e
        .synthesize(
            &event(
                r#"{"s": "saw", "cutoff": 1000,
                    "lfo": {"params": {"control": "cutoff", "rate": 2, "depth": 0.25}}}"#,
            ),
            0.0,
            0.5,
            0.5,
            0.0,
        )
        .unwrap()
        .unwrap();
    let voice = e.voice(handle.id).unwrap();
    let lpf = voice.nodes(Role::Lpf)[0];
    let modulators = voice.nodes(Role::Modulator);
    assert!(modulators.iter().any(|&n| e.graph().kind(n) == Some(NodeKind::Lfo)));
    assert!(
        modulators
            .iter()
            .any(|&n| e.graph().param_outputs(n).iter().any(|&(target, _)| target == lpf))
    );
    assert!(e.take_warnings().is_empty());

    render_seconds(&mut e, 0.2);
    assert!(e.output().iter().flatten().all(|s| s.is_finite()));
}

#[test]
fn modulator_on_missing_stage_warns_and_voice_plays() {
    let mut e = engine();
    let handle = e
        .synthesize(
            &event(r#"{"s": "saw", "env": {"params": {"control": "bandf", "attack": 0.1}}}"#),
            0.0,
            0.2,
            0.5,
            0.0,
        )
        .unwrap()
        .unwrap();
    assert!(!e.voice(handle.id).unwrap().has_role(Role::Modulator));
    let warnings = e.take_warnings();
    assert_eq!(warnings.len(), 1);
    assert_eq!(
        warnings[0].error,
        SynthError::UnresolvedTarget {
            control: "bandf".into(),
            role: "bpf",
        }
    );
    render_seconds(&mut e, 0.05);
    assert!(energy(&e.output()[0]) > 0.0);
}

// ============================================================================
// Orbits
// ============================================================================

#[test]
fn delay_send_configures_orbit_and_echoes() {
    let dry = event(r#"{"s": "sine", "note": 69}"#);
    let wet = event(r#"{"s": "sine", "note": 69, "delay": 0.8, "delaytime": 0.2, "delayfeedback": 0.4}"#);

    let mut r = OfflineRenderer::new(EngineConfig::default()).unwrap();
    let out_wet = r.render(vec![ScheduledEvent::new(wet, 0.0, 0.05)], 0.5);
    let orbit = r.context().orbit(1).unwrap();
    let time = r.context().graph().param(orbit.delay(), "time").unwrap();
    assert!((time.value_at(0.0) - 0.2).abs() < 1e-6);

    let mut r = OfflineRenderer::new(EngineConfig::default()).unwrap();
    let out_dry = r.render(vec![ScheduledEvent::new(dry, 0.0, 0.05)], 0.5);

    // first echo lands around 0.2s, long after the dry note ended
    let window = 9600..12480;
    let wet_echo = energy(&out_wet.channels[0][window.clone()]);
    let dry_tail = energy(&out_dry.channels[0][window]);
    assert!(wet_echo > 1e-3);
    assert!(wet_echo > 100.0 * dry_tail);
}

#[test]
fn multi_channel_routing_places_orbit_on_its_pair() {
    let config = EngineConfig {
        output_channels: 4,
        multi_channel_routing: true,
        ..EngineConfig::default()
    };
    let mut r = OfflineRenderer::new(config).unwrap();
    let out = r.render(
        vec![ScheduledEvent::new(event(r#"{"s": "sine", "orbit": 2}"#), 0.0, 0.1)],
        0.1,
    );
    assert_eq!(r.context().orbit(2).unwrap().channels(), &[2, 3]);
    assert_eq!(out.channels.len(), 4);
    assert_eq!(energy(&out.channels[0]), 0.0);
    assert!(energy(&out.channels[2]) > 0.0);
}

#[test]
fn duck_reaches_orbit_on_explicit_channels() {
    let mut e = EngineContext::new(EngineConfig {
        output_channels: 4,
        multi_channel_routing: true,
        ..EngineConfig::default()
    })
    .unwrap();
    e.synthesize(&event(r#"{"s": "sine", "orbit": 2, "channels": [1, 2]}"#), 0.0, 1.0, 0.5, 0.0)
        .unwrap();
    e.synthesize(
        &event(r#"{"s": "sine", "duckorbit": 2, "duckonset": 0.01, "duckdepth": 1}"#),
        0.1,
        0.5,
        0.5,
        0.0,
    )
    .unwrap();

    // orbit 1 for the ducking voice, orbit 2 unchanged on its first channels
    assert_eq!(e.orbit_count(), 2);
    let orbit = e.orbit(2).unwrap();
    assert_eq!(orbit.channels(), &[0, 1]);
    let gain = e.graph().param(orbit.output(), "gain").unwrap();
    assert!(gain.value_at(0.11) < 1e-3);
}

#[test]
fn analyser_tap_collects_signal() {
    let mut e = engine();
    e.synthesize(&event(r#"{"s": "sine", "analyze": "scope"}"#), 0.0, 0.5, 0.5, 0.0)
        .unwrap();
    render_seconds(&mut e, 0.1);
    let scope = e.analyser_snapshot("scope", AnalyserDomain::Time).unwrap();
    assert_eq!(scope.len(), 2048);
    assert!(scope.iter().any(|&s| s.abs() > 0.01));
    assert!(e.analyser_snapshot("other", AnalyserDomain::Time).is_none());
}

// ============================================================================
// Reset
// ============================================================================

#[test]
fn reset_rebuilds_state_and_keeps_sources() {
    let mut e = engine();
    e.register_source("silence", SourceInfo::custom("unconnected gain"), |ctx, _event, _trigger| {
        let node = ctx.graph.add(GainNode::new());
        Ok(SourceOutput {
            output: node,
            anchor: node,
            nodes: vec![node],
        })
    });
    e.synthesize(&event(r#"{"s": "sine", "room": 0.4, "bus": 1}"#), 0.0, 1.0, 0.5, 0.0)
        .unwrap();
    render_seconds(&mut e, 0.05);
    assert_eq!(e.orbit_count(), 1);

    e.reset();
    assert_eq!(e.current_time(), 0.0);
    assert!(e.active_voices().is_empty());
    assert_eq!(e.orbit_count(), 0);
    assert!(e.buses().is_empty());
    assert_eq!(e.pool_stats().misses, 0);
    assert!(e.sources().contains("silence"));
    assert!(e.synthesize(&event(r#"{"s": "silence"}"#), 0.0, 0.1, 0.5, 0.0).unwrap().is_some());
}

#[test]
fn config_round_trips_through_toml() {
    let config = EngineConfig {
        max_polyphony: 12,
        eviction_fade: 0.1,
        ..EngineConfig::default()
    };
    let text = config.to_toml().unwrap();
    assert_eq!(EngineConfig::from_toml_str(&text).unwrap(), config);
}
