//! Event-to-graph compiler.
//!
//! [`EngineContext::synthesize`] turns one event into a voice: source, then
//! the effect chain in fixed order, then sends and the orbit connection,
//! then modulators, then admission by the governor.
//!
//! ```text
//! source ─► gain ─► lpf ─► hpf ─► bpf ─► vowel ─► crush ─► coarse ─► shape
//!        ─► distort ─► tremolo ─► compressor ─► pan ─► phaser ─► pshift
//!        ─► postgain ─┬─► orbit input
//!                     ├─► delay send ─► orbit delay
//!                     ├─► room send ─► orbit reverb
//!                     ├─► bus send ─► bus
//!                     └─► analyser
//! ```
//!
//! Every stage after `gain` exists only if its controls are present.

use dough_core::{AudioNode, BiquadKind, NodeId, NodeKind, RampCurve, apply_adsr};
use dough_effects::{
    BiquadNode, CoarseNode, CompressorNode, CrushNode, DistortNode, GainNode, LadderNode,
    PannerNode, PhaserNode, PitchShiftNode, ShapeNode, Vowel, VowelNode,
};
use dough_synth::{LfoNode, PeriodicShape};

use crate::context::EngineContext;
use crate::controls::{FilterSlope, FilterStage, Rate, VoiceParams};
use crate::error::SynthError;
use crate::event::{ControlValue, Event};
use crate::router::{self, VoiceTiming};
use crate::sources::{SourceContext, SourceTrigger};
use crate::voice::{Role, Voice, VoiceHandle, VoiceId};

/// LFO settings for an internal stage (filter sweep, tremolo).
struct StageLfo {
    shape: PeriodicShape,
    rate: Rate,
    skew: f32,
    dc_offset: f32,
    phase: f32,
    depth: f32,
}

impl EngineContext {
    /// Compile `event` into a voice triggered at `time` for `duration` seconds.
    ///
    /// `cps` is the pattern tempo in cycles per second and `cycle` the
    /// pattern position of the trigger; synced rates use both.
    ///
    /// Returns `Ok(None)` when `time` has already passed: the trigger is
    /// dropped and a `LateTrigger` warning recorded.
    pub fn synthesize(
        &mut self,
        event: &Event,
        time: f64,
        duration: f64,
        cps: f64,
        cycle: f64,
    ) -> Result<Option<VoiceHandle>, SynthError> {
        if !time.is_finite() || !duration.is_finite() {
            return Err(SynthError::MalformedEvent(format!(
                "trigger time {time} and duration {duration} must be finite"
            )));
        }
        let (params, statics) = VoiceParams::from_event(event)?;
        let generator = self
            .sources
            .get(&params.source)
            .ok_or_else(|| SynthError::UnknownSource(params.source.clone()))?;

        let now = self.graph.current_time();
        if time < now {
            self.warn("compiler", SynthError::LateTrigger { trigger: time, now });
            return Ok(None);
        }

        let end = time + duration.max(0.0);
        let timing = VoiceTiming {
            begin: time,
            end,
            release_end: end + params.amp.release,
            cps,
            cycle,
        };
        let (built, created) = {
            let mut ctx = SourceContext::new(&mut self.graph, &mut self.pool);
            let built = generator(
                &mut ctx,
                &statics,
                &SourceTrigger {
                    begin: timing.begin,
                    end: timing.end,
                    release_end: timing.release_end,
                    cps,
                    cycle,
                    envelope: params.amp,
                },
            );
            (built, ctx.created().to_vec())
        };
        let source = match built {
            Ok(source) => source,
            Err(error) => {
                self.release_nodes(&created, now);
                return Err(error);
            }
        };

        let mut voice = Voice::new(source.nodes, source.output, time, end, timing.release_end);
        voice.anchor = source.anchor;
        for node in created {
            voice.track(Role::Source, node);
        }
        if let Err(error) = self.build_chain(&mut voice, &params, &timing) {
            self.release_voice(&voice, now);
            return Err(error);
        }

        for spec in &params.modulators {
            match router::attach(
                &mut self.graph,
                &mut self.pool,
                &mut self.buses,
                &mut voice,
                spec,
                &timing,
            ) {
                Ok(_) => {}
                Err(error @ (SynthError::UnresolvedTarget { .. } | SynthError::NotModulatable(_))) => {
                    self.warn("router", error);
                }
                Err(error) => {
                    self.release_voice(&voice, now);
                    return Err(error);
                }
            }
        }

        let id = self.voices.insert(voice);
        let (trigger_id, evicted) = self.governor.admit(id);
        if let Some(voice) = self.voices.get_mut(id) {
            voice.trigger_id = trigger_id;
        }
        for old in evicted {
            self.evict(old, time);
        }
        tracing::debug!(
            target: "dough::compiler",
            voice = %id,
            source = %params.source,
            time,
            duration,
            "voice compiled"
        );
        Ok(Some(VoiceHandle {
            id,
            trigger_id,
            begin: time,
            end,
            release_end: timing.release_end,
        }))
    }

    /// Compile an arbitrary control value; anything but a record is malformed.
    pub fn synthesize_value(
        &mut self,
        value: ControlValue,
        time: f64,
        duration: f64,
        cps: f64,
        cycle: f64,
    ) -> Result<Option<VoiceHandle>, SynthError> {
        let event = Event::try_from(value)?;
        self.synthesize(&event, time, duration, cps, cycle)
    }

    /// Fade an evicted voice out over the eviction window and stop its sources.
    fn evict(&mut self, id: VoiceId, time: f64) {
        let fade = self.config.eviction_fade;
        let Some(voice) = self.voices.get_mut(id) else {
            tracing::debug!(target: "dough::governor", voice = %id, "evicted entry already reclaimed");
            return;
        };
        if voice.evicted {
            return;
        }
        voice.evicted = true;
        let stop_at = time + fade;
        if let Ok(gain) = self.graph.param_mut(voice.output, "gain") {
            gain.cancel_and_hold_at_time(time);
            gain.linear_ramp_to_value_at_time(0.0, stop_at);
        }
        for &node in voice.nodes(Role::Source) {
            if self.graph.kind(node).is_some_and(NodeKind::is_source) {
                if let Err(error) = self.graph.stop(node, stop_at) {
                    tracing::warn!(target: "dough::governor", voice = %id, node = %node, %error, "stop failed");
                }
            }
        }
        voice.release_end = voice.release_end.min(stop_at);
        tracing::debug!(target: "dough::governor", voice = %id, stop_at, "voice evicted");
    }

    /// Pooled node, owned by `voice` under `role` from the moment it exists.
    fn checkout<N, F>(&mut self, voice: &mut Voice, role: Role, kind: NodeKind, make: F) -> Result<NodeId, SynthError>
    where
        N: AudioNode + 'static,
        F: FnOnce() -> N,
    {
        let node = self.pool.checkout(&mut self.graph, kind, make)?;
        voice.track(role, node);
        Ok(node)
    }

    fn gain_node(&mut self, voice: &mut Voice, role: Role, level: f32) -> Result<NodeId, SynthError> {
        let node = self.checkout(voice, role, NodeKind::Gain, GainNode::new)?;
        self.graph.param_mut(node, "gain")?.set_value(level);
        Ok(node)
    }

    fn set(&mut self, node: NodeId, param: &str, value: f32) -> Result<(), SynthError> {
        self.graph.param_mut(node, param)?.set_value(value);
        Ok(())
    }

    fn stage_lfo(&mut self, voice: &mut Voice, lfo: StageLfo, timing: &VoiceTiming) -> Result<NodeId, SynthError> {
        let sample_rate = self.graph.sample_rate();
        let node = self.checkout(voice, Role::Modulator, NodeKind::Lfo, || LfoNode::new(sample_rate))?;
        if let Some(lfo_node) = self.graph.node_mut::<LfoNode>(node) {
            let generator = lfo_node.generator_mut();
            generator.set_shape(lfo.shape);
            generator.set_skew(lfo.skew);
            generator.set_dc_offset(lfo.dc_offset);
            lfo_node.set_initial_phase(lfo.rate.start_phase(timing.cycle, lfo.phase));
        }
        self.set(node, "frequency", lfo.rate.hz(timing.cps))?;
        self.set(node, "depth", lfo.depth)?;
        self.graph.start(node, timing.begin)?;
        self.graph.set_end_time(node, timing.release_end)?;
        Ok(node)
    }

    /// Worklet-backed stage: pooled, with its end time at the release end.
    fn worklet_stage<N, F>(
        &mut self,
        voice: &mut Voice,
        role: Role,
        kind: NodeKind,
        make: F,
        settings: &[(&str, f32)],
        timing: &VoiceTiming,
    ) -> Result<NodeId, SynthError>
    where
        N: AudioNode + 'static,
        F: FnOnce() -> N,
    {
        let node = self.checkout(voice, role, kind, make)?;
        for &(param, value) in settings {
            self.set(node, param, value)?;
        }
        self.graph.set_end_time(node, timing.release_end)?;
        voice.push(&mut self.graph, role, node)?;
        Ok(node)
    }

    fn filter_stage(
        &mut self,
        voice: &mut Voice,
        role: Role,
        kind: BiquadKind,
        stage: &FilterStage,
        slope: FilterSlope,
        curve: RampCurve,
        timing: &VoiceTiming,
    ) -> Result<(), SynthError> {
        let mut nodes = Vec::with_capacity(2);
        if slope == FilterSlope::Ladder && kind == BiquadKind::Lowpass {
            let node = self.checkout(voice, role, NodeKind::Ladder, LadderNode::new)?;
            // biquad-style resonance folded into the ladder's 0..1 feedback
            self.set(node, "q", (stage.q / 20.0).clamp(0.0, 1.0))?;
            self.graph.set_end_time(node, timing.release_end)?;
            nodes.push(node);
        } else {
            let sections = if slope == FilterSlope::Db24 { 2 } else { 1 };
            for _ in 0..sections {
                let node = self.checkout(voice, role, NodeKind::Biquad, || BiquadNode::new(kind))?;
                if let Some(biquad) = self.graph.node_mut::<BiquadNode>(node) {
                    biquad.set_filter_kind(kind);
                }
                self.set(node, "Q", stage.q)?;
                nodes.push(node);
            }
        }

        for &node in &nodes {
            let frequency = self.graph.param_mut(node, "frequency")?;
            frequency.set_value(stage.frequency);
            if let Some(envelope) = &stage.envelope {
                let (min, max) = envelope.range(stage.frequency);
                apply_adsr(frequency, &envelope.shape, min, max, timing.begin, timing.end, curve);
            }
            voice.push(&mut self.graph, role, node)?;
        }

        if let Some(sweep) = &stage.sweep {
            let lfo = self.stage_lfo(
                voice,
                StageLfo {
                    shape: sweep.shape.clone(),
                    rate: sweep.rate,
                    skew: 0.5,
                    dc_offset: -0.5,
                    phase: 0.0,
                    depth: sweep.depth * stage.frequency,
                },
                timing,
            )?;
            for &node in &nodes {
                self.graph.connect_param(lfo, node, "frequency")?;
            }
        }
        Ok(())
    }

    fn build_chain(&mut self, voice: &mut Voice, params: &VoiceParams, timing: &VoiceTiming) -> Result<(), SynthError> {
        let sample_rate = self.graph.sample_rate();

        let level = self.apply_curve(params.gain) * params.velocity;
        let gain = self.gain_node(voice, Role::Gain, level)?;
        voice.push(&mut self.graph, Role::Gain, gain)?;

        if let Some(stage) = &params.lowpass {
            self.filter_stage(
                voice,
                Role::Lpf,
                BiquadKind::Lowpass,
                stage,
                params.slope,
                RampCurve::Exponential,
                timing,
            )?;
        }
        if let Some(stage) = &params.highpass {
            self.filter_stage(
                voice,
                Role::Hpf,
                BiquadKind::Highpass,
                stage,
                params.slope,
                RampCurve::Exponential,
                timing,
            )?;
        }
        if let Some(stage) = &params.bandpass {
            self.filter_stage(
                voice,
                Role::Bpf,
                BiquadKind::Bandpass,
                stage,
                params.slope,
                RampCurve::Linear,
                timing,
            )?;
        }

        if let Some(name) = &params.vowel {
            match Vowel::from_name(name) {
                Some(vowel) => {
                    let node = self.checkout(voice, Role::Vowel, NodeKind::Vowel, || {
                        VowelNode::new(sample_rate, vowel)
                    })?;
                    if let Some(formants) = self.graph.node_mut::<VowelNode>(node) {
                        formants.set_vowel(sample_rate, vowel);
                    }
                    voice.push(&mut self.graph, Role::Vowel, node)?;
                }
                None => self.warn(
                    "compiler",
                    SynthError::MissingRoleForEffect {
                        stage: "vowel",
                        reason: format!("unknown vowel '{name}'"),
                    },
                ),
            }
        }

        if let Some(bits) = params.crush {
            self.worklet_stage(
                voice,
                Role::Crush,
                NodeKind::Crush,
                CrushNode::new,
                &[("crush", bits.clamp(1.0, 16.0))],
                timing,
            )?;
        }
        if let Some(factor) = params.coarse {
            self.worklet_stage(
                voice,
                Role::Coarse,
                NodeKind::Coarse,
                CoarseNode::new,
                &[("coarse", factor.max(1.0))],
                timing,
            )?;
        }
        if let Some((amount, volume)) = params.shape {
            self.worklet_stage(
                voice,
                Role::Shape,
                NodeKind::Shape,
                ShapeNode::new,
                &[("shape", amount.clamp(0.0, 1.0)), ("postgain", volume)],
                timing,
            )?;
        }
        if let Some((amount, volume)) = params.distort {
            self.worklet_stage(
                voice,
                Role::Distort,
                NodeKind::Distort,
                DistortNode::new,
                &[("distort", amount), ("postgain", volume)],
                timing,
            )?;
        }

        if let Some(tremolo) = &params.tremolo {
            let node = self.gain_node(voice, Role::Tremolo, 1.0)?;
            // unipolar shape shifted to [-depth, 0] under a unity gain
            let lfo = self.stage_lfo(
                voice,
                StageLfo {
                    shape: tremolo.shape.clone(),
                    rate: tremolo.rate,
                    skew: tremolo.skew,
                    dc_offset: -1.0,
                    phase: tremolo.phase,
                    depth: tremolo.depth,
                },
                timing,
            )?;
            self.graph.connect_param(lfo, node, "gain")?;
            voice.push(&mut self.graph, Role::Tremolo, node)?;
        }

        if let Some(compressor) = params.compressor {
            let node = self.checkout(voice, Role::Compressor, NodeKind::Compressor, CompressorNode::new)?;
            self.set(node, "threshold", compressor.threshold)?;
            for (param, value) in [
                ("ratio", compressor.ratio),
                ("knee", compressor.knee),
                ("attack", compressor.attack),
                ("release", compressor.release),
            ] {
                if let Some(value) = value {
                    self.set(node, param, value)?;
                }
            }
            voice.push(&mut self.graph, Role::Compressor, node)?;
        }

        if let Some(pan) = params.pan {
            let node = self.checkout(voice, Role::Pan, NodeKind::Panner, PannerNode::new)?;
            self.set(node, "pan", pan.clamp(0.0, 1.0) * 2.0 - 1.0)?;
            voice.push(&mut self.graph, Role::Pan, node)?;
        }

        if let Some(phaser) = params.phaser {
            let node = self.checkout(voice, Role::Phaser, NodeKind::Phaser, PhaserNode::new)?;
            self.set(node, "rate", phaser.rate)?;
            self.set(node, "depth", phaser.depth)?;
            self.set(node, "center", phaser.center)?;
            self.set(node, "sweep", phaser.sweep)?;
            voice.push(&mut self.graph, Role::Phaser, node)?;
        }

        if let Some(semitones) = params.pitch_shift {
            self.worklet_stage(
                voice,
                Role::PitchShift,
                NodeKind::PitchShift,
                || PitchShiftNode::new(sample_rate),
                &[("shift", semitones)],
                timing,
            )?;
        }

        let post = self.gain_node(voice, Role::PostGain, params.postgain)?;
        voice.push(&mut self.graph, Role::PostGain, post)?;
        voice.output = post;

        self.route(voice, params, timing)
    }

    /// Sends, analyser tap, orbit connection and orbit effects.
    fn route(&mut self, voice: &mut Voice, params: &VoiceParams, timing: &VoiceTiming) -> Result<(), SynthError> {
        let channels = self.orbit_channels(params.orbit, params.channels.as_deref());
        let orbit = self.ensure_orbit(params.orbit, &channels)?;
        let (input, delay, reverb) = (orbit.input(), orbit.delay(), orbit.reverb());

        if let Some(send) = params.delay {
            let level = self.apply_curve(send.level);
            let node = self.gain_node(voice, Role::DelaySend, level)?;
            voice.tap(&mut self.graph, Role::DelaySend, node)?;
            self.graph.connect(node, delay)?;
            if let Some(orbit) = self.orbits.get_mut(&params.orbit) {
                orbit.configure_delay(&mut self.graph, send.time, send.feedback, timing.begin)?;
            }
        }

        if let Some(send) = params.room {
            let node = self.gain_node(voice, Role::RoomSend, send.level)?;
            voice.tap(&mut self.graph, Role::RoomSend, node)?;
            self.graph.connect(node, reverb)?;
            if let Some(orbit) = self.orbits.get_mut(&params.orbit) {
                orbit.configure_reverb(&mut self.graph, send.settings)?;
            }
        }

        if let Some(send) = &params.bus {
            let level = self.apply_curve(send.level);
            let node = self.gain_node(voice, Role::BusSend, level)?;
            voice.tap(&mut self.graph, Role::BusSend, node)?;
            let bus = self.buses.get_or_create(&mut self.graph, &send.name);
            self.graph.connect(node, bus)?;
        }

        if let Some(id) = &params.analyze {
            // the analyser is shared, so it is not tracked by the voice
            let analyser = self.analyser(id);
            for &tail in voice.chain().tails() {
                self.graph.connect(tail, analyser)?;
            }
        }

        for &tail in voice.chain().tails() {
            self.graph.connect(tail, input)?;
        }

        if let Some(value) = params.djf
            && let Some(orbit) = self.orbits.get_mut(&params.orbit)
        {
            orbit.set_djf(&mut self.graph, value, timing.begin)?;
        }

        if let Some(duck) = &params.duck {
            for &target in &duck.targets {
                // an orbit nobody has played on yet gets its default channels
                let channels = self.orbit_channels(target, None);
                self.ensure_orbit(target, &channels)?;
                if let Some(orbit) = self.orbits.get_mut(&target) {
                    orbit.duck(&mut self.graph, timing.begin, duck.onset, duck.attack, duck.depth)?;
                }
            }
        }
        Ok(())
    }
}
