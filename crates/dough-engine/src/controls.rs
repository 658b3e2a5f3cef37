//! Typed stage configuration.
//!
//! [`VoiceParams::from_event`] reads an [`Event`] once and produces one
//! optional struct per effect stage. The compiler then activates a stage by
//! checking its `Option`, never by probing raw keys.
//!
//! Controls whose value is a modulator block (or list of blocks) are split
//! off into [`ModulatorSpec`]s and do not count as static values.

use std::collections::BTreeMap;

use dough_core::AdsrShape;
use dough_effects::ReverbSettings;
use dough_synth::{EnvelopeShape, PeriodicShape};

use crate::error::SynthError;
use crate::event::{ControlValue, Event};

/// Shortest attack or decay an envelope resolves to, seconds.
pub const ENVELOPE_MIN: f64 = 0.001;
/// Shortest release an envelope resolves to, seconds.
pub const RELEASE_MIN: f64 = 0.01;

/// Amplitude envelope used when an event sets none of `attack`, `decay`,
/// `sustain`, `release`.
pub const DEFAULT_AMP_ENVELOPE: AdsrShape = AdsrShape {
    attack: 0.001,
    decay: 0.05,
    sustain: 1.0,
    release: 0.01,
};

const DEFAULT_FILTER_ENVELOPE: AdsrShape = AdsrShape {
    attack: 0.005,
    decay: 0.14,
    sustain: 0.0,
    release: 0.1,
};

/// Fill in a partially specified envelope.
///
/// Missing times collapse to the minimum. A missing sustain is full when no
/// decay was given (the envelope has nowhere to decay to) and minimal
/// otherwise. All four missing yields `defaults`.
///
/// ```rust
/// use dough_engine::{resolve_envelope, DEFAULT_AMP_ENVELOPE};
///
/// let env = resolve_envelope([None, Some(0.2), None, None], DEFAULT_AMP_ENVELOPE);
/// assert_eq!(env.decay, 0.2);
/// assert!(env.sustain < 0.01);
/// ```
pub fn resolve_envelope(values: [Option<f64>; 4], defaults: AdsrShape) -> AdsrShape {
    let [attack, decay, sustain, release] = values;
    if values.iter().all(Option::is_none) {
        return defaults;
    }
    let sustain = sustain.unwrap_or(if decay.is_none() { 1.0 } else { ENVELOPE_MIN });
    AdsrShape {
        attack: attack.unwrap_or(0.0).max(ENVELOPE_MIN),
        decay: decay.unwrap_or(0.0).max(ENVELOPE_MIN),
        sustain: sustain.clamp(0.0, 1.0) as f32,
        release: release.unwrap_or(0.0).max(RELEASE_MIN),
    }
}

/// Modulation rate: free-running or tied to the tempo.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rate {
    /// Cycles per second.
    Hz(f32),
    /// Cycles per pattern cycle.
    Sync(f32),
}

impl Rate {
    /// Frequency in Hz at `cps` pattern cycles per second.
    pub fn hz(self, cps: f64) -> f32 {
        match self {
            Rate::Hz(hz) => hz,
            Rate::Sync(sync) => (f64::from(sync) * cps) as f32,
        }
    }

    /// Start phase: synced rates lock to the pattern cycle.
    pub fn start_phase(self, cycle: f64, phase: f32) -> f32 {
        match self {
            Rate::Hz(_) => phase,
            Rate::Sync(sync) => (cycle * f64::from(sync) + f64::from(phase)).fract() as f32,
        }
    }
}

/// Filter slope selected by `ftype`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FilterSlope {
    /// One biquad section.
    #[default]
    Db12,
    /// Two cascaded biquad sections.
    Db24,
    /// Four-pole ladder (low-pass only).
    Ladder,
}

impl FilterSlope {
    fn parse(event: &Event) -> Result<Self, SynthError> {
        match event.get("ftype") {
            None => Ok(Self::Db12),
            Some(ControlValue::Number(n)) => Ok(match *n as i64 {
                1 => Self::Db24,
                2 => Self::Ladder,
                _ => Self::Db12,
            }),
            Some(ControlValue::Text(name)) => match name.as_str() {
                "12db" => Ok(Self::Db12),
                "24db" => Ok(Self::Db24),
                "ladder" => Ok(Self::Ladder),
                other => Err(SynthError::MalformedEvent(format!("unknown filter type '{other}'"))),
            },
            Some(_) => Err(SynthError::MalformedEvent("ftype should be a name".into())),
        }
    }
}

/// ADSR sweep of a filter's cutoff.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterEnvelope {
    /// Segment times and sustain.
    pub shape: AdsrShape,
    /// Sweep depth in octaves (negative sweeps down).
    pub amount: f32,
    /// Fraction of the sweep placed below the base cutoff.
    pub anchor: f32,
}

impl FilterEnvelope {
    /// Sweep endpoints `(min, max)` around `frequency`, clamped to the audio band.
    pub fn range(&self, frequency: f32) -> (f32, f32) {
        let offset = self.amount * self.anchor;
        let min = frequency * libm::exp2f(-offset);
        let max = frequency * libm::exp2f(self.amount - offset);
        (min.clamp(1.0, 20000.0), max.clamp(1.0, 20000.0))
    }
}

/// LFO sweep of a filter's cutoff, layered on the envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSweep {
    /// Sweep rate.
    pub rate: Rate,
    /// Depth relative to the base cutoff.
    pub depth: f32,
    /// Waveform.
    pub shape: PeriodicShape,
}

/// One filter stage.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterStage {
    /// Cutoff or centre frequency in Hz.
    pub frequency: f32,
    /// Resonance (biquad Q).
    pub q: f32,
    /// Optional ADSR sweep.
    pub envelope: Option<FilterEnvelope>,
    /// Optional LFO sweep.
    pub sweep: Option<FilterSweep>,
}

struct FilterKeys {
    frequency: &'static [&'static str],
    q: &'static [&'static str],
    prefix: &'static str,
}

const LOWPASS_KEYS: FilterKeys = FilterKeys {
    frequency: &["cutoff", "lpf"],
    q: &["resonance", "lpq"],
    prefix: "lp",
};
const HIGHPASS_KEYS: FilterKeys = FilterKeys {
    frequency: &["hcutoff", "hpf"],
    q: &["hresonance", "hpq"],
    prefix: "hp",
};
const BANDPASS_KEYS: FilterKeys = FilterKeys {
    frequency: &["bandf", "bpf"],
    q: &["bandq", "bpq"],
    prefix: "bp",
};

impl FilterStage {
    fn parse(event: &Event, keys: &FilterKeys) -> Result<Option<Self>, SynthError> {
        let Some(frequency) = event.first_number(keys.frequency)? else {
            return Ok(None);
        };
        let p = keys.prefix;
        let q = event.first_number(keys.q)?.unwrap_or(1.0);
        let times = [
            event.number(&format!("{p}attack"))?,
            event.number(&format!("{p}decay"))?,
            event.number(&format!("{p}sustain"))?,
            event.number(&format!("{p}release"))?,
        ];
        let amount = event.number(&format!("{p}env"))?;
        let envelope = if times.iter().any(Option::is_some) || amount.is_some() {
            Some(FilterEnvelope {
                shape: resolve_envelope(times, DEFAULT_FILTER_ENVELOPE),
                amount: amount.unwrap_or(1.0) as f32,
                anchor: event.number_or("fanchor", 0.0)? as f32,
            })
        } else {
            None
        };
        let rate = match (
            event.number(&format!("{p}rate"))?,
            event.number(&format!("{p}sync"))?,
        ) {
            (_, Some(sync)) => Some(Rate::Sync(sync as f32)),
            (Some(hz), None) => Some(Rate::Hz(hz as f32)),
            (None, None) => None,
        };
        let sweep = match rate {
            Some(rate) => Some(FilterSweep {
                rate,
                depth: event.number_or(&format!("{p}depth"), 0.5)? as f32,
                shape: parse_shape(event, &format!("{p}shape"), PeriodicShape::Sine)?,
            }),
            None => None,
        };
        Ok(Some(Self {
            frequency: frequency.max(1.0) as f32,
            q: q.max(0.0001) as f32,
            envelope,
            sweep,
        }))
    }
}

fn parse_shape(event: &Event, key: &str, default: PeriodicShape) -> Result<PeriodicShape, SynthError> {
    match event.get(key) {
        None => Ok(default),
        Some(ControlValue::Number(n)) => Ok(PeriodicShape::from_index(n.max(0.0) as usize)),
        Some(ControlValue::Text(name)) => PeriodicShape::from_name(name)
            .ok_or_else(|| SynthError::MalformedEvent(format!("unknown waveform '{name}' for {key}"))),
        Some(_) => Err(SynthError::MalformedEvent(format!("{key} should be a waveform name"))),
    }
}

/// Amplitude LFO.
#[derive(Debug, Clone, PartialEq)]
pub struct TremoloStage {
    /// Rate.
    pub rate: Rate,
    /// Dip depth, 0..1.
    pub depth: f32,
    /// Waveform skew.
    pub skew: f32,
    /// Start phase.
    pub phase: f32,
    /// Waveform.
    pub shape: PeriodicShape,
}

/// Compressor settings; `None` fields keep the node defaults.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressorStage {
    /// Threshold in dB.
    pub threshold: f32,
    /// Ratio.
    pub ratio: Option<f32>,
    /// Knee width in dB.
    pub knee: Option<f32>,
    /// Attack in seconds.
    pub attack: Option<f32>,
    /// Release in seconds.
    pub release: Option<f32>,
}

/// Phaser settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaserStage {
    /// Sweep rate in Hz.
    pub rate: f32,
    /// Wet depth.
    pub depth: f32,
    /// Centre frequency in Hz.
    pub center: f32,
    /// Sweep width in Hz.
    pub sweep: f32,
}

/// Send into the orbit delay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelaySend {
    /// Send level.
    pub level: f32,
    /// Delay time in seconds.
    pub time: f32,
    /// Feedback amount.
    pub feedback: f32,
}

/// Send into the orbit reverb.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReverbSend {
    /// Send level.
    pub level: f32,
    /// Room the reverb should be configured with.
    pub settings: ReverbSettings,
}

/// Send into a named bus.
#[derive(Debug, Clone, PartialEq)]
pub struct BusSend {
    /// Bus name.
    pub name: String,
    /// Send level.
    pub level: f32,
}

/// Sidechain-style dip on other orbits.
#[derive(Debug, Clone, PartialEq)]
pub struct DuckSpec {
    /// Orbits to duck.
    pub targets: Vec<u32>,
    /// Seconds until the dip bottoms out.
    pub onset: f64,
    /// Seconds to recover.
    pub attack: f64,
    /// Dip depth, 0..1.
    pub depth: f32,
}

/// How hard a modulator drives its target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModDepth {
    /// Depth relative to the target's current value.
    pub relative: f32,
    /// Absolute depth in target units; wins over `relative`.
    pub absolute: Option<f32>,
}

impl ModDepth {
    fn parse(params: &Event) -> Result<Self, SynthError> {
        Ok(Self {
            relative: params.number_or("depth", 1.0)? as f32,
            absolute: params.number_f32("depthabs")?,
        })
    }

    /// Depth in target units given the target's current value.
    ///
    /// A zero current value scales as if it were one.
    pub fn scale(self, current: f32) -> f32 {
        match self.absolute {
            Some(abs) => abs,
            None => {
                let base = if current == 0.0 { 1.0 } else { current };
                self.relative * base
            }
        }
    }
}

/// Periodic modulator settings.
#[derive(Debug, Clone, PartialEq)]
pub struct LfoSpec {
    /// Rate.
    pub rate: Rate,
    /// Waveform.
    pub shape: PeriodicShape,
    /// Skew.
    pub skew: f32,
    /// Output power curve.
    pub curve: f32,
    /// Offset added to the unipolar shape.
    pub dc_offset: f32,
    /// Start phase.
    pub phase: f32,
    /// Lower bound on the modulated value, in target units.
    pub min: Option<f32>,
    /// Upper bound on the modulated value, in target units.
    pub max: Option<f32>,
}

/// Envelope modulator settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvSpec {
    /// Segment times, sustain and curvatures.
    pub shape: EnvelopeShape,
    /// Allow retriggering before idle.
    pub retrigger: bool,
}

/// Signal a modulator block produces.
#[derive(Debug, Clone, PartialEq)]
pub enum ModSignal {
    /// LFO.
    Lfo(LfoSpec),
    /// Envelope.
    Envelope(EnvSpec),
    /// Read from a named bus.
    Bus(String),
}

/// One modulator block attached to a control.
#[derive(Debug, Clone, PartialEq)]
pub struct ModulatorSpec {
    /// Optional block id for diagnostics.
    pub id: Option<String>,
    /// Control to modulate.
    pub control: String,
    /// Optional sub-control qualifier.
    pub subcontrol: Option<String>,
    /// Depth.
    pub depth: ModDepth,
    /// Signal.
    pub signal: ModSignal,
}

#[derive(Clone, Copy)]
enum BlockKind {
    Lfo,
    Envelope,
    Bus,
}

impl BlockKind {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "lfo" => Some(Self::Lfo),
            "env" | "envelope" => Some(Self::Envelope),
            "bmod" | "busmod" => Some(Self::Bus),
            _ => None,
        }
    }
}

fn is_block(value: &ControlValue) -> bool {
    match value {
        ControlValue::Map(m) => m.contains_key("params") || m.contains_key("kind"),
        ControlValue::List(items) => !items.is_empty() && items.iter().all(is_block),
        _ => false,
    }
}

fn parse_block(
    key: &str,
    implied: Option<BlockKind>,
    block: &BTreeMap<String, ControlValue>,
) -> Result<ModulatorSpec, SynthError> {
    let kind = match block.get("kind") {
        Some(ControlValue::Text(name)) => BlockKind::from_name(name)
            .ok_or_else(|| SynthError::MalformedEvent(format!("unknown modulator kind '{name}'")))?,
        Some(_) => return Err(SynthError::MalformedEvent("modulator kind should be a name".into())),
        None => implied
            .ok_or_else(|| SynthError::MalformedEvent(format!("modulator under '{key}' has no kind")))?,
    };
    let params = match block.get("params") {
        Some(value) => Event::try_from(value.clone())?,
        None => Event::new(),
    };
    let id = match block.get("id") {
        Some(ControlValue::Text(s)) => Some(s.clone()),
        Some(ControlValue::Number(n)) => Some(n.to_string()),
        _ => None,
    };
    let control = match (implied, params.text("control")?) {
        (_, Some(control)) => control.to_string(),
        (None, None) => key.to_string(),
        (Some(_), None) => {
            return Err(SynthError::MalformedEvent(format!(
                "modulator under '{key}' names no target control"
            )));
        }
    };
    let subcontrol = params.text("subcontrol")?.map(str::to_string);
    let depth = ModDepth::parse(&params)?;
    let signal = match kind {
        BlockKind::Lfo => {
            let rate = match (params.number_f32("sync")?, params.number_f32("rate")?) {
                (Some(sync), _) => Rate::Sync(sync),
                (None, Some(hz)) => Rate::Hz(hz),
                (None, None) => Rate::Hz(1.0),
            };
            ModSignal::Lfo(LfoSpec {
                rate,
                shape: parse_shape(&params, "shape", PeriodicShape::Triangle)?,
                skew: params.number_or("skew", 0.5)? as f32,
                curve: params.number_or("curve", 1.0)? as f32,
                dc_offset: params.number_or("dcoffset", -0.5)? as f32,
                phase: params.number_or("phase", 0.0)? as f32,
                min: params.number_f32("min")?,
                max: params.number_f32("max")?,
            })
        }
        BlockKind::Envelope => {
            let defaults = EnvelopeShape::default();
            ModSignal::Envelope(EnvSpec {
                shape: EnvelopeShape {
                    attack: params.number_f32("attack")?.unwrap_or(defaults.attack),
                    decay: params.number_f32("decay")?.unwrap_or(defaults.decay),
                    sustain: params.number_f32("sustain")?.unwrap_or(defaults.sustain),
                    release: params.number_f32("release")?.unwrap_or(defaults.release),
                    attack_curve: params.number_f32("acurve")?.unwrap_or(0.0),
                    decay_curve: params.number_f32("dcurve")?.unwrap_or(0.0),
                    release_curve: params.number_f32("rcurve")?.unwrap_or(0.0),
                },
                retrigger: params.flag("retrigger")?.unwrap_or(false),
            })
        }
        BlockKind::Bus => {
            let bus = match params.get("bus") {
                Some(ControlValue::Text(name)) => name.clone(),
                Some(ControlValue::Number(n)) => n.to_string(),
                _ => {
                    return Err(SynthError::MalformedEvent(
                        "bus modulator names no bus".into(),
                    ));
                }
            };
            ModSignal::Bus(bus)
        }
    };
    Ok(ModulatorSpec {
        id,
        control,
        subcontrol,
        depth,
        signal,
    })
}

/// Split modulator blocks off an event. Returns the static controls and the blocks.
pub fn split_modulators(event: &Event) -> Result<(Event, Vec<ModulatorSpec>), SynthError> {
    let mut statics = Event::new();
    let mut blocks = Vec::new();
    for (key, value) in event.iter() {
        let implied = BlockKind::from_name(key);
        if !is_block(value) {
            if implied.is_some() && !matches!(value, ControlValue::Number(_)) {
                return Err(SynthError::MalformedEvent(format!(
                    "'{key}' should hold modulator blocks"
                )));
            }
            statics.insert(key, value.clone());
            continue;
        }
        match value {
            ControlValue::Map(block) => blocks.push(parse_block(key, implied, block)?),
            ControlValue::List(items) => {
                for item in items {
                    if let ControlValue::Map(block) = item {
                        blocks.push(parse_block(key, implied, block)?);
                    }
                }
            }
            _ => {}
        }
    }
    Ok((statics, blocks))
}

/// Everything the compiler needs from one event.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceParams {
    /// Source generator name.
    pub source: String,
    /// Gain before the curve.
    pub gain: f32,
    /// Velocity, multiplied into gain.
    pub velocity: f32,
    /// Final gain.
    pub postgain: f32,
    /// Amplitude envelope.
    pub amp: AdsrShape,
    /// Low-pass stage.
    pub lowpass: Option<FilterStage>,
    /// High-pass stage.
    pub highpass: Option<FilterStage>,
    /// Band-pass stage.
    pub bandpass: Option<FilterStage>,
    /// Filter slope.
    pub slope: FilterSlope,
    /// Vowel name.
    pub vowel: Option<String>,
    /// Bit depth.
    pub crush: Option<f32>,
    /// Hold factor.
    pub coarse: Option<f32>,
    /// Shape amount and post gain.
    pub shape: Option<(f32, f32)>,
    /// Distortion amount and post gain.
    pub distort: Option<(f32, f32)>,
    /// Tremolo.
    pub tremolo: Option<TremoloStage>,
    /// Compressor.
    pub compressor: Option<CompressorStage>,
    /// Pan, 0..1.
    pub pan: Option<f32>,
    /// Phaser.
    pub phaser: Option<PhaserStage>,
    /// Pitch shift in semitones.
    pub pitch_shift: Option<f32>,
    /// Orbit delay send.
    pub delay: Option<DelaySend>,
    /// Orbit reverb send.
    pub room: Option<ReverbSend>,
    /// Named bus send.
    pub bus: Option<BusSend>,
    /// Analyser id.
    pub analyze: Option<String>,
    /// Orbit number.
    pub orbit: u32,
    /// Output channels, 1-based, as given.
    pub channels: Option<Vec<usize>>,
    /// DJ filter position.
    pub djf: Option<f32>,
    /// Duck request.
    pub duck: Option<DuckSpec>,
    /// Modulator blocks.
    pub modulators: Vec<ModulatorSpec>,
}

impl VoiceParams {
    /// Parse an event. The returned static view excludes modulator-valued controls.
    pub fn from_event(event: &Event) -> Result<(Self, Event), SynthError> {
        let (e, modulators) = split_modulators(event)?;
        let params = Self {
            source: e.text("s")?.unwrap_or("triangle").to_string(),
            gain: e.number_or("gain", 0.8)?.max(0.0) as f32,
            velocity: e.number_or("velocity", 1.0)?.max(0.0) as f32,
            postgain: e.number_or("postgain", 1.0)? as f32,
            amp: resolve_envelope(
                [
                    e.number("attack")?,
                    e.number("decay")?,
                    e.number("sustain")?,
                    e.number("release")?,
                ],
                DEFAULT_AMP_ENVELOPE,
            ),
            lowpass: FilterStage::parse(&e, &LOWPASS_KEYS)?,
            highpass: FilterStage::parse(&e, &HIGHPASS_KEYS)?,
            bandpass: FilterStage::parse(&e, &BANDPASS_KEYS)?,
            slope: FilterSlope::parse(&e)?,
            vowel: e.text("vowel")?.map(str::to_string),
            crush: e.number_f32("crush")?,
            coarse: e.number_f32("coarse")?,
            shape: match e.number_f32("shape")? {
                Some(s) => Some((s, e.number_or("shapevol", 1.0)? as f32)),
                None => None,
            },
            distort: match e.number_f32("distort")? {
                Some(d) => Some((d, e.number_or("distortvol", 1.0)? as f32)),
                None => None,
            },
            tremolo: Self::tremolo(&e)?,
            compressor: match e.number_f32("compressor")? {
                Some(threshold) => Some(CompressorStage {
                    threshold,
                    ratio: e.number_f32("compressorRatio")?,
                    knee: e.number_f32("compressorKnee")?,
                    attack: e.number_f32("compressorAttack")?,
                    release: e.number_f32("compressorRelease")?,
                }),
                None => None,
            },
            pan: e.number_f32("pan")?,
            phaser: match e.number_f32("phaserrate")? {
                Some(rate) => Some(PhaserStage {
                    rate,
                    depth: e.number_or("phaserdepth", 0.75)? as f32,
                    center: e.number_or("phasercenter", 1000.0)? as f32,
                    sweep: e.number_or("phasersweep", 2000.0)? as f32,
                }),
                None => None,
            },
            pitch_shift: e.number_f32("pshift")?,
            delay: match e.number_f32("delay")? {
                Some(level) if level > 0.0 => Some(DelaySend {
                    level,
                    time: e.number_or("delaytime", 0.25)? as f32,
                    feedback: e.number_or("delayfeedback", 0.5)? as f32,
                }),
                _ => None,
            },
            room: match e.number_f32("room")? {
                Some(level) if level > 0.0 => {
                    let defaults = ReverbSettings::default();
                    Some(ReverbSend {
                        level,
                        settings: ReverbSettings {
                            size: e
                                .first_number(&["roomsize", "size"])?
                                .map_or(defaults.size, |v| v as f32),
                            fade: e.number_f32("roomfade")?.unwrap_or(defaults.fade),
                            lp: e.number_f32("roomlp")?.unwrap_or(defaults.lp),
                            dim: e.number_f32("roomdim")?.unwrap_or(defaults.dim),
                        },
                    })
                }
                _ => None,
            },
            bus: match e.get("bus") {
                None => None,
                Some(ControlValue::Text(name)) => Some(name.clone()),
                Some(ControlValue::Number(n)) => Some(n.to_string()),
                Some(_) => {
                    return Err(SynthError::MalformedEvent("bus should be a name or number".into()));
                }
            }
            .map(|name| -> Result<BusSend, SynthError> {
                Ok(BusSend {
                    name,
                    level: e.number_or("busgain", 1.0)? as f32,
                })
            })
            .transpose()?,
            analyze: match e.get("analyze") {
                None => None,
                Some(ControlValue::Text(id)) => Some(id.clone()),
                Some(ControlValue::Number(n)) => Some(n.to_string()),
                Some(_) => {
                    return Err(SynthError::MalformedEvent("analyze should be an id".into()));
                }
            },
            orbit: e.number_or("orbit", 1.0)?.max(0.0) as u32,
            channels: Self::channels(&e)?,
            djf: e.number_f32("djf")?,
            duck: Self::duck(&e)?,
            modulators,
        };
        Ok((params, e))
    }

    fn tremolo(e: &Event) -> Result<Option<TremoloStage>, SynthError> {
        let rate = match (e.number_f32("tremolosync")?, e.number_f32("tremolo")?) {
            (Some(sync), _) => Rate::Sync(sync),
            (None, Some(hz)) => Rate::Hz(hz),
            (None, None) => return Ok(None),
        };
        Ok(Some(TremoloStage {
            rate,
            depth: e.number_or("tremolodepth", 1.0)?.clamp(0.0, 1.0) as f32,
            skew: e.number_or("tremoloskew", 0.5)? as f32,
            phase: e.number_or("tremolophase", 0.0)? as f32,
            shape: parse_shape(e, "tremoloshape", PeriodicShape::Sine)?,
        }))
    }

    fn channels(e: &Event) -> Result<Option<Vec<usize>>, SynthError> {
        match e.get("channels") {
            None => Ok(None),
            Some(ControlValue::Number(n)) => Ok(Some(vec![n.max(1.0) as usize])),
            Some(ControlValue::List(items)) => items
                .iter()
                .map(|item| {
                    item.as_f64()
                        .map(|n| n.max(1.0) as usize)
                        .ok_or_else(|| SynthError::MalformedEvent("channels should be numbers".into()))
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Some),
            Some(_) => Err(SynthError::MalformedEvent("channels should be a list".into())),
        }
    }

    fn duck(e: &Event) -> Result<Option<DuckSpec>, SynthError> {
        let targets = match e.get("duckorbit") {
            None => return Ok(None),
            Some(ControlValue::Number(n)) => vec![n.max(0.0) as u32],
            Some(ControlValue::List(items)) => items
                .iter()
                .filter_map(ControlValue::as_f64)
                .map(|n| n.max(0.0) as u32)
                .collect(),
            Some(ControlValue::Text(s)) => s
                .split(':')
                .filter_map(|part| part.trim().parse::<u32>().ok())
                .collect(),
            Some(_) => {
                return Err(SynthError::MalformedEvent("duckorbit should be orbit numbers".into()));
            }
        };
        Ok(Some(DuckSpec {
            targets,
            onset: e.number_or("duckonset", 0.003)?.max(0.0),
            attack: e.number_or("duckattack", 0.1)?.max(0.001),
            depth: e.number_or("duckdepth", 1.0)?.clamp(0.0, 1.0) as f32,
        }))
    }

    /// True when no optional stage, send or orbit effect is requested.
    pub fn is_plain(&self) -> bool {
        self.lowpass.is_none()
            && self.highpass.is_none()
            && self.bandpass.is_none()
            && self.vowel.is_none()
            && self.crush.is_none()
            && self.coarse.is_none()
            && self.shape.is_none()
            && self.distort.is_none()
            && self.tremolo.is_none()
            && self.compressor.is_none()
            && self.pan.is_none()
            && self.phaser.is_none()
            && self.pitch_shift.is_none()
            && self.delay.is_none()
            && self.room.is_none()
            && self.bus.is_none()
            && self.analyze.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> VoiceParams {
        VoiceParams::from_event(&Event::from_json(json).unwrap()).unwrap().0
    }

    #[test]
    fn test_defaults() {
        let p = parse("{}");
        assert_eq!(p.source, "triangle");
        assert_eq!(p.gain, 0.8);
        assert_eq!(p.amp, DEFAULT_AMP_ENVELOPE);
        assert_eq!(p.orbit, 1);
        assert!(p.is_plain());
    }

    #[test]
    fn test_envelope_resolution() {
        let attack_only = resolve_envelope([Some(0.1), None, None, None], DEFAULT_AMP_ENVELOPE);
        assert_eq!(attack_only.sustain, 1.0);
        assert_eq!(attack_only.release, RELEASE_MIN);
        let decayed = resolve_envelope([Some(0.1), Some(0.3), None, None], DEFAULT_AMP_ENVELOPE);
        assert!(decayed.sustain < 0.01);
        let explicit = resolve_envelope([None, None, Some(0.4), Some(1.0)], DEFAULT_AMP_ENVELOPE);
        assert_eq!(explicit.sustain, 0.4);
        assert_eq!(explicit.attack, ENVELOPE_MIN);
    }

    #[test]
    fn test_filter_stage_with_envelope_and_sweep() {
        let p = parse(r#"{"cutoff": 500, "lpq": 4, "lpenv": 2, "lpsync": 0.5, "ftype": "24db"}"#);
        let lp = p.lowpass.unwrap();
        assert_eq!(lp.q, 4.0);
        let env = lp.envelope.unwrap();
        assert_eq!(env.amount, 2.0);
        let (lo, hi) = env.range(500.0);
        assert!((lo - 500.0).abs() < 1e-3 && (hi - 2000.0).abs() < 1e-2);
        assert_eq!(lp.sweep.unwrap().rate, Rate::Sync(0.5));
        assert_eq!(p.slope, FilterSlope::Db24);
        assert!(p.highpass.is_none());
    }

    #[test]
    fn test_anchor_splits_the_sweep() {
        let env = FilterEnvelope {
            shape: DEFAULT_FILTER_ENVELOPE,
            amount: 2.0,
            anchor: 0.5,
        };
        let (lo, hi) = env.range(1000.0);
        assert!((lo - 500.0).abs() < 1e-2);
        assert!((hi - 2000.0).abs() < 1e-1);
    }

    #[test]
    fn test_zero_send_levels_skip_sends() {
        let p = parse(r#"{"delay": 0, "room": 0.3, "roomsize": 4}"#);
        assert!(p.delay.is_none());
        assert_eq!(p.room.unwrap().settings.size, 4.0);
    }

    #[test]
    fn test_modulator_blocks_split_off() {
        let event = Event::from_json(
            r#"{"s": "saw", "cutoff": 800,
                "lfo": [{"id": "w", "params": {"control": "cutoff", "rate": 3, "depthabs": 200}}],
                "gain": {"kind": "env", "params": {"attack": 0.2}}}"#,
        )
        .unwrap();
        let (p, statics) = VoiceParams::from_event(&event).unwrap();
        assert_eq!(p.modulators.len(), 2);
        assert!(!statics.has("lfo"));
        assert!(!statics.has("gain"));
        assert_eq!(p.gain, 0.8);
        let lfo = p.modulators.iter().find(|m| m.id.as_deref() == Some("w")).unwrap();
        assert_eq!(lfo.control, "cutoff");
        assert_eq!(lfo.depth.scale(800.0), 200.0);
        let env = p.modulators.iter().find(|m| m.control == "gain").unwrap();
        assert!(matches!(env.signal, ModSignal::Envelope(_)));
    }

    #[test]
    fn test_relative_depth_treats_zero_as_one() {
        let depth = ModDepth {
            relative: 0.5,
            absolute: None,
        };
        assert_eq!(depth.scale(0.0), 0.5);
        assert_eq!(depth.scale(1000.0), 500.0);
    }

    #[test]
    fn test_block_without_target_is_malformed() {
        let event = Event::from_json(r#"{"lfo": [{"params": {"rate": 1}}]}"#).unwrap();
        assert!(matches!(
            VoiceParams::from_event(&event),
            Err(SynthError::MalformedEvent(_))
        ));
    }

    #[test]
    fn test_synced_rate() {
        let rate = Rate::Sync(2.0);
        assert_eq!(rate.hz(0.5), 1.0);
        assert!((rate.start_phase(1.25, 0.0) - 0.5).abs() < 1e-6);
        assert_eq!(Rate::Hz(3.0).start_phase(7.3, 0.25), 0.25);
    }

    #[test]
    fn test_duck_targets() {
        let p = parse(r#"{"duckorbit": "2:3", "duckdepth": 0.5}"#);
        let duck = p.duck.unwrap();
        assert_eq!(duck.targets, vec![2, 3]);
        assert_eq!(duck.depth, 0.5);
    }
}
