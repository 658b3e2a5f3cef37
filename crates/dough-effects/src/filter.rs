//! Filter nodes: biquad, ladder, vowel formant bank and the orbit DJ filter.

use core::any::Any;

use dough_core::{
    AudioNode, Biquad, BiquadKind, NodeKind, NodeState, ParamSpec, ProcessContext, StereoBlock,
    cents_to_ratio, flush_denormal,
};
use libm::{expf, powf, tanhf};

const BIQUAD_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("frequency", 350.0, 1.0, 24000.0),
    ParamSpec::new("Q", 1.0, 0.0001, 1000.0),
    ParamSpec::new("detune", 0.0, -4800.0, 4800.0),
];

/// Stereo biquad section with automatable frequency, Q and detune (cents).
///
/// Coefficients are recomputed only on frames where the effective
/// frequency or Q moved.
///
/// ## Parameters
///
/// | Index | Name | Range | Default |
/// |-------|------|-------|---------|
/// | 0 | frequency | 1–24000 Hz | 350 |
/// | 1 | Q | 0.0001–1000 | 1 |
/// | 2 | detune | ±4800 cents | 0 |
#[derive(Debug, Clone)]
pub struct BiquadNode {
    kind: BiquadKind,
    left: Biquad,
    right: Biquad,
    last: (f32, f32),
}

impl BiquadNode {
    /// Filter section of the given response type.
    pub fn new(kind: BiquadKind) -> Self {
        Self {
            kind,
            left: Biquad::new(),
            right: Biquad::new(),
            last: (f32::NAN, f32::NAN),
        }
    }

    /// Response type.
    pub fn filter_kind(&self) -> BiquadKind {
        self.kind
    }

    /// Change the response type, e.g. when a pooled section is reused.
    pub fn set_filter_kind(&mut self, kind: BiquadKind) {
        if kind != self.kind {
            self.kind = kind;
            self.last = (f32::NAN, f32::NAN);
        }
    }
}

impl AudioNode for BiquadNode {
    fn kind(&self) -> NodeKind {
        NodeKind::Biquad
    }

    fn params(&self) -> &'static [ParamSpec] {
        BIQUAD_PARAMS
    }

    fn process(
        &mut self,
        ctx: &ProcessContext<'_>,
        input: &StereoBlock,
        output: &mut StereoBlock,
    ) -> NodeState {
        let frequency = ctx.param(0);
        let q = ctx.param(1);
        let detune = ctx.param(2);
        for i in ctx.span.clone() {
            let f = frequency[i] * cents_to_ratio(detune[i]);
            if (f, q[i]) != self.last {
                let c = self.kind.coefficients(f, q[i], ctx.sample_rate);
                self.left.set(c);
                self.right.set(c);
                self.last = (f, q[i]);
            }
            output.left[i] = self.left.process(input.left[i]);
            output.right[i] = self.right.process(input.right[i]);
        }
        NodeState::Active
    }

    fn reset(&mut self) {
        self.left.clear();
        self.right.clear();
        self.last = (f32::NAN, f32::NAN);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

const LADDER_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("frequency", 500.0, 1.0, 24000.0),
    ParamSpec::new("q", 0.0, 0.0, 1.0),
    ParamSpec::new("drive", 1.0, 0.0, 50.0),
];

/// One channel of a four-pole transistor ladder.
#[derive(Debug, Clone, Copy, Default)]
struct LadderState {
    stages: [f32; 4],
}

impl LadderState {
    #[inline]
    fn process(&mut self, input: f32, g: f32, k: f32, drive: f32) -> f32 {
        let x = tanhf(drive * input - k * self.stages[3]);
        let s = &mut self.stages;
        s[0] = flush_denormal(s[0] + g * (x - s[0]));
        s[1] = flush_denormal(s[1] + g * (s[0] - s[1]));
        s[2] = flush_denormal(s[2] + g * (s[1] - s[2]));
        s[3] = flush_denormal(s[3] + g * (s[2] - s[3]));
        s[3]
    }
}

/// 24 dB/oct ladder low-pass with saturating feedback.
///
/// `q` is normalized resonance (1 is the edge of self-oscillation) and
/// `drive` scales the signal into the input saturator.
#[derive(Debug, Clone, Default)]
pub struct LadderNode {
    left: LadderState,
    right: LadderState,
}

impl LadderNode {
    /// Ladder with cleared state.
    pub fn new() -> Self {
        Self::default()
    }
}

impl AudioNode for LadderNode {
    fn kind(&self) -> NodeKind {
        NodeKind::Ladder
    }

    fn params(&self) -> &'static [ParamSpec] {
        LADDER_PARAMS
    }

    fn process(
        &mut self,
        ctx: &ProcessContext<'_>,
        input: &StereoBlock,
        output: &mut StereoBlock,
    ) -> NodeState {
        let frequency = ctx.param(0);
        let q = ctx.param(1);
        let drive = ctx.param(2);
        let nyquist = ctx.sample_rate * 0.45;
        for i in ctx.span.clone() {
            let fc = frequency[i].clamp(1.0, nyquist);
            let g = 1.0 - expf(-core::f32::consts::TAU * fc / ctx.sample_rate);
            let k = 3.98 * q[i];
            // drive > 1 pushes the saturator, compensate so level stays put
            let makeup = 1.0 / drive[i].max(1.0).sqrt();
            output.left[i] = self.left.process(input.left[i], g, k, drive[i]) * makeup;
            output.right[i] = self.right.process(input.right[i], g, k, drive[i]) * makeup;
        }
        NodeState::Active
    }

    fn reset(&mut self) {
        self.left = LadderState::default();
        self.right = LadderState::default();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Vowel selection for [`VowelNode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vowel {
    /// As in "father".
    A,
    /// As in "bed".
    E,
    /// As in "see".
    I,
    /// As in "law".
    O,
    /// As in "boot".
    U,
}

struct Formants {
    freqs: [f32; 5],
    gains: [f32; 5],
    qs: [f32; 5],
}

const FORMANT_A: Formants = Formants {
    freqs: [660.0, 1120.0, 2750.0, 3000.0, 3350.0],
    gains: [1.0, 0.5012, 0.0708, 0.0631, 0.0126],
    qs: [80.0, 90.0, 120.0, 130.0, 140.0],
};
const FORMANT_E: Formants = Formants {
    freqs: [440.0, 1800.0, 2700.0, 3000.0, 3300.0],
    gains: [1.0, 0.1995, 0.1259, 0.1, 0.1],
    qs: [70.0, 80.0, 100.0, 120.0, 120.0],
};
const FORMANT_I: Formants = Formants {
    freqs: [270.0, 1850.0, 2900.0, 3350.0, 3590.0],
    gains: [1.0, 0.0631, 0.0631, 0.0158, 0.0158],
    qs: [40.0, 90.0, 100.0, 120.0, 120.0],
};
const FORMANT_O: Formants = Formants {
    freqs: [430.0, 820.0, 2700.0, 3000.0, 3300.0],
    gains: [1.0, 0.3162, 0.0501, 0.0794, 0.01995],
    qs: [40.0, 80.0, 100.0, 120.0, 120.0],
};
const FORMANT_U: Formants = Formants {
    freqs: [370.0, 630.0, 2750.0, 3000.0, 3400.0],
    gains: [1.0, 0.1, 0.0708, 0.0316, 0.01995],
    qs: [40.0, 60.0, 100.0, 120.0, 120.0],
};

impl Vowel {
    /// Parse `a`, `e`, `i`, `o` or `u`.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name.trim().to_ascii_lowercase().as_str() {
            "a" => Self::A,
            "e" => Self::E,
            "i" => Self::I,
            "o" => Self::O,
            "u" => Self::U,
            _ => return None,
        })
    }

    fn formants(self) -> &'static Formants {
        match self {
            Self::A => &FORMANT_A,
            Self::E => &FORMANT_E,
            Self::I => &FORMANT_I,
            Self::O => &FORMANT_O,
            Self::U => &FORMANT_U,
        }
    }

    /// Centre frequencies of the five formants in Hz.
    pub fn formant_frequencies(self) -> [f32; 5] {
        self.formants().freqs
    }
}

const VOWEL_MAKEUP: f32 = 8.0;

/// Parallel bank of five band-pass formants.
#[derive(Debug, Clone)]
pub struct VowelNode {
    vowel: Vowel,
    left: [Biquad; 5],
    right: [Biquad; 5],
}

impl VowelNode {
    /// Formant bank for `vowel`.
    pub fn new(sample_rate: f32, vowel: Vowel) -> Self {
        let mut node = Self {
            vowel,
            left: core::array::from_fn(|_| Biquad::new()),
            right: core::array::from_fn(|_| Biquad::new()),
        };
        node.set_vowel(sample_rate, vowel);
        node
    }

    /// Current vowel.
    pub fn vowel(&self) -> Vowel {
        self.vowel
    }

    /// Retune the bank.
    pub fn set_vowel(&mut self, sample_rate: f32, vowel: Vowel) {
        self.vowel = vowel;
        let f = vowel.formants();
        for k in 0..5 {
            let c = BiquadKind::Bandpass.coefficients(f.freqs[k], f.qs[k], sample_rate);
            self.left[k].set(c);
            self.right[k].set(c);
        }
    }
}

impl AudioNode for VowelNode {
    fn kind(&self) -> NodeKind {
        NodeKind::Vowel
    }

    fn process(
        &mut self,
        ctx: &ProcessContext<'_>,
        input: &StereoBlock,
        output: &mut StereoBlock,
    ) -> NodeState {
        let gains = &self.vowel.formants().gains;
        for i in ctx.span.clone() {
            let (mut l, mut r) = (0.0, 0.0);
            for k in 0..5 {
                l += self.left[k].process(input.left[i]) * gains[k];
                r += self.right[k].process(input.right[i]) * gains[k];
            }
            output.left[i] = l * VOWEL_MAKEUP;
            output.right[i] = r * VOWEL_MAKEUP;
        }
        NodeState::Active
    }

    fn reset(&mut self) {
        for b in self.left.iter_mut().chain(self.right.iter_mut()) {
            b.clear();
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

const DJF_PARAMS: &[ParamSpec] = &[ParamSpec::new("value", 0.5, 0.0, 1.0)];

/// Cross-fade "DJ" filter: below 0.5 a low-pass closes toward 40 Hz, above
/// 0.5 a high-pass opens toward 10 kHz, 0.5 passes the signal untouched.
#[derive(Debug, Clone)]
pub struct DjFilterNode {
    left: Biquad,
    right: Biquad,
    last: f32,
}

impl Default for DjFilterNode {
    fn default() -> Self {
        Self::new()
    }
}

impl DjFilterNode {
    /// Bypassed DJ filter.
    pub fn new() -> Self {
        Self {
            left: Biquad::new(),
            right: Biquad::new(),
            last: f32::NAN,
        }
    }

    /// Response and cutoff for a DJ value, `None` in the bypass zone.
    pub fn response(value: f32) -> Option<(BiquadKind, f32)> {
        let v = value.clamp(0.0, 1.0);
        if (v - 0.5).abs() < 1e-3 {
            None
        } else if v < 0.5 {
            Some((BiquadKind::Lowpass, 40.0 * powf(500.0, v * 2.0)))
        } else {
            Some((BiquadKind::Highpass, 20.0 * powf(500.0, (v - 0.5) * 2.0)))
        }
    }
}

impl AudioNode for DjFilterNode {
    fn kind(&self) -> NodeKind {
        NodeKind::Biquad
    }

    fn params(&self) -> &'static [ParamSpec] {
        DJF_PARAMS
    }

    fn process(
        &mut self,
        ctx: &ProcessContext<'_>,
        input: &StereoBlock,
        output: &mut StereoBlock,
    ) -> NodeState {
        let value = ctx.param(0);
        for i in ctx.span.clone() {
            let Some((kind, cutoff)) = Self::response(value[i]) else {
                output.left[i] = input.left[i];
                output.right[i] = input.right[i];
                continue;
            };
            if value[i] != self.last {
                let c = kind.coefficients(cutoff, core::f32::consts::FRAC_1_SQRT_2, ctx.sample_rate);
                self.left.set(c);
                self.right.set(c);
                self.last = value[i];
            }
            output.left[i] = self.left.process(input.left[i]);
            output.right[i] = self.right.process(input.right[i]);
        }
        NodeState::Active
    }

    fn reset(&mut self) {
        self.left.clear();
        self.right.clear();
        self.last = f32::NAN;
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

    fn sine(freq: f32, frames: usize) -> StereoBlock {
        let mut block = StereoBlock::new(frames);
        for i in 0..frames {
            let s = libm::sinf(core::f32::consts::TAU * freq * i as f32 / 48000.0);
            block.left[i] = s;
            block.right[i] = s;
        }
        block
    }

    fn render(node: &mut dyn AudioNode, params: &[f32], input: &StereoBlock) -> StereoBlock {
        let frames = input.len();
        let mut lanes = Vec::new();
        for &p in params {
            lanes.extend(core::iter::repeat_n(p, frames));
        }
        let ctx = ProcessContext::new(48000.0, 0.0, frames, 0..frames, &lanes);
        let mut out = StereoBlock::new(frames);
        node.process(&ctx, input, &mut out);
        out
    }

    fn tail_peak(block: &StereoBlock) -> f32 {
        let half = block.len() / 2;
        block.left[half..].iter().fold(0.0f32, |a, s| a.max(s.abs()))
    }

    #[test]
    fn test_biquad_lowpass_attenuates_highs() {
        let mut node = BiquadNode::new(BiquadKind::Lowpass);
        let out = render(&mut node, &[500.0, 0.707, 0.0], &sine(8000.0, 4800));
        assert!(tail_peak(&out) < 0.05);
    }

    #[test]
    fn test_biquad_detune_shifts_cutoff() {
        // two octaves down from 8 kHz puts a 5 kHz tone well past the cutoff
        let mut plain = BiquadNode::new(BiquadKind::Lowpass);
        let mut detuned = BiquadNode::new(BiquadKind::Lowpass);
        let input = sine(5000.0, 4800);
        let a = tail_peak(&render(&mut plain, &[8000.0, 0.707, 0.0], &input));
        let b = tail_peak(&render(&mut detuned, &[8000.0, 0.707, -2400.0], &input));
        assert!(b < a * 0.6, "{a} vs {b}");
    }

    #[test]
    fn test_ladder_passes_lows_cuts_highs() {
        let mut node = LadderNode::new();
        let low = tail_peak(&render(&mut node, &[2000.0, 0.0, 1.0], &sine(100.0, 9600)));
        node.reset();
        let high = tail_peak(&render(&mut node, &[200.0, 0.0, 1.0], &sine(8000.0, 9600)));
        assert!(low > 0.5, "low {low}");
        assert!(high < 0.01, "high {high}");
    }

    #[test]
    fn test_vowel_names() {
        assert_eq!(Vowel::from_name("A"), Some(Vowel::A));
        assert_eq!(Vowel::from_name("x"), None);
        assert_eq!(Vowel::I.formant_frequencies()[0], 270.0);
    }

    #[test]
    fn test_dj_filter_bypass_at_centre() {
        let input = sine(3000.0, 256);
        let out = render(&mut DjFilterNode::new(), &[0.5], &input);
        assert_eq!(out.left, input.left);
        assert_eq!(DjFilterNode::response(0.2).map(|r| r.0), Some(BiquadKind::Lowpass));
        assert_eq!(DjFilterNode::response(0.8).map(|r| r.0), Some(BiquadKind::Highpass));
    }
}
