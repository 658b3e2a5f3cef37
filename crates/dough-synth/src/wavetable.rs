//! Wavetable oscillator with phase-warp modes.
//!
//! A [`Wavetable`] is a stack of equal-length single-cycle frames. The node
//! reads it with linear interpolation both within a frame and across frames
//! (`position` 0..1 scans the stack). Before the lookup the phase passes
//! through a [`WarpMode`] scaled by the `warp` amount, which reshapes the
//! cycle without touching the table.

use core::any::Any;
use std::sync::Arc;

use dough_core::{
    AudioNode, NodeKind, NodeState, ParamSpec, ProcessContext, StereoBlock, cents_to_ratio,
    wrap_phase,
};
use libm::{floorf, powf};

/// A stack of single-cycle frames.
#[derive(Debug, Clone, PartialEq)]
pub struct Wavetable {
    frames: Vec<Vec<f32>>,
    frame_len: usize,
}

impl Wavetable {
    /// Build a table. `None` if there are no frames, a frame is shorter than
    /// two samples, or frame lengths differ.
    pub fn new(frames: Vec<Vec<f32>>) -> Option<Self> {
        let frame_len = frames.first()?.len();
        if frame_len < 2 || frames.iter().any(|f| f.len() != frame_len) {
            return None;
        }
        Some(Self { frames, frame_len })
    }

    /// Split one long buffer into frames of `frame_len` samples, dropping the remainder.
    pub fn from_interleaved(samples: &[f32], frame_len: usize) -> Option<Self> {
        if frame_len == 0 {
            return None;
        }
        Self::new(samples.chunks_exact(frame_len).map(<[f32]>::to_vec).collect())
    }

    /// Number of frames.
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Samples per frame.
    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    /// Interpolated sample at table `position` (0..1) and cycle `phase` (0..1).
    pub fn sample(&self, position: f32, phase: f32) -> f32 {
        let scan = position.clamp(0.0, 1.0) * (self.frames.len() - 1) as f32;
        let lower = scan as usize;
        let upper = (lower + 1).min(self.frames.len() - 1);
        let mix = scan - lower as f32;
        let a = self.read_frame(lower, phase);
        if upper == lower || mix == 0.0 {
            return a;
        }
        a + (self.read_frame(upper, phase) - a) * mix
    }

    fn read_frame(&self, frame: usize, phase: f32) -> f32 {
        let data = &self.frames[frame];
        let x = wrap_phase(phase) * self.frame_len as f32;
        let i = (x as usize).min(self.frame_len - 1);
        let frac = x - i as f32;
        let j = (i + 1) % self.frame_len;
        data[i] + (data[j] - data[i]) * frac
    }
}

/// Phase warp applied before the table lookup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WarpMode {
    /// Unwarped.
    #[default]
    None,
    /// Squeeze the first half of the cycle into a shorter span.
    Asym,
    /// Power curve that rushes through the start of the cycle.
    BendPlus,
    /// Power curve that lingers at the start of the cycle.
    BendMinus,
    /// Hard-sync style phase multiplication.
    Sync,
    /// Stepped phase.
    Quantize,
    /// Phase multiplied then folded back into range.
    Fold,
    /// Cycle played forward then backward.
    Mirror,
}

impl WarpMode {
    /// Parse a warp mode name.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name.to_ascii_lowercase().as_str() {
            "none" => Self::None,
            "asym" => Self::Asym,
            "bendp" | "bend+" => Self::BendPlus,
            "bendm" | "bend-" => Self::BendMinus,
            "sync" => Self::Sync,
            "quant" | "quantize" => Self::Quantize,
            "fold" => Self::Fold,
            "mirror" => Self::Mirror,
            _ => return None,
        })
    }

    /// Mode by index in declaration order; out-of-range indices wrap.
    pub fn from_index(index: usize) -> Self {
        match index % 8 {
            0 => Self::None,
            1 => Self::Asym,
            2 => Self::BendPlus,
            3 => Self::BendMinus,
            4 => Self::Sync,
            5 => Self::Quantize,
            6 => Self::Fold,
            _ => Self::Mirror,
        }
    }

    /// Warp `phase` (0..1) by `amount` (0..1).
    pub fn apply(self, phase: f32, amount: f32) -> f32 {
        let amt = amount.clamp(0.0, 1.0);
        if amt == 0.0 {
            return phase;
        }
        match self {
            Self::None => phase,
            Self::Asym => {
                let knee = 0.5 * (1.0 - 0.98 * amt);
                if phase < knee {
                    0.5 * phase / knee
                } else {
                    0.5 + 0.5 * (phase - knee) / (1.0 - knee)
                }
            }
            Self::BendPlus => powf(phase, 1.0 / (1.0 + 3.0 * amt)),
            Self::BendMinus => powf(phase, 1.0 + 3.0 * amt),
            Self::Sync => wrap_phase(phase * (1.0 + 7.0 * amt)),
            Self::Quantize => {
                let steps = 2.0 + floorf((1.0 - amt) * 62.0);
                floorf(phase * steps) / steps
            }
            Self::Fold => {
                let t = phase * (1.0 + 3.0 * amt);
                let f = wrap_phase(t * 0.5) * 2.0;
                if f > 1.0 { 2.0 - f } else { f }
            }
            Self::Mirror => {
                let mirrored = if phase < 0.5 {
                    2.0 * phase
                } else {
                    2.0 - 2.0 * phase
                };
                phase + (mirrored - phase) * amt
            }
        }
    }
}

const WAVETABLE_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("frequency", 440.0, -1.0e6, 1.0e6),
    ParamSpec::new("detune", 0.0, -1.0e6, 1.0e6),
    ParamSpec::new("position", 0.0, 0.0, 1.0),
    ParamSpec::new("warp", 0.0, 0.0, 1.0),
];

/// Scheduled wavetable source.
#[derive(Debug, Clone)]
pub struct WavetableNode {
    table: Arc<Wavetable>,
    warp_mode: WarpMode,
    sample_rate: f32,
    phase: f32,
}

impl WavetableNode {
    /// Play `table` with the given warp mode.
    pub fn new(sample_rate: f32, table: Arc<Wavetable>, warp_mode: WarpMode) -> Self {
        Self {
            table,
            warp_mode,
            sample_rate,
            phase: 0.0,
        }
    }

    /// Change the warp mode.
    pub fn set_warp_mode(&mut self, mode: WarpMode) {
        self.warp_mode = mode;
    }
}

impl AudioNode for WavetableNode {
    fn kind(&self) -> NodeKind {
        NodeKind::Wavetable
    }

    fn params(&self) -> &'static [ParamSpec] {
        WAVETABLE_PARAMS
    }

    fn process(
        &mut self,
        ctx: &ProcessContext<'_>,
        _input: &StereoBlock,
        output: &mut StereoBlock,
    ) -> NodeState {
        let frequency = ctx.param(0);
        let detune = ctx.param(1);
        let position = ctx.param(2);
        let warp = ctx.param(3);
        for i in ctx.span.clone() {
            let warped = self.warp_mode.apply(self.phase, warp[i]);
            let y = self.table.sample(position[i], warped);
            output.left[i] = y;
            output.right[i] = y;
            let dt = frequency[i] * cents_to_ratio(detune[i]) / self.sample_rate;
            self.phase = wrap_phase(self.phase + dt);
        }
        NodeState::Active
    }

    fn reset(&mut self) {
        self.phase = 0.0;
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

    fn ramp_table() -> Wavetable {
        let up: Vec<f32> = (0..4).map(|i| i as f32 / 4.0).collect();
        let flat = vec![1.0; 4];
        Wavetable::new(vec![up, flat]).unwrap()
    }

    #[test]
    fn test_rejects_ragged_frames() {
        assert!(Wavetable::new(vec![vec![0.0; 4], vec![0.0; 3]]).is_none());
        assert!(Wavetable::new(Vec::new()).is_none());
        assert_eq!(
            Wavetable::from_interleaved(&[0.0; 10], 4).map(|t| t.frame_count()),
            Some(2)
        );
    }

    #[test]
    fn test_sample_interpolates_within_and_across_frames() {
        let table = ramp_table();
        assert!((table.sample(0.0, 0.125) - 0.125).abs() < 1e-6);
        assert!((table.sample(1.0, 0.3) - 1.0).abs() < 1e-6);
        assert!((table.sample(0.5, 0.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_warps_keep_phase_in_range() {
        for idx in 0..8 {
            let mode = WarpMode::from_index(idx);
            for k in 0..100 {
                let p = k as f32 / 100.0;
                let w = mode.apply(p, 0.7);
                assert!((0.0..=1.0).contains(&w), "{mode:?} {p} -> {w}");
            }
        }
    }

    #[test]
    fn test_zero_amount_is_identity() {
        assert_eq!(WarpMode::Fold.apply(0.37, 0.0), 0.37);
    }
}
