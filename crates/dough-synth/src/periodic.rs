//! Periodic modulation generator (LFO).
//!
//! The generator walks a normalized phase at `frequency / sample_rate` per
//! sample and shapes it with one of the [`PeriodicShape`]s. Every shape is
//! unipolar (0..1); the output stage then applies
//!
//! ```text
//! y = clamp(signed_pow((shape(phase, skew) + dc_offset) * depth, curve), min, max)
//! ```
//!
//! With the default `dc_offset` of -0.5 the output swings `±depth / 2`
//! around zero, which is what a parameter edge adds to its target.

use core::any::Any;
use core::f32::consts::TAU;

use dough_core::{
    AudioNode, NodeKind, NodeState, ParamSpec, ProcessContext, StereoBlock, poly_blep, signed_pow,
    wrap_phase,
};
use libm::sinf;

/// Waveform palette of the periodic generator.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PeriodicShape {
    /// Rise to 1 at `skew`, fall back to 0 at the end of the cycle.
    #[default]
    Triangle,
    /// Raised sine.
    Sine,
    /// Rising ramp.
    Ramp,
    /// Falling saw.
    Saw,
    /// Pulse that is high while `phase < skew`.
    Square,
    /// Rising ramp with a PolyBLEP-smoothed reset edge.
    SawAa,
    /// Piecewise-linear shape through `(phase, value)` points.
    Breakpoints(Vec<(f32, f32)>),
}

impl PeriodicShape {
    /// Parse a shape name (`tri`, `sine`, `ramp`, `saw`, `square`, `sawaa`, ...).
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name.to_ascii_lowercase().as_str() {
            "tri" | "triangle" => Self::Triangle,
            "sine" | "sin" => Self::Sine,
            "ramp" => Self::Ramp,
            "saw" | "sawtooth" => Self::Saw,
            "square" | "pulse" | "sqr" => Self::Square,
            "sawaa" | "saw_aa" => Self::SawAa,
            _ => return None,
        })
    }

    /// Shape by numeric index, in palette order. Out-of-range indices wrap.
    pub fn from_index(index: usize) -> Self {
        match index % 6 {
            0 => Self::Triangle,
            1 => Self::Sine,
            2 => Self::Ramp,
            3 => Self::Saw,
            4 => Self::Square,
            _ => Self::SawAa,
        }
    }

    /// Unipolar shape value at `phase` in `[0, 1)`.
    ///
    /// `dt` is the phase increment per sample (edge smoothing width).
    pub fn value(&self, phase: f32, skew: f32, dt: f32) -> f32 {
        match self {
            Self::Triangle => {
                let skew = skew.clamp(0.001, 0.999);
                if phase < skew {
                    phase / skew
                } else {
                    (1.0 - phase) / (1.0 - skew)
                }
            }
            Self::Sine => 0.5 + 0.5 * sinf(TAU * phase),
            Self::Ramp => phase,
            Self::Saw => 1.0 - phase,
            Self::Square => {
                if phase < skew {
                    1.0
                } else {
                    0.0
                }
            }
            Self::SawAa => phase - 0.5 * poly_blep(phase, dt),
            Self::Breakpoints(points) => breakpoint_value(points, phase),
        }
    }
}

fn breakpoint_value(points: &[(f32, f32)], phase: f32) -> f32 {
    match points {
        [] => 0.0,
        [(_, y)] => *y,
        _ => {
            let next = points.partition_point(|&(x, _)| x <= phase);
            let (x0, y0, x1, y1) = if next == 0 {
                let (lx, ly) = points[points.len() - 1];
                (lx - 1.0, ly, points[0].0, points[0].1)
            } else if next == points.len() {
                let (lx, ly) = points[next - 1];
                (lx, ly, points[0].0 + 1.0, points[0].1)
            } else {
                let (ax, ay) = points[next - 1];
                let (bx, by) = points[next];
                (ax, ay, bx, by)
            };
            if x1 - x0 <= f32::EPSILON {
                y1
            } else {
                y0 + (y1 - y0) * (phase - x0) / (x1 - x0)
            }
        }
    }
}

/// Per-sample periodic generator.
///
/// ```rust
/// use dough_synth::{PeriodicGenerator, PeriodicShape};
///
/// let mut lfo = PeriodicGenerator::new(1000.0);
/// lfo.set_shape(PeriodicShape::Ramp);
/// lfo.set_frequency(10.0);
/// lfo.set_dc_offset(0.0);
/// assert_eq!(lfo.next(), 0.0);
/// assert!((lfo.next() - 0.01).abs() < 1e-6);
/// ```
#[derive(Debug, Clone)]
pub struct PeriodicGenerator {
    shape: PeriodicShape,
    sample_rate: f32,
    frequency: f32,
    phase: f32,
    skew: f32,
    dc_offset: f32,
    depth: f32,
    curve: f32,
    min: f32,
    max: f32,
}

impl PeriodicGenerator {
    /// Triangle at 1 Hz, skew 0.5, dc offset -0.5, depth 1, linear curve, unclamped.
    pub fn new(sample_rate: f32) -> Self {
        Self {
            shape: PeriodicShape::Triangle,
            sample_rate,
            frequency: 1.0,
            phase: 0.0,
            skew: 0.5,
            dc_offset: -0.5,
            depth: 1.0,
            curve: 1.0,
            min: f32::MIN,
            max: f32::MAX,
        }
    }

    /// Select the waveform.
    pub fn set_shape(&mut self, shape: PeriodicShape) {
        self.shape = shape;
    }

    /// Waveform in use.
    pub fn shape(&self) -> &PeriodicShape {
        &self.shape
    }

    /// Frequency in Hz.
    pub fn set_frequency(&mut self, hz: f32) {
        self.frequency = hz.max(0.0);
    }

    /// Frequency in Hz.
    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    /// Jump to a normalized phase (wrapped into `[0, 1)`).
    pub fn set_phase(&mut self, phase: f32) {
        self.phase = wrap_phase(phase);
    }

    /// Current phase.
    pub fn phase(&self) -> f32 {
        self.phase
    }

    /// Skew (triangle apex / pulse width), `0..1`.
    pub fn set_skew(&mut self, skew: f32) {
        self.skew = skew.clamp(0.0, 1.0);
    }

    /// Offset added before scaling by depth.
    pub fn set_dc_offset(&mut self, dc: f32) {
        self.dc_offset = dc;
    }

    /// Output scale.
    pub fn set_depth(&mut self, depth: f32) {
        self.depth = depth;
    }

    /// Exponent applied (sign-preserving) after scaling.
    pub fn set_curve(&mut self, curve: f32) {
        self.curve = curve.max(0.01);
    }

    /// Output clamp range.
    pub fn set_range(&mut self, min: f32, max: f32) {
        self.min = min.min(max);
        self.max = max.max(min);
    }

    /// Next sample at the configured frequency and depth.
    #[inline]
    pub fn next(&mut self) -> f32 {
        self.next_with(self.frequency, self.depth)
    }

    /// Next sample with per-sample frequency and depth.
    #[inline]
    pub fn next_with(&mut self, frequency: f32, depth: f32) -> f32 {
        let dt = frequency.max(0.0) / self.sample_rate;
        let shaped = self.shape.value(self.phase, self.skew, dt);
        let y = signed_pow((shaped + self.dc_offset) * depth, self.curve).clamp(self.min, self.max);
        self.phase += dt;
        if self.phase >= 1.0 {
            self.phase = wrap_phase(self.phase);
        }
        y
    }
}

const LFO_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("frequency", 1.0, 0.0, 20000.0),
    ParamSpec::new("depth", 1.0, -1.0e9, 1.0e9),
];

/// Graph node running a [`PeriodicGenerator`].
///
/// Parameters: `frequency` (Hz) and `depth`. Silent outside its scheduled
/// span; the output is mono, duplicated to both channels.
#[derive(Debug, Clone)]
pub struct LfoNode {
    generator: PeriodicGenerator,
    initial_phase: f32,
}

impl LfoNode {
    /// Create an LFO node at the given sample rate.
    pub fn new(sample_rate: f32) -> Self {
        Self {
            generator: PeriodicGenerator::new(sample_rate),
            initial_phase: 0.0,
        }
    }

    /// Generator configuration (shape, skew, dc offset, curve, range).
    pub fn generator_mut(&mut self) -> &mut PeriodicGenerator {
        &mut self.generator
    }

    /// Start phase, also restored by `reset`.
    pub fn set_initial_phase(&mut self, phase: f32) {
        self.initial_phase = wrap_phase(phase);
        self.generator.set_phase(self.initial_phase);
    }
}

impl AudioNode for LfoNode {
    fn kind(&self) -> NodeKind {
        NodeKind::Lfo
    }

    fn params(&self) -> &'static [ParamSpec] {
        LFO_PARAMS
    }

    fn process(
        &mut self,
        ctx: &ProcessContext<'_>,
        _input: &StereoBlock,
        output: &mut StereoBlock,
    ) -> NodeState {
        let frequency = ctx.param(0);
        let depth = ctx.param(1);
        for i in ctx.span.clone() {
            let y = self.generator.next_with(frequency[i], depth[i]);
            output.left[i] = y;
            output.right[i] = y;
        }
        NodeState::Active
    }

    fn reset(&mut self) {
        self.generator = PeriodicGenerator::new(self.generator.sample_rate);
        self.generator.set_phase(self.initial_phase);
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

    #[test]
    fn test_triangle_apex_at_skew() {
        let shape = PeriodicShape::Triangle;
        assert!((shape.value(0.25, 0.25, 0.0) - 1.0).abs() < 1e-6);
        assert!(shape.value(0.0, 0.25, 0.0).abs() < 1e-6);
        assert!((shape.value(0.625, 0.25, 0.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_default_output_is_bipolar() {
        let mut lfo = PeriodicGenerator::new(1000.0);
        lfo.set_frequency(1.0);
        let samples: Vec<f32> = (0..1000).map(|_| lfo.next()).collect();
        let max = samples.iter().copied().fold(f32::MIN, f32::max);
        let min = samples.iter().copied().fold(f32::MAX, f32::min);
        assert!((max - 0.5).abs() < 0.01);
        assert!((min + 0.5).abs() < 0.01);
    }

    #[test]
    fn test_phase_wraps() {
        let mut lfo = PeriodicGenerator::new(100.0);
        lfo.set_frequency(30.0);
        for _ in 0..1000 {
            lfo.next();
            assert!((0.0..1.0).contains(&lfo.phase()));
        }
    }

    #[test]
    fn test_curve_and_clamp() {
        let mut lfo = PeriodicGenerator::new(1000.0);
        lfo.set_shape(PeriodicShape::Square);
        lfo.set_dc_offset(0.0);
        lfo.set_depth(3.0);
        lfo.set_curve(2.0);
        lfo.set_range(-1.0, 4.0);
        assert_eq!(lfo.next(), 4.0);
    }

    #[test]
    fn test_breakpoints_interpolate_and_wrap() {
        let shape = PeriodicShape::Breakpoints(vec![(0.0, 0.0), (0.5, 1.0)]);
        assert!((shape.value(0.25, 0.5, 0.0) - 0.5).abs() < 1e-6);
        assert!((shape.value(0.75, 0.5, 0.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_shape_names() {
        assert_eq!(PeriodicShape::from_name("SINE"), Some(PeriodicShape::Sine));
        assert_eq!(PeriodicShape::from_name("wobble"), None);
        assert_eq!(PeriodicShape::from_index(7), PeriodicShape::Sine);
    }
}
