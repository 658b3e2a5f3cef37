//! Noise sources.
//!
//! White noise from an xorshift32 generator, pink via Paul Kellett's
//! economy filter, brown via a leaky integrator.

use core::any::Any;

use dough_core::{AudioNode, NodeKind, NodeState, ParamSpec, ProcessContext, StereoBlock};

/// Spectral colour of a [`NoiseNode`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NoiseColor {
    /// Flat spectrum.
    #[default]
    White,
    /// -3 dB/octave.
    Pink,
    /// -6 dB/octave.
    Brown,
}

impl NoiseColor {
    /// Parse `white`, `pink` or `brown`.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "white" => Self::White,
            "pink" => Self::Pink,
            "brown" => Self::Brown,
            _ => return None,
        })
    }
}

/// Noise generator kernel.
#[derive(Debug, Clone)]
pub struct Noise {
    color: NoiseColor,
    state: u32,
    seed: u32,
    pink: [f32; 3],
    brown: f32,
}

impl Noise {
    /// Noise generator with a fixed seed.
    pub fn new(color: NoiseColor, seed: u32) -> Self {
        let seed = seed.max(1);
        Self {
            color,
            state: seed,
            seed,
            pink: [0.0; 3],
            brown: 0.0,
        }
    }

    /// Colour in use.
    pub fn color(&self) -> NoiseColor {
        self.color
    }

    /// Restart the sequence from the seed.
    pub fn reset(&mut self) {
        self.state = self.seed;
        self.pink = [0.0; 3];
        self.brown = 0.0;
    }

    /// Uniform white sample in `[-1, 1]`.
    #[inline]
    pub fn white(&mut self) -> f32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        (x as i32 as f32) / (i32::MAX as f32)
    }

    /// Next sample in the configured colour.
    #[inline]
    pub fn advance(&mut self) -> f32 {
        let white = self.white();
        match self.color {
            NoiseColor::White => white,
            NoiseColor::Pink => {
                let b = &mut self.pink;
                b[0] = 0.99765 * b[0] + white * 0.099046;
                b[1] = 0.96300 * b[1] + white * 0.2965164;
                b[2] = 0.57000 * b[2] + white * 1.0526913;
                (b[0] + b[1] + b[2] + white * 0.1848) * 0.11
            }
            NoiseColor::Brown => {
                self.brown = (self.brown + 0.02 * white) / 1.02;
                self.brown * 3.5
            }
        }
    }
}

/// Scheduled noise source (mono, duplicated to both channels).
#[derive(Debug, Clone)]
pub struct NoiseNode {
    noise: Noise,
}

impl NoiseNode {
    /// Create a noise source.
    pub fn new(color: NoiseColor, seed: u32) -> Self {
        Self {
            noise: Noise::new(color, seed),
        }
    }
}

impl AudioNode for NoiseNode {
    fn kind(&self) -> NodeKind {
        NodeKind::Noise
    }

    fn params(&self) -> &'static [ParamSpec] {
        &[]
    }

    fn process(
        &mut self,
        ctx: &ProcessContext<'_>,
        _input: &StereoBlock,
        output: &mut StereoBlock,
    ) -> NodeState {
        for i in ctx.span.clone() {
            let y = self.noise.advance();
            output.left[i] = y;
            output.right[i] = y;
        }
        NodeState::Active
    }

    fn reset(&mut self) {
        self.noise.reset();
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

    fn stats(color: NoiseColor) -> (f32, f32) {
        let mut n = Noise::new(color, 7);
        let samples: Vec<f32> = (0..48000).map(|_| n.advance()).collect();
        let mean = samples.iter().sum::<f32>() / samples.len() as f32;
        let peak = samples.iter().fold(0.0f32, |a, s| a.max(s.abs()));
        (mean, peak)
    }

    #[test]
    fn test_white_is_centred_and_bounded() {
        let (mean, peak) = stats(NoiseColor::White);
        assert!(mean.abs() < 0.02);
        assert!(peak <= 1.0);
    }

    #[test]
    fn test_coloured_noise_bounded() {
        for color in [NoiseColor::Pink, NoiseColor::Brown] {
            let (_, peak) = stats(color);
            assert!(peak < 1.5, "{color:?} peak {peak}");
            assert!(peak > 0.01);
        }
    }

    #[test]
    fn test_reset_repeats_sequence() {
        let mut n = Noise::new(NoiseColor::White, 99);
        let a: Vec<f32> = (0..16).map(|_| n.advance()).collect();
        n.reset();
        let b: Vec<f32> = (0..16).map(|_| n.advance()).collect();
        assert_eq!(a, b);
    }
}
