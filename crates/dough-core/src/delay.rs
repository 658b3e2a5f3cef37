//! Circular-buffer delay line with fractional reads.
//!
//! Used by the orbit feedback delay, the phaser's modulated taps and the
//! compressor look-ahead. Delay times are per-sample values so a delay time
//! automated on an [`AudioParam`](crate::AudioParam) sweeps smoothly.

/// Interpolation method for fractional delay reads.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Interpolation {
    /// Truncate to the nearest earlier sample.
    None,
    /// Linear interpolation between two samples.
    #[default]
    Linear,
    /// 4-point cubic interpolation.
    Cubic,
}

/// Heap-allocated delay line that never reallocates after construction.
///
/// ```rust
/// use dough_core::InterpolatedDelay;
///
/// let mut delay = InterpolatedDelay::from_time(48000.0, 1.0);
/// delay.write(1.0);
/// for _ in 0..9 {
///     delay.write(0.0);
/// }
/// assert_eq!(delay.read(9.0), 1.0);
/// ```
#[derive(Debug, Clone)]
pub struct InterpolatedDelay {
    buffer: Vec<f32>,
    write_pos: usize,
    interpolation: Interpolation,
}

impl InterpolatedDelay {
    /// Create a delay line holding `max_delay_samples` samples (at least one).
    pub fn new(max_delay_samples: usize) -> Self {
        Self {
            buffer: vec![0.0; max_delay_samples.max(1)],
            write_pos: 0,
            interpolation: Interpolation::Linear,
        }
    }

    /// Create a delay line long enough for `max_seconds` at `sample_rate`.
    pub fn from_time(sample_rate: f32, max_seconds: f32) -> Self {
        Self::new((sample_rate * max_seconds.max(0.0)) as usize + 4)
    }

    /// Select the interpolation used by [`read`](Self::read).
    pub fn set_interpolation(&mut self, interp: Interpolation) {
        self.interpolation = interp;
    }

    /// Read the sample written `delay_samples` writes ago (0 = most recent).
    #[inline]
    pub fn read(&self, delay_samples: f32) -> f32 {
        let len = self.buffer.len();
        let delay = delay_samples.clamp(0.0, (len - 1) as f32);
        let whole = delay as usize;
        let frac = delay - whole as f32;
        let read_pos = (self.write_pos + len - whole - 1) % len;

        match self.interpolation {
            Interpolation::None => self.buffer[read_pos],
            Interpolation::Linear => {
                let older = self.buffer[(read_pos + len - 1) % len];
                let a = self.buffer[read_pos];
                a + (older - a) * frac
            }
            Interpolation::Cubic => {
                let y0 = self.buffer[(read_pos + 1) % len];
                let y1 = self.buffer[read_pos];
                let y2 = self.buffer[(read_pos + len - 1) % len];
                let y3 = self.buffer[(read_pos + len - 2) % len];
                let t = frac;
                let a0 = y3 - y2 - y0 + y1;
                let a1 = y0 - y1 - a0;
                let a2 = y2 - y0;
                ((a0 * t + a1) * t + a2) * t + y1
            }
        }
    }

    /// Write one sample and advance.
    #[inline]
    pub fn write(&mut self, sample: f32) {
        self.buffer[self.write_pos] = sample;
        self.write_pos = (self.write_pos + 1) % self.buffer.len();
    }

    /// Zero the buffer.
    pub fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }

    /// Capacity in samples.
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }
}
