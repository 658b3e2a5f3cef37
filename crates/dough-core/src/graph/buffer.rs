//! Stereo block buffers.

/// One block of stereo audio.
#[derive(Debug, Clone, Default)]
pub struct StereoBlock {
    /// Left channel samples.
    pub left: Vec<f32>,
    /// Right channel samples.
    pub right: Vec<f32>,
}

impl StereoBlock {
    /// A zeroed block of `frames` samples per channel.
    pub fn new(frames: usize) -> Self {
        Self {
            left: vec![0.0; frames],
            right: vec![0.0; frames],
        }
    }

    /// Zero both channels.
    pub fn clear(&mut self) {
        self.left.fill(0.0);
        self.right.fill(0.0);
    }

    /// Frames per channel.
    pub fn len(&self) -> usize {
        self.left.len()
    }

    /// True for a zero-length block.
    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    /// Resize both channels, zeroing new frames.
    pub fn resize(&mut self, frames: usize) {
        self.left.resize(frames, 0.0);
        self.right.resize(frames, 0.0);
    }

    /// Copy another block of the same length.
    pub fn copy_from(&mut self, other: &StereoBlock) {
        self.left.copy_from_slice(&other.left);
        self.right.copy_from_slice(&other.right);
    }

    /// Add another block sample by sample.
    pub fn accumulate_from(&mut self, other: &StereoBlock) {
        for (dst, src) in self.left.iter_mut().zip(&other.left) {
            *dst += *src;
        }
        for (dst, src) in self.right.iter_mut().zip(&other.right) {
            *dst += *src;
        }
    }

    /// Mono downmix `(l + r) / 2` at `frame`.
    #[inline]
    pub fn mono_at(&self, frame: usize) -> f32 {
        0.5 * (self.left[frame] + self.right[frame])
    }

    /// Largest absolute sample across both channels.
    pub fn peak(&self) -> f32 {
        self.left
            .iter()
            .chain(&self.right)
            .fold(0.0f32, |acc, s| acc.max(s.abs()))
    }
}
