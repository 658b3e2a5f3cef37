//! Polyphony governor.
//!
//! Remembers every admitted voice in admission order under a random trigger
//! id. When an admission pushes the count over the ceiling the oldest
//! entries are evicted, strictly first in first out. A voice that ends on
//! its own is forgotten by the reaper, so only sounding voices count against
//! the ceiling. An entry whose voice vanished some other way is still
//! evicted in turn; the caller finds the handle stale and has nothing to
//! fade.

use std::collections::VecDeque;

use crate::voice::VoiceId;

/// Default concurrent voice ceiling.
pub const DEFAULT_MAX_POLYPHONY: usize = 128;

/// One tracked admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    /// Random id assigned at admission.
    pub trigger_id: u64,
    /// The voice.
    pub voice: VoiceId,
}

/// FIFO voice ceiling.
///
/// ```rust
/// use dough_engine::{PolyphonyGovernor, VoiceId};
///
/// let mut governor = PolyphonyGovernor::new(2);
/// let ids: Vec<VoiceId> = (0..3).map(|i| VoiceId::from_raw(i, 0)).collect();
/// assert!(governor.admit(ids[0]).1.is_empty());
/// assert!(governor.admit(ids[1]).1.is_empty());
/// let (_, evicted) = governor.admit(ids[2]);
/// assert_eq!(evicted, vec![ids[0]]);
/// ```
#[derive(Debug, Clone)]
pub struct PolyphonyGovernor {
    ceiling: usize,
    entries: VecDeque<Admission>,
    seed: u64,
}

impl Default for PolyphonyGovernor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_POLYPHONY)
    }
}

impl PolyphonyGovernor {
    /// Governor with the given ceiling (at least one).
    pub fn new(ceiling: usize) -> Self {
        Self {
            ceiling: ceiling.max(1),
            entries: VecDeque::new(),
            seed: 0x9E37_79B9_7F4A_7C15,
        }
    }

    /// Current ceiling.
    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Change the ceiling; takes effect on the next admission.
    pub fn set_ceiling(&mut self, ceiling: usize) {
        self.ceiling = ceiling.max(1);
    }

    /// Tracked entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &Admission> {
        self.entries.iter()
    }

    /// Track `voice`. Returns its trigger id and the voices evicted to make room, oldest first.
    pub fn admit(&mut self, voice: VoiceId) -> (u64, Vec<VoiceId>) {
        let trigger_id = self.next_id();
        self.entries.push_back(Admission { trigger_id, voice });
        let mut evicted = Vec::new();
        while self.entries.len() > self.ceiling {
            if let Some(oldest) = self.entries.pop_front() {
                tracing::debug!(
                    target: "dough::governor",
                    trigger = oldest.trigger_id,
                    voice = %oldest.voice,
                    "evict"
                );
                evicted.push(oldest.voice);
            }
        }
        (trigger_id, evicted)
    }

    /// Drop the entry admitted under `trigger_id`. Returns false if it was
    /// not tracked (already evicted, or never admitted).
    pub fn forget(&mut self, trigger_id: u64) -> bool {
        let Some(index) = self.entries.iter().position(|a| a.trigger_id == trigger_id) else {
            return false;
        };
        self.entries.remove(index);
        tracing::trace!(target: "dough::governor", trigger = trigger_id, "forget");
        true
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn next_id(&mut self) -> u64 {
        // splitmix64
        self.seed = self.seed.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.seed;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voice(i: u32) -> VoiceId {
        VoiceId::from_raw(i, 0)
    }

    #[test]
    fn test_under_ceiling_evicts_nothing() {
        let mut g = PolyphonyGovernor::new(4);
        for i in 0..4 {
            assert!(g.admit(voice(i)).1.is_empty());
        }
        assert_eq!(g.len(), 4);
    }

    #[test]
    fn test_evicts_oldest_first() {
        let mut g = PolyphonyGovernor::new(2);
        g.admit(voice(0));
        g.admit(voice(1));
        assert_eq!(g.admit(voice(2)).1, vec![voice(0)]);
        assert_eq!(g.admit(voice(3)).1, vec![voice(1)]);
        let left: Vec<_> = g.entries().map(|a| a.voice).collect();
        assert_eq!(left, vec![voice(2), voice(3)]);
    }

    #[test]
    fn test_lowered_ceiling_evicts_several() {
        let mut g = PolyphonyGovernor::new(8);
        for i in 0..6 {
            g.admit(voice(i));
        }
        g.set_ceiling(2);
        let (_, evicted) = g.admit(voice(6));
        assert_eq!(evicted, (0..5).map(voice).collect::<Vec<_>>());
    }

    #[test]
    fn test_forgotten_entry_frees_its_slot() {
        let mut g = PolyphonyGovernor::new(2);
        let (pad, _) = g.admit(voice(0));
        let (hit, _) = g.admit(voice(1));
        assert!(g.forget(hit));
        assert!(!g.forget(hit));
        assert!(g.admit(voice(2)).1.is_empty());
        let (_, evicted) = g.admit(voice(3));
        assert_eq!(evicted, vec![voice(0)]);
        assert!(!g.forget(pad));
    }

    #[test]
    fn test_trigger_ids_are_distinct() {
        let mut g = PolyphonyGovernor::new(16);
        let ids: Vec<u64> = (0..16).map(|i| g.admit(voice(i)).0).collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), ids.len());
    }
}
