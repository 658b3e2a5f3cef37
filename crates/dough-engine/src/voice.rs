//! Voices, chains and the voice arena.
//!
//! A [`Voice`] is what one compiled event leaves behind: the ordered
//! [`Chain`] of stage nodes plus a tracker of every node it owns filed by
//! [`Role`]. The tracker is what the modulation router resolves targets
//! against and what the reaper releases when the voice ends.
//!
//! Voices live in a [`VoiceArena`] and are addressed by generation-counted
//! [`VoiceId`]s, so a handle to a reclaimed voice is detectably stale.

use std::collections::BTreeMap;
use std::fmt;

use dough_core::{Graph, GraphError, NodeId};

/// Role a node plays in a voice.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    /// The source output and its sub-nodes (operators, envelope gain).
    Source,
    /// Level stage after the source.
    Gain,
    /// Low-pass filter (twice in the steep mode).
    Lpf,
    /// High-pass filter.
    Hpf,
    /// Band-pass filter.
    Bpf,
    /// Vowel formant filter.
    Vowel,
    /// Bit reduction.
    Crush,
    /// Sample-rate reduction.
    Coarse,
    /// Waveshaper.
    Shape,
    /// Distortion.
    Distort,
    /// Tremolo gain.
    Tremolo,
    /// Compressor.
    Compressor,
    /// Panner.
    Pan,
    /// Phaser.
    Phaser,
    /// Pitch shifter.
    PitchShift,
    /// Final gain.
    PostGain,
    /// Orbit delay send.
    DelaySend,
    /// Orbit reverb send.
    RoomSend,
    /// Named bus send.
    BusSend,
    /// LFOs, envelopes, depth gains and clamps driving parameters.
    Modulator,
}

impl Role {
    /// Lowercase name used in diagnostics.
    pub const fn name(self) -> &'static str {
        match self {
            Role::Source => "source",
            Role::Gain => "gain",
            Role::Lpf => "lpf",
            Role::Hpf => "hpf",
            Role::Bpf => "bpf",
            Role::Vowel => "vowel",
            Role::Crush => "crush",
            Role::Coarse => "coarse",
            Role::Shape => "shape",
            Role::Distort => "distort",
            Role::Tremolo => "tremolo",
            Role::Compressor => "compressor",
            Role::Pan => "pan",
            Role::Phaser => "phaser",
            Role::PitchShift => "pshift",
            Role::PostGain => "postgain",
            Role::DelaySend => "delaysend",
            Role::RoomSend => "roomsend",
            Role::BusSend => "bussend",
            Role::Modulator => "modulator",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordered stage nodes with a moving tail.
///
/// `push` wires every current tail into the new node and makes it the only
/// tail; `branch` adds a parallel tail so the next `push` sums the branches;
/// `tap` feeds a side node (a send) without moving the tail.
///
/// ```rust
/// use dough_core::Graph;
/// use dough_effects::GainNode;
/// use dough_engine::{Chain, Role};
///
/// let mut graph = Graph::new(48000.0, 128, 2);
/// let head = graph.add(GainNode::new());
/// let level = graph.add(GainNode::new());
/// let mut chain = Chain::new(Role::Source, head);
/// chain.push(&mut graph, Role::Gain, level).unwrap();
/// assert_eq!(chain.roles(), vec![Role::Source, Role::Gain]);
/// assert_eq!(chain.tails(), &[level]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Chain {
    links: Vec<(Role, NodeId)>,
    tails: Vec<NodeId>,
}

impl Chain {
    /// Chain starting at `head`.
    pub fn new(role: Role, head: NodeId) -> Self {
        Self {
            links: vec![(role, head)],
            tails: vec![head],
        }
    }

    /// Append a serial stage.
    pub fn push(&mut self, graph: &mut Graph, role: Role, node: NodeId) -> Result<(), GraphError> {
        for &tail in &self.tails {
            graph.connect(tail, node)?;
        }
        self.links.push((role, node));
        self.tails.clear();
        self.tails.push(node);
        Ok(())
    }

    /// Add a parallel branch that the next `push` sums with the current tail.
    pub fn branch(&mut self, role: Role, node: NodeId) {
        self.links.push((role, node));
        self.tails.push(node);
    }

    /// Feed a side node from the current tail.
    pub fn tap(&mut self, graph: &mut Graph, role: Role, node: NodeId) -> Result<(), GraphError> {
        for &tail in &self.tails {
            graph.connect(tail, node)?;
        }
        self.links.push((role, node));
        Ok(())
    }

    /// Current tail nodes.
    pub fn tails(&self) -> &[NodeId] {
        &self.tails
    }

    /// The single tail (the last one when branches are open).
    pub fn tail(&self) -> NodeId {
        self.tails[self.tails.len() - 1]
    }

    /// Every node with its role, in insertion order.
    pub fn links(&self) -> &[(Role, NodeId)] {
        &self.links
    }

    /// Roles in insertion order.
    pub fn roles(&self) -> Vec<Role> {
        self.links.iter().map(|&(role, _)| role).collect()
    }
}

/// Generation-counted voice handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoiceId {
    index: u32,
    generation: u32,
}

impl VoiceId {
    /// Build a handle from its parts.
    pub const fn from_raw(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Arena slot.
    pub fn index(self) -> u32 {
        self.index
    }

    /// Slot generation at allocation.
    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for VoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VoiceId({}v{})", self.index, self.generation)
    }
}

/// What `synthesize` hands back for a compiled voice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceHandle {
    /// Arena handle.
    pub id: VoiceId,
    /// Governor trigger id.
    pub trigger_id: u64,
    /// Trigger time.
    pub begin: f64,
    /// Gate close (trigger + duration).
    pub end: f64,
    /// Time the release tail lands and the voice is reclaimed.
    pub release_end: f64,
}

/// A compiled voice.
#[derive(Debug, Clone)]
pub struct Voice {
    pub(crate) chain: Chain,
    pub(crate) tracker: BTreeMap<Role, Vec<NodeId>>,
    pub(crate) output: NodeId,
    pub(crate) anchor: NodeId,
    pub(crate) begin: f64,
    pub(crate) end: f64,
    pub(crate) release_end: f64,
    pub(crate) trigger_id: u64,
    pub(crate) evicted: bool,
}

impl Voice {
    /// Start a voice from its source output.
    pub(crate) fn new(source_nodes: Vec<NodeId>, output: NodeId, begin: f64, end: f64, release_end: f64) -> Self {
        let mut tracker = BTreeMap::new();
        tracker.insert(Role::Source, source_nodes);
        Self {
            chain: Chain::new(Role::Source, output),
            tracker,
            output,
            anchor: output,
            begin,
            end,
            release_end,
            trigger_id: 0,
            evicted: false,
        }
    }

    /// Record a node under `role` without touching the chain.
    pub(crate) fn track(&mut self, role: Role, node: NodeId) {
        let nodes = self.tracker.entry(role).or_default();
        if !nodes.contains(&node) {
            nodes.push(node);
        }
    }

    /// Append a serial stage and track it.
    pub(crate) fn push(&mut self, graph: &mut Graph, role: Role, node: NodeId) -> Result<(), GraphError> {
        self.chain.push(graph, role, node)?;
        self.track(role, node);
        Ok(())
    }

    /// Feed a side node from the tail and track it.
    pub(crate) fn tap(&mut self, graph: &mut Graph, role: Role, node: NodeId) -> Result<(), GraphError> {
        self.chain.tap(graph, role, node)?;
        self.track(role, node);
        Ok(())
    }

    /// Chain roles in order.
    pub fn roles(&self) -> Vec<Role> {
        self.chain.roles()
    }

    /// The chain.
    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    /// Nodes filed under `role`.
    pub fn nodes(&self, role: Role) -> &[NodeId] {
        self.tracker.get(&role).map_or(&[], Vec::as_slice)
    }

    /// True if the tracker has `role`.
    pub fn has_role(&self, role: Role) -> bool {
        self.tracker.get(&role).is_some_and(|nodes| !nodes.is_empty())
    }

    /// Every owned node, each once.
    pub fn all_nodes(&self) -> Vec<NodeId> {
        let mut all: Vec<NodeId> = Vec::new();
        for nodes in self.tracker.values() {
            for &node in nodes {
                if !all.contains(&node) {
                    all.push(node);
                }
            }
        }
        all
    }

    /// Final gain node feeding the orbit.
    pub fn output(&self) -> NodeId {
        self.output
    }

    /// Source output; the voice is over once the graph has finished it.
    pub fn anchor(&self) -> NodeId {
        self.anchor
    }

    /// Trigger time.
    pub fn begin(&self) -> f64 {
        self.begin
    }

    /// Gate close.
    pub fn end(&self) -> f64 {
        self.end
    }

    /// Reclamation time.
    pub fn release_end(&self) -> f64 {
        self.release_end
    }

    /// Governor trigger id.
    pub fn trigger_id(&self) -> u64 {
        self.trigger_id
    }

    /// True once the governor has evicted this voice.
    pub fn is_evicted(&self) -> bool {
        self.evicted
    }
}

struct VoiceSlot {
    generation: u32,
    voice: Option<Voice>,
}

/// Slot arena of live voices.
#[derive(Default)]
pub struct VoiceArena {
    slots: Vec<VoiceSlot>,
    free_slots: Vec<u32>,
}

impl VoiceArena {
    /// Empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a voice.
    pub fn insert(&mut self, voice: Voice) -> VoiceId {
        if let Some(index) = self.free_slots.pop() {
            let slot = &mut self.slots[index as usize];
            slot.voice = Some(voice);
            VoiceId::from_raw(index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(VoiceSlot {
                generation: 0,
                voice: Some(voice),
            });
            VoiceId::from_raw(index, 0)
        }
    }

    /// Live voice behind `id`.
    pub fn get(&self, id: VoiceId) -> Option<&Voice> {
        self.slots
            .get(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.voice.as_ref())
    }

    /// Mutable access to the live voice behind `id`.
    pub fn get_mut(&mut self, id: VoiceId) -> Option<&mut Voice> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.voice.as_mut())
    }

    /// Take a voice out; its id goes stale.
    pub fn remove(&mut self, id: VoiceId) -> Option<Voice> {
        let slot = self
            .slots
            .get_mut(id.index as usize)
            .filter(|s| s.generation == id.generation)?;
        let voice = slot.voice.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_slots.push(id.index);
        Some(voice)
    }

    /// Ids of every live voice.
    pub fn ids(&self) -> Vec<VoiceId> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.voice.is_some())
            .map(|(i, s)| VoiceId::from_raw(i as u32, s.generation))
            .collect()
    }

    /// Live voice count.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.voice.is_some()).count()
    }

    /// True when no voice is live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every voice. Outstanding ids go stale.
    pub fn clear(&mut self) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.voice.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free_slots.push(index as u32);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dough_effects::GainNode;

    fn voice(graph: &mut Graph) -> Voice {
        let out = graph.add(GainNode::new());
        Voice::new(vec![out], out, 0.0, 1.0, 1.1)
    }

    #[test]
    fn test_branch_sums_into_next_push() {
        let mut g = Graph::new(48000.0, 64, 2);
        let a = g.add(GainNode::new());
        let b = g.add(GainNode::new());
        let sum = g.add(GainNode::new());
        let mut chain = Chain::new(Role::Source, a);
        chain.branch(Role::Source, b);
        assert_eq!(chain.tails().len(), 2);
        chain.push(&mut g, Role::Gain, sum).unwrap();
        assert_eq!(g.inputs(sum), &[a, b]);
        assert_eq!(chain.tails(), &[sum]);
    }

    #[test]
    fn test_tap_keeps_tail() {
        let mut g = Graph::new(48000.0, 64, 2);
        let mut v = voice(&mut g);
        let send = g.add(GainNode::new());
        v.tap(&mut g, Role::DelaySend, send).unwrap();
        assert_eq!(v.chain().tail(), v.output());
        assert_eq!(v.nodes(Role::DelaySend), &[send]);
        assert_eq!(v.roles(), vec![Role::Source, Role::DelaySend]);
    }

    #[test]
    fn test_all_nodes_deduplicates() {
        let mut g = Graph::new(48000.0, 64, 2);
        let mut v = voice(&mut g);
        let extra = g.add(GainNode::new());
        v.track(Role::Modulator, extra);
        v.track(Role::Modulator, extra);
        assert_eq!(v.all_nodes().len(), 2);
    }

    #[test]
    fn test_arena_ids_go_stale() {
        let mut g = Graph::new(48000.0, 64, 2);
        let mut arena = VoiceArena::new();
        let a = arena.insert(voice(&mut g));
        assert!(arena.get(a).is_some());
        assert!(arena.remove(a).is_some());
        assert!(arena.get(a).is_none());
        let b = arena.insert(voice(&mut g));
        assert_eq!(a.index(), b.index());
        assert_ne!(a, b);
        assert!(arena.remove(a).is_none());
        assert_eq!(arena.len(), 1);
    }
}
