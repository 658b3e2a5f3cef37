//! The processing graph: node arena, connections and block rendering.
//!
//! [`Graph`] owns every node, the audio and parameter edges between them,
//! and the routes from nodes to hardware output channels. Mutation and
//! rendering happen on the same thread; [`render_block`](Graph::render_block)
//! walks the nodes in topological order, feeding each the sum of its audio
//! inputs and the per-sample values of its parameters (automation timeline
//! plus any parameter edges).

use std::collections::VecDeque;
use std::ops::Range;

use thiserror::Error;

use crate::param::AudioParam;

use super::buffer::StereoBlock;
use super::node::{AudioNode, NodeId, NodeKind, NodeState, ProcessContext};

/// Default frames per rendered block.
pub const DEFAULT_BLOCK_SIZE: usize = 128;

/// Errors from graph mutation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    /// The id is stale or was never issued by this graph.
    #[error("node {0} not found")]
    NodeNotFound(NodeId),
    /// The node has no parameter with this name.
    #[error("node {node} ({kind}) has no parameter named '{name}'")]
    UnknownParam {
        /// Node that was asked.
        node: NodeId,
        /// Its kind.
        kind: NodeKind,
        /// The missing name.
        name: String,
    },
    /// A node cannot feed itself.
    #[error("cannot connect {0} to itself")]
    SelfConnection(NodeId),
    /// The edge would close a loop.
    #[error("connecting {from} to {to} would create a cycle")]
    CycleDetected {
        /// Edge source.
        from: NodeId,
        /// Edge destination.
        to: NodeId,
    },
    /// The hardware channel does not exist.
    #[error("output channel {channel} out of range (graph has {available})")]
    ChannelOutOfRange {
        /// Requested channel (0-based).
        channel: usize,
        /// Channels the graph renders.
        available: usize,
    },
}

/// Where a node's output lands on the hardware bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputRoute {
    /// Channel receiving the left signal (or the mono downmix).
    pub left: usize,
    /// Channel receiving the right signal; `None` routes a mono downmix to `left`.
    pub right: Option<usize>,
}

struct Entry {
    node: Box<dyn AudioNode>,
    kind: NodeKind,
    params: Vec<AudioParam>,
    audio_in: Vec<NodeId>,
    audio_out: Vec<NodeId>,
    param_in: Vec<(NodeId, usize)>,
    param_out: Vec<(NodeId, usize)>,
    routes: Vec<OutputRoute>,
    start: Option<f64>,
    end: Option<f64>,
    state: NodeState,
}

enum Schedule {
    Skip(NodeState),
    Run(Range<usize>),
}

impl Entry {
    fn initial_state(kind: NodeKind) -> NodeState {
        if kind.is_source() {
            NodeState::Pending
        } else {
            NodeState::Active
        }
    }

    fn schedule(
        &self,
        block_start: f64,
        block_end: f64,
        sample_rate: f32,
        frames: usize,
        grace: f64,
    ) -> Schedule {
        let frame_of = |t: f64| {
            // 1e-9 absorbs float error on times that land exactly on a frame
            let offset = ((t - block_start) * f64::from(sample_rate) - 1e-9)
                .ceil()
                .max(0.0);
            (offset as usize).min(frames)
        };

        if self.kind.is_source() {
            let Some(start) = self.start else {
                return Schedule::Skip(NodeState::Pending);
            };
            if start >= block_end {
                return Schedule::Skip(NodeState::Pending);
            }
            if let Some(end) = self.end
                && end <= block_start
            {
                return Schedule::Skip(NodeState::Done);
            }
            let first = frame_of(start);
            let last = self.end.map_or(frames, frame_of).max(first);
            return Schedule::Run(first..last);
        }

        if self.kind.is_worklet() {
            if let Some(end) = self.end
                && block_start > end + grace
            {
                return Schedule::Skip(NodeState::Done);
            }
            if let Some(start) = self.start {
                if start >= block_end {
                    return Schedule::Skip(NodeState::Pending);
                }
                return Schedule::Run(frame_of(start)..frames);
            }
        }

        Schedule::Run(0..frames)
    }
}

struct Slot {
    generation: u32,
    entry: Option<Entry>,
}

/// Block-based audio graph with sample-accurate parameter automation.
///
/// ```rust
/// use dough_core::graph::{Graph, StereoBlock};
/// use dough_core::graph::{AudioNode, NodeKind, NodeState, ParamSpec, ProcessContext};
/// use std::any::Any;
///
/// struct Dc;
/// impl AudioNode for Dc {
///     fn kind(&self) -> NodeKind { NodeKind::Constant }
///     fn params(&self) -> &'static [ParamSpec] {
///         const P: &[ParamSpec] = &[ParamSpec::new("offset", 1.0, -1.0, 1.0)];
///         P
///     }
///     fn process(&mut self, ctx: &ProcessContext<'_>, _: &StereoBlock, out: &mut StereoBlock) -> NodeState {
///         for i in ctx.span.clone() {
///             out.left[i] = ctx.param_at(0, i);
///             out.right[i] = out.left[i];
///         }
///         NodeState::Active
///     }
///     fn reset(&mut self) {}
///     fn as_any(&self) -> &dyn Any { self }
///     fn as_any_mut(&mut self) -> &mut dyn Any { self }
/// }
///
/// let mut graph = Graph::new(48000.0, 128, 2);
/// let dc = graph.add(Dc);
/// graph.connect_output(dc, &[0, 1]).unwrap();
/// graph.start(dc, 0.0).unwrap();
/// graph.render_block();
/// assert_eq!(graph.output()[0][0], 1.0);
/// ```
pub struct Graph {
    slots: Vec<Slot>,
    free_slots: Vec<u32>,
    blocks: Vec<StereoBlock>,
    order: Vec<NodeId>,
    order_dirty: bool,
    sample_rate: f32,
    block_size: usize,
    frames_rendered: u64,
    worklet_grace: f64,
    scratch_in: StereoBlock,
    param_scratch: Vec<f32>,
    hardware: Vec<Vec<f32>>,
    finished: Vec<NodeId>,
}

impl Graph {
    /// Create an empty graph rendering `block_size` frames to `output_channels` channels.
    pub fn new(sample_rate: f32, block_size: usize, output_channels: usize) -> Self {
        let block_size = block_size.max(1);
        Self {
            slots: Vec::new(),
            free_slots: Vec::new(),
            blocks: Vec::new(),
            order: Vec::new(),
            order_dirty: false,
            sample_rate,
            block_size,
            frames_rendered: 0,
            worklet_grace: 0.5,
            scratch_in: StereoBlock::new(block_size),
            param_scratch: Vec::new(),
            hardware: vec![vec![0.0; block_size]; output_channels.max(1)],
            finished: Vec::new(),
        }
    }

    /// Sample rate in Hz.
    #[inline]
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Frames per block.
    #[inline]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Hardware output channel count.
    #[inline]
    pub fn output_channels(&self) -> usize {
        self.hardware.len()
    }

    /// Clock time in seconds: frames rendered so far over the sample rate.
    #[inline]
    pub fn current_time(&self) -> f64 {
        self.frames_rendered as f64 / f64::from(self.sample_rate)
    }

    /// Frames rendered so far.
    #[inline]
    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// How long worklet-backed nodes outlive their declared end time.
    pub fn set_worklet_grace(&mut self, seconds: f64) {
        self.worklet_grace = seconds.max(0.0);
    }

    /// Current worklet grace period in seconds.
    pub fn worklet_grace(&self) -> f64 {
        self.worklet_grace
    }

    // --- Node lifecycle ---

    /// Add a node and return its id.
    pub fn add<N: AudioNode + 'static>(&mut self, node: N) -> NodeId {
        self.add_boxed(Box::new(node))
    }

    /// Add an already boxed node.
    pub fn add_boxed(&mut self, node: Box<dyn AudioNode>) -> NodeId {
        let kind = node.kind();
        let params = node
            .params()
            .iter()
            .map(|spec| AudioParam::with_range(spec.default, spec.min, spec.max))
            .collect();
        let entry = Entry {
            node,
            kind,
            params,
            audio_in: Vec::new(),
            audio_out: Vec::new(),
            param_in: Vec::new(),
            param_out: Vec::new(),
            routes: Vec::new(),
            start: None,
            end: None,
            state: Entry::initial_state(kind),
        };

        let id = if let Some(index) = self.free_slots.pop() {
            let slot = &mut self.slots[index as usize];
            slot.entry = Some(entry);
            NodeId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                entry: Some(entry),
            });
            self.blocks.push(StereoBlock::new(self.block_size));
            NodeId {
                index,
                generation: 0,
            }
        };
        self.order_dirty = true;
        tracing::debug!(target: "dough::graph", node = %id, kind = %kind, "graph_add");
        id
    }

    /// Disconnect and destroy a node. Its id (and every copy of it) goes stale.
    pub fn remove(&mut self, id: NodeId) -> Result<(), GraphError> {
        self.isolate(id)?;
        let idx = id.index as usize;
        let slot = &mut self.slots[idx];
        slot.entry = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.blocks[idx].clear();
        self.free_slots.push(id.index);
        self.order_dirty = true;
        tracing::debug!(target: "dough::graph", node = %id, "graph_remove");
        Ok(())
    }

    /// True while `id` names a live node.
    pub fn contains(&self, id: NodeId) -> bool {
        self.entry(id).is_some()
    }

    /// Number of live nodes.
    pub fn node_count(&self) -> usize {
        self.slots.iter().filter(|s| s.entry.is_some()).count()
    }

    /// Ids of every live node in arena order.
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.entry.is_some())
            .map(|(i, s)| NodeId {
                index: i as u32,
                generation: s.generation,
            })
            .collect()
    }

    /// Kind of a live node.
    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.entry(id).map(|e| e.kind)
    }

    /// Lifecycle state as of the last rendered block.
    pub fn state(&self, id: NodeId) -> Option<NodeState> {
        self.entry(id).map(|e| e.state)
    }

    /// Schedule a source (or envelope/LFO worklet) to start at `time`.
    pub fn start(&mut self, id: NodeId, time: f64) -> Result<(), GraphError> {
        self.entry_mut(id)?.start = Some(time);
        Ok(())
    }

    /// Schedule a source to stop at `time`, or declare a worklet's end time.
    ///
    /// An earlier stop replaces a later one; a later one never extends an
    /// earlier stop.
    pub fn stop(&mut self, id: NodeId, time: f64) -> Result<(), GraphError> {
        let entry = self.entry_mut(id)?;
        entry.end = Some(entry.end.map_or(time, |end| end.min(time)));
        Ok(())
    }

    /// Replace a worklet's declared end time outright.
    pub fn set_end_time(&mut self, id: NodeId, time: f64) -> Result<(), GraphError> {
        self.entry_mut(id)?.end = Some(time);
        Ok(())
    }

    /// Scheduled start time, if any.
    pub fn start_time(&self, id: NodeId) -> Option<f64> {
        self.entry(id).and_then(|e| e.start)
    }

    /// Scheduled stop / declared end time, if any.
    pub fn end_time(&self, id: NodeId) -> Option<f64> {
        self.entry(id).and_then(|e| e.end)
    }

    /// Reset a node for reuse: internal state, automation, schedule.
    pub fn reset_node(&mut self, id: NodeId) -> Result<(), GraphError> {
        let entry = self.entry_mut(id)?;
        entry.node.reset();
        for param in &mut entry.params {
            param.reset();
        }
        entry.start = None;
        entry.end = None;
        entry.state = Entry::initial_state(entry.kind);
        Ok(())
    }

    /// Typed shared access to a node.
    pub fn node_ref<T: 'static>(&self, id: NodeId) -> Option<&T> {
        self.entry(id)?.node.as_any().downcast_ref::<T>()
    }

    /// Typed mutable access to a node.
    pub fn node_mut<T: 'static>(&mut self, id: NodeId) -> Option<&mut T> {
        let idx = id.index as usize;
        let slot = self.slots.get_mut(idx)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.entry.as_mut()?.node.as_any_mut().downcast_mut::<T>()
    }

    // --- Parameters ---

    /// Position of `name` in the node's parameter list.
    pub fn param_index(&self, id: NodeId, name: &str) -> Result<usize, GraphError> {
        let entry = self.entry(id).ok_or(GraphError::NodeNotFound(id))?;
        entry
            .node
            .params()
            .iter()
            .position(|spec| spec.name == name)
            .ok_or_else(|| GraphError::UnknownParam {
                node: id,
                kind: entry.kind,
                name: name.to_string(),
            })
    }

    /// True if the node exposes a parameter called `name`.
    pub fn has_param(&self, id: NodeId, name: &str) -> bool {
        self.param_index(id, name).is_ok()
    }

    /// Shared access to a named parameter.
    pub fn param(&self, id: NodeId, name: &str) -> Result<&AudioParam, GraphError> {
        let index = self.param_index(id, name)?;
        let entry = self.entry(id).ok_or(GraphError::NodeNotFound(id))?;
        Ok(&entry.params[index])
    }

    /// Mutable access to a named parameter.
    pub fn param_mut(&mut self, id: NodeId, name: &str) -> Result<&mut AudioParam, GraphError> {
        let index = self.param_index(id, name)?;
        Ok(&mut self.entry_mut(id)?.params[index])
    }

    /// Every parameter of a node, in declaration order.
    pub fn params_mut(&mut self, id: NodeId) -> Result<&mut [AudioParam], GraphError> {
        Ok(self.entry_mut(id)?.params.as_mut_slice())
    }

    // --- Connections ---

    /// Feed `from`'s output into `to`'s audio input. Connecting twice is a no-op.
    pub fn connect(&mut self, from: NodeId, to: NodeId) -> Result<(), GraphError> {
        self.check_edge(from, to)?;
        if self.entry_mut(from)?.audio_out.contains(&to) {
            return Ok(());
        }
        self.entry_mut(from)?.audio_out.push(to);
        self.entry_mut(to)?.audio_in.push(from);
        self.order_dirty = true;
        tracing::debug!(target: "dough::graph", %from, %to, "graph_connect");
        Ok(())
    }

    /// Add `from`'s mono downmix to the value of `to`'s parameter `param`.
    pub fn connect_param(&mut self, from: NodeId, to: NodeId, param: &str) -> Result<(), GraphError> {
        let index = self.param_index(to, param)?;
        self.check_edge(from, to)?;
        if self.entry_mut(from)?.param_out.contains(&(to, index)) {
            return Ok(());
        }
        self.entry_mut(from)?.param_out.push((to, index));
        self.entry_mut(to)?.param_in.push((from, index));
        self.order_dirty = true;
        tracing::debug!(target: "dough::graph", %from, %to, param, "graph_connect_param");
        Ok(())
    }

    /// Route `from` to hardware channels (0-based).
    ///
    /// Two or more channels take the stereo pair on the first two; a single
    /// channel takes the mono downmix; an empty list means `[0, 1]`.
    pub fn connect_output(&mut self, from: NodeId, channels: &[usize]) -> Result<(), GraphError> {
        let available = self.hardware.len();
        let route = match channels {
            [] => OutputRoute {
                left: 0,
                right: (available > 1).then_some(1),
            },
            [mono] => OutputRoute {
                left: *mono,
                right: None,
            },
            [left, right, ..] => OutputRoute {
                left: *left,
                right: Some(*right),
            },
        };
        for channel in core::iter::once(route.left).chain(route.right) {
            if channel >= available {
                return Err(GraphError::ChannelOutOfRange { channel, available });
            }
        }
        let entry = self.entry_mut(from)?;
        if !entry.routes.contains(&route) {
            entry.routes.push(route);
        }
        Ok(())
    }

    /// Remove every outgoing edge and hardware route of `from`.
    pub fn disconnect(&mut self, from: NodeId) -> Result<(), GraphError> {
        let entry = self.entry_mut(from)?;
        let audio_out = std::mem::take(&mut entry.audio_out);
        let param_out = std::mem::take(&mut entry.param_out);
        entry.routes.clear();
        for to in audio_out {
            if let Ok(dst) = self.entry_mut(to) {
                dst.audio_in.retain(|&src| src != from);
            }
        }
        for (to, _) in param_out {
            if let Ok(dst) = self.entry_mut(to) {
                dst.param_in.retain(|&(src, _)| src != from);
            }
        }
        self.order_dirty = true;
        Ok(())
    }

    /// Remove every edge into and out of `id`.
    pub fn isolate(&mut self, id: NodeId) -> Result<(), GraphError> {
        self.disconnect(id)?;
        let entry = self.entry_mut(id)?;
        let audio_in = std::mem::take(&mut entry.audio_in);
        let param_in = std::mem::take(&mut entry.param_in);
        for from in audio_in {
            if let Ok(src) = self.entry_mut(from) {
                src.audio_out.retain(|&to| to != id);
            }
        }
        for (from, _) in param_in {
            if let Ok(src) = self.entry_mut(from) {
                src.param_out.retain(|&(to, _)| to != id);
            }
        }
        Ok(())
    }

    /// Audio inputs of `id`.
    pub fn inputs(&self, id: NodeId) -> &[NodeId] {
        self.entry(id).map_or(&[], |e| e.audio_in.as_slice())
    }

    /// Audio outputs of `id`.
    pub fn outputs(&self, id: NodeId) -> &[NodeId] {
        self.entry(id).map_or(&[], |e| e.audio_out.as_slice())
    }

    /// Parameter edges leaving `id` as `(destination, param index)`.
    pub fn param_outputs(&self, id: NodeId) -> &[(NodeId, usize)] {
        self.entry(id).map_or(&[], |e| e.param_out.as_slice())
    }

    /// Hardware routes of `id`.
    pub fn routes(&self, id: NodeId) -> &[OutputRoute] {
        self.entry(id).map_or(&[], |e| e.routes.as_slice())
    }

    // --- Rendering ---

    /// Render one block and advance the clock.
    ///
    /// Nodes that finish during the block are destroyed afterwards.
    pub fn render_block(&mut self) {
        if self.order_dirty {
            self.rebuild_order();
        }
        for channel in &mut self.hardware {
            channel.fill(0.0);
        }
        self.finished.clear();

        let block_start = self.current_time();
        let block_end = block_start + self.block_size as f64 / f64::from(self.sample_rate);
        let order = std::mem::take(&mut self.order);
        for &id in &order {
            self.render_node(id, block_start, block_end);
        }
        self.order = order;
        self.frames_rendered += self.block_size as u64;

        let finished = std::mem::take(&mut self.finished);
        for &id in &finished {
            if self.remove(id).is_ok() {
                tracing::debug!(target: "dough::graph", node = %id, "node finished");
            }
        }
        self.finished = finished;
    }

    /// Hardware output of the last rendered block, one `Vec` per channel.
    pub fn output(&self) -> &[Vec<f32>] {
        &self.hardware
    }

    /// Output block a node produced in the last render.
    pub fn node_output(&self, id: NodeId) -> Option<&StereoBlock> {
        self.entry(id)?;
        self.blocks.get(id.index as usize)
    }

    fn render_node(&mut self, id: NodeId, block_start: f64, block_end: f64) {
        let frames = self.block_size;
        let sample_rate = self.sample_rate;
        let grace = self.worklet_grace;
        let idx = id.index as usize;
        let Self {
            slots,
            blocks,
            scratch_in,
            param_scratch,
            hardware,
            finished,
            ..
        } = self;
        let Some(entry) = slots
            .get_mut(idx)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.entry.as_mut())
        else {
            return;
        };

        let span = match entry.schedule(block_start, block_end, sample_rate, frames, grace) {
            Schedule::Skip(state) => {
                blocks[idx].clear();
                entry.state = state;
                if state == NodeState::Done {
                    finished.push(id);
                }
                return;
            }
            Schedule::Run(span) => span,
        };

        scratch_in.clear();
        for src in &entry.audio_in {
            scratch_in.accumulate_from(&blocks[src.index as usize]);
        }

        let lanes = entry.params.len() * frames;
        param_scratch.clear();
        param_scratch.resize(lanes, 0.0);
        let dt = 1.0 / f64::from(sample_rate);
        for (i, param) in entry.params.iter_mut().enumerate() {
            param.prune(block_start);
            param.fill(block_start, dt, &mut param_scratch[i * frames..(i + 1) * frames]);
        }
        if !entry.param_in.is_empty() {
            for &(src, i) in &entry.param_in {
                let src_block = &blocks[src.index as usize];
                let lane = &mut param_scratch[i * frames..(i + 1) * frames];
                for (k, value) in lane.iter_mut().enumerate() {
                    *value += src_block.mono_at(k);
                }
            }
            for (i, param) in entry.params.iter().enumerate() {
                let (lo, hi) = param.range();
                for value in &mut param_scratch[i * frames..(i + 1) * frames] {
                    *value = value.clamp(lo, hi);
                }
            }
        }

        let ctx = ProcessContext::new(sample_rate, block_start, frames, span, &param_scratch[..]);
        let out = &mut blocks[idx];
        out.clear();
        let state = entry.node.process(&ctx, scratch_in, out);
        entry.state = state;
        if state == NodeState::Done {
            finished.push(id);
        }

        for route in &entry.routes {
            match route.right {
                Some(right) => {
                    for (dst, src) in hardware[route.left].iter_mut().zip(&out.left) {
                        *dst += *src;
                    }
                    for (dst, src) in hardware[right].iter_mut().zip(&out.right) {
                        *dst += *src;
                    }
                }
                None => {
                    for (k, dst) in hardware[route.left].iter_mut().enumerate() {
                        *dst += out.mono_at(k);
                    }
                }
            }
        }
    }

    fn rebuild_order(&mut self) {
        let mut indegree = vec![0usize; self.slots.len()];
        for slot in &self.slots {
            if let Some(entry) = &slot.entry {
                for to in &entry.audio_out {
                    indegree[to.index as usize] += 1;
                }
                for (to, _) in &entry.param_out {
                    indegree[to.index as usize] += 1;
                }
            }
        }

        let mut queue: VecDeque<NodeId> = self
            .node_ids()
            .into_iter()
            .filter(|id| indegree[id.index as usize] == 0)
            .collect();
        self.order.clear();
        while let Some(id) = queue.pop_front() {
            self.order.push(id);
            let Some(entry) = self.entry(id) else {
                continue;
            };
            let targets = entry
                .audio_out
                .iter()
                .copied()
                .chain(entry.param_out.iter().map(|(to, _)| *to));
            for to in targets {
                let d = &mut indegree[to.index as usize];
                *d -= 1;
                if *d == 0 {
                    queue.push_back(to);
                }
            }
        }
        self.order_dirty = false;
    }

    fn check_edge(&self, from: NodeId, to: NodeId) -> Result<(), GraphError> {
        if self.entry(from).is_none() {
            return Err(GraphError::NodeNotFound(from));
        }
        if self.entry(to).is_none() {
            return Err(GraphError::NodeNotFound(to));
        }
        if from == to {
            return Err(GraphError::SelfConnection(from));
        }
        if self.reaches(to, from) {
            return Err(GraphError::CycleDetected { from, to });
        }
        Ok(())
    }

    /// Depth-first search along audio and parameter edges.
    fn reaches(&self, from: NodeId, target: NodeId) -> bool {
        let mut stack = vec![from];
        let mut seen = vec![false; self.slots.len()];
        while let Some(id) = stack.pop() {
            if id == target {
                return true;
            }
            let idx = id.index as usize;
            if seen[idx] {
                continue;
            }
            seen[idx] = true;
            if let Some(entry) = self.entry(id) {
                stack.extend(entry.audio_out.iter().copied());
                stack.extend(entry.param_out.iter().map(|(to, _)| *to));
            }
        }
        false
    }

    fn entry(&self, id: NodeId) -> Option<&Entry> {
        self.slots
            .get(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.entry.as_ref())
    }

    fn entry_mut(&mut self, id: NodeId) -> Result<&mut Entry, GraphError> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.entry.as_mut())
            .ok_or(GraphError::NodeNotFound(id))
    }
}
