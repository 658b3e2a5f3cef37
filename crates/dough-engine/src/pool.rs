//! Resource pool.
//!
//! Keyed free lists of released processing nodes. A released node is
//! isolated, its automation from `now` on is cancelled, and it waits on the
//! list for its [`NodeKind`] until a later checkout resets and reuses it.
//!
//! Ids on the free lists are plain generation-counted handles, so a node the
//! graph destroyed in the meantime (a worklet that outlived its grace period)
//! simply shows up as stale and is skipped.
//!
//! Self-terminating sources are never pooled: `release` destroys them.

use std::collections::HashMap;

use dough_core::{AudioNode, Graph, GraphError, NodeId, NodeKind, NodeState};

use crate::error::PoolError;

/// Pool counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Checkouts served from a free list.
    pub hits: u64,
    /// Checkouts that built a fresh node.
    pub misses: u64,
    /// Nodes put back on a free list.
    pub releases: u64,
    /// Nodes destroyed on release.
    pub destroyed: u64,
}

/// Keyed free lists of reusable nodes.
#[derive(Debug, Default)]
pub struct ResourcePool {
    enabled: bool,
    free: HashMap<NodeKind, Vec<NodeId>>,
    stats: PoolStats,
}

impl ResourcePool {
    /// Create a pool. A disabled pool destroys everything it is handed.
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            free: HashMap::new(),
            stats: PoolStats::default(),
        }
    }

    /// True when released nodes are recycled.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Counters since creation.
    pub fn stats(&self) -> PoolStats {
        self.stats
    }

    /// Nodes currently waiting under `kind` (stale ids included).
    pub fn free_count(&self, kind: NodeKind) -> usize {
        self.free.get(&kind).map_or(0, Vec::len)
    }

    /// True if `id` is waiting on a free list.
    pub fn is_free(&self, id: NodeId) -> bool {
        self.free.values().any(|list| list.contains(&id))
    }

    /// Forget every free list.
    pub fn clear(&mut self) {
        self.free.clear();
    }

    /// A released node of type `N` filed under `kind`, reset for reuse, or a
    /// fresh one from `make`.
    pub fn checkout<N, F>(
        &mut self,
        graph: &mut Graph,
        kind: NodeKind,
        make: F,
    ) -> Result<NodeId, GraphError>
    where
        N: AudioNode + 'static,
        F: FnOnce() -> N,
    {
        if self.enabled
            && let Some(list) = self.free.get_mut(&kind)
        {
            let now = graph.current_time();
            let grace = graph.worklet_grace();
            while let Some(id) = list.pop() {
                if !is_reusable(graph, id, now, grace) || graph.node_ref::<N>(id).is_none() {
                    tracing::trace!(target: "dough::pool", node = %id, %kind, "skip stale");
                    continue;
                }
                graph.reset_node(id)?;
                self.stats.hits += 1;
                tracing::debug!(target: "dough::pool", node = %id, %kind, "pool hit");
                return Ok(id);
            }
        }
        self.stats.misses += 1;
        let id = graph.add(make());
        tracing::debug!(target: "dough::pool", node = %id, %kind, "pool miss");
        Ok(id)
    }

    /// Give a node back.
    ///
    /// One-shot sources, and everything when pooling is disabled, are
    /// destroyed. A node the graph already finished is skipped.
    pub fn release(&mut self, graph: &mut Graph, id: NodeId, now: f64) -> Result<(), PoolError> {
        let Some(kind) = graph.kind(id) else {
            return Ok(());
        };
        if let NodeKind::Custom(_) = kind {
            return Err(PoolError::Unrecognized { node: id, kind });
        }
        if kind.is_one_shot() || !self.enabled {
            if graph.remove(id).is_ok() {
                self.stats.destroyed += 1;
            }
            return Ok(());
        }
        if self.is_free(id) {
            return Err(PoolError::DoubleRelease(id));
        }
        if graph.isolate(id).is_err() {
            return Ok(());
        }
        if let Ok(params) = graph.params_mut(id) {
            for param in params {
                param.cancel_scheduled_values(now);
            }
        }
        self.free.entry(kind).or_default().push(id);
        self.stats.releases += 1;
        tracing::debug!(target: "dough::pool", node = %id, %kind, "released");
        Ok(())
    }
}

/// Live, not winding down, and (for worklets) inside the liveness window.
fn is_reusable(graph: &Graph, id: NodeId, now: f64, grace: f64) -> bool {
    let Some(kind) = graph.kind(id) else {
        return false;
    };
    if matches!(graph.state(id), Some(NodeState::Releasing | NodeState::Done)) {
        return false;
    }
    if kind.is_worklet() {
        return graph.end_time(id).is_none_or(|end| now < end + grace);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use dough_core::BiquadKind;
    use dough_effects::{BiquadNode, CrushNode, GainNode};
    use dough_synth::{OscillatorNode, Waveform};

    fn graph() -> Graph {
        Graph::new(48000.0, 128, 2)
    }

    #[test]
    fn test_released_node_is_reused() {
        let mut g = graph();
        let mut pool = ResourcePool::new(true);
        let a = pool.checkout(&mut g, NodeKind::Gain, GainNode::new).unwrap();
        g.param_mut(a, "gain").unwrap().set_value_at_time(0.3, 1.0);
        pool.release(&mut g, a, 0.0).unwrap();
        let b = pool.checkout(&mut g, NodeKind::Gain, GainNode::new).unwrap();
        assert_eq!(a, b);
        assert!(!g.param(b, "gain").unwrap().has_automation());
        assert_eq!(pool.stats().hits, 1);
        assert_eq!(pool.stats().misses, 1);
    }

    #[test]
    fn test_release_severs_connections() {
        let mut g = graph();
        let mut pool = ResourcePool::new(true);
        let a = pool.checkout(&mut g, NodeKind::Gain, GainNode::new).unwrap();
        let b = pool
            .checkout(&mut g, NodeKind::Biquad, || BiquadNode::new(BiquadKind::Lowpass))
            .unwrap();
        g.connect(a, b).unwrap();
        pool.release(&mut g, b, 0.0).unwrap();
        assert!(g.outputs(a).is_empty());
        assert!(g.inputs(b).is_empty());
    }

    #[test]
    fn test_one_shot_sources_are_destroyed() {
        let mut g = graph();
        let mut pool = ResourcePool::new(true);
        let osc = g.add(OscillatorNode::new(48000.0, Waveform::Sine));
        pool.release(&mut g, osc, 0.0).unwrap();
        assert!(!g.contains(osc));
        assert_eq!(pool.free_count(NodeKind::Oscillator), 0);
        assert_eq!(pool.stats().destroyed, 1);
    }

    #[test]
    fn test_disabled_pool_never_reuses() {
        let mut g = graph();
        let mut pool = ResourcePool::new(false);
        let a = pool.checkout(&mut g, NodeKind::Gain, GainNode::new).unwrap();
        pool.release(&mut g, a, 0.0).unwrap();
        let b = pool.checkout(&mut g, NodeKind::Gain, GainNode::new).unwrap();
        assert_ne!(a, b);
        assert!(!g.contains(a));
    }

    #[test]
    fn test_double_release_rejected() {
        let mut g = graph();
        let mut pool = ResourcePool::new(true);
        let a = pool.checkout(&mut g, NodeKind::Gain, GainNode::new).unwrap();
        pool.release(&mut g, a, 0.0).unwrap();
        assert_eq!(pool.release(&mut g, a, 0.0), Err(PoolError::DoubleRelease(a)));
    }

    #[test]
    fn test_worklet_past_grace_is_not_reused() {
        let mut g = graph();
        g.set_worklet_grace(0.0);
        let mut pool = ResourcePool::new(true);
        let crush = pool.checkout(&mut g, NodeKind::Crush, CrushNode::new).unwrap();
        g.set_end_time(crush, 0.001).unwrap();
        pool.release(&mut g, crush, 0.0).unwrap();
        for _ in 0..2 {
            g.render_block();
        }
        assert!(!g.contains(crush));
        let fresh = pool.checkout(&mut g, NodeKind::Crush, CrushNode::new).unwrap();
        assert_ne!(fresh, crush);
        assert_eq!(pool.stats().hits, 0);
    }

    #[test]
    fn test_worklet_inside_window_is_reused() {
        let mut g = graph();
        let mut pool = ResourcePool::new(true);
        let crush = pool.checkout(&mut g, NodeKind::Crush, CrushNode::new).unwrap();
        g.set_end_time(crush, 1.0).unwrap();
        pool.release(&mut g, crush, 0.0).unwrap();
        let again = pool.checkout(&mut g, NodeKind::Crush, CrushNode::new).unwrap();
        assert_eq!(again, crush);
        assert_eq!(g.end_time(again), None);
    }

    #[test]
    fn test_custom_kind_is_unrecognized() {
        use core::any::Any;
        use dough_core::{ParamSpec, ProcessContext, StereoBlock};

        struct Foreign;
        impl AudioNode for Foreign {
            fn kind(&self) -> NodeKind {
                NodeKind::Custom("foreign")
            }
            fn params(&self) -> &'static [ParamSpec] {
                &[]
            }
            fn process(&mut self, _: &ProcessContext<'_>, _: &StereoBlock, _: &mut StereoBlock) -> NodeState {
                NodeState::Active
            }
            fn reset(&mut self) {}
            fn as_any(&self) -> &dyn Any {
                self
            }
            fn as_any_mut(&mut self) -> &mut dyn Any {
                self
            }
        }

        let mut g = graph();
        let mut pool = ResourcePool::new(true);
        let id = g.add(Foreign);
        assert!(matches!(
            pool.release(&mut g, id, 0.0),
            Err(PoolError::Unrecognized { .. })
        ));
        assert!(g.contains(id));
    }
}
