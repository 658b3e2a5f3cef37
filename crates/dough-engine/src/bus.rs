//! Named shared buses.
//!
//! A bus is a summing gain that voices send into with `bus`/`busgain` and
//! that bus modulators (`bmod`) read from. Buses are not routed to hardware.

use std::collections::BTreeMap;

use dough_core::{Graph, NodeId};
use dough_effects::GainNode;

/// Name to bus node.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BusMap {
    nodes: BTreeMap<String, NodeId>,
}

impl BusMap {
    /// Empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Node for `name`, if created.
    pub fn get(&self, name: &str) -> Option<NodeId> {
        self.nodes.get(name).copied()
    }

    /// Node for `name`, created on first use.
    pub fn get_or_create(&mut self, graph: &mut Graph, name: &str) -> NodeId {
        if let Some(&node) = self.nodes.get(name)
            && graph.contains(node)
        {
            return node;
        }
        let node = graph.add(GainNode::new());
        tracing::debug!(target: "dough::bus", bus = name, node = %node, "bus created");
        self.nodes.insert(name.to_string(), node);
        node
    }

    /// Bus names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    /// Number of buses.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when no bus exists.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Remove every bus node from the graph.
    pub fn teardown(&mut self, graph: &mut Graph) {
        for (_, node) in std::mem::take(&mut self.nodes) {
            let _ = graph.remove(node);
        }
    }
}
