//! Audio graph
//!
//! Nodes live in a `StableGraph` so their indices survive removals. Every
//! topology change recomputes the render order; a connection that would
//! close a cycle is rolled back. Rendering walks that order, sums each
//! node's inputs, processes it, and copies the destination block out.

use crate::error::GraphError;
use crate::nodes::Node;
use crossbeam_channel::Sender;
use petgraph::algo::toposort;
use petgraph::stable_graph::{NodeIndex, StableGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Graph node handle
pub type NodeId = NodeIndex;

/// Render-side occurrences reported to the control thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphNotice {
    /// A buffer source played to its end
    SourceEnded(NodeId),
}

struct Slot {
    node: Node,
    /// Last rendered block (stereo interleaved)
    out: Vec<f32>,
}

pub struct Graph {
    graph: StableGraph<Slot, ()>,
    order: Vec<NodeId>,
    destination: NodeId,
    scratch: Vec<f32>,
    notices: Sender<GraphNotice>,
    frames_rendered: Arc<AtomicU64>,
}

impl Graph {
    pub(crate) fn new(notices: Sender<GraphNotice>, frames_rendered: Arc<AtomicU64>) -> Self {
        let mut graph = StableGraph::new();
        let destination = graph.add_node(Slot {
            node: Node::Destination,
            out: Vec::new(),
        });
        Self {
            graph,
            order: vec![destination],
            destination,
            scratch: Vec::new(),
            notices,
            frames_rendered,
        }
    }

    /// The output node
    pub fn destination(&self) -> NodeId {
        self.destination
    }

    pub fn add(&mut self, node: Node) -> NodeId {
        let id = self.graph.add_node(Slot { node, out: Vec::new() });
        self.refresh_order();
        id
    }

    /// Remove a node and all its connections
    pub fn remove(&mut self, id: NodeId) -> Option<Node> {
        if id == self.destination {
            return None;
        }
        let slot = self.graph.remove_node(id)?;
        self.refresh_order();
        Some(slot.node)
    }

    /// Connect `from -> to`; connecting twice is a no-op
    pub fn connect(&mut self, from: NodeId, to: NodeId) -> Result<(), GraphError> {
        for id in [from, to] {
            if !self.graph.contains_node(id) {
                return Err(GraphError::UnknownNode(id));
            }
        }
        if self.graph.find_edge(from, to).is_some() {
            return Ok(());
        }

        let edge = self.graph.add_edge(from, to, ());
        match toposort(&self.graph, None) {
            Ok(order) => {
                self.order = order;
                Ok(())
            }
            Err(_) => {
                self.graph.remove_edge(edge);
                Err(GraphError::Cycle { from, to })
            }
        }
    }

    /// Drop every outgoing connection of `id`
    pub fn disconnect(&mut self, id: NodeId) {
        let edges: Vec<_> = self
            .graph
            .edges_directed(id, Direction::Outgoing)
            .map(|e| e.id())
            .collect();
        for edge in edges {
            self.graph.remove_edge(edge);
        }
        self.refresh_order();
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.graph.contains_node(id)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.graph.node_weight(id).map(|slot| &slot.node)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.graph.node_weight_mut(id).map(|slot| &mut slot.node)
    }

    /// Downstream neighbours of `id`
    pub fn outgoing(&self, id: NodeId) -> Vec<NodeId> {
        let mut targets: Vec<_> = self
            .graph
            .neighbors_directed(id, Direction::Outgoing)
            .collect();
        targets.sort();
        targets
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Follow the playback path from `start` to the destination
    ///
    /// Record taps hanging off the path are skipped.
    pub fn path_from(&self, start: NodeId) -> Vec<NodeId> {
        let mut path = Vec::new();
        if !self.graph.contains_node(start) {
            return path;
        }
        let mut current = start;
        path.push(current);
        while current != self.destination && path.len() <= self.graph.node_count() {
            let next = self
                .outgoing(current)
                .into_iter()
                .find(|&id| !matches!(self.node(id), Some(Node::RecordTap(_))));
            match next {
                Some(id) => {
                    path.push(id);
                    current = id;
                }
                None => break,
            }
        }
        path
    }

    fn refresh_order(&mut self) {
        match toposort(&self.graph, None) {
            Ok(order) => self.order = order,
            // connect() never admits a cycle
            Err(cycle) => warn!(node = ?cycle.node_id(), "audio graph has a cycle"),
        }
    }

    /// Render one stereo interleaved block into `out`
    pub fn render(&mut self, out: &mut [f32]) {
        let len = out.len() - out.len() % 2;
        if self.scratch.len() < len {
            self.scratch.resize(len, 0.0);
        }

        let Graph {
            graph,
            order,
            scratch,
            notices,
            ..
        } = self;
        let input = &mut scratch[..len];

        for &id in order.iter() {
            input.fill(0.0);
            for upstream in graph.neighbors_directed(id, Direction::Incoming) {
                if let Some(slot) = graph.node_weight(upstream) {
                    for (acc, sample) in input.iter_mut().zip(&slot.out) {
                        *acc += sample;
                    }
                }
            }

            let Some(slot) = graph.node_weight_mut(id) else {
                continue;
            };
            if slot.out.len() != len {
                slot.out.resize(len, 0.0);
            }
            if slot.node.process(input, &mut slot.out) {
                // A full queue only loses the notice; the source stays finished
                let _ = notices.try_send(GraphNotice::SourceEnded(id));
            }
        }

        match self.graph.node_weight(self.destination) {
            Some(slot) => out[..len].copy_from_slice(&slot.out[..len]),
            None => out[..len].fill(0.0),
        }
        self.frames_rendered
            .fetch_add((len / 2) as u64, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::{BufferSource, GainStage};
    use crossbeam_channel::bounded;
    use orbit_media::AudioBuffer;

    fn graph() -> (Graph, crossbeam_channel::Receiver<GraphNotice>) {
        let (tx, rx) = bounded(16);
        (Graph::new(tx, Arc::new(AtomicU64::new(0))), rx)
    }

    fn source(frames: usize, value: f32) -> Node {
        let buffer = AudioBuffer::from_planar(100, vec![vec![value; frames]]);
        let mut source = BufferSource::new(Arc::new(buffer));
        source.start();
        Node::Source(source)
    }

    #[test]
    fn test_rejects_cycles() {
        let (mut g, _) = graph();
        let a = g.add(Node::Gain(GainStage::new(1.0)));
        let b = g.add(Node::Gain(GainStage::new(1.0)));
        g.connect(a, b).unwrap();
        assert_eq!(g.connect(b, a), Err(GraphError::Cycle { from: b, to: a }));
        assert_eq!(g.edge_count(), 1);
    }

    #[test]
    fn test_connect_is_idempotent() {
        let (mut g, _) = graph();
        let a = g.add(Node::Gain(GainStage::new(1.0)));
        let dest = g.destination();
        g.connect(a, dest).unwrap();
        g.connect(a, dest).unwrap();
        assert_eq!(g.edge_count(), 1);
        g.disconnect(a);
        assert_eq!(g.edge_count(), 0);
    }

    #[test]
    fn test_render_sums_inputs_through_gain() {
        let (mut g, _) = graph();
        let a = g.add(source(8, 0.25));
        let b = g.add(source(8, 0.5));
        let gain = g.add(Node::Gain(GainStage::new(0.5)));
        let dest = g.destination();
        g.connect(a, gain).unwrap();
        g.connect(b, gain).unwrap();
        g.connect(gain, dest).unwrap();

        let mut out = vec![0.0; 8];
        g.render(&mut out);
        assert!(out.iter().all(|&s| (s - 0.375).abs() < 1e-6));
    }

    #[test]
    fn test_unconnected_nodes_are_silent_at_output() {
        let (mut g, _) = graph();
        g.add(source(8, 1.0));
        let mut out = vec![1.0; 8];
        g.render(&mut out);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_source_end_is_reported() {
        let (mut g, rx) = graph();
        let a = g.add(source(3, 1.0));
        let dest = g.destination();
        g.connect(a, dest).unwrap();

        let mut out = vec![0.0; 8];
        g.render(&mut out);
        assert_eq!(rx.try_recv(), Ok(GraphNotice::SourceEnded(a)));
        assert_eq!(&out[4..], &[1.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_remove_drops_edges_and_keeps_other_ids() {
        let (mut g, _) = graph();
        let a = g.add(Node::Gain(GainStage::new(1.0)));
        let b = g.add(Node::Gain(GainStage::new(1.0)));
        let dest = g.destination();
        g.connect(a, b).unwrap();
        g.connect(b, dest).unwrap();

        assert!(g.remove(a).is_some());
        assert!(!g.contains(a));
        assert!(g.contains(b));
        assert_eq!(g.edge_count(), 1);
        assert!(g.remove(dest).is_none(), "destination is permanent");
        assert_eq!(g.path_from(b), vec![b, dest]);
    }
}
