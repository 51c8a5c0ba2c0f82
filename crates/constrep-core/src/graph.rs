//! Graph: the node/edge container every pass operates on.
//!
//! Nodes and edges live in a private petgraph `StableGraph` arena. Callers
//! address nodes through [`NodeId`]s, which are allocated from a monotonic
//! counter and never reused: once a node is removed its id is stale and every
//! lookup through it reports [`CoreError::NodeNotFound`] instead of silently
//! reaching whichever node later took over the arena slot.
//!
//! # Ordering
//!
//! [`Graph::nodes`] iterates in insertion order (removals keep the relative
//! order of the survivors). Edge queries return edges in the order they were
//! added. Both orders are deterministic for a given sequence of mutations, so
//! passes that walk the graph produce reproducible rewrites.
//!
//! # Removal
//!
//! [`Graph::remove_node`] refuses to remove a node that still has edges. A
//! caller rewiring a node away first moves its consumers, then calls
//! [`Graph::detach_edges`], then removes it.

use std::collections::HashMap;

use indexmap::IndexMap;
use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::stable_graph::StableGraph;
use petgraph::visit::EdgeRef;
use petgraph::{Directed, Direction};

use crate::edge::{EdgeRecord, GraphEdge};
use crate::error::CoreError;
use crate::id::{EdgeId, NodeId};
use crate::node::Node;

/// Arena slot: the node together with its stable id.
#[derive(Debug, Clone)]
struct Slot {
    id: NodeId,
    node: Node,
}

/// A directed graph of named nodes joined by data and control edges.
///
/// Graphs are built only through the mutation methods below (or
/// [`Graph::from_graph_def`]), which keep the name and order indexes in step
/// with the arena.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    inner: StableGraph<Slot, GraphEdge, Directed, u32>,
    /// Live nodes in insertion order.
    order: IndexMap<NodeId, NodeIndex<u32>>,
    /// Name index for uniqueness checks and lookup.
    names: HashMap<String, NodeId>,
    /// Next node id to allocate.
    next_node_id: u32,
    /// Suffix counter for [`Graph::new_name`].
    name_counter: u64,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Node methods
    // -----------------------------------------------------------------------

    /// Adds a node. Errors if another node already has the same name.
    pub fn add_node(&mut self, node: Node) -> Result<NodeId, CoreError> {
        if self.names.contains_key(&node.name) {
            return Err(CoreError::DuplicateNodeName { name: node.name });
        }
        let id = NodeId(self.next_node_id);
        self.next_node_id += 1;

        self.names.insert(node.name.clone(), id);
        let idx = self.inner.add_node(Slot { id, node });
        self.order.insert(id, idx);

        #[cfg(debug_assertions)]
        self.assert_consistency();

        Ok(id)
    }

    /// Looks up a node by id. Returns `None` for removed or unknown ids.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        let idx = self.order.get(&id)?;
        self.inner.node_weight(*idx).map(|slot| &slot.node)
    }

    /// Looks up a node id by name.
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).copied()
    }

    /// Looks up a node id by name, erroring if absent.
    pub fn require(&self, name: &str) -> Result<NodeId, CoreError> {
        self.find(name).ok_or_else(|| CoreError::NameNotFound {
            name: name.to_string(),
        })
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.order.contains_key(&id)
    }

    /// Iterates over live nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> + '_ {
        self.order
            .iter()
            .map(move |(&id, &idx)| (id, &self.inner[idx].node))
    }

    /// Snapshot of live node ids in insertion order.
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.order.keys().copied().collect()
    }

    /// Places a node on a device, or clears its placement with `None`.
    pub fn set_assigned_device(
        &mut self,
        id: NodeId,
        device: Option<String>,
    ) -> Result<(), CoreError> {
        let idx = self.index(id)?;
        self.inner[idx].node.assigned_device = device;
        Ok(())
    }

    /// Returns a fresh graph-unique name of the form `{prefix}/_{n}`.
    ///
    /// `n` comes from a graph-wide counter that only moves forward; candidates
    /// that collide with an existing node name are skipped.
    pub fn new_name(&mut self, prefix: &str) -> String {
        loop {
            let candidate = format!("{}/_{}", prefix, self.name_counter);
            self.name_counter += 1;
            if !self.names.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    /// Adds a structural copy of `id` (kind, device, attributes; no edges)
    /// named `{original}/{marker}/_{n}`.
    pub fn copy_node(&mut self, id: NodeId, marker: &str) -> Result<NodeId, CoreError> {
        let idx = self.index(id)?;
        let mut copy = self.inner[idx].node.clone();
        copy.name = self.new_name(&format!("{}/{}", copy.name, marker));
        self.add_node(copy)
    }

    /// Removes a node that has no attached edges and returns it.
    pub fn remove_node(&mut self, id: NodeId) -> Result<Node, CoreError> {
        let idx = self.index(id)?;
        let attached = self.inner.edges_directed(idx, Direction::Outgoing).count()
            + self.inner.edges_directed(idx, Direction::Incoming).count();
        if attached > 0 {
            return Err(CoreError::NodeHasEdges {
                name: self.inner[idx].node.name.clone(),
                edges: attached,
            });
        }

        let slot = self
            .inner
            .remove_node(idx)
            .ok_or(CoreError::NodeNotFound { id })?;
        self.order.shift_remove(&id);
        self.names.remove(&slot.node.name);

        #[cfg(debug_assertions)]
        self.assert_consistency();

        Ok(slot.node)
    }

    /// Removes every edge touching `id`. Returns how many were removed.
    pub fn detach_edges(&mut self, id: NodeId) -> Result<usize, CoreError> {
        let idx = self.index(id)?;
        let mut incident: Vec<EdgeIndex<u32>> = self
            .inner
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| e.id())
            .collect();
        incident.extend(
            self.inner
                .edges_directed(idx, Direction::Incoming)
                .map(|e| e.id()),
        );
        // A self-loop shows up in both directions.
        incident.sort();
        incident.dedup();
        for e in &incident {
            self.inner.remove_edge(*e);
        }
        Ok(incident.len())
    }

    // -----------------------------------------------------------------------
    // Edge methods
    // -----------------------------------------------------------------------

    /// Adds a data edge from output `source_port` of `from` to input
    /// `target_port` of `to`. Both nodes must exist.
    pub fn add_data_edge(
        &mut self,
        from: NodeId,
        source_port: u32,
        to: NodeId,
        target_port: u32,
    ) -> Result<EdgeId, CoreError> {
        let from_idx = self.index(from)?;
        let to_idx = self.index(to)?;
        let edge = GraphEdge::Data {
            source_port,
            target_port,
        };
        Ok(self.inner.add_edge(from_idx, to_idx, edge).into())
    }

    /// Adds a control edge ordering `to` after `from`. Duplicates are allowed.
    pub fn add_control_edge(&mut self, from: NodeId, to: NodeId) -> Result<EdgeId, CoreError> {
        let from_idx = self.index(from)?;
        let to_idx = self.index(to)?;
        if from_idx == to_idx {
            return Err(CoreError::InvalidEdge {
                reason: format!(
                    "control edge from '{}' to itself",
                    self.inner[from_idx].node.name
                ),
            });
        }
        Ok(self.inner.add_edge(from_idx, to_idx, GraphEdge::Control).into())
    }

    /// Removes an edge and returns its weight.
    pub fn remove_edge(&mut self, id: EdgeId) -> Result<GraphEdge, CoreError> {
        self.inner
            .remove_edge(id.into())
            .ok_or(CoreError::EdgeNotFound { id })
    }

    /// Looks up an edge by id.
    pub fn edge(&self, id: EdgeId) -> Option<EdgeRecord> {
        let idx: EdgeIndex<u32> = id.into();
        let (source, target) = self.inner.edge_endpoints(idx)?;
        Some(EdgeRecord {
            id,
            source: self.inner[source].id,
            target: self.inner[target].id,
            edge: self.inner[idx],
        })
    }

    /// All edges, grouped by source node in node order, each group in the
    /// order its edges were added.
    pub fn edges(&self) -> Vec<EdgeRecord> {
        self.order
            .values()
            .flat_map(|&idx| self.directed(idx, Direction::Outgoing))
            .collect()
    }

    /// Outgoing edges of `id` in the order they were added.
    pub fn out_edges(&self, id: NodeId) -> Result<Vec<EdgeRecord>, CoreError> {
        Ok(self.directed(self.index(id)?, Direction::Outgoing))
    }

    /// Incoming edges of `id` in the order they were added.
    pub fn in_edges(&self, id: NodeId) -> Result<Vec<EdgeRecord>, CoreError> {
        Ok(self.directed(self.index(id)?, Direction::Incoming))
    }

    /// Source node of every incoming edge of `id`, one entry per edge.
    pub fn in_nodes(&self, id: NodeId) -> Result<Vec<NodeId>, CoreError> {
        Ok(self.in_edges(id)?.into_iter().map(|e| e.source).collect())
    }

    /// Number of outgoing edges of any kind.
    pub fn out_degree(&self, id: NodeId) -> Result<usize, CoreError> {
        let idx = self.index(id)?;
        Ok(self.inner.edges_directed(idx, Direction::Outgoing).count())
    }

    /// Number of incoming edges of any kind.
    pub fn in_degree(&self, id: NodeId) -> Result<usize, CoreError> {
        let idx = self.index(id)?;
        Ok(self.inner.edges_directed(idx, Direction::Incoming).count())
    }

    /// Returns `true` if `id` has at least one outgoing control edge.
    pub fn has_control_out(&self, id: NodeId) -> Result<bool, CoreError> {
        let idx = self.index(id)?;
        Ok(self
            .inner
            .edges_directed(idx, Direction::Outgoing)
            .any(|e| e.weight().is_control()))
    }

    // -----------------------------------------------------------------------
    // Counts
    // -----------------------------------------------------------------------

    pub fn node_count(&self) -> usize {
        self.order.len()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    pub fn data_edge_count(&self) -> usize {
        self.inner.edge_weights().filter(|e| e.is_data()).count()
    }

    pub fn control_edge_count(&self) -> usize {
        self.inner.edge_weights().filter(|e| e.is_control()).count()
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn index(&self, id: NodeId) -> Result<NodeIndex<u32>, CoreError> {
        self.order
            .get(&id)
            .copied()
            .ok_or(CoreError::NodeNotFound { id })
    }

    fn directed(&self, idx: NodeIndex<u32>, dir: Direction) -> Vec<EdgeRecord> {
        // petgraph walks adjacency lists newest-first.
        let mut edges: Vec<EdgeRecord> = self
            .inner
            .edges_directed(idx, dir)
            .map(|e| EdgeRecord {
                id: e.id().into(),
                source: self.inner[e.source()].id,
                target: self.inner[e.target()].id,
                edge: *e.weight(),
            })
            .collect();
        edges.reverse();
        edges
    }

    /// Verifies that the order and name indices agree with the arena.
    ///
    /// Only called in debug builds (via `cfg(debug_assertions)`).
    #[cfg(debug_assertions)]
    fn assert_consistency(&self) {
        assert_eq!(
            self.order.len(),
            self.inner.node_count(),
            "order index out of sync with arena"
        );
        assert_eq!(
            self.names.len(),
            self.order.len(),
            "name index out of sync with arena"
        );
        for (&id, &idx) in &self.order {
            let slot = self
                .inner
                .node_weight(idx)
                .unwrap_or_else(|| panic!("NodeId({}) maps to an empty slot", id.0));
            assert_eq!(slot.id, id, "slot id mismatch");
            assert_eq!(self.names.get(&slot.node.name), Some(&id), "name index mismatch");
        }
    }
}
