//! Edge weights of the graph.
//!
//! A [`GraphEdge`] is either a data edge, carrying the value of one output
//! port of its source into one input port of its target, or a control edge,
//! which only orders its target after its source.

use serde::{Deserialize, Serialize};

use crate::id::{EdgeId, NodeId};

/// Edge types in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GraphEdge {
    /// Value dependency from `source_port` of the source node to
    /// `target_port` of the target node.
    Data {
        /// Which output port of the source node.
        source_port: u32,
        /// Which input port of the target node.
        target_port: u32,
    },

    /// Ordering dependency. Target executes after source.
    Control,
}

impl GraphEdge {
    /// Returns `true` if this is a data edge.
    pub fn is_data(&self) -> bool {
        matches!(self, GraphEdge::Data { .. })
    }

    /// Returns `true` if this is a control edge.
    pub fn is_control(&self) -> bool {
        matches!(self, GraphEdge::Control)
    }

    /// Returns `(source_port, target_port)` for data edges.
    pub fn ports(&self) -> Option<(u32, u32)> {
        match self {
            GraphEdge::Data {
                source_port,
                target_port,
            } => Some((*source_port, *target_port)),
            GraphEdge::Control => None,
        }
    }
}

/// A materialized view of one edge: its id, endpoints, and weight.
///
/// Returned by graph queries so callers can hold edge information across
/// mutations without borrowing the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeRecord {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    pub edge: GraphEdge,
}

impl EdgeRecord {
    /// Returns `true` if the underlying edge is a control edge.
    pub fn is_control(&self) -> bool {
        self.edge.is_control()
    }
}
