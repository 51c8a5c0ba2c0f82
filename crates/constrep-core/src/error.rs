//! Core error types for constrep-core.
//!
//! Uses `thiserror` for structured, matchable error variants covering the
//! failure modes of the graph data model. Device-name and interchange errors
//! live next to their parsers ([`crate::device::DeviceNameError`],
//! [`crate::graph_def::GraphDefError`]).

use crate::id::{EdgeId, NodeId};
use thiserror::Error;

/// Core errors produced by graph queries and mutations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// A node id is unknown or refers to a node that was removed.
    #[error("node not found: NodeId({id})", id = id.0)]
    NodeNotFound { id: NodeId },

    /// No node carries the given name.
    #[error("no node named '{name}'")]
    NameNotFound { name: String },

    /// A node name is already taken in this graph.
    #[error("duplicate node name: '{name}'")]
    DuplicateNodeName { name: String },

    /// A node cannot be removed while edges still reference it.
    #[error("node '{name}' still has {edges} attached edge(s)")]
    NodeHasEdges { name: String, edges: usize },

    /// An edge id is unknown or was removed.
    #[error("edge not found: EdgeId({id})", id = id.0)]
    EdgeNotFound { id: EdgeId },

    /// An edge failed validation.
    #[error("invalid edge: {reason}")]
    InvalidEdge { reason: String },
}
