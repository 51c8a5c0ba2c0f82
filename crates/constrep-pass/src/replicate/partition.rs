//! Out-edge classification for a candidate constant.
//!
//! Control out-edges disqualify a constant outright: splitting them across
//! replicas would need every dependent control chain replicated too. Data
//! out-edges are grouped by the host CPU of their consumer.

use std::collections::BTreeMap;

use constrep_core::{CoreError, Graph, GraphEdge, NodeId};

use super::resolve::resolve_consumer_cpu_device;
use crate::error::PassError;

/// A data out-edge of the constant being classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutEdge {
    pub target: NodeId,
    pub source_port: u32,
    pub target_port: u32,
}

/// Result of [`partition`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdgePartition {
    /// The node has at least one outgoing control edge. When set, no device
    /// grouping is attempted and `by_device` is empty.
    pub has_control_out: bool,
    /// Data out-edges keyed by consumer CPU device, in device-name order.
    /// Each group is sorted by consumer (insertion order) then input port.
    pub by_device: BTreeMap<String, Vec<OutEdge>>,
}

impl EdgePartition {
    pub fn device_count(&self) -> usize {
        self.by_device.len()
    }
}

/// Classifies the out-edges of `id`.
///
/// Consumer devices are only resolved when there is no control out-edge; a
/// consumer without a usable device fails the whole classification.
pub fn partition(graph: &Graph, id: NodeId) -> Result<EdgePartition, PassError> {
    let out_edges = graph.out_edges(id)?;
    if out_edges.iter().any(|e| e.is_control()) {
        return Ok(EdgePartition {
            has_control_out: true,
            by_device: BTreeMap::new(),
        });
    }

    let mut by_device: BTreeMap<String, Vec<OutEdge>> = BTreeMap::new();
    for record in out_edges {
        let GraphEdge::Data {
            source_port,
            target_port,
        } = record.edge
        else {
            continue;
        };
        let consumer = graph
            .node(record.target)
            .ok_or(CoreError::NodeNotFound { id: record.target })?;
        let device = resolve_consumer_cpu_device(consumer)?;
        by_device.entry(device).or_default().push(OutEdge {
            target: record.target,
            source_port,
            target_port,
        });
    }
    for edges in by_device.values_mut() {
        edges.sort_by_key(|e| (e.target, e.target_port));
    }

    Ok(EdgePartition {
        has_control_out: false,
        by_device,
    })
}
