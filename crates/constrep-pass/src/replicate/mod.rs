//! Constant replication across consumer devices.
//!
//! A small constant placed on one host but consumed on several hosts costs a
//! cross-device transfer per consuming host. [`ReplicateConstantsPass`]
//! replaces such a constant by one replica per consuming host CPU, wires every
//! consumer to the replica on its host, and removes the original.
//!
//! A constant `n` is replicated only if, tested in this order:
//! 1. it is a constant;
//! 2. it has more than one out-edge;
//! 3. none of its out-edges is a control edge;
//! 4. its element count is at most `max_elements` (otherwise the count is
//!    recorded in [`PassReport::skipped_oversized`]);
//! 5. it has an assigned device;
//! 6. that device is a CPU;
//! 7. its consumers resolve to more than one host CPU.
//!
//! Each replica receives a control edge from the source of every in-edge of
//! the original, data and control alike, so whatever the original was ordered
//! after, every replica is ordered after as well.

pub mod partition;
pub mod report;
pub mod resolve;

pub use partition::{partition, EdgePartition, OutEdge};
pub use report::{PassReport, ReplicaRecord, Replication, SkipCounts, SkipReason, SkippedRange};
pub use resolve::resolve_consumer_cpu_device;

use std::collections::BTreeMap;

use constrep_core::device::is_cpu_device;
use constrep_core::{CoreError, Graph, NodeId, TensorShape, VALUE_ATTR};
use tracing::{debug, info, trace, warn};

use crate::config::ReplicateConstantsConfig;
use crate::dump::dump_graph;
use crate::error::PassError;
use crate::pass::{GraphPass, PassOptions};

/// Marker inserted into replica names: `{original}/replicate/_{n}`.
pub const REPLICA_MARKER: &str = "replicate";

/// Outcome of the eligibility tests for one node.
enum Decision {
    /// Not a constant; not counted.
    Ignore,
    Skip(SkipReason),
    Replicate(BTreeMap<String, Vec<OutEdge>>),
}

/// Replicates small CPU constants onto each consuming host.
#[derive(Debug, Clone, Default)]
pub struct ReplicateConstantsPass {
    config: ReplicateConstantsConfig,
}

impl ReplicateConstantsPass {
    pub fn new(config: ReplicateConstantsConfig) -> Self {
        ReplicateConstantsPass { config }
    }

    pub fn config(&self) -> &ReplicateConstantsConfig {
        &self.config
    }

    /// Runs replication over every node of `graph`.
    ///
    /// Nodes are visited in graph order. An error aborts the run; constants
    /// rewritten before the failing node stay rewritten.
    pub fn run_on(&self, graph: &mut Graph) -> Result<PassReport, PassError> {
        let mut report = PassReport::default();
        for id in graph.node_ids() {
            if !graph.contains(id) {
                continue;
            }
            match self.evaluate(graph, id)? {
                Decision::Ignore => {}
                Decision::Skip(reason) => {
                    report.constants_examined += 1;
                    trace!(node = %node_name(graph, id), ?reason, "not replicating constant");
                    report.record_skip(reason);
                }
                Decision::Replicate(by_device) => {
                    report.constants_examined += 1;
                    let replication = replicate_to_each_device(graph, id, by_device)?;
                    report.record_replication(replication);
                }
            }
        }
        Ok(report)
    }

    fn evaluate(&self, graph: &Graph, id: NodeId) -> Result<Decision, PassError> {
        let node = graph
            .node(id)
            .ok_or(CoreError::NodeNotFound { id })?;
        if !node.is_constant() {
            return Ok(Decision::Ignore);
        }

        if graph.out_degree(id)? <= 1 {
            return Ok(Decision::Skip(SkipReason::FewConsumers));
        }

        if graph.has_control_out(id)? {
            return Ok(Decision::Skip(SkipReason::ControlOut));
        }

        let value = node
            .tensor_attr(VALUE_ATTR)
            .ok_or_else(|| PassError::MissingAttribute {
                node: node.name.clone(),
                attr: VALUE_ATTR,
            })?;
        let shape =
            TensorShape::build(&value.shape).map_err(|source| PassError::MalformedTensorShape {
                node: node.name.clone(),
                source,
            })?;
        if shape.num_elements() > self.config.max_elements {
            return Ok(Decision::Skip(SkipReason::TooLarge {
                elements: shape.num_elements(),
            }));
        }

        let Some(device) = node.assigned_device() else {
            return Ok(Decision::Skip(SkipReason::NoDevice));
        };

        // Replicating from a non-CPU constant onto CPUs is not known to be
        // valid.
        if !is_cpu_device(device) {
            return Ok(Decision::Skip(SkipReason::NotCpu));
        }

        let partition = partition(graph, id)?;
        if partition.device_count() <= 1 {
            return Ok(Decision::Skip(SkipReason::SingleDevice));
        }
        Ok(Decision::Replicate(partition.by_device))
    }
}

impl GraphPass for ReplicateConstantsPass {
    type Report = PassReport;

    fn name(&self) -> &'static str {
        "replicate_constants_pass"
    }

    fn run(&self, options: PassOptions<'_>) -> Result<PassReport, PassError> {
        debug!(
            "{} will replicate constants with number-of-elements <= {}",
            self.name(),
            self.config.max_elements
        );

        let Some(graph) = options.graph else {
            debug!("No graph in {}.", self.name());
            return Ok(PassReport::default());
        };

        self.dump(graph, "before");
        let report = self.run_on(graph)?;
        if let Some(summary) = report.skipped_summary() {
            debug!("{} {}.", self.name(), summary);
        }
        self.dump(graph, "after");

        info!(
            examined = report.constants_examined,
            replicated = report.constants_replicated(),
            replicas = report.replicas_created(),
            "{} finished",
            self.name()
        );
        Ok(report)
    }
}

impl ReplicateConstantsPass {
    fn dump(&self, graph: &Graph, stage: &str) {
        let Some(dir) = &self.config.dump_dir else {
            return;
        };
        let label = format!("{}_{}", stage, self.name());
        match dump_graph(graph, dir, &label) {
            Ok(path) => debug!(path = %path.display(), "dumped graph"),
            Err(err) => warn!(%err, "failed to dump graph {}", label),
        }
    }
}

/// Replaces `id` by one replica per device group, then removes it.
///
/// Every graph mutation here targets nodes known to exist, so once the first
/// replica is created the rewrite runs to completion.
fn replicate_to_each_device(
    graph: &mut Graph,
    id: NodeId,
    by_device: BTreeMap<String, Vec<OutEdge>>,
) -> Result<Replication, PassError> {
    let original = node_name(graph, id);
    let predecessors = graph.in_nodes(id)?;

    let mut replicas = Vec::with_capacity(by_device.len());
    for (device, edges) in by_device {
        let copy = graph.copy_node(id, REPLICA_MARKER)?;
        graph.set_assigned_device(copy, Some(device.clone()))?;

        for edge in &edges {
            graph.add_data_edge(copy, edge.source_port, edge.target, edge.target_port)?;
        }
        for &pred in &predecessors {
            graph.add_control_edge(pred, copy)?;
        }

        let name = node_name(graph, copy);
        debug!(%original, replica = %name, %device, consumers = edges.len(), "replicated constant");
        replicas.push(ReplicaRecord {
            name,
            device,
            consumers: edges.len(),
        });
    }

    graph.detach_edges(id)?;
    graph.remove_node(id)?;

    Ok(Replication { original, replicas })
}

fn node_name(graph: &Graph, id: NodeId) -> String {
    graph
        .node(id)
        .map_or_else(|| format!("<NodeId({})>", id), |n| n.name.clone())
}
