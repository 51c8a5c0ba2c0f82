//! JSON interchange format for graphs.
//!
//! A [`GraphDef`] lists nodes by name. Each [`NodeDef`] names its inputs as
//! strings:
//! - `"src"` or `"src:N"`: data input from output port `0` / `N` of `src`;
//! - `"^src"`: control input from `src`.
//!
//! Data inputs come first and their position is the target port; control
//! inputs follow. [`Graph::from_graph_def`] and [`Graph::to_graph_def`] convert
//! between the two representations.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::edge::GraphEdge;
use crate::error::CoreError;
use crate::graph::Graph;
use crate::node::{AttrValue, Node, OpKind};

/// Errors converting between [`GraphDef`] and [`Graph`].
#[derive(Debug, Error)]
pub enum GraphDefError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("node '{node}' has input '{input}' naming an unknown node")]
    UnknownInput { node: String, input: String },

    #[error("node '{node}' has malformed input '{input}'")]
    MalformedInput { node: String, input: String },

    #[error("node '{node}' lists data input '{input}' after a control input")]
    DataAfterControl { node: String, input: String },

    #[error("node '{node}' has no data input on port {port}")]
    PortGap { node: String, port: u32 },

    #[error("invalid graph JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// A serializable graph: nodes in order, edges encoded as node inputs.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GraphDef {
    pub nodes: Vec<NodeDef>,
}

/// One node of a [`GraphDef`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDef {
    pub name: String,
    pub op: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub attrs: IndexMap<String, AttrValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<String>,
}

impl GraphDef {
    pub fn from_json(json: &str) -> Result<GraphDef, GraphDefError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, GraphDefError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// One line per node: `name = Op @device <- inputs`.
impl fmt::Display for GraphDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for node in &self.nodes {
            write!(f, "{} = {}", node.name, node.op)?;
            if let Some(device) = &node.device {
                write!(f, " @{}", device)?;
            }
            if !node.inputs.is_empty() {
                write!(f, " <- {}", node.inputs.join(", "))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// A parsed input reference.
enum Input<'a> {
    Data { source: &'a str, port: u32 },
    Control { source: &'a str },
}

fn parse_input(input: &str) -> Option<Input<'_>> {
    if let Some(source) = input.strip_prefix('^') {
        return (!source.is_empty()).then_some(Input::Control { source });
    }
    match input.rsplit_once(':') {
        Some((source, port)) => {
            let port = port.parse().ok()?;
            (!source.is_empty()).then_some(Input::Data { source, port })
        }
        None => (!input.is_empty()).then_some(Input::Data {
            source: input,
            port: 0,
        }),
    }
}

impl Graph {
    /// Builds a graph from its interchange form.
    pub fn from_graph_def(def: &GraphDef) -> Result<Graph, GraphDefError> {
        let mut graph = Graph::new();
        for node_def in &def.nodes {
            let node = Node {
                name: node_def.name.clone(),
                kind: OpKind::from_op_name(&node_def.op),
                assigned_device: node_def.device.clone(),
                attrs: node_def.attrs.clone(),
            };
            graph.add_node(node)?;
        }

        for node_def in &def.nodes {
            let target = graph.require(&node_def.name)?;
            let mut target_port = 0u32;
            let mut seen_control = false;
            for input in &node_def.inputs {
                let parsed = parse_input(input).ok_or_else(|| GraphDefError::MalformedInput {
                    node: node_def.name.clone(),
                    input: input.clone(),
                })?;
                let source_name = match &parsed {
                    Input::Data { source, .. } | Input::Control { source } => *source,
                };
                let source = graph
                    .find(source_name)
                    .ok_or_else(|| GraphDefError::UnknownInput {
                        node: node_def.name.clone(),
                        input: input.clone(),
                    })?;
                match parsed {
                    Input::Data { port, .. } => {
                        if seen_control {
                            return Err(GraphDefError::DataAfterControl {
                                node: node_def.name.clone(),
                                input: input.clone(),
                            });
                        }
                        graph.add_data_edge(source, port, target, target_port)?;
                        target_port += 1;
                    }
                    Input::Control { .. } => {
                        seen_control = true;
                        graph.add_control_edge(source, target)?;
                    }
                }
            }
        }
        Ok(graph)
    }

    /// Converts the graph to its interchange form.
    ///
    /// Every node's data inputs must occupy ports `0..n` without gaps, which
    /// is the shape [`Graph::from_graph_def`] produces.
    pub fn to_graph_def(&self) -> Result<GraphDef, GraphDefError> {
        let mut nodes = Vec::with_capacity(self.node_count());
        for (id, node) in self.nodes() {
            let in_edges = self.in_edges(id)?;

            let mut data: Vec<(u32, String)> = Vec::new();
            let mut control: Vec<String> = Vec::new();
            for e in &in_edges {
                let source = &self
                    .node(e.source)
                    .ok_or(CoreError::NodeNotFound { id: e.source })?
                    .name;
                match e.edge {
                    GraphEdge::Data {
                        source_port,
                        target_port,
                    } => {
                        let input = if source_port == 0 {
                            source.clone()
                        } else {
                            format!("{}:{}", source, source_port)
                        };
                        data.push((target_port, input));
                    }
                    GraphEdge::Control => control.push(format!("^{}", source)),
                }
            }
            data.sort_by_key(|(port, _)| *port);
            for (expected, (port, _)) in data.iter().enumerate() {
                if *port != expected as u32 {
                    return Err(GraphDefError::PortGap {
                        node: node.name.clone(),
                        port: expected as u32,
                    });
                }
            }

            let mut inputs: Vec<String> = data.into_iter().map(|(_, input)| input).collect();
            inputs.extend(control);
            nodes.push(NodeDef {
                name: node.name.clone(),
                op: node.kind.op_name().to_string(),
                device: node.assigned_device.clone(),
                attrs: node.attrs.clone(),
                inputs,
            });
        }
        Ok(GraphDef { nodes })
    }
}
