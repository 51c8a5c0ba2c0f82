//! Graph nodes.
//!
//! A [`Node`] is a named operation with an optional device placement and an
//! ordered attribute map. Constants are distinguished by [`OpKind::Constant`]
//! and carry their tensor in the [`VALUE_ATTR`] attribute.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::tensor::TensorProto;

/// Attribute holding a constant's tensor value.
pub const VALUE_ATTR: &str = "value";

/// Op name used for constants in the interchange format.
pub const CONSTANT_OP: &str = "Const";

/// What a node computes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpKind {
    /// Produces a fixed tensor from its `value` attribute.
    Constant,
    /// Any other operation, identified by its op name.
    Op(String),
}

impl OpKind {
    /// Parses an op name, mapping [`CONSTANT_OP`] to [`OpKind::Constant`].
    pub fn from_op_name(op: &str) -> Self {
        if op == CONSTANT_OP {
            OpKind::Constant
        } else {
            OpKind::Op(op.to_string())
        }
    }

    pub fn op_name(&self) -> &str {
        match self {
            OpKind::Constant => CONSTANT_OP,
            OpKind::Op(name) => name,
        }
    }
}

/// A node attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttrValue {
    Tensor(TensorProto),
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

/// A node in the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Graph-unique name.
    pub name: String,
    pub kind: OpKind,
    /// Device this node was placed on, e.g. `/job:worker/replica:0/task:1/device:CPU:0`.
    pub assigned_device: Option<String>,
    pub attrs: IndexMap<String, AttrValue>,
}

impl Node {
    pub fn new(name: impl Into<String>, kind: OpKind) -> Self {
        Node {
            name: name.into(),
            kind,
            assigned_device: None,
            attrs: IndexMap::new(),
        }
    }

    /// A constant node holding `value`.
    pub fn constant(name: impl Into<String>, value: TensorProto) -> Self {
        let mut node = Node::new(name, OpKind::Constant);
        node.attrs
            .insert(VALUE_ATTR.to_string(), AttrValue::Tensor(value));
        node
    }

    /// A non-constant node with the given op name.
    pub fn op(name: impl Into<String>, op: impl Into<String>) -> Self {
        Node::new(name, OpKind::Op(op.into()))
    }

    /// Builder-style device placement.
    pub fn on_device(mut self, device: impl Into<String>) -> Self {
        self.assigned_device = Some(device.into());
        self
    }

    pub fn is_constant(&self) -> bool {
        self.kind == OpKind::Constant
    }

    /// Returns the assigned device, treating an empty string as unassigned.
    pub fn assigned_device(&self) -> Option<&str> {
        self.assigned_device.as_deref().filter(|d| !d.is_empty())
    }

    pub fn has_assigned_device(&self) -> bool {
        self.assigned_device().is_some()
    }

    pub fn attr(&self, key: &str) -> Option<&AttrValue> {
        self.attrs.get(key)
    }

    /// Returns the tensor stored under `key`, if that attribute is a tensor.
    pub fn tensor_attr(&self, key: &str) -> Option<&TensorProto> {
        match self.attrs.get(key) {
            Some(AttrValue::Tensor(t)) => Some(t),
            _ => None,
        }
    }
}
