//! Tensor metadata carried by constant nodes.
//!
//! Only what the graph passes need is modelled: an element type tag and a
//! shape. [`TensorShapeProto`] is the raw, unvalidated form stored in node
//! attributes; [`TensorShape::build`] validates it into a fully defined shape
//! with a known element count.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use thiserror::Error;

/// Element type of a tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DType {
    Bool,
    I32,
    I64,
    F32,
    F64,
    Str,
}

/// Unvalidated shape as stored in an attribute.
///
/// A dimension of `-1` means "unknown"; anything below that is malformed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TensorShapeProto {
    pub dims: SmallVec<[i64; 4]>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub unknown_rank: bool,
}

impl TensorShapeProto {
    /// A fully known shape from dimension sizes.
    pub fn from_dims(dims: &[i64]) -> Self {
        TensorShapeProto {
            dims: SmallVec::from_slice(dims),
            unknown_rank: false,
        }
    }
}

/// A tensor value baked into the graph. Element contents are not modelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorProto {
    pub dtype: DType,
    pub shape: TensorShapeProto,
}

impl TensorProto {
    pub fn new(dtype: DType, dims: &[i64]) -> Self {
        TensorProto {
            dtype,
            shape: TensorShapeProto::from_dims(dims),
        }
    }
}

/// Reasons a [`TensorShapeProto`] cannot be turned into a [`TensorShape`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeError {
    #[error("shape has unknown rank")]
    UnknownRank,

    #[error("dimension {index} is unknown")]
    UnknownDim { index: usize },

    #[error("dimension {index} has invalid size {size}")]
    NegativeDim { index: usize, size: i64 },

    #[error("shape {dims:?} has too many elements")]
    Overflow { dims: Vec<i64> },
}

/// A fully defined shape: every dimension known and non-negative.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TensorShape {
    num_elements: i64,
}

impl TensorShape {
    /// Validates a shape proto. The element count must fit in an `i64`.
    pub fn build(proto: &TensorShapeProto) -> Result<TensorShape, ShapeError> {
        if proto.unknown_rank {
            return Err(ShapeError::UnknownRank);
        }
        let mut num_elements: i64 = 1;
        for (index, &size) in proto.dims.iter().enumerate() {
            match size {
                -1 => return Err(ShapeError::UnknownDim { index }),
                s if s < 0 => return Err(ShapeError::NegativeDim { index, size: s }),
                s => {
                    num_elements = num_elements.checked_mul(s).ok_or_else(|| {
                        ShapeError::Overflow {
                            dims: proto.dims.to_vec(),
                        }
                    })?;
                }
            }
        }
        Ok(TensorShape { num_elements })
    }

    /// Product of all dimensions; `1` for a scalar.
    pub fn num_elements(&self) -> i64 {
        self.num_elements
    }
}
