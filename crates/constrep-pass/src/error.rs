//! Pass error types.
//!
//! Every variant is a structural problem in the input graph; none is
//! transient, so nothing is retried. Eligibility failures (constant too large,
//! consumers on one device, ...) are policy decisions recorded in the
//! [`PassReport`](crate::replicate::PassReport), not errors.

use constrep_core::{CoreError, DeviceNameError, ShapeError};
use thiserror::Error;

/// Errors that abort a pass.
#[derive(Debug, Error)]
pub enum PassError {
    /// A data consumer of a constant has no assigned device.
    #[error("node '{node}' has no assigned device")]
    NoAssignedDevice { node: String },

    /// A consumer's device name cannot be mapped to its host CPU.
    #[error("node '{node}' has malformed device name '{device}'")]
    MalformedDeviceName {
        node: String,
        device: String,
        #[source]
        source: DeviceNameError,
    },

    /// A constant has no tensor-valued attribute under the expected key.
    #[error("constant '{node}' has no tensor attribute '{attr}'")]
    MissingAttribute { node: String, attr: &'static str },

    /// A constant's declared shape is not a fully defined shape.
    #[error("constant '{node}' has a malformed shape")]
    MalformedTensorShape {
        node: String,
        #[source]
        source: ShapeError,
    },

    /// A graph query or mutation failed. Indicates a bug in the pass.
    #[error("graph error: {0}")]
    Graph(#[from] CoreError),
}
