pub mod device;
pub mod edge;
pub mod error;
pub mod graph;
pub mod graph_def;
pub mod id;
pub mod node;
pub mod tensor;

// Re-export commonly used types
pub use device::{device_name_to_cpu_device_name, DeviceName, DeviceNameError};
pub use edge::{EdgeRecord, GraphEdge};
pub use error::CoreError;
pub use graph::Graph;
pub use graph_def::{GraphDef, GraphDefError, NodeDef};
pub use id::{EdgeId, NodeId};
pub use node::{AttrValue, Node, OpKind, VALUE_ATTR};
pub use tensor::{DType, ShapeError, TensorProto, TensorShape, TensorShapeProto};
