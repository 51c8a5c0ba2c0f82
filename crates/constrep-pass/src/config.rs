//! Configuration for constant replication.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Largest constant, in elements, that is worth replicating.
pub const DEFAULT_MAX_ELEMENTS: i64 = 16;

/// Options controlling [`ReplicateConstantsPass`](crate::ReplicateConstantsPass).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicateConstantsConfig {
    /// Constants with more elements than this are left alone.
    pub max_elements: i64,

    /// When set, the graph is written here as JSON before and after the pass.
    pub dump_dir: Option<PathBuf>,
}

impl Default for ReplicateConstantsConfig {
    fn default() -> Self {
        ReplicateConstantsConfig {
            max_elements: DEFAULT_MAX_ELEMENTS,
            dump_dir: None,
        }
    }
}
