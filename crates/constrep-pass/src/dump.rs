//! Graph dumps for debugging passes.
//!
//! Dumps are diagnostics: callers log failures and carry on.

use std::path::{Path, PathBuf};

use constrep_core::{Graph, GraphDefError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DumpError {
    #[error("could not encode graph: {0}")]
    Encode(#[from] GraphDefError),

    #[error("could not write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Writes `graph` as pretty JSON to `{dir}/{label}.json`, creating `dir` if
/// needed. Returns the written path.
pub fn dump_graph(graph: &Graph, dir: &Path, label: &str) -> Result<PathBuf, DumpError> {
    let json = graph.to_graph_def()?.to_json_pretty()?;
    let path = dir.join(format!("{}.json", label));
    let io_err = |source| DumpError::Io {
        path: path.clone(),
        source,
    };
    std::fs::create_dir_all(dir).map_err(io_err)?;
    std::fs::write(&path, json).map_err(io_err)?;
    Ok(path)
}
