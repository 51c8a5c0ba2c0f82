//! The [`GraphPass`] trait implemented by graph rewrites.

use constrep_core::Graph;

use crate::error::PassError;

/// Inputs handed to a pass by its driver.
#[derive(Debug, Default)]
pub struct PassOptions<'a> {
    /// The graph to rewrite in place. `None` makes the pass a no-op.
    pub graph: Option<&'a mut Graph>,
}

impl<'a> PassOptions<'a> {
    pub fn new(graph: &'a mut Graph) -> Self {
        PassOptions { graph: Some(graph) }
    }
}

/// A single rewrite over a graph.
///
/// Passes run synchronously and hold the graph exclusively for their
/// duration. On error the graph keeps every rewrite completed before the
/// failure.
pub trait GraphPass {
    /// Diagnostics produced by a successful run.
    type Report;

    /// Stable pass name, used for logging and dump file names.
    fn name(&self) -> &'static str;

    fn run(&self, options: PassOptions<'_>) -> Result<Self::Report, PassError>;
}
