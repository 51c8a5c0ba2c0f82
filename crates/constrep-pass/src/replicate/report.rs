//! Diagnostics collected by a replication run.
//!
//! Nothing here feeds back into replication decisions.

use serde::Serialize;

/// Inclusive range of element counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SkippedRange {
    pub min: i64,
    pub max: i64,
}

impl SkippedRange {
    fn single(n: i64) -> Self {
        SkippedRange { min: n, max: n }
    }

    /// Widens the range to include `n`.
    pub fn include(&mut self, n: i64) {
        self.min = self.min.min(n);
        self.max = self.max.max(n);
    }
}

/// Why a constant was left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// At most one out-edge; nothing to gain.
    FewConsumers,
    /// Has an outgoing control edge.
    ControlOut,
    /// Element count above the configured maximum.
    TooLarge { elements: i64 },
    /// The constant itself has no device.
    NoDevice,
    /// The constant is not on a CPU (or its device does not parse).
    NotCpu,
    /// All consumers share one host CPU.
    SingleDevice,
}

/// Per-reason counts of skipped constants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SkipCounts {
    pub few_consumers: usize,
    pub control_out: usize,
    pub too_large: usize,
    pub no_device: usize,
    pub not_cpu: usize,
    pub single_device: usize,
}

/// One replica created for a constant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplicaRecord {
    pub name: String,
    pub device: String,
    /// Data edges the replica now feeds.
    pub consumers: usize,
}

/// A constant that was replaced by per-device replicas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Replication {
    pub original: String,
    pub replicas: Vec<ReplicaRecord>,
}

/// Summary of a replication run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassReport {
    /// Constant nodes looked at.
    pub constants_examined: usize,
    pub skipped: SkipCounts,
    /// Element-count range of constants skipped only for size. `None` if no
    /// constant was skipped for that reason.
    pub skipped_oversized: Option<SkippedRange>,
    pub replications: Vec<Replication>,
}

impl PassReport {
    pub fn constants_replicated(&self) -> usize {
        self.replications.len()
    }

    pub fn replicas_created(&self) -> usize {
        self.replications.iter().map(|r| r.replicas.len()).sum()
    }

    pub(crate) fn record_skip(&mut self, reason: SkipReason) {
        let counts = &mut self.skipped;
        match reason {
            SkipReason::FewConsumers => counts.few_consumers += 1,
            SkipReason::ControlOut => counts.control_out += 1,
            SkipReason::TooLarge { elements } => {
                counts.too_large += 1;
                match &mut self.skipped_oversized {
                    Some(range) => range.include(elements),
                    None => self.skipped_oversized = Some(SkippedRange::single(elements)),
                }
            }
            SkipReason::NoDevice => counts.no_device += 1,
            SkipReason::NotCpu => counts.not_cpu += 1,
            SkipReason::SingleDevice => counts.single_device += 1,
        }
    }

    pub(crate) fn record_replication(&mut self, replication: Replication) {
        self.replications.push(replication);
    }

    /// Human-readable line describing the oversized range, for logs.
    pub fn skipped_summary(&self) -> Option<String> {
        self.skipped_oversized.map(|r| {
            format!(
                "skipped replicating constants with number of elements in the range {} to {}",
                r.min, r.max
            )
        })
    }
}
