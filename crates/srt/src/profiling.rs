//! Run counters and optional per-node wall-clock timings.

use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;

/// Cumulative counters for one [`crate::StaticModule`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub runs: u64,
    /// Output slots that were empty and received a fresh tensor.
    pub output_allocations: u64,
    /// Output slots whose tensor was truncated and regrown in place.
    pub output_reuses: u64,
    /// Regrowths that had to replace the backing allocation.
    pub storage_regrowths: u64,
    pub vectorized_calls: u64,
    pub fallback_calls: u64,
    pub container_rebuilds: u64,
    pub container_reuses: u64,
}

impl RunStats {
    pub fn merge(&mut self, other: &RunStats) {
        self.runs = self.runs.saturating_add(other.runs);
        self.output_allocations = self
            .output_allocations
            .saturating_add(other.output_allocations);
        self.output_reuses = self.output_reuses.saturating_add(other.output_reuses);
        self.storage_regrowths = self.storage_regrowths.saturating_add(other.storage_regrowths);
        self.vectorized_calls = self.vectorized_calls.saturating_add(other.vectorized_calls);
        self.fallback_calls = self.fallback_calls.saturating_add(other.fallback_calls);
        self.container_rebuilds = self.container_rebuilds.saturating_add(other.container_rebuilds);
        self.container_reuses = self.container_reuses.saturating_add(other.container_reuses);
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NodeTiming {
    pub op: String,
    pub calls: u64,
    pub total: Duration,
}

/// Per-node accumulated time, indexed by node position.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NodeTimings {
    nodes: Vec<NodeTiming>,
}

impl NodeTimings {
    pub fn new<'a>(ops: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            nodes: ops
                .into_iter()
                .map(|op| NodeTiming {
                    op: op.to_string(),
                    ..NodeTiming::default()
                })
                .collect(),
        }
    }

    pub fn record(&mut self, node: usize, elapsed: Duration) {
        if let Some(entry) = self.nodes.get_mut(node) {
            entry.calls += 1;
            entry.total += elapsed;
        }
    }

    pub fn get(&self, node: usize) -> Option<&NodeTiming> {
        self.nodes.get(node)
    }

    pub fn total(&self) -> Duration {
        self.nodes.iter().map(|n| n.total).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &NodeTiming)> {
        self.nodes.iter().enumerate()
    }
}

impl fmt::Display for NodeTimings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.total().as_secs_f64().max(f64::MIN_POSITIVE);
        writeln!(f, "{:>5}  {:<48} {:>8} {:>12} {:>7}", "node", "op", "calls", "total_ms", "%")?;
        let mut rows: Vec<_> = self.iter().filter(|(_, t)| t.calls > 0).collect();
        rows.sort_by(|a, b| b.1.total.cmp(&a.1.total));
        for (index, timing) in rows {
            let secs = timing.total.as_secs_f64();
            writeln!(
                f,
                "{:>5}  {:<48} {:>8} {:>12.3} {:>6.1}%",
                index,
                timing.op,
                timing.calls,
                secs * 1e3,
                100.0 * secs / total
            )?;
        }
        Ok(())
    }
}

/// Measures one node call when enabled.
pub(crate) struct NodeScope {
    start: Option<Instant>,
}

impl NodeScope {
    pub(crate) fn start(enabled: bool) -> Self {
        Self {
            start: enabled.then(Instant::now),
        }
    }

    pub(crate) fn finish(self, timings: Option<&mut NodeTimings>, node: usize) {
        if let (Some(start), Some(timings)) = (self.start, timings) {
            timings.record(node, start.elapsed());
        }
    }
}
