use smallvec::SmallVec;
use tracing::{debug, info};

use super::processed_node::ProcessedNode;
use crate::codegen::CodegenBackend;
use crate::config::RuntimeOptions;
use crate::dispatch::{self, DispatchPath};
use crate::error::{Error, Result};
use crate::graph::{Graph, ValueId};
use crate::ops::{Frame, OperatorRegistry};
use crate::profiling::{NodeScope, NodeTimings, RunStats};
use crate::value::{Slot, Value};

/// One instantiated graph.
///
/// Every node is resolved and specialized once in [`StaticModule::new`]. Each
/// value of the graph owns one arena slot; output slots keep their tensors
/// between runs so specialized kernels can regrow them in place.
pub struct StaticModule {
    graph: Graph,
    options: RuntimeOptions,
    nodes: Vec<ProcessedNode>,
    slots: Vec<Slot>,
    stats: RunStats,
    timings: Option<NodeTimings>,
}

impl StaticModule {
    /// Resolves every node, writes constants, and compiles vectorized kernels.
    ///
    /// Compilation happens here, single-threaded, so no kernel ever compiles on
    /// first use.
    pub fn new(
        graph: Graph,
        registry: &OperatorRegistry,
        options: RuntimeOptions,
        codegen: Option<&dyn CodegenBackend>,
    ) -> Result<Self> {
        options.validate()?;
        let options = options.resolved();

        let mut nodes = Vec::with_capacity(graph.nodes().len());
        for index in 0..graph.nodes().len() {
            let node = graph.node(index);
            let resolution = dispatch::resolve(node, registry, &options)
                .map_err(|err| err.at_node(index, node.op()))?;
            nodes.push(ProcessedNode::new(node, resolution));
        }

        let mut slots = vec![Slot::new(); graph.values().len()];
        for constant in graph.constants() {
            slots[constant.value].write(constant.literal.to_value()?);
        }

        let mut vectorized = 0usize;
        for node in &mut nodes {
            if node.kernel_mut().compile(codegen, &options) {
                vectorized += 1;
            }
        }

        let specialized = nodes
            .iter()
            .filter(|n| n.path() == DispatchPath::Specialized)
            .count();
        info!(
            nodes = nodes.len(),
            specialized,
            native = nodes.len() - specialized,
            vectorized,
            values = slots.len(),
            "instantiated static module"
        );

        let timings = options
            .profile_nodes
            .then(|| NodeTimings::new(nodes.iter().map(ProcessedNode::op)));
        Ok(Self {
            graph,
            options,
            nodes,
            slots,
            stats: RunStats::default(),
            timings,
        })
    }

    /// Binds `inputs`, executes every node in graph order, and returns the graph
    /// outputs. Returned tensors alias module-owned storage that the next run
    /// overwrites.
    pub fn run(&mut self, inputs: Vec<Value>) -> Result<Vec<Value>> {
        let expected = self.graph.inputs().len();
        if inputs.len() != expected {
            return Err(Error::invalid(format!(
                "graph takes {expected} inputs, got {}",
                inputs.len()
            )));
        }
        for (&id, value) in self.graph.inputs().iter().zip(inputs) {
            self.slots[id].write(value);
        }

        let result = self.execute();
        for &id in self.graph.inputs() {
            self.slots[id].clear();
        }
        if result.is_ok() {
            self.stats.runs += 1;
        }
        result
    }

    fn execute(&mut self) -> Result<Vec<Value>> {
        for node in &mut self.nodes {
            let mut outputs: SmallVec<[Slot; 4]> = node
                .outputs()
                .iter()
                .map(|&id| std::mem::take(&mut self.slots[id]))
                .collect();
            let scope = NodeScope::start(self.timings.is_some());
            let result = {
                let mut frame = Frame::new(
                    &self.slots,
                    node.inputs(),
                    &mut outputs,
                    Some(node.overload()),
                    &mut self.stats,
                    node.index(),
                    node.op(),
                );
                node.kernel().call(&mut frame)
            };
            scope.finish(self.timings.as_mut(), node.index());
            for (&id, slot) in node.outputs().iter().zip(outputs) {
                self.slots[id] = slot;
            }
            if let Err(err) = result {
                debug!(node = node.index(), op = node.op(), error = %err, "run aborted");
                return Err(err.at_node(node.index(), node.op()));
            }
            if node.path() == DispatchPath::Specialized {
                node.track_regrowths(&self.slots, &mut self.stats);
            }
        }

        self.graph
            .outputs()
            .iter()
            .map(|&id| self.slots[id].read().cloned())
            .collect()
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn options(&self) -> &RuntimeOptions {
        &self.options
    }

    pub fn nodes(&self) -> &[ProcessedNode] {
        &self.nodes
    }

    pub fn node(&self, index: usize) -> Option<&ProcessedNode> {
        self.nodes.get(index)
    }

    /// Arena slot of `value`, as left by the last run.
    pub fn output_slot(&self, value: ValueId) -> Option<&Slot> {
        self.slots.get(value)
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = RunStats::default();
    }

    pub fn timings(&self) -> Option<&NodeTimings> {
        self.timings.as_ref()
    }

    /// Number of nodes resolved through each path.
    pub fn path_counts(&self) -> (usize, usize) {
        let specialized = self
            .nodes
            .iter()
            .filter(|n| n.path() == DispatchPath::Specialized)
            .count();
        (specialized, self.nodes.len() - specialized)
    }
}

impl std::fmt::Debug for StaticModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticModule")
            .field("nodes", &self.nodes)
            .field("values", &self.slots.len())
            .field("stats", &self.stats)
            .finish()
    }
}
