use super::registry::OperatorRegistry;
use super::schema::Overload;
use crate::config::RuntimeOptions;
use crate::error::Result;
use crate::graph::{NodeView, Producer};
use crate::value::Value;

/// What a kernel factory may inspect while specializing one node.
#[derive(Clone, Copy)]
pub struct KernelContext<'a> {
    pub node: NodeView<'a>,
    pub overload_index: usize,
    pub overload: &'static Overload,
    pub registry: &'a OperatorRegistry,
    pub options: &'a RuntimeOptions,
}

impl<'a> KernelContext<'a> {
    /// Value of input `i` when it is a graph constant; the declared default when omitted.
    pub fn constant(&self, i: usize) -> Result<Option<Value>> {
        if i >= self.node.arity() {
            return Ok(self
                .overload
                .args
                .get(i)
                .and_then(|arg| arg.default)
                .map(|d| d.to_value()));
        }
        self.node.constant_input(i)
    }

    /// Whether a tensor list/tuple output may be refreshed in place across runs.
    ///
    /// Requires a tensor container output and every input produced directly by a
    /// node on the specialized path. Graph inputs and constants are rebound by the
    /// caller and therefore do not qualify.
    pub fn container_reuse_eligible(&self) -> bool {
        if self.node.outputs().len() != 1 || !self.node.output_type(0).is_tensor_container() {
            return false;
        }
        let graph = self.node.graph();
        (0..self.node.arity()).all(|i| match self.node.input_producer(i) {
            Producer::Node { node, .. } => {
                self.options.enable_out_variant && self.registry.has(graph.node(node).op())
            }
            Producer::GraphInput(_) | Producer::Constant(_) => false,
        })
    }
}
