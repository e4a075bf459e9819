//! Chooses how each graph node executes: specialized kernel, native op, or not at all.

use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::config::RuntimeOptions;
use crate::error::{Error, Result};
use crate::graph::NodeView;
use crate::ops::{Kernel, NativeOp, OperatorRegistry, Overload};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchPath {
    /// Registry kernel writing into a reused output slot.
    Specialized,
    /// Closed structural operation producing fresh values each call.
    Native,
}

impl fmt::Display for DispatchPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DispatchPath::Specialized => "specialized",
            DispatchPath::Native => "native",
        })
    }
}

/// Outcome of resolving one node.
#[derive(Debug)]
pub struct Resolution {
    pub path: DispatchPath,
    pub kernel: Kernel,
    /// Overload whose defaults fill omitted trailing arguments.
    pub overload: &'static Overload,
}

pub fn can_run_out_of_place(
    node: NodeView<'_>,
    registry: &OperatorRegistry,
    options: &RuntimeOptions,
) -> bool {
    options.enable_out_variant && registry.has(node.op())
}

/// Specialized path first, then the native switch; anything else is rejected.
pub fn resolve(
    node: NodeView<'_>,
    registry: &OperatorRegistry,
    options: &RuntimeOptions,
) -> Result<Resolution> {
    let resolution = if can_run_out_of_place(node, registry, options) {
        let schema = registry
            .schema(node.op())
            .ok_or_else(|| Error::UnregisteredOperation {
                op: node.op().to_string(),
            })?;
        let (_, overload) = schema.select(node.arity())?;
        Resolution {
            path: DispatchPath::Specialized,
            kernel: registry.create(node, options)?,
            overload,
        }
    } else if let Some(native) = NativeOp::from_node(node) {
        Resolution {
            path: DispatchPath::Native,
            overload: native.overload(node)?,
            kernel: native.kernel(),
        }
    } else {
        return Err(Error::UnregisteredOperation {
            op: node.op().to_string(),
        });
    };
    debug!(
        node = node.index(),
        op = node.op(),
        path = %resolution.path,
        "resolved node"
    );
    Ok(resolution)
}
