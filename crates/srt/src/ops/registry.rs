//! Explicit operator registry: op name to schema plus kernel factory.
//!
//! Built-in kernels announce themselves through the [`BUILTIN_OPS`] distributed
//! slice; [`OperatorRegistry::with_builtins`] collects them into a value that is
//! populated once during setup and then only read.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use super::context::KernelContext;
use super::kernel::Kernel;
use super::schema::OpSchema;
use crate::config::RuntimeOptions;
use crate::error::{Error, Result};
use crate::graph::NodeView;

/// Builds one kernel instance from a node's static attributes.
pub type KernelFactory = Arc<dyn Fn(&KernelContext<'_>) -> Result<Kernel> + Send + Sync>;

/// Static registration record for a built-in operation.
pub struct OpRegistration {
    pub schema: &'static OpSchema,
    pub factory: fn(&KernelContext<'_>) -> Result<Kernel>,
}

#[linkme::distributed_slice]
pub static BUILTIN_OPS: [OpRegistration] = [..];

#[derive(Clone)]
struct Entry {
    schema: &'static OpSchema,
    factory: KernelFactory,
}

#[derive(Clone, Default)]
pub struct OperatorRegistry {
    entries: HashMap<String, Entry>,
}

impl OperatorRegistry {
    /// Empty registry; only native operations resolve against it.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in out-variant kernel linked into the binary.
    pub fn with_builtins() -> Result<Self> {
        let mut registry = Self::new();
        for registration in BUILTIN_OPS.iter() {
            let factory = registration.factory;
            registry.register(registration.schema, move |cx: &KernelContext<'_>| factory(cx))?;
        }
        debug!(ops = registry.len(), "collected built-in operators");
        Ok(registry)
    }

    /// Inserts `schema.name -> factory`; a second registration under the same name fails.
    pub fn register(
        &mut self,
        schema: &'static OpSchema,
        factory: impl Fn(&KernelContext<'_>) -> Result<Kernel> + Send + Sync + 'static,
    ) -> Result<()> {
        if self.entries.contains_key(schema.name) {
            return Err(Error::DuplicateRegistration {
                op: schema.name.to_string(),
            });
        }
        self.entries.insert(
            schema.name.to_string(),
            Entry {
                schema,
                factory: Arc::new(factory),
            },
        );
        Ok(())
    }

    pub fn has(&self, op: &str) -> bool {
        self.entries.contains_key(op)
    }

    pub fn schema(&self, op: &str) -> Option<&'static OpSchema> {
        self.entries.get(op).map(|e| e.schema)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered operation names, sorted.
    pub fn list_ops(&self) -> Vec<&str> {
        let mut ops: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        ops.sort_unstable();
        ops
    }

    /// Specializes a new kernel for `node`.
    ///
    /// Arity, output count and the kinds of constant inputs are checked here,
    /// once, against the schema.
    pub fn create(&self, node: NodeView<'_>, options: &RuntimeOptions) -> Result<Kernel> {
        let op = node.op();
        let entry = self
            .entries
            .get(op)
            .ok_or_else(|| Error::UnregisteredOperation { op: op.to_string() })?;
        let (overload_index, overload) = entry.schema.select(node.arity())?;
        if node.outputs().len() != overload.outputs {
            return Err(Error::graph(format!(
                "`{op}` produces {} outputs, node declares {}",
                overload.outputs,
                node.outputs().len()
            )));
        }
        overload.check_constants(node)?;
        let cx = KernelContext {
            node,
            overload_index,
            overload,
            registry: self,
            options,
        };
        (entry.factory)(&cx)
    }
}

impl fmt::Debug for OperatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperatorRegistry")
            .field("ops", &self.list_ops())
            .finish()
    }
}
