//! Kernels: the callable half of a processed node.

use std::fmt;

use tracing::{debug, trace, warn};

use super::frame::Frame;
use crate::codegen::{CodegenBackend, CompiledRoutine, Formula};
use crate::config::RuntimeOptions;
use crate::error::Result;
use crate::tensor::DType;

pub type KernelFn = Box<dyn Fn(&mut Frame<'_>) -> Result<()> + Send + Sync>;

/// Specialized, ready-to-run implementation of one node.
pub enum Kernel {
    Generic(KernelFn),
    Vectorized(VectorizedKernel),
}

impl Kernel {
    pub fn generic(f: impl Fn(&mut Frame<'_>) -> Result<()> + Send + Sync + 'static) -> Self {
        Kernel::Generic(Box::new(f))
    }

    pub fn call(&self, frame: &mut Frame<'_>) -> Result<()> {
        match self {
            Kernel::Generic(f) => f(frame),
            Kernel::Vectorized(kernel) => kernel.call(frame),
        }
    }

    /// Forces the codegen transition of a vectorized kernel; returns whether a
    /// compiled routine is now installed.
    pub fn compile(&mut self, backend: Option<&dyn CodegenBackend>, options: &RuntimeOptions) -> bool {
        match self {
            Kernel::Generic(_) => false,
            Kernel::Vectorized(kernel) => {
                kernel.compile(backend, options);
                kernel.is_compiled()
            }
        }
    }

    pub fn vectorized(&self) -> Option<&VectorizedKernel> {
        match self {
            Kernel::Vectorized(kernel) => Some(kernel),
            Kernel::Generic(_) => None,
        }
    }
}

impl fmt::Debug for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kernel::Generic(_) => f.write_str("Generic"),
            Kernel::Vectorized(kernel) => f
                .debug_struct("Vectorized")
                .field("formula", &kernel.formula.name)
                .field("width", &kernel.width)
                .field("state", &kernel.state)
                .finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum VectorizedState {
    Uninitialized,
    Compiled(CompiledRoutine),
    /// Vectorization is disabled or the backend refused the formula.
    Unavailable,
}

/// Elementwise kernel with an optional compiled fast path.
///
/// The compiled routine only ever serves contiguous `f32` inputs; everything
/// else, and every call before [`VectorizedKernel::compile`], runs `fallback`.
pub struct VectorizedKernel {
    formula: Formula,
    width: usize,
    state: VectorizedState,
    fallback: KernelFn,
}

impl VectorizedKernel {
    pub fn new(
        formula: Formula,
        width: usize,
        fallback: impl Fn(&mut Frame<'_>) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            formula,
            width,
            state: VectorizedState::Uninitialized,
            fallback: Box::new(fallback),
        }
    }

    pub fn formula(&self) -> &Formula {
        &self.formula
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn state(&self) -> &VectorizedState {
        &self.state
    }

    pub fn is_compiled(&self) -> bool {
        matches!(self.state, VectorizedState::Compiled(_))
    }

    /// `Uninitialized -> Compiled | Unavailable`. Later calls return the settled state.
    pub fn compile(
        &mut self,
        backend: Option<&dyn CodegenBackend>,
        options: &RuntimeOptions,
    ) -> &VectorizedState {
        if !matches!(self.state, VectorizedState::Uninitialized) {
            return &self.state;
        }
        let width = options.vector_width.unwrap_or(self.width);
        self.state = match backend {
            Some(backend) if options.vectorize => match backend.compile(&self.formula, width) {
                Ok(routine) => {
                    debug!(
                        formula = self.formula.name,
                        backend = backend.name(),
                        width = routine.width(),
                        "compiled vectorized routine"
                    );
                    self.width = routine.width();
                    VectorizedState::Compiled(routine)
                }
                Err(err) => {
                    warn!(
                        formula = self.formula.name,
                        backend = backend.name(),
                        error = %err,
                        "codegen backend refused formula; using generic kernel"
                    );
                    VectorizedState::Unavailable
                }
            },
            _ => VectorizedState::Unavailable,
        };
        &self.state
    }

    pub fn call(&self, frame: &mut Frame<'_>) -> Result<()> {
        let VectorizedState::Compiled(routine) = &self.state else {
            frame.stats().fallback_calls += 1;
            return (self.fallback)(frame);
        };
        let input = frame.tensor(0)?;
        if input.dtype() != DType::F32 || !input.is_contiguous() {
            trace!(
                node = frame.node(),
                formula = self.formula.name,
                dtype = %input.dtype(),
                contiguous = input.is_contiguous(),
                "capability check failed; generic path"
            );
            frame.stats().fallback_calls += 1;
            return (self.fallback)(frame);
        }

        let out = frame.out_tensor(0, DType::F32)?;
        out.ensure_shape(input.sizes(), DType::F32)?;
        input.with_slice::<f32, _>(|src| {
            out.with_slice_mut::<f32, _>(|dst| {
                routine.call(dst, src);
                Ok(())
            })
        })?;
        trace!(node = frame.node(), formula = self.formula.name, "vectorized path");
        frame.stats().vectorized_calls += 1;
        Ok(())
    }
}
