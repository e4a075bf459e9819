//! Contract between vectorized kernels and an external code generator.
//!
//! The engine never generates code itself: a [`CodegenBackend`] turns a [`Formula`]
//! into a [`CompiledRoutine`] once per kernel instance, during module setup.

pub mod formula;

use std::fmt;
use std::sync::Arc;

pub use formula::{BinaryFn, CmpOp, Expr, Formula, UnaryFn};

use crate::error::Result;

/// Default lane count, sized for 512-bit registers of `f32`.
pub const DEFAULT_VECTOR_WIDTH: usize = 16;

/// Lane count for formulas dominated by log/divide, which issue on a single port.
pub const NARROW_VECTOR_WIDTH: usize = 8;

type RoutineFn = dyn Fn(&mut [f32], &[f32]) + Send + Sync;

/// Callable produced by a backend: `out[i] = formula(input[i])` for every `i`.
///
/// The routine owns tail handling; callers pass slices of any equal length.
#[derive(Clone)]
pub struct CompiledRoutine {
    name: &'static str,
    width: usize,
    func: Arc<RoutineFn>,
}

impl CompiledRoutine {
    pub fn new(
        name: &'static str,
        width: usize,
        func: impl Fn(&mut [f32], &[f32]) + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            width,
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Runs the routine over `input`; `out` must have the same length.
    pub fn call(&self, out: &mut [f32], input: &[f32]) {
        debug_assert_eq!(out.len(), input.len());
        (self.func)(out, input)
    }
}

impl fmt::Debug for CompiledRoutine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledRoutine")
            .field("name", &self.name)
            .field("width", &self.width)
            .finish()
    }
}

/// Opaque `compile(formula, vector_width) -> callable` service.
pub trait CodegenBackend: Send + Sync {
    fn name(&self) -> &str;

    fn compile(&self, formula: &Formula, vector_width: usize) -> Result<CompiledRoutine>;
}
