//! Operator registry, kernel model and the built-in operator set.

mod context;
mod frame;
mod kernel;
pub mod native;
mod out;
pub mod registry;
pub mod schema;

pub use context::KernelContext;
pub use frame::Frame;
pub use kernel::{Kernel, KernelFn, VectorizedKernel, VectorizedState};
pub use native::NativeOp;
pub use registry::{KernelFactory, OpRegistration, OperatorRegistry, BUILTIN_OPS};
pub use schema::{ArgDefault, ArgKind, ArgSpec, OpSchema, Overload};
