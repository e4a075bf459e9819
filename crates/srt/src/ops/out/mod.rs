//! Out-variant kernels: each writes into its node's own output slot, truncating
//! and regrowing the held tensor instead of allocating a new one per call.

/// Adds a built-in operation to [`crate::ops::registry::BUILTIN_OPS`].
///
/// The `stateless` form wraps a plain kernel function that needs nothing from
/// specialization.
macro_rules! register_op {
    ($name:ident, $schema:expr, stateless $kernel:path) => {
        register_op!($name, $schema, {
            fn factory(
                _: &$crate::ops::KernelContext<'_>,
            ) -> $crate::error::Result<$crate::ops::Kernel> {
                Ok($crate::ops::Kernel::generic($kernel))
            }
            factory
        });
    };
    ($name:ident, $schema:expr, $factory:expr) => {
        #[linkme::distributed_slice($crate::ops::registry::BUILTIN_OPS)]
        static $name: $crate::ops::registry::OpRegistration =
            $crate::ops::registry::OpRegistration {
                schema: &$schema,
                factory: $factory,
            };
    };
}

mod activation;
mod arithmetic;
mod containers;
mod embedding;
mod normalization;
mod reduction;
mod shape;
