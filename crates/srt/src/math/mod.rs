//! Numeric routines invoked by kernels.
//!
//! Every routine writes into a caller-provided `out` tensor and regrows it through
//! [`Tensor::ensure_shape`], so a truncated output keeps its storage identity.

pub mod elementwise;
pub mod embedding;
pub mod linalg;
pub mod normalization;
pub mod reduce;
pub mod shape;

pub use elementwise::{
    add, clamp, clamp_min, div, leaky_relu, logit, mul, nan_to_num, pow, relu, sigmoid, sub,
    tanh, RoundingMode,
};
pub use embedding::{
    embedding_bag, embedding_bag_byte_rowwise_offsets, EmbeddingBagMode, EmbeddingBagOptions,
    EmbeddingBagOutputs,
};
pub use linalg::{addmm, bmm};
pub use normalization::layer_norm;
pub use reduce::{argmin, norm, sum};
pub use shape::{cat, copy, flatten_copy, index, narrow_copy, reshape_copy, stack};

use crate::tensor::{Category, DType, Tensor};

fn promotion_priority(t: &Tensor) -> u8 {
    if t.is_wrapped_number() {
        0
    } else if t.dim() == 0 {
        1
    } else {
        2
    }
}

fn default_dtype(category: Category) -> DType {
    match category {
        Category::Bool => DType::Bool,
        Category::Integral => DType::I64,
        Category::Floating => DType::F32,
    }
}

/// Result dtype of a binary op.
///
/// Dimensioned tensors outrank 0-dim tensors, which outrank wrapped scalars. A
/// lower-ranked operand only changes the result when it is of a higher category,
/// in which case wrapped scalars contribute the default dtype of their category.
pub fn result_type(a: &Tensor, b: &Tensor) -> DType {
    let (pa, pb) = (promotion_priority(a), promotion_priority(b));
    if pa == pb {
        return a.dtype().promote(b.dtype());
    }
    let (high, low) = if pa > pb { (a, b) } else { (b, a) };
    if low.dtype().category() > high.dtype().category() {
        if low.is_wrapped_number() {
            default_dtype(low.dtype().category())
        } else {
            low.dtype()
        }
    } else {
        high.dtype()
    }
}
