//! Enumerates the scalar element types supported by host tensors.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Logical dtype identifier shared by tensors, values and graph constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    /// 8-bit boolean; stored as `bool`.
    Bool,
    /// Unsigned byte, used by quantized weight tables.
    U8,
    /// 32-bit signed integer.
    I32,
    /// 64-bit signed integer; default dtype for indices and integral reductions.
    I64,
    /// 32-bit IEEE-754 floating point; the only dtype eligible for vectorized kernels.
    F32,
    /// 64-bit IEEE-754 floating point.
    F64,
}

/// Coarse dtype family used when a wrapped scalar participates in promotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Category {
    Bool,
    Integral,
    Floating,
}

impl DType {
    pub fn is_floating(self) -> bool {
        matches!(self, DType::F32 | DType::F64)
    }

    pub fn category(self) -> Category {
        match self {
            DType::Bool => Category::Bool,
            DType::U8 | DType::I32 | DType::I64 => Category::Integral,
            DType::F32 | DType::F64 => Category::Floating,
        }
    }

    fn rank(self) -> u8 {
        match self {
            DType::Bool => 0,
            DType::U8 => 1,
            DType::I32 => 2,
            DType::I64 => 3,
            DType::F32 => 4,
            DType::F64 => 5,
        }
    }

    /// Smallest dtype able to represent both operands.
    pub fn promote(self, other: DType) -> DType {
        if self.rank() >= other.rank() {
            self
        } else {
            other
        }
    }

    /// Dtype produced by floating-point-only routines applied to `self`.
    pub fn to_floating(self) -> DType {
        if self.is_floating() {
            self
        } else {
            DType::F32
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DType::Bool => "bool",
            DType::U8 => "u8",
            DType::I32 => "i32",
            DType::I64 => "i64",
            DType::F32 => "f32",
            DType::F64 => "f64",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
