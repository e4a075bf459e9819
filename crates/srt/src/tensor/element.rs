//! Defines the scalar element trait implemented by every storable dtype.

use std::fmt::Debug;

use super::dtype::DType;
use super::storage::Buffer;

/// Trait tying a Rust scalar type to its [`DType`] and [`Buffer`] variant.
///
/// Math routines are monomorphized over `Element` and perform arithmetic through the
/// widened `f64`/`i64` conversions, which keeps a single implementation per routine.
pub trait Element: Copy + Default + PartialEq + PartialOrd + Debug + Send + Sync + 'static {
    const DTYPE: DType;

    fn from_f64(v: f64) -> Self;
    fn to_f64(self) -> f64;
    fn from_i64(v: i64) -> Self;
    fn to_i64(self) -> i64;

    fn vec(buffer: &Buffer) -> Option<&Vec<Self>>;
    fn vec_mut(buffer: &mut Buffer) -> Option<&mut Vec<Self>>;
    fn into_buffer(data: Vec<Self>) -> Buffer;
}

macro_rules! impl_numeric_element {
    ($ty:ty, $dtype:ident) => {
        impl Element for $ty {
            const DTYPE: DType = DType::$dtype;

            #[inline]
            fn from_f64(v: f64) -> Self {
                v as $ty
            }

            #[inline]
            fn to_f64(self) -> f64 {
                self as f64
            }

            #[inline]
            fn from_i64(v: i64) -> Self {
                v as $ty
            }

            #[inline]
            fn to_i64(self) -> i64 {
                self as i64
            }

            fn vec(buffer: &Buffer) -> Option<&Vec<Self>> {
                match buffer {
                    Buffer::$dtype(data) => Some(data),
                    _ => None,
                }
            }

            fn vec_mut(buffer: &mut Buffer) -> Option<&mut Vec<Self>> {
                match buffer {
                    Buffer::$dtype(data) => Some(data),
                    _ => None,
                }
            }

            fn into_buffer(data: Vec<Self>) -> Buffer {
                Buffer::$dtype(data)
            }
        }
    };
}

impl_numeric_element!(f32, F32);
impl_numeric_element!(f64, F64);
impl_numeric_element!(i32, I32);
impl_numeric_element!(i64, I64);
impl_numeric_element!(u8, U8);

impl Element for bool {
    const DTYPE: DType = DType::Bool;

    #[inline]
    fn from_f64(v: f64) -> Self {
        v != 0.0
    }

    #[inline]
    fn to_f64(self) -> f64 {
        if self {
            1.0
        } else {
            0.0
        }
    }

    #[inline]
    fn from_i64(v: i64) -> Self {
        v != 0
    }

    #[inline]
    fn to_i64(self) -> i64 {
        i64::from(self)
    }

    fn vec(buffer: &Buffer) -> Option<&Vec<Self>> {
        match buffer {
            Buffer::Bool(data) => Some(data),
            _ => None,
        }
    }

    fn vec_mut(buffer: &mut Buffer) -> Option<&mut Vec<Self>> {
        match buffer {
            Buffer::Bool(data) => Some(data),
            _ => None,
        }
    }

    fn into_buffer(data: Vec<Self>) -> Buffer {
        Buffer::Bool(data)
    }
}

/// Expands `$body` once per dtype with `$t` bound to the matching element type.
#[macro_export]
macro_rules! with_element_type {
    ($dtype:expr, |$t:ident| $body:expr) => {
        match $dtype {
            $crate::tensor::DType::F32 => {
                type $t = f32;
                $body
            }
            $crate::tensor::DType::F64 => {
                type $t = f64;
                $body
            }
            $crate::tensor::DType::I32 => {
                type $t = i32;
                $body
            }
            $crate::tensor::DType::I64 => {
                type $t = i64;
                $body
            }
            $crate::tensor::DType::U8 => {
                type $t = u8;
                $body
            }
            $crate::tensor::DType::Bool => {
                type $t = bool;
                $body
            }
        }
    };
}

/// Converts between element types with truncating float-to-integer semantics.
#[inline]
pub fn cast<S: Element, T: Element>(v: S) -> T {
    if S::DTYPE.is_floating() || T::DTYPE.is_floating() {
        T::from_f64(v.to_f64())
    } else {
        T::from_i64(v.to_i64())
    }
}
