//! Broadcasting binary arithmetic and unary elementwise maps.

use super::result_type;
use crate::error::{Error, Result};
use crate::tensor::layout::{broadcast_shapes, broadcast_strides, contiguous_strides, StridedOffsets};
use crate::tensor::{DType, Element, Scalar, Tensor};
use crate::with_element_type;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundingMode {
    Trunc,
    Floor,
}

impl RoundingMode {
    pub fn parse(mode: &str) -> Result<Self> {
        match mode {
            "trunc" => Ok(RoundingMode::Trunc),
            "floor" => Ok(RoundingMode::Floor),
            other => Err(Error::invalid(format!(
                "div expected rounding_mode to be one of None, 'trunc', or 'floor' but found '{other}'"
            ))),
        }
    }
}

fn binary_map(
    out: &mut Tensor,
    a: &Tensor,
    b: &Tensor,
    dtype: DType,
    float: impl Fn(f64, f64) -> f64,
    int: impl Fn(i64, i64) -> Result<i64>,
) -> Result<()> {
    let sizes = broadcast_shapes(a.sizes(), b.sizes())?;
    out.ensure_shape(&sizes, dtype)?;
    let a_strides = broadcast_strides(a.sizes(), &contiguous_strides(a.sizes()), &sizes)?;
    let b_strides = broadcast_strides(b.sizes(), &contiguous_strides(b.sizes()), &sizes)?;
    with_element_type!(dtype, |T| {
        let floating = T::DTYPE.is_floating();
        a.with_slice::<T, _>(|av| {
            b.with_slice::<T, _>(|bv| {
                out.with_slice_mut::<T, _>(|ov| {
                    let offsets = StridedOffsets::new(&sizes, [&a_strides, &b_strides], [0, 0]);
                    for (o, [ia, ib]) in ov.iter_mut().zip(offsets) {
                        let (x, y) = (av[ia], bv[ib]);
                        *o = if floating {
                            T::from_f64(float(x.to_f64(), y.to_f64()))
                        } else {
                            T::from_i64(int(x.to_i64(), y.to_i64())?)
                        };
                    }
                    Ok(())
                })
            })
        })
    })
}

fn unary_map(
    out: &mut Tensor,
    a: &Tensor,
    dtype: DType,
    float: impl Fn(f64) -> f64,
    int: impl Fn(i64) -> i64,
) -> Result<()> {
    out.ensure_shape(a.sizes(), dtype)?;
    with_element_type!(dtype, |T| {
        let floating = T::DTYPE.is_floating();
        a.with_slice::<T, _>(|av| {
            out.with_slice_mut::<T, _>(|ov| {
                for (o, &x) in ov.iter_mut().zip(av) {
                    *o = if floating {
                        T::from_f64(float(x.to_f64()))
                    } else {
                        T::from_i64(int(x.to_i64()))
                    };
                }
                Ok(())
            })
        })
    })
}

fn float_map(out: &mut Tensor, a: &Tensor, f: impl Fn(f64) -> f64) -> Result<()> {
    unary_map(out, a, a.dtype().to_floating(), f, |x| x)
}

/// `out = a + alpha * b`
pub fn add(out: &mut Tensor, a: &Tensor, b: &Tensor, alpha: Scalar) -> Result<()> {
    let dtype = result_type(a, b);
    check_alpha(dtype, alpha)?;
    let (fa, ia) = (alpha.to_f64(), alpha.to_i64());
    binary_map(out, a, b, dtype, |x, y| x + fa * y, |x, y| {
        Ok(x.wrapping_add(ia.wrapping_mul(y)))
    })
}

/// `out = a - alpha * b`
pub fn sub(out: &mut Tensor, a: &Tensor, b: &Tensor, alpha: Scalar) -> Result<()> {
    let dtype = result_type(a, b);
    if dtype == DType::Bool {
        return Err(Error::invalid(
            "subtraction with two bool tensors is not supported",
        ));
    }
    check_alpha(dtype, alpha)?;
    let (fa, ia) = (alpha.to_f64(), alpha.to_i64());
    binary_map(out, a, b, dtype, |x, y| x - fa * y, |x, y| {
        Ok(x.wrapping_sub(ia.wrapping_mul(y)))
    })
}

fn check_alpha(dtype: DType, alpha: Scalar) -> Result<()> {
    if !dtype.is_floating() && alpha.is_floating() {
        return Err(Error::invalid(format!(
            "for integral input tensors, argument alpha must not be a floating point number ({dtype})"
        )));
    }
    Ok(())
}

pub fn mul(out: &mut Tensor, a: &Tensor, b: &Tensor) -> Result<()> {
    let dtype = result_type(a, b);
    binary_map(out, a, b, dtype, |x, y| x * y, |x, y| Ok(x.wrapping_mul(y)))
}

/// True division without a rounding mode always produces a floating result.
pub fn div(out: &mut Tensor, a: &Tensor, b: &Tensor, mode: Option<RoundingMode>) -> Result<()> {
    let common = result_type(a, b);
    match mode {
        None => binary_map(out, a, b, common.to_floating(), |x, y| x / y, |_, _| {
            Err(Error::invalid("true division never runs on integers"))
        }),
        Some(RoundingMode::Trunc) => {
            binary_map(out, a, b, common, |x, y| (x / y).trunc(), |x, y| {
                if y == 0 {
                    return Err(Error::invalid("ZeroDivisionError"));
                }
                Ok(x.wrapping_div(y))
            })
        }
        Some(RoundingMode::Floor) => {
            binary_map(out, a, b, common, |x, y| (x / y).floor(), |x, y| {
                if y == 0 {
                    return Err(Error::invalid("ZeroDivisionError"));
                }
                let q = x.wrapping_div(y);
                if x.wrapping_rem(y) != 0 && ((x < 0) != (y < 0)) {
                    Ok(q.wrapping_sub(1))
                } else {
                    Ok(q)
                }
            })
        }
    }
}

pub fn pow(out: &mut Tensor, base: &Tensor, exponent: &Tensor) -> Result<()> {
    let dtype = result_type(base, exponent);
    binary_map(out, base, exponent, dtype, f64::powf, |x, y| {
        if y < 0 {
            return match x {
                1 => Ok(1),
                -1 => Ok(if y % 2 == 0 { 1 } else { -1 }),
                _ => Err(Error::invalid(
                    "integers to negative integer powers are not allowed",
                )),
            };
        }
        Ok(x.wrapping_pow(u32::try_from(y).unwrap_or(u32::MAX)))
    })
}

pub fn relu(out: &mut Tensor, a: &Tensor) -> Result<()> {
    if a.dtype() == DType::Bool {
        return Err(Error::dtype("relu", DType::Bool));
    }
    unary_map(
        out,
        a,
        a.dtype(),
        |x| if x < 0.0 { 0.0 } else { x },
        |x| x.max(0),
    )
}

pub fn tanh(out: &mut Tensor, a: &Tensor) -> Result<()> {
    float_map(out, a, f64::tanh)
}

pub fn sigmoid(out: &mut Tensor, a: &Tensor) -> Result<()> {
    float_map(out, a, |x| 1.0 / (1.0 + (-x).exp()))
}

/// `log(z / (1 - z))` with `z` optionally clamped to `[eps, 1 - eps]`.
pub fn logit(out: &mut Tensor, a: &Tensor, eps: Option<f64>) -> Result<()> {
    match eps {
        Some(eps) => float_map(out, a, |x| {
            let z = if x.is_nan() { x } else { x.clamp(eps, 1.0 - eps) };
            (z / (1.0 - z)).ln()
        }),
        None => float_map(out, a, |x| (x / (1.0 - x)).ln()),
    }
}

pub fn leaky_relu(out: &mut Tensor, a: &Tensor, negative_slope: f64) -> Result<()> {
    if !a.dtype().is_floating() {
        return Err(Error::dtype("leaky_relu", a.dtype()));
    }
    float_map(out, a, |x| if x > 0.0 { x } else { x * negative_slope })
}

/// Clamps into `[min, max]`; either bound may be absent but not both. NaN propagates.
pub fn clamp(out: &mut Tensor, a: &Tensor, min: Option<Scalar>, max: Option<Scalar>) -> Result<()> {
    if min.is_none() && max.is_none() {
        return Err(Error::invalid(
            "at least one of 'min' or 'max' must not be None",
        ));
    }
    if a.dtype() == DType::Bool {
        return Err(Error::dtype("clamp", DType::Bool));
    }
    let (fmin, fmax) = (min.map(Scalar::to_f64), max.map(Scalar::to_f64));
    let (imin, imax) = (min.map(Scalar::to_i64), max.map(Scalar::to_i64));
    unary_map(
        out,
        a,
        a.dtype(),
        |x| {
            if x.is_nan() {
                return x;
            }
            let mut v = x;
            if let Some(lo) = fmin {
                v = if v < lo { lo } else { v };
            }
            if let Some(hi) = fmax {
                v = if v > hi { hi } else { v };
            }
            v
        },
        |x| {
            let mut v = x;
            if let Some(lo) = imin {
                v = v.max(lo);
            }
            if let Some(hi) = imax {
                v = v.min(hi);
            }
            v
        },
    )
}

pub fn clamp_min(out: &mut Tensor, a: &Tensor, min: Scalar) -> Result<()> {
    clamp(out, a, Some(min), None)
}

/// Replaces NaN and infinities; infinities default to the dtype's finite extremes.
pub fn nan_to_num(
    out: &mut Tensor,
    a: &Tensor,
    nan: Option<f64>,
    posinf: Option<f64>,
    neginf: Option<f64>,
) -> Result<()> {
    let (max, min) = match a.dtype() {
        DType::F32 => (f32::MAX as f64, f32::MIN as f64),
        _ => (f64::MAX, f64::MIN),
    };
    let nan = nan.unwrap_or(0.0);
    let posinf = posinf.unwrap_or(max);
    let neginf = neginf.unwrap_or(min);
    unary_map(
        out,
        a,
        a.dtype(),
        |x| {
            if x.is_nan() {
                nan
            } else if x == f64::INFINITY {
                posinf
            } else if x == f64::NEG_INFINITY {
                neginf
            } else {
                x
            }
        },
        |x| x,
    )
}
