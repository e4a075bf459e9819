//! Reductions over all or selected dimensions.

use smallvec::SmallVec;

use crate::error::{Error, Result};
use crate::tensor::layout::{contiguous_strides, numel, wrap_dim, Dims, StridedOffsets};
use crate::tensor::{DType, Element, Scalar, Tensor};
use crate::with_element_type;

/// Maps every input element onto the output element it reduces into.
struct ReductionPlan {
    out_sizes: Dims,
    /// Per input dimension: output stride, or 0 for reduced dimensions.
    map_strides: Dims,
}

impl ReductionPlan {
    /// `dims == None` or an empty list reduces every dimension.
    fn new(sizes: &[usize], dims: Option<&[i64]>, keepdim: bool) -> Result<Self> {
        let rank = sizes.len();
        let mut reduced: SmallVec<[bool; 4]> = SmallVec::from_elem(false, rank);
        match dims {
            Some(dims) if !dims.is_empty() => {
                for &dim in dims {
                    let d = wrap_dim(dim, rank)?;
                    if rank == 0 {
                        continue;
                    }
                    if std::mem::replace(&mut reduced[d], true) {
                        return Err(Error::shape(format!("dim {d} appears multiple times")));
                    }
                }
            }
            _ => reduced.iter_mut().for_each(|r| *r = true),
        }

        let mut out_sizes = Dims::new();
        for (i, &size) in sizes.iter().enumerate() {
            if !reduced[i] {
                out_sizes.push(size);
            } else if keepdim {
                out_sizes.push(1);
            }
        }
        let out_strides = contiguous_strides(&out_sizes);
        let mut map_strides: Dims = SmallVec::from_elem(0, rank);
        let mut cursor = 0;
        for i in 0..rank {
            if !reduced[i] {
                map_strides[i] = out_strides[cursor];
                cursor += 1;
            } else if keepdim {
                cursor += 1;
            }
        }
        Ok(Self {
            out_sizes,
            map_strides,
        })
    }

    fn targets<'a>(&'a self, sizes: &'a [usize]) -> impl Iterator<Item = usize> + 'a {
        StridedOffsets::new(sizes, [&self.map_strides], [0]).map(|[o]| o)
    }
}

/// Sum over `dims`; integral and bool inputs accumulate into `i64` unless `dtype` is given.
pub fn sum(
    out: &mut Tensor,
    a: &Tensor,
    dims: Option<&[i64]>,
    keepdim: bool,
    dtype: Option<DType>,
) -> Result<()> {
    let out_dtype = dtype.unwrap_or(if a.dtype().is_floating() {
        a.dtype()
    } else {
        DType::I64
    });
    let plan = ReductionPlan::new(a.sizes(), dims, keepdim)?;
    out.ensure_shape(&plan.out_sizes, out_dtype)?;
    with_element_type!(out_dtype, |T| {
        let floating = T::DTYPE.is_floating();
        a.with_slice::<T, _>(|av| {
            out.with_slice_mut::<T, _>(|ov| {
                ov.fill(T::default());
                for (&x, o) in av.iter().zip(plan.targets(a.sizes())) {
                    ov[o] = if floating {
                        T::from_f64(ov[o].to_f64() + x.to_f64())
                    } else {
                        T::from_i64(ov[o].to_i64().wrapping_add(x.to_i64()))
                    };
                }
                Ok(())
            })
        })
    })
}

/// Index of the minimum along `dim` (or over the flattened input). NaN counts as minimal.
pub fn argmin(out: &mut Tensor, a: &Tensor, dim: Option<i64>, keepdim: bool) -> Result<()> {
    if a.is_empty() {
        return Err(Error::shape("argmin of an empty tensor"));
    }
    let sizes = a.sizes();
    let (plan, index_of): (ReductionPlan, Box<dyn Fn(usize) -> i64>) = match dim {
        Some(dim) => {
            let d = wrap_dim(dim, a.dim())?;
            let plan = ReductionPlan::new(sizes, Some(&[dim][..]), keepdim)?;
            if a.dim() == 0 {
                (plan, Box::new(|_| 0))
            } else {
                let inner: usize = sizes[d + 1..].iter().product();
                let size = sizes[d];
                (plan, Box::new(move |i| ((i / inner) % size) as i64))
            }
        }
        None => {
            let plan = ReductionPlan::new(sizes, None, keepdim)?;
            (plan, Box::new(|i| i as i64))
        }
    };
    out.ensure_shape(&plan.out_sizes, DType::I64)?;
    let values = a.to_vec::<f64>()?;
    let mut best = vec![f64::INFINITY; numel(&plan.out_sizes)];
    let mut seen = vec![false; best.len()];
    out.with_slice_mut::<i64, _>(|ov| {
        for (i, o) in plan.targets(sizes).enumerate() {
            let x = values[i];
            let better = !seen[o] || (!best[o].is_nan() && (x.is_nan() || x < best[o]));
            if better {
                best[o] = x;
                ov[o] = index_of(i);
                seen[o] = true;
            }
        }
        Ok(())
    })
}

/// Vector p-norm over `dims`; `p` defaults to 2 and accepts `inf`, `-inf` and 0.
pub fn norm(
    out: &mut Tensor,
    a: &Tensor,
    p: Option<Scalar>,
    dims: Option<&[i64]>,
    keepdim: bool,
    dtype: Option<DType>,
) -> Result<()> {
    if !a.dtype().is_floating() {
        return Err(Error::dtype("norm", a.dtype()));
    }
    let out_dtype = dtype.unwrap_or(a.dtype());
    if !out_dtype.is_floating() {
        return Err(Error::dtype("norm", out_dtype));
    }
    let p = p.map(Scalar::to_f64).unwrap_or(2.0);
    let plan = ReductionPlan::new(a.sizes(), dims, keepdim)?;
    out.ensure_shape(&plan.out_sizes, out_dtype)?;

    let init = if p == f64::NEG_INFINITY { f64::INFINITY } else { 0.0 };
    let mut acc = vec![init; numel(&plan.out_sizes)];
    a.with_slice::<f64, _>(|av| {
        for (&x, o) in av.iter().zip(plan.targets(a.sizes())) {
            let x = x.abs();
            acc[o] = if p == f64::INFINITY {
                acc[o].max(x)
            } else if p == f64::NEG_INFINITY {
                acc[o].min(x)
            } else if p == 0.0 {
                acc[o] + if x != 0.0 { 1.0 } else { 0.0 }
            } else if p == 1.0 {
                acc[o] + x
            } else {
                acc[o] + x.powf(p)
            };
        }
        Ok(())
    })?;
    let finish = |v: f64| {
        if p.is_infinite() || p == 0.0 || p == 1.0 {
            v
        } else {
            v.powf(1.0 / p)
        }
    };
    with_element_type!(out_dtype, |T| out.with_slice_mut::<T, _>(|ov| {
        for (o, &v) in ov.iter_mut().zip(&acc) {
            *o = T::from_f64(finish(v));
        }
        Ok(())
    }))
}
