//! Matrix products backed by faer.

use faer::linalg::matmul::matmul;
use faer::mat::{MatMut, MatRef};
use faer::{Accum, Par};

use crate::error::{Error, Result};
use crate::tensor::layout::{broadcast_strides, contiguous_strides, StridedOffsets};
use crate::tensor::{DType, Element, Scalar, Tensor};

fn faer_parallelism() -> Par {
    let par = faer::get_global_parallelism();
    if par.degree() == 1 {
        Par::Seq
    } else {
        par
    }
}

/// Element types with a faer GEMM.
trait Gemm: Element {
    /// Row-major `out[m x n] (= or +=) alpha * lhs[m x k] * rhs[k x n]`.
    fn gemm(out: &mut [Self], lhs: &[Self], rhs: &[Self], dims: (usize, usize, usize), accumulate: bool, alpha: Self);
}

macro_rules! impl_gemm {
    ($ty:ty) => {
        impl Gemm for $ty {
            fn gemm(
                out: &mut [Self],
                lhs: &[Self],
                rhs: &[Self],
                (m, k, n): (usize, usize, usize),
                accumulate: bool,
                alpha: Self,
            ) {
                if m == 0 || n == 0 {
                    return;
                }
                if k == 0 {
                    if !accumulate {
                        out.fill(0.0);
                    }
                    return;
                }
                // C^T = B^T * A^T written column-major is C in row-major order.
                let a_t = MatRef::from_row_major_slice(lhs, m, k).transpose();
                let b_t = MatRef::from_row_major_slice(rhs, k, n).transpose();
                let mut out_view = MatMut::from_column_major_slice_mut(out, n, m);
                let accum = if accumulate { Accum::Add } else { Accum::Replace };
                matmul(&mut out_view, accum, b_t, a_t, alpha, faer_parallelism());
            }
        }
    };
}

impl_gemm!(f32);
impl_gemm!(f64);

fn matmul_dtype(op: &'static str, a: &Tensor, b: &Tensor) -> Result<DType> {
    if a.dtype() != b.dtype() {
        return Err(Error::invalid(format!(
            "{op}: expected operands of the same dtype, got {} and {}",
            a.dtype(),
            b.dtype()
        )));
    }
    match a.dtype() {
        DType::F32 | DType::F64 => Ok(a.dtype()),
        other => Err(Error::dtype(op, other)),
    }
}

/// Batched product of `[b, n, k]` and `[b, k, m]`.
pub fn bmm(out: &mut Tensor, a: &Tensor, b: &Tensor) -> Result<()> {
    if a.dim() != 3 || b.dim() != 3 {
        return Err(Error::shape("bmm expects two 3-D tensors"));
    }
    let (batch, n, k) = (a.sizes()[0], a.sizes()[1], a.sizes()[2]);
    if b.sizes()[0] != batch || b.sizes()[1] != k {
        return Err(Error::shape(format!(
            "bmm shape mismatch: {:?} @ {:?}",
            a.sizes(),
            b.sizes()
        )));
    }
    let m = b.sizes()[2];
    let dtype = matmul_dtype("bmm", a, b)?;
    out.ensure_shape(&[batch, n, m], dtype)?;
    match dtype {
        DType::F32 => bmm_typed::<f32>(out, a, b, batch, (n, k, m)),
        _ => bmm_typed::<f64>(out, a, b, batch, (n, k, m)),
    }
}

fn bmm_typed<T: Gemm>(
    out: &mut Tensor,
    a: &Tensor,
    b: &Tensor,
    batch: usize,
    (n, k, m): (usize, usize, usize),
) -> Result<()> {
    a.with_slice::<T, _>(|av| {
        b.with_slice::<T, _>(|bv| {
            out.with_slice_mut::<T, _>(|ov| {
                for i in 0..batch {
                    T::gemm(
                        &mut ov[i * n * m..(i + 1) * n * m],
                        &av[i * n * k..(i + 1) * n * k],
                        &bv[i * k * m..(i + 1) * k * m],
                        (n, k, m),
                        false,
                        T::from_f64(1.0),
                    );
                }
                Ok(())
            })
        })
    })
}

/// `out = beta * input + alpha * (mat1 @ mat2)`; `input` broadcasts to `[n, m]`.
///
/// With `beta == 0` the input is ignored entirely, NaNs included.
pub fn addmm(
    out: &mut Tensor,
    input: &Tensor,
    mat1: &Tensor,
    mat2: &Tensor,
    beta: Scalar,
    alpha: Scalar,
) -> Result<()> {
    if mat1.dim() != 2 || mat2.dim() != 2 {
        return Err(Error::shape("addmm expects 2-D matrices"));
    }
    let (n, k) = (mat1.sizes()[0], mat1.sizes()[1]);
    if mat2.sizes()[0] != k {
        return Err(Error::shape(format!(
            "addmm shape mismatch: {:?} @ {:?}",
            mat1.sizes(),
            mat2.sizes()
        )));
    }
    let m = mat2.sizes()[1];
    let dtype = matmul_dtype("addmm", mat1, mat2)?;
    let target = [n, m];
    let input_strides = broadcast_strides(input.sizes(), &contiguous_strides(input.sizes()), &target)?;
    out.ensure_shape(&target, dtype)?;
    match dtype {
        DType::F32 => addmm_typed::<f32>(out, input, &input_strides, mat1, mat2, (n, k, m), beta, alpha),
        _ => addmm_typed::<f64>(out, input, &input_strides, mat1, mat2, (n, k, m), beta, alpha),
    }
}

#[allow(clippy::too_many_arguments)]
fn addmm_typed<T: Gemm>(
    out: &mut Tensor,
    input: &Tensor,
    input_strides: &[usize],
    mat1: &Tensor,
    mat2: &Tensor,
    (n, k, m): (usize, usize, usize),
    beta: Scalar,
    alpha: Scalar,
) -> Result<()> {
    let beta = beta.to_f64();
    let accumulate = beta != 0.0;
    let target = [n, m];
    input.with_slice::<T, _>(|iv| {
        mat1.with_slice::<T, _>(|av| {
            mat2.with_slice::<T, _>(|bv| {
                out.with_slice_mut::<T, _>(|ov| {
                    if accumulate {
                        let offsets = StridedOffsets::new(&target, [input_strides], [0]);
                        for (o, [i]) in ov.iter_mut().zip(offsets) {
                            *o = T::from_f64(beta * iv[i].to_f64());
                        }
                    }
                    T::gemm(ov, av, bv, (n, k, m), accumulate, T::from_f64(alpha.to_f64()));
                    Ok(())
                })
            })
        })
    })
}
