use crate::error::{Error, Result};
use crate::tensor::{DType, Element, Tensor};

/// Layer normalization over the trailing `normalized_shape` dimensions.
pub fn layer_norm(
    out: &mut Tensor,
    input: &Tensor,
    normalized_shape: &[i64],
    weight: Option<&Tensor>,
    bias: Option<&Tensor>,
    eps: f64,
) -> Result<()> {
    if !input.dtype().is_floating() {
        return Err(Error::dtype("layer_norm", input.dtype()));
    }
    let rank = input.dim();
    let k = normalized_shape.len();
    let trailing = if k <= rank { &input.sizes()[rank - k..] } else { &[][..] };
    let matches = k <= rank
        && trailing
            .iter()
            .zip(normalized_shape)
            .all(|(&s, &n)| n >= 0 && s == n as usize);
    if !matches {
        return Err(Error::shape(format!(
            "layer_norm: normalized_shape {normalized_shape:?} does not match input {:?}",
            input.sizes()
        )));
    }
    let n: usize = trailing.iter().product();
    for (name, param) in [("weight", weight), ("bias", bias)] {
        if let Some(p) = param {
            if p.numel() != n {
                return Err(Error::shape(format!(
                    "layer_norm: {name} has {} elements, expected {n}",
                    p.numel()
                )));
            }
        }
    }
    out.ensure_shape(input.sizes(), input.dtype())?;
    match input.dtype() {
        DType::F32 => normalize_rows::<f32>(out, input, n, weight, bias, eps),
        _ => normalize_rows::<f64>(out, input, n, weight, bias, eps),
    }
}

/// Borrows an optional affine parameter as `T` elements.
fn with_param<T: Element, R>(
    param: Option<&Tensor>,
    f: impl FnOnce(Option<&[T]>) -> Result<R>,
) -> Result<R> {
    match param {
        Some(p) => p.with_slice::<T, _>(|v| f(Some(v))),
        None => f(None),
    }
}

fn normalize_rows<T: Element>(
    out: &mut Tensor,
    input: &Tensor,
    n: usize,
    weight: Option<&Tensor>,
    bias: Option<&Tensor>,
    eps: f64,
) -> Result<()> {
    if n == 0 {
        return Ok(());
    }
    with_param::<T, _>(weight, |weight| {
        with_param::<T, _>(bias, |bias| {
            input.with_slice::<T, _>(|iv| {
                out.with_slice_mut::<T, _>(|ov| {
                    for (row, dst) in iv.chunks(n).zip(ov.chunks_mut(n)) {
                        let mean = row.iter().map(|x| x.to_f64()).sum::<f64>() / n as f64;
                        let var = row
                            .iter()
                            .map(|x| {
                                let d = x.to_f64() - mean;
                                d * d
                            })
                            .sum::<f64>()
                            / n as f64;
                        let inv_std = 1.0 / (var + eps).sqrt();
                        for (j, (o, x)) in dst.iter_mut().zip(row).enumerate() {
                            let mut v = (x.to_f64() - mean) * inv_std;
                            if let Some(w) = weight {
                                v *= w[j].to_f64();
                            }
                            if let Some(b) = bias {
                                v += b[j].to_f64();
                            }
                            *o = T::from_f64(v);
                        }
                    }
                    Ok(())
                })
            })
        })
    })
}
