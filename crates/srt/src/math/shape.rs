//! Copying shape operations: the out-of-place counterparts of view ops.

use smallvec::SmallVec;

use crate::error::{Error, Result};
use crate::tensor::host_tensor::flatten_shape;
use crate::tensor::layout::{
    broadcast_shapes, broadcast_strides, contiguous_strides, infer_size, numel, wrap_dim,
    wrap_insert_dim, Dims,
};
use crate::tensor::{DType, Tensor};
use crate::with_element_type;

/// Copies `src` into `out`, converting to `dtype`.
pub fn copy(out: &mut Tensor, src: &Tensor, dtype: DType) -> Result<()> {
    copy_with_shape(out, src, src.sizes(), dtype)
}

fn copy_with_shape(out: &mut Tensor, src: &Tensor, sizes: &[usize], dtype: DType) -> Result<()> {
    if numel(sizes) != src.numel() {
        return Err(Error::shape(format!(
            "cannot copy {} elements into shape {sizes:?}",
            src.numel()
        )));
    }
    out.ensure_shape(sizes, dtype)?;
    with_element_type!(dtype, |T| src.with_slice::<T, _>(|sv| {
        out.with_slice_mut::<T, _>(|ov| {
            ov.copy_from_slice(sv);
            Ok(())
        })
    }))
}

pub fn narrow_copy(out: &mut Tensor, src: &Tensor, dim: i64, start: i64, length: i64) -> Result<()> {
    let view = src.narrow(dim, start, length)?;
    copy(out, &view, src.dtype())
}

/// Copying reshape; a single `-1` is inferred.
pub fn reshape_copy(out: &mut Tensor, src: &Tensor, shape: &[i64]) -> Result<()> {
    let sizes = infer_size(shape, src.numel())?;
    copy_with_shape(out, src, &sizes, src.dtype())
}

pub fn flatten_copy(out: &mut Tensor, src: &Tensor, start: i64, end: i64) -> Result<()> {
    let sizes = flatten_shape(src.sizes(), start, end)?;
    copy_with_shape(out, src, &sizes, src.dtype())
}

fn promote_all(op: &'static str, tensors: &[Tensor]) -> Result<DType> {
    tensors
        .iter()
        .map(Tensor::dtype)
        .reduce(DType::promote)
        .ok_or_else(|| Error::invalid(format!("{op} expects a non-empty list of tensors")))
}

/// Concatenates along `dim`. 1-D tensors with zero elements are skipped.
pub fn cat(out: &mut Tensor, tensors: &[Tensor], dim: i64) -> Result<()> {
    let dtype = promote_all("cat", tensors)?;
    let parts: Vec<&Tensor> = tensors
        .iter()
        .filter(|t| !(t.dim() == 1 && t.numel() == 0))
        .collect();
    let Some(reference) = parts.first() else {
        out.ensure_shape(&[0], dtype)?;
        return Ok(());
    };
    if reference.dim() == 0 {
        return Err(Error::shape("zero-dimensional tensor cannot be concatenated"));
    }
    let d = wrap_dim(dim, reference.dim())?;
    let mut sizes: Dims = SmallVec::from_slice(reference.sizes());
    sizes[d] = 0;
    for part in &parts {
        if part.dim() != reference.dim() {
            return Err(Error::shape(format!(
                "cat: tensors must have the same rank, got {:?} and {:?}",
                reference.sizes(),
                part.sizes()
            )));
        }
        for (i, (&a, &b)) in part.sizes().iter().zip(reference.sizes()).enumerate() {
            if i != d && a != b {
                return Err(Error::shape(format!(
                    "cat: sizes must match except in dimension {d}, got {:?} and {:?}",
                    reference.sizes(),
                    part.sizes()
                )));
            }
        }
        sizes[d] += part.sizes()[d];
    }

    let outer: usize = sizes[..d].iter().product();
    let inner: usize = sizes[d + 1..].iter().product();
    let row = sizes[d] * inner;
    out.ensure_shape(&sizes, dtype)?;
    with_element_type!(dtype, |T| {
        let mut column = 0;
        for part in &parts {
            let chunk = part.sizes()[d] * inner;
            part.with_slice::<T, _>(|pv| {
                out.with_slice_mut::<T, _>(|ov| {
                    for o in 0..outer {
                        ov[o * row + column..o * row + column + chunk]
                            .copy_from_slice(&pv[o * chunk..(o + 1) * chunk]);
                    }
                    Ok(())
                })
            })?;
            column += chunk;
        }
        Ok(())
    })
}

/// Stacks equally-shaped tensors along a new dimension `dim`.
pub fn stack(out: &mut Tensor, tensors: &[Tensor], dim: i64) -> Result<()> {
    let dtype = promote_all("stack", tensors)?;
    let reference = &tensors[0];
    for t in tensors {
        if t.sizes() != reference.sizes() {
            return Err(Error::shape(format!(
                "stack expects each tensor to be equal size, got {:?} and {:?}",
                reference.sizes(),
                t.sizes()
            )));
        }
    }
    let d = wrap_insert_dim(dim, reference.dim())?;
    let mut sizes: Dims = SmallVec::from_slice(reference.sizes());
    sizes.insert(d, tensors.len());

    let outer: usize = reference.sizes()[..d].iter().product();
    let inner: usize = reference.sizes()[d..].iter().product();
    let n = tensors.len();
    out.ensure_shape(&sizes, dtype)?;
    with_element_type!(dtype, |T| {
        for (i, t) in tensors.iter().enumerate() {
            t.with_slice::<T, _>(|tv| {
                out.with_slice_mut::<T, _>(|ov| {
                    for o in 0..outer {
                        let dst = (o * n + i) * inner;
                        ov[dst..dst + inner].copy_from_slice(&tv[o * inner..(o + 1) * inner]);
                    }
                    Ok(())
                })
            })?;
        }
        Ok(())
    })
}

/// One index tensor resolved against a source dimension.
struct IndexEntry {
    dim: usize,
    sizes: Dims,
    values: Vec<i64>,
    strides: Dims,
}

/// Advanced indexing with one optional index tensor per leading dimension.
///
/// Bool/u8 masks expand to the coordinates of their true elements. When the indexed
/// dimensions are adjacent the broadcast index shape replaces them in place,
/// otherwise it moves to the front of the result.
pub fn index(out: &mut Tensor, src: &Tensor, indices: &[Option<Tensor>]) -> Result<()> {
    let rank = src.dim();
    let mut entries: Vec<IndexEntry> = Vec::new();
    let mut cursor = 0usize;
    for index in indices {
        match index {
            None => cursor += 1,
            Some(t) if matches!(t.dtype(), DType::Bool | DType::U8) => {
                let k = t.dim();
                if k == 0 {
                    return Err(Error::shape("0-dim masks are not supported as indices"));
                }
                if cursor + k > rank || t.sizes() != &src.sizes()[cursor..cursor + t.dim()] {
                    return Err(Error::shape(format!(
                        "mask of shape {:?} does not match indexed shape {:?} at dim {cursor}",
                        t.sizes(),
                        src.sizes()
                    )));
                }
                let mask = t.to_vec::<bool>()?;
                let mask_strides = contiguous_strides(t.sizes());
                let hits: Vec<usize> = (0..mask.len()).filter(|&i| mask[i]).collect();
                for j in 0..t.dim() {
                    let values = hits
                        .iter()
                        .map(|&i| ((i / mask_strides[j]) % t.sizes()[j]) as i64)
                        .collect::<Vec<_>>();
                    entries.push(IndexEntry {
                        dim: cursor + j,
                        sizes: SmallVec::from_slice(&[hits.len()]),
                        values,
                        strides: Dims::new(),
                    });
                }
                cursor += t.dim();
            }
            Some(t) if matches!(t.dtype(), DType::I32 | DType::I64) => {
                if cursor >= rank {
                    return Err(Error::shape(format!(
                        "too many indices for tensor of dimension {rank}"
                    )));
                }
                entries.push(IndexEntry {
                    dim: cursor,
                    sizes: SmallVec::from_slice(t.sizes()),
                    values: t.to_vec::<i64>()?,
                    strides: Dims::new(),
                });
                cursor += 1;
            }
            Some(t) => return Err(Error::dtype("index", t.dtype())),
        }
    }
    if cursor > rank {
        return Err(Error::shape(format!(
            "too many indices for tensor of dimension {rank}"
        )));
    }
    if entries.is_empty() {
        return copy(out, src, src.dtype());
    }

    let mut b_sizes: Dims = SmallVec::new();
    for entry in &entries {
        b_sizes = broadcast_shapes(&b_sizes, &entry.sizes)?;
    }
    for entry in &mut entries {
        entry.strides = broadcast_strides(&entry.sizes, &contiguous_strides(&entry.sizes), &b_sizes)?;
    }

    let first = entries[0].dim;
    let last = entries[entries.len() - 1].dim;
    let adjacent = entries.windows(2).all(|w| w[1].dim == w[0].dim + 1);
    let b_start = if adjacent { first } else { 0 };
    let mut out_sizes = Dims::new();
    let mut rest: SmallVec<[(usize, usize); 4]> = SmallVec::new();
    if adjacent {
        for d in 0..first {
            rest.push((d, out_sizes.len()));
            out_sizes.push(src.sizes()[d]);
        }
        out_sizes.extend_from_slice(&b_sizes);
        for d in last + 1..rank {
            rest.push((d, out_sizes.len()));
            out_sizes.push(src.sizes()[d]);
        }
    } else {
        out_sizes.extend_from_slice(&b_sizes);
        for d in (0..rank).filter(|d| !entries.iter().any(|e| e.dim == *d)) {
            rest.push((d, out_sizes.len()));
            out_sizes.push(src.sizes()[d]);
        }
    }

    let src_strides = contiguous_strides(src.sizes());
    let total = numel(&out_sizes);
    let mut offsets = Vec::with_capacity(total);
    let mut pos: Dims = SmallVec::from_elem(0, out_sizes.len());
    for _ in 0..total {
        let mut offset = 0usize;
        for &(d, p) in &rest {
            offset += pos[p] * src_strides[d];
        }
        for entry in &entries {
            let at: usize = (0..b_sizes.len())
                .map(|k| pos[b_start + k] * entry.strides[k])
                .sum();
            let size = src.sizes()[entry.dim] as i64;
            let raw = entry.values[at];
            let idx = if raw < 0 { raw + size } else { raw };
            if idx < 0 || idx >= size {
                return Err(Error::shape(format!(
                    "index {raw} is out of bounds for dimension {} with size {size}",
                    entry.dim
                )));
            }
            offset += idx as usize * src_strides[entry.dim];
        }
        offsets.push(offset);
        for p in (0..pos.len()).rev() {
            pos[p] += 1;
            if pos[p] < out_sizes[p] {
                break;
            }
            pos[p] = 0;
        }
    }

    out.ensure_shape(&out_sizes, src.dtype())?;
    with_element_type!(src.dtype(), |T| src.with_slice::<T, _>(|sv| {
        out.with_slice_mut::<T, _>(|ov| {
            for (o, &offset) in ov.iter_mut().zip(&offsets) {
                *o = sv[offset];
            }
            Ok(())
        })
    }))
}
