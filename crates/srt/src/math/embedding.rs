//! Bagged embedding lookups over dense and byte-quantized tables.

use crate::error::{Error, Result};
use crate::tensor::{DType, Element, Tensor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingBagMode {
    Sum,
    Mean,
    Max,
}

impl EmbeddingBagMode {
    pub fn from_code(code: i64) -> Result<Self> {
        match code {
            0 => Ok(EmbeddingBagMode::Sum),
            1 => Ok(EmbeddingBagMode::Mean),
            2 => Ok(EmbeddingBagMode::Max),
            other => Err(Error::invalid(format!("unknown embedding_bag mode {other}"))),
        }
    }
}

/// Output tensors of [`embedding_bag`].
pub struct EmbeddingBagOutputs<'a> {
    /// `[num_bags, dim]` aggregated rows.
    pub output: &'a mut Tensor,
    /// `[num_indices]` bag id of each index.
    pub offset2bag: &'a mut Tensor,
    /// `[num_bags]` number of non-padding indices per bag.
    pub bag_size: &'a mut Tensor,
    /// `[num_bags, dim]` arg-max row per element in max mode, `[num_bags]` zeros otherwise.
    pub max_indices: &'a mut Tensor,
}

#[derive(Debug, Clone, Copy)]
pub struct EmbeddingBagOptions {
    pub mode: EmbeddingBagMode,
    pub include_last_offset: bool,
    pub padding_idx: Option<i64>,
}

/// `[start, end)` index ranges of every bag.
fn bag_ranges(offsets: &[i64], num_indices: usize, include_last_offset: bool) -> Result<Vec<(usize, usize)>> {
    let num_bags = if include_last_offset {
        offsets.len().saturating_sub(1)
    } else {
        offsets.len()
    };
    let mut ranges = Vec::with_capacity(num_bags);
    for bag in 0..num_bags {
        let start = offsets[bag];
        let end = if bag + 1 < offsets.len() {
            offsets[bag + 1]
        } else {
            num_indices as i64
        };
        if start < 0 || start > end || end as usize > num_indices {
            return Err(Error::invalid(format!(
                "embedding_bag: offsets must be increasing and within [0, {num_indices}], bag {bag} spans {start}..{end}"
            )));
        }
        ranges.push((start as usize, end as usize));
    }
    Ok(ranges)
}

fn check_row(index: i64, rows: usize) -> Result<usize> {
    if index < 0 || index as usize >= rows {
        return Err(Error::invalid(format!(
            "embedding_bag: index {index} out of range for {rows} rows"
        )));
    }
    Ok(index as usize)
}

/// Aggregates rows of `weight` selected by `indices` into bags delimited by `offsets`.
pub fn embedding_bag(
    outputs: EmbeddingBagOutputs<'_>,
    weight: &Tensor,
    indices: &Tensor,
    offsets: &Tensor,
    per_sample_weights: Option<&Tensor>,
    options: EmbeddingBagOptions,
) -> Result<()> {
    if weight.dim() != 2 {
        return Err(Error::shape("embedding_bag: weight must be 2-D"));
    }
    if indices.dim() != 1 || offsets.dim() != 1 {
        return Err(Error::shape("embedding_bag: indices and offsets must be 1-D"));
    }
    let (rows, dim) = (weight.sizes()[0], weight.sizes()[1]);
    let indices = indices.to_vec::<i64>()?;
    let ranges = bag_ranges(&offsets.to_vec::<i64>()?, indices.len(), options.include_last_offset)?;
    let psw = match per_sample_weights {
        Some(_) if options.mode != EmbeddingBagMode::Sum => {
            return Err(Error::invalid(
                "embedding_bag: per_sample_weights is only supported for mode='sum'",
            ));
        }
        Some(w) if w.numel() != indices.len() => {
            return Err(Error::shape(
                "embedding_bag: per_sample_weights must have one weight per index",
            ))
        }
        Some(w) => Some(w.to_vec::<f64>()?),
        None => None,
    };
    let num_bags = ranges.len();
    let is_padding = |idx: i64| options.padding_idx == Some(idx);

    let mut bag_of = vec![0i64; indices.len()];
    let mut counts = vec![0i64; num_bags];
    for (bag, &(start, end)) in ranges.iter().enumerate() {
        for i in start..end {
            bag_of[i] = bag as i64;
            if !is_padding(indices[i]) {
                counts[bag] += 1;
            }
        }
    }

    let EmbeddingBagOutputs {
        output,
        offset2bag,
        bag_size,
        max_indices,
    } = outputs;
    output.ensure_shape(&[num_bags, dim], weight.dtype())?;
    offset2bag.ensure_shape(&[indices.len()], DType::I64)?;
    offset2bag.with_slice_mut::<i64, _>(|o| {
        o.copy_from_slice(&bag_of);
        Ok(())
    })?;
    bag_size.ensure_shape(&[num_bags], DType::I64)?;
    bag_size.with_slice_mut::<i64, _>(|o| {
        o.copy_from_slice(&counts);
        Ok(())
    })?;
    let mut argmax = if options.mode == EmbeddingBagMode::Max {
        max_indices.ensure_shape(&[num_bags, dim], DType::I64)?;
        vec![-1i64; num_bags * dim]
    } else {
        max_indices.ensure_shape(&[num_bags], DType::I64)?;
        vec![0i64; num_bags]
    };

    match weight.dtype() {
        DType::F32 => aggregate::<f32>(output, weight, &indices, &ranges, &counts, psw.as_deref(), &mut argmax, rows, dim, options)?,
        DType::F64 => aggregate::<f64>(output, weight, &indices, &ranges, &counts, psw.as_deref(), &mut argmax, rows, dim, options)?,
        other => return Err(Error::dtype("embedding_bag", other)),
    }
    max_indices.with_slice_mut::<i64, _>(|o| {
        o.copy_from_slice(&argmax);
        Ok(())
    })
}

#[allow(clippy::too_many_arguments)]
fn aggregate<T: Element>(
    output: &mut Tensor,
    weight: &Tensor,
    indices: &[i64],
    ranges: &[(usize, usize)],
    counts: &[i64],
    psw: Option<&[f64]>,
    argmax: &mut [i64],
    rows: usize,
    dim: usize,
    options: EmbeddingBagOptions,
) -> Result<()> {
    weight.with_slice::<T, _>(|wv| {
        output.with_slice_mut::<T, _>(|ov| {
            ov.fill(T::default());
            for (bag, &(start, end)) in ranges.iter().enumerate() {
                let dst = &mut ov[bag * dim..(bag + 1) * dim];
                let mut first = true;
                for i in start..end {
                    if options.padding_idx == Some(indices[i]) {
                        continue;
                    }
                    let row = check_row(indices[i], rows)?;
                    let src = &wv[row * dim..(row + 1) * dim];
                    let scale = psw.map_or(1.0, |w| w[i]);
                    for j in 0..dim {
                        let x = src[j].to_f64();
                        match options.mode {
                            EmbeddingBagMode::Sum | EmbeddingBagMode::Mean => {
                                dst[j] = T::from_f64(dst[j].to_f64() + scale * x);
                            }
                            EmbeddingBagMode::Max => {
                                if first || x > dst[j].to_f64() {
                                    dst[j] = src[j];
                                    argmax[bag * dim + j] = row as i64;
                                }
                            }
                        }
                    }
                    first = false;
                }
                if options.mode == EmbeddingBagMode::Mean && counts[bag] > 0 {
                    let n = counts[bag] as f64;
                    for v in dst.iter_mut() {
                        *v = T::from_f64(v.to_f64() / n);
                    }
                }
            }
            Ok(())
        })
    })
}

/// Bagged lookup over a byte-quantized table.
///
/// Each weight row holds `dim` bytes followed by a little-endian `f32` scale and
/// `f32` bias; an element dequantizes to `byte * scale + bias`. When
/// `compressed_indices_mapping` is given, indices are remapped through it first and
/// entries mapped to `-1` contribute nothing.
#[allow(clippy::too_many_arguments)]
pub fn embedding_bag_byte_rowwise_offsets(
    out: &mut Tensor,
    weight: &Tensor,
    indices: &Tensor,
    offsets: &Tensor,
    mode: EmbeddingBagMode,
    per_sample_weights: Option<&Tensor>,
    compressed_indices_mapping: Option<&Tensor>,
    include_last_offset: bool,
) -> Result<()> {
    if weight.dtype() != DType::U8 || weight.dim() != 2 || weight.sizes()[1] < 8 {
        return Err(Error::invalid(
            "embedding_bag_byte_rowwise_offsets: weight must be a 2-D u8 table with 8 trailing scale/bias bytes",
        ));
    }
    if mode == EmbeddingBagMode::Max {
        return Err(Error::invalid(
            "embedding_bag_byte_rowwise_offsets: max mode is not supported",
        ));
    }
    let rows = weight.sizes()[0];
    let row_bytes = weight.sizes()[1];
    let dim = row_bytes - 8;
    let indices = indices.to_vec::<i64>()?;
    let ranges = bag_ranges(&offsets.to_vec::<i64>()?, indices.len(), include_last_offset)?;
    let psw = per_sample_weights.map(|w| w.to_vec::<f64>()).transpose()?;
    if psw.as_ref().is_some_and(|w| w.len() != indices.len()) {
        return Err(Error::shape(
            "embedding_bag_byte_rowwise_offsets: per_sample_weights must have one weight per index",
        ));
    }
    let mapping = compressed_indices_mapping
        .map(|m| m.to_vec::<i64>())
        .transpose()?;

    out.ensure_shape(&[ranges.len(), dim], DType::F32)?;
    weight.with_slice::<u8, _>(|wv| {
        out.with_slice_mut::<f32, _>(|ov| {
            ov.fill(0.0);
            for (bag, &(start, end)) in ranges.iter().enumerate() {
                let dst = &mut ov[bag * dim..(bag + 1) * dim];
                let mut count = 0usize;
                for i in start..end {
                    let idx = match &mapping {
                        Some(map) => {
                            let remapped = *map.get(check_row(indices[i], map.len())?).ok_or_else(|| {
                                Error::invalid("compressed index mapping is too short")
                            })?;
                            if remapped < 0 {
                                continue;
                            }
                            remapped
                        }
                        None => indices[i],
                    };
                    let row = &wv[check_row(idx, rows)? * row_bytes..][..row_bytes];
                    let scale = f32::from_le_bytes([row[dim], row[dim + 1], row[dim + 2], row[dim + 3]]);
                    let bias = f32::from_le_bytes([row[dim + 4], row[dim + 5], row[dim + 6], row[dim + 7]]);
                    let w = psw.as_ref().map_or(1.0, |p| p[i] as f32);
                    for (o, &q) in dst.iter_mut().zip(&row[..dim]) {
                        *o += w * (q as f32 * scale + bias);
                    }
                    count += 1;
                }
                if mode == EmbeddingBagMode::Mean && count > 0 {
                    dst.iter_mut().for_each(|v| *v /= count as f32);
                }
            }
            Ok(())
        })
    })
}
