//! Size/stride bookkeeping shared by tensors and math routines.

use smallvec::SmallVec;

use crate::error::{Error, Result};

/// Inline storage for sizes and strides; most tensors have rank <= 4.
pub type Dims = SmallVec<[usize; 4]>;

/// Row-major strides (in elements) for `sizes`.
pub fn contiguous_strides(sizes: &[usize]) -> Dims {
    let mut strides: Dims = SmallVec::from_elem(1, sizes.len());
    let mut acc = 1usize;
    for (stride, &size) in strides.iter_mut().zip(sizes.iter()).rev() {
        *stride = acc;
        acc *= size.max(1);
    }
    strides
}

pub fn numel(sizes: &[usize]) -> usize {
    sizes.iter().product()
}

/// Returns true when `strides` describe a dense row-major walk of `sizes`.
///
/// Size-1 dimensions never affect contiguity and empty tensors are contiguous.
pub fn is_contiguous(sizes: &[usize], strides: &[usize]) -> bool {
    if numel(sizes) == 0 {
        return true;
    }
    let mut expected = 1usize;
    for (&size, &stride) in sizes.iter().zip(strides.iter()).rev() {
        if size == 1 {
            continue;
        }
        if stride != expected {
            return false;
        }
        expected *= size;
    }
    true
}

/// Normalizes a possibly negative dimension index against `rank`.
///
/// A 0-dim tensor is treated as rank 1 so that `dim=0` and `dim=-1` address it.
pub fn wrap_dim(dim: i64, rank: usize) -> Result<usize> {
    let rank = rank.max(1) as i64;
    let wrapped = if dim < 0 { dim + rank } else { dim };
    if wrapped < 0 || wrapped >= rank {
        return Err(Error::shape(format!(
            "dimension {dim} out of range for rank {rank}"
        )));
    }
    Ok(wrapped as usize)
}

/// Wraps `dim` for insertion into a result of rank `rank + 1` (stack, unsqueeze).
pub fn wrap_insert_dim(dim: i64, rank: usize) -> Result<usize> {
    wrap_dim(dim, rank + 1)
}

/// Standard right-aligned broadcasting of two shapes.
pub fn broadcast_shapes(a: &[usize], b: &[usize]) -> Result<Dims> {
    let rank = a.len().max(b.len());
    let mut out: Dims = SmallVec::from_elem(1, rank);
    for i in 0..rank {
        let da = if i < rank - a.len() { 1 } else { a[i - (rank - a.len())] };
        let db = if i < rank - b.len() { 1 } else { b[i - (rank - b.len())] };
        out[i] = match (da, db) {
            (x, y) if x == y => x,
            (1, y) => y,
            (x, 1) => x,
            _ => {
                return Err(Error::shape(format!(
                    "cannot broadcast {a:?} with {b:?}"
                )))
            }
        };
    }
    Ok(out)
}

/// Strides that read a tensor of `sizes`/`strides` as if it had shape `target`.
///
/// Broadcast dimensions get stride 0.
pub fn broadcast_strides(sizes: &[usize], strides: &[usize], target: &[usize]) -> Result<Dims> {
    if sizes.len() > target.len() {
        return Err(Error::shape(format!(
            "cannot broadcast {sizes:?} to {target:?}"
        )));
    }
    let lead = target.len() - sizes.len();
    let mut out: Dims = SmallVec::from_elem(0, target.len());
    for (i, (&size, &stride)) in sizes.iter().zip(strides.iter()).enumerate() {
        let t = target[lead + i];
        out[lead + i] = if size == t {
            stride
        } else if size == 1 {
            0
        } else {
            return Err(Error::shape(format!(
                "cannot broadcast {sizes:?} to {target:?}"
            )));
        };
    }
    Ok(out)
}

/// Resolves a shape request that may contain a single `-1`.
pub fn infer_size(shape: &[i64], numel: usize) -> Result<Dims> {
    let mut inferred = None;
    let mut known = 1usize;
    let mut out: Dims = SmallVec::with_capacity(shape.len());
    for (i, &dim) in shape.iter().enumerate() {
        match dim {
            -1 => {
                if inferred.replace(i).is_some() {
                    return Err(Error::shape("only one dimension can be inferred"));
                }
                out.push(1);
            }
            d if d >= 0 => {
                known *= d as usize;
                out.push(d as usize);
            }
            d => return Err(Error::shape(format!("invalid shape dimension {d}"))),
        }
    }
    match inferred {
        Some(index) => {
            if known == 0 || numel % known != 0 {
                return Err(Error::shape(format!(
                    "shape {shape:?} is invalid for input of size {numel}"
                )));
            }
            out[index] = numel / known;
        }
        None if known != numel => {
            return Err(Error::shape(format!(
                "shape {shape:?} is invalid for input of size {numel}"
            )));
        }
        None => {}
    }
    Ok(out)
}

/// Odometer over every index of `sizes`, yielding the linear offset for each
/// of up to `N` stride sets.
pub struct StridedOffsets<'a, const N: usize> {
    sizes: &'a [usize],
    strides: [&'a [usize]; N],
    index: Dims,
    offsets: [usize; N],
    remaining: usize,
}

impl<'a, const N: usize> StridedOffsets<'a, N> {
    pub fn new(sizes: &'a [usize], strides: [&'a [usize]; N], bases: [usize; N]) -> Self {
        Self {
            sizes,
            strides,
            index: SmallVec::from_elem(0, sizes.len()),
            offsets: bases,
            remaining: numel(sizes),
        }
    }
}

impl<const N: usize> Iterator for StridedOffsets<'_, N> {
    type Item = [usize; N];

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let current = self.offsets;
        if self.remaining > 0 {
            for dim in (0..self.sizes.len()).rev() {
                self.index[dim] += 1;
                for (offset, strides) in self.offsets.iter_mut().zip(self.strides.iter()) {
                    *offset += strides[dim];
                }
                if self.index[dim] < self.sizes[dim] {
                    break;
                }
                for (offset, strides) in self.offsets.iter_mut().zip(self.strides.iter()) {
                    *offset -= strides[dim] * self.sizes[dim];
                }
                self.index[dim] = 0;
            }
        }
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strided_offsets_walk_transposed_layout() {
        let sizes = [2usize, 3];
        let strides = [1usize, 2];
        let offsets: Vec<usize> = StridedOffsets::new(&sizes, [&strides], [0])
            .map(|[o]| o)
            .collect();
        assert_eq!(offsets, vec![0, 2, 4, 1, 3, 5]);
    }

    #[test]
    fn infer_size_rejects_mismatched_element_counts() {
        assert_eq!(infer_size(&[2, -1], 6).unwrap().as_slice(), &[2, 3]);
        assert!(infer_size(&[4, -1], 6).is_err());
        assert!(infer_size(&[-1, -1], 6).is_err());
    }

    #[test]
    fn zero_dim_wraps_like_rank_one() {
        assert_eq!(wrap_dim(-1, 0).unwrap(), 0);
        assert!(wrap_dim(1, 0).is_err());
    }
}
