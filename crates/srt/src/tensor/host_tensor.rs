//! Host-resident strided tensor over a shared [`Storage`].

use std::fmt;

use smallvec::SmallVec;

use super::dtype::DType;
use super::element::{cast, Element};
use super::layout::{self, contiguous_strides, wrap_dim, Dims, StridedOffsets};
use super::scalar::Scalar;
use super::storage::{Buffer, Storage, StorageId};
use crate::error::{Error, Result};
use crate::with_element_type;

/// Strided view of a typed storage buffer.
///
/// Cloning a tensor aliases its storage. Views produced by [`Tensor::transpose`],
/// [`Tensor::slice`] and friends share storage with their base.
#[derive(Clone)]
pub struct Tensor {
    storage: Storage,
    dtype: DType,
    sizes: Dims,
    strides: Dims,
    offset: usize,
    wrapped_number: bool,
}

impl Tensor {
    /// Allocates a zero-initialized contiguous tensor.
    pub fn zeros(sizes: &[usize], dtype: DType) -> Self {
        Self {
            storage: Storage::zeros(dtype, layout::numel(sizes)),
            dtype,
            sizes: SmallVec::from_slice(sizes),
            strides: contiguous_strides(sizes),
            offset: 0,
            wrapped_number: false,
        }
    }

    /// Alias of [`Tensor::zeros`]; contents are unspecified to callers.
    pub fn empty(sizes: &[usize], dtype: DType) -> Self {
        Self::zeros(sizes, dtype)
    }

    /// Builds a contiguous tensor that takes ownership of `data`.
    pub fn from_vec<T: Element>(sizes: &[usize], data: Vec<T>) -> Result<Self> {
        let expected = layout::numel(sizes);
        if data.len() != expected {
            return Err(Error::shape(format!(
                "{} elements cannot fill shape {sizes:?} ({expected} elements)",
                data.len()
            )));
        }
        Ok(Self {
            storage: Storage::new(T::into_buffer(data)),
            dtype: T::DTYPE,
            sizes: SmallVec::from_slice(sizes),
            strides: contiguous_strides(sizes),
            offset: 0,
            wrapped_number: false,
        })
    }

    pub fn from_slice<T: Element>(sizes: &[usize], data: &[T]) -> Result<Self> {
        Self::from_vec(sizes, data.to_vec())
    }

    /// 0-dimensional tensor holding `value`.
    pub fn scalar<T: Element>(value: T) -> Self {
        Self {
            storage: Storage::new(T::into_buffer(vec![value])),
            dtype: T::DTYPE,
            sizes: SmallVec::new(),
            strides: SmallVec::new(),
            offset: 0,
            wrapped_number: false,
        }
    }

    /// Wraps a host scalar into a 0-dim tensor that does not drive dtype promotion.
    pub fn wrap_scalar(value: Scalar) -> Self {
        let mut tensor = match value {
            Scalar::Bool(v) => Self::scalar(v),
            Scalar::Int(v) => Self::scalar(v),
            Scalar::Double(v) => Self::scalar(v),
        };
        tensor.wrapped_number = true;
        tensor
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn dim(&self) -> usize {
        self.sizes.len()
    }

    /// Size of dimension `dim`, accepting negative indices.
    pub fn size(&self, dim: i64) -> Result<usize> {
        if self.sizes.is_empty() {
            return Err(Error::shape("0-dim tensor has no dimensions"));
        }
        Ok(self.sizes[wrap_dim(dim, self.dim())?])
    }

    pub fn numel(&self) -> usize {
        layout::numel(&self.sizes)
    }

    pub fn is_empty(&self) -> bool {
        self.numel() == 0
    }

    pub fn is_contiguous(&self) -> bool {
        layout::is_contiguous(&self.sizes, &self.strides)
    }

    pub fn is_wrapped_number(&self) -> bool {
        self.wrapped_number
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn storage_id(&self) -> StorageId {
        self.storage.id()
    }

    /// Whether both tensors alias the same storage allocation handle.
    pub fn shares_storage(&self, other: &Tensor) -> bool {
        self.storage.ptr_eq(&other.storage)
    }

    /// Drops the logical size to zero while keeping the backing capacity.
    pub fn truncate(&mut self) {
        self.sizes.clear();
        self.sizes.push(0);
        self.strides.clear();
        self.strides.push(1);
        self.offset = 0;
        self.wrapped_number = false;
    }

    /// Regrows the tensor to `sizes`/`dtype` as a dense row-major layout.
    ///
    /// The storage identity is kept; the backing allocation is only replaced when the
    /// dtype changes or the element capacity is insufficient. Returns `true` in that case.
    pub fn ensure_shape(&mut self, sizes: &[usize], dtype: DType) -> Result<bool> {
        let reallocated = self
            .storage
            .reserve_elements(dtype, layout::numel(sizes))?;
        self.dtype = dtype;
        self.sizes = SmallVec::from_slice(sizes);
        self.strides = contiguous_strides(sizes);
        self.offset = 0;
        self.wrapped_number = false;
        Ok(reallocated)
    }

    /// Materializes the logical elements in row-major order, converting to `T`.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        let guard = self.storage.read()?;
        with_element_type!(self.dtype, |S| {
            let data = S::vec(&guard).ok_or_else(|| self.buffer_mismatch(&guard))?;
            self.check_extent(data.len())?;
            let out: Vec<T> = if self.is_contiguous() {
                data[self.offset..self.offset + self.numel()]
                    .iter()
                    .map(|&v| cast::<S, T>(v))
                    .collect()
            } else {
                StridedOffsets::new(&self.sizes, [&self.strides], [self.offset])
                    .map(|[o]| cast::<S, T>(data[o]))
                    .collect()
            };
            Ok(out)
        })
    }

    /// Calls `f` with the row-major elements as `T`, borrowing storage when possible.
    pub fn with_slice<T: Element, R>(&self, f: impl FnOnce(&[T]) -> Result<R>) -> Result<R> {
        if self.dtype == T::DTYPE && self.is_contiguous() {
            let guard = self.storage.read()?;
            let data = T::vec(&guard).ok_or_else(|| self.buffer_mismatch(&guard))?;
            self.check_extent(data.len())?;
            return f(&data[self.offset..self.offset + self.numel()]);
        }
        let gathered = self.to_vec::<T>()?;
        f(&gathered)
    }

    /// Calls `f` with mutable access to the elements of a contiguous `T` tensor.
    pub fn with_slice_mut<T: Element, R>(
        &mut self,
        f: impl FnOnce(&mut [T]) -> Result<R>,
    ) -> Result<R> {
        if self.dtype != T::DTYPE {
            return Err(Error::invalid(format!(
                "cannot write {} elements into a {} tensor",
                T::DTYPE,
                self.dtype
            )));
        }
        if !self.is_contiguous() {
            return Err(Error::invalid("cannot write through a non-contiguous view"));
        }
        let numel = self.numel();
        let offset = self.offset;
        let mut guard = self.storage.write()?;
        let found = guard.dtype();
        let data = T::vec_mut(&mut guard).ok_or_else(|| {
            Error::invalid(format!("storage holds {found}, tensor claims {}", T::DTYPE))
        })?;
        if data.len() < offset + numel {
            return Err(Error::shape("tensor extends past its storage"));
        }
        f(&mut data[offset..offset + numel])
    }

    /// Reads the single element of a one-element tensor.
    pub fn item<T: Element>(&self) -> Result<T> {
        if self.numel() != 1 {
            return Err(Error::invalid(format!(
                "item() needs exactly one element, tensor has {}",
                self.numel()
            )));
        }
        Ok(self.to_vec::<T>()?[0])
    }

    /// Returns `self` when already contiguous, otherwise a dense copy.
    pub fn contiguous(&self) -> Result<Tensor> {
        if self.is_contiguous() {
            return Ok(self.clone());
        }
        self.copy_as(self.dtype)
    }

    /// Dense copy converted to `dtype`.
    pub fn copy_as(&self, dtype: DType) -> Result<Tensor> {
        let buffer = with_element_type!(dtype, |T| T::into_buffer(self.to_vec::<T>()?));
        Ok(Self {
            storage: Storage::new(buffer),
            dtype,
            sizes: self.sizes.clone(),
            strides: contiguous_strides(&self.sizes),
            offset: 0,
            wrapped_number: false,
        })
    }

    /// Casts to `dtype`, aliasing `self` when no conversion or copy is needed.
    pub fn to_dtype(&self, dtype: DType, copy: bool) -> Result<Tensor> {
        if dtype == self.dtype && !copy {
            return Ok(self.clone());
        }
        self.copy_as(dtype)
    }

    pub(crate) fn as_strided(&self, sizes: Dims, strides: Dims, offset: usize) -> Tensor {
        Tensor {
            storage: self.storage.clone(),
            dtype: self.dtype,
            sizes,
            strides,
            offset,
            wrapped_number: false,
        }
    }

    /// Swaps two dimensions.
    pub fn transpose(&self, dim0: i64, dim1: i64) -> Result<Tensor> {
        let d0 = wrap_dim(dim0, self.dim())?;
        let d1 = wrap_dim(dim1, self.dim())?;
        if self.dim() == 0 {
            return Ok(self.clone());
        }
        let mut sizes = self.sizes.clone();
        let mut strides = self.strides.clone();
        sizes.swap(d0, d1);
        strides.swap(d0, d1);
        Ok(self.as_strided(sizes, strides, self.offset))
    }

    /// Reorders dimensions according to `dims`, a permutation of `0..dim()`.
    pub fn permute(&self, dims: &[i64]) -> Result<Tensor> {
        if dims.len() != self.dim() {
            return Err(Error::shape(format!(
                "permute expects {} dims, got {}",
                self.dim(),
                dims.len()
            )));
        }
        let mut seen: SmallVec<[bool; 4]> = SmallVec::from_elem(false, dims.len());
        let mut sizes = Dims::with_capacity(dims.len());
        let mut strides = Dims::with_capacity(dims.len());
        for &dim in dims {
            let d = wrap_dim(dim, self.dim())?;
            if std::mem::replace(&mut seen[d], true) {
                return Err(Error::shape(format!("dimension {d} repeated in permute")));
            }
            sizes.push(self.sizes[d]);
            strides.push(self.strides[d]);
        }
        Ok(self.as_strided(sizes, strides, self.offset))
    }

    /// Strided slice along `dim`. Bounds are clamped like Python slicing.
    pub fn slice(&self, dim: i64, start: Option<i64>, end: Option<i64>, step: i64) -> Result<Tensor> {
        if self.dim() == 0 {
            return Err(Error::shape("slice cannot be applied to a 0-dim tensor"));
        }
        if step <= 0 {
            return Err(Error::invalid("slice step must be positive"));
        }
        let d = wrap_dim(dim, self.dim())?;
        let size = self.sizes[d] as i64;
        let clamp = |v: i64| {
            let v = if v < 0 { v + size } else { v };
            v.clamp(0, size)
        };
        let start = clamp(start.unwrap_or(0));
        let end = clamp(end.unwrap_or(i64::MAX)).max(start);
        let span = end - start;
        let len = if span == 0 { 0 } else { (span - 1) / step + 1 };

        let mut sizes = self.sizes.clone();
        let mut strides = self.strides.clone();
        let offset = self.offset + start as usize * self.strides[d];
        sizes[d] = len as usize;
        strides[d] *= step as usize;
        Ok(self.as_strided(sizes, strides, offset))
    }

    /// View of `length` elements along `dim` starting at `start` (negative wraps).
    pub fn narrow(&self, dim: i64, start: i64, length: i64) -> Result<Tensor> {
        if self.dim() == 0 {
            return Err(Error::shape("narrow cannot be applied to a 0-dim tensor"));
        }
        let d = wrap_dim(dim, self.dim())?;
        let (start, length) = narrow_bounds(self.sizes[d], start, length)?;
        let mut sizes = self.sizes.clone();
        sizes[d] = length;
        let offset = self.offset + start * self.strides[d];
        Ok(self.as_strided(sizes, self.strides.clone(), offset))
    }

    /// Reinterprets contiguous data under a new shape; `-1` is inferred.
    pub fn view(&self, shape: &[i64]) -> Result<Tensor> {
        if !self.is_contiguous() {
            return Err(Error::shape("view requires a contiguous tensor"));
        }
        let sizes = layout::infer_size(shape, self.numel())?;
        let strides = contiguous_strides(&sizes);
        Ok(self.as_strided(sizes, strides, self.offset))
    }

    /// Like [`Tensor::view`], copying first when the layout is not contiguous.
    pub fn reshape(&self, shape: &[i64]) -> Result<Tensor> {
        if self.is_contiguous() {
            return self.view(shape);
        }
        self.contiguous()?.view(shape)
    }

    /// Collapses dimensions `start..=end` into one.
    pub fn flatten(&self, start: i64, end: i64) -> Result<Tensor> {
        let shape = flatten_shape(&self.sizes, start, end)?;
        if shape.as_slice() == self.sizes.as_slice() {
            return Ok(self.clone());
        }
        let shape: SmallVec<[i64; 4]> = shape.iter().map(|&s| s as i64).collect();
        self.reshape(&shape)
    }

    fn check_extent(&self, storage_len: usize) -> Result<()> {
        if self.numel() == 0 {
            return Ok(());
        }
        let last = self.offset
            + self
                .sizes
                .iter()
                .zip(self.strides.iter())
                .map(|(&size, &stride)| (size - 1) * stride)
                .sum::<usize>();
        if last >= storage_len {
            return Err(Error::shape(format!(
                "tensor extends past its storage ({last} >= {storage_len})"
            )));
        }
        Ok(())
    }

    fn buffer_mismatch(&self, buffer: &Buffer) -> Error {
        Error::invalid(format!(
            "storage holds {}, tensor claims {}",
            buffer.dtype(),
            self.dtype
        ))
    }
}

/// Validates narrow bounds and returns the wrapped start and the length.
pub fn narrow_bounds(size: usize, start: i64, length: i64) -> Result<(usize, usize)> {
    let size_i = size as i64;
    let start = if start < 0 { start + size_i } else { start };
    if start < 0 || start > size_i {
        return Err(Error::shape(format!(
            "narrow start {start} out of range for size {size}"
        )));
    }
    if length < 0 || start.checked_add(length).map_or(true, |end| end > size_i) {
        return Err(Error::shape(format!(
            "narrow start ({start}) + length ({length}) exceeds dimension size ({size})"
        )));
    }
    Ok((start as usize, length as usize))
}

/// Shape produced by flattening dims `start..=end`; 0-dim inputs become `[1]`.
pub fn flatten_shape(sizes: &[usize], start: i64, end: i64) -> Result<Dims> {
    if sizes.is_empty() {
        return Ok(SmallVec::from_slice(&[1]));
    }
    let start = wrap_dim(start, sizes.len())?;
    let end = wrap_dim(end, sizes.len())?;
    if start > end {
        return Err(Error::shape(
            "flatten() has invalid args: start_dim cannot come after end_dim",
        ));
    }
    let mut out = Dims::with_capacity(sizes.len() - (end - start));
    out.extend_from_slice(&sizes[..start]);
    out.push(sizes[start..=end].iter().product());
    out.extend_from_slice(&sizes[end + 1..]);
    Ok(out)
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("dtype", &self.dtype)
            .field("sizes", &self.sizes.as_slice())
            .field("strides", &self.strides.as_slice())
            .field("offset", &self.offset)
            .field("storage", &self.storage.id())
            .finish()
    }
}
