//! Shared, interior-mutable element buffers backing host tensors.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::dtype::DType;
use crate::error::{Error, Result};

/// Typed element vector. The logical length may be smaller than the vector
/// capacity, which is what makes truncate-then-regrow cheap.
#[derive(Debug, Clone, PartialEq)]
pub enum Buffer {
    Bool(Vec<bool>),
    U8(Vec<u8>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

macro_rules! for_each_buffer {
    ($buffer:expr, |$data:ident| $body:expr) => {
        match $buffer {
            Buffer::Bool($data) => $body,
            Buffer::U8($data) => $body,
            Buffer::I32($data) => $body,
            Buffer::I64($data) => $body,
            Buffer::F32($data) => $body,
            Buffer::F64($data) => $body,
        }
    };
}

impl Buffer {
    /// Allocates a zero-filled buffer of `len` elements.
    pub fn zeros(dtype: DType, len: usize) -> Self {
        match dtype {
            DType::Bool => Buffer::Bool(vec![false; len]),
            DType::U8 => Buffer::U8(vec![0; len]),
            DType::I32 => Buffer::I32(vec![0; len]),
            DType::I64 => Buffer::I64(vec![0; len]),
            DType::F32 => Buffer::F32(vec![0.0; len]),
            DType::F64 => Buffer::F64(vec![0.0; len]),
        }
    }

    pub fn dtype(&self) -> DType {
        match self {
            Buffer::Bool(_) => DType::Bool,
            Buffer::U8(_) => DType::U8,
            Buffer::I32(_) => DType::I32,
            Buffer::I64(_) => DType::I64,
            Buffer::F32(_) => DType::F32,
            Buffer::F64(_) => DType::F64,
        }
    }

    pub fn len(&self) -> usize {
        for_each_buffer!(self, |data| data.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        for_each_buffer!(self, |data| data.capacity())
    }

    /// Grows the logical length to at least `len`; never shrinks.
    fn grow_to(&mut self, len: usize) {
        for_each_buffer!(self, |data| {
            if data.len() < len {
                data.resize(len, Default::default());
            }
        })
    }
}

/// Process-unique storage identity; survives truncation and in-place regrowth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorageId(u64);

impl fmt::Display for StorageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "storage#{}", self.0)
    }
}

static NEXT_STORAGE_ID: AtomicU64 = AtomicU64::new(1);

struct StorageInner {
    id: StorageId,
    buffer: RwLock<Buffer>,
    reallocations: AtomicU64,
}

/// Reference-counted handle to a buffer; clones alias the same elements.
#[derive(Clone)]
pub struct Storage {
    inner: Arc<StorageInner>,
}

impl Storage {
    pub fn new(buffer: Buffer) -> Self {
        let id = StorageId(NEXT_STORAGE_ID.fetch_add(1, Ordering::Relaxed));
        Self {
            inner: Arc::new(StorageInner {
                id,
                buffer: RwLock::new(buffer),
                reallocations: AtomicU64::new(0),
            }),
        }
    }

    pub fn zeros(dtype: DType, len: usize) -> Self {
        Self::new(Buffer::zeros(dtype, len))
    }

    pub fn id(&self) -> StorageId {
        self.inner.id
    }

    pub fn dtype(&self) -> DType {
        self.inner.buffer.read_recursive().dtype()
    }

    /// Number of initialized elements.
    pub fn len(&self) -> usize {
        self.inner.buffer.read_recursive().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of elements the backing allocation can hold without reallocating.
    pub fn capacity(&self) -> usize {
        self.inner.buffer.read_recursive().capacity()
    }

    /// How many times the backing allocation has been replaced or moved.
    pub fn reallocations(&self) -> u64 {
        self.inner.reallocations.load(Ordering::Relaxed)
    }

    pub fn ptr_eq(&self, other: &Storage) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn read(&self) -> Result<RwLockReadGuard<'_, Buffer>> {
        self.inner.buffer.try_read_recursive().ok_or_else(|| {
            Error::invalid(format!("{} is being written while read", self.inner.id))
        })
    }

    pub(crate) fn write(&self) -> Result<RwLockWriteGuard<'_, Buffer>> {
        self.inner.buffer.try_write().ok_or_else(|| {
            Error::invalid(format!(
                "{} is borrowed elsewhere; outputs must not alias inputs",
                self.inner.id
            ))
        })
    }

    /// Makes at least `len` elements of `dtype` addressable.
    ///
    /// Returns `true` when the backing allocation had to be replaced.
    pub(crate) fn reserve_elements(&self, dtype: DType, len: usize) -> Result<bool> {
        let mut buffer = self.write()?;
        let reallocated = if buffer.dtype() != dtype {
            *buffer = Buffer::zeros(dtype, len);
            true
        } else {
            let capacity = buffer.capacity();
            buffer.grow_to(len);
            buffer.capacity() != capacity
        };
        if reallocated {
            self.inner.reallocations.fetch_add(1, Ordering::Relaxed);
        }
        Ok(reallocated)
    }
}

impl fmt::Debug for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Storage")
            .field("id", &self.inner.id)
            .field("dtype", &self.dtype())
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}
