//! Host tensor storage layer: dtypes, shared buffers, strided views.

pub mod dtype;
pub mod element;
pub mod host_tensor;
pub mod layout;
pub mod scalar;
pub mod storage;

pub use dtype::{Category, DType};
pub use element::{cast, Element};
pub use host_tensor::Tensor;
pub use layout::Dims;
pub use scalar::Scalar;
pub use storage::{Buffer, Storage, StorageId};
