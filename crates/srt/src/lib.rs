extern crate self as srt;

pub use linkme;

pub mod codegen;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod graph;
pub mod math;
pub mod ops;
pub mod profiling;
pub mod runtime;
pub mod tensor;
pub mod value;
mod env;

pub use config::RuntimeOptions;
pub use dispatch::DispatchPath;
pub use error::{Error, Result};
pub use graph::{Graph, GraphBuilder, Node, ValueId};
pub use ops::OperatorRegistry;
pub use profiling::{NodeTimings, RunStats};
pub use runtime::StaticModule;
pub use tensor::{DType, Scalar, Tensor};
pub use value::{Slot, Value};
