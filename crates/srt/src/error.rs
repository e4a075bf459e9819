//! Failure taxonomy shared by the registry, kernels, math routines and runtime.
//!
//! Nothing in the engine converts an error into a soft result: every `?` bubbles
//! up to [`crate::StaticModule::run`], which abandons the current run.

use thiserror::Error;

use crate::tensor::DType;

#[derive(Debug, Error)]
pub enum Error {
    /// The op has neither a registered out variant nor a native implementation.
    #[error("operation `{op}` has no registered kernel and no native implementation")]
    UnregisteredOperation { op: String },

    #[error("operation `{op}` is already registered")]
    DuplicateRegistration { op: String },

    /// Node arity did not match any overload accepted by the kernel factory.
    #[error("operation `{op}` accepts {expected} inputs, node has {actual}")]
    ArityMismatch {
        op: String,
        expected: String,
        actual: usize,
    },

    #[error("expected {expected}, found {found}")]
    TypeProjection {
        expected: &'static str,
        found: &'static str,
    },

    #[error("key {key} is not present in dictionary")]
    KeyNotFound { key: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("shape error: {0}")]
    Shape(String),

    #[error("`{op}` does not support dtype {dtype}")]
    DType { op: &'static str, dtype: DType },

    #[error("codegen failed: {0}")]
    Codegen(String),

    #[error("malformed graph: {0}")]
    Graph(String),

    /// Wraps a failure raised while executing one node.
    #[error("node {index} (`{op}`) failed: {source}")]
    Node {
        index: usize,
        op: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    pub fn shape(msg: impl Into<String>) -> Self {
        Error::Shape(msg.into())
    }

    pub fn graph(msg: impl Into<String>) -> Self {
        Error::Graph(msg.into())
    }

    pub fn codegen(msg: impl Into<String>) -> Self {
        Error::Codegen(msg.into())
    }

    pub fn dtype(op: &'static str, dtype: DType) -> Self {
        Error::DType { op, dtype }
    }

    pub(crate) fn at_node(self, index: usize, op: &str) -> Self {
        Error::Node {
            index,
            op: op.to_string(),
            source: Box::new(self),
        }
    }

    /// Strips [`Error::Node`] wrappers and returns the underlying failure.
    pub fn root(&self) -> &Error {
        match self {
            Error::Node { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
