//! Runtime values flowing between nodes, and the slots that hold them.

mod dict;
mod list;
mod slot;

pub use dict::{Dict, DictKey};
pub use list::ValueList;
pub use slot::Slot;

use crate::error::{Error, Result};
use crate::tensor::{DType, Scalar, Tensor};

/// Fully-typed runtime value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    None,
    Tensor(Tensor),
    Int(i64),
    Double(f64),
    Bool(bool),
    Str(String),
    DType(DType),
    List(ValueList),
    Tuple(ValueList),
    Dict(Dict),
}

macro_rules! projection {
    ($(#[$meta:meta])* $name:ident, $variant:ident, $ty:ty, $expected:literal) => {
        $(#[$meta])*
        pub fn $name(&self) -> Result<$ty> {
            match self {
                Value::$variant(v) => Ok(v.clone()),
                other => Err(other.mismatch($expected)),
            }
        }
    };
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "None",
            Value::Tensor(_) => "Tensor",
            Value::Int(_) => "int",
            Value::Double(_) => "float",
            Value::Bool(_) => "bool",
            Value::Str(_) => "str",
            Value::DType(_) => "dtype",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Dict(_) => "dict",
        }
    }

    fn mismatch(&self, expected: &'static str) -> Error {
        Error::TypeProjection {
            expected,
            found: self.type_name(),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    /// Borrowing projection; the hot path for kernel inputs.
    pub fn to_tensor(&self) -> Result<&Tensor> {
        match self {
            Value::Tensor(t) => Ok(t),
            other => Err(other.mismatch("Tensor")),
        }
    }

    projection!(to_int, Int, i64, "int");
    projection!(to_double, Double, f64, "float");
    projection!(to_bool, Bool, bool, "bool");
    projection!(to_str, Str, String, "str");
    projection!(to_dtype, DType, DType, "dtype");
    projection!(to_list, List, ValueList, "list");
    projection!(to_tuple, Tuple, ValueList, "tuple");
    projection!(to_dict, Dict, Dict, "dict");

    /// Accepts any numeric host scalar.
    pub fn to_scalar(&self) -> Result<Scalar> {
        match self {
            Value::Int(v) => Ok(Scalar::Int(*v)),
            Value::Double(v) => Ok(Scalar::Double(*v)),
            Value::Bool(v) => Ok(Scalar::Bool(*v)),
            other => Err(other.mismatch("scalar")),
        }
    }

    /// Tensor operand, wrapping a host scalar into a 0-dim tensor.
    pub fn to_tensor_or_wrap(&self) -> Result<Tensor> {
        match self {
            Value::Tensor(t) => Ok(t.clone()),
            Value::Int(_) | Value::Double(_) | Value::Bool(_) => {
                Ok(Tensor::wrap_scalar(self.to_scalar()?))
            }
            other => Err(other.mismatch("Tensor or scalar")),
        }
    }

    pub fn to_int_vec(&self) -> Result<Vec<i64>> {
        match self {
            Value::List(list) | Value::Tuple(list) => list.with_items(|items| {
                items.iter().map(Value::to_int).collect::<Result<Vec<_>>>()
            }),
            Value::Int(v) => Ok(vec![*v]),
            other => Err(other.mismatch("int[]")),
        }
    }

    pub fn to_tensor_vec(&self) -> Result<Vec<Tensor>> {
        match self {
            Value::List(list) | Value::Tuple(list) => list.with_items(|items| {
                items
                    .iter()
                    .map(|item| item.to_tensor().cloned())
                    .collect::<Result<Vec<_>>>()
            }),
            other => Err(other.mismatch("Tensor[]")),
        }
    }

    /// List of optional tensors, as taken by advanced indexing.
    pub fn to_optional_tensor_vec(&self) -> Result<Vec<Option<Tensor>>> {
        match self {
            Value::List(list) | Value::Tuple(list) => list.with_items(|items| {
                items
                    .iter()
                    .map(|item| item.to_optional_tensor().map(|t| t.cloned()))
                    .collect::<Result<Vec<_>>>()
            }),
            other => Err(other.mismatch("Tensor?[]")),
        }
    }

    pub fn to_optional_tensor(&self) -> Result<Option<&Tensor>> {
        match self {
            Value::None => Ok(None),
            other => other.to_tensor().map(Some),
        }
    }

    pub fn to_optional_int(&self) -> Result<Option<i64>> {
        match self {
            Value::None => Ok(None),
            other => other.to_int().map(Some),
        }
    }

    pub fn to_optional_double(&self) -> Result<Option<f64>> {
        match self {
            Value::None => Ok(None),
            Value::Int(v) => Ok(Some(*v as f64)),
            other => other.to_double().map(Some),
        }
    }

    pub fn to_optional_scalar(&self) -> Result<Option<Scalar>> {
        match self {
            Value::None => Ok(None),
            other => other.to_scalar().map(Some),
        }
    }

    pub fn to_optional_dtype(&self) -> Result<Option<DType>> {
        match self {
            Value::None => Ok(None),
            other => other.to_dtype().map(Some),
        }
    }

    pub fn to_optional_str(&self) -> Result<Option<String>> {
        match self {
            Value::None => Ok(None),
            other => other.to_str().map(Some),
        }
    }

    pub fn to_optional_int_vec(&self) -> Result<Option<Vec<i64>>> {
        match self {
            Value::None => Ok(None),
            other => other.to_int_vec().map(Some),
        }
    }
}

impl From<Tensor> for Value {
    fn from(t: Tensor) -> Self {
        Value::Tensor(t)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<DType> for Value {
    fn from(v: DType) -> Self {
        Value::DType(v)
    }
}

impl From<Scalar> for Value {
    fn from(v: Scalar) -> Self {
        match v {
            Scalar::Int(v) => Value::Int(v),
            Scalar::Double(v) => Value::Double(v),
            Scalar::Bool(v) => Value::Bool(v),
        }
    }
}

impl From<Vec<i64>> for Value {
    fn from(v: Vec<i64>) -> Self {
        Value::List(ValueList::new(v.into_iter().map(Value::Int).collect()))
    }
}

impl From<Vec<Tensor>> for Value {
    fn from(v: Vec<Tensor>) -> Self {
        Value::List(ValueList::new(v.into_iter().map(Value::Tensor).collect()))
    }
}
