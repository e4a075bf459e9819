use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::tensor::{DType, Element, Tensor};
use crate::value::{Value, ValueList};
use crate::with_element_type;

/// Dense tensor constant embedded in a graph document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorLiteral {
    pub dtype: DType,
    pub sizes: Vec<usize>,
    /// Row-major elements, converted to `dtype` on load.
    pub data: Vec<f64>,
}

impl TensorLiteral {
    pub fn from_tensor(tensor: &Tensor) -> Result<Self> {
        Ok(Self {
            dtype: tensor.dtype(),
            sizes: tensor.sizes().to_vec(),
            data: tensor.to_vec::<f64>()?,
        })
    }

    pub fn to_tensor(&self) -> Result<Tensor> {
        with_element_type!(self.dtype, |T| {
            let data: Vec<T> = self.data.iter().map(|&v| T::from_f64(v)).collect();
            Tensor::from_vec(&self.sizes, data)
        })
    }
}

/// Statically-known attribute value baked into the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Literal {
    None,
    Int(i64),
    Double(f64),
    Bool(bool),
    Str(String),
    DType(DType),
    IntList(Vec<i64>),
    DoubleList(Vec<f64>),
    Tensor(TensorLiteral),
}

impl Literal {
    pub fn to_value(&self) -> Result<Value> {
        Ok(match self {
            Literal::None => Value::None,
            Literal::Int(v) => Value::Int(*v),
            Literal::Double(v) => Value::Double(*v),
            Literal::Bool(v) => Value::Bool(*v),
            Literal::Str(v) => Value::Str(v.clone()),
            Literal::DType(v) => Value::DType(*v),
            Literal::IntList(v) => Value::from(v.clone()),
            Literal::DoubleList(v) => {
                Value::List(ValueList::new(v.iter().map(|&d| Value::Double(d)).collect()))
            }
            Literal::Tensor(t) => Value::Tensor(t.to_tensor()?),
        })
    }

    /// Inverse of [`Literal::to_value`] for the value kinds a graph can embed.
    pub fn from_value(value: &Value) -> Result<Self> {
        Ok(match value {
            Value::None => Literal::None,
            Value::Int(v) => Literal::Int(*v),
            Value::Double(v) => Literal::Double(*v),
            Value::Bool(v) => Literal::Bool(*v),
            Value::Str(v) => Literal::Str(v.clone()),
            Value::DType(v) => Literal::DType(*v),
            Value::Tensor(t) => Literal::Tensor(TensorLiteral::from_tensor(t)?),
            Value::List(_) => match value.to_int_vec() {
                Ok(ints) => Literal::IntList(ints),
                Err(_) => {
                    return Err(Error::graph(
                        "only int lists can be embedded as graph constants",
                    ))
                }
            },
            other => {
                return Err(Error::graph(format!(
                    "{} cannot be embedded as a graph constant",
                    other.type_name()
                )))
            }
        })
    }
}

impl From<i64> for Literal {
    fn from(v: i64) -> Self {
        Literal::Int(v)
    }
}

impl From<f64> for Literal {
    fn from(v: f64) -> Self {
        Literal::Double(v)
    }
}

impl From<bool> for Literal {
    fn from(v: bool) -> Self {
        Literal::Bool(v)
    }
}

impl From<&str> for Literal {
    fn from(v: &str) -> Self {
        Literal::Str(v.to_string())
    }
}

impl From<DType> for Literal {
    fn from(v: DType) -> Self {
        Literal::DType(v)
    }
}

impl From<Vec<i64>> for Literal {
    fn from(v: Vec<i64>) -> Self {
        Literal::IntList(v)
    }
}

impl From<&[i64]> for Literal {
    fn from(v: &[i64]) -> Self {
        Literal::IntList(v.to_vec())
    }
}
