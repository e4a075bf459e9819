//! Per-operation argument schemas checked once at specialization.

use std::fmt;

use crate::error::{Error, Result};
use crate::graph::NodeView;
use crate::value::Value;

/// Declared type of a positional argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    Tensor,
    /// Tensor or host scalar; scalars are wrapped into 0-dim tensors.
    TensorOrScalar,
    Scalar,
    Int,
    Double,
    Bool,
    Str,
    DType,
    IntList,
    TensorList,
    Any,
}

impl ArgKind {
    /// Whether a present, non-`None` value can be read as this kind.
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            ArgKind::Tensor => matches!(value, Value::Tensor(_)),
            ArgKind::TensorOrScalar => matches!(
                value,
                Value::Tensor(_) | Value::Int(_) | Value::Double(_) | Value::Bool(_)
            ),
            ArgKind::Scalar => matches!(value, Value::Int(_) | Value::Double(_) | Value::Bool(_)),
            ArgKind::Int => matches!(value, Value::Int(_)),
            ArgKind::Double => matches!(value, Value::Int(_) | Value::Double(_)),
            ArgKind::Bool => matches!(value, Value::Bool(_)),
            ArgKind::Str => matches!(value, Value::Str(_)),
            ArgKind::DType => matches!(value, Value::DType(_)),
            ArgKind::IntList => value.to_int_vec().is_ok(),
            ArgKind::TensorList => matches!(value, Value::List(_) | Value::Tuple(_)),
            ArgKind::Any => true,
        }
    }
}

/// Value used when a trailing optional argument is absent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArgDefault {
    None,
    Int(i64),
    Double(f64),
    Bool(bool),
    Str(&'static str),
    IntList(&'static [i64]),
}

impl ArgDefault {
    pub fn to_value(self) -> Value {
        match self {
            ArgDefault::None => Value::None,
            ArgDefault::Int(v) => Value::Int(v),
            ArgDefault::Double(v) => Value::Double(v),
            ArgDefault::Bool(v) => Value::Bool(v),
            ArgDefault::Str(v) => Value::Str(v.to_string()),
            ArgDefault::IntList(v) => Value::from(v.to_vec()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ArgSpec {
    pub name: &'static str,
    pub kind: ArgKind,
    pub optional: bool,
    pub default: Option<ArgDefault>,
    /// Absorbs every remaining input; only valid as the last argument.
    pub variadic: bool,
}

impl ArgSpec {
    pub const fn required(name: &'static str, kind: ArgKind) -> Self {
        Self {
            name,
            kind,
            optional: false,
            default: None,
            variadic: false,
        }
    }

    /// Argument that may be `None` at run time but must be present in the node.
    pub const fn nullable(name: &'static str, kind: ArgKind) -> Self {
        Self {
            name,
            kind,
            optional: true,
            default: None,
            variadic: false,
        }
    }

    /// Trailing argument that may be omitted from the node entirely.
    pub const fn defaulted(name: &'static str, kind: ArgKind, default: ArgDefault) -> Self {
        Self {
            name,
            kind,
            optional: matches!(default, ArgDefault::None),
            default: Some(default),
            variadic: false,
        }
    }

    /// Zero or more trailing inputs of `kind`.
    pub const fn variadic(name: &'static str, kind: ArgKind) -> Self {
        Self {
            name,
            kind,
            optional: false,
            default: None,
            variadic: true,
        }
    }
}

/// One accepted signature of an operation.
#[derive(Debug)]
pub struct Overload {
    pub name: &'static str,
    pub args: &'static [ArgSpec],
    pub outputs: usize,
}

impl Overload {
    /// Number of leading arguments without a default.
    pub fn required(&self) -> usize {
        self.args
            .iter()
            .rposition(|a| a.default.is_none() && !a.variadic)
            .map_or(0, |i| i + 1)
    }

    pub fn is_variadic(&self) -> bool {
        self.args.last().is_some_and(|a| a.variadic)
    }

    pub fn accepts(&self, arity: usize) -> bool {
        if self.is_variadic() {
            return arity >= self.required();
        }
        (self.required()..=self.args.len()).contains(&arity)
    }

    /// Declared argument at position `i`; a variadic tail covers every later position.
    pub fn arg(&self, i: usize) -> Option<&ArgSpec> {
        self.args
            .get(i)
            .or_else(|| self.args.last().filter(|a| a.variadic))
    }

    /// Rejects graph constants whose kind this overload cannot read.
    ///
    /// Inputs produced at run time are checked by the kernel's own projections.
    pub fn check_constants(&self, node: NodeView<'_>) -> Result<()> {
        for i in 0..node.arity() {
            let Some(spec) = self.arg(i).filter(|spec| spec.kind != ArgKind::Any) else {
                continue;
            };
            let Some(value) = node.constant_input(i)? else {
                continue;
            };
            let fits = if value.is_none() {
                spec.optional
            } else {
                spec.kind.accepts(&value)
            };
            if !fits {
                return Err(Error::invalid(format!(
                    "`{}` argument `{}` expects {:?}{}, got a {} constant",
                    node.op(),
                    spec.name,
                    spec.kind,
                    if spec.optional { "?" } else { "" },
                    value.type_name()
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct OpSchema {
    pub name: &'static str,
    pub overloads: &'static [Overload],
}

impl OpSchema {
    /// First overload whose arity range contains `arity`.
    pub fn select(&self, arity: usize) -> Result<(usize, &'static Overload)> {
        self.overloads
            .iter()
            .enumerate()
            .find(|(_, o)| o.accepts(arity))
            .ok_or_else(|| Error::ArityMismatch {
                op: self.name.to_string(),
                expected: self.arity_summary(),
                actual: arity,
            })
    }

    fn arity_summary(&self) -> String {
        let ranges: Vec<String> = self
            .overloads
            .iter()
            .map(|o| {
                let (lo, hi) = (o.required(), o.args.len());
                if o.is_variadic() {
                    format!("{lo} or more")
                } else if lo == hi {
                    lo.to_string()
                } else {
                    format!("{lo}..={hi}")
                }
            })
            .collect();
        ranges.join(" or ")
    }
}

impl fmt::Display for Overload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            if arg.variadic {
                f.write_str("*")?;
            }
            write!(f, "{}: {:?}", arg.name, arg.kind)?;
            if arg.optional {
                f.write_str("?")?;
            }
        }
        write!(f, ") -> {}", self.outputs)
    }
}
