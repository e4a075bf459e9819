//! Closed set of structural operations executed without output reuse.
//!
//! These produce views or fresh containers each call, so their outputs are never
//! truncated and regrown.

use super::frame::Frame;
use super::kernel::Kernel;
use super::schema::{ArgDefault, ArgKind, ArgSpec, OpSchema, Overload};
use crate::error::{Error, Result};
use crate::graph::NodeView;
use crate::value::{Dict, DictKey, Value, ValueList};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeOp {
    ListConstruct,
    ListUnpack,
    TupleConstruct,
    DictConstruct,
    GetItem,
    Transpose,
    Reshape,
    Slice,
    Narrow,
    Permute,
    To,
    Flatten,
}

const VARIADIC: &[ArgSpec] = &[ArgSpec::variadic("items", ArgKind::Any)];

static LIST_CONSTRUCT: OpSchema = OpSchema {
    name: "prim::list_construct",
    overloads: &[Overload {
        name: "variadic",
        args: VARIADIC,
        outputs: 1,
    }],
};

static LIST_UNPACK: OpSchema = OpSchema {
    name: "prim::list_unpack",
    overloads: &[Overload {
        name: "default",
        args: &[ArgSpec::required("list", ArgKind::Any)],
        outputs: 0,
    }],
};

static TUPLE_CONSTRUCT: OpSchema = OpSchema {
    name: "prim::tuple_construct",
    overloads: &[Overload {
        name: "variadic",
        args: VARIADIC,
        outputs: 1,
    }],
};

static DICT_CONSTRUCT: OpSchema = OpSchema {
    name: "prim::dict_construct",
    overloads: &[Overload {
        name: "variadic",
        args: VARIADIC,
        outputs: 1,
    }],
};

static GET_ITEM: OpSchema = OpSchema {
    name: "ops::getitem",
    overloads: &[Overload {
        name: "default",
        args: &[
            ArgSpec::required("container", ArgKind::Any),
            ArgSpec::required("key", ArgKind::Any),
        ],
        outputs: 1,
    }],
};

static TRANSPOSE: OpSchema = OpSchema {
    name: "ops::transpose",
    overloads: &[Overload {
        name: "int",
        args: &[
            ArgSpec::required("self", ArgKind::Tensor),
            ArgSpec::required("dim0", ArgKind::Int),
            ArgSpec::required("dim1", ArgKind::Int),
        ],
        outputs: 1,
    }],
};

static RESHAPE: OpSchema = OpSchema {
    name: "ops::reshape",
    overloads: &[Overload {
        name: "default",
        args: &[
            ArgSpec::required("self", ArgKind::Tensor),
            ArgSpec::required("shape", ArgKind::IntList),
        ],
        outputs: 1,
    }],
};

static SLICE: OpSchema = OpSchema {
    name: "ops::slice",
    overloads: &[Overload {
        name: "tensor",
        args: &[
            ArgSpec::required("self", ArgKind::Tensor),
            ArgSpec::defaulted("dim", ArgKind::Int, ArgDefault::Int(0)),
            ArgSpec::defaulted("start", ArgKind::Int, ArgDefault::None),
            ArgSpec::defaulted("end", ArgKind::Int, ArgDefault::None),
            ArgSpec::defaulted("step", ArgKind::Int, ArgDefault::Int(1)),
        ],
        outputs: 1,
    }],
};

static NARROW: OpSchema = OpSchema {
    name: "ops::narrow",
    overloads: &[Overload {
        name: "default",
        args: &[
            ArgSpec::required("self", ArgKind::Tensor),
            ArgSpec::required("dim", ArgKind::Int),
            ArgSpec::required("start", ArgKind::TensorOrScalar),
            ArgSpec::required("length", ArgKind::Int),
        ],
        outputs: 1,
    }],
};

static PERMUTE: OpSchema = OpSchema {
    name: "ops::permute",
    overloads: &[Overload {
        name: "default",
        args: &[
            ArgSpec::required("self", ArgKind::Tensor),
            ArgSpec::required("dims", ArgKind::IntList),
        ],
        outputs: 1,
    }],
};

static TO: OpSchema = OpSchema {
    name: "ops::to",
    overloads: &[Overload {
        name: "dtype_or_other",
        args: &[
            ArgSpec::required("self", ArgKind::Tensor),
            // dtype, or a tensor whose dtype is adopted
            ArgSpec::nullable("dtype", ArgKind::Any),
            ArgSpec::required("non_blocking", ArgKind::Bool),
            ArgSpec::required("copy", ArgKind::Bool),
            ArgSpec::nullable("memory_format", ArgKind::Any),
        ],
        outputs: 1,
    }],
};

static FLATTEN: OpSchema = OpSchema {
    name: "ops::flatten",
    overloads: &[Overload {
        name: "using_ints",
        args: &[
            ArgSpec::required("self", ArgKind::Tensor),
            ArgSpec::defaulted("start_dim", ArgKind::Int, ArgDefault::Int(0)),
            ArgSpec::defaulted("end_dim", ArgKind::Int, ArgDefault::Int(-1)),
        ],
        outputs: 1,
    }],
};

impl NativeOp {
    pub const ALL: [NativeOp; 12] = [
        NativeOp::ListConstruct,
        NativeOp::ListUnpack,
        NativeOp::TupleConstruct,
        NativeOp::DictConstruct,
        NativeOp::GetItem,
        NativeOp::Transpose,
        NativeOp::Reshape,
        NativeOp::Slice,
        NativeOp::Narrow,
        NativeOp::Permute,
        NativeOp::To,
        NativeOp::Flatten,
    ];

    pub fn schema(self) -> &'static OpSchema {
        match self {
            NativeOp::ListConstruct => &LIST_CONSTRUCT,
            NativeOp::ListUnpack => &LIST_UNPACK,
            NativeOp::TupleConstruct => &TUPLE_CONSTRUCT,
            NativeOp::DictConstruct => &DICT_CONSTRUCT,
            NativeOp::GetItem => &GET_ITEM,
            NativeOp::Transpose => &TRANSPOSE,
            NativeOp::Reshape => &RESHAPE,
            NativeOp::Slice => &SLICE,
            NativeOp::Narrow => &NARROW,
            NativeOp::Permute => &PERMUTE,
            NativeOp::To => &TO,
            NativeOp::Flatten => &FLATTEN,
        }
    }

    pub fn name(self) -> &'static str {
        self.schema().name
    }

    pub fn from_name(op: &str) -> Option<NativeOp> {
        Self::ALL.into_iter().find(|n| n.name() == op)
    }

    /// Native operation for `node`, if its name and arity qualify.
    pub fn from_node(node: NodeView<'_>) -> Option<NativeOp> {
        let native = Self::from_name(node.op())?;
        match native {
            NativeOp::To => (node.arity() == 5).then_some(native),
            _ => Some(native),
        }
    }

    /// Checks arity and constant kinds once and returns the overload used for
    /// argument defaults.
    pub fn overload(self, node: NodeView<'_>) -> Result<&'static Overload> {
        let (_, overload) = self.schema().select(node.arity())?;
        if self == NativeOp::DictConstruct && node.arity() % 2 != 0 {
            return Err(Error::ArityMismatch {
                op: node.op().to_string(),
                expected: "an even number of".to_string(),
                actual: node.arity(),
            });
        }
        // list_unpack has as many outputs as the list has elements
        if self != NativeOp::ListUnpack && node.outputs().len() != overload.outputs {
            return Err(Error::graph(format!(
                "`{}` produces {} outputs, node declares {}",
                node.op(),
                overload.outputs,
                node.outputs().len()
            )));
        }
        overload.check_constants(node)?;
        Ok(overload)
    }

    pub fn kernel(self) -> Kernel {
        match self {
            NativeOp::ListConstruct => Kernel::generic(|frame| {
                let items = frame.input_values()?;
                frame.set_output(0, Value::List(ValueList::new(items)))
            }),
            NativeOp::TupleConstruct => Kernel::generic(|frame| {
                let items = frame.input_values()?;
                frame.set_output(0, Value::Tuple(ValueList::new(items)))
            }),
            NativeOp::ListUnpack => Kernel::generic(list_unpack),
            NativeOp::DictConstruct => Kernel::generic(|frame| {
                let values = frame.input_values()?;
                let pairs = values
                    .chunks_exact(2)
                    .map(|kv| Ok((DictKey::from_value(&kv[0])?, kv[1].clone())))
                    .collect::<Result<Vec<_>>>()?;
                frame.set_output(0, Value::Dict(Dict::new(pairs)))
            }),
            NativeOp::GetItem => Kernel::generic(get_item),
            NativeOp::Transpose => Kernel::generic(|frame| {
                let view = frame.tensor(0)?.transpose(frame.int(1)?, frame.int(2)?)?;
                frame.set_output(0, view.into())
            }),
            NativeOp::Reshape => Kernel::generic(|frame| {
                let shape = frame.int_list(1)?;
                let out = frame.tensor(0)?.reshape(&shape)?;
                frame.set_output(0, out.into())
            }),
            NativeOp::Slice => Kernel::generic(|frame| {
                let view = frame.tensor(0)?.slice(
                    frame.int(1)?,
                    frame.optional_int(2)?,
                    frame.optional_int(3)?,
                    frame.int(4)?,
                )?;
                frame.set_output(0, view.into())
            }),
            NativeOp::Narrow => Kernel::generic(|frame| {
                let start = match frame.value(2)?.as_ref() {
                    Value::Tensor(t) => t.item::<i64>()?,
                    other => other.to_int()?,
                };
                let view = frame.tensor(0)?.narrow(frame.int(1)?, start, frame.int(3)?)?;
                frame.set_output(0, view.into())
            }),
            NativeOp::Permute => Kernel::generic(|frame| {
                let dims = frame.int_list(1)?;
                let view = frame.tensor(0)?.permute(&dims)?;
                frame.set_output(0, view.into())
            }),
            NativeOp::To => Kernel::generic(|frame| {
                let src = frame.tensor(0)?;
                let dtype = frame.target_dtype(1)?.unwrap_or(src.dtype());
                let out = src.to_dtype(dtype, frame.bool(3)?)?;
                frame.set_output(0, out.into())
            }),
            NativeOp::Flatten => Kernel::generic(|frame| {
                let out = frame.tensor(0)?.flatten(frame.int(1)?, frame.int(2)?)?;
                frame.set_output(0, out.into())
            }),
        }
    }
}

fn list_unpack(frame: &mut Frame<'_>) -> Result<()> {
    let list = match frame.value(0)?.as_ref() {
        Value::List(list) | Value::Tuple(list) => list.to_vec(),
        other => {
            return Err(Error::TypeProjection {
                expected: "list",
                found: other.type_name(),
            })
        }
    };
    if list.len() != frame.output_count() {
        return Err(Error::invalid(format!(
            "cannot unpack a list of {} elements into {} outputs",
            list.len(),
            frame.output_count()
        )));
    }
    for (i, item) in list.into_iter().enumerate() {
        frame.set_output(i, item)?;
    }
    Ok(())
}

fn get_item(frame: &mut Frame<'_>) -> Result<()> {
    let container = frame.value(0)?;
    let key = frame.value(1)?;
    let item = match container.as_ref() {
        Value::Dict(dict) => dict.at(&DictKey::from_value(&key)?)?.clone(),
        Value::List(list) | Value::Tuple(list) => {
            let index = key.to_int()?;
            let len = list.len() as i64;
            let wrapped = if index < 0 { index + len } else { index };
            if !(0..len).contains(&wrapped) {
                return Err(Error::invalid(format!(
                    "list index {index} out of range for length {len}"
                )));
            }
            list.get(wrapped as usize)
                .ok_or_else(|| Error::invalid("list changed during indexing"))?
        }
        other => {
            return Err(Error::TypeProjection {
                expected: "dict, list or tuple",
                found: other.type_name(),
            })
        }
    };
    frame.set_output(0, item)
}
