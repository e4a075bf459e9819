use crate::error::Result;
use crate::math;
use crate::ops::schema::{ArgDefault, ArgKind, ArgSpec, OpSchema, Overload};
use crate::ops::Frame;
use crate::tensor::DType;

const LIST_AND_DIM: &[ArgSpec] = &[
    ArgSpec::required("tensors", ArgKind::TensorList),
    ArgSpec::defaulted("dim", ArgKind::Int, ArgDefault::Int(0)),
];

static CAT: OpSchema = OpSchema {
    name: "ops::cat",
    overloads: &[Overload {
        name: "default",
        args: LIST_AND_DIM,
        outputs: 1,
    }],
};

static STACK: OpSchema = OpSchema {
    name: "ops::stack",
    overloads: &[Overload {
        name: "default",
        args: LIST_AND_DIM,
        outputs: 1,
    }],
};

static NARROW_COPY: OpSchema = OpSchema {
    name: "ops::narrow_copy",
    overloads: &[Overload {
        name: "default",
        args: &[
            ArgSpec::required("self", ArgKind::Tensor),
            ArgSpec::required("dim", ArgKind::Int),
            ArgSpec::required("start", ArgKind::Int),
            ArgSpec::required("length", ArgKind::Int),
        ],
        outputs: 1,
    }],
};

static INDEX: OpSchema = OpSchema {
    name: "ops::index",
    overloads: &[Overload {
        name: "tensor",
        args: &[
            ArgSpec::required("self", ArgKind::Tensor),
            ArgSpec::required("indices", ArgKind::TensorList),
        ],
        outputs: 1,
    }],
};

static TO_COPY: OpSchema = OpSchema {
    name: "ops::to_copy",
    overloads: &[Overload {
        name: "dtype_or_other",
        args: &[
            ArgSpec::required("self", ArgKind::Tensor),
            ArgSpec::nullable("dtype", ArgKind::Any),
            ArgSpec::required("non_blocking", ArgKind::Bool),
            ArgSpec::required("copy", ArgKind::Bool),
            ArgSpec::defaulted("memory_format", ArgKind::Any, ArgDefault::None),
        ],
        outputs: 1,
    }],
};

static RESHAPE_COPY: OpSchema = OpSchema {
    name: "ops::reshape_copy",
    overloads: &[Overload {
        name: "default",
        args: &[
            ArgSpec::required("self", ArgKind::Tensor),
            ArgSpec::required("shape", ArgKind::IntList),
        ],
        outputs: 1,
    }],
};

static FLATTEN_COPY: OpSchema = OpSchema {
    name: "ops::flatten_copy",
    overloads: &[Overload {
        name: "default",
        args: &[
            ArgSpec::required("self", ArgKind::Tensor),
            ArgSpec::defaulted("start_dim", ArgKind::Int, ArgDefault::Int(0)),
            ArgSpec::defaulted("end_dim", ArgKind::Int, ArgDefault::Int(-1)),
        ],
        outputs: 1,
    }],
};

register_op!(REGISTER_CAT, CAT, stateless cat);
register_op!(REGISTER_STACK, STACK, stateless stack);
register_op!(REGISTER_NARROW_COPY, NARROW_COPY, stateless narrow_copy);
register_op!(REGISTER_INDEX, INDEX, stateless index);
register_op!(REGISTER_TO_COPY, TO_COPY, stateless to_copy);
register_op!(REGISTER_RESHAPE_COPY, RESHAPE_COPY, stateless reshape_copy);
register_op!(REGISTER_FLATTEN_COPY, FLATTEN_COPY, stateless flatten_copy);

fn cat(frame: &mut Frame<'_>) -> Result<()> {
    let tensors = frame.tensor_list(0)?;
    let dim = frame.int(1)?;
    let dtype = tensors.first().map_or(DType::F32, |t| t.dtype());
    math::cat(frame.out_tensor(0, dtype)?, &tensors, dim)
}

fn stack(frame: &mut Frame<'_>) -> Result<()> {
    let tensors = frame.tensor_list(0)?;
    let dim = frame.int(1)?;
    let dtype = tensors.first().map_or(DType::F32, |t| t.dtype());
    math::stack(frame.out_tensor(0, dtype)?, &tensors, dim)
}

fn narrow_copy(frame: &mut Frame<'_>) -> Result<()> {
    let src = frame.tensor(0)?;
    let (dim, start, length) = (frame.int(1)?, frame.int(2)?, frame.int(3)?);
    math::narrow_copy(frame.out_tensor(0, src.dtype())?, src, dim, start, length)
}

fn index(frame: &mut Frame<'_>) -> Result<()> {
    let src = frame.tensor(0)?;
    let indices = frame.optional_tensor_list(1)?;
    math::index(frame.out_tensor(0, src.dtype())?, src, &indices)
}

fn to_copy(frame: &mut Frame<'_>) -> Result<()> {
    let src = frame.tensor(0)?;
    let dtype = frame.target_dtype(1)?.unwrap_or(src.dtype());
    math::copy(frame.out_tensor(0, dtype)?, src, dtype)
}

fn reshape_copy(frame: &mut Frame<'_>) -> Result<()> {
    let src = frame.tensor(0)?;
    let shape = frame.int_list(1)?;
    math::reshape_copy(frame.out_tensor(0, src.dtype())?, src, &shape)
}

fn flatten_copy(frame: &mut Frame<'_>) -> Result<()> {
    let src = frame.tensor(0)?;
    let (start, end) = (frame.int(1)?, frame.int(2)?);
    math::flatten_copy(frame.out_tensor(0, src.dtype())?, src, start, end)
}
