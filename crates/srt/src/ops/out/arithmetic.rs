use crate::error::Result;
use crate::math::{self, RoundingMode};
use crate::ops::schema::{ArgDefault, ArgKind, ArgSpec, OpSchema, Overload};
use crate::ops::Frame;

const BINARY_ARGS: &[ArgSpec] = &[
    ArgSpec::required("self", ArgKind::Tensor),
    ArgSpec::required("other", ArgKind::TensorOrScalar),
];

const ALPHA_ARGS: &[ArgSpec] = &[
    ArgSpec::required("self", ArgKind::Tensor),
    ArgSpec::required("other", ArgKind::TensorOrScalar),
    ArgSpec::defaulted("alpha", ArgKind::Scalar, ArgDefault::Int(1)),
];

static ADD: OpSchema = OpSchema {
    name: "ops::add",
    overloads: &[Overload {
        name: "tensor",
        args: ALPHA_ARGS,
        outputs: 1,
    }],
};

static SUB: OpSchema = OpSchema {
    name: "ops::sub",
    overloads: &[Overload {
        name: "tensor",
        args: ALPHA_ARGS,
        outputs: 1,
    }],
};

static MUL: OpSchema = OpSchema {
    name: "ops::mul",
    overloads: &[Overload {
        name: "tensor",
        args: BINARY_ARGS,
        outputs: 1,
    }],
};

static DIV: OpSchema = OpSchema {
    name: "ops::div",
    overloads: &[Overload {
        name: "tensor_mode",
        args: &[
            ArgSpec::required("self", ArgKind::Tensor),
            ArgSpec::required("other", ArgKind::TensorOrScalar),
            ArgSpec::defaulted("rounding_mode", ArgKind::Str, ArgDefault::None),
        ],
        outputs: 1,
    }],
};

/// `Tensor ** Tensor`, `Tensor ** Scalar` and `Scalar ** Tensor`.
static POW: OpSchema = OpSchema {
    name: "ops::pow",
    overloads: &[Overload {
        name: "any",
        args: &[
            ArgSpec::required("self", ArgKind::TensorOrScalar),
            ArgSpec::required("exponent", ArgKind::TensorOrScalar),
        ],
        outputs: 1,
    }],
};

static ADDMM: OpSchema = OpSchema {
    name: "ops::addmm",
    overloads: &[Overload {
        name: "default",
        args: &[
            ArgSpec::required("self", ArgKind::Tensor),
            ArgSpec::required("mat1", ArgKind::Tensor),
            ArgSpec::required("mat2", ArgKind::Tensor),
            ArgSpec::defaulted("beta", ArgKind::Scalar, ArgDefault::Int(1)),
            ArgSpec::defaulted("alpha", ArgKind::Scalar, ArgDefault::Int(1)),
        ],
        outputs: 1,
    }],
};

static BMM: OpSchema = OpSchema {
    name: "ops::bmm",
    overloads: &[Overload {
        name: "default",
        args: &[
            ArgSpec::required("self", ArgKind::Tensor),
            ArgSpec::required("mat2", ArgKind::Tensor),
        ],
        outputs: 1,
    }],
};

register_op!(REGISTER_ADD, ADD, stateless add);
register_op!(REGISTER_SUB, SUB, stateless sub);
register_op!(REGISTER_MUL, MUL, stateless mul);
register_op!(REGISTER_DIV, DIV, stateless div);
register_op!(REGISTER_POW, POW, stateless pow);
register_op!(REGISTER_ADDMM, ADDMM, stateless addmm);
register_op!(REGISTER_BMM, BMM, stateless bmm);

fn add(frame: &mut Frame<'_>) -> Result<()> {
    let a = frame.tensor(0)?;
    let b = frame.tensor_or_scalar(1)?;
    let alpha = frame.scalar(2)?;
    math::add(frame.out_tensor(0, a.dtype())?, a, &b, alpha)
}

fn sub(frame: &mut Frame<'_>) -> Result<()> {
    let a = frame.tensor(0)?;
    let b = frame.tensor_or_scalar(1)?;
    let alpha = frame.scalar(2)?;
    math::sub(frame.out_tensor(0, a.dtype())?, a, &b, alpha)
}

fn mul(frame: &mut Frame<'_>) -> Result<()> {
    let a = frame.tensor(0)?;
    let b = frame.tensor_or_scalar(1)?;
    math::mul(frame.out_tensor(0, a.dtype())?, a, &b)
}

fn div(frame: &mut Frame<'_>) -> Result<()> {
    let a = frame.tensor(0)?;
    let b = frame.tensor_or_scalar(1)?;
    let mode = frame
        .optional_str(2)?
        .map(|m| RoundingMode::parse(&m))
        .transpose()?;
    math::div(frame.out_tensor(0, a.dtype())?, a, &b, mode)
}

fn pow(frame: &mut Frame<'_>) -> Result<()> {
    let base = frame.tensor_or_scalar(0)?;
    let exponent = frame.tensor_or_scalar(1)?;
    math::pow(frame.out_tensor(0, base.dtype())?, &base, &exponent)
}

fn addmm(frame: &mut Frame<'_>) -> Result<()> {
    let input = frame.tensor(0)?;
    let mat1 = frame.tensor(1)?;
    let mat2 = frame.tensor(2)?;
    let beta = frame.scalar(3)?;
    let alpha = frame.scalar(4)?;
    math::addmm(frame.out_tensor(0, mat1.dtype())?, input, mat1, mat2, beta, alpha)
}

fn bmm(frame: &mut Frame<'_>) -> Result<()> {
    let a = frame.tensor(0)?;
    let b = frame.tensor(1)?;
    math::bmm(frame.out_tensor(0, a.dtype())?, a, b)
}
