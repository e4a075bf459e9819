use crate::codegen::{formula, DEFAULT_VECTOR_WIDTH, NARROW_VECTOR_WIDTH};
use crate::error::Result;
use crate::math;
use crate::ops::schema::{ArgDefault, ArgKind, ArgSpec, OpSchema, Overload};
use crate::ops::{Frame, Kernel, KernelContext, VectorizedKernel};
use crate::value::Value;

const SELF_ONLY: &[ArgSpec] = &[ArgSpec::required("self", ArgKind::Tensor)];

static RELU: OpSchema = OpSchema {
    name: "ops::relu",
    overloads: &[Overload {
        name: "default",
        args: SELF_ONLY,
        outputs: 1,
    }],
};

static TANH: OpSchema = OpSchema {
    name: "ops::tanh",
    overloads: &[Overload {
        name: "default",
        args: SELF_ONLY,
        outputs: 1,
    }],
};

static SIGMOID: OpSchema = OpSchema {
    name: "ops::sigmoid",
    overloads: &[Overload {
        name: "default",
        args: SELF_ONLY,
        outputs: 1,
    }],
};

static LOGIT: OpSchema = OpSchema {
    name: "ops::logit",
    overloads: &[Overload {
        name: "default",
        args: &[
            ArgSpec::required("self", ArgKind::Tensor),
            ArgSpec::defaulted("eps", ArgKind::Double, ArgDefault::None),
        ],
        outputs: 1,
    }],
};

static CLAMP: OpSchema = OpSchema {
    name: "ops::clamp",
    overloads: &[Overload {
        name: "default",
        args: &[
            ArgSpec::required("self", ArgKind::Tensor),
            ArgSpec::defaulted("min", ArgKind::Scalar, ArgDefault::None),
            ArgSpec::defaulted("max", ArgKind::Scalar, ArgDefault::None),
        ],
        outputs: 1,
    }],
};

static CLAMP_MIN: OpSchema = OpSchema {
    name: "ops::clamp_min",
    overloads: &[Overload {
        name: "default",
        args: &[
            ArgSpec::required("self", ArgKind::Tensor),
            ArgSpec::required("min", ArgKind::Scalar),
        ],
        outputs: 1,
    }],
};

static NAN_TO_NUM: OpSchema = OpSchema {
    name: "ops::nan_to_num",
    overloads: &[Overload {
        name: "default",
        args: &[
            ArgSpec::required("self", ArgKind::Tensor),
            ArgSpec::defaulted("nan", ArgKind::Double, ArgDefault::None),
            ArgSpec::defaulted("posinf", ArgKind::Double, ArgDefault::None),
            ArgSpec::defaulted("neginf", ArgKind::Double, ArgDefault::None),
        ],
        outputs: 1,
    }],
};

static LEAKY_RELU: OpSchema = OpSchema {
    name: "ops::leaky_relu",
    overloads: &[Overload {
        name: "default",
        args: &[
            ArgSpec::required("self", ArgKind::Tensor),
            ArgSpec::defaulted("negative_slope", ArgKind::Scalar, ArgDefault::Double(0.01)),
        ],
        outputs: 1,
    }],
};

static CLONE: OpSchema = OpSchema {
    name: "ops::clone",
    overloads: &[Overload {
        name: "default",
        args: &[
            ArgSpec::required("self", ArgKind::Tensor),
            ArgSpec::defaulted("memory_format", ArgKind::Any, ArgDefault::None),
        ],
        outputs: 1,
    }],
};

register_op!(REGISTER_RELU, RELU, relu_factory);
register_op!(REGISTER_TANH, TANH, tanh_factory);
register_op!(REGISTER_SIGMOID, SIGMOID, sigmoid_factory);
register_op!(REGISTER_LOGIT, LOGIT, logit_factory);
register_op!(REGISTER_CLAMP, CLAMP, stateless clamp);
register_op!(REGISTER_CLAMP_MIN, CLAMP_MIN, stateless clamp_min);
register_op!(REGISTER_NAN_TO_NUM, NAN_TO_NUM, stateless nan_to_num);
register_op!(REGISTER_LEAKY_RELU, LEAKY_RELU, stateless leaky_relu);
register_op!(REGISTER_CLONE, CLONE, stateless clone);

fn relu_factory(_: &KernelContext<'_>) -> Result<Kernel> {
    Ok(Kernel::Vectorized(VectorizedKernel::new(
        formula::relu(),
        DEFAULT_VECTOR_WIDTH,
        relu,
    )))
}

fn tanh_factory(_: &KernelContext<'_>) -> Result<Kernel> {
    Ok(Kernel::Vectorized(VectorizedKernel::new(
        formula::tanh(),
        DEFAULT_VECTOR_WIDTH,
        tanh,
    )))
}

fn sigmoid_factory(_: &KernelContext<'_>) -> Result<Kernel> {
    Ok(Kernel::Vectorized(VectorizedKernel::new(
        formula::sigmoid(),
        NARROW_VECTOR_WIDTH,
        sigmoid,
    )))
}

/// The formula bakes `eps` in, so only a constant `eps` can be vectorized.
fn logit_factory(cx: &KernelContext<'_>) -> Result<Kernel> {
    let Some(eps) = cx.constant(1)? else {
        return Ok(Kernel::generic(logit));
    };
    let eps = match eps {
        Value::Int(v) => Some(v as f32),
        other => other.to_optional_double()?.map(|e| e as f32),
    };
    Ok(Kernel::Vectorized(VectorizedKernel::new(
        formula::logit(eps),
        NARROW_VECTOR_WIDTH,
        logit,
    )))
}

fn relu(frame: &mut Frame<'_>) -> Result<()> {
    let a = frame.tensor(0)?;
    math::relu(frame.out_tensor(0, a.dtype())?, a)
}

fn tanh(frame: &mut Frame<'_>) -> Result<()> {
    let a = frame.tensor(0)?;
    math::tanh(frame.out_tensor(0, a.dtype().to_floating())?, a)
}

fn sigmoid(frame: &mut Frame<'_>) -> Result<()> {
    let a = frame.tensor(0)?;
    math::sigmoid(frame.out_tensor(0, a.dtype().to_floating())?, a)
}

fn logit(frame: &mut Frame<'_>) -> Result<()> {
    let a = frame.tensor(0)?;
    let eps = frame.optional_double(1)?;
    math::logit(frame.out_tensor(0, a.dtype().to_floating())?, a, eps)
}

fn clamp(frame: &mut Frame<'_>) -> Result<()> {
    let a = frame.tensor(0)?;
    let min = frame.optional_scalar(1)?;
    let max = frame.optional_scalar(2)?;
    math::clamp(frame.out_tensor(0, a.dtype())?, a, min, max)
}

fn clamp_min(frame: &mut Frame<'_>) -> Result<()> {
    let a = frame.tensor(0)?;
    let min = frame.scalar(1)?;
    math::clamp_min(frame.out_tensor(0, a.dtype())?, a, min)
}

fn nan_to_num(frame: &mut Frame<'_>) -> Result<()> {
    let a = frame.tensor(0)?;
    let nan = frame.optional_double(1)?;
    let posinf = frame.optional_double(2)?;
    let neginf = frame.optional_double(3)?;
    math::nan_to_num(frame.out_tensor(0, a.dtype())?, a, nan, posinf, neginf)
}

fn leaky_relu(frame: &mut Frame<'_>) -> Result<()> {
    let a = frame.tensor(0)?;
    let slope = frame.scalar(1)?.to_f64();
    math::leaky_relu(frame.out_tensor(0, a.dtype())?, a, slope)
}

/// Dense copy into the reused output; the memory format is ignored on host.
fn clone(frame: &mut Frame<'_>) -> Result<()> {
    let a = frame.tensor(0)?;
    let dtype = a.dtype();
    math::copy(frame.out_tensor(0, dtype)?, a, dtype)
}
