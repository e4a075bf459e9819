use crate::error::{Error, Result};
use crate::math;
use crate::ops::schema::{ArgDefault, ArgKind, ArgSpec, OpSchema, Overload};
use crate::ops::{Frame, Kernel, KernelContext};
use crate::tensor::DType;

static SUM: OpSchema = OpSchema {
    name: "ops::sum",
    overloads: &[
        Overload {
            name: "all",
            args: &[
                ArgSpec::required("self", ArgKind::Tensor),
                ArgSpec::defaulted("dtype", ArgKind::DType, ArgDefault::None),
            ],
            outputs: 1,
        },
        Overload {
            name: "dim_int_list",
            args: &[
                ArgSpec::required("self", ArgKind::Tensor),
                ArgSpec::nullable("dim", ArgKind::IntList),
                ArgSpec::required("keepdim", ArgKind::Bool),
                ArgSpec::defaulted("dtype", ArgKind::DType, ArgDefault::None),
            ],
            outputs: 1,
        },
    ],
};

static ARGMIN: OpSchema = OpSchema {
    name: "ops::argmin",
    overloads: &[Overload {
        name: "default",
        args: &[
            ArgSpec::required("self", ArgKind::Tensor),
            ArgSpec::defaulted("dim", ArgKind::Int, ArgDefault::None),
            ArgSpec::defaulted("keepdim", ArgKind::Bool, ArgDefault::Bool(false)),
        ],
        outputs: 1,
    }],
};

static NORM: OpSchema = OpSchema {
    name: "ops::norm",
    overloads: &[
        Overload {
            name: "scalar",
            args: &[
                ArgSpec::required("self", ArgKind::Tensor),
                ArgSpec::nullable("p", ArgKind::Scalar),
            ],
            outputs: 1,
        },
        Overload {
            name: "scalar_opt_dtype",
            args: &[
                ArgSpec::required("self", ArgKind::Tensor),
                ArgSpec::nullable("p", ArgKind::Scalar),
                ArgSpec::nullable("dtype", ArgKind::DType),
            ],
            outputs: 1,
        },
        Overload {
            name: "scalar_opt_dim",
            args: &[
                ArgSpec::required("self", ArgKind::Tensor),
                ArgSpec::nullable("p", ArgKind::Scalar),
                ArgSpec::required("dim", ArgKind::IntList),
                ArgSpec::required("keepdim", ArgKind::Bool),
                ArgSpec::defaulted("dtype", ArgKind::DType, ArgDefault::None),
            ],
            outputs: 1,
        },
    ],
};

register_op!(REGISTER_SUM, SUM, sum_factory);
register_op!(REGISTER_ARGMIN, ARGMIN, stateless argmin);
register_op!(REGISTER_NORM, NORM, norm_factory);

fn sum_factory(cx: &KernelContext<'_>) -> Result<Kernel> {
    Ok(match cx.overload.name {
        "all" => Kernel::generic(sum_all),
        _ => Kernel::generic(sum_dims),
    })
}

fn sum_all(frame: &mut Frame<'_>) -> Result<()> {
    let a = frame.tensor(0)?;
    let dtype = frame.optional_dtype(1)?;
    math::sum(frame.out_tensor(0, dtype.unwrap_or(a.dtype()))?, a, None, false, dtype)
}

fn sum_dims(frame: &mut Frame<'_>) -> Result<()> {
    let a = frame.tensor(0)?;
    let dims = frame.optional_int_list(1)?;
    let keepdim = frame.bool(2)?;
    let dtype = frame.optional_dtype(3)?;
    math::sum(
        frame.out_tensor(0, dtype.unwrap_or(a.dtype()))?,
        a,
        dims.as_deref(),
        keepdim,
        dtype,
    )
}

fn argmin(frame: &mut Frame<'_>) -> Result<()> {
    let a = frame.tensor(0)?;
    let dim = frame.optional_int(1)?;
    let keepdim = frame.bool(2)?;
    math::argmin(frame.out_tensor(0, DType::I64)?, a, dim, keepdim)
}

/// The bare `(self, p)` form has no out variant; the others do.
fn norm_factory(cx: &KernelContext<'_>) -> Result<Kernel> {
    match cx.overload.name {
        "scalar" => Err(Error::invalid(format!(
            "`{}` without `dim` or `dtype` has no out variant",
            cx.node.op()
        ))),
        "scalar_opt_dtype" => Ok(Kernel::generic(norm_all)),
        _ => Ok(Kernel::generic(norm)),
    }
}

fn norm_all(frame: &mut Frame<'_>) -> Result<()> {
    let a = frame.tensor(0)?;
    let p = frame.optional_scalar(1)?;
    let dtype = frame.optional_dtype(2)?;
    math::norm(frame.out_tensor(0, dtype.unwrap_or(a.dtype()))?, a, p, None, false, dtype)
}

fn norm(frame: &mut Frame<'_>) -> Result<()> {
    let a = frame.tensor(0)?;
    let p = frame.optional_scalar(1)?;
    let dims = frame.int_list(2)?;
    let keepdim = frame.bool(3)?;
    let dtype = frame.optional_dtype(4)?;
    math::norm(
        frame.out_tensor(0, dtype.unwrap_or(a.dtype()))?,
        a,
        p,
        Some(&dims[..]),
        keepdim,
        dtype,
    )
}
