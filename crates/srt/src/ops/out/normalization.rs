use crate::error::Result;
use crate::math;
use crate::ops::schema::{ArgDefault, ArgKind, ArgSpec, OpSchema, Overload};
use crate::ops::Frame;

static LAYER_NORM: OpSchema = OpSchema {
    name: "ops::layer_norm",
    overloads: &[Overload {
        name: "default",
        args: &[
            ArgSpec::required("input", ArgKind::Tensor),
            ArgSpec::required("normalized_shape", ArgKind::IntList),
            ArgSpec::defaulted("weight", ArgKind::Tensor, ArgDefault::None),
            ArgSpec::defaulted("bias", ArgKind::Tensor, ArgDefault::None),
            ArgSpec::defaulted("eps", ArgKind::Double, ArgDefault::Double(1e-5)),
            ArgSpec::defaulted("cudnn_enable", ArgKind::Bool, ArgDefault::Bool(true)),
        ],
        outputs: 1,
    }],
};

register_op!(REGISTER_LAYER_NORM, LAYER_NORM, stateless layer_norm);

fn layer_norm(frame: &mut Frame<'_>) -> Result<()> {
    let input = frame.tensor(0)?;
    let normalized_shape = frame.int_list(1)?;
    let weight = frame.optional_tensor(2)?;
    let bias = frame.optional_tensor(3)?;
    let eps = frame.double(4)?;
    math::layer_norm(
        frame.out_tensor(0, input.dtype())?,
        input,
        &normalized_shape,
        weight,
        bias,
        eps,
    )
}
