use crate::error::Result;
use crate::math::{self, EmbeddingBagMode, EmbeddingBagOptions, EmbeddingBagOutputs};
use crate::ops::schema::{ArgDefault, ArgKind, ArgSpec, OpSchema, Overload};
use crate::ops::Frame;
use crate::tensor::DType;

static EMBEDDING_BAG: OpSchema = OpSchema {
    name: "ops::embedding_bag",
    overloads: &[Overload {
        name: "padding_idx",
        args: &[
            ArgSpec::required("weight", ArgKind::Tensor),
            ArgSpec::required("indices", ArgKind::Tensor),
            ArgSpec::required("offsets", ArgKind::Tensor),
            ArgSpec::defaulted("scale_grad_by_freq", ArgKind::Bool, ArgDefault::Bool(false)),
            ArgSpec::defaulted("mode", ArgKind::Int, ArgDefault::Int(0)),
            ArgSpec::defaulted("sparse", ArgKind::Bool, ArgDefault::Bool(false)),
            ArgSpec::defaulted("per_sample_weights", ArgKind::Tensor, ArgDefault::None),
            ArgSpec::defaulted("include_last_offset", ArgKind::Bool, ArgDefault::Bool(false)),
            ArgSpec::defaulted("padding_idx", ArgKind::Int, ArgDefault::None),
        ],
        outputs: 4,
    }],
};

static EMBEDDING_BAG_BYTE_ROWWISE: OpSchema = OpSchema {
    name: "quantized::embedding_bag_byte_rowwise_offsets",
    overloads: &[Overload {
        name: "default",
        args: &[
            ArgSpec::required("weight", ArgKind::Tensor),
            ArgSpec::required("indices", ArgKind::Tensor),
            ArgSpec::required("offsets", ArgKind::Tensor),
            ArgSpec::defaulted("scale_grad_by_freq", ArgKind::Bool, ArgDefault::Bool(false)),
            ArgSpec::defaulted("mode", ArgKind::Int, ArgDefault::Int(0)),
            ArgSpec::defaulted("pruned_weights", ArgKind::Bool, ArgDefault::Bool(false)),
            ArgSpec::defaulted("per_sample_weights", ArgKind::Tensor, ArgDefault::None),
            ArgSpec::defaulted("compressed_indices_mapping", ArgKind::Tensor, ArgDefault::None),
            ArgSpec::defaulted("include_last_offset", ArgKind::Bool, ArgDefault::Bool(false)),
        ],
        outputs: 1,
    }],
};

register_op!(REGISTER_EMBEDDING_BAG, EMBEDDING_BAG, stateless embedding_bag);
register_op!(
    REGISTER_EMBEDDING_BAG_BYTE_ROWWISE,
    EMBEDDING_BAG_BYTE_ROWWISE,
    stateless embedding_bag_byte_rowwise_offsets
);

/// Produces `(output, offset2bag, bag_size, max_indices)`, all reused across runs.
fn embedding_bag(frame: &mut Frame<'_>) -> Result<()> {
    let weight = frame.tensor(0)?;
    let indices = frame.tensor(1)?;
    let offsets = frame.tensor(2)?;
    let options = EmbeddingBagOptions {
        mode: EmbeddingBagMode::from_code(frame.int(4)?)?,
        include_last_offset: frame.bool(7)?,
        padding_idx: frame.optional_int(8)?,
    };
    let per_sample_weights = frame.optional_tensor(6)?;

    frame.prepare_output(0, weight.dtype())?;
    for i in 1..4 {
        frame.prepare_output(i, DType::I64)?;
    }
    let [output, offset2bag, bag_size, max_indices] = frame.output_tensors::<4>()?;
    math::embedding_bag(
        EmbeddingBagOutputs {
            output,
            offset2bag,
            bag_size,
            max_indices,
        },
        weight,
        indices,
        offsets,
        per_sample_weights,
        options,
    )
}

fn embedding_bag_byte_rowwise_offsets(frame: &mut Frame<'_>) -> Result<()> {
    let weight = frame.tensor(0)?;
    let indices = frame.tensor(1)?;
    let offsets = frame.tensor(2)?;
    let mode = EmbeddingBagMode::from_code(frame.int(4)?)?;
    let per_sample_weights = frame.optional_tensor(6)?;
    let compressed_indices_mapping = frame.optional_tensor(7)?;
    let include_last_offset = frame.bool(8)?;
    math::embedding_bag_byte_rowwise_offsets(
        frame.out_tensor(0, DType::F32)?,
        weight,
        indices,
        offsets,
        mode,
        per_sample_weights,
        compressed_indices_mapping,
        include_last_offset,
    )
}
