//! Per-call view of a processed node's input and output slots.

use std::borrow::Cow;

use smallvec::SmallVec;
use tracing::trace;

use super::schema::Overload;
use crate::error::{Error, Result};
use crate::graph::ValueId;
use crate::profiling::RunStats;
use crate::tensor::{DType, Scalar, Tensor};
use crate::value::{Slot, Value};

/// Borrowed call context handed to a kernel.
///
/// Inputs are read by declared position from the module arena. Outputs are the
/// node's own slots, detached from the arena for the duration of the call.
pub struct Frame<'a> {
    slots: &'a [Slot],
    inputs: &'a [ValueId],
    outputs: &'a mut [Slot],
    overload: Option<&'static Overload>,
    stats: &'a mut RunStats,
    node: usize,
    op: &'a str,
}

impl<'a> Frame<'a> {
    pub fn new(
        slots: &'a [Slot],
        inputs: &'a [ValueId],
        outputs: &'a mut [Slot],
        overload: Option<&'static Overload>,
        stats: &'a mut RunStats,
        node: usize,
        op: &'a str,
    ) -> Self {
        Self {
            slots,
            inputs,
            outputs,
            overload,
            stats,
            node,
            op,
        }
    }

    pub fn node(&self) -> usize {
        self.node
    }

    pub fn op(&self) -> &str {
        self.op
    }

    pub fn arity(&self) -> usize {
        self.inputs.len()
    }

    pub fn stats(&mut self) -> &mut RunStats {
        self.stats
    }

    /// Input `i`, or the declared default of an omitted trailing argument.
    pub fn value(&self, i: usize) -> Result<Cow<'a, Value>> {
        let slots: &'a [Slot] = self.slots;
        if let Some(&id) = self.inputs.get(i) {
            return slots
                .get(id)
                .ok_or_else(|| Error::graph(format!("input %{id} is outside the value arena")))?
                .read()
                .map(Cow::Borrowed);
        }
        let default = self
            .overload
            .and_then(|o| o.args.get(i))
            .and_then(|arg| arg.default);
        match default {
            Some(default) => Ok(Cow::Owned(default.to_value())),
            None => Err(Error::invalid(format!(
                "`{}` has no argument {i} and no default for it",
                self.op
            ))),
        }
    }

    /// Borrows input `i` directly; tensor arguments never have defaults.
    pub fn tensor(&self, i: usize) -> Result<&'a Tensor> {
        match self.value(i)? {
            Cow::Borrowed(value) => value.to_tensor(),
            Cow::Owned(value) => Err(Error::TypeProjection {
                expected: "Tensor",
                found: value.type_name(),
            }),
        }
    }

    pub fn optional_tensor(&self, i: usize) -> Result<Option<&'a Tensor>> {
        match self.value(i)? {
            Cow::Borrowed(value) => value.to_optional_tensor(),
            Cow::Owned(Value::None) => Ok(None),
            Cow::Owned(value) => Err(Error::TypeProjection {
                expected: "Tensor?",
                found: value.type_name(),
            }),
        }
    }

    /// Tensor operand; a host scalar is wrapped into a 0-dim tensor.
    pub fn tensor_or_scalar(&self, i: usize) -> Result<Tensor> {
        self.value(i)?.to_tensor_or_wrap()
    }

    pub fn scalar(&self, i: usize) -> Result<Scalar> {
        self.value(i)?.to_scalar()
    }

    pub fn optional_scalar(&self, i: usize) -> Result<Option<Scalar>> {
        self.value(i)?.to_optional_scalar()
    }

    pub fn int(&self, i: usize) -> Result<i64> {
        self.value(i)?.to_int()
    }

    pub fn optional_int(&self, i: usize) -> Result<Option<i64>> {
        self.value(i)?.to_optional_int()
    }

    /// Accepts an int where a float is declared.
    pub fn double(&self, i: usize) -> Result<f64> {
        match self.value(i)?.as_ref() {
            Value::Int(v) => Ok(*v as f64),
            other => other.to_double(),
        }
    }

    pub fn optional_double(&self, i: usize) -> Result<Option<f64>> {
        match self.value(i)?.as_ref() {
            Value::Int(v) => Ok(Some(*v as f64)),
            other => other.to_optional_double(),
        }
    }

    pub fn bool(&self, i: usize) -> Result<bool> {
        self.value(i)?.to_bool()
    }

    pub fn optional_dtype(&self, i: usize) -> Result<Option<DType>> {
        self.value(i)?.to_optional_dtype()
    }

    /// Conversion target: a dtype, or a tensor whose dtype is adopted.
    pub fn target_dtype(&self, i: usize) -> Result<Option<DType>> {
        match self.value(i)?.as_ref() {
            Value::Tensor(other) => Ok(Some(other.dtype())),
            other => other.to_optional_dtype(),
        }
    }

    pub fn optional_str(&self, i: usize) -> Result<Option<String>> {
        self.value(i)?.to_optional_str()
    }

    pub fn int_list(&self, i: usize) -> Result<SmallVec<[i64; 4]>> {
        Ok(SmallVec::from_vec(self.value(i)?.to_int_vec()?))
    }

    pub fn optional_int_list(&self, i: usize) -> Result<Option<SmallVec<[i64; 4]>>> {
        Ok(self.value(i)?.to_optional_int_vec()?.map(SmallVec::from_vec))
    }

    pub fn tensor_list(&self, i: usize) -> Result<Vec<Tensor>> {
        self.value(i)?.to_tensor_vec()
    }

    pub fn optional_tensor_list(&self, i: usize) -> Result<Vec<Option<Tensor>>> {
        self.value(i)?.to_optional_tensor_vec()
    }

    /// Every present input value, in order.
    pub fn input_values(&self) -> Result<Vec<Value>> {
        (0..self.arity())
            .map(|i| self.value(i).map(Cow::into_owned))
            .collect()
    }

    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }

    pub fn output(&mut self, i: usize) -> Result<&mut Slot> {
        let count = self.outputs.len();
        self.outputs.get_mut(i).ok_or_else(|| {
            Error::graph(format!("output {i} requested from a node with {count} outputs"))
        })
    }

    /// Readies output `i` for a math routine.
    ///
    /// An empty slot receives a fresh zero-sized tensor of `dtype`. A slot that
    /// already holds a tensor is truncated so the routine regrows the same storage.
    pub fn prepare_output(&mut self, i: usize, dtype: DType) -> Result<()> {
        let node = self.node;
        let slot = self.output(i)?;
        match slot.tensor_mut() {
            Some(tensor) => {
                tensor.truncate();
                self.stats.output_reuses += 1;
            }
            None => {
                slot.write(Value::Tensor(Tensor::empty(&[0], dtype)));
                self.stats.output_allocations += 1;
                trace!(node, output = i, %dtype, "allocated output tensor");
            }
        }
        Ok(())
    }

    /// [`Frame::prepare_output`] followed by mutable access to the tensor.
    pub fn out_tensor(&mut self, i: usize, dtype: DType) -> Result<&mut Tensor> {
        self.prepare_output(i, dtype)?;
        self.output_tensor(i)
    }

    pub fn output_tensor(&mut self, i: usize) -> Result<&mut Tensor> {
        let slot = self.output(i)?;
        let found = slot.read()?.type_name();
        slot.tensor_mut().ok_or(Error::TypeProjection {
            expected: "Tensor",
            found,
        })
    }

    /// Mutable access to the first `N` outputs at once; each must hold a tensor.
    pub fn output_tensors<const N: usize>(&mut self) -> Result<[&mut Tensor; N]> {
        let count = self.outputs.len();
        let tensors = self
            .outputs
            .iter_mut()
            .take(N)
            .map(|slot| {
                slot.tensor_mut().ok_or(Error::TypeProjection {
                    expected: "Tensor",
                    found: "non-tensor output",
                })
            })
            .collect::<Result<Vec<_>>>()?;
        tensors.try_into().map_err(|_| {
            Error::graph(format!("{N} outputs requested from a node with {count} outputs"))
        })
    }

    /// Writes a non-tensor result, replacing whatever the slot held.
    pub fn set_output(&mut self, i: usize, value: Value) -> Result<()> {
        self.output(i)?.write(value);
        Ok(())
    }
}
