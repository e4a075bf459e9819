use smallvec::SmallVec;

use crate::dispatch::{DispatchPath, Resolution};
use crate::graph::{NodeView, ValueId};
use crate::ops::{Kernel, Overload};
use crate::profiling::RunStats;
use crate::tensor::StorageId;
use crate::value::{Slot, Value};

/// A graph node bound to its kernel and to the arena positions of its values.
#[derive(Debug)]
pub struct ProcessedNode {
    index: usize,
    op: String,
    path: DispatchPath,
    kernel: Kernel,
    overload: &'static Overload,
    inputs: SmallVec<[ValueId; 4]>,
    outputs: SmallVec<[ValueId; 4]>,
    /// Last observed storage and reallocation count per output.
    storage_marks: SmallVec<[Option<(StorageId, u64)>; 1]>,
}

impl ProcessedNode {
    pub(crate) fn new(node: NodeView<'_>, resolution: Resolution) -> Self {
        Self {
            index: node.index(),
            op: node.op().to_string(),
            path: resolution.path,
            kernel: resolution.kernel,
            overload: resolution.overload,
            inputs: SmallVec::from_slice(node.inputs()),
            outputs: SmallVec::from_slice(node.outputs()),
            storage_marks: SmallVec::from_elem(None, node.outputs().len()),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn op(&self) -> &str {
        &self.op
    }

    pub fn path(&self) -> DispatchPath {
        self.path
    }

    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    pub(crate) fn kernel_mut(&mut self) -> &mut Kernel {
        &mut self.kernel
    }

    pub fn overload(&self) -> &'static Overload {
        self.overload
    }

    pub fn inputs(&self) -> &[ValueId] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[ValueId] {
        &self.outputs
    }

    /// Counts outputs whose storage was reallocated while being regrown in place.
    pub(crate) fn track_regrowths(&mut self, slots: &[Slot], stats: &mut RunStats) {
        for (mark, &id) in self.storage_marks.iter_mut().zip(&self.outputs) {
            let Some(Value::Tensor(tensor)) = slots.get(id).and_then(|s| s.read().ok()) else {
                *mark = None;
                continue;
            };
            let storage = tensor.storage();
            let current = (storage.id(), storage.reallocations());
            if let Some((id, seen)) = *mark {
                if id == current.0 && current.1 > seen {
                    stats.storage_regrowths += current.1 - seen;
                }
            }
            *mark = Some(current);
        }
    }
}
