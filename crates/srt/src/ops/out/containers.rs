//! Tensor list/tuple construction that can keep its container across runs.

use tracing::trace;

use crate::error::Result;
use crate::ops::schema::{ArgKind, ArgSpec, OpSchema, Overload};
use crate::ops::{Frame, Kernel, KernelContext};
use crate::value::{Value, ValueList};

const ITEMS: &[ArgSpec] = &[ArgSpec::variadic("items", ArgKind::Any)];

static LIST_CONSTRUCT: OpSchema = OpSchema {
    name: "prim::list_construct",
    overloads: &[Overload {
        name: "variadic",
        args: ITEMS,
        outputs: 1,
    }],
};

static TUPLE_CONSTRUCT: OpSchema = OpSchema {
    name: "prim::tuple_construct",
    overloads: &[Overload {
        name: "variadic",
        args: ITEMS,
        outputs: 1,
    }],
};

register_op!(REGISTER_LIST_CONSTRUCT, LIST_CONSTRUCT, list_factory);
register_op!(REGISTER_TUPLE_CONSTRUCT, TUPLE_CONSTRUCT, tuple_factory);

fn list_factory(cx: &KernelContext<'_>) -> Result<Kernel> {
    construct_factory(cx, ContainerKind::List)
}

fn tuple_factory(cx: &KernelContext<'_>) -> Result<Kernel> {
    construct_factory(cx, ContainerKind::Tuple)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContainerKind {
    List,
    Tuple,
}

impl ContainerKind {
    fn wrap(self, items: ValueList) -> Value {
        match self {
            ContainerKind::List => Value::List(items),
            ContainerKind::Tuple => Value::Tuple(items),
        }
    }

    fn existing(self, value: Option<&mut Value>) -> Option<ValueList> {
        match (self, value) {
            (ContainerKind::List, Some(Value::List(items)))
            | (ContainerKind::Tuple, Some(Value::Tuple(items))) => Some(items.clone()),
            _ => None,
        }
    }
}

fn construct_factory(cx: &KernelContext<'_>, kind: ContainerKind) -> Result<Kernel> {
    let reuse = cx.container_reuse_eligible();
    trace!(node = cx.node.index(), ?kind, reuse, "container construction");
    Ok(Kernel::generic(move |frame| construct(frame, kind, reuse)))
}

/// Refreshes the held container in place when `reuse` holds, otherwise builds a
/// new one so no consumer of the previous run observes this run's elements.
fn construct(frame: &mut Frame<'_>, kind: ContainerKind, reuse: bool) -> Result<()> {
    let items = frame.input_values()?;
    if reuse {
        if let Some(existing) = kind.existing(frame.output(0)?.get_mut()) {
            existing.refresh(items);
            frame.stats().container_reuses += 1;
            return Ok(());
        }
    }
    frame.set_output(0, kind.wrap(ValueList::new(items)))?;
    frame.stats().container_rebuilds += 1;
    Ok(())
}
