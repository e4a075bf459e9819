//! Immutable, pre-validated graph descriptor consumed by the runtime.

mod builder;
mod literal;

pub use builder::GraphBuilder;
pub use literal::{Literal, TensorLiteral};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::value::Value;

/// Index of a value declaration inside a [`Graph`].
pub type ValueId = usize;

/// Static type of a graph value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValueType {
    Any,
    Tensor,
    Int,
    Double,
    Bool,
    Str,
    DType,
    NoneType,
    List { elem: Box<ValueType> },
    Tuple { elems: Vec<ValueType> },
    Dict { key: Box<ValueType>, value: Box<ValueType> },
}

impl ValueType {
    pub fn tensor_list() -> Self {
        ValueType::List {
            elem: Box::new(ValueType::Tensor),
        }
    }

    pub fn int_list() -> Self {
        ValueType::List {
            elem: Box::new(ValueType::Int),
        }
    }

    /// A list of tensors, or a tuple with at least one tensor element.
    pub fn is_tensor_container(&self) -> bool {
        match self {
            ValueType::List { elem } => **elem == ValueType::Tensor,
            ValueType::Tuple { elems } => elems.iter().any(|e| *e == ValueType::Tensor),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueDecl {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub ty: ValueType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstantDecl {
    pub value: ValueId,
    pub literal: Literal,
}

/// One operation instance: identifier plus ordered input and output value ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub op: String,
    pub inputs: Vec<ValueId>,
    pub outputs: Vec<ValueId>,
}

/// Where a value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Producer {
    GraphInput(usize),
    Constant(usize),
    Node { node: usize, output: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GraphDocument", into = "GraphDocument")]
pub struct Graph {
    values: Vec<ValueDecl>,
    inputs: Vec<ValueId>,
    constants: Vec<ConstantDecl>,
    nodes: Vec<Node>,
    outputs: Vec<ValueId>,
    producers: Vec<Producer>,
}

/// Serialized form; `producers` is derived on load.
#[derive(Serialize, Deserialize)]
struct GraphDocument {
    values: Vec<ValueDecl>,
    inputs: Vec<ValueId>,
    #[serde(default)]
    constants: Vec<ConstantDecl>,
    nodes: Vec<Node>,
    outputs: Vec<ValueId>,
}

impl TryFrom<GraphDocument> for Graph {
    type Error = Error;

    fn try_from(doc: GraphDocument) -> Result<Self> {
        Graph::new(doc.values, doc.inputs, doc.constants, doc.nodes, doc.outputs)
    }
}

impl From<Graph> for GraphDocument {
    fn from(graph: Graph) -> Self {
        GraphDocument {
            values: graph.values,
            inputs: graph.inputs,
            constants: graph.constants,
            nodes: graph.nodes,
            outputs: graph.outputs,
        }
    }
}

impl Graph {
    /// Validates the declarations and derives each value's producer.
    ///
    /// Every value must be defined exactly once (graph input, constant or node
    /// output) and every node input must be defined by an earlier definition.
    pub fn new(
        values: Vec<ValueDecl>,
        inputs: Vec<ValueId>,
        constants: Vec<ConstantDecl>,
        nodes: Vec<Node>,
        outputs: Vec<ValueId>,
    ) -> Result<Self> {
        let mut producers: Vec<Option<Producer>> = vec![None; values.len()];
        let mut define = |id: ValueId, producer: Producer| -> Result<()> {
            let entry = producers
                .get_mut(id)
                .ok_or_else(|| Error::graph(format!("value %{id} is not declared")))?;
            if entry.replace(producer).is_some() {
                return Err(Error::graph(format!("value %{id} is defined twice")));
            }
            Ok(())
        };

        for (i, &id) in inputs.iter().enumerate() {
            define(id, Producer::GraphInput(i))?;
        }
        for (i, constant) in constants.iter().enumerate() {
            define(constant.value, Producer::Constant(i))?;
        }
        let mut defined: Vec<bool> = vec![false; values.len()];
        for &id in &inputs {
            defined[id] = true;
        }
        for constant in &constants {
            defined[constant.value] = true;
        }
        for (index, node) in nodes.iter().enumerate() {
            if node.op.is_empty() {
                return Err(Error::graph(format!("node {index} has an empty op name")));
            }
            for &input in &node.inputs {
                if !defined.get(input).copied().unwrap_or(false) {
                    return Err(Error::graph(format!(
                        "node {index} (`{}`) uses %{input} before it is defined",
                        node.op
                    )));
                }
            }
            for (output, &id) in node.outputs.iter().enumerate() {
                define(id, Producer::Node { node: index, output })?;
                defined[id] = true;
            }
        }
        for &id in &outputs {
            if !defined.get(id).copied().unwrap_or(false) {
                return Err(Error::graph(format!("graph output %{id} is never defined")));
            }
        }
        let producers = producers
            .into_iter()
            .enumerate()
            .map(|(id, p)| p.ok_or_else(|| Error::graph(format!("value %{id} is never defined"))))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            values,
            inputs,
            constants,
            nodes,
            outputs,
            producers,
        })
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|err| Error::graph(err.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|err| Error::graph(err.to_string()))
    }

    pub fn values(&self) -> &[ValueDecl] {
        &self.values
    }

    pub fn value_type(&self, id: ValueId) -> &ValueType {
        &self.values[id].ty
    }

    pub fn inputs(&self) -> &[ValueId] {
        &self.inputs
    }

    pub fn constants(&self) -> &[ConstantDecl] {
        &self.constants
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn outputs(&self) -> &[ValueId] {
        &self.outputs
    }

    pub fn producer(&self, id: ValueId) -> Producer {
        self.producers[id]
    }

    /// Borrowed view of node `index` with access to its graph context.
    pub fn node(&self, index: usize) -> NodeView<'_> {
        NodeView { graph: self, index }
    }
}

/// A node together with the graph it belongs to.
///
/// Kernel factories receive this view to read statically-known attributes.
#[derive(Clone, Copy)]
pub struct NodeView<'g> {
    graph: &'g Graph,
    index: usize,
}

impl<'g> NodeView<'g> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn graph(&self) -> &'g Graph {
        self.graph
    }

    pub fn op(&self) -> &'g str {
        &self.graph.nodes[self.index].op
    }

    pub fn inputs(&self) -> &'g [ValueId] {
        &self.graph.nodes[self.index].inputs
    }

    pub fn outputs(&self) -> &'g [ValueId] {
        &self.graph.nodes[self.index].outputs
    }

    pub fn arity(&self) -> usize {
        self.inputs().len()
    }

    pub fn output_type(&self, i: usize) -> &'g ValueType {
        self.graph.value_type(self.outputs()[i])
    }

    pub fn input_producer(&self, i: usize) -> Producer {
        self.graph.producer(self.inputs()[i])
    }

    /// Constant value of input `i` when it is baked into the graph.
    pub fn constant_input(&self, i: usize) -> Result<Option<Value>> {
        match self.inputs().get(i).map(|&id| self.graph.producer(id)) {
            Some(Producer::Constant(c)) => self.graph.constants[c].literal.to_value().map(Some),
            _ => Ok(None),
        }
    }
}

impl std::fmt::Debug for NodeView<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeView")
            .field("index", &self.index)
            .field("op", &self.op())
            .field("inputs", &self.inputs())
            .field("outputs", &self.outputs())
            .finish()
    }
}
