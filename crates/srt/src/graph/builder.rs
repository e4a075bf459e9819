use super::{ConstantDecl, Graph, Literal, Node, ValueDecl, ValueId, ValueType};
use crate::error::Result;

/// Incremental graph construction; [`GraphBuilder::build`] validates the result.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    values: Vec<ValueDecl>,
    inputs: Vec<ValueId>,
    constants: Vec<ConstantDecl>,
    nodes: Vec<Node>,
    outputs: Vec<ValueId>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn declare(&mut self, name: Option<&str>, ty: ValueType) -> ValueId {
        self.values.push(ValueDecl {
            name: name.map(str::to_string),
            ty,
        });
        self.values.len() - 1
    }

    /// Declares a graph input bound at run time.
    pub fn input(&mut self, name: &str, ty: ValueType) -> ValueId {
        let id = self.declare(Some(name), ty);
        self.inputs.push(id);
        id
    }

    /// Declares a tensor graph input.
    pub fn tensor_input(&mut self, name: &str) -> ValueId {
        self.input(name, ValueType::Tensor)
    }

    /// Embeds a constant; its type is derived from the literal.
    pub fn constant(&mut self, literal: impl Into<Literal>) -> ValueId {
        let literal = literal.into();
        let ty = match &literal {
            Literal::None => ValueType::NoneType,
            Literal::Int(_) => ValueType::Int,
            Literal::Double(_) => ValueType::Double,
            Literal::Bool(_) => ValueType::Bool,
            Literal::Str(_) => ValueType::Str,
            Literal::DType(_) => ValueType::DType,
            Literal::IntList(_) => ValueType::int_list(),
            Literal::DoubleList(_) => ValueType::List {
                elem: Box::new(ValueType::Double),
            },
            Literal::Tensor(_) => ValueType::Tensor,
        };
        let id = self.declare(None, ty);
        self.constants.push(ConstantDecl { value: id, literal });
        id
    }

    pub fn none(&mut self) -> ValueId {
        self.constant(Literal::None)
    }

    /// Appends a node and returns the ids of its outputs.
    pub fn node(&mut self, op: &str, inputs: &[ValueId], outputs: &[ValueType]) -> Vec<ValueId> {
        let outputs: Vec<ValueId> = outputs
            .iter()
            .map(|ty| self.declare(None, ty.clone()))
            .collect();
        self.nodes.push(Node {
            op: op.to_string(),
            inputs: inputs.to_vec(),
            outputs: outputs.clone(),
        });
        outputs
    }

    /// Appends a node with a single tensor output.
    pub fn op(&mut self, op: &str, inputs: &[ValueId]) -> ValueId {
        self.node(op, inputs, &[ValueType::Tensor])[0]
    }

    pub fn output(&mut self, id: ValueId) -> &mut Self {
        self.outputs.push(id);
        self
    }

    pub fn build(self) -> Result<Graph> {
        Graph::new(
            self.values,
            self.inputs,
            self.constants,
            self.nodes,
            self.outputs,
        )
    }
}
