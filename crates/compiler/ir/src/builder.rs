//! # Function Builder
//!
//! A fluent API for assembling [`Function`] graphs. Every method infers the
//! node type from its operands and fails on ill-typed combinations.
//!
//! ```
//! use flowlet_ir::{FunctionBuilder, Type};
//!
//! let mut b = FunctionBuilder::new("swap");
//! let x = b.param("x", Type::bits(8));
//! let y = b.param("y", Type::bits(8));
//! let t = b.named("t").tuple(&[y, x]).unwrap();
//! let f = b.build(t).unwrap();
//! assert_eq!(f.node_count(), 3);
//! ```

use crate::{BinaryOp, Function, IrResult, NodeId, Op, Type, UnaryOp, Value};

/// Builds a [`Function`] node by node
#[derive(Debug)]
pub struct FunctionBuilder {
    function: Function,
    pending_name: Option<String>,
}

impl FunctionBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            function: Function::new(name),
            pending_name: None,
        }
    }

    /// Appends a parameter to the signature
    pub fn param(&mut self, name: impl Into<String>, ty: Type) -> NodeId {
        self.function.add_param(name, ty)
    }

    /// Names the next node created by this builder
    pub fn named(&mut self, name: impl Into<String>) -> &mut Self {
        self.pending_name = Some(name.into());
        self
    }

    fn add(&mut self, op: Op, operands: Vec<NodeId>) -> IrResult<NodeId> {
        let name = self.pending_name.take();
        self.function.add_node(op, operands, name)
    }

    pub fn literal(&mut self, value: Value) -> IrResult<NodeId> {
        self.add(Op::Literal(value), Vec::new())
    }

    /// Shorthand for a `bits[width]` literal
    pub fn literal_bits(&mut self, width: usize, value: u64) -> IrResult<NodeId> {
        self.literal(Value::bits(width, value))
    }

    pub fn tuple(&mut self, elements: &[NodeId]) -> IrResult<NodeId> {
        self.add(Op::Tuple, elements.to_vec())
    }

    pub fn tuple_index(&mut self, tuple: NodeId, index: usize) -> IrResult<NodeId> {
        self.add(Op::TupleIndex(index), vec![tuple])
    }

    pub fn array(&mut self, elements: &[NodeId]) -> IrResult<NodeId> {
        self.add(Op::Array, elements.to_vec())
    }

    /// Reads `array[indices[0]][indices[1]]...`
    pub fn array_index(&mut self, array: NodeId, indices: &[NodeId]) -> IrResult<NodeId> {
        let mut operands = vec![array];
        operands.extend_from_slice(indices);
        self.add(Op::ArrayIndex, operands)
    }

    pub fn array_slice(&mut self, array: NodeId, start: NodeId, width: usize) -> IrResult<NodeId> {
        self.add(Op::ArraySlice { width }, vec![array, start])
    }

    pub fn array_concat(&mut self, arrays: &[NodeId]) -> IrResult<NodeId> {
        self.add(Op::ArrayConcat, arrays.to_vec())
    }

    /// Replaces `array[indices...]` with `value`
    pub fn array_update(
        &mut self,
        array: NodeId,
        value: NodeId,
        indices: &[NodeId],
    ) -> IrResult<NodeId> {
        let mut operands = vec![array, value];
        operands.extend_from_slice(indices);
        self.add(Op::ArrayUpdate, operands)
    }

    /// A `sel` node. `default` must be given exactly when `cases` does not
    /// cover every selector value.
    pub fn select(
        &mut self,
        selector: NodeId,
        cases: &[NodeId],
        default: Option<NodeId>,
    ) -> IrResult<NodeId> {
        let mut operands = vec![selector];
        operands.extend_from_slice(cases);
        operands.extend(default);
        self.add(
            Op::Select {
                has_default: default.is_some(),
            },
            operands,
        )
    }

    pub fn priority_select(
        &mut self,
        selector: NodeId,
        cases: &[NodeId],
        default: NodeId,
    ) -> IrResult<NodeId> {
        let mut operands = vec![selector];
        operands.extend_from_slice(cases);
        operands.push(default);
        self.add(Op::PrioritySelect, operands)
    }

    pub fn one_hot_select(&mut self, selector: NodeId, cases: &[NodeId]) -> IrResult<NodeId> {
        let mut operands = vec![selector];
        operands.extend_from_slice(cases);
        self.add(Op::OneHotSelect, operands)
    }

    pub fn one_hot(&mut self, input: NodeId) -> IrResult<NodeId> {
        self.add(Op::OneHot, vec![input])
    }

    pub fn identity(&mut self, operand: NodeId) -> IrResult<NodeId> {
        self.add(Op::Identity, vec![operand])
    }

    pub fn unary(&mut self, op: UnaryOp, operand: NodeId) -> IrResult<NodeId> {
        self.add(Op::Unary(op), vec![operand])
    }

    pub fn binary(&mut self, op: BinaryOp, lhs: NodeId, rhs: NodeId) -> IrResult<NodeId> {
        self.add(Op::Binary(op), vec![lhs, rhs])
    }

    /// The function built so far
    pub const fn function(&self) -> &Function {
        &self.function
    }

    /// Sets the return value and validates the finished function
    pub fn build(mut self, return_value: NodeId) -> IrResult<Function> {
        self.function.set_return_value(return_value)?;
        self.function.validate()?;
        Ok(self.function)
    }
}
