//! # IR Nodes
//!
//! A node is one value-producing operation in the function graph. Operand
//! edges are plain [`NodeId`]s into the owning function's arena.

use itertools::Itertools;

use crate::{indent_str, NodeId, Op, PrettyPrint, Type, Value};

/// One operation in the IR graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Stable identity within the owning function
    pub id: NodeId,

    /// Human-readable name used by the pretty printer
    pub name: String,

    /// The operation performed
    pub op: Op,

    /// Operand edges, in the layout documented on [`Op`]
    pub operands: Vec<NodeId>,

    /// Output type
    pub ty: Type,
}

impl Node {
    pub const fn is_param(&self) -> bool {
        matches!(self.op, Op::Param)
    }

    /// The constant carried by a literal node
    pub const fn literal_value(&self) -> Option<&Value> {
        match &self.op {
            Op::Literal(value) => Some(value),
            _ => None,
        }
    }

    /// The numeric value of a bits literal, as used for indices and selectors
    pub fn literal_bits(&self) -> Option<u64> {
        self.literal_value().and_then(Value::as_u64)
    }

    /// Renders this node's definition, resolving operand names with `name_of`
    pub fn render(&self, name_of: impl Fn(NodeId) -> String) -> String {
        let names: Vec<String> = self.operands.iter().map(|&id| name_of(id)).collect();
        let arg = |i: usize| names.get(i).map_or("?", String::as_str);
        let list = |from: usize, to: usize| {
            names
                .get(from..to.max(from).min(names.len()))
                .unwrap_or_default()
                .iter()
                .join(", ")
        };
        let last = names.len().saturating_sub(1);
        let args = match &self.op {
            Op::Param => self.name.clone(),
            Op::Literal(value) => format!("value={value}"),
            Op::TupleIndex(index) => format!("{}, index={index}", arg(0)),
            Op::ArrayIndex => format!("{}, indices=[{}]", arg(0), list(1, names.len())),
            Op::ArrayUpdate => format!(
                "{}, {}, indices=[{}]",
                arg(0),
                arg(1),
                list(2, names.len())
            ),
            Op::ArraySlice { width } => format!("{}, {}, width={width}", arg(0), arg(1)),
            Op::Select { has_default: true } | Op::PrioritySelect => format!(
                "{}, cases=[{}], default={}",
                arg(0),
                list(1, last),
                arg(last)
            ),
            Op::Select { has_default: false } | Op::OneHotSelect => {
                format!("{}, cases=[{}]", arg(0), list(1, names.len()))
            }
            _ => names.join(", "),
        };
        format!("{}: {} = {}({args})", self.name, self.ty, self.op)
    }
}

impl PrettyPrint for Node {
    fn pretty_print(&self, indent: usize) -> String {
        format!(
            "{}{}",
            indent_str(indent),
            self.render(|id| id.to_string())
        )
    }
}
