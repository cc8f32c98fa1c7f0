//! # IR Function
//!
//! A function is a DAG of [`Node`]s stored in an arena. Operand edges are
//! arena indices, so rewrites can re-point them freely; nodes are never
//! removed, and nodes orphaned by a rewrite are left for a dead-code pass.

use index_vec::IndexVec;
use itertools::Itertools;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::{indent_str, IrError, IrResult, Node, NodeId, Op, PrettyPrint, Type};

/// A function-shaped IR graph
///
/// # Design Notes
///
/// - Nodes live in an `IndexVec` and are addressed by [`NodeId`]
/// - Parameters are ordinary nodes with [`Op::Param`], listed in signature order
/// - The return value is a reference to any node of the graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    /// The name of the function (for debugging and linking)
    pub name: String,

    nodes: IndexVec<NodeId, Node>,

    params: Vec<NodeId>,

    return_value: Option<NodeId>,
}

impl Function {
    /// Creates a new empty function with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: IndexVec::new(),
            params: Vec::new(),
            return_value: None,
        }
    }

    /// Appends a parameter of the given type
    pub fn add_param(&mut self, name: impl Into<String>, ty: Type) -> NodeId {
        let id = self.nodes.next_idx();
        self.nodes.push(Node {
            id,
            name: name.into(),
            op: Op::Param,
            operands: Vec::new(),
            ty,
        });
        self.params.push(id);
        id
    }

    /// Adds a node, inferring its type from the operator and operand types
    pub fn add_node(
        &mut self,
        op: Op,
        operands: Vec<NodeId>,
        name: Option<String>,
    ) -> IrResult<NodeId> {
        let ty = {
            let operand_types = operands
                .iter()
                .map(|&id| self.get_node(id).map(|n| &n.ty))
                .collect::<IrResult<Vec<_>>>()?;
            op.result_type(&operand_types)?
        };
        self.push_node(op, operands, ty, name)
    }

    /// Adds a node with an explicitly given type. Only operand existence is
    /// checked; use [`Function::validate`] to check the result.
    pub fn add_node_unchecked(
        &mut self,
        op: Op,
        operands: Vec<NodeId>,
        ty: Type,
        name: Option<String>,
    ) -> IrResult<NodeId> {
        for &id in &operands {
            self.get_node(id)?;
        }
        self.push_node(op, operands, ty, name)
    }

    fn push_node(
        &mut self,
        op: Op,
        operands: Vec<NodeId>,
        ty: Type,
        name: Option<String>,
    ) -> IrResult<NodeId> {
        if matches!(op, Op::Param) {
            return Err(IrError::operand(op.name(), "use `add_param` for parameters"));
        }
        let id = self.nodes.next_idx();
        let name = name.unwrap_or_else(|| format!("{}.{}", op.name(), id.index()));
        Ok(self.nodes.push(Node {
            id,
            name,
            op,
            operands,
            ty,
        }))
    }

    /// Gets a node by ID
    pub fn get_node(&self, id: NodeId) -> IrResult<&Node> {
        self.nodes.get(id).ok_or(IrError::UnknownNode(id))
    }

    /// Gets a node by ID
    ///
    /// # Panics
    ///
    /// Panics if `id` does not belong to this function.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    /// Returns an iterator over all nodes in arena order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        self.nodes.indices()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Looks up a node by name
    pub fn find_node(&self, name: &str) -> Option<NodeId> {
        self.nodes.iter().find(|n| n.name == name).map(|n| n.id)
    }

    /// Renames a node
    pub fn set_name(&mut self, id: NodeId, name: impl Into<String>) -> IrResult<()> {
        let node = self.nodes.get_mut(id).ok_or(IrError::UnknownNode(id))?;
        node.name = name.into();
        Ok(())
    }

    /// Parameters in signature order
    pub fn params(&self) -> &[NodeId] {
        &self.params
    }

    pub fn return_value(&self) -> Option<NodeId> {
        self.return_value
    }

    pub fn set_return_value(&mut self, id: NodeId) -> IrResult<()> {
        self.get_node(id)?;
        self.return_value = Some(id);
        Ok(())
    }

    /// Maps every node to the distinct nodes using it as an operand
    pub fn users(&self) -> FxHashMap<NodeId, Vec<NodeId>> {
        let mut users: FxHashMap<NodeId, Vec<NodeId>> = FxHashMap::default();
        for node in &self.nodes {
            for &operand in node.operands.iter().unique() {
                users.entry(operand).or_default().push(node.id);
            }
        }
        users
    }

    /// Returns true if `id` is used as an operand or is the return value
    pub fn has_uses(&self, id: NodeId) -> bool {
        self.return_value == Some(id) || self.nodes.iter().any(|n| n.operands.contains(&id))
    }

    /// Replaces every use of `old` (operand edges and the return value) with
    /// `new`. Operands of `new` itself are left alone so that a replacement
    /// built on top of `old` does not become self-referential.
    ///
    /// Returns the number of rewritten edges.
    pub fn replace_uses_with(&mut self, old: NodeId, new: NodeId) -> IrResult<usize> {
        let old_ty = &self.get_node(old)?.ty;
        let new_ty = &self.get_node(new)?.ty;
        if old_ty != new_ty {
            return Err(IrError::TypeMismatch {
                expected: old_ty.clone(),
                found: new_ty.clone(),
                context: format!("replacing uses of {old:?} with {new:?}"),
            });
        }
        if old == new {
            return Ok(0);
        }

        let mut replaced = 0;
        for node in self.nodes.iter_mut().filter(|n| n.id != new) {
            for operand in node.operands.iter_mut().filter(|op| **op == old) {
                *operand = new;
                replaced += 1;
            }
        }
        if self.return_value == Some(old) {
            self.return_value = Some(new);
            replaced += 1;
        }
        log::trace!(
            "replaced {replaced} use(s) of {old:?} with {new:?} in '{}'",
            self.name
        );
        Ok(replaced)
    }

    /// Orders all nodes so that every node comes after its operands.
    ///
    /// The order is deterministic: roots are taken in arena order and operands
    /// are explored in operand order.
    pub fn topo_sort(&self) -> IrResult<Vec<NodeId>> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            Unvisited,
            Active,
            Done,
        }

        let mut marks: IndexVec<NodeId, Mark> =
            IndexVec::from_vec(vec![Mark::Unvisited; self.nodes.len()]);
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<(NodeId, usize)> = Vec::new();

        for root in self.nodes.indices() {
            if marks[root] != Mark::Unvisited {
                continue;
            }
            marks[root] = Mark::Active;
            stack.push((root, 0));

            while let Some(top) = stack.last_mut() {
                let (id, cursor) = *top;
                match self.nodes[id].operands.get(cursor) {
                    Some(&operand) => {
                        top.1 += 1;
                        let mark = marks
                            .get(operand)
                            .copied()
                            .ok_or(IrError::UnknownNode(operand))?;
                        match mark {
                            Mark::Unvisited => {
                                marks[operand] = Mark::Active;
                                stack.push((operand, 0));
                            }
                            Mark::Active => return Err(IrError::Cycle(operand)),
                            Mark::Done => {}
                        }
                    }
                    None => {
                        marks[id] = Mark::Done;
                        order.push(id);
                        stack.pop();
                    }
                }
            }
        }

        Ok(order)
    }

    /// Nodes that can affect the return value: everything reachable from it
    /// through operand edges, plus the parameters. Without a return value
    /// every node is considered live.
    pub fn live_nodes(&self) -> FxHashSet<NodeId> {
        let Some(ret) = self.return_value else {
            return self.nodes.indices().collect();
        };
        let mut live = FxHashSet::default();
        let mut worklist = vec![ret];
        while let Some(id) = worklist.pop() {
            if live.insert(id) {
                worklist.extend(self.nodes[id].operands.iter().copied());
            }
        }
        live.extend(self.params.iter().copied());
        live
    }

    /// Validates the structural invariants of the function:
    /// - every operand refers to a node of this function
    /// - the graph is acyclic
    /// - every node's type agrees with its operator and operand types
    /// - a return value is set
    pub fn validate(&self) -> IrResult<()> {
        for node in &self.nodes {
            for &operand in &node.operands {
                self.get_node(operand)?;
            }
        }
        self.topo_sort()?;

        for node in &self.nodes {
            if node.is_param() {
                if !self.params.contains(&node.id) {
                    return Err(IrError::operand(
                        "param",
                        format!("parameter `{}` is not in the signature", node.name),
                    ));
                }
                continue;
            }
            let operand_types: Vec<&Type> =
                node.operands.iter().map(|&id| &self.nodes[id].ty).collect();
            let expected = node.op.result_type(&operand_types)?;
            if expected != node.ty {
                return Err(IrError::TypeMismatch {
                    expected,
                    found: node.ty.clone(),
                    context: format!("type of node `{}`", node.name),
                });
            }
        }

        if self.return_value.is_none() {
            return Err(IrError::MissingReturnValue(self.name.clone()));
        }
        Ok(())
    }
}

impl PrettyPrint for Function {
    fn pretty_print(&self, indent: usize) -> String {
        let base_indent = indent_str(indent);
        let name_of = |id: NodeId| {
            self.nodes
                .get(id)
                .map_or_else(|| id.to_string(), |n| n.name.clone())
        };

        let params = self
            .params
            .iter()
            .map(|&id| format!("{}: {}", self.nodes[id].name, self.nodes[id].ty))
            .join(", ");
        let return_type = self
            .return_value
            .map_or_else(Type::unit, |id| self.nodes[id].ty.clone());

        let mut result = format!(
            "{base_indent}fn {}({params}) -> {return_type} {{\n",
            self.name
        );

        // Fall back to arena order if the graph is malformed.
        let order = self
            .topo_sort()
            .unwrap_or_else(|_| self.nodes.indices().collect());
        for id in order {
            let node = &self.nodes[id];
            if node.is_param() {
                continue;
            }
            let prefix = if self.return_value == Some(id) {
                "ret "
            } else {
                ""
            };
            result.push_str(&format!(
                "{base_indent}  {prefix}{}\n",
                node.render(&name_of)
            ));
        }
        if let Some(ret) = self.return_value.filter(|&id| self.nodes[id].is_param()) {
            result.push_str(&format!("{base_indent}  ret {}\n", self.nodes[ret].name));
        }

        result.push_str(&format!("{base_indent}}}\n"));
        result
    }
}

#[cfg(test)]
#[path = "function_tests.rs"]
mod tests;
