//! # Dataflow Simplification
//!
//! Rewrites nodes whose value is, leaf for leaf, already available elsewhere
//! in the graph. The canonical-source analysis tells where every leaf comes
//! from; two nodes with the same source tree compute the same value.

use flowlet_ir::{
    leaf_indices, Function, IrError, IrResult, LeafTypeTreeView, Node, NodeId, Op, Type, TypeKind,
    Value,
};
use rustc_hash::FxHashMap;

use crate::dataflow::{DataflowOptions, DataflowResults};
use crate::node_source::{analyze_sources, NodeSource};
use crate::{FunctionPass, PassError, PassResult};

/// Configuration for [`DataflowSimplificationPass`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimplificationOptions {
    /// Options of the underlying canonical-source analysis
    pub dataflow: DataflowOptions,
    /// Rebuild tuples and arrays whose elements come from different nodes
    pub rebuild_composites: bool,
    /// Replace a node equal to a sub-value of another node with a fresh
    /// projection of that node
    pub materialize_projections: bool,
}

impl Default for SimplificationOptions {
    fn default() -> Self {
        Self {
            dataflow: DataflowOptions::default(),
            rebuild_composites: true,
            materialize_projections: true,
        }
    }
}

/// Dataflow Simplification Pass
///
/// Forwards values through structural operations.
///
/// ### Before:
/// ```text
/// z: (bits[8], bits[8]) = tuple(x, y)
/// b: bits[8] = tuple_index(z, index=1)
/// r: bits[8] = add(b, x)
/// ```
///
/// ### After:
/// ```text
/// z: (bits[8], bits[8]) = tuple(x, y)
/// b: bits[8] = tuple_index(z, index=1)
/// r: bits[8] = add(y, x)
/// ```
///
/// Nodes left without uses are not removed.
#[derive(Debug, Default)]
pub struct DataflowSimplificationPass {
    options: SimplificationOptions,
}

impl DataflowSimplificationPass {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn with_options(options: SimplificationOptions) -> Self {
        Self { options }
    }
}

impl FunctionPass for DataflowSimplificationPass {
    fn name(&self) -> &'static str {
        "dataflow"
    }

    fn description(&self) -> &'static str {
        "Dataflow Optimization"
    }

    fn run(&mut self, function: &mut Function) -> PassResult<bool> {
        let results = analyze_sources(function, self.options.dataflow)?;

        // Rewrite a copy so that a failure leaves `function` untouched.
        let mut working = function.clone();
        let changed = Rewriter::new(&mut working, &results, self.options).run()?;
        if changed {
            *function = working;
        }
        Ok(changed)
    }
}

/// Applies the canonical-source facts of one function
struct Rewriter<'f, 'r> {
    function: &'f mut Function,
    results: &'r DataflowResults<NodeSource>,
    options: SimplificationOptions,
    /// Source tree of every visited node, mapped to the node now providing it
    source_map: FxHashMap<LeafTypeTreeView<'r, NodeSource>, NodeId>,
    /// First literal node holding each value
    literals: FxHashMap<Value, NodeId>,
}

impl<'f, 'r> Rewriter<'f, 'r> {
    fn new(
        function: &'f mut Function,
        results: &'r DataflowResults<NodeSource>,
        options: SimplificationOptions,
    ) -> Self {
        let mut literals = FxHashMap::default();
        for node in function.nodes() {
            if let Some(value) = node.literal_value() {
                literals.entry(value.clone()).or_insert(node.id);
            }
        }
        Self {
            function,
            results,
            options,
            source_map: FxHashMap::default(),
            literals,
        }
    }

    fn run(mut self) -> PassResult<bool> {
        let results = self.results;
        let order = self.function.topo_sort()?;
        let live = self.function.live_nodes();
        let mut changed = false;

        for id in order {
            if !live.contains(&id) || self.function.node(id).ty.is_empty() {
                continue;
            }
            let tree = results.value(id)?.as_view();

            if let Some(&existing) = self.source_map.get(&tree) {
                if existing != id {
                    self.replace(id, existing)?;
                    changed = true;
                }
                continue;
            }

            let replacement = match self.single_origin_projection(id, tree)? {
                Some(projection) => Some(projection),
                None => self.rebuild_composite(id, tree)?,
            };
            match replacement {
                Some(new) => {
                    self.replace(id, new)?;
                    self.source_map.insert(tree, new);
                    changed = true;
                }
                None => {
                    self.source_map.insert(tree, id);
                }
            }
        }

        Ok(changed)
    }

    fn replace(&mut self, old: NodeId, new: NodeId) -> PassResult<()> {
        log::debug!(
            "dataflow: replacing uses of `{}` with `{}` in '{}'",
            self.function.node(old).name,
            self.function.node(new).name,
            self.function.name
        );
        self.function
            .replace_uses_with(old, new)
            .map_err(|err| PassError::rewrite(old, err))?;
        Ok(())
    }

    /// If every leaf of `id` is the matching leaf of one sub-value of another
    /// node, returns a projection of that node equal to `id`. Returns `None`
    /// when `id` already is that projection.
    fn single_origin_projection(
        &mut self,
        id: NodeId,
        tree: LeafTypeTreeView<'r, NodeSource>,
    ) -> PassResult<Option<NodeId>> {
        if !self.options.materialize_projections {
            return Ok(None);
        }
        let Some((origin, prefix)) = self.common_origin(tree)? else {
            return Ok(None);
        };
        if origin == id || prefix.is_empty() {
            return Ok(None);
        }
        if projection_path(self.function, id) == (origin, prefix.clone()) {
            return Ok(None);
        }

        let projection = self
            .build_projection(origin, &prefix)
            .map_err(|err| PassError::rewrite(id, err))?;
        Ok(Some(projection))
    }

    /// The node and path whose sub-value has exactly the sources in `tree`
    fn common_origin(
        &self,
        tree: LeafTypeTreeView<'r, NodeSource>,
    ) -> PassResult<Option<(NodeId, Vec<usize>)>> {
        let Some(first) = tree.elements().first() else {
            return Ok(None);
        };
        let Some(relative) = leaf_indices(tree.ty()).into_iter().next() else {
            return Ok(None);
        };
        let Some(prefix_len) = first.tree_index().len().checked_sub(relative.len()) else {
            return Ok(None);
        };
        let (prefix, suffix) = first.tree_index().split_at(prefix_len);
        if suffix != relative.as_slice() {
            return Ok(None);
        }

        let origin_tree = self.results.value(first.node())?;
        match origin_tree.subtree(prefix) {
            Ok(candidate) if candidate == tree => Ok(Some((first.node(), prefix.to_vec()))),
            _ => Ok(None),
        }
    }

    /// Builds `base[path]` out of `tuple_index` and `array_index` nodes
    fn build_projection(&mut self, base: NodeId, path: &[usize]) -> IrResult<NodeId> {
        let mut current = base;
        let mut rest = path;
        while let Some(&step) = rest.first() {
            let ty = self.function.get_node(current)?.ty.clone();
            match ty.kind() {
                TypeKind::Tuple(_) => {
                    current = self
                        .function
                        .add_node(Op::TupleIndex(step), vec![current], None)?;
                    rest = &rest[1..];
                }
                TypeKind::Array { .. } => {
                    // Consecutive array dimensions share one `array_index`.
                    let mut operands = vec![current];
                    let mut element = &ty;
                    while let (Some(&position), Some((inner, size))) =
                        (rest.first(), element.as_array())
                    {
                        operands.push(self.index_literal(position, size)?);
                        element = inner;
                        rest = &rest[1..];
                    }
                    current = self.function.add_node(Op::ArrayIndex, operands, None)?;
                }
                TypeKind::Bits(_) | TypeKind::Token => {
                    return Err(IrError::mismatch(&ty, path, "projection into a leaf"));
                }
            }
        }
        Ok(current)
    }

    /// A literal addressing `position` of an array of `size` elements,
    /// reusing an existing one when possible
    fn index_literal(&mut self, position: usize, size: usize) -> IrResult<NodeId> {
        let last = size.saturating_sub(1);
        let width = (usize::BITS - last.leading_zeros()).max(1) as usize;
        let value = Value::bits(width, position as u64);
        if let Some(&existing) = self.literals.get(&value) {
            return Ok(existing);
        }
        let id = self
            .function
            .add_node(Op::Literal(value.clone()), Vec::new(), None)?;
        self.literals.insert(value, id);
        Ok(id)
    }

    /// Rebuilds a tuple or array whose elements each match an existing node
    fn rebuild_composite(
        &mut self,
        id: NodeId,
        tree: LeafTypeTreeView<'r, NodeSource>,
    ) -> PassResult<Option<NodeId>> {
        if !self.options.rebuild_composites {
            return Ok(None);
        }
        let node = self.function.node(id);
        if !is_rebuildable(node) {
            return Ok(None);
        }
        let op = match node.ty.kind() {
            TypeKind::Tuple(_) => Op::Tuple,
            TypeKind::Array { .. } => Op::Array,
            TypeKind::Bits(_) | TypeKind::Token => return Ok(None),
        };

        let mut elements = Vec::with_capacity(node.ty.child_count());
        for i in 0..node.ty.child_count() {
            match self.source_map.get(&tree.subtree(&[i])?) {
                Some(&element) => elements.push(element),
                None => return Ok(None),
            }
        }
        let rebuilt = self
            .function
            .add_node(op, elements, None)
            .map_err(|err| PassError::rewrite(id, err))?;
        Ok(Some(rebuilt))
    }
}

/// Nodes that are worth rebuilding from their elements: everything except
/// constructors, literals and projections.
fn is_rebuildable(node: &Node) -> bool {
    !matches!(
        node.op,
        Op::Tuple | Op::Array | Op::Literal(_) | Op::TupleIndex(_) | Op::ArrayIndex
    )
}

/// Strips `tuple_index` and literal `array_index` layers off `id`, returning
/// the innermost node and the path projected out of it.
fn projection_path(function: &Function, id: NodeId) -> (NodeId, Vec<usize>) {
    let mut current = id;
    let mut reversed = Vec::new();
    loop {
        let node = function.node(current);
        match (&node.op, node.operands.split_first()) {
            (Op::TupleIndex(index), Some((&base, _))) => {
                reversed.push(*index);
                current = base;
            }
            (Op::ArrayIndex, Some((&base, indices))) => {
                let Some(positions) = literal_positions(function, &function.node(base).ty, indices)
                else {
                    break;
                };
                reversed.extend(positions.into_iter().rev());
                current = base;
            }
            _ => break,
        }
    }
    reversed.reverse();
    (current, reversed)
}

/// The clamped positions addressed by literal `indices` into `ty`, or
/// `None` if any index is not a literal
fn literal_positions(function: &Function, ty: &Type, indices: &[NodeId]) -> Option<Vec<usize>> {
    let mut element = ty;
    let mut positions = Vec::with_capacity(indices.len());
    for &index in indices {
        let (inner, size) = element.as_array()?;
        let value = function.node(index).literal_bits()?;
        let position = usize::try_from(value).unwrap_or(usize::MAX);
        positions.push(position.min(size.saturating_sub(1)));
        element = inner;
    }
    Some(positions)
}

#[cfg(test)]
#[path = "dataflow_simplification_tests.rs"]
mod tests;
