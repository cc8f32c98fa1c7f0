//! # Dataflow Visitor
//!
//! A generic analysis engine computing one [`LeafTypeTree`] of facts per
//! node. Structural operators (construction, projection, slicing, update,
//! selects) are handled once here by moving facts between leaves; a
//! [`DataflowDomain`] supplies the two things that depend on the analysis:
//! facts for opaque operators, and the join at merge points.
//!
//! ```text
//! tuple(a, b)            -> [facts(a)..., facts(b)...]
//! tuple_index(t, 1)      -> facts(t)[1]
//! sel(s, [a, b])         -> join(facts(a)[i], facts(b)[i]) for each leaf i
//! add(a, b)              -> default_handler
//! ```

use std::fmt;

use flowlet_ir::{Function, IrError, LeafTypeTree, LeafTypeTreeView, Node, NodeId, Op, Type};
use index_vec::IndexVec;
use itertools::Itertools;

use crate::{PassError, PassResult};

/// The analysis-specific half of a dataflow analysis
pub trait DataflowDomain {
    type Fact: Clone + fmt::Debug;

    /// Computes the facts of a node the visitor does not handle structurally.
    /// The returned tree must have the node's type.
    fn default_handler(
        &mut self,
        function: &Function,
        node: NodeId,
    ) -> PassResult<LeafTypeTree<Self::Fact>>;

    /// Merges the facts that may flow into leaf `index` of `node`.
    ///
    /// `data_sources` holds one fact per contributing branch and
    /// `control_sources` the trees of the values deciding between them. The
    /// result must depend only on the set of data sources: joining is
    /// commutative, associative and deterministic.
    fn join_elements(
        &mut self,
        element_type: &Type,
        data_sources: &[&Self::Fact],
        control_sources: &[LeafTypeTreeView<'_, Self::Fact>],
        node: NodeId,
        index: &[usize],
    ) -> PassResult<Self::Fact>;
}

/// Tuning knobs for the structural handlers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataflowOptions {
    /// Only join the branches a literal selector can actually pick
    pub narrow_literal_selectors: bool,
}

impl Default for DataflowOptions {
    fn default() -> Self {
        Self {
            narrow_literal_selectors: true,
        }
    }
}

/// The memoized facts of every node of one function
#[derive(Debug, Clone)]
pub struct DataflowResults<F> {
    values: IndexVec<NodeId, Option<LeafTypeTree<F>>>,
}

impl<F> DataflowResults<F> {
    fn with_capacity(node_count: usize) -> Self {
        Self {
            values: (0..node_count).map(|_| None).collect(),
        }
    }

    /// The facts of `node`
    pub fn value(&self, node: NodeId) -> PassResult<&LeafTypeTree<F>> {
        self.values
            .get(node)
            .and_then(Option::as_ref)
            .ok_or(PassError::MissingFact(node))
    }

    /// Iterates over every node with its facts, in node order
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &LeafTypeTree<F>)> {
        self.values
            .iter_enumerated()
            .filter_map(|(id, tree)| tree.as_ref().map(|tree| (id, tree)))
    }

    pub fn len(&self) -> usize {
        self.values.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Positions one index operand can address in one array dimension
#[derive(Debug, Clone, PartialEq, Eq)]
struct IndexCandidates {
    /// In-bounds positions, ascending
    positions: Vec<usize>,
    /// Whether the index may also be out of bounds
    may_miss: bool,
}

impl IndexCandidates {
    fn is_exact(&self) -> bool {
        self.positions.len() == 1 && !self.may_miss
    }
}

/// Largest value representable in `width` bits
const fn max_value(width: usize) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1 << width) - 1
    }
}

fn to_usize(value: u64) -> usize {
    usize::try_from(value).unwrap_or(usize::MAX)
}

/// Runs a [`DataflowDomain`] over a function
pub struct DataflowVisitor<D: DataflowDomain> {
    domain: D,
    options: DataflowOptions,
    results: DataflowResults<D::Fact>,
}

impl<D: DataflowDomain> DataflowVisitor<D> {
    pub fn new(domain: D) -> Self {
        Self::with_options(domain, DataflowOptions::default())
    }

    pub fn with_options(domain: D, options: DataflowOptions) -> Self {
        Self {
            domain,
            options,
            results: DataflowResults::with_capacity(0),
        }
    }

    /// Visits every node of `function`, operands first, and returns the
    /// facts of all of them. Any failure aborts the run; partial results are
    /// never returned.
    pub fn analyze(mut self, function: &Function) -> PassResult<DataflowResults<D::Fact>> {
        self.results = DataflowResults::with_capacity(function.node_count());
        for id in function.topo_sort()? {
            let node = function.get_node(id)?;
            let tree = self.visit(function, node)?;
            self.set_value(node, tree)?;
        }
        Ok(self.results)
    }

    /// Records the facts of `node`
    fn set_value(&mut self, node: &Node, tree: LeafTypeTree<D::Fact>) -> PassResult<()> {
        if tree.ty() != &node.ty {
            return Err(PassError::StructuralMismatch(IrError::TypeMismatch {
                expected: node.ty.clone(),
                found: tree.ty().clone(),
                context: format!("facts computed for node `{}`", node.name),
            }));
        }
        log::trace!("{}: {:?}", node.name, tree.elements());
        self.results.values[node.id] = Some(tree);
        Ok(())
    }

    /// The facts of an already visited node
    fn value(&self, node: NodeId) -> PassResult<&LeafTypeTree<D::Fact>> {
        self.results.value(node)
    }

    fn visit(&mut self, function: &Function, node: &Node) -> PassResult<LeafTypeTree<D::Fact>> {
        match &node.op {
            Op::Tuple | Op::Array => {
                let children = node
                    .operands
                    .iter()
                    .map(|&operand| self.value(operand).map(LeafTypeTree::as_view))
                    .collect::<PassResult<Vec<_>>>()?;
                Ok(LeafTypeTree::concat(node.ty.clone(), &children)?)
            }
            Op::ArrayConcat => {
                let mut elements = Vec::with_capacity(node.ty.leaf_count());
                for &operand in &node.operands {
                    elements.extend_from_slice(self.value(operand)?.elements());
                }
                Ok(LeafTypeTree::from_elements(node.ty.clone(), elements)?)
            }
            Op::TupleIndex(index) => {
                let tuple = self.value(operand(node, 0)?)?;
                Ok(tuple.subtree(&[*index])?.to_owned())
            }
            Op::Identity => Ok(self.value(operand(node, 0)?)?.clone()),
            Op::ArrayIndex => self.handle_array_index(function, node),
            Op::ArraySlice { width } => self.handle_array_slice(function, node, *width),
            Op::ArrayUpdate => self.handle_array_update(function, node),
            Op::Select { has_default } => self.handle_select(function, node, *has_default),
            Op::PrioritySelect => self.handle_priority_select(function, node),
            Op::OneHotSelect => self.handle_one_hot_select(function, node),
            Op::Param | Op::Literal(_) | Op::OneHot | Op::Unary(_) | Op::Binary(_) => {
                self.domain.default_handler(function, node.id)
            }
        }
    }

    /// The literal value of `id`, if selectors may be narrowed by it
    fn literal_selector(&self, function: &Function, id: NodeId) -> Option<u64> {
        if self.options.narrow_literal_selectors {
            function.node(id).literal_bits()
        } else {
            None
        }
    }

    /// Joins the trees of `branches` leaf by leaf. A single branch is copied.
    fn join_branches(
        &mut self,
        node: &Node,
        branches: &[NodeId],
        control: &[NodeId],
    ) -> PassResult<LeafTypeTree<D::Fact>> {
        if let [branch] = branches {
            return Ok(self.value(*branch)?.clone());
        }
        let trees = branches
            .iter()
            .map(|&branch| self.results.value(branch))
            .collect::<PassResult<Vec<_>>>()?;
        let control_sources = control
            .iter()
            .map(|&id| self.results.value(id).map(LeafTypeTree::as_view))
            .collect::<PassResult<Vec<_>>>()?;
        let domain = &mut self.domain;
        LeafTypeTree::create_from_function(
            node.ty.clone(),
            |leaf_type: &Type, index: &[usize]| -> PassResult<D::Fact> {
                let data_sources = trees
                    .iter()
                    .map(|tree| tree.get(index))
                    .collect::<Result<Vec<_>, IrError>>()?;
                domain.join_elements(leaf_type, &data_sources, &control_sources, node.id, index)
            },
        )
    }

    /// Resolves the positions each index operand may address, one entry per
    /// array dimension peeled off `array_type`. Literal indices clamp when
    /// `clamp` is set and miss otherwise.
    fn index_candidates(
        &self,
        function: &Function,
        array_type: &Type,
        indices: &[NodeId],
        clamp: bool,
    ) -> PassResult<Vec<IndexCandidates>> {
        let mut current = array_type;
        let mut candidates = Vec::with_capacity(indices.len());
        for &index in indices {
            let (element, size) = current.as_array().ok_or_else(|| {
                PassError::InvalidGraph(IrError::operand(
                    "array index",
                    format!("too many indices for `{array_type}`"),
                ))
            })?;
            let last = size.saturating_sub(1);
            let index_node = function.get_node(index)?;
            let entry = match index_node.literal_bits() {
                Some(value) => {
                    let position = to_usize(value);
                    if clamp {
                        IndexCandidates {
                            positions: vec![position.min(last)],
                            may_miss: false,
                        }
                    } else if position < size {
                        IndexCandidates {
                            positions: vec![position],
                            may_miss: false,
                        }
                    } else {
                        IndexCandidates {
                            positions: Vec::new(),
                            may_miss: true,
                        }
                    }
                }
                None => {
                    let width = index_node.ty.bit_width().ok_or_else(|| {
                        PassError::InvalidGraph(IrError::operand(
                            "array index",
                            format!("index `{}` is not bits", index_node.name),
                        ))
                    })?;
                    let max = to_usize(max_value(width));
                    IndexCandidates {
                        positions: (0..size.min(max.saturating_add(1))).collect(),
                        may_miss: !clamp && max >= size,
                    }
                }
            };
            candidates.push(entry);
            current = element;
        }
        Ok(candidates)
    }

    fn handle_array_index(
        &mut self,
        function: &Function,
        node: &Node,
    ) -> PassResult<LeafTypeTree<D::Fact>> {
        let array = operand(node, 0)?;
        let indices = &node.operands[1..];
        let array_type = &function.get_node(array)?.ty;
        let candidates = self.index_candidates(function, array_type, indices, true)?;

        let array_tree = self.results.value(array)?;
        if indices.is_empty() {
            return Ok(array_tree.clone());
        }
        let paths: Vec<Vec<usize>> = candidates
            .iter()
            .map(|c| c.positions.clone())
            .multi_cartesian_product()
            .collect();
        match paths.as_slice() {
            [] => {
                return Err(IrError::mismatch(array_type, &[], "index into an empty array").into())
            }
            [path] => return Ok(array_tree.subtree(path)?.to_owned()),
            _ => {}
        }

        let sources = paths
            .iter()
            .map(|path| array_tree.subtree(path))
            .collect::<Result<Vec<_>, IrError>>()?;
        let control_sources = indices
            .iter()
            .map(|&id| self.results.value(id).map(LeafTypeTree::as_view))
            .collect::<PassResult<Vec<_>>>()?;
        let domain = &mut self.domain;
        LeafTypeTree::create_from_function(
            node.ty.clone(),
            |leaf_type: &Type, index: &[usize]| -> PassResult<D::Fact> {
                let data_sources = sources
                    .iter()
                    .map(|view| view.get(index))
                    .collect::<Result<Vec<_>, IrError>>()?;
                domain.join_elements(leaf_type, &data_sources, &control_sources, node.id, index)
            },
        )
    }

    fn handle_array_slice(
        &mut self,
        function: &Function,
        node: &Node,
        width: usize,
    ) -> PassResult<LeafTypeTree<D::Fact>> {
        let array = operand(node, 0)?;
        let start = operand(node, 1)?;
        let size = function
            .get_node(array)?
            .ty
            .as_array()
            .map(|(_, size)| size)
            .ok_or_else(|| {
                PassError::InvalidGraph(IrError::operand("array_slice", "operand is not an array"))
            })?;
        let last = size.saturating_sub(1);

        let starts: Vec<usize> = match function.node(start).literal_bits() {
            Some(value) => vec![to_usize(value).min(last)],
            None => {
                let start_width = function.node(start).ty.bit_width().unwrap_or_default();
                (0..=to_usize(max_value(start_width)).min(last)).collect()
            }
        };
        let array_tree = self.results.value(array)?;
        let control_sources = [self.results.value(start)?.as_view()];

        if let [first] = starts.as_slice() {
            let mut elements = Vec::with_capacity(node.ty.leaf_count());
            for i in 0..width {
                let position = first.saturating_add(i).min(last);
                elements.extend_from_slice(array_tree.subtree(&[position])?.elements());
            }
            return Ok(LeafTypeTree::from_elements(node.ty.clone(), elements)?);
        }

        let domain = &mut self.domain;
        LeafTypeTree::create_from_function(
            node.ty.clone(),
            |leaf_type: &Type, index: &[usize]| -> PassResult<D::Fact> {
                let Some((&offset, rest)) = index.split_first() else {
                    return Err(PassError::from(IrError::operand(
                        "array_slice",
                        "result is not an array",
                    )));
                };
                let data_sources = starts
                    .iter()
                    .map(|&s| {
                        let mut source = vec![s.saturating_add(offset).min(last)];
                        source.extend_from_slice(rest);
                        array_tree.get(&source)
                    })
                    .collect::<Result<Vec<_>, IrError>>()?;
                domain.join_elements(leaf_type, &data_sources, &control_sources, node.id, index)
            },
        )
    }

    fn handle_array_update(
        &mut self,
        function: &Function,
        node: &Node,
    ) -> PassResult<LeafTypeTree<D::Fact>> {
        let array = operand(node, 0)?;
        let value = operand(node, 1)?;
        let indices = &node.operands[2..];
        let candidates =
            self.index_candidates(function, &function.get_node(array)?.ty, indices, false)?;

        // A literal out-of-bounds index anywhere makes the update a no-op.
        if candidates.iter().any(|c| c.positions.is_empty()) {
            return Ok(self.value(array)?.clone());
        }
        if candidates.iter().all(IndexCandidates::is_exact) {
            let path: Vec<usize> = candidates.iter().map(|c| c.positions[0]).collect();
            let mut tree = self.value(array)?.clone();
            tree.subtree_mut(&path)?
                .copy_from(self.value(value)?.as_view())?;
            return Ok(tree);
        }

        let depth = indices.len();
        let array_tree = self.results.value(array)?;
        let value_tree = self.results.value(value)?;
        let control_sources = indices
            .iter()
            .map(|&id| self.results.value(id).map(LeafTypeTree::as_view))
            .collect::<PassResult<Vec<_>>>()?;
        let domain = &mut self.domain;
        LeafTypeTree::create_from_function(
            node.ty.clone(),
            |leaf_type: &Type, index: &[usize]| -> PassResult<D::Fact> {
                let old = array_tree.get(index)?;
                let (prefix, rest) = index.split_at(depth.min(index.len()));
                let addressable = prefix.len() == depth
                    && prefix
                        .iter()
                        .zip(&candidates)
                        .all(|(position, c)| c.positions.contains(position));
                if !addressable {
                    return Ok(old.clone());
                }
                let new = value_tree.get(rest)?;
                domain.join_elements(leaf_type, &[old, new], &control_sources, node.id, index)
            },
        )
    }

    fn handle_select(
        &mut self,
        function: &Function,
        node: &Node,
        has_default: bool,
    ) -> PassResult<LeafTypeTree<D::Fact>> {
        let selector = operand(node, 0)?;
        let branches = &node.operands[1..];
        let case_count = branches.len().saturating_sub(usize::from(has_default));
        if let Some(value) = self.literal_selector(function, selector) {
            let position = to_usize(value);
            let chosen = match (position < case_count, has_default) {
                (true, _) => branches.get(position),
                (false, true) => branches.last(),
                (false, false) => None,
            }
            .copied()
            .ok_or_else(|| {
                PassError::InvalidGraph(IrError::operand(
                    "sel",
                    format!("selector value {value} has no case and no default"),
                ))
            })?;
            return Ok(self.value(chosen)?.clone());
        }
        self.join_branches(node, branches, &[selector])
    }

    fn handle_priority_select(
        &mut self,
        function: &Function,
        node: &Node,
    ) -> PassResult<LeafTypeTree<D::Fact>> {
        let selector = operand(node, 0)?;
        let branches = &node.operands[1..];
        let Some((&default, cases)) = branches.split_last() else {
            return Err(PassError::InvalidGraph(IrError::operand(
                "priority_sel",
                "missing default",
            )));
        };
        if let Some(value) = self.literal_selector(function, selector) {
            let chosen = if value == 0 {
                default
            } else {
                let lowest = value.trailing_zeros() as usize;
                cases.get(lowest).copied().unwrap_or(default)
            };
            return Ok(self.value(chosen)?.clone());
        }
        self.join_branches(node, branches, &[selector])
    }

    fn handle_one_hot_select(
        &mut self,
        function: &Function,
        node: &Node,
    ) -> PassResult<LeafTypeTree<D::Fact>> {
        let selector = operand(node, 0)?;
        let cases = &node.operands[1..];
        if let Some(value) = self.literal_selector(function, selector) {
            let chosen: Vec<NodeId> = cases
                .iter()
                .enumerate()
                .filter(|&(i, _)| i < 64 && value & (1 << i) != 0)
                .map(|(_, &case)| case)
                .collect();
            if chosen.is_empty() {
                return self.domain.default_handler(function, node.id);
            }
            return self.join_branches(node, &chosen, &[selector]);
        }
        if matches!(function.node(selector).op, Op::OneHot) {
            return self.join_branches(node, cases, &[selector]);
        }
        self.domain.default_handler(function, node.id)
    }
}

/// The `i`th operand of `node`
fn operand(node: &Node, i: usize) -> PassResult<NodeId> {
    node.operands.get(i).copied().ok_or_else(|| {
        PassError::InvalidGraph(IrError::operand(
            node.op.name(),
            format!("node `{}` has no operand {i}", node.name),
        ))
    })
}

#[cfg(test)]
#[path = "dataflow_tests.rs"]
mod tests;
