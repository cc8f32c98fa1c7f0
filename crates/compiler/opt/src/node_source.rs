//! # Canonical Sources
//!
//! A dataflow domain tracking, for every leaf of every node, the node and
//! leaf that provably produced that exact value. Structural operators pass
//! sources through untouched, so `tuple_index(tuple(x, y), 1)` has the
//! source of `y`. At a merge point a leaf keeps its source only when every
//! contributing branch agrees on it; otherwise the merge node itself becomes
//! the source.

use std::fmt;

use flowlet_ir::{
    leaf_indices, Function, LeafTypeTree, LeafTypeTreeView, NodeId, TreeIndex, Type,
};
use itertools::Itertools;

use crate::dataflow::{DataflowDomain, DataflowOptions, DataflowResults, DataflowVisitor};
use crate::{PassError, PassResult};

/// Leaf `tree_index` of the value produced by `node`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeSource {
    node: NodeId,
    tree_index: TreeIndex,
}

impl NodeSource {
    pub fn new(node: NodeId, tree_index: &[usize]) -> Self {
        Self {
            node,
            tree_index: TreeIndex::from_slice(tree_index),
        }
    }

    pub const fn node(&self) -> NodeId {
        self.node
    }

    pub fn tree_index(&self) -> &[usize] {
        &self.tree_index
    }
}

impl fmt::Display for NodeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{{}}}", self.node, self.tree_index.iter().join(", "))
    }
}

/// The canonical-source analysis
#[derive(Debug, Clone, Copy, Default)]
pub struct NodeSourceDomain;

impl DataflowDomain for NodeSourceDomain {
    type Fact = NodeSource;

    /// Every leaf originates at the node itself.
    fn default_handler(
        &mut self,
        function: &Function,
        node: NodeId,
    ) -> PassResult<LeafTypeTree<NodeSource>> {
        let n = function.get_node(node)?;
        if n.op.is_structural() {
            return Err(PassError::UnhandledOperator {
                node,
                op: n.op.clone(),
            });
        }
        let sources = leaf_indices(&n.ty)
            .into_iter()
            .map(|tree_index| NodeSource { node, tree_index })
            .collect();
        Ok(LeafTypeTree::from_elements(n.ty.clone(), sources)?)
    }

    fn join_elements(
        &mut self,
        _element_type: &Type,
        data_sources: &[&NodeSource],
        _control_sources: &[LeafTypeTreeView<'_, NodeSource>],
        node: NodeId,
        index: &[usize],
    ) -> PassResult<NodeSource> {
        let Some((first, rest)) = data_sources.split_first() else {
            return Err(PassError::JoinFailure {
                node,
                index: TreeIndex::from_slice(index),
                reason: "no contributing branches".to_string(),
            });
        };
        if rest.iter().all(|source| source == first) {
            Ok((*first).clone())
        } else {
            Ok(NodeSource::new(node, index))
        }
    }
}

/// Computes the canonical source of every leaf of every node of `function`
pub fn analyze_sources(
    function: &Function,
    options: DataflowOptions,
) -> PassResult<DataflowResults<NodeSource>> {
    DataflowVisitor::with_options(NodeSourceDomain, options).analyze(function)
}
