//! Errors raised by analyses and optimization passes.

use flowlet_ir::{IrError, NodeId, Op, TreeIndex};

/// Errors produced while analyzing or rewriting a function.
///
/// Any of these aborts the pass for the affected function; the function is
/// left exactly as it was before the pass started.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PassError {
    /// A leaf-tree operation was given an index that does not fit the type
    #[error(transparent)]
    StructuralMismatch(IrError),

    /// The default handler was reached for an operator that the analysis
    /// should have handled structurally
    #[error("operator `{op}` of node {node} reached the default handler")]
    UnhandledOperator { node: NodeId, op: Op },

    /// The join extension point could not produce a fact
    #[error("join failed at node {node}, index {index:?}: {reason}")]
    JoinFailure {
        node: NodeId,
        index: TreeIndex,
        reason: String,
    },

    /// A replacement could not be substituted into the graph
    #[error("failed to rewrite node {node}: {source}")]
    RewriteFailure {
        node: NodeId,
        #[source]
        source: IrError,
    },

    /// A fact was requested for a node the visitor has not computed
    #[error("no dataflow fact for node {0}")]
    MissingFact(NodeId),

    /// The function itself is malformed
    #[error("invalid graph: {0}")]
    InvalidGraph(IrError),
}

impl PassError {
    pub fn rewrite(node: NodeId, source: IrError) -> Self {
        Self::RewriteFailure { node, source }
    }
}

impl From<IrError> for PassError {
    fn from(err: IrError) -> Self {
        if err.is_structural_mismatch() {
            Self::StructuralMismatch(err)
        } else {
            Self::InvalidGraph(err)
        }
    }
}

/// Result type for passes and analyses
pub type PassResult<T> = Result<T, PassError>;
