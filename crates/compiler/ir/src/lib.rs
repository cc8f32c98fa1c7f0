//! # Flowlet Dataflow IR
//!
//! This crate defines the graph IR that the optimizer in `flowlet-opt`
//! operates on: a dataflow graph of typed nodes with no control flow.
//!
//! ## Architecture
//!
//! ```text
//! Package
//! functions: IndexVec<FunctionId, Function>
//!
//! Function
//! nodes: IndexVec<NodeId, Node>
//! params: Vec<NodeId>
//! return_value: Option<NodeId>
//!
//! Node
//! op: Op
//! operands: Vec<NodeId>
//! ty: Type
//! ```
//!
//! Aggregate types are tuples and arrays over `bits[N]` and `token` leaves.
//! [`LeafTypeTree`] attaches one value to every leaf of such a type and is
//! the unit of per-node analysis results.

pub use builder::FunctionBuilder;
pub use error::{IrError, IrResult};
pub use function::Function;
pub use leaf_type_tree::{
    for_each_index, for_each_index_mut, leaf_indices, LeafTypeTree, LeafTypeTreeView,
    MutableLeafTypeTreeView, TreeIndex,
};
pub use node::Node;
pub use op::{BinaryOp, Op, UnaryOp};
pub use package::Package;
pub use types::{Type, TypeKind};
pub use value::Value;

pub mod builder;
pub mod error;
pub mod function;
pub mod leaf_type_tree;
pub mod node;
pub mod op;
pub mod package;
pub mod types;
pub mod value;

// --- Core Identifiers ---

index_vec::define_index_type! {
    /// Unique identifier for a function within a package
    pub struct FunctionId = usize;
}

index_vec::define_index_type! {
    /// Unique identifier for a node within a function
    pub struct NodeId = usize;
    DEBUG_FORMAT = "%{}";
    DISPLAY_FORMAT = "%{}";
}

// --- Pretty Printing Support ---

/// Trait for pretty-printing IR constructs
pub trait PrettyPrint {
    fn pretty_print(&self, indent: usize) -> String;
}

/// Helper function to create indentation
pub(crate) fn indent_str(level: usize) -> String {
    "  ".repeat(level)
}
