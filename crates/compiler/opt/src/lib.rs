//! # Flowlet Optimizer
//!
//! Optimization passes over the `flowlet-ir` dataflow graph.
//!
//! ## Architecture
//!
//! ```text
//! PassManager
//! passes: Vec<Box<dyn FunctionPass>>
//!
//! DataflowSimplificationPass
//! analysis: DataflowVisitor<NodeSourceDomain>
//! results: DataflowResults<NodeSource>
//! ```
//!
//! [`DataflowVisitor`] walks a function in topological order and computes
//! one [`LeafTypeTree`](flowlet_ir::LeafTypeTree) of facts per node. It knows
//! how structural operators (tuples, arrays, selects) move values around and
//! defers everything else to a [`DataflowDomain`]. The canonical-source
//! domain in [`node_source`] is the one used by the simplification pass.

pub use dataflow::{DataflowDomain, DataflowOptions, DataflowResults, DataflowVisitor};
pub use dataflow_simplification::{DataflowSimplificationPass, SimplificationOptions};
pub use error::{PassError, PassResult};
pub use node_source::{analyze_sources, NodeSource, NodeSourceDomain};
pub use passes::{
    function_has_aggregates, ConditionalPass, FunctionPass, PassInvocation, PassManager,
    PassResults,
};

pub mod dataflow;
pub mod dataflow_simplification;
pub mod error;
pub mod node_source;
pub mod passes;
