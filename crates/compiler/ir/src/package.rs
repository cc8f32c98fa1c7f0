//! # IR Package
//!
//! The top-level container for a set of functions that are optimized
//! together.

use index_vec::IndexVec;
use rustc_hash::FxHashMap;

use crate::{Function, FunctionId, PrettyPrint};

/// A named collection of functions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    pub name: String,

    /// All functions in this package, indexed by `FunctionId`
    pub functions: IndexVec<FunctionId, Function>,

    /// Mapping from function names to their IDs for lookup
    pub function_names: FxHashMap<String, FunctionId>,
}

impl Package {
    /// Creates a new empty package
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            functions: IndexVec::new(),
            function_names: FxHashMap::default(),
        }
    }

    /// Adds a function to the package and returns its ID
    pub fn add_function(&mut self, function: Function) -> FunctionId {
        let name = function.name.clone();
        let function_id = self.functions.push(function);
        self.function_names.insert(name, function_id);
        function_id
    }

    pub fn get_function(&self, id: FunctionId) -> Option<&Function> {
        self.functions.get(id)
    }

    pub fn get_function_mut(&mut self, id: FunctionId) -> Option<&mut Function> {
        self.functions.get_mut(id)
    }

    /// Looks up a function by name
    pub fn lookup_function(&self, name: &str) -> Option<FunctionId> {
        self.function_names.get(name).copied()
    }

    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    /// Iterates over all functions with their IDs
    pub fn functions(&self) -> impl Iterator<Item = (FunctionId, &Function)> {
        self.functions.iter_enumerated()
    }
}

impl PrettyPrint for Package {
    fn pretty_print(&self, indent: usize) -> String {
        let mut result = format!("package {}\n", self.name);
        for function in &self.functions {
            result.push('\n');
            result.push_str(&function.pretty_print(indent));
        }
        result
    }
}
