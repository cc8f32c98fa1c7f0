//! # Optimization Passes
//!
//! The pass trait, a pass manager that can iterate to a fixed point, and the
//! record of what every pass invocation did.

use flowlet_ir::{Function, Package};

use crate::{DataflowSimplificationPass, PassResult};

/// A trait for function-level optimization passes
pub trait FunctionPass {
    /// Short name used in logs and pass results
    fn name(&self) -> &'static str;

    /// Human-readable description of what the pass does
    fn description(&self) -> &'static str;

    /// Apply this pass to a function.
    /// Returns `Ok(true)` if the function was modified. On error the function
    /// must be left as it was.
    fn run(&mut self, function: &mut Function) -> PassResult<bool>;
}

/// Returns true if any node of the function produces a tuple or array,
/// i.e. there is structure for dataflow simplification to look through.
pub fn function_has_aggregates(function: &Function) -> bool {
    function.nodes().any(|node| !node.ty.is_leaf())
}

/// A wrapper for conditional pass execution
///
/// This allows passes to be skipped based on function characteristics.
pub struct ConditionalPass {
    pass: Box<dyn FunctionPass>,
    condition: fn(&Function) -> bool,
}

impl ConditionalPass {
    pub fn new(pass: Box<dyn FunctionPass>, condition: fn(&Function) -> bool) -> Self {
        Self { pass, condition }
    }
}

impl FunctionPass for ConditionalPass {
    fn name(&self) -> &'static str {
        self.pass.name()
    }

    fn description(&self) -> &'static str {
        self.pass.description()
    }

    fn run(&mut self, function: &mut Function) -> PassResult<bool> {
        if (self.condition)(function) {
            self.pass.run(function)
        } else {
            Ok(false)
        }
    }
}

/// One pass invocation on one function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassInvocation {
    pub pass: &'static str,
    pub function: String,
    pub changed: bool,
}

/// Accumulates the outcome of every pass invocation, in execution order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassResults {
    invocations: Vec<PassInvocation>,
}

impl PassResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, pass: &'static str, function: &str, changed: bool) {
        self.invocations.push(PassInvocation {
            pass,
            function: function.to_string(),
            changed,
        });
    }

    pub fn invocations(&self) -> &[PassInvocation] {
        &self.invocations
    }

    /// Returns true if any recorded invocation changed its function
    pub fn changed(&self) -> bool {
        self.invocations.iter().any(|i| i.changed)
    }

    /// Number of invocations of `pass` that changed their function
    pub fn change_count(&self, pass: &str) -> usize {
        self.invocations
            .iter()
            .filter(|i| i.pass == pass && i.changed)
            .count()
    }
}

/// Pass manager for running a sequence of passes
pub struct PassManager {
    passes: Vec<Box<dyn FunctionPass>>,
    max_iterations: usize,
}

impl Default for PassManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PassManager {
    /// Create a new pass manager that runs its passes once
    pub fn new() -> Self {
        Self {
            passes: Vec::new(),
            max_iterations: 1,
        }
    }

    /// Add a pass to the manager
    pub fn add_pass<P: FunctionPass + 'static>(mut self, pass: P) -> Self {
        self.passes.push(Box::new(pass));
        self
    }

    /// Add a conditional pass to the manager
    /// The pass will only run if the condition function returns true
    pub fn add_conditional_pass<P: FunctionPass + 'static>(
        mut self,
        pass: P,
        condition: fn(&Function) -> bool,
    ) -> Self {
        self.passes
            .push(Box::new(ConditionalPass::new(Box::new(pass), condition)));
        self
    }

    /// Repeat the pass sequence until no pass changes the function, at most
    /// `max_iterations` times
    pub const fn with_fixed_point(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Names of the registered passes, in execution order
    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    /// Run all passes on the function
    /// Returns true if any pass modified the function
    pub fn run(&mut self, function: &mut Function, results: &mut PassResults) -> PassResult<bool> {
        let mut modified = false;

        for iteration in 0..self.max_iterations {
            let mut changed = false;
            for pass in &mut self.passes {
                let pass_changed = pass.run(function).inspect_err(|err| {
                    log::warn!(
                        "Pass '{}' failed on function '{}': {err}",
                        pass.name(),
                        function.name
                    );
                })?;
                results.record(pass.name(), &function.name, pass_changed);
                if pass_changed {
                    changed = true;
                    log::debug!(
                        "Pass '{}' modified function '{}'",
                        pass.name(),
                        function.name
                    );
                }
            }

            modified |= changed;
            if !changed {
                log::debug!(
                    "Function '{}' reached a fixed point after {} iteration(s)",
                    function.name,
                    iteration + 1
                );
                return Ok(modified);
            }
        }

        if self.max_iterations > 1 {
            log::debug!(
                "Function '{}' still changing after {} iterations",
                function.name,
                self.max_iterations
            );
        }
        Ok(modified)
    }

    /// Run all passes on every function of the package
    pub fn run_on_package(
        &mut self,
        package: &mut Package,
        results: &mut PassResults,
    ) -> PassResult<bool> {
        let mut modified = false;
        for function in package.functions.iter_mut() {
            modified |= self.run(function, results)?;
        }
        Ok(modified)
    }

    /// Dataflow simplification iterated to a fixed point, skipping functions
    /// without aggregate values
    pub fn simplification_pipeline() -> Self {
        Self::new()
            .add_conditional_pass(DataflowSimplificationPass::new(), function_has_aggregates)
            .with_fixed_point(8)
    }
}

#[cfg(test)]
#[path = "passes_tests.rs"]
mod tests;
