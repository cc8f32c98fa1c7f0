use flowlet_ir::{FunctionBuilder, Type};

use super::*;
use crate::PassError;

/// Reports a change on its first `changes` runs
struct CountingPass {
    changes: usize,
    runs: usize,
}

impl CountingPass {
    const fn new(changes: usize) -> Self {
        Self { changes, runs: 0 }
    }
}

impl FunctionPass for CountingPass {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn description(&self) -> &'static str {
        "Counts its invocations"
    }

    fn run(&mut self, _function: &mut Function) -> PassResult<bool> {
        self.runs += 1;
        Ok(self.runs <= self.changes)
    }
}

struct FailingPass;

impl FunctionPass for FailingPass {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn description(&self) -> &'static str {
        "Always fails"
    }

    fn run(&mut self, function: &mut Function) -> PassResult<bool> {
        let id = function.params()[0];
        Err(PassError::MissingFact(id))
    }
}

fn scalar_function(name: &str) -> Function {
    let mut b = FunctionBuilder::new(name);
    let x = b.param("x", Type::bits(8));
    b.build(x).unwrap()
}

fn tuple_function(name: &str) -> Function {
    let mut b = FunctionBuilder::new(name);
    let x = b.param("x", Type::bits(8));
    let t = b.tuple(&[x, x]).unwrap();
    b.build(t).unwrap()
}

#[test]
fn test_single_run_by_default() {
    let mut function = scalar_function("f");
    let mut results = PassResults::new();
    let mut manager = PassManager::new().add_pass(CountingPass::new(5));

    assert!(manager.run(&mut function, &mut results).unwrap());
    assert_eq!(results.invocations().len(), 1);
    assert_eq!(
        results.invocations()[0],
        PassInvocation {
            pass: "counting",
            function: "f".to_string(),
            changed: true,
        }
    );
}

#[test]
fn test_fixed_point_stops_when_nothing_changes() {
    let mut function = scalar_function("f");
    let mut results = PassResults::new();
    let mut manager = PassManager::new()
        .add_pass(CountingPass::new(2))
        .with_fixed_point(10);

    assert!(manager.run(&mut function, &mut results).unwrap());
    // Two changing runs plus the one that confirms convergence.
    assert_eq!(results.invocations().len(), 3);
    assert_eq!(results.change_count("counting"), 2);
}

#[test]
fn test_fixed_point_respects_iteration_cap() {
    let mut function = scalar_function("f");
    let mut results = PassResults::new();
    let mut manager = PassManager::new()
        .add_pass(CountingPass::new(100))
        .with_fixed_point(4);

    assert!(manager.run(&mut function, &mut results).unwrap());
    assert_eq!(results.invocations().len(), 4);
}

#[test]
fn test_unchanged_function_reports_false() {
    let mut function = scalar_function("f");
    let mut results = PassResults::new();
    let mut manager = PassManager::new().add_pass(CountingPass::new(0));

    assert!(!manager.run(&mut function, &mut results).unwrap());
    assert!(!results.changed());
}

#[test]
fn test_conditional_pass_skips_scalar_functions() {
    let mut results = PassResults::new();
    let mut manager = PassManager::new().add_conditional_pass(FailingPass, function_has_aggregates);

    let mut scalar = scalar_function("scalar");
    assert!(!manager.run(&mut scalar, &mut results).unwrap());

    let mut tuple = tuple_function("tuple");
    assert!(manager.run(&mut tuple, &mut results).is_err());
}

#[test]
fn test_errors_propagate_and_stop_the_sequence() {
    let mut function = scalar_function("f");
    let mut results = PassResults::new();
    let mut manager = PassManager::new()
        .add_pass(FailingPass)
        .add_pass(CountingPass::new(1));

    let err = manager.run(&mut function, &mut results).unwrap_err();
    assert!(matches!(err, PassError::MissingFact(_)));
    assert!(results.invocations().is_empty());
}

#[test]
fn test_run_on_package_visits_every_function() {
    let mut package = Package::new("pkg");
    package.add_function(scalar_function("a"));
    package.add_function(scalar_function("b"));

    let mut results = PassResults::new();
    let mut manager = PassManager::new().add_pass(CountingPass::new(1));
    assert!(manager.run_on_package(&mut package, &mut results).unwrap());

    let seen: Vec<(&str, bool)> = results
        .invocations()
        .iter()
        .map(|i| (i.function.as_str(), i.changed))
        .collect();
    assert_eq!(seen, vec![("a", true), ("b", false)]);
}

#[test]
fn test_simplification_pipeline_metadata() {
    let manager = PassManager::simplification_pipeline();
    assert_eq!(manager.pass_names(), vec!["dataflow"]);
}
