//! Tests for running the simplification pipeline over whole packages

use flowlet_ir::{BinaryOp, Function, FunctionBuilder, Op, Package, PrettyPrint, Type};
use flowlet_opt::*;

fn forwarding_function() -> Function {
    let mut b = FunctionBuilder::new("agg");
    let x = b.param("x", Type::bits(8));
    let y = b.param("y", Type::bits(8));
    let z = b.named("z").tuple(&[x, y]).unwrap();
    let a = b.named("a").tuple_index(z, 0).unwrap();
    let c = b.named("b").tuple_index(z, 1).unwrap();
    let r = b.named("r").binary(BinaryOp::Add, a, c).unwrap();
    b.build(r).unwrap()
}

fn scalar_function() -> Function {
    let mut b = FunctionBuilder::new("scalar");
    let x = b.param("x", Type::bits(8));
    let y = b.param("y", Type::bits(8));
    let r = b.binary(BinaryOp::Sub, x, y).unwrap();
    b.build(r).unwrap()
}

#[test]
fn test_pipeline_on_package() {
    let mut package = Package::new("top");
    let agg = package.add_function(forwarding_function());
    let scalar = package.add_function(scalar_function());
    let scalar_before = package.get_function(scalar).unwrap().clone();

    let mut results = PassResults::new();
    let changed = PassManager::simplification_pipeline()
        .run_on_package(&mut package, &mut results)
        .unwrap();
    assert!(changed);

    let summary: Vec<_> = results
        .invocations()
        .iter()
        .map(|i| (i.pass, i.function.as_str(), i.changed))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("dataflow", "agg", true),
            ("dataflow", "agg", false),
            ("dataflow", "scalar", false),
        ]
    );
    assert_eq!(results.change_count("dataflow"), 1);

    let f = package.get_function(agg).unwrap();
    let r = f.return_value().unwrap();
    assert_eq!(f.node(r).operands, f.params().to_vec());
    assert_eq!(package.get_function(scalar).unwrap(), &scalar_before);
}

#[test]
fn test_pipeline_is_stable_once_converged() {
    let mut f = forwarding_function();
    let mut pipeline = PassManager::simplification_pipeline();
    assert!(pipeline.run(&mut f, &mut PassResults::new()).unwrap());
    let converged = f.clone();

    let mut results = PassResults::new();
    assert!(!pipeline.run(&mut f, &mut results).unwrap());
    assert!(!results.changed());
    assert_eq!(f, converged);
    assert_eq!(f.node_count(), 6);
}

#[test]
fn test_forwarding_through_arrays_and_selects() {
    let mut b = FunctionBuilder::new("mux");
    let a = b.param("a", Type::bits(8));
    let c = b.param("b", Type::bits(8));
    let forward = b.array(&[a, c]).unwrap();
    let backward = b.array(&[c, a]).unwrap();
    let joined = b.array_concat(&[forward, backward]).unwrap();
    let two = b.literal_bits(2, 2).unwrap();
    let picked = b.array_index(joined, &[two]).unwrap();
    let zero = b.literal_bits(2, 0).unwrap();
    let chosen = b.priority_select(zero, &[a, a], picked).unwrap();
    let r = b.named("r").binary(BinaryOp::Add, chosen, a).unwrap();
    let mut f = b.build(r).unwrap();

    let mut results = PassResults::new();
    assert!(PassManager::simplification_pipeline()
        .run(&mut f, &mut results)
        .unwrap());
    assert_eq!(f.node(r).operands, vec![c, a]);
    assert!(f.validate().is_ok());
}

#[test]
fn test_failing_function_is_left_untouched() {
    let mut f = forwarding_function();
    let z = f.find_node("z").unwrap();
    let bad = f
        .add_node_unchecked(Op::TupleIndex(2), vec![z], Type::bits(8), None)
        .unwrap();
    f.set_return_value(bad).unwrap();
    let before = f.clone();

    let mut package = Package::new("top");
    let id = package.add_function(f);
    let mut results = PassResults::new();
    let err = PassManager::simplification_pipeline()
        .run_on_package(&mut package, &mut results)
        .unwrap_err();

    assert!(matches!(err, PassError::StructuralMismatch(_)));
    assert!(results.invocations().is_empty());
    assert_eq!(package.get_function(id).unwrap(), &before);
}

#[test]
fn test_canonical_sources_of_forwarding_function() {
    let f = forwarding_function();
    let results = analyze_sources(&f, DataflowOptions::default()).unwrap();
    let rendered: Vec<String> = f
        .node_ids()
        .map(|id| format!("{}: {}", f.node(id).name, results.value(id).unwrap()))
        .collect();

    insta::assert_snapshot!(rendered.join("\n"), @r"
    x: %0{}
    y: %1{}
    z: (%0{}, %1{})
    a: %0{}
    b: %1{}
    r: %5{}
    ");
    assert!(f.pretty_print(0).contains("ret r"));
}
