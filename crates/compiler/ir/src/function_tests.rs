use super::*;
use crate::{BinaryOp, FunctionBuilder, Value};

/// x, y: bits[8]; s: bits[1]
/// t = tuple(x, y); a = t.0; r = sel(s, [a, 42])
fn sample() -> Function {
    let mut b = FunctionBuilder::new("f");
    let x = b.param("x", Type::bits(8));
    let y = b.param("y", Type::bits(8));
    let s = b.param("s", Type::bits(1));
    let t = b.named("t").tuple(&[x, y]).unwrap();
    let a = b.named("a").tuple_index(t, 0).unwrap();
    let k = b.literal_bits(8, 42).unwrap();
    let r = b.named("r").select(s, &[a, k], None).unwrap();
    b.build(r).unwrap()
}

#[test]
fn test_add_node_infers_types() {
    let mut func = Function::new("test");
    let x = func.add_param("x", Type::bits(32));
    let t = func.add_node(Op::Tuple, vec![x, x], None).unwrap();
    assert_eq!(
        func.node(t).ty,
        Type::tuple(vec![Type::bits(32), Type::bits(32)])
    );
    assert_eq!(func.node(t).name, "tuple.1");

    let err = func.add_node(Op::TupleIndex(2), vec![t], None);
    assert!(matches!(err, Err(IrError::InvalidOperand { .. })));

    let missing = NodeId::from_usize(99);
    assert_eq!(
        func.add_node(Op::Identity, vec![missing], None),
        Err(IrError::UnknownNode(missing))
    );
    assert!(func.add_node(Op::Param, vec![], None).is_err());
}

#[test]
fn test_topo_sort_orders_operands_first() {
    let mut func = Function::new("test");
    let x = func.add_param("x", Type::bits(8));
    let copy = func.add_node(Op::Identity, vec![x], None).unwrap();
    let one = func
        .add_node(Op::Literal(Value::bits(8, 1)), vec![], None)
        .unwrap();
    let sum = func
        .add_node(Op::Binary(BinaryOp::Add), vec![one, copy], None)
        .unwrap();
    // Re-point an early node at a later one.
    func.nodes[copy].operands = vec![one];

    let order = func.topo_sort().unwrap();
    assert_eq!(order.len(), 4);
    let position = |id: NodeId| order.iter().position(|&n| n == id).unwrap();
    assert!(position(one) < position(copy));
    assert!(position(copy) < position(sum));
}

#[test]
fn test_replace_uses_with() {
    let mut func = sample();
    let x = func.find_node("x").unwrap();
    let a = func.find_node("a").unwrap();
    let r = func.find_node("r").unwrap();

    assert_eq!(func.replace_uses_with(a, x), Ok(1));
    assert_eq!(func.node(r).operands[1], x);
    assert!(!func.has_uses(a));
    assert!(func.validate().is_ok());

    // The return value is a use too.
    assert_eq!(func.replace_uses_with(r, x), Ok(1));
    assert_eq!(func.return_value(), Some(x));

    let t = func.find_node("t").unwrap();
    let err = func.replace_uses_with(x, t);
    assert!(matches!(err, Err(IrError::TypeMismatch { .. })));
    assert_eq!(func.replace_uses_with(x, x), Ok(0));
}

#[test]
fn test_replacement_keeps_its_own_operands() {
    let mut func = sample();
    let a = func.find_node("a").unwrap();
    let wrapped = func.add_node(Op::Identity, vec![a], None).unwrap();
    func.replace_uses_with(a, wrapped).unwrap();
    assert_eq!(func.node(wrapped).operands, vec![a]);
    assert!(func.validate().is_ok());
}

#[test]
fn test_users() {
    let func = sample();
    let users = func.users();
    let x = func.find_node("x").unwrap();
    let t = func.find_node("t").unwrap();
    assert_eq!(users[&x], vec![t]);
    assert!(!users.contains_key(&func.find_node("r").unwrap()));
}

#[test]
fn test_live_nodes() {
    let mut func = sample();
    let x = func.find_node("x").unwrap();
    let dead = func.add_node(Op::Identity, vec![x], None).unwrap();
    let live = func.live_nodes();
    assert!(!live.contains(&dead));
    assert_eq!(live.len(), func.node_count() - 1);

    // Parameters stay live even when unused.
    let r = func.find_node("r").unwrap();
    let k = func.node(r).operands[2];
    func.set_return_value(k).unwrap();
    let live = func.live_nodes();
    assert!(live.contains(&x));
    assert!(!live.contains(&r));
}

#[test]
fn test_validate_rejects_malformed_graphs() {
    let mut func = Function::new("test");
    let x = func.add_param("x", Type::bits(8));
    assert_eq!(
        func.validate(),
        Err(IrError::MissingReturnValue("test".to_string()))
    );

    let bad = func
        .add_node_unchecked(Op::Identity, vec![x], Type::bits(4), None)
        .unwrap();
    func.set_return_value(bad).unwrap();
    assert!(matches!(func.validate(), Err(IrError::TypeMismatch { .. })));

    // A two-node cycle, only reachable through the unchecked API.
    let mut cyclic = Function::new("cyclic");
    let p = cyclic.add_param("p", Type::bits(8));
    let first = cyclic
        .add_node_unchecked(Op::Identity, vec![p], Type::bits(8), None)
        .unwrap();
    let second = cyclic
        .add_node_unchecked(Op::Identity, vec![first], Type::bits(8), None)
        .unwrap();
    cyclic.nodes[first].operands = vec![second];
    assert!(matches!(cyclic.topo_sort(), Err(IrError::Cycle(_))));
}

#[test]
fn test_pretty_print() {
    let func = sample();
    insta::assert_snapshot!(func.pretty_print(0), @r"
    fn f(x: bits[8], y: bits[8], s: bits[1]) -> bits[8] {
      t: (bits[8], bits[8]) = tuple(x, y)
      a: bits[8] = tuple_index(t, index=0)
      literal.5: bits[8] = literal(value=bits[8]:42)
      ret r: bits[8] = sel(s, cases=[a, literal.5])
    }
    ");
}

#[test]
fn test_pretty_print_param_return() {
    let mut b = FunctionBuilder::new("id");
    let x = b.param("x", Type::token());
    let func = b.build(x).unwrap();
    assert_eq!(func.pretty_print(1), "  fn id(x: token) -> token {\n    ret x\n  }\n");
}
