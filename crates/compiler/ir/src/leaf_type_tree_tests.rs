use proptest::prelude::*;

use super::*;

fn nested_type() -> Type {
    // (bits[8], bits[4][2], (token, bits[1]))
    Type::tuple(vec![
        Type::bits(8),
        Type::array(Type::bits(4), 2),
        Type::tuple(vec![Type::token(), Type::bits(1)]),
    ])
}

fn numbered(ty: Type) -> LeafTypeTree<usize> {
    let elements = (0..ty.leaf_count()).collect();
    LeafTypeTree::from_elements(ty, elements).unwrap()
}

#[test]
fn test_new_has_one_slot_per_leaf() {
    let tree: LeafTypeTree<u32> = LeafTypeTree::new(nested_type());
    assert_eq!(tree.size(), 5);
    assert!(tree.elements().iter().all(|&v| v == 0));

    let scalar: LeafTypeTree<u32> = LeafTypeTree::new(Type::bits(32));
    assert_eq!(scalar.size(), 1);
    assert_eq!(scalar.get(&[]), Ok(&0));

    let empty: LeafTypeTree<u32> = LeafTypeTree::new(Type::unit());
    assert_eq!(empty.size(), 0);
}

#[test]
fn test_leaf_indices_in_declaration_order() {
    let indices: Vec<Vec<usize>> = leaf_indices(&nested_type())
        .into_iter()
        .map(|i| i.to_vec())
        .collect();
    assert_eq!(
        indices,
        vec![vec![0], vec![1, 0], vec![1, 1], vec![2, 0], vec![2, 1]]
    );
}

#[test]
fn test_get_and_view() {
    let tree = numbered(nested_type());
    assert_eq!(tree.get(&[1, 1]), Ok(&2));
    assert_eq!(tree.get(&[2, 0]), Ok(&3));

    let array = tree.view(&[1]).unwrap();
    assert_eq!(array.ty(), &Type::array(Type::bits(4), 2));
    assert_eq!(array.elements(), &[1, 2]);
    assert_eq!(array.get(&[0]), Ok(&1));

    let inner = tree.view(&[2]).unwrap();
    assert_eq!(inner.subtree(&[1]).unwrap().elements(), &[4]);

    // A subtree may be a single leaf; a view may not.
    let leaf = tree.subtree(&[0]).unwrap();
    assert_eq!(leaf.ty(), &Type::bits(8));
    assert_eq!(leaf.elements(), &[0]);
    assert_eq!(tree.subtree(&[1]).unwrap(), array);
    assert_eq!(tree.subtree(&[]).unwrap(), tree.as_view());
}

#[test]
fn test_views_reject_leaves() {
    let mut tree = numbered(nested_type());
    assert!(tree.view(&[0]).unwrap_err().is_structural_mismatch());
    assert!(tree.view(&[1, 1]).unwrap_err().is_structural_mismatch());
    assert!(tree.view(&[2]).unwrap().view(&[0]).unwrap_err().is_structural_mismatch());
    assert!(tree.view_mut(&[2, 1]).unwrap_err().is_structural_mismatch());
    assert!(tree
        .as_mutable_view()
        .into_view_mut(&[0])
        .unwrap_err()
        .is_structural_mismatch());

    let scalar = numbered(Type::bits(8));
    assert!(scalar.view(&[]).unwrap_err().is_structural_mismatch());
    assert_eq!(scalar.subtree(&[]).unwrap().elements(), &[0]);
}

#[test]
fn test_structural_mismatches() {
    let tree = numbered(nested_type());

    // Out of range tuple element.
    assert!(tree.view(&[3]).unwrap_err().is_structural_mismatch());
    // Out of range array element.
    assert!(tree.get(&[1, 2]).unwrap_err().is_structural_mismatch());
    // Indexing into a leaf.
    assert!(tree.view(&[0, 0]).unwrap_err().is_structural_mismatch());
    // Element access must land on a leaf.
    assert!(tree.get(&[1]).unwrap_err().is_structural_mismatch());
    assert!(tree.get(&[]).unwrap_err().is_structural_mismatch());

    let wrong_len = LeafTypeTree::from_elements(Type::bits(1), vec![1, 2]);
    assert!(wrong_len.unwrap_err().is_structural_mismatch());
}

#[test]
fn test_mutable_views() {
    let mut tree = numbered(nested_type());
    {
        let mut array = tree.view_mut(&[1]).unwrap();
        *array.get_mut(&[1]).unwrap() = 42;
        let mut first = array.subtree_mut(&[0]).unwrap();
        *first.get_mut(&[]).unwrap() = 41;
    }
    assert_eq!(tree.elements(), &[0, 41, 42, 3, 4]);

    let source = numbered(Type::tuple(vec![Type::token(), Type::bits(1)])).map(|v| v + 100);
    tree.view_mut(&[2])
        .unwrap()
        .copy_from(source.as_view())
        .unwrap();
    assert_eq!(tree.elements(), &[0, 41, 42, 100, 101]);

    let wrong = numbered(Type::bits(4));
    let err = tree.view_mut(&[2]).unwrap().copy_from(wrong.as_view());
    assert!(matches!(err, Err(IrError::TypeMismatch { .. })));
}

#[test]
fn test_for_each_index_visits_in_order() {
    let tree = numbered(nested_type());
    let mut seen = Vec::new();
    for_each_index(tree.as_view(), |ty, value, index| {
        seen.push((ty.to_string(), *value, index.to_vec()));
        Ok::<(), ()>(())
    })
    .unwrap();
    assert_eq!(
        seen,
        vec![
            ("bits[8]".to_string(), 0, vec![0]),
            ("bits[4]".to_string(), 1, vec![1, 0]),
            ("bits[4]".to_string(), 2, vec![1, 1]),
            ("token".to_string(), 3, vec![2, 0]),
            ("bits[1]".to_string(), 4, vec![2, 1]),
        ]
    );
}

#[test]
fn test_for_each_index_stops_on_error() {
    let tree = numbered(nested_type());
    let mut visited = 0;
    let result = for_each_index(tree.as_view(), |_, value, _| {
        visited += 1;
        if *value == 2 {
            Err("stop")
        } else {
            Ok(())
        }
    });
    assert_eq!(result, Err("stop"));
    assert_eq!(visited, 3);
}

#[test]
fn test_for_each_index_mut_writes_slots() {
    let mut tree: LeafTypeTree<Vec<usize>> = LeafTypeTree::new(nested_type());
    for_each_index_mut(tree.as_mutable_view(), |_, slot, index| {
        *slot = index.to_vec();
        Ok::<(), ()>(())
    })
    .unwrap();
    assert_eq!(tree.get(&[1, 1]), Ok(&vec![1, 1]));
    assert_eq!(tree.get(&[2, 0]), Ok(&vec![2, 0]));
}

#[test]
fn test_concat_and_display() {
    let a = numbered(Type::bits(8));
    let b = numbered(Type::array(Type::bits(4), 2)).map(|v| v + 1);
    let c = numbered(Type::tuple(vec![Type::token(), Type::bits(1)])).map(|v| v + 3);
    let tree =
        LeafTypeTree::concat(nested_type(), &[a.as_view(), b.as_view(), c.as_view()]).unwrap();
    assert_eq!(tree, numbered(nested_type()));
    assert_eq!(tree.to_string(), "(0, [1, 2], (3, 4))");

    let err = LeafTypeTree::concat(nested_type(), &[a.as_view(), a.as_view(), c.as_view()]);
    assert!(err.unwrap_err().is_structural_mismatch());
}

#[test]
fn test_views_hash_by_content() {
    use rustc_hash::FxHashMap;

    let tree = numbered(Type::tuple(vec![Type::bits(1), Type::bits(1)]));
    let same = numbered(Type::tuple(vec![Type::bits(1), Type::bits(1)]));
    let mut map = FxHashMap::default();
    map.insert(tree.as_view(), "first");
    assert_eq!(map.get(&same.as_view()), Some(&"first"));
    assert_eq!(map.get(&tree.subtree(&[0]).unwrap()), None);
}

fn arb_type() -> impl Strategy<Value = Type> {
    let leaf = prop_oneof![(0usize..=64).prop_map(Type::bits), Just(Type::token())];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Type::tuple),
            (inner, 1usize..4).prop_map(|(element, size)| Type::array(element, size)),
        ]
    })
}

proptest! {
    #[test]
    fn test_every_leaf_index_resolves_to_its_slot(ty in arb_type()) {
        let tree = numbered(ty.clone());
        let indices = leaf_indices(&ty);
        prop_assert_eq!(indices.len(), ty.leaf_count());
        for (slot, index) in indices.iter().enumerate() {
            prop_assert_eq!(tree.get(index), Ok(&slot));
            let leaf = tree.subtree(index).unwrap();
            prop_assert!(leaf.ty().is_leaf());
            prop_assert_eq!(leaf.elements(), &[slot][..]);
            prop_assert!(tree.view(index).unwrap_err().is_structural_mismatch());
        }
    }

    #[test]
    fn test_child_views_partition_the_tree(ty in arb_type()) {
        let tree = numbered(ty.clone());
        let children: Vec<_> = (0..ty.child_count())
            .map(|i| tree.subtree(&[i]).unwrap())
            .collect();
        if !ty.is_leaf() {
            let rebuilt = LeafTypeTree::concat(ty.clone(), &children).unwrap();
            prop_assert_eq!(rebuilt, tree);
        }
    }
}
