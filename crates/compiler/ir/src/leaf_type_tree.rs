//! # Leaf Type Trees
//!
//! A [`LeafTypeTree`] holds one value per leaf (bits or token element) of a
//! [`Type`]. Leaves are stored flat in declaration order: tuple fields in
//! order, array elements by increasing index. Every sub-tree therefore
//! occupies a contiguous slice, which is what the borrowed views are.
//!
//! ```text
//! type:   (bits[8], bits[4][2], (token, bits[1]))
//! slots:  [  a    ,  b  ,  c   ,   d   ,   e    ]
//! index:    {0}     {1,0} {1,1}  {2,0}   {2,1}
//! ```

use std::convert::Infallible;
use std::fmt;
use std::hash::{Hash, Hasher};

use smallvec::SmallVec;

use crate::{IrError, IrResult, Type, TypeKind};

/// Path from the root of a type to one of its leaves or sub-trees
pub type TreeIndex = SmallVec<[usize; 4]>;

/// Resolves `index` within `ty`, returning the addressed sub-type and the
/// leaf offset of its first slot.
fn locate<'t>(ty: &'t Type, index: &[usize]) -> IrResult<(&'t Type, usize)> {
    let mut current = ty;
    let mut offset = 0;
    for (depth, &i) in index.iter().enumerate() {
        if current.is_leaf() {
            return Err(IrError::mismatch(
                ty,
                index,
                format!("component {depth} indexes into leaf type `{current}`"),
            ));
        }
        let (Some(child), Some(child_offset)) = (current.child(i), current.child_offset(i)) else {
            return Err(IrError::mismatch(
                ty,
                index,
                format!("component {depth} ({i}) is out of range for `{current}`"),
            ));
        };
        offset += child_offset;
        current = child;
    }
    Ok((current, offset))
}

/// Like [`locate`], but the addressed sub-type must be a tuple or array
fn locate_aggregate<'t>(ty: &'t Type, index: &[usize]) -> IrResult<(&'t Type, usize)> {
    let (sub_type, offset) = locate(ty, index)?;
    if sub_type.is_leaf() {
        return Err(IrError::mismatch(
            ty,
            index,
            format!("index addresses leaf type `{sub_type}`, not a tuple or array"),
        ));
    }
    Ok((sub_type, offset))
}

fn locate_leaf(ty: &Type, index: &[usize]) -> IrResult<usize> {
    let (sub_type, offset) = locate(ty, index)?;
    if !sub_type.is_leaf() {
        return Err(IrError::mismatch(
            ty,
            index,
            format!("index addresses non-leaf type `{sub_type}`"),
        ));
    }
    Ok(offset)
}

/// Visits every leaf of `ty` in declaration order.
fn walk_leaves<E, F>(ty: &Type, prefix: &mut TreeIndex, f: &mut F) -> Result<(), E>
where
    F: FnMut(&Type, &[usize]) -> Result<(), E>,
{
    match ty.kind() {
        TypeKind::Bits(_) | TypeKind::Token => f(ty, prefix),
        TypeKind::Tuple(elements) => {
            for (i, element) in elements.iter().enumerate() {
                prefix.push(i);
                walk_leaves(element, prefix, f)?;
                prefix.pop();
            }
            Ok(())
        }
        TypeKind::Array { element, size } => {
            for i in 0..*size {
                prefix.push(i);
                walk_leaves(element, prefix, f)?;
                prefix.pop();
            }
            Ok(())
        }
    }
}

/// Returns the index of every leaf of `ty` in declaration order
pub fn leaf_indices(ty: &Type) -> Vec<TreeIndex> {
    let mut indices = Vec::with_capacity(ty.leaf_count());
    let mut record = |_: &Type, index: &[usize]| -> Result<(), Infallible> {
        indices.push(TreeIndex::from_slice(index));
        Ok(())
    };
    let _ = walk_leaves(ty, &mut TreeIndex::new(), &mut record);
    indices
}

/// One value of type `T` per leaf of a type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LeafTypeTree<T> {
    ty: Type,
    elements: Vec<T>,
}

impl<T> LeafTypeTree<T> {
    /// Creates a tree with a default value in every leaf slot
    pub fn new(ty: Type) -> Self
    where
        T: Default,
    {
        let elements = (0..ty.leaf_count()).map(|_| T::default()).collect();
        Self { ty, elements }
    }

    /// Creates a tree with `value` in every leaf slot
    pub fn filled(ty: Type, value: T) -> Self
    where
        T: Clone,
    {
        let elements = vec![value; ty.leaf_count()];
        Self { ty, elements }
    }

    /// Creates a tree from leaf values given in declaration order
    pub fn from_elements(ty: Type, elements: Vec<T>) -> IrResult<Self> {
        if elements.len() != ty.leaf_count() {
            return Err(IrError::mismatch(
                &ty,
                &[],
                format!(
                    "{} elements given for {} leaves",
                    elements.len(),
                    ty.leaf_count()
                ),
            ));
        }
        Ok(Self { ty, elements })
    }

    /// Creates a tree by calling `f` with the type and index of each leaf
    pub fn create_from_function<E, F>(ty: Type, mut f: F) -> Result<Self, E>
    where
        F: FnMut(&Type, &[usize]) -> Result<T, E>,
    {
        let mut elements = Vec::with_capacity(ty.leaf_count());
        walk_leaves(&ty, &mut TreeIndex::new(), &mut |leaf_type: &Type, index: &[usize]| {
            elements.push(f(leaf_type, index)?);
            Ok(())
        })?;
        Ok(Self { ty, elements })
    }

    /// Builds a tuple or array tree out of one tree per direct child of `ty`
    pub fn concat(ty: Type, children: &[LeafTypeTreeView<'_, T>]) -> IrResult<Self>
    where
        T: Clone,
    {
        if ty.is_leaf() {
            return Err(IrError::mismatch(
                &ty,
                &[],
                "cannot concatenate children into a leaf type",
            ));
        }
        if children.len() != ty.child_count() {
            return Err(IrError::mismatch(
                &ty,
                &[],
                format!(
                    "{} children given for {} elements",
                    children.len(),
                    ty.child_count()
                ),
            ));
        }
        let mut elements = Vec::with_capacity(ty.leaf_count());
        for (i, child) in children.iter().enumerate() {
            if ty.child(i) != Some(child.ty()) {
                return Err(IrError::mismatch(
                    &ty,
                    &[i],
                    format!("child has type `{}`", child.ty()),
                ));
            }
            elements.extend_from_slice(child.elements());
        }
        Ok(Self { ty, elements })
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    /// Leaf values in declaration order
    pub fn elements(&self) -> &[T] {
        &self.elements
    }

    pub fn elements_mut(&mut self) -> &mut [T] {
        &mut self.elements
    }

    pub fn into_elements(self) -> Vec<T> {
        self.elements
    }

    /// Number of leaf slots
    pub fn size(&self) -> usize {
        self.elements.len()
    }

    /// Returns the value of the leaf at `index`
    pub fn get(&self, index: &[usize]) -> IrResult<&T> {
        let offset = locate_leaf(&self.ty, index)?;
        Ok(&self.elements[offset])
    }

    /// Returns the value of the leaf at `index` mutably
    pub fn get_mut(&mut self, index: &[usize]) -> IrResult<&mut T> {
        let offset = locate_leaf(&self.ty, index)?;
        Ok(&mut self.elements[offset])
    }

    pub fn as_view(&self) -> LeafTypeTreeView<'_, T> {
        LeafTypeTreeView {
            ty: &self.ty,
            elements: &self.elements,
        }
    }

    pub fn as_mutable_view(&mut self) -> MutableLeafTypeTreeView<'_, T> {
        MutableLeafTypeTreeView {
            ty: &self.ty,
            elements: &mut self.elements,
        }
    }

    /// Returns a view of the tuple or array rooted at `index`
    pub fn view(&self, index: &[usize]) -> IrResult<LeafTypeTreeView<'_, T>> {
        self.as_view().view(index)
    }

    /// Returns a mutable view of the tuple or array rooted at `index`
    pub fn view_mut(&mut self, index: &[usize]) -> IrResult<MutableLeafTypeTreeView<'_, T>> {
        self.as_mutable_view().into_view_mut(index)
    }

    /// Returns the sub-tree rooted at `index`, which may be a single leaf
    pub fn subtree(&self, index: &[usize]) -> IrResult<LeafTypeTreeView<'_, T>> {
        self.as_view().subtree(index)
    }

    /// Mutable counterpart of [`LeafTypeTree::subtree`]
    pub fn subtree_mut(&mut self, index: &[usize]) -> IrResult<MutableLeafTypeTreeView<'_, T>> {
        self.as_mutable_view().into_subtree_mut(index)
    }

    /// Applies `f` to every leaf value, keeping the shape
    pub fn map<U, F>(&self, f: F) -> LeafTypeTree<U>
    where
        F: FnMut(&T) -> U,
    {
        LeafTypeTree {
            ty: self.ty.clone(),
            elements: self.elements.iter().map(f).collect(),
        }
    }
}

impl<T: fmt::Display> fmt::Display for LeafTypeTree<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.as_view(), f)
    }
}

/// A borrowed, read-only (sub-)tree
#[derive(Debug)]
pub struct LeafTypeTreeView<'a, T> {
    ty: &'a Type,
    elements: &'a [T],
}

impl<T> Clone for LeafTypeTreeView<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for LeafTypeTreeView<'_, T> {}

impl<T: PartialEq> PartialEq for LeafTypeTreeView<'_, T> {
    fn eq(&self, other: &Self) -> bool {
        self.ty == other.ty && self.elements == other.elements
    }
}

impl<T: Eq> Eq for LeafTypeTreeView<'_, T> {}

impl<T: Hash> Hash for LeafTypeTreeView<'_, T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ty.hash(state);
        self.elements.hash(state);
    }
}

impl<'a, T> LeafTypeTreeView<'a, T> {
    pub fn ty(&self) -> &'a Type {
        self.ty
    }

    pub fn elements(&self) -> &'a [T] {
        self.elements
    }

    pub fn size(&self) -> usize {
        self.elements.len()
    }

    /// Returns the value of the leaf at `index`
    pub fn get(&self, index: &[usize]) -> IrResult<&'a T> {
        let offset = locate_leaf(self.ty, index)?;
        Ok(&self.elements[offset])
    }

    /// Returns a view of the tuple or array rooted at `index`. Indices that
    /// address a leaf are a structural mismatch; use [`Self::subtree`] for
    /// those.
    pub fn view(&self, index: &[usize]) -> IrResult<LeafTypeTreeView<'a, T>> {
        let (ty, offset) = locate_aggregate(self.ty, index)?;
        Ok(self.narrow(ty, offset))
    }

    /// Returns the sub-tree rooted at `index`, which may be a single leaf
    pub fn subtree(&self, index: &[usize]) -> IrResult<LeafTypeTreeView<'a, T>> {
        let (ty, offset) = locate(self.ty, index)?;
        Ok(self.narrow(ty, offset))
    }

    fn narrow(&self, ty: &'a Type, offset: usize) -> LeafTypeTreeView<'a, T> {
        LeafTypeTreeView {
            ty,
            elements: &self.elements[offset..offset + ty.leaf_count()],
        }
    }

    /// Copies the viewed sub-tree into an owned tree
    pub fn to_owned(&self) -> LeafTypeTree<T>
    where
        T: Clone,
    {
        LeafTypeTree {
            ty: self.ty.clone(),
            elements: self.elements.to_vec(),
        }
    }
}

impl<T: fmt::Display> fmt::Display for LeafTypeTreeView<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_tree(self.ty, self.elements, f)
    }
}

fn fmt_tree<T: fmt::Display>(ty: &Type, elements: &[T], f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let (open, close) = match ty.kind() {
        TypeKind::Bits(_) | TypeKind::Token => return write!(f, "{}", elements[0]),
        TypeKind::Tuple(_) => ("(", ")"),
        TypeKind::Array { .. } => ("[", "]"),
    };
    f.write_str(open)?;
    let mut offset = 0;
    for i in 0..ty.child_count() {
        if i > 0 {
            f.write_str(", ")?;
        }
        if let Some(child) = ty.child(i) {
            let width = child.leaf_count();
            fmt_tree(child, &elements[offset..offset + width], f)?;
            offset += width;
        }
    }
    f.write_str(close)
}

/// A borrowed, mutable (sub-)tree
#[derive(Debug)]
pub struct MutableLeafTypeTreeView<'a, T> {
    ty: &'a Type,
    elements: &'a mut [T],
}

impl<'a, T> MutableLeafTypeTreeView<'a, T> {
    pub fn ty(&self) -> &'a Type {
        self.ty
    }

    pub fn elements(&self) -> &[T] {
        &*self.elements
    }

    pub fn elements_mut(&mut self) -> &mut [T] {
        &mut *self.elements
    }

    pub fn as_view(&self) -> LeafTypeTreeView<'_, T> {
        LeafTypeTreeView {
            ty: self.ty,
            elements: &*self.elements,
        }
    }

    /// Returns the value of the leaf at `index` mutably
    pub fn get_mut(&mut self, index: &[usize]) -> IrResult<&mut T> {
        let offset = locate_leaf(self.ty, index)?;
        Ok(&mut self.elements[offset])
    }

    fn reborrow(&mut self) -> MutableLeafTypeTreeView<'_, T> {
        MutableLeafTypeTreeView {
            ty: self.ty,
            elements: &mut *self.elements,
        }
    }

    /// Reborrows the tuple or array rooted at `index`
    pub fn view_mut(&mut self, index: &[usize]) -> IrResult<MutableLeafTypeTreeView<'_, T>> {
        self.reborrow().into_view_mut(index)
    }

    /// Reborrows the sub-tree rooted at `index`, which may be a single leaf
    pub fn subtree_mut(&mut self, index: &[usize]) -> IrResult<MutableLeafTypeTreeView<'_, T>> {
        self.reborrow().into_subtree_mut(index)
    }

    /// Narrows this view to the tuple or array rooted at `index`
    pub fn into_view_mut(self, index: &[usize]) -> IrResult<MutableLeafTypeTreeView<'a, T>> {
        let (ty, offset) = locate_aggregate(self.ty, index)?;
        Ok(self.narrow(ty, offset))
    }

    /// Narrows this view to the sub-tree rooted at `index`
    pub fn into_subtree_mut(self, index: &[usize]) -> IrResult<MutableLeafTypeTreeView<'a, T>> {
        let (ty, offset) = locate(self.ty, index)?;
        Ok(self.narrow(ty, offset))
    }

    fn narrow(self, ty: &'a Type, offset: usize) -> MutableLeafTypeTreeView<'a, T> {
        let elements = self.elements;
        MutableLeafTypeTreeView {
            ty,
            elements: &mut elements[offset..offset + ty.leaf_count()],
        }
    }

    /// Overwrites every slot with the corresponding slot of `source`, which
    /// must have the same type
    pub fn copy_from(&mut self, source: LeafTypeTreeView<'_, T>) -> IrResult<()>
    where
        T: Clone,
    {
        if source.ty() != self.ty {
            return Err(IrError::TypeMismatch {
                expected: self.ty.clone(),
                found: source.ty().clone(),
                context: "leaf type tree copy".to_string(),
            });
        }
        self.elements.clone_from_slice(source.elements());
        Ok(())
    }
}

/// Calls `f` with the type, value and index of every leaf of `view`, in
/// declaration order. The first error returned by `f` stops the traversal.
pub fn for_each_index<T, E, F>(view: LeafTypeTreeView<'_, T>, mut f: F) -> Result<(), E>
where
    F: FnMut(&Type, &T, &[usize]) -> Result<(), E>,
{
    let elements = view.elements();
    let mut slot = 0;
    walk_leaves(view.ty(), &mut TreeIndex::new(), &mut |leaf_type: &Type, index: &[usize]| {
        let result = f(leaf_type, &elements[slot], index);
        slot += 1;
        result
    })
}

/// Mutable counterpart of [`for_each_index`]
pub fn for_each_index_mut<T, E, F>(view: MutableLeafTypeTreeView<'_, T>, mut f: F) -> Result<(), E>
where
    F: FnMut(&Type, &mut T, &[usize]) -> Result<(), E>,
{
    let MutableLeafTypeTreeView { ty, elements } = view;
    let mut slot = 0;
    walk_leaves(ty, &mut TreeIndex::new(), &mut |leaf_type: &Type, index: &[usize]| {
        let result = f(leaf_type, &mut elements[slot], index);
        slot += 1;
        result
    })
}

#[cfg(test)]
#[path = "leaf_type_tree_tests.rs"]
mod tests;
