//! # IR Type System
//!
//! Types describe the shape of the value produced by a node: a scalar bits
//! vector, a token, or a tuple/array nesting of those. Leaf layout data
//! (leaf count, flat bit count) is computed once when a type is constructed,
//! so every clone of a type shares it.

use std::fmt;
use std::sync::Arc;

use itertools::Itertools;

/// The shape of a type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// A bit vector of the given width
    Bits(usize),

    /// An ordering token; carries no data but is never interchangeable
    Token,

    /// Tuple with element types
    Tuple(Vec<Type>),

    /// Fixed-size array with element type and compile-time known size
    Array { element: Type, size: usize },
}

#[derive(Debug, PartialEq, Eq, Hash)]
struct TypeData {
    kind: TypeKind,
    leaf_count: usize,
    flat_bit_count: usize,
    has_token: bool,
}

/// An immutable, reference-counted type descriptor
///
/// Equality and hashing are structural.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Type(Arc<TypeData>);

impl Type {
    fn from_kind(kind: TypeKind) -> Self {
        let (leaf_count, flat_bit_count, has_token) = match &kind {
            TypeKind::Bits(width) => (1, *width, false),
            TypeKind::Token => (1, 0, true),
            TypeKind::Tuple(elements) => (
                elements.iter().map(Self::leaf_count).sum(),
                elements.iter().map(Self::flat_bit_count).sum(),
                elements.iter().any(Self::has_token),
            ),
            TypeKind::Array { element, size } => (
                element.leaf_count() * size,
                element.flat_bit_count() * size,
                *size > 0 && element.has_token(),
            ),
        };
        Self(Arc::new(TypeData {
            kind,
            leaf_count,
            flat_bit_count,
            has_token,
        }))
    }

    /// Creates a bits type of the given width
    pub fn bits(width: usize) -> Self {
        Self::from_kind(TypeKind::Bits(width))
    }

    /// Creates a token type
    pub fn token() -> Self {
        Self::from_kind(TypeKind::Token)
    }

    /// Creates a tuple type
    pub fn tuple(elements: Vec<Self>) -> Self {
        Self::from_kind(TypeKind::Tuple(elements))
    }

    /// Creates the empty tuple type
    pub fn unit() -> Self {
        Self::tuple(Vec::new())
    }

    /// Creates an array type
    pub fn array(element: Self, size: usize) -> Self {
        Self::from_kind(TypeKind::Array { element, size })
    }

    pub fn kind(&self) -> &TypeKind {
        &self.0.kind
    }

    /// Number of leaves (bits or token elements) in this type
    pub fn leaf_count(&self) -> usize {
        self.0.leaf_count
    }

    /// Total number of bits across all leaves
    pub fn flat_bit_count(&self) -> usize {
        self.0.flat_bit_count
    }

    pub fn has_token(&self) -> bool {
        self.0.has_token
    }

    /// Returns true if values of this type carry no information: no bits and
    /// no tokens. All such values are interchangeable.
    pub fn is_empty(&self) -> bool {
        self.flat_bit_count() == 0 && !self.has_token()
    }

    /// Returns true for bits and token types
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind(), TypeKind::Bits(_) | TypeKind::Token)
    }

    pub fn is_bits(&self) -> bool {
        matches!(self.kind(), TypeKind::Bits(_))
    }

    pub fn is_tuple(&self) -> bool {
        matches!(self.kind(), TypeKind::Tuple(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self.kind(), TypeKind::Array { .. })
    }

    /// Bit width if this is a bits type
    pub fn bit_width(&self) -> Option<usize> {
        match self.kind() {
            TypeKind::Bits(width) => Some(*width),
            _ => None,
        }
    }

    /// Element types if this is a tuple type
    pub fn as_tuple(&self) -> Option<&[Self]> {
        match self.kind() {
            TypeKind::Tuple(elements) => Some(elements),
            _ => None,
        }
    }

    /// Element type and size if this is an array type
    pub fn as_array(&self) -> Option<(&Self, usize)> {
        match self.kind() {
            TypeKind::Array { element, size } => Some((element, *size)),
            _ => None,
        }
    }

    /// Number of direct children: tuple arity or array size, zero for leaves
    pub fn child_count(&self) -> usize {
        match self.kind() {
            TypeKind::Bits(_) | TypeKind::Token => 0,
            TypeKind::Tuple(elements) => elements.len(),
            TypeKind::Array { size, .. } => *size,
        }
    }

    /// Type of the `i`-th direct child
    pub fn child(&self, i: usize) -> Option<&Self> {
        match self.kind() {
            TypeKind::Bits(_) | TypeKind::Token => None,
            TypeKind::Tuple(elements) => elements.get(i),
            TypeKind::Array { element, size } => (i < *size).then_some(element),
        }
    }

    /// Leaf offset of the `i`-th direct child within this type's flat layout
    pub fn child_offset(&self, i: usize) -> Option<usize> {
        match self.kind() {
            TypeKind::Bits(_) | TypeKind::Token => None,
            TypeKind::Tuple(elements) => (i < elements.len())
                .then(|| elements.iter().take(i).map(Self::leaf_count).sum()),
            TypeKind::Array { element, size } => (i < *size).then(|| i * element.leaf_count()),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            TypeKind::Bits(width) => write!(f, "bits[{width}]"),
            TypeKind::Token => write!(f, "token"),
            TypeKind::Tuple(elements) => write!(f, "({})", elements.iter().join(", ")),
            TypeKind::Array { element, size } => write!(f, "{element}[{size}]"),
        }
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
