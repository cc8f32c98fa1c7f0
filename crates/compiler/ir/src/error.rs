//! Errors raised while building, inspecting or mutating IR graphs.

use crate::{NodeId, Type};

/// Errors produced by the IR layer
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IrError {
    /// A tree index does not fit the shape of a type
    #[error("structural mismatch: index {index:?} into `{ty}`: {reason}")]
    StructuralMismatch {
        ty: Type,
        index: Vec<usize>,
        reason: String,
    },

    /// Two types that must agree do not
    #[error("type mismatch: expected `{expected}`, found `{found}` ({context})")]
    TypeMismatch {
        expected: Type,
        found: Type,
        context: String,
    },

    /// An operation was given operands it cannot accept
    #[error("invalid operands for `{op}`: {reason}")]
    InvalidOperand { op: String, reason: String },

    /// A node id that does not belong to the function
    #[error("unknown node {0:?}")]
    UnknownNode(NodeId),

    /// The operand edges form a cycle through the given node
    #[error("cycle detected through node {0:?}")]
    Cycle(NodeId),

    /// The function has no return value
    #[error("function `{0}` has no return value")]
    MissingReturnValue(String),

    /// A literal that cannot be typed or does not fit its width
    #[error("invalid literal: {0}")]
    InvalidLiteral(String),
}

impl IrError {
    /// Shorthand for [`IrError::StructuralMismatch`]
    pub fn mismatch(ty: &Type, index: &[usize], reason: impl Into<String>) -> Self {
        Self::StructuralMismatch {
            ty: ty.clone(),
            index: index.to_vec(),
            reason: reason.into(),
        }
    }

    /// Shorthand for [`IrError::InvalidOperand`]
    pub fn operand(op: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidOperand {
            op: op.into(),
            reason: reason.into(),
        }
    }

    /// Returns true for errors caused by a tree index that does not fit a type
    pub const fn is_structural_mismatch(&self) -> bool {
        matches!(self, Self::StructuralMismatch { .. })
    }
}

/// Result type for IR operations
pub type IrResult<T> = Result<T, IrError>;
