//! # Operators
//!
//! The operator of a node determines how its operand list is laid out and
//! how its output type follows from the operand types.

use std::fmt;

use crate::{IrError, IrResult, Type, Value};

/// Unary bitwise/arithmetic operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Not,
    Neg,
}

/// Binary bitwise/arithmetic/comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    And,
    Or,
    Xor,
    Eq,
    Ne,
    ULt,
}

impl BinaryOp {
    /// Returns true for operators producing a single-bit result
    pub const fn is_comparison(self) -> bool {
        matches!(self, Self::Eq | Self::Ne | Self::ULt)
    }
}

/// The operation performed by a node
///
/// Operand layouts:
/// - `ArrayIndex`: `[array, indices...]`
/// - `ArraySlice`: `[array, start]`
/// - `ArrayUpdate`: `[array, value, indices...]`
/// - `Select`: `[selector, cases..., default?]`
/// - `PrioritySelect`: `[selector, cases..., default]`
/// - `OneHotSelect`: `[selector, cases...]`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Op {
    /// Function parameter
    Param,

    /// Constant value
    Literal(Value),

    /// Tuple construction from its elements
    Tuple,

    /// Projection of a tuple element
    TupleIndex(usize),

    /// Array construction from its elements
    Array,

    /// Multi-dimensional array element read; out-of-bounds indices clamp to
    /// the last element
    ArrayIndex,

    /// `width` consecutive elements starting at a dynamic start index
    ArraySlice { width: usize },

    /// Concatenation of arrays with a common element type
    ArrayConcat,

    /// Copy of an array with one (possibly nested) element replaced;
    /// out-of-bounds updates leave the array unchanged
    ArrayUpdate,

    /// Selects `cases[selector]`, or the default when the selector is out of
    /// range
    Select { has_default: bool },

    /// Selects the case of the lowest set selector bit, or the default when
    /// no bit is set
    PrioritySelect,

    /// ORs together every case whose selector bit is set
    OneHotSelect,

    /// One-hot encoding of the lowest set bit, with an extra most significant
    /// bit set when the input is zero
    OneHot,

    /// Passes its operand through
    Identity,

    Unary(UnaryOp),

    Binary(BinaryOp),
}

impl Op {
    /// Short operator name used by the pretty printer and diagnostics
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Param => "param",
            Self::Literal(_) => "literal",
            Self::Tuple => "tuple",
            Self::TupleIndex(_) => "tuple_index",
            Self::Array => "array",
            Self::ArrayIndex => "array_index",
            Self::ArraySlice { .. } => "array_slice",
            Self::ArrayConcat => "array_concat",
            Self::ArrayUpdate => "array_update",
            Self::Select { .. } => "sel",
            Self::PrioritySelect => "priority_sel",
            Self::OneHotSelect => "one_hot_sel",
            Self::OneHot => "one_hot",
            Self::Identity => "identity",
            Self::Unary(UnaryOp::Not) => "not",
            Self::Unary(UnaryOp::Neg) => "neg",
            Self::Binary(BinaryOp::Add) => "add",
            Self::Binary(BinaryOp::Sub) => "sub",
            Self::Binary(BinaryOp::Mul) => "umul",
            Self::Binary(BinaryOp::And) => "and",
            Self::Binary(BinaryOp::Or) => "or",
            Self::Binary(BinaryOp::Xor) => "xor",
            Self::Binary(BinaryOp::Eq) => "eq",
            Self::Binary(BinaryOp::Ne) => "ne",
            Self::Binary(BinaryOp::ULt) => "ult",
        }
    }

    /// Returns true for operators whose output is always a rearrangement of
    /// (some of) their operands' leaves: construction, projection, slicing,
    /// concatenation, update, select and identity.
    ///
    /// `one_hot_sel` is not included: it only forwards a case when the
    /// selector is known to have a single bit set.
    pub const fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::Tuple
                | Self::TupleIndex(_)
                | Self::Array
                | Self::ArrayIndex
                | Self::ArraySlice { .. }
                | Self::ArrayConcat
                | Self::ArrayUpdate
                | Self::Select { .. }
                | Self::PrioritySelect
                | Self::Identity
        )
    }

    /// Computes the output type of this operator applied to operands of the
    /// given types. `Param` nodes carry their type explicitly and are
    /// rejected here.
    pub fn result_type(&self, operands: &[&Type]) -> IrResult<Type> {
        let name = self.name();
        match self {
            Self::Param => Err(IrError::operand(name, "parameter types are not inferred")),
            Self::Literal(value) => {
                expect_arity(name, operands, 0)?;
                value.ty()
            }
            Self::Tuple => Ok(Type::tuple(operands.iter().map(|&t| t.clone()).collect())),
            Self::TupleIndex(index) => {
                expect_arity(name, operands, 1)?;
                let elements = operands[0].as_tuple().ok_or_else(|| {
                    IrError::operand(name, format!("operand has non-tuple type `{}`", operands[0]))
                })?;
                elements.get(*index).cloned().ok_or_else(|| {
                    IrError::operand(
                        name,
                        format!("index {index} out of range for `{}`", operands[0]),
                    )
                })
            }
            Self::Array => {
                let Some((first, rest)) = operands.split_first() else {
                    return Err(IrError::operand(name, "arrays must have at least one element"));
                };
                for other in rest {
                    expect_same(first, other, "array element")?;
                }
                Ok(Type::array((*first).clone(), operands.len()))
            }
            Self::ArrayIndex => {
                let Some((array, indices)) = operands.split_first() else {
                    return Err(IrError::operand(name, "missing array operand"));
                };
                expect_bits(name, indices)?;
                expect_readable(name, array, indices.len())?;
                indexed_type(name, array, indices.len()).cloned()
            }
            Self::ArraySlice { width } => {
                expect_arity(name, operands, 2)?;
                expect_bits(name, &operands[1..])?;
                let (element, _) = operands[0].as_array().ok_or_else(|| {
                    IrError::operand(name, format!("operand has non-array type `{}`", operands[0]))
                })?;
                if *width == 0 {
                    return Err(IrError::operand(name, "slice width must be positive"));
                }
                expect_readable(name, operands[0], 1)?;
                Ok(Type::array(element.clone(), *width))
            }
            Self::ArrayConcat => {
                let Some((first, _)) = operands.split_first() else {
                    return Err(IrError::operand(name, "at least one array is required"));
                };
                let (element, _) = first.as_array().ok_or_else(|| {
                    IrError::operand(name, format!("operand has non-array type `{first}`"))
                })?;
                let mut size = 0;
                for operand in operands {
                    match operand.as_array() {
                        Some((other, n)) if other == element => size += n,
                        _ => {
                            return Err(IrError::operand(
                                name,
                                format!("operand `{operand}` is not an array of `{element}`"),
                            ))
                        }
                    }
                }
                Ok(Type::array(element.clone(), size))
            }
            Self::ArrayUpdate => {
                if operands.len() < 2 {
                    return Err(IrError::operand(name, "expected array and update value"));
                }
                expect_bits(name, &operands[2..])?;
                let element = indexed_type(name, operands[0], operands.len() - 2)?;
                expect_same(element, operands[1], "array_update value")?;
                Ok(operands[0].clone())
            }
            Self::Select { has_default } => {
                let Some((selector, branches)) = operands.split_first() else {
                    return Err(IrError::operand(name, "missing selector"));
                };
                let width = selector_width(name, selector)?;
                let case_count = branches.len().saturating_sub(usize::from(*has_default));
                if case_count == 0 {
                    return Err(IrError::operand(name, "at least one case is required"));
                }
                let addressable = if width >= usize::BITS as usize {
                    usize::MAX
                } else {
                    1usize << width
                };
                if case_count > addressable {
                    return Err(IrError::operand(
                        name,
                        format!("{case_count} cases for a {width}-bit selector"),
                    ));
                }
                if *has_default == (case_count == addressable) {
                    return Err(IrError::operand(
                        name,
                        "a default is required exactly when the cases do not cover the selector",
                    ));
                }
                common_branch_type(branches)
            }
            Self::PrioritySelect => {
                let Some((selector, branches)) = operands.split_first() else {
                    return Err(IrError::operand(name, "missing selector"));
                };
                let width = selector_width(name, selector)?;
                if branches.len() != width + 1 {
                    return Err(IrError::operand(
                        name,
                        format!(
                            "expected {width} cases and a default, found {} branches",
                            branches.len()
                        ),
                    ));
                }
                common_branch_type(branches)
            }
            Self::OneHotSelect => {
                let Some((selector, cases)) = operands.split_first() else {
                    return Err(IrError::operand(name, "missing selector"));
                };
                let width = selector_width(name, selector)?;
                if cases.len() != width || cases.is_empty() {
                    return Err(IrError::operand(
                        name,
                        format!("expected {width} cases, found {}", cases.len()),
                    ));
                }
                common_branch_type(cases)
            }
            Self::OneHot => {
                expect_arity(name, operands, 1)?;
                expect_bits(name, operands)?;
                let width = operands[0].bit_width().unwrap_or_default();
                Ok(Type::bits(width + 1))
            }
            Self::Identity => {
                expect_arity(name, operands, 1)?;
                Ok(operands[0].clone())
            }
            Self::Unary(_) => {
                expect_arity(name, operands, 1)?;
                expect_bits(name, operands)?;
                Ok(operands[0].clone())
            }
            Self::Binary(op) => {
                expect_arity(name, operands, 2)?;
                expect_bits(name, operands)?;
                expect_same(operands[0], operands[1], name)?;
                if op.is_comparison() {
                    Ok(Type::bits(1))
                } else {
                    Ok(operands[0].clone())
                }
            }
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn expect_arity(op: &str, operands: &[&Type], arity: usize) -> IrResult<()> {
    if operands.len() != arity {
        return Err(IrError::operand(
            op,
            format!("expected {arity} operands, found {}", operands.len()),
        ));
    }
    Ok(())
}

fn expect_bits(op: &str, operands: &[&Type]) -> IrResult<()> {
    match operands.iter().find(|t| !t.is_bits()) {
        Some(ty) => Err(IrError::operand(op, format!("expected bits operand, found `{ty}`"))),
        None => Ok(()),
    }
}

fn expect_same(expected: &Type, found: &Type, context: &str) -> IrResult<()> {
    if expected != found {
        return Err(IrError::TypeMismatch {
            expected: expected.clone(),
            found: found.clone(),
            context: context.to_string(),
        });
    }
    Ok(())
}

fn selector_width(op: &str, selector: &Type) -> IrResult<usize> {
    selector
        .bit_width()
        .ok_or_else(|| IrError::operand(op, format!("selector has non-bits type `{selector}`")))
}

fn common_branch_type(branches: &[&Type]) -> IrResult<Type> {
    let Some((first, rest)) = branches.split_first() else {
        return Err(IrError::operand("select", "no branches"));
    };
    for other in rest {
        expect_same(first, other, "select branch")?;
    }
    Ok((*first).clone())
}

/// Peels `depth` array dimensions off `ty`
/// Rejects reads through the first `depth` array dimensions of `ty` when
/// any of them has no elements
fn expect_readable(op: &str, ty: &Type, depth: usize) -> IrResult<()> {
    let mut current = ty;
    for _ in 0..depth {
        match current.as_array() {
            Some((_, 0)) => {
                return Err(IrError::operand(
                    op,
                    format!("cannot read an element of empty array `{current}`"),
                ))
            }
            Some((element, _)) => current = element,
            None => break,
        }
    }
    Ok(())
}

fn indexed_type<'t>(op: &str, ty: &'t Type, depth: usize) -> IrResult<&'t Type> {
    let mut current = ty;
    for _ in 0..depth {
        current = current
            .as_array()
            .map(|(element, _)| element)
            .ok_or_else(|| IrError::operand(op, format!("too many indices for `{ty}`")))?;
    }
    Ok(current)
}
