//! # Literal Values
//!
//! Compile-time constants carried by `literal` nodes. Bits values are limited
//! to 64 bits, which covers every index and selector the passes inspect.

use std::fmt;

use itertools::Itertools;

use crate::{IrError, IrResult, Type};

/// A constant value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    /// A bit vector; `value` is always masked to `width` bits
    Bits { width: usize, value: u64 },

    /// A token value
    Token,

    /// A tuple of values
    Tuple(Vec<Value>),

    /// A non-empty array of values sharing one type
    Array(Vec<Value>),
}

impl Value {
    /// Creates a bits value, truncating `value` to `width` bits
    pub fn bits(width: usize, value: u64) -> Self {
        let value = if width >= 64 {
            value
        } else {
            value & ((1u64 << width) - 1)
        };
        Self::Bits { width, value }
    }

    /// Creates a single-bit boolean value
    pub fn bool(value: bool) -> Self {
        Self::bits(1, u64::from(value))
    }

    pub fn tuple(elements: Vec<Self>) -> Self {
        Self::Tuple(elements)
    }

    pub fn array(elements: Vec<Self>) -> Self {
        Self::Array(elements)
    }

    /// Returns the numeric value if this is a bits value
    pub const fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Bits { value, .. } => Some(*value),
            _ => None,
        }
    }

    /// Computes the type of this value
    pub fn ty(&self) -> IrResult<Type> {
        match self {
            Self::Bits { width, .. } => {
                if *width > 64 {
                    return Err(IrError::InvalidLiteral(format!(
                        "bits literal of width {width} exceeds 64 bits"
                    )));
                }
                Ok(Type::bits(*width))
            }
            Self::Token => Ok(Type::token()),
            Self::Tuple(elements) => Ok(Type::tuple(
                elements.iter().map(Self::ty).collect::<IrResult<Vec<_>>>()?,
            )),
            Self::Array(elements) => {
                let Some(first) = elements.first() else {
                    return Err(IrError::InvalidLiteral(
                        "array literal must have at least one element".to_string(),
                    ));
                };
                let element_type = first.ty()?;
                for element in &elements[1..] {
                    let ty = element.ty()?;
                    if ty != element_type {
                        return Err(IrError::TypeMismatch {
                            expected: element_type,
                            found: ty,
                            context: "array literal element".to_string(),
                        });
                    }
                }
                Ok(Type::array(element_type, elements.len()))
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bits { width, value } => write!(f, "bits[{width}]:{value}"),
            Self::Token => write!(f, "token"),
            Self::Tuple(elements) => write!(f, "({})", elements.iter().join(", ")),
            Self::Array(elements) => write!(f, "[{}]", elements.iter().join(", ")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bits_are_masked() {
        assert_eq!(Value::bits(4, 0x1f), Value::bits(4, 0xf));
        assert_eq!(Value::bits(64, u64::MAX).as_u64(), Some(u64::MAX));
    }

    #[test]
    fn test_value_types() {
        let v = Value::tuple(vec![
            Value::bits(8, 1),
            Value::array(vec![Value::bool(true), Value::bool(false)]),
        ]);
        assert_eq!(
            v.ty().unwrap(),
            Type::tuple(vec![Type::bits(8), Type::array(Type::bits(1), 2)])
        );
        assert_eq!(v.to_string(), "(bits[8]:1, [bits[1]:1, bits[1]:0])");
    }

    #[test]
    fn test_invalid_arrays() {
        assert!(Value::array(vec![]).ty().is_err());
        let mixed = Value::array(vec![Value::bits(8, 1), Value::bits(4, 1)]);
        assert!(matches!(mixed.ty(), Err(IrError::TypeMismatch { .. })));
    }
}
