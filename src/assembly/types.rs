//! Value types of the stack machine.
//!
//! Three layers of typing are used throughout the crate:
//!
//! - [`PrimitiveType`] - the precise source-level primitive (what a wrapper holds)
//! - [`StackType`] - the widened type a value has while it lives on the operand stack
//!   or in a local slot
//! - [`TypeSig`] - a signature-level type used by method and field references
//!
//! Every primitive widens to exactly one stack type; `Bool`, `Char`, `Byte` and `Short`
//! all travel as [`StackType::Int`].

use std::fmt;

use strum::{Display, EnumIter, IntoStaticStr};

/// Name of the root reference class.
pub const OBJECT_CLASS: &str = "core.Object";

/// Name of the abstract numeric wrapper supertype.
pub const NUMBER_CLASS: &str = "core.Number";

/// Precise primitive types.
///
/// These are the types a wrapper object can hold. The snake-case name of each variant
/// (as produced by [`Display`] / [`IntoStaticStr`]) is used to derive accessor names such
/// as `int_value` or `next_long`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum PrimitiveType {
    /// `true` / `false`, carried as an int
    Bool,
    /// 16-bit character, carried as an int
    Char,
    /// Signed 8-bit integer, carried as an int
    Byte,
    /// Signed 16-bit integer, carried as an int
    Short,
    /// Signed 32-bit integer
    Int,
    /// Signed 64-bit integer
    Long,
    /// 32-bit float
    Float,
    /// 64-bit float
    Double,
}

impl PrimitiveType {
    /// Returns the stack type values of this primitive widen to.
    #[must_use]
    pub const fn stack_type(self) -> StackType {
        match self {
            Self::Bool | Self::Char | Self::Byte | Self::Short | Self::Int => StackType::Int,
            Self::Long => StackType::Long,
            Self::Float => StackType::Float,
            Self::Double => StackType::Double,
        }
    }

    /// Returns the wrapper class used when a value of this type is boxed.
    #[must_use]
    pub const fn wrapper_class(self) -> &'static str {
        match self {
            Self::Bool => "core.Boolean",
            Self::Char => "core.Char",
            Self::Byte => "core.Byte",
            Self::Short => "core.Short",
            Self::Int => "core.Int",
            Self::Long => "core.Long",
            Self::Float => "core.Float",
            Self::Double => "core.Double",
        }
    }

    /// Returns `true` for the types whose wrappers extend [`NUMBER_CLASS`].
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        !matches!(self, Self::Bool | Self::Char)
    }

    /// Looks up the primitive held by the given wrapper class.
    #[must_use]
    pub fn from_wrapper_class(class: &str) -> Option<Self> {
        use strum::IntoEnumIterator;
        Self::iter().find(|prim| prim.wrapper_class() == class)
    }

    /// Snake-case name of this primitive (`"int"`, `"long"`, ...).
    #[must_use]
    pub fn name(self) -> &'static str {
        self.into()
    }
}

/// Types of values on the operand stack and in local slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum StackType {
    /// 32-bit integer (also bool, char, byte, short)
    Int,
    /// 64-bit integer
    Long,
    /// 32-bit float
    Float,
    /// 64-bit float
    Double,
    /// Any object reference, including `null`
    Reference,
}

/// Signature-level types used by method and field references.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeSig {
    /// No value (method return only)
    Void,
    /// A primitive value
    Primitive(PrimitiveType),
    /// A reference to an instance of the named class
    Object(String),
}

impl TypeSig {
    /// Convenience constructor for object types.
    #[must_use]
    pub fn object(class: impl Into<String>) -> Self {
        TypeSig::Object(class.into())
    }

    /// Returns the stack type of values of this signature, or `None` for `Void`.
    #[must_use]
    pub fn stack_type(&self) -> Option<StackType> {
        match self {
            TypeSig::Void => None,
            TypeSig::Primitive(prim) => Some(prim.stack_type()),
            TypeSig::Object(_) => Some(StackType::Reference),
        }
    }

    /// Returns the primitive type if this is a primitive signature.
    #[must_use]
    pub fn as_primitive(&self) -> Option<PrimitiveType> {
        match self {
            TypeSig::Primitive(prim) => Some(*prim),
            _ => None,
        }
    }

    /// Returns the class name if this is an object signature.
    #[must_use]
    pub fn as_class(&self) -> Option<&str> {
        match self {
            TypeSig::Object(class) => Some(class),
            _ => None,
        }
    }
}

impl From<PrimitiveType> for TypeSig {
    fn from(prim: PrimitiveType) -> Self {
        TypeSig::Primitive(prim)
    }
}

impl fmt::Display for TypeSig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeSig::Void => f.write_str("void"),
            TypeSig::Primitive(prim) => write!(f, "{prim}"),
            TypeSig::Object(class) => f.write_str(class),
        }
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn test_small_primitives_widen_to_int() {
        for prim in [
            PrimitiveType::Bool,
            PrimitiveType::Char,
            PrimitiveType::Byte,
            PrimitiveType::Short,
        ] {
            assert_eq!(prim.stack_type(), StackType::Int);
        }
        assert_eq!(PrimitiveType::Long.stack_type(), StackType::Long);
    }

    #[test]
    fn test_wrapper_class_roundtrip() {
        for prim in PrimitiveType::iter() {
            assert_eq!(PrimitiveType::from_wrapper_class(prim.wrapper_class()), Some(prim));
        }
        assert_eq!(PrimitiveType::from_wrapper_class(NUMBER_CLASS), None);
    }

    #[test]
    fn test_primitive_names() {
        assert_eq!(PrimitiveType::Int.name(), "int");
        assert_eq!(PrimitiveType::Double.to_string(), "double");
        assert!(!PrimitiveType::Char.is_numeric());
        assert!(PrimitiveType::Byte.is_numeric());
    }
}
