//! Runtime values of the executor.
//!
//! [`EmValue`] is what lives on the operand stack, in local slots, in object fields and
//! in statics. References point into the [`ManagedHeap`](super::ManagedHeap) through a
//! [`HeapRef`]; two references are the same object exactly when their ids are equal.
//!
//! [`Observed`] is the identity-insensitive rendering of a value used to compare two
//! runs: heap references are replaced by a deep snapshot of the object they point to, so
//! two runs that allocate different objects with the same contents observe the same
//! value.

use std::fmt;

use crate::{
    assembly::{Constant, PrimitiveType, StackType, TypeSig},
    Error, Result,
};

/// Reference to an object on the managed heap.
///
/// # Equality
///
/// Two `HeapRef` values are equal if they point to the same heap object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HeapRef(pub(crate) u64);

impl HeapRef {
    /// Returns the internal id of this heap reference.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for HeapRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HeapRef({})", self.0)
    }
}

/// Runtime value during execution.
///
/// | Primitive                       | Variant               |
/// |---------------------------------|-----------------------|
/// | `bool`, `char`, `byte`, `short`, `int` | [`EmValue::I32`] |
/// | `long`                          | [`EmValue::I64`]      |
/// | `float`                         | [`EmValue::F32`]      |
/// | `double`                        | [`EmValue::F64`]      |
/// | object reference                | [`EmValue::ObjectRef`]|
/// | `null`                          | [`EmValue::Null`]     |
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EmValue {
    /// 32-bit signed integer, also carrying the narrow primitives.
    I32(i32),
    /// 64-bit signed integer.
    I64(i64),
    /// 32-bit floating point.
    F32(f32),
    /// 64-bit floating point.
    F64(f64),
    /// The null reference.
    Null,
    /// Reference to a heap object.
    ObjectRef(HeapRef),
}

impl EmValue {
    /// Value pushed by a constant instruction.
    #[must_use]
    pub fn from_constant(constant: Constant) -> Self {
        match constant {
            Constant::Int(v) => EmValue::I32(v),
            Constant::Long(v) => EmValue::I64(v),
            Constant::Float(v) => EmValue::F32(v),
            Constant::Double(v) => EmValue::F64(v),
        }
    }

    /// Default value of a field or static of the given type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Emulation`] for `void`.
    pub fn zero(ty: &TypeSig) -> Result<Self> {
        match ty.stack_type() {
            Some(StackType::Int) => Ok(EmValue::I32(0)),
            Some(StackType::Long) => Ok(EmValue::I64(0)),
            Some(StackType::Float) => Ok(EmValue::F32(0.0)),
            Some(StackType::Double) => Ok(EmValue::F64(0.0)),
            Some(StackType::Reference) => Ok(EmValue::Null),
            None => Err(Error::Emulation("void has no default value".to_string())),
        }
    }

    /// Stack type of this value.
    #[must_use]
    pub const fn stack_type(&self) -> StackType {
        match self {
            EmValue::I32(_) => StackType::Int,
            EmValue::I64(_) => StackType::Long,
            EmValue::F32(_) => StackType::Float,
            EmValue::F64(_) => StackType::Double,
            EmValue::Null | EmValue::ObjectRef(_) => StackType::Reference,
        }
    }

    /// Returns `true` for `null`.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, EmValue::Null)
    }

    /// Extracts an int.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Emulation`] if the value is not an int.
    pub fn as_i32(&self) -> Result<i32> {
        match self {
            EmValue::I32(v) => Ok(*v),
            other => Err(Self::mismatch(StackType::Int, other)),
        }
    }

    /// Extracts a long.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Emulation`] if the value is not a long.
    pub fn as_i64(&self) -> Result<i64> {
        match self {
            EmValue::I64(v) => Ok(*v),
            other => Err(Self::mismatch(StackType::Long, other)),
        }
    }

    /// Extracts a reference, `None` for `null`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Emulation`] if the value is a primitive.
    pub fn as_object(&self) -> Result<Option<HeapRef>> {
        match self {
            EmValue::Null => Ok(None),
            EmValue::ObjectRef(r) => Ok(Some(*r)),
            other => Err(Self::mismatch(StackType::Reference, other)),
        }
    }

    /// Numeric conversion to `target`, with the usual wrapping and saturation rules.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Emulation`] when either side is a reference.
    pub fn convert(self, target: StackType) -> Result<Self> {
        #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
        let converted = match (self, target) {
            (EmValue::I32(v), StackType::Int) => EmValue::I32(v),
            (EmValue::I32(v), StackType::Long) => EmValue::I64(i64::from(v)),
            (EmValue::I32(v), StackType::Float) => EmValue::F32(v as f32),
            (EmValue::I32(v), StackType::Double) => EmValue::F64(f64::from(v)),
            (EmValue::I64(v), StackType::Int) => EmValue::I32(v as i32),
            (EmValue::I64(v), StackType::Long) => EmValue::I64(v),
            (EmValue::I64(v), StackType::Float) => EmValue::F32(v as f32),
            (EmValue::I64(v), StackType::Double) => EmValue::F64(v as f64),
            (EmValue::F32(v), StackType::Int) => EmValue::I32(v as i32),
            (EmValue::F32(v), StackType::Long) => EmValue::I64(v as i64),
            (EmValue::F32(v), StackType::Float) => EmValue::F32(v),
            (EmValue::F32(v), StackType::Double) => EmValue::F64(f64::from(v)),
            (EmValue::F64(v), StackType::Int) => EmValue::I32(v as i32),
            (EmValue::F64(v), StackType::Long) => EmValue::I64(v as i64),
            (EmValue::F64(v), StackType::Float) => EmValue::F32(v as f32),
            (EmValue::F64(v), StackType::Double) => EmValue::F64(v),
            (value, target) => {
                return Err(Error::Emulation(format!("cannot convert {value} to {target}")));
            }
        };
        Ok(converted)
    }

    /// Converts a primitive of type `from` into one of type `to`.
    ///
    /// Used by unboxing accessors on a wrapper of a different type, e.g. `long_value()`
    /// on a `core.Int`. Narrow targets truncate the way a cast would.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Emulation`] when the value is a reference.
    pub fn convert_primitive(self, from: PrimitiveType, to: PrimitiveType) -> Result<Self> {
        if from == to {
            return Ok(self);
        }
        let widened = self.convert(to.stack_type())?;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let narrowed = match (to, widened) {
            (PrimitiveType::Byte, EmValue::I32(v)) => EmValue::I32(i32::from(v as i8)),
            (PrimitiveType::Short, EmValue::I32(v)) => EmValue::I32(i32::from(v as i16)),
            (PrimitiveType::Char, EmValue::I32(v)) => EmValue::I32(i32::from(v as u16)),
            (PrimitiveType::Bool, EmValue::I32(v)) => EmValue::I32(i32::from(v != 0)),
            (_, value) => value,
        };
        Ok(narrowed)
    }

    fn mismatch(expected: StackType, found: &EmValue) -> Error {
        Error::Emulation(format!("expected {expected}, found {found}"))
    }
}

impl fmt::Display for EmValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmValue::I32(v) => write!(f, "{v}"),
            EmValue::I64(v) => write!(f, "{v}L"),
            EmValue::F32(v) => write!(f, "{v}f"),
            EmValue::F64(v) => write!(f, "{v}d"),
            EmValue::Null => write!(f, "null"),
            EmValue::ObjectRef(r) => write!(f, "{r}"),
        }
    }
}

/// Identity-insensitive snapshot of a value.
///
/// Floats are kept as their bit patterns so that snapshots are `Eq`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Observed {
    /// An int-like primitive
    Int(i32),
    /// A long
    Long(i64),
    /// A float, as bits
    Float(u32),
    /// A double, as bits
    Double(u64),
    /// The null reference
    Null,
    /// A wrapper object holding a primitive
    Boxed(PrimitiveType, Box<Observed>),
    /// An ordinary instance with its fields, sorted by name
    Object {
        /// Class of the instance
        class: String,
        /// Field values
        fields: Vec<(String, Observed)>,
    },
    /// A range, progression or iterator, rendered with its current state
    Runtime {
        /// Class of the object
        class: String,
        /// Remaining elements, as `(next, last, step)`
        state: (i64, i64, i64),
    },
    /// A reference back to an object already being rendered
    Cycle,
}

impl From<EmValue> for Observed {
    /// Renders a primitive. References other than `null` become [`Observed::Cycle`];
    /// use [`ManagedHeap::observe`](super::ManagedHeap::observe) to render objects.
    fn from(value: EmValue) -> Self {
        match value {
            EmValue::I32(v) => Observed::Int(v),
            EmValue::I64(v) => Observed::Long(v),
            EmValue::F32(v) => Observed::Float(v.to_bits()),
            EmValue::F64(v) => Observed::Double(v.to_bits()),
            EmValue::Null => Observed::Null,
            EmValue::ObjectRef(_) => Observed::Cycle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_widening_and_narrowing() {
        let int = EmValue::I32(300);
        assert_eq!(int.convert(StackType::Long).unwrap(), EmValue::I64(300));
        assert_eq!(
            int.convert_primitive(PrimitiveType::Int, PrimitiveType::Byte).unwrap(),
            EmValue::I32(44)
        );
        assert_eq!(
            EmValue::I64(-1)
                .convert_primitive(PrimitiveType::Long, PrimitiveType::Char)
                .unwrap(),
            EmValue::I32(0xFFFF)
        );
        assert_eq!(
            EmValue::F64(2.9).convert(StackType::Int).unwrap(),
            EmValue::I32(2)
        );
    }

    #[test]
    fn test_references_do_not_convert() {
        assert!(EmValue::Null.convert(StackType::Int).is_err());
        assert!(EmValue::I32(1).as_object().is_err());
        assert_eq!(EmValue::Null.as_object().unwrap(), None);
    }

    #[test]
    fn test_zero_values() {
        assert_eq!(EmValue::zero(&PrimitiveType::Short.into()).unwrap(), EmValue::I32(0));
        assert_eq!(EmValue::zero(&TypeSig::object("a.B")).unwrap(), EmValue::Null);
        assert!(EmValue::zero(&TypeSig::Void).is_err());
    }

    #[test]
    fn test_observed_floats_compare_by_bits() {
        assert_eq!(Observed::from(EmValue::F32(f32::NAN)), Observed::from(EmValue::F32(f32::NAN)));
        assert_ne!(Observed::from(EmValue::F64(0.0)), Observed::from(EmValue::F64(-0.0)));
    }
}
