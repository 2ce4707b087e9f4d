//! The ordinary value domain: one abstract value per stack type.

use std::fmt;

use crate::{
    analysis::frames::interpreter::Interpreter,
    assembly::{Instruction, Opcode, StackType, TypeSig},
};

/// A value known only by its stack type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BasicValue {
    /// Unusable slot: never written, or written with conflicting types on different paths
    Uninitialized,
    /// A value of the given stack type
    Typed(StackType),
}

impl BasicValue {
    /// Value for a signature type; `Void` has no value and maps to `Uninitialized`.
    #[must_use]
    pub fn of(ty: &TypeSig) -> Self {
        ty.stack_type().map_or(BasicValue::Uninitialized, BasicValue::Typed)
    }

    /// The stack type, if the slot holds a usable value.
    #[must_use]
    pub const fn stack_type(self) -> Option<StackType> {
        match self {
            BasicValue::Uninitialized => None,
            BasicValue::Typed(ty) => Some(ty),
        }
    }
}

impl fmt::Display for BasicValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BasicValue::Uninitialized => f.write_str("."),
            BasicValue::Typed(ty) => write!(f, "{ty}"),
        }
    }
}

/// Ordinary transfer functions over [`BasicValue`].
///
/// Richer domains delegate to this interpreter for everything they do not model
/// themselves.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicInterpreter;

impl Interpreter for BasicInterpreter {
    type Value = BasicValue;

    fn new_value(&mut self, ty: Option<&TypeSig>) -> BasicValue {
        ty.map_or(BasicValue::Uninitialized, BasicValue::of)
    }

    fn new_exception_value(&mut self, _catch_type: Option<&str>) -> BasicValue {
        BasicValue::Typed(StackType::Reference)
    }

    fn new_operation(&mut self, insn: &Instruction) -> BasicValue {
        match &insn.op {
            Opcode::Const(constant) => BasicValue::Typed(constant.stack_type()),
            Opcode::GetStatic(field) => BasicValue::of(&field.ty),
            _ => BasicValue::Typed(StackType::Reference),
        }
    }

    fn copy_operation(&mut self, _insn: &Instruction, value: BasicValue) -> BasicValue {
        value
    }

    fn unary_operation(&mut self, insn: &Instruction, value: BasicValue) -> Option<BasicValue> {
        match &insn.op {
            Opcode::Neg => Some(value),
            Opcode::Convert(ty) => Some(BasicValue::Typed(*ty)),
            Opcode::GetField(field) => Some(BasicValue::of(&field.ty)),
            Opcode::CheckCast(_) => Some(BasicValue::Typed(StackType::Reference)),
            Opcode::InstanceOf(_) => Some(BasicValue::Typed(StackType::Int)),
            _ => None,
        }
    }

    fn binary_operation(
        &mut self,
        insn: &Instruction,
        first: BasicValue,
        _second: BasicValue,
    ) -> Option<BasicValue> {
        match insn.op {
            Opcode::Arith(_) => Some(first),
            _ => None,
        }
    }

    fn nary_operation(&mut self, insn: &Instruction, _values: Vec<BasicValue>) -> Option<BasicValue> {
        match &insn.op {
            Opcode::InvokeStatic(method) | Opcode::InvokeVirtual(method) => {
                method.ret.stack_type().map(BasicValue::Typed)
            }
            _ => None,
        }
    }

    fn return_operation(&mut self, _insn: &Instruction, _value: BasicValue, _expected: &TypeSig) {}

    fn merge(&mut self, old: &BasicValue, new: &BasicValue) -> BasicValue {
        if old == new {
            *old
        } else {
            BasicValue::Uninitialized
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::{InsnId, PrimitiveType};

    fn insn(op: Opcode) -> Instruction {
        Instruction { id: InsnId(0), op }
    }

    #[test]
    fn test_signature_values() {
        assert_eq!(
            BasicValue::of(&PrimitiveType::Short.into()),
            BasicValue::Typed(StackType::Int)
        );
        assert_eq!(BasicValue::of(&TypeSig::Void), BasicValue::Uninitialized);
        assert_eq!(
            BasicValue::of(&TypeSig::object("a.B")).stack_type(),
            Some(StackType::Reference)
        );
    }

    #[test]
    fn test_unary_results() {
        let mut interp = BasicInterpreter;
        let int = BasicValue::Typed(StackType::Int);
        assert_eq!(
            interp.unary_operation(&insn(Opcode::Convert(StackType::Double)), int),
            Some(BasicValue::Typed(StackType::Double))
        );
        assert_eq!(interp.unary_operation(&insn(Opcode::Throw), int), None);
    }

    #[test]
    fn test_merge() {
        let mut interp = BasicInterpreter;
        let reference = BasicValue::Typed(StackType::Reference);
        let long = BasicValue::Typed(StackType::Long);
        assert_eq!(interp.merge(&reference, &reference), reference);
        assert_eq!(interp.merge(&reference, &long), BasicValue::Uninitialized);
    }
}
