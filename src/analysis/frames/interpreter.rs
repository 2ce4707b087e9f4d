//! The transfer-function contract between the frame analyzer and a value domain.

use std::fmt::Debug;

use crate::assembly::{Instruction, TypeSig};

/// Abstract semantics of the instruction set over a value domain.
///
/// The [`FrameAnalyzer`](super::FrameAnalyzer) owns the operand stack and local slots and
/// calls exactly one of these methods per instruction that produces or consumes values.
/// Implementations decide what a value is; the analyzer only moves values around and
/// joins them at control-flow merge points.
///
/// | Hook                 | Instructions                                                  |
/// |----------------------|---------------------------------------------------------------|
/// | `new_operation`      | `const`, `const_null`, `new`, `get_static`                    |
/// | `copy_operation`     | `load`, `store`, `dup`, `swap`                                |
/// | `unary_operation`    | `neg`, `convert`, `get_field`, `checkcast`, `instance_of`, `if_true`, `if_false`, `if_null`, `if_non_null`, `put_static`, `throw` |
/// | `binary_operation`   | arithmetic, `put_field`, `if_cmp`                             |
/// | `nary_operation`     | `invoke_static`, `invoke_virtual`                             |
/// | `return_operation`   | `return`                                                      |
///
/// Operations that consume their operands without producing a value return `None`.
pub trait Interpreter {
    /// The abstract value stored in stack and local slots.
    type Value: Clone + PartialEq + Debug;

    /// Value of a local slot at method entry.
    ///
    /// `ty` is the declared parameter type, or `None` for slots beyond the parameters.
    fn new_value(&mut self, ty: Option<&TypeSig>) -> Self::Value;

    /// Value pushed when entering an exception handler.
    fn new_exception_value(&mut self, catch_type: Option<&str>) -> Self::Value;

    /// Value produced by an instruction without operands.
    fn new_operation(&mut self, insn: &Instruction) -> Self::Value;

    /// Value produced by moving or duplicating `value`.
    fn copy_operation(&mut self, insn: &Instruction, value: Self::Value) -> Self::Value;

    /// Result of an instruction consuming one value.
    fn unary_operation(&mut self, insn: &Instruction, value: Self::Value) -> Option<Self::Value>;

    /// Result of an instruction consuming two values, in push order.
    fn binary_operation(
        &mut self,
        insn: &Instruction,
        first: Self::Value,
        second: Self::Value,
    ) -> Option<Self::Value>;

    /// Result of a call consuming its arguments, receiver first.
    fn nary_operation(&mut self, insn: &Instruction, values: Vec<Self::Value>) -> Option<Self::Value>;

    /// Observes a value returned from the method.
    fn return_operation(&mut self, insn: &Instruction, value: Self::Value, expected: &TypeSig);

    /// Joins two values reaching the same slot along different paths.
    ///
    /// `old` is the value already recorded at the join point, `new` the incoming one.
    fn merge(&mut self, old: &Self::Value, new: &Self::Value) -> Self::Value;
}
