//! # Method Builder
//!
//! Provides a fluent API for assembling [`MethodBody`] instances with named labels.
//!
//! ## Overview
//!
//! The `MethodBuilder` enables creation of method bodies with:
//! - Parameter and return type declaration
//! - One method per opcode, operands inline
//! - Named branch targets resolved when the body is built
//! - Try/catch regions delimited by named labels
//! - Shorthands for the runtime library's boxing and unboxing calls
//!
//! ## Usage
//!
//! ```rust
//! use boxelide::assembly::{MethodBuilder, PrimitiveType};
//!
//! // int abs(int x) { return x < 0 ? -x : x; }
//! let body = MethodBuilder::new("abs")
//!     .param(PrimitiveType::Int)
//!     .returns(PrimitiveType::Int)
//!     .load(0)
//!     .const_int(0)
//!     .if_cmp_ge("positive")
//!     .load(0)
//!     .neg()
//!     .ret()
//!     .label("positive")
//!     .load(0)
//!     .ret()
//!     .build()?;
//!
//! assert_eq!(body.params().len(), 1);
//! # Ok::<(), boxelide::Error>(())
//! ```

use std::collections::{HashMap, HashSet};

use crate::{
    assembly::{
        instruction::{ArithOp, CmpOp, Constant, FieldRef, LabelId, MethodRef, Opcode},
        method::{MethodBody, TryCatchBlock},
        runtime,
        types::{PrimitiveType, StackType, TypeSig},
    },
    Error, Result,
};

/// Builder for [`MethodBody`] instances.
///
/// Labels are referred to by name. A name used by a branch before it is placed is
/// forward-declared; [`MethodBuilder::build`] fails with [`Error::UnresolvedLabel`] if any
/// referenced name was never placed with [`MethodBuilder::label`].
#[derive(Debug, Clone)]
pub struct MethodBuilder {
    name: String,
    labels: HashMap<String, LabelId>,
    placed: HashSet<String>,
    pending_params: Vec<TypeSig>,
    pending_return: TypeSig,
    ops: Vec<Opcode>,
    regions: Vec<(String, String, String, Option<String>)>,
}

impl MethodBuilder {
    /// Creates a builder for a parameterless void method.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        MethodBuilder {
            name: name.into(),
            labels: HashMap::new(),
            placed: HashSet::new(),
            pending_params: Vec::new(),
            pending_return: TypeSig::Void,
            ops: Vec::new(),
            regions: Vec::new(),
        }
    }

    /// Appends a parameter; parameters occupy the first local slots in order.
    #[must_use]
    pub fn param(mut self, ty: impl Into<TypeSig>) -> Self {
        self.pending_params.push(ty.into());
        self
    }

    /// Sets the return type.
    #[must_use]
    pub fn returns(mut self, ty: impl Into<TypeSig>) -> Self {
        self.pending_return = ty.into();
        self
    }

    /// Appends an arbitrary opcode.
    #[must_use]
    pub fn op(mut self, op: Opcode) -> Self {
        self.ops.push(op);
        self
    }

    /// Places the named label at the current position.
    #[must_use]
    pub fn label(mut self, name: &str) -> Self {
        let label = self.label_id(name);
        self.placed.insert(name.to_string());
        self.op(Opcode::Label(label))
    }

    /// Declares a protected region between two placed labels.
    #[must_use]
    pub fn try_catch(mut self, start: &str, end: &str, handler: &str, catch_type: Option<&str>) -> Self {
        self.regions.push((
            start.to_string(),
            end.to_string(),
            handler.to_string(),
            catch_type.map(str::to_string),
        ));
        self
    }

    /// `nop`
    #[must_use]
    pub fn nop(self) -> Self {
        self.op(Opcode::Nop)
    }

    /// Pushes an int constant.
    #[must_use]
    pub fn const_int(self, value: i32) -> Self {
        self.op(Opcode::Const(Constant::Int(value)))
    }

    /// Pushes a long constant.
    #[must_use]
    pub fn const_long(self, value: i64) -> Self {
        self.op(Opcode::Const(Constant::Long(value)))
    }

    /// Pushes a float constant.
    #[must_use]
    pub fn const_float(self, value: f32) -> Self {
        self.op(Opcode::Const(Constant::Float(value)))
    }

    /// Pushes a double constant.
    #[must_use]
    pub fn const_double(self, value: f64) -> Self {
        self.op(Opcode::Const(Constant::Double(value)))
    }

    /// Pushes `null`.
    #[must_use]
    pub fn const_null(self) -> Self {
        self.op(Opcode::ConstNull)
    }

    /// Allocates an instance of `class`.
    #[must_use]
    pub fn new_object(self, class: &str) -> Self {
        self.op(Opcode::New(class.to_string()))
    }

    /// Loads a local slot.
    #[must_use]
    pub fn load(self, slot: u16) -> Self {
        self.op(Opcode::Load(slot))
    }

    /// Stores into a local slot.
    #[must_use]
    pub fn store(self, slot: u16) -> Self {
        self.op(Opcode::Store(slot))
    }

    /// `dup`
    #[must_use]
    pub fn dup(self) -> Self {
        self.op(Opcode::Dup)
    }

    /// `pop`
    #[must_use]
    pub fn pop(self) -> Self {
        self.op(Opcode::Pop)
    }

    /// `swap`
    #[must_use]
    pub fn swap(self) -> Self {
        self.op(Opcode::Swap)
    }

    /// Binary arithmetic.
    #[must_use]
    pub fn arith(self, op: ArithOp) -> Self {
        self.op(Opcode::Arith(op))
    }

    /// `add`
    #[must_use]
    pub fn add(self) -> Self {
        self.arith(ArithOp::Add)
    }

    /// `sub`
    #[must_use]
    pub fn sub(self) -> Self {
        self.arith(ArithOp::Sub)
    }

    /// `mul`
    #[must_use]
    pub fn mul(self) -> Self {
        self.arith(ArithOp::Mul)
    }

    /// `neg`
    #[must_use]
    pub fn neg(self) -> Self {
        self.op(Opcode::Neg)
    }

    /// Numeric conversion.
    #[must_use]
    pub fn convert(self, to: StackType) -> Self {
        self.op(Opcode::Convert(to))
    }

    /// Reads an instance field.
    #[must_use]
    pub fn get_field(self, field: FieldRef) -> Self {
        self.op(Opcode::GetField(field))
    }

    /// Writes an instance field.
    #[must_use]
    pub fn put_field(self, field: FieldRef) -> Self {
        self.op(Opcode::PutField(field))
    }

    /// Reads a static field.
    #[must_use]
    pub fn get_static(self, field: FieldRef) -> Self {
        self.op(Opcode::GetStatic(field))
    }

    /// Writes a static field.
    #[must_use]
    pub fn put_static(self, field: FieldRef) -> Self {
        self.op(Opcode::PutStatic(field))
    }

    /// Static call.
    #[must_use]
    pub fn invoke_static(self, method: MethodRef) -> Self {
        self.op(Opcode::InvokeStatic(method))
    }

    /// Virtual call.
    #[must_use]
    pub fn invoke_virtual(self, method: MethodRef) -> Self {
        self.op(Opcode::InvokeVirtual(method))
    }

    /// Boxes the primitive on top of the stack with its wrapper's factory.
    #[must_use]
    pub fn box_value(self, prim: PrimitiveType) -> Self {
        self.invoke_static(runtime::box_method(prim))
    }

    /// Unboxes the wrapper on top of the stack with its own accessor.
    #[must_use]
    pub fn unbox(self, prim: PrimitiveType) -> Self {
        self.unbox_via(prim.wrapper_class(), prim)
    }

    /// Unboxes through an accessor declared on `owner` (a wrapper or `core.Number`).
    #[must_use]
    pub fn unbox_via(self, owner: &str, prim: PrimitiveType) -> Self {
        self.invoke_virtual(runtime::unbox_method(owner, prim))
    }

    /// Checked cast.
    #[must_use]
    pub fn checkcast(self, class: &str) -> Self {
        self.op(Opcode::CheckCast(class.to_string()))
    }

    /// Type test.
    #[must_use]
    pub fn instance_of(self, class: &str) -> Self {
        self.op(Opcode::InstanceOf(class.to_string()))
    }

    /// Unconditional jump to a named label.
    #[must_use]
    pub fn goto(mut self, target: &str) -> Self {
        let label = self.label_id(target);
        self.op(Opcode::Goto(label))
    }

    /// Jumps if the int on top is non-zero.
    #[must_use]
    pub fn if_true(mut self, target: &str) -> Self {
        let label = self.label_id(target);
        self.op(Opcode::IfTrue(label))
    }

    /// Jumps if the int on top is zero.
    #[must_use]
    pub fn if_false(mut self, target: &str) -> Self {
        let label = self.label_id(target);
        self.op(Opcode::IfFalse(label))
    }

    /// Compares two ints and jumps if `op` holds.
    #[must_use]
    pub fn if_cmp(mut self, op: CmpOp, target: &str) -> Self {
        let label = self.label_id(target);
        self.op(Opcode::IfCmp(op, label))
    }

    /// Jumps if the second int is less than the top one.
    #[must_use]
    pub fn if_cmp_lt(self, target: &str) -> Self {
        self.if_cmp(CmpOp::Lt, target)
    }

    /// Jumps if the second int is greater or equal to the top one.
    #[must_use]
    pub fn if_cmp_ge(self, target: &str) -> Self {
        self.if_cmp(CmpOp::Ge, target)
    }

    /// Jumps if the reference on top is null.
    #[must_use]
    pub fn if_null(mut self, target: &str) -> Self {
        let label = self.label_id(target);
        self.op(Opcode::IfNull(label))
    }

    /// Jumps if the reference on top is not null.
    #[must_use]
    pub fn if_non_null(mut self, target: &str) -> Self {
        let label = self.label_id(target);
        self.op(Opcode::IfNonNull(label))
    }

    /// Returns the value on top of the stack.
    #[must_use]
    pub fn ret(self) -> Self {
        self.op(Opcode::Return)
    }

    /// Returns from a void method.
    #[must_use]
    pub fn ret_void(self) -> Self {
        self.op(Opcode::ReturnVoid)
    }

    /// Throws the reference on top of the stack.
    #[must_use]
    pub fn throw(self) -> Self {
        self.op(Opcode::Throw)
    }

    /// Resolves labels and produces the method body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnresolvedLabel`] if a branch or try/catch region names a label
    /// that was never placed.
    pub fn build(self) -> Result<MethodBody> {
        let MethodBuilder {
            name,
            labels,
            placed,
            pending_params,
            pending_return,
            ops,
            regions,
        } = self;

        if let Some(missing) = labels.keys().find(|name| !placed.contains(*name)) {
            return Err(Error::UnresolvedLabel(format!(
                "'{missing}' in method '{name}'"
            )));
        }

        let mut method = MethodBody::new(name, pending_params, pending_return);
        // Label ids were handed out densely from zero.
        for _ in 0..labels.len() {
            method.new_label();
        }
        for op in ops {
            method.push(op);
        }

        for (start, end, handler, catch_type) in regions {
            let resolve = |name: &str| {
                labels
                    .get(name)
                    .filter(|_| placed.contains(name))
                    .copied()
                    .ok_or_else(|| {
                        Error::UnresolvedLabel(format!(
                            "'{name}' in try/catch of method '{}'",
                            method.name()
                        ))
                    })
            };
            let block = TryCatchBlock {
                start: resolve(&start)?,
                end: resolve(&end)?,
                handler: resolve(&handler)?,
                catch_type,
            };
            method.add_try_catch(block);
        }
        Ok(method)
    }

    fn label_id(&mut self, name: &str) -> LabelId {
        if let Some(label) = self.labels.get(name) {
            return *label;
        }
        let label = LabelId(u32::try_from(self.labels.len()).unwrap_or(u32::MAX));
        self.labels.insert(name.to_string(), label);
        label
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_labels_resolve() {
        let body = MethodBuilder::new("loop")
            .goto("end")
            .label("start")
            .goto("start")
            .label("end")
            .ret_void()
            .build()
            .unwrap();

        let labels = body.label_positions().unwrap();
        assert_eq!(labels.len(), 2);
        let first = body.instruction_at(0).unwrap();
        let target = first.op.branch_target().unwrap();
        assert_eq!(labels[&target], 3);
    }

    #[test]
    fn test_unresolved_label() {
        let result = MethodBuilder::new("broken").if_null("missing").build();
        assert!(matches!(result, Err(Error::UnresolvedLabel(_))));
    }

    #[test]
    fn test_try_catch_regions() {
        let body = MethodBuilder::new("guarded")
            .label("try")
            .nop()
            .label("end")
            .ret_void()
            .label("handler")
            .pop()
            .ret_void()
            .try_catch("try", "end", "handler", Some("core.Exception"))
            .build()
            .unwrap();
        assert_eq!(body.try_catch_blocks().len(), 1);

        let broken = MethodBuilder::new("guarded")
            .label("try")
            .try_catch("try", "nowhere", "try", None)
            .build();
        assert!(matches!(broken, Err(Error::UnresolvedLabel(_))));
    }

    #[test]
    fn test_box_shorthands() {
        let body = MethodBuilder::new("boxing")
            .param(PrimitiveType::Int)
            .returns(PrimitiveType::Int)
            .load(0)
            .box_value(PrimitiveType::Int)
            .unbox_via("core.Number", PrimitiveType::Int)
            .ret()
            .build()
            .unwrap();
        match &body.instruction_at(2).unwrap().op {
            Opcode::InvokeVirtual(method) => assert_eq!(method.owner, "core.Number"),
            other => panic!("unexpected {other}"),
        }
    }
}
