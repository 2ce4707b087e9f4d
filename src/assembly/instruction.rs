//! Instruction representation, operand types, and flow metadata.
//!
//! This module defines the instruction set of the stack machine the optimization passes
//! operate on. The design follows a classic typed-operand model: every [`Opcode`] carries
//! its operand inline, and supporting enums classify control flow ([`FlowType`]), purpose
//! ([`InstructionCategory`]) and stack effect ([`StackBehavior`]).
//!
//! # Key Components
//!
//! - [`Instruction`] - An opcode paired with its stable [`InsnId`]
//! - [`Opcode`] - The instruction set, operands inline
//! - [`MethodRef`] / [`FieldRef`] - Symbolic member references
//! - [`FlowType`] - Control flow behavior classification
//! - [`StackBehavior`] - Stack effect metadata
//!
//! # Identity
//!
//! Instructions are identified by [`InsnId`], which is allocated once by the owning
//! [`crate::assembly::MethodBody`] and never reused. Removing or inserting other
//! instructions does not change an existing instruction's id, which makes ids usable as
//! set and map keys across analysis and rewriting.

use std::fmt;

use strum::IntoStaticStr;

use crate::assembly::types::{StackType, TypeSig};

/// Stable identity of an instruction within one method body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InsnId(pub(crate) u32);

impl InsnId {
    /// Returns the raw index of this id in the method's instruction arena.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for InsnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identity of a branch target.
///
/// A label is placed in the instruction list as an [`Opcode::Label`] pseudo-instruction,
/// which has no runtime effect. Branches name labels rather than instructions so that
/// deleting the first real instruction of a block never invalidates a branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LabelId(pub(crate) u32);

impl fmt::Display for LabelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Symbolic reference to a method.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodRef {
    /// Declaring class
    pub owner: String,
    /// Simple method name
    pub name: String,
    /// Parameter types, excluding the receiver of instance methods
    pub params: Vec<TypeSig>,
    /// Return type
    pub ret: TypeSig,
}

impl MethodRef {
    /// Creates a new method reference.
    #[must_use]
    pub fn new(
        owner: impl Into<String>,
        name: impl Into<String>,
        params: Vec<TypeSig>,
        ret: TypeSig,
    ) -> Self {
        MethodRef {
            owner: owner.into(),
            name: name.into(),
            params,
            ret,
        }
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}(", self.owner, self.name)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{param}")?;
        }
        write!(f, ") -> {}", self.ret)
    }
}

/// Symbolic reference to a field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldRef {
    /// Declaring class
    pub owner: String,
    /// Field name
    pub name: String,
    /// Declared field type
    pub ty: TypeSig,
}

impl FieldRef {
    /// Creates a new field reference.
    #[must_use]
    pub fn new(owner: impl Into<String>, name: impl Into<String>, ty: TypeSig) -> Self {
        FieldRef {
            owner: owner.into(),
            name: name.into(),
            ty,
        }
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}: {}", self.owner, self.name, self.ty)
    }
}

/// Constant operands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Constant {
    /// 32-bit integer constant
    Int(i32),
    /// 64-bit integer constant
    Long(i64),
    /// 32-bit float constant
    Float(f32),
    /// 64-bit float constant
    Double(f64),
}

impl Constant {
    /// Returns the stack type of the pushed constant.
    #[must_use]
    pub const fn stack_type(self) -> StackType {
        match self {
            Constant::Int(_) => StackType::Int,
            Constant::Long(_) => StackType::Long,
            Constant::Float(_) => StackType::Float,
            Constant::Double(_) => StackType::Double,
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Int(v) => write!(f, "{v}"),
            Constant::Long(v) => write!(f, "{v}L"),
            Constant::Float(v) => write!(f, "{v}f"),
            Constant::Double(v) => write!(f, "{v}d"),
        }
    }
}

/// Binary arithmetic and bitwise operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ArithOp {
    /// Addition
    Add,
    /// Subtraction
    Sub,
    /// Multiplication
    Mul,
    /// Division
    Div,
    /// Remainder
    Rem,
    /// Bitwise and
    And,
    /// Bitwise or
    Or,
    /// Bitwise xor
    Xor,
}

/// Comparison operators for two-operand conditional branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum CmpOp {
    /// Branch if equal
    Eq,
    /// Branch if not equal
    Ne,
    /// Branch if less than
    Lt,
    /// Branch if greater or equal
    Ge,
    /// Branch if greater than
    Gt,
    /// Branch if less or equal
    Le,
}

/// How an instruction affects control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowType {
    /// Normal execution continues to next instruction
    Sequential,
    /// Conditional branch to another location
    ConditionalBranch,
    /// Always branches to another location (unconditional jump)
    UnconditionalBranch,
    /// Call to another method
    Call,
    /// Returns from current method
    Return,
    /// Exception throwing
    Throw,
}

/// Categorization of instructions by their primary function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstructionCategory {
    /// Arithmetic operations (add, sub, mul, div, rem, neg)
    Arithmetic,
    /// Control flow operations (goto, if*, return, throw, call)
    ControlFlow,
    /// Type conversion and type test operations (convert, checkcast, instanceof)
    Conversion,
    /// Load and store operations (load, store, getfield, putfield, constants)
    LoadStore,
    /// Object model operations (new)
    ObjectModel,
    /// Stack manipulation (dup, pop, swap)
    Stack,
    /// Miscellaneous operations (nop, labels)
    Misc,
}

/// Stack effect of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackBehavior {
    /// Number of items popped from stack
    pub pops: usize,
    /// Number of items pushed to stack
    pub pushes: usize,
}

/// The instruction set.
///
/// Operands are carried inline. Local slots are untyped: any value can be stored into
/// any slot, which lets the passes change a slot's contents from a wrapper reference to
/// a raw primitive without rewriting loads and stores.
#[derive(Debug, Clone, PartialEq, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Opcode {
    /// Branch target marker; no runtime effect
    Label(LabelId),
    /// No operation
    Nop,
    /// Push a constant
    Const(Constant),
    /// Push the null reference
    ConstNull,
    /// Allocate a new instance of the named class and push it
    New(String),
    /// Push the value of a local slot
    Load(u16),
    /// Pop a value into a local slot
    Store(u16),
    /// Duplicate the top of the stack
    Dup,
    /// Discard the top of the stack
    Pop,
    /// Swap the two topmost stack values
    Swap,
    /// Binary arithmetic on the two topmost values
    Arith(ArithOp),
    /// Arithmetic negation
    Neg,
    /// Numeric conversion to the given stack type
    Convert(StackType),
    /// Pop an object, push one of its fields
    GetField(FieldRef),
    /// Pop an object and a value, store the value into the object's field
    PutField(FieldRef),
    /// Push a static field
    GetStatic(FieldRef),
    /// Pop a value into a static field
    PutStatic(FieldRef),
    /// Call a static method
    InvokeStatic(MethodRef),
    /// Call an instance method; the receiver is the first operand
    InvokeVirtual(MethodRef),
    /// Checked cast to the named class
    CheckCast(String),
    /// Type test against the named class, pushes 0 or 1
    InstanceOf(String),
    /// Unconditional jump
    Goto(LabelId),
    /// Jump if the int on top of the stack is non-zero
    IfTrue(LabelId),
    /// Jump if the int on top of the stack is zero
    IfFalse(LabelId),
    /// Compare two ints and jump if the comparison holds
    IfCmp(CmpOp, LabelId),
    /// Jump if the reference on top of the stack is null
    IfNull(LabelId),
    /// Jump if the reference on top of the stack is not null
    IfNonNull(LabelId),
    /// Return the value on top of the stack
    Return,
    /// Return from a void method
    ReturnVoid,
    /// Throw the reference on top of the stack
    Throw,
}

impl Opcode {
    /// Human-readable mnemonic (`"invoke_static"`, `"if_null"`, ...).
    #[must_use]
    pub fn mnemonic(&self) -> &'static str {
        self.into()
    }

    /// Returns how this opcode affects control flow.
    #[must_use]
    pub fn flow_type(&self) -> FlowType {
        match self {
            Opcode::Goto(_) => FlowType::UnconditionalBranch,
            Opcode::IfTrue(_)
            | Opcode::IfFalse(_)
            | Opcode::IfCmp(..)
            | Opcode::IfNull(_)
            | Opcode::IfNonNull(_) => FlowType::ConditionalBranch,
            Opcode::InvokeStatic(_) | Opcode::InvokeVirtual(_) => FlowType::Call,
            Opcode::Return | Opcode::ReturnVoid => FlowType::Return,
            Opcode::Throw => FlowType::Throw,
            _ => FlowType::Sequential,
        }
    }

    /// Returns the functional category of this opcode.
    #[must_use]
    pub fn category(&self) -> InstructionCategory {
        match self {
            Opcode::Label(_) | Opcode::Nop => InstructionCategory::Misc,
            Opcode::Const(_)
            | Opcode::ConstNull
            | Opcode::Load(_)
            | Opcode::Store(_)
            | Opcode::GetField(_)
            | Opcode::PutField(_)
            | Opcode::GetStatic(_)
            | Opcode::PutStatic(_) => InstructionCategory::LoadStore,
            Opcode::New(_) => InstructionCategory::ObjectModel,
            Opcode::Dup | Opcode::Pop | Opcode::Swap => InstructionCategory::Stack,
            Opcode::Arith(_) | Opcode::Neg => InstructionCategory::Arithmetic,
            Opcode::Convert(_) | Opcode::CheckCast(_) | Opcode::InstanceOf(_) => {
                InstructionCategory::Conversion
            }
            Opcode::InvokeStatic(_)
            | Opcode::InvokeVirtual(_)
            | Opcode::Goto(_)
            | Opcode::IfTrue(_)
            | Opcode::IfFalse(_)
            | Opcode::IfCmp(..)
            | Opcode::IfNull(_)
            | Opcode::IfNonNull(_)
            | Opcode::Return
            | Opcode::ReturnVoid
            | Opcode::Throw => InstructionCategory::ControlFlow,
        }
    }

    /// Returns the stack effect of this opcode.
    #[must_use]
    pub fn stack_behavior(&self) -> StackBehavior {
        let (pops, pushes) = match self {
            Opcode::Label(_) | Opcode::Nop | Opcode::Goto(_) | Opcode::ReturnVoid => (0, 0),
            Opcode::Const(_)
            | Opcode::ConstNull
            | Opcode::New(_)
            | Opcode::Load(_)
            | Opcode::GetStatic(_) => (0, 1),
            Opcode::Store(_)
            | Opcode::Pop
            | Opcode::PutStatic(_)
            | Opcode::IfTrue(_)
            | Opcode::IfFalse(_)
            | Opcode::IfNull(_)
            | Opcode::IfNonNull(_)
            | Opcode::Return
            | Opcode::Throw => (1, 0),
            Opcode::Dup => (1, 2),
            Opcode::Swap => (2, 2),
            Opcode::Arith(_) => (2, 1),
            Opcode::Neg
            | Opcode::Convert(_)
            | Opcode::GetField(_)
            | Opcode::CheckCast(_)
            | Opcode::InstanceOf(_) => (1, 1),
            Opcode::PutField(_) | Opcode::IfCmp(..) => (2, 0),
            Opcode::InvokeStatic(method) => {
                (method.params.len(), usize::from(method.ret != TypeSig::Void))
            }
            Opcode::InvokeVirtual(method) => (
                method.params.len() + 1,
                usize::from(method.ret != TypeSig::Void),
            ),
        };
        StackBehavior { pops, pushes }
    }

    /// Returns the branch target of a jump, if this opcode is one.
    #[must_use]
    pub fn branch_target(&self) -> Option<LabelId> {
        match self {
            Opcode::Goto(label)
            | Opcode::IfTrue(label)
            | Opcode::IfFalse(label)
            | Opcode::IfCmp(_, label)
            | Opcode::IfNull(label)
            | Opcode::IfNonNull(label) => Some(*label),
            _ => None,
        }
    }

    /// Returns `true` if execution can continue with the next instruction in order.
    #[must_use]
    pub fn falls_through(&self) -> bool {
        !matches!(
            self.flow_type(),
            FlowType::UnconditionalBranch | FlowType::Return | FlowType::Throw
        )
    }

    /// Returns `true` for `if_null` / `if_non_null`.
    #[must_use]
    pub fn is_null_test(&self) -> bool {
        matches!(self, Opcode::IfNull(_) | Opcode::IfNonNull(_))
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mnemonic = self.mnemonic();
        match self {
            Opcode::Label(label) => write!(f, "{label}:"),
            Opcode::Const(constant) => write!(f, "{mnemonic} {constant}"),
            Opcode::New(class) | Opcode::CheckCast(class) | Opcode::InstanceOf(class) => {
                write!(f, "{mnemonic} {class}")
            }
            Opcode::Load(slot) | Opcode::Store(slot) => write!(f, "{mnemonic} {slot}"),
            Opcode::Arith(op) => f.write_str(op.into()),
            Opcode::Convert(ty) => write!(f, "{mnemonic} {ty}"),
            Opcode::GetField(field)
            | Opcode::PutField(field)
            | Opcode::GetStatic(field)
            | Opcode::PutStatic(field) => write!(f, "{mnemonic} {field}"),
            Opcode::InvokeStatic(method) | Opcode::InvokeVirtual(method) => {
                write!(f, "{mnemonic} {method}")
            }
            Opcode::IfCmp(op, label) => {
                let op: &'static str = op.into();
                write!(f, "{mnemonic}_{op} {label}")
            }
            Opcode::Goto(label)
            | Opcode::IfTrue(label)
            | Opcode::IfFalse(label)
            | Opcode::IfNull(label)
            | Opcode::IfNonNull(label) => write!(f, "{mnemonic} {label}"),
            _ => f.write_str(mnemonic),
        }
    }
}

/// An opcode together with its stable identity.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// Stable identity within the owning method body
    pub id: InsnId,
    /// The operation performed
    pub op: Opcode,
}

impl Instruction {
    /// Check if this instruction is a branch instruction.
    #[must_use]
    pub fn is_branch(&self) -> bool {
        matches!(
            self.op.flow_type(),
            FlowType::ConditionalBranch | FlowType::UnconditionalBranch
        )
    }

    /// Check if this instruction ends a basic block.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.is_branch() || !self.op.falls_through()
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>5}  {}", self.id.to_string(), self.op)
    }
}
